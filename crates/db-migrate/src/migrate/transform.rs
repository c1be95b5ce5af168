//! Column transforms between extraction and load.

use rust_decimal::prelude::ToPrimitive;

use crate::core::mapping::MappingDocument;
use crate::core::value::{Page, SqlValue};
use crate::dialect::CanonicalType;

/// Reorder a page into the mapping's target column order and coerce values.
///
/// Mapped columns missing from the page become NULL so every row has one
/// value per target column.
pub fn transform_page(page: &Page, mapping: &MappingDocument) -> Vec<Vec<SqlValue>> {
    let plan: Vec<(Option<usize>, Option<CanonicalType>)> = mapping
        .columns
        .iter()
        .map(|col| (page.column_index(&col.source), col.canonical()))
        .collect();

    page.rows
        .iter()
        .map(|row| {
            plan.iter()
                .map(|(idx, canonical)| {
                    let value = idx.and_then(|i| row.get(i)).cloned().unwrap_or(SqlValue::Null);
                    transform_value(value, *canonical)
                })
                .collect()
        })
        .collect()
}

/// Coerce one extracted value for the target driver.
pub fn transform_value(value: SqlValue, canonical: Option<CanonicalType>) -> SqlValue {
    match (value, canonical) {
        (v, Some(CanonicalType::Bool)) => match v.as_i64() {
            Some(i) => SqlValue::Bool(i != 0),
            None => v,
        },
        (SqlValue::Decimal(d), _) => d.to_f64().map(SqlValue::F64).unwrap_or(SqlValue::Null),
        (SqlValue::Json(v), _) => SqlValue::Text(v.to_string()),
        (v, _) => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn mapping() -> MappingDocument {
        serde_json::from_str(
            r#"{
                "source_table": "dbo.T", "target_table": "t",
                "source_engine": "mssql", "target_engine": "mysql",
                "columns": [
                    {"source": "Flag", "target": "flag", "canonical_type": "BOOL", "target_type": "TINYINT(1)"},
                    {"source": "Amount", "target": "amount", "canonical_type": "DECIMAL", "target_type": "DECIMAL(10,2)"},
                    {"source": "Doc", "target": "doc", "canonical_type": "JSON", "target_type": "JSON"},
                    {"source": "Gone", "target": "gone", "canonical_type": "TEXT", "target_type": "VARCHAR(10)"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_transform_page() {
        let mut page = Page::new(vec!["doc".into(), "amount".into(), "flag".into()]);
        page.rows.push(vec![
            SqlValue::Json(serde_json::json!({"a": [1, 2]})),
            SqlValue::Decimal(Decimal::new(1050, 2)),
            SqlValue::I16(1),
        ]);
        page.rows.push(vec![SqlValue::Null, SqlValue::Null, SqlValue::I32(0)]);

        let rows = transform_page(&page, &mapping());
        assert_eq!(
            rows[0],
            vec![
                SqlValue::Bool(true),
                SqlValue::F64(10.5),
                SqlValue::Text(r#"{"a":[1,2]}"#.into()),
                SqlValue::Null,
            ]
        );
        assert_eq!(rows[1][0], SqlValue::Bool(false));
        assert_eq!(rows[1].len(), 4);
    }

    #[test]
    fn test_non_integer_bool_untouched() {
        assert_eq!(
            transform_value(SqlValue::Bool(true), Some(CanonicalType::Bool)),
            SqlValue::Bool(true)
        );
        assert_eq!(
            transform_value(SqlValue::I64(7), Some(CanonicalType::Int8)),
            SqlValue::I64(7)
        );
    }
}
