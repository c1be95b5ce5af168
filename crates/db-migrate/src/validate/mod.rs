//! Post-migration validation.
//!
//! Three check tiers per table, each run against both source and target:
//!
//! - `L1_ROW_COUNT`: row counts within `row_count_tolerance`
//! - `L2_SUM` / `L2_MIN` / `L2_MAX`: aggregates on numeric and temporal columns
//! - `L3_DISTINCT`: exact `COUNT(DISTINCT)` on primary key columns
//!
//! Query failures become failed checks carrying the error text. Validation
//! always produces a complete report.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ValidationConfig;
use crate::core::mapping::{ColumnMapping, MappingDocument};
use crate::core::traits::{AggregateFn, SourceConnector, TargetConnector};
use crate::core::value::SqlValue;
use crate::error::Result;
use crate::run::{write_json_atomic, RunPaths};

/// Absolute threshold used when the source aggregate is zero.
const ZERO_EPSILON: f64 = 1e-9;

/// Length of `YYYY-MM-DDTHH:MM:SS`.
const SECOND_PRECISION_LEN: usize = 19;

/// One check outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default)]
    pub source: serde_json::Value,
    #[serde(default)]
    pub target: serde_json::Value,
    pub pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn failed(check: &str, column: Option<&str>, error: String) -> Self {
        Self {
            check: check.to_string(),
            column: column.map(str::to_string),
            source: serde_json::Value::Null,
            target: serde_json::Value::Null,
            pass: false,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    pub source_table: String,
    pub target_table: String,
    pub checks: Vec<CheckResult>,
    pub pass: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub validated_at: DateTime<Utc>,
    pub source_engine: String,
    pub target_engine: String,
    pub tables: Vec<TableReport>,
    pub all_pass: bool,
}

impl ValidationReport {
    pub fn failed_tables(&self) -> impl Iterator<Item = &TableReport> {
        self.tables.iter().filter(|t| !t.pass)
    }
}

/// Truncate an ISO-ish timestamp to whole seconds with a `T` separator.
///
/// A bare date is widened to midnight so `DATE` and `DATETIME` renderings of
/// the same day compare equal.
pub fn normalize_temporal(text: &str) -> String {
    let mut s: String = text.trim().to_string();
    if s.len() > 10 && s.as_bytes()[10] == b' ' {
        s.replace_range(10..11, "T");
    }
    if s.len() == 10 {
        s.push_str("T00:00:00");
    }
    if s.len() > SECOND_PRECISION_LEN && s.is_char_boundary(SECOND_PRECISION_LEN) {
        s.truncate(SECOND_PRECISION_LEN);
    }
    s
}

/// Text form of a temporal value for comparison.
///
/// Offset-bearing values are shifted to UTC, matching what the target stores.
fn temporal_text(value: &SqlValue) -> Option<String> {
    let utc = |dt: DateTime<FixedOffset>| dt.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string();
    match value {
        SqlValue::DateTimeOffset(dt) => Some(utc(*dt)),
        SqlValue::Text(s) => Some(
            DateTime::parse_from_rfc3339(s.trim())
                .map(utc)
                .unwrap_or_else(|_| s.clone()),
        ),
        other => other.to_text(),
    }
}

/// Compare two aggregate values.
///
/// Temporal values compare at second granularity, in UTC when an offset is
/// present. Numbers use relative
/// tolerance, or an absolute near-zero threshold when the source is zero.
/// Everything else compares as text.
pub fn values_match(
    source: &SqlValue,
    target: &SqlValue,
    temporal: bool,
    float_tolerance: f64,
) -> bool {
    match (source.to_text(), target.to_text()) {
        (None, None) => return true,
        (None, _) | (_, None) => return false,
        (Some(_), Some(_)) if temporal => {
            return match (temporal_text(source), temporal_text(target)) {
                (Some(s), Some(t)) => normalize_temporal(&s) == normalize_temporal(&t),
                _ => false,
            };
        }
        _ => {}
    }

    match (source.as_f64(), target.as_f64()) {
        (Some(s), Some(t)) if s == 0.0 => t.abs() < ZERO_EPSILON,
        (Some(s), Some(t)) => (s - t).abs() / s.abs() <= float_tolerance,
        _ => source.to_text() == target.to_text(),
    }
}

fn counts_equal(source: &SqlValue, target: &SqlValue) -> bool {
    match (source.as_f64(), target.as_f64()) {
        (Some(s), Some(t)) => s == t,
        _ => source.to_text() == target.to_text(),
    }
}

/// Runs the check tiers for approved mappings.
pub struct Validator<'a> {
    source: &'a dyn SourceConnector,
    target: &'a dyn TargetConnector,
    config: ValidationConfig,
    target_schema: String,
}

impl<'a> Validator<'a> {
    pub fn new(
        source: &'a dyn SourceConnector,
        target: &'a dyn TargetConnector,
        config: ValidationConfig,
        target_schema: impl Into<String>,
    ) -> Self {
        Self {
            source,
            target,
            config,
            target_schema: target_schema.into(),
        }
    }

    pub async fn validate_all(&self, mappings: &[MappingDocument]) -> ValidationReport {
        let mut tables = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            info!("Validating {}", mapping.source_table);
            let report = self.validate_table(mapping).await;
            if report.pass {
                info!("  PASS {}", report.target_table);
            } else {
                warn!("  FAIL {}", report.target_table);
            }
            tables.push(report);
        }

        let all_pass = tables.iter().all(|t| t.pass);
        ValidationReport {
            validated_at: Utc::now(),
            source_engine: self.source.engine().to_string(),
            target_engine: self.target.engine().to_string(),
            tables,
            all_pass,
        }
    }

    pub async fn validate_table(&self, mapping: &MappingDocument) -> TableReport {
        let target_table = mapping.target_name();
        let mut checks = vec![self.row_count_check(mapping).await];

        for column in &mapping.columns {
            let canonical = column.canonical();
            let numeric = canonical.map_or(false, |c| c.is_numeric());
            let temporal = canonical.map_or(false, |c| c.is_temporal());

            if numeric || temporal {
                for func in [AggregateFn::Sum, AggregateFn::Min, AggregateFn::Max] {
                    if temporal && func == AggregateFn::Sum {
                        continue;
                    }
                    checks.push(self.aggregate_check(mapping, column, func, temporal).await);
                }
            }
            if column.is_primary_key() {
                checks.push(self.distinct_check(mapping, column).await);
            }
        }

        let pass = checks.iter().all(|c| c.pass);
        TableReport {
            source_table: mapping.source_table.clone(),
            target_table: format!("{}.{}", self.target_schema, target_table),
            checks,
            pass,
        }
    }

    async fn row_count_check(&self, mapping: &MappingDocument) -> CheckResult {
        const CHECK: &str = "L1_ROW_COUNT";
        let (schema, table) = mapping.source_parts();

        let source = match self.source.get_row_count(schema, table).await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("{}: source row count failed: {}", mapping.source_table, e);
                None
            }
        };
        let target = match self
            .target
            .get_row_count(&self.target_schema, mapping.target_name())
            .await
        {
            Ok(n) => n,
            Err(e) => return CheckResult::failed(CHECK, None, e.to_string()),
        };

        let pass = match source {
            Some(s) => (s - target).abs() as f64 <= s as f64 * self.config.row_count_tolerance,
            None => target >= 0,
        };
        CheckResult {
            check: CHECK.to_string(),
            column: None,
            source: source.map_or(serde_json::Value::Null, serde_json::Value::from),
            target: serde_json::Value::from(target),
            pass,
            error: None,
        }
    }

    async fn aggregate_pair(
        &self,
        mapping: &MappingDocument,
        column: &ColumnMapping,
        func: AggregateFn,
    ) -> Result<(SqlValue, SqlValue)> {
        let (schema, table) = mapping.source_parts();
        let source = self
            .source
            .run_aggregate(schema, table, &column.source, func)
            .await?;
        let target = self
            .target
            .run_aggregate(&self.target_schema, mapping.target_name(), &column.target, func)
            .await?;
        Ok((source, target))
    }

    async fn aggregate_check(
        &self,
        mapping: &MappingDocument,
        column: &ColumnMapping,
        func: AggregateFn,
        temporal: bool,
    ) -> CheckResult {
        let check = format!("L2_{}", func.name());
        match self.aggregate_pair(mapping, column, func).await {
            Ok((source, target)) => CheckResult {
                pass: values_match(&source, &target, temporal, self.config.float_tolerance),
                check,
                column: Some(column.target.clone()),
                source: source.to_json(),
                target: target.to_json(),
                error: None,
            },
            Err(e) => CheckResult::failed(&check, Some(&column.target), e.to_string()),
        }
    }

    async fn distinct_check(&self, mapping: &MappingDocument, column: &ColumnMapping) -> CheckResult {
        const CHECK: &str = "L3_DISTINCT";
        match self
            .aggregate_pair(mapping, column, AggregateFn::CountDistinct)
            .await
        {
            Ok((source, target)) => CheckResult {
                check: CHECK.to_string(),
                column: Some(column.target.clone()),
                pass: counts_equal(&source, &target),
                source: source.to_json(),
                target: target.to_json(),
                error: None,
            },
            Err(e) => CheckResult::failed(CHECK, Some(&column.target), e.to_string()),
        }
    }
}

/// Write `reports/<run>/validation_<YYYYMMDDTHHMMSS>.json`.
pub fn write_report(paths: &RunPaths, report: &ValidationReport) -> Result<PathBuf> {
    let name = format!(
        "validation_{}.json",
        report.validated_at.format("%Y%m%dT%H%M%S")
    );
    let path = paths.reports_dir().join(name);
    write_json_atomic(&path, report)?;
    info!("Validation report: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_mappings, sample_source, MemoryTarget};
    use tempfile::TempDir;

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    #[test]
    fn test_float_tolerance() {
        assert!(values_match(
            &SqlValue::I64(1_000_000),
            &SqlValue::F64(1_000_000.04),
            false,
            0.0001
        ));
        assert!(!values_match(&SqlValue::F64(100.0), &SqlValue::F64(101.0), false, 0.0001));
        assert!(values_match(&SqlValue::I32(0), &SqlValue::F64(0.0), false, 0.0001));
        assert!(!values_match(&SqlValue::I32(0), &SqlValue::F64(0.5), false, 0.0001));
    }

    #[test]
    fn test_temporal_second_truncation() {
        assert!(values_match(
            &text("2024-01-15T12:30:45.123"),
            &text("2024-01-15T12:30:45.999"),
            true,
            0.0
        ));
        assert!(!values_match(
            &text("2024-01-15T12:30:45"),
            &text("2024-01-15T12:30:46"),
            true,
            0.0
        ));
    }

    #[test]
    fn test_offset_timestamps_compare_in_utc() {
        let source = DateTime::parse_from_rfc3339("2024-01-15T12:30:45+02:00").unwrap();
        let stored = chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 45)
            .unwrap();

        assert!(values_match(
            &SqlValue::DateTimeOffset(source),
            &SqlValue::DateTime(stored),
            true,
            0.0
        ));
        assert!(values_match(
            &text("2024-01-15T12:30:45.250+02:00"),
            &text("2024-01-15 10:30:45"),
            true,
            0.0
        ));
        assert!(!values_match(
            &SqlValue::DateTimeOffset(source),
            &text("2024-01-15T12:30:45"),
            true,
            0.0
        ));
    }

    #[test]
    fn test_normalize_temporal() {
        assert_eq!(normalize_temporal("2024-01-15 12:30:45.5"), "2024-01-15T12:30:45");
        assert_eq!(normalize_temporal("2024-01-15"), "2024-01-15T00:00:00");
        assert_eq!(
            normalize_temporal("2024-01-15T12:30:45+02:00"),
            "2024-01-15T12:30:45"
        );
    }

    #[test]
    fn test_nulls_and_text() {
        assert!(values_match(&SqlValue::Null, &SqlValue::Null, false, 0.0));
        assert!(!values_match(&SqlValue::Null, &SqlValue::I32(1), false, 0.0));
        assert!(values_match(&text("abc"), &text("abc"), false, 0.0));
        assert!(!values_match(&text("abc"), &text("abd"), false, 0.0));
    }

    #[test]
    fn test_distinct_counts_are_exact() {
        assert!(counts_equal(&SqlValue::I64(10), &SqlValue::I32(10)));
        assert!(!counts_equal(&SqlValue::I64(10), &SqlValue::I64(9)));
    }

    async fn load_all(target: &MemoryTarget, source_rows: usize, mapping: &MappingDocument) {
        let columns = mapping.target_columns();
        let source = sample_source(source_rows, source_rows);
        let (schema, table) = mapping.source_parts();
        let page = source
            .extract_chunk(schema, table, &mapping.source_columns(), 0, 1_000)
            .await
            .unwrap();
        let rows = crate::migrate::transform_page(&page, mapping);
        target
            .bulk_load("shop", mapping.target_name(), &columns, &rows)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_table_report_checks() {
        let source = sample_source(4, 4);
        let target = MemoryTarget::new();
        let orders = sample_mappings().remove(2);
        load_all(&target, 4, &orders).await;

        let validator = Validator::new(&source, &target, ValidationConfig::default(), "shop");
        let report = validator.validate_table(&orders).await;

        assert!(report.pass, "{:?}", report);
        assert_eq!(report.target_table, "shop.orders");
        assert_eq!(report.checks[0].check, "L1_ROW_COUNT");
        let names: Vec<&str> = report.checks.iter().map(|c| c.check.as_str()).collect();
        assert!(names.contains(&"L3_DISTINCT"));
        assert!(names.contains(&"L2_SUM"));
        // No SUM over the timestamp column.
        assert!(!report
            .checks
            .iter()
            .any(|c| c.check == "L2_SUM" && c.column.as_deref() == Some("created_at")));
    }

    #[tokio::test]
    async fn test_row_count_mismatch_fails() {
        let source = sample_source(6, 6);
        let target = MemoryTarget::new();
        let customers = sample_mappings().remove(0);
        load_all(&target, 5, &customers).await;

        let validator = Validator::new(&source, &target, ValidationConfig::default(), "shop");
        let report = validator.validate_table(&customers).await;
        assert!(!report.pass);
        assert_eq!(report.checks[0].source, serde_json::json!(6));
        assert_eq!(report.checks[0].target, serde_json::json!(5));

        let lenient = ValidationConfig {
            row_count_tolerance: 0.2,
            ..Default::default()
        };
        let validator = Validator::new(&source, &target, lenient, "shop");
        let report = validator.validate_table(&customers).await;
        assert!(report.checks[0].pass);
    }

    #[tokio::test]
    async fn test_query_errors_become_failed_checks() {
        let source = sample_source(3, 3);
        let target = MemoryTarget::new();
        let orders = sample_mappings().remove(2);
        load_all(&target, 3, &orders).await;
        target.fail_aggregates(true);

        let validator = Validator::new(&source, &target, ValidationConfig::default(), "shop");
        let report = validator.validate_all(&[orders]).await;

        assert!(!report.all_pass);
        let table = &report.tables[0];
        assert!(table.checks[0].pass);
        assert!(table.checks[1..]
            .iter()
            .all(|c| !c.pass && c.error.is_some()));
    }

    #[tokio::test]
    async fn test_write_report_layout() {
        let dir = TempDir::new().unwrap();
        let paths = RunPaths::new(dir.path(), "run-v");
        let source = sample_source(1, 1);
        let target = MemoryTarget::new();
        let validator = Validator::new(&source, &target, ValidationConfig::default(), "shop");
        let report = validator.validate_all(&[]).await;
        assert!(report.all_pass);

        let path = write_report(&paths, &report).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("validation_") && name.ends_with(".json"));
        assert_eq!(name.len(), "validation_20240115T123045.json".len());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains('\n'));
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for key in ["validated_at", "source_engine", "target_engine", "tables", "all_pass"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
