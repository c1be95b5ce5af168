//! Foreign-key dependency ordering.
//!
//! Only used when `migration.dependency_order` is set; stages otherwise run
//! tables in mapping file order and rely on FK checks being off during load.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::mapping::MappingDocument;
use crate::core::schema::{SchemaDocument, TableSchema};

/// Order tables so that every parent precedes its children.
///
/// Names are `schema.table`. References to tables outside the set and self
/// references are ignored. Tables caught in a cycle never become ready; they
/// are appended in name order instead of failing.
pub fn topological_sort(tables: &[TableSchema]) -> Vec<String> {
    let key = |schema: &str, name: &str| format!("{}.{}", schema, name).to_lowercase();

    let names: BTreeMap<String, String> = tables
        .iter()
        .map(|t| (key(&t.schema, &t.name), t.full_name()))
        .collect();

    let mut parents: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    let mut children: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for table in tables {
        let this = names
            .get_key_value(&key(&table.schema, &table.name))
            .map(|(k, _)| k.as_str())
            .unwrap_or_default();
        let entry = parents.entry(this).or_default();
        for fk in &table.foreign_keys {
            let parent = key(&fk.parent_schema, &fk.parent_table);
            if parent != this && names.contains_key(&parent) {
                entry.insert(parent.clone());
                children.entry(parent).or_default().insert(this);
            }
        }
    }

    let mut ready: BTreeSet<&str> = parents
        .iter()
        .filter(|(_, p)| p.is_empty())
        .map(|(k, _)| *k)
        .collect();
    let mut remaining: BTreeMap<&str, usize> =
        parents.iter().map(|(k, p)| (*k, p.len())).collect();

    let mut order = Vec::with_capacity(tables.len());
    while let Some(next) = ready.pop_first() {
        remaining.remove(next);
        if let Some(name) = names.get(next) {
            order.push(name.clone());
        }
        if let Some(kids) = children.get(next) {
            for kid in kids {
                if let Some(count) = remaining.get_mut(kid) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(*kid);
                    }
                }
            }
        }
    }

    // Cycle members, in name order.
    for key in remaining.keys() {
        if let Some(name) = names.get(*key) {
            order.push(name.clone());
        }
    }
    order
}

/// Reorder mappings by FK dependency of their source tables.
///
/// Mappings whose source table is not in the schema document keep their
/// relative order after all ordered ones.
pub fn order_mappings<T>(
    mut mappings: Vec<(T, MappingDocument)>,
    schema: &SchemaDocument,
) -> Vec<(T, MappingDocument)> {
    let order = topological_sort(&schema.tables);
    let rank = |doc: &MappingDocument| {
        schema
            .find_table(&doc.source_table)
            .and_then(|t| order.iter().position(|n| *n == t.full_name()))
            .unwrap_or(usize::MAX)
    };
    mappings.sort_by_key(|(_, doc)| rank(doc));
    mappings
}
