//! Schema extraction stage.
//!
//! Walks a connected [`SourceConnector`] and writes the run's schema
//! document, stats document, captured view/routine/trigger SQL and the run
//! manifest. Nothing here mutates the source.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::schema::{
    SchemaDocument, SqlObject, SqlObjectKind, StatsDocument, TableStats,
};
use crate::core::traits::SourceConnector;
use crate::run::{write_json_atomic, RunManifest, RunPaths};
use crate::error::Result;

/// What an extraction run produced.
#[derive(Debug, Clone)]
pub struct ExtractSummary {
    pub run_id: String,
    pub schema_path: PathBuf,
    pub stats_path: PathBuf,
    pub tables: usize,
    pub sql_objects: usize,
}

/// Build the schema document for the given schemas (connector default when empty).
pub async fn extract_schema(
    source: &dyn SourceConnector,
    database: &str,
    schemas: &[String],
) -> Result<SchemaDocument> {
    let listed = source.list_tables(schemas).await?;
    info!("Found {} tables in {}", listed.len(), database);

    let mut tables = Vec::with_capacity(listed.len());
    for table in listed {
        let name = table.full_name();
        let table = source.load_table(table).await?;
        debug!(
            "{}: {} columns, pk {:?}, {} fks, {} indexes",
            name,
            table.columns.len(),
            table.primary_key.columns,
            table.foreign_keys.len(),
            table.indexes.len()
        );
        tables.push(table);
    }

    Ok(SchemaDocument {
        source_engine: source.engine().to_string(),
        database: database.to_string(),
        extracted_at: Utc::now(),
        tables,
    })
}

/// Row counts and sampled column stats for every table of a schema document.
///
/// A failing row count is recorded as missing, never as an error.
pub async fn collect_stats(
    source: &dyn SourceConnector,
    schema: &SchemaDocument,
    sample_rows: u64,
) -> Result<StatsDocument> {
    let mut tables = Vec::with_capacity(schema.tables.len());
    for table in &schema.tables {
        let row_count = match source.get_row_count(&table.schema, &table.name).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Row count failed for {}: {}", table.full_name(), e);
                None
            }
        };

        let mut columns = Vec::with_capacity(table.columns.len());
        for column in &table.columns {
            columns.push(
                source
                    .get_column_stats(&table.schema, &table.name, column, sample_rows)
                    .await?,
            );
        }

        tables.push(TableStats {
            schema: table.schema.clone(),
            name: table.name.clone(),
            row_count,
            columns,
        });
    }

    Ok(StatsDocument {
        source_engine: schema.source_engine.clone(),
        database: schema.database.clone(),
        extracted_at: Utc::now(),
        sample_rows,
        tables,
    })
}

/// Views, routines and triggers in the given schemas.
///
/// Objects whose definition cannot be read are skipped with a warning.
pub async fn collect_sql_objects(
    source: &dyn SourceConnector,
    schemas: &[String],
) -> Result<Vec<SqlObject>> {
    let mut objects = Vec::new();
    for schema in schemas {
        for name in source.list_views(schema).await? {
            match source.get_view_definition(schema, &name).await? {
                Some(definition) => objects.push(SqlObject {
                    kind: SqlObjectKind::View,
                    schema: schema.clone(),
                    name,
                    table: None,
                    definition,
                }),
                None => warn!("No definition for view {}.{}", schema, name),
            }
        }

        for name in source.list_routines(schema).await? {
            match source.get_routine_definition(schema, &name).await? {
                Some(definition) => objects.push(SqlObject {
                    kind: SqlObjectKind::Routine,
                    schema: schema.clone(),
                    name,
                    table: None,
                    definition,
                }),
                None => warn!("No definition for routine {}.{}", schema, name),
            }
        }

        for (table, name) in source.list_triggers(schema).await? {
            match source.get_trigger_definition(schema, &table, &name).await? {
                Some(definition) => objects.push(SqlObject {
                    kind: SqlObjectKind::Trigger,
                    schema: schema.clone(),
                    name,
                    table: Some(table),
                    definition,
                }),
                None => warn!("No definition for trigger {}.{}.{}", schema, table, name),
            }
        }
    }
    Ok(objects)
}

/// Write each object to `schemas/<run>/<kind>/<file>.sql`.
pub fn write_sql_objects(paths: &RunPaths, objects: &[SqlObject]) -> Result<()> {
    for object in objects {
        let dir = paths.source_objects_dir(object.kind);
        std::fs::create_dir_all(&dir)?;
        let mut body = object.definition.trim_end().to_string();
        body.push('\n');
        std::fs::write(dir.join(object.file_name()), body)?;
    }
    Ok(())
}

/// Full extraction stage against a connected source.
pub async fn run_extract(
    source: &dyn SourceConnector,
    paths: &RunPaths,
    database: &str,
    schemas: &[String],
    sample_rows: u64,
    manifest: &RunManifest,
) -> Result<ExtractSummary> {
    let start = Instant::now();
    info!("Extracting {} from {} (run {})", database, source.engine(), paths.run_id());

    write_json_atomic(&paths.manifest_path(), manifest)?;

    let schema = extract_schema(source, database, schemas).await?;
    let schema_path = paths.schema_doc_path(database);
    write_json_atomic(&schema_path, &schema)?;

    let stats = collect_stats(source, &schema, sample_rows).await?;
    let stats_path = paths.stats_doc_path(database);
    write_json_atomic(&stats_path, &stats)?;

    // SQL objects live in the schemas that actually hold tables, or the
    // configured ones when nothing was found.
    let mut object_schemas: Vec<String> = schema.tables.iter().map(|t| t.schema.clone()).collect();
    if object_schemas.is_empty() {
        object_schemas = schemas.to_vec();
    }
    object_schemas.sort();
    object_schemas.dedup();

    let objects = collect_sql_objects(source, &object_schemas).await?;
    write_sql_objects(paths, &objects)?;

    info!(
        "Extraction complete: {} tables, {} SQL objects in {:.1}s",
        schema.tables.len(),
        objects.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(ExtractSummary {
        run_id: paths.run_id().to_string(),
        schema_path,
        stats_path,
        tables: schema.tables.len(),
        sql_objects: objects.len(),
    })
}
