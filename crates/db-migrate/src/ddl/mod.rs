//! DDL generation and idempotent schema application.
//!
//! [`generate_ddl`] renders one SQL file per approved mapping through the
//! target connector and picks up the approved view/routine/trigger
//! translations. [`apply_schema`] prints those files (dry run) or executes
//! them, absorbing "already exists" conditions.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::mapping::MappingDocument;
use crate::core::schema::SqlObjectKind;
use crate::core::traits::{DdlOutcome, TargetConnector};
use crate::error::Result;
use crate::run::RunPaths;

/// What a DDL file contains, which decides how it is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    /// `CREATE TABLE` plus indexes, split into statements.
    Table,
    /// View, routine or trigger body, executed as one statement.
    Object(SqlObjectKind),
}

/// One generated DDL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlFile {
    /// File name relative to the run's DDL directory.
    pub name: String,
    pub kind: DdlKind,
    pub sql: String,
}

/// Counts from one schema application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub files: usize,
    pub applied: usize,
    pub already_existed: usize,
}

/// Render the table DDL for one mapping into the target schema.
pub fn render_table_ddl(
    target: &dyn TargetConnector,
    target_schema: &str,
    mapping: &MappingDocument,
) -> Result<DdlFile> {
    let table = mapping.target_name();
    let mut statements = vec![target.render_create_table(target_schema, table, mapping)?];
    statements.extend(target.render_indexes(target_schema, table, mapping)?);

    let mut sql = statements.join(";\n\n");
    sql.push_str(";\n");
    Ok(DdlFile {
        name: format!("{}.sql", crate::core::identifier::file_stem(table)),
        kind: DdlKind::Table,
        sql,
    })
}

/// Approved object translations, by kind then file name.
pub fn collect_object_ddl(paths: &RunPaths) -> Result<Vec<DdlFile>> {
    let mut files = Vec::new();
    for kind in SqlObjectKind::ALL {
        let dir = paths.approved_objects_dir(kind);
        if !dir.is_dir() {
            continue;
        }
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "sql"))
            .collect();
        entries.sort();
        for path in entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            files.push(DdlFile {
                name: format!("{}/{}", kind.dir_name(), name),
                kind: DdlKind::Object(kind),
                sql: std::fs::read_to_string(&path)?,
            });
        }
    }
    Ok(files)
}

/// Render every approved mapping plus approved objects and write them under
/// `ddl/<run>/`. Tables come first, in mapping order.
pub fn generate_ddl(
    target: &dyn TargetConnector,
    target_schema: &str,
    mappings: &[MappingDocument],
    paths: &RunPaths,
) -> Result<Vec<DdlFile>> {
    let mut files = Vec::with_capacity(mappings.len());
    for mapping in mappings {
        files.push(render_table_ddl(target, target_schema, mapping)?);
    }
    files.extend(collect_object_ddl(paths)?);

    let dir = paths.ddl_dir();
    for file in &files {
        write_file(&dir, file)?;
    }
    info!("Generated {} DDL file(s) in {}", files.len(), dir.display());
    Ok(files)
}

fn write_file(dir: &Path, file: &DdlFile) -> Result<()> {
    let path = dir.join(&file.name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &file.sql)?;
    Ok(())
}

/// Print (dry run) or execute DDL files in order.
///
/// Table files are split into statements; object files run as one statement.
/// "Already exists" outcomes are logged and counted. Any other failure stops
/// application.
pub async fn apply_schema(
    target: &dyn TargetConnector,
    files: &[DdlFile],
    dry_run: bool,
    out: &mut dyn Write,
) -> Result<ApplySummary> {
    let mut summary = ApplySummary::default();

    for file in files {
        summary.files += 1;
        if dry_run {
            writeln!(out, "-- {}", file.name)?;
            writeln!(out, "{}", file.sql.trim_end())?;
            writeln!(out)?;
            continue;
        }

        let statements = match file.kind {
            DdlKind::Table => split_statements(&file.sql),
            DdlKind::Object(_) => vec![strip_terminator(&file.sql).to_string()],
        };

        for statement in statements.iter().filter(|s| !s.trim().is_empty()) {
            match target.apply_ddl(statement).await? {
                DdlOutcome::Applied => {
                    summary.applied += 1;
                    debug!("Applied statement from {}", file.name);
                }
                DdlOutcome::AlreadyExists { code } => {
                    summary.already_existed += 1;
                    warn!("{}: already applied (code {}), continuing", file.name, code);
                }
            }
        }
    }

    if !dry_run {
        info!(
            "Schema applied: {} statement(s), {} already present",
            summary.applied, summary.already_existed
        );
    }
    Ok(summary)
}

fn strip_terminator(sql: &str) -> &str {
    let trimmed = sql.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}

/// Split SQL on `;` outside of quotes and comments.
///
/// Handles `'..'`, `".."` and `` `..` `` literals (doubled quote escapes),
/// `-- ..` and `# ..` line comments, and `/* .. */` block comments.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                current.push(c);
                while let Some(inner) = chars.next() {
                    current.push(inner);
                    if inner == c {
                        if chars.peek() == Some(&c) {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        } else {
                            break;
                        }
                    }
                }
            }
            '#' => {
                current.push(c);
                for inner in chars.by_ref() {
                    current.push(inner);
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                current.push(c);
                for inner in chars.by_ref() {
                    current.push(inner);
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                current.push(c);
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    current.push(inner);
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            ';' => {
                let statement = current.trim();
                if !statement.is_empty() {
                    statements.push(statement.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }
    statements
}
