//! Dead-letter CSV files for pages that could not be loaded.

use std::path::{Path, PathBuf};

use tracing::error;

use crate::core::identifier::file_stem;
use crate::core::value::SqlValue;
use crate::error::Result;

/// NULL in a dead-letter field, as `LOAD DATA INFILE` reads it.
pub const NULL_MARKER: &str = "\\N";

/// `<dir>/<table>_offset_<offset>.csv`
pub fn dead_letter_path(dir: &Path, table: &str, offset: u64) -> PathBuf {
    dir.join(format!("{}_offset_{}.csv", file_stem(table), offset))
}

/// Write a page as CSV with a header row. NULL becomes [`NULL_MARKER`], so an
/// empty string stays an empty field.
pub fn write_dead_letter(
    dir: &Path,
    table: &str,
    offset: u64,
    columns: &[String],
    rows: &[Vec<SqlValue>],
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dead_letter_path(dir, table, offset);

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(
            row.iter()
                .map(|v| v.to_text().unwrap_or_else(|| NULL_MARKER.to_string())),
        )?;
    }
    writer.flush()?;

    error!(
        "{}: {} row(s) at offset {} written to {}",
        table,
        rows.len(),
        offset,
        path.display()
    );
    Ok(path)
}
