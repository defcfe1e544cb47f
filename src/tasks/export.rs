//! ExportResults task: write a dataset to CSV.

use std::fs::{self, File};
use std::path::Path;

use log::{debug, info};

use super::{TaskContext, EXPORT_HEADER};
use crate::error::{Result, WorkflowError};
use crate::store::{Row, StoreKey};

/// Writes the table under `dataset` to `filename`.
pub fn run(ctx: &TaskContext<'_>, dataset: &StoreKey, filename: &Path) -> Result<()> {
    let table = ctx.store.get_table(dataset)?;
    write_rows(filename, &table)?;

    info!(
        "{} Exported {} rows from {} to {}",
        ctx.path,
        table.len(),
        dataset,
        filename.display()
    );
    Ok(())
}

/// Writes rows under the fixed `Id,X,Y,Signal,Bincode` header.
///
/// Rows are written with the fields they have; unbinned four-field rows
/// stay four fields wide.
pub fn write_rows(filename: &Path, rows: &[Row]) -> Result<()> {
    if let Some(parent) = filename.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WorkflowError::io(parent, e))?;
            debug!("Created directory: {}", parent.display());
        }
    }

    let file = File::create(filename).map_err(|e| WorkflowError::io(filename, e))?;
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(file);

    writer
        .write_record(EXPORT_HEADER)
        .map_err(|e| WorkflowError::csv(filename, e))?;

    for row in rows {
        writer
            .write_record(row.iter().map(|field| field.to_string()))
            .map_err(|e| WorkflowError::csv(filename, e))?;
    }

    writer.flush().map_err(|e| WorkflowError::io(filename, e))
}
