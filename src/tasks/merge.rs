//! MergeResults task: combine binned datasets by bincode precedence.
//!
//! The precedence file holds one line, most preferred bincode first:
//!
//! ```text
//! 2 >> 1 >> 3
//! ```
//!
//! [`UNBINNED`] is always appended as the least preferred code.

use std::fs;
use std::path::Path;

use log::info;

use super::{TaskContext, BINCODE_COLUMN, UNBINNED};
use crate::error::{Result, WorkflowError};
use crate::store::{OutputName, Row, StoreKey, StoreValue, Table};

/// Separator between bincodes in a precedence file.
pub const PRECEDENCE_SEPARATOR: &str = ">>";

/// Merges the datasets and publishes `MergedResults`.
pub fn run(ctx: &TaskContext<'_>, precedence_file: &Path, datasets: &[StoreKey]) -> Result<()> {
    let precedence = parse_precedence_file(precedence_file)?;

    let tables = datasets
        .iter()
        .map(|key| ctx.store.get_table(key).map(|table| (key, table)))
        .collect::<Result<Vec<_>>>()?;

    let merged = merge_tables(&tables, &precedence)?;
    info!(
        "{} Merged {} datasets into {} rows",
        ctx.path,
        tables.len(),
        merged.len()
    );

    ctx.publish(OutputName::MergedResults, StoreValue::table(merged));
    Ok(())
}

/// Merges row-aligned tables.
///
/// Each merged row takes its first four fields from the first table. Its
/// bincode is the most preferred code that any table assigned to that row.
pub fn merge_tables(tables: &[(&StoreKey, Table)], precedence: &[i64]) -> Result<Vec<Row>> {
    let Some((first_key, first)) = tables.first() else {
        return Ok(Vec::new());
    };

    for (key, table) in tables {
        if table.len() != first.len() {
            return Err(WorkflowError::RowCountMismatch {
                first: first_key.to_string(),
                expected: first.len(),
                other: key.to_string(),
                actual: table.len(),
            });
        }

        if let Some(index) = table.iter().position(|row| row.len() <= BINCODE_COLUMN) {
            return Err(WorkflowError::MalformedDataset {
                key: key.to_string(),
                row: index,
                reason: format!("expected at least {} fields", BINCODE_COLUMN + 1),
            });
        }
    }

    let merged = (0..first.len())
        .map(|index| {
            let bincode = precedence
                .iter()
                .copied()
                .find(|code| {
                    tables
                        .iter()
                        .any(|(_, table)| table[index][BINCODE_COLUMN] == *code)
                })
                .unwrap_or(UNBINNED);

            let mut row = first[index][..BINCODE_COLUMN].to_vec();
            row.push(bincode);
            row
        })
        .collect();

    Ok(merged)
}

/// Reads the precedence order, appending [`UNBINNED`] as the last entry.
pub fn parse_precedence_file(path: &Path) -> Result<Vec<i64>> {
    let content = fs::read_to_string(path).map_err(|e| WorkflowError::io(path, e))?;
    let malformed = |reason: String| WorkflowError::MalformedPrecedenceFile {
        path: path.to_path_buf(),
        reason,
    };

    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let [line] = lines.as_slice() else {
        return Err(malformed(format!(
            "expected exactly one line, found {}",
            lines.len()
        )));
    };

    let mut precedence = line
        .split(PRECEDENCE_SEPARATOR)
        .map(|code| {
            let code = code.trim();
            code.parse::<i64>()
                .map_err(|e| malformed(format!("invalid bincode '{}': {}", code, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    if !precedence.contains(&UNBINNED) {
        precedence.push(UNBINNED);
    }

    Ok(precedence)
}
