//! DataLoad task: read integer rows from a CSV file.
//!
//! The first line is a header and is discarded. Every other non-blank line
//! becomes one row of comma-separated integers.

use std::fs::File;
use std::path::Path;

use log::info;

use super::TaskContext;
use crate::error::{Result, WorkflowError};
use crate::store::{OutputName, Row, StoreValue};

/// Loads `filename` and publishes `DataTable` and `NoOfDefects`.
pub fn run(ctx: &TaskContext<'_>, filename: &Path) -> Result<()> {
    let rows = read_rows(filename)?;
    info!(
        "{} Loaded {} rows from {}",
        ctx.path,
        rows.len(),
        filename.display()
    );

    let count = rows.len() as i64;
    ctx.publish(OutputName::DataTable, StoreValue::table(rows));
    ctx.publish(OutputName::NoOfDefects, StoreValue::Count(count));
    Ok(())
}

/// Reads the data rows of a CSV file, skipping its header.
pub fn read_rows(filename: &Path) -> Result<Vec<Row>> {
    let file = File::open(filename).map_err(|e| WorkflowError::io(filename, e))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| WorkflowError::csv(filename, e))?;
        let line = record.position().map_or(0, |p| p.line() as usize);

        let row = record
            .iter()
            .map(|field| {
                field.parse::<i64>().map_err(|e| WorkflowError::MalformedDataFile {
                    path: filename.to_path_buf(),
                    line,
                    reason: format!("'{}' is not an integer: {}", field, e),
                })
            })
            .collect::<Result<Row>>()?;

        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{IntermediateStore, StoreKey};
    use crate::workflow::{TaskInputs, WorkflowNode};
    use std::fs;
    use tempfile::tempdir;

    fn load_node(filename: &Path) -> WorkflowNode {
        WorkflowNode::task(
            "Load",
            TaskInputs::DataLoad {
                filename: filename.to_path_buf(),
            },
        )
    }

    #[test]
    fn test_load_rows_and_count() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("defects.csv");
        fs::write(&path, "Id,X,Y,Signal\n1,10,20,45\n2,11,21,120\n3,12,22,75\n").unwrap();

        let store = IntermediateStore::new();
        let node = load_node(&path);
        let ctx = TaskContext::new("root.Load", node.as_task().unwrap(), &store);
        run(&ctx, &path).unwrap();

        let table = store
            .get_table(&StoreKey::new("root.Load", OutputName::DataTable))
            .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0], vec![1, 10, 20, 45]);
        assert_eq!(table[2], vec![3, 12, 22, 75]);
        assert_eq!(
            store
                .get_count(&StoreKey::new("root.Load", OutputName::NoOfDefects))
                .unwrap(),
            3
        );
    }

    #[test]
    fn test_load_header_only() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("empty.csv");
        fs::write(&path, "Id,X,Y,Signal\n").unwrap();

        assert!(read_rows(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_skips_blank_lines_and_trims() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("spaced.csv");
        fs::write(&path, "Id,X,Y,Signal\n1, 2, 3, 4\n\n5,6,7,8\n").unwrap();

        let rows = read_rows(&path).unwrap();
        assert_eq!(rows, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);
    }

    #[test]
    fn test_load_respects_declared_outputs() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("defects.csv");
        fs::write(&path, "Id,X,Y,Signal\n1,2,3,4\n").unwrap();

        let store = IntermediateStore::new();
        let node = load_node(&path).with_outputs(vec![OutputName::NoOfDefects]);
        let ctx = TaskContext::new("root.Load", node.as_task().unwrap(), &store);
        run(&ctx, &path).unwrap();

        assert!(!store.contains(&StoreKey::new("root.Load", OutputName::DataTable)));
        assert!(store.contains(&StoreKey::new("root.Load", OutputName::NoOfDefects)));
    }

    #[test]
    fn test_load_non_integer_field() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bad.csv");
        fs::write(&path, "Id,X,Y,Signal\n1,2,three,4\n").unwrap();

        let err = read_rows(&path).unwrap_err();
        assert!(matches!(err, WorkflowError::MalformedDataFile { line: 2, .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = read_rows(Path::new("/nonexistent/defects.csv")).unwrap_err();
        assert!(matches!(err, WorkflowError::Io { .. }));
    }
}
