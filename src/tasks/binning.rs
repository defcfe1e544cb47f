//! Binning task: classify rows by signal range.
//!
//! Rule file format, one rule per line after a header:
//!
//! ```text
//! BINCODE,RULE
//! 1,"Signal < 50"
//! 2,"Signal > 50 AND Signal < 100"
//! 3,"Signal > 100"
//! ```
//!
//! `<` sets a rule's upper bound and `>` its lower bound; both are strict.
//! Every matching rule overwrites the row's bincode, so the last match in
//! file order wins. Rows no rule matches keep [`UNBINNED`].

use std::fs::File;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use log::{debug, info};

use super::{TaskContext, BINCODE_COLUMN, SIGNAL_COLUMN, UNBINNED};
use crate::error::{Result, WorkflowError};
use crate::store::{OutputName, Row, StoreKey, StoreValue};

/// Field name rules compare against.
const SIGNAL_FIELD: &str = "Signal";

/// Keyword joining the clauses of a two-sided rule.
const CONJUNCTION: &str = "AND";

/// One line of a rule file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinRule {
    pub bincode: i64,
    pub lower: Option<i64>,
    pub upper: Option<i64>,
}

impl BinRule {
    /// True if `signal` lies strictly between the rule's bounds.
    pub fn matches(&self, signal: i64) -> bool {
        self.lower.map_or(true, |lower| signal > lower)
            && self.upper.map_or(true, |upper| signal < upper)
    }
}

/// Bins the dataset under `dataset` and publishes `BinningResultsTable` and
/// `NoOfDefects`.
///
/// Rule parsing and row mutation run while `lock` is held, so concurrent
/// binning tasks never interleave. The source table is copied first and
/// never modified.
pub fn run(
    ctx: &TaskContext<'_>,
    rule_file: &Path,
    dataset: &StoreKey,
    lock: &Mutex<()>,
) -> Result<()> {
    let rows = {
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let rules = parse_rule_file(rule_file)?;
        debug!("{} Parsed {} rules from {}", ctx.path, rules.len(), rule_file.display());

        let source = ctx.store.get_table(dataset)?;
        let mut rows: Vec<Row> = source.as_ref().clone();
        apply_rules(&mut rows, &rules, dataset)?;
        rows
    };

    let binned = rows
        .iter()
        .filter(|row| row[BINCODE_COLUMN] != UNBINNED)
        .count();
    info!(
        "{} Binned {} of {} rows from {}",
        ctx.path,
        binned,
        rows.len(),
        dataset
    );

    let count = rows.len() as i64;
    ctx.publish(OutputName::BinningResultsTable, StoreValue::table(rows));
    ctx.publish(OutputName::NoOfDefects, StoreValue::Count(count));
    Ok(())
}

/// Assigns bincodes in place.
///
/// Rows with exactly four fields first get an [`UNBINNED`] fifth field.
pub fn apply_rules(rows: &mut [Row], rules: &[BinRule], dataset: &StoreKey) -> Result<()> {
    for (index, row) in rows.iter_mut().enumerate() {
        if row.len() <= SIGNAL_COLUMN {
            return Err(WorkflowError::MalformedDataset {
                key: dataset.to_string(),
                row: index,
                reason: format!("expected at least {} fields, found {}", SIGNAL_COLUMN + 1, row.len()),
            });
        }

        if row.len() == BINCODE_COLUMN {
            row.push(UNBINNED);
        }

        let signal = row[SIGNAL_COLUMN];
        for rule in rules {
            if rule.matches(signal) {
                row[BINCODE_COLUMN] = rule.bincode;
            }
        }
    }
    Ok(())
}

/// Reads a rule file: a header line, then `bincode,rule` records.
pub fn parse_rule_file(path: &Path) -> Result<Vec<BinRule>> {
    let file = File::open(path).map_err(|e| WorkflowError::io(path, e))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rules = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| WorkflowError::csv(path, e))?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        let malformed = |reason: String| WorkflowError::MalformedRuleFile {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let (bincode, rule) = match (record.get(0), record.get(1)) {
            (Some(bincode), Some(rule)) if record.len() == 2 => (bincode, rule),
            _ => {
                return Err(malformed(format!(
                    "expected 'bincode,rule', found {} fields",
                    record.len()
                )))
            }
        };

        let bincode = bincode
            .parse::<i64>()
            .map_err(|e| malformed(format!("invalid bincode '{}': {}", bincode, e)))?;

        let (lower, upper) = parse_bounds(rule).map_err(malformed)?;
        rules.push(BinRule {
            bincode,
            lower,
            upper,
        });
    }

    Ok(rules)
}

/// Parses `Signal < N`, `Signal > N`, or both joined by `AND`.
fn parse_bounds(rule: &str) -> std::result::Result<(Option<i64>, Option<i64>), String> {
    let spaced = rule.replace('<', " < ").replace('>', " > ");
    let tokens: Vec<&str> = spaced.split_whitespace().collect();

    let mut lower = None;
    let mut upper = None;

    for clause in tokens.split(|t| t.eq_ignore_ascii_case(CONJUNCTION)) {
        let [field, op, bound] = clause else {
            return Err(format!("expected '{} <op> <bound>' in '{}'", SIGNAL_FIELD, rule));
        };

        if !field.eq_ignore_ascii_case(SIGNAL_FIELD) {
            return Err(format!("unknown field '{}'", field));
        }

        let bound = bound
            .parse::<i64>()
            .map_err(|e| format!("invalid bound '{}': {}", bound, e))?;

        match *op {
            "<" => upper = Some(bound),
            ">" => lower = Some(bound),
            other => return Err(format!("unsupported operator '{}'", other)),
        }
    }

    if lower.is_none() && upper.is_none() {
        return Err("rule has no bounds".to_string());
    }

    Ok((lower, upper))
}
