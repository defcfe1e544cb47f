//! Condition Evaluation
//!
//! A condition gates a node on a scalar in the intermediate store:
//!
//! ```text
//! $(M2A_Workflow.TaskB.NoOfDefects) > 5
//! ```
//!
//! Exactly three whitespace-separated tokens: a store reference, `<` or `>`,
//! and an integer literal. Comparisons are strict.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, WorkflowError};
use crate::store::{IntermediateStore, StoreKey};

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    LessThan,
    GreaterThan,
}

impl Comparison {
    pub fn apply(&self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::LessThan => lhs < rhs,
            Self::GreaterThan => lhs > rhs,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::LessThan => "<",
            Self::GreaterThan => ">",
        }
    }
}

/// A parsed condition, ready to be evaluated against a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    key: StoreKey,
    op: Comparison,
    literal: i64,
}

impl Condition {
    pub fn new(key: StoreKey, op: Comparison, literal: i64) -> Self {
        Self { key, op, literal }
    }

    /// Parses `"$(<key>) <op> <literal>"`.
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = |reason: String| WorkflowError::MalformedCondition {
            condition: text.to_string(),
            reason,
        };

        let tokens: Vec<&str> = text.split_whitespace().collect();
        let [reference, op, literal] = tokens.as_slice() else {
            return Err(malformed(format!(
                "expected 3 tokens, found {}",
                tokens.len()
            )));
        };

        let key = StoreKey::from_reference(reference).map_err(|e| malformed(e.to_string()))?;

        let op = match *op {
            "<" => Comparison::LessThan,
            ">" => Comparison::GreaterThan,
            other => return Err(malformed(format!("unsupported operator '{}'", other))),
        };

        let literal = literal
            .parse::<i64>()
            .map_err(|e| malformed(format!("invalid literal '{}': {}", literal, e)))?;

        Ok(Self { key, op, literal })
    }

    /// The store key this condition reads.
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    pub fn op(&self) -> Comparison {
        self.op
    }

    pub fn literal(&self) -> i64 {
        self.literal
    }

    /// Evaluates against the store.
    ///
    /// A missing key is an error, not a false condition.
    pub fn evaluate(&self, store: &IntermediateStore) -> Result<bool> {
        let value = store.get_count(&self.key)?;
        Ok(self.op.apply(value, self.literal))
    }
}

impl FromStr for Condition {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.key.to_reference(),
            self.op.symbol(),
            self.literal
        )
    }
}

/// Parses and evaluates a condition string in one step.
pub fn evaluate(condition: &str, store: &IntermediateStore) -> Result<bool> {
    Condition::parse(condition)?.evaluate(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{OutputName, StoreValue};

    fn store_with_defects(n: i64) -> IntermediateStore {
        let store = IntermediateStore::new();
        store.put(
            StoreKey::new("root.Load", OutputName::NoOfDefects),
            StoreValue::Count(n),
        );
        store
    }

    #[test]
    fn test_parse_condition() {
        let cond = Condition::parse("$(root.Load.NoOfDefects) > 5").unwrap();
        assert_eq!(cond.key().producer(), "root.Load");
        assert_eq!(cond.op(), Comparison::GreaterThan);
        assert_eq!(cond.literal(), 5);
    }

    #[test]
    fn test_evaluate_greater_than() {
        let store = store_with_defects(6);
        assert!(evaluate("$(root.Load.NoOfDefects) > 5", &store).unwrap());
        assert!(!evaluate("$(root.Load.NoOfDefects) > 6", &store).unwrap());
    }

    #[test]
    fn test_evaluate_less_than_is_strict() {
        let store = store_with_defects(5);
        assert!(!evaluate("$(root.Load.NoOfDefects) < 5", &store).unwrap());
        assert!(evaluate("$(root.Load.NoOfDefects) < 6", &store).unwrap());
    }

    #[test]
    fn test_negative_literal() {
        let store = store_with_defects(0);
        assert!(evaluate("$(root.Load.NoOfDefects) > -1", &store).unwrap());
    }

    #[test]
    fn test_wrong_token_count() {
        let err = Condition::parse("$(root.Load.NoOfDefects)>5").unwrap_err();
        assert!(matches!(err, WorkflowError::MalformedCondition { .. }));

        let err = Condition::parse("$(root.Load.NoOfDefects) > 5 extra").unwrap_err();
        assert!(matches!(err, WorkflowError::MalformedCondition { .. }));
    }

    #[test]
    fn test_unsupported_operator() {
        for op in ["<=", ">=", "==", "!="] {
            let text = format!("$(root.Load.NoOfDefects) {} 5", op);
            assert!(matches!(
                Condition::parse(&text),
                Err(WorkflowError::MalformedCondition { .. })
            ));
        }
    }

    #[test]
    fn test_unparsable_literal() {
        let err = Condition::parse("$(root.Load.NoOfDefects) > five").unwrap_err();
        assert!(err.to_string().contains("invalid literal"));
    }

    #[test]
    fn test_missing_key_fails() {
        let store = IntermediateStore::new();
        let err = evaluate("$(root.Load.NoOfDefects) > 5", &store).unwrap_err();
        assert!(matches!(err, WorkflowError::KeyNotFound(_)));
    }

    #[test]
    fn test_table_value_is_type_mismatch() {
        let store = IntermediateStore::new();
        store.put(
            StoreKey::new("root.Load", OutputName::DataTable),
            StoreValue::table(vec![]),
        );
        let err = evaluate("$(root.Load.DataTable) > 5", &store).unwrap_err();
        assert!(matches!(err, WorkflowError::TypeMismatch { .. }));
    }

    #[test]
    fn test_display_round_trips() {
        let text = "$(root.Load.NoOfDefects) < 10";
        let cond: Condition = text.parse().unwrap();
        assert_eq!(cond.to_string(), text);
    }
}
