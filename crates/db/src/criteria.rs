//! Composable criteria queries.
//!
//! A [`CriteriaQuery`] selects rows of one entity type with an optional
//! [`Predicate`] restriction and ordering. Predicates name attribute paths
//! (`title`, `parent_id`, or dotted paths into nested objects) and are
//! evaluated directly against stored rows, so caller input is never spliced
//! into query text.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use crate::entity::{Entity, Row};
use crate::error::{PersistenceError, Result};
use crate::like::LikePattern;

/// A boolean restriction over the attributes of a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equal { path: String, value: Value },
    Like { path: String, pattern: String },
    IsNull { path: String },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// `path = value`. Comparing against null never matches; use
    /// [`Predicate::is_null`] for that.
    pub fn equal(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Equal {
            path: path.into(),
            value: value.into(),
        }
    }

    /// `path LIKE pattern`, wildcards supplied by the caller.
    pub fn like(path: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            path: path.into(),
            pattern: pattern.into(),
        }
    }

    pub fn is_null(path: impl Into<String>) -> Self {
        Predicate::IsNull { path: path.into() }
    }

    pub fn is_not_null(path: impl Into<String>) -> Self {
        Predicate::is_null(path).not()
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut terms) => {
                terms.push(other);
                Predicate::And(terms)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut terms) => {
                terms.push(other);
                Predicate::Or(terms)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    fn collect_paths<'a>(&'a self, paths: &mut Vec<&'a str>) {
        match self {
            Predicate::Equal { path, .. }
            | Predicate::Like { path, .. }
            | Predicate::IsNull { path } => paths.push(path),
            Predicate::And(terms) | Predicate::Or(terms) => {
                terms.iter().for_each(|term| term.collect_paths(paths))
            }
            Predicate::Not(inner) => inner.collect_paths(paths),
        }
    }

    pub(crate) fn compile(&self, like_case_sensitive: bool) -> Result<Matcher> {
        Ok(match self {
            Predicate::Equal { path, value } => Matcher::Equal {
                path: split_path(path),
                value: value.clone(),
            },
            Predicate::Like { path, pattern } => Matcher::Like {
                path: split_path(path),
                pattern: LikePattern::compile(pattern, like_case_sensitive)?,
            },
            Predicate::IsNull { path } => Matcher::IsNull {
                path: split_path(path),
            },
            Predicate::And(terms) => Matcher::And(
                terms
                    .iter()
                    .map(|term| term.compile(like_case_sensitive))
                    .collect::<Result<_>>()?,
            ),
            Predicate::Or(terms) => Matcher::Or(
                terms
                    .iter()
                    .map(|term| term.compile(like_case_sensitive))
                    .collect::<Result<_>>()?,
            ),
            Predicate::Not(inner) => Matcher::Not(Box::new(inner.compile(like_case_sensitive)?)),
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equal { path, value } => write!(f, "{path} = {value}"),
            Predicate::Like { path, pattern } => write!(f, "{path} LIKE '{pattern}'"),
            Predicate::IsNull { path } => write!(f, "{path} IS NULL"),
            Predicate::And(terms) => write_joined(f, terms, " AND "),
            Predicate::Or(terms) => write_joined(f, terms, " OR "),
            Predicate::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, terms: &[Predicate], separator: &str) -> fmt::Result {
    write!(f, "(")?;
    for (index, term) in terms.iter().enumerate() {
        if index > 0 {
            write!(f, "{separator}")?;
        }
        write!(f, "{term}")?;
    }
    write!(f, ")")
}

/// Sort key for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    path: String,
    ascending: bool,
}

impl Order {
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ascending: true,
        }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ascending: false,
        }
    }

    pub(crate) fn compare(&self, left: &Row, right: &Row) -> Ordering {
        let path = split_path(&self.path);
        let ordering = compare_values(resolve(left, &path), resolve(right, &path));
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

/// Selection of `E` rows.
#[derive(Debug, Clone)]
pub struct CriteriaQuery<E> {
    restriction: Option<Predicate>,
    order: Vec<Order>,
    max_results: Option<usize>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> CriteriaQuery<E> {
    /// Select every row of `E`.
    pub fn new() -> Self {
        Self {
            restriction: None,
            order: Vec::new(),
            max_results: None,
            _entity: PhantomData,
        }
    }

    /// Restrict the selection. Calling this again replaces the restriction.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.restriction = Some(predicate);
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn restriction(&self) -> Option<&Predicate> {
        self.restriction.as_ref()
    }

    pub(crate) fn ordering(&self) -> &[Order] {
        &self.order
    }

    pub(crate) fn limit(&self) -> Option<usize> {
        self.max_results
    }

    /// Reject attribute paths the entity does not declare.
    pub(crate) fn validate(&self) -> Result<()> {
        let mut paths = Vec::new();
        if let Some(restriction) = &self.restriction {
            restriction.collect_paths(&mut paths);
        }
        paths.extend(self.order.iter().map(|order| order.path.as_str()));

        for path in paths {
            let attribute = path.split('.').next().unwrap_or_default();
            if !E::ATTRIBUTES.contains(&attribute) {
                return Err(PersistenceError::UnknownAttribute {
                    entity: E::NAME,
                    attribute: path.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl<E: Entity> Default for CriteriaQuery<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A predicate with its patterns compiled, ready to be run against rows.
#[derive(Debug)]
pub(crate) enum Matcher {
    Equal { path: Vec<String>, value: Value },
    Like { path: Vec<String>, pattern: LikePattern },
    IsNull { path: Vec<String> },
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
    Not(Box<Matcher>),
}

impl Matcher {
    pub(crate) fn matches(&self, row: &Row) -> bool {
        match self {
            Matcher::Equal { path, value } => match resolve(row, path) {
                Value::Null => false,
                found => values_equal(found, value),
            },
            Matcher::Like { path, pattern } => match resolve(row, path) {
                Value::String(text) => pattern.matches(text),
                _ => false,
            },
            Matcher::IsNull { path } => resolve(row, path).is_null(),
            Matcher::And(terms) => terms.iter().all(|term| term.matches(row)),
            Matcher::Or(terms) => terms.iter().any(|term| term.matches(row)),
            Matcher::Not(inner) => !inner.matches(row),
        }
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

static NULL: Value = Value::Null;

fn resolve<'a>(row: &'a Row, path: &[String]) -> &'a Value {
    let Some((first, rest)) = path.split_first() else {
        return &NULL;
    };

    let mut current = row.get(first).unwrap_or(&NULL);
    for segment in rest {
        current = current.get(segment).unwrap_or(&NULL);
    }
    current
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_i64(), r.as_i64()) {
            (Some(l), Some(r)) => l == r,
            _ => l.as_f64() == r.as_f64(),
        },
        _ => left == right,
    }
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(l), Value::Number(r)) => match (l.as_i64(), r.as_i64()) {
            (Some(l), Some(r)) => l.cmp(&r),
            _ => l
                .as_f64()
                .partial_cmp(&r.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(l), Value::String(r)) => l.cmp(r),
        (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
        _ => left.to_string().cmp(&right.to_string()),
    }
}
