//! Backend-neutral filter, sort and page description for collection queries.

use std::{cmp::Ordering, collections::HashMap};

use serde_json::Value as JsonValue;

/// A single filter condition over a record's document fields.
///
/// Missing fields read as `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Eq(String, JsonValue),
    /// Case-insensitive substring match on a string field.
    Like(String, String),
    IsNull(String),
    NotNull(String),
    /// Matches when at least one inner condition does.
    Any(Vec<Expr>),
}

impl Expr {
    pub fn eq(
        key: &str,
        value: impl Into<JsonValue>,
    ) -> Self {
        Expr::Eq(key.to_string(), value.into())
    }

    pub fn like(
        key: &str,
        pattern: &str,
    ) -> Self {
        Expr::Like(key.to_string(), pattern.to_lowercase())
    }

    pub fn is_null(key: &str) -> Self {
        Expr::IsNull(key.to_string())
    }

    pub fn not_null(key: &str) -> Self {
        Expr::NotNull(key.to_string())
    }

    pub fn any(exprs: Vec<Expr>) -> Self {
        Expr::Any(exprs)
    }

    pub fn is_match(
        &self,
        doc: &HashMap<String, JsonValue>,
    ) -> bool {
        let field = |key: &str| doc.get(key).unwrap_or(&JsonValue::Null);
        match self {
            Expr::Eq(key, value) => field(key) == value,
            Expr::Like(key, pattern) => field(key).as_str().is_some_and(|s| s.to_lowercase().contains(pattern.as_str())),
            Expr::IsNull(key) => field(key).is_null(),
            Expr::NotNull(key) => !field(key).is_null(),
            Expr::Any(exprs) => exprs.iter().any(|e| e.is_match(doc)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    filter: Vec<Expr>,
    order_by: Vec<(String, bool)>,
    offset: usize,
    limit: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition; all conditions must match.
    pub fn filter(
        mut self,
        expr: Expr,
    ) -> Self {
        self.filter.push(expr);
        self
    }

    /// Sort keys separated by commas, a leading `-` sorts descending: `"-created,name"`.
    pub fn sort(
        mut self,
        sort: &str,
    ) -> Self {
        for key in sort.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            match key.strip_prefix('-') {
                Some(key) => self.order_by.push((key.to_string(), true)),
                None => self.order_by.push((key.trim_start_matches('+').to_string(), false)),
            }
        }
        self
    }

    /// 1-based page. A `page_size` of 0 returns everything.
    pub fn page(
        mut self,
        page_num: usize,
        page_size: usize,
    ) -> Self {
        self.limit = page_size;
        self.offset = (page_num.max(1) - 1).saturating_mul(page_size);
        self
    }

    pub fn conditions(&self) -> &[Expr] {
        &self.filter
    }

    /// `(key, descending)` pairs in priority order.
    pub fn order_by(&self) -> &Vec<(String, bool)> {
        &self.order_by
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_match(
        &self,
        doc: &HashMap<String, JsonValue>,
    ) -> bool {
        self.filter.iter().all(|e| e.is_match(doc))
    }

    pub fn compare(
        &self,
        a: &HashMap<String, JsonValue>,
        b: &HashMap<String, JsonValue>,
    ) -> Ordering {
        for (key, rev) in self.order_by.iter() {
            let ord = cmp_json(a.get(key).unwrap_or(&JsonValue::Null), b.get(key).unwrap_or(&JsonValue::Null));
            let ord = if *rev { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

fn rank(v: &JsonValue) -> u8 {
    match v {
        JsonValue::Null => 0,
        JsonValue::Bool(_) => 1,
        JsonValue::Number(_) => 2,
        JsonValue::String(_) => 3,
        JsonValue::Array(_) => 4,
        JsonValue::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object.
pub fn cmp_json(
    a: &JsonValue,
    b: &JsonValue,
) -> Ordering {
    match (a, b) {
        (JsonValue::Bool(a), JsonValue::Bool(b)) => a.cmp(b),
        (JsonValue::Number(a), JsonValue::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (JsonValue::String(a), JsonValue::String(b)) => a.cmp(b),
        (JsonValue::Array(a), JsonValue::Array(b)) => a.len().cmp(&b.len()),
        _ => rank(a).cmp(&rank(b)),
    }
}
