//! Tag filter → `readAll(...)` query builder

use super::{AxonQuery, QueryError, QueryResult};

/// Value side of one tag filter entry
///
/// The kind decides how the clause is written. `Auto` leaves the decision
/// to the tag name (see [`TagFilter::to_query`]).
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// `true` tests for presence of the tag, `false` for its absence
    Marker(bool),
    /// Reference equality, written `tag==@value`
    Ref(String),
    /// String equality, written `tag=="value"`
    Str(String),
    /// Numeric equality, written `tag==value`
    Number(String),
    /// Kind inferred from the tag name
    Auto(String),
}

impl From<bool> for FilterValue {
    fn from(marker: bool) -> Self {
        FilterValue::Marker(marker)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Auto(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Auto(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Number(value.to_string())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Number(value.to_string())
    }
}

/// Tags matched by `==` against a bare number when given as `Auto`
const NUMERIC_TAGS: &[&str] = &["combustionVolume", "area", "floors", "yearBuilt"];

/// Tags matched by `==` against a quoted string when given as `Auto`
const STRING_TAGS: &[&str] = &["dis", "navName", "link", "unit", "tz"];

/// Ordered tag filter
///
/// Entries serialize in insertion order. Re-adding a tag adds a second
/// clause; nothing is deduplicated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagFilter {
    entries: Vec<(String, FilterValue)>,
}

impl TagFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add an entry
    pub fn with(mut self, tag: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.push(tag, value);
        self
    }

    /// Builder method: require a marker tag
    pub fn marker(self, tag: impl Into<String>) -> Self {
        self.with(tag, true)
    }

    /// Builder method: exclude a marker tag
    pub fn without(self, tag: impl Into<String>) -> Self {
        self.with(tag, false)
    }

    pub fn push(&mut self, tag: impl Into<String>, value: impl Into<FilterValue>) {
        self.entries.push((tag.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(tag, value)| (tag.as_str(), value))
    }

    /// The `and`-joined predicate, without the `readAll(...)` wrapper
    pub fn predicate(&self) -> QueryResult<String> {
        let clauses = self
            .entries
            .iter()
            .map(|(tag, value)| clause(tag, value))
            .collect::<QueryResult<Vec<_>>>()?;

        Ok(clauses.join(" and "))
    }

    /// Build `readAll(<predicate>)`
    ///
    /// `Auto` values are classified by tag name, first rule wins:
    /// a name containing `id` or `siteRef` (or ending in `Ref`) is a
    /// reference; a name containing `link` or `navName`, or a known display
    /// tag, is a quoted string; a name containing `combustionVolume`, or a
    /// known numeric tag, is a bare number. Anything else is rejected with
    /// [`QueryError::UnclassifiedTag`].
    ///
    /// An empty filter yields `readAll()`, which the server may reject.
    pub fn to_query(&self) -> QueryResult<AxonQuery> {
        Ok(AxonQuery::new(format!("readAll({})", self.predicate()?)))
    }
}

impl<K, V> FromIterator<(K, V)> for TagFilter
where
    K: Into<String>,
    V: Into<FilterValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filter = TagFilter::new();
        for (tag, value) in iter {
            filter.push(tag, value);
        }
        filter
    }
}

fn clause(tag: &str, value: &FilterValue) -> QueryResult<String> {
    if tag.is_empty() || tag.chars().any(char::is_whitespace) {
        return Err(QueryError::InvalidTag(tag.to_string()));
    }

    let clause = match value {
        FilterValue::Marker(true) => tag.to_string(),
        FilterValue::Marker(false) => format!("not {}", tag),
        FilterValue::Ref(id) => ref_clause(tag, id),
        FilterValue::Str(s) => str_clause(tag, s),
        FilterValue::Number(n) => format!("{}=={}", tag, n),
        FilterValue::Auto(v) => {
            if is_ref_tag(tag) {
                ref_clause(tag, v)
            } else if is_string_tag(tag) {
                str_clause(tag, v)
            } else if is_numeric_tag(tag) {
                format!("{}=={}", tag, v)
            } else {
                return Err(QueryError::UnclassifiedTag {
                    tag: tag.to_string(),
                    value: v.clone(),
                });
            }
        }
    };

    Ok(clause)
}

fn ref_clause(tag: &str, id: &str) -> String {
    format!("{}==@{}", tag, id.strip_prefix('@').unwrap_or(id))
}

fn str_clause(tag: &str, s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{}==\"{}\"", tag, escaped)
}

fn is_ref_tag(tag: &str) -> bool {
    tag.contains("id") || tag.contains("siteRef") || tag.ends_with("Ref")
}

fn is_string_tag(tag: &str) -> bool {
    tag.contains("link") || tag.contains("navName") || STRING_TAGS.contains(&tag)
}

fn is_numeric_tag(tag: &str) -> bool {
    tag.contains("combustionVolume") || NUMERIC_TAGS.contains(&tag)
}
