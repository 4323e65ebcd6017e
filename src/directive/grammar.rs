//! Filter operator table and token syntax.
//!
//! A filter token is `<op>:<value>` or a bare `<value>` (operator `eq`). Only the first
//! `:` separates the operator, so values may themselves contain colons.

use std::fmt;

/// Separator between list values for `in`, `bw` and `nb`.
pub const LIST_SEPARATOR: char = '|';

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    StartsWith,
    EndsWith,
    In,
    NotNull,
    IsNull,
    Between,
    NotBetween,
}

/// How many values an operator consumes from its token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    None,
    Single,
    Multiple,
}

/// Shaped filter value, ready to hand to a query builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterValue {
    None,
    Single(String),
    List(Vec<String>),
}

pub const DEFAULT_OPERATOR: FilterOperator = FilterOperator::Eq;

impl FilterOperator {
    pub const ALL: [FilterOperator; 14] = [
        FilterOperator::Eq,
        FilterOperator::Ne,
        FilterOperator::Gt,
        FilterOperator::Ge,
        FilterOperator::Lt,
        FilterOperator::Le,
        FilterOperator::Contains,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::In,
        FilterOperator::NotNull,
        FilterOperator::IsNull,
        FilterOperator::Between,
        FilterOperator::NotBetween,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    pub fn code(self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Ge => "ge",
            FilterOperator::Lt => "lt",
            FilterOperator::Le => "le",
            FilterOperator::Contains => "ct",
            FilterOperator::StartsWith => "sw",
            FilterOperator::EndsWith => "ew",
            FilterOperator::In => "in",
            FilterOperator::NotNull => "nn",
            FilterOperator::IsNull => "nl",
            FilterOperator::Between => "bw",
            FilterOperator::NotBetween => "nb",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            FilterOperator::NotNull | FilterOperator::IsNull => Arity::None,
            FilterOperator::In | FilterOperator::Between | FilterOperator::NotBetween => {
                Arity::Multiple
            }
            _ => Arity::Single,
        }
    }

    /// SQL-style comparison for single-value operators.
    pub fn comparison(self) -> Option<&'static str> {
        match self {
            FilterOperator::Eq => Some("="),
            FilterOperator::Ne => Some("!="),
            FilterOperator::Gt => Some(">"),
            FilterOperator::Ge => Some(">="),
            FilterOperator::Lt => Some("<"),
            FilterOperator::Le => Some("<="),
            FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith => {
                Some("LIKE")
            }
            _ => None,
        }
    }

    /// Number of list values the operator requires, when fixed.
    pub fn required_values(self) -> Option<usize> {
        match self {
            FilterOperator::Between | FilterOperator::NotBetween => Some(2),
            _ => None,
        }
    }

    /// Shape a raw token value according to this operator.
    pub fn shape_value(self, raw: &str) -> FilterValue {
        match self {
            FilterOperator::Contains => FilterValue::Single(format!("%{}%", raw)),
            FilterOperator::StartsWith => FilterValue::Single(format!("{}%", raw)),
            FilterOperator::EndsWith => FilterValue::Single(format!("%{}", raw)),
            _ => match self.arity() {
                Arity::None => FilterValue::None,
                Arity::Single => FilterValue::Single(raw.to_string()),
                Arity::Multiple => FilterValue::List(
                    raw.split(LIST_SEPARATOR).map(str::to_string).collect(),
                ),
            },
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Split a filter token into (operator code, value). `None` means the default operator.
pub fn split_filter_token(token: &str) -> (Option<&str>, &str) {
    match token.split_once(':') {
        Some(("", value)) => (None, value),
        Some((op, value)) => (Some(op), value),
        None => (None, token),
    }
}

/// Split a comma-separated directive value, ignoring surrounding whitespace/commas and empty segments.
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .trim()
        .trim_matches(',')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_round_trips_through_the_table() {
        for op in FilterOperator::ALL {
            assert_eq!(FilterOperator::from_code(op.code()), Some(op));
        }
        assert_eq!(FilterOperator::from_code("xx"), None);
        assert_eq!(FilterOperator::from_code("EQ"), None);
    }

    #[test]
    fn pattern_operators_wrap_value() {
        assert_eq!(
            FilterOperator::Contains.shape_value("bob"),
            FilterValue::Single("%bob%".into())
        );
        assert_eq!(
            FilterOperator::StartsWith.shape_value("bob"),
            FilterValue::Single("bob%".into())
        );
        assert_eq!(
            FilterOperator::EndsWith.shape_value("bob"),
            FilterValue::Single("%bob".into())
        );
    }

    #[test]
    fn list_and_null_operators() {
        assert_eq!(
            FilterOperator::In.shape_value("a|b|c"),
            FilterValue::List(vec!["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(FilterOperator::NotNull.shape_value("ignored"), FilterValue::None);
        assert_eq!(FilterOperator::IsNull.shape_value(""), FilterValue::None);
    }

    #[test]
    fn token_splits_on_first_colon_only() {
        assert_eq!(split_filter_token("gt:18"), (Some("gt"), "18"));
        assert_eq!(split_filter_token("bob"), (None, "bob"));
        assert_eq!(split_filter_token(":bob"), (None, "bob"));
        assert_eq!(split_filter_token("eq:10:30"), (Some("eq"), "10:30"));
    }

    #[test]
    fn list_splitting_trims_commas() {
        let parts: Vec<&str> = split_list(" ,a,b,,c, ").collect();
        assert_eq!(parts, vec!["a", "b", "c"]);
        assert_eq!(split_list("").count(), 0);
    }
}
