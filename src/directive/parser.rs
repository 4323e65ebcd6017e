//! Query-string directives -> validated `QueryDirectives`.
//!
//! Every field, relation and scope name is checked against the resource's allow-lists
//! before it is accepted. The first bad directive aborts the whole parse.

use crate::directive::grammar::{split_filter_token, split_list, FilterOperator, FilterValue, DEFAULT_OPERATOR};
use crate::directive::types::{
    FilterClause, QueryDirectives, ScopeInvocation, SortDirection, Sorting, DEFAULT_LIMIT, LIMIT_MAX,
};
use crate::error::ApiError;
use std::collections::BTreeSet;
use std::fmt;

/// Token that expands to the configured defaults in `include` and `scope`.
pub const WILDCARD: &str = "*";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllowList {
    AllowAny,
    AllowSet(BTreeSet<String>),
}

impl AllowList {
    pub fn none() -> Self {
        AllowList::AllowSet(BTreeSet::new())
    }

    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AllowList::AllowSet(names.into_iter().map(Into::into).collect())
    }

    pub fn permits(&self, name: &str) -> bool {
        match self {
            AllowList::AllowAny => true,
            AllowList::AllowSet(set) => set.contains(name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectiveSection {
    Filters,
    Relations,
    Scopes,
}

impl fmt::Display for DirectiveSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DirectiveSection::Filters => "filters",
            DirectiveSection::Relations => "relations",
            DirectiveSection::Scopes => "scopes",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowLists {
    pub filters: AllowList,
    pub relations: AllowList,
    pub scopes: AllowList,
}

impl AllowLists {
    pub fn any() -> Self {
        AllowLists {
            filters: AllowList::AllowAny,
            relations: AllowList::AllowAny,
            scopes: AllowList::AllowAny,
        }
    }

    pub fn section(&self, section: DirectiveSection) -> &AllowList {
        match section {
            DirectiveSection::Filters => &self.filters,
            DirectiveSection::Relations => &self.relations,
            DirectiveSection::Scopes => &self.scopes,
        }
    }
}

/// Values used when a request omits a section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectiveDefaults {
    pub relations: Vec<String>,
    pub scopes: Vec<ScopeInvocation>,
    pub sorting: Sorting,
    pub limit: u32,
    /// Resource ceiling for `limit`; never above `LIMIT_MAX`.
    pub max_limit: u32,
}

impl Default for DirectiveDefaults {
    fn default() -> Self {
        DirectiveDefaults {
            relations: Vec::new(),
            scopes: Vec::new(),
            sorting: Sorting::new(),
            limit: DEFAULT_LIMIT,
            max_limit: LIMIT_MAX,
        }
    }
}

impl DirectiveDefaults {
    pub fn limit_ceiling(&self) -> u32 {
        self.max_limit.clamp(1, LIMIT_MAX)
    }
}

/// Raw `filter` input: `filter[field]=token` pairs, or a scalar (which is rejected).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterInput {
    Mapping(Vec<(String, String)>),
    Scalar(String),
}

impl FilterInput {
    fn set(&mut self, field: String, token: String) {
        match self {
            FilterInput::Mapping(entries) => match entries.iter_mut().find(|(f, _)| *f == field) {
                Some(entry) => entry.1 = token,
                None => entries.push((field, token)),
            },
            FilterInput::Scalar(_) => *self = FilterInput::Mapping(vec![(field, token)]),
        }
    }
}

/// Untrusted query-string values, one slot per directive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawQuery {
    pub filter: Option<FilterInput>,
    pub include: Option<String>,
    pub scope: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl RawQuery {
    /// Collect decoded query pairs. `f` is an alias for `filter`; `filter` wins when both appear.
    /// Unknown keys are ignored; a repeated key keeps its last value.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut raw = RawQuery::default();
        let mut short_filter: Option<FilterInput> = None;
        for (key, value) in pairs {
            match key.as_str() {
                "filter" => raw.filter = Some(FilterInput::Scalar(value)),
                "f" => short_filter = Some(FilterInput::Scalar(value)),
                "include" => raw.include = Some(value),
                "scope" => raw.scope = Some(value),
                "sort" => raw.sort = Some(value),
                "page" => raw.page = Some(value),
                "limit" => raw.limit = Some(value),
                _ => {
                    if let Some(field) = bracketed(&key, "filter") {
                        push_filter(&mut raw.filter, field, value);
                    } else if let Some(field) = bracketed(&key, "f") {
                        push_filter(&mut short_filter, field, value);
                    }
                }
            }
        }
        if raw.filter.is_none() {
            raw.filter = short_filter;
        }
        raw
    }
}

fn bracketed<'k>(key: &'k str, name: &str) -> Option<&'k str> {
    key.strip_prefix(name)?.strip_prefix('[')?.strip_suffix(']')
}

fn push_filter(slot: &mut Option<FilterInput>, field: &str, token: String) {
    slot.get_or_insert_with(|| FilterInput::Mapping(Vec::new()))
        .set(field.to_string(), token);
}

/// Parses one request's directives against a resource's defaults and allow-lists.
pub struct QueryDirectiveParser<'a> {
    defaults: &'a DirectiveDefaults,
    allowed: &'a AllowLists,
}

impl<'a> QueryDirectiveParser<'a> {
    pub fn new(defaults: &'a DirectiveDefaults, allowed: &'a AllowLists) -> Self {
        QueryDirectiveParser { defaults, allowed }
    }

    pub fn parse_request(&self, raw: &RawQuery) -> Result<QueryDirectives, ApiError> {
        let filters = match &raw.filter {
            Some(input) => self.parse_filters(input)?,
            None => Vec::new(),
        };
        let relations = match raw.include.as_deref() {
            Some(value) => self.parse_relations(value)?,
            None => self.defaults.relations.clone(),
        };
        let scopes = match raw.scope.as_deref() {
            Some(value) => self.parse_scopes(value)?,
            None => self.defaults.scopes.clone(),
        };
        let sorting = match raw.sort.as_deref() {
            Some(value) => parse_sorting(value),
            None => self.defaults.sorting.clone(),
        };
        let page = match raw.page.as_deref() {
            Some(value) => parse_page(value)?,
            None => 1,
        };
        let limit = match raw.limit.as_deref() {
            Some(value) => self.parse_limit(value)?,
            None => self.defaults.limit.clamp(1, self.defaults.limit_ceiling()),
        };
        tracing::debug!(
            filters = filters.len(),
            relations = ?relations,
            scopes = scopes.len(),
            page,
            limit,
            "parsed directives"
        );
        Ok(QueryDirectives::new(filters, relations, scopes, sorting, page, limit))
    }

    pub fn parse_filters(&self, input: &FilterInput) -> Result<Vec<FilterClause>, ApiError> {
        let entries = match input {
            FilterInput::Mapping(entries) => entries,
            FilterInput::Scalar(_) => {
                return Err(ApiError::invalid_directive("filter must be a mapping"));
            }
        };
        let mut clauses = Vec::with_capacity(entries.len());
        for (field, token) in entries {
            self.allow(DirectiveSection::Filters, field)?;
            let (code, raw_value) = split_filter_token(token);
            let operator = match code {
                None => DEFAULT_OPERATOR,
                Some(code) => FilterOperator::from_code(code).ok_or_else(|| {
                    ApiError::invalid_directive(format!("unknown filter operator: {}", code))
                })?,
            };
            let value = operator.shape_value(raw_value);
            if let (Some(expected), FilterValue::List(values)) = (operator.required_values(), &value) {
                if values.len() != expected {
                    return Err(ApiError::invalid_directive(format!(
                        "filter {} on '{}' expects {} values, got {}",
                        operator,
                        field,
                        expected,
                        values.len()
                    )));
                }
            }
            clauses.push(FilterClause {
                field: field.clone(),
                operator,
                value,
            });
        }
        Ok(clauses)
    }

    pub fn parse_relations(&self, value: &str) -> Result<Vec<String>, ApiError> {
        let mut relations = Vec::new();
        for token in split_list(value) {
            if token == WILDCARD {
                relations.extend(self.defaults.relations.iter().cloned());
            } else {
                self.allow(DirectiveSection::Relations, token)?;
                relations.push(token.to_string());
            }
        }
        Ok(relations)
    }

    pub fn parse_scopes(&self, value: &str) -> Result<Vec<ScopeInvocation>, ApiError> {
        let mut scopes = Vec::new();
        for token in split_list(value) {
            if token == WILDCARD {
                scopes.extend(self.defaults.scopes.iter().cloned());
                continue;
            }
            let invocation = ScopeInvocation::from_token(token);
            self.allow(DirectiveSection::Scopes, &invocation.name)?;
            scopes.push(invocation);
        }
        Ok(scopes)
    }

    pub fn parse_limit(&self, value: &str) -> Result<u32, ApiError> {
        let n = parse_int("limit", value)?;
        Ok(n.clamp(1, i64::from(self.defaults.limit_ceiling())) as u32)
    }

    /// Allow-list gate. Runs before any name reaches the storage layer.
    pub fn allow(&self, section: DirectiveSection, name: &str) -> Result<(), ApiError> {
        if self.allowed.section(section).permits(name) {
            Ok(())
        } else {
            Err(ApiError::invalid_directive(format!("{}:{} not allowed", section, name)))
        }
    }
}

/// `a,-b` -> a ASC, b DESC. A later occurrence overwrites the direction in place.
pub fn parse_sorting(value: &str) -> Sorting {
    let mut sorting = Sorting::new();
    for token in split_list(value) {
        let (field, direction) = match token.strip_prefix('-') {
            Some(field) => (field, SortDirection::Desc),
            None => (token, SortDirection::Asc),
        };
        if !field.is_empty() {
            sorting.set(field, direction);
        }
    }
    sorting
}

/// Scope list without allow-list checks; used for server-side defaults.
pub fn parse_scope_list(value: &str) -> Vec<ScopeInvocation> {
    split_list(value).map(ScopeInvocation::from_token).collect()
}

pub fn parse_page(value: &str) -> Result<u32, ApiError> {
    let n = parse_int("page", value)?;
    Ok(n.clamp(1, i64::from(u32::MAX)) as u32)
}

fn parse_int(name: &str, value: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ApiError::invalid_directive(format!("{} must be an integer", name)))
}

/// Parse with the given defaults and allow-lists.
pub fn parse_request(
    raw: &RawQuery,
    defaults: &DirectiveDefaults,
    allowed: &AllowLists,
) -> Result<QueryDirectives, ApiError> {
    QueryDirectiveParser::new(defaults, allowed).parse_request(raw)
}
