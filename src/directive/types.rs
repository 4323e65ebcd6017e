//! Parsed directive values handed from the parser to the applier.

use crate::directive::grammar::{FilterOperator, FilterValue};

pub const LIMIT_MAX: u32 = 1000;
pub const DEFAULT_LIMIT: u32 = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterClause {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeInvocation {
    pub name: String,
    pub args: Vec<String>,
}

impl ScopeInvocation {
    /// `name:arg1:arg2` -> invocation. No allow-list check here.
    pub fn from_token(token: &str) -> Self {
        let mut parts = token.split(':');
        let name = parts.next().unwrap_or_default().to_string();
        ScopeInvocation {
            name,
            args: parts.map(str::to_string).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Insertion-ordered field -> direction map. Re-setting a field keeps its position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sorting(Vec<(String, SortDirection)>);

impl Sorting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: &str, direction: SortDirection) {
        match self.0.iter_mut().find(|(f, _)| f == field) {
            Some(entry) => entry.1 = direction,
            None => self.0.push((field.to_string(), direction)),
        }
    }

    pub fn get(&self, field: &str) -> Option<SortDirection> {
        self.0.iter().find(|(f, _)| f == field).map(|(_, d)| *d)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SortDirection)> {
        self.0.iter().map(|(f, d)| (f.as_str(), *d))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-request directive set. Constructed by the parser; read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryDirectives {
    filters: Vec<FilterClause>,
    relations: Vec<String>,
    scopes: Vec<ScopeInvocation>,
    sorting: Sorting,
    page: u32,
    limit: u32,
}

impl QueryDirectives {
    pub(crate) fn new(
        filters: Vec<FilterClause>,
        relations: Vec<String>,
        scopes: Vec<ScopeInvocation>,
        sorting: Sorting,
        page: u32,
        limit: u32,
    ) -> Self {
        QueryDirectives {
            filters,
            relations,
            scopes,
            sorting,
            page: page.max(1),
            limit: limit.clamp(1, LIMIT_MAX),
        }
    }

    pub fn filters(&self) -> &[FilterClause] {
        &self.filters
    }

    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    pub fn scopes(&self) -> &[ScopeInvocation] {
        &self.scopes
    }

    pub fn sorting(&self) -> &Sorting {
        &self.sorting
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl Default for QueryDirectives {
    fn default() -> Self {
        QueryDirectives::new(
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Sorting::new(),
            1,
            DEFAULT_LIMIT,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorting_overwrite_keeps_position() {
        let mut s = Sorting::new();
        s.set("created_at", SortDirection::Desc);
        s.set("name", SortDirection::Asc);
        s.set("created_at", SortDirection::Asc);
        let order: Vec<_> = s.iter().collect();
        assert_eq!(
            order,
            vec![("created_at", SortDirection::Asc), ("name", SortDirection::Asc)]
        );
    }

    #[test]
    fn scope_token_splits_args() {
        let s = ScopeInvocation::from_token("role:admin:active");
        assert_eq!(s.name, "role");
        assert_eq!(s.args, vec!["admin".to_string(), "active".to_string()]);
        assert!(ScopeInvocation::from_token("published").args.is_empty());
    }

    #[test]
    fn constructor_enforces_bounds() {
        let d = QueryDirectives::new(vec![], vec![], vec![], Sorting::new(), 0, 0);
        assert_eq!(d.page(), 1);
        assert_eq!(d.limit(), 1);
        let d = QueryDirectives::new(vec![], vec![], vec![], Sorting::new(), 3, 9999);
        assert_eq!(d.limit(), LIMIT_MAX);
    }
}
