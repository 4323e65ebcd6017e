//! Query-string directive compiler: grammar, parser, applier.

pub mod applier;
pub mod grammar;
pub mod parser;
pub mod types;

pub use applier::{QueryBuilder, ResourceQueryApplier};
pub use grammar::{FilterOperator, FilterValue};
pub use parser::{
    parse_request, AllowList, AllowLists, DirectiveDefaults, DirectiveSection, FilterInput,
    QueryDirectiveParser, RawQuery,
};
pub use types::{FilterClause, QueryDirectives, ScopeInvocation, SortDirection, Sorting, LIMIT_MAX};
