//! Applies parsed directives to a storage query, in a fixed order.

use crate::directive::grammar::{FilterOperator, FilterValue};
use crate::directive::types::{QueryDirectives, SortDirection};
use crate::error::ApiError;
use crate::store::{Page, Storage};

/// Mutable query handle driven by the applier. Names reaching it have already passed the allow-lists.
pub trait QueryBuilder {
    /// Eager-load the given relations.
    fn with_relations(&mut self, relations: &[String]) -> Result<(), ApiError>;

    /// Invoke a named scope with positional arguments.
    fn scope(&mut self, name: &str, args: &[String]) -> Result<(), ApiError>;

    fn order_by(&mut self, field: &str, direction: SortDirection) -> Result<(), ApiError>;

    /// One predicate. List operators receive the whole list; null checks receive `FilterValue::None`.
    fn filter(
        &mut self,
        field: &str,
        operator: FilterOperator,
        value: &FilterValue,
    ) -> Result<(), ApiError>;

    fn limit(&mut self, limit: u32);
}

/// Order: relations -> scopes -> sorting -> filters -> (optional) limit.
pub struct ResourceQueryApplier<'a> {
    directives: &'a QueryDirectives,
}

impl<'a> ResourceQueryApplier<'a> {
    pub fn new(directives: &'a QueryDirectives) -> Self {
        ResourceQueryApplier { directives }
    }

    pub fn apply_relations<Q: QueryBuilder>(&self, query: &mut Q) -> Result<(), ApiError> {
        let relations = self.directives.relations();
        if relations.is_empty() {
            return Ok(());
        }
        query.with_relations(relations)
    }

    pub fn apply_scopes<Q: QueryBuilder>(&self, query: &mut Q) -> Result<(), ApiError> {
        for invocation in self.directives.scopes() {
            query.scope(&invocation.name, &invocation.args)?;
        }
        Ok(())
    }

    pub fn apply_sorting<Q: QueryBuilder>(&self, query: &mut Q) -> Result<(), ApiError> {
        for (field, direction) in self.directives.sorting().iter() {
            query.order_by(field, direction)?;
        }
        Ok(())
    }

    pub fn apply_filters<Q: QueryBuilder>(&self, query: &mut Q) -> Result<(), ApiError> {
        for clause in self.directives.filters() {
            query.filter(&clause.field, clause.operator, &clause.value)?;
        }
        Ok(())
    }

    pub fn apply_limit<Q: QueryBuilder>(&self, query: &mut Q) {
        query.limit(self.directives.limit());
    }

    /// Everything the list flow applies before its hook: relations, scopes, sorting, filters.
    pub fn apply<Q: QueryBuilder>(&self, query: &mut Q) -> Result<(), ApiError> {
        self.apply_relations(query)?;
        self.apply_scopes(query)?;
        self.apply_sorting(query)?;
        self.apply_filters(query)
    }

    /// Run the query as one page using the directive's page and limit.
    pub async fn make_paginator<S: Storage>(
        &self,
        storage: &S,
        query: S::Query,
    ) -> Result<Page, ApiError> {
        storage
            .paginate(query, self.directives.page(), self.directives.limit())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::parser::{parse_request, AllowLists, DirectiveDefaults, RawQuery};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl QueryBuilder for Recorder {
        fn with_relations(&mut self, relations: &[String]) -> Result<(), ApiError> {
            self.calls.push(format!("with:{}", relations.join(",")));
            Ok(())
        }

        fn scope(&mut self, name: &str, args: &[String]) -> Result<(), ApiError> {
            self.calls.push(format!("scope:{}({})", name, args.join(",")));
            Ok(())
        }

        fn order_by(&mut self, field: &str, direction: SortDirection) -> Result<(), ApiError> {
            self.calls.push(format!("order:{}:{}", field, direction.as_sql()));
            Ok(())
        }

        fn filter(
            &mut self,
            field: &str,
            operator: FilterOperator,
            value: &FilterValue,
        ) -> Result<(), ApiError> {
            self.calls.push(format!("filter:{}:{}:{:?}", field, operator, value));
            Ok(())
        }

        fn limit(&mut self, limit: u32) {
            self.calls.push(format!("limit:{}", limit));
        }
    }

    fn directives(items: &[(&str, &str)]) -> QueryDirectives {
        let raw = RawQuery::from_pairs(items.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        parse_request(&raw, &DirectiveDefaults::default(), &AllowLists::any()).unwrap()
    }

    #[test]
    fn applies_in_fixed_order_regardless_of_query_order() {
        let d = directives(&[
            ("filter[age]", "nn:"),
            ("sort", "-id"),
            ("scope", "active,role:admin:x"),
            ("include", "author"),
        ]);
        let mut q = Recorder::default();
        ResourceQueryApplier::new(&d).apply(&mut q).unwrap();
        assert_eq!(
            q.calls,
            vec![
                "with:author",
                "scope:active()",
                "scope:role(admin,x)",
                "order:id:DESC",
                "filter:age:nn:None",
            ]
        );
    }

    #[test]
    fn list_operators_pass_one_argument() {
        let d = directives(&[("filter[id]", "in:1|2|3")]);
        let mut q = Recorder::default();
        ResourceQueryApplier::new(&d).apply_filters(&mut q).unwrap();
        assert_eq!(
            q.calls,
            vec![r#"filter:id:in:List(["1", "2", "3"])"#]
        );
    }

    #[test]
    fn empty_directives_touch_nothing_but_limit() {
        let d = directives(&[("limit", "7")]);
        let mut q = Recorder::default();
        let applier = ResourceQueryApplier::new(&d);
        applier.apply(&mut q).unwrap();
        applier.apply_limit(&mut q);
        assert_eq!(q.calls, vec!["limit:7"]);
    }
}
