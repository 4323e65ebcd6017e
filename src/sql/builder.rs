//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a model binding.
//! Identifiers come from config only; values are always bound as parameters.

use crate::config::{ColumnInfo, IncludeSpec, ModelBinding, RelationKind};
use crate::directive::types::LIMIT_MAX;
use crate::directive::{FilterOperator, FilterValue, QueryBuilder, SortDirection};
use crate::error::ApiError;
use crate::sql::params::PgBindValue;
use serde_json::{Map, Value};
use std::sync::Arc;

const MAIN_ALIAS: &str = "main";

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quoted(schema), quoted(table)),
        None => quoted(table),
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        Self::default()
    }

    fn push_param(&mut self, v: PgBindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }

    fn push_cast(&mut self, v: PgBindValue, column: &ColumnInfo) -> String {
        let n = self.push_param(v);
        format!("${}::{}", n, column.pg_type)
    }
}

/// Custom enums (schema.typename) and numeric are read back as text.
fn column_expr(prefix: Option<&str>, c: &ColumnInfo) -> String {
    let q = match prefix {
        Some(p) => format!("{}.{}", p, quoted(&c.name)),
        None => quoted(&c.name),
    };
    if c.pg_type.contains('.') || c.pg_type.starts_with("numeric") {
        format!("{}::text AS {}", q, quoted(&c.name))
    } else if prefix.is_some() {
        format!("{} AS {}", q, quoted(&c.name))
    } else {
        q
    }
}

fn select_column_list(columns: &[ColumnInfo], prefix: Option<&str>) -> String {
    columns
        .iter()
        .map(|c| column_expr(prefix, c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Scalar subquery loading one relation for the current main row.
fn include_subquery(inc: &IncludeSpec) -> String {
    let rel_table = qualified_table(inc.related_schema.as_deref(), &inc.related_table);
    let rel_cols = select_column_list(&inc.related_columns, None);
    let sub_from = format!(
        "{} WHERE {} = {}.{}",
        rel_table,
        quoted(&inc.their_key_column),
        MAIN_ALIAS,
        quoted(&inc.our_key_column)
    );
    match inc.kind {
        RelationKind::ToOne => format!(
            "(SELECT row_to_json(sub) FROM (SELECT {} FROM {} LIMIT 1) sub)",
            rel_cols, sub_from
        ),
        RelationKind::ToMany => format!(
            "(SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json) FROM (SELECT {} FROM {}) sub)",
            rel_cols, sub_from
        ),
    }
}

/// Replace each `?` with the next positional parameter.
fn number_placeholders(condition: &str, q: &mut QueryBuf, args: &[String]) -> String {
    let mut out = String::with_capacity(condition.len() + args.len() * 2);
    let mut args = args.iter();
    for ch in condition.chars() {
        if ch == '?' {
            if let Some(arg) = args.next() {
                let n = q.push_param(PgBindValue::text(arg.as_str()));
                out.push_str(&format!("${}", n));
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Query over one model, shaped by the directive applier and run by `PgStore`.
#[derive(Clone, Debug)]
pub struct SqlQuery {
    model: Arc<ModelBinding>,
    includes: Vec<String>,
    conditions: Vec<String>,
    params: Vec<PgBindValue>,
    order: Vec<String>,
    limit: Option<u32>,
}

impl SqlQuery {
    pub fn new(model: Arc<ModelBinding>) -> Self {
        SqlQuery {
            model,
            includes: Vec::new(),
            conditions: Vec::new(),
            params: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn model(&self) -> &ModelBinding {
        &self.model
    }

    /// Row cap set through `QueryBuilder::limit`, if any.
    pub fn row_limit(&self) -> Option<u32> {
        self.limit
    }

    /// Column a directive may sort or filter on. Hidden columns are never addressable.
    fn column(&self, field: &str) -> Result<&ColumnInfo, ApiError> {
        self.model
            .column(field)
            .filter(|c| !self.model.hidden.contains(&c.name))
            .ok_or_else(|| ApiError::invalid_directive(format!("unknown field: {}", field)))
    }

    /// Add a raw condition; `?` placeholders bind `args` in order.
    pub fn where_raw(&mut self, condition: &str, args: &[String]) -> Result<(), ApiError> {
        let expected = condition.matches('?').count();
        if expected != args.len() {
            return Err(ApiError::invalid_directive(format!(
                "expected {} argument(s), got {}",
                expected,
                args.len()
            )));
        }
        let mut buf = QueryBuf {
            sql: String::new(),
            params: std::mem::take(&mut self.params),
        };
        let condition = number_placeholders(condition, &mut buf, args);
        self.params = buf.params;
        self.conditions.push(format!("({})", condition));
        Ok(())
    }

    fn from_clause(&self) -> String {
        format!(
            "{} {}",
            qualified_table(self.model.schema_name.as_deref(), &self.model.table_name),
            MAIN_ALIAS
        )
    }

    fn select_list(&self) -> String {
        let mut parts = vec![select_column_list(&self.model.columns, Some(MAIN_ALIAS))];
        for name in &self.includes {
            if let Some(inc) = self.model.include(name) {
                parts.push(format!("{} AS {}", include_subquery(inc), quoted(&inc.name)));
            }
        }
        parts.join(", ")
    }

    fn where_clause(conditions: &[String]) -> String {
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }

    fn order_clause(&self) -> String {
        if self.order.is_empty() {
            format!(" ORDER BY {}.{}", MAIN_ALIAS, quoted(&self.model.primary_key))
        } else {
            format!(" ORDER BY {}", self.order.join(", "))
        }
    }

    /// One page: LIMIT `limit`, OFFSET `(page - 1) * limit`.
    pub fn select_page(&self, page: u32, limit: u32) -> QueryBuf {
        let limit = limit.clamp(1, LIMIT_MAX);
        let offset = u64::from(page.max(1) - 1) * u64::from(limit);
        QueryBuf {
            sql: format!(
                "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
                self.select_list(),
                self.from_clause(),
                Self::where_clause(&self.conditions),
                self.order_clause(),
                limit,
                offset
            ),
            params: self.params.clone(),
        }
    }

    pub fn count(&self) -> QueryBuf {
        QueryBuf {
            sql: format!(
                "SELECT COUNT(*) FROM {}{}",
                self.from_clause(),
                Self::where_clause(&self.conditions)
            ),
            params: self.params.clone(),
        }
    }

    /// The current query narrowed to one primary key.
    pub fn select_by_id(&self, id: &Value) -> Result<QueryBuf, ApiError> {
        let pk = self
            .model
            .column(&self.model.primary_key)
            .ok_or_else(|| ApiError::Storage(format!("{}: primary key column missing", self.model.name)))?;
        let mut q = QueryBuf {
            sql: String::new(),
            params: self.params.clone(),
        };
        let ph = q.push_cast(PgBindValue::from_json(id), pk);
        let mut conditions = self.conditions.clone();
        conditions.push(format!("{}.{} = {}", MAIN_ALIAS, quoted(&pk.name), ph));
        q.sql = format!(
            "SELECT {} FROM {}{} LIMIT 1",
            self.select_list(),
            self.from_clause(),
            Self::where_clause(&conditions)
        );
        Ok(q)
    }
}

impl QueryBuilder for SqlQuery {
    fn with_relations(&mut self, relations: &[String]) -> Result<(), ApiError> {
        for name in relations {
            if self.model.include(name).is_none() {
                return Err(ApiError::invalid_directive(format!("unknown relation: {}", name)));
            }
            self.includes.push(name.clone());
        }
        Ok(())
    }

    fn scope(&mut self, name: &str, args: &[String]) -> Result<(), ApiError> {
        let condition = self
            .model
            .scopes
            .get(name)
            .map(|s| s.condition.clone())
            .ok_or_else(|| ApiError::invalid_directive(format!("unknown scope: {}", name)))?;
        self.where_raw(&condition, args)
            .map_err(|e| ApiError::invalid_directive(format!("scope {}: {}", name, e)))
    }

    fn order_by(&mut self, field: &str, direction: SortDirection) -> Result<(), ApiError> {
        let column = self.column(field)?;
        let expr = format!("{}.{} {}", MAIN_ALIAS, quoted(&column.name), direction.as_sql());
        self.order.push(expr);
        Ok(())
    }

    fn filter(
        &mut self,
        field: &str,
        operator: FilterOperator,
        value: &FilterValue,
    ) -> Result<(), ApiError> {
        let column = self.column(field)?.clone();
        let target = format!("{}.{}", MAIN_ALIAS, quoted(&column.name));
        let mut buf = QueryBuf {
            sql: String::new(),
            params: std::mem::take(&mut self.params),
        };
        let condition = match (operator, value) {
            (FilterOperator::NotNull, _) => Ok(format!("{} IS NOT NULL", target)),
            (FilterOperator::IsNull, _) => Ok(format!("{} IS NULL", target)),
            (
                FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith,
                FilterValue::Single(v),
            ) => {
                let n = buf.push_param(PgBindValue::text(v.as_str()));
                Ok(format!("{}::text LIKE ${}", target, n))
            }
            (FilterOperator::In, FilterValue::List(items)) => {
                let n = buf.push_param(PgBindValue::TextArray(items.clone()));
                Ok(format!("{} = ANY(${}::{}[])", target, n, column.pg_type))
            }
            (FilterOperator::Between | FilterOperator::NotBetween, FilterValue::List(items))
                if items.len() == 2 =>
            {
                let low = buf.push_cast(PgBindValue::text(items[0].as_str()), &column);
                let high = buf.push_cast(PgBindValue::text(items[1].as_str()), &column);
                let keyword = if operator == FilterOperator::Between {
                    "BETWEEN"
                } else {
                    "NOT BETWEEN"
                };
                Ok(format!("{} {} {} AND {}", target, keyword, low, high))
            }
            (op, FilterValue::Single(v)) => match op.comparison() {
                Some(cmp) => {
                    let ph = buf.push_cast(PgBindValue::text(v.as_str()), &column);
                    Ok(format!("{} {} {}", target, cmp, ph))
                }
                None => Err(op),
            },
            (op, _) => Err(op),
        };
        self.params = buf.params;
        let condition = condition.map_err(|op| {
            ApiError::invalid_directive(format!("malformed value for {}:{}", field, op))
        })?;
        self.conditions.push(condition);
        Ok(())
    }

    fn limit(&mut self, limit: u32) {
        self.limit = Some(limit);
    }
}

fn returning_list(model: &ModelBinding) -> String {
    select_column_list(&model.columns, None)
}

/// INSERT the given attributes. Columns with a DB default are omitted when not provided.
pub fn insert(model: &ModelBinding, attributes: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(model.schema_name.as_deref(), &model.table_name);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &model.columns {
        let val = match attributes.get(&c.name) {
            Some(v) => v,
            None => continue,
        };
        cols.push(quoted(&c.name));
        placeholders.push(q.push_cast(PgBindValue::from_json(val), c));
    }
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning_list(model))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning_list(model)
        )
    };
    q
}

/// UPDATE by id: SET only known, non-key columns present in `changes`.
/// With nothing to set this degrades to a plain SELECT of the row.
pub fn update(model: &ModelBinding, id: &Value, changes: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(model.schema_name.as_deref(), &model.table_name);
    let mut sets = Vec::new();
    for c in &model.columns {
        if c.name == model.primary_key {
            continue;
        }
        if let Some(v) = changes.get(&c.name) {
            let ph = q.push_cast(PgBindValue::from_json(v), c);
            sets.push(format!("{} = {}", quoted(&c.name), ph));
        }
    }
    let pk_cast = model
        .column(&model.primary_key)
        .map(|c| c.pg_type.clone())
        .unwrap_or_else(|| "text".into());
    let id_param = q.push_param(PgBindValue::from_json(id));
    q.sql = if sets.is_empty() {
        format!(
            "SELECT {} FROM {} WHERE {} = ${}::{}",
            returning_list(model),
            table,
            quoted(&model.primary_key),
            id_param,
            pk_cast
        )
    } else {
        format!(
            "UPDATE {} SET {} WHERE {} = ${}::{} RETURNING {}",
            table,
            sets.join(", "),
            quoted(&model.primary_key),
            id_param,
            pk_cast,
            returning_list(model)
        )
    };
    q
}

/// DELETE by id; the caller checks the affected row count.
pub fn delete(model: &ModelBinding, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(model.schema_name.as_deref(), &model.table_name);
    let pk_cast = model
        .column(&model.primary_key)
        .map(|c| c.pg_type.clone())
        .unwrap_or_else(|| "text".into());
    let n = q.push_param(PgBindValue::from_json(id));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${}::{}",
        table,
        quoted(&model.primary_key),
        n,
        pk_cast
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{build_registry, load_from_str};
    use serde_json::json;

    fn post_model() -> Arc<ModelBinding> {
        let config = load_from_str(
            r#"{
            "models": [
                { "name": "Author", "table": "authors",
                  "columns": [ { "name": "id", "type": "bigint" },
                               { "name": "name", "type": "text" },
                               { "name": "password_hash", "type": "text" } ],
                  "hidden": ["password_hash"] },
                { "name": "Post", "table": "posts", "schema": "blog",
                  "columns": [ { "name": "id", "type": "bigserial", "has_default": true },
                               { "name": "author_id", "type": "bigint" },
                               { "name": "title", "type": "text" },
                               { "name": "price", "type": "numeric" },
                               { "name": "created_at", "type": "timestamptz", "has_default": true },
                               { "name": "token", "type": "text" } ],
                  "hidden": ["token"],
                  "relations": [ { "name": "author", "model": "Author", "kind": "to_one",
                                   "local_key": "author_id", "foreign_key": "id" } ],
                  "scopes": { "by_author": { "condition": "\"author_id\" = ?::bigint" },
                              "titled": { "condition": "\"title\" LIKE ? OR \"title\" LIKE ?" } } }
            ]
        }"#,
        )
        .unwrap();
        build_registry(&config).unwrap().model("Post").unwrap().clone()
    }

    #[test]
    fn page_select_with_filters_scopes_and_sorting() {
        let mut q = SqlQuery::new(post_model());
        q.with_relations(&["author".into()]).unwrap();
        q.scope("by_author", &["7".into()]).unwrap();
        q.order_by("created_at", SortDirection::Desc).unwrap();
        q.filter("id", FilterOperator::Gt, &FilterValue::Single("10".into()))
            .unwrap();
        q.filter("title", FilterOperator::Contains, &FilterValue::Single("%rust%".into()))
            .unwrap();

        let buf = q.select_page(2, 20);
        assert!(buf.sql.starts_with("SELECT main.\"id\" AS \"id\""));
        assert!(buf.sql.contains("main.\"price\"::text AS \"price\""));
        assert!(buf.sql.contains("(SELECT row_to_json(sub) FROM (SELECT \"id\", \"name\" FROM \"authors\" WHERE \"id\" = main.\"author_id\" LIMIT 1) sub) AS \"author\""));
        assert!(buf.sql.contains(" FROM \"blog\".\"posts\" main WHERE (\"author_id\" = $1::bigint) AND main.\"id\" > $2::bigint AND main.\"title\"::text LIKE $3"));
        assert!(buf.sql.ends_with(" ORDER BY main.\"created_at\" DESC LIMIT 20 OFFSET 20"));
        assert_eq!(
            buf.params,
            vec![
                PgBindValue::text("7"),
                PgBindValue::text("10"),
                PgBindValue::text("%rust%")
            ]
        );

        let count = q.count();
        assert!(count.sql.starts_with("SELECT COUNT(*) FROM \"blog\".\"posts\" main WHERE "));
        assert_eq!(count.params.len(), 3);
    }

    #[test]
    fn list_and_range_operators() {
        let mut q = SqlQuery::new(post_model());
        q.filter("id", FilterOperator::In, &FilterValue::List(vec!["1".into(), "2".into()]))
            .unwrap();
        q.filter(
            "created_at",
            FilterOperator::NotBetween,
            &FilterValue::List(vec!["2024-01-01".into(), "2024-02-01".into()]),
        )
        .unwrap();
        q.filter("title", FilterOperator::IsNull, &FilterValue::None).unwrap();
        let buf = q.count();
        assert!(buf.sql.contains("main.\"id\" = ANY($1::bigint[])"));
        assert!(buf.sql.contains(
            "main.\"created_at\" NOT BETWEEN $2::timestamptz AND $3::timestamptz"
        ));
        assert!(buf.sql.contains("main.\"title\" IS NULL"));
        assert_eq!(buf.params[0], PgBindValue::TextArray(vec!["1".into(), "2".into()]));
    }

    #[test]
    fn scope_argument_count_is_checked() {
        let mut q = SqlQuery::new(post_model());
        let err = q.scope("titled", &["a".into()]).unwrap_err();
        assert!(matches!(err, ApiError::InvalidDirective(_)));
        q.scope("titled", &["a%".into(), "%b".into()]).unwrap();
        assert!(q.count().sql.contains("(\"title\" LIKE $1 OR \"title\" LIKE $2)"));
    }

    #[test]
    fn unknown_names_are_invalid_directives() {
        let mut q = SqlQuery::new(post_model());
        assert!(matches!(
            q.with_relations(&["comments".into()]),
            Err(ApiError::InvalidDirective(_))
        ));
        assert!(matches!(q.scope("nope", &[]), Err(ApiError::InvalidDirective(_))));
        assert!(matches!(
            q.order_by("ghost", SortDirection::Asc),
            Err(ApiError::InvalidDirective(_))
        ));
        assert!(matches!(
            q.filter("ghost", FilterOperator::Eq, &FilterValue::Single("1".into())),
            Err(ApiError::InvalidDirective(_))
        ));
    }

    #[test]
    fn includes_never_select_hidden_related_columns() {
        let mut q = SqlQuery::new(post_model());
        q.with_relations(&["author".into()]).unwrap();
        let sql = q.select_page(1, 10).sql;
        assert!(sql.contains("(SELECT \"id\", \"name\" FROM \"authors\""));
        assert!(!sql.contains("password_hash"));
    }

    #[test]
    fn hidden_columns_cannot_be_sorted_or_filtered() {
        let mut q = SqlQuery::new(post_model());
        assert!(matches!(
            q.order_by("token", SortDirection::Asc),
            Err(ApiError::InvalidDirective(_))
        ));
        assert!(matches!(
            q.filter("token", FilterOperator::StartsWith, &FilterValue::Single("a%".into())),
            Err(ApiError::InvalidDirective(_))
        ));
        assert!(matches!(
            q.filter("token", FilterOperator::NotNull, &FilterValue::None),
            Err(ApiError::InvalidDirective(_))
        ));
        assert!(!q.count().sql.contains("token"));
    }

    #[test]
    fn select_by_id_keeps_existing_conditions() {
        let mut q = SqlQuery::new(post_model());
        q.scope("by_author", &["3".into()]).unwrap();
        let buf = q.select_by_id(&json!(9)).unwrap();
        assert!(buf.sql.ends_with("WHERE (\"author_id\" = $1::bigint) AND main.\"id\" = $2::bigint LIMIT 1"));
        assert_eq!(buf.params, vec![PgBindValue::text("3"), PgBindValue::text("9")]);
    }

    #[test]
    fn write_statements() {
        let model = post_model();
        let attrs = json!({ "title": "Hello", "author_id": 3 });
        let attrs = attrs.as_object().unwrap();

        let ins = insert(&model, attrs);
        assert_eq!(
            ins.sql,
            "INSERT INTO \"blog\".\"posts\" (\"author_id\", \"title\") VALUES ($1::bigint, $2::text) RETURNING \"id\", \"author_id\", \"title\", \"price\"::text AS \"price\", \"created_at\", \"token\""
        );

        let upd = update(&model, &json!(5), attrs);
        assert!(upd.sql.starts_with("UPDATE \"blog\".\"posts\" SET \"author_id\" = $1::bigint, \"title\" = $2::text WHERE \"id\" = $3::bigint RETURNING"));
        assert_eq!(upd.params[2], PgBindValue::text("5"));

        let noop = update(&model, &json!(5), &Map::new());
        assert!(noop.sql.starts_with("SELECT "));

        let del = delete(&model, &json!(5));
        assert_eq!(del.sql, "DELETE FROM \"blog\".\"posts\" WHERE \"id\" = $1::bigint");
    }
}
