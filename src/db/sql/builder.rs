//! SQL statement builder.
//!
//! Predicates are assembled through an [`ExprBuilder`] that binds every user
//! value as a parameter; only identifiers (quoted) and pagination numbers are
//! inlined into the SQL text.

use crate::db::escape::{escape_glob, escape_like};
use crate::db::query::{Operator, SortBy, SortDirection, WhereClause, WhereCondition};
use crate::db::schema::{FieldType, Table, ID_FIELD};
use crate::db::value::{Record, Value};

use super::dialect::Dialect;

/// SQL text plus its bound parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// A compiled boolean expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlExpr(String);

impl SqlExpr {
    pub fn raw(sql: impl Into<String>) -> Self {
        SqlExpr(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Accumulates parameters while expressions are built.
#[derive(Debug)]
pub struct ExprBuilder {
    dialect: Dialect,
    params: Vec<Value>,
}

impl ExprBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    /// Bind a value, returning its placeholder.
    pub fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    pub fn quote(&self, ident: &str) -> String {
        self.dialect.quote(ident)
    }

    fn compare(&mut self, column: &str, op: &str, value: &Value) -> SqlExpr {
        let placeholder = self.bind(value.clone());
        SqlExpr(format!("{} {} {}", self.quote(column), op, placeholder))
    }

    fn list(&mut self, column: &str, negate: bool, value: &Value) -> SqlExpr {
        let items = value.clone().into_list();
        if items.is_empty() {
            return SqlExpr::raw(if negate { "1 = 1" } else { "1 = 0" });
        }
        let placeholders = items
            .into_iter()
            .map(|item| self.bind(item))
            .collect::<Vec<_>>()
            .join(", ");
        let column = self.quote(column);
        if negate {
            SqlExpr(format!(
                "({} NOT IN ({}) OR {} IS NULL)",
                column, placeholders, column
            ))
        } else {
            SqlExpr(format!("{} IN ({})", column, placeholders))
        }
    }

    fn pattern(&mut self, column: &str, operator: Operator, value: &Value) -> SqlExpr {
        let text = value.to_text();
        let (escaped, wildcard) = match self.dialect {
            Dialect::Sqlite => (escape_glob(&text), "*"),
            _ => (escape_like(&text), "%"),
        };
        let pattern = match operator {
            Operator::StartsWith => format!("{}{}", escaped, wildcard),
            Operator::EndsWith => format!("{}{}", wildcard, escaped),
            _ => format!("{}{}{}", wildcard, escaped, wildcard),
        };
        let placeholder = self.bind(Value::Text(pattern));
        let column = self.quote(column);
        match self.dialect {
            Dialect::Sqlite => SqlExpr(format!("{} GLOB {}", column, placeholder)),
            dialect => SqlExpr(format!(
                "{} LIKE {} {}",
                column,
                placeholder,
                dialect.like_escape()
            )),
        }
    }

    /// Compile one condition. `ne` / `not_in` also match null, like the
    /// in-memory reference.
    pub fn condition(&mut self, condition: &WhereCondition) -> SqlExpr {
        let column = condition.field.as_str();
        let value = &condition.value;
        match condition.operator {
            Operator::Eq if value.is_null() => SqlExpr(format!("{} IS NULL", self.quote(column))),
            Operator::Ne if value.is_null() => {
                SqlExpr(format!("{} IS NOT NULL", self.quote(column)))
            }
            Operator::Eq => self.compare(column, "=", value),
            Operator::Ne => {
                let SqlExpr(inner) = self.compare(column, "<>", value);
                SqlExpr(format!("({} OR {} IS NULL)", inner, self.quote(column)))
            }
            Operator::Lt => self.compare(column, "<", value),
            Operator::Lte => self.compare(column, "<=", value),
            Operator::Gt => self.compare(column, ">", value),
            Operator::Gte => self.compare(column, ">=", value),
            Operator::In => self.list(column, false, value),
            Operator::NotIn => self.list(column, true, value),
            Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
                self.pattern(column, condition.operator, value)
            }
        }
    }

    pub fn and(parts: Vec<SqlExpr>) -> SqlExpr {
        Self::join(parts, " AND ")
    }

    pub fn or(parts: Vec<SqlExpr>) -> SqlExpr {
        Self::join(parts, " OR ")
    }

    fn join(mut parts: Vec<SqlExpr>, separator: &str) -> SqlExpr {
        if parts.len() == 1 {
            return parts.remove(0);
        }
        let joined = parts
            .iter()
            .map(SqlExpr::as_str)
            .collect::<Vec<_>>()
            .join(separator);
        SqlExpr(format!("({})", joined))
    }

    /// Compile a condition list under the grouping rule; `None` matches all.
    pub fn filter(&mut self, conditions: &[WhereCondition]) -> Option<SqlExpr> {
        match WhereClause::groups(conditions) {
            WhereClause::All => None,
            WhereClause::Single(condition) => Some(self.condition(condition)),
            WhereClause::Groups { and_group, or_group } => {
                let mut parts: Vec<SqlExpr> =
                    and_group.into_iter().map(|c| self.condition(c)).collect();
                if !or_group.is_empty() {
                    let alternatives = or_group.into_iter().map(|c| self.condition(c)).collect();
                    parts.push(Self::or(alternatives));
                }
                Some(Self::and(parts))
            }
        }
    }

    pub fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.params,
        }
    }
}

/// Builds complete statements for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlBuilder {
    dialect: Dialect,
}

impl SqlBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn table(&self, table: &Table) -> String {
        self.dialect.quote(&table.model_name)
    }

    fn push_where(eb: &mut ExprBuilder, sql: &mut String, filter: &[WhereCondition]) {
        if let Some(expr) = eb.filter(filter) {
            sql.push_str(" WHERE ");
            sql.push_str(expr.as_str());
        }
    }

    fn order_term(&self, table: &Table, sort: &SortBy) -> String {
        let column = self.dialect.quote(&sort.field);
        let is_text = table
            .logical_for_column(&sort.field)
            .and_then(|(_, attr)| attr)
            .is_some_and(|attr| attr.field_type == FieldType::String);
        let key = match self.dialect {
            Dialect::Sqlite => format!("{}{}", column, self.dialect.order_collation()),
            _ if is_text => format!("LOWER({})", column),
            _ => column,
        };
        let direction = match sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        match (self.dialect, sort.direction) {
            (Dialect::Postgres, SortDirection::Asc) => format!("{} {} NULLS FIRST", key, direction),
            (Dialect::Postgres, SortDirection::Desc) => format!("{} {} NULLS LAST", key, direction),
            _ => format!("{} {}", key, direction),
        }
    }

    /// `SELECT *` with filter, sort and pagination.
    pub fn select(
        &self,
        table: &Table,
        filter: &[WhereCondition],
        sort_by: &[SortBy],
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Statement {
        let mut eb = ExprBuilder::new(self.dialect);
        let top = match (self.dialect, limit, offset) {
            (Dialect::MsSql, Some(n), None) => format!("TOP ({}) ", n),
            _ => String::new(),
        };
        let mut sql = format!("SELECT {}* FROM {}", top, self.table(table));
        Self::push_where(&mut eb, &mut sql, filter);

        let order = sort_by
            .iter()
            .map(|sort| self.order_term(table, sort))
            .collect::<Vec<_>>()
            .join(", ");
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }

        match self.dialect {
            Dialect::MsSql => {
                if let Some(offset) = offset {
                    if order.is_empty() {
                        sql.push_str(" ORDER BY (SELECT NULL)");
                    }
                    sql.push_str(&format!(" OFFSET {} ROWS", offset));
                    if let Some(limit) = limit {
                        sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", limit));
                    }
                }
            }
            dialect => {
                match (limit, offset) {
                    (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
                    (None, Some(_)) if dialect == Dialect::Sqlite => sql.push_str(" LIMIT -1"),
                    (None, Some(_)) if dialect == Dialect::MySql => {
                        sql.push_str(" LIMIT 18446744073709551615")
                    }
                    _ => {}
                }
                if let Some(offset) = offset {
                    sql.push_str(&format!(" OFFSET {}", offset));
                }
            }
        }
        eb.finish(sql)
    }

    /// Select the key of the first matching row.
    pub fn select_first_id(&self, table: &Table, filter: &[WhereCondition]) -> Statement {
        let mut statement = self.select(table, filter, &[], Some(1), None);
        let id = self.dialect.quote(ID_FIELD);
        statement.sql = statement.sql.replacen("*", &id, 1);
        statement
    }

    /// Select the row written by the last insert without an explicit key.
    pub fn select_last_inserted(&self, table: &Table) -> Statement {
        Statement {
            sql: format!(
                "SELECT * FROM {} WHERE {} = {}",
                self.table(table),
                self.dialect.quote(ID_FIELD),
                self.dialect.last_insert_id()
            ),
            params: Vec::new(),
        }
    }

    pub fn count(&self, table: &Table, filter: &[WhereCondition]) -> Statement {
        let mut eb = ExprBuilder::new(self.dialect);
        let mut sql = format!(
            "SELECT COUNT(*) AS {} FROM {}",
            self.dialect.quote("count"),
            self.table(table)
        );
        Self::push_where(&mut eb, &mut sql, filter);
        eb.finish(sql)
    }

    fn returning(&self, sql: &mut String) {
        if self.dialect.supports_returning() {
            sql.push_str(" RETURNING *");
        }
    }

    fn values(&self, eb: &mut ExprBuilder, row: &Record) -> (String, String) {
        let columns = row
            .keys()
            .map(|c| self.dialect.quote(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = row
            .values()
            .map(|v| eb.bind(v.clone()))
            .collect::<Vec<_>>()
            .join(", ");
        (columns, placeholders)
    }

    pub fn insert(&self, table: &Table, row: &Record) -> Statement {
        let mut eb = ExprBuilder::new(self.dialect);
        let mut sql = if row.is_empty() {
            match self.dialect {
                Dialect::MySql => format!("INSERT INTO {} () VALUES ()", self.table(table)),
                _ => format!("INSERT INTO {} DEFAULT VALUES", self.table(table)),
            }
        } else {
            let (columns, placeholders) = self.values(&mut eb, row);
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table(table),
                columns,
                placeholders
            )
        };
        self.returning(&mut sql);
        eb.finish(sql)
    }

    fn assignments(&self, eb: &mut ExprBuilder, set: &Record) -> String {
        set.iter()
            .map(|(column, value)| {
                format!("{} = {}", self.dialect.quote(column), eb.bind(value.clone()))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn update(&self, table: &Table, set: &Record, filter: &[WhereCondition]) -> Statement {
        let mut eb = ExprBuilder::new(self.dialect);
        let assignments = self.assignments(&mut eb, set);
        let mut sql = format!("UPDATE {} SET {}", self.table(table), assignments);
        Self::push_where(&mut eb, &mut sql, filter);
        self.returning(&mut sql);
        eb.finish(sql)
    }

    pub fn delete(&self, table: &Table, filter: &[WhereCondition]) -> Statement {
        let mut eb = ExprBuilder::new(self.dialect);
        let mut sql = format!("DELETE FROM {}", self.table(table));
        Self::push_where(&mut eb, &mut sql, filter);
        eb.finish(sql)
    }

    /// Native single-statement upsert keyed on `conflict`. `None` when the
    /// dialect has none (SQL Server).
    pub fn upsert(
        &self,
        table: &Table,
        conflict: &str,
        create: &Record,
        update: &Record,
    ) -> Option<Statement> {
        let mut eb = ExprBuilder::new(self.dialect);
        let (columns, placeholders) = self.values(&mut eb, create);
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(table),
            columns,
            placeholders
        );
        let conflict_q = self.dialect.quote(conflict);
        let mut sql = match self.dialect {
            Dialect::Sqlite | Dialect::Postgres => {
                let set = if update.is_empty() {
                    format!("{} = excluded.{}", conflict_q, conflict_q)
                } else {
                    self.assignments(&mut eb, update)
                };
                format!("{} ON CONFLICT ({}) DO UPDATE SET {}", insert, conflict_q, set)
            }
            Dialect::MySql => {
                let set = if update.is_empty() {
                    format!("{} = {}", conflict_q, conflict_q)
                } else {
                    self.assignments(&mut eb, update)
                };
                format!("{} ON DUPLICATE KEY UPDATE {}", insert, set)
            }
            Dialect::MsSql => return None,
        };
        self.returning(&mut sql);
        Some(eb.finish(sql))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{FieldAttribute, FieldType};
    use crate::record;
    use rstest::{fixture, rstest};

    #[fixture]
    fn table() -> Table {
        Table::new("thread")
            .with_field("title", FieldAttribute::new(FieldType::String))
            .with_field("visibility", FieldAttribute::new(FieldType::String))
            .with_field("message_count", FieldAttribute::new(FieldType::Number))
    }

    fn where_sql(dialect: Dialect, conditions: &[WhereCondition]) -> (String, Vec<Value>) {
        let mut eb = ExprBuilder::new(dialect);
        let expr = eb.filter(conditions).unwrap();
        let statement = eb.finish(expr.as_str().to_string());
        (statement.sql, statement.params)
    }

    #[rstest]
    fn test_single_condition_has_no_grouping() {
        let (sql, params) = where_sql(Dialect::Sqlite, &[WhereCondition::eq("id", "t1")]);
        assert_eq!(sql, "\"id\" = ?");
        assert_eq!(params, vec![Value::from("t1")]);
    }

    #[rstest]
    fn test_and_or_grouping_postgres() {
        let conditions = vec![
            WhereCondition::new("title", Operator::StartsWith, "a"),
            WhereCondition::eq("visibility", "public").or(),
            WhereCondition::eq("visibility", "private").or(),
        ];
        let (sql, params) = where_sql(Dialect::Postgres, &conditions);
        assert_eq!(
            sql,
            "(\"title\" LIKE $1 ESCAPE '\\' AND (\"visibility\" = $2 OR \"visibility\" = $3))"
        );
        assert_eq!(params[0], Value::from("a%"));
    }

    #[rstest]
    #[case(Operator::Contains, "room", "*room*")]
    #[case(Operator::StartsWith, "al*", "al[*]*")]
    #[case(Operator::EndsWith, "m?", "*m[?]")]
    fn test_sqlite_glob_patterns(#[case] op: Operator, #[case] input: &str, #[case] pattern: &str) {
        let (sql, params) = where_sql(Dialect::Sqlite, &[WhereCondition::new("title", op, input)]);
        assert_eq!(sql, "\"title\" GLOB ?");
        assert_eq!(params, vec![Value::from(pattern)]);
    }

    #[rstest]
    fn test_like_pattern_escapes_wildcards() {
        let (sql, params) = where_sql(
            Dialect::MsSql,
            &[WhereCondition::new("title", Operator::Contains, "50%_off")],
        );
        assert_eq!(sql, "[title] LIKE @P1 ESCAPE '\\'");
        assert_eq!(params, vec![Value::from("%50\\%\\_off%")]);
    }

    #[rstest]
    fn test_in_and_not_in() {
        let (sql, _) = where_sql(
            Dialect::MySql,
            &[WhereCondition::new("id", Operator::In, vec!["a", "b"])],
        );
        assert_eq!(sql, "`id` IN (?, ?)");

        let (sql, params) = where_sql(
            Dialect::Postgres,
            &[WhereCondition::new("id", Operator::NotIn, "a")],
        );
        assert_eq!(sql, "(\"id\" NOT IN ($1) OR \"id\" IS NULL)");
        assert_eq!(params, vec![Value::from("a")]);
    }

    #[rstest]
    fn test_empty_in_list() {
        let (sql, params) = where_sql(
            Dialect::Sqlite,
            &[WhereCondition::new("id", Operator::In, Value::List(vec![]))],
        );
        assert_eq!(sql, "1 = 0");
        assert!(params.is_empty());
    }

    #[rstest]
    fn test_null_equality() {
        let (sql, params) = where_sql(Dialect::Sqlite, &[WhereCondition::eq("title", Value::Null)]);
        assert_eq!(sql, "\"title\" IS NULL");
        assert!(params.is_empty());
    }

    #[rstest]
    fn test_select_sqlite_sort_collation(table: Table) {
        let statement = SqlBuilder::new(Dialect::Sqlite).select(
            &table,
            &[],
            &[SortBy::asc("title")],
            Some(2),
            Some(1),
        );
        assert_eq!(
            statement.sql,
            "SELECT * FROM \"thread\" ORDER BY \"title\" COLLATE NOCASE ASC LIMIT 2 OFFSET 1"
        );
    }

    #[rstest]
    fn test_select_postgres_sort(table: Table) {
        let statement = SqlBuilder::new(Dialect::Postgres).select(
            &table,
            &[],
            &[SortBy::desc("title"), SortBy::asc("message_count")],
            None,
            Some(3),
        );
        assert_eq!(
            statement.sql,
            "SELECT * FROM \"thread\" ORDER BY LOWER(\"title\") DESC NULLS LAST, \"message_count\" ASC NULLS FIRST OFFSET 3"
        );
    }

    #[rstest]
    fn test_sqlite_offset_without_limit(table: Table) {
        let statement = SqlBuilder::new(Dialect::Sqlite).select(&table, &[], &[], None, Some(2));
        assert_eq!(statement.sql, "SELECT * FROM \"thread\" LIMIT -1 OFFSET 2");
    }

    #[rstest]
    fn test_mssql_top_without_offset(table: Table) {
        let statement = SqlBuilder::new(Dialect::MsSql).select(
            &table,
            &[WhereCondition::eq("visibility", "public")],
            &[],
            Some(5),
            None,
        );
        assert_eq!(
            statement.sql,
            "SELECT TOP (5) * FROM [thread] WHERE [visibility] = @P1"
        );
    }

    #[rstest]
    fn test_mssql_offset_fetch_unsorted(table: Table) {
        let statement = SqlBuilder::new(Dialect::MsSql).select(&table, &[], &[], Some(5), Some(10));
        assert_eq!(
            statement.sql,
            "SELECT * FROM [thread] ORDER BY (SELECT NULL) OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"
        );
    }

    #[rstest]
    fn test_insert_returning(table: Table) {
        let row = record! { "id" => "t1", "title" => "General" };
        let statement = SqlBuilder::new(Dialect::Postgres).insert(&table, &row);
        assert_eq!(
            statement.sql,
            "INSERT INTO \"thread\" (\"id\", \"title\") VALUES ($1, $2) RETURNING *"
        );
        let mysql = SqlBuilder::new(Dialect::MySql).insert(&table, &row);
        assert_eq!(mysql.sql, "INSERT INTO `thread` (`id`, `title`) VALUES (?, ?)");
    }

    #[rstest]
    fn test_update_numbers_placeholders_in_order(table: Table) {
        let statement = SqlBuilder::new(Dialect::Postgres).update(
            &table,
            &record! { "visibility" => "private" },
            &[WhereCondition::eq("visibility", "public")],
        );
        assert_eq!(
            statement.sql,
            "UPDATE \"thread\" SET \"visibility\" = $1 WHERE \"visibility\" = $2 RETURNING *"
        );
        assert_eq!(statement.params, vec![Value::from("private"), Value::from("public")]);
    }

    #[rstest]
    fn test_select_first_id(table: Table) {
        let statement =
            SqlBuilder::new(Dialect::Sqlite).select_first_id(&table, &[WhereCondition::eq("title", "x")]);
        assert_eq!(
            statement.sql,
            "SELECT \"id\" FROM \"thread\" WHERE \"title\" = ? LIMIT 1"
        );
    }

    #[rstest]
    fn test_upsert_on_conflict(table: Table) {
        let statement = SqlBuilder::new(Dialect::Sqlite)
            .upsert(
                &table,
                "id",
                &record! { "id" => "t1", "title" => "a" },
                &record! { "title" => "b" },
            )
            .unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO \"thread\" (\"id\", \"title\") VALUES (?, ?) ON CONFLICT (\"id\") DO UPDATE SET \"title\" = ? RETURNING *"
        );
        assert_eq!(statement.params.len(), 3);
    }

    #[rstest]
    fn test_upsert_mysql_and_mssql(table: Table) {
        let create = record! { "id" => "t1" };
        let mysql = SqlBuilder::new(Dialect::MySql)
            .upsert(&table, "id", &create, &Record::new())
            .unwrap();
        assert_eq!(
            mysql.sql,
            "INSERT INTO `thread` (`id`) VALUES (?) ON DUPLICATE KEY UPDATE `id` = `id`"
        );
        assert!(SqlBuilder::new(Dialect::MsSql)
            .upsert(&table, "id", &create, &Record::new())
            .is_none());
    }

    #[rstest]
    fn test_count(table: Table) {
        let statement = SqlBuilder::new(Dialect::MySql).count(&table, &[]);
        assert_eq!(statement.sql, "SELECT COUNT(*) AS `count` FROM `thread`");
    }
}
