//! SQL query fragment builder
//!
//! Stateless functions producing SQL text for predicates, joins, ordering and
//! aggregates, plus statement assembly. Predicates inline their values through
//! the escaping table in [`super::literal`]. Statements built from column/value
//! pairs (`insert`, `update`) use `$n` placeholders and carry the bound values
//! in [`Statement::params`].

use super::literal::{aps, bool_literal, pg_string_encode, quote_pattern};
use super::traits::{OrderDirection, SqlValue};
use crate::error::SqlError;

/// SQL text plus the values bound to its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Render the statement with every placeholder replaced by its escaped literal.
    ///
    /// This is the legacy text form; it is what gets logged and what older
    /// consumers compare against.
    pub fn inline(&self) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut chars = self.sql.char_indices().peekable();
        let mut in_literal = false;

        while let Some((_, c)) = chars.next() {
            if c == '\'' {
                in_literal = !in_literal;
                out.push(c);
                continue;
            }
            if c != '$' || in_literal {
                out.push(c);
                continue;
            }

            let mut digits = String::new();
            while let Some((_, d)) = chars.peek() {
                if d.is_ascii_digit() {
                    digits.push(*d);
                    chars.next();
                } else {
                    break;
                }
            }

            let param = digits
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| self.params.get(i));

            match param {
                Some(SqlValue::Cast { text, .. }) => out.push_str(&aps(text)),
                Some(value) => out.push_str(&value.to_literal()),
                None => {
                    out.push('$');
                    out.push_str(&digits);
                }
            }
        }

        out
    }
}

/// Anything that can appear verbatim on either side of a comparison.
pub trait Operand {
    fn to_operand(&self) -> String;
}

impl Operand for str {
    fn to_operand(&self) -> String {
        self.to_string()
    }
}

impl Operand for String {
    fn to_operand(&self) -> String {
        self.clone()
    }
}

impl Operand for bool {
    fn to_operand(&self) -> String {
        bool_literal(*self).to_string()
    }
}

impl<T: Operand> Operand for Option<T> {
    fn to_operand(&self) -> String {
        match self {
            Some(value) => value.to_operand(),
            None => super::literal::NULL.to_string(),
        }
    }
}

impl<T: Operand + ?Sized> Operand for &T {
    fn to_operand(&self) -> String {
        (**self).to_operand()
    }
}

macro_rules! numeric_operand {
    ($($t:ty),*) => {
        $(impl Operand for $t {
            fn to_operand(&self) -> String {
                self.to_string()
            }
        })*
    };
}

numeric_operand!(i16, i32, i64, u16, u32, u64, usize, f32, f64);

/// How an aggregate or projection is aliased.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alias<'a> {
    /// Column name with `.` replaced by `_`
    #[default]
    Derived,
    /// No alias
    Omit,
    Named(&'a str),
}

impl Alias<'_> {
    fn render(self, column: &str) -> String {
        match self {
            Alias::Derived => format!(" as {}", column.replace('.', "_")),
            Alias::Omit => String::new(),
            Alias::Named(name) if name.is_empty() => String::new(),
            Alias::Named(name) => format!(" as {name}"),
        }
    }
}

// ============================================================================
// Boolean composition
// ============================================================================

fn compose<I, S>(terms: I, operator: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let terms: Vec<String> = terms
        .into_iter()
        .filter(|t| !t.as_ref().is_empty())
        .map(|t| t.as_ref().to_string())
        .collect();
    format!("({})", terms.join(operator))
}

/// Join non-empty terms with `AND`, wrapped in parentheses.
pub fn and<I, S>(terms: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    compose(terms, " AND ")
}

/// Join non-empty terms with `OR`, wrapped in parentheses.
pub fn or<I, S>(terms: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    compose(terms, " OR ")
}

// ============================================================================
// Comparisons
// ============================================================================

pub fn eq(left: impl Operand, right: impl Operand) -> String {
    format!("{} = {}", left.to_operand(), right.to_operand())
}

/// `left = 'right'` with `right` escaped.
pub fn eq_text(left: impl Operand, right: &str) -> String {
    format!("{} = {}", left.to_operand(), aps(right))
}

pub fn not_eq(left: impl Operand, right: impl Operand) -> String {
    format!("{} != {}", left.to_operand(), right.to_operand())
}

pub fn not_eq_text(left: impl Operand, right: &str) -> String {
    format!("{} != {}", left.to_operand(), aps(right))
}

pub fn gt(left: impl Operand, right: impl Operand) -> String {
    format!("{} > {}", left.to_operand(), right.to_operand())
}

pub fn gt_text(left: impl Operand, right: &str) -> String {
    format!("{} > {}", left.to_operand(), aps(right))
}

pub fn lt(left: impl Operand, right: impl Operand) -> String {
    format!("{} < {}", left.to_operand(), right.to_operand())
}

pub fn lt_text(left: impl Operand, right: &str) -> String {
    format!("{} < {}", left.to_operand(), aps(right))
}

pub fn is_null(column: &str) -> String {
    format!("{column} is null")
}

pub fn is_not_null(column: &str) -> String {
    format!("{column} is not null")
}

/// Wrap a search value in `%` unless it already carries a wildcard.
fn like_pattern(value: &str) -> String {
    if value.contains('%') {
        quote_pattern(value)
    } else {
        quote_pattern(&format!("%{value}%"))
    }
}

pub fn like(column: &str, value: &str) -> String {
    format!("{column} LIKE {}", like_pattern(value))
}

pub fn not_like(column: &str, value: &str) -> String {
    format!("{column} NOT LIKE {}", like_pattern(value))
}

/// Case-insensitive LIKE.
pub fn ilike(column: &str, value: &str) -> String {
    format!("lower({column}) LIKE lower({})", like_pattern(value))
}

pub fn not_ilike(column: &str, value: &str) -> String {
    format!("lower({column}) NOT LIKE lower({})", like_pattern(value))
}

/// Case- and diacritic-insensitive LIKE for free-text search.
pub fn accent_insensitive_like(column: &str, value: &str) -> String {
    format!(
        "unaccent(lower({column})) LIKE unaccent(lower({}))",
        like_pattern(value)
    )
}

/// Grid search predicate: any column type, cast to text, matched with ILIKE.
pub fn unaccent_ilike(column: &str, value: &str) -> String {
    format!(
        "unaccent(({column})::varchar) ILIKE unaccent({})",
        like_pattern(value)
    )
}

fn list<I, T>(items: I) -> Result<String, SqlError>
where
    I: IntoIterator<Item = T>,
    T: Operand,
{
    let items: Vec<String> = items.into_iter().map(|i| i.to_operand()).collect();
    if items.is_empty() {
        return Err(SqlError::EmptyList);
    }
    Ok(items.join(","))
}

/// `left in (a,b,c)`; fails on an empty list.
pub fn in_list<I, T>(left: impl Operand, items: I) -> Result<String, SqlError>
where
    I: IntoIterator<Item = T>,
    T: Operand,
{
    Ok(format!("{} in ({})", left.to_operand(), list(items)?))
}

pub fn not_in<I, T>(left: impl Operand, items: I) -> Result<String, SqlError>
where
    I: IntoIterator<Item = T>,
    T: Operand,
{
    Ok(format!("{} not in ({})", left.to_operand(), list(items)?))
}

pub fn any(column: &str) -> String {
    format!("any({column})")
}

/// Primary-key equality, written with the logical `id` token.
pub fn pk_is(id: i64) -> String {
    eq("id", id)
}

/// Literal form of a value as inlined into a statement.
///
/// Booleans render as `true`/`false` here, unlike the `'t'`/`'f'` tokens of
/// dehydrated columns.
pub fn value_convert(value: &SqlValue) -> String {
    match value {
        SqlValue::Bool(b) => bool_literal(*b).to_string(),
        other => other.to_literal(),
    }
}

// ============================================================================
// Projections and aggregates
// ============================================================================

pub fn count(column: &str, alias: Alias<'_>) -> String {
    format!("count({column}){}", alias.render(column))
}

pub fn sum(column: &str, alias: Alias<'_>) -> String {
    format!("sum({column}){}", alias.render(column))
}

pub fn min(column: &str, alias: Alias<'_>) -> String {
    format!("min({column}){}", alias.render(column))
}

pub fn max(column: &str, alias: Alias<'_>) -> String {
    format!("max({column}){}", alias.render(column))
}

/// `avg(column)` with an optional result cast.
pub fn avg(column: &str, alias: Alias<'_>, result_type: Option<&str>) -> String {
    let cast = match result_type {
        Some(ty) if !ty.is_empty() => format!("::{ty}"),
        _ => String::new(),
    };
    format!("avg({column}){cast}{}", alias.render(column))
}

pub fn coalesce<I, S>(columns: I, alias: &str) -> Result<String, SqlError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let columns: Vec<String> = columns
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .collect();
    if columns.is_empty() {
        return Err(SqlError::EmptyList);
    }
    Ok(format!("coalesce({}) as {alias}", columns.join(", ")))
}

/// `extract(field from column)`
pub fn extract(column: &str, field: &str, alias: Option<&str>) -> String {
    let alias = alias.map(|a| format!(" as {a}")).unwrap_or_default();
    format!("extract({field} from {column}){alias}")
}

/// `column[index]`
pub fn array_index(column: &str, index: i32, alias: Alias<'_>) -> String {
    format!("{column}[{index}]{}", alias.render(column))
}

/// `column->>'property'`, aliased `column_property` by default.
pub fn json_prop(column: &str, property: &str, alias: Option<&str>) -> String {
    let alias = match alias {
        Some(a) if !a.is_empty() => a.to_string(),
        _ => format!("{column}_{property}"),
    };
    format!("{column}->>'{}' as {alias}", pg_string_encode(property))
}

pub fn bracket(content: &str) -> String {
    format!("({content})")
}

/// `source as alias`
pub fn alias_as(source: &str, alias: &str) -> String {
    format!("{source} as {alias}")
}

/// Re-point a qualified column at another table alias.
pub fn change_alias(column: &str, alias: &str) -> String {
    let bare = column.rsplit('.').next().unwrap_or(column);
    format!("{alias}.{bare}")
}

/// `md5(expression)`
pub fn md5(source: &str) -> String {
    format!("md5({source})")
}

/// `md5('text')` with the text escaped.
pub fn md5_text(value: &str) -> String {
    format!("md5({})", aps(value))
}

// ============================================================================
// Joins
// ============================================================================

fn join(kind: &str, source: &str, on: &str, alias: Option<&str>) -> String {
    let alias = alias.map(|a| format!(" {a}")).unwrap_or_default();
    format!(" {kind} JOIN {source}{alias} ON {on}")
}

pub fn left_join(source: &str, on: &str, alias: Option<&str>) -> String {
    join("LEFT", source, on, alias)
}

pub fn inner_join(source: &str, on: &str, alias: Option<&str>) -> String {
    join("INNER", source, on, alias)
}

pub fn right_join(source: &str, on: &str, alias: Option<&str>) -> String {
    join("RIGHT", source, on, alias)
}

pub fn cross_join(source: &str, alias: Option<&str>) -> String {
    let alias = alias.map(|a| format!(" {a}")).unwrap_or_default();
    format!(" CROSS JOIN {source}{alias}")
}

// ============================================================================
// Ordering and grouping
// ============================================================================

pub fn order_by<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    join_list(items)
}

pub fn asc(column: &str) -> String {
    format!("{column} ASC")
}

pub fn desc(column: &str) -> String {
    format!("{column} DESC")
}

pub fn order(column: &str, direction: OrderDirection) -> String {
    format!("{column} {}", direction.to_sql())
}

pub fn group_by<I, S>(columns: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    join_list(columns)
}

fn join_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|i| i.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Statements
// ============================================================================

/// SELECT statement builder.
///
/// Bare column names (no `.` and no `(`) are qualified with the source.
#[derive(Debug, Clone)]
pub struct Select {
    columns: Vec<String>,
    source: String,
    joins: Vec<String>,
    filter: Option<String>,
    group_by: Option<String>,
    having: Option<String>,
    order_by: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Start a SELECT over `source`.
pub fn select<I, S>(columns: I, source: &str) -> Select
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Select {
        columns: columns
            .into_iter()
            .map(|c| c.as_ref().to_string())
            .collect(),
        source: source.to_string(),
        joins: Vec::new(),
        filter: None,
        group_by: None,
        having: None,
        order_by: None,
        limit: None,
        offset: None,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

impl Select {
    pub fn join(mut self, join: impl Into<String>) -> Self {
        let join = join.into();
        if !join.trim().is_empty() {
            self.joins.push(join);
        }
        self
    }

    pub fn joins<I, S>(mut self, joins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for join in joins {
            self = self.join(join);
        }
        self
    }

    pub fn filter(mut self, condition: Option<&str>) -> Self {
        self.filter = non_empty(condition);
        self
    }

    pub fn group_by(mut self, group_by: Option<&str>) -> Self {
        self.group_by = non_empty(group_by);
        self
    }

    pub fn having(mut self, having: Option<&str>) -> Self {
        self.having = non_empty(having);
        self
    }

    pub fn order_by(mut self, order_by: Option<&str>) -> Self {
        self.order_by = non_empty(order_by);
        self
    }

    /// Zero or negative limits are ignored.
    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit.filter(|l| *l > 0);
        self
    }

    /// Zero or negative offsets are ignored.
    pub fn offset(mut self, offset: Option<i64>) -> Self {
        self.offset = offset.filter(|o| *o > 0);
        self
    }

    /// Build the SQL statement.
    pub fn build(&self) -> Result<Statement, SqlError> {
        if self.columns.is_empty() {
            return Err(SqlError::EmptyColumns {
                table: self.source.clone(),
            });
        }

        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.contains('.') || c.contains('(') {
                    c.clone()
                } else {
                    format!("{}.{}", self.source, c)
                }
            })
            .collect();

        let mut sql = format!("SELECT {} FROM {}", columns.join(","), self.source);

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join.trim_start());
        }

        if let Some(ref filter) = self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }

        if let Some(ref group_by) = self.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
        }

        if let Some(ref having) = self.having {
            sql.push_str(" HAVING ");
            sql.push_str(having);
        }

        if let Some(ref order) = self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        Ok(Statement::new(sql))
    }
}

/// Strip any table qualification and quote the column.
fn quoted_column(column: &str) -> String {
    let bare = column.rsplit('.').next().unwrap_or(column);
    format!("\"{bare}\"")
}

/// Turn column/value pairs into quoted columns and placeholders.
///
/// `NULL` is inlined instead of bound so the server does not have to infer a
/// parameter type for it.
fn placeholders<I, K>(values: I) -> (Vec<String>, Vec<String>, Vec<SqlValue>)
where
    I: IntoIterator<Item = (K, SqlValue)>,
    K: AsRef<str>,
{
    let mut columns = Vec::new();
    let mut slots = Vec::new();
    let mut params = Vec::new();

    for (column, value) in values {
        columns.push(quoted_column(column.as_ref()));
        if value.is_null() {
            slots.push(super::literal::NULL.to_string());
        } else {
            slots.push(value.placeholder(params.len() + 1));
            params.push(value);
        }
    }

    (columns, slots, params)
}

/// `INSERT INTO source ("a","b") VALUES ($1,$2) [RETURNING ...];`
pub fn insert<I, K>(source: &str, values: I, returning: &[&str]) -> Result<Statement, SqlError>
where
    I: IntoIterator<Item = (K, SqlValue)>,
    K: AsRef<str>,
{
    let (columns, slots, params) = placeholders(values);
    if columns.is_empty() {
        return Err(SqlError::EmptyColumns {
            table: source.to_string(),
        });
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        source,
        columns.join(","),
        slots.join(",")
    );
    if !returning.is_empty() {
        sql.push_str(" RETURNING ");
        sql.push_str(&returning.join(","));
    }
    sql.push(';');

    Ok(Statement { sql, params })
}

/// `UPDATE source SET "a" = $1,"b" = $2 [WHERE ...]`
pub fn update<I, K>(source: &str, values: I, condition: &str) -> Result<Statement, SqlError>
where
    I: IntoIterator<Item = (K, SqlValue)>,
    K: AsRef<str>,
{
    let (columns, slots, params) = placeholders(values);
    if columns.is_empty() {
        return Err(SqlError::EmptyColumns {
            table: source.to_string(),
        });
    }

    let assignments: Vec<String> = columns
        .iter()
        .zip(slots.iter())
        .map(|(column, slot)| format!("{column} = {slot}"))
        .collect();

    let mut sql = format!("UPDATE {} SET {}", source, assignments.join(","));
    if !condition.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(condition);
    }

    Ok(Statement { sql, params })
}

/// `DELETE FROM source [WHERE ...]`
pub fn delete(source: &str, condition: &str) -> Statement {
    let mut sql = format!("DELETE FROM {}", source);
    if !condition.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(condition);
    }
    Statement::new(sql)
}
