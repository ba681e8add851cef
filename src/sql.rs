use sqlparser::ast::{
    self, AssignmentTarget, BinaryOperator, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::FarmFilter;

/// How `SELECT * FROM reservations` is narrowed down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationScope {
    Id(Ulid),
    Farm(Ulid),
    Guest(Ulid),
}

/// One statement of the booking SQL surface.
/// Dates stay as the client sent them; the engine decides what they mean.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertFarm {
        id: Ulid,
        title: String,
        location: String,
        nightly_rate: u64,
        capacity: u32,
    },
    DeleteFarm {
        id: Ulid,
    },
    SelectFarms {
        id: Option<Ulid>,
        filter: FarmFilter,
    },
    SelectAvailability {
        farm_id: Ulid,
    },
    SelectQuote {
        farm_id: Ulid,
        start: String,
        end: String,
    },
    InsertReservation {
        id: Ulid,
        farm_id: Ulid,
        guest_id: Ulid,
        start: String,
        end: String,
        guests: u32,
        guest_name: String,
        guest_contact: String,
        pay_later: bool,
    },
    CancelReservation {
        id: Ulid,
        guest_id: Ulid,
    },
    SelectReservations {
        scope: ReservationScope,
    },
    CapturePayment {
        reservation_id: Ulid,
        payment_ref: String,
    },
    InsertReview {
        id: Ulid,
        farm_id: Ulid,
        reservation_id: Ulid,
        guest_id: Ulid,
        rating: i64,
        comment: String,
    },
    UpdateReview {
        id: Ulid,
        guest_id: Ulid,
        rating: Option<i64>,
        comment: Option<String>,
    },
    DeleteReview {
        id: Ulid,
        guest_id: Ulid,
    },
    SelectReviews {
        farm_id: Ulid,
    },
    SelectStats,
    SelectTopFarms {
        limit: Option<usize>,
    },
    SelectMonthlyRevenue {
        months: Option<u32>,
    },
    SelectRecentReservations {
        limit: Option<usize>,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let stmts = Parser::parse_sql(&PostgreSqlDialect {}, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let stmt = match stmts.as_slice() {
        [] => return Err(SqlError::Empty),
        [stmt] => stmt,
        _ => return Err(SqlError::Unsupported("multiple statements".into())),
    };
    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Update {
            table,
            assignments,
            from: None,
            selection,
            ..
        } => parse_update(table, assignments, selection.as_ref()),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── INSERT ───────────────────────────────────────────────────

/// Values of a single-row INSERT, looked up by column name. Without a column
/// list, values are taken in the table's declared column order.
struct Row<'a> {
    table: &'static str,
    columns: Vec<String>,
    values: &'a [Expr],
}

impl<'a> Row<'a> {
    fn new(
        table: &'static str,
        declared: &[&str],
        insert: &ast::Insert,
        values: &'a [Expr],
    ) -> Result<Self, SqlError> {
        let columns: Vec<String> = if insert.columns.is_empty() {
            declared.iter().take(values.len()).map(|c| c.to_string()).collect()
        } else {
            insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
        };
        if columns.len() != values.len() {
            return Err(SqlError::WrongArity(table, columns.len(), values.len()));
        }
        if let Some(unknown) = columns.iter().find(|c| !declared.contains(&c.as_str())) {
            return Err(SqlError::UnknownColumn(table, unknown.clone()));
        }
        Ok(Self { table, columns, values })
    }

    fn get(&self, column: &'static str) -> Option<&'a Expr> {
        self.columns.iter().position(|c| c == column).map(|i| &self.values[i])
    }

    fn required(&self, column: &'static str) -> Result<&'a Expr, SqlError> {
        self.get(column).ok_or(SqlError::MissingColumn(self.table, column))
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = single_values_row(insert)?;

    match table.as_str() {
        "farms" => {
            let row = Row::new("farms", &["id", "title", "location", "nightly_rate", "capacity"], insert, values)?;
            Ok(Command::InsertFarm {
                id: ulid_value(row.required("id")?)?,
                title: string_value(row.required("title")?)?,
                location: string_value(row.required("location")?)?,
                nightly_rate: u64_value(row.required("nightly_rate")?)?,
                capacity: u32_value(row.required("capacity")?)?,
            })
        }
        "reservations" => {
            let row = Row::new(
                "reservations",
                &[
                    "id",
                    "farm_id",
                    "guest_id",
                    "start",
                    "end",
                    "guests",
                    "guest_name",
                    "guest_contact",
                    "pay_later",
                ],
                insert,
                values,
            )?;
            Ok(Command::InsertReservation {
                id: ulid_value(row.required("id")?)?,
                farm_id: ulid_value(row.required("farm_id")?)?,
                guest_id: ulid_value(row.required("guest_id")?)?,
                start: string_value(row.required("start")?)?,
                end: string_value(row.required("end")?)?,
                guests: u32_value(row.required("guests")?)?,
                guest_name: string_value(row.required("guest_name")?)?,
                guest_contact: string_value(row.required("guest_contact")?)?,
                pay_later: row.get("pay_later").map(bool_value).transpose()?.unwrap_or(false),
            })
        }
        "payments" => {
            let row = Row::new("payments", &["reservation_id", "payment_ref"], insert, values)?;
            Ok(Command::CapturePayment {
                reservation_id: ulid_value(row.required("reservation_id")?)?,
                payment_ref: string_value(row.required("payment_ref")?)?,
            })
        }
        "reviews" => {
            let row = Row::new(
                "reviews",
                &["id", "farm_id", "reservation_id", "guest_id", "rating", "comment"],
                insert,
                values,
            )?;
            Ok(Command::InsertReview {
                id: ulid_value(row.required("id")?)?,
                farm_id: ulid_value(row.required("farm_id")?)?,
                reservation_id: ulid_value(row.required("reservation_id")?)?,
                guest_id: ulid_value(row.required("guest_id")?)?,
                rating: i64_value(row.required("rating")?)?,
                comment: string_value(row.required("comment")?)?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── DELETE ───────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let preds = predicates(delete.selection.as_ref())?;

    match table.as_str() {
        "farms" => Ok(Command::DeleteFarm {
            id: ulid_value(preds.eq("id")?)?,
        }),
        "reservations" => Ok(Command::CancelReservation {
            id: ulid_value(preds.eq("id")?)?,
            guest_id: ulid_value(preds.eq("guest_id")?)?,
        }),
        "reviews" => Ok(Command::DeleteReview {
            id: ulid_value(preds.eq("id")?)?,
            guest_id: ulid_value(preds.eq("guest_id")?)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── UPDATE ───────────────────────────────────────────────────

/// Only reviews can be edited, by id and owner.
fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: Option<&Expr>,
) -> Result<Command, SqlError> {
    let name = table_factor_name(&table.relation)?;
    if name != "reviews" {
        return Err(SqlError::Unsupported(format!("UPDATE {name}")));
    }
    let preds = predicates(selection)?;

    let mut rating = None;
    let mut comment = None;
    for assignment in assignments {
        let column = match &assignment.target {
            AssignmentTarget::ColumnName(column) => object_name_last(column),
            AssignmentTarget::Tuple(_) => None,
        }
        .ok_or_else(|| SqlError::Unsupported(format!("SET {assignment}")))?;
        match column.as_str() {
            "rating" => rating = Some(i64_value(&assignment.value)?),
            "comment" => comment = Some(string_value(&assignment.value)?),
            _ => return Err(SqlError::UnknownColumn("reviews", column)),
        }
    }
    if rating.is_none() && comment.is_none() {
        return Err(SqlError::MissingColumn("reviews", "rating or comment"));
    }

    Ok(Command::UpdateReview {
        id: ulid_value(preds.eq("id")?)?,
        guest_id: ulid_value(preds.eq("guest_id")?)?,
        rating,
        comment,
    })
}

// ── SELECT ───────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    let from = select
        .from
        .first()
        .ok_or_else(|| SqlError::Parse("SELECT without FROM".into()))?;
    let table = table_factor_name(&from.relation)?;
    let preds = predicates(select.selection.as_ref())?;

    match table.as_str() {
        "farms" => {
            let mut filter = FarmFilter::default();
            let mut id = None;
            for p in &preds.0 {
                match (p.column.as_str(), &p.op) {
                    ("id", BinaryOperator::Eq) => id = Some(ulid_value(p.value)?),
                    ("location", BinaryOperator::Eq) => filter.location = Some(string_value(p.value)?),
                    ("nightly_rate", BinaryOperator::GtEq) => filter.min_rate = Some(u64_value(p.value)?),
                    ("nightly_rate", BinaryOperator::LtEq) => filter.max_rate = Some(u64_value(p.value)?),
                    ("capacity", BinaryOperator::GtEq) => filter.min_capacity = Some(u32_value(p.value)?),
                    (column, op) => return Err(SqlError::Unsupported(format!("farms filter {column} {op}"))),
                }
            }
            Ok(Command::SelectFarms { id, filter })
        }
        "availability" => Ok(Command::SelectAvailability {
            farm_id: ulid_value(preds.eq("farm_id")?)?,
        }),
        "quote" => Ok(Command::SelectQuote {
            farm_id: ulid_value(preds.eq("farm_id")?)?,
            start: string_value(preds.eq("start")?)?,
            end: string_value(preds.eq("end")?)?,
        }),
        "reservations" => {
            let scope = if let Some(v) = preds.find_eq("id") {
                ReservationScope::Id(ulid_value(v)?)
            } else if let Some(v) = preds.find_eq("farm_id") {
                ReservationScope::Farm(ulid_value(v)?)
            } else if let Some(v) = preds.find_eq("guest_id") {
                ReservationScope::Guest(ulid_value(v)?)
            } else {
                return Err(SqlError::MissingFilter("id, farm_id or guest_id"));
            };
            Ok(Command::SelectReservations { scope })
        }
        "reviews" => Ok(Command::SelectReviews {
            farm_id: ulid_value(preds.eq("farm_id")?)?,
        }),
        "stats" => Ok(Command::SelectStats),
        "top_farms" => Ok(Command::SelectTopFarms {
            limit: rank_limit(&preds, "top_farms")?,
        }),
        "recent_reservations" => Ok(Command::SelectRecentReservations {
            limit: rank_limit(&preds, "recent_reservations")?,
        }),
        "monthly_revenue" => Ok(Command::SelectMonthlyRevenue {
            months: preds.find_eq("months").map(u32_value).transpose()?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// `WHERE rank <= N` on a ranked view.
fn rank_limit(preds: &Predicates<'_>, table: &str) -> Result<Option<usize>, SqlError> {
    match preds.0.iter().find(|p| p.column == "rank") {
        Some(p) if p.op == BinaryOperator::LtEq => Ok(Some(u32_value(p.value)? as usize)),
        Some(p) => Err(SqlError::Unsupported(format!("{table} filter rank {}", p.op))),
        None => Ok(None),
    }
}

// ── WHERE clauses ────────────────────────────────────────────

struct Predicate<'a> {
    column: String,
    op: BinaryOperator,
    value: &'a Expr,
}

/// A WHERE clause flattened into `column <op> value` terms joined by AND.
struct Predicates<'a>(Vec<Predicate<'a>>);

impl<'a> Predicates<'a> {
    fn find_eq(&self, column: &str) -> Option<&'a Expr> {
        self.0
            .iter()
            .find(|p| p.column == column && p.op == BinaryOperator::Eq)
            .map(|p| p.value)
    }

    fn eq(&self, column: &'static str) -> Result<&'a Expr, SqlError> {
        self.find_eq(column).ok_or(SqlError::MissingFilter(column))
    }
}

fn predicates(selection: Option<&Expr>) -> Result<Predicates<'_>, SqlError> {
    let mut out = Vec::new();
    if let Some(expr) = selection {
        flatten_and(expr, &mut out)?;
    }
    Ok(Predicates(out))
}

fn flatten_and<'a>(expr: &'a Expr, out: &mut Vec<Predicate<'a>>) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => flatten_and(inner, out),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            flatten_and(left, out)?;
            flatten_and(right, out)
        }
        Expr::BinaryOp { left, op, right } => {
            let column =
                column_name(left).ok_or_else(|| SqlError::Unsupported(format!("expected a column, got {left}")))?;
            out.push(Predicate {
                column,
                op: op.clone(),
                value: right,
            });
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("WHERE {other}"))),
    }
}

// ── Helpers ──────────────────────────────────────────────────

fn column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let (FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables)) = &delete.from;
    let first = tables
        .first()
        .ok_or_else(|| SqlError::Parse("DELETE without table".into()))?;
    table_factor_name(&first.relation)
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn single_values_row(insert: &ast::Insert) -> Result<&[Expr], SqlError> {
    let source = insert
        .source
        .as_ref()
        .ok_or_else(|| SqlError::Parse("no VALUES".into()))?;
    match source.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [row] => Ok(row.as_slice()),
            [] => Err(SqlError::Parse("empty VALUES".into())),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn literal(expr: &Expr) -> Result<&Value, SqlError> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Ok(value),
        other => Err(SqlError::Parse(format!("expected a literal, got {other}"))),
    }
}

fn string_value(expr: &Expr) -> Result<String, SqlError> {
    match literal(expr)? {
        Value::SingleQuotedString(s) => Ok(s.clone()),
        other => Err(SqlError::Parse(format!("expected a string, got {other}"))),
    }
}

fn ulid_value(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = string_value(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID '{s}': {e}")))
}

fn i64_value(expr: &Expr) -> Result<i64, SqlError> {
    if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        return i64_value(expr).map(|v| -v);
    }
    match literal(expr)? {
        Value::Number(n, _) | Value::SingleQuotedString(n) => {
            n.parse().map_err(|_| SqlError::Parse(format!("bad integer: {n}")))
        }
        other => Err(SqlError::Parse(format!("expected a number, got {other}"))),
    }
}

fn u64_value(expr: &Expr) -> Result<u64, SqlError> {
    let v = i64_value(expr)?;
    u64::try_from(v).map_err(|_| SqlError::Parse(format!("{v} must not be negative")))
}

fn u32_value(expr: &Expr) -> Result<u32, SqlError> {
    let v = i64_value(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of range")))
}

fn bool_value(expr: &Expr) -> Result<bool, SqlError> {
    match literal(expr)? {
        Value::Boolean(b) => Ok(*b),
        Value::SingleQuotedString(s) => match s.to_lowercase().as_str() {
            "true" | "t" | "yes" | "1" => Ok(true),
            "false" | "f" | "no" | "0" => Ok(false),
            _ => Err(SqlError::Parse(format!("bad boolean: {s}"))),
        },
        other => Err(SqlError::Parse(format!("expected a boolean, got {other}"))),
    }
}

// ── Errors ───────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(&'static str, String),
    MissingColumn(&'static str, &'static str),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(t, c) => write!(f, "{t}: unknown column {c}"),
            SqlError::MissingColumn(t, c) => write!(f, "{t}: missing column {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const FARM: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const GUEST: &str = "01BX5ZZKBKACTAV9WEVGEMMVRZ";
    const ITEM: &str = "01BX5ZZKBKACTAV9WEVGEMMVS0";

    fn id(s: &str) -> Ulid {
        Ulid::from_string(s).unwrap()
    }

    #[test]
    fn insert_farm() {
        let sql = format!(
            "INSERT INTO farms (id, title, location, nightly_rate, capacity) VALUES ('{FARM}', 'Mango Grove', 'Goa', 5000, 10)"
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertFarm {
                id: id(FARM),
                title: "Mango Grove".into(),
                location: "Goa".into(),
                nightly_rate: 5000,
                capacity: 10,
            }
        );
    }

    #[test]
    fn insert_columns_may_come_in_any_order() {
        let sql = format!(
            "INSERT INTO farms (capacity, nightly_rate, location, title, id) VALUES (4, 900, 'Ooty', 'Tea Hut', '{FARM}')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertFarm {
                capacity, nightly_rate, ..
            } => {
                assert_eq!(capacity, 4);
                assert_eq!(nightly_rate, 900);
            }
            other => panic!("expected InsertFarm, got {other:?}"),
        }
    }

    #[test]
    fn insert_without_column_list_is_positional() {
        let sql = format!("INSERT INTO farms VALUES ('{FARM}', 'Tea Hut', 'Ooty', 900, 4)");
        assert!(matches!(parse_sql(&sql).unwrap(), Command::InsertFarm { capacity: 4, .. }));
    }

    #[test]
    fn insert_reservation() {
        let sql = format!(
            r#"INSERT INTO reservations (id, farm_id, guest_id, start, "end", guests, guest_name, guest_contact)
               VALUES ('{ITEM}', '{FARM}', '{GUEST}', '2025-03-10', '2025-03-13', 2, 'Anita', 'anita@example.com')"#
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertReservation {
                id: id(ITEM),
                farm_id: id(FARM),
                guest_id: id(GUEST),
                start: "2025-03-10".into(),
                end: "2025-03-13".into(),
                guests: 2,
                guest_name: "Anita".into(),
                guest_contact: "anita@example.com".into(),
                pay_later: false,
            }
        );
    }

    #[test]
    fn insert_reservation_pay_later() {
        let sql = format!(
            r#"INSERT INTO reservations (id, farm_id, guest_id, start, "end", guests, guest_name, guest_contact, pay_later)
               VALUES ('{ITEM}', '{FARM}', '{GUEST}', '2025-03-10T14:00:00Z', '2025-03-12T10:00:00Z', 1, 'A', 'B', true)"#
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertReservation { pay_later, start, .. } => {
                assert!(pay_later);
                assert_eq!(start, "2025-03-10T14:00:00Z");
            }
            other => panic!("expected InsertReservation, got {other:?}"),
        }
    }

    #[test]
    fn insert_missing_column_is_reported() {
        let sql = format!("INSERT INTO payments (reservation_id) VALUES ('{ITEM}')");
        assert!(matches!(
            parse_sql(&sql),
            Err(SqlError::MissingColumn("payments", "payment_ref"))
        ));
        let sql = format!("INSERT INTO payments (reservation_id, amount) VALUES ('{ITEM}', 5)");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownColumn("payments", _))));
    }

    #[test]
    fn insert_payment_and_review() {
        let sql = format!("INSERT INTO payments (reservation_id, payment_ref) VALUES ('{ITEM}', 'pay_77')");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::CapturePayment {
                reservation_id: id(ITEM),
                payment_ref: "pay_77".into(),
            }
        );

        let sql = format!(
            "INSERT INTO reviews (id, farm_id, reservation_id, guest_id, rating, comment) VALUES ('{ITEM}', '{FARM}', '{ITEM}', '{GUEST}', 5, 'Quiet and green')"
        );
        assert!(matches!(parse_sql(&sql).unwrap(), Command::InsertReview { rating: 5, .. }));
    }

    #[test]
    fn delete_statements() {
        let sql = format!("DELETE FROM farms WHERE id = '{FARM}'");
        assert_eq!(parse_sql(&sql).unwrap(), Command::DeleteFarm { id: id(FARM) });

        let sql = format!("DELETE FROM reservations WHERE id = '{ITEM}' AND guest_id = '{GUEST}'");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::CancelReservation {
                id: id(ITEM),
                guest_id: id(GUEST),
            }
        );

        let sql = format!("DELETE FROM reservations WHERE id = '{ITEM}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::MissingFilter("guest_id"))));

        let sql = format!("DELETE FROM reviews WHERE guest_id = '{GUEST}' AND id = '{ITEM}'");
        assert!(matches!(parse_sql(&sql).unwrap(), Command::DeleteReview { .. }));
    }

    #[test]
    fn update_review() {
        let sql = format!("UPDATE reviews SET rating = 3, comment = 'Noisy roosters' WHERE id = '{ITEM}' AND guest_id = '{GUEST}'");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::UpdateReview {
                id: id(ITEM),
                guest_id: id(GUEST),
                rating: Some(3),
                comment: Some("Noisy roosters".into()),
            }
        );

        let sql = format!("UPDATE reviews SET comment = 'Better now' WHERE guest_id = '{GUEST}' AND id = '{ITEM}'");
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::UpdateReview { rating: None, comment: Some(_), .. }
        ));

        let sql = format!("UPDATE reviews SET likes = 3 WHERE id = '{ITEM}' AND guest_id = '{GUEST}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownColumn("reviews", _))));
        let sql = format!("UPDATE reviews SET rating = 3 WHERE id = '{ITEM}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::MissingFilter("guest_id"))));
        let sql = format!("UPDATE farms SET capacity = 3 WHERE id = '{FARM}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn select_farms_with_filters() {
        assert_eq!(
            parse_sql("SELECT * FROM farms").unwrap(),
            Command::SelectFarms {
                id: None,
                filter: FarmFilter::default(),
            }
        );
        let sql = "SELECT * FROM farms WHERE location = 'goa' AND nightly_rate >= 1000 AND nightly_rate <= 6000 AND capacity >= 4";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::SelectFarms {
                id: None,
                filter: FarmFilter {
                    location: Some("goa".into()),
                    min_rate: Some(1000),
                    max_rate: Some(6000),
                    min_capacity: Some(4),
                },
            }
        );
        assert!(matches!(
            parse_sql("SELECT * FROM farms WHERE capacity < 4"),
            Err(SqlError::Unsupported(_))
        ));
        assert!(matches!(
            parse_sql("SELECT * FROM farms WHERE location = 'goa' OR capacity >= 4"),
            Err(SqlError::Unsupported(_))
        ));
    }

    #[test]
    fn select_availability_and_quote() {
        let sql = format!("SELECT * FROM availability WHERE farm_id = '{FARM}'");
        assert_eq!(parse_sql(&sql).unwrap(), Command::SelectAvailability { farm_id: id(FARM) });

        let sql = format!(r#"SELECT * FROM quote WHERE farm_id = '{FARM}' AND start = '2025-03-10' AND "end" = '2025-03-13'"#);
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::SelectQuote {
                farm_id: id(FARM),
                start: "2025-03-10".into(),
                end: "2025-03-13".into(),
            }
        );

        assert!(matches!(
            parse_sql("SELECT * FROM availability"),
            Err(SqlError::MissingFilter("farm_id"))
        ));
    }

    #[test]
    fn select_reservations_by_scope() {
        let by_guest = format!("SELECT * FROM reservations WHERE guest_id = '{GUEST}'");
        assert_eq!(
            parse_sql(&by_guest).unwrap(),
            Command::SelectReservations {
                scope: ReservationScope::Guest(id(GUEST)),
            }
        );
        let by_farm = format!("SELECT * FROM reservations WHERE farm_id = '{FARM}'");
        assert!(matches!(
            parse_sql(&by_farm).unwrap(),
            Command::SelectReservations {
                scope: ReservationScope::Farm(_)
            }
        ));
        let by_id = format!("SELECT * FROM reservations WHERE id = '{ITEM}'");
        assert!(matches!(
            parse_sql(&by_id).unwrap(),
            Command::SelectReservations {
                scope: ReservationScope::Id(_)
            }
        ));
        assert!(parse_sql("SELECT * FROM reservations").is_err());
    }

    #[test]
    fn select_analytics() {
        assert_eq!(parse_sql("SELECT * FROM stats").unwrap(), Command::SelectStats);
        assert_eq!(
            parse_sql("SELECT * FROM top_farms").unwrap(),
            Command::SelectTopFarms { limit: None }
        );
        assert_eq!(
            parse_sql("SELECT * FROM top_farms WHERE rank <= 3").unwrap(),
            Command::SelectTopFarms { limit: Some(3) }
        );
        assert_eq!(
            parse_sql("SELECT * FROM monthly_revenue WHERE months = 12").unwrap(),
            Command::SelectMonthlyRevenue { months: Some(12) }
        );
        assert_eq!(
            parse_sql("SELECT * FROM recent_reservations").unwrap(),
            Command::SelectRecentReservations { limit: None }
        );
        assert_eq!(
            parse_sql("SELECT * FROM recent_reservations WHERE rank <= 3").unwrap(),
            Command::SelectRecentReservations { limit: Some(3) }
        );
    }

    #[test]
    fn bad_ids_and_numbers() {
        let sql = "SELECT * FROM availability WHERE farm_id = 'not-a-ulid'";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
        let sql = format!("INSERT INTO farms VALUES ('{FARM}', 'Hut', 'Ooty', -5, 4)");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn unknown_tables_and_empty_input() {
        assert!(matches!(parse_sql("SELECT * FROM guests"), Err(SqlError::UnknownTable(_))));
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
        assert!(matches!(parse_sql("SELEC * FROM farms"), Err(SqlError::Parse(_))));
        assert!(matches!(
            parse_sql("SELECT * FROM stats; SELECT * FROM stats"),
            Err(SqlError::Unsupported(_))
        ));
    }
}
