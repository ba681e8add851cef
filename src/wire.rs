use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::FarmstayAuthSource;
use crate::engine::{parse_stay, EngineError, Quote};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command, ReservationScope};

/// SQLSTATE codes the server answers with. Clients branch on these.
pub mod sqlstate {
    pub const INVALID_PARAMETER: &str = "22023";
    pub const EXCLUSION_VIOLATION: &str = "23P01";
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const NO_DATA_FOUND: &str = "P0002";
    pub const INSUFFICIENT_PRIVILEGE: &str = "42501";
    pub const OBJECT_NOT_IN_STATE: &str = "55000";
    pub const PROGRAM_LIMIT_EXCEEDED: &str = "54000";
    pub const IO_ERROR: &str = "58030";
    pub const SYNTAX_ERROR: &str = "42601";
}

pub struct FarmstayHandler {
    engine: Arc<crate::engine::Engine>,
    query_parser: Arc<FarmstayQueryParser>,
}

impl FarmstayHandler {
    pub fn new(engine: Arc<crate::engine::Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(FarmstayQueryParser),
        }
    }

    async fn run(&self, query: &str) -> PgWireResult<Vec<Response>> {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(&self, cmd: Command) -> PgWireResult<Vec<Response>> {
        let engine = &self.engine;
        match cmd {
            Command::InsertFarm {
                id,
                title,
                location,
                nightly_rate,
                capacity,
            } => {
                engine
                    .create_farm(id, title, location, nightly_rate, capacity)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::DeleteFarm { id } => {
                engine.delete_farm(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::SelectFarms { id, filter } => {
                let listings = match id {
                    Some(id) => vec![engine.get_farm(id).await.map_err(engine_err)?],
                    None => engine.search_farms(&filter).await,
                };
                Ok(vec![farm_rows(&listings)])
            }
            Command::SelectAvailability { farm_id } => {
                let blocked = engine.availability(farm_id).await.map_err(engine_err)?;
                let schema = Arc::new(availability_schema());
                let farm = farm_id.to_string();
                let rows: Vec<PgWireResult<_>> = blocked
                    .iter()
                    .map(|range| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&farm)?;
                        encoder.encode_field(&range.start.to_string())?;
                        encoder.encode_field(&range.end.to_string())?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectQuote { farm_id, start, end } => {
                let range = parse_stay(&start, &end).map_err(|e| engine_err(e.into()))?;
                let quote = engine.quote(farm_id, range).await.map_err(engine_err)?;
                Ok(vec![quote_row(&quote)?])
            }
            Command::InsertReservation {
                id,
                farm_id,
                guest_id,
                start,
                end,
                guests,
                guest_name,
                guest_contact,
                pay_later,
            } => {
                let range = parse_stay(&start, &end).map_err(|e| engine_err(e.into()))?;
                let reservation = engine
                    .create_reservation(NewReservation {
                        id,
                        farm_id,
                        guest_id,
                        range,
                        guests,
                        guest_name,
                        guest_contact,
                        pay_later,
                    })
                    .await
                    .map_err(engine_err)?;
                Ok(vec![reservation_rows(std::slice::from_ref(&reservation))])
            }
            Command::CancelReservation { id, guest_id } => {
                let reservation = engine
                    .cancel_reservation(id, guest_id)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![reservation_rows(std::slice::from_ref(&reservation))])
            }
            Command::SelectReservations { scope } => {
                let reservations = match scope {
                    ReservationScope::Id(id) => vec![engine.get_reservation(id).await.map_err(engine_err)?],
                    ReservationScope::Farm(farm_id) => {
                        engine.reservations_for_farm(farm_id).await.map_err(engine_err)?
                    }
                    ReservationScope::Guest(guest_id) => engine.reservations_for_guest(guest_id).await,
                };
                Ok(vec![reservation_rows(&reservations)])
            }
            Command::CapturePayment {
                reservation_id,
                payment_ref,
            } => {
                let reservation = engine
                    .capture_payment(reservation_id, payment_ref)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![reservation_rows(std::slice::from_ref(&reservation))])
            }
            Command::InsertReview {
                id,
                farm_id,
                reservation_id,
                guest_id,
                rating,
                comment,
            } => {
                engine
                    .add_review(id, farm_id, reservation_id, guest_id, rating, comment)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateReview {
                id,
                guest_id,
                rating,
                comment,
            } => {
                engine
                    .update_review(id, guest_id, rating, comment)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteReview { id, guest_id } => {
                engine.remove_review(id, guest_id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::SelectReviews { farm_id } => {
                let (reviews, _) = engine.reviews_for_farm(farm_id).await.map_err(engine_err)?;
                Ok(vec![review_rows(&reviews)])
            }
            Command::SelectStats => {
                let stats = engine.dashboard_stats().await;
                let schema = Arc::new(stats_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&to_i64(stats.total_revenue))?;
                encoder.encode_field(&(stats.active_reservations as i64))?;
                encoder.encode_field(&(stats.total_farms as i64))?;
                let rows = vec![Ok(encoder.take_row())];
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectTopFarms { limit } => {
                let ranking = engine
                    .top_farms(limit.unwrap_or(crate::limits::DEFAULT_TOP_FARMS))
                    .await;
                let schema = Arc::new(top_farms_schema());
                let rows: Vec<PgWireResult<_>> = ranking
                    .iter()
                    .enumerate()
                    .map(|(i, farm)| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&(i as i64 + 1))?;
                        encoder.encode_field(&farm.farm_id.to_string())?;
                        encoder.encode_field(&farm.title)?;
                        encoder.encode_field(&(farm.reservations as i64))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectRecentReservations { limit } => {
                let recent = engine
                    .recent_reservations(limit.unwrap_or(crate::limits::DEFAULT_RECENT_RESERVATIONS))
                    .await;
                Ok(vec![reservation_rows(&recent)])
            }
            Command::SelectMonthlyRevenue { months } => {
                let revenue = engine
                    .monthly_revenue(months.unwrap_or(crate::limits::DEFAULT_REVENUE_MONTHS))
                    .await;
                let schema = Arc::new(monthly_revenue_schema());
                let rows: Vec<PgWireResult<_>> = revenue
                    .iter()
                    .map(|m| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&m.year)?;
                        encoder.encode_field(&(m.month as i32))?;
                        encoder.encode_field(&to_i64(m.revenue))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
        }
    }
}

// ── Result rows ──────────────────────────────────────────────────

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn farms_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("title", Type::VARCHAR),
        field("location", Type::VARCHAR),
        field("nightly_rate", Type::INT8),
        field("capacity", Type::INT8),
        field("average_rating", Type::FLOAT8),
        field("review_count", Type::INT8),
    ]
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        field("farm_id", Type::VARCHAR),
        field("start", Type::VARCHAR),
        field("end", Type::VARCHAR),
    ]
}

fn quote_schema() -> Vec<FieldInfo> {
    vec![
        field("nights", Type::INT8),
        field("nightly_rate", Type::INT8),
        field("total_price", Type::INT8),
    ]
}

fn reservations_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("farm_id", Type::VARCHAR),
        field("guest_id", Type::VARCHAR),
        field("start", Type::VARCHAR),
        field("end", Type::VARCHAR),
        field("nights", Type::INT8),
        field("guests", Type::INT8),
        field("total_price", Type::INT8),
        field("guest_name", Type::VARCHAR),
        field("guest_contact", Type::VARCHAR),
        field("status", Type::VARCHAR),
        field("payment_ref", Type::VARCHAR),
        field("hold_expires_at", Type::INT8),
        field("created_at", Type::INT8),
    ]
}

fn reviews_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("farm_id", Type::VARCHAR),
        field("reservation_id", Type::VARCHAR),
        field("guest_id", Type::VARCHAR),
        field("rating", Type::INT8),
        field("comment", Type::VARCHAR),
        field("created_at", Type::INT8),
    ]
}

fn stats_schema() -> Vec<FieldInfo> {
    vec![
        field("total_revenue", Type::INT8),
        field("active_reservations", Type::INT8),
        field("total_farms", Type::INT8),
    ]
}

fn top_farms_schema() -> Vec<FieldInfo> {
    vec![
        field("rank", Type::INT8),
        field("farm_id", Type::VARCHAR),
        field("title", Type::VARCHAR),
        field("reservations", Type::INT8),
    ]
}

fn monthly_revenue_schema() -> Vec<FieldInfo> {
    vec![
        field("year", Type::INT4),
        field("month", Type::INT4),
        field("revenue", Type::INT8),
    ]
}

fn farm_rows(listings: &[FarmListing]) -> Response {
    let schema = Arc::new(farms_schema());
    let rows: Vec<PgWireResult<_>> = listings
        .iter()
        .map(|listing| {
            let farm = &listing.farm;
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&farm.id.to_string())?;
            encoder.encode_field(&farm.title)?;
            encoder.encode_field(&farm.location)?;
            encoder.encode_field(&to_i64(farm.nightly_rate))?;
            encoder.encode_field(&(farm.capacity as i64))?;
            encoder.encode_field(&listing.reviews.average_rating)?;
            encoder.encode_field(&(listing.reviews.total_reviews as i64))?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn quote_row(quote: &Quote) -> PgWireResult<Response> {
    let schema = Arc::new(quote_schema());
    let mut encoder = DataRowEncoder::new(schema.clone());
    encoder.encode_field(&(quote.nights as i64))?;
    encoder.encode_field(&to_i64(quote.nightly_rate))?;
    encoder.encode_field(&to_i64(quote.total_price))?;
    let rows = vec![Ok(encoder.take_row())];
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
}

fn reservation_rows(reservations: &[Reservation]) -> Response {
    let schema = Arc::new(reservations_schema());
    let rows: Vec<PgWireResult<_>> = reservations
        .iter()
        .map(|r| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&r.id.to_string())?;
            encoder.encode_field(&r.farm_id.to_string())?;
            encoder.encode_field(&r.guest_id.to_string())?;
            encoder.encode_field(&r.range.start.to_string())?;
            encoder.encode_field(&r.range.end.to_string())?;
            encoder.encode_field(&r.range.nights())?;
            encoder.encode_field(&(r.guests as i64))?;
            encoder.encode_field(&to_i64(r.total_price))?;
            encoder.encode_field(&r.guest_name)?;
            encoder.encode_field(&r.guest_contact)?;
            encoder.encode_field(&r.status.to_string())?;
            encoder.encode_field(&r.payment_ref)?;
            encoder.encode_field(&r.hold_expires_at)?;
            encoder.encode_field(&r.created_at)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn review_rows(reviews: &[Review]) -> Response {
    let schema = Arc::new(reviews_schema());
    let rows: Vec<PgWireResult<_>> = reviews
        .iter()
        .map(|r| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&r.id.to_string())?;
            encoder.encode_field(&r.farm_id.to_string())?;
            encoder.encode_field(&r.reservation_id.to_string())?;
            encoder.encode_field(&r.guest_id.to_string())?;
            encoder.encode_field(&(r.rating as i64))?;
            encoder.encode_field(&r.comment)?;
            encoder.encode_field(&r.created_at)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

/// Table a statement reads from or writes to, from its first FROM/INTO.
fn statement_table(sql: &str) -> Option<String> {
    let lower = sql.to_lowercase();
    let mut tokens = lower.split_whitespace();
    while let Some(tok) = tokens.next() {
        if tok == "from" || tok == "into" {
            return tokens.next().map(|t| {
                t.trim_matches(|c: char| c == '"' || c == ';' || c == '(')
                    .split('(')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            });
        }
    }
    None
}

/// Row shape a statement answers with, for Describe.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let is_select = sql.trim_start().to_lowercase().starts_with("select");
    match statement_table(sql).as_deref() {
        Some("farms") if is_select => farms_schema(),
        Some("availability") => availability_schema(),
        Some("quote") => quote_schema(),
        Some("reservations") | Some("payments") | Some("recent_reservations") => reservations_schema(),
        Some("reviews") if is_select => reviews_schema(),
        Some("stats") => stats_schema(),
        Some("top_farms") => top_farms_schema(),
        Some("monthly_revenue") => monthly_revenue_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for FarmstayHandler {
    async fn do_query<C>(&self, _client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        self.run(query).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct FarmstayQueryParser;

#[async_trait]
impl QueryParser for FarmstayQueryParser {
    type Statement = String;

    async fn parse_sql<C>(&self, _client: &C, sql: &str, _types: &[Option<Type>]) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(&self, stmt: &String, _column_format: Option<&Format>) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for FarmstayHandler {
    type Statement = String;
    type QueryParser = FarmstayQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        let mut responses = self.run(&sql).await?;
        responses
            .pop()
            .ok_or_else(|| user_error(sqlstate::SYNTAX_ERROR, "statement produced no result".into()))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(param_types, result_schema(&target.statement)))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(&target.statement.statement)))
    }
}

/// Highest `$N` placeholder in the statement.
fn count_params(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut max = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        i += 1;
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if let Ok(n) = sql[start..i].parse::<usize>() {
            max = max.max(n);
        }
    }
    max
}

fn substitute_params(portal: &Portal<String>) -> String {
    inline_params(&portal.statement.statement, &portal.parameters)
}

/// Inline bound text parameters as quoted literals in one left-to-right pass,
/// so text inside a bound value is never read as a placeholder. Placeholders
/// without a bound value are left as they are.
fn inline_params<P: AsRef<[u8]>>(sql: &str, params: &[Option<P>]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let param = after[..digits]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| params.get(i));
        match param {
            Some(Some(bytes)) => {
                out.push('\'');
                out.push_str(&String::from_utf8_lossy(bytes.as_ref()).replace('\'', "''"));
                out.push('\'');
            }
            Some(None) => out.push_str("NULL"),
            None => out.push_str(&rest[pos..pos + 1 + digits]),
        }
        rest = &after[digits..];
    }
    out.push_str(rest);
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct FarmstayFactory {
    handler: Arc<FarmstayHandler>,
    auth_handler: Arc<CleartextPasswordAuthStartupHandler<FarmstayAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl FarmstayFactory {
    pub fn new(engine: Arc<crate::engine::Engine>, password: String) -> Self {
        Self {
            handler: Arc::new(FarmstayHandler::new(engine)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                FarmstayAuthSource::new(password),
                DefaultServerParameterProvider::default(),
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for FarmstayFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<crate::engine::Engine>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = Arc::new(FarmstayFactory::new(engine, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new("ERROR".into(), code.into(), message)))
}

/// SQLSTATE for an engine error.
pub fn error_code(e: &EngineError) -> &'static str {
    match e {
        EngineError::Validation(_) => sqlstate::INVALID_PARAMETER,
        EngineError::Conflict { .. } => sqlstate::EXCLUSION_VIOLATION,
        EngineError::AlreadyExists(_) => sqlstate::UNIQUE_VIOLATION,
        EngineError::NotFound(_) => sqlstate::NO_DATA_FOUND,
        EngineError::Forbidden(_) => sqlstate::INSUFFICIENT_PRIVILEGE,
        EngineError::CannotCancel { .. }
        | EngineError::InvalidState { .. }
        | EngineError::HasActiveReservations(_) => sqlstate::OBJECT_NOT_IN_STATE,
        EngineError::LimitExceeded(_) => sqlstate::PROGRAM_LIMIT_EXCEEDED,
        EngineError::WalError(_) => sqlstate::IO_ERROR,
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    if e.is_transient() {
        tracing::error!("storage failure: {e}");
    }
    user_error(error_code(&e), e.to_string())
}

fn sql_err(e: sql::SqlError) -> PgWireError {
    user_error(sqlstate::SYNTAX_ERROR, e.to_string())
}
