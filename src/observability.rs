use std::io;
use std::net::SocketAddr;

use crate::sql::Command;

// ── Requests ─────────────────────────────────────────────────────

/// Counter: statements executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "farmstay_queries_total";

/// Histogram: statement latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "farmstay_query_duration_seconds";

// ── Connections ──────────────────────────────────────────────────

/// Gauge: open client connections.
pub const CONNECTIONS_ACTIVE: &str = "farmstay_connections_active";

/// Counter: connections accepted.
pub const CONNECTIONS_TOTAL: &str = "farmstay_connections_total";

/// Counter: connections turned away at the connection limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "farmstay_connections_rejected_total";

// ── Bookings ─────────────────────────────────────────────────────

/// Counter: reservations placed. Labels: status (pending or confirmed).
pub const RESERVATIONS_CREATED_TOTAL: &str = "farmstay_reservations_created_total";

/// Counter: reservation attempts refused because the dates were taken.
pub const RESERVATION_CONFLICTS_TOTAL: &str = "farmstay_reservation_conflicts_total";

/// Counter: reservations cancelled by guests.
pub const RESERVATIONS_CANCELLED_TOTAL: &str = "farmstay_reservations_cancelled_total";

/// Counter: unpaid holds that lapsed.
pub const RESERVATIONS_EXPIRED_TOTAL: &str = "farmstay_reservations_expired_total";

// ── Storage ──────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "farmstay_wal_flush_duration_seconds";

/// Histogram: events per WAL group commit.
pub const WAL_FLUSH_BATCH_SIZE: &str = "farmstay_wal_flush_batch_size";

/// Serve Prometheus metrics on `port`. Without a port, metrics are recorded
/// into the no-op recorder.
pub fn init(port: Option<u16>) -> io::Result<()> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| io::Error::other(format!("metrics exporter: {e}")))?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short metric label for a command.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertFarm { .. } => "insert_farm",
        Command::DeleteFarm { .. } => "delete_farm",
        Command::SelectFarms { .. } => "select_farms",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectQuote { .. } => "select_quote",
        Command::InsertReservation { .. } => "insert_reservation",
        Command::CancelReservation { .. } => "cancel_reservation",
        Command::SelectReservations { .. } => "select_reservations",
        Command::CapturePayment { .. } => "capture_payment",
        Command::InsertReview { .. } => "insert_review",
        Command::UpdateReview { .. } => "update_review",
        Command::DeleteReview { .. } => "delete_review",
        Command::SelectReviews { .. } => "select_reviews",
        Command::SelectStats => "select_stats",
        Command::SelectTopFarms { .. } => "select_top_farms",
        Command::SelectMonthlyRevenue { .. } => "select_monthly_revenue",
        Command::SelectRecentReservations { .. } => "select_recent_reservations",
    }
}
