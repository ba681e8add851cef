use async_trait::async_trait;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage, SimpleQueryRow};
use ulid::Ulid;

use crate::model::*;
use crate::wire::sqlstate;

use super::store::{ReservationStore, StoreError};

/// Reservation store on the far side of a farmstay server connection.
pub struct RemoteStore {
    client: Client,
}

impl RemoteStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect without TLS and drive the connection on a background task.
    pub async fn connect(config: &Config) -> Result<Self, tokio_postgres::Error> {
        let (client, connection) = config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("farmstay connection closed: {e}");
            }
        });
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn rows(&self, sql: &str) -> Result<Vec<SimpleQueryRow>, StoreError> {
        let messages = self.client.simple_query(sql).await.map_err(store_error)?;
        Ok(messages
            .into_iter()
            .filter_map(|m| match m {
                SimpleQueryMessage::Row(row) => Some(row),
                _ => None,
            })
            .collect())
    }
}

fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn text<'a>(row: &'a SimpleQueryRow, column: &str) -> Result<&'a str, StoreError> {
    row.try_get(column)
        .ok()
        .flatten()
        .ok_or_else(|| StoreError::Transient(format!("malformed row: missing {column}")))
}

fn parsed<T: std::str::FromStr>(row: &SimpleQueryRow, column: &str) -> Result<T, StoreError> {
    text(row, column)?
        .parse()
        .map_err(|_| StoreError::Transient(format!("malformed row: bad {column}")))
}

fn date(row: &SimpleQueryRow, column: &str) -> Result<chrono::NaiveDate, StoreError> {
    parse_date(text(row, column)?).map_err(|e| StoreError::Transient(format!("malformed row: {e}")))
}

fn range(row: &SimpleQueryRow) -> Result<DateRange, StoreError> {
    DateRange::new(date(row, "start")?, date(row, "end")?)
        .map_err(|e| StoreError::Transient(format!("malformed row: {e}")))
}

fn reservation(row: &SimpleQueryRow) -> Result<Reservation, StoreError> {
    Ok(Reservation {
        id: parsed(row, "id")?,
        farm_id: parsed(row, "farm_id")?,
        guest_id: parsed(row, "guest_id")?,
        range: range(row)?,
        guests: parsed(row, "guests")?,
        total_price: parsed(row, "total_price")?,
        guest_name: text(row, "guest_name")?.to_string(),
        guest_contact: text(row, "guest_contact")?.to_string(),
        status: parsed(row, "status")?,
        hold_expires_at: row
            .try_get("hold_expires_at")
            .ok()
            .flatten()
            .and_then(|s| s.parse().ok()),
        payment_ref: row.try_get("payment_ref").ok().flatten().map(str::to_string),
        created_at: parsed(row, "created_at")?,
    })
}

/// Map a server error by SQLSTATE. A conflict message ends with the taken
/// range in `[start, end)` form.
fn store_error(e: tokio_postgres::Error) -> StoreError {
    let Some(db) = e.as_db_error() else {
        return StoreError::Transient(e.to_string());
    };
    let message = db.message().to_string();
    match db.code().code() {
        sqlstate::EXCLUSION_VIOLATION => match conflict_range(&message) {
            Some(range) => StoreError::Conflict(range),
            None => StoreError::Refused(message),
        },
        sqlstate::INVALID_PARAMETER => StoreError::Invalid(message),
        sqlstate::NO_DATA_FOUND => StoreError::NotFound(message),
        sqlstate::IO_ERROR => StoreError::Transient(message),
        _ => StoreError::Refused(message),
    }
}

fn conflict_range(message: &str) -> Option<DateRange> {
    let open = message.rfind('[')?;
    let close = open + message[open..].find(')')?;
    message[open..=close].parse().ok()
}

#[async_trait]
impl ReservationStore for RemoteStore {
    async fn get_farm(&self, farm_id: Ulid) -> Result<FarmInfo, StoreError> {
        let rows = self
            .rows(&format!("SELECT * FROM farms WHERE id = '{farm_id}'"))
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| StoreError::NotFound(farm_id.to_string()))?;
        Ok(FarmInfo {
            id: parsed(row, "id")?,
            title: text(row, "title")?.to_string(),
            location: text(row, "location")?.to_string(),
            nightly_rate: parsed(row, "nightly_rate")?,
            capacity: parsed(row, "capacity")?,
        })
    }

    async fn availability(&self, farm_id: Ulid) -> Result<Vec<DateRange>, StoreError> {
        self.rows(&format!("SELECT * FROM availability WHERE farm_id = '{farm_id}'"))
            .await?
            .iter()
            .map(range)
            .collect()
    }

    async fn create_reservation(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let sql = format!(
            "INSERT INTO reservations (id, farm_id, guest_id, start, \"end\", guests, guest_name, guest_contact, pay_later) \
             VALUES ('{}', '{}', '{}', '{}', '{}', {}, {}, {}, {})",
            new.id,
            new.farm_id,
            new.guest_id,
            new.range.start,
            new.range.end,
            new.guests,
            literal(&new.guest_name),
            literal(&new.guest_contact),
            new.pay_later,
        );
        let rows = self.rows(&sql).await?;
        let row = rows
            .first()
            .ok_or_else(|| StoreError::Transient("server returned no reservation".into()))?;
        reservation(row)
    }
}
