use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use ulid::Ulid;

use crate::clock::date_of;
use crate::limits::*;
use crate::model::*;

use super::availability::blocked_ranges;
use super::conflict::validate_range;
use super::quote::{quote, Quote};
use super::{Engine, EngineError};

fn listing(farm: &FarmState) -> FarmListing {
    FarmListing {
        farm: farm.info(),
        reviews: ReviewSummary::from_reviews(&farm.reviews),
    }
}

fn earns_revenue(status: ReservationStatus) -> bool {
    matches!(status, ReservationStatus::Confirmed | ReservationStatus::Completed)
}

/// `(year, month)` shifted back by `back` months.
fn months_before(year: i32, month: u32, back: u32) -> (i32, u32) {
    let index = year * 12 + (month as i32 - 1) - back as i32;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

impl Engine {
    /// Blocked ranges of a farm, ordered by check-in.
    pub async fn availability(&self, farm_id: Ulid) -> Result<Vec<DateRange>, EngineError> {
        let farm = self.get_farm_state(&farm_id).ok_or(EngineError::NotFound(farm_id))?;
        let guard = farm.read().await;
        Ok(blocked_ranges(&guard.reservations, self.now_ms()))
    }

    pub async fn quote(&self, farm_id: Ulid, range: DateRange) -> Result<Quote, EngineError> {
        validate_range(&range)?;
        let farm = self.get_farm_state(&farm_id).ok_or(EngineError::NotFound(farm_id))?;
        let rate = farm.read().await.nightly_rate;
        Ok(quote(&range, rate)?)
    }

    pub async fn get_farm(&self, id: Ulid) -> Result<FarmListing, EngineError> {
        let farm = self.get_farm_state(&id).ok_or(EngineError::NotFound(id))?;
        let guard = farm.read().await;
        Ok(listing(&guard))
    }

    /// Farms matching every set filter, oldest listing first.
    pub async fn search_farms(&self, filter: &FarmFilter) -> Vec<FarmListing> {
        let mut out = Vec::new();
        for farm in self.farm_handles() {
            let guard = farm.read().await;
            if filter.matches(&guard) {
                out.push(listing(&guard));
            }
        }
        out.sort_by_key(|l| l.farm.id);
        out
    }

    pub async fn get_reservation(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let farm_id = self.farm_for_entity(&id).ok_or(EngineError::NotFound(id))?;
        let farm = self.get_farm_state(&farm_id).ok_or(EngineError::NotFound(id))?;
        let guard = farm.read().await;
        let now = self.now_ms();
        guard
            .reservation(&id)
            .map(|r| r.as_of(date_of(now), now))
            .ok_or(EngineError::NotFound(id))
    }

    /// Every reservation of a farm with its current status, by check-in.
    pub async fn reservations_for_farm(&self, farm_id: Ulid) -> Result<Vec<Reservation>, EngineError> {
        let farm = self.get_farm_state(&farm_id).ok_or(EngineError::NotFound(farm_id))?;
        let guard = farm.read().await;
        let now = self.now_ms();
        let today = date_of(now);
        Ok(guard.reservations.iter().map(|r| r.as_of(today, now)).collect())
    }

    /// A guest's reservations across all farms, most recently placed first.
    pub async fn reservations_for_guest(&self, guest_id: Ulid) -> Vec<Reservation> {
        let now = self.now_ms();
        let today = date_of(now);
        let mut out = Vec::new();
        for farm in self.farm_handles() {
            let guard = farm.read().await;
            out.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|r| r.guest_id == guest_id)
                    .map(|r| r.as_of(today, now)),
            );
        }
        out.sort_by_key(|r| Reverse((r.created_at, r.id)));
        out
    }

    /// Reviews of a farm, newest first, with the rating summary.
    pub async fn reviews_for_farm(&self, farm_id: Ulid) -> Result<(Vec<Review>, ReviewSummary), EngineError> {
        let farm = self.get_farm_state(&farm_id).ok_or(EngineError::NotFound(farm_id))?;
        let guard = farm.read().await;
        let mut reviews = guard.reviews.clone();
        reviews.sort_by_key(|r| Reverse((r.created_at, r.id)));
        Ok((reviews, ReviewSummary::from_reviews(&guard.reviews)))
    }

    // ── Admin analytics ──────────────────────────────────────────

    pub async fn dashboard_stats(&self) -> DashboardStats {
        let now = self.now_ms();
        let today = date_of(now);
        let mut stats = DashboardStats::default();
        for farm in self.farm_handles() {
            let guard = farm.read().await;
            stats.total_farms += 1;
            for r in &guard.reservations {
                let status = r.effective_status(today, now);
                if status != ReservationStatus::Cancelled {
                    stats.active_reservations += 1;
                }
                if earns_revenue(status) {
                    stats.total_revenue = stats.total_revenue.saturating_add(r.total_price);
                }
            }
        }
        stats
    }

    /// The most recently placed reservations across all farms, newest first.
    pub async fn recent_reservations(&self, limit: usize) -> Vec<Reservation> {
        let now = self.now_ms();
        let today = date_of(now);
        let mut out = Vec::new();
        for farm in self.farm_handles() {
            let guard = farm.read().await;
            out.extend(guard.reservations.iter().map(|r| r.as_of(today, now)));
        }
        out.sort_by_key(|r| Reverse((r.created_at, r.id)));
        out.truncate(limit.min(MAX_RECENT_RESERVATIONS));
        out
    }

    /// Farms with the most non-cancelled reservations.
    pub async fn top_farms(&self, limit: usize) -> Vec<FarmRanking> {
        let now = self.now_ms();
        let today = date_of(now);
        let mut ranking = Vec::new();
        for farm in self.farm_handles() {
            let guard = farm.read().await;
            let reservations = guard
                .reservations
                .iter()
                .filter(|r| r.effective_status(today, now) != ReservationStatus::Cancelled)
                .count();
            ranking.push(FarmRanking {
                farm_id: guard.id,
                title: guard.title.clone(),
                reservations,
            });
        }
        ranking.sort_by_key(|f| (Reverse(f.reservations), f.farm_id));
        ranking.truncate(limit.min(MAX_TOP_FARMS));
        ranking
    }

    /// Revenue per UTC month of booking over the last `months` months
    /// (current month included), oldest first. Empty months are omitted.
    pub async fn monthly_revenue(&self, months: u32) -> Vec<MonthlyRevenue> {
        let months = months.clamp(1, MAX_REVENUE_MONTHS);
        let now = self.now_ms();
        let today = date_of(now);
        let window_start = months_before(today.year(), today.month(), months - 1);

        let mut buckets: BTreeMap<(i32, u32), u64> = BTreeMap::new();
        for farm in self.farm_handles() {
            let guard = farm.read().await;
            for r in &guard.reservations {
                if !earns_revenue(r.effective_status(today, now)) {
                    continue;
                }
                let Some(booked) = DateTime::<Utc>::from_timestamp_millis(r.created_at) else {
                    continue;
                };
                let key = (booked.year(), booked.month());
                if key >= window_start {
                    let slot = buckets.entry(key).or_default();
                    *slot = slot.saturating_add(r.total_price);
                }
            }
        }
        buckets
            .into_iter()
            .map(|((year, month), revenue)| MonthlyRevenue { year, month, revenue })
            .collect()
    }
}
