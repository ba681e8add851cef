use crate::model::*;

// ── Availability Index ────────────────────────────────────────────

/// Blocked date ranges of one farm: one range per reservation that still
/// holds its dates (pending with a live hold, confirmed, completed), ordered
/// by check-in. Cancelled and lapsed pending reservations free their dates.
/// Ranges are not merged; the conflict check handles them one by one.
pub fn blocked_ranges<'a, I>(reservations: I, now: Ms) -> Vec<DateRange>
where
    I: IntoIterator<Item = &'a Reservation>,
{
    let mut blocked: Vec<DateRange> = reservations
        .into_iter()
        .filter(|r| r.blocks_dates(now))
        .map(|r| r.range)
        .collect();
    blocked.sort_by_key(|r| r.start);
    blocked
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn range(a: &str, b: &str) -> DateRange {
        DateRange::new(parse_date(a).unwrap(), parse_date(b).unwrap()).unwrap()
    }

    fn reservation(a: &str, b: &str, status: ReservationStatus, hold_expires_at: Option<Ms>) -> Reservation {
        Reservation {
            id: Ulid::new(),
            farm_id: Ulid::new(),
            guest_id: Ulid::new(),
            range: range(a, b),
            guests: 1,
            total_price: 0,
            guest_name: "Ravi".into(),
            guest_contact: "ravi@example.com".into(),
            status,
            hold_expires_at,
            payment_ref: None,
            created_at: 0,
        }
    }

    #[test]
    fn cancelled_reservations_free_dates() {
        let rs = vec![
            reservation("2025-03-10", "2025-03-15", ReservationStatus::Confirmed, None),
            reservation("2025-03-20", "2025-03-22", ReservationStatus::Cancelled, None),
        ];
        assert_eq!(blocked_ranges(&rs, 0), vec![range("2025-03-10", "2025-03-15")]);
    }

    #[test]
    fn live_pending_blocks_lapsed_pending_does_not() {
        let rs = vec![
            reservation("2025-04-01", "2025-04-03", ReservationStatus::Pending, Some(1_000)),
            reservation("2025-05-01", "2025-05-03", ReservationStatus::Pending, Some(5_000)),
        ];
        assert_eq!(blocked_ranges(&rs, 2_000), vec![range("2025-05-01", "2025-05-03")]);
    }

    #[test]
    fn output_is_ordered_by_check_in() {
        let rs = vec![
            reservation("2025-06-01", "2025-06-03", ReservationStatus::Confirmed, None),
            reservation("2025-03-01", "2025-03-03", ReservationStatus::Confirmed, None),
            reservation("2025-04-01", "2025-04-03", ReservationStatus::Completed, None),
        ];
        let starts: Vec<_> = blocked_ranges(&rs, 0).iter().map(|r| r.start.to_string()).collect();
        assert_eq!(starts, vec!["2025-03-01", "2025-04-01", "2025-06-01"]);
    }

    #[test]
    fn adjacent_ranges_are_kept_separate() {
        let rs = vec![
            reservation("2025-03-10", "2025-03-12", ReservationStatus::Confirmed, None),
            reservation("2025-03-13", "2025-03-15", ReservationStatus::Confirmed, None),
        ];
        assert_eq!(blocked_ranges(&rs, 0).len(), 2);
    }

    #[test]
    fn empty_farm_has_nothing_blocked() {
        assert!(blocked_ranges(&Vec::<Reservation>::new(), 0).is_empty());
    }
}
