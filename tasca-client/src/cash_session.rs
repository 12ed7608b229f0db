//! Cash session aggregator
//!
//! Groups finalized sale payments collected while a cash session is open
//! and derives, lazily and without server round-trips, date-bucketed
//! subsets, per-method subtotals and a manual marked/unmarked triage
//! filter. Entries are append-only; corrections happen by adjusting the
//! underlying sale upstream, never here.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::models::{CashEntry, CashSession, Sale, SaleStatus};
use shared::types::Timestamp;

use crate::payment::{to_decimal, to_f64};

/// Calendar day (UTC) a timestamp falls on
pub fn day_of(timestamp: Timestamp) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(timestamp)
        .unwrap_or_default()
        .date_naive()
}

/// Selected calendar day, navigable one day at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCursor {
    date: NaiveDate,
}

impl DayCursor {
    /// Default selection: today
    pub fn today() -> Self {
        Self {
            date: Utc::now().date_naive(),
        }
    }

    pub fn at(date: NaiveDate) -> Self {
        Self { date }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn prev(self) -> Self {
        Self {
            date: self.date.checked_sub_days(Days::new(1)).unwrap_or(self.date),
        }
    }

    pub fn next(self) -> Self {
        Self {
            date: self.date.checked_add_days(Days::new(1)).unwrap_or(self.date),
        }
    }
}

/// Filter over session entries
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryFilter {
    /// Restrict to entries whose timestamp falls on this day
    pub day: Option<NaiveDate>,
    /// Restrict to marked (true) or unmarked (false) entries
    pub marked: Option<bool>,
}

/// Aggregator over one open cash session
pub struct CashSessionAggregator {
    session: CashSession,
    /// Manual triage flags, local to the session view
    marked: HashSet<String>,
}

impl CashSessionAggregator {
    pub fn open(id: impl Into<String>) -> Self {
        Self {
            session: CashSession::open_now(id.into()),
            marked: HashSet::new(),
        }
    }

    pub fn session(&self) -> &CashSession {
        &self.session
    }

    pub fn is_open(&self) -> bool {
        self.session.open
    }

    pub fn close(&mut self) {
        self.session.close();
    }

    pub fn entries(&self) -> &[CashEntry] {
        &self.session.entries
    }

    /// Record the payments of a finalized sale
    ///
    /// Idempotent: the payment id doubles as the entry id, so observing the
    /// same sale again (e.g. after a redundant refetch) records nothing new.
    /// Returns the newly appended entries.
    pub fn observe_sale(&mut self, sale: &Sale) -> Vec<CashEntry> {
        if !self.session.open || sale.status != SaleStatus::Finalized {
            return Vec::new();
        }
        let mut appended = Vec::new();
        for payment in &sale.payments {
            if self
                .session
                .entries
                .iter()
                .any(|e| e.entry_id == payment.payment_id)
            {
                continue;
            }
            let entry = CashEntry {
                entry_id: payment.payment_id.clone(),
                sale_id: sale.id.clone(),
                amount: payment.amount,
                method: payment.method.clone(),
                timestamp: payment.timestamp,
            };
            self.session.entries.push(entry.clone());
            appended.push(entry);
        }
        if !appended.is_empty() {
            tracing::debug!(
                sale_id = %sale.id,
                appended = appended.len(),
                "cash session entries recorded"
            );
        }
        appended
    }

    /// Entries matching the filter
    pub fn filtered(&self, filter: &EntryFilter) -> Vec<&CashEntry> {
        self.session
            .entries
            .iter()
            .filter(|e| filter.day.is_none_or(|day| day_of(e.timestamp) == day))
            .filter(|e| {
                filter
                    .marked
                    .is_none_or(|marked| self.marked.contains(&e.entry_id) == marked)
            })
            .collect()
    }

    /// Entries whose timestamp falls on the given day
    pub fn entries_on(&self, day: NaiveDate) -> Vec<&CashEntry> {
        self.filtered(&EntryFilter {
            day: Some(day),
            marked: None,
        })
    }

    /// Per-payment-method subtotals, keyed by normalized lowercase name
    pub fn method_totals(&self, filter: &EntryFilter) -> BTreeMap<String, f64> {
        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        for entry in self.filtered(filter) {
            *totals
                .entry(entry.method.trim().to_lowercase())
                .or_default() += to_decimal(entry.amount);
        }
        totals
            .into_iter()
            .map(|(method, total)| (method, to_f64(total)))
            .collect()
    }

    pub fn mark(&mut self, entry_id: &str) {
        if self.session.entries.iter().any(|e| e.entry_id == entry_id) {
            self.marked.insert(entry_id.to_string());
        }
    }

    pub fn unmark(&mut self, entry_id: &str) {
        self.marked.remove(entry_id);
    }

    pub fn is_marked(&self, entry_id: &str) -> bool {
        self.marked.contains(entry_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{PaymentRecord, SaleChannel};

    fn finalized_sale(id: &str, payments: &[(&str, &str, f64, Timestamp)]) -> Sale {
        let mut sale = Sale::new(id.into(), SaleChannel::Counter);
        sale.status = SaleStatus::Finalized;
        for (payment_id, method, amount, timestamp) in payments {
            sale.payments.push(PaymentRecord {
                payment_id: payment_id.to_string(),
                method: method.to_string(),
                amount: *amount,
                tendered: None,
                change: None,
                note: None,
                timestamp: *timestamp,
            });
        }
        sale
    }

    fn millis_on(date: NaiveDate) -> Timestamp {
        date.and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    #[test]
    fn test_observe_is_idempotent() {
        let mut aggregator = CashSessionAggregator::open("cs-1");
        let sale = finalized_sale("s1", &[("p1", "cash", 20.0, 0), ("p2", "card", 30.0, 0)]);
        assert_eq!(aggregator.observe_sale(&sale).len(), 2);
        assert_eq!(aggregator.observe_sale(&sale).len(), 0);
        assert_eq!(aggregator.entries().len(), 2);
    }

    #[test]
    fn test_open_sales_are_not_recorded() {
        let mut aggregator = CashSessionAggregator::open("cs-1");
        let mut sale = finalized_sale("s1", &[("p1", "cash", 20.0, 0)]);
        sale.status = SaleStatus::Open;
        assert!(aggregator.observe_sale(&sale).is_empty());
    }

    #[test]
    fn test_closed_session_records_nothing() {
        let mut aggregator = CashSessionAggregator::open("cs-1");
        aggregator.close();
        let sale = finalized_sale("s1", &[("p1", "cash", 20.0, 0)]);
        assert!(aggregator.observe_sale(&sale).is_empty());
    }

    #[test]
    fn test_method_totals_normalize_names() {
        let mut aggregator = CashSessionAggregator::open("cs-1");
        aggregator.observe_sale(&finalized_sale("s1", &[("p1", "Cash", 20.0, 0)]));
        aggregator.observe_sale(&finalized_sale("s2", &[("p2", "cash ", 15.0, 0)]));
        aggregator.observe_sale(&finalized_sale("s3", &[("p3", "CARD", 9.5, 0)]));

        let totals = aggregator.method_totals(&EntryFilter::default());
        assert_eq!(totals.get("cash"), Some(&35.0));
        assert_eq!(totals.get("card"), Some(&9.5));
        assert_eq!(totals.len(), 2);
    }

    #[test]
    fn test_day_buckets_and_cursor() {
        let today = Utc::now().date_naive();
        let yesterday = DayCursor::at(today).prev().date();

        let mut aggregator = CashSessionAggregator::open("cs-1");
        aggregator.observe_sale(&finalized_sale(
            "s1",
            &[("p1", "cash", 10.0, millis_on(today))],
        ));
        aggregator.observe_sale(&finalized_sale(
            "s2",
            &[("p2", "cash", 25.0, millis_on(yesterday))],
        ));

        assert_eq!(aggregator.entries_on(today).len(), 1);
        assert_eq!(aggregator.entries_on(yesterday).len(), 1);

        let totals_yesterday = aggregator.method_totals(&EntryFilter {
            day: Some(yesterday),
            marked: None,
        });
        assert_eq!(totals_yesterday.get("cash"), Some(&25.0));

        let cursor = DayCursor::at(today);
        assert_eq!(cursor.prev().next(), cursor);
    }

    #[test]
    fn test_marked_filter() {
        let mut aggregator = CashSessionAggregator::open("cs-1");
        aggregator.observe_sale(&finalized_sale(
            "s1",
            &[("p1", "cash", 10.0, 0), ("p2", "cash", 20.0, 0)],
        ));
        aggregator.mark("p1");
        // Marking an unknown entry is a no-op
        aggregator.mark("ghost");

        let marked = aggregator.filtered(&EntryFilter {
            day: None,
            marked: Some(true),
        });
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].entry_id, "p1");

        let unmarked_totals = aggregator.method_totals(&EntryFilter {
            day: None,
            marked: Some(false),
        });
        assert_eq!(unmarked_totals.get("cash"), Some(&20.0));

        aggregator.unmark("p1");
        assert!(!aggregator.is_marked("p1"));
    }
}
