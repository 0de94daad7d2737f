//! Key extraction from an `EntityState` snapshot.
//!
//! States may carry a single value, a list, or both. Guards always see the
//! merged, deduplicated list in first-seen order.

use chrono::NaiveDate;

use permit_contracts::request::EntityState;

/// `projectId` followed by `projectIds`, without blanks or duplicates.
pub fn project_ids(state: &EntityState) -> Vec<String> {
    merge(state.project_id.iter().chain(state.project_ids.iter()).cloned())
}

/// `workDate` followed by `workDates`, without duplicates.
pub fn work_dates(state: &EntityState) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = Vec::new();
    for date in state.work_date.iter().chain(state.work_dates.iter()) {
        if !dates.contains(date) {
            dates.push(*date);
        }
    }
    dates
}

/// Explicit period keys plus the `YYYY-MM` month of every work date.
pub fn period_keys(state: &EntityState) -> Vec<String> {
    let explicit = state.period_key.iter().chain(state.period_keys.iter()).cloned();
    let derived = work_dates(state).into_iter().map(|d| month_key(&d));
    merge(explicit.chain(derived))
}

/// The `YYYY-MM` period a date falls in.
pub fn month_key(date: &NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

fn merge(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !out.iter().any(|v| v == value) {
            out.push(value.to_string());
        }
    }
    out
}
