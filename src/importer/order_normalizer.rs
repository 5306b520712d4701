// ==========================================
// Delivery Window Planner - order intake normalizer
// ==========================================
// Input: RawOrderRecord (field-mapped)
// Output: canonical Orders + derived Windows + validation issues
// Rule: invalid rows are reported, never silently dropped
// ==========================================

use crate::domain::order::{Order, RawOrderRecord};
use crate::domain::window::Window;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub row_number: usize,
    pub order_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedBatch {
    pub orders: Vec<Order>,
    pub windows: Vec<Window>, // chronological
    pub issues: Vec<ValidationIssue>,
}

pub struct OrderNormalizer {
    default_capacity: u32,
}

impl OrderNormalizer {
    pub fn new(default_capacity: u32) -> Self {
        Self { default_capacity }
    }

    pub fn normalize(&self, records: Vec<RawOrderRecord>) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        let mut seen_ids = HashSet::new();
        let mut windows: BTreeMap<(chrono::NaiveTime, chrono::NaiveTime), Window> = BTreeMap::new();

        for record in records {
            let mut problems = Vec::new();

            let order_id = record.order_id.clone().unwrap_or_default();
            if order_id.is_empty() {
                problems.push("order id is empty".to_string());
            } else if seen_ids.contains(&order_id) {
                problems.push(format!("duplicate order id {}", order_id));
            }

            let address = record.address.clone().unwrap_or_default();
            if address.trim().is_empty() {
                problems.push("delivery address is empty".to_string());
            }

            let units = match record.units {
                Some(u) if u > 0 && u <= u32::MAX as i64 => Some(u as u32),
                other => {
                    problems.push(format!(
                        "units must be a positive integer (got: {})",
                        other.map(|u| u.to_string()).unwrap_or_else(|| "empty".to_string())
                    ));
                    None
                }
            };

            if record.window_end <= record.window_start {
                problems.push(format!(
                    "window end {} is not after start {}",
                    record.window_end.format("%I:%M %p"),
                    record.window_start.format("%I:%M %p")
                ));
            }

            let units = match (units, problems.is_empty()) {
                (Some(u), true) => u,
                _ => {
                    let message = problems.join("; ");
                    warn!(row_number = record.row_number, order_id = %order_id, message = %message, "order row rejected");
                    batch.issues.push(ValidationIssue {
                        row_number: record.row_number,
                        order_id: record.order_id.clone(),
                        message,
                    });
                    continue;
                }
            };

            let window = windows
                .entry((record.window_start, record.window_end))
                .or_insert_with(|| Window::from_times(record.window_start, record.window_end, self.default_capacity));

            let mut order = Order::new(
                order_id.clone(),
                record.customer_id.clone().unwrap_or_default(),
                address,
                units,
                window.window_id.clone(),
            )
            .with_early_eligible(record.early_eligible)
            .with_prior_reschedules(record.prior_reschedule_count);
            order.customer_tag = record.customer_tag.clone();

            seen_ids.insert(order_id);
            batch.orders.push(order);
        }

        batch.windows = windows.into_values().collect();

        let durations: HashSet<u32> = batch.windows.iter().map(|w| w.duration_minutes()).collect();
        if durations.len() > 1 {
            warn!(distinct_durations = durations.len(), "windows have different durations");
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn record(id: &str, address: &str, units: Option<i64>, start: u32, end: u32, row: usize) -> RawOrderRecord {
        RawOrderRecord {
            order_id: Some(id.to_string()),
            customer_id: Some("C".to_string()),
            address: Some(address.to_string()),
            units,
            early_eligible: false,
            window_start: t(start),
            window_end: t(end),
            prior_reschedule_count: 0,
            customer_tag: None,
            row_number: row,
        }
    }

    #[test]
    fn test_windows_derived_in_chronological_order() {
        let batch = OrderNormalizer::new(80).normalize(vec![
            record("B", "2 St", Some(4), 11, 13, 1),
            record("A", "1 St", Some(3), 9, 11, 2),
            record("C", "3 St", Some(5), 11, 13, 3),
        ]);
        assert_eq!(batch.orders.len(), 3);
        assert!(batch.issues.is_empty());
        let ids: Vec<&str> = batch.windows.iter().map(|w| w.window_id.as_str()).collect();
        assert_eq!(ids, vec!["09:00 AM - 11:00 AM", "11:00 AM - 01:00 PM"]);
        assert!(batch.windows.iter().all(|w| w.capacity_units == 80));
        assert_eq!(batch.orders[0].requested_window, "11:00 AM - 01:00 PM");
    }

    #[test]
    fn test_invalid_rows_reported() {
        let batch = OrderNormalizer::new(80).normalize(vec![
            record("A", "", Some(3), 9, 11, 1),
            record("B", "2 St", Some(0), 9, 11, 2),
            record("C", "3 St", Some(2), 9, 11, 3),
            record("C", "3 St", Some(2), 9, 11, 4),
        ]);
        assert_eq!(batch.orders.len(), 1);
        assert_eq!(batch.issues.len(), 3);
        assert!(batch.issues[0].message.contains("address"));
        assert!(batch.issues[1].message.contains("positive integer"));
        assert!(batch.issues[2].message.contains("duplicate"));
    }
}
