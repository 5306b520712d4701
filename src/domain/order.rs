// ==========================================
// Delivery Window Planner - order domain model
// ==========================================
// Rule: core fields are immutable after intake
// Writers: allocator (assigned_window), resolver (final_state)
// ==========================================

use crate::domain::types::FinalState;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Order - canonical delivery order
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // ===== identity =====
    pub order_id: String,    // external order id
    pub customer_id: String, // customer identifier (or name in legacy uploads)
    pub address: String,     // delivery address

    // ===== allocation inputs =====
    pub units: u32,                   // capacity weight (totes)
    pub early_eligible: bool,         // customer accepts early delivery
    pub requested_window: String,     // window id, e.g. "09:00 AM - 11:00 AM"
    pub prior_reschedule_count: u32,  // reschedules before this run
    pub customer_tag: Option<String>, // priority tag ("power", "vip", ...)

    // ===== pipeline-owned =====
    #[serde(default)]
    pub assigned_window: Option<String>,
    #[serde(default)]
    pub final_state: Option<FinalState>,
}

impl Order {
    pub fn new(
        order_id: impl Into<String>,
        customer_id: impl Into<String>,
        address: impl Into<String>,
        units: u32,
        requested_window: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            customer_id: customer_id.into(),
            address: address.into(),
            units,
            early_eligible: false,
            requested_window: requested_window.into(),
            prior_reschedule_count: 0,
            customer_tag: None,
            assigned_window: None,
            final_state: None,
        }
    }

    pub fn with_early_eligible(mut self, early_eligible: bool) -> Self {
        self.early_eligible = early_eligible;
        self
    }

    pub fn with_prior_reschedules(mut self, count: u32) -> Self {
        self.prior_reschedule_count = count;
        self
    }

    pub fn with_customer_tag(mut self, tag: impl Into<String>) -> Self {
        self.customer_tag = Some(tag.into());
        self
    }

    /// Whether the order belongs to one of the configured priority tags
    /// (case-insensitive, surrounding whitespace ignored).
    pub fn is_priority(&self, priority_tags: &[String]) -> bool {
        match self.customer_tag.as_deref().map(|t| t.trim().to_lowercase()) {
            Some(tag) if !tag.is_empty() => priority_tags
                .iter()
                .any(|p| p.trim().eq_ignore_ascii_case(&tag)),
            _ => false,
        }
    }

    /// Copy with the pipeline-owned fields cleared.
    pub fn reset_pipeline_fields(&self) -> Self {
        Self {
            assigned_window: None,
            final_state: None,
            ..self.clone()
        }
    }
}

// ==========================================
// RawOrderRecord - field-mapped CSV row
// ==========================================
// Produced by the field mapper, validated by the normalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOrderRecord {
    pub order_id: Option<String>,
    pub customer_id: Option<String>,
    pub address: Option<String>,
    pub units: Option<i64>,
    pub early_eligible: bool,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    pub prior_reschedule_count: u32,
    pub customer_tag: Option<String>,

    // source row number (1-based, header excluded)
    pub row_number: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_priority_case_insensitive() {
        let tags = vec!["power".to_string(), "vip".to_string()];
        let order = Order::new("O1", "C1", "1 Main St", 5, "W1").with_customer_tag(" VIP ");
        assert!(order.is_priority(&tags));

        let order = Order::new("O2", "C2", "2 Main St", 5, "W1").with_customer_tag("regular");
        assert!(!order.is_priority(&tags));

        let order = Order::new("O3", "C3", "3 Main St", 5, "W1");
        assert!(!order.is_priority(&tags));
    }

    #[test]
    fn test_reset_pipeline_fields() {
        let mut order = Order::new("O1", "C1", "1 Main St", 5, "W1");
        order.assigned_window = Some("W2".to_string());
        order.final_state = Some(FinalState::Reschedule);

        let reset = order.reset_pipeline_fields();
        assert_eq!(reset.assigned_window, None);
        assert_eq!(reset.final_state, None);
        assert_eq!(reset.order_id, "O1");
    }
}
