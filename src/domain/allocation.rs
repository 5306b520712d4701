// ==========================================
// Delivery Window Planner - allocation and outcome records
// ==========================================
// AllocationDecision: allocator output (before routing)
// OrderOutcome: final per-order record (after routing and relocation)
// ==========================================

use crate::domain::types::{AllocationPass, BlockingResource, FinalState, Origin};
use serde::{Deserialize, Serialize};

// ==========================================
// AllocationDecision - allocator verdict for one order
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationDecision {
    pub order_id: String,
    pub requested_window: String,
    pub assigned_window: Option<String>, // None = cancelled by the allocator
    pub origin: Origin,
    pub pass: AllocationPass,
    pub blocking: Option<BlockingResource>, // set when the order was moved or cancelled
    pub audit_reason: String,
    pub relocations: u32, // moves made by the allocator this run
}

impl AllocationDecision {
    pub fn is_cancelled(&self) -> bool {
        self.assigned_window.is_none()
    }
}

// ==========================================
// OrderOutcome - final dispatcher-facing record
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderOutcome {
    pub order_id: String,
    pub requested_window: String,
    pub assigned_window: Option<String>,
    pub origin: Origin,
    pub final_state: FinalState,
    pub blocking: Option<BlockingResource>,
    pub audit_reason: String,
    pub relocations: u32, // relocations this run (allocator + resolver)

    // ===== route placement (None when cancelled or window degraded) =====
    pub sequence_index: Option<usize>,
    pub arrival_min: Option<u32>,

    // ===== disposition metrics =====
    pub avg_travel_to_cluster_min: Option<f64>,
    pub score: u8, // 0-100 optimality score
}

impl OrderOutcome {
    /// Total reschedules counted against the relocation limit.
    pub fn total_relocations(&self, prior: u32) -> u32 {
        prior.saturating_add(self.relocations)
    }
}
