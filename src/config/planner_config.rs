// ==========================================
// Delivery Window Planner - typed run configuration
// ==========================================
// Built by ConfigManager::to_planner_config(), threaded through RunContext
// ==========================================

use crate::domain::types::RelocationPolicy;
use crate::engine::service_time::ServiceTimeModel;
use serde::{Deserialize, Serialize};

// ==========================================
// PlannerConfig
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    // ===== allocator =====
    pub honor_priority: bool,
    pub priority_tags: Vec<String>,
    pub large_order_threshold_units: u32,
    pub early_migration_max_hours: f64,
    pub relocation_policy: RelocationPolicy,

    // ===== disposition (travel minutes to cluster) =====
    pub early_threshold_min: f64,
    pub reschedule_threshold_min: f64,
    pub cancel_threshold_min: f64,
    pub max_relocations: u32,

    // ===== router =====
    pub service_time_model: ServiceTimeModel,
    pub drop_penalty: u64,
    pub solver_time_budget_ms: u64,
    pub solver_timeout_grace_ms: u64,
    pub max_concurrent_solves: usize,

    // ===== intake =====
    pub default_vehicle_capacity: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            honor_priority: false,
            priority_tags: vec!["power".to_string(), "vip".to_string()],
            large_order_threshold_units: 40,
            early_migration_max_hours: 6.0,
            relocation_policy: RelocationPolicy::ChronologicalNearest,
            early_threshold_min: 10.0,
            reschedule_threshold_min: 20.0,
            cancel_threshold_min: 30.0,
            max_relocations: 2,
            service_time_model: ServiceTimeModel::default(),
            drop_penalty: 100_000,
            solver_time_budget_ms: 5_000,
            solver_timeout_grace_ms: 1_000,
            max_concurrent_solves: 4,
            default_vehicle_capacity: 80,
        }
    }
}

impl PlannerConfig {
    /// Rejects threshold orderings and limits the pipeline cannot honor.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.early_threshold_min <= self.reschedule_threshold_min
            && self.reschedule_threshold_min <= self.cancel_threshold_min)
        {
            return Err(format!(
                "THRESHOLD_ORDER: early({}) <= reschedule({}) <= cancel({}) required",
                self.early_threshold_min, self.reschedule_threshold_min, self.cancel_threshold_min
            ));
        }
        if self.early_threshold_min < 0.0 || self.early_migration_max_hours < 0.0 {
            return Err("NEGATIVE_LIMIT: thresholds and horizons must be >= 0".to_string());
        }
        if self.max_concurrent_solves == 0 {
            return Err("MAX_CONCURRENT_SOLVES: must be >= 1".to_string());
        }
        if self.solver_time_budget_ms == 0 {
            return Err("SOLVER_TIME_BUDGET: must be > 0 ms".to_string());
        }
        Ok(())
    }

    /// Whether `prior + done + 1` stays within the relocation limit.
    pub fn has_headroom(&self, prior: u32, done_this_run: u32) -> bool {
        prior.saturating_add(done_this_run).saturating_add(1) <= self.max_relocations
    }
}
