// ==========================================
// Delivery Window Planner - configuration layer
// ==========================================
// Responsibility: key/value settings with typed defaults
// ==========================================

pub mod config_manager;
pub mod planner_config;

pub use config_manager::{config_keys, ConfigError, ConfigManager, ConfigResult};
pub use planner_config::PlannerConfig;
