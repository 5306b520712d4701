// ==========================================
// Delivery Window Planner - configuration manager
// ==========================================
// Responsibility: load, query and override planner settings
// Storage: in-memory key/value map (flat JSON object on disk)
// ==========================================

use crate::config::planner_config::PlannerConfig;
use crate::domain::types::RelocationPolicy;
use crate::engine::service_time::ServiceTimeModel;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::warn;

// ==========================================
// ConfigError
// ==========================================
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file read failed: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config JSON invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config must be a flat JSON object, key '{key}' holds a nested value")]
    NestedValue { key: String },

    #[error("Config lock poisoned: {0}")]
    Lock(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ==========================================
// ConfigManager
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    values: Arc<RwLock<BTreeMap<String, String>>>,
}

impl ConfigManager {
    /// Empty store; every getter falls back to its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a flat JSON object file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Parses a flat JSON object; scalar values are stored as strings and
    /// arrays of scalars are joined with commas.
    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let manager = Self::new();
        let parsed: BTreeMap<String, Value> = serde_json::from_str(raw)?;
        for (key, value) in parsed {
            let text = flatten_value(&key, &value)?;
            manager.set(&key, &text)?;
        }
        Ok(manager)
    }

    pub fn set(&self, key: &str, value: &str) -> ConfigResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|e| ConfigError::Lock(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Raw stored value for `key`.
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|e| ConfigError::Lock(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> String {
        match self.get_global_config_value(key) {
            Ok(Some(v)) => v,
            Ok(None) => default.to_string(),
            Err(e) => {
                warn!(config_key = key, error = %e, "config read failed, using default");
                default.to_string()
            }
        }
    }

    /// JSON object of every stored key.
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let values = self
            .values
            .read()
            .map_err(|e| ConfigError::Lock(e.to_string()))?;
        Ok(serde_json::to_string(&*values)?)
    }

    /// Overwrites stored keys from a snapshot; returns the number restored.
    /// Keys prefixed `__meta_` are ignored.
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;
        let mut values = self
            .values
            .write()
            .map_err(|e| ConfigError::Lock(e.to_string()))?;

        let mut count = 0;
        for (key, value) in config_map {
            if key.starts_with("__meta_") {
                continue;
            }
            values.insert(key, value);
            count += 1;
        }
        Ok(count)
    }

    /// Snapshot of every key with its effective value (stored or default).
    pub fn effective_snapshot(&self) -> ConfigResult<String> {
        let config = self.to_planner_config();
        let defaults = ConfigManager::from_planner_config(&config)?;
        defaults.get_config_snapshot()
    }

    /// Store holding every key of `config`.
    pub fn from_planner_config(config: &PlannerConfig) -> ConfigResult<Self> {
        let manager = Self::new();
        manager.set(config_keys::HONOR_PRIORITY, &config.honor_priority.to_string())?;
        manager.set(config_keys::PRIORITY_TAGS, &config.priority_tags.join(","))?;
        manager.set(
            config_keys::LARGE_ORDER_THRESHOLD_UNITS,
            &config.large_order_threshold_units.to_string(),
        )?;
        manager.set(
            config_keys::EARLY_MIGRATION_MAX_HOURS,
            &config.early_migration_max_hours.to_string(),
        )?;
        manager.set(config_keys::RELOCATION_POLICY, &config.relocation_policy.to_string())?;
        manager.set(config_keys::EARLY_THRESHOLD_MIN, &config.early_threshold_min.to_string())?;
        manager.set(
            config_keys::RESCHEDULE_THRESHOLD_MIN,
            &config.reschedule_threshold_min.to_string(),
        )?;
        manager.set(config_keys::CANCEL_THRESHOLD_MIN, &config.cancel_threshold_min.to_string())?;
        manager.set(config_keys::MAX_RELOCATIONS, &config.max_relocations.to_string())?;
        manager.set(config_keys::SERVICE_TIME_MODEL, config.service_time_model.name())?;
        match &config.service_time_model {
            ServiceTimeModel::Fixed { minutes } => {
                manager.set(config_keys::SERVICE_TIME_FIXED_MIN, &minutes.to_string())?;
            }
            ServiceTimeModel::PowerCurve {
                base_min,
                coefficient,
                exponent,
                cap_min,
            } => {
                manager.set(config_keys::SERVICE_TIME_BASE_MIN, &base_min.to_string())?;
                manager.set(config_keys::SERVICE_TIME_COEFFICIENT, &coefficient.to_string())?;
                manager.set(config_keys::SERVICE_TIME_EXPONENT, &exponent.to_string())?;
                manager.set(config_keys::SERVICE_TIME_CAP_MIN, &cap_min.to_string())?;
            }
        }
        manager.set(config_keys::DROP_PENALTY, &config.drop_penalty.to_string())?;
        manager.set(config_keys::SOLVER_TIME_BUDGET_MS, &config.solver_time_budget_ms.to_string())?;
        manager.set(
            config_keys::SOLVER_TIMEOUT_GRACE_MS,
            &config.solver_timeout_grace_ms.to_string(),
        )?;
        manager.set(config_keys::MAX_CONCURRENT_SOLVES, &config.max_concurrent_solves.to_string())?;
        manager.set(
            config_keys::DEFAULT_VEHICLE_CAPACITY,
            &config.default_vehicle_capacity.to_string(),
        )?;
        Ok(manager)
    }

    // ===== typed getters =====

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        let value = self.get_config_or_default(key, &default.to_string());
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => true,
            "false" | "no" | "n" | "0" => false,
            _ => {
                warn!(config_key = key, raw_value = %value, "malformed boolean, using default");
                default
            }
        }
    }

    pub fn get_u32(&self, key: &str, default: u32) -> u32 {
        self.parse_or_default(key, default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.parse_or_default(key, default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        self.parse_or_default(key, default)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        let value: f64 = self.parse_or_default(key, default);
        if value.is_finite() {
            value
        } else {
            warn!(config_key = key, "non-finite number, using default");
            default
        }
    }

    fn parse_or_default<T>(&self, key: &str, default: T) -> T
    where
        T: std::str::FromStr + ToString + Copy,
    {
        let value = self.get_config_or_default(key, &default.to_string());
        value.trim().parse::<T>().unwrap_or_else(|_| {
            warn!(config_key = key, raw_value = %value, "malformed number, using default");
            default
        })
    }

    pub fn get_priority_tags(&self) -> Vec<String> {
        let value = self.get_config_or_default(config_keys::PRIORITY_TAGS, "power,vip");
        value
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn get_relocation_policy(&self) -> RelocationPolicy {
        let value = self.get_config_or_default(
            config_keys::RELOCATION_POLICY,
            &RelocationPolicy::default().to_string(),
        );
        RelocationPolicy::parse(&value).unwrap_or_else(|| {
            warn!(
                config_key = config_keys::RELOCATION_POLICY,
                raw_value = %value,
                "unknown relocation policy, using CHRONOLOGICAL_NEAREST"
            );
            RelocationPolicy::default()
        })
    }

    pub fn get_service_time_model(&self) -> ServiceTimeModel {
        let value = self.get_config_or_default(config_keys::SERVICE_TIME_MODEL, "POWER_CURVE");
        match value.trim().to_uppercase().as_str() {
            "FIXED" => ServiceTimeModel::Fixed {
                minutes: self.get_u32(config_keys::SERVICE_TIME_FIXED_MIN, 3),
            },
            other => {
                if other != "POWER_CURVE" {
                    warn!(
                        config_key = config_keys::SERVICE_TIME_MODEL,
                        raw_value = %value,
                        "unknown service time model, using POWER_CURVE"
                    );
                }
                ServiceTimeModel::PowerCurve {
                    base_min: self.get_f64(config_keys::SERVICE_TIME_BASE_MIN, 1.6),
                    coefficient: self.get_f64(config_keys::SERVICE_TIME_COEFFICIENT, 0.045),
                    exponent: self.get_f64(config_keys::SERVICE_TIME_EXPONENT, 1.3),
                    cap_min: self.get_f64(config_keys::SERVICE_TIME_CAP_MIN, 7.0),
                }
            }
        }
    }

    /// Typed configuration with defaults for absent or malformed keys.
    pub fn to_planner_config(&self) -> PlannerConfig {
        let d = PlannerConfig::default();
        PlannerConfig {
            honor_priority: self.get_bool(config_keys::HONOR_PRIORITY, d.honor_priority),
            priority_tags: self.get_priority_tags(),
            large_order_threshold_units: self
                .get_u32(config_keys::LARGE_ORDER_THRESHOLD_UNITS, d.large_order_threshold_units),
            early_migration_max_hours: self
                .get_f64(config_keys::EARLY_MIGRATION_MAX_HOURS, d.early_migration_max_hours),
            relocation_policy: self.get_relocation_policy(),
            early_threshold_min: self.get_f64(config_keys::EARLY_THRESHOLD_MIN, d.early_threshold_min),
            reschedule_threshold_min: self
                .get_f64(config_keys::RESCHEDULE_THRESHOLD_MIN, d.reschedule_threshold_min),
            cancel_threshold_min: self.get_f64(config_keys::CANCEL_THRESHOLD_MIN, d.cancel_threshold_min),
            max_relocations: self.get_u32(config_keys::MAX_RELOCATIONS, d.max_relocations),
            service_time_model: self.get_service_time_model(),
            drop_penalty: self.get_u64(config_keys::DROP_PENALTY, d.drop_penalty),
            solver_time_budget_ms: self.get_u64(config_keys::SOLVER_TIME_BUDGET_MS, d.solver_time_budget_ms),
            solver_timeout_grace_ms: self
                .get_u64(config_keys::SOLVER_TIMEOUT_GRACE_MS, d.solver_timeout_grace_ms),
            max_concurrent_solves: self
                .get_usize(config_keys::MAX_CONCURRENT_SOLVES, d.max_concurrent_solves),
            default_vehicle_capacity: self
                .get_u32(config_keys::DEFAULT_VEHICLE_CAPACITY, d.default_vehicle_capacity),
        }
    }
}

fn flatten_value(key: &str, value: &Value) -> ConfigResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Array(_) | Value::Object(_) => {
                        return Err(ConfigError::NestedValue { key: key.to_string() })
                    }
                    other => parts.push(flatten_value(key, other)?),
                }
            }
            Ok(parts.join(","))
        }
        Value::Object(_) => Err(ConfigError::NestedValue { key: key.to_string() }),
    }
}

// ==========================================
// Config key constants
// ==========================================
pub mod config_keys {
    // Allocator
    pub const HONOR_PRIORITY: &str = "honor_priority";
    pub const PRIORITY_TAGS: &str = "priority_tags";
    pub const LARGE_ORDER_THRESHOLD_UNITS: &str = "large_order_threshold_units";
    pub const EARLY_MIGRATION_MAX_HOURS: &str = "early_migration_max_hours";
    pub const RELOCATION_POLICY: &str = "relocation_policy";

    // Disposition
    pub const EARLY_THRESHOLD_MIN: &str = "early_threshold_min";
    pub const RESCHEDULE_THRESHOLD_MIN: &str = "reschedule_threshold_min";
    pub const CANCEL_THRESHOLD_MIN: &str = "cancel_threshold_min";
    pub const MAX_RELOCATIONS: &str = "max_relocations";

    // Service time
    pub const SERVICE_TIME_MODEL: &str = "service_time_model";
    pub const SERVICE_TIME_FIXED_MIN: &str = "service_time_fixed_min";
    pub const SERVICE_TIME_BASE_MIN: &str = "service_time_base_min";
    pub const SERVICE_TIME_COEFFICIENT: &str = "service_time_coefficient";
    pub const SERVICE_TIME_EXPONENT: &str = "service_time_exponent";
    pub const SERVICE_TIME_CAP_MIN: &str = "service_time_cap_min";

    // Router
    pub const DROP_PENALTY: &str = "drop_penalty";
    pub const SOLVER_TIME_BUDGET_MS: &str = "solver_time_budget_ms";
    pub const SOLVER_TIMEOUT_GRACE_MS: &str = "solver_timeout_grace_ms";
    pub const MAX_CONCURRENT_SOLVES: &str = "max_concurrent_solves";

    // Intake
    pub const DEFAULT_VEHICLE_CAPACITY: &str = "default_vehicle_capacity";
}
