// ==========================================
// Configuration loading tests
// ==========================================

use delivery_window_planner::config::{config_keys, ConfigError, ConfigManager, PlannerConfig};
use delivery_window_planner::domain::RelocationPolicy;
use delivery_window_planner::engine::ServiceTimeModel;

#[test]
fn test_json_overrides_reach_planner_config() {
    let raw = r#"{
        "honor_priority": true,
        "priority_tags": ["Power", " Gold "],
        "max_relocations": 3,
        "relocation_policy": "most_spare_capacity",
        "early_threshold_min": 8.5,
        "service_time_model": "FIXED",
        "service_time_fixed_min": 4,
        "max_concurrent_solves": 2
    }"#;
    let config = ConfigManager::from_json_str(raw).unwrap().to_planner_config();

    assert!(config.honor_priority);
    assert_eq!(config.priority_tags, vec!["power".to_string(), "gold".to_string()]);
    assert_eq!(config.max_relocations, 3);
    assert_eq!(config.relocation_policy, RelocationPolicy::MostSpareCapacity);
    assert_eq!(config.early_threshold_min, 8.5);
    assert_eq!(config.service_time_model, ServiceTimeModel::Fixed { minutes: 4 });
    assert_eq!(config.max_concurrent_solves, 2);
    // untouched keys keep their defaults
    assert_eq!(config.cancel_threshold_min, 30.0);
    assert_eq!(config.default_vehicle_capacity, 80);
    assert!(config.validate().is_ok());
}

#[test]
fn test_malformed_values_use_defaults() {
    let raw = r#"{
        "large_order_threshold_units": "forty",
        "cancel_threshold_min": "far",
        "service_time_model": "LINEAR",
        "honor_priority": "sometimes"
    }"#;
    let config = ConfigManager::from_json_str(raw).unwrap().to_planner_config();
    let defaults = PlannerConfig::default();

    assert_eq!(config.large_order_threshold_units, defaults.large_order_threshold_units);
    assert_eq!(config.cancel_threshold_min, defaults.cancel_threshold_min);
    assert_eq!(config.service_time_model, defaults.service_time_model);
    assert_eq!(config.honor_priority, defaults.honor_priority);
}

#[test]
fn test_nested_object_rejected() {
    let err = ConfigManager::from_json_str(r#"{"router": {"budget": 5}}"#).unwrap_err();
    assert!(matches!(err, ConfigError::NestedValue { ref key } if key == "router"));

    let err = ConfigManager::from_json_str("not json").unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
}

#[test]
fn test_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("planner.json");
    std::fs::write(&path, r#"{"solver_time_budget_ms": 250, "drop_penalty": 5000}"#).unwrap();

    let config = ConfigManager::from_json_file(&path).unwrap().to_planner_config();
    assert_eq!(config.solver_time_budget_ms, 250);
    assert_eq!(config.drop_penalty, 5000);

    let err = ConfigManager::from_json_file(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_snapshot_restore_skips_meta_keys() {
    let source = ConfigManager::new();
    source.set(config_keys::MAX_RELOCATIONS, "1").unwrap();
    source.set(config_keys::HONOR_PRIORITY, "true").unwrap();
    let snapshot = source.get_config_snapshot().unwrap();

    let mut with_meta: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&snapshot).unwrap();
    with_meta.insert("__meta_saved_by".to_string(), "ops".into());
    let snapshot = serde_json::Value::Object(with_meta).to_string();

    let target = ConfigManager::new();
    let restored = target.restore_config_from_snapshot(&snapshot).unwrap();

    assert_eq!(restored, 2);
    assert_eq!(target.get_global_config_value("__meta_saved_by").unwrap(), None);
    assert_eq!(target.to_planner_config().max_relocations, 1);
    assert!(target.to_planner_config().honor_priority);
}

#[test]
fn test_planner_config_round_trips_through_manager() {
    let config = PlannerConfig {
        honor_priority: true,
        relocation_policy: RelocationPolicy::MostSpareCapacity,
        service_time_model: ServiceTimeModel::Fixed { minutes: 6 },
        max_relocations: 4,
        ..PlannerConfig::default()
    };
    let manager = ConfigManager::from_planner_config(&config).unwrap();
    assert_eq!(manager.to_planner_config(), config);

    let effective: serde_json::Value =
        serde_json::from_str(&ConfigManager::new().effective_snapshot().unwrap()).unwrap();
    assert_eq!(effective[config_keys::CANCEL_THRESHOLD_MIN], "30");
    assert_eq!(effective[config_keys::SERVICE_TIME_MODEL], "POWER_CURVE");
}

#[test]
fn test_threshold_order_validated() {
    let config = PlannerConfig {
        reschedule_threshold_min: 35.0,
        ..PlannerConfig::default()
    };
    assert!(config.validate().is_err());
}
