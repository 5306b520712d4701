// ==========================================
// Delivery Window Planner - per-stop service time
// ==========================================
// Stop time grows with unit count and is capped
// Depot node always has 0 service minutes
// ==========================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceTimeModel {
    /// Same minutes at every stop.
    Fixed { minutes: u32 },
    /// `round(min(cap, base + units^exponent * coefficient))`
    PowerCurve {
        base_min: f64,
        coefficient: f64,
        exponent: f64,
        cap_min: f64,
    },
}

impl Default for ServiceTimeModel {
    fn default() -> Self {
        ServiceTimeModel::PowerCurve {
            base_min: 1.6,
            coefficient: 0.045,
            exponent: 1.3,
            cap_min: 7.0,
        }
    }
}

impl ServiceTimeModel {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceTimeModel::Fixed { .. } => "FIXED",
            ServiceTimeModel::PowerCurve { .. } => "POWER_CURVE",
        }
    }

    /// Unloading minutes for a stop of `units`.
    pub fn minutes_for(&self, units: u32) -> u32 {
        match self {
            ServiceTimeModel::Fixed { minutes } => *minutes,
            ServiceTimeModel::PowerCurve {
                base_min,
                coefficient,
                exponent,
                cap_min,
            } => {
                let raw = base_min + (units as f64).powf(*exponent) * coefficient;
                let capped = raw.min(*cap_min).max(0.0);
                capped.round() as u32
            }
        }
    }

    /// Service minutes per route node (depot first).
    pub fn node_minutes(&self, units: &[u32]) -> Vec<u32> {
        std::iter::once(0)
            .chain(units.iter().map(|u| self.minutes_for(*u)))
            .collect()
    }
}
