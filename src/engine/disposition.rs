// ==========================================
// Delivery Window Planner - disposition rules
// ==========================================
// Responsibility: classify a router-dropped order by its average travel
// time to the kept cluster and list the windows worth trying
// Input: avg minutes to cluster (None = nothing kept)
// Output: DispositionBand + ordered candidate window ranks
// ==========================================

use crate::config::PlannerConfig;
use crate::domain::types::FinalState;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispositionBand {
    /// avg < early threshold and early-eligible
    EarlyCandidate,
    /// avg < reschedule threshold
    NearMiss,
    /// reschedule threshold <= avg < cancel threshold
    Marginal,
    /// avg >= cancel threshold, or no kept cluster
    Isolated,
}

impl fmt::Display for DispositionBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispositionBand::EarlyCandidate => write!(f, "EARLY_CANDIDATE"),
            DispositionBand::NearMiss => write!(f, "NEAR_MISS"),
            DispositionBand::Marginal => write!(f, "MARGINAL"),
            DispositionBand::Isolated => write!(f, "ISOLATED"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispositionResolver {
    early_threshold_min: f64,
    reschedule_threshold_min: f64,
    cancel_threshold_min: f64,
}

impl DispositionResolver {
    pub fn new(config: &PlannerConfig) -> Self {
        Self {
            early_threshold_min: config.early_threshold_min,
            reschedule_threshold_min: config.reschedule_threshold_min,
            cancel_threshold_min: config.cancel_threshold_min,
        }
    }

    pub fn band(&self, avg_to_cluster: Option<f64>, early_eligible: bool) -> DispositionBand {
        match avg_to_cluster {
            None => DispositionBand::Isolated,
            Some(avg) if avg >= self.cancel_threshold_min => DispositionBand::Isolated,
            Some(avg) if avg < self.early_threshold_min && early_eligible => DispositionBand::EarlyCandidate,
            Some(avg) if avg < self.reschedule_threshold_min => DispositionBand::NearMiss,
            Some(_) => DispositionBand::Marginal,
        }
    }

    /// Window ranks to try for an order dropped from `current_rank`, in order.
    pub fn candidate_ranks(&self, band: DispositionBand, current_rank: usize, window_count: usize) -> Vec<usize> {
        let earlier = (0..current_rank).rev();
        let later = current_rank + 1..window_count;
        match band {
            DispositionBand::EarlyCandidate => earlier.chain(later).collect(),
            DispositionBand::NearMiss | DispositionBand::Marginal => later.collect(),
            DispositionBand::Isolated => Vec::new(),
        }
    }

    /// Marginal orders only go where they sit close to the target's orders.
    pub fn fits_target_cluster(&self, band: DispositionBand, avg_to_target: Option<f64>) -> bool {
        match band {
            DispositionBand::Marginal => match avg_to_target {
                None => true,
                Some(avg) => avg < self.reschedule_threshold_min,
            },
            _ => true,
        }
    }

    pub fn cancel_threshold_min(&self) -> f64 {
        self.cancel_threshold_min
    }
}

/// 0-100 optimality score from final state, distance to cluster and size.
pub fn order_score(state: FinalState, avg_to_cluster: f64, units: u32) -> u8 {
    let d = avg_to_cluster;
    let score = match state {
        FinalState::InWindow | FinalState::Received => 90.0 - (d * 0.5).min(20.0),
        FinalState::DeliverEarly => 75.0 - d.min(15.0),
        FinalState::Reschedule => 50.0 - ((d - 10.0) * 1.5).min(20.0),
        FinalState::Cancel => 20.0 - ((d - 20.0) * 0.5).min(20.0),
    };
    let size_bonus = ((units as f64) + 1.0).ln().min(5.0);
    (score + size_bonus).round().clamp(0.0, 100.0) as u8
}
