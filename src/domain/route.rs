// ==========================================
// Delivery Window Planner - routing contract types
// ==========================================
// Node convention: index 0 = depot, 1..=n = submitted orders in request order
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// TravelTimeMatrix - precomputed drive minutes
// ==========================================
// minutes[i][j]: drive minutes from node i to node j
// order_ids[k] is node k + 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelTimeMatrix {
    pub order_ids: Vec<String>,
    pub minutes: Vec<Vec<u32>>,
}

impl TravelTimeMatrix {
    pub fn new(order_ids: Vec<String>, minutes: Vec<Vec<u32>>) -> Self {
        Self { order_ids, minutes }
    }

    /// Checks the matrix is square with one row per order plus the depot,
    /// and that order ids are unique.
    pub fn validate(&self) -> Result<(), String> {
        let expected = self.order_ids.len() + 1;
        if self.minutes.len() != expected {
            return Err(format!(
                "MATRIX_SHAPE: expected {} rows (depot + {} orders), got {}",
                expected,
                self.order_ids.len(),
                self.minutes.len()
            ));
        }
        for (i, row) in self.minutes.iter().enumerate() {
            if row.len() != expected {
                return Err(format!(
                    "MATRIX_SHAPE: row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    expected
                ));
            }
        }
        let mut seen = HashMap::with_capacity(self.order_ids.len());
        for id in &self.order_ids {
            if seen.insert(id.as_str(), ()).is_some() {
                return Err(format!("MATRIX_DUPLICATE_ORDER: {}", id));
            }
        }
        Ok(())
    }

    /// Matrix node of an order (1-based; 0 is the depot).
    pub fn node_of(&self, order_id: &str) -> Option<usize> {
        self.order_ids.iter().position(|id| id == order_id).map(|i| i + 1)
    }

    pub fn index(&self) -> MatrixIndex {
        MatrixIndex {
            nodes: self
                .order_ids
                .iter()
                .enumerate()
                .map(|(i, id)| (id.clone(), i + 1))
                .collect(),
        }
    }

    /// Depot-plus-subset matrix, rows in the given order.
    /// Returns `None` when an id is absent from the matrix.
    pub fn submatrix(&self, index: &MatrixIndex, order_ids: &[String]) -> Option<Vec<Vec<u32>>> {
        let mut nodes = Vec::with_capacity(order_ids.len() + 1);
        nodes.push(0usize);
        for id in order_ids {
            nodes.push(index.node(id)?);
        }
        Some(
            nodes
                .iter()
                .map(|&from| nodes.iter().map(|&to| self.minutes[from][to]).collect())
                .collect(),
        )
    }

    /// Mean drive minutes from `order_id` to each of `cluster` (skipping itself).
    /// `None` when the cluster is empty.
    pub fn avg_travel_to(&self, index: &MatrixIndex, order_id: &str, cluster: &[String]) -> Option<f64> {
        let from = index.node(order_id)?;
        let targets: Vec<usize> = cluster
            .iter()
            .filter(|id| id.as_str() != order_id)
            .filter_map(|id| index.node(id))
            .collect();
        if targets.is_empty() {
            return None;
        }
        let sum: u64 = targets.iter().map(|&to| self.minutes[from][to] as u64).sum();
        Some(sum as f64 / targets.len() as f64)
    }
}

/// Order id to matrix node lookup.
#[derive(Debug, Clone, Default)]
pub struct MatrixIndex {
    nodes: HashMap<String, usize>,
}

impl MatrixIndex {
    pub fn node(&self, order_id: &str) -> Option<usize> {
        self.nodes.get(order_id).copied()
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.nodes.contains_key(order_id)
    }
}

// ==========================================
// RouteRequest - one window's routing problem
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub window_id: String,
    pub order_ids: Vec<String>,      // node k + 1 = order_ids[k]
    pub travel_minutes: Vec<Vec<u32>>, // depot + subset
    pub demands: Vec<u32>,           // per node, depot = 0
    pub service_minutes: Vec<u32>,   // per node, depot = 0
    pub vehicle_capacity: u32,
    pub max_route_minutes: u32,
    pub drop_penalty: u64,
    pub time_budget_ms: u64,
}

impl RouteRequest {
    pub fn node_count(&self) -> usize {
        self.order_ids.len() + 1
    }
}

// ==========================================
// RouteResponse - raw router answer (node indices)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeptNode {
    pub node: usize,
    pub sequence_index: usize,
    pub arrival_min: u32, // cumulative drive + service before arrival
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedNode {
    pub node: usize,
    pub hint: Option<String>, // solver reason, e.g. "capacity" / "duration"
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    pub kept: Vec<KeptNode>,
    pub dropped: Vec<DroppedNode>,
}

// ==========================================
// RouteResult - interpreted answer (order ids)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeptStop {
    pub order_id: String,
    pub sequence_index: usize,
    pub arrival_min: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedStop {
    pub order_id: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub window_id: String,
    pub kept: Vec<KeptStop>,
    pub dropped: Vec<DroppedStop>,
    pub elapsed_ms: u64,
}

impl RouteResult {
    pub fn kept_ids(&self) -> Vec<String> {
        self.kept.iter().map(|s| s.order_id.clone()).collect()
    }

    pub fn is_kept(&self, order_id: &str) -> bool {
        self.kept.iter().any(|s| s.order_id == order_id)
    }

    pub fn kept_stop(&self, order_id: &str) -> Option<&KeptStop> {
        self.kept.iter().find(|s| s.order_id == order_id)
    }
}

// ==========================================
// RouteMetrics - per-window route summary
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub stops: usize,
    pub total_units: u32,
    pub load_factor_pct: f64,
    pub drive_minutes: u32,
    pub service_minutes: u32,
    pub total_minutes: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_matrix() -> TravelTimeMatrix {
        TravelTimeMatrix::new(
            vec!["A".into(), "B".into(), "C".into()],
            vec![
                vec![0, 5, 7, 9],
                vec![5, 0, 2, 4],
                vec![7, 2, 0, 6],
                vec![9, 4, 6, 0],
            ],
        )
    }

    #[test]
    fn test_validate_shape() {
        assert!(sample_matrix().validate().is_ok());

        let bad = TravelTimeMatrix::new(vec!["A".into()], vec![vec![0, 1]]);
        let err = bad.validate().unwrap_err();
        assert!(err.starts_with("MATRIX_SHAPE"));

        let dup = TravelTimeMatrix::new(vec!["A".into(), "A".into()], vec![vec![0; 3]; 3]);
        assert!(dup.validate().unwrap_err().starts_with("MATRIX_DUPLICATE_ORDER"));
    }

    #[test]
    fn test_submatrix_keeps_depot_first() {
        let matrix = sample_matrix();
        let index = matrix.index();
        let sub = matrix
            .submatrix(&index, &["C".to_string(), "A".to_string()])
            .unwrap();
        assert_eq!(sub, vec![vec![0, 9, 5], vec![9, 0, 4], vec![5, 4, 0]]);

        assert!(matrix.submatrix(&index, &["Z".to_string()]).is_none());
    }

    #[test]
    fn test_avg_travel_to_cluster() {
        let matrix = sample_matrix();
        let index = matrix.index();
        let avg = matrix
            .avg_travel_to(&index, "A", &["B".to_string(), "C".to_string(), "A".to_string()])
            .unwrap();
        assert!((avg - 3.0).abs() < 1e-9);
        assert_eq!(matrix.avg_travel_to(&index, "A", &[]), None);
    }
}
