// ==========================================
// Test data builders - orders, windows, travel-time matrices
// ==========================================

use chrono::NaiveTime;
use delivery_window_planner::config::PlannerConfig;
use delivery_window_planner::domain::{Order, TravelTimeMatrix, Window};
use delivery_window_planner::engine::RunInput;
use std::collections::HashMap;

pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// Window with a short id so assertions stay readable.
pub fn window(id: &str, start_hour: u32, end_hour: u32, capacity: u32) -> Window {
    Window::new(id, hm(start_hour, 0), hm(end_hour, 0), capacity)
}

// ==========================================
// Order builder
// ==========================================

pub struct OrderBuilder {
    order: Order,
}

impl OrderBuilder {
    pub fn new(order_id: &str, window_id: &str) -> Self {
        Self {
            order: Order::new(
                order_id,
                format!("CUST-{order_id}"),
                format!("{order_id} Main St"),
                5,
                window_id,
            ),
        }
    }

    pub fn units(mut self, units: u32) -> Self {
        self.order.units = units;
        self
    }

    pub fn early(mut self) -> Self {
        self.order.early_eligible = true;
        self
    }

    pub fn prior(mut self, count: u32) -> Self {
        self.order.prior_reschedule_count = count;
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.order.customer_tag = Some(tag.to_string());
        self
    }

    pub fn build(self) -> Order {
        self.order
    }
}

pub fn order(order_id: &str, window_id: &str, units: u32) -> Order {
    OrderBuilder::new(order_id, window_id).units(units).build()
}

// ==========================================
// Matrix builder
// ==========================================
// Symmetric minutes: depot <-> order, order <-> order, then overrides
// applied in the order they were added

pub struct MatrixBuilder {
    order_ids: Vec<String>,
    depot_minutes: u32,
    between_minutes: u32,
    overrides: Vec<(Option<String>, Option<String>, u32)>, // None = any other order
}

impl MatrixBuilder {
    pub fn new(order_ids: &[&str]) -> Self {
        Self {
            order_ids: order_ids.iter().map(|s| s.to_string()).collect(),
            depot_minutes: 5,
            between_minutes: 5,
            overrides: Vec::new(),
        }
    }

    pub fn for_orders(orders: &[Order]) -> Self {
        let ids: Vec<&str> = orders.iter().map(|o| o.order_id.as_str()).collect();
        Self::new(&ids)
    }

    pub fn depot(mut self, minutes: u32) -> Self {
        self.depot_minutes = minutes;
        self
    }

    pub fn between(mut self, minutes: u32) -> Self {
        self.between_minutes = minutes;
        self
    }

    /// `order_id` is `minutes` away from every other order.
    pub fn isolate(mut self, order_id: &str, minutes: u32) -> Self {
        self.overrides.push((Some(order_id.to_string()), None, minutes));
        self
    }

    pub fn distance(mut self, a: &str, b: &str, minutes: u32) -> Self {
        self.overrides
            .push((Some(a.to_string()), Some(b.to_string()), minutes));
        self
    }

    pub fn build(self) -> TravelTimeMatrix {
        let n = self.order_ids.len() + 1;
        let mut minutes = vec![vec![0u32; n]; n];
        for i in 0..n {
            for j in 0..n {
                minutes[i][j] = if i == j {
                    0
                } else if i == 0 || j == 0 {
                    self.depot_minutes
                } else {
                    self.between_minutes
                };
            }
        }
        let node = |id: &str| self.order_ids.iter().position(|o| o == id).map(|p| p + 1);
        for (a, b, m) in &self.overrides {
            let Some(a) = a.as_deref().and_then(node) else { continue };
            match b.as_deref() {
                Some(b) => {
                    if let Some(b) = node(b) {
                        minutes[a][b] = *m;
                        minutes[b][a] = *m;
                    }
                }
                None => {
                    for other in 1..n {
                        if other != a {
                            minutes[a][other] = *m;
                            minutes[other][a] = *m;
                        }
                    }
                }
            }
        }
        TravelTimeMatrix::new(self.order_ids, minutes)
    }
}

/// Matrix from grid coordinates (depot at the origin), two minutes per block.
pub fn grid_matrix(orders: &[Order], coords: &[(i32, i32)]) -> TravelTimeMatrix {
    let points: Vec<(i32, i32)> = std::iter::once((0, 0)).chain(coords.iter().copied()).collect();
    let minutes: Vec<Vec<u32>> = points
        .iter()
        .map(|a| {
            points
                .iter()
                .map(|b| (((a.0 - b.0).abs() + (a.1 - b.1).abs()) * 2) as u32)
                .collect::<Vec<u32>>()
        })
        .collect();
    TravelTimeMatrix::new(orders.iter().map(|o| o.order_id.clone()).collect(), minutes)
}

pub fn run_input(orders: Vec<Order>, windows: Vec<Window>, matrix: TravelTimeMatrix) -> RunInput {
    RunInput {
        orders,
        windows,
        capacities: HashMap::new(),
        matrix,
    }
}

/// Defaults with short solver budgets for timeout tests.
pub fn fast_config() -> PlannerConfig {
    PlannerConfig {
        solver_time_budget_ms: 50,
        solver_timeout_grace_ms: 50,
        ..PlannerConfig::default()
    }
}
