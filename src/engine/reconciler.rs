// ==========================================
// Delivery Window Planner - movement reconciler
// ==========================================
// Responsibility: aggregate final per-order states into the
// movement-by-window table and verify the accounting
// Rule: any mismatch is fatal for the run
// ==========================================
// Checks:
// - every order has a final state matching its physical placement
// - every non-cancel order sits in exactly one kept list, cancels in none
// - per window: in_window + received == kept
// - sum of total_orders == uploaded orders == sum of per-order states
// - sum of received == sum of deliver_early + reschedule
// ==========================================

use crate::domain::movement::{MovementRow, MovementTable};
use crate::domain::order::Order;
use crate::domain::types::FinalState;
use crate::domain::window::Window;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{error, info, instrument};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconciliationError {
    #[error("RECONCILIATION: order {order_id} has no final state")]
    MissingFinalState { order_id: String },

    #[error("RECONCILIATION: order {order_id} references unknown window '{window_id}'")]
    UnknownWindow { order_id: String, window_id: String },

    #[error("RECONCILIATION: window {window_id} kept unknown order {order_id}")]
    UnknownKeptOrder { window_id: String, order_id: String },

    #[error("RECONCILIATION: order {order_id} is {state} but not kept by {window}")]
    PhantomPlacement {
        order_id: String,
        state: FinalState,
        window: String,
    },

    #[error("RECONCILIATION: order {order_id} kept by more than one window: {windows}")]
    DuplicatePlacement { order_id: String, windows: String },

    #[error("RECONCILIATION: order {order_id} is CANCEL but kept by {window_id}")]
    CancelledButKept { order_id: String, window_id: String },

    #[error("RECONCILIATION: order {order_id} labelled {actual}, placement implies {expected}")]
    StateMismatch {
        order_id: String,
        expected: FinalState,
        actual: FinalState,
    },

    #[error("RECONCILIATION: window {window_id} counts {counted} kept orders, router kept {kept}")]
    WindowKeptMismatch {
        window_id: String,
        counted: usize,
        kept: usize,
    },

    #[error("RECONCILIATION: {what} total {counted} differs from uploaded order count {uploaded}")]
    TotalMismatch {
        what: String,
        counted: usize,
        uploaded: usize,
    },

    #[error("RECONCILIATION: {received} received orders but {outbound} moved out of their window")]
    FlowMismatch { received: usize, outbound: usize },
}

pub struct MovementReconciler {
    // stateless
}

impl Default for MovementReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl MovementReconciler {
    pub fn new() -> Self {
        Self {}
    }

    /// Builds the movement table from final orders and each window's kept list.
    /// `windows` must be chronological.
    #[instrument(skip_all, fields(orders = orders.len(), windows = windows.len(), uploaded))]
    pub fn reconcile(
        &self,
        orders: &[Order],
        windows: &[Window],
        kept_by_window: &HashMap<String, Vec<String>>,
        uploaded: usize,
    ) -> Result<MovementTable, ReconciliationError> {
        match self.build(orders, windows, kept_by_window, uploaded) {
            Ok(table) => {
                info!(
                    uploaded,
                    in_window = table.totals.in_window,
                    received = table.totals.received,
                    deliver_early = table.totals.deliver_early,
                    reschedule = table.totals.reschedule,
                    cancel = table.totals.cancel,
                    "movement reconciled"
                );
                Ok(table)
            }
            Err(e) => {
                error!(error = %e, "movement reconciliation failed");
                Err(e)
            }
        }
    }

    fn build(
        &self,
        orders: &[Order],
        windows: &[Window],
        kept_by_window: &HashMap<String, Vec<String>>,
        uploaded: usize,
    ) -> Result<MovementTable, ReconciliationError> {
        let rank_of: HashMap<&str, usize> = windows
            .iter()
            .enumerate()
            .map(|(i, w)| (w.window_id.as_str(), i))
            .collect();
        let known_orders: HashMap<&str, &Order> = orders.iter().map(|o| (o.order_id.as_str(), o)).collect();

        // 1. physical placement from kept lists
        let mut placement: HashMap<&str, &str> = HashMap::new();
        for window in windows {
            let kept = kept_by_window.get(&window.window_id).map(|v| v.as_slice()).unwrap_or(&[]);
            for order_id in kept {
                if !known_orders.contains_key(order_id.as_str()) {
                    return Err(ReconciliationError::UnknownKeptOrder {
                        window_id: window.window_id.clone(),
                        order_id: order_id.clone(),
                    });
                }
                if let Some(previous) = placement.insert(order_id.as_str(), window.window_id.as_str()) {
                    return Err(ReconciliationError::DuplicatePlacement {
                        order_id: order_id.clone(),
                        windows: format!("{}, {}", previous, window.window_id),
                    });
                }
            }
        }
        for window_id in kept_by_window.keys() {
            if !rank_of.contains_key(window_id.as_str()) {
                if let Some(order_id) = kept_by_window[window_id].first() {
                    return Err(ReconciliationError::UnknownWindow {
                        order_id: order_id.clone(),
                        window_id: window_id.clone(),
                    });
                }
            }
        }

        // 2. per-order state check and row accumulation
        let mut rows: Vec<MovementRow> = windows.iter().map(|w| MovementRow::new(w.window_id.clone())).collect();
        let mut state_counts: BTreeMap<FinalState, usize> = FinalState::ALL.iter().map(|s| (*s, 0)).collect();

        for order in orders {
            let state = order.final_state.ok_or_else(|| ReconciliationError::MissingFinalState {
                order_id: order.order_id.clone(),
            })?;
            let requested_rank =
                *rank_of
                    .get(order.requested_window.as_str())
                    .ok_or_else(|| ReconciliationError::UnknownWindow {
                        order_id: order.order_id.clone(),
                        window_id: order.requested_window.clone(),
                    })?;

            match placement.get(order.order_id.as_str()) {
                None => {
                    if state != FinalState::Cancel {
                        return Err(ReconciliationError::PhantomPlacement {
                            order_id: order.order_id.clone(),
                            state,
                            window: order.assigned_window.clone().unwrap_or_else(|| "no window".to_string()),
                        });
                    }
                    rows[requested_rank].cancel += 1;
                }
                Some(&placed) => {
                    if state == FinalState::Cancel {
                        return Err(ReconciliationError::CancelledButKept {
                            order_id: order.order_id.clone(),
                            window_id: placed.to_string(),
                        });
                    }
                    if order.assigned_window.as_deref() != Some(placed) {
                        return Err(ReconciliationError::PhantomPlacement {
                            order_id: order.order_id.clone(),
                            state,
                            window: order.assigned_window.clone().unwrap_or_else(|| "no window".to_string()),
                        });
                    }
                    let placed_rank = rank_of[placed];
                    let expected = FinalState::from_placement(requested_rank, placed_rank);
                    if state != expected {
                        return Err(ReconciliationError::StateMismatch {
                            order_id: order.order_id.clone(),
                            expected,
                            actual: state,
                        });
                    }
                    match expected {
                        FinalState::InWindow => rows[placed_rank].in_window += 1,
                        FinalState::DeliverEarly => {
                            rows[placed_rank].received += 1;
                            rows[requested_rank].deliver_early += 1;
                        }
                        _ => {
                            rows[placed_rank].received += 1;
                            rows[requested_rank].reschedule += 1;
                        }
                    }
                }
            }
            *state_counts.entry(state).or_insert(0) += 1;
        }

        // 3. per-window kept check
        for row in rows.iter_mut() {
            row.total_orders = row.in_window + row.received + row.cancel;
            let kept = kept_by_window.get(&row.window_id).map(|v| v.len()).unwrap_or(0);
            if row.kept() != kept {
                return Err(ReconciliationError::WindowKeptMismatch {
                    window_id: row.window_id.clone(),
                    counted: row.kept(),
                    kept,
                });
            }
        }

        // 4. global checks
        let table = MovementTable::from_rows(rows, state_counts, uploaded);
        if table.totals.total_orders != uploaded {
            return Err(ReconciliationError::TotalMismatch {
                what: "Total Orders row".to_string(),
                counted: table.totals.total_orders,
                uploaded,
            });
        }
        if table.header_total() != uploaded {
            return Err(ReconciliationError::TotalMismatch {
                what: "per-order state".to_string(),
                counted: table.header_total(),
                uploaded,
            });
        }
        let outbound = table.totals.deliver_early + table.totals.reschedule;
        if table.totals.received != outbound {
            return Err(ReconciliationError::FlowMismatch {
                received: table.totals.received,
                outbound,
            });
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn windows() -> Vec<Window> {
        vec![
            Window::from_times(NaiveTime::from_hms_opt(9, 0, 0).unwrap(), NaiveTime::from_hms_opt(11, 0, 0).unwrap(), 80),
            Window::from_times(NaiveTime::from_hms_opt(11, 0, 0).unwrap(), NaiveTime::from_hms_opt(13, 0, 0).unwrap(), 80),
        ]
    }

    fn placed(id: &str, requested: &str, assigned: Option<&str>, state: FinalState) -> Order {
        let mut o = Order::new(id, "C", "addr", 5, requested);
        o.assigned_window = assigned.map(|s| s.to_string());
        o.final_state = Some(state);
        o
    }

    #[test]
    fn test_reconcile_counts_moves_once() {
        let ws = windows();
        let (a, b) = (ws[0].window_id.as_str(), ws[1].window_id.as_str());
        let orders = vec![
            placed("O1", a, Some(a), FinalState::InWindow),
            placed("O2", a, Some(b), FinalState::Reschedule),
            placed("O3", a, None, FinalState::Cancel),
            placed("O4", b, Some(b), FinalState::InWindow),
        ];
        let mut kept = HashMap::new();
        kept.insert(a.to_string(), vec!["O1".to_string()]);
        kept.insert(b.to_string(), vec!["O2".to_string(), "O4".to_string()]);

        let table = MovementReconciler::new().reconcile(&orders, &ws, &kept, 4).unwrap();
        let row_a = table.row(a).unwrap();
        assert_eq!((row_a.in_window, row_a.reschedule, row_a.cancel, row_a.total_orders), (1, 1, 1, 2));
        let row_b = table.row(b).unwrap();
        assert_eq!((row_b.in_window, row_b.received, row_b.total_orders), (1, 1, 2));
        assert_eq!(table.totals.total_orders, 4);
        assert_eq!(table.header_total(), 4);
    }

    #[test]
    fn test_label_without_placement_is_fatal() {
        let ws = windows();
        let (a, b) = (ws[0].window_id.as_str(), ws[1].window_id.as_str());
        // labelled Reschedule but never inserted into B's kept list
        let orders = vec![placed("O1", a, Some(b), FinalState::Reschedule)];
        let kept = HashMap::new();
        let err = MovementReconciler::new().reconcile(&orders, &ws, &kept, 1).unwrap_err();
        assert!(matches!(err, ReconciliationError::PhantomPlacement { .. }));
    }

    #[test]
    fn test_missing_state_and_duplicates_are_fatal() {
        let ws = windows();
        let (a, b) = (ws[0].window_id.as_str(), ws[1].window_id.as_str());
        let mut o = Order::new("O1", "C", "addr", 5, a);
        o.assigned_window = Some(a.to_string());
        let err = MovementReconciler::new()
            .reconcile(&[o], &ws, &HashMap::new(), 1)
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::MissingFinalState { .. }));

        let orders = vec![placed("O1", a, Some(a), FinalState::InWindow)];
        let mut kept = HashMap::new();
        kept.insert(a.to_string(), vec!["O1".to_string()]);
        kept.insert(b.to_string(), vec!["O1".to_string()]);
        let err = MovementReconciler::new().reconcile(&orders, &ws, &kept, 1).unwrap_err();
        assert!(matches!(err, ReconciliationError::DuplicatePlacement { .. }));
    }

    #[test]
    fn test_uploaded_count_mismatch_is_fatal() {
        let ws = windows();
        let a = ws[0].window_id.as_str();
        let orders = vec![placed("O1", a, None, FinalState::Cancel)];
        let err = MovementReconciler::new()
            .reconcile(&orders, &ws, &HashMap::new(), 2)
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::TotalMismatch { counted: 1, uploaded: 2, .. }));
    }

    #[test]
    fn test_wrong_direction_label_is_fatal() {
        let ws = windows();
        let (a, b) = (ws[0].window_id.as_str(), ws[1].window_id.as_str());
        let orders = vec![placed("O1", a, Some(b), FinalState::DeliverEarly)];
        let mut kept = HashMap::new();
        kept.insert(b.to_string(), vec!["O1".to_string()]);
        let err = MovementReconciler::new().reconcile(&orders, &ws, &kept, 1).unwrap_err();
        assert_eq!(
            err,
            ReconciliationError::StateMismatch {
                order_id: "O1".to_string(),
                expected: FinalState::Reschedule,
                actual: FinalState::DeliverEarly,
            }
        );
    }
}
