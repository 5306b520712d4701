// ==========================================
// Delivery Window Planner - movement-by-window table
// ==========================================
// Row semantics (per window W):
// - in_window:      kept in W, requested W
// - received:       kept in W, requested elsewhere
// - deliver_early:  requested W, kept in an earlier window
// - reschedule:     requested W, kept in a later window
// - cancel:         requested W, not kept anywhere
// - total_orders:   in_window + received + cancel (each order counted once)
// Column sums double-count moved orders (received in the target row,
// deliver_early/reschedule in the origin row); the rendered header shows
// per-order final states instead, which sum to the uploaded count.
// ==========================================

use crate::domain::types::FinalState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRow {
    pub window_id: String,
    pub in_window: usize,
    pub received: usize,
    pub deliver_early: usize,
    pub reschedule: usize,
    pub cancel: usize,
    pub total_orders: usize,
}

impl MovementRow {
    pub fn new(window_id: impl Into<String>) -> Self {
        Self {
            window_id: window_id.into(),
            ..Default::default()
        }
    }

    /// Orders whose route ended in this window.
    pub fn kept(&self) -> usize {
        self.in_window + self.received
    }

    pub fn count(&self, state: FinalState) -> usize {
        match state {
            FinalState::InWindow => self.in_window,
            FinalState::Received => self.received,
            FinalState::DeliverEarly => self.deliver_early,
            FinalState::Reschedule => self.reschedule,
            FinalState::Cancel => self.cancel,
        }
    }

    fn add(&mut self, other: &MovementRow) {
        self.in_window += other.in_window;
        self.received += other.received;
        self.deliver_early += other.deliver_early;
        self.reschedule += other.reschedule;
        self.cancel += other.cancel;
        self.total_orders += other.total_orders;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementTable {
    pub rows: Vec<MovementRow>, // chronological window order
    pub totals: MovementRow,    // column sums, window_id = "Total Orders"
    /// Per-order final-state counts; sums to the uploaded order count.
    pub state_counts: BTreeMap<FinalState, usize>,
    pub uploaded_orders: usize,
}

impl MovementTable {
    pub fn from_rows(
        rows: Vec<MovementRow>,
        state_counts: BTreeMap<FinalState, usize>,
        uploaded_orders: usize,
    ) -> Self {
        let mut totals = MovementRow::new("Total Orders");
        for row in &rows {
            totals.add(row);
        }
        Self {
            rows,
            totals,
            state_counts,
            uploaded_orders,
        }
    }

    pub fn row(&self, window_id: &str) -> Option<&MovementRow> {
        self.rows.iter().find(|r| r.window_id == window_id)
    }

    /// Sum of per-order final-state counts.
    pub fn header_total(&self) -> usize {
        self.state_counts.values().sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text rendering; header brackets hold per-order final-state
    /// counts, the last body row holds column sums.
    pub fn render(&self) -> String {
        let mut headers = vec!["Window".to_string()];
        for state in FinalState::ALL {
            let count = self.state_counts.get(&state).copied().unwrap_or(0);
            headers.push(format!("{} ({})", state.label(), count));
        }
        headers.push(format!("Total Orders ({})", self.header_total()));

        let mut body: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                let mut cells = vec![row.window_id.clone()];
                cells.extend(FinalState::ALL.iter().map(|s| row.count(*s).to_string()));
                cells.push(row.total_orders.to_string());
                cells
            })
            .collect();
        let mut total_cells = vec![self.totals.window_id.clone()];
        total_cells.extend(FinalState::ALL.iter().map(|s| self.totals.count(*s).to_string()));
        total_cells.push(self.totals.total_orders.to_string());
        body.push(total_cells);

        let widths: Vec<usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                body.iter()
                    .map(|cells| cells[i].len())
                    .chain(std::iter::once(h.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        let render_line = |out: &mut String, cells: &[String]| {
            let line: Vec<String> = cells
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    if i == 0 {
                        format!("{:<width$}", c, width = widths[i])
                    } else {
                        format!("{:>width$}", c, width = widths[i])
                    }
                })
                .collect();
            let _ = writeln!(out, "{}", line.join(" | "));
        };

        render_line(&mut out, &headers);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        let _ = writeln!(out, "{}", rule.join("-+-"));
        for cells in &body {
            render_line(&mut out, cells);
        }
        out
    }
}
