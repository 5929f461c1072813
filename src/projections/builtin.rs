//! Built-in projections.

use super::Projection;
use crate::types::EventRecord;
use std::collections::BTreeMap;

/// Running amount per order, folded from `order_created` and
/// `order_adjusted` events with an `{"order": .., "amount": ..}` payload.
#[derive(Debug, Default)]
pub struct OrderTotals {
    totals: BTreeMap<String, f64>,
}

impl OrderTotals {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Projection for OrderTotals {
    fn name(&self) -> &str {
        "order_totals"
    }

    fn apply(&mut self, event: &EventRecord) {
        match event.event_type.as_str() {
            "order_created" | "order_adjusted" => {
                // Events with a malformed payload are skipped, same as
                // unknown types
                let order = match event.payload["order"].as_str() {
                    Some(order) => order,
                    None => return,
                };
                let amount = match event.payload["amount"].as_f64() {
                    Some(amount) => amount,
                    None => return,
                };
                *self.totals.entry(order.to_string()).or_insert(0.0) += amount;
            }
            _ => {}
        }
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(&self.totals).unwrap_or_default()
    }

    fn reset(&mut self) {
        self.totals.clear();
    }
}

/// Count of events seen per event type.
#[derive(Debug, Default)]
pub struct EventTypeCounts {
    counts: BTreeMap<String, u64>,
}

impl EventTypeCounts {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Projection for EventTypeCounts {
    fn name(&self) -> &str {
        "event_type_counts"
    }

    fn apply(&mut self, event: &EventRecord) {
        *self.counts.entry(event.event_type.clone()).or_insert(0) += 1;
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(&self.counts).unwrap_or_default()
    }

    fn reset(&mut self) {
        self.counts.clear();
    }
}
