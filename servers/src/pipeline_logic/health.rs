use std::collections::BTreeMap;
use std::time::Duration;

use tracing::debug;

/// How often services report the traffic they handled.
pub const HEALTH_CHECK_PERIOD: Duration = Duration::from_secs(3);

/// Per-entity message counters, reset each time they are reported.
#[derive(Debug, Default)]
pub struct EntityCounters {
    service: String,
    counts: BTreeMap<String, u64>,
}

impl EntityCounters {
    pub fn new(service: &str, entities: &[&str]) -> Self {
        Self {
            service: service.to_string(),
            counts: entities.iter().map(|e| (e.to_string(), 0)).collect(),
        }
    }

    /// Counts one message for `entity`. Returns false for an unknown entity.
    pub fn record(&mut self, entity: &str) -> bool {
        match self.counts.get_mut(entity) {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    /// Logs the non-zero counters and resets them. Returns the total logged.
    pub fn report(&mut self) -> u64 {
        let mut total = 0;
        for (entity, count) in self.counts.iter_mut().filter(|(_, c)| **c > 0) {
            debug!("[{}] Received since last check: {} {}", self.service, count, entity);
            total += *count;
            *count = 0;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_known_entities_and_resets_on_report() {
        let mut counters = EntityCounters::new("loader", &["Order", "Product"]);
        assert!(counters.record("Order"));
        assert!(counters.record("Order"));
        assert!(counters.record("Product"));
        assert!(!counters.record("Customer"));

        assert_eq!(counters.report(), 3);
        assert_eq!(counters.report(), 0);
    }
}
