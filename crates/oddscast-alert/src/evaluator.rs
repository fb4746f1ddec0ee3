//! Swing evaluation against consecutive snapshots.
//!
//! Three filters, in order: a global minimum floor (noise below it never
//! alerts anyone), a global per-entity debounce window shared by all
//! subscribers, and each subscriber's personal threshold. Eligibility is
//! snapshotted before the subscriber loop so the whole cycle shares it, and
//! an entity is debounced only if someone was actually notified about it.

use crate::sink::AlertSink;
use crate::subscribers::Subscriber;
use chrono::{DateTime, Duration, Utc};
use oddscast_core::Snapshot;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Swing filter parameters.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, Serialize)]
pub struct SwingConfig {
    /// Global floor in percentage points; deltas below it are never
    /// considered, regardless of subscriber settings.
    #[serde(default = "default_min_swing")]
    pub min_swing: f64,
    /// Per-entity debounce window.
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: i64,
}

fn default_min_swing() -> f64 {
    1.0
}

fn default_debounce_secs() -> i64 {
    3600
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            min_swing: default_min_swing(),
            debounce_secs: default_debounce_secs(),
        }
    }
}

/// One qualifying per-entity move, as handed to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Swing {
    pub entity: String,
    #[serde(rename = "previousValue")]
    pub previous_value: f64,
    #[serde(rename = "newValue")]
    pub new_value: f64,
    pub delta: f64,
}

/// Evaluates snapshot pairs and dispatches notifications.
///
/// The debounce map lives only in process memory, rebuilt empty on restart;
/// expiry is evaluated at check time, never by a background task.
pub struct SwingEvaluator {
    config: SwingConfig,
    debounce: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SwingEvaluator {
    pub fn new(config: SwingConfig) -> Self {
        Self {
            config,
            debounce: Mutex::new(HashMap::new()),
        }
    }

    /// Deltas above the global floor whose entity is not currently
    /// debounced. The shared eligible set for one notification cycle.
    pub fn eligible_swings(
        &self,
        previous: &Snapshot,
        current: &Snapshot,
        now: DateTime<Utc>,
    ) -> Vec<Swing> {
        let debounce = self.debounce.lock();
        let window = Duration::seconds(self.config.debounce_secs);

        current
            .entries
            .iter()
            .filter_map(|entry| {
                let previous_value = previous.probability_of(&entry.name)?;
                let delta = entry.probability - previous_value;
                if delta.abs() < self.config.min_swing {
                    return None;
                }
                if let Some(&last_alert) = debounce.get(&entry.name) {
                    if now - last_alert < window {
                        debug!(entity = %entry.name, "Swing suppressed by debounce window");
                        return None;
                    }
                }
                Some(Swing {
                    entity: entry.name.clone(),
                    previous_value,
                    new_value: entry.probability,
                    delta,
                })
            })
            .collect()
    }

    /// Run one notification cycle. Returns how many notifications were
    /// delivered; a failure for one subscriber never blocks another.
    pub async fn evaluate(
        &self,
        previous: &Snapshot,
        current: &Snapshot,
        subscribers: &[Subscriber],
        sink: &dyn AlertSink,
        now: DateTime<Utc>,
    ) -> usize {
        let eligible = self.eligible_swings(previous, current, now);
        if eligible.is_empty() || subscribers.is_empty() {
            return 0;
        }

        let mut alerted_entities: HashSet<String> = HashSet::new();
        let mut delivered = 0usize;
        for subscriber in subscribers {
            let hits: Vec<Swing> = eligible
                .iter()
                .filter(|swing| swing.delta.abs() >= subscriber.threshold)
                .cloned()
                .collect();
            if hits.is_empty() {
                continue;
            }

            match sink.deliver_swings(subscriber, &hits).await {
                Ok(()) => {
                    delivered += 1;
                    alerted_entities.extend(hits.into_iter().map(|s| s.entity));
                }
                Err(e) => {
                    warn!(email = %subscriber.email, %e, "Swing delivery failed, continuing with remaining subscribers");
                }
            }
        }

        if !alerted_entities.is_empty() {
            info!(
                entities = alerted_entities.len(),
                notifications = delivered,
                "Swing alert cycle complete"
            );
            let mut debounce = self.debounce.lock();
            for entity in alerted_entities {
                debounce.insert(entity, now);
            }
        }
        delivered
    }
}
