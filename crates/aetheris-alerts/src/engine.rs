//! The Alert Engine (§4.F): wires the pure hysteresis state machine to the
//! Entity Store and the outbound `alerts` stream.

use crate::error::Result;
use crate::state::{evaluate, AlertEvent, AlertState};
use aetheris_shared::{default_hysteresis, metric_direction, AlertMessage, Severity, ThresholdPair};
use aetheris_store::EntityStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{info, warn};

struct MetricSlot {
    state: AlertState,
    threshold: Option<ThresholdPair>,
    threshold_loaded: bool,
}

impl MetricSlot {
    fn fresh() -> Self {
        Self {
            state: AlertState::Normal,
            threshold: None,
            threshold_loaded: false,
        }
    }
}

/// Per-`(robot_id, metric)` hysteresis engine (§4.F). Partitioned behind a
/// `RwLock<HashMap<..., Arc<Mutex<_>>>>` rather than one global lock —
/// readers (new-key inserts) briefly hold the write lock, every subsequent
/// observation only takes the per-key `Mutex`.
pub struct AlertEngine {
    store: Arc<EntityStore>,
    slots: RwLock<HashMap<(String, String), Arc<Mutex<MetricSlot>>>>,
    outbound: mpsc::Sender<AlertMessage>,
}

impl AlertEngine {
    pub fn new(store: Arc<EntityStore>, outbound: mpsc::Sender<AlertMessage>) -> Self {
        Self {
            store,
            slots: RwLock::new(HashMap::new()),
            outbound,
        }
    }

    /// Reconstructs in-memory state from the Entity Store's currently open
    /// alerts (§4.F: "reconstructed on startup"). Must run before any
    /// `observe` call.
    pub async fn reconstruct(&self) -> Result<()> {
        let open = self.store.list_open_alerts()?;
        let mut by_key: HashMap<(String, String), Severity> = HashMap::new();
        for alert in open {
            let key = (alert.robot_id.clone(), alert.alert_type.clone());
            let entry = by_key.entry(key).or_insert(alert.severity);
            if alert.severity > *entry {
                *entry = alert.severity;
            }
        }
        let mut slots = self.slots.write().await;
        for (key, severity) in by_key {
            let state = match severity {
                Severity::Critical => AlertState::Critical,
                Severity::Warning => AlertState::Warning,
                Severity::Info => AlertState::Normal,
            };
            slots.insert(
                key,
                Arc::new(Mutex::new(MetricSlot {
                    state,
                    threshold: None,
                    threshold_loaded: false,
                })),
            );
        }
        info!(slots = slots.len(), "alert engine reconstructed from entity store");
        Ok(())
    }

    /// Drops the cached threshold for `(robot_id, metric)` so the next
    /// `observe` reloads it from the Entity Store (§4.F: admin-interface
    /// invalidation hook).
    pub async fn invalidate(&self, robot_id: &str, metric: &str) {
        let slots = self.slots.read().await;
        if let Some(slot) = slots.get(&(robot_id.to_string(), metric.to_string())) {
            let mut slot = slot.lock().await;
            slot.threshold_loaded = false;
        }
    }

    async fn slot_for(&self, robot_id: &str, metric: &str) -> Arc<Mutex<MetricSlot>> {
        let key = (robot_id.to_string(), metric.to_string());
        if let Some(slot) = self.slots.read().await.get(&key) {
            return slot.clone();
        }
        let mut slots = self.slots.write().await;
        slots
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(MetricSlot::fresh())))
            .clone()
    }

    /// Evaluates one observation, persisting and publishing any resulting
    /// transition (§4.F).
    pub async fn observe(&self, robot_id: &str, metric: &str, value: f64) -> Result<()> {
        let slot = self.slot_for(robot_id, metric).await;
        let mut slot = slot.lock().await;

        if !slot.threshold_loaded {
            slot.threshold = self.store.get_threshold(robot_id, metric)?;
            slot.threshold_loaded = true;
        }

        let Some(threshold) = slot.threshold else {
            return Ok(());
        };
        if !threshold.enabled {
            return Ok(());
        }

        let direction = metric_direction(metric);
        let (h_w, h_c) = default_hysteresis()
            .get(metric)
            .copied()
            .unwrap_or((2.0, 3.0));

        let (new_state, events) = evaluate(
            slot.state,
            value,
            threshold.warn_value,
            threshold.crit_value,
            h_w,
            h_c,
            direction,
        );
        slot.state = new_state;

        for event in events {
            self.apply_event(robot_id, metric, value, &threshold, event).await?;
        }
        Ok(())
    }

    async fn apply_event(
        &self,
        robot_id: &str,
        metric: &str,
        value: f64,
        threshold: &ThresholdPair,
        event: AlertEvent,
    ) -> Result<()> {
        match event {
            AlertEvent::Open(severity) => {
                let threshold_value = match severity {
                    Severity::Critical => threshold.crit_value,
                    _ => threshold.warn_value,
                };
                self.store.create_alert(
                    robot_id,
                    metric,
                    severity,
                    "alert-engine",
                    value,
                    threshold_value,
                    &format!("{} {:?} threshold", metric, severity),
                    &format!("{metric} observed at {value}, threshold {threshold_value}"),
                    serde_json::Value::Null,
                )?;
                let message = AlertMessage {
                    robot_id: robot_id.to_string(),
                    severity: severity.as_str().to_string(),
                    metric: metric.to_string(),
                    value,
                    timestamp: chrono::Utc::now(),
                    message: format!("{metric} crossed {} threshold", severity.as_str()),
                };
                if self.outbound.send(message).await.is_err() {
                    warn!(robot_id, metric, "no receiver for outbound alert message");
                }
            }
            AlertEvent::Resolve(severity) => {
                self.store.resolve_alert(robot_id, metric, severity)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aetheris_shared::Direction;

    fn engine() -> (AlertEngine, mpsc::Receiver<AlertMessage>) {
        let store = Arc::new(EntityStore::open_in_memory().unwrap());
        let (tx, rx) = mpsc::channel(16);
        (AlertEngine::new(store, tx), rx)
    }

    #[tokio::test]
    async fn observe_with_no_threshold_is_a_noop() {
        let (engine, mut rx) = engine();
        engine.observe("RV-001", "cpu_temperature", 95.0).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn observe_opens_warning_then_critical_then_resolves() {
        let (engine, mut rx) = engine();
        engine.store.upsert_robot_on_seen("RV-001", chrono::Utc::now(), None).unwrap();
        engine
            .store
            .set_threshold(
                "RV-001",
                "cpu_temperature",
                ThresholdPair {
                    warn_value: 60.0,
                    crit_value: 80.0,
                    enabled: true,
                },
                Direction::High,
            )
            .unwrap();

        engine.observe("RV-001", "cpu_temperature", 65.0).await.unwrap();
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.severity, "warning");
        assert_eq!(engine.store.list_open_alerts().unwrap().len(), 1);

        engine.observe("RV-001", "cpu_temperature", 85.0).await.unwrap();
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.severity, "critical");
        assert_eq!(engine.store.list_open_alerts().unwrap().len(), 2);

        engine.observe("RV-001", "cpu_temperature", 76.0).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(engine.store.list_open_alerts().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repeated_in_band_samples_do_not_republish() {
        let (engine, mut rx) = engine();
        engine.store.upsert_robot_on_seen("RV-001", chrono::Utc::now(), None).unwrap();
        engine
            .store
            .set_threshold(
                "RV-001",
                "cpu_temperature",
                ThresholdPair {
                    warn_value: 60.0,
                    crit_value: 80.0,
                    enabled: true,
                },
                Direction::High,
            )
            .unwrap();

        engine.observe("RV-001", "cpu_temperature", 62.0).await.unwrap();
        rx.try_recv().unwrap();
        engine.observe("RV-001", "cpu_temperature", 62.0).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(engine.store.list_open_alerts().unwrap().len(), 1);

        engine.observe("RV-001", "cpu_temperature", 82.0).await.unwrap();
        rx.try_recv().unwrap();
        engine.observe("RV-001", "cpu_temperature", 82.0).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(engine.store.list_open_alerts().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reconstruct_restores_critical_state_from_store() {
        let store = Arc::new(EntityStore::open_in_memory().unwrap());
        store.upsert_robot_on_seen("RV-001", chrono::Utc::now(), None).unwrap();
        store
            .create_alert(
                "RV-001", "cpu_temperature", Severity::Critical, "alert-engine",
                90.0, 80.0, "t", "m", serde_json::Value::Null,
            )
            .unwrap();
        let (tx, _rx) = mpsc::channel(16);
        let engine = AlertEngine::new(store, tx);
        engine.reconstruct().await.unwrap();

        let slot = engine.slot_for("RV-001", "cpu_temperature").await;
        assert_eq!(slot.lock().await.state, AlertState::Critical);
    }
}
