//! Periodic memory maintenance: decay, promotion and pruning.
//!
//! Steps run in a fixed order inside one pass but are not one transaction.
//! A failed step is logged and the pass carries on; every predicate is
//! comparison-based, so the next pass picks up whatever was missed.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use crate::graph::GraphStore;
use crate::model::{now_ms, Concept, MemoryStatus};

pub const DECAY_RATE: f64 = 0.95;
pub const PROMOTION_THRESHOLD: f64 = 5.0;
pub const PRUNE_THRESHOLD: f64 = 0.1;
pub const LONG_TERM_CONFIDENCE: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifecycleThresholds {
    pub decay_rate: f64,
    pub promotion_strength: f64,
    pub prune_strength: f64,
    pub promoted_confidence: f64,
}

impl Default for LifecycleThresholds {
    fn default() -> Self {
        Self {
            decay_rate: DECAY_RATE,
            promotion_strength: PROMOTION_THRESHOLD,
            prune_strength: PRUNE_THRESHOLD,
            promoted_confidence: LONG_TERM_CONFIDENCE,
        }
    }
}

impl LifecycleThresholds {
    pub fn should_promote(&self, node: &Concept) -> bool {
        node.is_concept()
            && node.is_short_term()
            && node.synaptic_strength > self.promotion_strength
            && (node.validated_by_planner || node.last_validated_at.is_some())
    }

    /// Long-term concepts are never pruned.
    pub fn should_prune(&self, node: &Concept) -> bool {
        node.is_concept() && node.is_short_term() && node.synaptic_strength < self.prune_strength
    }

    /// Promote in place when eligible; returns whether the node changed.
    pub fn promote(&self, node: &mut Concept, now: i64) -> bool {
        if !self.should_promote(node) {
            return false;
        }
        node.status = MemoryStatus::LongTerm;
        node.intrinsic_confidence = self.promoted_confidence;
        node.promoted_at = Some(now);
        node.last_activated_at.get_or_insert(now);
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaintenanceReport {
    pub backfilled: usize,
    pub repaired: usize,
    pub decayed: usize,
    pub promoted: usize,
    pub pruned: usize,
    pub failed_steps: Vec<&'static str>,
}

#[derive(Clone)]
pub struct LifecycleManager {
    store: Arc<dyn GraphStore>,
    thresholds: LifecycleThresholds,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self::with_thresholds(store, LifecycleThresholds::default())
    }

    pub fn with_thresholds(store: Arc<dyn GraphStore>, thresholds: LifecycleThresholds) -> Self {
        Self { store, thresholds }
    }

    pub fn thresholds(&self) -> &LifecycleThresholds {
        &self.thresholds
    }

    /// One maintenance pass. Out-of-range values are repaired first, and decay
    /// runs before promotion and pruning so both see this cycle's strength.
    pub async fn run_cycle(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();
        let now = now_ms();

        match self.store.backfill_ids().await {
            Ok(n) => report.backfilled = n,
            Err(err) => {
                error!(error = %err, "id backfill failed");
                report.failed_steps.push("backfill");
            }
        }
        match self.store.repair_confidences().await {
            Ok(n) => report.repaired = n,
            Err(err) => {
                error!(error = %err, "confidence repair failed");
                report.failed_steps.push("repair");
            }
        }
        match self.store.decay_strength(self.thresholds.decay_rate).await {
            Ok(n) => report.decayed = n,
            Err(err) => {
                error!(error = %err, "strength decay failed");
                report.failed_steps.push("decay");
            }
        }
        match self.store.promote_concepts(&self.thresholds, now).await {
            Ok(n) => report.promoted = n,
            Err(err) => {
                error!(error = %err, "promotion failed");
                report.failed_steps.push("promote");
            }
        }
        match self.store.prune_concepts(&self.thresholds).await {
            Ok(n) => report.pruned = n,
            Err(err) => {
                error!(error = %err, "pruning failed");
                report.failed_steps.push("prune");
            }
        }

        info!(
            backfilled = report.backfilled,
            repaired = report.repaired,
            decayed = report.decayed,
            promoted = report.promoted,
            pruned = report.pruned,
            "memory maintenance cycle finished"
        );
        report
    }
}

/// Drive `run_cycle` on a fixed interval until the task is aborted.
pub async fn maintenance_loop(manager: LifecycleManager, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let report = manager.run_cycle().await;
        if !report.failed_steps.is_empty() {
            error!(failed = ?report.failed_steps, "maintenance cycle incomplete");
        }
    }
}
