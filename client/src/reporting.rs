//! Hit report batching.
//!
//! The first couple of hits on a target go out immediately so damage
//! feedback is snappy; rapid follow-ups (piercing volleys, fast fire
//! rates) aggregate per target and flush on an interval. A quiet period
//! on a target restores its immediate budget.

use shared::{CombatConfig, HitEntry, Vec3};
use std::collections::HashMap;

#[derive(Debug)]
struct TargetReportState {
    immediate_used: u32,
    last_hit_ms: u64,
    pending_count: u32,
    pending_last_position: Vec3,
    pending_first_ms: u64,
}

pub struct HitReporter {
    immediate_budget: u32,
    flush_interval_ms: u64,
    budget_reset_ms: u64,
    per_target: HashMap<String, TargetReportState>,
    last_flush_ms: u64,
}

impl HitReporter {
    pub fn new(config: &CombatConfig) -> Self {
        Self {
            immediate_budget: config.immediate_hit_budget,
            flush_interval_ms: config.report_flush_interval_ms,
            budget_reset_ms: config.immediate_budget_reset_ms,
            per_target: HashMap::new(),
            last_flush_ms: 0,
        }
    }

    /// Records one local hit. Returns an entry to send right away while
    /// the target's immediate budget lasts, otherwise queues it for the
    /// next flush.
    pub fn record(&mut self, target_id: &str, position: Vec3, now_ms: u64) -> Option<HitEntry> {
        let state = self
            .per_target
            .entry(target_id.to_string())
            .or_insert(TargetReportState {
                immediate_used: 0,
                last_hit_ms: 0,
                pending_count: 0,
                pending_last_position: Vec3::default(),
                pending_first_ms: 0,
            });

        if now_ms.saturating_sub(state.last_hit_ms) >= self.budget_reset_ms {
            state.immediate_used = 0;
        }
        state.last_hit_ms = now_ms;

        if state.immediate_used < self.immediate_budget {
            state.immediate_used += 1;
            return Some(HitEntry {
                target_id: target_id.to_string(),
                hit_count: 1,
                last_position: position,
                timestamp_ms: now_ms,
            });
        }

        if state.pending_count == 0 {
            state.pending_first_ms = now_ms;
        }
        state.pending_count += 1;
        state.pending_last_position = position;
        None
    }

    /// Drains aggregated hits once the flush interval has elapsed. Each
    /// entry carries the timestamp of the first hit it covers, so server
    /// leeway is judged against when the burst started.
    pub fn flush(&mut self, now_ms: u64) -> Vec<HitEntry> {
        if now_ms.saturating_sub(self.last_flush_ms) < self.flush_interval_ms {
            return Vec::new();
        }
        self.last_flush_ms = now_ms;

        let mut entries = Vec::new();
        for (target_id, state) in self.per_target.iter_mut() {
            if state.pending_count == 0 {
                continue;
            }
            entries.push(HitEntry {
                target_id: target_id.clone(),
                hit_count: state.pending_count,
                last_position: state.pending_last_position,
                timestamp_ms: state.pending_first_ms,
            });
            state.pending_count = 0;
        }

        // Stale targets with spent budgets and nothing pending can go.
        self.per_target.retain(|_, state| {
            state.pending_count > 0
                || now_ms.saturating_sub(state.last_hit_ms) < self.budget_reset_ms
        });

        entries
    }

    pub fn pending_targets(&self) -> usize {
        self.per_target
            .values()
            .filter(|s| s.pending_count > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter() -> HitReporter {
        HitReporter::new(&CombatConfig::default())
    }

    #[test]
    fn test_first_hits_sent_immediately() {
        let mut r = reporter();
        assert!(r.record("enemy-1", Vec3::default(), 1_000).is_some());
        assert!(r.record("enemy-1", Vec3::default(), 1_010).is_some());
        assert!(r.record("enemy-1", Vec3::default(), 1_020).is_none());
    }

    #[test]
    fn test_budget_is_per_target() {
        let mut r = reporter();
        assert!(r.record("enemy-1", Vec3::default(), 1_000).is_some());
        assert!(r.record("enemy-1", Vec3::default(), 1_010).is_some());
        assert!(r.record("enemy-1", Vec3::default(), 1_020).is_none());
        assert!(r.record("enemy-2", Vec3::default(), 1_030).is_some());
    }

    #[test]
    fn test_overflow_aggregates_into_flush() {
        let mut r = reporter();
        r.record("enemy-1", Vec3::default(), 1_000);
        r.record("enemy-1", Vec3::default(), 1_010);
        r.record("enemy-1", Vec3::new(5.0, 0.0, 0.0), 1_020);
        r.record("enemy-1", Vec3::new(6.0, 0.0, 0.0), 1_030);

        let entries = r.flush(1_250);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hit_count, 2);
        assert_eq!(entries[0].last_position.x, 6.0);
        // Timestamp of the first aggregated hit, not the flush time.
        assert_eq!(entries[0].timestamp_ms, 1_020);
    }

    #[test]
    fn test_flush_respects_interval() {
        let mut r = reporter();
        r.record("enemy-1", Vec3::default(), 1_000);
        r.record("enemy-1", Vec3::default(), 1_001);
        r.record("enemy-1", Vec3::default(), 1_002);

        r.last_flush_ms = 1_000;
        assert!(r.flush(1_100).is_empty());
        assert_eq!(r.flush(1_200).len(), 1);
    }

    #[test]
    fn test_flush_with_nothing_pending_is_empty() {
        let mut r = reporter();
        r.record("enemy-1", Vec3::default(), 1_000);
        assert!(r.flush(2_000).is_empty());
    }

    #[test]
    fn test_quiet_period_restores_budget() {
        let mut r = reporter();
        r.record("enemy-1", Vec3::default(), 1_000);
        r.record("enemy-1", Vec3::default(), 1_010);
        assert!(r.record("enemy-1", Vec3::default(), 1_020).is_none());

        // Over a second without hits on this target resets the budget.
        assert!(r.record("enemy-1", Vec3::default(), 2_100).is_some());
    }

    #[test]
    fn test_double_flush_does_not_duplicate() {
        let mut r = reporter();
        r.record("enemy-1", Vec3::default(), 1_000);
        r.record("enemy-1", Vec3::default(), 1_001);
        r.record("enemy-1", Vec3::default(), 1_002);

        assert_eq!(r.flush(1_300).len(), 1);
        assert!(r.flush(1_600).is_empty());
    }
}
