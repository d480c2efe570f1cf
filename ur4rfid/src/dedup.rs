//! Tag event deduplication
//!
//! A portal reader sees the same tag many times per second while it sits in
//! the field. The deduplicator turns that stream into crossing events: the
//! first sighting, one announcement when the tag shows up at a different
//! antenna, and re-emission only after a quiet window. Failed deliveries are
//! retried with exponential backoff, and tags that keep being detected are
//! muted until they go quiet.
//!
//! [`decide`] is pure; [`Deduplicator`] owns the per-tag records and hands
//! out copies only.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use ur4rfid_core::constants::{dedup, portal};

/// Deduplication settings
#[derive(Debug, Clone, PartialEq)]
pub struct DedupConfig {
    /// Minimum time between emissions of the same EPC
    pub window: Duration,

    /// Upper bound for failure backoff
    pub backoff_ceiling: Duration,

    /// Detections beyond which a tag is muted
    pub noisy_threshold: u32,

    /// Antenna at the start of the process
    pub entry_antenna: u8,

    /// Antenna at the end of the process
    pub exit_antenna: u8,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window: dedup::WINDOW,
            backoff_ceiling: dedup::BACKOFF_CEILING,
            noisy_threshold: dedup::NOISY_THRESHOLD,
            entry_antenna: portal::ENTRY_ANTENNA,
            exit_antenna: portal::EXIT_ANTENNA,
        }
    }
}

impl DedupConfig {
    /// Set window
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set backoff ceiling
    pub fn with_backoff_ceiling(mut self, ceiling: Duration) -> Self {
        self.backoff_ceiling = ceiling;
        self
    }

    /// Set noisy threshold
    pub fn with_noisy_threshold(mut self, threshold: u32) -> Self {
        self.noisy_threshold = threshold;
        self
    }

    /// Set entry and exit antennas
    pub fn with_portal(mut self, entry: u8, exit: u8) -> Self {
        self.entry_antenna = entry;
        self.exit_antenna = exit;
        self
    }

    /// Idle time after which the detection count decays
    pub fn decay_after(&self) -> Duration {
        self.window.saturating_mul(dedup::DECAY_FACTOR)
    }

    /// Idle time after which a record is forgotten
    pub fn expire_after(&self) -> Duration {
        self.window.saturating_mul(dedup::EXPIRY_FACTOR)
    }

    /// Backoff before retrying after `attempts` failed deliveries
    pub fn backoff(&self, attempts: u32) -> Duration {
        2u32.checked_pow(attempts)
            .and_then(|factor| self.window.checked_mul(factor))
            .map_or(self.backoff_ceiling, |backoff| backoff.min(self.backoff_ceiling))
    }
}

/// Per-EPC history
#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    pub first_seen_at: Instant,
    pub last_seen_at: Instant,

    /// Last emission or delivery report
    pub last_sent_at: Instant,

    pub first_antenna: u8,
    pub last_antenna: u8,
    pub detection_count: u32,

    /// Failed deliveries since the last success
    pub attempts_since_success: u32,
    pub last_attempt_succeeded: bool,

    /// The tag was already announced at an antenna other than its first
    pub announced_antenna_change: bool,

    pub crossed_entry: bool,
    pub crossed_exit: bool,

    /// A sweep already decayed the count since the last detection
    swept_while_idle: bool,
}

impl TagRecord {
    fn new(antenna: u8, now: Instant, config: &DedupConfig) -> Self {
        Self {
            first_seen_at: now,
            last_seen_at: now,
            last_sent_at: now,
            first_antenna: antenna,
            last_antenna: antenna,
            detection_count: 1,
            attempts_since_success: 0,
            last_attempt_succeeded: true,
            announced_antenna_change: false,
            crossed_entry: antenna == config.entry_antenna,
            crossed_exit: antenna == config.exit_antenna,
            swept_while_idle: false,
        }
    }

    /// Time since the tag was last detected
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen_at)
    }

    fn observe(&mut self, antenna: u8, now: Instant, config: &DedupConfig) {
        self.last_seen_at = now;
        self.last_antenna = antenna;
        self.detection_count = self.detection_count.saturating_add(1);
        self.swept_while_idle = false;

        if antenna == config.entry_antenna {
            self.crossed_entry = true;
        } else if antenna == config.exit_antenna {
            self.crossed_exit = true;
        }
    }

    fn decay(&mut self) {
        self.detection_count = (self.detection_count / 2).max(1);
    }
}

/// Outcome of one detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Never seen before
    FirstSighting,

    /// Seen at an antenna other than its first, announced once
    AntennaChanged,

    /// Within the window of the last emission
    CoolingDown,

    /// Last delivery failed and its backoff has elapsed
    Retry,

    /// Last delivery failed and its backoff has not elapsed
    BackingOff { remaining: Duration },

    /// Detected too often to be a real crossing
    Noisy,

    /// Window elapsed since the last emission
    WindowElapsed,
}

impl Decision {
    /// Check if the detection becomes an event
    pub fn is_emit(self) -> bool {
        matches!(
            self,
            Self::FirstSighting | Self::AntennaChanged | Self::Retry | Self::WindowElapsed
        )
    }
}

/// Decide whether a detection of a tag at `antenna` becomes an event
///
/// `record` is the tag's history including this detection, or `None` for a
/// tag never seen before.
pub fn decide(record: Option<&TagRecord>, antenna: u8, now: Instant, config: &DedupConfig) -> Decision {
    let Some(record) = record else {
        return Decision::FirstSighting;
    };

    if antenna != record.first_antenna && !record.announced_antenna_change {
        return Decision::AntennaChanged;
    }

    let elapsed = now.saturating_duration_since(record.last_sent_at);
    if elapsed < config.window {
        return Decision::CoolingDown;
    }

    if !record.last_attempt_succeeded {
        let backoff = config.backoff(record.attempts_since_success);
        return if elapsed >= backoff {
            Decision::Retry
        } else {
            Decision::BackingOff {
                remaining: backoff - elapsed,
            }
        };
    }

    if record.detection_count > config.noisy_threshold {
        return Decision::Noisy;
    }

    Decision::WindowElapsed
}

/// Deduplication counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    /// First sightings, including tags seen again after expiring
    pub unique_tags: u64,

    /// Detections that became events
    pub emitted: u64,

    /// Detections suppressed
    pub duplicates_avoided: u64,

    /// Events at the entry antenna
    pub entry_events: u64,

    /// Events at the exit antenna
    pub exit_events: u64,

    /// Delivery reports received
    pub delivered: u64,
    pub failed: u64,
}

/// Stateful deduplicator
///
/// Not shared: a single owner feeds detections and delivery outcomes.
#[derive(Debug, Default)]
pub struct Deduplicator {
    config: DedupConfig,
    records: HashMap<String, TagRecord>,
    stats: DedupStats,
}

impl Deduplicator {
    /// Create a deduplicator
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            records: HashMap::new(),
            stats: DedupStats::default(),
        }
    }

    /// Settings in use
    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Record a detection and decide whether it becomes an event
    pub fn observe(&mut self, epc: &str, antenna: u8, now: Instant) -> Decision {
        let expire_after = self.config.expire_after();
        if self
            .records
            .get(epc)
            .is_some_and(|record| record.idle(now) > expire_after)
        {
            debug!("Forgetting expired tag {}", epc);
            self.records.remove(epc);
        }

        let decision = match self.records.get_mut(epc) {
            None => {
                self.records
                    .insert(epc.to_string(), TagRecord::new(antenna, now, &self.config));
                self.stats.unique_tags += 1;
                Decision::FirstSighting
            }
            Some(record) => {
                // Sweeps decay idle records on their own schedule
                if record.idle(now) > self.config.decay_after() && !record.swept_while_idle {
                    record.decay();
                }
                record.observe(antenna, now, &self.config);

                let decision = decide(Some(record), antenna, now, &self.config);
                if decision.is_emit() {
                    record.last_sent_at = now;
                }
                if decision == Decision::AntennaChanged {
                    record.announced_antenna_change = true;
                }
                decision
            }
        };

        if decision.is_emit() {
            self.stats.emitted += 1;
            if antenna == self.config.entry_antenna {
                self.stats.entry_events += 1;
            } else if antenna == self.config.exit_antenna {
                self.stats.exit_events += 1;
            }
            debug!("Emit {} at antenna {} ({:?})", epc, antenna, decision);
        } else {
            self.stats.duplicates_avoided += 1;
            trace!("Suppress {} at antenna {} ({:?})", epc, antenna, decision);
        }

        decision
    }

    /// Record a detection; true if it becomes an event
    pub fn should_emit(&mut self, epc: &str, antenna: u8, now: Instant) -> bool {
        self.observe(epc, antenna, now).is_emit()
    }

    /// Record the delivery outcome of an emitted event
    ///
    /// Returns false for an unknown EPC.
    pub fn record_outcome(&mut self, epc: &str, succeeded: bool, now: Instant) -> bool {
        let Some(record) = self.records.get_mut(epc) else {
            debug!("Outcome for unknown tag {}", epc);
            return false;
        };

        record.last_sent_at = now;
        record.last_attempt_succeeded = succeeded;

        if succeeded {
            record.attempts_since_success = 0;
            self.stats.delivered += 1;
        } else {
            record.attempts_since_success = record.attempts_since_success.saturating_add(1);
            self.stats.failed += 1;
            debug!(
                "Delivery of {} failed ({} attempts), next retry in {:?}",
                epc,
                record.attempts_since_success,
                self.config.backoff(record.attempts_since_success)
            );
        }

        true
    }

    /// Decay idle records and forget expired ones
    ///
    /// Returns the number of records removed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.records.len();
        let expire_after = self.config.expire_after();
        let decay_after = self.config.decay_after();

        self.records.retain(|_, record| record.idle(now) <= expire_after);
        for record in self.records.values_mut() {
            if record.idle(now) > decay_after {
                record.decay();
                record.swept_while_idle = true;
            }
        }

        let removed = before - self.records.len();
        if removed > 0 {
            debug!("Swept {} expired tags, {} remain", removed, self.records.len());
        }
        removed
    }

    /// Copy of the record for `epc`
    pub fn snapshot(&self, epc: &str) -> Option<TagRecord> {
        self.records.get(epc).cloned()
    }

    /// Counters so far
    pub fn stats(&self) -> DedupStats {
        self.stats
    }

    /// Number of tracked tags
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EPC: &str = "E20040112233445566778899";

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn fast() -> DedupConfig {
        DedupConfig::default()
            .with_window(secs(1))
            .with_backoff_ceiling(secs(8))
    }

    #[test]
    fn test_first_sighting_emits() {
        let mut dedup = Deduplicator::new(DedupConfig::default());
        let t0 = Instant::now();

        assert_eq!(dedup.observe(EPC, 1, t0), Decision::FirstSighting);

        let record = dedup.snapshot(EPC).unwrap();
        assert_eq!(record.first_antenna, 1);
        assert_eq!(record.detection_count, 1);
        assert!(record.crossed_entry);
        assert!(!record.crossed_exit);
        assert_eq!(dedup.stats().unique_tags, 1);
        assert_eq!(dedup.stats().entry_events, 1);
    }

    #[test]
    fn test_cooldown_suppresses() {
        let mut dedup = Deduplicator::new(DedupConfig::default());
        let t0 = Instant::now();

        assert!(dedup.should_emit(EPC, 1, t0));
        for i in 1..=5 {
            assert!(!dedup.should_emit(EPC, 1, t0 + secs(i * 10)));
        }

        assert_eq!(dedup.observe(EPC, 1, t0 + secs(299)), Decision::CoolingDown);
        assert_eq!(dedup.stats().duplicates_avoided, 6);
        assert_eq!(dedup.snapshot(EPC).unwrap().detection_count, 7);
    }

    #[test]
    fn test_window_elapsed_emits_again() {
        let mut dedup = Deduplicator::new(fast());
        let t0 = Instant::now();

        assert!(dedup.should_emit(EPC, 1, t0));
        assert_eq!(dedup.observe(EPC, 1, t0 + secs(1)), Decision::WindowElapsed);
        assert_eq!(dedup.observe(EPC, 1, t0 + Duration::from_millis(1500)), Decision::CoolingDown);
    }

    #[test]
    fn test_antenna_change_announced_once() {
        let mut dedup = Deduplicator::new(DedupConfig::default());
        let t0 = Instant::now();

        assert!(dedup.should_emit(EPC, 1, t0));
        assert_eq!(dedup.observe(EPC, 2, t0 + secs(1)), Decision::AntennaChanged);
        assert_eq!(dedup.observe(EPC, 2, t0 + secs(2)), Decision::CoolingDown);
        assert_eq!(dedup.observe(EPC, 1, t0 + secs(3)), Decision::CoolingDown);

        let record = dedup.snapshot(EPC).unwrap();
        assert!(record.announced_antenna_change);
        assert!(record.crossed_entry && record.crossed_exit);
        assert_eq!(record.last_antenna, 1);

        let stats = dedup.stats();
        assert_eq!((stats.entry_events, stats.exit_events), (1, 1));
    }

    #[test]
    fn test_third_antenna_counts_as_change() {
        let mut dedup = Deduplicator::new(DedupConfig::default());
        let t0 = Instant::now();

        assert!(dedup.should_emit(EPC, 1, t0));
        assert_eq!(dedup.observe(EPC, 3, t0 + secs(1)), Decision::AntennaChanged);

        let record = dedup.snapshot(EPC).unwrap();
        assert!(!record.crossed_exit);
        assert_eq!(dedup.stats().exit_events, 0);
    }

    #[test]
    fn test_backoff_grows_after_failures() {
        let config = fast();
        let mut dedup = Deduplicator::new(config.clone());
        let t0 = Instant::now();

        assert!(dedup.should_emit(EPC, 1, t0));
        dedup.record_outcome(EPC, false, t0);

        // One failure: 2s backoff
        assert_eq!(
            dedup.observe(EPC, 1, t0 + Duration::from_millis(1500)),
            Decision::BackingOff { remaining: Duration::from_millis(500) }
        );
        assert_eq!(dedup.observe(EPC, 1, t0 + secs(2)), Decision::Retry);
        dedup.record_outcome(EPC, false, t0 + secs(2));

        // Two failures: 4s backoff
        assert!(!dedup.should_emit(EPC, 1, t0 + secs(5)));
        assert!(dedup.should_emit(EPC, 1, t0 + secs(6)));
        dedup.record_outcome(EPC, false, t0 + secs(6));

        // Three failures: 8s, then capped at the ceiling
        assert!(!dedup.should_emit(EPC, 1, t0 + secs(13)));
        assert!(dedup.should_emit(EPC, 1, t0 + secs(14)));
        dedup.record_outcome(EPC, false, t0 + secs(14));
        assert!(dedup.should_emit(EPC, 1, t0 + secs(22)));

        assert_eq!(config.backoff(4), secs(8));
        assert_eq!(config.backoff(40), secs(8));
        assert_eq!(dedup.snapshot(EPC).unwrap().attempts_since_success, 4);
    }

    #[test]
    fn test_success_resets_attempts() {
        let mut dedup = Deduplicator::new(fast());
        let t0 = Instant::now();

        assert!(dedup.should_emit(EPC, 1, t0));
        dedup.record_outcome(EPC, false, t0);
        dedup.record_outcome(EPC, true, t0);

        let record = dedup.snapshot(EPC).unwrap();
        assert_eq!(record.attempts_since_success, 0);
        assert!(record.last_attempt_succeeded);
        assert_eq!(dedup.observe(EPC, 1, t0 + secs(1)), Decision::WindowElapsed);

        assert!(!dedup.record_outcome("UNKNOWN", true, t0));
        assert_eq!((dedup.stats().delivered, dedup.stats().failed), (1, 1));
    }

    #[test]
    fn test_noisy_tag_is_muted() {
        let config = fast().with_noisy_threshold(3);
        let mut dedup = Deduplicator::new(config);
        let t0 = Instant::now();

        assert!(dedup.should_emit(EPC, 1, t0));
        for i in 1..=3 {
            assert!(!dedup.should_emit(EPC, 1, t0 + Duration::from_millis(i * 100)));
        }

        // Window elapsed but the tag never left the field
        assert_eq!(dedup.observe(EPC, 1, t0 + secs(2)), Decision::Noisy);
        assert_eq!(dedup.observe(EPC, 1, t0 + secs(3)), Decision::Noisy);
    }

    #[test]
    fn test_idle_tag_decays() {
        let config = fast().with_noisy_threshold(3);
        let mut dedup = Deduplicator::new(config);
        let t0 = Instant::now();

        assert!(dedup.should_emit(EPC, 1, t0));
        for i in 1..=7 {
            dedup.observe(EPC, 1, t0 + Duration::from_millis(i * 100));
        }
        assert_eq!(dedup.snapshot(EPC).unwrap().detection_count, 8);

        // Quiet for more than five windows: 8 halves to 4, plus this detection
        let later = t0 + secs(7);
        assert_eq!(dedup.observe(EPC, 1, later), Decision::Noisy);
        assert_eq!(dedup.snapshot(EPC).unwrap().detection_count, 5);

        // Again: 5 halves to 2, plus this detection is under the threshold
        assert_eq!(dedup.observe(EPC, 1, later + secs(6)), Decision::WindowElapsed);
        assert_eq!(dedup.snapshot(EPC).unwrap().detection_count, 3);
    }

    #[test]
    fn test_sweep_forgets_expired_tags() {
        let mut dedup = Deduplicator::new(fast());
        let t0 = Instant::now();

        assert!(dedup.should_emit(EPC, 1, t0));
        assert!(dedup.should_emit("ABCD", 2, t0 + secs(9)));

        assert_eq!(dedup.sweep(t0 + secs(10)), 0);
        assert_eq!(dedup.sweep(t0 + secs(11)), 1);
        assert_eq!(dedup.len(), 1);
        assert!(dedup.snapshot(EPC).is_none());

        // Seen again after expiring: a new first sighting
        assert_eq!(dedup.observe(EPC, 2, t0 + secs(12)), Decision::FirstSighting);
        assert_eq!(dedup.snapshot(EPC).unwrap().first_antenna, 2);
        assert_eq!(dedup.stats().unique_tags, 3);
    }

    #[test]
    fn test_sweep_decays_idle_records() {
        let mut dedup = Deduplicator::new(fast());
        let t0 = Instant::now();

        assert!(dedup.should_emit(EPC, 1, t0));
        for i in 1..=5 {
            dedup.observe(EPC, 1, t0 + Duration::from_millis(i * 10));
        }

        dedup.sweep(t0 + secs(6));
        assert_eq!(dedup.snapshot(EPC).unwrap().detection_count, 3);
    }

    #[test]
    fn test_reappearance_after_sweep_does_not_decay_again() {
        let mut dedup = Deduplicator::new(fast());
        let t0 = Instant::now();

        assert!(dedup.should_emit(EPC, 1, t0));
        for i in 1..=5 {
            dedup.observe(EPC, 1, t0 + Duration::from_millis(i * 10));
        }

        dedup.sweep(t0 + secs(6));
        assert_eq!(dedup.snapshot(EPC).unwrap().detection_count, 3);

        // Swept count plus this detection
        dedup.observe(EPC, 1, t0 + Duration::from_millis(6500));
        assert_eq!(dedup.snapshot(EPC).unwrap().detection_count, 4);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut dedup = Deduplicator::new(DedupConfig::default());
        let t0 = Instant::now();

        dedup.observe(EPC, 1, t0);
        let before = dedup.snapshot(EPC).unwrap();
        dedup.observe(EPC, 1, t0 + secs(1));

        assert_eq!(before.detection_count, 1);
        assert_eq!(dedup.snapshot(EPC).unwrap().detection_count, 2);
    }
}
