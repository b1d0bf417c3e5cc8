//! Emotion classifier debouncing.
//!
//! A per-frame classifier flickers. An emotion only becomes an event after
//! enough consecutive recent frames agree on the same label, each clearing
//! its per-label confidence threshold.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use deskbot_body::Emotion;
use tracing::debug;

/// A debounced, committed emotion observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionEvent {
    pub emotion: Emotion,
    /// Mean confidence over the agreeing frames.
    pub confidence: f64,
}

pub struct EmotionDebouncer {
    thresholds: HashMap<Emotion, f64>,
    /// How many consecutive accepted frames must agree.
    consistent_frames: usize,
    /// Frames older than this cannot participate in agreement.
    horizon: Duration,
    history: VecDeque<(Emotion, f64, Instant)>,
}

impl EmotionDebouncer {
    pub fn new(consistent_frames: usize, horizon: Duration) -> Self {
        let thresholds = Emotion::ALL
            .iter()
            .map(|&e| (e, e.default_threshold()))
            .collect();
        Self {
            thresholds,
            consistent_frames: consistent_frames.max(1),
            horizon,
            history: VecDeque::new(),
        }
    }

    /// Override the acceptance threshold for one emotion.
    pub fn set_threshold(&mut self, emotion: Emotion, threshold: f64) {
        self.thresholds.insert(emotion, threshold);
    }

    /// Feed one classifier frame. Returns an event when the last
    /// `consistent_frames` accepted frames within the horizon agree.
    pub fn observe(
        &mut self,
        emotion: Emotion,
        confidence: f64,
        now: Instant,
    ) -> Option<EmotionEvent> {
        let threshold = self.thresholds.get(&emotion).copied().unwrap_or(1.0);
        if confidence < threshold {
            debug!(
                "Rejected {} at {:.2} (threshold {:.2})",
                emotion, confidence, threshold
            );
            return None;
        }

        self.history.push_back((emotion, confidence, now));
        // Bounded history: stale entries can never form a run anyway.
        while self.history.len() > 2 * self.consistent_frames {
            self.history.pop_front();
        }

        let recent: Vec<&(Emotion, f64, Instant)> = self
            .history
            .iter()
            .rev()
            .take(self.consistent_frames)
            .filter(|(_, _, t)| now.duration_since(*t) <= self.horizon)
            .collect();
        if recent.len() < self.consistent_frames {
            return None;
        }
        if !recent.iter().all(|(e, _, _)| *e == emotion) {
            return None;
        }

        let confidence =
            recent.iter().map(|(_, c, _)| c).sum::<f64>() / recent.len() as f64;
        self.history.clear();
        debug!("Committed {} at mean {:.2}", emotion, confidence);
        Some(EmotionEvent { emotion, confidence })
    }

    /// Drop all pending history, e.g. when the robot stops watching.
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debouncer() -> EmotionDebouncer {
        let mut d = EmotionDebouncer::new(2, Duration::from_secs(2));
        // Tighter happy threshold gets in the way of most tests.
        d.set_threshold(Emotion::Happy, 0.8);
        d
    }

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    #[test]
    fn two_agreeing_frames_commit_with_mean_confidence() {
        let mut d = debouncer();
        let t0 = Instant::now();
        assert!(d.observe(Emotion::Happy, 0.9, t0).is_none());
        let event = d.observe(Emotion::Happy, 0.8, at(t0, 100)).unwrap();
        assert_eq!(event.emotion, Emotion::Happy);
        assert!((event.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn below_threshold_frames_do_not_count() {
        let mut d = debouncer();
        let t0 = Instant::now();
        assert!(d.observe(Emotion::Happy, 0.9, t0).is_none());
        // Rejected frame neither commits nor breaks the run.
        assert!(d.observe(Emotion::Happy, 0.5, at(t0, 100)).is_none());
        assert!(d.observe(Emotion::Happy, 0.85, at(t0, 200)).is_some());
    }

    #[test]
    fn disagreeing_labels_restart_the_run() {
        let mut d = debouncer();
        let t0 = Instant::now();
        assert!(d.observe(Emotion::Happy, 0.9, t0).is_none());
        assert!(d.observe(Emotion::Angry, 0.9, at(t0, 100)).is_none());
        assert!(d.observe(Emotion::Angry, 0.9, at(t0, 200)).is_some());
    }

    #[test]
    fn stale_frames_fall_outside_the_horizon() {
        let mut d = debouncer();
        let t0 = Instant::now();
        assert!(d.observe(Emotion::Sad, 0.9, t0).is_none());
        // Second agreeing frame arrives after the first has gone stale.
        assert!(d.observe(Emotion::Sad, 0.9, at(t0, 2500)).is_none());
        assert!(d.observe(Emotion::Sad, 0.9, at(t0, 2600)).is_some());
    }

    #[test]
    fn commit_clears_history() {
        let mut d = debouncer();
        let t0 = Instant::now();
        d.observe(Emotion::Fear, 0.9, t0);
        assert!(d.observe(Emotion::Fear, 0.9, at(t0, 100)).is_some());
        // A fresh run is needed for the next event.
        assert!(d.observe(Emotion::Fear, 0.9, at(t0, 200)).is_none());
        assert!(d.observe(Emotion::Fear, 0.9, at(t0, 300)).is_some());
    }

    #[test]
    fn clear_drops_pending_frames() {
        let mut d = debouncer();
        let t0 = Instant::now();
        d.observe(Emotion::Angry, 0.9, t0);
        d.clear();
        assert!(d.observe(Emotion::Angry, 0.9, at(t0, 100)).is_none());
    }
}
