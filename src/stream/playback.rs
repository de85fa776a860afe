//! Playback checkpoints and skip policy
//!
//! [`CheckpointStore`] persists the last watched position per content+episode
//! plus the global skip-intro/skip-outro preference. [`PlaybackSession`]
//! applies both while one episode plays: resume on ready, periodic
//! checkpointing, intro skip, and a one-shot auto-advance near the end.

use tracing::{debug, warn};

use crate::models::{Checkpoint, SkipPolicy};
use crate::store::{self, SharedStore};

pub const PROGRESS_PREFIX: &str = "cine_progress_";
pub const SKIP_INTRO_KEY: &str = "cine_skip_intro";
pub const SKIP_OUTRO_KEY: &str = "cine_skip_outro";

/// Seconds before the end inside which a position counts as finished
pub const DEFAULT_RESUME_GUARD_SECS: f64 = 10.0;

/// Streams no longer than this are never auto-skipped
pub const DEFAULT_MIN_SKIP_DURATION_SECS: f64 = 180.0;

/// Store key of a checkpoint
pub fn checkpoint_key(content_id: &str, episode_index: usize) -> String {
    format!("{}{}_{}", PROGRESS_PREFIX, content_id, episode_index)
}

/// Durable checkpoints and skip preferences
#[derive(Clone)]
pub struct CheckpointStore {
    store: SharedStore,
    resume_guard: f64,
}

impl CheckpointStore {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            resume_guard: DEFAULT_RESUME_GUARD_SECS,
        }
    }

    pub fn with_resume_guard(mut self, seconds: f64) -> Self {
        self.resume_guard = seconds.max(0.0);
        self
    }

    pub fn resume_guard(&self) -> f64 {
        self.resume_guard
    }

    /// Record a position; write failures are logged and dropped
    pub fn save(&self, key: &str, position_seconds: f64) {
        if !position_seconds.is_finite() || position_seconds <= 0.0 {
            return;
        }
        let checkpoint = Checkpoint {
            key: key.to_string(),
            position_seconds,
        };
        if let Err(e) = store::set_json(self.store.as_ref(), key, &checkpoint) {
            warn!(key, error = %e, "checkpoint write dropped");
        }
    }

    pub fn load(&self, key: &str) -> Option<f64> {
        store::get_json::<Checkpoint>(self.store.as_ref(), key).map(|c| c.position_seconds)
    }

    pub fn clear(&self, key: &str) {
        self.store.remove(key);
    }

    /// Saved position worth resuming to for a stream of `duration` seconds
    ///
    /// Positions in the final guard window are ignored.
    pub fn resume_position(&self, key: &str, duration: f64) -> Option<f64> {
        let position = self.load(key)?;
        (position > 0.0 && position < duration - self.resume_guard).then_some(position)
    }

    pub fn skip_policy(&self) -> SkipPolicy {
        SkipPolicy {
            intro_seconds: store::get_json(self.store.as_ref(), SKIP_INTRO_KEY).unwrap_or(0),
            outro_seconds: store::get_json(self.store.as_ref(), SKIP_OUTRO_KEY).unwrap_or(0),
        }
    }

    pub fn set_skip_policy(&self, policy: SkipPolicy) {
        for (key, value) in [
            (SKIP_INTRO_KEY, policy.intro_seconds),
            (SKIP_OUTRO_KEY, policy.outro_seconds),
        ] {
            if let Err(e) = store::set_json(self.store.as_ref(), key, &value) {
                warn!(key, error = %e, "skip policy write dropped");
            }
        }
    }

    /// Remove every checkpoint
    pub fn clear_all(&self) -> usize {
        store::purge_prefix(self.store.as_ref(), PROGRESS_PREFIX)
    }
}

/// What the player should do after a position update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackAction {
    None,
    SeekTo(f64),
    AdvanceEpisode,
}

/// Skip and checkpoint logic for one playing episode
pub struct PlaybackSession {
    checkpoints: CheckpointStore,
    key: String,
    policy: SkipPolicy,
    min_skip_duration: f64,
    advanced: bool,
}

impl PlaybackSession {
    /// Start a session; the skip policy is read once here
    pub fn new(checkpoints: CheckpointStore, content_id: &str, episode_index: usize) -> Self {
        let policy = checkpoints.skip_policy();
        Self {
            checkpoints,
            key: checkpoint_key(content_id, episode_index),
            policy,
            min_skip_duration: DEFAULT_MIN_SKIP_DURATION_SECS,
            advanced: false,
        }
    }

    pub fn with_min_skip_duration(mut self, seconds: f64) -> Self {
        self.min_skip_duration = seconds;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn policy(&self) -> SkipPolicy {
        self.policy
    }

    fn skippable(&self, duration: f64) -> bool {
        duration.is_finite() && duration > self.min_skip_duration
    }

    /// Start position once the stream's duration is known
    pub fn on_ready(&self, duration: f64) -> Option<f64> {
        if let Some(position) = self.checkpoints.resume_position(&self.key, duration) {
            debug!(key = %self.key, position, "resuming");
            return Some(position);
        }
        let intro = f64::from(self.policy.intro_seconds);
        (intro > 0.0 && self.skippable(duration)).then_some(intro)
    }

    /// Handle a position update from the player
    pub fn on_time_update(&mut self, current: f64, duration: f64) -> PlaybackAction {
        if !current.is_finite() || current < 0.0 {
            return PlaybackAction::None;
        }

        let finished = duration.is_finite() && duration - current <= self.checkpoints.resume_guard();
        if finished {
            self.checkpoints.clear(&self.key);
        } else {
            self.checkpoints.save(&self.key, current);
        }

        if !self.skippable(duration) {
            return PlaybackAction::None;
        }

        let intro = f64::from(self.policy.intro_seconds);
        if intro > 0.0 && current < intro {
            debug!(key = %self.key, to = intro, "skipping intro");
            return PlaybackAction::SeekTo(intro);
        }

        let outro = f64::from(self.policy.outro_seconds);
        if outro > 0.0 && duration - current <= outro && !self.advanced {
            self.advanced = true;
            debug!(key = %self.key, "outro reached, advancing");
            return PlaybackAction::AdvanceEpisode;
        }

        PlaybackAction::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn checkpoints() -> CheckpointStore {
        CheckpointStore::new(MemoryStore::shared())
    }

    #[test]
    fn test_save_load_clear() {
        let store = checkpoints();
        let key = checkpoint_key("42", 3);
        assert_eq!(key, "cine_progress_42_3");
        store.save(&key, 125.5);
        assert_eq!(store.load(&key), Some(125.5));
        store.clear(&key);
        assert_eq!(store.load(&key), None);
    }

    #[test]
    fn test_non_positive_positions_ignored() {
        let store = checkpoints();
        store.save("k", 0.0);
        store.save("k", f64::NAN);
        assert_eq!(store.load("k"), None);
    }

    #[test]
    fn test_resume_position_respects_guard() {
        let store = checkpoints();
        store.save("k", 595.0);
        assert_eq!(store.resume_position("k", 600.0), None);
        store.save("k", 300.0);
        assert_eq!(store.resume_position("k", 600.0), Some(300.0));
    }

    #[test]
    fn test_skip_policy_defaults_and_roundtrip() {
        let store = checkpoints();
        assert_eq!(store.skip_policy(), SkipPolicy::default());
        store.set_skip_policy(SkipPolicy {
            intro_seconds: 90,
            outro_seconds: 60,
        });
        assert_eq!(store.skip_policy().intro_seconds, 90);
        assert_eq!(store.skip_policy().outro_seconds, 60);
    }

    #[test]
    fn test_session_clears_checkpoint_at_end() {
        let store = checkpoints();
        let mut session = PlaybackSession::new(store.clone(), "c", 0);
        session.on_time_update(500.0, 1200.0);
        assert_eq!(store.load("cine_progress_c_0"), Some(500.0));
        session.on_time_update(1195.0, 1200.0);
        assert_eq!(store.load("cine_progress_c_0"), None);
    }

    #[test]
    fn test_session_skips_intro_on_long_streams_only() {
        let store = checkpoints();
        store.set_skip_policy(SkipPolicy {
            intro_seconds: 60,
            outro_seconds: 0,
        });
        let mut long = PlaybackSession::new(store.clone(), "c", 0);
        assert_eq!(long.on_ready(1200.0), Some(60.0));
        assert_eq!(long.on_time_update(5.0, 1200.0), PlaybackAction::SeekTo(60.0));

        let mut short = PlaybackSession::new(store, "c", 1);
        assert_eq!(short.on_ready(120.0), None);
        assert_eq!(short.on_time_update(5.0, 120.0), PlaybackAction::None);
    }

    #[test]
    fn test_session_advances_once() {
        let store = checkpoints();
        store.set_skip_policy(SkipPolicy {
            intro_seconds: 0,
            outro_seconds: 90,
        });
        let mut session = PlaybackSession::new(store, "c", 0);
        assert_eq!(session.on_time_update(1000.0, 1200.0), PlaybackAction::None);
        assert_eq!(session.on_time_update(1115.0, 1200.0), PlaybackAction::AdvanceEpisode);
        assert_eq!(session.on_time_update(1120.0, 1200.0), PlaybackAction::None);
    }

    #[test]
    fn test_resume_beats_intro_skip() {
        let store = checkpoints();
        store.set_skip_policy(SkipPolicy {
            intro_seconds: 60,
            outro_seconds: 0,
        });
        store.save(&checkpoint_key("c", 0), 400.0);
        let session = PlaybackSession::new(store, "c", 0);
        assert_eq!(session.on_ready(1200.0), Some(400.0));
    }
}
