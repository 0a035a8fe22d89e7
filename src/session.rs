// src/session.rs - In-memory per-client trackers with idle eviction
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::classifier::MudraClassifier;
use crate::fsm::FsmConfig;
use crate::hybrid::HybridScorer;
use crate::landmarks::TrackerFrame;
use crate::tracking::{FrameReport, MudraTracker, TrackerConfig};

pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64, // Sessions untouched this long are dropped
    pub responsive_fsm: bool,   // Use the faster enter/exit thresholds
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 60,
            responsive_fsm: true,
        }
    }
}

/// Everything needed to start a fresh tracker.
struct TrackerFactory<C> {
    scorer: Arc<HybridScorer>,
    classifier: C,
    fsm: FsmConfig,
    tracker: TrackerConfig,
}

impl<C: MudraClassifier + Clone> TrackerFactory<C> {
    fn build(&self) -> MudraTracker<C> {
        MudraTracker::new(
            Arc::clone(&self.scorer),
            self.classifier.clone(),
            self.fsm.clone(),
            self.tracker.clone(),
        )
    }
}

struct Session<C> {
    tracker: MudraTracker<C>,
    last_access: DateTime<Utc>,
}

pub struct SessionRegistry<C> {
    sessions: HashMap<String, Session<C>>,
    factory: TrackerFactory<C>,
    idle_timeout: Duration,
    labels: Vec<String>,
}

impl<C: MudraClassifier + Clone> SessionRegistry<C> {
    pub fn new(
        scorer: Arc<HybridScorer>,
        classifier: C,
        fsm: FsmConfig,
        tracker: TrackerConfig,
        config: &SessionConfig,
    ) -> Self {
        let fsm = if config.responsive_fsm {
            let preset = FsmConfig::responsive();
            FsmConfig {
                enter_threshold: preset.enter_threshold,
                exit_threshold: preset.exit_threshold,
                max_mismatch: preset.max_mismatch,
                ..fsm
            }
        } else {
            fsm
        };
        let secs = i64::try_from(config.idle_timeout_secs).unwrap_or(i64::MAX);
        Self {
            sessions: HashMap::new(),
            factory: TrackerFactory {
                scorer,
                classifier,
                fsm,
                tracker,
            },
            idle_timeout: Duration::try_seconds(secs).unwrap_or(Duration::MAX),
            labels: Vec::new(),
        }
    }

    /// Extra class names the model can report.
    pub fn with_labels(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.labels.extend(labels);
        self
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn get_or_create(&mut self, id: Option<&str>) -> &mut MudraTracker<C> {
        self.get_or_create_at(id, Utc::now())
    }

    /// `None` addresses the shared default session.
    pub fn get_or_create_at(&mut self, id: Option<&str>, now: DateTime<Utc>) -> &mut MudraTracker<C> {
        self.evict_expired(now);
        let id = id.unwrap_or(DEFAULT_SESSION);
        let factory = &self.factory;
        let session = self.sessions.entry(id.to_string()).or_insert_with(|| {
            info!(session = id, "Session created");
            Session {
                tracker: factory.build(),
                last_access: now,
            }
        });
        session.last_access = now;
        &mut session.tracker
    }

    /// Starts a session under a fresh random id.
    pub fn create(&mut self) -> String {
        self.create_at(Utc::now())
    }

    pub fn create_at(&mut self, now: DateTime<Utc>) -> String {
        let id = Uuid::new_v4().to_string();
        self.get_or_create_at(Some(&id), now);
        id
    }

    /// Replaces the session's tracker with a fresh one. Returns false if the
    /// session did not exist.
    pub fn reset(&mut self, id: &str) -> bool {
        match self.sessions.get_mut(id) {
            Some(session) => {
                session.tracker = self.factory.build();
                session.last_access = Utc::now();
                info!(session = id, "Session reset");
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            info!(session = id, "Session removed");
        }
        removed
    }

    /// Drops sessions idle longer than the timeout; returns how many.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let timeout = self.idle_timeout;
        let before = self.sessions.len();
        self.sessions.retain(|id, session| {
            let keep = now.signed_duration_since(session.last_access) <= timeout;
            if !keep {
                info!(session = %id, "Session expired");
            }
            keep
        });
        before - self.sessions.len()
    }

    pub async fn process(&mut self, id: Option<&str>, frame: TrackerFrame) -> FrameReport {
        self.get_or_create(id).process_frame(frame).await
    }

    /// Rule names plus model labels, canonicalized, sorted and deduplicated.
    pub fn supported_mudras(&self) -> Vec<String> {
        self.factory.scorer.supported_mudras(&self.labels)
    }
}
