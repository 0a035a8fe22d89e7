// src/fsm.rs - Frame-count hysteresis that turns noisy per-frame candidates into a stable label
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::hybrid::{Detection, Method};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FsmState {
    #[default]
    NoHand,
    HandDetected,
    EnteringMudra,
    ConfirmedMudra,
    ExitingMudra,
}

impl fmt::Display for FsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsmState::NoHand => "NO_HAND",
            FsmState::HandDetected => "HAND_DETECTED",
            FsmState::EnteringMudra => "ENTERING_MUDRA",
            FsmState::ConfirmedMudra => "CONFIRMED_MUDRA",
            FsmState::ExitingMudra => "EXITING_MUDRA",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FsmConfig {
    pub enter_threshold: u32,           // Agreeing frames before a model pose is shown
    pub exit_threshold: u32,            // Disagreeing frames before a shown pose is dropped
    pub max_mismatch: u32,              // Noise tolerated while entering
    pub confusable_enter_threshold: u32,
    pub confusable_pairs: Vec<(String, String)>,
}

impl Default for FsmConfig {
    fn default() -> Self {
        let pairs = [
            ("Pataka", "Ardhachandra"),
            ("Tripataka", "Mayura"),
            ("Musthi", "Shikhara"),
            ("Suchi", "Chandrakala"),
            ("Arala", "Shukatunda"),
            ("Hamsasya", "Mukula"),
        ];
        Self {
            enter_threshold: 3,
            exit_threshold: 3,
            max_mismatch: 2,
            confusable_enter_threshold: 8,
            confusable_pairs: pairs.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect(),
        }
    }
}

impl FsmConfig {
    /// Faster preset used for interactive web sessions.
    pub fn responsive() -> Self {
        Self {
            enter_threshold: 2,
            exit_threshold: 2,
            max_mismatch: 1,
            ..Self::default()
        }
    }

    pub fn is_confusable(&self, name: &str) -> bool {
        self.confusable_pairs.iter().any(|(a, b)| a == name || b == name)
    }

    fn required_frames(&self, name: &str) -> u32 {
        if self.is_confusable(name) {
            self.confusable_enter_threshold.max(self.enter_threshold)
        } else {
            self.enter_threshold
        }
    }
}

/// One frame's best guess, already canonicalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub confidence: f64,
    pub method: Method,
}

impl Candidate {
    pub fn new(name: impl Into<String>, confidence: f64, method: Method) -> Self {
        Self {
            name: name.into(),
            confidence,
            method,
        }
    }

    pub fn from_detection(detection: &Detection) -> Option<Self> {
        match (&detection.name, detection.method) {
            (Some(name), Some(method)) => Some(Self::new(name.clone(), detection.confidence, method)),
            _ => None,
        }
    }

    fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && self.confidence.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayText {
    NoHand,
    ShowPose,
    Detecting,
    Stabilizing,
    Pose(String),
}

impl fmt::Display for DisplayText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayText::NoHand => f.write_str("No hand detected"),
            DisplayText::ShowPose => f.write_str("Show a mudra"),
            DisplayText::Detecting => f.write_str("Detecting..."),
            DisplayText::Stabilizing => f.write_str("Stabilizing..."),
            DisplayText::Pose(name) => f.write_str(name),
        }
    }
}

/// What the UI should show this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayOutput {
    pub text: DisplayText,
    pub confidence: f64,
    pub method: Option<Method>,
}

impl DisplayOutput {
    fn sentinel(text: DisplayText) -> Self {
        Self {
            text,
            confidence: 0.0,
            method: None,
        }
    }

    pub fn pose(&self) -> Option<&str> {
        match &self.text {
            DisplayText::Pose(name) => Some(name),
            _ => None,
        }
    }
}

/// Debounce state for one tracked hand.
#[derive(Debug, Clone)]
pub struct MudraFsm {
    config: FsmConfig,
    state: FsmState,
    pose: Option<String>,
    method: Option<Method>,
    confidence: f64,
    enter_count: u32,
    exit_count: u32,
    mismatch_count: u32,
}

impl MudraFsm {
    pub fn new(config: FsmConfig) -> Self {
        Self {
            config,
            state: FsmState::NoHand,
            pose: None,
            method: None,
            confidence: 0.0,
            enter_count: 0,
            exit_count: 0,
            mismatch_count: 0,
        }
    }

    pub fn state(&self) -> FsmState {
        self.state
    }

    pub fn pose(&self) -> Option<&str> {
        self.pose.as_deref()
    }

    pub fn config(&self) -> &FsmConfig {
        &self.config
    }

    /// Clears the committed pose and counters. The hand is assumed present.
    pub fn reset(&mut self) {
        self.clear();
        self.state = FsmState::HandDetected;
    }

    fn clear(&mut self) {
        self.pose = None;
        self.method = None;
        self.confidence = 0.0;
        self.enter_count = 0;
        self.exit_count = 0;
        self.mismatch_count = 0;
    }

    /// Advances one frame.
    pub fn update(&mut self, hand_present: bool, candidate: Option<Candidate>) -> DisplayOutput {
        if !hand_present {
            if self.state != FsmState::NoHand {
                debug!("Hand lost in {}", self.state);
            }
            self.clear();
            self.state = FsmState::NoHand;
            return DisplayOutput::sentinel(DisplayText::NoHand);
        }
        if self.state == FsmState::NoHand {
            self.state = FsmState::HandDetected;
        }

        let candidate = candidate.filter(Candidate::is_valid);
        match self.state {
            FsmState::NoHand | FsmState::HandDetected => self.handle_hand_detected(candidate),
            FsmState::EnteringMudra => self.handle_entering(candidate),
            FsmState::ConfirmedMudra => self.handle_confirmed(candidate),
            FsmState::ExitingMudra => self.handle_exiting(candidate),
        }
    }

    fn matches_pose(&self, candidate: &Option<Candidate>) -> bool {
        match (candidate, &self.pose) {
            (Some(c), Some(p)) => c.name == *p,
            _ => false,
        }
    }

    fn handle_hand_detected(&mut self, candidate: Option<Candidate>) -> DisplayOutput {
        let Some(c) = candidate else {
            return DisplayOutput::sentinel(DisplayText::ShowPose);
        };

        if c.method == Method::Rule {
            info!("Confirmed {} from rule", c.name);
            self.clear();
            self.state = FsmState::ConfirmedMudra;
            self.pose = Some(c.name);
            self.method = Some(Method::Rule);
            self.confidence = 1.0;
            return self.committed();
        }

        self.state = FsmState::EnteringMudra;
        self.pose = Some(c.name);
        self.method = Some(c.method);
        self.confidence = c.confidence;
        self.enter_count = 1;
        self.mismatch_count = 0;
        self.try_confirm()
    }

    fn handle_entering(&mut self, candidate: Option<Candidate>) -> DisplayOutput {
        if self.matches_pose(&candidate) {
            if let Some(c) = candidate {
                self.enter_count += 1;
                self.mismatch_count = 0;
                self.confidence = c.confidence;
                self.method = Some(c.method);
            }
            return self.try_confirm();
        }

        self.mismatch_count += 1;
        if self.mismatch_count > self.config.max_mismatch {
            debug!("Dropped tentative {:?} after {} mismatches", self.pose, self.mismatch_count);
            self.reset();
            return DisplayOutput::sentinel(DisplayText::Stabilizing);
        }
        DisplayOutput::sentinel(DisplayText::Detecting)
    }

    fn try_confirm(&mut self) -> DisplayOutput {
        let required = self.pose.as_deref().map_or(self.config.enter_threshold, |p| self.config.required_frames(p));
        if self.enter_count >= required {
            info!("Confirmed {:?} after {} frames", self.pose, self.enter_count);
            self.state = FsmState::ConfirmedMudra;
            self.exit_count = 0;
            return self.committed();
        }
        DisplayOutput::sentinel(DisplayText::Detecting)
    }

    fn handle_confirmed(&mut self, candidate: Option<Candidate>) -> DisplayOutput {
        if self.matches_pose(&candidate) {
            self.exit_count = 0;
            self.refresh_confidence(candidate);
            return self.committed();
        }
        self.state = FsmState::ExitingMudra;
        self.exit_count = 1;
        self.try_exit()
    }

    fn handle_exiting(&mut self, candidate: Option<Candidate>) -> DisplayOutput {
        if self.matches_pose(&candidate) {
            self.state = FsmState::ConfirmedMudra;
            self.exit_count = 0;
            self.refresh_confidence(candidate);
            return self.committed();
        }
        self.exit_count += 1;
        self.try_exit()
    }

    fn try_exit(&mut self) -> DisplayOutput {
        if self.exit_count >= self.config.exit_threshold {
            info!("Released {:?} after {} frames", self.pose, self.exit_count);
            self.reset();
            return DisplayOutput::sentinel(DisplayText::ShowPose);
        }
        self.committed()
    }

    // rule-confirmed poses keep confidence pinned at 1.0
    fn refresh_confidence(&mut self, candidate: Option<Candidate>) {
        if self.method != Some(Method::Rule) {
            if let Some(c) = candidate {
                self.confidence = c.confidence;
            }
        }
    }

    fn committed(&self) -> DisplayOutput {
        match &self.pose {
            Some(name) => DisplayOutput {
                text: DisplayText::Pose(name.clone()),
                confidence: self.confidence.min(1.0),
                method: self.method,
            },
            None => DisplayOutput::sentinel(DisplayText::ShowPose),
        }
    }
}

impl Default for MudraFsm {
    fn default() -> Self {
        Self::new(FsmConfig::default())
    }
}
