// src/tracking.rs - Per-session pipeline: rules, timed classifier call, scoring, stabilization
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::classifier::{ClassifierError, MudraClassifier, Prediction};
use crate::features::FeatureVector;
use crate::fsm::{Candidate, DisplayOutput, FsmConfig, FsmState, MudraFsm};
use crate::geometry::{is_hand_steady, scale_reference, DEFAULT_STEADY_THRESHOLD};
use crate::hybrid::{Detection, HybridScorer, Method};
use crate::landmarks::{Handedness, Landmarks, TrackerFrame};

#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    pub avg_fps: f32,
    pub avg_processing_time: f32,
    pub frames: u64,
    pub rule_hits: u64,
    pub ml_hits: u64,
    pub classifier_failures: u64,
    frame_times: VecDeque<f32>,
    window: usize,
}

impl PerformanceMetrics {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            avg_fps: 0.0,
            avg_processing_time: 0.0,
            frames: 0,
            rule_hits: 0,
            ml_hits: 0,
            classifier_failures: 0,
            frame_times: VecDeque::with_capacity(window),
            window,
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.frames += 1;
        self.frame_times.push_front(elapsed.as_secs_f32());
        if self.frame_times.len() > self.window {
            self.frame_times.pop_back();
        }

        self.avg_processing_time = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        self.avg_fps = if self.avg_processing_time > 0.0 {
            1.0 / self.avg_processing_time
        } else {
            0.0
        };
    }

    fn count(&mut self, detection: &Detection) {
        match detection.method {
            Some(Method::Rule) => self.rule_hits += 1,
            Some(Method::Ml) => self.ml_hits += 1,
            Some(Method::Hybrid) => {
                self.rule_hits += 1;
                self.ml_hits += 1;
            }
            None => {}
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub steadiness_gate: bool,       // Only query the model while the hand holds still
    pub steadiness_threshold: f64,   // Raw coordinate motion per frame
    pub classifier_timeout_ms: u64,  // Must stay under the frame cadence
    pub metrics_window: usize,       // Frames in the rolling average
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            steadiness_gate: false,
            steadiness_threshold: DEFAULT_STEADY_THRESHOLD,
            classifier_timeout_ms: 150,
            metrics_window: 30,
        }
    }
}

/// Everything the caller needs to draw one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame: u64,
    pub handedness: Option<Handedness>,
    pub state: FsmState,
    pub display: DisplayOutput,
    /// Unstabilized scorer output for this frame.
    pub detection: Detection,
    pub rule_hits: Vec<&'static str>,
    pub model_queried: bool,
}

/// One tracked hand. `process_frame` takes `&mut self`, so a second frame
/// cannot start before the first has finished mutating the FSM.
pub struct MudraTracker<C> {
    scorer: Arc<HybridScorer>,
    classifier: C,
    fsm: MudraFsm,
    previous: Option<Landmarks>,
    config: TrackerConfig,
    metrics: PerformanceMetrics,
    frame_counter: u64,
}

impl<C: MudraClassifier> MudraTracker<C> {
    pub fn new(scorer: Arc<HybridScorer>, classifier: C, fsm: FsmConfig, config: TrackerConfig) -> Self {
        Self {
            scorer,
            classifier,
            fsm: MudraFsm::new(fsm),
            previous: None,
            metrics: PerformanceMetrics::new(config.metrics_window),
            config,
            frame_counter: 0,
        }
    }

    pub fn state(&self) -> FsmState {
        self.fsm.state()
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn scorer(&self) -> &Arc<HybridScorer> {
        &self.scorer
    }

    /// Back to "hand present, no pose"; motion history is forgotten too.
    pub fn reset(&mut self) {
        self.fsm.reset();
        self.previous = None;
    }

    /// Runs one frame through the whole pipeline. Never fails: every fault
    /// degrades to "no evidence this frame".
    pub async fn process_frame(&mut self, frame: TrackerFrame) -> FrameReport {
        let start = Instant::now();
        self.frame_counter += 1;

        let report = match frame {
            TrackerFrame::NoHand => {
                self.previous = None;
                let display = self.fsm.update(false, None);
                FrameReport {
                    frame: self.frame_counter,
                    handedness: None,
                    state: self.fsm.state(),
                    display,
                    detection: Detection::unknown(),
                    rule_hits: Vec::new(),
                    model_queried: false,
                }
            }
            TrackerFrame::Hand { landmarks, handedness } => self.process_hand(landmarks, handedness).await,
        };

        self.metrics.record(start.elapsed());
        report
    }

    async fn process_hand(&mut self, landmarks: Landmarks, handedness: Handedness) -> FrameReport {
        let scale = scale_reference(&landmarks);
        let rule_hits = self.scorer.registry().evaluate(&landmarks, scale);

        let model_queried = self.should_query(&landmarks);
        let prediction = if model_queried {
            self.query_classifier(&landmarks, scale).await
        } else {
            None
        };

        let detection = self.scorer.combine(&rule_hits, prediction.as_ref());
        self.metrics.count(&detection);
        debug!(
            frame = self.frame_counter,
            hits = ?rule_hits,
            "Frame scored {} ({:.2})",
            detection.label(),
            detection.confidence
        );

        let display = self.fsm.update(true, Candidate::from_detection(&detection));
        self.previous = Some(landmarks);

        FrameReport {
            frame: self.frame_counter,
            handedness: Some(handedness),
            state: self.fsm.state(),
            display,
            detection,
            rule_hits,
            model_queried,
        }
    }

    fn should_query(&self, landmarks: &Landmarks) -> bool {
        !self.config.steadiness_gate
            || is_hand_steady(landmarks, self.previous.as_ref(), self.config.steadiness_threshold)
    }

    async fn query_classifier(&mut self, landmarks: &Landmarks, scale: f64) -> Option<Prediction> {
        let features = FeatureVector::extract(landmarks, scale);
        let budget = Duration::from_millis(self.config.classifier_timeout_ms);

        match timeout(budget, self.classifier.classify(&features)).await {
            Ok(Ok(prediction)) => prediction,
            Ok(Err(ClassifierError::NotReady)) => None,
            Ok(Err(e)) => {
                self.metrics.classifier_failures += 1;
                warn!("Classifier failed, continuing without it: {}", e);
                None
            }
            Err(_) => {
                self.metrics.classifier_failures += 1;
                debug!("{}", ClassifierError::Timeout(self.config.classifier_timeout_ms));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::NoClassifier;
    use crate::fsm::DisplayText;
    use crate::synthetic::{FingerPose, SyntheticHand, ThumbPose};

    /// Always answers with the same prediction, optionally after a delay.
    struct Fixed {
        answer: Result<Option<Prediction>, ()>,
        delay: Duration,
        calls: usize,
    }

    impl Fixed {
        fn new(name: &str, confidence: f64) -> Self {
            Self {
                answer: Ok(Some(Prediction {
                    class_name: name.to_string(),
                    confidence,
                })),
                delay: Duration::ZERO,
                calls: 0,
            }
        }
    }

    impl MudraClassifier for Fixed {
        async fn classify(&mut self, _features: &FeatureVector) -> Result<Option<Prediction>, ClassifierError> {
            self.calls += 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.answer
                .clone()
                .map_err(|_| ClassifierError::Remote("boom".to_string()))
        }
    }

    fn tracker<C: MudraClassifier>(classifier: C) -> MudraTracker<C> {
        MudraTracker::new(
            Arc::new(HybridScorer::default()),
            classifier,
            FsmConfig::default(),
            TrackerConfig::default(),
        )
    }

    fn hand(name: &str) -> TrackerFrame {
        SyntheticHand::for_mudra(name).unwrap().frame()
    }

    #[tokio::test]
    async fn rule_only_pose_confirms_on_first_frame() {
        let mut t = tracker(NoClassifier);
        let report = t.process_frame(hand("Shikhara")).await;
        assert_eq!(report.display.pose(), Some("Shikhara"));
        assert_eq!(report.state, FsmState::ConfirmedMudra);
        assert_eq!(report.rule_hits, vec!["Shikhara"]);
        assert_eq!(t.metrics().rule_hits, 1);
        assert_eq!(t.metrics().classifier_failures, 0);
    }

    #[tokio::test]
    async fn collapsed_hand_is_never_confirmed() {
        let mut t = tracker(NoClassifier);
        let flat = Landmarks::from_slice(&[[0.4, 0.4, 0.0]; 21]).unwrap();
        let report = t.process_frame(TrackerFrame::hand(flat, Handedness::Right)).await;
        assert!(report.rule_hits.is_empty());
        assert!(report.detection.is_unknown());
        assert_eq!(report.display.text, DisplayText::ShowPose);
        assert_eq!(report.state, FsmState::HandDetected);
    }

    #[tokio::test]
    async fn no_hand_frame_reports_sentinel() {
        let mut t = tracker(NoClassifier);
        let report = t.process_frame(TrackerFrame::NoHand).await;
        assert_eq!(report.display.text, DisplayText::NoHand);
        assert_eq!(report.handedness, None);
        assert_eq!(report.frame, 1);
    }

    #[tokio::test]
    async fn model_only_pose_is_debounced() {
        // a shape no rule covers, with a model vote for a pose outside the registry
        let mut t = tracker(Fixed::new("Anjali Mudra", 0.9));
        let fist = SyntheticHand::new([FingerPose::Curled; 4], ThumbPose::Outstretched);
        let mut last = None;
        for _ in 0..3 {
            last = Some(t.process_frame(fist.frame()).await);
        }
        let report = last.unwrap();
        assert_eq!(report.display.pose(), Some("Anjali"));
        assert_eq!(report.display.method, Some(Method::Ml));
    }

    #[tokio::test]
    async fn slow_classifier_times_out_and_rules_still_work() {
        let mut slow = Fixed::new("Suchi", 0.9);
        slow.delay = Duration::from_millis(500);
        let mut t = MudraTracker::new(
            Arc::new(HybridScorer::default()),
            slow,
            FsmConfig::default(),
            TrackerConfig {
                classifier_timeout_ms: 10,
                ..TrackerConfig::default()
            },
        );
        let report = t.process_frame(hand("Pataka")).await;
        assert_eq!(report.display.pose(), Some("Pataka"));
        assert_eq!(report.detection.method, Some(Method::Rule));
        assert_eq!(t.metrics().classifier_failures, 1);
    }

    #[tokio::test]
    async fn failing_classifier_is_counted_not_fatal() {
        let mut broken = Fixed::new("Suchi", 0.9);
        broken.answer = Err(());
        let mut t = tracker(broken);
        let report = t.process_frame(hand("Musthi")).await;
        assert_eq!(report.display.pose(), Some("Musthi"));
        assert_eq!(t.metrics().classifier_failures, 1);
    }

    #[tokio::test]
    async fn steadiness_gate_skips_the_model_until_the_hand_settles() {
        let mut t = MudraTracker::new(
            Arc::new(HybridScorer::default()),
            Fixed::new("Pataka", 0.9),
            FsmConfig::default(),
            TrackerConfig {
                steadiness_gate: true,
                ..TrackerConfig::default()
            },
        );
        let first = t.process_frame(hand("Pataka")).await;
        assert!(!first.model_queried);
        let second = t.process_frame(hand("Pataka")).await;
        assert!(second.model_queried);
        assert_eq!(second.detection.method, Some(Method::Hybrid));

        let moved = SyntheticHand::for_mudra("Pataka").unwrap().offset(0.1, 0.0).frame();
        assert!(!t.process_frame(moved).await.model_queried);
        assert_eq!(t.classifier.calls, 1);
    }

    #[tokio::test]
    async fn reset_forgets_pose_and_motion() {
        let mut t = tracker(NoClassifier);
        t.process_frame(hand("Suchi")).await;
        t.reset();
        assert_eq!(t.state(), FsmState::HandDetected);
        assert!(t.previous.is_none());
    }

    #[test]
    fn metrics_average_over_window() {
        let mut m = PerformanceMetrics::new(2);
        m.record(Duration::from_millis(10));
        m.record(Duration::from_millis(20));
        m.record(Duration::from_millis(30));
        assert_eq!(m.frames, 3);
        assert!((m.avg_processing_time - 0.025).abs() < 1e-6);
        assert!((m.avg_fps - 40.0).abs() < 1e-2);
    }
}
