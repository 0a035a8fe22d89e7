mod common;

use std::sync::Arc;

use mudra_tracker::data::{load_landmark_csv, summarize, write_landmark_csv};
use mudra_tracker::fsm::DisplayText;
use mudra_tracker::session::{SessionConfig, SessionRegistry};
use mudra_tracker::synthetic::{demo_sequence, FingerPose, SyntheticHand, ThumbPose};
use mudra_tracker::{
    FrameReport, FsmConfig, FsmState, HybridScorer, Method, MudraClassifier, MudraTracker, NoClassifier,
    SharedClassifier, TrackerConfig, TrackerFrame,
};

use common::{hand, tracker, ScriptedClassifier};

/// A fist with the thumb held out: no rule describes it.
fn ruleless() -> TrackerFrame {
    SyntheticHand::new([FingerPose::Curled; 4], ThumbPose::Outstretched).frame()
}

async fn run<C: MudraClassifier>(t: &mut MudraTracker<C>, frames: Vec<TrackerFrame>) -> Vec<FrameReport> {
    let mut reports = Vec::with_capacity(frames.len());
    for frame in frames {
        reports.push(t.process_frame(frame).await);
    }
    reports
}

#[tokio::test]
async fn fist_is_recognized_at_any_distance_from_camera() {
    for k in [0.5, 1.0, 2.0] {
        let mut t = tracker(NoClassifier);
        let frame = SyntheticHand::for_mudra("Musthi").unwrap().scale(k).frame();
        let report = t.process_frame(frame).await;
        assert_eq!(report.display.pose(), Some("Musthi"), "scale {}", k);
        assert_eq!(report.display.method, Some(Method::Rule));
        assert_eq!(report.display.confidence, 1.0);
    }
}

#[tokio::test]
async fn rule_evidence_skips_the_entry_debounce() {
    let mut t = tracker(NoClassifier);
    let reports = run(&mut t, vec![TrackerFrame::NoHand, hand("Suchi")]).await;
    assert_eq!(reports[0].display.text, DisplayText::NoHand);
    assert_eq!(reports[1].state, FsmState::ConfirmedMudra);
    assert_eq!(reports[1].display.pose(), Some("Suchi"));
}

#[tokio::test]
async fn model_only_pose_needs_enter_threshold_frames() {
    let mut t = tracker(ScriptedClassifier::always("Kapitta Mudra", 0.9));
    let reports = run(&mut t, vec![ruleless(); 3]).await;
    assert_eq!(reports[0].display.text, DisplayText::Detecting);
    assert_eq!(reports[1].display.text, DisplayText::Detecting);
    assert_eq!(reports[2].display.pose(), Some("Kapitta"));
    assert_eq!(reports[2].display.method, Some(Method::Ml));
    assert!((reports[2].display.confidence - 0.9).abs() < 1e-12);
}

#[tokio::test]
async fn confusable_model_pose_waits_longer() {
    let mut t = tracker(ScriptedClassifier::always("Shikhara", 0.95));
    let reports = run(&mut t, vec![ruleless(); 8]).await;
    assert!(reports[..7].iter().all(|r| r.display.text == DisplayText::Detecting));
    assert_eq!(reports[7].display.pose(), Some("Shikhara"));
}

#[tokio::test]
async fn weak_model_votes_are_ignored() {
    let mut t = tracker(ScriptedClassifier::always("Kapitta", 0.25));
    let reports = run(&mut t, vec![ruleless(); 5]).await;
    assert!(reports.iter().all(|r| r.detection.is_unknown()));
    assert!(reports.iter().all(|r| r.display.text == DisplayText::ShowPose));
}

#[tokio::test]
async fn confirmed_pose_survives_brief_dropouts() {
    let mut t = tracker(NoClassifier);
    let mut frames = vec![hand("Pataka"), ruleless(), ruleless(), hand("Pataka")];
    frames.extend(vec![ruleless(); 3]);
    let reports = run(&mut t, frames).await;

    assert_eq!(reports[1].state, FsmState::ExitingMudra);
    assert_eq!(reports[2].display.pose(), Some("Pataka"));
    assert_eq!(reports[3].state, FsmState::ConfirmedMudra);
    assert_eq!(reports[5].display.pose(), Some("Pataka"));
    assert_eq!(reports[6].state, FsmState::HandDetected);
    assert_eq!(reports[6].display.text, DisplayText::ShowPose);
}

#[tokio::test]
async fn losing_the_hand_clears_the_pose_immediately() {
    let mut t = tracker(NoClassifier);
    let reports = run(&mut t, vec![hand("Alapadma"), TrackerFrame::NoHand, hand("Alapadma")]).await;
    assert_eq!(reports[1].state, FsmState::NoHand);
    assert_eq!(reports[1].display.confidence, 0.0);
    assert_eq!(reports[1].display.method, None);
    assert_eq!(reports[2].display.pose(), Some("Alapadma"));
}

#[tokio::test]
async fn sessions_share_a_model_but_not_state() {
    let model = SharedClassifier::new(ScriptedClassifier::always("Kapitta", 0.9));
    let mut sessions = SessionRegistry::new(
        Arc::new(HybridScorer::default()),
        model,
        FsmConfig::default(),
        TrackerConfig::default(),
        &SessionConfig::default(),
    );
    let id = sessions.create();

    assert_eq!(sessions.process(Some(&id), ruleless()).await.display.text, DisplayText::Detecting);
    let second = sessions.process(Some(&id), ruleless()).await;
    assert_eq!(second.display.pose(), Some("Kapitta"));

    let other = sessions.process(None, ruleless()).await;
    assert_eq!(other.display.text, DisplayText::Detecting);
    assert_eq!(sessions.len(), 2);
}

#[tokio::test]
async fn demo_performance_shows_each_pose_in_order() {
    let mut t = tracker(NoClassifier);
    let reports = run(&mut t, demo_sequence()).await;
    let poses: Vec<String> = summarize(&reports).into_iter().map(|s| s.pose).collect();
    assert_eq!(poses, ["Pataka", "Tripataka", "Musthi", "Shikhara", "Alapadma", "Hamsasya"]);
    assert_eq!(t.metrics().classifier_failures, 0);
}

#[tokio::test]
async fn csv_replay_matches_live_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.csv");
    let frames = demo_sequence();
    write_landmark_csv(std::fs::File::create(&path).unwrap(), &frames).unwrap();

    let replayed = load_landmark_csv(&path).unwrap();
    assert_eq!(replayed.len(), frames.len());

    let live = summarize(&run(&mut tracker(NoClassifier), frames).await);
    let replay = summarize(&run(&mut tracker(NoClassifier), replayed).await);
    assert_eq!(live, replay);
}

#[cfg(unix)]
#[tokio::test]
async fn subprocess_model_drives_the_pipeline() {
    use mudra_tracker::config::ClassifierCommand;
    use mudra_tracker::SubprocessClassifier;

    let script = r#"echo READY; while read line; do echo '{"detected":true,"name":"Kapitta Mudra","confidence":0.8}'; done"#;
    let command = ClassifierCommand {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        labels: Vec::new(),
    };
    let classifier = SubprocessClassifier::spawn(&command).await.unwrap();
    let mut t = MudraTracker::new(
        Arc::new(HybridScorer::default()),
        classifier,
        FsmConfig::default(),
        TrackerConfig {
            classifier_timeout_ms: 5_000,
            ..TrackerConfig::default()
        },
    );
    let reports = run(&mut t, vec![ruleless(); 3]).await;
    assert_eq!(reports[2].display.pose(), Some("Kapitta"));
    assert_eq!(t.metrics().ml_hits, 3);
}
