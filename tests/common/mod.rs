#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use mudra_tracker::classifier::ClassifierError;
use mudra_tracker::features::FeatureVector;
use mudra_tracker::synthetic::SyntheticHand;
use mudra_tracker::{FsmConfig, HybridScorer, MudraClassifier, MudraTracker, Prediction, TrackerConfig, TrackerFrame};

/// Replays queued answers, then keeps repeating the last one.
#[derive(Clone, Default)]
pub struct ScriptedClassifier {
    answers: VecDeque<Option<Prediction>>,
    last: Option<Prediction>,
}

impl ScriptedClassifier {
    pub fn always(name: &str, confidence: f64) -> Self {
        Self {
            answers: VecDeque::new(),
            last: Some(prediction(name, confidence)),
        }
    }

    pub fn then(mut self, answer: Option<Prediction>) -> Self {
        self.answers.push_back(answer);
        self
    }
}

impl MudraClassifier for ScriptedClassifier {
    async fn classify(&mut self, _features: &FeatureVector) -> Result<Option<Prediction>, ClassifierError> {
        if let Some(next) = self.answers.pop_front() {
            self.last = next;
        }
        Ok(self.last.clone())
    }
}

pub fn prediction(name: &str, confidence: f64) -> Prediction {
    Prediction {
        class_name: name.to_string(),
        confidence,
    }
}

pub fn hand(name: &str) -> TrackerFrame {
    SyntheticHand::for_mudra(name)
        .unwrap_or_else(|| panic!("no synthetic shape for {}", name))
        .frame()
}

pub fn tracker<C: MudraClassifier>(classifier: C) -> MudraTracker<C> {
    MudraTracker::new(
        Arc::new(HybridScorer::default()),
        classifier,
        FsmConfig::default(),
        TrackerConfig::default(),
    )
}
