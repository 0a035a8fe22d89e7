// src/hybrid.rs - Combine rule hits and model output into one ranked candidate per frame
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::classifier::Prediction;
use crate::landmarks::Landmarks;
use crate::names::{MudraNames, NameCanonicalizer};
use crate::rules::RuleRegistry;

/// Which evidence source produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Rule,
    Ml,
    Hybrid,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Rule => write!(f, "RULE"),
            Method::Ml => write!(f, "ML"),
            Method::Hybrid => write!(f, "HYBRID"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub rule_weight: f64,      // Added per firing rule, above any single model vote
    pub ml_floor: f64,         // Model votes at or below this are ignored
    pub hybrid_threshold: f64, // Winner must score above this to be reported
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rule_weight: 1.2,
            ml_floor: 0.3,
            hybrid_threshold: 0.55,
        }
    }
}

pub const UNKNOWN: &str = "Unknown";

/// The scorer's verdict for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Canonical pose name, `None` for "Unknown".
    pub name: Option<String>,
    /// Capped at 1.0.
    pub confidence: f64,
    pub method: Option<Method>,
}

impl Detection {
    pub fn unknown() -> Self {
        Self {
            name: None,
            confidence: 0.0,
            method: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.name.is_none()
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN)
    }
}

#[derive(Debug)]
struct Vote {
    name: String,
    score: f64,
    rule: bool,
    ml: bool,
}

/// Per-frame working set, rebuilt from scratch each frame. Insertion order
/// breaks ties, so rule votes win over an equal model vote.
#[derive(Debug, Default)]
struct Ballot {
    votes: Vec<Vote>,
}

impl Ballot {
    fn slot(&mut self, name: String) -> &mut Vote {
        let idx = match self.votes.iter().position(|v| v.name == name) {
            Some(i) => i,
            None => {
                self.votes.push(Vote {
                    name,
                    score: 0.0,
                    rule: false,
                    ml: false,
                });
                self.votes.len() - 1
            }
        };
        &mut self.votes[idx]
    }

    fn add_rule(&mut self, name: String, weight: f64) {
        let vote = self.slot(name);
        vote.score += weight;
        vote.rule = true;
    }

    fn add_ml(&mut self, name: String, confidence: f64) {
        let vote = self.slot(name);
        vote.score += confidence;
        vote.ml = true;
    }

    fn winner(self) -> Option<Vote> {
        let mut best: Option<Vote> = None;
        for vote in self.votes {
            if best.as_ref().map_or(true, |b| vote.score > b.score) {
                best = Some(vote);
            }
        }
        best
    }
}

/// Stateless combiner shared by every session.
pub struct HybridScorer {
    registry: RuleRegistry,
    names: Arc<dyn NameCanonicalizer>,
    config: ScoringConfig,
}

impl HybridScorer {
    pub fn new(registry: RuleRegistry, names: Arc<dyn NameCanonicalizer>, config: ScoringConfig) -> Self {
        Self { registry, names, config }
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn canonical(&self, raw: &str) -> String {
        self.names.canonical(raw)
    }

    /// Rule names plus the model's class labels, canonicalized, sorted and
    /// deduplicated.
    pub fn supported_mudras(&self, labels: &[String]) -> Vec<String> {
        let mut names: Vec<String> = self
            .registry
            .names()
            .map(str::to_string)
            .chain(labels.iter().map(|l| self.canonical(l)))
            .filter(|n| !n.is_empty())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Scores one frame from its rule hits and the model's output (if any).
    pub fn score(&self, landmarks: &Landmarks, scale: f64, ml: Option<&Prediction>) -> Detection {
        let hits = self.registry.evaluate(landmarks, scale);
        self.combine(&hits, ml)
    }

    /// Vote combination over already-evaluated rule hits.
    pub fn combine(&self, rule_hits: &[&str], ml: Option<&Prediction>) -> Detection {
        let mut ballot = Ballot::default();
        for name in rule_hits {
            ballot.add_rule(self.names.canonical(name), self.config.rule_weight);
        }
        if let Some(p) = ml {
            if p.confidence.is_finite() && p.confidence > self.config.ml_floor {
                ballot.add_ml(self.names.canonical(&p.class_name), p.confidence);
            } else {
                debug!("Model vote {} ({:.2}) below floor", p.class_name, p.confidence);
            }
        }

        let Some(winner) = ballot.winner() else {
            return Detection::unknown();
        };
        if winner.name.is_empty() || winner.score <= self.config.hybrid_threshold {
            debug!("Best candidate {} scored {:.2}, not accepted", winner.name, winner.score);
            return Detection::unknown();
        }

        let method = match (winner.rule, winner.ml) {
            (true, true) => Method::Hybrid,
            (true, false) => Method::Rule,
            _ => Method::Ml,
        };
        Detection {
            name: Some(winner.name),
            confidence: winner.score.min(1.0),
            method: Some(method),
        }
    }
}

impl Default for HybridScorer {
    fn default() -> Self {
        Self::new(RuleRegistry::standard(), Arc::new(MudraNames), ScoringConfig::default())
    }
}

impl fmt::Debug for HybridScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridScorer")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}
