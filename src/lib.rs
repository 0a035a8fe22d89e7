// src/lib.rs
pub mod classifier;
pub mod config;
pub mod data;
pub mod features;
pub mod fsm;
pub mod geometry;
pub mod hybrid;
pub mod landmarks;
pub mod mediapipe_bridge;
pub mod names;
pub mod rules;
pub mod session;
pub mod synthetic;
pub mod tracking;

pub use classifier::{MudraClassifier, NoClassifier, Prediction, SharedClassifier, SubprocessClassifier};
pub use config::AppConfig;
pub use fsm::{Candidate, DisplayOutput, FsmConfig, FsmState, MudraFsm};
pub use hybrid::{Detection, HybridScorer, Method};
pub use landmarks::{Handedness, Landmarks, TrackerFrame};
pub use tracking::{FrameReport, MudraTracker, TrackerConfig};
