// src/features.rs - Fixed-size numeric description of a hand for the learned classifier
use serde::{Deserialize, Serialize};

use crate::geometry::{joint_angle, normalized_distance, straightness_ratio, EPSILON};
use crate::landmarks::*;

pub const FEATURE_COUNT: usize = 17;

/// Feature layout shared with the classifier process:
/// 5 straightness ratios, 4 thumb-to-tip distances, 3 adjacent tip distances,
/// 4 PIP joint angles (degrees) and a palm tilt proxy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn extract(landmarks: &Landmarks, scale: f64) -> Self {
        let mut values = [0.0; FEATURE_COUNT];
        let mut i = 0;
        let mut push = |v: f64| {
            values[i] = if v.is_finite() { v } else { 0.0 };
            i += 1;
        };

        for finger in Finger::ALL {
            push(straightness_ratio(landmarks, finger.mcp(), finger.pip(), finger.tip(), scale));
        }
        for finger in Finger::LONG {
            push(normalized_distance(landmarks, THUMB_TIP, finger.tip(), scale));
        }
        push(normalized_distance(landmarks, INDEX_TIP, MIDDLE_TIP, scale));
        push(normalized_distance(landmarks, MIDDLE_TIP, RING_TIP, scale));
        push(normalized_distance(landmarks, RING_TIP, PINKY_TIP, scale));
        for finger in Finger::LONG {
            push(joint_angle(finger.mcp(), finger.pip(), finger.dip(), landmarks));
        }
        push((landmarks[INDEX_MCP].z - landmarks[PINKY_MCP].z) / scale.max(EPSILON));

        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}
