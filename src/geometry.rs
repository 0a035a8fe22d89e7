// src/geometry.rs - Scale-normalized distance and angle helpers over hand landmarks
use nalgebra::Vector2;

use crate::landmarks::{Landmarks, KEY_POINTS, MIDDLE_MCP, WRIST};

/// Guards every division by a length.
pub const EPSILON: f64 = 1e-6;
pub const DEFAULT_STRAIGHT_THRESHOLD: f64 = 0.9;
/// Raw image-coordinate motion allowed per frame for a "steady" hand.
pub const DEFAULT_STEADY_THRESHOLD: f64 = 0.02;
/// Returned by `joint_angle` for degenerate joints.
pub const STRAIGHT_ANGLE: f64 = 180.0;

/// Planar (x, y) distance between two landmarks.
pub fn distance(landmarks: &Landmarks, a: usize, b: usize) -> f64 {
    planar(landmarks, a, b).norm()
}

/// Wrist to middle-finger MCP plus epsilon. Hand size in frame changes with
/// distance to the camera, so this must be recomputed every frame.
pub fn scale_reference(landmarks: &Landmarks) -> f64 {
    distance(landmarks, WRIST, MIDDLE_MCP) + EPSILON
}

pub fn normalized_distance(landmarks: &Landmarks, a: usize, b: usize, scale: f64) -> f64 {
    distance(landmarks, a, b) / scale.max(EPSILON)
}

/// Planar vector from landmark `from` to landmark `to`.
pub fn planar(landmarks: &Landmarks, from: usize, to: usize) -> Vector2<f64> {
    let a = &landmarks[from];
    let b = &landmarks[to];
    Vector2::new(b.x - a.x, b.y - a.y)
}

/// Angle in degrees at vertex `b` between the rays towards `a` and `c`.
///
/// Zero-length rays and any numerical trouble yield 180° so a single
/// degenerate frame reads as "straight" instead of failing the evaluation.
pub fn joint_angle(a: usize, b: usize, c: usize, landmarks: &Landmarks) -> f64 {
    let ba = planar(landmarks, b, a);
    let bc = planar(landmarks, b, c);
    let (n1, n2) = (ba.norm(), bc.norm());
    if n1 <= 0.0 || n2 <= 0.0 || !n1.is_finite() || !n2.is_finite() {
        return STRAIGHT_ANGLE;
    }
    let cos = (ba.dot(&bc) / (n1 * n2)).clamp(-1.0, 1.0);
    let angle = cos.acos().to_degrees();
    if angle.is_finite() {
        angle
    } else {
        STRAIGHT_ANGLE
    }
}

/// Angle in degrees between two raw vectors. `None` means "cannot decide"
/// (a zero-length or non-finite input), not any particular angle.
pub fn vector_angle_between(v1: &Vector2<f64>, v2: &Vector2<f64>) -> Option<f64> {
    let (n1, n2) = (v1.norm(), v2.norm());
    if n1 <= 0.0 || n2 <= 0.0 || !n1.is_finite() || !n2.is_finite() {
        return None;
    }
    let cos = (v1.dot(v2) / (n1 * n2)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees()).filter(|a| a.is_finite())
}

/// Direct MCP→tip distance over the MCP→PIP→tip path length, all scale
/// normalized. 1.0 means the three points are colinear (extended finger).
pub fn straightness_ratio(landmarks: &Landmarks, mcp: usize, pip: usize, tip: usize, scale: f64) -> f64 {
    let direct = normalized_distance(landmarks, mcp, tip, scale);
    let path = normalized_distance(landmarks, mcp, pip, scale) + normalized_distance(landmarks, pip, tip, scale);
    if path <= EPSILON {
        return 0.0;
    }
    let ratio = direct / path;
    if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn finger_straightness(
    landmarks: &Landmarks,
    mcp: usize,
    pip: usize,
    tip: usize,
    scale: f64,
    threshold: f64,
) -> bool {
    straightness_ratio(landmarks, mcp, pip, tip, scale) >= threshold
}

/// True only when the wrist and all five fingertips moved less than
/// `threshold` (raw coordinates, 3D) since the previous frame.
pub fn is_hand_steady(landmarks: &Landmarks, previous: Option<&Landmarks>, threshold: f64) -> bool {
    let Some(previous) = previous else {
        return false;
    };
    KEY_POINTS
        .iter()
        .all(|&i| (landmarks[i] - previous[i]).norm() < threshold)
}
