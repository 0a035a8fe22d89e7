// src/landmarks.rs - Hand landmark layout shared by every stage of the pipeline
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

// MediaPipe hand landmark indices
pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

pub const LANDMARK_COUNT: usize = 21;

/// Wrist plus the five fingertips, the points checked for steadiness.
pub const KEY_POINTS: [usize; 6] = [WRIST, THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [Finger::Thumb, Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];
    pub const LONG: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    /// `[base, pip, dip, tip]` for this finger. For the thumb the base is its MCP
    /// and the IP joint plays the role of the PIP.
    pub fn joints(self) -> [usize; 4] {
        match self {
            Finger::Thumb => [THUMB_MCP, THUMB_IP, THUMB_IP, THUMB_TIP],
            Finger::Index => [INDEX_MCP, INDEX_PIP, INDEX_DIP, INDEX_TIP],
            Finger::Middle => [MIDDLE_MCP, MIDDLE_PIP, MIDDLE_DIP, MIDDLE_TIP],
            Finger::Ring => [RING_MCP, RING_PIP, RING_DIP, RING_TIP],
            Finger::Pinky => [PINKY_MCP, PINKY_PIP, PINKY_DIP, PINKY_TIP],
        }
    }

    pub fn mcp(self) -> usize {
        self.joints()[0]
    }

    pub fn pip(self) -> usize {
        self.joints()[1]
    }

    pub fn dip(self) -> usize {
        self.joints()[2]
    }

    pub fn tip(self) -> usize {
        self.joints()[3]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Handedness {
    Left,
    #[default]
    Right,
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handedness::Left => write!(f, "Left"),
            Handedness::Right => write!(f, "Right"),
        }
    }
}

impl std::str::FromStr for Handedness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Handedness::Left),
            "right" | "r" => Ok(Handedness::Right),
            other => Err(format!("unknown handedness '{}'", other)),
        }
    }
}

/// One frame of 21 tracked hand keypoints in normalized image coordinates.
/// Index semantics are fixed; the core never reorders or mutates them.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks {
    points: [Vector3<f64>; LANDMARK_COUNT],
}

impl Landmarks {
    pub fn new(points: [Vector3<f64>; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// Builds a landmark set from raw `[x, y, z]` triples. Returns `None` unless
    /// exactly 21 points are supplied.
    pub fn from_slice(raw: &[[f64; 3]]) -> Option<Self> {
        if raw.len() != LANDMARK_COUNT {
            return None;
        }
        let mut points = [Vector3::zeros(); LANDMARK_COUNT];
        for (dst, src) in points.iter_mut().zip(raw) {
            *dst = Vector3::new(src[0], src[1], src[2]);
        }
        Some(Self { points })
    }

    pub fn point(&self, index: usize) -> &Vector3<f64> {
        &self.points[index]
    }

    pub fn points(&self) -> &[Vector3<f64>; LANDMARK_COUNT] {
        &self.points
    }

    pub fn to_array(&self) -> Vec<[f64; 3]> {
        self.points.iter().map(|p| [p.x, p.y, p.z]).collect()
    }

    pub fn is_finite(&self) -> bool {
        self.points.iter().all(|p| p.iter().all(|c| c.is_finite()))
    }

    /// Uniformly scales every coordinate.
    pub fn scaled(&self, factor: f64) -> Self {
        let mut points = self.points;
        for p in points.iter_mut() {
            *p *= factor;
        }
        Self { points }
    }
}

impl std::ops::Index<usize> for Landmarks {
    type Output = Vector3<f64>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

/// What the external hand tracker reports for one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerFrame {
    NoHand,
    Hand {
        landmarks: Landmarks,
        handedness: Handedness,
    },
}

impl TrackerFrame {
    pub fn hand(landmarks: Landmarks, handedness: Handedness) -> Self {
        TrackerFrame::Hand { landmarks, handedness }
    }

    pub fn is_hand(&self) -> bool {
        matches!(self, TrackerFrame::Hand { .. })
    }
}
