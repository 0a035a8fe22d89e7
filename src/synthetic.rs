// src/synthetic.rs - Procedural hand shapes for demos and tests
//
// Hands are built in "hand units" (wrist at the origin, middle MCP one unit
// above it, y pointing down like image coordinates) and then placed into
// normalized image space.
use nalgebra::{Vector2, Vector3};

use crate::landmarks::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerPose {
    /// Straight, held against the neighbouring fingers.
    Extended,
    /// Straight, fanned away from the neighbouring fingers.
    Spread,
    /// Partially curled at every joint.
    Hooked,
    /// Fanned and partially curled, as if holding a ball.
    Cupped,
    /// Folded down into the palm.
    Curled,
    /// Tip drawn in to a common point in front of the palm.
    Pinched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbPose {
    Alongside,
    Outstretched,
    Raised,
    /// Wrapped over the index and middle PIPs.
    Tucked,
    /// Pressed against the middle finger's PIP.
    PressMiddle,
    /// Tip meets the tip of the given finger.
    Touch(Finger),
    /// Tip between the middle and ring tips.
    TouchMiddleRing,
    /// Tip at the pinch point used by `FingerPose::Pinched`.
    Pinch,
}

const ORIGIN: (f64, f64) = (0.5, 0.75);
/// Hand units to normalized image units at scale 1.
const HAND_SIZE: f64 = 0.2;

const PINCH_POINT: (f64, f64) = (0.02, -1.45);

struct FingerModel {
    mcp: (f64, f64),
    lengths: (f64, f64, f64),
    slant: f64,
    fan: f64,
}

/// Index, middle, ring, pinky.
const FINGER_MODELS: [FingerModel; 4] = [
    FingerModel { mcp: (-0.34, -0.95), lengths: (0.45, 0.27, 0.2), slant: -0.06, fan: -0.45 },
    FingerModel { mcp: (0.0, -1.0), lengths: (0.5, 0.3, 0.22), slant: 0.0, fan: 0.0 },
    FingerModel { mcp: (0.3, -0.95), lengths: (0.46, 0.28, 0.2), slant: 0.06, fan: 0.4 },
    FingerModel { mcp: (0.56, -0.84), lengths: (0.36, 0.22, 0.18), slant: 0.12, fan: 0.75 },
];

impl FingerPose {
    /// Bend in degrees at the MCP, PIP and DIP.
    fn bends(self) -> (f64, f64, f64) {
        match self {
            FingerPose::Hooked | FingerPose::Cupped => (20.0, 45.0, 35.0),
            FingerPose::Curled => (10.0, 150.0, 25.0),
            FingerPose::Extended | FingerPose::Spread | FingerPose::Pinched => (0.0, 0.0, 0.0),
        }
    }

    /// Projected segment length factors; curled segments point at the camera.
    fn foreshortening(self) -> (f64, f64, f64) {
        match self {
            FingerPose::Curled => (0.6, 0.8, 0.8),
            _ => (1.0, 1.0, 1.0),
        }
    }

    fn fanned(self) -> bool {
        matches!(self, FingerPose::Spread | FingerPose::Cupped)
    }
}

fn rotate(v: Vector2<f64>, degrees: f64) -> Vector2<f64> {
    let (s, c) = degrees.to_radians().sin_cos();
    Vector2::new(v.x * c - v.y * s, v.x * s + v.y * c)
}

fn p(x: f64, y: f64) -> Vector2<f64> {
    Vector2::new(x, y)
}

/// Builder for one synthetic 21-point hand.
#[derive(Debug, Clone)]
pub struct SyntheticHand {
    fingers: [FingerPose; 4],
    thumb: ThumbPose,
    scale: f64,
    mirrored: bool,
    offset: (f64, f64),
}

impl SyntheticHand {
    /// `fingers` are index, middle, ring, pinky.
    pub fn new(fingers: [FingerPose; 4], thumb: ThumbPose) -> Self {
        Self { fingers, thumb, scale: 1.0, mirrored: false, offset: (0.0, 0.0) }
    }

    /// Reference shape for a registry pose, if there is one.
    pub fn for_mudra(name: &str) -> Option<Self> {
        use FingerPose::*;
        use ThumbPose::*;

        let (fingers, thumb) = match name {
            "Pataka" => ([Extended, Extended, Extended, Extended], Alongside),
            "Tripataka" => ([Extended, Extended, Curled, Extended], Alongside),
            "Ardhapataka" => ([Extended, Extended, Curled, Curled], Alongside),
            "Kartarimukha" => ([Spread, Spread, Curled, Curled], Alongside),
            "Mayura" => ([Extended, Extended, Curled, Extended], Touch(Finger::Ring)),
            "Ardhachandra" => ([Extended, Extended, Extended, Extended], Outstretched),
            "Arala" => ([Hooked, Extended, Extended, Extended], Alongside),
            "Shukatunda" => ([Hooked, Extended, Curled, Extended], Alongside),
            "Musthi" => ([Curled, Curled, Curled, Curled], Tucked),
            "Shikhara" => ([Curled, Curled, Curled, Curled], Raised),
            "Kapitta" => ([Hooked, Curled, Curled, Curled], Touch(Finger::Index)),
            "Suchi" => ([Extended, Curled, Curled, Curled], PressMiddle),
            "Chandrakala" => ([Extended, Curled, Curled, Curled], Outstretched),
            "Padmakosha" => ([Cupped, Cupped, Cupped, Cupped], Outstretched),
            "Alapadma" => ([Spread, Spread, Spread, Spread], Outstretched),
            "Mrigashirsha" => ([Curled, Curled, Curled, Extended], Outstretched),
            "Simhamukha" => ([Extended, Curled, Curled, Extended], TouchMiddleRing),
            "Trishula" => ([Extended, Extended, Extended, Curled], Touch(Finger::Pinky)),
            "Hamsasya" => ([Curled, Extended, Extended, Extended], Touch(Finger::Index)),
            "Mukula" => ([Pinched, Pinched, Pinched, Pinched], Pinch),
            _ => return None,
        };
        Some(Self::new(fingers, thumb))
    }

    /// Uniformly scales the placed coordinates (hand nearer/further from camera).
    pub fn scale(mut self, factor: f64) -> Self {
        self.scale = factor;
        self
    }

    /// Mirrors left-right, turning the right hand into a left hand.
    pub fn mirrored(mut self) -> Self {
        self.mirrored = !self.mirrored;
        self
    }

    /// Shifts the whole hand in image space (applied after scaling).
    pub fn offset(mut self, dx: f64, dy: f64) -> Self {
        self.offset = (dx, dy);
        self
    }

    pub fn handedness(&self) -> Handedness {
        if self.mirrored {
            Handedness::Left
        } else {
            Handedness::Right
        }
    }

    pub fn build(&self) -> Landmarks {
        let local = self.hand_units();
        let mut points = [Vector3::zeros(); LANDMARK_COUNT];
        for (dst, src) in points.iter_mut().zip(local.iter()) {
            let x = if self.mirrored { -src.x } else { src.x };
            *dst = Vector3::new(
                (ORIGIN.0 + x * HAND_SIZE) * self.scale + self.offset.0,
                (ORIGIN.1 + src.y * HAND_SIZE) * self.scale + self.offset.1,
                0.0,
            );
        }
        Landmarks::new(points)
    }

    pub fn frame(&self) -> TrackerFrame {
        TrackerFrame::hand(self.build(), self.handedness())
    }

    fn hand_units(&self) -> [Vector2<f64>; LANDMARK_COUNT] {
        let mut pts = [Vector2::zeros(); LANDMARK_COUNT];

        for (slot, (finger, pose)) in Finger::LONG.iter().zip(self.fingers).enumerate() {
            let m = &FINGER_MODELS[slot];
            let mcp = p(m.mcp.0, m.mcp.1);
            let lean = if pose.fanned() { m.fan } else { m.slant };
            let u = p(lean, -1.0).normalize();
            let (b0, b1, b2) = pose.bends();
            let (k0, k1, k2) = pose.foreshortening();
            let (lp, lm, ld) = (m.lengths.0 * k0, m.lengths.1 * k1, m.lengths.2 * k2);

            let (pip, dip, tip) = if pose == FingerPose::Pinched {
                let tip = p(PINCH_POINT.0 + 0.04 * (slot as f64 - 1.5), PINCH_POINT.1);
                let pip = mcp + u * (lp * 0.8);
                let dip = p(pip.x * 0.4 + tip.x * 0.6 + 0.03, pip.y * 0.4 + tip.y * 0.6);
                (pip, dip, tip)
            } else {
                let u1 = rotate(u, -b0);
                let pip = mcp + u1 * lp;
                let u2 = rotate(u1, -b1);
                let dip = pip + u2 * lm;
                let u3 = rotate(u2, -b2);
                (pip, dip, dip + u3 * ld)
            };

            let [j_mcp, j_pip, j_dip, j_tip] = finger.joints();
            pts[j_mcp] = mcp;
            pts[j_pip] = pip;
            pts[j_dip] = dip;
            pts[j_tip] = tip;
        }

        pts[THUMB_CMC] = p(-0.25, -0.2);
        let mut thumb_mcp = p(-0.5, -0.4);
        let bent_towards = |tip: Vector2<f64>, base: Vector2<f64>, dx: f64, dy: f64| {
            let mid = (base + tip) / 2.0;
            p(mid.x + dx, mid.y + dy)
        };

        let (ip, tip) = match self.thumb {
            ThumbPose::Alongside => {
                let u = p(-0.1, -1.0).normalize();
                let ip = thumb_mcp + u * 0.3;
                (ip, ip + u * 0.25)
            }
            ThumbPose::Outstretched => {
                let u = p(-1.0, -0.35).normalize();
                let ip = thumb_mcp + u * 0.3;
                (ip, ip + u * 0.25)
            }
            ThumbPose::Raised => {
                thumb_mcp = p(-0.42, -0.7);
                let u = p(0.05, -1.0).normalize();
                let ip = thumb_mcp + u * 0.3;
                (ip, ip + u * 0.25)
            }
            ThumbPose::Tucked => {
                let mid = (pts[INDEX_PIP] + pts[MIDDLE_PIP]) / 2.0;
                let tip = p(mid.x + 0.02, mid.y + 0.05);
                (bent_towards(tip, thumb_mcp, -0.28, 0.02), tip)
            }
            ThumbPose::PressMiddle => {
                let t = pts[MIDDLE_PIP];
                let tip = p(t.x - 0.05, t.y + 0.08);
                (bent_towards(tip, thumb_mcp, -0.04, 0.02), tip)
            }
            ThumbPose::Touch(finger) => {
                let t = pts[finger.tip()];
                let tip = p(t.x - 0.03, t.y + 0.03);
                (bent_towards(tip, thumb_mcp, -0.04, 0.02), tip)
            }
            ThumbPose::TouchMiddleRing => {
                let mid = (pts[MIDDLE_TIP] + pts[RING_TIP]) / 2.0;
                let tip = p(mid.x, mid.y + 0.03);
                (bent_towards(tip, thumb_mcp, -0.04, 0.02), tip)
            }
            ThumbPose::Pinch => {
                let tip = p(0.0, -1.42);
                (bent_towards(tip, thumb_mcp, -0.06, 0.0), tip)
            }
        };
        pts[THUMB_MCP] = thumb_mcp;
        pts[THUMB_IP] = ip;
        pts[THUMB_TIP] = tip;
        pts
    }
}

/// A short scripted performance: open hand, a few held mudras with
/// transitions, and gaps where the hand leaves the frame.
pub fn demo_sequence() -> Vec<TrackerFrame> {
    let mut frames = Vec::new();
    frames.extend(std::iter::repeat(TrackerFrame::NoHand).take(3));
    for (name, hold) in [("Pataka", 8), ("Tripataka", 6), ("Musthi", 10), ("Shikhara", 8), ("Alapadma", 6)] {
        if let Some(hand) = SyntheticHand::for_mudra(name) {
            frames.extend(std::iter::repeat(hand.frame()).take(hold));
        }
    }
    frames.extend(std::iter::repeat(TrackerFrame::NoHand).take(3));
    if let Some(hand) = SyntheticHand::for_mudra("Hamsasya") {
        frames.extend(std::iter::repeat(hand.mirrored().scale(0.8).frame()).take(6));
    }
    frames
}
