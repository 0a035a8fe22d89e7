// src/rules.rs - Geometric rule evaluators, one boolean predicate per mudra
//
// Every evaluator is a pure conjunction over the current frame only. The
// numeric constants below were tuned against tracked footage and are part of
// the classification contract: changing one silently shifts accuracy.
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::geometry::{joint_angle, normalized_distance, planar, straightness_ratio, vector_angle_between, EPSILON};
use crate::landmarks::*;

pub type RuleFn = fn(&Landmarks, f64) -> bool;

/// Scale references at or below this (a collapsed wrist to middle-MCP span)
/// make every normalized distance meaningless; no rule fires.
pub const MIN_HAND_SPAN: f64 = 10.0 * EPSILON;

/// Ratio at or above which a finger counts as extended.
pub const STRAIGHT: f64 = 0.9;
/// Ratio below which a finger counts as folded.
pub const BENT: f64 = 0.6;
/// Relaxed extension threshold for the thumb and for supporting fingers.
pub const LOOSE_STRAIGHT: f64 = 0.85;
/// Adjacent fingertips closer than this are "together".
pub const TOGETHER: f64 = 0.5;
/// Adjacent fingertips further than this are "spread".
pub const SPREAD: f64 = 0.5;

/// Thumb-to-index angle under which the thumb lies along the palm.
pub const THUMB_ALONGSIDE_DEG: f64 = 35.0;
/// Thumb-to-index angle from which the thumb is held out.
pub const THUMB_OPEN_DEG: f64 = 50.0;
/// Thumb-to-palm-axis angle under which a straight thumb points up.
pub const THUMB_RAISED_DEG: f64 = 15.0;

// Fingertip contact distances
pub const TOUCH_RING: f64 = 0.25;
pub const TOUCH_INDEX: f64 = 0.2;
pub const TOUCH_LOOSE: f64 = 0.3;
pub const CONVERGE: f64 = 0.35;
pub const APART: f64 = 0.35;
/// Arala's hooked index must stay clear of the thumb (otherwise Hamsasya).
pub const HOOK_THUMB_CLEAR: f64 = 0.25;

/// Musthi: thumb tip within this many index-middle MCP spans of the PIPs.
pub const FIST_THUMB_SPAN: f64 = 1.5;

// Partially curled finger band (Arala, Shukatunda, Kapitta)
pub const HOOK_MIN: f64 = 0.5;
pub const KAPITTA_HOOK_MIN: f64 = 0.4;

// Cupped finger band and PIP angle window (Padmakosha)
pub const CUP_MIN: f64 = 0.6;
pub const CUP_ANGLE_MIN: f64 = 100.0;
pub const CUP_ANGLE_MAX: f64 = 165.0;
pub const CUP_SPREAD: f64 = 0.3;

/// Read-only view of one frame plus its scale reference.
struct Hand<'a> {
    lm: &'a Landmarks,
    scale: f64,
}

impl<'a> Hand<'a> {
    /// `None` for a hand too collapsed to measure.
    fn measure(lm: &'a Landmarks, scale: f64) -> Option<Self> {
        (scale.is_finite() && scale > MIN_HAND_SPAN).then_some(Self { lm, scale })
    }

    fn ratio(&self, finger: Finger) -> f64 {
        straightness_ratio(self.lm, finger.mcp(), finger.pip(), finger.tip(), self.scale)
    }

    fn straight(&self, finger: Finger) -> bool {
        self.straight_at(finger, STRAIGHT)
    }

    fn straight_at(&self, finger: Finger, threshold: f64) -> bool {
        self.ratio(finger) >= threshold
    }

    fn bent(&self, finger: Finger) -> bool {
        self.ratio(finger) < BENT
    }

    fn ratio_in(&self, finger: Finger, lo: f64, hi: f64) -> bool {
        let r = self.ratio(finger);
        r >= lo && r < hi
    }

    fn dist(&self, a: usize, b: usize) -> f64 {
        normalized_distance(self.lm, a, b, self.scale)
    }

    fn together(&self) -> bool {
        self.dist(INDEX_TIP, MIDDLE_TIP) < TOGETHER
            && self.dist(MIDDLE_TIP, RING_TIP) < TOGETHER
            && self.dist(RING_TIP, PINKY_TIP) < TOGETHER
    }

    fn spread(&self, cutoff: f64) -> bool {
        self.dist(INDEX_TIP, MIDDLE_TIP) > cutoff
            && self.dist(MIDDLE_TIP, RING_TIP) > cutoff
            && self.dist(RING_TIP, PINKY_TIP) > cutoff
    }

    /// Angle between the thumb (MCP→tip) and the index finger (MCP→tip).
    fn thumb_open_angle(&self) -> Option<f64> {
        vector_angle_between(&planar(self.lm, THUMB_MCP, THUMB_TIP), &planar(self.lm, INDEX_MCP, INDEX_TIP))
    }

    /// Straight thumb pointing along the palm axis, tip above its MCP.
    fn thumb_raised(&self) -> bool {
        let Some(angle) = vector_angle_between(&planar(self.lm, THUMB_MCP, THUMB_TIP), &planar(self.lm, WRIST, MIDDLE_MCP))
        else {
            return false;
        };
        self.straight_at(Finger::Thumb, STRAIGHT) && angle < THUMB_RAISED_DEG && self.lm[THUMB_TIP].y < self.lm[THUMB_MCP].y
    }

    fn all_long(&self, pred: impl Fn(Finger) -> bool) -> bool {
        Finger::LONG.iter().all(|&f| pred(f))
    }
}

pub fn pataka(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.all_long(|f| h.straight(f))
        && h.together()
        && h.thumb_open_angle().is_some_and(|a| a < THUMB_ALONGSIDE_DEG)
}

pub fn tripataka(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.straight(Finger::Index)
        && h.straight(Finger::Middle)
        && h.straight(Finger::Pinky)
        && h.bent(Finger::Ring)
        && h.dist(THUMB_TIP, RING_TIP) > APART
}

pub fn ardhapataka(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.straight(Finger::Index)
        && h.straight(Finger::Middle)
        && h.bent(Finger::Ring)
        && h.bent(Finger::Pinky)
        && h.dist(INDEX_TIP, MIDDLE_TIP) < TOGETHER
}

pub fn kartarimukha(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.straight(Finger::Index)
        && h.straight(Finger::Middle)
        && h.bent(Finger::Ring)
        && h.bent(Finger::Pinky)
        && h.dist(INDEX_TIP, MIDDLE_TIP) >= SPREAD
}

pub fn mayura(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.straight(Finger::Index)
        && h.straight(Finger::Middle)
        && h.straight(Finger::Pinky)
        && h.dist(THUMB_TIP, RING_TIP) < TOUCH_RING
}

pub fn ardhachandra(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.all_long(|f| h.straight(f))
        && h.together()
        && h.straight_at(Finger::Thumb, LOOSE_STRAIGHT)
        && h.thumb_open_angle().is_some_and(|a| a >= THUMB_OPEN_DEG)
}

pub fn arala(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.ratio_in(Finger::Index, HOOK_MIN, STRAIGHT)
        && h.straight(Finger::Middle)
        && h.straight(Finger::Ring)
        && h.straight(Finger::Pinky)
        && h.dist(THUMB_TIP, INDEX_TIP) > HOOK_THUMB_CLEAR
}

pub fn shukatunda(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.ratio_in(Finger::Index, HOOK_MIN, STRAIGHT)
        && h.straight(Finger::Middle)
        && h.bent(Finger::Ring)
        && h.straight(Finger::Pinky)
}

pub fn musthi(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    if !h.all_long(|f| h.bent(f)) || h.thumb_raised() {
        return false;
    }
    let pip_mid = (lm[INDEX_PIP] + lm[MIDDLE_PIP]) / 2.0;
    let thumb = &lm[THUMB_TIP];
    let to_pips = (thumb.x - pip_mid.x).hypot(thumb.y - pip_mid.y) / scale;
    let span = h.dist(INDEX_MCP, MIDDLE_MCP);
    span > EPSILON && to_pips < FIST_THUMB_SPAN * span
}

pub fn shikhara(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.all_long(|f| h.bent(f)) && h.thumb_raised()
}

pub fn kapitta(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.ratio_in(Finger::Index, KAPITTA_HOOK_MIN, STRAIGHT)
        && h.bent(Finger::Middle)
        && h.bent(Finger::Ring)
        && h.bent(Finger::Pinky)
        && h.dist(THUMB_TIP, INDEX_TIP).min(h.dist(THUMB_TIP, INDEX_DIP)) < TOUCH_LOOSE
}

pub fn suchi(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.straight(Finger::Index)
        && h.bent(Finger::Middle)
        && h.bent(Finger::Ring)
        && h.bent(Finger::Pinky)
        && lm[INDEX_TIP].y < lm[INDEX_MCP].y
        && h.thumb_open_angle().is_some_and(|a| a < THUMB_OPEN_DEG)
}

pub fn chandrakala(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.straight(Finger::Index)
        && h.bent(Finger::Middle)
        && h.bent(Finger::Ring)
        && h.bent(Finger::Pinky)
        && h.straight_at(Finger::Thumb, LOOSE_STRAIGHT)
        && h.thumb_open_angle().is_some_and(|a| a >= THUMB_OPEN_DEG)
}

pub fn padmakosha(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    let cupped = h.all_long(|f| {
        let angle = joint_angle(f.mcp(), f.pip(), f.tip(), lm);
        h.ratio_in(f, CUP_MIN, STRAIGHT) && (CUP_ANGLE_MIN..=CUP_ANGLE_MAX).contains(&angle)
    });
    cupped && h.spread(CUP_SPREAD) && h.dist(THUMB_TIP, INDEX_TIP) > APART
}

pub fn alapadma(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.all_long(|f| h.straight(f)) && h.spread(SPREAD) && h.dist(THUMB_TIP, INDEX_TIP) > SPREAD
}

pub fn mrigashirsha(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.straight_at(Finger::Thumb, LOOSE_STRAIGHT)
        && h.straight(Finger::Pinky)
        && h.bent(Finger::Index)
        && h.bent(Finger::Middle)
        && h.bent(Finger::Ring)
        && lm[THUMB_TIP].y < lm[THUMB_MCP].y
}

pub fn simhamukha(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.straight(Finger::Index)
        && h.straight(Finger::Pinky)
        && h.dist(THUMB_TIP, MIDDLE_TIP) < TOUCH_LOOSE
        && h.dist(THUMB_TIP, RING_TIP) < TOUCH_LOOSE
}

pub fn trishula(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.straight(Finger::Index)
        && h.straight(Finger::Middle)
        && h.straight(Finger::Ring)
        && h.dist(THUMB_TIP, PINKY_TIP) < TOUCH_LOOSE
}

pub fn hamsasya(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.dist(THUMB_TIP, INDEX_TIP) < TOUCH_INDEX
        && h.straight_at(Finger::Middle, LOOSE_STRAIGHT)
        && h.straight_at(Finger::Ring, LOOSE_STRAIGHT)
        && h.straight_at(Finger::Pinky, LOOSE_STRAIGHT)
}

pub fn mukula(lm: &Landmarks, scale: f64) -> bool {
    let Some(h) = Hand::measure(lm, scale) else {
        return false;
    };
    h.all_long(|f| h.dist(THUMB_TIP, f.tip()) < CONVERGE)
}

/// Ordered pose-name → predicate mapping, built once and shared by scorers.
#[derive(Clone)]
pub struct RuleRegistry {
    rules: Vec<(&'static str, RuleFn)>,
}

impl RuleRegistry {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Every single-hand mudra with a hand-authored rule.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry
            .register("Pataka", pataka)
            .register("Tripataka", tripataka)
            .register("Ardhapataka", ardhapataka)
            .register("Kartarimukha", kartarimukha)
            .register("Mayura", mayura)
            .register("Ardhachandra", ardhachandra)
            .register("Arala", arala)
            .register("Shukatunda", shukatunda)
            .register("Musthi", musthi)
            .register("Shikhara", shikhara)
            .register("Kapitta", kapitta)
            .register("Suchi", suchi)
            .register("Chandrakala", chandrakala)
            .register("Padmakosha", padmakosha)
            .register("Alapadma", alapadma)
            .register("Mrigashirsha", mrigashirsha)
            .register("Simhamukha", simhamukha)
            .register("Trishula", trishula)
            .register("Hamsasya", hamsasya)
            .register("Mukula", mukula);
        registry
    }

    /// Adds or replaces the predicate for `name`.
    pub fn register(&mut self, name: &'static str, rule: RuleFn) -> &mut Self {
        match self.rules.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = rule,
            None => self.rules.push((name, rule)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<RuleFn> {
        self.rules.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|(n, _)| *n)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Runs every evaluator and returns the names that fired, in registry
    /// order. A panicking evaluator loses its vote for this frame only.
    pub fn evaluate(&self, landmarks: &Landmarks, scale: f64) -> Vec<&'static str> {
        if !landmarks.is_finite() || !scale.is_finite() {
            debug!("Skipping rule evaluation for non-finite landmarks");
            return Vec::new();
        }
        if scale <= MIN_HAND_SPAN {
            debug!("Skipping rule evaluation for a collapsed hand (scale {:e})", scale);
            return Vec::new();
        }

        let mut hits = Vec::new();
        for (name, rule) in &self.rules {
            match panic::catch_unwind(AssertUnwindSafe(|| rule(landmarks, scale))) {
                Ok(true) => hits.push(*name),
                Ok(false) => {}
                Err(_) => warn!(rule = *name, "Rule evaluator panicked, skipping its vote"),
            }
        }
        hits
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
