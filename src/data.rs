// src/data.rs - CSV landmark recordings in, per-frame CSV reports out
use anyhow::{bail, ensure, Context, Result};
use csv::{ReaderBuilder, Writer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use crate::fsm::{DisplayText, FsmState};
use crate::hybrid::Method;
use crate::landmarks::{Handedness, Landmarks, TrackerFrame, LANDMARK_COUNT};
use crate::tracking::FrameReport;

const LEADING_COLUMNS: usize = 3;
const COLUMNS: usize = LEADING_COLUMNS + LANDMARK_COUNT * 3;

/// `frame,hand,handedness,x0,y0,z0,...,x20,y20,z20`
pub fn landmark_header() -> Vec<String> {
    let mut header = vec!["frame".to_string(), "hand".to_string(), "handedness".to_string()];
    for i in 0..LANDMARK_COUNT {
        for axis in ["x", "y", "z"] {
            header.push(format!("{}{}", axis, i));
        }
    }
    header
}

pub fn load_landmark_csv(path: impl AsRef<Path>) -> Result<Vec<TrackerFrame>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).with_context(|| format!("Could not open CSV {:?}", path))?;
    read_landmark_csv(file).with_context(|| format!("Invalid landmark CSV {:?}", path))
}

/// Reads a landmark recording ordered by its `frame` column. Rows with
/// `hand=0` are frames where the tracker saw no hand.
pub fn read_landmark_csv<R: io::Read>(reader: R) -> Result<Vec<TrackerFrame>> {
    let mut reader = ReaderBuilder::new().has_headers(true).flexible(true).from_reader(reader);
    let mut frames: BTreeMap<u64, TrackerFrame> = BTreeMap::new();

    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 1;
        let record = result.with_context(|| format!("Row {} is not valid CSV", row))?;

        let frame: u64 = record
            .get(0)
            .unwrap_or_default()
            .trim()
            .parse()
            .with_context(|| format!("Invalid frame number in row {}", row))?;
        let hand = record.get(1).unwrap_or_default().trim();

        let parsed = match hand {
            "0" | "false" | "" => TrackerFrame::NoHand,
            "1" | "true" => {
                ensure!(record.len() >= COLUMNS, "Row {} has {} columns, expected {}", row, record.len(), COLUMNS);
                let handedness: Handedness = record[2]
                    .parse()
                    .map_err(|e: String| anyhow::anyhow!(e))
                    .with_context(|| format!("Invalid handedness in row {}", row))?;

                let mut raw = [[0.0; 3]; LANDMARK_COUNT];
                for (i, point) in raw.iter_mut().enumerate() {
                    for (axis, value) in point.iter_mut().enumerate() {
                        let col = LEADING_COLUMNS + i * 3 + axis;
                        *value = record[col]
                            .trim()
                            .parse()
                            .with_context(|| format!("Invalid coordinate in row {} column {}", row, col + 1))?;
                    }
                }
                let landmarks =
                    Landmarks::from_slice(&raw).with_context(|| format!("Row {} has a bad landmark count", row))?;
                TrackerFrame::hand(landmarks, handedness)
            }
            other => bail!("Invalid hand flag {:?} in row {}", other, row),
        };

        if frames.insert(frame, parsed).is_some() {
            bail!("Frame {} appears twice (row {})", frame, row);
        }
    }

    Ok(frames.into_values().collect())
}

/// Writes frames in the format `read_landmark_csv` accepts.
pub fn write_landmark_csv<W: io::Write>(writer: W, frames: &[TrackerFrame]) -> Result<()> {
    let mut writer = Writer::from_writer(writer);
    writer.write_record(landmark_header())?;
    for (i, frame) in frames.iter().enumerate() {
        let mut row = vec![i.to_string()];
        match frame {
            TrackerFrame::NoHand => {
                row.push("0".to_string());
                row.push(String::new());
                row.extend(std::iter::repeat(String::new()).take(LANDMARK_COUNT * 3));
            }
            TrackerFrame::Hand { landmarks, handedness } => {
                row.push("1".to_string());
                row.push(handedness.to_string());
                for p in landmarks.points() {
                    row.extend([p.x.to_string(), p.y.to_string(), p.z.to_string()]);
                }
            }
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ReportRecord {
    pub frame: u64,
    pub state: FsmState,
    pub display: String,
    pub confidence: f64,
    pub method: Option<Method>,
    pub raw: String,
    pub raw_confidence: f64,
    pub raw_method: Option<Method>,
}

impl From<&FrameReport> for ReportRecord {
    fn from(report: &FrameReport) -> Self {
        Self {
            frame: report.frame,
            state: report.state,
            display: report.display.text.to_string(),
            confidence: report.display.confidence,
            method: report.display.method,
            raw: report.detection.label().to_string(),
            raw_confidence: report.detection.confidence,
            raw_method: report.detection.method,
        }
    }
}

/// Streams one CSV row per processed frame.
pub struct ReportWriter<W: io::Write> {
    writer: Writer<W>,
}

impl<W: io::Write> ReportWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::from_writer(inner),
        }
    }

    pub fn write(&mut self, report: &FrameReport) -> Result<()> {
        self.writer.serialize(ReportRecord::from(report))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| anyhow::anyhow!(e.to_string()))
    }
}

/// A run of consecutive frames that displayed the same confirmed pose.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSegment {
    pub pose: String,
    pub first_frame: u64,
    pub last_frame: u64,
    pub method: Option<Method>,
}

impl PoseSegment {
    pub fn frames(&self) -> u64 {
        self.last_frame - self.first_frame + 1
    }
}

/// Running log of the poses the viewer actually saw.
#[derive(Debug, Default)]
pub struct PoseLog {
    segments: Vec<PoseSegment>,
}

impl PoseLog {
    pub fn push(&mut self, report: &FrameReport) {
        let DisplayText::Pose(name) = &report.display.text else {
            return;
        };
        match self.segments.last_mut() {
            Some(seg) if seg.pose == *name && seg.last_frame + 1 == report.frame => {
                seg.last_frame = report.frame;
            }
            _ => self.segments.push(PoseSegment {
                pose: name.clone(),
                first_frame: report.frame,
                last_frame: report.frame,
                method: report.display.method,
            }),
        }
    }

    pub fn segments(&self) -> &[PoseSegment] {
        &self.segments
    }
}

pub fn summarize(reports: &[FrameReport]) -> Vec<PoseSegment> {
    let mut log = PoseLog::default();
    for report in reports {
        log.push(report);
    }
    log.segments
}
