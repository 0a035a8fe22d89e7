// src/mediapipe_bridge.rs - Line-delimited JSON frames from an external MediaPipe hand tracker
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

use crate::landmarks::{Handedness, Landmarks, TrackerFrame};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("tracker stream i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed tracker line {line}: {source}")]
    Json {
        line: u64,
        #[source]
        source: serde_json::Error,
    },
    #[error("tracker line {line} has {got} landmarks, expected 21")]
    LandmarkCount { line: u64, got: usize },
    #[error("tracker line {line}: {message}")]
    Handedness { line: u64, message: String },
}

#[derive(Deserialize, Debug, Default)]
struct FrameJson {
    #[serde(default)]
    landmarks: Option<Vec<[f64; 3]>>,
    #[serde(default)]
    handedness: Option<String>,
    // some trackers nest the hand under "hand"; null means no hand
    #[serde(default)]
    hand: Option<Box<FrameJson>>,
}

/// Reads one `TrackerFrame` per line:
/// `{"hand":null}` or `{}` for no hand, otherwise
/// `{"landmarks":[[x,y,z],...21],"handedness":"Left"}`.
pub struct MediaPipeBridge<R> {
    reader: R,
    line: String,
    line_no: u64,
}

impl<R: AsyncBufRead + Unpin> MediaPipeBridge<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_no: 0,
        }
    }

    /// Next frame, `Ok(None)` at end of stream. Blank lines are skipped.
    pub async fn next_frame(&mut self) -> Result<Option<TrackerFrame>, BridgeError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            return parse_frame(text, self.line_no).map(Some);
        }
    }

    /// Like `next_frame`, but a bad line becomes a no-hand frame so the
    /// detection loop keeps running. Only stream failures end it.
    pub async fn next_frame_lenient(&mut self) -> Result<Option<TrackerFrame>, std::io::Error> {
        match self.next_frame().await {
            Ok(frame) => Ok(frame),
            Err(BridgeError::Io(e)) => Err(e),
            Err(e) => {
                warn!("Treating bad tracker line as no hand: {}", e);
                Ok(Some(TrackerFrame::NoHand))
            }
        }
    }
}

pub fn parse_frame(text: &str, line: u64) -> Result<TrackerFrame, BridgeError> {
    let mut json: FrameJson = serde_json::from_str(text).map_err(|source| BridgeError::Json { line, source })?;
    if let Some(inner) = json.hand.take() {
        json = *inner;
    }

    let Some(points) = json.landmarks else {
        return Ok(TrackerFrame::NoHand);
    };
    let landmarks = Landmarks::from_slice(&points).ok_or(BridgeError::LandmarkCount {
        line,
        got: points.len(),
    })?;
    let handedness = match json.handedness.as_deref() {
        Some(label) => label
            .parse::<Handedness>()
            .map_err(|message| BridgeError::Handedness { line, message })?,
        None => Handedness::default(),
    };
    Ok(TrackerFrame::hand(landmarks, handedness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    fn hand_line(count: usize, handedness: &str) -> String {
        let points: Vec<[f64; 3]> = (0..count).map(|i| [i as f64 * 0.01, 0.5, 0.0]).collect();
        serde_json::json!({ "landmarks": points, "handedness": handedness }).to_string()
    }

    #[test]
    fn empty_and_null_objects_are_no_hand() {
        assert_eq!(parse_frame("{}", 1).unwrap(), TrackerFrame::NoHand);
        assert_eq!(parse_frame(r#"{"hand":null}"#, 1).unwrap(), TrackerFrame::NoHand);
    }

    #[test]
    fn hand_line_parses() {
        match parse_frame(&hand_line(21, "Left"), 3).unwrap() {
            TrackerFrame::Hand { landmarks, handedness } => {
                assert_eq!(handedness, Handedness::Left);
                assert!((landmarks[20].x - 0.2).abs() < 1e-12);
            }
            other => panic!("expected hand, got {:?}", other),
        }
    }

    #[test]
    fn nested_hand_object_is_accepted() {
        let line = format!(r#"{{"hand":{}}}"#, hand_line(21, "Right"));
        assert!(parse_frame(&line, 1).unwrap().is_hand());
    }

    #[test]
    fn wrong_count_and_bad_label_are_errors() {
        assert!(matches!(
            parse_frame(&hand_line(20, "Left"), 4),
            Err(BridgeError::LandmarkCount { line: 4, got: 20 })
        ));
        assert!(matches!(
            parse_frame(&hand_line(21, "Both"), 5),
            Err(BridgeError::Handedness { line: 5, .. })
        ));
    }

    #[tokio::test]
    async fn lenient_stream_keeps_going() {
        let input = format!("{}\n\nnot json\n{}\n{{}}\n", hand_line(21, "Right"), hand_line(5, "Right"));
        let mut bridge = MediaPipeBridge::new(BufReader::new(input.as_bytes()));
        let mut frames = Vec::new();
        while let Some(frame) = bridge.next_frame_lenient().await.unwrap() {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 4);
        assert!(frames[0].is_hand());
        assert!(frames[1..].iter().all(|f| !f.is_hand()));
    }

    #[tokio::test]
    async fn strict_stream_reports_line_numbers() {
        let input = "{}\nnot json\n";
        let mut bridge = MediaPipeBridge::new(BufReader::new(input.as_bytes()));
        assert_eq!(bridge.next_frame().await.unwrap(), Some(TrackerFrame::NoHand));
        match bridge.next_frame().await {
            Err(BridgeError::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }
    }
}
