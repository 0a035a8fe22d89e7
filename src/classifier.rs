// src/classifier.rs - Learned-model boundary: trait, subprocess client, shared handle
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ClassifierCommand;
use crate::features::FeatureVector;

const READY: &str = "READY";
/// Model loading can be slow, but a process that never says READY must not
/// hang startup.
pub const READY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class_name: String,
    pub confidence: f64,
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier not ready")]
    NotReady,
    #[error("classifier timed out after {0} ms")]
    Timeout(u64),
    #[error("classifier i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed classifier message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("classifier reported: {0}")]
    Remote(String),
    #[error("classifier did not signal ready, got {0:?}")]
    Handshake(String),
    #[error("classifier process exited")]
    Exited,
}

/// One model call per frame. `Ok(None)` means the model ran and saw nothing.
#[allow(async_fn_in_trait)]
pub trait MudraClassifier {
    async fn classify(&mut self, features: &FeatureVector) -> Result<Option<Prediction>, ClassifierError>;
}

/// Rule-only operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClassifier;

impl MudraClassifier for NoClassifier {
    async fn classify(&mut self, _features: &FeatureVector) -> Result<Option<Prediction>, ClassifierError> {
        Err(ClassifierError::NotReady)
    }
}

#[derive(Serialize)]
struct Request<'a> {
    features: &'a [f64],
}

#[derive(Deserialize, Debug)]
struct Response {
    #[serde(default)]
    detected: bool,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

/// Line-delimited JSON client for an external model process.
///
/// The process prints `READY` once it has loaded its model, then answers each
/// `{"features":[...]}` line with exactly one response line.
pub struct SubprocessClassifier<W = ChildStdin, R = BufReader<ChildStdout>> {
    writer: W,
    reader: R,
    // kept so the process is killed when the client drops
    _child: Option<Child>,
    // responses still owed for requests whose caller gave up (timeout)
    owed: usize,
    line: String,
}

impl SubprocessClassifier {
    pub async fn spawn(command: &ClassifierCommand) -> Result<Self, ClassifierError> {
        info!("Starting classifier process: {} {:?}", command.program, command.args);
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or(ClassifierError::NotReady)?;
        let stdout = child.stdout.take().ok_or(ClassifierError::NotReady)?;
        let mut client = Self::connect_within(stdin, BufReader::new(stdout), READY_TIMEOUT).await?;
        client._child = Some(child);
        Ok(client)
    }
}

impl<W, R> SubprocessClassifier<W, R>
where
    W: AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
{
    /// Wrap an already-connected pipe pair and wait for the ready signal.
    pub async fn connect(writer: W, reader: R) -> Result<Self, ClassifierError> {
        Self::connect_within(writer, reader, READY_TIMEOUT).await
    }

    pub async fn connect_within(writer: W, reader: R, limit: Duration) -> Result<Self, ClassifierError> {
        let mut client = Self {
            writer,
            reader,
            _child: None,
            owed: 0,
            line: String::new(),
        };
        let first = tokio::time::timeout(limit, client.read_line())
            .await
            .map_err(|_| ClassifierError::Timeout(limit.as_millis() as u64))??;
        if first.trim() != READY {
            return Err(ClassifierError::Handshake(first.trim().to_string()));
        }
        info!("Classifier ready");
        Ok(client)
    }

    async fn read_line(&mut self) -> Result<String, ClassifierError> {
        self.line.clear();
        let n = self.reader.read_line(&mut self.line).await?;
        if n == 0 {
            return Err(ClassifierError::Exited);
        }
        Ok(self.line.clone())
    }

    async fn drain_owed(&mut self) -> Result<(), ClassifierError> {
        while self.owed > 0 {
            let stale = self.read_line().await?;
            self.owed -= 1;
            debug!("Discarded late classifier response: {}", stale.trim());
        }
        Ok(())
    }
}

impl<W, R> MudraClassifier for SubprocessClassifier<W, R>
where
    W: AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
{
    async fn classify(&mut self, features: &FeatureVector) -> Result<Option<Prediction>, ClassifierError> {
        self.drain_owed().await?;

        let mut request = serde_json::to_string(&Request {
            features: features.as_slice(),
        })?;
        request.push('\n');
        self.writer.write_all(request.as_bytes()).await?;
        self.writer.flush().await?;
        self.owed += 1;

        let line = self.read_line().await?;
        self.owed -= 1;
        let response: Response = serde_json::from_str(line.trim())?;

        if let Some(error) = response.error {
            return Err(ClassifierError::Remote(error));
        }
        if !response.detected {
            return Ok(None);
        }
        match (response.name, response.confidence) {
            (Some(class_name), Some(confidence)) => Ok(Some(Prediction { class_name, confidence })),
            _ => Err(ClassifierError::Remote("detection without name or confidence".to_string())),
        }
    }
}

/// Lets many sessions share one model process; each call holds the lock for
/// exactly one request/response exchange.
pub struct SharedClassifier<C> {
    inner: Arc<Mutex<C>>,
}

impl<C> SharedClassifier<C> {
    pub fn new(classifier: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(classifier)),
        }
    }
}

impl<C> Clone for SharedClassifier<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: MudraClassifier> MudraClassifier for SharedClassifier<C> {
    async fn classify(&mut self, features: &FeatureVector) -> Result<Option<Prediction>, ClassifierError> {
        let mut guard = self.inner.lock().await;
        guard.classify(features).await
    }
}

/// Either a running model or rule-only mode, chosen at startup.
pub enum AnyClassifier {
    Subprocess(SubprocessClassifier),
    Disabled(NoClassifier),
}

impl MudraClassifier for AnyClassifier {
    async fn classify(&mut self, features: &FeatureVector) -> Result<Option<Prediction>, ClassifierError> {
        match self {
            AnyClassifier::Subprocess(c) => c.classify(features).await,
            AnyClassifier::Disabled(c) => c.classify(features).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_COUNT;
    use tokio::io::{duplex, split, AsyncReadExt, DuplexStream, ReadHalf, WriteHalf};

    type Client = SubprocessClassifier<WriteHalf<DuplexStream>, BufReader<ReadHalf<DuplexStream>>>;

    /// Client connected to an in-memory "process" that replies with `replies`.
    async fn scripted(replies: &[&str]) -> (Client, DuplexStream) {
        let (ours, mut theirs) = duplex(64 * 1024);
        let mut script = format!("{}\n", READY);
        for r in replies {
            script.push_str(r);
            script.push('\n');
        }
        theirs.write_all(script.as_bytes()).await.unwrap();
        let (read, write) = split(ours);
        let client = SubprocessClassifier::connect(write, BufReader::new(read)).await.unwrap();
        (client, theirs)
    }

    fn features() -> FeatureVector {
        FeatureVector([0.25; FEATURE_COUNT])
    }

    #[tokio::test]
    async fn detected_response_becomes_prediction() {
        let (mut c, mut peer) = scripted(&[r#"{"detected":true,"name":"Pataka Mudra","confidence":0.82}"#]).await;
        let p = c.classify(&features()).await.unwrap().unwrap();
        assert_eq!(p.class_name, "Pataka Mudra");
        assert!((p.confidence - 0.82).abs() < 1e-12);

        let mut sent = vec![0u8; 256];
        let n = peer.read(&mut sent).await.unwrap();
        let sent = String::from_utf8_lossy(&sent[..n]);
        assert!(sent.starts_with("{\"features\":[0.25,"));
        assert!(sent.ends_with("]}\n"));
    }

    #[tokio::test]
    async fn not_detected_and_remote_error() {
        let (mut c, _peer) = scripted(&[r#"{"detected":false}"#, r#"{"error":"model not loaded"}"#]).await;
        assert_eq!(c.classify(&features()).await.unwrap(), None);
        match c.classify(&features()).await {
            Err(ClassifierError::Remote(msg)) => assert_eq!(msg, "model not loaded"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn garbage_is_a_json_error_and_eof_is_exit() {
        let output: &[u8] = b"READY\nnot json\n";
        let mut c = SubprocessClassifier::connect(tokio::io::sink(), BufReader::new(output))
            .await
            .unwrap();
        assert!(matches!(c.classify(&features()).await, Err(ClassifierError::Json(_))));
        assert!(matches!(c.classify(&features()).await, Err(ClassifierError::Exited)));
    }

    #[tokio::test]
    async fn handshake_must_say_ready() {
        let (ours, mut theirs) = duplex(1024);
        theirs.write_all(b"loading model...\n").await.unwrap();
        let (read, write) = split(ours);
        match SubprocessClassifier::connect(write, BufReader::new(read)).await {
            Err(ClassifierError::Handshake(got)) => assert_eq!(got, "loading model..."),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("handshake accepted"),
        }
    }

    #[tokio::test]
    async fn silent_process_times_out_instead_of_hanging() {
        let (ours, _theirs) = duplex(1024);
        let (read, write) = split(ours);
        let limit = std::time::Duration::from_millis(20);
        match SubprocessClassifier::connect_within(write, BufReader::new(read), limit).await {
            Err(ClassifierError::Timeout(ms)) => assert_eq!(ms, 20),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("handshake accepted"),
        }
    }

    #[tokio::test]
    async fn late_response_is_discarded_after_abandoned_call() {
        let (mut c, mut peer) = scripted(&[]).await;
        // caller gives up before the model answers
        let abandoned = tokio::time::timeout(std::time::Duration::from_millis(20), c.classify(&features())).await;
        assert!(abandoned.is_err());

        peer.write_all(b"{\"detected\":true,\"name\":\"Suchi\",\"confidence\":0.9}\n").await.unwrap();
        peer.write_all(b"{\"detected\":true,\"name\":\"Kapitta\",\"confidence\":0.7}\n").await.unwrap();
        let p = c.classify(&features()).await.unwrap().unwrap();
        assert_eq!(p.class_name, "Kapitta");
    }

    #[tokio::test]
    async fn no_classifier_is_never_ready() {
        assert!(matches!(NoClassifier.classify(&features()).await, Err(ClassifierError::NotReady)));
    }

    #[tokio::test]
    async fn shared_handles_use_one_model() {
        let (c, _peer) = scripted(&[r#"{"detected":false}"#, r#"{"detected":true,"name":"Arala","confidence":0.6}"#]).await;
        let mut a = SharedClassifier::new(c);
        let mut b = a.clone();
        assert_eq!(a.classify(&features()).await.unwrap(), None);
        assert_eq!(b.classify(&features()).await.unwrap().unwrap().class_name, "Arala");
    }
}
