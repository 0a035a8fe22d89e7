// src/main.rs - Replay or live-stream hand landmarks through the mudra pipeline
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mudra_tracker::classifier::AnyClassifier;
use mudra_tracker::config::ClassifierCommand;
use mudra_tracker::data::{load_landmark_csv, PoseLog, ReportWriter};
use mudra_tracker::mediapipe_bridge::MediaPipeBridge;
use mudra_tracker::names::MudraNames;
use mudra_tracker::rules::RuleRegistry;
use mudra_tracker::synthetic::demo_sequence;
use mudra_tracker::{AppConfig, HybridScorer, MudraClassifier, MudraTracker, NoClassifier, SubprocessClassifier, TrackerFrame};

const USAGE: &str = "Usage: mudra_tracker [--config <file>] [--classifier <program> [--classifier-arg <arg>]...] [--gate] (--csv <file> | --stdin | --demo)";

enum Input {
    Csv(PathBuf),
    Stdin,
    Demo,
}

struct Options {
    config: Option<PathBuf>,
    classifier: Option<String>,
    classifier_args: Vec<String>,
    gate: bool,
    input: Input,
}

fn parse_args() -> Result<Options> {
    let mut config = None;
    let mut classifier = None;
    let mut classifier_args = Vec::new();
    let mut gate = false;
    let mut input = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().ok_or_else(|| anyhow!("{} needs a value\n{}", flag, USAGE));
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--classifier" => classifier = Some(value("--classifier")?),
            "--classifier-arg" => classifier_args.push(value("--classifier-arg")?),
            "--csv" => input = Some(Input::Csv(PathBuf::from(value("--csv")?))),
            "--stdin" => input = Some(Input::Stdin),
            "--demo" => input = Some(Input::Demo),
            "--gate" => gate = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("Unknown argument {:?}\n{}", other, USAGE),
        }
    }

    let input = input.ok_or_else(|| anyhow!("No input selected\n{}", USAGE))?;
    Ok(Options {
        config,
        classifier,
        classifier_args,
        gate,
        input,
    })
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn start_classifier(command: Option<&ClassifierCommand>) -> AnyClassifier {
    let Some(command) = command else {
        info!("No classifier configured, running rules only");
        return AnyClassifier::Disabled(NoClassifier);
    };
    match SubprocessClassifier::spawn(command).await {
        Ok(classifier) => AnyClassifier::Subprocess(classifier),
        Err(e) => {
            warn!("Classifier unavailable, running rules only: {}", e);
            AnyClassifier::Disabled(NoClassifier)
        }
    }
}

struct Run<W: std::io::Write, C> {
    tracker: MudraTracker<C>,
    out: ReportWriter<W>,
    log: PoseLog,
}

impl<W: std::io::Write, C: MudraClassifier> Run<W, C> {
    async fn feed(&mut self, frame: TrackerFrame) -> Result<()> {
        let report = self.tracker.process_frame(frame).await;
        self.out.write(&report)?;
        self.log.push(&report);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = parse_args()?;

    let source = AppConfig::locate(options.config.as_deref());
    let mut config = AppConfig::load_source(source.as_deref())?;
    if let Some(program) = options.classifier {
        let labels = config.classifier.take().map(|c| c.labels).unwrap_or_default();
        config.classifier = Some(ClassifierCommand {
            program,
            args: options.classifier_args,
            labels,
        });
    }
    if options.gate {
        config.tracker.steadiness_gate = true;
    }

    init_tracing(&config.log_level);
    info!("Starting mudra_tracker");
    match &source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    let scorer = Arc::new(HybridScorer::new(
        RuleRegistry::standard(),
        Arc::new(MudraNames),
        config.scoring.clone(),
    ));
    let labels = config.classifier.as_ref().map(|c| c.labels.as_slice()).unwrap_or_default();
    let supported = scorer.supported_mudras(labels);
    info!("{} mudras supported: {}", supported.len(), supported.join(", "));
    let classifier = start_classifier(config.classifier.as_ref()).await;

    let stdout = std::io::stdout();
    let mut run = Run {
        tracker: MudraTracker::new(scorer, classifier, config.fsm.clone(), config.tracker.clone()),
        out: ReportWriter::new(stdout.lock()),
        log: PoseLog::default(),
    };

    match options.input {
        Input::Csv(path) => {
            let frames = load_landmark_csv(&path)?;
            info!("Replaying {} frames from {}", frames.len(), path.display());
            for frame in frames {
                run.feed(frame).await?;
            }
        }
        Input::Demo => {
            for frame in demo_sequence() {
                run.feed(frame).await?;
            }
        }
        Input::Stdin => {
            let mut bridge = MediaPipeBridge::new(BufReader::new(tokio::io::stdin()));
            while let Some(frame) = bridge.next_frame_lenient().await.context("Tracker stream failed")? {
                run.feed(frame).await?;
                run.out.flush()?;
            }
        }
    }
    run.out.flush()?;

    for segment in run.log.segments() {
        info!(
            "{} frames {}-{} ({} frames, {})",
            segment.pose,
            segment.first_frame,
            segment.last_frame,
            segment.frames(),
            segment.method.map(|m| m.to_string()).unwrap_or_default()
        );
    }
    let metrics = run.tracker.metrics();
    info!(
        frames = metrics.frames,
        rule_hits = metrics.rule_hits,
        ml_hits = metrics.ml_hits,
        classifier_failures = metrics.classifier_failures,
        "Done: {:.2} ms/frame avg",
        metrics.avg_processing_time * 1000.0
    );
    Ok(())
}
