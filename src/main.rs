use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use transcription_session::recognition::load_script;
use transcription_session::{
    Config, ScriptedRecognizer, SessionConfig, StartOutcome, StaticPermissions,
    SyntheticBackend, TranscriptionSession,
};

/// Replay a script of recognizer callbacks through a transcription session
#[derive(Debug, Parser)]
#[command(name = "transcribe-replay", version)]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/transcribe")]
    config: String,

    /// JSON array of scripted recognizer callbacks
    script: PathBuf,

    /// Answer the microphone permission check with "denied"
    #[arg(long)]
    deny_microphone: bool,

    /// Answer the recognition authorization check with "denied"
    #[arg(long)]
    deny_recognition: bool,

    /// Press stop after this many milliseconds if the session is still running
    #[arg(long)]
    stop_after_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;
    let steps = load_script(&args.script)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!(
        "Replaying {} recognizer callbacks from {}",
        steps.len(),
        args.script.display()
    );

    let session = TranscriptionSession::new(
        SessionConfig::from(&cfg),
        Box::new(SyntheticBackend::new((&cfg.audio).into())),
        Arc::new(ScriptedRecognizer::new(steps)),
        Arc::new(StaticPermissions::new(
            !args.deny_recognition,
            !args.deny_microphone,
        )),
    );

    let mut live_text = session.live_text();
    tokio::spawn(async move {
        while live_text.changed().await.is_ok() {
            if let Some(text) = live_text.borrow_and_update().as_deref() {
                info!("Live: {}", text);
            }
        }
    });

    match session.start().await {
        StartOutcome::Started => {
            let until_inactive = session.wait_inactive();
            match args.stop_after_ms {
                Some(ms) => {
                    if tokio::time::timeout(Duration::from_millis(ms), until_inactive)
                        .await
                        .is_err()
                    {
                        info!("Stopping after {}ms", ms);
                    }
                }
                None => until_inactive.await,
            }
        }
        StartOutcome::Failed(e) => warn!("Session failed to start: {}", e),
        other => warn!("Unexpected start outcome: {:?}", other),
    }

    let stats = session.stop().await;

    if let Some(error) = session.last_error().borrow().as_deref() {
        warn!("Last error: {}", error);
    }

    for (i, alternative) in session.history().borrow().iter().enumerate() {
        let runs: Vec<String> = alternative
            .runs()
            .iter()
            .map(|run| match run.confidence {
                Some(c) => format!("[{}|{:.2}]", run.text, c),
                None => run.text.clone(),
            })
            .collect();
        match alternative.mean_confidence() {
            Some(mean) => info!("Alternative {} ({:.2}): {}", i + 1, mean, runs.concat()),
            None => info!("Alternative {}: {}", i + 1, runs.concat()),
        }
    }

    info!(
        "{}",
        serde_json::to_string_pretty(&stats).context("Failed to serialize session stats")?
    );

    Ok(())
}
