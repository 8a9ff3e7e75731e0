use std::{future::Future, io};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    cli::{AnalyzeArgs, TrainArgs},
    export::{export_frame, export_session},
    identity::Identity,
    session::{AnalysisResult, SessionController, SessionEvent, StartOutcome},
    training::{TrainingLabel, TrainingSet},
    AppState,
};

/// Runs one analysis to completion, printing progress. Ctrl-C cancels.
pub async fn analyze(state: &AppState, args: AnalyzeArgs) -> Result<()> {
    let controller = &state.session;
    let identity = Identity::new(args.name, args.email);
    let mut events = controller.subscribe();

    println!("Preparing camera and model...");
    match start_or_interrupt(controller, tokio::signal::ctrl_c()).await? {
        StartOutcome::Started(session_id) => info!("session {session_id} started"),
        StartOutcome::AlreadyRunning => bail!("an analysis is already running"),
        StartOutcome::Cancelled => {
            println!("Analysis cancelled.");
            return Ok(());
        }
    }
    println!("Recording... look at the camera.");

    let Some(result) = wait_for_result(controller, &mut events).await? else {
        println!("Analysis cancelled.");
        return Ok(());
    };

    print_report(&result);

    if args.no_export {
        return Ok(());
    }
    let out_dir = args
        .out
        .unwrap_or_else(|| state.settings.current().export_dir);
    let now = Utc::now();
    let summary = export_session(&out_dir, &identity, &result, now)
        .await
        .context("Failed to export session")?;
    println!(
        "Saved {} frames and the recording to {}",
        summary.frames_written,
        summary.dir.display()
    );

    for index in args.frames {
        let Some(frame) = result.frames.iter().find(|frame| frame.index == index) else {
            warn!("no frame {index} in this session, skipping");
            continue;
        };
        let path = export_frame(&out_dir, &identity, frame, now)
            .await
            .with_context(|| format!("Failed to save frame {index}"))?;
        println!("Saved frame {index} to {}", path.display());
    }
    Ok(())
}

/// Starts a session, cancelling it if `interrupt` fires while the camera and
/// model are still being prepared. The start is always driven to completion so
/// the camera is released on the way out.
async fn start_or_interrupt<I>(
    controller: &SessionController,
    interrupt: I,
) -> Result<StartOutcome>
where
    I: Future<Output = io::Result<()>>,
{
    let start = controller.start();
    tokio::pin!(start);

    tokio::select! {
        outcome = &mut start => return Ok(outcome?),
        signal = interrupt => {
            signal.context("Failed to listen for Ctrl-C")?;
            warn!("interrupt received while preparing, cancelling session");
        }
    }
    controller.cancel().await;
    Ok(start.await?)
}

async fn wait_for_result(
    controller: &SessionController,
    events: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Result<Option<AnalysisResult>> {
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                warn!("interrupt received, cancelling session");
                controller.cancel().await;
            }
            event = events.recv() => match event {
                Ok(SessionEvent::FrameCaptured { index, total, progress }) => {
                    println!("  frame {index}/{total} ({progress}%)");
                }
                Ok(SessionEvent::LiveEmotion { index, dominant, trust }) => {
                    println!("    frame {index}: {} (trust {trust})", dominant.display_name());
                }
                Ok(SessionEvent::Completed { result }) => return Ok(Some(result)),
                Ok(SessionEvent::Cancelled) => return Ok(None),
                Ok(SessionEvent::Failed { reason }) => bail!("analysis failed: {reason}"),
                Ok(SessionEvent::StateChanged { status }) => info!("session is now {status:?}"),
                Err(RecvError::Lagged(skipped)) => warn!("skipped {skipped} session events"),
                Err(RecvError::Closed) => bail!("session event stream closed"),
            }
        }
    }
}

fn print_report(result: &AnalysisResult) {
    println!();
    println!("Trust: {}% ({})", result.trust_percentage, result.trust_level.label());
    println!("{}", result.trust_level.description());
    println!();
    println!("Emotions:");
    for (emotion, value) in result.emotions.ranked() {
        println!("  {:<10} {value:>5.1}%", emotion.display_name());
    }
    if !result.insights.strengths.is_empty() {
        println!("Positive factors:");
        for line in &result.insights.strengths {
            println!("  - {line}");
        }
    }
    if !result.insights.concerns.is_empty() {
        println!("Areas of attention:");
        for line in &result.insights.concerns {
            println!("  - {line}");
        }
    }
}

pub async fn train(state: &AppState, args: TrainArgs) -> Result<()> {
    let mut set = TrainingSet::new();
    let trustworthy = set
        .add_dir(&args.trustworthy, TrainingLabel::Trustworthy)
        .await?;
    let untrustworthy = set
        .add_dir(&args.untrustworthy, TrainingLabel::Untrustworthy)
        .await?;
    println!("Loaded {trustworthy} trustworthy and {untrustworthy} untrustworthy images");

    let report = state
        .session
        .train(&set, |percent| println!("  training {percent}%"))
        .await?;
    println!(
        "Training finished with {} samples at {}",
        report.samples,
        report.completed_at.to_rfc3339()
    );
    Ok(())
}
