//! `mindshift run` — an interactive session in the terminal.

use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;

use mindshift::assist::CONTINUATION_LINE;
use mindshift::catalog::Modality;
use mindshift::config::MindshiftToml;
use mindshift::engine::context::SessionStatus;
use mindshift::engine::{InitializeRequest, ProcessRequest, SessionTurn};
use mindshift::errors::EngineError;
use mindshift::transcript::TranscriptWriter;

use super::build_engine;

pub async fn cmd_run(
    config: &MindshiftToml,
    modality: &str,
    script_mode: bool,
    user: Option<String>,
) -> Result<()> {
    let modality: Modality = modality.parse()?;
    let engine = build_engine(config)?;

    println!();
    println!(
        "  {} {}",
        style("Mind Shifting").cyan().bold(),
        style(format!("({})", modality)).dim()
    );
    println!(
        "  {}",
        style("Type /undo to take back your last answer, /quit to stop.").dim()
    );

    let mut request = InitializeRequest::new(modality).with_script_mode(script_mode);
    if let Some(user) = user {
        request = request.with_user_id(user);
    }
    let turn = engine.initialize(request).await?;
    let session_id = turn.context.session_id.clone();
    let mut can_continue = turn.processing_result.can_continue;
    speak(&turn.processing_result.scripted_response);

    while can_continue {
        let line: String = Input::new()
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")?;
        let input = line.trim();

        match input {
            "/quit" => {
                engine.cancel(&session_id).await?;
                println!("  {}", style("Session cancelled.").dim());
                break;
            }
            "/undo" => {
                match engine.undo(&session_id).await {
                    Ok(turn) => speak(&turn.processing_result.scripted_response),
                    Err(EngineError::NothingToUndo { .. }) => {
                        println!("  {}", style("Nothing to undo yet.").dim());
                    }
                    Err(err) => return Err(err.into()),
                }
                continue;
            }
            _ => {}
        }

        match engine
            .process(
                &session_id,
                ProcessRequest::new(input).with_script_mode(script_mode),
            )
            .await
        {
            Ok(turn) => {
                note_degradation(&turn);
                can_continue = turn.processing_result.can_continue;
                speak(&turn.processing_result.scripted_response);
            }
            // Collaborator failures never end the conversation.
            Err(EngineError::Catalog(err)) => {
                eprintln!("  {}", style(format!("({err})")).dim());
                speak(CONTINUATION_LINE);
            }
            Err(EngineError::Store(err)) => {
                eprintln!("  {}", style(format!("({err})")).dim());
                speak(CONTINUATION_LINE);
            }
            Err(err) => return Err(err.into()),
        }
    }

    let record = engine.session(&session_id).await?;
    if record.session.status == SessionStatus::Completed {
        println!("  {}", style("Session complete.").green().bold());
    }

    let writer = TranscriptWriter::new(config.transcripts_dir());
    match writer.write(&record) {
        Ok(path) => println!("  {}", style(format!("Transcript saved to {}", path.display())).dim()),
        Err(err) => eprintln!("  {}", style(format!("Could not save transcript: {err}")).dim()),
    }
    Ok(())
}

fn note_degradation(turn: &SessionTurn) {
    if turn.processing_result.persistence_degraded {
        eprintln!(
            "  {}",
            style("(saving is unavailable right now; the session continues in memory)").dim()
        );
    }
}

/// Print the guide's line, wrapped to the terminal.
fn speak(text: &str) {
    let width = terminal_size::terminal_size()
        .map(|(w, _)| (w.0 as usize).min(100))
        .unwrap_or(80);
    println!();
    println!("  {}", style("guide").cyan().bold());
    for line in textwrap::fill(text, width.saturating_sub(4)).lines() {
        println!("  {line}");
    }
    println!();
}
