use crate::session::{Session, SessionMode};
use crate::upload::UploadRelay;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error};

/// Uploads the diagram, seeds the session, and runs the selected mode.
pub async fn run(
    session: &mut Session,
    relay: &UploadRelay,
    diagram: &Path,
    mime_type: &str,
) -> Result<()> {
    let bytes = tokio::fs::read(diagram)
        .await
        .with_context(|| format!("Failed to read diagram: {}", diagram.display()))?;
    let original_name = diagram
        .file_name()
        .and_then(|name| name.to_str())
        .context("Diagram path has no file name")?;

    let asset = relay
        .upload(original_name, mime_type, bytes)
        .await
        .context("Failed to upload diagram")?;
    println!("Uploaded file '{}' as: {}", asset.local_name, asset.remote_uri);

    session.seed(asset)?;

    match session.mode() {
        SessionMode::ScriptOnly => {
            let script = session
                .request_script()
                .await
                .context("Failed to generate the script")?;
            println!("\nAI: {}", script);
        }
        SessionMode::Chat => chat_loop(session).await?,
    }

    debug!(
        "Session ended in {:?} with {} turns",
        session.state(),
        session.transcript().len()
    );
    Ok(())
}

/// Reads messages line by line and prints each reply. A failed turn is shown
/// and the loop keeps running so the user can retry; `exit`, `quit`, or EOF
/// ends the session.
async fn chat_loop(session: &mut Session) -> Result<()> {
    println!("Diagram uploaded. Ask away (exit to quit).");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        match session.send_message(input).await {
            Ok(reply) => println!("AI: {}\n", reply),
            Err(e) => {
                error!("Chat turn failed: {}", e);
                println!("{}\n", e);
            }
        }
    }

    Ok(())
}
