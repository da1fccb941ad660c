//! Terminal consumer of a [`ClientSession`].
//!
//! Input is read on a blocking readline thread. The async loop polls the
//! session's queues on a fixed tick and prints whatever arrived.

use std::time::Duration;

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::{sync::mpsc, time};

use crate::{
    config::{ClientConfig, SessionConfig},
    formatter::MessageFormatter,
    session::{ClientSession, SessionEvents},
    status::StatusModel,
    ui::show,
};

/// How often the session queues are polled.
const TICK: Duration = Duration::from_millis(50);

/// Typing this line exits the client.
pub const QUIT_COMMAND: &str = "/quit";

/// Run the interactive client until the user quits
pub async fn run_client(
    config: ClientConfig,
    session_config: SessionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let username = config.username.clone();
    let (session, mut events) = ClientSession::with_room(
        config.endpoint(),
        username.as_str(),
        config.room.clone(),
        session_config,
    );

    println!(
        "\nYou are '{}'. Type messages and press Enter to send. Type {} or press Ctrl+C to exit.\n",
        username, QUIT_COMMAND
    );

    let mut input = spawn_input_thread(username.clone())?;

    // failures are reported on the queues and retried by the session
    if let Err(e) = session.connect().await {
        tracing::debug!("Initial connection failed: {}", e);
    }

    let mut status = StatusModel::default();
    let mut tick = time::interval(TICK);

    loop {
        tokio::select! {
            line = input.recv() => match line {
                Some(line) if line == QUIT_COMMAND => break,
                Some(line) => {
                    if status.is_connected() {
                        session.send_message(line);
                    } else {
                        show(&MessageFormatter::format_not_connected(), &username);
                    }
                }
                None => break,
            },
            _ = tick.tick() => drain_events(&mut events, &mut status, &username),
        }
    }

    session.close().await;
    tracing::info!("Client session ended");
    Ok(())
}

/// Print everything queued since the last tick.
fn drain_events(events: &mut SessionEvents, status: &mut StatusModel, username: &str) {
    while let Some(next) = events.try_next_status() {
        if status.apply(next) {
            show(&MessageFormatter::format_status(next), username);
        }
    }
    while let Some(error) = events.try_next_error() {
        show(&MessageFormatter::format_error(&error), username);
    }
    while let Some(envelope) = events.try_next_message() {
        show(&MessageFormatter::format_envelope(&envelope, username), username);
    }
}

/// Spawn a blocking thread for rustyline (synchronous readline)
fn spawn_input_thread(username: String) -> std::io::Result<mpsc::UnboundedReceiver<String>> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    std::thread::Builder::new()
        .name("readline".to_string())
        .spawn(move || {
            let mut rl = match DefaultEditor::new() {
                Ok(rl) => rl,
                Err(e) => {
                    tracing::error!("Failed to initialize readline: {}", e);
                    return;
                }
            };
            let prompt = format!("{}> ", username);

            loop {
                match rl.readline(&prompt) {
                    Ok(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                    Err(err) => {
                        tracing::error!("Readline error: {}", err);
                        break;
                    }
                }
            }
        })?;

    Ok(input_rx)
}
