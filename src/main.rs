//! Ghost Relay - conversations between chat sites open in a browser
//!
//! Opens one tab per participant, waits for the operator to log in, then
//! runs the requested conversation and appends the transcript to disk.

mod channel;
mod config;
mod detector;
mod directive;
mod engine;
mod transcript;

use channel::BrowserHub;
use config::{Mode, RelayConfig, SessionRequest};
use engine::{ConversationOutcome, TurnEngine};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcript::FileLog;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ghost_relay=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false),
        )
        .init();

    let config = RelayConfig::from_env()?;
    tracing::info!(
        mode = %config.session.mode,
        participants = ?config.session.participants,
        rounds = config.session.rounds,
        log_dir = %config.log_dir.display(),
        "Starting relay"
    );

    let hub = BrowserHub::launch(&config.browser_data, config.headless).await?;
    let result = drive(&hub, &config).await;
    hub.close().await;
    result
}

async fn drive(hub: &BrowserHub, config: &RelayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log = Arc::new(FileLog::new(&config.log_dir));
    let mut engine = TurnEngine::new(log).with_settings(config.engine.clone());

    for name in &config.session.participants {
        let site = config.site(name);
        let channel = hub.open(&site).await?;
        engine.register(Arc::new(channel));
    }

    tracing::info!(participants = ?engine.participants(), "Channels ready");
    wait_for_operator().await?;
    run_session(&engine, &config.session).await;
    Ok(())
}

/// Sites need a logged-in session the relay cannot create itself
async fn wait_for_operator() -> std::io::Result<()> {
    tracing::info!("Log in to every opened site, then press Enter to start");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(())
}

async fn run_session(engine: &TurnEngine, session: &SessionRequest) {
    let names: Vec<&str> = session.participants.iter().map(String::as_str).collect();
    let prompt = session.prompt.as_deref();
    let starter = session.starter.as_deref();

    let outcome = match session.mode {
        Mode::Duo => match names.as_slice() {
            [a, b] => engine.start_duo(a, b, session.rounds, prompt, starter).await,
            _ => {
                tracing::error!(count = names.len(), "Duo mode needs exactly two participants");
                return;
            }
        },
        Mode::Smart => engine.start_smart(&names, session.rounds, prompt, starter).await,
        Mode::Broadcast => engine.start_broadcast(&names, session.rounds, prompt).await,
        Mode::Send => {
            let message = session.message.as_deref().unwrap_or_default();
            send(engine, &names, message).await;
            return;
        }
    };

    match outcome {
        ConversationOutcome::Completed { rounds } => {
            tracing::info!(rounds, "Conversation completed");
        }
        ConversationOutcome::Ended { by, rounds } => {
            tracing::info!(%by, rounds, "Conversation ended by participant");
        }
        ConversationOutcome::NoResponse { participant, rounds } => {
            tracing::warn!(%participant, rounds, "Conversation stopped: no response");
        }
        ConversationOutcome::SendFailed { participant, rounds } => {
            tracing::warn!(%participant, rounds, "Conversation stopped: could not send");
        }
        ConversationOutcome::Rejected(reason) => {
            tracing::error!(?reason, "Conversation did not start");
        }
    }
}

async fn send(engine: &TurnEngine, names: &[&str], message: &str) {
    if let [only] = names {
        if let Err(e) = engine.send_once(only, message).await {
            tracing::error!(participant = %only, error = %e, "Delivery failed");
        }
        return;
    }

    match engine.send_all(names, message).await {
        Ok(results) => {
            for (name, result) in results {
                if let Err(e) = result {
                    tracing::error!(participant = %name, error = %e, "Delivery failed");
                }
            }
        }
        Err(e) => tracing::error!(error = %e, "Send refused"),
    }
}
