//! Stream a short conversation to the terminal.
//!
//! Each command-line argument is sent as one user message; replies stream
//! in as they arrive. Pass `--buffered` to wait for whole replies instead.
//! Set RUST_LOG=debug to see request and stream events.
//!
//! Run with: MISTRAL_API_KEY=... cargo run --example chat -p mistral-chat -- "Hello" "Tell me more"

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, bail};
use mistral_chat::{ChatController, ChatObserver, ChatPhase};
use mistral_types::{ChatConfig, Model, Turn};
use tracing_subscriber::EnvFilter;

/// Prints the new tail of each cumulative update.
#[derive(Default)]
struct Printer {
    printed: AtomicUsize,
}

impl ChatObserver for Printer {
    fn on_turn_added(&self, turn: &Turn, is_user: bool) {
        if is_user {
            println!("\n> {}", turn.content);
        } else if turn.content.is_empty() {
            self.printed.store(0, Ordering::SeqCst);
        } else {
            println!("{}", turn.content);
        }
    }

    fn on_streaming_update(&self, content: &str) {
        let printed = self.printed.swap(content.len(), Ordering::SeqCst);
        if let Some(tail) = content.get(printed..) {
            print!("{tail}");
            let _ = std::io::stdout().flush();
        }
    }

    fn on_error(&self, message: &str) {
        eprintln!("\n[error] {message}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut streaming = true;
    let mut prompts = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--buffered" => streaming = false,
            _ => prompts.push(arg),
        }
    }
    if prompts.is_empty() {
        bail!("usage: chat [--buffered] <message>...");
    }

    let config = ChatConfig::from_env();
    config
        .api_key()
        .context("set MISTRAL_API_KEY to run this example")?;

    let controller = ChatController::http(config);
    controller.subscribe(Arc::new(Printer::default()));
    let mut phase = controller.watch_phase();

    for prompt in &prompts {
        controller.send(prompt, Model::MistralSmall, streaming).await;
        phase
            .wait_for(|p| *p == ChatPhase::Idle)
            .await
            .context("controller dropped")?;
        println!();
    }

    println!("\n({} turns in history)", controller.history_len());
    controller.dispose();
    Ok(())
}
