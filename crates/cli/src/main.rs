//! Agentline console
//!
//! Headless harness around the client runtime: connects to an agent chat
//! endpoint, forwards stdin lines as user messages, and prints transcript
//! and action updates as they settle.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use agentline_client::{
    ActionStatus, AgentClient, ClientOptions, ReconnectPolicy, Role, TranscriptEntry,
};

#[derive(Parser, Debug)]
#[command(name = "agentline", about = "Console for an agent chat endpoint")]
struct Args {
    /// WebSocket endpoint of the agent stream
    #[arg(long, env = "AGENTLINE_URL", default_value = "ws://127.0.0.1:8000/ws/agent")]
    url: String,

    /// Initial reconnect delay in milliseconds
    #[arg(long, default_value_t = 500)]
    backoff_base_ms: u64,

    /// Reconnect delay cap in milliseconds
    #[arg(long, default_value_t = 30_000)]
    backoff_max_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Connecting to {}", args.url);

    let options = ClientOptions::new(args.url).with_reconnect(ReconnectPolicy {
        base: Duration::from_millis(args.backoff_base_ms),
        max: Duration::from_millis(args.backoff_max_ms),
    });
    let client = AgentClient::new(options).await;
    client.connect().await;

    // Surface connection state changes
    let mut state_rx = client.watch_connection();
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = *state_rx.borrow();
            info!("connection: {:?}", state);
        }
    });

    // Print entries once they stop streaming, and actions as they appear
    let mut revision_rx = client.subscribe();
    let printer = client.clone();
    tokio::spawn(async move {
        let mut printed_entries = 0usize;
        let mut printed_actions = 0usize;
        while revision_rx.changed().await.is_ok() {
            let snapshot = printer.snapshot();

            while printed_entries < snapshot.entries.len() {
                let entry = &snapshot.entries[printed_entries];
                if entry.is_streaming {
                    break;
                }
                print_entry(entry);
                printed_entries += 1;
            }

            if snapshot.actions.len() < printed_actions {
                println!("[actions] log cleared");
                printed_actions = 0;
            }
            for action in &snapshot.actions[printed_actions..] {
                let marker = match action.status {
                    ActionStatus::Active => "proposed",
                    ActionStatus::Removed => "removed",
                };
                println!("[action:{marker}] {} {}", action.name, action.args);
            }
            printed_actions = snapshot.actions.len();
        }
    });

    // stdin → send_user_text
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if let Err(err) = client.send_user_text(text).await {
            warn!("send failed: {err}");
        }
    }

    client.disconnect().await;
    Ok(())
}

fn print_entry(entry: &TranscriptEntry) {
    match entry.role {
        Role::User => println!("> {}", entry.content),
        Role::Assistant => println!("{}", entry.content),
        Role::Tool => {
            if let Some(call) = &entry.tool_call {
                match &call.output {
                    Some(output) => println!("[tool] {}: {}", call.name, output),
                    None => println!("[tool] {} (pending)", call.name),
                }
            }
        }
    }
}
