//! Chat Relay Client - Entry Point
//!
//! Sends stdin lines as chat messages and prints whatever the relay sends
//! back. A line containing only `q` or `Q` logs out.

use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use chat_relay::{
    connect, logging, ChatMessage, JsonObserver, LogObserver, Notification, Observer, RelayError,
};

#[derive(Parser)]
#[command(name = "chat_relay_client")]
#[command(about = "TCP chat relay client")]
struct Cli {
    /// Relay host
    host: String,

    /// Relay port
    port: u16,

    /// Nickname to announce
    #[arg(short, long, default_value = "guest")]
    nick: String,

    /// Print messages as JSON lines on stdout
    #[arg(long)]
    json: bool,
}

/// What woke the client loop
enum Input {
    Received(Result<Option<ChatMessage>, RelayError>),
    Line(std::io::Result<Option<String>>),
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init("chat_relay=info,chat_relay_client=info");

    let cli = Cli::parse();
    let mut observer: Box<dyn Observer> = if cli.json {
        Box::new(JsonObserver::new(std::io::stdout()))
    } else {
        Box::new(LogObserver)
    };

    let (mut reader, mut writer) = match connect((cli.host.as_str(), cli.port), &cli.nick).await {
        Ok(halves) => halves,
        Err(e) => {
            error!("Failed to connect to {}:{}: {}", cli.host, cli.port, e);
            return ExitCode::FAILURE;
        }
    };
    info!("Connected to {}:{} as '{}'", cli.host, cli.port, writer.nickname());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let input = tokio::select! {
            received = reader.recv() => Input::Received(received),
            line = lines.next_line() => Input::Line(line),
        };

        match input {
            Input::Received(Ok(Some(msg))) => {
                observer.notify(&Notification::from_message(&msg, false));
            }
            Input::Received(Ok(None)) => {
                info!("Server closed the connection");
                return ExitCode::SUCCESS;
            }
            Input::Received(Err(e)) => {
                error!("Receive failed: {}", e);
                return ExitCode::FAILURE;
            }
            Input::Line(Ok(Some(line))) => {
                let line = line.trim_end();
                if line == "q" || line == "Q" {
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                match writer.send_chat(line).await {
                    Ok(msg) => observer.notify(&Notification::from_message(&msg, true)),
                    Err(e) => {
                        error!("Send failed: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            }
            // stdin closed
            Input::Line(Ok(None)) => break,
            Input::Line(Err(e)) => {
                error!("Failed to read input: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    if let Err(e) = writer.logout().await {
        error!("Logout failed: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
