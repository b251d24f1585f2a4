//! # kioskd
//!
//! Runs the feedback cycler on a simulated line bank and exposes the status
//! channel on the console.
//!
//! # Usage
//!
//! ```bash
//! # Defaults (button 17, lamps 22/23/24, buzzer 27, 5s cooldown)
//! kioskd
//!
//! # Config file and verbose logging
//! kioskd --config kiosk.toml --log-level debug
//! ```
//!
//! Logs go to stderr; command output goes to stdout.

mod command;

use anyhow::Context;
use clap::Parser;
use command::{Command, DEFAULT_READ_LEN, HELP, render};
use kiosk_feedback::{Cycler, CyclerConfig};
use kiosk_hardware::mock::{MockGpio, MockGpioHandle};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Kiosk feedback cycler daemon
#[derive(Parser, Debug)]
#[command(name = "kioskd")]
#[command(version)]
#[command(about = "Button-driven feedback cycler on a simulated line bank")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_tracing(&args.log_level);

    info!("kioskd v{} starting...", kiosk_core::VERSION);

    let config = match &args.config {
        Some(path) => CyclerConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => CyclerConfig::default(),
    };

    let (gpio, handle) = MockGpio::new();
    let cycler = Cycler::start(config, Arc::new(gpio)).context("failed to start cycler")?;
    let lines = spawn_stdin_reader()?;

    let result = tokio::select! {
        result = console(&cycler, &handle, lines) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
    };

    cycler.shutdown();
    result
}

fn setup_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Forward stdin lines from a dedicated thread.
///
/// A blocking stdin read cannot be cancelled, so it stays off the runtime;
/// the thread is left behind when the process exits.
fn spawn_stdin_reader() -> anyhow::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("stdin read failed: {e}");
                        break;
                    }
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}

async fn console(
    cycler: &Cycler,
    gpio: &MockGpioHandle,
    mut lines: mpsc::Receiver<String>,
) -> anyhow::Result<()> {
    let consumer = cycler.open();

    while let Some(line) = lines.recv().await {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                warn!("{e:#}");
                continue;
            }
        };

        match command {
            Command::Press => {
                gpio.press(cycler.config().button_line);
                println!("state {}", cycler.machine().state());
            }
            Command::Read(n) => println!("{}", render(&consumer.read(n))),
            Command::Write(text) => println!("accepted {}", consumer.write(text.as_bytes())),
            Command::Poll => println!("{:?}", consumer.poll_readiness()),
            Command::Wait(bound) => match consumer.read_timeout(DEFAULT_READ_LEN, bound).await {
                Ok(data) => println!("{}", render(&data)),
                Err(e) => println!("{e}"),
            },
            Command::State => {
                let machine = cycler.machine();
                println!("state {} ({})", machine.state(), machine.phase());
            }
            Command::Stats => println!("{}", serde_json::to_string(&cycler.stats())?),
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    Ok(())
}
