//! Line-oriented console commands.

use anyhow::{Context, bail};
use std::str::FromStr;
use std::time::Duration;

/// Default `read` length, one full status buffer.
pub const DEFAULT_READ_LEN: usize = 64;

/// Default `wait` bound in milliseconds.
pub const DEFAULT_WAIT_MS: u64 = 10_000;

/// One console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Inject one button press.
    Press,
    /// Read up to `n` bytes from the status channel.
    Read(usize),
    /// Write a payload into the status channel.
    Write(String),
    /// Print the readiness mask.
    Poll,
    /// Block until data arrives or the bound elapses, then read it.
    Wait(Duration),
    /// Print the feedback state and machine phase.
    State,
    /// Print statistics as JSON.
    Stats,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let line = line.trim();
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match verb {
            "press" | "p" => Self::Press,
            "read" | "r" => Self::Read(parse_or(rest, DEFAULT_READ_LEN, "read length")?),
            "write" | "w" => Self::Write(rest.to_string()),
            "poll" => Self::Poll,
            "wait" => {
                let ms = parse_or(rest, DEFAULT_WAIT_MS, "wait milliseconds")?;
                Self::Wait(Duration::from_millis(ms))
            }
            "state" | "s" => Self::State,
            "stats" => Self::Stats,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            "" => bail!("empty command"),
            other => bail!("unknown command '{other}' (try 'help')"),
        };
        Ok(command)
    }
}

fn parse_or<T: FromStr>(arg: &str, default: T, what: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if arg.is_empty() {
        return Ok(default);
    }
    arg.parse().with_context(|| format!("invalid {what}: '{arg}'"))
}

pub const HELP: &str = "\
commands:
  press            inject a button press
  read [n]         read up to n bytes (default 64)
  write <text>     overwrite the status buffer
  poll             print the readiness mask
  wait [ms]        block until data arrives (default 10000ms)
  state            print the feedback state
  stats            print counters as JSON
  quit             shut down";

/// Render channel bytes for the console.
pub fn render(data: &[u8]) -> String {
    if data.is_empty() {
        return "(empty)".to_string();
    }
    format!("{:?}", String::from_utf8_lossy(data))
}
