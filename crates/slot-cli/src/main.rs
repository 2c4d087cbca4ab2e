//! `slotctl` — expand recurrences, generate slots, and check window overlaps
//! from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Dates of a weekly series (one ISO date per line)
//! slotctl expand --start 2024-06-01 --end 2024-06-22 --pattern weekly
//!
//! # Slots for a window definition (stdin → stdout, JSON)
//! echo '{"date":"2024-06-10","start_time":"09:00:00","end_time":"10:00:00","timezone":"America/New_York"}' \
//!   | slotctl slots
//!
//! # Same, file to file, skipping slot starts inside a DST gap
//! slotctl slots -i window.json -o slots.json --dst-policy skip
//!
//! # Would a candidate window overlap existing ones? (exit 2 if so)
//! slotctl check -i proposal.json
//! ```
//!
//! Log output goes to stderr and is controlled with `RUST_LOG` (default `warn`).

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::process;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use slot_engine::normalize::parse_timezone;
use slot_engine::slots::window_slot_times;
use slot_engine::{
    expand, find_conflicts, AvailabilityWindow, DstPolicy, EngineConfig, RecurrencePattern,
    WindowDefinition,
};

/// Exit status of `check` when the candidate overlaps an existing window.
const EXIT_CONFLICT: i32 = 2;

#[derive(Parser)]
#[command(
    name = "slotctl",
    version,
    about = "Availability window and appointment slot tooling"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dates of a recurrence, one per line
    Expand {
        /// First date of the series (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last date the series may reach (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        /// daily, weekly, or monthly; omit for a single date
        #[arg(long)]
        pattern: Option<RecurrencePattern>,
    },
    /// Generate the slots of a window definition as JSON
    Slots {
        /// Input file with a window definition (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// shift_forward or skip (defaults to SLOT_ENGINE_DST_POLICY)
        #[arg(long)]
        dst_policy: Option<DstPolicy>,
    },
    /// Check a candidate window against existing windows
    Check {
        /// Input file with `existing` and `candidate` (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
}

/// One generated slot as printed by `slots`.
#[derive(Debug, Serialize)]
struct SlotOutput {
    /// Local date in the window's timezone.
    date: NaiveDate,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CheckRequest {
    #[serde(default)]
    existing: Vec<WindowDefinition>,
    candidate: WindowDefinition,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env();

    match cli.command {
        Commands::Expand {
            start,
            end,
            pattern,
        } => {
            let expansion = expand(start, pattern, end).context("Failed to expand recurrence")?;
            let lines: String = expansion.iter().map(|d| format!("{}\n", d)).collect();
            write_output(None, &lines)?;
        }
        Commands::Slots {
            input,
            output,
            dst_policy,
        } => {
            let json = read_input(input.as_deref())?;
            let definition: WindowDefinition =
                serde_json::from_str(&json).context("Failed to parse window definition")?;
            let policy = dst_policy.unwrap_or(config.dst_policy);
            let slots = generate_slots(definition, policy, config.max_slots_per_window)?;
            let pretty = serde_json::to_string_pretty(&slots)?;
            write_output(output.as_deref(), &format!("{}\n", pretty))?;
        }
        Commands::Check { input } => {
            let json = read_input(input.as_deref())?;
            let request: CheckRequest =
                serde_json::from_str(&json).context("Failed to parse check request")?;
            let report = check_overlaps(request)?;
            if report.is_empty() {
                println!("no conflicts");
            } else {
                for line in &report {
                    println!("{}", line);
                }
                process::exit(EXIT_CONFLICT);
            }
        }
    }

    Ok(())
}

fn generate_slots(
    definition: WindowDefinition,
    policy: DstPolicy,
    max_slots: usize,
) -> Result<Vec<SlotOutput>> {
    definition.validate().context("Invalid window definition")?;
    let tz = parse_timezone(&definition.timezone)?;
    let window = AvailabilityWindow::new(Uuid::nil(), definition);
    let times = window_slot_times(&window, policy, max_slots).context("Failed to generate slots")?;
    debug!(slots = times.len(), policy = policy.as_str(), "generated slots");

    Ok(times
        .into_iter()
        .map(|t| SlotOutput {
            date: t.start.with_timezone(&tz).date_naive(),
            start: t.start,
            end: t.end,
        })
        .collect())
}

/// One line per conflict, naming the existing window by its position in the input.
fn check_overlaps(request: CheckRequest) -> Result<Vec<String>> {
    for (i, def) in request.existing.iter().enumerate() {
        def.validate()
            .with_context(|| format!("Invalid existing window at index {}", i))?;
    }
    request
        .candidate
        .validate()
        .context("Invalid candidate window")?;

    let provider = Uuid::nil();
    let existing: Vec<AvailabilityWindow> = request
        .existing
        .into_iter()
        .map(|def| AvailabilityWindow::new(provider, def))
        .collect();
    let candidate = AvailabilityWindow::new(provider, request.candidate);

    Ok(find_conflicts(&existing, &candidate)
        .into_iter()
        .map(|c| {
            let index = existing
                .iter()
                .position(|w| Some(w.id) == c.existing_window)
                .map_or_else(|| "?".to_string(), |i| i.to_string());
            format!(
                "conflict: existing[{}] on {} ({} min overlap)",
                index, c.date, c.overlap_minutes
            )
        })
        .collect())
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
