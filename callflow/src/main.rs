//! callflow - call journey and insights viewer
//!
//! Reads calls from the call backend (or saved JSON responses) and prints
//! call lists, per-call timelines and escalation insights, and downloads
//! call recordings.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/callflow/config.toml (~/.config/callflow/config.toml)
//! - Logs: $XDG_STATE_HOME/callflow/callflow.log (~/.local/state/callflow/callflow.log)

mod render;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use callflow_core::insights::{
    collect_engagements, collect_escalations, recent_webhooks, Engagement, Escalation,
    WEBHOOK_FEED_LIMIT,
};
use callflow_core::{
    load_all_details, load_journey, recent_calls, CallSource, Config, DashboardStats,
    FileCallSource, HttpCallSource, WebhookEvent,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "callflow")]
#[command(about = "Inspect voice agent calls, their timelines and outcomes")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the most recent calls
    Calls {
        /// Number of calls to show (default: from config)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the timeline of a single call
    Journey {
        /// Call ID to fetch from the backend
        #[arg(required_unless_present = "details", conflicts_with = "details")]
        call_id: Option<String>,

        /// Read call details from a saved JSON file instead of the backend
        #[arg(long)]
        details: Option<PathBuf>,

        /// Transcript JSON file to pair with --details
        #[arg(long, requires = "details")]
        messages: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show escalation and engagement statistics across all calls
    Insights {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Download a call's audio recording
    Recording {
        /// Call ID whose recording to fetch
        call_id: String,

        /// File to write (default: recording-<CALL_ID>.wav)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show configuration and backend status
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging (to file, stdout is reserved for command output)
    let _log_guard =
        callflow_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::debug!("callflow starting up");

    match args.command {
        Command::Calls { limit, format } => cmd_calls(&config, limit, format),
        Command::Journey {
            call_id,
            details,
            messages,
            format,
        } => cmd_journey(&config, call_id, details, messages, format),
        Command::Insights { format } => cmd_insights(&config, format),
        Command::Recording { call_id, output } => cmd_recording(&config, &call_id, output),
        Command::Status => cmd_status(&config),
    }
}

fn http_source(config: &Config) -> Result<HttpCallSource> {
    HttpCallSource::new(config.api.clone()).context("failed to create API client")
}

fn cmd_calls(config: &Config, limit: Option<usize>, format: OutputFormat) -> Result<()> {
    let source = http_source(config)?;
    let calls = source
        .list_calls()
        .with_context(|| format!("failed to list calls from {}", source.base_url()))?;

    let limit = limit.unwrap_or(config.dashboard.recent_calls);
    let rows = recent_calls(&calls, limit, chrono::Utc::now());

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No calls found.");
            } else {
                print!("{}", render::calls_table(&rows)?);
                println!("\nShowing {} of {} call(s)", rows.len(), calls.len());
            }
        }
    }

    Ok(())
}

fn cmd_journey(
    config: &Config,
    call_id: Option<String>,
    details: Option<PathBuf>,
    messages: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let (source, call_id): (Box<dyn CallSource>, String) = match details {
        Some(details_path) => {
            let source = FileCallSource::open(&details_path, messages.as_deref())
                .with_context(|| format!("failed to read {}", details_path.display()))?;
            let call_id = source.call_id().to_string();
            (Box::new(source), call_id)
        }
        None => {
            let call_id = call_id.context("a call ID or --details is required")?;
            (Box::new(http_source(config)?), call_id)
        }
    };

    let journey = load_journey(source.as_ref(), &call_id, chrono::Utc::now())
        .with_context(|| format!("failed to load call {}", call_id))?;

    tracing::info!(call_id = %call_id, stages = journey.stage_count(), "Rendered journey");

    match format {
        OutputFormat::Json => print_json(&journey)?,
        OutputFormat::Text => print!("{}", render::journey(&journey, &config.timeline)?),
    }

    Ok(())
}

#[derive(Serialize)]
struct InsightsReport<'a> {
    stats: &'a DashboardStats,
    resolution_rate: u32,
    escalations: &'a [Escalation],
    engagements: &'a [Engagement],
    webhooks: &'a [WebhookEvent],
}

fn cmd_insights(config: &Config, format: OutputFormat) -> Result<()> {
    let source = http_source(config)?;
    let details = load_all_details(&source)
        .with_context(|| format!("failed to load calls from {}", source.base_url()))?;

    let stats = DashboardStats::from_details(&details);
    let escalations: Vec<_> = details
        .iter()
        .flat_map(|d| collect_escalations(&d.call.call_id, &d.tool_invocations))
        .collect();
    let engagements: Vec<_> = details
        .iter()
        .flat_map(|d| collect_engagements(&d.call.call_id, &d.tool_invocations))
        .collect();
    let webhooks = recent_webhooks(&details, WEBHOOK_FEED_LIMIT);

    match format {
        OutputFormat::Json => print_json(&InsightsReport {
            stats: &stats,
            resolution_rate: stats.resolution_rate(),
            escalations: &escalations,
            engagements: &engagements,
            webhooks: &webhooks,
        })?,
        OutputFormat::Text => print!(
            "{}",
            render::insights(&stats, &escalations, &engagements, &webhooks)?
        ),
    }

    Ok(())
}

fn cmd_recording(config: &Config, call_id: &str, output: Option<PathBuf>) -> Result<()> {
    let source = http_source(config)?;
    let audio = source
        .call_recording(call_id)
        .with_context(|| format!("failed to download recording for call {}", call_id))?;

    let path = output.unwrap_or_else(|| default_recording_path(call_id));
    std::fs::write(&path, &audio)
        .with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!(call_id, bytes = audio.len(), path = %path.display(), "Saved recording");
    println!("Saved {} bytes to {}", audio.len(), path.display());
    Ok(())
}

/// `recording-<id>.wav` in the current directory; path separators in the id
/// are replaced so the file always lands here.
fn default_recording_path(call_id: &str) -> PathBuf {
    let safe: String = call_id
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    Path::new(".").join(format!("recording-{}.wav", safe))
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("callflow status");
    println!("===============\n");

    println!("Config file: {}", Config::config_path().display());
    println!("Log file:    {}", callflow_core::logging::log_file_path().display());
    println!("API:         {}", config.api.base_url);
    println!(
        "First speaker (unlabeled transcripts): {}",
        config.timeline.first_speaker
    );

    let source = http_source(config)?;
    let reachable = source.health_check().unwrap_or(false);
    println!(
        "Backend:     {}",
        if reachable { "reachable" } else { "unreachable" }
    );

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_recording_path() {
        assert_eq!(
            default_recording_path("3f2a9c1e"),
            Path::new(".").join("recording-3f2a9c1e.wav")
        );
        assert_eq!(
            default_recording_path("../etc/x"),
            Path::new(".").join("recording-.._etc_x.wav")
        );
    }
}
