mod ops;
mod rules;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use viralscore_core::{PlatformLink, SubmissionStatus};

#[derive(Debug, Parser)]
#[command(name = "viralscore-cli")]
#[command(about = "Viral score engine command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Score accepted on the command line; always within `0..=100`.
fn parse_score(s: &str) -> Result<u8, String> {
    let value: u8 = s
        .trim()
        .parse()
        .map_err(|_| format!("`{s}` is not a score between 0 and 100"))?;
    if value > viralscore_core::MAX_SCORE {
        return Err(format!("`{s}` is not a score between 0 and 100"));
    }
    Ok(value)
}

/// Previous score of an adjustment: a score, or `none` when the submission
/// had never been scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PreviousScore(Option<u8>);

fn parse_previous(s: &str) -> Result<PreviousScore, String> {
    if s.trim().eq_ignore_ascii_case("none") {
        return Ok(PreviousScore(None));
    }
    parse_score(s).map(|score| PreviousScore(Some(score)))
}

/// `platform=url`, e.g. `douyin=https://v.douyin.com/abc/`.
fn parse_link(s: &str) -> Result<PlatformLink, String> {
    let (platform, url) = s
        .split_once('=')
        .ok_or_else(|| format!("`{s}` is not in platform=url form"))?;
    let platform = platform.parse().map_err(|e| format!("{e}"))?;
    let url = url.trim();
    if url.is_empty() {
        return Err(format!("`{s}` has an empty url"));
    }
    Ok(PlatformLink::new(platform, url))
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the frame sampling strategy for a video duration
    Strategy {
        /// Video length in seconds
        #[arg(long)]
        duration: f64,
    },
    /// Compute the dedup fingerprint for a title and link set
    Fingerprint {
        #[arg(long)]
        title: String,
        /// Platform link as platform=url; repeat for several links
        #[arg(long = "link", value_parser = parse_link)]
        links: Vec<PlatformLink>,
    },
    /// Check a submission JSON file against the submission rules
    Validate {
        #[arg(long)]
        file: PathBuf,
        /// Platform URL pattern file (defaults to the built-in patterns)
        #[arg(long)]
        platforms: Option<PathBuf>,
    },
    /// Show the credits a viral score earns
    Reward {
        #[arg(long, value_parser = parse_score)]
        score: u8,
    },
    /// Preview the credit effect of an admin score adjustment
    AdjustPreview {
        /// Previous score, or `none`
        #[arg(long, value_parser = parse_previous)]
        previous: PreviousScore,
        #[arg(long = "new", value_parser = parse_score)]
        new_score: u8,
        /// Current credit balance of the creator
        #[arg(long, allow_hyphen_values = true)]
        balance: i64,
    },
    /// Evaluate the showcase gate
    Showcase {
        #[arg(long, value_parser = parse_score)]
        score: u8,
        /// The creator accepted the platform license
        #[arg(long)]
        license: bool,
        #[arg(long, default_value = "scored")]
        status: SubmissionStatus,
    },
    /// Run the scoring pipeline for a stored submission
    Score {
        #[arg(long)]
        id: i64,
        /// Re-run a submission that already has a result
        #[arg(long)]
        force: bool,
    },
    /// Overwrite a submission's score and settle credits with the ledger
    Adjust {
        #[arg(long)]
        id: i64,
        #[arg(long, allow_hyphen_values = true)]
        score: i64,
    },
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let fallback = std::env::var("VIRALSCORE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(fallback))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("viralscore-cli ready; run with --help for commands");
        return Ok(());
    };

    match command {
        Commands::Strategy { duration } => rules::strategy(duration)?,
        Commands::Fingerprint { title, links } => rules::fingerprint(&title, &links)?,
        Commands::Validate { file, platforms } => rules::validate(&file, platforms.as_deref())?,
        Commands::Reward { score } => rules::reward(score)?,
        Commands::AdjustPreview {
            previous,
            new_score,
            balance,
        } => rules::adjust_preview(previous.0, new_score, balance)?,
        Commands::Showcase {
            score,
            license,
            status,
        } => rules::showcase(score, license, status)?,
        Commands::Score { id, force } => ops::score(id, force).await?,
        Commands::Adjust { id, score } => ops::adjust(id, score).await?,
        Commands::Migrate => ops::migrate().await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests;
