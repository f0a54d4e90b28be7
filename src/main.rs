//! # Kids Digest
//!
//! A once-a-day job that emails a child a short digest: world news headlines,
//! popular English children's books, and Chinese children's books, with an
//! optional narrated MP3 of the same content.
//!
//! ## Features
//!
//! - News from any number of RSS feeds, filtered for age-appropriate topics
//! - English books from the Google Books volumes API
//! - Chinese books merged from library lists (KCLS BiblioCommons), official
//!   award pages, Open Library, and Google Books as a last resort, then
//!   filtered and ranked
//! - Optional podcast: a script from an OpenAI-compatible chat API (or a
//!   template), voiced by a speech API, attached as MP3
//! - Every failure degrades to a note in the email; the email always goes out
//!
//! ## Usage
//!
//! ```sh
//! kids_digest run --config ./digest.yaml --output-dir ./archive
//! ```
//!
//! ## Architecture
//!
//! 1. **Configuration**: settings file plus environment, validated once
//! 2. **Gathering**: news, English books, Chinese books (each best-effort)
//! 3. **Podcast**: script and audio (best-effort)
//! 4. **Output**: render HTML and text, archive, send one email

use chrono::{Local, Utc};
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod compose;
mod config;
mod error;
mod mail;
mod models;
mod outputs;
mod pipeline;
mod podcast;
mod rank;
mod sources;
mod utils;

use cli::{Cli, Command, RunArgs};
use config::{Config, Settings};
use error::DigestError;
use mail::{DryRunMailer, SmtpMailer};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("kids_digest starting up");

    let args = Cli::parse();
    let Command::Run(run_args) = args.command;
    debug!(?run_args, "Parsed CLI arguments");

    let result = run(&run_args).await;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    if let Err(e) = result {
        error!(error = %e, "Run failed");
        return Err(e.into());
    }
    Ok(())
}

async fn run(args: &RunArgs) -> Result<(), DigestError> {
    // Required settings abort here, before any network call.
    let settings = Settings::load(args.config.as_deref())?;
    let cfg = Config::from_settings(&settings, !args.dry_run)?;

    let client = sources::build_client()?;
    let now = Utc::now();
    let date = Local::now().date_naive();
    let output_dir = args.output_dir.as_deref();

    if args.dry_run {
        info!("Dry run: the email will be composed but not sent");
        pipeline::run(&client, &cfg, now, date, &DryRunMailer, output_dir).await?;
    } else {
        let smtp = cfg
            .smtp
            .as_ref()
            .ok_or_else(|| DigestError::Config("SMTP settings missing".into()))?;
        let mailer = SmtpMailer::new(smtp)?;
        pipeline::run(&client, &cfg, now, date, &mailer, output_dir).await?;
    }
    Ok(())
}
