//! On-disk archive of each run.
//!
//! When an output directory is configured, every run leaves a dated folder
//! next to the email it sent:
//!
//! ```text
//! output_dir/
//! └── 2025-05-06/
//!     ├── digest.json
//!     ├── digest.html
//!     ├── digest.txt
//!     └── kids-digest-2025-05-06.mp3   # only when a podcast was produced
//! ```
//!
//! Archive failures are reported to the caller, which logs them; they never
//! stop the email from going out.

pub mod json;

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::Digest;
use crate::utils::ensure_writable_dir;

/// `<output_dir>/<YYYY-MM-DD>`
pub fn day_dir(output_dir: &str, digest: &Digest) -> PathBuf {
    Path::new(output_dir).join(digest.date.format("%Y-%m-%d").to_string())
}

/// Write the digest, both rendered bodies, and the MP3 if present.
///
/// # Arguments
///
/// * `output_dir` - Archive root; created if missing
/// * `digest` - The digest as sent
/// * `html` / `text` - The rendered email bodies
///
/// # Returns
///
/// The dated directory that was written.
///
/// # Output Path
///
/// Files go to `{output_dir}/{YYYY-MM-DD}/`. A rerun on the same day
/// overwrites them.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir, date = %digest.date))]
pub async fn write_archive(output_dir: &str, digest: &Digest, html: &str, text: &str) -> Result<PathBuf> {
    let dir = day_dir(output_dir, digest);
    ensure_writable_dir(&dir.to_string_lossy()).await?;

    json::write_digest(&dir, digest).await?;
    fs::write(dir.join("digest.html"), html).await?;
    fs::write(dir.join("digest.txt"), text).await?;
    if let Some(podcast) = &digest.podcast {
        fs::write(dir.join(&podcast.file_name), &podcast.audio).await?;
    }

    info!(dir = %dir.display(), podcast = digest.podcast.is_some(), "Archived digest");
    Ok(dir)
}
