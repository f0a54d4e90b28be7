//! Narrated audio version of the digest.
//!
//! The script comes from the generative writer when one is configured and
//! returns something long enough; otherwise the templated script is used.
//! Only a speech failure fails the stage.

use tracing::{info, instrument, warn};

use crate::api::{ScriptWriter, SpeechSynth};
use crate::compose::{SCRIPT_SYSTEM_PROMPT, script_user_prompt, template_script};
use crate::error::Result;
use crate::models::{Digest, Podcast};

/// Shorter generated scripts are treated as failures.
pub const MIN_SCRIPT_CHARS: usize = 400;

pub fn file_name(digest: &Digest) -> String {
    format!("kids-digest-{}.mp3", digest.date.format("%Y-%m-%d"))
}

/// Generated script, or the template on error or when it is too short.
pub async fn write_script<W: ScriptWriter>(digest: &Digest, writer: Option<&W>) -> String {
    let Some(writer) = writer else {
        return template_script(digest);
    };

    match writer.write(SCRIPT_SYSTEM_PROMPT, &script_user_prompt(digest)).await {
        Ok(script) if script.chars().count() >= MIN_SCRIPT_CHARS => script,
        Ok(script) => {
            warn!(
                chars = script.chars().count(),
                min = MIN_SCRIPT_CHARS,
                "Generated script too short; using template"
            );
            template_script(digest)
        }
        Err(e) => {
            warn!(error = %e, "Script generation failed; using template");
            template_script(digest)
        }
    }
}

/// Write the script and synthesize it.
///
/// # Arguments
///
/// * `digest` - Source of the script and the file name date
/// * `writer` - Generative writer, or `None` for the templated script
/// * `synth` - Speech endpoint
///
/// # Returns
///
/// The MP3 podcast. Script problems never fail this call; a speech error does.
#[instrument(level = "info", skip_all, fields(date = %digest.date))]
pub async fn generate_podcast<W: ScriptWriter, S: SpeechSynth>(
    digest: &Digest,
    writer: Option<&W>,
    synth: &S,
) -> Result<Podcast> {
    let script = write_script(digest, writer).await;
    let audio = synth.synthesize(&script).await?;
    let podcast = Podcast {
        file_name: file_name(digest),
        script,
        audio,
    };
    info!(file = %podcast.file_name, bytes = podcast.audio.len(), "Podcast ready");
    Ok(podcast)
}
