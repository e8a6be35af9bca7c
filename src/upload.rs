//! Lazily sending a clip when someone presses its "Upload Clip" button

use crate::{
    action::{parse_token, ActionId, CustomId},
    log_error, log_internal, log_warn,
    replay::megabytes,
};
use anyhow::Result;
use serenity::all::UserId;
use std::path::{Path, PathBuf};

const NOT_FOUND: &str = "File not found!";
const TOO_LARGE: &str = "File is too large to send!";
const FAILED: &str = "An error occurred while sending the file.";

/// An upload button, resolved back to the file it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAffordance {
    pub path: PathBuf,
    /// Sent along with the file
    pub message: String,
    /// The only user allowed to trigger the upload
    pub authorized: UserId,
}

impl UploadAffordance {
    /// Rebuild the affordance behind a pressed button.
    pub fn from_custom_id(
        custom_id: &str,
        message: &str,
        clips_dir: &Path,
        authorized: UserId,
    ) -> Option<Self> {
        let custom_id = CustomId::parse(custom_id)?;
        if custom_id.action != ActionId::UploadClip {
            return None;
        }
        let file_name = parse_token(custom_id.token)?;

        Some(Self {
            path: clips_dir.join(file_name),
            message: message.to_owned(),
            authorized,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("payload too large")]
    PayloadTooLarge,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serenity::Error> for TransportError {
    fn from(e: serenity::Error) -> Self {
        use serenity::http::HttpError;

        let too_large = matches!(
            &e,
            serenity::Error::Http(HttpError::UnsuccessfulRequest(response))
                if response.status_code.as_u16() == 413
        );

        if too_large {
            TransportError::PayloadTooLarge
        } else {
            TransportError::Other(e.into())
        }
    }
}

/// Where an upload's replies go.  For a button press this is the interaction's follow-ups.
#[serenity::async_trait]
pub trait UploadTransport: Sync {
    /// Acknowledge the press.  Sending a file can take longer than Discord waits for a response.
    async fn acknowledge(&self) -> Result<()>;
    /// Post `content` with the file attached, visible to everyone.
    async fn send_file(&self, content: &str, path: &Path) -> Result<(), TransportError>;
    /// Tell only the caller.
    async fn reply_private(&self, content: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Sent,
    /// Someone else pressed the button.  Nobody is told.
    Unauthorized,
    NotFound,
    TooLarge,
}

/// Send the affordance's file on behalf of `caller`.  Failures other than a missing or oversized
/// file are reported to the caller and then returned.
pub async fn upload(
    affordance: &UploadAffordance,
    caller: UserId,
    transport: &impl UploadTransport,
) -> Result<UploadOutcome> {
    if caller != affordance.authorized {
        return Ok(UploadOutcome::Unauthorized);
    }

    transport.acknowledge().await?;
    log_internal!("Uploading clip `{}`", affordance.path.to_string_lossy());

    if !tokio::fs::try_exists(&affordance.path).await.unwrap_or(false) {
        log_warn!("File not found: `{}`", affordance.path.to_string_lossy());
        transport.reply_private(NOT_FOUND).await?;
        return Ok(UploadOutcome::NotFound);
    }

    match transport
        .send_file(&affordance.message, &affordance.path)
        .await
    {
        Ok(()) => {
            log_internal!("Uploaded clip `{}`", affordance.path.to_string_lossy());
            Ok(UploadOutcome::Sent)
        }
        Err(TransportError::PayloadTooLarge) => {
            let size = tokio::fs::metadata(&affordance.path)
                .await
                .map(|m| megabytes(m.len()))
                .unwrap_or_default();
            log_error!(
                "File too large: `{}` ({} MB)",
                affordance.path.to_string_lossy(),
                size
            );
            transport.reply_private(TOO_LARGE).await?;
            Ok(UploadOutcome::TooLarge)
        }
        Err(TransportError::Other(e)) => {
            // The caller hears about it either way, even if the private reply fails too
            if let Err(reply_err) = transport.reply_private(FAILED).await {
                log_error!("Could not report failed upload: {}", reply_err);
            }
            Err(e.context(format!(
                "Could not upload `{}`",
                affordance.path.to_string_lossy()
            )))
        }
    }
}
