use crate::types::TrackKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("invalid composition parameters: {0}")]
    Configuration(String),

    #[error("continuation worker failed for {track} track: {cause:#}")]
    Generative { track: TrackKind, cause: anyhow::Error },

    #[error("failed to write {track} track: {cause:#}")]
    Io { track: TrackKind, cause: anyhow::Error },
}
