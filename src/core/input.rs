//! Where the text to evaluate comes from.
//!
//! Exactly one source is used per invocation. Precedence when several are
//! given: positional argument, then `--file`, then piped standard input.

use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::InputError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Argument(String),
    File(PathBuf),
    Stdin,
}

impl InputSource {
    /// Choose the source. Stdin is only used when it is not a terminal.
    pub fn select(
        argument: Option<String>,
        file: Option<PathBuf>,
        stdin_is_terminal: bool,
    ) -> Result<Self, InputError> {
        match (argument, file) {
            (Some(text), file) => {
                if let Some(file) = file {
                    log::warn!("Both TEXT and --file given; ignoring {:?}", file);
                }
                Ok(Self::Argument(text))
            }
            (None, Some(path)) => Ok(Self::File(path)),
            (None, None) if !stdin_is_terminal => Ok(Self::Stdin),
            (None, None) => Err(InputError::NoInput),
        }
    }

    pub async fn read(self) -> Result<String, InputError> {
        match self {
            Self::Argument(text) => Ok(text),
            Self::File(path) => tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| InputError::UnreadableFile { path, source }),
            Self::Stdin => read_piped(tokio::io::stdin()).await,
        }
    }
}

/// Read all of a piped stream. Blank input is an error since there is no fallback.
pub async fn read_piped<R: AsyncRead + Unpin>(mut reader: R) -> Result<String, InputError> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .await
        .map_err(InputError::Stdin)?;
    if content.trim().is_empty() {
        return Err(InputError::EmptyStdin);
    }
    Ok(content)
}

/// Non-blank lines of a batch input, with line endings stripped.
pub fn batch_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
}
