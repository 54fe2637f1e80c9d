use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while tailing a source. A missing file is not one of
/// them: it reads as empty and tailing resumes when it reappears.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("tailing {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
