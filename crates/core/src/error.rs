//! Error types for boot volume queries, boot configuration writes and reboot requests.
//!
//! Every failure here is reported at the transition boundary of the tray
//! session and never terminates the process. A cancelled confirmation is not
//! an error at all and is modelled as a plain `false`.

use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// Failure of a single external command invocation
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    /// The program ran but reported failure
    #[error("`{program}` exited with {status}")]
    Status { program: String, status: ExitStatus },
}

/// Listing boot volumes failed
#[derive(Debug, Error)]
pub enum DirectoryQueryError {
    #[error("volume listing unavailable: {0}")]
    Command(#[from] CommandError),
    #[error("malformed volume listing line {line_no}: {line:?}")]
    Malformed { line_no: usize, line: String },
    #[error("volume listing marks more than one volume active ({first} and {second})")]
    MultipleActive { first: usize, second: usize },
}

/// Changing the boot configuration failed
#[derive(Debug, Error)]
#[error("failed to change boot configuration: {0}")]
pub struct DirectoryWriteError(#[from] pub CommandError);

/// Requesting a system reboot failed
#[derive(Debug, Error)]
#[error("failed to request reboot: {0}")]
pub struct RebootRequestError(#[from] pub CommandError);
