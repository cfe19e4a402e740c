//! Error types for pmail

use crate::label::Label;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Email parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Not logged in. Run: pmail login")]
    NotLoggedIn,

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// An inbox index beyond the fetched listing.
    #[error("Index {index} out of range (have {available} messages)")]
    IndexOutOfRange { index: usize, available: usize },

    /// The first half of a two-step move succeeded and the second did
    /// not: the messages now carry both labels.
    #[error(
        "{applied} applied to {count} message(s) but removing them from \
         {not_removed} failed, they are now in both: {source}"
    )]
    PartialLabel {
        applied: Label,
        not_removed: Label,
        count: usize,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
