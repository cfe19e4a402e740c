//! IMAP message flags touched by pmail
//!
//! Bridge maps a handful of IMAP system flags onto Proton state:
//! `\Seen` is the read state and `\Deleted` + EXPUNGE removes a
//! message from the selected label.

use std::fmt;

/// An IMAP system flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read (`\Seen`).
    Seen,
    /// Message is marked for removal (`\Deleted`).
    Deleted,
}

/// Whether a STORE adds or removes flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Add,
    Remove,
}

impl Flag {
    /// The IMAP wire representation of this flag.
    #[must_use]
    pub const fn as_imap_str(self) -> &'static str {
        match self {
            Self::Seen => "\\Seen",
            Self::Deleted => "\\Deleted",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}

/// Build the data item of a silent `UID STORE`.
///
/// ```
/// use pmail::flag::{store_query, Flag, StoreOp};
///
/// assert_eq!(store_query(StoreOp::Add, Flag::Seen), "+FLAGS.SILENT (\\Seen)");
/// ```
#[must_use]
pub fn store_query(op: StoreOp, flag: Flag) -> String {
    let sign = match op {
        StoreOp::Add => '+',
        StoreOp::Remove => '-',
    };
    format!("{sign}FLAGS.SILENT ({flag})")
}
