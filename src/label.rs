//! Proton Mail labels as exposed by Proton Bridge
//!
//! Every Proton label (system folder, user label or user folder) shows
//! up in Bridge as an IMAP mailbox. System labels have dedicated
//! variants; user labels live under `Labels/` and user folders under
//! `Folders/`, both represented by [`Label::Custom`].

use serde::Serialize;
use std::fmt;

/// A Proton Mail label, addressed through its Bridge mailbox.
///
/// # Examples
///
/// ```
/// use pmail::Label;
///
/// assert_eq!(Label::AllMail.mailbox(), "All Mail");
/// assert_eq!(Label::from_alias("all"), Label::AllMail);
/// assert_eq!(Label::from_alias("Labels/Work").mailbox(), "Labels/Work");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Label {
    Inbox,
    Drafts,
    Sent,
    Starred,
    Archive,
    /// Every message regardless of label.
    AllMail,
    Spam,
    Trash,
    /// A user label or folder, by full mailbox name.
    Custom(String),
}

/// What kind of label a Bridge mailbox name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    System,
    Label,
    Folder,
}

impl Label {
    /// System labels in the order they are listed to the user.
    pub const SYSTEM: [Self; 8] = [
        Self::Inbox,
        Self::Drafts,
        Self::Sent,
        Self::Starred,
        Self::Archive,
        Self::AllMail,
        Self::Spam,
        Self::Trash,
    ];

    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// Resolve a command-line folder argument.
    ///
    /// Accepts the short aliases `inbox`, `drafts`, `sent`, `starred`,
    /// `archive`, `all`, `spam` and `trash` in any case. Anything else
    /// is taken as a mailbox name.
    #[must_use]
    pub fn from_alias(alias: &str) -> Self {
        match alias.to_ascii_lowercase().as_str() {
            "inbox" => Self::Inbox,
            "drafts" => Self::Drafts,
            "sent" => Self::Sent,
            "starred" => Self::Starred,
            "archive" => Self::Archive,
            "all" | "all mail" => Self::AllMail,
            "spam" => Self::Spam,
            "trash" => Self::Trash,
            _ => Self::Custom(alias.to_string()),
        }
    }

    /// The IMAP mailbox Bridge exposes this label as.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        match self {
            Self::Inbox => "INBOX",
            Self::Drafts => "Drafts",
            Self::Sent => "Sent",
            Self::Starred => "Starred",
            Self::Archive => "Archive",
            Self::AllMail => "All Mail",
            Self::Spam => "Spam",
            Self::Trash => "Trash",
            Self::Custom(name) => name,
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Inbox => "Inbox",
            Self::Custom(name) => name
                .strip_prefix("Labels/")
                .or_else(|| name.strip_prefix("Folders/"))
                .unwrap_or(name),
            other => other.mailbox(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> LabelKind {
        match self {
            Self::Custom(name) if name.starts_with("Labels/") => LabelKind::Label,
            Self::Custom(_) => LabelKind::Folder,
            _ => LabelKind::System,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl From<&str> for Label {
    /// Map a mailbox name reported by Bridge back to a label.
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("inbox") {
            return Self::Inbox;
        }
        Self::SYSTEM
            .into_iter()
            .find(|label| label.mailbox() == s)
            .unwrap_or_else(|| Self::Custom(s.to_string()))
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}
