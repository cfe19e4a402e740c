//! Batch actions on resolved messages

use crate::error::{Error, Result};
use crate::label::Label;
use crate::message::MessageId;
use crate::store::MailStore;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Something done to a set of messages in one go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MailboxAction {
    Delete,
    Archive,
    Spam,
    Star,
    Unread,
}

/// How an action maps onto store calls.
enum Plan {
    Delete,
    /// Apply `to`, then remove `from`.
    Move { to: Label, from: Label },
    Label(Label),
    Unread,
}

impl MailboxAction {
    const fn plan(self) -> Plan {
        match self {
            Self::Delete => Plan::Delete,
            Self::Archive => Plan::Move {
                to: Label::Archive,
                from: Label::Inbox,
            },
            Self::Spam => Plan::Move {
                to: Label::Spam,
                from: Label::Inbox,
            },
            Self::Star => Plan::Label(Label::Starred),
            Self::Unread => Plan::Unread,
        }
    }

    /// Past tense, for reporting.
    #[must_use]
    pub const fn done(self) -> &'static str {
        match self {
            Self::Delete => "Deleted",
            Self::Archive => "Archived",
            Self::Spam => "Marked as spam",
            Self::Star => "Starred",
            Self::Unread => "Marked as unread",
        }
    }

    /// Apply the action to every message in `ids` and return how many
    /// were acted on.
    ///
    /// Each store call covers the whole set. Nothing is retried.
    ///
    /// # Errors
    ///
    /// Store failures propagate unchanged, except when a move has
    /// applied its new label and then fails to remove the old one:
    /// that is reported as [`Error::PartialLabel`].
    pub async fn apply<S>(self, store: &S, ids: &[MessageId]) -> Result<usize>
    where
        S: MailStore + Sync,
    {
        if ids.is_empty() {
            return Ok(0);
        }

        match self.plan() {
            Plan::Delete => store.delete_messages(ids).await?,
            Plan::Label(label) => store.apply_label(&label, ids).await?,
            Plan::Unread => store.mark_unread(ids).await?,
            Plan::Move { to, from } => {
                store.apply_label(&to, ids).await?;
                if let Err(e) = store.remove_label(&from, ids).await {
                    warn!("{} applied but {} not removed: {}", to, from, e);
                    return Err(Error::PartialLabel {
                        applied: to,
                        not_removed: from,
                        count: ids.len(),
                        source: Box::new(e),
                    });
                }
            }
        }

        info!("{} {} message(s)", self.done(), ids.len());
        Ok(ids.len())
    }
}

impl fmt::Display for MailboxAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Delete => "delete",
            Self::Archive => "archive",
            Self::Spam => "spam",
            Self::Star => "star",
            Self::Unread => "unread",
        })
    }
}
