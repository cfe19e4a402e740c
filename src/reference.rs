//! Message references typed on the command line
//!
//! A reference is either a position in the most recent inbox listing
//! (`0` is the newest message) or a durable message id. Which one is
//! decided by shape alone: up to four ASCII digits is an index,
//! anything else is an id.

use crate::error::{Error, Result};
use crate::message::MessageId;
use crate::store::MailStore;
use tracing::debug;

/// Longest digit string still read as an inbox index.
pub const MAX_INDEX_DIGITS: usize = 4;

/// A parsed message reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRef {
    /// Position in the inbox listing, newest first.
    Index(usize),
    /// A message id, used as given.
    Id(MessageId),
}

impl MessageRef {
    /// Classify a raw reference.
    ///
    /// # Examples
    ///
    /// ```
    /// use pmail::MessageRef;
    ///
    /// assert_eq!(MessageRef::parse("3"), MessageRef::Index(3));
    /// assert!(matches!(MessageRef::parse("12345"), MessageRef::Id(_)));
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let looks_like_index = !raw.is_empty()
            && raw.len() <= MAX_INDEX_DIGITS
            && raw.bytes().all(|b| b.is_ascii_digit());

        match raw.parse() {
            Ok(index) if looks_like_index => Self::Index(index),
            _ => Self::Id(MessageId::new(raw)),
        }
    }

    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Id(_) => None,
        }
    }
}

/// Resolve references to message ids, in order and with duplicates
/// kept.
///
/// The inbox is listed at most once, and only when at least one
/// reference is an index; that single listing is sized to reach the
/// largest index.
///
/// # Errors
///
/// Returns [`Error::IndexOutOfRange`] if an index lies past the end of
/// the inbox, or whatever the store returns when listing fails.
pub async fn resolve_refs<S, R>(store: &S, raws: &[R]) -> Result<Vec<MessageId>>
where
    S: MailStore + Sync,
    R: AsRef<str> + Sync,
{
    let refs: Vec<MessageRef> = raws.iter().map(|r| MessageRef::parse(r.as_ref())).collect();

    let snapshot = match refs.iter().filter_map(MessageRef::index).max() {
        Some(max_index) => {
            debug!("Listing {} inbox messages to resolve indices", max_index + 1);
            store.list_inbox(max_index + 1).await?
        }
        None => Vec::new(),
    };

    refs.into_iter()
        .map(|r| match r {
            MessageRef::Id(id) => Ok(id),
            MessageRef::Index(index) => snapshot
                .get(index)
                .map(|summary| summary.id.clone())
                .ok_or(Error::IndexOutOfRange {
                    index,
                    available: snapshot.len(),
                }),
        })
        .collect()
}

/// Resolve a single reference.
///
/// # Errors
///
/// See [`resolve_refs`].
pub async fn resolve_ref<S>(store: &S, raw: &str) -> Result<MessageId>
where
    S: MailStore + Sync,
{
    let mut ids = resolve_refs(store, &[raw]).await?;
    ids.pop()
        .ok_or_else(|| Error::MessageNotFound(raw.to_string()))
}
