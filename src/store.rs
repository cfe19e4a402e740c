//! The mailbox operations reference resolution and actions need
//!
//! [`ProtonClient`](crate::ProtonClient) implements this over Proton
//! Bridge. Tests implement it in memory.

use crate::error::Result;
use crate::label::Label;
use crate::message::{MessageId, MessageSummary};
use std::future::Future;

/// Mailbox state owned by the mail provider.
///
/// Every mutation takes the whole id set and is expected to act on it
/// in one call.
pub trait MailStore {
    /// The newest `min_count` inbox messages, newest first.
    ///
    /// Messages that cannot be parsed are not counted. May return fewer
    /// when the inbox is smaller.
    fn list_inbox(
        &self,
        min_count: usize,
    ) -> impl Future<Output = Result<Vec<MessageSummary>>> + Send;

    /// Add `label` to every message in `ids`.
    fn apply_label(
        &self,
        label: &Label,
        ids: &[MessageId],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove `label` from every message in `ids`.
    fn remove_label(
        &self,
        label: &Label,
        ids: &[MessageId],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Permanently delete every message in `ids`.
    fn delete_messages(&self, ids: &[MessageId]) -> impl Future<Output = Result<()>> + Send;

    /// Clear the read flag on every message in `ids`.
    fn mark_unread(&self, ids: &[MessageId]) -> impl Future<Output = Result<()>> + Send;
}
