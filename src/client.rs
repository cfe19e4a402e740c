//! Proton Mail client over Proton Bridge
//!
//! Every operation opens its own IMAP session, does its work and logs
//! out. Messages are addressed by their `Message-ID`; UIDs are looked
//! up in whichever mailbox the operation selects.

use crate::config::BridgeConfig;
use crate::connection::{ImapSession, connect, quote, select, uid_set};
use crate::error::{Error, Result};
use crate::flag::{Flag, StoreOp, store_query};
use crate::label::Label;
use crate::message::{Message, MessageId, MessageSummary};
use crate::store::MailStore;
use futures::TryStreamExt;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Message totals of one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: Label,
    pub total: u32,
    pub unread: usize,
}

/// One poll of the inbox.
#[derive(Debug, Clone)]
pub struct NewMail {
    pub messages: Vec<MessageSummary>,
    /// Past every UID the poll saw, including messages that could not
    /// be parsed.
    pub next_uid: u32,
}

/// IMAP/SMTP client for Proton Mail via Proton Bridge
pub struct ProtonClient {
    config: BridgeConfig,
}

/// UIDs found for a set of message ids in the selected mailbox.
struct Located {
    uids: Vec<u32>,
    missing: Vec<MessageId>,
}

impl Located {
    fn require_all(self) -> Result<Vec<u32>> {
        match self.missing.into_iter().next() {
            Some(id) => Err(Error::MessageNotFound(id.to_string())),
            None => Ok(self.uids),
        }
    }
}

impl ProtonClient {
    #[must_use]
    pub const fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Connect and log in once, to validate credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, STARTTLS or LOGIN fails.
    pub async fn check_login(&self) -> Result<()> {
        let mut session = connect(&self.config).await?;
        session.logout().await.ok();
        Ok(())
    }

    /// List all mailboxes Bridge exposes
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or LIST command fails.
    pub async fn list_labels(&self) -> Result<Vec<String>> {
        let mut session = connect(&self.config).await?;

        let names: Vec<_> = session
            .list(Some(""), Some("*"))
            .await
            .map_err(|e| Error::Imap(format!("List folders failed: {e}")))?
            .try_collect()
            .await
            .map_err(|e| Error::Imap(format!("List folders failed: {e}")))?;
        let names = names.iter().map(|n| n.name().to_string()).collect();

        session.logout().await.ok();
        Ok(names)
    }

    /// One page of a label, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, SELECT, SEARCH or FETCH
    /// fails.
    pub async fn list_folder(
        &self,
        label: &Label,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<MessageSummary>> {
        let mut session = connect(&self.config).await?;
        select(&mut session, label.mailbox()).await?;

        let mut uids = search(&mut session, "ALL").await?;
        uids.reverse();
        let skip = page.saturating_mul(page_size);
        let wanted = skip.saturating_add(page_size);

        // Unparsable messages are dropped by `fetch_messages`, so pages
        // count parsed messages and older UIDs fill the gaps.
        let mut listed = Vec::new();
        let mut remaining = uids.as_slice();
        while listed.len() < wanted && !remaining.is_empty() {
            let take = (wanted - listed.len()).min(remaining.len());
            let (batch, rest) = remaining.split_at(take);
            info!("Fetching {} messages from {}", batch.len(), label);
            let mut messages = fetch_messages(&mut session, batch).await?;
            messages.sort_by(|a, b| b.uid.cmp(&a.uid));
            listed.extend(messages);
            remaining = rest;
        }

        session.logout().await.ok();
        Ok(listed
            .iter()
            .skip(skip)
            .take(page_size)
            .map(Message::summary)
            .collect())
    }

    /// Fetch one message, wherever it is labelled
    ///
    /// Does not mark it as read.
    ///
    /// # Errors
    ///
    /// [`Error::MessageNotFound`] if no message has this id, otherwise
    /// connection or parsing failures.
    pub async fn fetch_message(&self, id: &MessageId) -> Result<Message> {
        let mut session = connect(&self.config).await?;
        select(&mut session, Label::AllMail.mailbox()).await?;

        let uids = locate(&mut session, std::slice::from_ref(id))
            .await?
            .require_all()?;
        let message = fetch_messages(&mut session, &uids)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::MessageNotFound(id.to_string()))?;

        session.logout().await.ok();
        Ok(message)
    }

    /// Every message of the conversation `id` belongs to, oldest first
    ///
    /// # Errors
    ///
    /// [`Error::MessageNotFound`] if no message has this id, otherwise
    /// connection or parsing failures.
    pub async fn fetch_thread(&self, id: &MessageId) -> Result<Vec<Message>> {
        let message = self.fetch_message(id).await?;
        let root = quote(&format!("<{}>", message.thread_root().bare()));

        let mut session = connect(&self.config).await?;
        select(&mut session, Label::AllMail.mailbox()).await?;

        let query = format!("OR HEADER Message-ID {root} HEADER References {root}");
        let mut uids = search(&mut session, &query).await?;
        if !uids.contains(&message.uid) {
            uids.push(message.uid);
        }

        let mut thread = fetch_messages(&mut session, &uids).await?;
        thread.sort_by(|a, b| a.date.cmp(&b.date).then(a.uid.cmp(&b.uid)));

        session.logout().await.ok();
        Ok(thread)
    }

    /// Set the read flag on every message in `ids`
    ///
    /// # Errors
    ///
    /// [`Error::MessageNotFound`] if any id is unknown, otherwise
    /// connection failures.
    pub async fn mark_read(&self, ids: &[MessageId]) -> Result<()> {
        self.store_flag(ids, StoreOp::Add, Flag::Seen).await
    }

    /// Total and unread counts of every system label
    ///
    /// Labels Bridge does not expose are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn counts(&self) -> Result<Vec<LabelCount>> {
        let mut session = connect(&self.config).await?;

        let mut counts = Vec::new();
        for label in Label::SYSTEM {
            let total = match session.select(label.mailbox()).await {
                Ok(mailbox) => mailbox.exists,
                Err(e) => {
                    debug!("Skipping {}: {}", label, e);
                    continue;
                }
            };
            let unread = search(&mut session, "UNSEEN").await?.len();
            counts.push(LabelCount {
                label,
                total,
                unread,
            });
        }

        session.logout().await.ok();
        Ok(counts)
    }

    /// The UID the next message to arrive in the inbox will get
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or SELECT fails.
    pub async fn inbox_uid_next(&self) -> Result<u32> {
        let mut session = connect(&self.config).await?;
        let uid_next = match select(&mut session, Label::Inbox.mailbox()).await? {
            Some(uid_next) => uid_next,
            None => search(&mut session, "ALL")
                .await?
                .last()
                .map_or(1, |uid| uid + 1),
        };

        session.logout().await.ok();
        Ok(uid_next)
    }

    /// Inbox messages with a UID of at least `uid`, oldest first, and
    /// the UID to poll from next
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, SELECT, SEARCH or FETCH
    /// fails.
    pub async fn fetch_inbox_since(&self, uid: u32) -> Result<NewMail> {
        let mut session = connect(&self.config).await?;
        select(&mut session, Label::Inbox.mailbox()).await?;

        // `n:*` always matches the newest message, even below `n`.
        let uids: Vec<u32> = search(&mut session, &format!("UID {uid}:*"))
            .await?
            .into_iter()
            .filter(|u| *u >= uid)
            .collect();

        let mut messages = fetch_messages(&mut session, &uids).await?;
        messages.sort_by_key(|m| m.uid);

        session.logout().await.ok();
        Ok(NewMail {
            messages: messages.iter().map(Message::summary).collect(),
            next_uid: poll_cursor(uid, &uids),
        })
    }

    async fn store_flag(&self, ids: &[MessageId], op: StoreOp, flag: Flag) -> Result<()> {
        let mut session = connect(&self.config).await?;
        select(&mut session, Label::AllMail.mailbox()).await?;

        let uids = locate(&mut session, ids).await?.require_all()?;
        store(&mut session, &uids, &store_query(op, flag)).await?;

        session.logout().await.ok();
        Ok(())
    }
}

impl MailStore for ProtonClient {
    async fn list_inbox(&self, min_count: usize) -> Result<Vec<MessageSummary>> {
        self.list_folder(&Label::Inbox, 0, min_count).await
    }

    async fn apply_label(&self, label: &Label, ids: &[MessageId]) -> Result<()> {
        let mut session = connect(&self.config).await?;
        select(&mut session, Label::AllMail.mailbox()).await?;

        let uids = locate(&mut session, ids).await?.require_all()?;
        debug!("Copying UIDs {:?} to {}", uids, label.mailbox());
        session
            .uid_copy(uid_set(&uids), quote(label.mailbox()))
            .await
            .map_err(|e| Error::Imap(format!("Failed to label as {label}: {e}")))?;

        session.logout().await.ok();
        Ok(())
    }

    async fn remove_label(&self, label: &Label, ids: &[MessageId]) -> Result<()> {
        let mut session = connect(&self.config).await?;
        select(&mut session, label.mailbox()).await?;

        let located = locate(&mut session, ids).await?;
        if !located.missing.is_empty() {
            debug!("{} message(s) not in {}", located.missing.len(), label);
        }
        if !located.uids.is_empty() {
            store(
                &mut session,
                &located.uids,
                &store_query(StoreOp::Add, Flag::Deleted),
            )
            .await?;
            expunge(&mut session).await?;
        }

        session.logout().await.ok();
        Ok(())
    }

    async fn delete_messages(&self, ids: &[MessageId]) -> Result<()> {
        let mut session = connect(&self.config).await?;
        select(&mut session, Label::AllMail.mailbox()).await?;

        let uids = locate(&mut session, ids).await?.require_all()?;
        store(&mut session, &uids, &store_query(StoreOp::Add, Flag::Deleted)).await?;
        expunge(&mut session).await?;

        session.logout().await.ok();
        Ok(())
    }

    async fn mark_unread(&self, ids: &[MessageId]) -> Result<()> {
        self.store_flag(ids, StoreOp::Remove, Flag::Seen).await
    }
}

// -- session helpers --

/// UID SEARCH, sorted ascending.
async fn search(session: &mut ImapSession, query: &str) -> Result<Vec<u32>> {
    let uids = session
        .uid_search(query)
        .await
        .map_err(|e| Error::Imap(format!("Search failed: {e}")))?;
    let mut uids: Vec<u32> = uids.into_iter().collect();
    uids.sort_unstable();
    Ok(uids)
}

/// Where to poll from after seeing `uids`, none of them below `since`.
fn poll_cursor(since: u32, uids: &[u32]) -> u32 {
    uids.iter()
        .max()
        .map_or(since, |uid| uid.saturating_add(1))
        .max(since)
}

/// Find the UIDs of `ids` in the selected mailbox.
async fn locate(session: &mut ImapSession, ids: &[MessageId]) -> Result<Located> {
    let mut uids = BTreeSet::new();
    let mut missing = Vec::new();

    for id in ids {
        let query = format!("HEADER Message-ID {}", quote(&format!("<{}>", id.bare())));
        let found = search(session, &query).await?;
        if found.is_empty() {
            missing.push(id.clone());
        }
        uids.extend(found);
    }

    Ok(Located {
        uids: uids.into_iter().collect(),
        missing,
    })
}

async fn fetch_messages(session: &mut ImapSession, uids: &[u32]) -> Result<Vec<Message>> {
    if uids.is_empty() {
        return Ok(Vec::new());
    }

    let fetches: Vec<_> = session
        .uid_fetch(uid_set(uids), "(UID FLAGS BODY.PEEK[])")
        .await
        .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?
        .try_collect()
        .await
        .map_err(|e| Error::Imap(format!("Fetch error: {e}")))?;

    let mut messages = Vec::with_capacity(fetches.len());
    for fetch in &fetches {
        let (Some(uid), Some(body)) = (fetch.uid, fetch.body()) else {
            continue;
        };
        let unread = !fetch
            .flags()
            .any(|f| matches!(f, async_imap::types::Flag::Seen));
        match Message::parse(uid, body, unread) {
            Ok(message) => messages.push(message),
            Err(e) => warn!("Skipping UID {}: {}", uid, e),
        }
    }

    Ok(messages)
}

async fn store(session: &mut ImapSession, uids: &[u32], query: &str) -> Result<()> {
    let _: Vec<_> = session
        .uid_store(uid_set(uids), query)
        .await
        .map_err(|e| Error::Imap(format!("Store failed: {e}")))?
        .try_collect()
        .await
        .map_err(|e| Error::Imap(format!("Store failed: {e}")))?;
    Ok(())
}

async fn expunge(session: &mut ImapSession) -> Result<()> {
    let _: Vec<_> = session
        .expunge()
        .await
        .map_err(|e| Error::Imap(format!("Expunge failed: {e}")))?
        .try_collect()
        .await
        .map_err(|e| Error::Imap(format!("Expunge failed: {e}")))?;
    Ok(())
}
