//! Outgoing messages: new mail, replies and forwards

use crate::error::Result;
use crate::message::{Attachment, Message, MessageId};
use serde::Serialize;
use std::fs;
use std::path::Path;

const FORWARD_RULE: &str = "---------- Forwarded message ----------";

/// A message ready to hand to [`ProtonClient::send`](crate::ProtonClient::send).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Draft {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Send `body` as `text/html` instead of `text/plain`.
    pub html: bool,
    pub attachments: Vec<Attachment>,
    pub in_reply_to: Option<MessageId>,
    pub references: Vec<MessageId>,
}

impl Draft {
    #[must_use]
    pub fn new(to: Vec<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to,
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Attach a file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn attach_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read(path)?;
        let name = path
            .file_name()
            .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());
        self.attachments.push(Attachment {
            name,
            content_type: "application/octet-stream".to_string(),
            size: content.len(),
            content,
        });
        Ok(())
    }

    /// Reply to `original`.
    ///
    /// The sender always gets the reply. With `reply_all`, the other
    /// `To` and `Cc` recipients do too, except any address in
    /// `own_addresses` (compared case-insensitively).
    #[must_use]
    pub fn reply(
        original: &Message,
        body: impl Into<String>,
        reply_all: bool,
        own_addresses: &[String],
    ) -> Self {
        let is_own = |addr: &str| own_addresses.iter().any(|own| own.eq_ignore_ascii_case(addr));

        let mut to = vec![original.from.address.clone()];
        let mut cc = Vec::new();
        if reply_all {
            to.extend(
                original
                    .to
                    .iter()
                    .filter(|a| !is_own(&a.address))
                    .map(|a| a.address.clone()),
            );
            cc.extend(
                original
                    .cc
                    .iter()
                    .filter(|a| !is_own(&a.address))
                    .map(|a| a.address.clone()),
            );
        }

        let subject = if original.subject.starts_with("Re:") {
            original.subject.clone()
        } else {
            format!("Re: {}", original.subject)
        };

        let mut references = original.references.clone();
        references.push(original.id.clone());

        Self {
            to,
            cc,
            subject,
            body: body.into(),
            in_reply_to: Some(original.id.clone()),
            references,
            ..Self::default()
        }
    }

    /// Forward `original` to `to`, optionally preceded by a note.
    #[must_use]
    pub fn forward(original: &Message, note: Option<&str>, to: Vec<String>) -> Self {
        let note = note
            .map(str::trim_end)
            .filter(|n| !n.trim().is_empty())
            .map_or_else(String::new, |n| format!("{n}\n\n"));
        let date = original.date.map_or_else(String::new, |d| d.to_rfc2822());
        let body = format!(
            "{note}{FORWARD_RULE}\nFrom: {}\nDate: {date}\nSubject: {}\n\n{}",
            original.from,
            original.subject,
            original.body_text()
        );

        Self {
            to,
            subject: format!("Fwd: {}", original.subject),
            body,
            ..Self::default()
        }
    }
}
