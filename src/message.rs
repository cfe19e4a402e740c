//! Parsed messages
//!
//! Bridge hands out raw RFC 5322 messages; these types are what the
//! rest of the crate works with. Parsing goes through `mailparse`,
//! which takes care of RFC 2047 encoded words and transfer encodings.

use crate::error::{Error, Result};
use crate::render::strip_html;
use chrono::{DateTime, Utc};
use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail, SingleInfo};
use serde::Serialize;
use std::fmt;

/// Durable identifier of a message, taken from its `Message-ID`
/// header.
///
/// Unlike IMAP UIDs it does not change when the message moves between
/// labels. An id typed by the user is kept as given; [`bare`] is the
/// form used to look it up.
///
/// [`bare`]: MessageId::bare
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// An id as it appears in a `Message-ID`, `In-Reply-To` or
    /// `References` header, angle brackets dropped.
    #[must_use]
    pub fn from_header(value: &str) -> Self {
        Self(bare(value).to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id without surrounding whitespace or angle brackets.
    #[must_use]
    pub fn bare(&self) -> &str {
        bare(&self.0)
    }
}

fn bare(id: &str) -> &str {
    id.trim().trim_start_matches('<').trim_end_matches('>')
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A mailbox address with optional display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Address {
    pub name: Option<String>,
    pub address: String,
}

impl Address {
    /// The display name if there is one, the address otherwise.
    #[must_use]
    pub fn short(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

impl From<&SingleInfo> for Address {
    fn from(info: &SingleInfo) -> Self {
        Self {
            name: info
                .display_name
                .as_ref()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            address: info.addr.clone(),
        }
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    pub size: usize,
    #[serde(skip)]
    pub content: Vec<u8>,
}

/// One row of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSummary {
    pub id: MessageId,
    pub uid: u32,
    pub from: Address,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    pub size: usize,
    pub unread: bool,
}

/// A fully parsed message.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub uid: u32,
    pub from: Address,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub attachments: Vec<Attachment>,
    pub in_reply_to: Option<MessageId>,
    pub references: Vec<MessageId>,
    pub size: usize,
    pub unread: bool,
}

impl Message {
    /// Parse a raw RFC 5322 message fetched under `uid`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the MIME structure is invalid or the
    /// message has no `Message-ID`.
    pub fn parse(uid: u32, raw: &[u8], unread: bool) -> Result<Self> {
        let mail = mailparse::parse_mail(raw).map_err(|e| Error::Parse(e.to_string()))?;
        let headers = &mail.headers;

        let id = headers
            .get_first_value("Message-ID")
            .map(|v| MessageId::from_header(&v))
            .filter(|id| !id.as_str().is_empty())
            .ok_or_else(|| Error::Parse(format!("UID {uid} has no Message-ID")))?;

        let from = address_list(&mail, "From").into_iter().next().unwrap_or_default();
        let date = headers
            .get_first_value("Date")
            .and_then(|d| mailparse::dateparse(&d).ok())
            .and_then(|ts| DateTime::from_timestamp(ts, 0));

        let mut parts = Parts::default();
        parts.collect(&mail)?;

        Ok(Self {
            id,
            uid,
            from,
            to: address_list(&mail, "To"),
            cc: address_list(&mail, "Cc"),
            subject: headers.get_first_value("Subject").unwrap_or_default(),
            date,
            text_body: parts.text,
            html_body: parts.html,
            attachments: parts.attachments,
            in_reply_to: headers
                .get_first_value("In-Reply-To")
                .map(|v| MessageId::from_header(&v))
                .filter(|id| !id.as_str().is_empty()),
            references: headers
                .get_first_value("References")
                .map(|refs| refs.split_whitespace().map(MessageId::from_header).collect())
                .unwrap_or_default(),
            size: raw.len(),
            unread,
        })
    }

    /// The body as plain text, stripping HTML when that is all there is.
    #[must_use]
    pub fn body_text(&self) -> String {
        match (&self.text_body, &self.html_body) {
            (Some(text), _) => text.clone(),
            (None, Some(html)) => strip_html(html),
            (None, None) => String::new(),
        }
    }

    /// Root of the conversation this message belongs to.
    #[must_use]
    pub fn thread_root(&self) -> &MessageId {
        self.references.first().unwrap_or(&self.id)
    }

    #[must_use]
    pub fn summary(&self) -> MessageSummary {
        MessageSummary {
            id: self.id.clone(),
            uid: self.uid,
            from: self.from.clone(),
            subject: self.subject.clone(),
            date: self.date,
            size: self.size,
            unread: self.unread,
        }
    }
}

fn address_list(mail: &ParsedMail<'_>, header: &str) -> Vec<Address> {
    let Some(header) = mail.headers.get_first_header(header) else {
        return Vec::new();
    };
    let Ok(list) = mailparse::addrparse_header(header) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for addr in list.iter() {
        match addr {
            MailAddr::Single(info) => out.push(Address::from(info)),
            MailAddr::Group(group) => out.extend(group.addrs.iter().map(Address::from)),
        }
    }
    out
}

#[derive(Default)]
struct Parts {
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<Attachment>,
}

impl Parts {
    fn collect(&mut self, part: &ParsedMail<'_>) -> Result<()> {
        if !part.subparts.is_empty() {
            for sub in &part.subparts {
                self.collect(sub)?;
            }
            return Ok(());
        }

        let disposition = part.get_content_disposition();
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .cloned();

        if disposition.disposition == DispositionType::Attachment || filename.is_some() {
            let content = part
                .get_body_raw()
                .map_err(|e| Error::Parse(e.to_string()))?;
            let name = filename
                .unwrap_or_else(|| format!("attachment-{}", self.attachments.len() + 1));
            self.attachments.push(Attachment {
                name,
                content_type: part.ctype.mimetype.clone(),
                size: content.len(),
                content,
            });
            return Ok(());
        }

        let slot = match part.ctype.mimetype.as_str() {
            "text/plain" => &mut self.text,
            "text/html" => &mut self.html,
            _ => return Ok(()),
        };
        if slot.is_none() {
            *slot = Some(part.get_body().map_err(|e| Error::Parse(e.to_string()))?);
        }
        Ok(())
    }
}
