//! Sending through Bridge's SMTP server

use crate::client::ProtonClient;
use crate::compose::Draft;
use crate::error::{Error, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, info};

impl ProtonClient {
    /// Send a draft from the logged-in account.
    ///
    /// # Errors
    ///
    /// [`Error::Smtp`] for invalid addresses or when Bridge refuses the
    /// message.
    pub async fn send(&self, draft: &Draft) -> Result<()> {
        let config = self.config();
        let message = build_message(&config.username, draft)?;

        let tls = TlsParameters::builder(config.host.clone())
            .dangerous_accept_invalid_certs(true)
            .dangerous_accept_invalid_hostnames(true)
            .build_rustls()
            .map_err(|e| Error::Tls(e.to_string()))?;

        debug!("Connecting to SMTP server at {}:{}", config.host, config.smtp_port);
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.smtp_port)
            .tls(Tls::Required(tls))
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        transport
            .send(message)
            .await
            .map_err(|e| Error::Smtp(format!("Send failed: {e}")))?;

        info!("Sent \"{}\" to {} recipient(s)", draft.subject, recipient_count(draft));
        Ok(())
    }
}

const fn recipient_count(draft: &Draft) -> usize {
    draft.to.len() + draft.cc.len() + draft.bcc.len()
}

fn mailbox(addr: &str) -> Result<Mailbox> {
    addr.trim()
        .parse()
        .map_err(|e| Error::Smtp(format!("Invalid address {addr}: {e}")))
}

/// Turn a draft into a MIME message from `from`.
fn build_message(from: &str, draft: &Draft) -> Result<lettre::Message> {
    let mut builder = lettre::Message::builder()
        .from(mailbox(from)?)
        .subject(draft.subject.clone());

    for addr in &draft.to {
        builder = builder.to(mailbox(addr)?);
    }
    for addr in &draft.cc {
        builder = builder.cc(mailbox(addr)?);
    }
    for addr in &draft.bcc {
        builder = builder.bcc(mailbox(addr)?);
    }
    if let Some(id) = &draft.in_reply_to {
        builder = builder.in_reply_to(format!("<{}>", id.bare()));
    }
    if !draft.references.is_empty() {
        let refs: Vec<String> = draft
            .references
            .iter()
            .map(|r| format!("<{}>", r.bare()))
            .collect();
        builder = builder.references(refs.join(" "));
    }

    let body = if draft.html {
        SinglePart::html(draft.body.clone())
    } else {
        SinglePart::plain(draft.body.clone())
    };

    let message = if draft.attachments.is_empty() {
        builder.singlepart(body)
    } else {
        let mut parts = MultiPart::mixed().singlepart(body);
        for attachment in &draft.attachments {
            let content_type = ContentType::parse("application/octet-stream")
                .map_err(|e| Error::Smtp(e.to_string()))?;
            parts = parts.singlepart(
                Attachment::new(attachment.name.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }
        builder.multipart(parts)
    };

    message.map_err(|e| Error::Smtp(format!("Cannot build message: {e}")))
}
