//! Proton Mail from the command line
//!
//! A client for Proton Mail through
//! [Proton Bridge](https://proton.me/mail/bridge): IMAP over STARTTLS
//! with self-signed certificate support for reading and organising
//! mail, SMTP for sending.
//!
//! Messages are addressed either by a durable [`MessageId`] or by their
//! position in the inbox listing. [`resolve_refs`] turns a batch of such
//! references into ids and [`MailboxAction::apply`] acts on them through
//! any [`MailStore`], of which [`ProtonClient`] is the Bridge-backed one.

mod action;
mod client;
mod compose;
mod config;
mod connection;
mod error;
pub mod flag;
mod label;
mod message;
mod reference;
pub mod render;
mod smtp;
mod store;

pub use action::MailboxAction;
pub use client::{LabelCount, NewMail, ProtonClient};
pub use compose::Draft;
pub use config::{BridgeConfig, Session, config_dir};
pub use error::{Error, Result};
pub use label::{Label, LabelKind};
pub use message::{Address, Attachment, Message, MessageId, MessageSummary};
pub use reference::{MessageRef, resolve_ref, resolve_refs};
pub use store::MailStore;
