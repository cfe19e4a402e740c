//! In-process stand-in for Proton Bridge's IMAP side
//!
//! `server` accepts connections and dispatches commands, `handlers/`
//! builds the replies and `mailbox` holds the account with Bridge's
//! label rules.

mod server;

pub use mailbox::MailboxBuilder;
pub use server::FakeImapServer;
