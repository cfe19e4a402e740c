//! LIST: every folder, flat, with `/` as the hierarchy delimiter.

use super::Reply;
use crate::fake_imap::mailbox::Mailbox;

pub fn list(tag: &str, mailbox: &Mailbox) -> Reply {
    mailbox
        .folders
        .iter()
        .fold(Reply::default(), |reply, folder| {
            reply.line(&format!("* LIST (\\HasNoChildren) \"/\" \"{}\"", folder.name))
        })
        .done(tag, "OK", "LIST completed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;

    #[test]
    fn one_line_per_folder_in_order() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .folder("All Mail")
            .folder("Labels/Work")
            .build();

        assert_eq!(
            list("A1", &mailbox).text(),
            "* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n\
             * LIST (\\HasNoChildren) \"/\" \"All Mail\"\r\n\
             * LIST (\\HasNoChildren) \"/\" \"Labels/Work\"\r\n\
             A1 OK LIST completed\r\n"
        );
    }

    #[test]
    fn empty_account() {
        let mailbox = MailboxBuilder::new().build();
        assert_eq!(list("A1", &mailbox).text(), "A1 OK LIST completed\r\n");
    }
}
