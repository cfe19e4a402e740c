//! UID FETCH: flags plus the whole message as a counted literal.
//!
//! ```text
//! * 2 FETCH (UID 7 FLAGS (\Seen) BODY[] {312}
//! <312 bytes>)
//! A4 OK FETCH completed
//! ```

use super::{Reply, selected, uids_in};
use crate::fake_imap::mailbox::Mailbox;
use imap_codec::imap_types::sequence::SequenceSet;

pub fn uid_fetch(
    tag: &str,
    set: &SequenceSet,
    mailbox: &Mailbox,
    selection: Option<&str>,
) -> Reply {
    let folder = match selected(tag, mailbox, selection) {
        Ok(folder) => folder,
        Err(reply) => return reply,
    };

    let wanted = uids_in(folder, set);
    let mut reply = Reply::default();
    for (i, email) in folder.emails.iter().enumerate() {
        if !wanted.contains(&email.uid) {
            continue;
        }
        let head = format!(
            "* {} FETCH (UID {} FLAGS ({}) BODY[]",
            i + 1,
            email.uid,
            email.flag_list()
        );
        reply = reply.literal(&head, &email.raw, ")");
    }
    reply.done(tag, "OK", "FETCH completed")
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{from_uid, raw, uids};
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;

    fn inbox() -> Mailbox {
        MailboxBuilder::new()
            .folder("INBOX")
            .email(3, true, &raw("three@b"))
            .email(8, false, &raw("eight@b"))
            .build()
    }

    #[test]
    fn body_flags_and_sequence_number() {
        let message = raw("eight@b");
        let text = uid_fetch("A1", &uids(&[8]), &inbox(), Some("INBOX")).text();

        let head = format!("* 2 FETCH (UID 8 FLAGS () BODY[] {{{}}}\r\n", message.len());
        assert!(text.starts_with(&head));
        assert!(text.contains("<eight@b>"));
        assert!(text.ends_with(")\r\nA1 OK FETCH completed\r\n"));
    }

    #[test]
    fn seen_flag_is_reported() {
        let text = uid_fetch("A1", &uids(&[3]), &inbox(), Some("INBOX")).text();
        assert!(text.contains("(UID 3 FLAGS (\\Seen) BODY[]"));
    }

    #[test]
    fn ranges_fetch_several() {
        let text = uid_fetch("A1", &from_uid(1), &inbox(), Some("INBOX")).text();
        assert_eq!(text.matches(" FETCH (UID ").count(), 2);
    }

    #[test]
    fn unknown_uids_are_skipped() {
        let text = uid_fetch("A1", &uids(&[99]), &inbox(), Some("INBOX")).text();
        assert_eq!(text, "A1 OK FETCH completed\r\n");
    }

    #[test]
    fn needs_a_selection() {
        let text = uid_fetch("A1", &uids(&[3]), &inbox(), None).text();
        assert_eq!(text, "A1 BAD No folder selected\r\n");
    }
}
