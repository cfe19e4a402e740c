//! UID SEARCH over the selected folder.
//!
//! Understands the keys pmail sends: `ALL`, `SEEN`/`UNSEEN`,
//! `HEADER name value` (case-insensitive substring, folded headers
//! joined), `UID set` and the `AND`/`OR`/`NOT` combinators. Any other
//! key matches everything.

use super::{Reply, in_set, selected};
use crate::fake_imap::mailbox::{Mailbox, TestEmail};
use imap_codec::imap_types::search::SearchKey;

pub fn uid_search(
    tag: &str,
    criteria: &[SearchKey<'_>],
    mailbox: &Mailbox,
    selection: Option<&str>,
) -> Reply {
    let folder = match selected(tag, mailbox, selection) {
        Ok(folder) => folder,
        Err(reply) => return reply,
    };

    let max_uid = folder.max_uid();
    let hits: String = folder
        .emails
        .iter()
        .filter(|e| criteria.iter().all(|key| matches_key(e, key, max_uid)))
        .map(|e| format!(" {}", e.uid))
        .collect();

    Reply::default()
        .line(&format!("* SEARCH{hits}"))
        .done(tag, "OK", "SEARCH completed")
}

/// Keys the client never sends match nothing.
fn matches_key(email: &TestEmail, key: &SearchKey<'_>, max_uid: u32) -> bool {
    match key {
        SearchKey::All => true,
        SearchKey::Unseen => !email.seen,
        SearchKey::Seen => email.seen,
        SearchKey::Header(name, value) => {
            let name = String::from_utf8_lossy(name.as_ref());
            let value = String::from_utf8_lossy(value.as_ref()).to_lowercase();
            header_values(&email.raw, &name)
                .iter()
                .any(|v| v.to_lowercase().contains(&value))
        }
        SearchKey::Uid(set) => in_set(email.uid, set, max_uid),
        SearchKey::And(keys) => keys.as_ref().iter().all(|k| matches_key(email, k, max_uid)),
        SearchKey::Or(a, b) => matches_key(email, a, max_uid) || matches_key(email, b, max_uid),
        SearchKey::Not(k) => !matches_key(email, k, max_uid),
        _ => false,
    }
}

/// All values of header `name` in a raw message, with folded lines
/// joined.
fn header_values(raw: &[u8], name: &str) -> Vec<String> {
    let text = String::from_utf8_lossy(raw);
    let mut headers: Vec<String> = Vec::new();

    for line in text.split("\r\n").flat_map(|l| l.split('\n')) {
        if line.is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            if let Some(last) = headers.last_mut() {
                last.push(' ');
                last.push_str(line.trim());
            }
        } else {
            headers.push(line.to_string());
        }
    }

    headers
        .iter()
        .filter_map(|h| h.split_once(':'))
        .filter(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::from_uid;
    use super::*;
    use crate::fake_imap::mailbox::MailboxBuilder;
    use imap_codec::imap_types::core::AString;

    fn make_raw_email(id: &str) -> Vec<u8> {
        format!(
            "From: a@b.com\r\n\
             Message-ID: <{id}>\r\n\
             References: <root@b.com>\r\n \
             <mid@b.com>\r\n\
             Subject: Test\r\n\
             \r\n\
             Body"
        )
        .into_bytes()
    }

    fn run(criteria: &[SearchKey<'_>], selection: Option<&str>) -> String {
        uid_search("A1", criteria, &inbox(), selection).text()
    }

    fn header<'a>(name: &'a str, value: &'a str) -> SearchKey<'a> {
        SearchKey::Header(
            AString::try_from(name).unwrap(),
            AString::try_from(value).unwrap(),
        )
    }

    fn inbox() -> Mailbox {
        MailboxBuilder::new()
            .folder("INBOX")
            .email(1, true, &make_raw_email("one@b.com"))
            .email(2, false, &make_raw_email("two@b.com"))
            .email(5, true, &make_raw_email("five@b.com"))
            .build()
    }

    #[test]
    fn all_and_unseen() {
        assert_eq!(
            run(&[SearchKey::All], Some("INBOX")),
            "* SEARCH 1 2 5\r\nA1 OK SEARCH completed\r\n"
        );
        assert!(run(&[SearchKey::Unseen], Some("INBOX")).starts_with("* SEARCH 2\r\n"));
    }

    #[test]
    fn header_matches_message_id() {
        let output = run(&[header("Message-ID", "<two@b.com>")], Some("INBOX"));
        assert!(output.starts_with("* SEARCH 2\r\n"));
    }

    #[test]
    fn header_match_ignores_case() {
        let output = run(&[header("message-id", "<FIVE@b.com>")], Some("INBOX"));
        assert!(output.starts_with("* SEARCH 5\r\n"));
    }

    #[test]
    fn header_matches_folded_lines() {
        let output = run(&[header("References", "<mid@b.com>")], Some("INBOX"));
        assert!(output.starts_with("* SEARCH 1 2 5\r\n"));
    }

    #[test]
    fn or_combines_keys() {
        let key = SearchKey::Or(
            Box::new(header("Message-ID", "<one@b.com>")),
            Box::new(header("Message-ID", "<five@b.com>")),
        );
        assert!(run(&[key], Some("INBOX")).starts_with("* SEARCH 1 5\r\n"));
    }

    #[test]
    fn uid_range_past_last_still_matches_last() {
        assert!(run(&[SearchKey::Uid(from_uid(2))], Some("INBOX")).starts_with("* SEARCH 2 5\r\n"));
        assert!(run(&[SearchKey::Uid(from_uid(9))], Some("INBOX")).starts_with("* SEARCH 5\r\n"));
    }

    #[test]
    fn no_match_is_a_bare_search() {
        let output = run(&[header("Message-ID", "<nope@b.com>")], Some("INBOX"));
        assert_eq!(output, "* SEARCH\r\nA1 OK SEARCH completed\r\n");
    }

    #[test]
    fn needs_a_selection() {
        assert_eq!(run(&[SearchKey::All], None), "A1 BAD No folder selected\r\n");
    }

    #[test]
    fn header_values_unfolds() {
        let raw = make_raw_email("x@b.com");
        assert_eq!(
            header_values(&raw, "references"),
            vec!["<root@b.com> <mid@b.com>"]
        );
        assert!(header_values(&raw, "Cc").is_empty());
    }
}
