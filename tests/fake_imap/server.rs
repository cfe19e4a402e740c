//! Listener, STARTTLS upgrade and command dispatch
//!
//! Bridge only speaks IMAP after STARTTLS, so a connection goes
//! greeting, `STARTTLS`, TLS handshake, then one command per line
//! until LOGOUT. Each command is parsed with imap-codec and answered
//! while holding the account lock. The lock is released before the
//! reply is written.

use super::handlers::{self, Reply, StoreArgs};
use super::mailbox::Mailbox;
use imap_codec::CommandCodec;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

/// A fake Proton Bridge IMAP endpoint on `127.0.0.1` and a free port.
///
/// Stops accepting connections when dropped.
pub struct FakeImapServer {
    port: u16,
    mailbox: Arc<Mutex<Mailbox>>,
    accept_loop: JoinHandle<()>,
}

impl FakeImapServer {
    pub async fn start(mailbox: Mailbox) -> Self {
        // Every test installs it; only the first call succeeds.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().expect("local address").port();

        let acceptor = self_signed_acceptor();
        let mailbox = Arc::new(Mutex::new(mailbox));
        let shared = Arc::clone(&mailbox);

        let accept_loop = tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let mailbox = Arc::clone(&shared);
                tokio::spawn(async move {
                    let _ = serve(tcp, acceptor, &mailbox).await;
                });
            }
        });

        Self {
            port,
            mailbox,
            accept_loop,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// A copy of the account as it is now.
    #[allow(dead_code)]
    pub fn snapshot(&self) -> Mailbox {
        self.mailbox.lock().unwrap().clone()
    }

    /// Drop a new unseen message into `folder` and return its UID.
    #[allow(dead_code)]
    pub fn deliver(&self, folder: &str, raw: &[u8]) -> u32 {
        self.mailbox
            .lock()
            .unwrap()
            .deliver(folder, raw)
            .expect("deliver to an existing folder")
    }
}

impl Drop for FakeImapServer {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

/// TLS acceptor with a fresh certificate for `127.0.0.1`.
fn self_signed_acceptor() -> TlsAcceptor {
    let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
        .expect("generate self-signed cert");
    let key = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert.cert.der().clone()], key.into())
        .expect("build server TLS config");
    TlsAcceptor::from(Arc::new(config))
}

/// Run one connection: plaintext greeting and STARTTLS, then the
/// command loop over TLS.
async fn serve(tcp: TcpStream, acceptor: TlsAcceptor, mailbox: &Mutex<Mailbox>) -> io::Result<()> {
    let mut plain = BufReader::new(tcp);
    send(&mut plain, b"* OK IMAP4rev1 Fake Bridge ready\r\n").await?;

    let mut line = String::new();
    plain.read_line(&mut line).await?;
    let (tag, command) = line.trim().split_once(' ').unwrap_or(("*", ""));
    if !command.eq_ignore_ascii_case("STARTTLS") {
        let reply = Reply::default().done(tag, "BAD", "STARTTLS first");
        return send(&mut plain, &reply.into_bytes()).await;
    }
    let reply = Reply::default().done(tag, "OK", "Begin TLS negotiation now");
    send(&mut plain, &reply.into_bytes()).await?;

    let tls = acceptor.accept(plain.into_inner()).await?;
    Session {
        stream: BufReader::new(tls),
        mailbox,
        selected: None,
    }
    .run()
    .await
}

async fn send<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut BufReader<S>, bytes: &[u8]) -> io::Result<()> {
    stream.get_mut().write_all(bytes).await?;
    stream.get_mut().flush().await
}

/// The authenticated part of a connection.
struct Session<'a, S> {
    stream: BufReader<S>,
    mailbox: &'a Mutex<Mailbox>,
    selected: Option<String>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<'_, S> {
    async fn run(mut self) -> io::Result<()> {
        let codec = CommandCodec::default();
        loop {
            let mut line = String::new();
            if self.stream.read_line(&mut line).await? == 0 {
                return Ok(());
            }
            if line.trim().is_empty() {
                continue;
            }

            let (reply, closing) = match codec.decode(line.as_bytes()) {
                Ok((_, command)) => self.respond(command.tag.inner(), command.body),
                Err(_) => {
                    let tag = line.split_whitespace().next().unwrap_or("*");
                    (Reply::default().done(tag, "BAD", "Parse error"), false)
                }
            };
            send(&mut self.stream, &reply.into_bytes()).await?;
            if closing {
                return Ok(());
            }
        }
    }

    /// Answer one command. The flag is set once the client has logged
    /// out.
    fn respond(&mut self, tag: &str, body: CommandBody<'_>) -> (Reply, bool) {
        let state: &Mutex<Mailbox> = self.mailbox;
        let mut mailbox = state.lock().unwrap();
        let selection = self.selected.clone();
        let selection = selection.as_deref();

        let reply = match body {
            CommandBody::Capability => Reply::default()
                .line("* CAPABILITY IMAP4rev1")
                .done(tag, "OK", "CAPABILITY completed"),
            CommandBody::Noop => Reply::default().done(tag, "OK", "NOOP completed"),
            // Any credentials are accepted.
            CommandBody::Login { .. } => Reply::default().done(tag, "OK", "LOGIN completed"),
            CommandBody::Logout => {
                let reply = Reply::default()
                    .line("* BYE Fake Bridge logging out")
                    .done(tag, "OK", "LOGOUT completed");
                return (reply, true);
            }
            CommandBody::List { .. } => handlers::list(tag, &mailbox),
            CommandBody::Select { mailbox: name, .. } => {
                let (reply, selected) = handlers::select(tag, &folder_name(&name), &mailbox);
                self.selected = selected;
                reply
            }
            CommandBody::Search {
                criteria,
                uid: true,
                ..
            } => handlers::uid_search(tag, criteria.as_ref(), &mailbox, selection),
            CommandBody::Fetch {
                sequence_set,
                uid: true,
                ..
            } => handlers::uid_fetch(tag, &sequence_set, &mailbox, selection),
            CommandBody::Store {
                sequence_set,
                kind,
                response,
                flags,
                uid: true,
                ..
            } => {
                let args = StoreArgs {
                    sequence_set: &sequence_set,
                    kind: &kind,
                    response: &response,
                    flags: &flags,
                };
                handlers::uid_store(tag, &args, &mut mailbox, selection)
            }
            CommandBody::Copy {
                sequence_set,
                mailbox: dest,
                uid: true,
            } => handlers::uid_copy(
                tag,
                &sequence_set,
                &folder_name(&dest),
                &mut mailbox,
                selection,
            ),
            CommandBody::Expunge => handlers::expunge(tag, &mut mailbox, selection),
            _ => Reply::default().done(tag, "BAD", "Not supported by the fake server"),
        };
        (reply, false)
    }
}

fn folder_name(mailbox: &ImapMailbox<'_>) -> String {
    match mailbox {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => String::from_utf8_lossy(other.as_ref()).into_owned(),
    }
}
