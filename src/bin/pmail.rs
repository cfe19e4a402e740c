#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for Proton Mail via Proton Bridge

use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use pmail::render::{format_size, format_timestamp, strip_html, truncate};
use pmail::{
    BridgeConfig, Draft, Label, LabelKind, MailboxAction, Message, MessageSummary, ProtonClient,
    Session, config_dir, resolve_ref, resolve_refs,
};
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pmail")]
#[command(about = "Proton Mail from the command line, via Proton Bridge")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

/// One or more message references: an inbox index from `pmail ls` or a
/// message id.
#[derive(ClapArgs)]
struct Refs {
    #[arg(required = true)]
    refs: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Save Bridge credentials
    Login {
        /// Bridge username (your Proton address)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Forget the saved credentials
    Logout,

    /// Show the account in use
    Whoami,

    /// List messages
    Ls {
        /// inbox, drafts, sent, starred, archive, all, spam, trash or a
        /// mailbox name such as Labels/Work
        #[arg(default_value = "inbox")]
        folder: String,

        /// Number of messages to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Page number, starting at 0
        #[arg(short, long, default_value = "0")]
        page: usize,
    },

    /// Read a message
    Read {
        /// Inbox index or message id
        message_ref: String,

        /// Show the raw HTML body
        #[arg(long)]
        html: bool,

        /// Leave the message unread
        #[arg(long)]
        no_mark_read: bool,
    },

    /// Read every message of a conversation
    Thread {
        /// Inbox index or message id of any message in the thread
        message_ref: String,
    },

    /// Send a message
    Send {
        /// Recipient(s)
        #[arg(short, long, required = true)]
        to: Vec<String>,

        /// CC recipient(s)
        #[arg(long)]
        cc: Vec<String>,

        /// BCC recipient(s)
        #[arg(long)]
        bcc: Vec<String>,

        #[arg(short, long)]
        subject: String,

        /// Message body; read from stdin when omitted
        #[arg(short, long)]
        body: Option<String>,

        /// Send the body as HTML
        #[arg(long)]
        html: bool,

        /// File(s) to attach
        #[arg(short, long)]
        attach: Vec<PathBuf>,
    },

    /// Reply to a message
    Reply {
        message_ref: String,

        /// Reply body; read from stdin when omitted
        #[arg(short, long)]
        body: Option<String>,

        /// Reply to every recipient
        #[arg(long)]
        all: bool,
    },

    /// Forward a message
    Forward {
        message_ref: String,

        /// Recipient(s)
        #[arg(short, long, required = true)]
        to: Vec<String>,

        /// Note above the forwarded message
        #[arg(short, long)]
        body: Option<String>,
    },

    /// Delete message(s)
    Delete(Refs),

    /// Move message(s) from the inbox to the archive
    Archive(Refs),

    /// Move message(s) from the inbox to spam
    Spam(Refs),

    /// Star message(s)
    Star(Refs),

    /// Mark message(s) as unread
    Unread(Refs),

    /// List folders and labels
    Folders,

    /// Show message counts per folder
    Count,

    /// Save the attachments of a message
    Download {
        message_ref: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Print new inbox messages as they arrive
    Watch {
        /// Stop after this many seconds (0 = never)
        #[arg(short, long, default_value = "0")]
        timeout: u64,

        /// Seconds between polls
        #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let dir = config_dir()?;

    match &args.command {
        Command::Login { username } => cmd_login(&dir, username.clone()).await?,
        Command::Logout => cmd_logout(&dir)?,
        Command::Whoami => cmd_whoami(&args, &dir)?,
        Command::Ls { folder, limit, page } => {
            cmd_ls(&client(&dir)?, &args, folder, *limit, *page).await?;
        }
        Command::Read {
            message_ref,
            html,
            no_mark_read,
        } => {
            cmd_read(&client(&dir)?, &args, message_ref, *html, *no_mark_read).await?;
        }
        Command::Thread { message_ref } => {
            cmd_thread(&client(&dir)?, &args, message_ref).await?;
        }
        Command::Send {
            to,
            cc,
            bcc,
            subject,
            body,
            html,
            attach,
        } => {
            let mut draft = Draft::new(to.clone(), subject, body_or_stdin(body.clone())?);
            draft.cc.clone_from(cc);
            draft.bcc.clone_from(bcc);
            draft.html = *html;
            for path in attach {
                draft
                    .attach_file(path)
                    .with_context(|| format!("Cannot attach {}", path.display()))?;
            }
            client(&dir)?.send(&draft).await?;
            println!("Sent! Subject: {}", draft.subject);
        }
        Command::Reply {
            message_ref,
            body,
            all,
        } => {
            cmd_reply(&client(&dir)?, message_ref, body.clone(), *all).await?;
        }
        Command::Forward {
            message_ref,
            to,
            body,
        } => {
            cmd_forward(&client(&dir)?, message_ref, to.clone(), body.clone()).await?;
        }
        Command::Delete(refs) => {
            cmd_action(&client(&dir)?, &args, MailboxAction::Delete, refs).await?;
        }
        Command::Archive(refs) => {
            cmd_action(&client(&dir)?, &args, MailboxAction::Archive, refs).await?;
        }
        Command::Spam(refs) => {
            cmd_action(&client(&dir)?, &args, MailboxAction::Spam, refs).await?;
        }
        Command::Star(refs) => {
            cmd_action(&client(&dir)?, &args, MailboxAction::Star, refs).await?;
        }
        Command::Unread(refs) => {
            cmd_action(&client(&dir)?, &args, MailboxAction::Unread, refs).await?;
        }
        Command::Folders => cmd_folders(&client(&dir)?, &args).await?,
        Command::Count => cmd_count(&client(&dir)?, &args).await?,
        Command::Download {
            message_ref,
            output,
        } => {
            cmd_download(&client(&dir)?, &args, message_ref, output).await?;
        }
        Command::Watch { timeout, interval } => {
            cmd_watch(&client(&dir)?, &args, *timeout, *interval).await?;
        }
    }

    Ok(())
}

fn client(dir: &Path) -> anyhow::Result<ProtonClient> {
    Ok(ProtonClient::new(BridgeConfig::load(dir)?))
}

// -- session --

async fn cmd_login(dir: &Path, username: Option<String>) -> anyhow::Result<()> {
    let interactive = io::stdin().is_terminal();

    let username = match username {
        Some(username) => username,
        None if interactive => dialoguer::Input::<String>::new()
            .with_prompt("Proton Bridge username")
            .interact_text()?,
        None => read_line()?,
    };
    let password = if interactive {
        dialoguer::Password::new()
            .with_prompt("Proton Bridge password")
            .interact()?
    } else {
        read_line()?
    };

    let session = Session { username, password };
    ProtonClient::new(BridgeConfig::with_session(session.clone())?)
        .check_login()
        .await
        .context("Login failed")?;

    session.save(dir)?;
    println!("Logged in as {}", session.username);
    Ok(())
}

fn cmd_logout(dir: &Path) -> anyhow::Result<()> {
    if Session::remove(dir)? {
        println!("Logged out.");
    } else {
        println!("No active session.");
    }
    Ok(())
}

fn cmd_whoami(args: &Args, dir: &Path) -> anyhow::Result<()> {
    let config = BridgeConfig::load(dir)?;
    if args.json {
        let out = serde_json::json!({
            "username": config.username,
            "host": config.host,
            "imap_port": config.imap_port,
            "smtp_port": config.smtp_port,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", config.username);
    }
    Ok(())
}

// -- reading --

async fn cmd_ls(
    client: &ProtonClient,
    args: &Args,
    folder: &str,
    limit: usize,
    page: usize,
) -> anyhow::Result<()> {
    let label = Label::from_alias(folder);
    let messages = client.list_folder(&label, page, limit).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!("No messages in {label}.");
        return Ok(());
    }

    println!("{label} ({} messages)\n", messages.len());
    print_message_table(&messages, page * limit);

    if label == Label::Inbox {
        println!("\nUse `pmail read <#>` with the # from this list.");
    }
    Ok(())
}

async fn cmd_read(
    client: &ProtonClient,
    args: &Args,
    message_ref: &str,
    html: bool,
    no_mark_read: bool,
) -> anyhow::Result<()> {
    let id = resolve_ref(client, message_ref).await?;
    let message = client.fetch_message(&id).await?;

    if !no_mark_read && message.unread {
        client.mark_read(std::slice::from_ref(&id)).await?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else if html {
        println!("{}", message.html_body.as_deref().unwrap_or("(no HTML body)"));
    } else {
        print_message(&message);
    }
    Ok(())
}

async fn cmd_thread(client: &ProtonClient, args: &Args, message_ref: &str) -> anyhow::Result<()> {
    let id = resolve_ref(client, message_ref).await?;
    let thread = client.fetch_thread(&id).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&thread)?);
        return Ok(());
    }

    for (i, message) in thread.iter().enumerate() {
        if i > 0 {
            println!("{}\n", "-".repeat(72));
        }
        print_message(message);
    }
    Ok(())
}

// -- sending --

async fn cmd_reply(
    client: &ProtonClient,
    message_ref: &str,
    body: Option<String>,
    all: bool,
) -> anyhow::Result<()> {
    let id = resolve_ref(client, message_ref).await?;
    let original = client.fetch_message(&id).await?;

    if body.is_none() && io::stdin().is_terminal() {
        eprintln!("Replying to: {}", original.subject);
        eprintln!("From: {}", original.from.address);
    }
    let body = body_or_stdin(body)?;

    let own = [client.config().username.clone()];
    let draft = Draft::reply(&original, body, all, &own);
    client.send(&draft).await?;

    println!("Reply sent! To: {}", draft.to.join(", "));
    Ok(())
}

async fn cmd_forward(
    client: &ProtonClient,
    message_ref: &str,
    to: Vec<String>,
    body: Option<String>,
) -> anyhow::Result<()> {
    let id = resolve_ref(client, message_ref).await?;
    let original = client.fetch_message(&id).await?;

    let note = match body {
        Some(body) => Some(body),
        None if io::stdin().is_terminal() => {
            eprintln!("Add a note (Ctrl+D to finish, or just Ctrl+D for none):");
            Some(read_stdin()?)
        }
        None => None,
    };

    let draft = Draft::forward(&original, note.as_deref(), to);
    client.send(&draft).await?;

    println!("Forwarded! To: {}", draft.to.join(", "));
    Ok(())
}

// -- organising --

async fn cmd_action(
    client: &ProtonClient,
    args: &Args,
    action: MailboxAction,
    refs: &Refs,
) -> anyhow::Result<()> {
    let ids = resolve_refs(client, &refs.refs).await?;
    let count = action.apply(client, &ids).await?;

    if args.json {
        let out = serde_json::json!({ "action": action, "count": count, "ids": ids });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{} {count} message(s).", action.done());
    }
    Ok(())
}

async fn cmd_folders(client: &ProtonClient, args: &Args) -> anyhow::Result<()> {
    let names = client.list_labels().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&names)?);
        return Ok(());
    }

    let of_kind = |kind: LabelKind| -> Vec<&str> {
        names
            .iter()
            .map(String::as_str)
            .filter(|name| !matches!(*name, "Labels" | "Folders"))
            .filter(|name| Label::from(*name).kind() == kind)
            .collect()
    };

    let sections = [
        ("System folders", of_kind(LabelKind::System)),
        ("Labels", of_kind(LabelKind::Label)),
        ("Custom folders", of_kind(LabelKind::Folder)),
    ];
    let mut first = true;
    for (title, names) in sections {
        if names.is_empty() {
            continue;
        }
        if !first {
            println!();
        }
        first = false;
        println!("{title}:");
        for name in names {
            println!("  {name}");
        }
    }
    Ok(())
}

async fn cmd_count(client: &ProtonClient, args: &Args) -> anyhow::Result<()> {
    let counts = client.counts().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }

    println!("{:<12} {:>8} {:>8}", "Folder", "Total", "Unread");
    println!("{}", "-".repeat(30));
    for count in &counts {
        let unread = if count.unread > 0 {
            count.unread.to_string()
        } else {
            String::new()
        };
        println!("{:<12} {:>8} {:>8}", count.label.to_string(), count.total, unread);
    }
    Ok(())
}

async fn cmd_download(
    client: &ProtonClient,
    args: &Args,
    message_ref: &str,
    output: &Path,
) -> anyhow::Result<()> {
    let id = resolve_ref(client, message_ref).await?;
    let message = client.fetch_message(&id).await?;

    if message.attachments.is_empty() {
        println!("No attachments.");
        return Ok(());
    }

    std::fs::create_dir_all(output)
        .with_context(|| format!("Cannot create {}", output.display()))?;

    let mut saved = Vec::new();
    for attachment in &message.attachments {
        // Only the final component, so a crafted name cannot escape `output`.
        let name = Path::new(&attachment.name)
            .file_name()
            .map_or_else(|| PathBuf::from("attachment"), PathBuf::from);
        let path = output.join(name);
        std::fs::write(&path, &attachment.content)
            .with_context(|| format!("Cannot write {}", path.display()))?;
        if !args.json {
            println!("Saved: {} ({})", path.display(), format_size(attachment.size));
        }
        saved.push(path);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    }
    Ok(())
}

// -- watching --

async fn cmd_watch(
    client: &ProtonClient,
    args: &Args,
    timeout: u64,
    interval: u64,
) -> anyhow::Result<()> {
    let next_uid = client.inbox_uid_next().await?;
    eprintln!("Watching for new messages (poll every {interval}s)... Press Ctrl+C to stop.");

    tokio::select! {
        () = poll_inbox(client, args.json, interval, next_uid) => {}
        _ = tokio::signal::ctrl_c() => eprintln!("\nStopped watching."),
        () = tokio::time::sleep(Duration::from_secs(timeout)), if timeout > 0 => {
            eprintln!("Stopped watching after {timeout}s.");
        }
    }
    Ok(())
}

/// Poll the inbox forever, printing messages with a UID of at least
/// `next_uid`. A failed poll is logged and retried on the next tick.
async fn poll_inbox(client: &ProtonClient, json: bool, interval: u64, mut next_uid: u32) {
    loop {
        tokio::time::sleep(Duration::from_secs(interval)).await;

        let poll = match client.fetch_inbox_since(next_uid).await {
            Ok(poll) => poll,
            Err(e) => {
                warn!("Poll failed: {}", e);
                continue;
            }
        };

        for message in &poll.messages {
            if json {
                match serde_json::to_string(message) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!("Cannot serialize message: {}", e),
                }
            } else {
                let subject = if message.subject.is_empty() {
                    "(no subject)"
                } else {
                    &message.subject
                };
                println!("New: {} — {}", message.from.address, subject);
            }
        }
        next_uid = poll.next_uid;
    }
}

// -- input --

fn body_or_stdin(body: Option<String>) -> anyhow::Result<String> {
    match body {
        Some(body) => Ok(body),
        None => {
            if io::stdin().is_terminal() {
                eprintln!("Enter message body (Ctrl+D to finish):");
            }
            read_stdin()
        }
    }
}

fn read_stdin() -> anyhow::Result<String> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn read_line() -> anyhow::Result<String> {
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

// -- output --

fn local_time(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| format_timestamp(&d.with_timezone(&Local), &Local::now()))
        .unwrap_or_default()
}

fn print_message_table(messages: &[MessageSummary], first_index: usize) {
    println!(
        "{:>4} {:1} {:<30} {:<50} {:>14} {:>6}",
        "#", "*", "From", "Subject", "Date", "Size"
    );
    println!("{}", "-".repeat(110));

    for (i, message) in messages.iter().enumerate() {
        let subject = if message.subject.is_empty() {
            "(no subject)"
        } else {
            &message.subject
        };
        println!(
            "{:>4} {:1} {:<30} {:<50} {:>14} {:>6}",
            first_index + i,
            if message.unread { "*" } else { " " },
            truncate(message.from.short(), 30),
            truncate(subject, 50),
            local_time(message.date),
            format_size(message.size),
        );
    }
}

fn print_message(message: &Message) {
    let join = |list: &[pmail::Address]| {
        list.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!("From:    {}", message.from);
    println!("To:      {}", join(&message.to));
    if !message.cc.is_empty() {
        println!("CC:      {}", join(&message.cc));
    }
    println!("Date:    {}", local_time(message.date));
    println!("Subject: {}", message.subject);
    if !message.attachments.is_empty() {
        let files = message
            .attachments
            .iter()
            .map(|a| format!("{} ({})", a.name, format_size(a.size)))
            .collect::<Vec<_>>()
            .join(", ");
        println!("Files:   {files}");
    }
    println!("ID:      {}", message.id);
    println!();

    let body = match (&message.text_body, &message.html_body) {
        (Some(text), _) if !text.trim().is_empty() => text.trim().to_string(),
        (_, Some(html)) => strip_html(html),
        _ => "(empty)".to_string(),
    };
    println!("{body}\n");
}
