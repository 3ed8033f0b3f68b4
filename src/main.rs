use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use studmatch::client::config::ClientConfig;
use studmatch::client::models::timeline::render_entry;
use studmatch::client::services::api::MatchApi;
use studmatch::client::services::http_api::HttpMatchApi;
use studmatch::client::services::poller::Poller;
use studmatch::client::services::timeline_service::TimelineService;
use studmatch::client::utils::session_store::SessionStore;
use studmatch::common::models::{CurrentUser, Id, VisitDecision};
use studmatch::utils::logger::StudmatchLogger;

const MAX_MESSAGE_LEN: usize = 2048;

#[derive(Debug, PartialEq)]
enum Command {
    Say(String),
    Visit { date: DateTime<Utc>, notes: Option<String> },
    Accept(Id),
    Decline { visit_id: Id, reason: Option<String> },
    Cancel(Id),
    Refresh,
    Read,
    Help,
    Logout,
    Quit,
}

fn rest_of(parts: &[&str]) -> Option<String> {
    let rest = parts.join(" ");
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if !line.starts_with('/') {
        if line.chars().count() > MAX_MESSAGE_LEN {
            return Err(format!("Message too long (max {} characters)", MAX_MESSAGE_LEN));
        }
        return Ok(Command::Say(line.to_string()));
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    let args = &parts[1..];
    match (parts[0], args) {
        ("/visit", [date, rest @ ..]) => {
            let date = DateTime::parse_from_rfc3339(date)
                .map_err(|e| format!("Invalid date '{}': {}", date, e))?
                .with_timezone(&Utc);
            Ok(Command::Visit { date, notes: rest_of(rest) })
        }
        ("/accept", [id]) => Ok(Command::Accept(Id::parse(id))),
        ("/decline", [id, rest @ ..]) => Ok(Command::Decline { visit_id: Id::parse(id), reason: rest_of(rest) }),
        ("/cancel", [id]) => Ok(Command::Cancel(Id::parse(id))),
        ("/refresh", []) => Ok(Command::Refresh),
        ("/read", []) => Ok(Command::Read),
        ("/help", []) => Ok(Command::Help),
        ("/logout", []) => Ok(Command::Logout),
        ("/quit", []) => Ok(Command::Quit),
        _ => Err("Invalid command syntax, try /help".to_string()),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  <text>                      send a message");
    println!("  /visit <RFC3339> [notes]    propose a visit");
    println!("  /accept <visit id>          accept a visit");
    println!("  /decline <visit id> [why]   decline a visit");
    println!("  /cancel <visit id>          withdraw your visit proposal");
    println!("  /refresh                    reload the conversation");
    println!("  /read                       mark incoming messages read");
    println!("  /logout                     forget the stored session token and quit");
    println!("  /quit");
}

async fn print_timeline<A: MatchApi>(service: &TimelineService<A>, user: &CurrentUser) {
    if let Some(meta) = service.match_meta().await {
        let title = meta.listing.as_ref().and_then(|l| l.title.as_deref()).unwrap_or("(no listing)");
        println!("==== match {} · {} ====", meta.id, title);
    }
    let entries = service.view().await;
    if entries.is_empty() {
        println!("(no messages yet)");
    }
    for entry in &entries {
        println!("{}", render_entry(entry, user));
    }
}

async fn run(
    service: &TimelineService<HttpMatchApi>,
    store: &SessionStore,
    user: &CurrentUser,
    match_id: &Id,
    command: Command,
) -> Option<()> {
    // Failures reach the terminal as notices.
    let _ = match command {
        Command::Say(text) => service.send_message(match_id, &user.id, &text).await.map(|_| ()),
        Command::Visit { date, notes } => service.propose_visit(user, match_id, date, notes).await.map(|_| ()),
        Command::Accept(id) => service.respond_to_visit(user, &id, VisitDecision::Accept).await.map(|_| ()),
        Command::Decline { visit_id, reason } => service
            .respond_to_visit(user, &visit_id, VisitDecision::Decline { reason })
            .await
            .map(|_| ()),
        Command::Cancel(id) => service.cancel_visit(user, &id).await,
        Command::Refresh => service.load_timeline(match_id).await.map(|_| ()),
        Command::Read => {
            let marked = service.mark_incoming_read(user).await;
            println!("{} message(s) marked read", marked);
            Ok(())
        }
        Command::Help => {
            print_help();
            return Some(());
        }
        Command::Logout => {
            match store.clear() {
                Ok(()) => println!("Session token removed"),
                Err(e) => error!("could not remove session token: {:#}", e),
            }
            return None;
        }
        Command::Quit => return None,
    };
    Some(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::from_env();
    StudmatchLogger::init(&config.log_level);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (match_arg, token_arg) = match args.as_slice() {
        [id] => (id, None),
        [id, flag, token] if flag == "--save-token" => (id, Some(token)),
        _ => {
            eprintln!("usage: studmatch-chat <match_id> [--save-token <token>]");
            std::process::exit(2);
        }
    };
    let match_id = Id::parse(match_arg);

    let store = SessionStore::from_env();
    if let Some(token) = token_arg {
        store.save(token)?;
        info!("session token stored");
    }
    let api = Arc::new(HttpMatchApi::new(&config, store.load())?);
    let user = api.current_user().await?;
    info!("signed in as {} ({:?})", user.display_name, user.role);

    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            println!("{}", notice);
        }
    });

    let service = TimelineService::new(Arc::clone(&api)).with_notices(notice_tx);
    service.open_match(match_id.clone()).await;
    if let Err(e) = service.load_timeline(&match_id).await {
        error!("initial load failed: {:#}", e);
    }
    let poller = Poller::spawn(service.clone(), config.poll_interval);

    println!("Hello {}! Type a message or /help.", user.display_name);
    print_timeline(&service, &user).await;

    let mut lines = BufReader::new(stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(msg) => {
                println!("{}", msg);
                continue;
            }
        };
        if run(&service, &store, &user, &match_id, command).await.is_none() {
            break;
        }
        print_timeline(&service, &user).await;
    }

    poller.stop().await;
    Ok(())
}
