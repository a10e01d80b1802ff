//! # obrol
//!
//! Terminal front-end for the Obrol sync engine, wired to the in-process
//! loopback backend.  Useful for watching offline queueing and reconnect
//! flushing by hand:
//!
//! - `/offline`, `/online` cut or restore the simulated connection
//! - `/remote <text>` posts as another user
//! - `/retry` retries queued messages while online
//! - `/logout` signs out, `/quit` exits and stays signed in

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tracing::info;

use obrol_client::{init_tracing, ClientConfig, EngineEvent, Session, SessionManager};
use obrol_net::{LoopbackAuth, LoopbackFeed};
use obrol_shared::constants::{APP_NAME, ROOM_COLLECTION};
use obrol_shared::{Credentials, Message};

type Input = Lines<BufReader<Stdin>>;

const REMOTE_AUTHOR: &str = "budi@obrol.local";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Starting {} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let store = config.open_store().context("Failed to open message cache")?;
    let auth = LoopbackAuth::new();
    let feed = LoopbackFeed::new();
    let sessions = SessionManager::new(
        Arc::new(auth),
        Arc::new(feed.clone()),
        store,
        config.event_buffer,
    );

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let session = match sessions.restore().await? {
            Some(session) => session,
            None => match sign_in(&sessions, &mut input).await? {
                Some(session) => session,
                None => break,
            },
        };

        let keep_going = chat(session, &sessions, &feed, &mut input).await?;
        if !keep_going {
            break;
        }
    }

    info!("Bye");
    Ok(())
}

/// Prompt until a login or registration succeeds.  `None` on end of input.
async fn sign_in(
    sessions: &SessionManager<LoopbackAuth, LoopbackFeed>,
    input: &mut Input,
) -> anyhow::Result<Option<Session>> {
    loop {
        let Some(choice) = prompt(input, "[l]ogin or [r]egister? ").await? else {
            return Ok(None);
        };
        let register = match choice.trim() {
            "l" | "login" => false,
            "r" | "register" => true,
            _ => continue,
        };

        let Some(email) = prompt(input, "email: ").await? else {
            return Ok(None);
        };
        let Some(password) = prompt(input, "password: ").await? else {
            return Ok(None);
        };
        let credentials = Credentials::new(email, password);

        let result = if register {
            let Some(confirmation) = prompt(input, "confirm password: ").await? else {
                return Ok(None);
            };
            sessions.register(&credentials, &confirmation).await
        } else {
            sessions.login(&credentials).await
        };

        match result {
            Ok(session) => return Ok(Some(session)),
            Err(e) => println!("! {e}"),
        }
    }
}

/// Run one chat session.  Returns `true` after a logout, `false` on quit.
async fn chat(
    mut session: Session,
    sessions: &SessionManager<LoopbackAuth, LoopbackFeed>,
    feed: &LoopbackFeed,
    input: &mut Input,
) -> anyhow::Result<bool> {
    println!("== {APP_NAME} #{ROOM_COLLECTION} as {} ==", session.user());
    render(session.initial_view());

    let printer = session.take_events().map(|events| tokio::spawn(print_events(events)));

    let logout = loop {
        let Some(line) = input.next_line().await? else {
            break false;
        };
        let line = line.trim_end();

        match line {
            "" => {}
            "/quit" => break false,
            "/logout" => break true,
            "/offline" => feed.set_online(false),
            "/online" => feed.set_online(true),
            "/retry" => match session.handle().request_flush().await {
                Ok(Some(_)) => {}
                Ok(None) => println!("! offline, messages will go out on reconnect"),
                Err(e) => println!("! {e}"),
            },
            _ => {
                if let Some(text) = line.strip_prefix("/remote ") {
                    feed.insert_remote(REMOTE_AUTHOR, text);
                } else if let Err(e) = session.send(line).await {
                    println!("! {e}");
                }
            }
        }
    };

    if logout {
        sessions.logout(session).await;
    } else {
        session.close().await;
    }
    if let Some(printer) = printer {
        // The engine has stopped, so the event stream ends on its own.
        let _ = printer.await;
    }
    Ok(logout)
}

async fn print_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::View(view) => {
                if !view.online {
                    println!("-- offline: showing cached messages --");
                }
                render(&view.messages);
            }
            EngineEvent::Connectivity { online: true } => println!("-- back online --"),
            EngineEvent::Connectivity { online: false } => println!("-- connection lost --"),
            EngineEvent::Flushed { sent, remaining } => {
                println!("-- sent {sent} queued message(s), {remaining} still waiting --");
            }
        }
    }
}

fn render(messages: &[Message]) {
    println!("----------------------------------------");
    for message in messages {
        let time = message
            .created_at
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| "--:--".to_string());
        let status = if message.synced { "✓✓" } else { "⏳" };
        println!("[{time}] {}: {} {status}", message.author, message.text);
    }
}

async fn prompt(input: &mut Input, label: &str) -> anyhow::Result<Option<String>> {
    use std::io::Write;

    print!("{label}");
    std::io::stdout().flush()?;
    Ok(input.next_line().await?)
}
