//! MemeHustle Client - headless entry point
//!
//! Keeps the marketplace in sync and reads mutation commands from stdin.

use anyhow::Context;
use chrono::Utc;
use memehustle_client::commands::{Command, USAGE};
use memehustle_client::logging::init_tracing;
use memehustle_client::{log_error, log_info, log_warn};
use memehustle_client::{ClientConfig, MemeProjection, MemeSession};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("memehustle_client=debug");

    let config = ClientConfig::from_env().context("invalid configuration")?;
    log_info!(api = %config.api_url, ws = %config.ws_url, "starting meme sync");

    let session = MemeSession::new(config)?;
    // The push channel and refresh timer are already running; the snapshot is
    // retried on the next tick, rejoin, or `refresh`.
    match session.init().await {
        Ok(()) => print_projection(&session.projection()),
        Err(e) => log_error!(error = %e, "initial meme snapshot failed, type `refresh` to retry"),
    }

    let mut projections = session.subscribe();
    let watcher = tokio::spawn(async move {
        while projections.changed().await.is_ok() {
            let view = projections.borrow_and_update().clone();
            log_info!(
                revision = view.revision,
                memes = view.gallery.len(),
                leaderboard = view.leaderboard.len(),
                "projection updated"
            );
        }
    });

    println!("{USAGE}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line.context("failed to read stdin")?,
        };
        let Some(line) = line else { break };

        match Command::parse(&line, Utc::now()) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => execute(&session, command).await,
            Err(e) => log_warn!(error = %e, "bad command"),
        }
    }

    watcher.abort();
    session.shutdown().await;
    Ok(())
}

async fn execute(session: &MemeSession, command: Command) {
    let gateway = session.gateway();
    let result = match command {
        Command::Vote(id, vote_type) => gateway.vote(&id, vote_type).await,
        Command::Bid(id, credits) => gateway.bid(&id, credits).await,
        Command::Caption(id) => gateway.generate_caption(&id).await.map(|meme| {
            println!(
                "{}: {} [{}]",
                meme.id,
                meme.caption.as_deref().unwrap_or("-"),
                meme.vibe.as_deref().unwrap_or("-")
            );
        }),
        Command::Create(meme) => gateway.create(meme).await.map(|_| ()),
        Command::Refresh => session.refresh().await,
        Command::Show => {
            print_projection(&session.projection());
            Ok(())
        }
        Command::Quit => Ok(()),
    };
    if let Err(e) = result {
        log_error!(error = %e, "command failed");
    }
}

fn print_projection(view: &MemeProjection) {
    println!("gallery ({} memes):", view.gallery.len());
    for meme in &view.gallery {
        println!(
            "  {:>6}  {:<32} {:>5} up  bid {:>5} {}",
            meme.id.as_str(),
            meme.title,
            meme.upvotes,
            meme.current_bid(),
            meme.highest_bidder.as_deref().unwrap_or("")
        );
    }
    println!("leaderboard:");
    for (rank, meme) in view.ranked() {
        println!("  #{rank} {} ({} up)", meme.title, meme.upvotes);
    }
}
