//! `mailmerge` - personalized email from a Google Sheets recipient list
//!
//! Reads recipients from a sheet, renders subject and body templates per row
//! and sends each message through Gmail, stopping at the first failure.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use mailmerge_core::MailMerge;
use mailmerge_google::GoogleClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailmerge=info,mailmerge_core=info,mailmerge_google=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let client = GoogleClient::new(args.access_token.as_str())?;
    let opts = args.opts(client)?;
    let merge = MailMerge::new(opts)
        .await
        .context("Failed to prepare mail merge")?;

    if args.dry_run {
        let messages = merge.messages()?;
        for (i, message) in messages.iter().enumerate() {
            println!(
                "{}: To: {} | Cc: {} | Bcc: {} | Subject: {}",
                i + 1,
                message.to,
                message.cc,
                message.bcc,
                message.subject
            );
        }
        println!("Built {} email message(s); nothing sent", messages.len());
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling mail merge");
            on_interrupt.cancel();
        }
    });

    match merge.send(&cancel, &args.user_id).await {
        Ok(count) => {
            info!(count, "mail merge finished");
            println!("Successfully sent {count} email message(s)");
            Ok(())
        }
        Err(e) => {
            if let Some(sent) = e.sent() {
                println!("Sent {sent} email message(s) before stopping");
            }
            Err(e.into())
        }
    }
}
