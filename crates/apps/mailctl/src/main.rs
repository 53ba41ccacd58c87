//! mailctl - command-line access to the mail cache

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::error;
use mailcache::{ComposedMessage, MailConfig, MailService, SearchRequest};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mailctl", version, about = "Sync, search and read cached IMAP mail")]
struct Cli {
    /// Accounts file (defaults to ~/.config/mailcache/accounts.json, then environment)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List configured account names
    Accounts,
    /// Fetch the most recent messages of an account into the cache
    Sync {
        /// Defaults to the account named "default", else the first configured
        account: Option<String>,
        /// Only this folder
        #[arg(long)]
        folder: Option<String>,
    },
    /// Search cached mail by filters or an operator query
    Search(SearchArgs),
    /// Full-text search over subject, sender and body
    Fts {
        query: String,
        #[arg(long)]
        account: Option<String>,
        #[arg(long, default_value_t = 0)]
        limit: i64,
    },
    /// Show one cached email by id
    Get { id: i64 },
    /// List cached folders
    Folders {
        #[arg(long)]
        account: Option<String>,
    },
    /// Send a message
    Send(SendArgs),
}

#[derive(Args)]
struct SearchArgs {
    /// Operator query, e.g. `from:alice after:2024-01-01 report`
    #[arg(long, short, conflicts_with_all = ["account", "folder", "sender", "recipient", "subject", "date_from", "date_to", "body"])]
    query: Option<String>,
    #[arg(long)]
    account: Option<String>,
    #[arg(long)]
    folder: Option<String>,
    #[arg(long)]
    sender: Option<String>,
    #[arg(long)]
    recipient: Option<String>,
    #[arg(long)]
    subject: Option<String>,
    /// RFC 3339, inclusive
    #[arg(long)]
    date_from: Option<String>,
    /// RFC 3339, inclusive
    #[arg(long)]
    date_to: Option<String>,
    #[arg(long)]
    body: Option<String>,
    #[arg(long, default_value_t = 0)]
    limit: i64,
}

#[derive(Args)]
struct SendArgs {
    account: String,
    #[arg(long, required = true)]
    to: Vec<String>,
    #[arg(long)]
    cc: Vec<String>,
    #[arg(long)]
    bcc: Vec<String>,
    #[arg(long)]
    subject: String,
    #[arg(long)]
    body: String,
    #[arg(long)]
    html: Option<String>,
    #[arg(long)]
    reply_to: Option<String>,
    #[arg(long)]
    in_reply_to: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = MailConfig::load(cli.config.as_deref())?;
    let mut service = MailService::open(config)?;

    let output = execute(&mut service, cli.command);
    service.close();

    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}

fn execute(service: &mut MailService, command: Command) -> Result<Value> {
    let value = match command {
        Command::Accounts => serde_json::to_value(service.registry().names())?,
        Command::Sync { account, folder } => {
            let account = match account {
                Some(account) => account,
                None => service
                    .config()
                    .default_account()
                    .map(|a| a.name.clone())
                    .context("No accounts configured")?,
            };
            serde_json::to_value(service.sync_account(&account, folder.as_deref())?)?
        }
        Command::Search(args) => {
            let results = match args.query {
                Some(query) => service.search_query(&query, args.limit)?,
                None => service.search(SearchRequest {
                    account: args.account,
                    folder: args.folder,
                    sender: args.sender,
                    recipient: args.recipient,
                    subject: args.subject,
                    date_from: args.date_from,
                    date_to: args.date_to,
                    body: args.body,
                    limit: Some(args.limit),
                })?,
            };
            serde_json::to_value(results)?
        }
        Command::Fts {
            query,
            account,
            limit,
        } => serde_json::to_value(service.search_fts(&query, account.as_deref(), limit)?)?,
        Command::Get { id } => serde_json::to_value(service.get_email(id)?)?,
        Command::Folders { account } => {
            serde_json::to_value(service.list_folders(account.as_deref())?)?
        }
        Command::Send(args) => {
            let message = ComposedMessage {
                to: args.to,
                cc: args.cc,
                bcc: args.bcc,
                subject: args.subject,
                body_text: args.body,
                body_html: args.html,
                reply_to: args.reply_to,
                in_reply_to: args.in_reply_to,
            };
            service.send_email(&args.account, &message)?;
            serde_json::json!({ "sent": true, "account": args.account })
        }
    };
    Ok(value)
}
