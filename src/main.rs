//! simple_ledger operator binary
//!
//! ```text
//! simple_ledger [--env <name>] init-schema
//! simple_ledger [--env <name>] open <owner> <currency>
//! simple_ledger [--env <name>] show <account_id>
//! simple_ledger [--env <name>] transfer <from> <to> <amount>
//! simple_ledger [--env <name>] entries <account_id> [page] [page_size]
//! ```
//!
//! Every command prints its result as JSON on stdout.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use simple_ledger::account::AccountService;
use simple_ledger::config::AppConfig;
use simple_ledger::db::Database;
use simple_ledger::models::Page;
use simple_ledger::store::{LedgerStore, PgLedgerStore, schema};
use simple_ledger::transfer::{TransferCoordinator, TransferRequest};

const USAGE: &str = "usage: simple_ledger [--env <name>] \
<init-schema | open <owner> <currency> | show <id> | transfer <from> <to> <amount> | entries <account_id> [page] [page_size]>";

/// Split `--env`/`-e` off the argument list
fn parse_args(args: Vec<String>) -> (String, Vec<String>) {
    let mut env = "dev".to_string();
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--env" || arg == "-e" {
            if let Some(value) = iter.next() {
                env = value;
            }
        } else {
            rest.push(arg);
        }
    }
    (env, rest)
}

fn arg<T: std::str::FromStr>(args: &[String], idx: usize, name: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = args
        .get(idx)
        .with_context(|| format!("missing <{}>\n{}", name, USAGE))?;
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid <{}> '{}': {}", name, raw, e))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let (env, args) = parse_args(std::env::args().skip(1).collect());
    let Some(command) = args.first().cloned() else {
        bail!(USAGE);
    };

    let config = AppConfig::load(&env)?;
    let _log_guard = simple_ledger::logging::init_logging(&config);
    tracing::info!(env = %env, command = %command, "Starting simple_ledger");

    let url = config
        .postgres_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .context("postgres_url is not configured and DATABASE_URL is unset")?;
    let db = Database::connect(&url, &config.pool)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.health_check().await.context("PostgreSQL health check failed")?;

    let store: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::with_isolation(
        db.pool().clone(),
        config.ledger.isolation,
    ));
    let accounts = AccountService::new(store.clone());

    match command.as_str() {
        "init-schema" => {
            schema::init_schema(db.pool()).await?;
            print_json(&serde_json::json!({ "schema": "ok" }))?;
        }
        "open" => {
            let owner: String = arg(&args, 1, "owner")?;
            let currency: String = arg(&args, 2, "currency")?;
            print_json(&accounts.open_account(&owner, &currency).await?)?;
        }
        "show" => {
            let id = arg(&args, 1, "account_id")?;
            print_json(&accounts.get_account(id).await?)?;
        }
        "transfer" => {
            let request = TransferRequest::new(
                arg(&args, 1, "from")?,
                arg(&args, 2, "to")?,
                arg(&args, 3, "amount")?,
            );
            let coordinator = TransferCoordinator::with_config(store, &config.ledger);
            match coordinator.execute(request).await {
                Ok(result) => print_json(&result)?,
                Err(e) => {
                    print_json(&serde_json::json!({
                        "error": e.code(),
                        "status": e.http_status(),
                        "message": e.to_string(),
                        "retryable": e.is_retryable(),
                    }))?;
                    bail!(e);
                }
            }
        }
        "entries" => {
            let account_id = arg(&args, 1, "account_id")?;
            let page_id = if args.len() > 2 { arg(&args, 2, "page")? } else { 1 };
            let page_size = if args.len() > 3 {
                arg(&args, 3, "page_size")?
            } else {
                Page::default().limit
            };
            let entries = accounts
                .list_entries(account_id, Page::numbered(page_id, page_size))
                .await?;
            print_json(&entries)?;
        }
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }

    Ok(())
}
