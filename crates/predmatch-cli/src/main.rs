//! predmatch: drive one question through its lifecycle and report.
//!
//! Usage:
//!   predmatch [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>     Engine config as JSON (default: built-in defaults)
//!   --title <TITLE>         Question title
//!   --result <YES|NO>       Outcome to settle with (default: YES)
//!   --json-logs             Emit logs as JSON lines

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use predmatch_ingress::{MemoryAuditTrail, PauseRegistry};
use predmatch_matchcore::{MarketMaker, MatchingEngine, QuestionLifecycle};
use predmatch_persistence::Store;
use predmatch_settlement::{MemoryChainMirror, MirrorDispatcher, SettlementEngine};
use predmatch_types::{
    Direction, EngineConfig, FinalResult, MemberId, OrderRequest, QuestionId, Result, Side,
};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "predmatch")]
#[command(about = "Binary-outcome prediction market: lifecycle demo with a JSON report")]
#[command(version)]
struct Args {
    /// Engine config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "Will it rain in Lisbon tomorrow?")]
    title: String,

    /// Initial liquidity per side
    #[arg(long, default_value_t = Decimal::from(500))]
    liquidity: Decimal,

    #[arg(long, value_enum, default_value_t = Outcome::Yes)]
    result: Outcome,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Outcome {
    Yes,
    No,
}

impl From<Outcome> for FinalResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Yes => FinalResult::Yes,
            Outcome::No => FinalResult::No,
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            EngineConfig::from_json_str(&raw)
        }
        None => {
            let config = EngineConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Submit and log; a rejected order does not stop the run.
fn place(engine: &MatchingEngine, label: &str, request: &OrderRequest) -> serde_json::Value {
    let response = engine.create_order(request);
    if response.success {
        info!(member = label, order = ?response.order_id, message = %response.message, "Order accepted");
    } else {
        warn!(member = label, message = %response.message, "Order rejected");
    }
    json!({ "member": label, "response": response })
}

fn funded(store: &Store, amount: i64) -> Result<MemberId> {
    let member = MemberId::new();
    store.deposit(member, Decimal::from(amount))?;
    Ok(member)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);
    let config = load_config(args.config.as_ref())?;

    let store = Arc::new(Store::new());
    if config.market_maker.enabled {
        store.deposit(config.market_maker.member_id, Decimal::from(10_000))?;
    }
    let engine = Arc::new(MatchingEngine::new(
        Arc::clone(&store),
        &config,
        Arc::new(PauseRegistry::new()),
        Arc::new(MemoryAuditTrail::new()),
    ));
    let market_maker = Arc::new(MarketMaker::new(Arc::clone(&engine), config.market_maker.clone()));
    let lifecycle = QuestionLifecycle::new(Arc::clone(&engine), Arc::clone(&market_maker));
    let mirror = Arc::new(MemoryChainMirror::new());
    let settlement = SettlementEngine::new(Arc::clone(&engine), &config.settlement)
        .with_mirror(MirrorDispatcher::new(mirror.clone(), &config.chain_mirror));

    let question = lifecycle.create_question(&args.title, args.liquidity, Utc::now() + chrono::Duration::days(1))?;
    let q: QuestionId = question.id;
    lifecycle.open_break(q)?;
    let (_, seeded) = lifecycle.open_betting(q)?;
    info!(question = %q, ?seeded, "Betting open");

    let alice = funded(&store, 1_000)?;
    let bob = funded(&store, 1_000)?;
    let carol = funded(&store, 1_000)?;
    let limit = |m, side, dir, cents, qty| OrderRequest::limit(m, q, side, dir, Decimal::new(cents, 2), Decimal::from(qty));
    let orders = vec![
        place(&engine, "bob", &limit(bob, Side::No, Direction::Buy, 42, 120)),
        place(&engine, "alice", &limit(alice, Side::Yes, Direction::Buy, 58, 100)),
        place(&engine, "carol", &OrderRequest::market(carol, q, Side::Yes, Direction::Buy, Decimal::from(30))),
        place(&engine, "carol", &limit(carol, Side::Yes, Direction::Sell, 61, 10)),
    ];
    let book = engine.order_book(q)?;

    let tentative = settlement.initiate_settlement(q, args.result.into(), Some("predmatch-cli".into()))?;
    let summary = settlement.finalize_settlement(q, true)?;

    // Give the spawned mirror task a chance to run before reporting.
    for _ in 0..20 {
        if !mirror.events().is_empty() || !config.chain_mirror.enabled {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let members = [("alice", alice), ("bob", bob), ("carol", carol)];
    let report = json!({
        "question": store.question(q),
        "seeding": format!("{seeded:?}"),
        "orders": orders,
        "book_before_settlement": book,
        "tentative": tentative,
        "settlement": summary,
        "balances": members
            .iter()
            .map(|(name, m)| (name.to_string(), json!(store.balance(*m))))
            .collect::<serde_json::Map<_, _>>(),
        "history": members
            .iter()
            .map(|(name, m)| (name.to_string(), json!(settlement.settlement_history(*m))))
            .collect::<serde_json::Map<_, _>>(),
        "chain_events": mirror.events(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
