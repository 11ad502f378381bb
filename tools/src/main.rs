//! ingest-runner: headless ingestion runner.
//!
//! Usage:
//!   ingest-runner --game megasena --db draws.db --csv mega.csv --reconcile 20
//!   ingest-runner --game quina --db draws.db --json < request.json
//!   ingest-runner --game-config duplasena.json --db draws.db --csv dupla.csv --show-study pair_freq --top 10

use anyhow::{bail, Context, Result};
use loteria_core::{
    api::{FailureResponse, IngestRequest, IngestResponse},
    config::{GameConfig, PipelineConfig},
    pipeline::{IngestPipeline, IngestReport},
    store::LotteryStore,
};
use std::env;
use std::io::{self, Read};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let json_mode = args.iter().any(|a| a == "--json");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let top = parse_arg(&args, "--top", 10usize);
    let reconcile = flag_value(&args, "--reconcile")
        .map(|v| v.parse::<i64>())
        .transpose()
        .context("--reconcile expects an integer")?;

    let game = match (flag_value(&args, "--game-config"), flag_value(&args, "--game")) {
        (Some(path), _) => GameConfig::load(path)?,
        (None, Some(id)) => match GameConfig::preset(id) {
            Some(game) => game,
            None => bail!("unknown game '{id}' (expected megasena, quina, lotofacil or lotomania)"),
        },
        (None, None) => bail!("one of --game or --game-config is required"),
    };

    let store = LotteryStore::open(db)?;
    store.migrate()?;
    log::debug!("ingest-runner: game={} db={db} json={json_mode}", game.game_id);
    let pipeline = IngestPipeline::new(&store, &game, PipelineConfig::default());

    if json_mode {
        let mut body = String::new();
        io::stdin().read_to_string(&mut body)?;
        let outcome = IngestRequest::from_json(&body).and_then(|req| pipeline.ingest(&req));
        match outcome {
            Ok(report) => println!("{}", serde_json::to_string_pretty(&IngestResponse::from(&report))?),
            Err(e) => {
                println!("{}", serde_json::to_string_pretty(&FailureResponse::from(&e))?);
                std::process::exit(i32::from(FailureResponse::status_code(&e) / 100));
            }
        }
    } else {
        let Some(csv_path) = flag_value(&args, "--csv") else {
            bail!("--csv <file> is required unless --json is given");
        };
        let csv_text =
            std::fs::read_to_string(csv_path).with_context(|| format!("cannot read {csv_path}"))?;

        println!("loteria ingest-runner");
        println!("  game:      {} ({})", game.label, game.game_id);
        println!("  db:        {db}");
        println!("  csv:       {csv_path}");
        println!();

        match pipeline.ingest_text(&csv_text, reconcile) {
            Ok(report) => print_summary(&report),
            Err(e) => {
                let failure = FailureResponse::from(&e);
                eprintln!("{}", serde_json::to_string_pretty(&failure)?);
                return Err(e.into());
            }
        }
    }

    if let Some(study_key) = flag_value(&args, "--show-study") {
        let items = store.study_items(&game.game_id, study_key)?;
        println!();
        println!("{study_key} (top {top} of {}):", items.len());
        for item in items.iter().take(top) {
            println!("  #{:<4} {:<16} {:>10.3}", item.rank, item.item_key, item.value);
        }
    }

    Ok(())
}

fn print_summary(report: &IngestReport) {
    let r = &report.reconcile;
    println!("Run {} complete.", report.run_id);
    println!("  processed:   {}", report.processed);
    println!("  blank rows:  {}", report.blank_rows);
    println!("  window:      {}", r.window);
    println!("  inserted:    {}", r.inserted);
    println!("  updated:     {}", r.updated);
    println!("  skipped:     {}", r.skipped);
    println!("  errors:      {}", report.errors.len());
    for err in report.errors.iter().take(10) {
        println!("    line {:>6}: {}", err.line, err.reason);
    }
    println!("  aggregation: {:?}", report.aggregation);
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
