//! Print how a line of text is interpreted, and optionally run the full search.
//! Usage:
//!   cargo run --bin parse_query -- "romcom movies under 2hr on netflix"
//!   cargo run --bin parse_query -- --search --region US "anime on crunchyroll"
//! `--search` requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{bail, Context, Result};
use cinescout::config::{self, Config};
use cinescout::discovery::{self, SearchOptions};
use cinescout::query;
use cinescout::tmdb::TmdbClient;
use dotenvy::dotenv;
use serde_json::json;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let mut run_search = false;
    let mut region: Option<String> = None;
    let mut words = Vec::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--search" => run_search = true,
            "--region" => {
                let value = args.next().context("--region needs a value")?;
                region = Some(config::normalize_region(&value)?);
            }
            _ => words.push(arg),
        }
    }
    if words.is_empty() {
        bail!("usage: parse_query [--search] [--region XX] <text>");
    }
    let text = words.join(" ");

    let parsed = query::parse(&text);
    let plan = discovery::plan(&parsed);
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "parsed": parsed,
            "target": plan.media_type,
            "genres": plan.genre_names,
            "providers": plan.provider_names,
            "max_runtime_minutes": plan.max_runtime_minutes,
            "original_language": plan.original_language,
        }))?
    );

    if !run_search {
        return Ok(());
    }

    let config = Config::from_env()?;
    let client = TmdbClient::from_config(&config)?;
    let options = SearchOptions {
        region: region.unwrap_or(config.default_region),
        auto_broaden: config.auto_broaden,
    };
    let outcome = discovery::run_search(&client, &parsed, &options).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
