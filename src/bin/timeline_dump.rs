// One-shot dump of a match's timeline, handy when poking at the backend.
use std::sync::Arc;

use studmatch::client::config::ClientConfig;
use studmatch::client::models::timeline::render_entry;
use studmatch::client::services::api::MatchApi;
use studmatch::client::services::http_api::HttpMatchApi;
use studmatch::client::services::timeline_service::TimelineService;
use studmatch::client::utils::session_store::SessionStore;
use studmatch::common::models::Id;
use studmatch::utils::logger::StudmatchLogger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = ClientConfig::from_env();
    StudmatchLogger::init(&cfg.log_level);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    let Some(match_id) = args.iter().find(|a| !a.starts_with("--")) else {
        eprintln!("usage: timeline_dump <match_id> [--json]");
        std::process::exit(2);
    };
    let match_id = Id::parse(match_id);
    println!("Using API {}", cfg.api_base_url);

    let api = Arc::new(HttpMatchApi::new(&cfg, SessionStore::from_env().load())?);
    let user = api.current_user().await?;
    let service = TimelineService::new(api);
    service.open_match(match_id.clone()).await;
    let outcome = service.load_timeline(&match_id).await?;
    println!("LOAD -> {:?}", outcome);

    let entries = service.view().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!("{}", render_entry(entry, &user));
        }
    }
    Ok(())
}
