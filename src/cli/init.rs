// src/cli/init.rs — First-time setup

use crate::infra::paths;

const DEFAULT_CONFIG: &str = r#"# Surveyor configuration

[server]
port = 8420
cors_origins = ["http://localhost:3000"]

[billing]
starting_credits = 10
low_balance_threshold = 3
query_cost = 1
reservation_ttl_seconds = 300
credit_unit_price_usd = 0.10
# payment_url = "https://api.example-payments.com"
# payment_api_key = "..."

[session]
ttl_hours = 24

[retrieval]
per_source_timeout_ms = 8000
per_source_limit = 5
max_items = 10

[report]
snippet_max_chars = 200

[generator]
model = "gemini-2.0-flash"
timeout_seconds = 45
max_attempts = 3
# api_key falls back to GEMINI_API_KEY

[sources]
semantic_url = "http://127.0.0.1:8901"
web_search_url = "https://serpapi.com/search"
# web_search_api_key falls back to SERPAPI_KEY
live_feed_url = "http://127.0.0.1:8902"

[notify]
# low_balance_webhook = "https://hooks.example.com/credits"
"#;

/// Create directories and write a commented default config.
pub async fn run_init() -> anyhow::Result<()> {
    println!("surveyor setup");
    println!();

    eprint!("  Creating directories... ");
    paths::ensure_dirs().await?;
    eprintln!("done");

    let config_path = paths::config_file_path();
    if config_path.exists() {
        println!("  Config: {} (already exists)", config_path.display());
    } else {
        eprint!("  Writing default config... ");
        tokio::fs::write(&config_path, DEFAULT_CONFIG).await?;
        eprintln!("done");
        println!("  Config: {}", config_path.display());
    }

    let db_path = paths::db_path();
    println!("  Database: {}", db_path.display());

    if std::env::var("GEMINI_API_KEY").is_err() {
        println!();
        println!("  No GEMINI_API_KEY detected. The answer generator needs one:");
        println!("    export GEMINI_API_KEY=...");
    }

    Ok(())
}
