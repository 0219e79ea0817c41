// src/main.rs — Surveyor entry point

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use surveyor::answer::gemini::GeminiGenerator;
use surveyor::answer::{AnswerGenerator, RetryGenerator};
use surveyor::api::{self, ApiState};
use surveyor::billing::{Billing, HttpPaymentProvider, PaymentProvider};
use surveyor::cli::{Cli, Commands};
use surveyor::infra::config::Config;
use surveyor::infra::errors::SurveyorError;
use surveyor::infra::{logger, paths};
use surveyor::ledger::Ledger;
use surveyor::notify::{LogNotifier, Notifier, WebhookNotifier};
use surveyor::orchestrator::Orchestrator;
use surveyor::retrieval::aggregator::RetrievalAggregator;
use surveyor::retrieval::live::HttpLiveFeed;
use surveyor::retrieval::retry::RetryWebSearch;
use surveyor::retrieval::semantic::HttpSemanticIndex;
use surveyor::retrieval::web::SerpApiSearch;
use surveyor::retrieval::{
    LiveFeedProvider, RetrievalItem, SemanticSearchProvider, WebSearchProvider,
};
use surveyor::session::SessionAuthority;

#[tokio::main]
async fn main() {
    // Initialize logging (respects RUST_LOG)
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    match cli.command {
        Some(Commands::Init) => surveyor::cli::init::run_init().await,
        Some(Commands::Serve { port }) => serve(config, port).await,
        None => serve(config, None).await,
    }
}

async fn serve(mut config: Config, port_override: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.server.port = port;
    }

    paths::ensure_dirs().await?;
    let store = surveyor::store::open(&paths::db_path())?;

    let notifier: Arc<dyn Notifier> = match &config.notify.low_balance_webhook {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    let sessions = Arc::new(SessionAuthority::new(
        store.clone(),
        config.session.clone(),
        &config.billing,
    ));
    let ledger = Arc::new(Ledger::new(
        store.clone(),
        config.billing.clone(),
        notifier,
    ));

    let aggregator = RetrievalAggregator::new(
        semantic_provider(&config),
        web_provider(&config),
        live_provider(&config),
        config.retrieval.clone(),
    );

    let generator: Arc<dyn AnswerGenerator> = match config.generator_api_key() {
        Some(api_key) => {
            let gemini = Arc::new(GeminiGenerator::new(
                api_key,
                config.generator.model.clone(),
                Duration::from_secs(config.generator.timeout_seconds),
            ));
            Arc::new(RetryGenerator::new(gemini, config.generator.max_attempts))
        }
        None => {
            tracing::warn!("No generator API key configured; /research will fail until one is set");
            Arc::new(UnconfiguredGenerator)
        }
    };

    let orchestrator = Arc::new(Orchestrator::new(
        sessions.clone(),
        ledger.clone(),
        aggregator,
        generator,
        config.report.clone(),
    ));

    let payment: Option<Arc<dyn PaymentProvider>> =
        match (&config.billing.payment_url, &config.billing.payment_api_key) {
            (Some(url), Some(key)) => Some(Arc::new(HttpPaymentProvider::new(
                url.clone(),
                key.clone(),
            ))),
            _ => None,
        };
    let billing = Arc::new(Billing::new(
        ledger.clone(),
        payment,
        config.billing.credit_unit_price_usd,
    ));

    // Backstop sweep for reservations orphaned by dropped connections; the
    // reserve path also sweeps lazily.
    {
        let ledger = ledger.clone();
        let interval = Duration::from_secs(60);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = ledger.sweep_expired() {
                    tracing::warn!("Reservation sweep failed: {e}");
                }
            }
        });
    }

    let state = ApiState {
        orchestrator,
        sessions,
        ledger,
        billing,
    };
    api::start_server(&config.server, state).await
}

fn semantic_provider(config: &Config) -> Arc<dyn SemanticSearchProvider> {
    match &config.sources.semantic_url {
        Some(url) => Arc::new(HttpSemanticIndex::new(url.clone())),
        None => Arc::new(DisabledSource("document")),
    }
}

fn web_provider(config: &Config) -> Arc<dyn WebSearchProvider> {
    match (&config.sources.web_search_url, config.web_search_api_key()) {
        (Some(url), Some(key)) => Arc::new(RetryWebSearch::new(Arc::new(SerpApiSearch::new(
            url.clone(),
            key,
        )))),
        _ => Arc::new(DisabledSource("web")),
    }
}

fn live_provider(config: &Config) -> Arc<dyn LiveFeedProvider> {
    match &config.sources.live_feed_url {
        Some(url) => Arc::new(HttpLiveFeed::new(url.clone())),
        None => Arc::new(DisabledSource("live")),
    }
}

/// Stand-in for a source with no endpoint configured. The aggregator treats
/// its error like any other source failure, so reports still generate.
struct DisabledSource(&'static str);

#[async_trait::async_trait]
impl SemanticSearchProvider for DisabledSource {
    async fn search(
        &self,
        _query: &str,
        _account_id: &str,
        _limit: usize,
    ) -> Result<Vec<RetrievalItem>, SurveyorError> {
        Err(not_configured(self.0))
    }
}

#[async_trait::async_trait]
impl WebSearchProvider for DisabledSource {
    async fn search(
        &self,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<RetrievalItem>, SurveyorError> {
        Err(not_configured(self.0))
    }
}

#[async_trait::async_trait]
impl LiveFeedProvider for DisabledSource {
    async fn search(&self, _query: &str) -> Result<Vec<RetrievalItem>, SurveyorError> {
        Err(not_configured(self.0))
    }
}

fn not_configured(source: &str) -> SurveyorError {
    SurveyorError::SourceUnavailable {
        source: source.to_string(),
        message: "no endpoint configured".into(),
        retriable: false,
    }
}

/// Used when no generator API key is present; every request fails cleanly
/// (and free of charge) instead of hanging.
struct UnconfiguredGenerator;

#[async_trait::async_trait]
impl AnswerGenerator for UnconfiguredGenerator {
    async fn synthesize(&self, _question: &str, _context: &str) -> Result<String, SurveyorError> {
        Err(SurveyorError::Generation {
            message: "No generator API key configured. Set GEMINI_API_KEY.".into(),
            retriable: false,
        })
    }
}
