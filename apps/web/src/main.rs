mod config;
mod document;
mod errors;
mod evaluation;
mod llm_client;
mod routes;
mod session;
mod speech;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::document::{DocumentPreprocessor, PdftoppmRasterizer};
use crate::evaluation::Evaluator;
use crate::llm_client::GeminiClient;
use crate::routes::build_router;
use crate::session::{SessionController, SessionStore};
use crate::speech::{GoogleTranslateTts, SpeechRenderer};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Tracking Expert v{}", env!("CARGO_PKG_VERSION"));

    if config.google_api_key.is_none() {
        warn!("GOOGLE_API_KEY is not set; evaluations will return an error message");
    }

    // Evaluation client
    let gemini = GeminiClient::new(config.google_api_key.clone());
    let evaluator = Evaluator::new(Arc::new(gemini), config.evaluation_timeout);
    info!(
        "Evaluation client initialized (model: {}, timeout: {}s)",
        llm_client::MODEL,
        config.evaluation_timeout.as_secs()
    );

    // Document preprocessor
    let rasterizer = PdftoppmRasterizer::new(config.pdftoppm_path.clone());
    let preprocessor = DocumentPreprocessor::new(Arc::new(rasterizer));
    info!("PDF rasterizer: {}", config.pdftoppm_path.display());

    // Speech renderer
    let tts = GoogleTranslateTts::new(config.speech_timeout)?;
    let speech = SpeechRenderer::new(Arc::new(tts), config.tts_lang.clone());
    info!("Speech renderer initialized (lang: {})", speech.default_lang());

    // Session store, with idle sessions swept in the background
    let sessions = Arc::new(SessionStore::new());
    sessions.spawn_sweeper(config.session_idle_timeout, config.session_sweep_interval);
    info!(
        "Sessions expire after {}s idle (sweep every {}s)",
        config.session_idle_timeout.as_secs(),
        config.session_sweep_interval.as_secs()
    );

    let state = AppState {
        sessions,
        controller: Arc::new(SessionController::new(preprocessor, evaluator, speech)),
        config: config.clone(),
    };

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
