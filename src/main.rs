use anyhow::Context;
use futures::StreamExt;
use scout::{
    AppState, ConfigManager, Orchestrator, Provider, ScoutConfig,
    api::routes::build_app,
    cli::{Cli, Commands, output::Output},
    research::EventPayload,
    tools::{HttpFetcher, search},
    utils::toml_config::ConfigError,
};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command() {
        Commands::Config { validate } => show_config(&cli, &output, validate),
        Commands::Serve => {
            let config = load_config(&cli, &output, true)?;
            init_tracing(&config.config(), cli.log_json);
            serve(config, &output).await
        }
        Commands::Ask {
            query,
            session,
            pipeline,
            json,
        } => {
            let config = load_config(&cli, &output, false)?;
            init_tracing(&config.config(), cli.log_json);
            let session = session.unwrap_or_else(|| format!("cli-{}", Uuid::new_v4().simple()));
            ask(config, &output, &query, &session, pipeline.as_deref(), json).await
        }
    }
}

/// `RUST_LOG` wins over `server.log_level`. Logs go to stderr so `ask --json`
/// keeps stdout clean.
fn init_tracing(config: &ScoutConfig, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scout={0},tower_http={0}", config.server.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Load the config file, falling back to defaults when it does not exist.
fn load_config(cli: &Cli, output: &Output, watch: bool) -> anyhow::Result<Arc<ConfigManager>> {
    let manager = match ConfigManager::new(&cli.config) {
        Ok(manager) => manager,
        Err(ConfigError::FileNotFound(path)) => {
            output.warning(&format!(
                "{} not found, using built-in defaults",
                path.display()
            ));
            ConfigManager::from_config(ScoutConfig::default())
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to load {}", cli.config.display()));
        }
    };

    if watch && manager.path().exists() {
        manager
            .start_watching()
            .context("Failed to start the configuration watcher")?;
    }

    Ok(Arc::new(manager))
}

async fn build_orchestrator(config: Arc<ConfigManager>) -> anyhow::Result<Orchestrator> {
    let snapshot = config.config();

    let provider = Provider::from_config(&snapshot.llm)?;
    let llm = provider
        .create_client()
        .await
        .with_context(|| format!("Failed to create the {} client", provider.name()))?;
    tracing::info!(provider = provider.name(), model = provider.model(), "LLM client ready");

    let search = search::from_config(&snapshot.search)?;
    tracing::info!(provider = search.name(), "Search provider ready");

    Ok(Orchestrator::new(
        config,
        search,
        Arc::new(HttpFetcher::new()),
        Arc::from(llm),
    ))
}

async fn serve(config: Arc<ConfigManager>, output: &Output) -> anyhow::Result<()> {
    output.banner();

    let address = config.config().bind_address();
    let orchestrator = build_orchestrator(Arc::clone(&config)).await?;
    let app = build_app(AppState::new(Arc::new(orchestrator)));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    output.success(&format!("Listening on http://{}", address));
    output.kv("config", &config.path().display().to_string());
    tracing::info!(%address, "Server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    config.stop_watching();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
}

async fn ask(
    config: Arc<ConfigManager>,
    output: &Output,
    query: &str,
    session_id: &str,
    pipeline: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    let (kind, mut events) = orchestrator.stream(query, session_id, pipeline);

    if !json {
        output.header(&format!("{} pipeline", kind));
        output.newline();
    }

    let mut failed = None;
    while let Some(event) = events.next().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            output.event(&event);
        }
        if let EventPayload::Error { code, message, .. } = &event.payload {
            failed = Some(format!("{}: {}", code, message));
        }
    }

    match failed {
        Some(reason) => anyhow::bail!("Run failed ({})", reason),
        None => Ok(()),
    }
}

fn show_config(cli: &Cli, output: &Output, validate_only: bool) -> anyhow::Result<()> {
    let config = match ScoutConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            output.error(&format!("{}: {}", cli.config.display(), err));
            anyhow::bail!("Invalid configuration");
        }
    };

    if validate_only {
        output.success(&format!("{} is valid", cli.config.display()));
        return Ok(());
    }

    output.header("Server");
    output.kv("address", &config.bind_address());
    output.kv("log_level", &config.server.log_level);
    output.kv("cors_origins", &config.server.cors_origins.join(", "));

    output.header("LLM");
    output.kv("provider", &format!("{:?}", config.llm.provider).to_lowercase());
    output.kv("base_url", &config.llm.base_url);
    output.kv("model", &config.llm.model);

    output.header("Search");
    output.kv("provider", &format!("{:?}", config.search.provider).to_lowercase());
    output.kv("max_results", &config.search.max_results.to_string());

    output.header("Research");
    let research = &config.research;
    output.kv("top_k", &research.top_k.to_string());
    output.kv("fetch_timeout_secs", &research.fetch_timeout_secs.to_string());
    output.kv("max_page_bytes", &research.max_page_bytes.to_string());
    output.kv("token_idle_timeout_secs", &research.token_idle_timeout_secs.to_string());

    output.header("Pipelines");
    output.kv("default", &config.pipelines.default);
    for keyword in &config.pipelines.generation_keywords {
        output.list_item(&format!("generation: {}", keyword));
    }
    for keyword in &config.pipelines.research_keywords {
        output.list_item(&format!("research: {}", keyword));
    }

    output.hint("Edit the file while the server runs; new runs pick up the change.");
    Ok(())
}
