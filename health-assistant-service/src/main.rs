use health_assistant_service::{
    AppState, InMemoryUserStore, PostgresUserStore, ServiceConfig, SessionRegistry, UserStore,
    build_router,
};
use health_flow::{GenerationInvoker, HealthAssistant, openrouter_backend};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured tracing; `LOG_FORMAT=pretty` for development.
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "health_assistant_service=debug,health_flow=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

async fn create_user_store(database_url: Option<&str>) -> anyhow::Result<Arc<dyn UserStore>> {
    if let Some(database_url) = database_url {
        info!("Using PostgreSQL user store");
        match PostgresUserStore::connect(database_url).await {
            Ok(store) => return Ok(Arc::new(store)),
            Err(e) => error!(
                "Failed to connect to PostgreSQL: {}. Falling back to in-memory user store.",
                e
            ),
        }
    } else {
        info!("Using in-memory user store (set DATABASE_URL to use PostgreSQL)");
    }
    Ok(Arc::new(InMemoryUserStore::with_demo_user()?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServiceConfig::from_env().inspect_err(|e| error!("Invalid configuration: {}", e))?;
    info!(?config, "Configuration loaded");

    let backend = openrouter_backend(&config.openrouter_api_key, &config.llm_model)
        .with_temperature(config.llm_temperature);
    let invoker =
        GenerationInvoker::new(Arc::new(backend)).with_max_tool_rounds(config.max_tool_rounds);

    let app_state = AppState {
        assistant: HealthAssistant::with_invoker(invoker),
        users: create_user_store(config.database_url.as_deref()).await?,
        sessions: SessionRegistry::with_ttl(config.session_ttl),
        generation_timeout: config.generation_timeout,
        max_upload_bytes: config.max_upload_bytes,
    };

    let app = build_router(app_state);
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    let addr = listener.local_addr()?;

    info!("Health Assistant Service starting on {}", addr);
    info!("API index available at http://{}/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
