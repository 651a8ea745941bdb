use octostats::{
    config::AppConfig,
    create_app,
    events::EventHandler,
    github::GitHubClient,
    queue::{self, EventQueue},
    repository::{GitHubRepository, Repository},
    run_once,
    store::{build_store, Store},
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "octostats=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Invalid configuration: {}. Exiting.", e);
            std::process::exit(1);
        }
    };

    let (repo, store) = match build(&config) {
        Ok(parts) => parts,
        Err(e) => {
            tracing::error!("Failed to initialize: {:#}. Exiting.", e);
            std::process::exit(1);
        }
    };

    if let Some(port) = config.webhook_port {
        let handler = EventHandler::new(
            config.repository.clone(),
            Arc::clone(&store),
            config.webhook_dedup_ttl(),
        );
        if let Err(e) = start_webhook_server(port, handler).await {
            tracing::error!("Failed to start webhook server: {:#}. Exiting.", e);
            std::process::exit(1);
        }
    }

    tracing::info!(repo = %config.repository, "Starting metrics collection");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let Some(frequency) = config.update_frequency else {
        tokio::select! {
            result = run_once(&repo, store.as_ref()) => exit_on_failure(result),
            _ = &mut shutdown => {}
        }
        return;
    };

    let mut ticker = tokio::time::interval(frequency);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => break,
        }

        // Dropping the pass on shutdown aborts its in-flight requests.
        tokio::select! {
            result = run_once(&repo, store.as_ref()) => exit_on_failure(result),
            _ = &mut shutdown => break,
        }
    }
}

fn exit_on_failure(result: anyhow::Result<()>) {
    if let Err(e) = result {
        tracing::error!("Collection failed: {:#}", e);
        std::process::exit(1);
    }
}

fn build(config: &AppConfig) -> anyhow::Result<(Arc<dyn Repository>, Arc<dyn Store>)> {
    let token = config.github_token()?;
    if token.is_none() {
        tracing::warn!("No GitHub token configured, using the anonymous rate limit");
    }

    let client = GitHubClient::new(token, &config.github_api_url, config.request_timeout)?;
    let repo: Arc<dyn Repository> =
        Arc::new(GitHubRepository::new(config.repository.clone(), client));
    let store = build_store(config)?;
    Ok((repo, store))
}

async fn start_webhook_server(port: u16, handler: EventHandler) -> anyhow::Result<()> {
    let (queue, receiver) = EventQueue::new();
    queue::spawn_consumer(receiver, handler);

    let app = create_app(Arc::new(AppState::new(queue)));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Webhook server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            tracing::error!("Webhook server stopped: {}", e);
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}
