use pcbook::{
    create_http_router, error::StartupError, init_tracing, seed_demo_users, serve_grpc,
    shutdown_telemetry, AppState, Config,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    init_tracing(&config);

    info!(
        service = "pcbook",
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Starting server"
    );

    let issues = config.validate_for_production();
    for issue in &issues {
        warn!(issue = %issue, "Configuration warning");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Server failed");
        shutdown_telemetry();
        std::process::exit(1);
    }

    shutdown_telemetry();

    info!("Server shutdown complete");
}

async fn run(config: Config) -> Result<(), StartupError> {
    let state = AppState::new(&config)?;

    if config.security.seed_demo_users {
        seed_demo_users(&state).await?;
    }

    let http_listener = bind(&config.http_addr()).await?;
    let grpc_listener = bind(&config.grpc_addr()).await?;

    info!(http_address = %config.http_addr(), "HTTP server ready");
    info!(grpc_address = %config.grpc_addr(), "gRPC server ready");

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let app = create_http_router(state.clone());
    let http_server = {
        let mut shutdown_rx = shutdown_tx.subscribe();
        async move {
            axum::serve(http_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
        }
    };

    let grpc_server = {
        let mut shutdown_rx = shutdown_tx.subscribe();
        let state = state.clone();
        async move {
            serve_grpc(&state, grpc_listener, async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
        }
    };

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = http_server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        result = grpc_server => result?,
        _ = ctrl_c => {}
    }

    let _ = shutdown_tx.send(());

    Ok(())
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}
