use workmesh::config::CoordinatorConfig;
use workmesh::coordinator::{server, CoordinatorHandle};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    workmesh::telemetry::init();

    let config = CoordinatorConfig::default();
    let port = config.port;
    let handle = CoordinatorHandle::spawn(config);
    register_builtin_bundles(&handle).await;
    let app = server::router(handle);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(%port, "coordinator listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
}

/// Seeds the registry with the fixed library of nameable tasks (see
/// `worker::tasks::build`) so `task:submit {code: "counting", ...}` resolves
/// without requiring every submitter to register it first. Each bundle's
/// `code` field carries the task's step-count parameter, parsed by the
/// worker at assignment time.
async fn register_builtin_bundles(handle: &CoordinatorHandle) {
    handle
        .register_bundle("counting", "100", "counts from zero up to a target, one step at a time")
        .await;
    handle
        .register_bundle("fibonacci", "30", "computes the nth Fibonacci number, one term per step")
        .await;
}
