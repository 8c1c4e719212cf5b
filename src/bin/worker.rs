use workmesh::config::WorkerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    workmesh::telemetry::init();

    let config = WorkerConfig::default();
    tracing::info!(coordinator_url = %config.coordinator_url, "connecting to coordinator");
    workmesh::worker::client::run(config).await?;
    Ok(())
}
