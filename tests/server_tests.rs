//! Exercises the HTTP surface over a real loopback connection, matching the
//! project's axum integration-test style.

use workmesh::config::CoordinatorConfig;
use workmesh::coordinator::{server, CoordinatorHandle};

#[tokio::test]
async fn health_reports_registered_node_count() {
    let config = CoordinatorConfig { port: 0, ..CoordinatorConfig::default() };
    let handle = CoordinatorHandle::spawn(config);
    handle
        .register_node("w1", workmesh::model::NodeRole::Worker, "127.0.0.1:9")
        .await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(handle);
    let server_task = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["nodes"], 1);

    server_task.abort();
}
