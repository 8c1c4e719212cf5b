//! HTTP + websocket front door: a small `Router` with `with_state`, one
//! upgrade handler that splits the socket and pumps an outbound `mpsc`
//! queue into the writer half while reading inbound frames on the same
//! task.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use crate::coordinator::actor::CoordinatorHandle;
use crate::model::NodeId;
use crate::protocol::{
    Envelope, EventKind, MigrationRequestPayload, NodeRegistration, TaskCompleteReport,
    TaskErrorReport, TaskProgressReport, TaskSubmission,
};

pub fn router(handle: CoordinatorHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_upgrade))
        .with_state(handle)
}

async fn health(State(handle): State<CoordinatorHandle>) -> impl IntoResponse {
    let snapshot = handle.snapshot().await;
    let registry = handle.registry_stats().await;
    Json(json!({
        "status": "ok",
        "nodes": snapshot.nodes.len(),
        "tasks": snapshot.tasks.len(),
        "bundles": registry.total_bundles,
        "checkpoints": registry.total_checkpoints,
    }))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(handle): State<CoordinatorHandle>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, handle))
}

async fn handle_socket(socket: WebSocket, handle: CoordinatorHandle) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Envelope>();

    let forward = tokio::spawn(async move {
        while let Some(envelope) = out_rx.recv().await {
            let Ok(text) = serde_json::to_string(&envelope) else { continue };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut node_id: Option<NodeId> = None;
    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else { continue };
        let Ok(envelope) = serde_json::from_str::<Envelope>(&text) else {
            tracing::warn!("dropping malformed control-channel frame");
            continue;
        };
        node_id = dispatch(&handle, &out_tx, node_id, envelope).await;
    }

    if let Some(node_id) = node_id {
        handle.disconnect(node_id).await;
    }
    forward.abort();
}

async fn dispatch(
    handle: &CoordinatorHandle,
    out_tx: &mpsc::UnboundedSender<Envelope>,
    node_id: Option<NodeId>,
    envelope: Envelope,
) -> Option<NodeId> {
    match envelope.event {
        EventKind::NodeRegister => {
            let Ok(registration) = serde_json::from_value::<NodeRegistration>(envelope.payload) else {
                return node_id;
            };
            let id = handle
                .register_node(registration.name, registration.role, registration.address)
                .await;
            handle.connect_sender(id, out_tx.clone()).await;
            let _ = out_tx.send(Envelope::new(EventKind::NodeRegistered, json!({ "node_id": id })));
            Some(id)
        }
        EventKind::NodeHeartbeat => {
            if let Some(id) = node_id {
                handle.heartbeat(id).await;
            }
            node_id
        }
        EventKind::NodeStatusUpdate => {
            if let (Some(id), Ok(status)) = (node_id, serde_json::from_value(envelope.payload)) {
                handle.status_update(id, status).await;
            }
            node_id
        }
        EventKind::NodeStats => {
            if let (Some(id), Ok(stats)) =
                (node_id, serde_json::from_value::<crate::protocol::NodeStats>(envelope.payload))
            {
                handle.node_stats_sample(id, stats.cpu_usage, stats.memory_usage).await;
            }
            node_id
        }
        EventKind::TaskSubmit => {
            if let Ok(submission) = serde_json::from_value::<TaskSubmission>(envelope.payload) {
                let result = handle
                    .submit_task(
                        submission.name,
                        submission.code,
                        submission.custom_code,
                        submission.migration_type,
                    )
                    .await;
                match result {
                    Ok(task_id) => {
                        let _ = out_tx.send(Envelope::new(
                            EventKind::TaskSubmitted,
                            json!({ "task_id": task_id }),
                        ));
                    }
                    // §4.1: "If no worker is available, replies task:error."
                    // The task itself stays pending on the coordinator's
                    // table; only the wire reply changes.
                    Err(crate::coordinator::error::CoordinatorError::NoWorkerAvailable(task_id)) => {
                        let _ = out_tx.send(Envelope::new(
                            EventKind::TaskError,
                            TaskErrorReport { task_id, message: "no worker available".to_string() },
                        ));
                    }
                    Err(err) => {
                        let _ = out_tx.send(Envelope::new(
                            EventKind::TaskSubmitted,
                            json!({ "error": err.to_string() }),
                        ));
                    }
                }
            }
            node_id
        }
        EventKind::TaskProgress => {
            if let Ok(report) = serde_json::from_value::<TaskProgressReport>(envelope.payload) {
                handle
                    .task_progress(report.task_id, report.current_step, report.total_steps)
                    .await;
            }
            node_id
        }
        EventKind::TaskComplete => {
            if let Ok(report) = serde_json::from_value::<TaskCompleteReport>(envelope.payload) {
                handle.task_complete(report.task_id, report.result).await;
            }
            node_id
        }
        EventKind::TaskError => {
            if let Ok(report) = serde_json::from_value::<TaskErrorReport>(envelope.payload) {
                handle.task_failed(report.task_id, report.message).await;
            }
            node_id
        }
        EventKind::MigrationRequest => {
            if let Ok(request) = serde_json::from_value::<MigrationRequestPayload>(envelope.payload) {
                let result = handle
                    .request_migration(
                        request.task_id,
                        request.source_node_id,
                        request.target_node_id,
                        request.migration_type,
                    )
                    .await;
                let payload = match result {
                    Ok(()) => json!({ "task_id": request.task_id, "ok": true }),
                    Err(err) => json!({ "task_id": request.task_id, "error": err.to_string() }),
                };
                let _ = out_tx.send(Envelope::new(EventKind::MigrationComplete, payload));
            }
            node_id
        }
        EventKind::CheckpointSaved => {
            if let Ok(checkpoint) = serde_json::from_value(envelope.payload) {
                handle.checkpoint_saved(checkpoint).await;
            }
            node_id
        }
        _ => node_id,
    }
}
