//! workmesh: a distributed task-execution platform where running tasks can
//! move between worker nodes mid-execution, either by fresh restart ("weak"
//! migration) or by resuming from a checkpoint ("strong" migration).
//!
//! The coordinator (`coordinator`) holds the authoritative node and task
//! tables behind a single-writer actor and exposes them over a websocket
//! control channel (`coordinator::server`). Workers (`worker`) connect to
//! that channel, execute tasks from the built-in library (`worker::tasks`),
//! and respond to pause/checkpoint requests during a migration transaction.

pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod event_bus;
pub mod model;
pub mod protocol;
pub mod registry;
pub mod telemetry;
pub mod worker;
