//! Async service wrapper around the engine.
//!
//! One task owns the engine: commands and queries arrive on an inbox, ticks
//! fire when the scheduler's interval elapses with nothing queued. That
//! single consumer is what makes the runtime single-writer; callers hold a
//! cheap cloneable handle and the event stream fans out over broadcast.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{EngineError, Result};
use crate::events::EventRecord;

use super::commands::{Command, CommandOutcome, QueryRequest, QueryResponse};
use super::engine::Engine;

/// Inbox depth; senders back-pressure beyond this.
const INBOX_CAPACITY: usize = 64;

enum Envelope {
    Command {
        command: Command,
        deadline: Option<DateTime<Utc>>,
        reply: oneshot::Sender<Result<CommandOutcome>>,
    },
    Query {
        query: QueryRequest,
        deadline: Option<DateTime<Utc>>,
        reply: oneshot::Sender<Result<QueryResponse>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ============================================================================
// HANDLE
// ============================================================================

/// Cheap cloneable handle to a running engine task.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Envelope>,
}

impl EngineHandle {
    /// Apply a command.
    pub async fn command(&self, command: Command) -> Result<CommandOutcome> {
        self.command_with_deadline(command, None).await
    }

    /// Apply a command, rejected with `Busy` if not picked up by the
    /// deadline.
    pub async fn command_with_deadline(
        &self,
        command: Command,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<CommandOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope::Command {
                command,
                deadline,
                reply,
            })
            .await
            .map_err(|_| EngineError::Transient("engine task stopped".to_string()))?;
        rx.await
            .map_err(|_| EngineError::Transient("engine task dropped reply".to_string()))?
    }

    /// Serve a query.
    pub async fn query(&self, query: QueryRequest) -> Result<QueryResponse> {
        self.query_with_deadline(query, None).await
    }

    /// Serve a query with a soft deadline; a missed deadline yields a
    /// partial-flagged response rather than an error.
    pub async fn query_with_deadline(
        &self,
        query: QueryRequest,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<QueryResponse> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope::Query {
                query,
                deadline,
                reply,
            })
            .await
            .map_err(|_| EngineError::Transient("engine task stopped".to_string()))?;
        rx.await
            .map_err(|_| EngineError::Transient("engine task dropped reply".to_string()))?
    }

    /// Stop the engine task after it drains in-flight work.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Envelope::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

// ============================================================================
// SERVICE
// ============================================================================

/// Spawner for the engine task.
pub struct EngineService;

impl EngineService {
    /// Move the engine onto its own task.
    ///
    /// Returns the command handle, an event subscription opened before the
    /// first tick (so no events are missed), and the join handle.
    pub fn spawn(
        mut engine: Engine,
    ) -> (
        EngineHandle,
        broadcast::Receiver<EventRecord>,
        JoinHandle<()>,
    ) {
        let events = engine.subscribe();
        let (tx, mut rx) = mpsc::channel(INBOX_CAPACITY);

        let join = tokio::spawn(async move {
            loop {
                let dt = engine.current_dt();
                tokio::select! {
                    envelope = rx.recv() => {
                        match envelope {
                            None => break,
                            Some(Envelope::Shutdown { reply }) => {
                                let _ = reply.send(());
                                break;
                            }
                            Some(Envelope::Command { command, deadline, reply }) => {
                                let outcome = if deadline.is_some_and(|d| Utc::now() > d) {
                                    Err(EngineError::Busy)
                                } else {
                                    engine.execute_command(command)
                                };
                                let _ = reply.send(outcome);
                            }
                            Some(Envelope::Query { query, deadline, reply }) => {
                                let _ = reply.send(
                                    engine.execute_query_with_deadline(query, deadline),
                                );
                            }
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_secs_f64(dt)) => {
                        engine.tick_with_dt(dt);
                    }
                }
            }
            tracing::info!("engine task stopped");
        });

        (EngineHandle { tx }, events, join)
    }
}

// ============================================================================
// TESTS
// ============================================================================
