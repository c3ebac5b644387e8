// Offload worker task
//
// One worker per compressed stream executes the blocking hardware verbs:
// buffer waits and drains. The stream queues commands and keeps going; the
// worker snapshots the endpoint handle under the stream lock, releases the
// lock for the wait itself, and announces completion through the stream's
// event channel. Commands dequeued after the endpoint closed are dropped.

use colored::*;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audio::offload::{OffloadCommand, OffloadEvent};
use crate::audio::platform::PlatformDriver;
use crate::audio::stream::output::OutputState;
use crate::audio::types::DrainMode;
use crate::route_debug;

pub struct OffloadWorker {
    command_tx: mpsc::UnboundedSender<OffloadCommand>,
    worker_handle: Option<JoinHandle<()>>,
    stream_id: Uuid,
}

impl OffloadWorker {
    pub(crate) fn spawn(
        stream_id: Uuid,
        driver: Arc<dyn PlatformDriver>,
        state: Arc<Mutex<OutputState>>,
        events: broadcast::Sender<OffloadEvent>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        info!(
            "🚀 {}: Starting offload worker for stream {}",
            "OFFLOAD_WORKER".on_cyan().white(),
            stream_id
        );

        let worker_handle = tokio::spawn(async move {
            Self::command_loop(stream_id, driver, state, events, command_rx).await;
        });

        Self {
            command_tx,
            worker_handle: Some(worker_handle),
            stream_id,
        }
    }

    /// Queue a command; false means the worker already exited
    pub fn send(&self, command: OffloadCommand) -> bool {
        self.command_tx.send(command).is_ok()
    }

    async fn command_loop(
        stream_id: Uuid,
        driver: Arc<dyn PlatformDriver>,
        state: Arc<Mutex<OutputState>>,
        events: broadcast::Sender<OffloadEvent>,
        mut command_rx: mpsc::UnboundedReceiver<OffloadCommand>,
    ) {
        while let Some(command) = command_rx.recv().await {
            if command == OffloadCommand::Exit {
                break;
            }

            // Snapshot the handle, then run the verb with the stream lock
            // released so pause/flush/standby stay responsive
            let handle = { state.lock().await.handle };
            let Some(handle) = handle else {
                route_debug!(
                    "Offload stream {}: dropping {:?}, endpoint closed",
                    stream_id,
                    command
                );
                continue;
            };

            match command {
                OffloadCommand::WaitForBuffer => match driver.wait_for_buffer(handle).await {
                    Ok(()) => {
                        let _ = events.send(OffloadEvent::WriteReady);
                    }
                    Err(e) => {
                        warn!(
                            "⚠️ Offload stream {}: buffer wait failed: {}",
                            stream_id, e
                        );
                        let _ = events.send(OffloadEvent::Error);
                    }
                },
                OffloadCommand::PartialDrain | OffloadCommand::Drain => {
                    let mode = if command == OffloadCommand::PartialDrain {
                        DrainMode::EarlyNotify
                    } else {
                        DrainMode::All
                    };
                    match driver.offload_drain(handle, mode).await {
                        Ok(()) => {
                            if mode == DrainMode::EarlyNotify {
                                // Next track needs its own trim counts
                                state.lock().await.resend_metadata = true;
                            }
                            let _ = events.send(OffloadEvent::DrainReady);
                        }
                        Err(e) => {
                            warn!("⚠️ Offload stream {}: drain failed: {}", stream_id, e);
                            let _ = events.send(OffloadEvent::Error);
                        }
                    }
                }
                OffloadCommand::Error => {
                    let _ = events.send(OffloadEvent::Error);
                }
                OffloadCommand::Exit => break,
            }
        }

        info!(
            "🛑 {}: Offload worker for stream {} ended",
            "OFFLOAD_WORKER".on_cyan().white(),
            stream_id
        );
    }

    /// Stop the worker: queue Exit, wait for the loop to finish, then force
    /// termination if a hardware wait never returns. Commands still queued
    /// behind Exit are discarded with the channel.
    pub async fn shutdown(&mut self) {
        let _ = self.command_tx.send(OffloadCommand::Exit);

        if let Some(handle) = self.worker_handle.take() {
            let abort = handle.abort_handle();
            match tokio::time::timeout(std::time::Duration::from_secs(2), handle).await {
                Ok(_) => info!(
                    "✅ {}: Offload worker for stream {} shut down",
                    "OFFLOAD_WORKER".on_cyan().white(),
                    self.stream_id
                ),
                Err(_) => {
                    abort.abort();
                    warn!(
                        "⚠️ {}: Offload worker for stream {} force-terminated after timeout",
                        "OFFLOAD_WORKER".on_cyan().white(),
                        self.stream_id
                    );
                }
            }
        }
    }
}

impl Drop for OffloadWorker {
    fn drop(&mut self) {
        let _ = self.command_tx.send(OffloadCommand::Exit);
    }
}
