// Card status monitor
//
// The kernel side reports codec card state changes (firmware crash, SSR,
// recovery) through a non-async channel. This service drains that channel
// from a tokio task, keeps an online flag the stream layer can poll without
// locking, and rebroadcasts transitions to whoever subscribed.

use colored::*;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// One card state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CardStatusEvent {
    pub card: u32,
    pub online: bool,
}

pub struct CardStatusMonitor {
    status_tx: Sender<CardStatusEvent>,
    events: broadcast::Sender<CardStatusEvent>,
    online: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    processing_handle: Option<JoinHandle<()>>,
    card: u32,
}

impl CardStatusMonitor {
    pub fn new(card: u32) -> Self {
        let (status_tx, status_rx) = bounded(64);
        let (events, _) = broadcast::channel(32);
        let online = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(AtomicBool::new(false));

        info!(
            "{}: Starting card status monitor for card {}",
            "CARD_MON".on_blue().cyan(),
            card
        );

        let online_clone = online.clone();
        let shutdown_clone = shutdown.clone();
        let events_clone = events.clone();
        let processing_handle = tokio::spawn(async move {
            Self::drain_loop(status_rx, events_clone, online_clone, shutdown_clone).await;
        });

        Self {
            status_tx,
            events,
            online,
            shutdown,
            processing_handle: Some(processing_handle),
            card,
        }
    }

    /// Producer handle for the platform glue that receives kernel events
    pub fn injector(&self) -> Sender<CardStatusEvent> {
        self.status_tx.clone()
    }

    /// Subscribe to card transitions
    pub fn subscribe(&self) -> broadcast::Receiver<CardStatusEvent> {
        self.events.subscribe()
    }

    /// Lock-free online check used on the write path
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Shared flag handed to streams so they can fail fast while offline
    pub fn online_flag(&self) -> Arc<AtomicBool> {
        self.online.clone()
    }

    pub fn card(&self) -> u32 {
        self.card
    }

    async fn drain_loop(
        status_rx: Receiver<CardStatusEvent>,
        events: broadcast::Sender<CardStatusEvent>,
        online: Arc<AtomicBool>,
        shutdown: Arc<AtomicBool>,
    ) {
        while !shutdown.load(Ordering::Relaxed) {
            let mut drained = false;

            loop {
                match status_rx.try_recv() {
                    Ok(event) => {
                        drained = true;
                        let previous = online.swap(event.online, Ordering::SeqCst);
                        if previous == event.online {
                            continue;
                        }

                        if event.online {
                            info!(
                                "{}: Card {} back online",
                                "CARD_MON".on_blue().cyan(),
                                event.card
                            );
                        } else {
                            warn!(
                                "⚠️ {}: Card {} went OFFLINE, failing writes fast",
                                "CARD_MON".on_blue().cyan(),
                                event.card
                            );
                        }

                        let _ = events.send(event);
                    }
                    Err(_) => break,
                }
            }

            if !drained {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        }

        info!("{}: Card status monitor stopped", "CARD_MON".on_blue().cyan());
    }

    pub async fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.processing_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for CardStatusMonitor {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}
