use super::{ChatBackend, ChatRequest};
use crate::app::{AppEvent, ChatEvent};
use crate::debug_hooks;
use crate::error::ChatRequestError;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Handle to the chat worker thread. Dropping it closes the request channel
/// and lets the worker exit after its current request.
pub struct ChatBridge {
    tx: Sender<ChatRequest>,
    _worker: JoinHandle<()>,
}

impl ChatBridge {
    pub fn spawn<B>(backend: B, min_interval: Duration, events: Sender<AppEvent>) -> Self
    where
        B: ChatBackend + 'static,
    {
        let (tx, rx) = mpsc::channel::<ChatRequest>();
        let worker = thread::spawn(move || run_worker(backend, min_interval, rx, events));
        Self {
            tx,
            _worker: worker,
        }
    }

    /// Never blocks on the network.
    pub fn submit(&self, req: ChatRequest) -> Result<(), ChatRequestError> {
        debug_hooks::log_chat_request(req.id, &req.question, req.context.csv.len());
        self.tx.send(req).map_err(|_| ChatRequestError::WorkerGone)
    }
}

/// Only the newest queued request is worth answering; older ones are
/// reported as skipped.
fn newest_pending(first: ChatRequest, rx: &Receiver<ChatRequest>, events: &Sender<AppEvent>) -> ChatRequest {
    let mut newest = first;
    while let Ok(next) = rx.try_recv() {
        let _ = events.send(AppEvent::Chat(ChatEvent::Skipped { id: newest.id }));
        newest = next;
    }
    newest
}

fn run_worker<B: ChatBackend>(
    backend: B,
    min_interval: Duration,
    rx: Receiver<ChatRequest>,
    events: Sender<AppEvent>,
) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            tracing::error!("chat runtime failed to start: {err}");
            let message = ChatRequestError::Runtime(err).to_string();
            while let Ok(req) = rx.recv() {
                let _ = events.send(AppEvent::Chat(ChatEvent::Failed {
                    id: req.id,
                    message: message.clone(),
                }));
            }
            return;
        }
    };

    let mut last_sent: Option<Instant> = None;
    while let Ok(first) = rx.recv() {
        if let Some(prev) = last_sent {
            let since = prev.elapsed();
            if since < min_interval {
                rt.block_on(tokio::time::sleep(min_interval - since));
            }
        }
        // collapse after the wait so questions typed during it are included
        let req = newest_pending(first, &rx, &events);
        last_sent = Some(Instant::now());

        let started = Instant::now();
        let prompt = req.prompt();
        let event = match rt.block_on(backend.generate(&prompt)) {
            Ok(text) => {
                tracing::info!(id = req.id, elapsed_ms = started.elapsed().as_millis() as u64, "chat answer");
                ChatEvent::Answer { id: req.id, text }
            }
            Err(err) => {
                tracing::warn!(id = req.id, "chat request failed: {err}");
                ChatEvent::Failed {
                    id: req.id,
                    message: err.to_string(),
                }
            }
        };

        if events.send(AppEvent::Chat(event)).is_err() {
            break;
        }
    }
}
