//! In-process queue between the webhook ingress and the event handler.

use crate::events::EventHandler;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEvent {
    /// `X-GitHub-Delivery` header, unique per delivery.
    pub delivery_id: Option<String>,
    pub payload: Vec<u8>,
}

#[derive(Clone)]
pub struct EventQueue {
    sender: mpsc::UnboundedSender<QueuedEvent>,
}

impl EventQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<QueuedEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Enqueues an event. Fails only when the consumer has stopped.
    pub fn push(&self, event: QueuedEvent) -> Result<(), mpsc::error::SendError<QueuedEvent>> {
        self.sender.send(event)
    }
}

/// Drains the queue into `handler` until every sender is dropped.
pub fn spawn_consumer(
    mut receiver: mpsc::UnboundedReceiver<QueuedEvent>,
    handler: EventHandler,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Starting webhook event consumer");
        while let Some(event) = receiver.recv().await {
            handler
                .handle(event.delivery_id.as_deref(), &event.payload)
                .await;
        }
        tracing::info!("Webhook event consumer stopped");
    })
}
