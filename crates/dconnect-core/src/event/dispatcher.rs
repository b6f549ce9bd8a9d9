use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};

use crate::event::Event;
use crate::event::error::EventSystemError;

// This type represents an owned future returned by a listener delivery
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Bridges an event type to a listener type.
///
/// Implemented for listener trait objects (`dyn SomeListener`) so a dispatcher
/// can keep `Arc<dyn SomeListener>` values and still call their typed callbacks.
pub trait Listens<E>: Send + Sync {
    fn deliver<'a>(&'a self, event: &'a E) -> BoxFuture<'a>;
}

enum QueueItem<E> {
    Event(E),
    Flush(oneshot::Sender<()>),
}

/// Bounded event queue with a single consumer task.
///
/// Must be created from within a Tokio runtime: construction spawns the worker.
/// The worker exits once every clone of the dispatcher has been dropped.
pub struct EventDispatcher<E, L: ?Sized> {
    name: &'static str,
    listeners: Arc<Mutex<Vec<Arc<L>>>>,
    sender: mpsc::Sender<QueueItem<E>>,
}

impl<E, L: ?Sized> Clone for EventDispatcher<E, L> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            listeners: self.listeners.clone(),
            sender: self.sender.clone(),
        }
    }
}

// Manual Debug impl, listeners are opaque
impl<E, L: ?Sized> fmt::Debug for EventDispatcher<E, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("name", &self.name)
            .field("listeners", &self.listener_count())
            .field("queue_capacity", &self.sender.max_capacity())
            .finish()
    }
}

impl<E, L> EventDispatcher<E, L>
where
    E: Event,
    L: ?Sized + Listens<E> + 'static,
{
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let listeners = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(run_worker(name, receiver, listeners.clone()));
        Self {
            name,
            listeners,
            sender,
        }
    }

    /// Queue an event; waits for room when the queue is full
    pub async fn publish(&self, event: E) -> Result<(), EventSystemError> {
        let event_name = event.name();
        self.sender
            .send(QueueItem::Event(event))
            .await
            .map_err(|_| EventSystemError::QueueClosed {
                dispatcher: self.name.to_string(),
                event_name: event_name.to_string(),
            })
    }

    /// Wait until every event queued before this call has been delivered
    pub async fn flush(&self) -> Result<(), EventSystemError> {
        let (ack, done) = oneshot::channel();
        let failed = || EventSystemError::FlushFailed {
            dispatcher: self.name.to_string(),
        };
        self.sender.send(QueueItem::Flush(ack)).await.map_err(|_| failed())?;
        done.await.map_err(|_| failed())
    }
}

impl<E, L: ?Sized> EventDispatcher<E, L> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a listener. Returns `false` if this exact listener is already registered.
    pub fn add_listener(&self, listener: Arc<L>) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if listeners.iter().any(|l| std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(&listener))) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| !std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)));
        listeners.len() < before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

async fn run_worker<E, L>(
    name: &'static str,
    mut receiver: mpsc::Receiver<QueueItem<E>>,
    listeners: Arc<Mutex<Vec<Arc<L>>>>,
) where
    E: Event,
    L: ?Sized + Listens<E> + 'static,
{
    while let Some(item) = receiver.recv().await {
        match item {
            QueueItem::Event(event) => {
                // Snapshot so listeners may (un)register from inside a callback
                let snapshot: Vec<Arc<L>> = listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                log::trace!("{}: delivering '{}' to {} listener(s)", name, event.name(), snapshot.len());
                for listener in snapshot {
                    listener.deliver(&event).await;
                }
            }
            QueueItem::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    log::debug!("{}: event queue closed", name);
}
