//! Notification handoff and subscriber delivery
//!
//! The background reader never calls application code. It posts
//! [`Notification`]s onto a queue; whoever owns the [`AmiClient`](crate::AmiClient)
//! drains that queue and the handlers run there, one at a time, in wire
//! order.

use tokio::sync::mpsc;
use tracing::trace;

use crate::{connection::DisconnectReason, packet::Packet, session::Lifecycle};

/// Something the session wants the application to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Notification {
    /// A non-empty packet from the server, delivered for every packet
    /// including those that also produce a lifecycle notification.
    Event(Packet),
    /// The server accepted the login.
    LoginSuccess,
    /// The server rejected the login.
    LoginFailed,
    /// The session ended: server Goodbye, or the transport dropped while
    /// logged in.
    Logoff,
    /// The background reader stopped.
    Disconnected(DisconnectReason),
}

impl Notification {
    /// Subscription category this notification is delivered to.
    pub fn category(&self) -> EventCategory {
        match self {
            Notification::Event(_) => EventCategory::Event,
            Notification::LoginSuccess => EventCategory::LoginSuccess,
            Notification::LoginFailed => EventCategory::LoginFailed,
            Notification::Logoff => EventCategory::Logoff,
            Notification::Disconnected(_) => EventCategory::Disconnect,
        }
    }
}

impl From<Lifecycle> for Notification {
    fn from(lifecycle: Lifecycle) -> Self {
        match lifecycle {
            Lifecycle::LoginSuccess => Notification::LoginSuccess,
            Lifecycle::LoginFailed => Notification::LoginFailed,
            Lifecycle::Logoff => Notification::Logoff,
        }
    }
}

/// Subscription categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Every non-empty packet.
    Event,
    /// Login accepted.
    LoginSuccess,
    /// Login rejected.
    LoginFailed,
    /// Session ended.
    Logoff,
    /// Reader stopped; carries the [`DisconnectReason`].
    Disconnect,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&Notification) + Send>;

struct Subscription {
    id: SubscriptionId,
    category: EventCategory,
    handler: Handler,
}

/// Posting side of the dispatch queue, owned by the reader task.
#[derive(Debug, Clone)]
pub(crate) struct DispatchQueue {
    tx: mpsc::UnboundedSender<Notification>,
}

impl DispatchQueue {
    /// Hand a notification to the owning context. Returns `false` if the
    /// client is gone.
    pub(crate) fn post(&self, notification: Notification) -> bool {
        trace!("[DISPATCH] Posting {:?}", notification.category());
        self.tx
            .send(notification)
            .is_ok()
    }
}

/// Receiving side plus the subscriber set.
pub(crate) struct Dispatcher {
    rx: mpsc::UnboundedReceiver<Notification>,
    // Keeps the channel open across reader restarts.
    queue: DispatchQueue,
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            queue: DispatchQueue { tx },
            subscriptions: Vec::new(),
            next_id: 0,
        }
    }

    pub(crate) fn queue(&self) -> DispatchQueue {
        self.queue
            .clone()
    }

    pub(crate) fn subscribe(
        &mut self,
        category: EventCategory,
        handler: impl FnMut(&Notification) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions
            .push(Subscription {
                id,
                category,
                handler: Box::new(handler),
            });
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self
            .subscriptions
            .len();
        self.subscriptions
            .retain(|s| s.id != id);
        self.subscriptions
            .len()
            != before
    }

    /// Run every handler of the notification's category, in registration
    /// order. No handler registered is not an error.
    fn deliver(&mut self, notification: &Notification) {
        let category = notification.category();
        for sub in self
            .subscriptions
            .iter_mut()
            .filter(|s| s.category == category)
        {
            (sub.handler)(notification);
        }
    }

    /// Deliver everything already queued without waiting.
    pub(crate) fn dispatch_pending(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(notification) = self
            .rx
            .try_recv()
        {
            self.deliver(&notification);
            delivered += 1;
        }
        delivered
    }

    /// Wait for one notification and deliver it.
    pub(crate) async fn dispatch_next(&mut self) -> Option<EventCategory> {
        let notification = self
            .rx
            .recv()
            .await?;
        self.deliver(&notification);
        Some(notification.category())
    }
}
