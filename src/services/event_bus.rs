//! EventBus service for scheduling lifecycle events.
//!
//! Every published event is stamped with an id, a monotonically increasing
//! sequence number and a timestamp, then delivered to each live subscriber
//! over its own unbounded channel. A subscriber sees every event published
//! after it subscribed, in emission order, and no slow subscriber can make
//! another one miss events.
//!
//! `publish` is synchronous and never blocks, so the scheduler can emit
//! from inside its critical section and emission order matches the order
//! in which state changes were applied.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing sequence number assigned by EventBus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    pub fn zero() -> Self {
        Self(0)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Event severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

/// Named lifecycle events observers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "agent.registered")]
    AgentRegistered,
    #[serde(rename = "agent.unregistered")]
    AgentUnregistered,
    #[serde(rename = "task.assigned")]
    TaskAssigned,
    #[serde(rename = "task.reassigned")]
    TaskReassigned,
    #[serde(rename = "task.started")]
    TaskStarted,
    #[serde(rename = "task.completed")]
    TaskCompleted,
    #[serde(rename = "task.failed")]
    TaskFailed,
    #[serde(rename = "task.scheduling_failed")]
    TaskSchedulingFailed,
}

impl EventName {
    pub const ALL: [Self; 8] = [
        Self::AgentRegistered,
        Self::AgentUnregistered,
        Self::TaskAssigned,
        Self::TaskReassigned,
        Self::TaskStarted,
        Self::TaskCompleted,
        Self::TaskFailed,
        Self::TaskSchedulingFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentRegistered => "agent.registered",
            Self::AgentUnregistered => "agent.unregistered",
            Self::TaskAssigned => "task.assigned",
            Self::TaskReassigned => "task.reassigned",
            Self::TaskStarted => "task.started",
            Self::TaskCompleted => "task.completed",
            Self::TaskFailed => "task.failed",
            Self::TaskSchedulingFailed => "task.scheduling_failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.as_str() == s)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SchedulingEvent {
    AgentRegistered {
        agent_id: String,
    },
    AgentUnregistered {
        agent_id: String,
    },
    TaskAssigned {
        task_id: String,
        subtask_id: String,
        agent_id: String,
    },
    TaskReassigned {
        task_id: String,
        subtask_id: String,
        from_agent_id: String,
        to_agent_id: String,
    },
    TaskStarted {
        task_id: String,
        subtask_id: String,
        agent_id: String,
    },
    TaskCompleted {
        task_id: String,
        subtask_id: String,
        agent_id: String,
    },
    TaskFailed {
        task_id: String,
        subtask_id: String,
        agent_id: String,
        error: String,
    },
    TaskSchedulingFailed {
        task_id: String,
        subtask_id: String,
        reason: String,
    },
}

impl SchedulingEvent {
    pub fn name(&self) -> EventName {
        match self {
            Self::AgentRegistered { .. } => EventName::AgentRegistered,
            Self::AgentUnregistered { .. } => EventName::AgentUnregistered,
            Self::TaskAssigned { .. } => EventName::TaskAssigned,
            Self::TaskReassigned { .. } => EventName::TaskReassigned,
            Self::TaskStarted { .. } => EventName::TaskStarted,
            Self::TaskCompleted { .. } => EventName::TaskCompleted,
            Self::TaskFailed { .. } => EventName::TaskFailed,
            Self::TaskSchedulingFailed { .. } => EventName::TaskSchedulingFailed,
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            Self::TaskFailed { .. } => EventSeverity::Error,
            Self::TaskSchedulingFailed { .. } => EventSeverity::Warning,
            _ => EventSeverity::Info,
        }
    }

    /// Subtask id for task events.
    pub fn subtask_id(&self) -> Option<&str> {
        match self {
            Self::AgentRegistered { .. } | Self::AgentUnregistered { .. } => None,
            Self::TaskAssigned { subtask_id, .. }
            | Self::TaskReassigned { subtask_id, .. }
            | Self::TaskStarted { subtask_id, .. }
            | Self::TaskCompleted { subtask_id, .. }
            | Self::TaskFailed { subtask_id, .. }
            | Self::TaskSchedulingFailed { subtask_id, .. } => Some(subtask_id),
        }
    }
}

/// Event envelope carrying delivery metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub id: EventId,
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub severity: EventSeverity,
    pub payload: SchedulingEvent,
}

impl BusEvent {
    pub fn name(&self) -> EventName {
        self.payload.name()
    }
}

/// Async observer driven by [`EventBus::on`].
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event. Errors are logged and do not stop delivery.
    async fn handle(&self, event: &BusEvent) -> Result<(), String>;
}

/// Receiving side of a subscription.
#[derive(Debug)]
pub struct EventSubscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<BusEvent>,
}

impl EventSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event. `None` once unsubscribed or the bus is gone.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        self.receiver.recv().await
    }

    /// Next already-delivered event, if any.
    pub fn try_recv(&mut self) -> Option<BusEvent> {
        self.receiver.try_recv().ok()
    }

    /// Every already-delivered event, in order.
    pub fn drain(&mut self) -> Vec<BusEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

struct Subscriber {
    id: SubscriptionId,
    filter: Option<EventName>,
    sender: mpsc::UnboundedSender<BusEvent>,
}

/// Caller-owned event bus. Share it with `Arc`.
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    sequence: AtomicU64,
    next_subscription: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("sequence", &self.current_sequence())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(0),
            next_subscription: AtomicU64::new(0),
        }
    }

    /// Publish an event and return the stamped envelope.
    pub fn publish(&self, payload: SchedulingEvent) -> BusEvent {
        let mut subscribers = self.subscribers.lock();

        // Sequence is taken under the lock so delivery order matches numbering
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let event = BusEvent {
            id: EventId::new(),
            sequence: SequenceNumber(seq),
            timestamp: Utc::now(),
            severity: payload.severity(),
            payload,
        };

        tracing::debug!(
            event = event.name().as_str(),
            sequence = seq,
            "Publishing scheduling event"
        );

        let name = event.name();
        subscribers.retain(|subscriber| {
            if subscriber.filter.is_some_and(|filter| filter != name) {
                return !subscriber.sender.is_closed();
            }
            subscriber.sender.send(event.clone()).is_ok()
        });

        event
    }

    /// Subscribe to one named event.
    pub fn subscribe(&self, name: EventName) -> EventSubscription {
        self.add_subscriber(Some(name))
    }

    /// Subscribe to every event.
    pub fn subscribe_all(&self) -> EventSubscription {
        self.add_subscriber(None)
    }

    /// Drive `handler` for every `name` event on a spawned task.
    ///
    /// Must be called from within a tokio runtime. The task exits once the
    /// subscription is removed with [`unsubscribe`](Self::unsubscribe).
    pub fn on(&self, name: EventName, handler: Arc<dyn EventHandler>) -> (SubscriptionId, JoinHandle<()>) {
        let mut subscription = self.subscribe(name);
        let id = subscription.id();
        let handle = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                if let Err(err) = handler.handle(&event).await {
                    tracing::warn!(
                        event = event.name().as_str(),
                        sequence = event.sequence.0,
                        error = %err,
                        "Event handler failed"
                    );
                }
            }
        });
        (id, handle)
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        subscribers.len() != before
    }

    /// Get the next sequence number to be assigned.
    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }

    /// Get the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn add_subscriber(&self, filter: Option<EventName>) -> EventSubscription {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().push(Subscriber { id, filter, sender });
        EventSubscription { id, receiver }
    }
}
