//! In-process publish/subscribe bus for flow samples.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fluidflow_types::FlowSample;
use parking_lot::RwLock;
use tokio::sync::broadcast;

/// Default number of samples a slow subscriber may fall behind.
pub const DEFAULT_CAPACITY: usize = 64;

/// Anything the simulator can hand its samples to.
///
/// Publishing is fire-and-forget: there is no acknowledgement and no error,
/// and it must never block the caller.
pub trait SamplePublisher: Send + Sync + Debug {
    fn publish(&self, topic: &str, sample: FlowSample);
}

#[derive(Debug)]
struct Topic {
    tx: broadcast::Sender<FlowSample>,
    published: AtomicU64,
}

impl Topic {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            published: AtomicU64::new(0),
        }
    }
}

/// Topic-keyed broadcast bus.
///
/// Topics are created on first use by either side. Publishing with no
/// subscribers is not an error; the sample is simply dropped. Subscribers
/// that fall more than `capacity` samples behind lose the oldest ones.
///
/// # Example
///
/// ```rust
/// use fluidflow_sdk::{Bus, SamplePublisher};
/// use fluidflow_types::{FlowSample, Timestamp};
///
/// let bus = Bus::new();
/// let mut rx = bus.subscribe("fluid_flow");
///
/// bus.publish("fluid_flow", FlowSample::new(Timestamp::ZERO, 1.5));
/// assert_eq!(rx.try_recv().unwrap().flow_rate, 1.5);
/// ```
#[derive(Debug, Clone)]
pub struct Bus {
    topics: Arc<RwLock<BTreeMap<String, Arc<Topic>>>>,
    capacity: usize,
}

impl Bus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(RwLock::new(BTreeMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to a topic, creating it if needed.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<FlowSample> {
        self.get_or_create(topic).tx.subscribe()
    }

    /// Names of all known topics.
    pub fn topics(&self) -> Vec<String> {
        self.topics.read().keys().cloned().collect()
    }

    /// Number of live subscribers on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map(|t| t.tx.receiver_count())
            .unwrap_or(0)
    }

    /// Total samples ever published on a topic.
    pub fn published(&self, topic: &str) -> u64 {
        self.topics
            .read()
            .get(topic)
            .map(|t| t.published.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn get_or_create(&self, topic: &str) -> Arc<Topic> {
        // Fast path
        {
            let topics = self.topics.read();
            if let Some(t) = topics.get(topic) {
                return t.clone();
            }
        }

        // Slow path
        let mut topics = self.topics.write();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(Topic::new(self.capacity)))
            .clone()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplePublisher for Bus {
    fn publish(&self, topic: &str, sample: FlowSample) {
        let topic = self.get_or_create(topic);
        topic.published.fetch_add(1, Ordering::Relaxed);
        // No receivers is fine
        let _ = topic.tx.send(sample);
    }
}
