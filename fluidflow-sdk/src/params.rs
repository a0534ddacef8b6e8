//! Parameter store with edge-triggered update notifications.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fluidflow_types::{FlowParams, ParamId, ParamValue};
use parking_lot::RwLock;

use crate::error::ParamError;

#[derive(Debug, Default)]
struct StoreInner {
    params: RwLock<FlowParams>,
    /// Bumped on every change; subscribers compare against their last view.
    generation: AtomicU64,
}

/// Shared, externally settable simulator parameters.
///
/// Cloning the store yields another handle to the same values. Every
/// successful write notifies all subscriptions; each subscription sees a
/// burst of writes as a single pending update.
///
/// # Example
///
/// ```rust
/// use fluidflow_sdk::ParameterStore;
/// use fluidflow_types::{ParamId, ParamValue};
///
/// let store = ParameterStore::default();
/// let mut sub = store.subscribe();
/// assert!(!sub.updated());
///
/// store.set(ParamId::MaxFlow, ParamValue::Float(3.0)).unwrap();
/// assert!(sub.updated());
/// assert!(!sub.updated()); // consumed
/// assert_eq!(sub.copy().max_flow, 3.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    inner: Arc<StoreInner>,
}

impl ParameterStore {
    pub fn new(params: FlowParams) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                params: RwLock::new(params),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Current values of all parameters.
    pub fn current(&self) -> FlowParams {
        *self.inner.params.read()
    }

    pub fn get(&self, id: ParamId) -> ParamValue {
        self.current().get(id)
    }

    /// Set one parameter and notify subscribers.
    ///
    /// Float parameters accept integers. The interval accepts floats only
    /// when they carry no fractional part.
    pub fn set(&self, id: ParamId, value: ParamValue) -> Result<(), ParamError> {
        {
            let mut params = self.inner.params.write();
            match (id, value) {
                (ParamId::MinFlow, v) => params.min_flow = as_float(v),
                (ParamId::MaxFlow, v) => params.max_flow = as_float(v),
                (ParamId::ChangeInterval, ParamValue::Int(v)) => params.change_interval_micros = v,
                (ParamId::ChangeInterval, ParamValue::Float(v)) => {
                    if !v.is_finite() || v.fract() != 0.0 {
                        return Err(ParamError::TypeMismatch(id));
                    }
                    params.change_interval_micros = v as i64;
                }
            }
        }
        self.notify();
        tracing::debug!(param = %id, %value, "parameter set");
        Ok(())
    }

    /// Parse and set a parameter given by name, returning which one changed.
    pub fn set_from_str(&self, name: &str, value: &str) -> Result<ParamId, ParamError> {
        let id: ParamId = name.parse()?;
        let value = id.parse_value(value)?;
        self.set(id, value)?;
        Ok(id)
    }

    /// Replace all parameters at once (a single notification).
    pub fn set_all(&self, params: FlowParams) {
        *self.inner.params.write() = params;
        self.notify();
    }

    /// Restore the defaults.
    pub fn reset(&self) {
        self.set_all(FlowParams::default());
    }

    /// Open a subscription that starts with no pending update.
    pub fn subscribe(&self) -> ParamSubscription {
        ParamSubscription {
            store: self.inner.clone(),
            last_generation: self.inner.generation.load(Ordering::Acquire),
        }
    }

    fn notify(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
    }
}

fn as_float(value: ParamValue) -> f32 {
    match value {
        ParamValue::Float(v) => v,
        ParamValue::Int(v) => v as f32,
    }
}

/// One consumer's view of parameter-update notifications.
#[derive(Debug)]
pub struct ParamSubscription {
    store: Arc<StoreInner>,
    last_generation: u64,
}

impl ParamSubscription {
    /// Whether parameters changed since the last call; consumes the notification.
    pub fn updated(&mut self) -> bool {
        let generation = self.store.generation.load(Ordering::Acquire);
        if generation == self.last_generation {
            return false;
        }
        self.last_generation = generation;
        true
    }

    /// Current parameter values.
    pub fn copy(&self) -> FlowParams {
        *self.store.params.read()
    }

    /// Consume a pending update and return the new values, if any.
    pub fn check(&mut self) -> Option<FlowParams> {
        self.updated().then(|| self.copy())
    }
}
