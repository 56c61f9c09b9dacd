//! Request-scoped context.
//!
//! A [`Context`] is an immutable chain of typed values plus an optional
//! deadline. Deriving a child never mutates the parent, so a context can be
//! cloned freely and handed to nested calls. The runner stores the active
//! transaction handle here under a module-private key; repositories find it
//! again with [`current`].

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::transaction::handle::Tx;

struct Node {
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Node>>,
}

/// Immutable, cheaply clonable request context.
#[derive(Clone, Default)]
pub struct Context {
    values: Option<Arc<Node>>,
    deadline: Option<Instant>,
}

impl Context {
    /// An empty root context with no values and no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a child context carrying `value`, keyed by its type.
    ///
    /// A later value of the same type shadows earlier ones.
    pub fn with_value<V>(&self, value: Arc<V>) -> Self
    where
        V: Any + Send + Sync,
    {
        Self {
            values: Some(Arc::new(Node {
                key: TypeId::of::<V>(),
                value,
                parent: self.values.clone(),
            })),
            deadline: self.deadline,
        }
    }

    /// Look up the most recent value of type `V`.
    pub fn value<V>(&self) -> Option<Arc<V>>
    where
        V: Any + Send + Sync,
    {
        let key = TypeId::of::<V>();
        let mut node = self.values.as_ref();
        while let Some(current) = node {
            if current.key == key {
                return Arc::clone(&current.value).downcast::<V>().ok();
            }
            node = current.parent.as_ref();
        }
        None
    }

    /// Derive a child context that expires at `deadline`.
    ///
    /// The child keeps the parent's deadline if that one is earlier.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            values: self.values.clone(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child context that expires after `timeout`.
    ///
    /// A timeout too large to represent as an instant adds no deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline. `Some(Duration::ZERO)` once expired.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut node = self.values.as_ref();
        while let Some(current) = node {
            depth += 1;
            node = current.parent.as_ref();
        }
        f.debug_struct("Context")
            .field("values", &depth)
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Private key type for the active transaction.
struct ActiveTx<N>(Arc<Tx<N>>);

/// Derive a context carrying `tx` as the active transaction.
pub(crate) fn with_tx<N>(ctx: &Context, tx: Arc<Tx<N>>) -> Context
where
    N: Send + 'static,
{
    ctx.with_value(Arc::new(ActiveTx(tx)))
}

/// Get the transaction handle active in `ctx`, if any.
///
/// Returns the exact handle the runner inserted for any context derived
/// from the one passed to the work function.
pub fn current<N>(ctx: &Context) -> Option<Arc<Tx<N>>>
where
    N: Send + 'static,
{
    ctx.value::<ActiveTx<N>>().map(|active| Arc::clone(&active.0))
}
