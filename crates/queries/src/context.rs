//! Cancellation and deadline context threaded through every driver call.
//!
//! A [`Context`] is cheap to clone and immutable; derived contexts keep a
//! link to their parent so that canceling a parent cancels every child.

use crate::error::DbError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A request-scoped context: cancellation, an optional deadline, and
/// key/value pairs for observability.
///
/// The default value is the background context: never canceled, no deadline,
/// no values.
#[derive(Clone, Default)]
pub struct Context {
    inner: Option<Arc<Inner>>,
}

struct Inner {
    parent: Context,
    deadline: Option<Instant>,
    canceled: Option<Arc<AtomicBool>>,
    value: Option<(String, String)>,
}

/// Cancels the context it was created with (and every context derived from it).
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Cancel the associated context.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

impl Context {
    /// The empty root context.
    pub fn background() -> Self {
        Self::default()
    }

    fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Some(Arc::new(inner)),
        }
    }

    /// Derive a context that is canceled when the returned handle is used.
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = Self::from_inner(Inner {
            parent: self.clone(),
            deadline: None,
            canceled: Some(flag.clone()),
            value: None,
        });
        (ctx, CancelHandle { flag })
    }

    /// Derive a context with the given deadline.
    ///
    /// The effective deadline is the earliest one along the chain.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self::from_inner(Inner {
            parent: self.clone(),
            deadline: Some(deadline),
            canceled: None,
            value: None,
        })
    }

    /// Derive a context whose deadline is `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context carrying a key/value pair.
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::from_inner(Inner {
            parent: self.clone(),
            deadline: None,
            canceled: None,
            value: Some((key.into(), value.into())),
        })
    }

    fn chain(&self) -> impl Iterator<Item = &Inner> {
        let mut next = self.inner.as_deref();
        std::iter::from_fn(move || {
            let current = next?;
            next = current.parent.inner.as_deref();
            Some(current)
        })
    }

    /// The earliest deadline along the chain, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.chain().filter_map(|inner| inner.deadline).min()
    }

    /// Look up the nearest value stored under `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.chain()
            .filter_map(|inner| inner.value.as_ref())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the context has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.chain()
            .filter_map(|inner| inner.canceled.as_ref())
            .any(|flag| flag.load(Ordering::Acquire))
    }

    /// `Err` if the context is canceled or past its deadline.
    pub fn err(&self) -> Result<(), DbError> {
        if self.is_canceled() {
            return Err(DbError::Canceled);
        }
        match self.deadline() {
            Some(deadline) if Instant::now() >= deadline => Err(DbError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inner.is_none() {
            return f.write_str("Context::background");
        }
        f.debug_struct("Context")
            .field("deadline", &self.deadline())
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_is_never_done() {
        let ctx = Context::background();
        assert!(ctx.err().is_ok());
        assert!(ctx.deadline().is_none());
        assert!(ctx.value("caller").is_none());
    }

    #[test]
    fn cancel_propagates_to_children() {
        let (parent, cancel) = Context::background().with_cancel();
        let child = parent.with_value("caller", "a");
        assert!(child.err().is_ok());

        cancel.cancel();
        assert!(matches!(child.err(), Err(DbError::Canceled)));
        assert!(matches!(parent.err(), Err(DbError::Canceled)));
    }

    #[test]
    fn earliest_deadline_wins() {
        let now = Instant::now();
        let ctx = Context::background()
            .with_deadline(now + Duration::from_secs(10))
            .with_deadline(now + Duration::from_secs(5))
            .with_deadline(now + Duration::from_secs(20));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(5)));
    }

    #[test]
    fn past_deadline_is_exceeded() {
        let ctx = Context::background().with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(matches!(ctx.err(), Err(DbError::DeadlineExceeded)));
    }

    #[test]
    fn nearest_value_shadows_parent() {
        let ctx = Context::background()
            .with_value("caller", "outer")
            .with_value("request", "r1")
            .with_value("caller", "inner");
        assert_eq!(ctx.value("caller"), Some("inner"));
        assert_eq!(ctx.value("request"), Some("r1"));
    }
}
