//! CalendarProvider trait definition.
//!
//! This module defines the [`CalendarProvider`] trait, the abstraction over
//! the organizer's remote calendar (Google Calendar in production). The
//! scheduling side only ever reads: it asks for the busy intervals inside a
//! time window and nothing else.

use std::future::Future;
use std::pin::Pin;

use termin_core::TimeWindow;

use crate::busy::BusyInterval;
use crate::error::{ProviderError, ProviderResult};

/// A boxed future for async trait methods.
///
/// Async functions in traits do not yet mix well with dynamic dispatch;
/// boxed futures keep the trait object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The read-only view of the organizer's calendar.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync` for use in async contexts
/// - A failure means availability is unknown; implementations must never
///   swallow an upstream error and return an empty busy list
/// - Intervals may be returned in any order and may overlap each other
pub trait CalendarProvider: Send + Sync {
    /// Returns the name/type of this provider (e.g., "google").
    fn name(&self) -> &str;

    /// Fetches the busy intervals overlapping the given window.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` on network errors, authentication failures,
    /// malformed responses and the like.
    fn list_busy(&self, window: TimeWindow) -> BoxFuture<'_, ProviderResult<Vec<BusyInterval>>>;
}

/// A provider serving a fixed busy list.
///
/// Used in tests and as a stand-in for deployments without a remote
/// calendar, where every generated slot is free.
#[derive(Debug, Default)]
pub struct StaticProvider {
    busy: Vec<BusyInterval>,
}

impl StaticProvider {
    /// Creates a provider with no busy intervals.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a provider with the given busy intervals.
    pub fn with_busy(busy: Vec<BusyInterval>) -> Self {
        Self { busy }
    }
}

impl CalendarProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn list_busy(&self, window: TimeWindow) -> BoxFuture<'_, ProviderResult<Vec<BusyInterval>>> {
        let busy: Vec<BusyInterval> = self
            .busy
            .iter()
            .filter(|b| b.overlaps(window.start, window.end))
            .cloned()
            .collect();
        Box::pin(async move { Ok(busy) })
    }
}

/// A provider that always returns an error.
///
/// Useful for testing the availability-unknown path and as a placeholder
/// when a real provider fails to initialize.
#[derive(Debug)]
pub struct ErrorProvider {
    name: String,
    error: ProviderError,
}

impl ErrorProvider {
    /// Creates a new error provider.
    pub fn new(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }
}

impl CalendarProvider for ErrorProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_busy(&self, _window: TimeWindow) -> BoxFuture<'_, ProviderResult<Vec<BusyInterval>>> {
        // Clone the error details since ProviderError itself is not Clone.
        let error =
            ProviderError::new(self.error.code(), self.error.message()).with_provider(&self.name);
        Box::pin(async move { Err(error) })
    }
}
