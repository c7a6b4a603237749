use crate::foundation::error::{RouteReelError, RouteReelResult};

/// Two-state lifecycle for collaborator clients that need asynchronous setup.
///
/// Operations on an [`ServiceHandle::Uninitialized`] handle fail with
/// [`RouteReelError::Uninitialized`] naming the service.
#[derive(Debug)]
pub enum ServiceHandle<T> {
    /// Not yet initialized, or torn down.
    Uninitialized {
        /// Human-readable service name used in errors.
        name: &'static str,
    },
    /// Ready for use.
    Ready(T),
}

impl<T> ServiceHandle<T> {
    /// Handle awaiting initialization.
    pub fn uninitialized(name: &'static str) -> Self {
        Self::Uninitialized { name }
    }

    /// Whether the handle holds a ready client.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Install a ready client, replacing any previous one.
    pub fn init(&mut self, value: T) {
        *self = Self::Ready(value);
    }

    /// Borrow the client or fail with an uninitialized error.
    pub fn get(&self) -> RouteReelResult<&T> {
        match self {
            Self::Ready(v) => Ok(v),
            Self::Uninitialized { name } => Err(RouteReelError::uninitialized(format!(
                "{name} used before init"
            ))),
        }
    }

    /// Return to the uninitialized state, yielding the client if there was one.
    pub fn teardown(&mut self, name: &'static str) -> Option<T> {
        match std::mem::replace(self, Self::Uninitialized { name }) {
            Self::Ready(v) => Some(v),
            Self::Uninitialized { .. } => None,
        }
    }
}
