//! Explicit cancellation for prompt-driven steps

/// Outcome of a step the user may abandon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cancellable<T> {
    Accepted(T),
    Cancelled,
}

impl<T> Cancellable<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Cancellable::Cancelled)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Cancellable<U> {
        match self {
            Cancellable::Accepted(value) => Cancellable::Accepted(f(value)),
            Cancellable::Cancelled => Cancellable::Cancelled,
        }
    }

    pub fn accepted(self) -> Option<T> {
        match self {
            Cancellable::Accepted(value) => Some(value),
            Cancellable::Cancelled => None,
        }
    }
}

impl<T> From<Option<T>> for Cancellable<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Cancellable::Accepted(value),
            None => Cancellable::Cancelled,
        }
    }
}
