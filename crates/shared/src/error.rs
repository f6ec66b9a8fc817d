use thiserror::Error;

/// Failures inside the tracking engine. None of them is fatal: fetch failures
/// degrade to a straight line and invalid coordinates turn operations into no-ops.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    #[error("route fetch failed: {0}")]
    RouteFetchFailure(String),
    #[error("routing provider returned {points} points, need at least 3")]
    InsufficientRouteFallback { points: usize },
    #[error("missing or invalid coordinates")]
    InvalidCoordinates,
    #[error("route needs at least 2 points, got {points}")]
    RouteTooShort { points: usize },
    #[error("unknown delivery phase '{0}'")]
    UnknownPhase(String),
}

impl TrackingError {
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::RouteFetchFailure(message.into())
    }

    /// True for the failures that mean "draw the straight line instead".
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            TrackingError::RouteFetchFailure(_) | TrackingError::InsufficientRouteFallback { .. }
        )
    }
}
