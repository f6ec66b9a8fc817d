pub mod animation;
pub mod presentation;
pub mod render;
mod session;

pub use animation::{AnimationDriver, AnimationFrame, AnimationState};
pub use presentation::{project, LayerSet, LayerSlot, LayerSpec, TrackedRoute};
pub use render::{diff, LayerChange, LayerRenderer};
pub use session::{SessionEvent, SessionStatus, TrackingConfig, TrackingSession};
