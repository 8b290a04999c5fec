//! Session domain module

mod lifecycle;
#[allow(clippy::module_inception)]
mod session;
pub mod timestamp;

pub use lifecycle::{InvalidStateTransition, Lifecycle, LifecycleState, Transition};
pub use session::{InvalidStatusTransition, Session, SessionId, SessionStatus};
