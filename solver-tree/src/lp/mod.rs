//! Relaxation (LP) state management.

mod backend;
mod lpstate;
mod relaxation;

pub use backend::{LpSolver, LpStatus};
pub use lpstate::LpStateHandle;
pub use relaxation::{LpSize, Relaxation};
