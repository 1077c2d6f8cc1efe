//! Bearing, feedback and closed-loop auto-turn on top of [`vision`].
//!
//! The pure parts ([`CoordinateSystem`], [`compose`], [`AutoTurnController::tick`])
//! never touch the screen or the OS. [`Locator`] composes capture, detection
//! and bearing into one serialized pass; [`AutoTurnSupervisor`] owns the single
//! auto-turn thread.

mod error;
pub use error::*;
mod geometry;
pub use geometry::*;
mod feedback;
pub use feedback::*;
mod sinks;
pub use sinks::*;
mod locator;
pub use locator::*;
mod autoturn;
pub use autoturn::*;
mod supervisor;
pub use supervisor::*;
