//! Screen-pixel vision for the map overlay.
//!
//! Everything here works on rendered pixels only: a [`FrameSource`] captures a
//! screen rectangle, [`detect`] turns a [`Frame`] into [`Marker`]s using a
//! declarative [`Palette`], and [`PixelProbe`]s answer cheap "is this UI
//! element visible" questions.

mod frame;
pub use frame::*;
mod region;
pub use region::*;
mod source;
pub use source::*;
mod palette;
pub use palette::*;
mod detect;
pub use detect::*;
mod orientation;
pub use orientation::{heading_from_vector, normalize_degrees};
mod probe;
pub use probe::*;
