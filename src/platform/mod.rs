//! Platform surface: the simulated devices scenarios are rendered under.
//!
//! Device profiles are plain data; they are cloned into every render
//! request and never mutated by the pipeline.

pub mod device;

pub use device::{Appearance, DeviceProfile, EdgeInsets, LayoutDirection, Orientation, Size};
