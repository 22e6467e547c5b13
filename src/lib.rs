//! RFox Playbook
//!
//! Renders a catalog of named UI scenarios into bitmaps under simulated
//! device profiles, for visual review and regression testing.
//!
//! # Features
//!
//! - **Off-screen rendering**: a dedicated render thread lays out and
//!   rasterizes scenario content, waiting on asynchronous content when asked
//! - **Disk cache**: content-addressable thumbnails keyed by scenario and device
//! - **Load queue**: debounced, burst-limited, cancellable thumbnail loading
//! - **Batch export**: every scenario on every device into a directory tree
//!
//! # Example
//!
//! ```no_run
//! use rfplaybook::{
//!     DeviceProfile, ExportConfig, Orientation, Playbook, Renderer, RendererConfig, Rgba,
//!     Scenario, ScenarioLayout, SnapshotExport, View,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut playbook = Playbook::new();
//! playbook.add_scenarios(
//!     "Buttons",
//!     [Scenario::new("Primary", ScenarioLayout::compressed(), |_: &rfplaybook::RenderContext| {
//!         View::rect(120.0, 44.0, Rgba::rgb(0, 122, 255))
//!     })],
//! );
//!
//! let renderer = Renderer::new(RendererConfig::default())?;
//! let config = ExportConfig::new("snapshots", vec![DeviceProfile::iphone_x(Orientation::Portrait)]);
//! SnapshotExport::new(config, renderer).run(&playbook)?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

pub mod error;
pub use error::{Axis, Error, Result};

// Device simulation data
pub mod platform;

// Display tree, layout and rasterization
pub mod rendering;

pub mod cache;
pub mod dispatcher;
pub mod export;
pub mod format;
pub mod loader;
pub mod renderer;
pub mod scenario;
pub mod waiter;

pub use cache::{CacheKey, ClearScope, DiskCache};
pub use dispatcher::{DispatchHandle, SerialDispatcher};
pub use export::{ExportConfig, SnapshotExport};
pub use format::SnapshotFormat;
pub use loader::{CancelHandle, LoadOutcome, LoadQueue, LoadQueueConfig, LoadRequest, LoadTicket};
pub use platform::{Appearance, DeviceProfile, EdgeInsets, LayoutDirection, Orientation, Size};
pub use renderer::{RenderOptions, Renderer, ViewTransform};
pub use rendering::{Content, Paint, RenderContext, Rgba, Snapshot, View, ViewSlot};
pub use scenario::{Playbook, Scenario, ScenarioLayout, ScenarioStore, Sizing, TestTool};
pub use waiter::{RenderWaiter, WaitOutcome};

/// Configuration for the render thread
///
/// The defaults allow 8192 pixels per axis and a 10 second wait for
/// asynchronous content.
///
/// # Examples
///
/// ```
/// let cfg = rfplaybook::RendererConfig::default();
/// assert_eq!(cfg.pixel_ceiling, 8192);
/// ```
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Largest bitmap edge in pixels; larger captures are drawn at a
    /// reduced scale
    pub pixel_ceiling: u32,
    /// Deadline used when content calls `RenderWaiter::wait()`
    pub default_wait: Duration,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            pixel_ceiling: 8192,
            default_wait: waiter::DEFAULT_WAIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RendererConfig::default();
        assert_eq!(config.pixel_ceiling, 8192);
        assert_eq!(config.default_wait, Duration::from_secs(10));
    }
}
