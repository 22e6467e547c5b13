//! Rendering: display tree, layout, paint and rasterization

pub mod layout;
pub mod paint;
pub mod raster;
pub mod view;

use image::RgbaImage;
use sha2::{Digest, Sha256};

use crate::platform::{Appearance, EdgeInsets, LayoutDirection, Size};
use crate::waiter::RenderWaiter;

pub use view::{Paint, Rgba, StackAxis, View, ViewSlot};

/// Per-attempt environment handed to scenario content.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Call `wait()` on it to delay capture until asynchronous work is done.
    pub waiter: RenderWaiter,
    /// `true` when rendering for a snapshot rather than live display.
    pub is_snapshot: bool,
    /// Size of the simulated screen.
    pub screen_size: Size,
    pub safe_area: EdgeInsets,
    pub appearance: Appearance,
    pub layout_direction: LayoutDirection,
}

/// Something that produces a display tree for a render attempt.
///
/// Implemented for any `Fn(&RenderContext) -> View`.
pub trait Content: Send + Sync {
    fn render(&self, context: &RenderContext) -> View;
}

impl<F> Content for F
where
    F: Fn(&RenderContext) -> View + Send + Sync,
{
    fn render(&self, context: &RenderContext) -> View {
        self(context)
    }
}

/// A captured raster buffer.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    /// Scale the capture was actually drawn at (may be below the requested
    /// scale when the pixel ceiling kicked in).
    pub scale: f64,
    pub image: RgbaImage,
}

impl Snapshot {
    pub fn new(image: RgbaImage, scale: f64) -> Self {
        Self { width: image.width(), height: image.height(), scale, image }
    }

    /// Hex SHA-256 over dimensions and pixels.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.image.as_raw());
        hex::encode(hasher.finalize())
    }
}
