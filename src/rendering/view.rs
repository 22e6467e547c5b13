/// Declarative display tree produced by scenario content
use std::sync::{Arc, Mutex};

use crate::platform::{Appearance, EdgeInsets};

/// An 8-bit straight-alpha color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

impl Rgba {
    pub const CLEAR: Rgba = Rgba(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba(255, 255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba(r, g, b, 255)
    }

    /// Parse `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        if !s.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(s.get(i..i + 2)?, 16).ok();
        match s.len() {
            6 => Some(Rgba(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Some(Rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }
}

/// A fill that may depend on the device appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    Solid(Rgba),
    Adaptive { light: Rgba, dark: Rgba },
}

impl Paint {
    /// Unspecified appearance resolves like light.
    pub fn resolve(self, appearance: Appearance) -> Rgba {
        match self {
            Paint::Solid(c) => c,
            Paint::Adaptive { light, dark } => match appearance {
                Appearance::Dark => dark,
                Appearance::Light | Appearance::Unspecified => light,
            },
        }
    }

    /// Primary label color: black on light, white on dark.
    pub const fn label() -> Self {
        Paint::Adaptive { light: Rgba::BLACK, dark: Rgba::WHITE }
    }

    /// Primary background color: white on light, black on dark.
    pub const fn background() -> Self {
        Paint::Adaptive { light: Rgba::WHITE, dark: Rgba::BLACK }
    }
}

impl From<Rgba> for Paint {
    fn from(c: Rgba) -> Self {
        Paint::Solid(c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackAxis {
    Horizontal,
    Vertical,
}

/// A placeholder in the tree that asynchronous work fills in later.
///
/// Pair it with [`RenderWaiter`](crate::RenderWaiter): call `wait()`, hand
/// the slot to the background work, and `fulfill()` after `set()`.
#[derive(Debug, Clone)]
pub struct ViewSlot {
    view: Arc<Mutex<View>>,
}

impl ViewSlot {
    pub fn new(placeholder: View) -> Self {
        Self { view: Arc::new(Mutex::new(placeholder)) }
    }

    pub fn set(&self, view: View) {
        *self.view.lock().unwrap_or_else(|p| p.into_inner()) = view;
    }

    pub fn get(&self) -> View {
        self.view.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

/// A node of the display tree.
#[derive(Debug, Clone)]
pub enum View {
    /// Occupies no space and draws nothing.
    Empty,
    /// Flexible fill: expands to whatever it is offered, zero ideal size.
    Color(Paint),
    /// A fill with a fixed intrinsic size.
    Rect { width: f64, height: f64, paint: Paint },
    Stack { axis: StackAxis, spacing: f64, children: Vec<View> },
    Padding { insets: EdgeInsets, child: Box<View> },
    Background { paint: Paint, child: Box<View> },
    Border { paint: Paint, width: f64, child: Box<View> },
    /// Overrides the child's size on the given axes.
    Frame { width: Option<f64>, height: Option<f64>, child: Box<View> },
    /// Pads the child by the render context's safe area.
    SafeArea(Box<View>),
    Slot(ViewSlot),
}

impl View {
    pub fn color(paint: impl Into<Paint>) -> Self {
        View::Color(paint.into())
    }

    pub fn rect(width: f64, height: f64, paint: impl Into<Paint>) -> Self {
        View::Rect { width, height, paint: paint.into() }
    }

    pub fn hstack(spacing: f64, children: Vec<View>) -> Self {
        View::Stack { axis: StackAxis::Horizontal, spacing, children }
    }

    pub fn vstack(spacing: f64, children: Vec<View>) -> Self {
        View::Stack { axis: StackAxis::Vertical, spacing, children }
    }

    pub fn padding(self, insets: EdgeInsets) -> Self {
        View::Padding { insets, child: Box::new(self) }
    }

    pub fn background(self, paint: impl Into<Paint>) -> Self {
        View::Background { paint: paint.into(), child: Box::new(self) }
    }

    pub fn border(self, paint: impl Into<Paint>, width: f64) -> Self {
        View::Border { paint: paint.into(), width, child: Box::new(self) }
    }

    pub fn frame(self, width: Option<f64>, height: Option<f64>) -> Self {
        View::Frame { width, height, child: Box::new(self) }
    }

    pub fn safe_area(self) -> Self {
        View::SafeArea(Box::new(self))
    }
}
