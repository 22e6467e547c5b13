/// Device profiles: the simulated environment a scenario is rendered under
use serde::{Deserialize, Serialize};

/// A size in points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Component-wise minimum.
    pub fn min(self, other: Size) -> Size {
        Size::new(self.width.min(other.width), self.height.min(other.height))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeInsets {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl EdgeInsets {
    pub const ZERO: EdgeInsets = EdgeInsets::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self { top, left, bottom, right }
    }

    pub const fn all(v: f64) -> Self {
        Self::new(v, v, v, v)
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// Color appearance trait of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Appearance {
    #[default]
    Unspecified,
    Light,
    Dark,
}

impl Appearance {
    /// Short tag used in cache keys.
    pub fn tag(self) -> &'static str {
        match self {
            Appearance::Unspecified => "unspecified",
            Appearance::Light => "light",
            Appearance::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    fn label(self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }

    fn pick<T>(self, portrait: T, landscape: T) -> T {
        match self {
            Orientation::Portrait => portrait,
            Orientation::Landscape => landscape,
        }
    }
}

/// A simulated rendering target.
///
/// The name doubles as the directory name of exported snapshots, so two
/// profiles that must not share files need distinct names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    pub size: Size,
    #[serde(default)]
    pub safe_area: EdgeInsets,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub appearance: Appearance,
    #[serde(default)]
    pub layout_direction: LayoutDirection,
}

fn default_scale() -> f64 {
    1.0
}

impl DeviceProfile {
    pub fn new(name: impl Into<String>, size: Size) -> Self {
        Self {
            name: name.into(),
            size,
            safe_area: EdgeInsets::ZERO,
            scale: default_scale(),
            appearance: Appearance::Unspecified,
            layout_direction: LayoutDirection::LeftToRight,
        }
    }

    pub fn safe_area(mut self, insets: EdgeInsets) -> Self {
        self.safe_area = insets;
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn layout_direction(mut self, direction: LayoutDirection) -> Self {
        self.layout_direction = direction;
        self
    }

    /// Switch the appearance, appending ` (light)` / ` (dark)` to the name
    /// so light and dark captures land in different directories.
    pub fn with_appearance(mut self, appearance: Appearance) -> Self {
        match appearance {
            Appearance::Light => self.name = format!("{} (light)", self.name),
            Appearance::Dark => self.name = format!("{} (dark)", self.name),
            Appearance::Unspecified => {}
        }
        self.appearance = appearance;
        self
    }

    pub fn iphone_se(orientation: Orientation) -> Self {
        Self::phone(
            "iPhone SE",
            orientation,
            (320.0, 568.0),
            EdgeInsets::new(20.0, 0.0, 0.0, 0.0),
            EdgeInsets::ZERO,
            2.0,
        )
    }

    pub fn iphone_8(orientation: Orientation) -> Self {
        Self::phone(
            "iPhone 8",
            orientation,
            (375.0, 667.0),
            EdgeInsets::new(20.0, 0.0, 0.0, 0.0),
            EdgeInsets::ZERO,
            2.0,
        )
    }

    pub fn iphone_x(orientation: Orientation) -> Self {
        Self::phone(
            "iPhone X",
            orientation,
            (375.0, 812.0),
            EdgeInsets::new(44.0, 0.0, 34.0, 0.0),
            EdgeInsets::new(0.0, 44.0, 24.0, 44.0),
            3.0,
        )
    }

    pub fn iphone_11(orientation: Orientation) -> Self {
        Self::phone(
            "iPhone 11",
            orientation,
            (414.0, 896.0),
            EdgeInsets::new(44.0, 0.0, 34.0, 0.0),
            EdgeInsets::new(0.0, 44.0, 24.0, 44.0),
            2.0,
        )
    }

    pub fn iphone_12(orientation: Orientation) -> Self {
        Self::phone(
            "iPhone 12",
            orientation,
            (390.0, 844.0),
            EdgeInsets::new(47.0, 0.0, 34.0, 0.0),
            EdgeInsets::new(0.0, 47.0, 21.0, 47.0),
            3.0,
        )
    }

    /// Look up a preset by CLI identifier (`iphone-x`, `iphone-se-landscape`, ...).
    pub fn preset(id: &str) -> Option<Self> {
        let (base, orientation) = match id.strip_suffix("-landscape") {
            Some(base) => (base, Orientation::Landscape),
            None => (id.strip_suffix("-portrait").unwrap_or(id), Orientation::Portrait),
        };
        let device = match base {
            "iphone-se" => Self::iphone_se(orientation),
            "iphone-8" => Self::iphone_8(orientation),
            "iphone-x" => Self::iphone_x(orientation),
            "iphone-11" => Self::iphone_11(orientation),
            "iphone-12" => Self::iphone_12(orientation),
            _ => return None,
        };
        Some(device)
    }

    fn phone(
        model: &str,
        orientation: Orientation,
        (width, height): (f64, f64),
        portrait_insets: EdgeInsets,
        landscape_insets: EdgeInsets,
        scale: f64,
    ) -> Self {
        Self {
            name: format!("{} {}", model, orientation.label()),
            size: orientation.pick(Size::new(width, height), Size::new(height, width)),
            safe_area: orientation.pick(portrait_insets, landscape_insets),
            scale,
            appearance: Appearance::Unspecified,
            layout_direction: LayoutDirection::LeftToRight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_swaps_dimensions() {
        let p = DeviceProfile::iphone_x(Orientation::Portrait);
        let l = DeviceProfile::iphone_x(Orientation::Landscape);
        assert_eq!(p.size, Size::new(375.0, 812.0));
        assert_eq!(l.size, Size::new(812.0, 375.0));
        assert_eq!(l.name, "iPhone X landscape");
        assert_eq!(l.safe_area.left, 44.0);
    }

    #[test]
    fn appearance_is_reflected_in_name() {
        let d = DeviceProfile::iphone_se(Orientation::Portrait).with_appearance(Appearance::Dark);
        assert_eq!(d.name, "iPhone SE portrait (dark)");
        assert_eq!(d.appearance, Appearance::Dark);
    }

    #[test]
    fn preset_lookup() {
        assert_eq!(DeviceProfile::preset("iphone-8").unwrap().name, "iPhone 8 portrait");
        assert_eq!(
            DeviceProfile::preset("iphone-12-landscape").unwrap().size,
            Size::new(844.0, 390.0)
        );
        assert!(DeviceProfile::preset("pixel-9").is_none());
    }

    #[test]
    fn deserializes_with_defaults() {
        let d: DeviceProfile =
            serde_json::from_str(r#"{"name":"Widget","size":{"width":200,"height":100}}"#).unwrap();
        assert_eq!(d.scale, 1.0);
        assert_eq!(d.appearance, Appearance::Unspecified);
        assert_eq!(d.safe_area, EdgeInsets::ZERO);
    }
}
