//! Device catalogue and device-frame specifications.
//!
//! A device determines the export canvas (its pixel dimensions, possibly
//! swapped for landscape) and, through its category, whether a frame with
//! bezel, notch, and home indicator is drawn around the screenshot area.

use serde::{Deserialize, Serialize};

use crate::color::{HexColor, Rgba};

/// Broad device family. Drives frame chrome and font-size overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeviceCategory {
    #[serde(rename = "iPhone")]
    IPhone,
    #[serde(rename = "iPad")]
    IPad,
    #[serde(rename = "mac")]
    Mac,
    #[serde(rename = "appleWatch")]
    AppleWatch,
    #[serde(rename = "appleTV")]
    AppleTv,
    #[serde(rename = "appleVisionPro")]
    AppleVisionPro,
    #[serde(rename = "custom")]
    Custom,
}

impl DeviceCategory {
    pub const ALL: [DeviceCategory; 7] = [
        Self::IPhone,
        Self::IPad,
        Self::Mac,
        Self::AppleWatch,
        Self::AppleTv,
        Self::AppleVisionPro,
        Self::Custom,
    ];

    /// Identifier used in media keys and serialized manifests.
    pub fn key(self) -> &'static str {
        match self {
            Self::IPhone => "iPhone",
            Self::IPad => "iPad",
            Self::Mac => "mac",
            Self::AppleWatch => "appleWatch",
            Self::AppleTv => "appleTV",
            Self::AppleVisionPro => "appleVisionPro",
            Self::Custom => "custom",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::IPhone => "iPhone",
            Self::IPad => "iPad",
            Self::Mac => "Mac",
            Self::AppleWatch => "Apple Watch",
            Self::AppleTv => "Apple TV",
            Self::AppleVisionPro => "Apple Vision Pro",
            Self::Custom => "Custom",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key().eq_ignore_ascii_case(key))
    }

    /// Base frame spec, if this category is drawn with a device frame.
    pub fn frame_spec(self) -> Option<DeviceFrameSpec> {
        match self {
            Self::IPhone => Some(DeviceFrameSpec {
                bezel_ratio: 0.03,
                corner_radius_ratio: 0.08,
                frame_color: Rgba::from_white(0.12),
                has_notch: true,
                has_home_indicator: true,
                notch_width_ratio: 1.0,
                notch_height_ratio: 1.0,
            }),
            Self::IPad => Some(DeviceFrameSpec {
                bezel_ratio: 0.035,
                corner_radius_ratio: 0.05,
                frame_color: Rgba::from_white(0.15),
                has_notch: false,
                has_home_indicator: true,
                notch_width_ratio: 1.0,
                notch_height_ratio: 1.0,
            }),
            Self::Mac => Some(DeviceFrameSpec {
                bezel_ratio: 0.025,
                corner_radius_ratio: 0.02,
                frame_color: Rgba::from_white(0.15),
                has_notch: false,
                has_home_indicator: false,
                notch_width_ratio: 1.0,
                notch_height_ratio: 1.0,
            }),
            _ => None,
        }
    }

    /// Only handheld categories rotate their canvas.
    pub fn supports_landscape(self) -> bool {
        matches!(self, Self::IPhone | Self::IPad)
    }

    /// Custom devices are not scaled against a shared reference device.
    pub fn has_shared_reference(self) -> bool {
        self != Self::Custom
    }
}

impl std::fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Geometry and colors of a device frame, as fractions of screen width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceFrameSpec {
    /// Bezel width as a fraction of screen width.
    pub bezel_ratio: f64,
    /// Outer corner radius as a fraction of screen width.
    pub corner_radius_ratio: f64,
    pub frame_color: Rgba,
    pub has_notch: bool,
    pub has_home_indicator: bool,
    /// Multipliers on the dynamic island capsule size.
    pub notch_width_ratio: f64,
    pub notch_height_ratio: f64,
}

impl DeviceFrameSpec {
    /// Layer a screen's frame configuration on top of this base spec.
    pub fn applying(&self, config: &DeviceFrameConfig) -> Self {
        Self {
            bezel_ratio: self.bezel_ratio * config.bezel_width_ratio,
            corner_radius_ratio: self.corner_radius_ratio * config.corner_radius_ratio,
            frame_color: HexColor::new(&config.frame_color_hex).to_rgba(),
            has_notch: self.has_notch && config.show_dynamic_island,
            has_home_indicator: self.has_home_indicator,
            notch_width_ratio: self.notch_width_ratio * config.dynamic_island_width_ratio,
            notch_height_ratio: self.notch_height_ratio * config.dynamic_island_height_ratio,
        }
    }
}

/// Per-screen frame customisation. Ratios are multipliers on the category spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceFrameConfig {
    pub frame_color_hex: String,
    pub bezel_width_ratio: f64,
    pub corner_radius_ratio: f64,
    pub show_dynamic_island: bool,
    pub dynamic_island_width_ratio: f64,
    pub dynamic_island_height_ratio: f64,
}

impl Default for DeviceFrameConfig {
    fn default() -> Self {
        Self {
            frame_color_hex: "#1F1F1F".to_string(),
            bezel_width_ratio: 1.0,
            corner_radius_ratio: 1.0,
            show_dynamic_island: true,
            dynamic_island_width_ratio: 1.0,
            dynamic_island_height_ratio: 1.0,
        }
    }
}

/// A target device: export canvas size plus category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceSize {
    pub name: String,
    pub category: DeviceCategory,
    #[serde(default)]
    pub display_size: String,
    pub portrait_width: u32,
    pub portrait_height: u32,
}

impl DeviceSize {
    fn builtin(
        name: &str,
        category: DeviceCategory,
        display_size: &str,
        portrait_width: u32,
        portrait_height: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            category,
            display_size: display_size.to_string(),
            portrait_width,
            portrait_height,
        }
    }

    pub fn custom(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            category: DeviceCategory::Custom,
            display_size: format!("{width}×{height}"),
            portrait_width: width,
            portrait_height: height,
        }
    }

    /// Canvas dimensions for the given orientation.
    pub fn effective_size(&self, is_landscape: bool) -> (u32, u32) {
        if is_landscape && self.category.supports_landscape() {
            (self.portrait_height, self.portrait_width)
        } else {
            (self.portrait_width, self.portrait_height)
        }
    }

    /// Every built-in device, grouped by category.
    pub fn all() -> Vec<DeviceSize> {
        use DeviceCategory::*;
        vec![
            Self::builtin("iPhone 6.9\"", IPhone, "6.9\"", 1320, 2868),
            Self::builtin("iPhone 6.7\"", IPhone, "6.7\"", 1290, 2796),
            Self::builtin("iPhone 6.5\"", IPhone, "6.5\"", 1284, 2778),
            Self::builtin("iPhone 6.3\"", IPhone, "6.3\"", 1206, 2622),
            Self::builtin("iPhone 6.1\"", IPhone, "6.1\"", 1170, 2532),
            Self::builtin("iPhone 5.5\"", IPhone, "5.5\"", 1242, 2208),
            Self::builtin("iPhone 4.7\"", IPhone, "4.7\"", 750, 1334),
            Self::builtin("iPhone 4\"", IPhone, "4\"", 640, 1136),
            Self::builtin("iPhone 3.5\"", IPhone, "3.5\"", 640, 960),
            Self::builtin("iPad 13\"", IPad, "13\"", 2064, 2752),
            Self::builtin("iPad 12.9\"", IPad, "12.9\"", 2048, 2732),
            Self::builtin("iPad 11\"", IPad, "11\"", 1668, 2420),
            Self::builtin("iPad 10.5\"", IPad, "10.5\"", 1668, 2224),
            Self::builtin("iPad 9.7\"", IPad, "9.7\"", 1536, 2048),
            Self::builtin("Mac 2880×1800", Mac, "16:10", 2880, 1800),
            Self::builtin("Mac 2560×1600", Mac, "16:10", 2560, 1600),
            Self::builtin("Mac 1440×900", Mac, "16:10", 1440, 900),
            Self::builtin("Mac 1280×800", Mac, "16:10", 1280, 800),
            Self::builtin("Apple Watch Ultra 3", AppleWatch, "Ultra 3", 422, 514),
            Self::builtin("Apple Watch Ultra 2/Ultra", AppleWatch, "Ultra", 410, 502),
            Self::builtin("Apple Watch Series 11/10", AppleWatch, "Series 11/10", 416, 496),
            Self::builtin("Apple Watch Series 9/8/7", AppleWatch, "Series 9/8/7", 396, 484),
            Self::builtin("Apple Watch Series 6/5/4/SE", AppleWatch, "Series 6/5/4/SE", 368, 448),
            Self::builtin("Apple Watch Series 3", AppleWatch, "Series 3", 312, 390),
            Self::builtin("Apple TV 4K", AppleTv, "4K", 3840, 2160),
            Self::builtin("Apple TV HD", AppleTv, "HD", 1920, 1080),
            Self::builtin("Apple Vision Pro", AppleVisionPro, "Standard", 3840, 2160),
        ]
    }

    pub fn sizes_for(category: DeviceCategory) -> Vec<DeviceSize> {
        Self::all()
            .into_iter()
            .filter(|d| d.category == category)
            .collect()
    }

    /// Look up a built-in device by exact name.
    pub fn find(name: &str) -> Option<DeviceSize> {
        Self::all().into_iter().find(|d| d.name == name)
    }
}

/// Tallest built-in device of the category; `None` for custom devices.
pub fn reference_device(category: DeviceCategory) -> Option<DeviceSize> {
    if !category.has_shared_reference() {
        return None;
    }
    DeviceSize::sizes_for(category)
        .into_iter()
        .max_by_key(|d| d.portrait_height)
}

pub fn scale_factor(reference: &DeviceSize, target: &DeviceSize) -> f64 {
    target.portrait_height as f64 / reference.portrait_height as f64
}

/// Scale factor applied to paddings and font sizes when laying out `device`.
pub fn layout_scale_factor(device: &DeviceSize) -> f64 {
    reference_device(device.category)
        .map(|reference| scale_factor(&reference, device))
        .unwrap_or(1.0)
}
