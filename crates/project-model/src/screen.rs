//! Screens: the unit of design that is exported once per device and language.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::color::HexColor;
use crate::device::{DeviceCategory, DeviceFrameConfig};

/// Where caption text sits relative to the screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutPreset {
    TextTop,
    TextOverlay,
    TextBottom,
    TextOnly,
    ScreenshotOnly,
}

impl LayoutPreset {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::TextTop => "Text Top",
            Self::TextOverlay => "Overlay",
            Self::TextBottom => "Text Bottom",
            Self::TextOnly => "Text Only",
            Self::ScreenshotOnly => "Screenshot Only",
        }
    }

    pub fn has_screenshot(self) -> bool {
        self != Self::TextOnly
    }

    pub fn has_text(self) -> bool {
        self != Self::ScreenshotOnly
    }
}

/// How source content maps into the screenshot area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    /// Whole frame visible, letterboxed.
    #[default]
    Fit,
    /// Area fully covered, frame cropped.
    Fill,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum BackgroundStyle {
    SolidColor { color: HexColor },
    Gradient { start: HexColor, end: HexColor },
    Image { path: PathBuf },
}

impl Default for BackgroundStyle {
    fn default() -> Self {
        Self::Gradient {
            start: HexColor::new("#667EEA"),
            end: HexColor::new("#764BA2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlignment {
    Leading,
    #[default]
    Center,
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub alignment: TextAlignment,
}

impl TextStyle {
    pub fn title() -> Self {
        Self {
            bold: true,
            italic: false,
            alignment: TextAlignment::Center,
        }
    }

    pub fn subtitle() -> Self {
        Self {
            bold: false,
            ..Self::title()
        }
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self::title()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizedText {
    pub title: String,
    pub subtitle: String,
}

impl LocalizedText {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.subtitle.is_empty()
    }
}

/// Content assigned to one (language, device category) slot.
///
/// A slot holds either a still image or a video, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MediaAssignment {
    Image {
        path: PathBuf,
    },
    Video {
        path: PathBuf,
        /// Time in seconds of the frame used for thumbnails and poster exports.
        #[serde(default)]
        poster_time_secs: f64,
    },
}

impl MediaAssignment {
    pub fn path(&self) -> &Path {
        match self {
            Self::Image { path } | Self::Video { path, .. } => path,
        }
    }

    fn path_mut(&mut self) -> &mut PathBuf {
        match self {
            Self::Image { path } | Self::Video { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Screen {
    pub id: String,
    pub name: String,
    pub layout_preset: LayoutPreset,
    pub localized_texts: BTreeMap<String, LocalizedText>,
    pub background: BackgroundStyle,
    pub show_device_frame: bool,
    pub is_landscape: bool,
    pub font_family: String,
    /// Title size used for any category without an override.
    pub font_size: f64,
    pub font_sizes: BTreeMap<DeviceCategory, f64>,
    pub text_color_hex: String,
    pub title_style: TextStyle,
    pub subtitle_style: TextStyle,
    /// Gap between the caption block and the device frame, before scaling.
    pub text_to_image_spacing: f64,
    pub device_frame_config: DeviceFrameConfig,
    pub content_mode: ContentMode,
    /// Shrink the screenshot area to the content's aspect ratio.
    pub fit_frame_to_content: bool,
    /// Keyed by [`media_key`].
    pub media: BTreeMap<String, MediaAssignment>,
}

impl Screen {
    pub const DEFAULT_FONT_SIZE: f64 = 96.0;
    pub const DEFAULT_TEXT_SPACING: f64 = 24.0;

    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.to_lowercase().replace(' ', "-"),
            name,
            ..Self::default()
        }
    }

    pub fn text_for(&self, language: &str) -> LocalizedText {
        self.localized_texts
            .get(language)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_text(&mut self, language: impl Into<String>, text: LocalizedText) {
        self.localized_texts.insert(language.into(), text);
    }

    pub fn font_size_for(&self, category: DeviceCategory) -> f64 {
        self.font_sizes
            .get(&category)
            .copied()
            .unwrap_or(self.font_size)
    }

    pub fn set_font_size(&mut self, category: DeviceCategory, size: f64) {
        self.font_sizes.insert(category, size);
    }

    pub fn media_for(&self, language: &str, category: DeviceCategory) -> Option<&MediaAssignment> {
        self.media.get(&media_key(language, category))
    }

    pub fn image_for(&self, language: &str, category: DeviceCategory) -> Option<&Path> {
        match self.media_for(language, category)? {
            MediaAssignment::Image { path } => Some(path),
            MediaAssignment::Video { .. } => None,
        }
    }

    pub fn video_for(&self, language: &str, category: DeviceCategory) -> Option<&Path> {
        match self.media_for(language, category)? {
            MediaAssignment::Video { path, .. } => Some(path),
            MediaAssignment::Image { .. } => None,
        }
    }

    pub fn has_video(&self, language: &str, category: DeviceCategory) -> bool {
        self.video_for(language, category).is_some()
    }

    /// Poster time for the slot's video, or 0 when the slot holds no video.
    pub fn poster_time(&self, language: &str, category: DeviceCategory) -> f64 {
        match self.media_for(language, category) {
            Some(MediaAssignment::Video {
                poster_time_secs, ..
            }) => *poster_time_secs,
            _ => 0.0,
        }
    }

    /// Assign a still image, replacing any video in the same slot.
    pub fn set_image(&mut self, language: &str, category: DeviceCategory, path: impl Into<PathBuf>) {
        self.media.insert(
            media_key(language, category),
            MediaAssignment::Image { path: path.into() },
        );
    }

    /// Assign a video, replacing any still image in the same slot.
    pub fn set_video(
        &mut self,
        language: &str,
        category: DeviceCategory,
        path: impl Into<PathBuf>,
        poster_time_secs: f64,
    ) {
        self.media.insert(
            media_key(language, category),
            MediaAssignment::Video {
                path: path.into(),
                poster_time_secs: poster_time_secs.max(0.0),
            },
        );
    }

    pub fn clear_media(&mut self, language: &str, category: DeviceCategory) {
        self.media.remove(&media_key(language, category));
    }

    /// Resolve relative media paths against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for assignment in self.media.values_mut() {
            let path = assignment.path_mut();
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let BackgroundStyle::Image { path } = &mut self.background {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: "New Screen".to_string(),
            layout_preset: LayoutPreset::TextTop,
            localized_texts: BTreeMap::new(),
            background: BackgroundStyle::default(),
            show_device_frame: true,
            is_landscape: false,
            font_family: "SF Pro Display".to_string(),
            font_size: Self::DEFAULT_FONT_SIZE,
            font_sizes: BTreeMap::new(),
            text_color_hex: "#FFFFFF".to_string(),
            title_style: TextStyle::title(),
            subtitle_style: TextStyle::subtitle(),
            text_to_image_spacing: Self::DEFAULT_TEXT_SPACING,
            device_frame_config: DeviceFrameConfig::default(),
            content_mode: ContentMode::Fit,
            fit_frame_to_content: false,
            media: BTreeMap::new(),
        }
    }
}

/// Key of a media slot: `"<language>-<category>"`.
pub fn media_key(language: &str, category: DeviceCategory) -> String {
    format!("{language}-{}", category.key())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let screen = Screen::new("Screen 1");
        assert_eq!(screen.layout_preset, LayoutPreset::TextTop);
        assert!(screen.show_device_frame);
        assert_eq!(screen.text_color_hex, "#FFFFFF");
        assert!(screen.title_style.bold);
        assert!(!screen.subtitle_style.bold);
        assert_eq!(screen.font_size_for(DeviceCategory::IPhone), 96.0);
        assert_eq!(screen.id, "screen-1");
    }

    #[test]
    fn test_font_size_overrides_per_category() {
        let mut screen = Screen::new("s");
        screen.set_font_size(DeviceCategory::IPad, 120.0);
        assert_eq!(screen.font_size_for(DeviceCategory::IPad), 120.0);
        assert_eq!(screen.font_size_for(DeviceCategory::Mac), 96.0);
    }

    #[test]
    fn test_media_assignment_is_exclusive() {
        let mut screen = Screen::new("s");
        screen.set_image("en", DeviceCategory::IPhone, "shot.png");
        assert!(screen.image_for("en", DeviceCategory::IPhone).is_some());

        screen.set_video("en", DeviceCategory::IPhone, "clip.mov", 1.5);
        assert!(screen.image_for("en", DeviceCategory::IPhone).is_none());
        assert!(screen.has_video("en", DeviceCategory::IPhone));
        assert_eq!(screen.poster_time("en", DeviceCategory::IPhone), 1.5);

        screen.set_image("en", DeviceCategory::IPhone, "shot.png");
        assert!(!screen.has_video("en", DeviceCategory::IPhone));
        assert_eq!(screen.poster_time("en", DeviceCategory::IPhone), 0.0);
    }

    #[test]
    fn test_media_is_keyed_by_language_and_category() {
        let mut screen = Screen::new("s");
        screen.set_video("en", DeviceCategory::IPhone, "en.mov", 0.0);
        assert!(!screen.has_video("ja", DeviceCategory::IPhone));
        assert!(!screen.has_video("en", DeviceCategory::IPad));
        assert!(screen.media.contains_key("en-iPhone"));
    }

    #[test]
    fn test_unknown_language_gives_empty_text() {
        let mut screen = Screen::new("s");
        screen.set_text("en", LocalizedText::new("Title", "Sub"));
        assert_eq!(screen.text_for("en").title, "Title");
        assert!(screen.text_for("fr").is_empty());
    }

    #[test]
    fn test_resolve_paths_keeps_absolute() {
        let mut screen = Screen::new("s");
        screen.set_image("en", DeviceCategory::IPhone, "shots/a.png");
        screen.set_video("en", DeviceCategory::IPad, "/abs/clip.mov", 0.0);
        screen.resolve_paths(Path::new("/project"));
        assert_eq!(
            screen.image_for("en", DeviceCategory::IPhone),
            Some(Path::new("/project/shots/a.png"))
        );
        assert_eq!(
            screen.video_for("en", DeviceCategory::IPad),
            Some(Path::new("/abs/clip.mov"))
        );
    }

    #[test]
    fn test_serde_roundtrip_with_media() {
        let mut screen = Screen::new("s");
        screen.set_video("en", DeviceCategory::IPhone, "clip.mov", 2.0);
        screen.set_font_size(DeviceCategory::IPhone, 80.0);
        let json = serde_json::to_string(&screen).unwrap();
        let back: Screen = serde_json::from_str(&json).unwrap();
        assert_eq!(back, screen);
    }
}
