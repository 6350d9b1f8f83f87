//! Caption font resolution.
//!
//! Fonts are looked up per family: explicit files from [`FontConfig`] win,
//! then files in the search directories whose names start with the family
//! name, then a short list of common sans-serif families.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fontdue::{Font, FontSettings};

use shotcraft_common::FontConfig;

const SYSTEM_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts",
    "/usr/local/share/fonts",
    "/System/Library/Fonts",
    "/Library/Fonts",
    "C:\\Windows\\Fonts",
];

const FALLBACK_FAMILIES: &[&str] = &[
    "dejavusans",
    "liberationsans",
    "notosans",
    "arial",
    "helvetica",
];

const MAX_SCAN_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FaceStyle {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FaceStyle {
    fn of(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => Self::Regular,
            (true, false) => Self::Bold,
            (false, true) => Self::Italic,
            (true, true) => Self::BoldItalic,
        }
    }

    /// Classify the part of a normalized file stem after the family name.
    fn from_suffix(suffix: &str) -> Option<Self> {
        let bold = suffix.contains("bold");
        let italic = suffix.contains("italic") || suffix.contains("oblique");
        let plain = suffix.is_empty() || suffix == "regular" || suffix == "book" || suffix == "roman";
        match (bold, italic) {
            (true, true) => Some(Self::BoldItalic),
            (true, false) if !suffix.contains("semi") && !suffix.contains("extra") => {
                Some(Self::Bold)
            }
            (false, true) if suffix.len() <= "regularoblique".len() => Some(Self::Italic),
            (false, false) if plain => Some(Self::Regular),
            _ => None,
        }
    }

    /// Preferred faces in order when the exact style is missing.
    fn fallbacks(self) -> &'static [FaceStyle] {
        match self {
            Self::Regular => &[Self::Regular, Self::Bold, Self::Italic, Self::BoldItalic],
            Self::Bold => &[Self::Bold, Self::Regular, Self::BoldItalic],
            Self::Italic => &[Self::Italic, Self::Regular, Self::BoldItalic],
            Self::BoldItalic => &[Self::BoldItalic, Self::Bold, Self::Italic, Self::Regular],
        }
    }
}

/// Faces of one family.
#[derive(Default)]
pub struct FontBook {
    faces: HashMap<FaceStyle, Font>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("faces", &self.faces.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FontBook {
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Best available face for the requested style.
    pub fn face(&self, bold: bool, italic: bool) -> Option<&Font> {
        FaceStyle::of(bold, italic)
            .fallbacks()
            .iter()
            .find_map(|style| self.faces.get(style))
    }

    fn insert_file(&mut self, style: FaceStyle, path: &Path) {
        if self.faces.contains_key(&style) {
            return;
        }
        match load_font(path) {
            Ok(font) => {
                tracing::debug!(path = %path.display(), ?style, "Loaded font face");
                self.faces.insert(style, font);
            }
            Err(e) => tracing::warn!(path = %path.display(), "Skipping font: {e}"),
        }
    }
}

fn load_font(path: &Path) -> Result<Font, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    Font::from_bytes(bytes, FontSettings::default()).map_err(|e| e.to_string())
}

/// Lazily resolved font families, shared across a batch.
pub struct FontLibrary {
    config: FontConfig,
    files: Vec<PathBuf>,
    cache: Mutex<HashMap<String, Arc<FontBook>>>,
}

impl FontLibrary {
    /// Scan configured and system font directories once.
    pub fn new(config: FontConfig) -> Self {
        let mut files = Vec::new();
        let system = SYSTEM_FONT_DIRS.iter().map(PathBuf::from);
        for dir in config.search_dirs.iter().cloned().chain(system) {
            collect_font_files(&dir, 0, &mut files);
        }
        tracing::debug!(count = files.len(), "Indexed font files");
        Self {
            config,
            files,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// A library with no fonts; captions are skipped.
    pub fn empty() -> Self {
        Self {
            config: FontConfig::default(),
            files: Vec::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn book(&self, family: &str) -> Arc<FontBook> {
        let key = normalize(family);
        if let Ok(cache) = self.cache.lock() {
            if let Some(book) = cache.get(&key) {
                return Arc::clone(book);
            }
        }

        let book = Arc::new(self.resolve(&key));
        if book.is_empty() {
            tracing::warn!(family, "No usable font found; captions will not be drawn");
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, Arc::clone(&book));
        }
        book
    }

    fn resolve(&self, family: &str) -> FontBook {
        let mut book = FontBook::default();

        let explicit = [
            (FaceStyle::Regular, &self.config.regular),
            (FaceStyle::Bold, &self.config.bold),
            (FaceStyle::Italic, &self.config.italic),
            (FaceStyle::BoldItalic, &self.config.bold_italic),
        ];
        for (style, path) in explicit {
            if let Some(path) = path {
                book.insert_file(style, path);
            }
        }

        let families = std::iter::once(family).chain(FALLBACK_FAMILIES.iter().copied());
        for candidate in families {
            if candidate.is_empty() {
                continue;
            }
            for path in &self.files {
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let stem = normalize(stem);
                let Some(suffix) = stem.strip_prefix(candidate) else {
                    continue;
                };
                if let Some(style) = FaceStyle::from_suffix(suffix) {
                    book.insert_file(style, path);
                }
            }
            if book.faces.contains_key(&FaceStyle::Regular) {
                break;
            }
        }

        book
    }
}

fn collect_font_files(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    // Directory order is unspecified; keep resolution stable across runs.
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_font_files(&path, depth + 1, out);
        } else if matches!(
            path.extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .as_deref(),
            Some("ttf" | "otf")
        ) {
            out.push(path);
        }
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
