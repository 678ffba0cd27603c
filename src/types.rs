//! Core types shared by the submission workflow

use crate::config::OutputFormat;
use image::Rgba;
use serde::{Deserialize, Serialize};

/// Fill used by the canvas when a color cannot be parsed
pub const CANVAS_DEFAULT_FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Color used when the form does not carry one
pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffffff";

/// A binary upload taken from the form
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Client-supplied file name
    pub name: String,
    /// Client-supplied content type, if any
    pub content_type: Option<String>,
    /// Raw file contents
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl UploadedFile {
    #[must_use]
    pub fn new<S: Into<String>>(name: S, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes,
        }
    }

    #[must_use]
    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Size in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// MIME type of the upload: declared type first, then sniffed from content
    #[must_use]
    pub fn mime_type(&self) -> String {
        match &self.content_type {
            Some(declared) if !declared.trim().is_empty() => declared.clone(),
            _ => image::guess_format(&self.bytes)
                .map(|format| format.to_mime_type().to_string())
                .unwrap_or_else(|_| "application/octet-stream".to_string()),
        }
    }
}

/// How the area behind the foreground is painted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    /// Leave the canvas transparent
    #[default]
    Transparent,
    /// Fill the canvas with the chosen color
    Color,
    /// Composite over a user-supplied background image
    Image,
}

impl BackgroundMode {
    /// Parse a form value; `None` for anything outside the known set
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "transparent" => Some(Self::Transparent),
            "color" => Some(Self::Color),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transparent => write!(f, "transparent"),
            Self::Color => write!(f, "color"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// CSS hex color as typed into the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundColor(pub String);

impl Default for BackgroundColor {
    fn default() -> Self {
        Self(DEFAULT_BACKGROUND_COLOR.to_string())
    }
}

impl BackgroundColor {
    #[must_use]
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    /// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`
    #[must_use]
    pub fn to_rgba(&self) -> Option<Rgba<u8>> {
        let hex = self.0.trim().strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let nibble = |i: usize| -> Option<u8> {
            let v = u8::from_str_radix(hex.get(i..=i)?, 16).ok()?;
            Some(v * 17)
        };
        let byte = |i: usize| -> Option<u8> { u8::from_str_radix(hex.get(i..i + 2)?, 16).ok() };
        match hex.len() {
            3 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
            4 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?])),
            6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
            8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
            _ => None,
        }
    }

    /// Parsed color, or the canvas default fill when the value is unusable
    #[must_use]
    pub fn to_rgba_or_default(&self) -> Rgba<u8> {
        self.to_rgba().unwrap_or_else(|| {
            tracing::warn!(color = %self.0, "Unparsable background color, using canvas default");
            CANVAS_DEFAULT_FILL
        })
    }
}

/// Input bundle for one submit event
#[derive(Debug, Clone, Default)]
pub struct Submission {
    /// Image to process
    pub file: Option<UploadedFile>,
    /// Whether to strip the background remotely first
    pub remove_bg: bool,
    /// Background mode
    pub background: BackgroundMode,
    /// Color used in `BackgroundMode::Color`
    pub background_color: BackgroundColor,
    /// Image used in `BackgroundMode::Image`
    pub background_file: Option<UploadedFile>,
}

impl Submission {
    #[must_use]
    pub fn new(file: UploadedFile) -> Self {
        Self {
            file: Some(file),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn remove_background(mut self, remove_bg: bool) -> Self {
        self.remove_bg = remove_bg;
        self
    }

    #[must_use]
    pub fn transparent(mut self) -> Self {
        self.background = BackgroundMode::Transparent;
        self
    }

    #[must_use]
    pub fn color<S: Into<String>>(mut self, color: S) -> Self {
        self.background = BackgroundMode::Color;
        self.background_color = BackgroundColor::new(color);
        self
    }

    #[must_use]
    pub fn background_image(mut self, file: UploadedFile) -> Self {
        self.background = BackgroundMode::Image;
        self.background_file = Some(file);
        self
    }

    /// Background file, if the image mode applies and the file is non-empty
    #[must_use]
    pub fn custom_background(&self) -> Option<&UploadedFile> {
        match self.background {
            BackgroundMode::Image => self.background_file.as_ref().filter(|f| !f.is_empty()),
            BackgroundMode::Transparent | BackgroundMode::Color => None,
        }
    }
}

/// A composed image encoded as a data URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutput {
    /// `data:<mime>;base64,<payload>`
    pub data_url: String,
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Encoding of the payload
    pub format: OutputFormat,
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingOutcome {
    /// Image shown as preview (composited over the custom background when one was used)
    pub preview: String,
    /// Foreground result: a local data URL or the reference returned by the service
    pub foreground: String,
    /// Whether the background was removed remotely
    pub background_removed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_colors() {
        assert_eq!(
            BackgroundColor::new("#ffffff").to_rgba(),
            Some(Rgba([255, 255, 255, 255]))
        );
        assert_eq!(
            BackgroundColor::new("#f00").to_rgba(),
            Some(Rgba([255, 0, 0, 255]))
        );
        assert_eq!(
            BackgroundColor::new("#00ff0080").to_rgba(),
            Some(Rgba([0, 255, 0, 128]))
        );
        assert_eq!(
            BackgroundColor::new("#0008").to_rgba(),
            Some(Rgba([0, 0, 0, 136]))
        );
    }

    #[test]
    fn test_invalid_colors_fall_back() {
        for value in ["", "ffffff", "#ff", "#gggggg", "red", "#12345"] {
            let color = BackgroundColor::new(value);
            assert_eq!(color.to_rgba(), None, "{value} should not parse");
            assert_eq!(color.to_rgba_or_default(), CANVAS_DEFAULT_FILL);
        }
    }

    #[test]
    fn test_background_mode_parse() {
        assert_eq!(BackgroundMode::parse("color"), Some(BackgroundMode::Color));
        assert_eq!(BackgroundMode::parse("image"), Some(BackgroundMode::Image));
        assert_eq!(BackgroundMode::parse("Image"), None);
        assert_eq!(BackgroundMode::default(), BackgroundMode::Transparent);
    }

    #[test]
    fn test_custom_background_requires_image_mode_and_content() {
        let fg = UploadedFile::new("fg.png", vec![1, 2, 3]);
        let bg = UploadedFile::new("bg.png", vec![4, 5, 6]);

        let submission = Submission::new(fg.clone()).background_image(bg.clone());
        assert!(submission.custom_background().is_some());

        let mut color = Submission::new(fg.clone()).color("#000");
        color.background_file = Some(bg);
        assert!(color.custom_background().is_none());

        let empty = Submission::new(fg).background_image(UploadedFile::new("bg.png", vec![]));
        assert!(empty.custom_background().is_none());
    }

    #[test]
    fn test_mime_type_prefers_declared() {
        let file = UploadedFile::new("a.bin", vec![0, 1]).with_content_type("image/jpeg");
        assert_eq!(file.mime_type(), "image/jpeg");

        let unknown = UploadedFile::new("a.bin", vec![0, 1]);
        assert_eq!(unknown.mime_type(), "application/octet-stream");
    }

    #[test]
    fn test_uploaded_file_debug_hides_bytes() {
        let file = UploadedFile::new("a.png", vec![7; 1024]);
        let debug = format!("{:?}", file);
        assert!(debug.contains("1024"));
        assert!(!debug.contains("7, 7"));
    }
}
