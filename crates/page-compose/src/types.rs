use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("Unsupported format for {name}: {media_type:?}")]
    UnsupportedFormat { name: String, media_type: String },
    #[error("Failed to decode {name}: {reason}")]
    Decode { name: String, reason: String },
    #[error("Persistence failure: {0}")]
    Persistence(String),
    #[error("Export failed at page {page} ({source_name}): {reason}")]
    Export {
        page: usize,
        source_name: String,
        reason: String,
    },
    #[error("Invalid text overlay: {0}")]
    InvalidOverlay(String),
    #[error("Rotation must be a multiple of 90 degrees, got {0}")]
    InvalidRotation(i32),
    #[error("No pages to export")]
    NoPages,
}

pub type Result<T> = std::result::Result<T, ComposeError>;

/// Identifier of a page in the workspace, stable across reorder and undo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u64);

/// Identifier of a loaded source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source-{}", self.0)
    }
}

/// Monotonic id source. Ids restored from a persisted session are fed back
/// through `observe` so freshly minted ids never collide with them.
#[derive(Debug, Clone, Default)]
pub(crate) struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    pub(crate) fn next(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    pub(crate) fn observe(&mut self, id: u64) {
        self.last = self.last.max(id);
    }
}

/// Kind of source a page is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Image,
    Blank,
}

/// Page size in PDF points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// ISO A4 at 72 dpi
    pub const A4: PageSize = PageSize {
        width_pt: 595.0,
        height_pt: 842.0,
    };

    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self {
            width_pt,
            height_pt,
        }
    }

    pub fn swapped(self) -> Self {
        Self {
            width_pt: self.height_pt,
            height_pt: self.width_pt,
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// Normalize any multiple-of-90 angle into {0, 90, 180, 270}
pub fn normalize_rotation(degrees: i64) -> u16 {
    degrees.rem_euclid(360) as u16
}

/// The standard PDF fonts a text overlay can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StandardFont {
    #[default]
    Helvetica,
    TimesRoman,
    Courier,
}

impl StandardFont {
    /// PostScript name of the base-14 font
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::Courier => "Courier",
        }
    }
}

/// A positioned, styled run of text drawn on top of a page at export time.
///
/// `x_percent`/`y_percent` locate the centre of the text relative to the
/// page as displayed, with y measured from the top edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    #[serde(rename = "xPercent")]
    pub x_percent: f32,
    #[serde(rename = "yPercent")]
    pub y_percent: f32,
    #[serde(rename = "size")]
    pub size_pt: f32,
    #[serde(rename = "color")]
    pub color_hex: String,
    pub opacity: f32,
    #[serde(rename = "rotation")]
    pub rotation_deg: i32,
    #[serde(default)]
    pub font: StandardFont,
}

impl TextOverlay {
    /// Black, fully opaque 24pt Helvetica centred on the page
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            x_percent: 50.0,
            y_percent: 50.0,
            size_pt: 24.0,
            color_hex: "#000000".to_string(),
            opacity: 1.0,
            rotation_deg: 0,
            font: StandardFont::Helvetica,
        }
    }

    pub fn at(mut self, x_percent: f32, y_percent: f32) -> Self {
        self.x_percent = x_percent;
        self.y_percent = y_percent;
        self
    }

    /// Parse `color_hex` into 0..1 RGB components
    pub fn rgb(&self) -> Option<(f32, f32, f32)> {
        parse_hex_color(&self.color_hex)
    }

    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(ComposeError::InvalidOverlay("text is empty".to_string()));
        }
        if !(0.0..=100.0).contains(&self.x_percent) || !(0.0..=100.0).contains(&self.y_percent) {
            return Err(ComposeError::InvalidOverlay(format!(
                "position ({}, {}) is outside 0-100%",
                self.x_percent, self.y_percent
            )));
        }
        if self.size_pt.is_nan() || self.size_pt <= 0.0 {
            return Err(ComposeError::InvalidOverlay(format!(
                "font size must be positive, got {}",
                self.size_pt
            )));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(ComposeError::InvalidOverlay(format!(
                "opacity must be within 0-1, got {}",
                self.opacity
            )));
        }
        if self.rgb().is_none() {
            return Err(ComposeError::InvalidOverlay(format!(
                "color {:?} is not #RRGGBB",
                self.color_hex
            )));
        }
        Ok(())
    }
}

fn parse_hex_color(color: &str) -> Option<(f32, f32, f32)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .ok()
            .map(|v| v as f32 / 255.0)
    };
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// One entry in the workspace's ordered page sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub id: PageId,
    pub source_id: SourceId,
    /// Zero-based index into the source's pages (always 0 for images and blanks)
    pub source_page_index: u32,
    /// Clockwise rotation in {0, 90, 180, 270}, added on top of any rotation
    /// stored in the source page
    pub rotation: u16,
    /// Drawn in order, so later overlays sit on top
    pub overlays: Vec<TextOverlay>,
}

impl Page {
    pub fn new(id: PageId, source_id: SourceId, source_page_index: u32) -> Self {
        Self {
            id,
            source_id,
            source_page_index,
            rotation: 0,
            overlays: Vec::new(),
        }
    }

    /// Structural copy under a new id. Overlays are owned by the copy.
    pub fn duplicate_as(&self, id: PageId) -> Self {
        Self {
            id,
            source_id: self.source_id,
            source_page_index: self.source_page_index,
            rotation: self.rotation,
            overlays: self.overlays.clone(),
        }
    }

    pub fn rotate(&mut self, delta_degrees: i32) {
        self.rotation = normalize_rotation(self.rotation as i64 + delta_degrees as i64);
    }

    /// Whether a 90/270 rotation swaps the page's displayed width and height
    pub fn is_sideways(&self) -> bool {
        self.rotation % 180 == 90
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        let overlay = TextOverlay {
            color_hex: "#FF8000".to_string(),
            ..TextOverlay::new("x")
        };
        let (r, g, b) = overlay.rgb().unwrap();
        assert_eq!(r, 1.0);
        assert!((g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(b, 0.0);

        assert!(parse_hex_color("FF8000").is_none());
        assert!(parse_hex_color("#FF80").is_none());
        assert!(parse_hex_color("#GG0000").is_none());
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(-90), 270);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(360), 0);
    }

    #[test]
    fn test_overlay_validation() {
        assert!(TextOverlay::new("hello").validate().is_ok());
        assert!(TextOverlay::new("   ").validate().is_err());
        assert!(TextOverlay::new("x").at(101.0, 0.0).validate().is_err());

        let mut overlay = TextOverlay::new("x");
        overlay.opacity = 1.5;
        assert!(overlay.validate().is_err());
    }

    #[test]
    fn test_id_generator_skips_observed() {
        let mut ids = IdGenerator::default();
        assert_eq!(ids.next(), 1);
        ids.observe(10);
        assert_eq!(ids.next(), 11);
        ids.observe(3);
        assert_eq!(ids.next(), 12);
    }
}
