//! The persisted session record
//!
//! Field names follow the on-disk format:
//!
//! ```text
//! { sourceFiles: [{ id, name, type, file }],
//!   pages: [{ id, sourceFileId, sourcePageIndex, type, rotation, textOverlays }] }
//! ```
//!
//! Raw source bytes are stored base64-encoded; parsed PDF handles are never
//! persisted and are rebuilt from the bytes on load.

use crate::model::PageSequence;
use crate::source::SourceRegistry;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub source_files: Vec<SourceRecord>,
    pub pages: Vec<PageRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: SourceId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(with = "base64_bytes", default)]
    pub file: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub id: PageId,
    pub source_file_id: SourceId,
    pub source_page_index: u32,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub rotation: u16,
    #[serde(default)]
    pub text_overlays: Vec<TextOverlay>,
}

impl SessionRecord {
    /// Capture every registered source and the current page sequence
    pub fn capture(registry: &SourceRegistry, pages: &PageSequence) -> Self {
        let source_files = registry
            .list()
            .iter()
            .map(|source| SourceRecord {
                id: source.id,
                name: source.name.clone(),
                kind: source.kind,
                file: source.bytes().map(|b| b.to_vec()).unwrap_or_default(),
            })
            .collect();

        let pages = pages
            .pages()
            .iter()
            .map(|page| PageRecord {
                id: page.id,
                source_file_id: page.source_id,
                source_page_index: page.source_page_index,
                kind: registry
                    .get(page.source_id)
                    .map(|s| s.kind)
                    .unwrap_or(SourceKind::Blank),
                rotation: page.rotation,
                text_overlays: page.overlays.clone(),
            })
            .collect();

        Self {
            source_files,
            pages,
        }
    }

    /// Page records as model pages, in stored order
    pub fn to_pages(&self) -> Vec<Page> {
        self.pages
            .iter()
            .map(|record| Page {
                id: record.id,
                source_id: record.source_file_id,
                source_page_index: record.source_page_index,
                rotation: normalize_rotation(record.rotation as i64),
                overlays: record.text_overlays.clone(),
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_field_names() {
        let record = SessionRecord {
            source_files: vec![SourceRecord {
                id: SourceId(1),
                name: "a.png".to_string(),
                kind: SourceKind::Image,
                file: vec![0, 1, 2],
            }],
            pages: vec![PageRecord {
                id: PageId(7),
                source_file_id: SourceId(1),
                source_page_index: 0,
                kind: SourceKind::Image,
                rotation: 90,
                text_overlays: vec![TextOverlay::new("hi")],
            }],
        };

        let json: serde_json::Value = serde_json::from_slice(&record.to_json().unwrap()).unwrap();
        assert_eq!(json["sourceFiles"][0]["type"], "image");
        assert_eq!(json["sourceFiles"][0]["file"], "AAEC");
        assert_eq!(json["pages"][0]["sourceFileId"], 1);
        assert_eq!(json["pages"][0]["textOverlays"][0]["xPercent"], 50.0);
        assert_eq!(json["pages"][0]["textOverlays"][0]["font"], "Helvetica");

        let parsed = SessionRecord::from_json(&record.to_json().unwrap()).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_corrupt_json_is_an_error() {
        assert!(SessionRecord::from_json(b"{\"sourceFiles\": 3").is_err());
    }
}
