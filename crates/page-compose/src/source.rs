//! Source registry - the loaded documents pages are drawn from
//!
//! Sources own the heavyweight data (raw bytes and the parsed PDF). Pages only
//! hold a `SourceId`, so a source stays registered for as long as the session
//! lives and is dropped only when the whole workspace is cleared.

use crate::constants::BLANK_SOURCE_NAME;
use crate::persistence::SourceRecord;
use crate::types::*;
use lopdf::Document;
use std::path::Path;
use std::sync::Arc;

/// A file handed to the workspace by a picker or drop target
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, inferring the media type from its extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media_type = media_type_for_name(&name).unwrap_or_default().to_string();
        Ok(Self {
            name,
            media_type,
            bytes,
        })
    }
}

fn media_type_for_name(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Classify a file by its declared media type.
///
/// A missing or generic declared type falls back to the file extension.
pub fn classify(name: &str, media_type: &str) -> Result<SourceKind> {
    let declared = media_type.trim().to_ascii_lowercase();
    let effective = if declared.is_empty() || declared == "application/octet-stream" {
        media_type_for_name(name).unwrap_or_default().to_string()
    } else {
        declared
    };

    match effective.as_str() {
        "application/pdf" => Ok(SourceKind::Pdf),
        "image/png" | "image/jpeg" | "image/jpg" => Ok(SourceKind::Image),
        _ => Err(ComposeError::UnsupportedFormat {
            name: name.to_string(),
            media_type: media_type.to_string(),
        }),
    }
}

/// A loaded source document
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub id: SourceId,
    pub name: String,
    pub kind: SourceKind,
    bytes: Option<Arc<[u8]>>,
    pdf: Option<Arc<Document>>,
    page_count: u32,
}

impl SourceDocument {
    /// Original file content (absent for the blank source)
    pub fn bytes(&self) -> Option<&Arc<[u8]>> {
        self.bytes.as_ref()
    }

    /// Parsed document pages are copied out of at export time (PDF only)
    pub fn pdf(&self) -> Option<&Arc<Document>> {
        self.pdf.as_ref()
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }
}

/// A source whose decode step has completed but which is not yet registered
#[derive(Debug)]
pub struct DecodedSource {
    name: String,
    kind: SourceKind,
    bytes: Arc<[u8]>,
    pdf: Option<Arc<Document>>,
    page_count: u32,
}

impl DecodedSource {
    pub fn page_count(&self) -> u32 {
        self.page_count
    }
}

/// Classify and decode a file without touching any workspace state
pub async fn decode_file(file: IncomingFile) -> Result<DecodedSource> {
    let kind = classify(&file.name, &file.media_type)?;
    let bytes: Arc<[u8]> = file.bytes.into();

    match kind {
        SourceKind::Pdf => {
            let doc = decode_pdf(&file.name, Arc::clone(&bytes)).await?;
            let page_count = doc.get_pages().len() as u32;
            Ok(DecodedSource {
                name: file.name,
                kind,
                bytes,
                pdf: Some(Arc::new(doc)),
                page_count,
            })
        }
        // Images are decoded lazily, at export time
        _ => Ok(DecodedSource {
            name: file.name,
            kind,
            bytes,
            pdf: None,
            page_count: 1,
        }),
    }
}

async fn decode_pdf(name: &str, bytes: Arc<[u8]>) -> Result<Document> {
    let decoded = tokio::task::spawn_blocking(move || Document::load_mem(&bytes)).await?;
    let doc = decoded.map_err(|e| ComposeError::Decode {
        name: name.to_string(),
        reason: e.to_string(),
    })?;

    if doc.get_pages().is_empty() {
        return Err(ComposeError::Decode {
            name: name.to_string(),
            reason: "document has no pages".to_string(),
        });
    }
    Ok(doc)
}

/// Owns every source loaded in the session, in insertion order
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<SourceDocument>,
    blank: Option<SourceId>,
    ids: IdGenerator,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and register a file in one step
    pub async fn ingest(&mut self, file: IncomingFile) -> Result<&SourceDocument> {
        let decoded = decode_file(file).await?;
        let index = self.sources.len();
        self.register(decoded);
        Ok(&self.sources[index])
    }

    /// Register a decoded source, returning its new id
    pub fn register(&mut self, decoded: DecodedSource) -> SourceId {
        let id = SourceId(self.ids.next());
        log::debug!(
            "Registered {} ({:?}, {} pages) as {}",
            decoded.name,
            decoded.kind,
            decoded.page_count,
            id
        );
        self.sources.push(SourceDocument {
            id,
            name: decoded.name,
            kind: decoded.kind,
            bytes: Some(decoded.bytes),
            pdf: decoded.pdf,
            page_count: decoded.page_count,
        });
        id
    }

    /// The singleton blank-page source, created on first use
    pub fn get_or_create_blank(&mut self) -> SourceId {
        if let Some(id) = self.blank {
            return id;
        }
        let id = SourceId(self.ids.next());
        self.insert_blank(id);
        id
    }

    fn insert_blank(&mut self, id: SourceId) {
        self.sources.push(SourceDocument {
            id,
            name: BLANK_SOURCE_NAME.to_string(),
            kind: SourceKind::Blank,
            bytes: None,
            pdf: None,
            page_count: 1,
        });
        self.blank = Some(id);
    }

    pub fn get(&self, id: SourceId) -> Option<&SourceDocument> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.get(id).is_some()
    }

    /// All sources in insertion order
    pub fn list(&self) -> &[SourceDocument] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
        self.blank = None;
    }

    /// Rebuild sources from a persisted session, re-decoding PDFs.
    ///
    /// A source that fails to decode is skipped; the failures are returned
    /// alongside the rest of the restored registry.
    pub async fn restore_from_persisted(
        &mut self,
        records: Vec<SourceRecord>,
    ) -> Vec<(String, ComposeError)> {
        let mut skipped = Vec::new();

        for record in records {
            self.ids.observe(record.id.0);
            if self.contains(record.id) {
                log::warn!("Skipping duplicate persisted source {}", record.id);
                continue;
            }

            match record.kind {
                SourceKind::Blank => {
                    if self.blank.is_none() {
                        self.insert_blank(record.id);
                    }
                }
                SourceKind::Image => {
                    self.sources.push(SourceDocument {
                        id: record.id,
                        name: record.name,
                        kind: SourceKind::Image,
                        bytes: Some(record.file.into()),
                        pdf: None,
                        page_count: 1,
                    });
                }
                SourceKind::Pdf => {
                    let bytes: Arc<[u8]> = record.file.into();
                    match decode_pdf(&record.name, Arc::clone(&bytes)).await {
                        Ok(doc) => {
                            let page_count = doc.get_pages().len() as u32;
                            self.sources.push(SourceDocument {
                                id: record.id,
                                name: record.name,
                                kind: SourceKind::Pdf,
                                bytes: Some(bytes),
                                pdf: Some(Arc::new(doc)),
                                page_count,
                            });
                        }
                        Err(e) => {
                            log::warn!("Skipping persisted source {}: {}", record.name, e);
                            skipped.push((record.name, e));
                        }
                    }
                }
            }
        }

        skipped
    }
}
