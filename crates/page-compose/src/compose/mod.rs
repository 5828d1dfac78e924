//! Composition: flattening the page sequence into one output PDF
//!
//! A [`ComposeJob`] is a detached snapshot of everything an export needs
//! (pages plus shared handles to their sources), so composition can run on
//! a blocking thread while the workspace stays untouched. Any page that
//! fails to materialize aborts the whole export.

mod copy;
mod fonts;
mod raster;
mod overlay;
mod page;

pub use overlay::{OverlayPlacement, place_overlay};
pub use page::PageGeometry;

use crate::source::SourceRegistry;
use crate::types::*;
use lopdf::{Dictionary, Document, Object, ObjectId};
use overlay::{OverlayResources, draw_overlays};
use page::{PdfSourceState, materialize_blank, materialize_image, materialize_pdf};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// Jobs
// =============================================================================

/// Read-only handle to the data a page is materialized from
#[derive(Debug, Clone)]
pub enum SourceHandle {
    Pdf(Arc<Document>),
    Image(Arc<[u8]>),
    Blank,
}

#[derive(Debug, Clone)]
pub struct ComposeEntry {
    pub page: Page,
    pub source_name: String,
    pub handle: SourceHandle,
}

/// Everything one export reads, in output order
#[derive(Debug, Clone)]
pub struct ComposeJob {
    entries: Vec<ComposeEntry>,
    blank_page_size: PageSize,
}

impl ComposeJob {
    /// Resolve every page's source against the registry
    pub fn new(pages: &[Page], registry: &SourceRegistry, blank_page_size: PageSize) -> Result<Self> {
        let entries = pages
            .iter()
            .enumerate()
            .map(|(index, page)| {
                let unresolved = |source_name: String| ComposeError::Export {
                    page: index + 1,
                    source_name,
                    reason: "source document is not loaded".to_string(),
                };

                let source = registry
                    .get(page.source_id)
                    .ok_or_else(|| unresolved(page.source_id.to_string()))?;

                let handle = match source.kind {
                    SourceKind::Pdf => SourceHandle::Pdf(Arc::clone(
                        source.pdf().ok_or_else(|| unresolved(source.name.clone()))?,
                    )),
                    SourceKind::Image => SourceHandle::Image(Arc::clone(
                        source.bytes().ok_or_else(|| unresolved(source.name.clone()))?,
                    )),
                    SourceKind::Blank => SourceHandle::Blank,
                };

                Ok(ComposeEntry {
                    page: page.clone(),
                    source_name: source.name.clone(),
                    handle,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            entries,
            blank_page_size,
        })
    }

    pub fn entries(&self) -> &[ComposeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Composition
// =============================================================================

/// Compose and serialize on a blocking thread
pub async fn compose(job: ComposeJob) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let mut doc = compose_document(&job)?;
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        log::info!("Composed {} page(s), {} bytes", job.len(), bytes.len());
        Ok::<_, ComposeError>(bytes)
    })
    .await?
}

/// Build the output document for `job`
pub fn compose_document(job: &ComposeJob) -> Result<Document> {
    if job.is_empty() {
        return Err(ComposeError::NoPages);
    }

    let mut output = Document::with_version("1.7");
    let pages_tree_id = output.new_object_id();
    let mut page_refs = Vec::with_capacity(job.len());
    let mut pdf_states: HashMap<SourceId, PdfSourceState> = HashMap::new();
    let mut overlay_resources = OverlayResources::default();

    for (index, entry) in job.entries.iter().enumerate() {
        let page_id = compose_page(
            &mut output,
            pages_tree_id,
            entry,
            job.blank_page_size,
            &mut pdf_states,
            &mut overlay_resources,
        )
        .map_err(|e| {
            log::warn!("Export failed at page {} ({}): {}", index + 1, entry.source_name, e);
            ComposeError::Export {
                page: index + 1,
                source_name: entry.source_name.clone(),
                reason: e.to_string(),
            }
        })?;
        page_refs.push(Object::Reference(page_id));
    }

    // Create pages tree
    let count = page_refs.len() as i64;
    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(page_refs)),
        ("Count", Object::Integer(count)),
    ]);
    output
        .objects
        .insert(pages_tree_id, Object::Dictionary(pages_dict));

    // Create catalog
    let catalog_id = output.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_tree_id)),
    ]));

    output.trailer.set("Root", catalog_id);

    Ok(output)
}

fn compose_page(
    output: &mut Document,
    parent_id: ObjectId,
    entry: &ComposeEntry,
    blank_page_size: PageSize,
    pdf_states: &mut HashMap<SourceId, PdfSourceState>,
    overlay_resources: &mut OverlayResources,
) -> Result<ObjectId> {
    let page = &entry.page;
    let (page_id, geometry) = match &entry.handle {
        SourceHandle::Blank => materialize_blank(output, parent_id, blank_page_size, page.rotation),
        SourceHandle::Image(bytes) => materialize_image(output, parent_id, bytes, page.rotation)?,
        SourceHandle::Pdf(source) => {
            let state = pdf_states
                .entry(page.source_id)
                .or_insert_with(|| PdfSourceState::new(source));
            materialize_pdf(
                output,
                parent_id,
                source,
                state,
                page.source_page_index,
                page.rotation,
            )?
        }
    };

    draw_overlays(output, page_id, &geometry, &page.overlays, overlay_resources)?;
    log::debug!(
        "Materialized {} from {} at {}x{} rotated {}",
        page.id,
        entry.source_name,
        geometry.width,
        geometry.height,
        geometry.rotation
    );
    Ok(page_id)
}

// =============================================================================
// Export Disposition
// =============================================================================

/// What happens to the composed bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportMode {
    /// Save under a sanitized name; `None` uses the configured default
    Download { file_name: Option<String> },
    /// Hand the bytes to a viewer without a file name
    Preview,
}

/// Composed output ready for its disposition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    /// Sanitized download name; absent for previews
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Write the artifact into `dir` under its file name
    pub async fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let file_name = self
            .file_name
            .clone()
            .unwrap_or_else(|| crate::constants::DEFAULT_FILE_NAME.to_string());
        let path = dir.as_ref().join(file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

/// Compose `job` and package the result for `mode`
pub async fn export(
    job: ComposeJob,
    mode: &ExportMode,
    default_file_name: &str,
) -> Result<ExportArtifact> {
    let bytes = compose(job).await?;
    let file_name = match mode {
        ExportMode::Download { file_name } => Some(sanitize_file_name(
            file_name.as_deref().unwrap_or(default_file_name),
            default_file_name,
        )),
        ExportMode::Preview => None,
    };
    Ok(ExportArtifact { file_name, bytes })
}

/// Reduce `name` to `[A-Za-z0-9-_ ]` plus a `.pdf` extension, falling back
/// to `fallback` (then `document`) when nothing usable is left
pub fn sanitize_file_name(name: &str, fallback: &str) -> String {
    fn stem(name: &str) -> String {
        let trimmed = name.trim();
        let without_ext = match trimmed.len().checked_sub(4) {
            Some(split)
                if trimmed.is_char_boundary(split)
                    && trimmed[split..].eq_ignore_ascii_case(".pdf") =>
            {
                &trimmed[..split]
            }
            _ => trimmed,
        };
        without_ext
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .trim()
            .to_string()
    }

    let mut base = stem(name);
    if base.is_empty() {
        base = stem(fallback);
    }
    if base.is_empty() {
        base = "document".to_string();
    }
    format!("{}.pdf", base)
}
