//! The workspace: one owned value holding every piece of session state
//!
//! Every editing operation follows the same sequence: capture a history
//! snapshot, mutate the page sequence, then mirror the result to the session
//! store. A failed save is logged and otherwise ignored; the in-memory state
//! stays authoritative.

use crate::compose::{self, ComposeJob, ExportArtifact, ExportMode};
use crate::history::History;
use crate::model::{PageSequence, PageTarget};
use crate::options::ComposeOptions;
use crate::persistence::{SessionPersistence, SessionStore};
use crate::selection::{ClickModifiers, Selection};
use crate::source::{IncomingFile, SourceDocument, SourceRegistry};
use crate::types::*;
use std::collections::{HashMap, HashSet};

/// Outcome of one `add_files` batch
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Ids of appended pages, in document order
    pub added_pages: Vec<PageId>,
    pub failures: Vec<IngestFailure>,
}

/// A file from a batch that produced no pages
#[derive(Debug)]
pub struct IngestFailure {
    pub name: String,
    pub error: ComposeError,
}

/// Outcome of restoring the saved session
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored_pages: usize,
    /// Pages whose source could not be restored
    pub dropped_pages: usize,
    /// Sources that failed to decode, with the reason
    pub skipped_sources: Vec<IngestFailure>,
}

/// A page together with the source it is drawn from
#[derive(Debug, Clone, Copy)]
pub struct PageView<'a> {
    pub slot: usize,
    pub page: &'a Page,
    pub source: &'a SourceDocument,
}

#[derive(Debug)]
pub struct Workspace {
    options: ComposeOptions,
    registry: SourceRegistry,
    pages: PageSequence,
    history: History,
    selection: Selection,
    persistence: Option<SessionPersistence>,
    persistence_degraded: bool,
}

impl Workspace {
    /// An in-memory workspace with nothing persisted
    pub fn new(options: ComposeOptions) -> Self {
        Self {
            history: History::new(options.history_depth),
            options,
            registry: SourceRegistry::new(),
            pages: PageSequence::new(),
            selection: Selection::new(),
            persistence: None,
            persistence_degraded: false,
        }
    }

    /// A workspace that mirrors every committed change to `store`, under
    /// the configured session key
    pub fn with_store(options: ComposeOptions, store: impl SessionStore + 'static) -> Self {
        let persistence = SessionPersistence::new(store, options.session_key.clone());
        Self {
            persistence: Some(persistence),
            ..Self::new(options)
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn options(&self) -> &ComposeOptions {
        &self.options
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn pages(&self) -> &PageSequence {
        &self.pages
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Whether the last attempt to save the session failed
    pub fn persistence_degraded(&self) -> bool {
        self.persistence_degraded
    }

    /// Sources referenced by at least one page, in insertion order
    pub fn used_sources(&self) -> Vec<&SourceDocument> {
        self.registry
            .list()
            .iter()
            .filter(|source| self.pages.references(source.id))
            .collect()
    }

    /// The page displayed at `slot`, with its source
    pub fn page_at(&self, slot: usize) -> Option<PageView<'_>> {
        let page = self.pages.page_at(slot)?;
        let source = self.registry.get(page.source_id)?;
        Some(PageView { slot, page, source })
    }

    // =========================================================================
    // Commit Protocol
    // =========================================================================

    fn capture(&mut self) {
        self.history.capture(&self.pages);
    }

    async fn persist(&mut self) {
        let Some(persistence) = self.persistence.as_mut() else {
            return;
        };
        match persistence.save(&self.registry, &self.pages).await {
            Ok(()) => self.persistence_degraded = false,
            Err(e) => {
                log::warn!("Session not saved, continuing in memory only: {}", e);
                self.persistence_degraded = true;
            }
        }
    }

    fn contains_any(&self, ids: &HashSet<PageId>) -> bool {
        ids.iter().any(|id| self.pages.get(*id).is_some())
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Ingest a batch of files in order.
    ///
    /// One snapshot is captured for the whole batch. Each file's pages are
    /// appended as soon as that file decodes; a file that fails is reported
    /// and the rest of the batch continues.
    pub async fn add_files(&mut self, files: Vec<IncomingFile>) -> IngestReport {
        let mut report = IngestReport::default();
        if files.is_empty() {
            return report;
        }

        self.capture();
        for file in files {
            let name = file.name.clone();
            match self.registry.ingest(file).await {
                Ok(source) => {
                    let (source_id, count) = (source.id, source.page_count());
                    report
                        .added_pages
                        .extend(self.pages.append_pages(source_id, count, 0));
                }
                Err(error) => {
                    log::warn!("Skipping {}: {}", name, error);
                    report.failures.push(IngestFailure { name, error });
                }
            }
        }

        log::info!(
            "Added {} page(s); {} file(s) failed",
            report.added_pages.len(),
            report.failures.len()
        );
        self.persist().await;
        report
    }

    /// Append one blank page
    pub async fn insert_blank(&mut self) -> PageId {
        self.capture();
        let blank = self.registry.get_or_create_blank();
        let id = self.pages.insert_blank(blank);
        self.persist().await;
        id
    }

    /// Insert a copy after each page in `ids`. The selection is kept.
    pub async fn duplicate(&mut self, ids: &HashSet<PageId>) -> Vec<PageId> {
        if !self.contains_any(ids) {
            return Vec::new();
        }
        self.capture();
        let added = self.pages.duplicate(ids);
        self.persist().await;
        added
    }

    /// Remove pages and clear the selection
    pub async fn delete(&mut self, ids: &HashSet<PageId>) -> usize {
        if !self.contains_any(ids) {
            return 0;
        }
        self.capture();
        let removed = self.pages.delete(ids);
        self.selection.clear();
        self.persist().await;
        removed
    }

    /// Rotate pages by a multiple of 90 degrees
    pub async fn rotate(&mut self, ids: &HashSet<PageId>, delta_degrees: i32) -> Result<usize> {
        if delta_degrees % 90 != 0 {
            return Err(ComposeError::InvalidRotation(delta_degrees));
        }
        if !self.contains_any(ids) {
            return Ok(0);
        }
        self.capture();
        let rotated = self.pages.rotate(ids, delta_degrees);
        self.persist().await;
        Ok(rotated)
    }

    /// Replace the sequence with `order`, dropping pages it leaves out
    pub async fn reorder(&mut self, order: &[PageId]) {
        self.capture();
        self.apply_order(order).await;
    }

    /// Start a drag reorder. History is captured here, once per drag.
    pub fn begin_drag(&mut self) {
        self.capture();
    }

    /// Commit the order a drag ended with
    pub async fn finish_drag(&mut self, order: &[PageId]) {
        self.apply_order(order).await;
    }

    async fn apply_order(&mut self, order: &[PageId]) {
        self.pages.reorder(order);
        self.selection.prune(&self.pages.ids());
        self.persist().await;
    }

    /// Move `ids` so the first of them lands at `target_index`
    pub async fn move_pages(&mut self, ids: &HashSet<PageId>, target_index: usize) {
        if !self.contains_any(ids) {
            return;
        }
        self.capture();
        self.pages.move_pages(ids, target_index);
        self.persist().await;
    }

    /// Stable sort by explicit numbers; unnumbered pages go last
    pub async fn sort_by_numbers(&mut self, numbers: &HashMap<PageId, f64>) {
        self.capture();
        self.pages.sort_by_numbers(numbers);
        self.persist().await;
    }

    /// Append `overlay` to every targeted page
    pub async fn add_text_overlay(&mut self, target: &PageTarget, overlay: TextOverlay) -> Result<usize> {
        overlay.validate()?;
        if let PageTarget::Pages(ids) = target {
            if !self.contains_any(ids) {
                return Ok(0);
            }
        }
        if self.pages.is_empty() {
            return Ok(0);
        }
        self.capture();
        let applied = self.pages.add_text_overlay(target, &overlay);
        self.persist().await;
        Ok(applied)
    }

    /// Replace one overlay on one page; `false` if there is no such overlay
    pub async fn replace_text_overlay(
        &mut self,
        id: PageId,
        index: usize,
        overlay: TextOverlay,
    ) -> Result<bool> {
        overlay.validate()?;
        let exists = self
            .pages
            .get(id)
            .is_some_and(|page| index < page.overlays.len());
        if !exists {
            return Ok(false);
        }
        self.capture();
        let replaced = self.pages.replace_text_overlay(id, index, overlay);
        self.persist().await;
        Ok(replaced)
    }

    pub async fn remove_text_overlay(&mut self, id: PageId, index: usize) -> Option<TextOverlay> {
        let exists = self
            .pages
            .get(id)
            .is_some_and(|page| index < page.overlays.len());
        if !exists {
            return None;
        }
        self.capture();
        let removed = self.pages.remove_text_overlay(id, index);
        self.persist().await;
        removed
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Step back one committed state. Returns `false` if there is none.
    pub async fn undo(&mut self) -> bool {
        match self.history.undo(&self.pages) {
            Some(snapshot) => {
                self.restore_snapshot(snapshot).await;
                true
            }
            None => false,
        }
    }

    /// Step forward one undone state. Returns `false` if there is none.
    pub async fn redo(&mut self) -> bool {
        match self.history.redo(&self.pages) {
            Some(snapshot) => {
                self.restore_snapshot(snapshot).await;
                true
            }
            None => false,
        }
    }

    async fn restore_snapshot(&mut self, snapshot: crate::history::HistorySnapshot) {
        let dropped = self.pages.restore(snapshot, &self.registry);
        if dropped > 0 {
            log::debug!("History restore dropped {} orphaned page(s)", dropped);
        }
        self.selection.clear();
        self.persist().await;
    }

    /// Drop every source, page and history entry, and erase the saved session
    pub async fn clear(&mut self) {
        self.registry.clear();
        self.pages.clear();
        self.history.clear();
        self.selection.clear();
        if let Some(persistence) = self.persistence.as_mut() {
            if let Err(e) = persistence.clear().await {
                log::warn!("Could not erase saved session: {}", e);
            }
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Replace the workspace with the saved session, if any.
    ///
    /// Sources that fail to decode are skipped and pages that referenced
    /// them are dropped; everything else is restored. History starts empty.
    pub async fn restore_session(&mut self) -> RestoreReport {
        let mut report = RestoreReport::default();
        let Some(persistence) = self.persistence.as_ref() else {
            return report;
        };
        let Some(record) = persistence.load().await else {
            return report;
        };

        self.registry.clear();
        self.pages.clear();
        self.history.clear();
        self.selection.clear();

        let pages = record.to_pages();
        let skipped = self
            .registry
            .restore_from_persisted(record.source_files)
            .await;
        report.skipped_sources = skipped
            .into_iter()
            .map(|(name, error)| IngestFailure { name, error })
            .collect();

        report.dropped_pages = self.pages.replace_pages(pages, &self.registry);
        report.restored_pages = self.pages.len();

        log::info!(
            "Restored {} page(s) from {} source(s); dropped {} page(s)",
            report.restored_pages,
            self.registry.len(),
            report.dropped_pages
        );
        report
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Snapshot everything an export reads
    pub fn compose_job(&self) -> Result<ComposeJob> {
        ComposeJob::new(
            self.pages.pages(),
            &self.registry,
            self.options.blank_page_size,
        )
    }

    /// Compose the current sequence. The workspace is never modified.
    pub async fn export(&self, mode: &ExportMode) -> Result<ExportArtifact> {
        let job = self.compose_job()?;
        compose::export(job, mode, &self.options.default_file_name).await
    }

    // =========================================================================
    // Selection
    // =========================================================================

    pub fn click(&mut self, id: PageId, modifiers: ClickModifiers) {
        if self.pages.get(id).is_none() {
            return;
        }
        let order = self.pages.ids();
        self.selection.click(id, modifiers, &order);
    }

    pub fn select_range(&mut self, expression: &str) {
        let order = self.pages.ids();
        self.selection.select_by_range_expression(expression, &order);
    }

    pub fn select_ids(&mut self, ids: impl IntoIterator<Item = PageId>, additive: bool) {
        self.selection.select_ids(ids, additive);
        self.selection.prune(&self.pages.ids());
    }

    pub fn select_all(&mut self) {
        let order = self.pages.ids();
        self.selection.select_all(&order);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Selected page ids in display order
    pub fn selected_ids(&self) -> Vec<PageId> {
        self.selection.ordered(&self.pages.ids())
    }
}
