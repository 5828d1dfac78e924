//! The ordered page sequence - the workspace's primary mutable state
//!
//! Operations here never touch history or persistence; callers capture a
//! snapshot before mutating (see `Workspace`).

use crate::history::HistorySnapshot;
use crate::source::SourceRegistry;
use crate::types::*;
use std::collections::{HashMap, HashSet};

/// Which pages an edit applies to
#[derive(Debug, Clone, PartialEq)]
pub enum PageTarget {
    All,
    Pages(HashSet<PageId>),
}

impl PageTarget {
    pub fn matches(&self, id: PageId) -> bool {
        match self {
            PageTarget::All => true,
            PageTarget::Pages(ids) => ids.contains(&id),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageSequence {
    pages: Vec<Page>,
    ids: IdGenerator,
}

impl PageSequence {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(&mut self) -> PageId {
        PageId(self.ids.next())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, id: PageId) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    /// The page displayed at `slot`
    pub fn page_at(&self, slot: usize) -> Option<&Page> {
        self.pages.get(slot)
    }

    pub fn position(&self, id: PageId) -> Option<usize> {
        self.pages.iter().position(|p| p.id == id)
    }

    /// Page ids in display order
    pub fn ids(&self) -> Vec<PageId> {
        self.pages.iter().map(|p| p.id).collect()
    }

    /// Whether any page draws from `source_id`
    pub fn references(&self, source_id: SourceId) -> bool {
        self.pages.iter().any(|p| p.source_id == source_id)
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Append `count` pages drawn from consecutive source pages starting at
    /// `start_index`
    pub fn append_pages(&mut self, source_id: SourceId, count: u32, start_index: u32) -> Vec<PageId> {
        let mut added = Vec::with_capacity(count as usize);
        for offset in 0..count {
            let id = self.mint();
            self.pages.push(Page::new(id, source_id, start_index + offset));
            added.push(id);
        }
        added
    }

    /// Append one page referencing the blank source
    pub fn insert_blank(&mut self, blank_source: SourceId) -> PageId {
        let id = self.mint();
        self.pages.push(Page::new(id, blank_source, 0));
        id
    }

    /// Insert a copy directly after every page in `ids`.
    ///
    /// Returns the new ids in document order.
    pub fn duplicate(&mut self, ids: &HashSet<PageId>) -> Vec<PageId> {
        let mut next = Vec::with_capacity(self.pages.len() + ids.len());
        let mut added = Vec::new();

        for page in std::mem::take(&mut self.pages) {
            let copy = ids.contains(&page.id).then(|| {
                let id = self.mint();
                added.push(id);
                page.duplicate_as(id)
            });
            next.push(page);
            next.extend(copy);
        }

        self.pages = next;
        added
    }

    // =========================================================================
    // Removal & Reordering
    // =========================================================================

    /// Remove every page in `ids`, returning how many were removed
    pub fn delete(&mut self, ids: &HashSet<PageId>) -> usize {
        let before = self.pages.len();
        self.pages.retain(|p| !ids.contains(&p.id));
        before - self.pages.len()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    /// Replace the sequence with `order`.
    ///
    /// Pages missing from `order` are dropped; unknown or repeated ids are
    /// ignored.
    pub fn reorder(&mut self, order: &[PageId]) {
        let mut by_id: HashMap<PageId, Page> =
            self.pages.drain(..).map(|p| (p.id, p)).collect();

        self.pages = order.iter().filter_map(|id| by_id.remove(id)).collect();

        if !by_id.is_empty() {
            log::debug!("Reorder dropped {} page(s) absent from the new order", by_id.len());
        }
    }

    /// Move `ids` (keeping their relative order) so the first of them lands
    /// at `target_index` among the remaining pages
    pub fn move_pages(&mut self, ids: &HashSet<PageId>, target_index: usize) {
        let (moving, mut rest): (Vec<Page>, Vec<Page>) =
            self.pages.drain(..).partition(|p| ids.contains(&p.id));
        let at = target_index.min(rest.len());
        rest.splice(at..at, moving);
        self.pages = rest;
    }

    /// Stable sort by caller-supplied numbers; pages without a number go last
    pub fn sort_by_numbers(&mut self, numbers: &HashMap<PageId, f64>) {
        let key = |page: &Page| numbers.get(&page.id).copied().unwrap_or(f64::INFINITY);
        self.pages.sort_by(|a, b| key(a).total_cmp(&key(b)));
    }

    // =========================================================================
    // Per-page Edits
    // =========================================================================

    /// Rotate matching pages by `delta_degrees`, returning how many changed
    pub fn rotate(&mut self, ids: &HashSet<PageId>, delta_degrees: i32) -> usize {
        let mut rotated = 0;
        for page in self.pages.iter_mut().filter(|p| ids.contains(&p.id)) {
            page.rotate(delta_degrees);
            rotated += 1;
        }
        rotated
    }

    /// Append a copy of `overlay` to every targeted page
    pub fn add_text_overlay(&mut self, target: &PageTarget, overlay: &TextOverlay) -> usize {
        let mut applied = 0;
        for page in self.pages.iter_mut().filter(|p| target.matches(p.id)) {
            page.overlays.push(overlay.clone());
            applied += 1;
        }
        applied
    }

    /// Replace the overlay at `index` on one page
    pub fn replace_text_overlay(&mut self, id: PageId, index: usize, overlay: TextOverlay) -> bool {
        match self.page_mut(id).and_then(|p| p.overlays.get_mut(index)) {
            Some(slot) => {
                *slot = overlay;
                true
            }
            None => false,
        }
    }

    pub fn remove_text_overlay(&mut self, id: PageId, index: usize) -> Option<TextOverlay> {
        let page = self.page_mut(id)?;
        (index < page.overlays.len()).then(|| page.overlays.remove(index))
    }

    pub fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.id == id)
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot::new(self.pages.clone())
    }

    /// Replace the sequence with a snapshot's pages, re-resolving each source.
    ///
    /// Pages whose source is no longer registered are dropped. Returns the
    /// number dropped.
    pub fn restore(&mut self, snapshot: HistorySnapshot, registry: &SourceRegistry) -> usize {
        self.replace_pages(snapshot.into_pages(), registry)
    }

    pub(crate) fn replace_pages(&mut self, pages: Vec<Page>, registry: &SourceRegistry) -> usize {
        let total = pages.len();
        let mut seen = HashSet::with_capacity(total);

        self.pages = pages
            .into_iter()
            .filter(|p| {
                if !registry.contains(p.source_id) {
                    log::debug!("Dropping {} with orphaned {}", p.id, p.source_id);
                    return false;
                }
                seen.insert(p.id)
            })
            .collect();

        for page in &self.pages {
            self.ids.observe(page.id.0);
        }
        total - self.pages.len()
    }
}
