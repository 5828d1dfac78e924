mod handlers;
pub mod logger;
mod worker;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

// Re-export types from the core crate
pub use page_compose::{
    ClickModifiers, ComposeOptions, ExportMode, IncomingFile, PageId, PageTarget, SourceId,
    SourceKind, TextOverlay, Workspace,
};
pub use worker::worker_task;

/// Commands sent from UI to worker
#[derive(Debug)]
pub enum ComposeCommand {
    AddFiles {
        files: Vec<IncomingFile>,
    },
    /// Read files from disk, then ingest them as one batch
    AddPaths {
        paths: Vec<PathBuf>,
    },
    InsertBlank,
    Duplicate {
        ids: HashSet<PageId>,
    },
    Delete {
        ids: HashSet<PageId>,
    },
    Rotate {
        ids: HashSet<PageId>,
        delta_degrees: i32,
    },
    Reorder {
        order: Vec<PageId>,
    },
    BeginDrag,
    FinishDrag {
        order: Vec<PageId>,
    },
    MovePages {
        ids: HashSet<PageId>,
        target_index: usize,
    },
    SortByNumbers {
        numbers: HashMap<PageId, f64>,
    },
    AddTextOverlay {
        target: PageTarget,
        overlay: TextOverlay,
    },
    ReplaceTextOverlay {
        page: PageId,
        index: usize,
        overlay: TextOverlay,
    },
    RemoveTextOverlay {
        page: PageId,
        index: usize,
    },
    Undo,
    Redo,
    Clear,
    Click {
        id: PageId,
        modifiers: ClickModifiers,
    },
    SelectRange {
        expression: String,
    },
    SelectIds {
        ids: Vec<PageId>,
        additive: bool,
    },
    SelectAll,
    ClearSelection,
    RestoreSession,
    /// Previews queued behind one another are coalesced into the newest
    Export {
        mode: ExportMode,
    },
    QueryPage {
        slot: usize,
    },
}

/// Updates sent from worker to UI
#[derive(Debug, Clone)]
pub enum ComposeUpdate {
    /// Sent after every command that may have changed pages or selection
    State(WorkspaceState),
    IngestFinished {
        added_pages: usize,
        failures: Vec<String>,
    },
    Restored {
        restored_pages: usize,
        dropped_pages: usize,
        skipped_sources: Vec<String>,
    },
    ExportReady {
        file_name: Option<String>,
        bytes: Vec<u8>,
    },
    PageInfo {
        slot: usize,
        page: Option<PageSummary>,
    },
    Error {
        message: String,
    },
}

/// What the UI needs to draw the page grid
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceState {
    pub pages: Vec<PageSummary>,
    /// Selected ids in display order
    pub selected: Vec<PageId>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub persistence_degraded: bool,
}

impl WorkspaceState {
    pub fn capture(workspace: &Workspace) -> Self {
        let pages = (0..workspace.pages().len())
            .filter_map(|slot| workspace.page_at(slot))
            .map(|view| PageSummary::from_view(&view))
            .collect();

        Self {
            pages,
            selected: workspace.selected_ids(),
            can_undo: workspace.can_undo(),
            can_redo: workspace.can_redo(),
            persistence_degraded: workspace.persistence_degraded(),
        }
    }
}

/// One page as displayed
#[derive(Debug, Clone, PartialEq)]
pub struct PageSummary {
    pub id: PageId,
    pub source_id: SourceId,
    pub source_name: String,
    pub kind: SourceKind,
    pub source_page_index: u32,
    pub rotation: u16,
    pub overlay_count: usize,
}

impl PageSummary {
    pub fn from_view(view: &page_compose::PageView<'_>) -> Self {
        Self {
            id: view.page.id,
            source_id: view.source.id,
            source_name: view.source.name.clone(),
            kind: view.source.kind,
            source_page_index: view.page.source_page_index,
            rotation: view.page.rotation,
            overlay_count: view.page.overlays.len(),
        }
    }
}
