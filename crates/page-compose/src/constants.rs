//! Shared constants for page composition
//!
//! This module centralizes defaults and magic numbers used across the
//! workspace, history and export code.

use crate::types::PageSize;

// =============================================================================
// Page Dimensions
// =============================================================================

/// Size of a synthetic blank page (ISO A4 at 72 dpi)
pub const BLANK_PAGE_SIZE: PageSize = PageSize::A4;

/// Fallback for source PDF pages with no resolvable MediaBox (US Letter)
pub const DEFAULT_PAGE_DIMENSIONS: (f32, f32) = (612.0, 792.0);

// =============================================================================
// History
// =============================================================================

/// Maximum number of entries kept on each of the undo and redo stacks
pub const DEFAULT_HISTORY_DEPTH: usize = 20;

// =============================================================================
// Session & Export
// =============================================================================

/// Key the whole session is stored under
pub const DEFAULT_SESSION_KEY: &str = "page-compose-session";

/// File name offered for downloads when the caller supplies none
pub const DEFAULT_FILE_NAME: &str = "document.pdf";

/// Display name of the singleton blank-page source
pub const BLANK_SOURCE_NAME: &str = "Blank page";

// =============================================================================
// PDF Structure
// =============================================================================

/// Page attributes a page may inherit from its ancestors in the page tree
pub const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Upper bound on page tree depth when resolving inherited attributes
pub const MAX_PAGE_TREE_DEPTH: usize = 64;
