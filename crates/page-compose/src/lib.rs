pub mod compose;
pub mod constants;
mod history;
mod model;
mod options;
pub mod persistence;
mod selection;
mod source;
mod types;
mod workspace;

pub use compose::{
    ComposeJob, ExportArtifact, ExportMode, OverlayPlacement, PageGeometry, compose,
    compose_document, place_overlay, sanitize_file_name,
};
pub use history::{History, HistorySnapshot};
pub use model::{PageSequence, PageTarget};
pub use options::*;
pub use persistence::{
    FileStore, MemoryStore, PageRecord, SessionPersistence, SessionRecord, SessionStore,
    SourceRecord,
};
pub use selection::{ClickModifiers, Selection, parse_range_expression};
pub use source::{
    DecodedSource, IncomingFile, SourceDocument, SourceRegistry, classify, decode_file,
};
pub use types::*;
pub use workspace::{IngestFailure, IngestReport, PageView, RestoreReport, Workspace};
