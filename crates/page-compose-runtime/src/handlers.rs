use crate::{ComposeUpdate, PageSummary, WorkspaceState};
use page_compose::{ExportMode, IncomingFile, Workspace};
use std::path::PathBuf;
use tokio::sync::mpsc;

pub fn send_state(workspace: &Workspace, update_tx: &mpsc::UnboundedSender<ComposeUpdate>) {
    let _ = update_tx.send(ComposeUpdate::State(WorkspaceState::capture(workspace)));
}

pub fn send_error(message: String, update_tx: &mpsc::UnboundedSender<ComposeUpdate>) {
    log::error!("{}", message);
    let _ = update_tx.send(ComposeUpdate::Error { message });
}

pub async fn handle_add_files(
    files: Vec<IncomingFile>,
    workspace: &mut Workspace,
    update_tx: &mpsc::UnboundedSender<ComposeUpdate>,
) {
    let report = workspace.add_files(files).await;
    let failures = report
        .failures
        .iter()
        .map(|failure| format!("{}: {}", failure.name, failure.error))
        .collect();

    let _ = update_tx.send(ComposeUpdate::IngestFinished {
        added_pages: report.added_pages.len(),
        failures,
    });
    send_state(workspace, update_tx);
}

/// Read each path, then ingest everything that could be read as one batch
pub async fn handle_add_paths(
    paths: Vec<PathBuf>,
    workspace: &mut Workspace,
    update_tx: &mpsc::UnboundedSender<ComposeUpdate>,
) {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match IncomingFile::from_path(&path).await {
            Ok(file) => files.push(file),
            Err(e) => send_error(format!("Failed to read {}: {}", path.display(), e), update_tx),
        }
    }
    handle_add_files(files, workspace, update_tx).await;
}

pub async fn handle_restore(
    workspace: &mut Workspace,
    update_tx: &mpsc::UnboundedSender<ComposeUpdate>,
) {
    let report = workspace.restore_session().await;
    let skipped_sources = report
        .skipped_sources
        .iter()
        .map(|skipped| format!("{}: {}", skipped.name, skipped.error))
        .collect();

    let _ = update_tx.send(ComposeUpdate::Restored {
        restored_pages: report.restored_pages,
        dropped_pages: report.dropped_pages,
        skipped_sources,
    });
    send_state(workspace, update_tx);
}

pub async fn handle_export(
    mode: ExportMode,
    workspace: &Workspace,
    update_tx: &mpsc::UnboundedSender<ComposeUpdate>,
) {
    match workspace.export(&mode).await {
        Ok(artifact) => {
            let _ = update_tx.send(ComposeUpdate::ExportReady {
                file_name: artifact.file_name,
                bytes: artifact.bytes,
            });
        }
        Err(e) => send_error(format!("Export failed: {}", e), update_tx),
    }
}

pub fn handle_query_page(
    slot: usize,
    workspace: &Workspace,
    update_tx: &mpsc::UnboundedSender<ComposeUpdate>,
) {
    let page = workspace
        .page_at(slot)
        .map(|view| PageSummary::from_view(&view));
    let _ = update_tx.send(ComposeUpdate::PageInfo { slot, page });
}
