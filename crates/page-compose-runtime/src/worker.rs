use crate::handlers::{self, send_error, send_state};
use crate::{ComposeCommand, ComposeUpdate};
use page_compose::{ExportMode, Workspace};
use tokio::sync::mpsc;

/// Async worker task that owns the workspace, processes commands one at a
/// time and sends updates
pub async fn worker_task(
    mut workspace: Workspace,
    mut command_rx: mpsc::UnboundedReceiver<ComposeCommand>,
    update_tx: mpsc::UnboundedSender<ComposeUpdate>,
) {
    while let Some(cmd) = command_rx.recv().await {
        process_command(cmd, &mut workspace, &mut command_rx, &update_tx).await;
    }
    log::debug!("Command channel closed, worker exiting");
}

async fn process_command(
    cmd: ComposeCommand,
    workspace: &mut Workspace,
    command_rx: &mut mpsc::UnboundedReceiver<ComposeCommand>,
    update_tx: &mpsc::UnboundedSender<ComposeUpdate>,
) {
    match cmd {
        ComposeCommand::AddFiles { files } => {
            handlers::handle_add_files(files, workspace, update_tx).await;
        }
        ComposeCommand::AddPaths { paths } => {
            handlers::handle_add_paths(paths, workspace, update_tx).await;
        }
        ComposeCommand::InsertBlank => {
            workspace.insert_blank().await;
            send_state(workspace, update_tx);
        }
        ComposeCommand::Duplicate { ids } => {
            workspace.duplicate(&ids).await;
            send_state(workspace, update_tx);
        }
        ComposeCommand::Delete { ids } => {
            workspace.delete(&ids).await;
            send_state(workspace, update_tx);
        }
        ComposeCommand::Rotate { ids, delta_degrees } => {
            if let Err(e) = workspace.rotate(&ids, delta_degrees).await {
                send_error(e.to_string(), update_tx);
            }
            send_state(workspace, update_tx);
        }
        ComposeCommand::Reorder { order } => {
            workspace.reorder(&order).await;
            send_state(workspace, update_tx);
        }
        ComposeCommand::BeginDrag => {
            workspace.begin_drag();
            send_state(workspace, update_tx);
        }
        ComposeCommand::FinishDrag { order } => {
            workspace.finish_drag(&order).await;
            send_state(workspace, update_tx);
        }
        ComposeCommand::MovePages { ids, target_index } => {
            workspace.move_pages(&ids, target_index).await;
            send_state(workspace, update_tx);
        }
        ComposeCommand::SortByNumbers { numbers } => {
            workspace.sort_by_numbers(&numbers).await;
            send_state(workspace, update_tx);
        }
        ComposeCommand::AddTextOverlay { target, overlay } => {
            if let Err(e) = workspace.add_text_overlay(&target, overlay).await {
                send_error(e.to_string(), update_tx);
            }
            send_state(workspace, update_tx);
        }
        ComposeCommand::ReplaceTextOverlay {
            page,
            index,
            overlay,
        } => {
            if let Err(e) = workspace.replace_text_overlay(page, index, overlay).await {
                send_error(e.to_string(), update_tx);
            }
            send_state(workspace, update_tx);
        }
        ComposeCommand::RemoveTextOverlay { page, index } => {
            workspace.remove_text_overlay(page, index).await;
            send_state(workspace, update_tx);
        }
        ComposeCommand::Undo => {
            workspace.undo().await;
            send_state(workspace, update_tx);
        }
        ComposeCommand::Redo => {
            workspace.redo().await;
            send_state(workspace, update_tx);
        }
        ComposeCommand::Clear => {
            workspace.clear().await;
            send_state(workspace, update_tx);
        }
        ComposeCommand::Click { id, modifiers } => {
            workspace.click(id, modifiers);
            send_state(workspace, update_tx);
        }
        ComposeCommand::SelectRange { expression } => {
            workspace.select_range(&expression);
            send_state(workspace, update_tx);
        }
        ComposeCommand::SelectIds { ids, additive } => {
            workspace.select_ids(ids, additive);
            send_state(workspace, update_tx);
        }
        ComposeCommand::SelectAll => {
            workspace.select_all();
            send_state(workspace, update_tx);
        }
        ComposeCommand::ClearSelection => {
            workspace.clear_selection();
            send_state(workspace, update_tx);
        }
        ComposeCommand::RestoreSession => {
            handlers::handle_restore(workspace, update_tx).await;
        }
        ComposeCommand::Export {
            mode: ExportMode::Preview,
        } => {
            // Drain any queued preview exports, keeping only the most recent.
            // Draining stops at any other export so exports leave in the
            // order they were requested.
            let mut deferred = None;
            while let Ok(next_cmd) = command_rx.try_recv() {
                match next_cmd {
                    ComposeCommand::Export {
                        mode: ExportMode::Preview,
                    } => {
                        log::debug!("Discarding queued preview export, using newer request");
                    }
                    next_cmd @ ComposeCommand::Export { .. } => {
                        deferred = Some(next_cmd);
                        break;
                    }
                    // Edits queued behind the preview must be visible in it
                    next_cmd => {
                        Box::pin(process_command(next_cmd, workspace, command_rx, update_tx)).await;
                    }
                }
            }

            handlers::handle_export(ExportMode::Preview, workspace, update_tx).await;

            if let Some(next_cmd) = deferred {
                Box::pin(process_command(next_cmd, workspace, command_rx, update_tx)).await;
            }
        }
        ComposeCommand::Export { mode } => {
            handlers::handle_export(mode, workspace, update_tx).await;
        }
        ComposeCommand::QueryPage { slot } => {
            handlers::handle_query_page(slot, workspace, update_tx);
        }
    }
}
