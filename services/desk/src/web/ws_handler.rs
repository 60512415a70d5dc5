//! services/desk/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a UI connection.
//! Incoming events are handed to the desk strictly in the order they arrive;
//! the desk applies each event's state change on the spot and returns the
//! remote work, which runs concurrently so a slow request never blocks the
//! next keystroke. A forwarder task pushes a fresh view snapshot to the
//! client after every state change.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use docdesk_core::{Confirmation, Credentials, DeskError, FileUpload, Registration};
use futures::{
    future::{self, BoxFuture},
    stream::{FuturesUnordered, SplitSink, StreamExt},
    Future, FutureExt, SinkExt,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// The remote part of an event, already started in order.
type Pending<'a> = BoxFuture<'a, ()>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    info!(%connection_id, "New WebSocket connection established");

    // The sender is wrapped in an Arc<Mutex<>> to allow for shared mutable access across tasks.
    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. View Forwarding ---
    let forward_task = {
        let mut views = app_state.desk.subscribe();
        let ws_sender = ws_sender.clone();
        tokio::spawn(async move {
            loop {
                let message = {
                    let view = views.borrow_and_update();
                    ServerMessage::from(&*view)
                };
                if let Err(e) = send_message(&ws_sender, &message).await {
                    debug!(%connection_id, "Stopped forwarding views: {}", e);
                    break;
                }
                if views.changed().await.is_err() {
                    break;
                }
            }
        })
    };

    // --- 2. Main Message Loop ---
    let mut in_flight: FuturesUnordered<Pending<'_>> = FuturesUnordered::new();
    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(pending) = handle_text_message(text.as_str(), &app_state, &ws_sender).await {
                        in_flight.push(pending);
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!(%connection_id, "Client sent close message.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%connection_id, "WebSocket receive failed: {}", e);
                    break;
                }
                None => {
                    info!(%connection_id, "Client disconnected.");
                    break;
                }
            },
            Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
        }
    }

    // --- 3. Cleanup ---
    forward_task.abort();
    // Started events belong to the desk, not to this socket: let them finish.
    if !in_flight.is_empty() {
        debug!(%connection_id, pending = in_flight.len(), "Finishing events from a closed connection");
        while in_flight.next().await.is_some() {}
    }
    info!(%connection_id, "WebSocket connection closed.");
}

/// Parses one event and starts it. Returns the remote work still to run.
async fn handle_text_message<'a>(
    text: &str,
    app_state: &'a AppState,
    ws_sender: &WsSender,
) -> Option<Pending<'a>> {
    let outcome = serde_json::from_str::<ClientMessage>(text)
        .map_err(|e| {
            warn!("Failed to deserialize client message: {}", e);
            format!("Unrecognized message: {}", e)
        })
        .and_then(|message| {
            dispatch(app_state, message).inspect_err(|problem| {
                warn!("Client event rejected: {}", problem);
            })
        });

    match outcome {
        Ok(pending) => Some(pending),
        Err(message) => {
            if let Err(e) = send_message(ws_sender, &ServerMessage::Error { message }).await {
                error!("Failed to send error message: {}", e);
            }
            None
        }
    }
}

async fn send_message(ws_sender: &WsSender, message: &ServerMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    ws_sender.lock().await.send(Message::Text(json.into())).await
}

fn staged(app_state: &AppState, upload_id: Uuid) -> Result<FileUpload, String> {
    app_state
        .uploads
        .take(upload_id, app_state.desk.session_epoch())
        .ok_or_else(|| format!("Unknown or already used upload {}", upload_id))
}

fn staged_optional(app_state: &AppState, upload_id: Option<Uuid>) -> Result<Option<FileUpload>, String> {
    upload_id.map(|id| staged(app_state, id)).transpose()
}

/// Desk failures are already visible in the view; only logged here.
fn settle<'a, T: Send + 'a>(
    pending: impl Future<Output = Result<T, DeskError>> + Send + 'a,
) -> Pending<'a> {
    async move {
        if let Err(e) = pending.await {
            debug!(error = %e, "Desk operation did not complete");
        }
    }
    .boxed()
}

fn done() -> Pending<'static> {
    future::ready(()).boxed()
}

/// Starts one event against the desk. Its state change is applied before
/// this returns; the returned future carries whatever remote work is left.
/// Protocol problems (unknown uploads) come back as `Err` and touch nothing.
pub(crate) fn dispatch(app_state: &AppState, message: ClientMessage) -> Result<Pending<'_>, String> {
    let desk = &app_state.desk;
    let pending = match message {
        // --- Session ---
        ClientMessage::Login { username, password } => {
            settle(desk.login(Credentials { username, password }))
        }
        ClientMessage::Register {
            username,
            password,
            email,
            first_name,
            last_name,
        } => settle(desk.register(Registration {
            username,
            password,
            email,
            first_name,
            last_name,
        })),
        ClientMessage::Logout => {
            let pending = desk.logout();
            app_state.uploads.clear();
            pending.boxed()
        }
        ClientMessage::SetAuthMode { mode } => {
            desk.set_auth_mode(mode.into());
            done()
        }

        // --- Search ---
        ClientMessage::SetDraftTerm { text } => {
            desk.set_draft_term(text);
            done()
        }
        ClientMessage::Commit => settle(desk.commit()),
        ClientMessage::Clear => settle(desk.clear()),
        ClientMessage::ToggleOcrMode => settle(desk.toggle_ocr_mode()),
        ClientMessage::Refresh => settle(desk.fetch()),

        // --- Form and mutations ---
        ClientMessage::OpenCreateForm => {
            desk.open_create_form();
            done()
        }
        ClientMessage::OpenEditForm { id } => settle(future::ready(desk.open_edit_form(id))),
        ClientMessage::CloseForm => {
            desk.close_form();
            done()
        }
        ClientMessage::CreateDocument { fields, upload_id } => {
            let file = staged_optional(app_state, upload_id)?;
            settle(desk.create(fields.into(), file))
        }
        ClientMessage::UpdateDocument { id, fields, upload_id } => {
            let file = staged_optional(app_state, upload_id)?;
            settle(desk.update(id, fields.into(), file))
        }
        ClientMessage::AttachFile { id, upload_id } => {
            let file = staged(app_state, upload_id)?;
            settle(desk.attach_file(id, file))
        }
        ClientMessage::RequestDelete { id } => {
            desk.request_confirmation(Confirmation::DeleteDocument(id));
            done()
        }
        ClientMessage::RequestDetach { id } => {
            desk.request_confirmation(Confirmation::DetachFile(id));
            done()
        }
        ClientMessage::Confirm => settle(desk.confirm()),
        ClientMessage::DismissConfirmation => {
            desk.dismiss_confirmation();
            done()
        }

        // --- Reads ---
        ClientMessage::Download { id, filename } => settle(desk.download(id, &filename)),
        ClientMessage::ShowOcrText { id, title } => settle(desk.fetch_ocr_text(id, &title)),
        ClientMessage::CloseOcrView => {
            desk.close_ocr_view();
            done()
        }
        ClientMessage::DismissNotice => {
            desk.dismiss_notice();
            done()
        }
    };
    Ok(pending)
}
