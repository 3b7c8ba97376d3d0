//! System clipboard through `arboard`.
//!
//! On X11 and Wayland the selection is only served while a
//! `Clipboard` instance is alive, so one handle is owned by a dedicated
//! thread for the life of the sink. Requests reach it over a channel.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::collaborators::ClipboardSink;
use crate::error::CollaboratorError;

/// What the owner thread needs from a clipboard handle.
trait ClipboardBackend {
    fn set_text(&mut self, text: String) -> Result<(), String>;
    fn clear(&mut self) -> Result<(), String>;
}

impl ClipboardBackend for arboard::Clipboard {
    fn set_text(&mut self, text: String) -> Result<(), String> {
        arboard::Clipboard::set_text(self, text).map_err(|e| e.to_string())
    }

    fn clear(&mut self) -> Result<(), String> {
        arboard::Clipboard::clear(self).map_err(|e| e.to_string())
    }
}

enum Command {
    Write(String),
    Clear,
}

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<(), CollaboratorError>>,
}

/// Desktop clipboard. Cheap to clone; clones share the owner thread.
#[derive(Debug, Clone)]
pub struct SystemClipboard {
    tx: mpsc::UnboundedSender<Request>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::spawn(|| arboard::Clipboard::new().map_err(|e| e.to_string()))
    }

    /// Start the owner thread. The handle is opened on first use and kept;
    /// a failed open is retried on the next request.
    fn spawn<B, F>(open: F) -> Self
    where
        B: ClipboardBackend + 'static,
        F: Fn() -> Result<B, String> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Request>();

        let spawned = std::thread::Builder::new()
            .name("clipboard".into())
            .spawn(move || {
                let mut handle: Option<B> = None;
                while let Some(Request { command, reply }) = rx.blocking_recv() {
                    let result = serve(&mut handle, &open, command);
                    let _ = reply.send(result);
                }
                debug!("Clipboard owner thread stopped");
            });
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to start clipboard thread");
        }

        Self { tx }
    }

    async fn request(&self, command: Command) -> Result<(), CollaboratorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { command, reply })
            .map_err(|_| CollaboratorError::unavailable("clipboard", "clipboard thread not running"))?;
        rx.await
            .map_err(|_| CollaboratorError::failed("clipboard", "clipboard thread dropped the request"))?
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

fn serve<B, F>(handle: &mut Option<B>, open: &F, command: Command) -> Result<(), CollaboratorError>
where
    B: ClipboardBackend,
    F: Fn() -> Result<B, String>,
{
    if handle.is_none() {
        let opened = open().map_err(|e| CollaboratorError::unavailable("clipboard", e))?;
        *handle = Some(opened);
    }
    let Some(clipboard) = handle.as_mut() else {
        return Err(CollaboratorError::unavailable("clipboard", "no clipboard handle"));
    };

    match command {
        Command::Write(text) => clipboard.set_text(text),
        Command::Clear => clipboard.clear(),
    }
    .map_err(|e| CollaboratorError::failed("clipboard", e))
}

#[async_trait]
impl ClipboardSink for SystemClipboard {
    async fn write(&self, text: &str) -> Result<(), CollaboratorError> {
        self.request(Command::Write(text.to_string())).await
    }

    async fn clear(&self) -> Result<(), CollaboratorError> {
        self.request(Command::Clear).await
    }
}
