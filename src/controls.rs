//! The playback controls: a status line plus a one-field "play a track" form.

use crate::spotify::data::{ApiError, PlaybackApi};
use crate::spotify::AuthContext;
use log::{error, info};
use std::io::{self, Write};
use std::sync::Mutex;
use tokio::task::JoinHandle;

pub const STATUS_READY: &str = "ready";

/// The page elements the controls need: `status`, `controls` and the `play-song` form.
pub trait ControlPanel: Send + Sync {
    fn set_status(&self, text: &str);
    fn show_controls(&self);
}

/// Panel rendered on the terminal. The form's text input is a line on stdin.
#[derive(Default)]
pub struct TerminalPanel {
    status: Mutex<String>,
    controls_visible: Mutex<bool>,
}

impl TerminalPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> String {
        self.status.lock().map(|status| status.clone()).unwrap_or_default()
    }

    pub fn controls_visible(&self) -> bool {
        self.controls_visible.lock().map(|visible| *visible).unwrap_or(false)
    }
}

impl ControlPanel for TerminalPanel {
    fn set_status(&self, text: &str) {
        if let Ok(mut status) = self.status.lock() {
            *status = text.to_string();
        }
        println!("status: {}", text);
    }

    fn show_controls(&self) {
        if let Ok(mut visible) = self.controls_visible.lock() {
            *visible = true;
        }
        println!("Enter a track URI to play (e.g. spotify:track:4uLU6hMCjMI75M1A2tKUQC), Ctrl-D to quit:");
        let _ = io::stdout().flush();
    }
}

/// One submission of the form.
#[derive(Debug, Clone)]
pub struct SubmitEvent {
    value: String,
    default_prevented: bool,
}

impl SubmitEvent {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            default_prevented: false,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

pub struct ControlForm {
    device_id: String,
    auth: AuthContext,
    api: PlaybackApi,
}

impl ControlForm {
    /// Reveals the controls for `device_id`.
    pub fn activate(device_id: String, auth: AuthContext, api: PlaybackApi, panel: &dyn ControlPanel) -> Self {
        panel.set_status(STATUS_READY);
        panel.show_controls();
        Self { device_id, auth, api }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Sends the entered track to the device. Nothing guards against overlapping submissions.
    /// Returns `None` when called outside a tokio runtime.
    pub fn submit(&self, event: &mut SubmitEvent) -> Option<JoinHandle<Result<(), ApiError>>> {
        event.prevent_default();

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                error!("cannot submit {:?} outside a tokio runtime: {}", event.value(), err);
                return None;
            }
        };

        let uris = vec![event.value().to_string()];
        let device_id = self.device_id.clone();
        let auth = self.auth.clone();
        let api = self.api.clone();

        Some(runtime.spawn(async move {
            match api.start_playback(&auth, &device_id, &uris).await {
                Ok(status) => {
                    info!("play {:?} on {}: {}", uris, device_id, status);
                    Ok(())
                }
                Err(err) => {
                    error!("play {:?} on {} failed: {}", uris, device_id, err);
                    Err(err)
                }
            }
        }))
    }
}
