pub mod remote;
pub mod sdk;

use crate::spotify::AuthContext;
use log::{error, info};
use sdk::{EventKind, PlaybackDevice, PlaybackSdk, PlayerEvent, PlayerOptions};
use std::sync::{Arc, Mutex};

type ReadyHandler = Box<dyn FnOnce() + Send>;

/// Where the SDK looks for its "finished loading" callback. Holds at most one handler.
#[derive(Default)]
pub struct ReadySlot {
    handler: Mutex<Option<ReadyHandler>>,
}

impl ReadySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler`, replacing any handler not fired yet.
    pub fn install<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.handler.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(Box::new(handler));
    }

    /// Runs the installed handler. Returns false when the slot was empty.
    pub fn fire(&self) -> bool {
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}

/// Builds the device handle and wires its listeners once the SDK is ready.
pub struct PlayerBridge {
    auth: AuthContext,
    name: String,
}

impl PlayerBridge {
    pub fn new(auth: AuthContext, name: impl Into<String>) -> Self {
        Self {
            auth,
            name: name.into(),
        }
    }

    /// `on_ready` receives the device id of the first `ready` event and is never called again.
    pub fn on_sdk_ready<S, F>(&self, sdk: &S, on_ready: F) -> S::Device
    where
        S: PlaybackSdk,
        F: FnOnce(String) + Send + 'static,
    {
        let mut player = sdk.create_player(PlayerOptions {
            name: self.name.clone(),
            get_oauth_token: self.auth.token_supplier(),
        });

        // Error handling
        player.add_listener(EventKind::InitializationError, Box::new(|event| {
            if let PlayerEvent::InitializationError { message } = event {
                error!("initerr {}", message);
            }
        }));
        player.add_listener(EventKind::AuthenticationError, Box::new(|event| {
            if let PlayerEvent::AuthenticationError { message } = event {
                error!("autherr {}", message);
            }
        }));
        player.add_listener(EventKind::AccountError, Box::new(|event| {
            if let PlayerEvent::AccountError { message } = event {
                error!("accerr {}", message);
            }
        }));
        player.add_listener(EventKind::PlaybackError, Box::new(|event| {
            if let PlayerEvent::PlaybackError { message } = event {
                error!("playberr {}", message);
            }
        }));

        // Playback status updates
        player.add_listener(EventKind::PlayerStateChanged, Box::new(|event| {
            if let PlayerEvent::PlayerStateChanged(state) = event {
                info!("state {:?}", state);
            }
        }));

        let on_ready = Mutex::new(Some(on_ready));
        player.add_listener(EventKind::Ready, Box::new(move |event| {
            if let PlayerEvent::Ready { device_id } = event {
                info!("Ready with Device ID {}", device_id);
                let activate = on_ready
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .take();
                if let Some(activate) = activate {
                    activate(device_id.clone());
                }
            }
        }));

        player.add_listener(EventKind::NotReady, Box::new(|event| {
            if let PlayerEvent::NotReady { device_id } = event {
                info!("Device ID has gone offline {}", device_id);
            }
        }));

        player.connect();
        player
    }
}

/// Handle produced by a fired [`ReadySlot`], shared with whoever tears the session down.
pub type SharedDevice<D> = Arc<Mutex<Option<D>>>;
