//! Playback SDK backed by the Web API: adopts an existing Connect device and reports
//! what happens to it through the usual player events.

use crate::player::sdk::{EventKind, Listener, PlaybackDevice, PlaybackSdk, PlayerEvent, PlayerOptions};
use crate::player::ReadySlot;
use crate::spotify::data::{ApiError, Device, PlaybackApi, PlaybackState};
use crate::spotify::{AuthContext, TokenSupplier};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;

type ListenerMap = BTreeMap<EventKind, Vec<Listener>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    Named(String),
    /// The active device, else the first one listed.
    Any,
}

impl DeviceSelector {
    pub fn from_config(name: Option<String>) -> Self {
        match name.filter(|name| !name.trim().is_empty()) {
            Some(name) => DeviceSelector::Named(name),
            None => DeviceSelector::Any,
        }
    }

    pub fn pick<'a>(&self, devices: &'a [Device]) -> Option<&'a Device> {
        // Restricted devices come back without an id and cannot be targeted.
        let mut usable = devices.iter().filter(|device| device.id.is_some());
        match self {
            DeviceSelector::Named(name) => usable.find(|device| device.name.eq_ignore_ascii_case(name)),
            DeviceSelector::Any => {
                let usable: Vec<&Device> = usable.collect();
                usable
                    .iter()
                    .find(|device| device.is_active)
                    .or_else(|| usable.first())
                    .copied()
            }
        }
    }
}

pub struct RemoteSdk {
    api: PlaybackApi,
    selector: DeviceSelector,
    poll_interval: Duration,
}

impl RemoteSdk {
    pub fn new(api: PlaybackApi, selector: DeviceSelector, poll_interval: Duration) -> Self {
        Self {
            api,
            selector,
            poll_interval,
        }
    }

    /// Signals that the SDK finished loading by firing whatever sits in `slot`.
    pub fn load(&self, slot: &ReadySlot) -> bool {
        debug!("playback SDK loaded against {}", self.api.base_url());
        slot.fire()
    }
}

impl PlaybackSdk for RemoteSdk {
    type Device = RemoteDevice;

    fn create_player(&self, options: PlayerOptions) -> RemoteDevice {
        RemoteDevice {
            options,
            api: self.api.clone(),
            selector: self.selector.clone(),
            poll_interval: self.poll_interval,
            listeners: Arc::new(Mutex::new(ListenerMap::new())),
            task: None,
        }
    }
}

pub struct RemoteDevice {
    options: PlayerOptions,
    api: PlaybackApi,
    selector: DeviceSelector,
    poll_interval: Duration,
    listeners: Arc<Mutex<ListenerMap>>,
    task: Option<JoinHandle<()>>,
}

impl RemoteDevice {
    pub fn is_connected(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }
}

impl PlaybackDevice for RemoteDevice {
    fn add_listener(&mut self, kind: EventKind, listener: Listener) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.entry(kind).or_default().push(listener);
        true
    }

    fn connect(&mut self) -> bool {
        if self.is_connected() {
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                error!("cannot connect '{}' outside a tokio runtime: {}", self.options.name, err);
                return false;
            }
        };

        info!("Connecting '{}'", self.options.name);
        let session = Session {
            api: self.api.clone(),
            selector: self.selector.clone(),
            poll_interval: self.poll_interval,
            get_oauth_token: self.options.get_oauth_token.clone(),
            listeners: self.listeners.clone(),
        };
        self.task = Some(runtime.spawn(session.run()));
        true
    }

    fn disconnect(&mut self) {
        if let Some(task) = self.task.take() {
            info!("Disconnecting '{}'", self.options.name);
            task.abort();
        }
    }
}

impl Drop for RemoteDevice {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

enum Step {
    Continue,
    Stop,
}

struct Session {
    api: PlaybackApi,
    selector: DeviceSelector,
    poll_interval: Duration,
    get_oauth_token: TokenSupplier,
    listeners: Arc<Mutex<ListenerMap>>,
}

impl Session {
    fn emit(&self, event: PlayerEvent) {
        let listeners = self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for listener in listeners.get(&event.kind()).into_iter().flatten() {
            listener(&event);
        }
    }

    async fn request_token(&self) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        (self.get_oauth_token)(Box::new(move |token| {
            let _ = tx.send(token);
        }));
        rx.await.ok()
    }

    /// Turns a failed request into an event. Auth and account problems end the session.
    fn fault(&self, err: ApiError, initialized: bool, while_playing: bool) -> Step {
        let message = match &err {
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Transport(inner) => inner.to_string(),
        };

        match err.status() {
            Some(401) => {
                self.emit(PlayerEvent::AuthenticationError { message });
                Step::Stop
            }
            Some(403) => {
                self.emit(PlayerEvent::AccountError { message });
                Step::Stop
            }
            _ if !initialized => {
                self.emit(PlayerEvent::InitializationError { message });
                Step::Stop
            }
            _ if while_playing => {
                self.emit(PlayerEvent::PlaybackError { message });
                Step::Continue
            }
            _ => {
                warn!("device poll failed: {}", message);
                Step::Continue
            }
        }
    }

    async fn run(self) {
        let auth = match self.request_token().await {
            Some(token) => AuthContext::new(token),
            None => {
                self.emit(PlayerEvent::InitializationError {
                    message: "no access token was supplied".to_string(),
                });
                return;
            }
        };

        let mut initialized = false;
        let mut ready: Option<String> = None;
        let mut last_state: Option<PlaybackState> = None;

        loop {
            match self.api.devices(&auth).await {
                Ok(devices) => {
                    initialized = true;
                    let picked = self.selector.pick(&devices).and_then(|device| device.id.clone());

                    match (ready.take(), picked) {
                        (Some(current), Some(id)) if current == id => ready = Some(current),
                        (current, Some(id)) => {
                            if let Some(current) = current {
                                self.emit(PlayerEvent::NotReady { device_id: current });
                            }
                            last_state = None;
                            ready = Some(id.clone());
                            self.emit(PlayerEvent::Ready { device_id: id });
                        }
                        (Some(current), None) => {
                            last_state = None;
                            self.emit(PlayerEvent::NotReady { device_id: current });
                        }
                        (None, None) => debug!("waiting for a device matching {:?}", self.selector),
                    }
                }
                Err(err) => {
                    if let Step::Stop = self.fault(err, initialized, false) {
                        return;
                    }
                }
            }

            if ready.is_some() {
                match self.api.playback_state(&auth).await {
                    Ok(state) => {
                        if !same_state(&state, &last_state) {
                            if let Some(changed) = &state {
                                self.emit(PlayerEvent::PlayerStateChanged(changed.clone()));
                            }
                        }
                        last_state = state;
                    }
                    Err(err) => {
                        if let Step::Stop = self.fault(err, initialized, true) {
                            return;
                        }
                    }
                }
            }

            sleep(self.poll_interval).await;
        }
    }
}

fn same_state(current: &Option<PlaybackState>, previous: &Option<PlaybackState>) -> bool {
    match (current, previous) {
        (Some(current), Some(previous)) => current.same_playback(previous),
        (None, None) => true,
        _ => false,
    }
}
