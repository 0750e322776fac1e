//! The playback SDK boundary: device handles, their options and the events they emit.

use crate::spotify::data::PlaybackState;
use crate::spotify::TokenSupplier;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    InitializationError,
    AuthenticationError,
    AccountError,
    PlaybackError,
    PlayerStateChanged,
    Ready,
    NotReady,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::InitializationError,
        EventKind::AuthenticationError,
        EventKind::AccountError,
        EventKind::PlaybackError,
        EventKind::PlayerStateChanged,
        EventKind::Ready,
        EventKind::NotReady,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::InitializationError => "initialization_error",
            EventKind::AuthenticationError => "authentication_error",
            EventKind::AccountError => "account_error",
            EventKind::PlaybackError => "playback_error",
            EventKind::PlayerStateChanged => "player_state_changed",
            EventKind::Ready => "ready",
            EventKind::NotReady => "not_ready",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    InitializationError { message: String },
    AuthenticationError { message: String },
    AccountError { message: String },
    PlaybackError { message: String },
    PlayerStateChanged(PlaybackState),
    Ready { device_id: String },
    NotReady { device_id: String },
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::InitializationError { .. } => EventKind::InitializationError,
            PlayerEvent::AuthenticationError { .. } => EventKind::AuthenticationError,
            PlayerEvent::AccountError { .. } => EventKind::AccountError,
            PlayerEvent::PlaybackError { .. } => EventKind::PlaybackError,
            PlayerEvent::PlayerStateChanged(_) => EventKind::PlayerStateChanged,
            PlayerEvent::Ready { .. } => EventKind::Ready,
            PlayerEvent::NotReady { .. } => EventKind::NotReady,
        }
    }
}

pub type Listener = Box<dyn Fn(&PlayerEvent) + Send + Sync>;

pub struct PlayerOptions {
    pub name: String,
    pub get_oauth_token: TokenSupplier,
}

pub trait PlaybackDevice {
    /// Subscribes `listener` to events of `kind`. Returns whether it was accepted.
    fn add_listener(&mut self, kind: EventKind, listener: Listener) -> bool;

    /// Starts connecting. The outcome arrives through the listeners only.
    fn connect(&mut self) -> bool;

    fn disconnect(&mut self);
}

pub trait PlaybackSdk {
    type Device: PlaybackDevice;

    fn create_player(&self, options: PlayerOptions) -> Self::Device;
}
