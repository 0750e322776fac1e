pub mod config;
pub mod controls;
pub mod player;
pub mod spotify;
