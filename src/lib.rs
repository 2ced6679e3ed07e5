//! Themed fullscreen image clock: polls a temperature and a weather endpoint,
//! skins the frame from a per-theme image folder, and pushes it to a small
//! dedicated display, dimming at night.

pub mod assets;
pub mod config;
pub mod display;
pub mod render;
pub mod weather;
