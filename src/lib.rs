pub mod clipboard;
pub mod config;
pub mod controller;
pub mod encoder;
pub mod error;
pub mod harness;
pub mod history;
pub mod logging;
pub mod picker;
