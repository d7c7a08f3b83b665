//! Asahi Reboot Switcher Core Library
//!
//! Tray utility for Apple Silicon dual-boot machines: switch the default
//! startup disk and restart into macOS.
//!
//! Architecture:
//! - Runner process owns the GTK main loop and the tray icon (tray_icon module)
//! - The tray session runs its own event loop thread (session module)
//! - Boot configuration goes through asahi-bless under pkexec (volume module)

pub mod config;
pub mod confirm;
pub mod error;
pub mod launcher;
pub mod reboot;
pub mod session;
pub mod tray_icon;
pub mod volume;
