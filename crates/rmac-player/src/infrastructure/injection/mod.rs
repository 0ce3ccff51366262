//! Platform input injectors.
//!
//! The Windows adapter is selected at compile time; other hosts get
//! [`InjectionError::UnsupportedPlatform`] from [`platform_injector`].
//! A recording mock is always available for tests.

use std::sync::Arc;

use thiserror::Error;

use crate::application::inject_input::InputInjector;
use crate::application::replay_trace::ScreenGeometry;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("input injection is not supported on {0}")]
    UnsupportedPlatform(String),
}

/// Returns the platform's input injector.
#[cfg(target_os = "windows")]
pub fn platform_injector() -> Result<Arc<dyn InputInjector>, InjectionError> {
    Ok(Arc::new(windows::SendInputInjector::new()))
}

/// Returns the platform's input injector.
///
/// # Errors
///
/// [`InjectionError::UnsupportedPlatform`] on hosts without an adapter.
#[cfg(not(target_os = "windows"))]
pub fn platform_injector() -> Result<Arc<dyn InputInjector>, InjectionError> {
    Err(InjectionError::UnsupportedPlatform(
        std::env::consts::OS.to_string(),
    ))
}

/// Size of the primary display, if the platform can report it.
#[cfg(target_os = "windows")]
pub fn primary_screen_geometry() -> Option<ScreenGeometry> {
    windows::primary_screen_geometry()
}

/// Size of the primary display, if the platform can report it.
#[cfg(not(target_os = "windows"))]
pub fn primary_screen_geometry() -> Option<ScreenGeometry> {
    None
}
