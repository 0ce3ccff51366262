//! Keyboard code helpers.
//!
//! Traces store Windows virtual-key codes verbatim; see [`vk`] for the named
//! constants and the name lookup used by configuration.

pub mod vk;

pub use vk::{from_name as vk_from_name, name as vk_name};
