//! Infrastructure layer for the recorder.
//!
//! Contains the OS-facing input capture adapter.
//!
//! **Dependency rule**: this layer may depend on `rmac_core`, but MUST NOT be
//! imported by the capture pipeline except through the
//! [`input_capture::InputSource`] trait and its event type.

pub mod input_capture;
