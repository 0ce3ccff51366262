//! Book-keeping of keys and buttons held down by synthetic input.
//!
//! Both the scheduler (replaying key and button transitions) and automation
//! policies (steering) press things.  Routing every press and release
//! through one [`HeldInputs`] means that whatever is still down when a
//! session ends, for any reason, can be released in one call.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use rmac_core::trace::PointerButton;
use tracing::debug;

use super::inject_input::InputInjector;

#[derive(Debug, Default)]
struct HeldSet {
    keys: BTreeSet<u8>,
    buttons: BTreeSet<PointerButton>,
}

/// Thread-safe set of inputs currently held down, plus the injector used to
/// change it.
pub struct HeldInputs {
    injector: Arc<dyn InputInjector>,
    held: Mutex<HeldSet>,
}

impl HeldInputs {
    pub fn new(injector: Arc<dyn InputInjector>) -> Self {
        Self {
            injector,
            held: Mutex::new(HeldSet::default()),
        }
    }

    pub fn injector(&self) -> &Arc<dyn InputInjector> {
        &self.injector
    }

    // A panic while holding the lock leaves the set usable; recover it.
    fn lock(&self) -> MutexGuard<'_, HeldSet> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn press_key(&self, code: u8) {
        let mut held = self.lock();
        self.injector.inject_key(code, true);
        held.keys.insert(code);
    }

    /// Injects the release even if the key is not tracked as held: a trace
    /// may release a key that was already down when recording began.
    pub fn release_key(&self, code: u8) {
        let mut held = self.lock();
        self.injector.inject_key(code, false);
        held.keys.remove(&code);
    }

    pub fn press_button(&self, button: PointerButton) {
        let mut held = self.lock();
        self.injector.inject_button(button, true);
        held.buttons.insert(button);
    }

    pub fn release_button(&self, button: PointerButton) {
        let mut held = self.lock();
        self.injector.inject_button(button, false);
        held.buttons.remove(&button);
    }

    pub fn is_key_held(&self, code: u8) -> bool {
        self.lock().keys.contains(&code)
    }

    pub fn is_button_held(&self, button: PointerButton) -> bool {
        self.lock().buttons.contains(&button)
    }

    pub fn held_count(&self) -> usize {
        let held = self.lock();
        held.keys.len() + held.buttons.len()
    }

    /// Releases everything still held, keys first, and returns how many
    /// releases were injected.
    pub fn release_all(&self) -> usize {
        let mut held = self.lock();
        let keys = std::mem::take(&mut held.keys);
        let buttons = std::mem::take(&mut held.buttons);
        for &code in &keys {
            self.injector.inject_key(code, false);
        }
        for &button in &buttons {
            self.injector.inject_button(button, false);
        }
        let released = keys.len() + buttons.len();
        if released > 0 {
            debug!(released, "released held inputs");
        }
        released
    }
}
