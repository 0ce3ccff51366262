//! Recording input injector for tests.
//!
//! The real injector moves the cursor and presses keys on the machine
//! running the tests.  `RecordingInjector` pushes every call into a
//! `Mutex<Vec<...>>` instead, so tests can assert on exactly what was
//! emitted and in what order.
//!
//! For strict expectation-style checks the crate's unit tests also have the
//! `mockall`-generated `MockInputInjector`.

use std::sync::Mutex;

use rmac_core::trace::PointerButton;

use crate::application::inject_input::InputInjector;

/// One call made to a [`RecordingInjector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedInput {
    PointerDelta { dx: i32, dy: i32 },
    PointerAbsolute { x: u16, y: u16 },
    Scroll { delta: i32, horizontal: bool },
    Button { button: PointerButton, down: bool },
    Key { code: u8, down: bool },
}

/// An injector that records all calls without touching the OS.
#[derive(Debug, Default)]
pub struct RecordingInjector {
    calls: Mutex<Vec<InjectedInput>>,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every call so far, oldest first.
    pub fn recorded(&self) -> Vec<InjectedInput> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// Key transitions only, oldest first.
    pub fn keys(&self) -> Vec<(u8, bool)> {
        self.recorded()
            .into_iter()
            .filter_map(|call| match call {
                InjectedInput::Key { code, down } => Some((code, down)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: InjectedInput) {
        self.calls.lock().expect("lock poisoned").push(call);
    }
}

impl InputInjector for RecordingInjector {
    fn inject_pointer_delta(&self, dx: i32, dy: i32) {
        self.push(InjectedInput::PointerDelta { dx, dy });
    }

    fn inject_pointer_absolute(&self, x: u16, y: u16) {
        self.push(InjectedInput::PointerAbsolute { x, y });
    }

    fn inject_scroll(&self, delta: i32, horizontal: bool) {
        self.push(InjectedInput::Scroll { delta, horizontal });
    }

    fn inject_button(&self, button: PointerButton, down: bool) {
        self.push(InjectedInput::Button { button, down });
    }

    fn inject_key(&self, code: u8, down: bool) {
        self.push(InjectedInput::Key { code, down });
    }
}
