//! Windows input injection via `SendInput`.
//!
//! Keys are sent by virtual-key code, with `KEYEVENTF_EXTENDEDKEY` for the
//! keys that live on the extended part of the keyboard.  Absolute moves use
//! `MOUSEEVENTF_ABSOLUTE`, whose coordinates are already normalized to
//! `0..=65535` by the scheduler.

#![cfg(target_os = "windows")]

use rmac_core::trace::PointerButton;
use tracing::warn;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_HWHEEL,
    MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP,
    MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL,
    MOUSEEVENTF_XDOWN, MOUSEEVENTF_XUP, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN, XBUTTON1, XBUTTON2,
};

use crate::application::inject_input::InputInjector;
use crate::application::replay_trace::ScreenGeometry;

/// Virtual keys that need `KEYEVENTF_EXTENDEDKEY`.
const EXTENDED_KEYS: &[u8] = &[
    0x21, 0x22, 0x23, 0x24, // PageUp, PageDown, End, Home
    0x25, 0x26, 0x27, 0x28, // arrows
    0x2D, 0x2E, // Insert, Delete
    0x5B, 0x5C, 0x5D, // Win keys, Apps
    0x6F, // numpad divide
    0x90, // NumLock
    0xA3, 0xA5, // right Ctrl, right Alt
];

/// [`InputInjector`] backed by `SendInput`.
#[derive(Debug, Default)]
pub struct SendInputInjector;

impl SendInputInjector {
    pub fn new() -> Self {
        Self
    }
}

impl InputInjector for SendInputInjector {
    fn inject_pointer_delta(&self, dx: i32, dy: i32) {
        send(mouse_input(dx, dy, 0, MOUSEEVENTF_MOVE));
    }

    fn inject_pointer_absolute(&self, x: u16, y: u16) {
        send(mouse_input(
            i32::from(x),
            i32::from(y),
            0,
            MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE,
        ));
    }

    fn inject_scroll(&self, delta: i32, horizontal: bool) {
        let flags = if horizontal {
            MOUSEEVENTF_HWHEEL
        } else {
            MOUSEEVENTF_WHEEL
        };
        // mouseData carries the signed wheel delta in a DWORD.
        send(mouse_input(0, 0, delta as u32, flags));
    }

    fn inject_button(&self, button: PointerButton, down: bool) {
        let (flags, data) = match (button, down) {
            (PointerButton::Left, true) => (MOUSEEVENTF_LEFTDOWN, 0),
            (PointerButton::Left, false) => (MOUSEEVENTF_LEFTUP, 0),
            (PointerButton::Right, true) => (MOUSEEVENTF_RIGHTDOWN, 0),
            (PointerButton::Right, false) => (MOUSEEVENTF_RIGHTUP, 0),
            (PointerButton::Middle, true) => (MOUSEEVENTF_MIDDLEDOWN, 0),
            (PointerButton::Middle, false) => (MOUSEEVENTF_MIDDLEUP, 0),
            (PointerButton::X1, true) => (MOUSEEVENTF_XDOWN, XBUTTON1 as u32),
            (PointerButton::X1, false) => (MOUSEEVENTF_XUP, XBUTTON1 as u32),
            (PointerButton::X2, true) => (MOUSEEVENTF_XDOWN, XBUTTON2 as u32),
            (PointerButton::X2, false) => (MOUSEEVENTF_XUP, XBUTTON2 as u32),
        };
        send(mouse_input(0, 0, data, flags));
    }

    fn inject_key(&self, code: u8, down: bool) {
        let mut flags = KEYBD_EVENT_FLAGS(0);
        if !down {
            flags |= KEYEVENTF_KEYUP;
        }
        if EXTENDED_KEYS.contains(&code) {
            flags |= KEYEVENTF_EXTENDEDKEY;
        }
        send(INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(u16::from(code)),
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        });
    }
}

/// Primary display size from `GetSystemMetrics`.
pub fn primary_screen_geometry() -> Option<ScreenGeometry> {
    // SAFETY: GetSystemMetrics has no preconditions.
    let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(ScreenGeometry::new(width as u32, height as u32))
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn mouse_input(dx: i32, dy: i32, data: u32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: data,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send(input: INPUT) {
    // SAFETY: `input` is a fully initialised INPUT on the stack and the size
    // argument matches its type.
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent != 1 {
        warn!("SendInput rejected an event (blocked by UIPI?)");
    }
}
