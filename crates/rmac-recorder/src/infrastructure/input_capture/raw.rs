//! Decoding of `RAWMOUSE` / `RAWKEYBOARD` fields into [`RawInputEvent`]s.
//!
//! Kept free of Windows types so the bit-twiddling is tested on every host.
//! Flag values are from `winuser.h`.

use rmac_core::trace::PointerButton;

use super::{ButtonTransitions, RawInputEvent};

/// `RAWMOUSE::usFlags`: coordinates are absolute (tablets, remote desktop).
pub const MOUSE_MOVE_ABSOLUTE: u16 = 0x0001;

/// `RAWKEYBOARD::Flags`: the key was released.
pub const RI_KEY_BREAK: u16 = 0x0001;

pub const RI_MOUSE_WHEEL: u16 = 0x0400;
pub const RI_MOUSE_HWHEEL: u16 = 0x0800;

/// `(down flag, up flag, button)` for every button raw input reports.
const BUTTON_FLAGS: [(u16, u16, PointerButton); 5] = [
    (0x0001, 0x0002, PointerButton::Left),
    (0x0004, 0x0008, PointerButton::Right),
    (0x0010, 0x0020, PointerButton::Middle),
    (0x0040, 0x0080, PointerButton::X1),
    (0x0100, 0x0200, PointerButton::X2),
];

/// Fields of one `RAWMOUSE` report.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMouseReport {
    pub flags: u16,
    pub button_flags: u16,
    pub button_data: u16,
    pub last_x: i32,
    pub last_y: i32,
}

pub fn button_transitions(button_flags: u16) -> ButtonTransitions {
    BUTTON_FLAGS
        .iter()
        .fold(ButtonTransitions::default(), |t, &(down, up, button)| {
            let t = if button_flags & down != 0 { t.press(button) } else { t };
            if button_flags & up != 0 {
                t.release(button)
            } else {
                t
            }
        })
}

/// Builds a mouse event.  Absolute device reports carry no usable delta, so
/// their motion is reported through `cursor` only.
pub fn mouse_event(report: RawMouseReport, cursor: (i32, i32), at_micros: u64) -> RawInputEvent {
    let (dx, dy) = if report.flags & MOUSE_MOVE_ABSOLUTE == 0 {
        (report.last_x, report.last_y)
    } else {
        (0, 0)
    };
    // usButtonData holds a signed wheel delta.
    let wheel_delta = report.button_data as i16;
    RawInputEvent::Mouse {
        dx,
        dy,
        cursor,
        buttons: button_transitions(report.button_flags),
        wheel: (report.button_flags & RI_MOUSE_WHEEL != 0).then_some(wheel_delta),
        hwheel: (report.button_flags & RI_MOUSE_HWHEEL != 0).then_some(wheel_delta),
        at_micros,
    }
}

/// Builds a key event.  Virtual-key codes above one byte do not exist; they
/// are folded onto the sentinel so the pipeline filters them.
///
/// `has_device` is false when the raw input header carries no device
/// handle, which is how `SendInput` traffic arrives.
pub fn key_event(vkey: u16, flags: u16, has_device: bool, at_micros: u64) -> RawInputEvent {
    RawInputEvent::Key {
        vk: u8::try_from(vkey).unwrap_or(rmac_core::keymap::vk::EXTENDED_SENTINEL),
        down: flags & RI_KEY_BREAK == 0,
        injected: !has_device,
        at_micros,
    }
}
