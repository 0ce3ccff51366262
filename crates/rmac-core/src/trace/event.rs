//! The canonical event model stored in a trace.
//!
//! Every captured input occurrence becomes one fixed-size [`Event`]: a kind
//! tag, a microsecond offset from session start, and three signed payload
//! slots whose meaning depends on the kind.
//!
//! | Kind              | slot0          | slot1                 | slot2 |
//! |-------------------|----------------|-----------------------|-------|
//! | `PointerDelta`    | dx             | dy                    | 0     |
//! | `PointerAbsolute` | screen x       | screen y              | 0     |
//! | `Scroll`          | wheel delta    | 0 vertical / 1 horiz. | 0     |
//! | `ButtonChange`    | button id      | 1 down / 0 up         | 0     |
//! | `KeyChange`       | virtual key    | 1 down / 0 up         | 0     |
//!
//! The raw slots are kept verbatim so that a decode/encode cycle is
//! bit-identical even for kinds this build does not understand.  Dispatch
//! code works on the typed [`InputAction`] view instead of raw slots.

use serde::{Deserialize, Serialize};

/// Tag selecting how an [`Event`]'s payload slots are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    PointerDelta,
    PointerAbsolute,
    Scroll,
    ButtonChange,
    KeyChange,
    /// A tag written by a newer build.  Preserved, skipped during playback.
    Unknown(u32),
}

impl EventKind {
    /// Returns the on-disk tag value.
    pub fn tag(self) -> u32 {
        match self {
            EventKind::PointerDelta => 0,
            EventKind::PointerAbsolute => 1,
            EventKind::Scroll => 2,
            EventKind::ButtonChange => 3,
            EventKind::KeyChange => 4,
            EventKind::Unknown(tag) => tag,
        }
    }

    /// Maps an on-disk tag to a kind.  Never fails.
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            0 => EventKind::PointerDelta,
            1 => EventKind::PointerAbsolute,
            2 => EventKind::Scroll,
            3 => EventKind::ButtonChange,
            4 => EventKind::KeyChange,
            other => EventKind::Unknown(other),
        }
    }
}

/// Pointer button identifiers as stored in `ButtonChange` slot0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum PointerButton {
    Left = 1,
    Right = 2,
    Middle = 3,
    X1 = 4,
    X2 = 5,
}

impl PointerButton {
    /// All buttons, in id order.
    pub const ALL: [PointerButton; 5] = [
        PointerButton::Left,
        PointerButton::Right,
        PointerButton::Middle,
        PointerButton::X1,
        PointerButton::X2,
    ];

    pub fn id(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for PointerButton {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PointerButton::Left),
            2 => Ok(PointerButton::Right),
            3 => Ok(PointerButton::Middle),
            4 => Ok(PointerButton::X1),
            5 => Ok(PointerButton::X2),
            _ => Err(()),
        }
    }
}

/// One timestamped input occurrence, exactly as it is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// Microseconds elapsed since the recording session started.
    pub offset_micros: u64,
    pub slots: [i32; 3],
}

/// Typed interpretation of an [`Event`]'s payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    PointerDelta { dx: i32, dy: i32 },
    PointerAbsolute { x: i32, y: i32 },
    Scroll { delta: i32, horizontal: bool },
    Button { button: PointerButton, down: bool },
    Key { code: u8, down: bool },
}

impl Event {
    /// Builds an event from a typed action.
    pub fn new(offset_micros: u64, action: InputAction) -> Self {
        let (kind, slots) = match action {
            InputAction::PointerDelta { dx, dy } => (EventKind::PointerDelta, [dx, dy, 0]),
            InputAction::PointerAbsolute { x, y } => (EventKind::PointerAbsolute, [x, y, 0]),
            InputAction::Scroll { delta, horizontal } => {
                (EventKind::Scroll, [delta, horizontal as i32, 0])
            }
            InputAction::Button { button, down } => {
                (EventKind::ButtonChange, [button.id(), down as i32, 0])
            }
            InputAction::Key { code, down } => (EventKind::KeyChange, [code as i32, down as i32, 0]),
        };
        Self {
            kind,
            offset_micros,
            slots,
        }
    }

    pub fn pointer_delta(offset_micros: u64, dx: i32, dy: i32) -> Self {
        Self::new(offset_micros, InputAction::PointerDelta { dx, dy })
    }

    pub fn pointer_absolute(offset_micros: u64, x: i32, y: i32) -> Self {
        Self::new(offset_micros, InputAction::PointerAbsolute { x, y })
    }

    pub fn scroll(offset_micros: u64, delta: i32, horizontal: bool) -> Self {
        Self::new(offset_micros, InputAction::Scroll { delta, horizontal })
    }

    pub fn button(offset_micros: u64, button: PointerButton, down: bool) -> Self {
        Self::new(offset_micros, InputAction::Button { button, down })
    }

    pub fn key(offset_micros: u64, code: u8, down: bool) -> Self {
        Self::new(offset_micros, InputAction::Key { code, down })
    }

    /// Interprets the payload slots according to `kind`.
    ///
    /// Returns `None` for unknown kinds and for button/key payloads whose ids
    /// are out of range; playback skips those events.
    pub fn action(&self) -> Option<InputAction> {
        let [s0, s1, _] = self.slots;
        match self.kind {
            EventKind::PointerDelta => Some(InputAction::PointerDelta { dx: s0, dy: s1 }),
            EventKind::PointerAbsolute => Some(InputAction::PointerAbsolute { x: s0, y: s1 }),
            EventKind::Scroll => Some(InputAction::Scroll {
                delta: s0,
                horizontal: s1 != 0,
            }),
            EventKind::ButtonChange => PointerButton::try_from(s0)
                .ok()
                .map(|button| InputAction::Button { button, down: s1 != 0 }),
            EventKind::KeyChange => u8::try_from(s0)
                .ok()
                .map(|code| InputAction::Key { code, down: s1 != 0 }),
            EventKind::Unknown(_) => None,
        }
    }
}
