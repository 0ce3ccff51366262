//! Windows virtual-key codes used by capture, playback, and automation.
//!
//! # What is a virtual-key code? (for beginners)
//!
//! Windows numbers every logical key with a byte called a "virtual-key code"
//! (`VK_*` in `<winuser.h>`).  The letter A is always `0x41` no matter which
//! physical key produces it on the active layout.  Traces store key
//! transitions as these bytes, so a trace recorded on one machine replays the
//! same logical keys on another.
//!
//! Only the codes the tool refers to by name are given constants here.  The
//! name table exists so configuration files and CLI flags can say
//! `"escape"` or `"f8"` instead of `27` or `119`.

/// Escape: default stop key for recording and playback.
pub const ESCAPE: u8 = 0x1B;
/// Alt (either side): default absolute-mode modifier.
pub const MENU: u8 = 0x12;
pub const SHIFT: u8 = 0x10;
pub const CONTROL: u8 = 0x11;
pub const SPACE: u8 = 0x20;
pub const RETURN: u8 = 0x0D;
pub const TAB: u8 = 0x09;
pub const BACK: u8 = 0x08;

pub const LEFT: u8 = 0x25;
pub const UP: u8 = 0x26;
pub const RIGHT: u8 = 0x27;
pub const DOWN: u8 = 0x28;

pub const A: u8 = 0x41;
pub const D: u8 = 0x44;
pub const S: u8 = 0x53;
pub const W: u8 = 0x57;

pub const F1: u8 = 0x70;
pub const F12: u8 = 0x7B;

/// Code the raw-input layer reports for fake keys (e.g. the extra events
/// some keyboards generate around extended keys).  Never recorded.
pub const EXTENDED_SENTINEL: u8 = 0xFF;

/// Named keys, lowercase.  Letters, digits, and F-keys are handled by
/// [`from_name`] directly.
const NAMED: &[(&str, u8)] = &[
    ("escape", ESCAPE),
    ("esc", ESCAPE),
    ("alt", MENU),
    ("menu", MENU),
    ("shift", SHIFT),
    ("ctrl", CONTROL),
    ("control", CONTROL),
    ("space", SPACE),
    ("enter", RETURN),
    ("return", RETURN),
    ("tab", TAB),
    ("backspace", BACK),
    ("left", LEFT),
    ("up", UP),
    ("right", RIGHT),
    ("down", DOWN),
    ("pause", 0x13),
    ("capslock", 0x14),
    ("pageup", 0x21),
    ("pagedown", 0x22),
    ("end", 0x23),
    ("home", 0x24),
    ("insert", 0x2D),
    ("delete", 0x2E),
    ("scrolllock", 0x91),
];

/// Resolves a key name (case-insensitive) to its virtual-key code.
///
/// Accepts the names in the table above, single letters `a`–`z`, digits
/// `0`–`9`, `f1`–`f24`, and numeric forms (`27`, `0x1b`).
pub fn from_name(name: &str) -> Option<u8> {
    let lower = name.trim().to_ascii_lowercase();

    if let Some(&(_, vk)) = NAMED.iter().find(|(n, _)| *n == lower) {
        return Some(vk);
    }

    let bytes = lower.as_bytes();
    if bytes.len() == 1 {
        let c = bytes[0];
        return match c {
            b'a'..=b'z' => Some(c.to_ascii_uppercase()),
            b'0'..=b'9' => Some(c),
            _ => None,
        };
    }

    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=24).contains(&n) {
            return Some(F1 + n - 1);
        }
    }

    if let Some(hex) = lower.strip_prefix("0x") {
        return u8::from_str_radix(hex, 16).ok();
    }
    lower.parse::<u8>().ok()
}

/// Canonical lowercase name for `vk`, if it has one.
pub fn name(vk: u8) -> Option<&'static str> {
    NAMED.iter().find(|(_, v)| *v == vk).map(|(n, _)| *n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_keys_resolve_case_insensitively() {
        assert_eq!(from_name("Escape"), Some(ESCAPE));
        assert_eq!(from_name("ESC"), Some(ESCAPE));
        assert_eq!(from_name("alt"), Some(MENU));
        assert_eq!(from_name(" Left "), Some(LEFT));
    }

    #[test]
    fn test_letters_and_digits_map_to_ascii_codes() {
        assert_eq!(from_name("w"), Some(W));
        assert_eq!(from_name("D"), Some(D));
        assert_eq!(from_name("7"), Some(0x37));
    }

    #[test]
    fn test_function_keys_cover_f1_to_f24() {
        assert_eq!(from_name("f1"), Some(F1));
        assert_eq!(from_name("F12"), Some(F12));
        assert_eq!(from_name("f24"), Some(0x87));
        assert_eq!(from_name("f25"), None);
        assert_eq!(from_name("f0"), None);
    }

    #[test]
    fn test_numeric_forms_are_accepted() {
        assert_eq!(from_name("27"), Some(ESCAPE));
        assert_eq!(from_name("0x1B"), Some(ESCAPE));
        assert_eq!(from_name("300"), None);
    }

    #[test]
    fn test_unknown_name_is_none() {
        assert_eq!(from_name("hyper"), None);
        assert_eq!(from_name(""), None);
    }

    #[test]
    fn test_name_returns_first_alias() {
        assert_eq!(name(ESCAPE), Some("escape"));
        assert_eq!(name(MENU), Some("alt"));
        assert_eq!(name(0x41), None);
    }
}
