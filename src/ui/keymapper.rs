//! Key mapping for terminal input
//!
//! Converts host keyboard events to the VT byte sequences a terminal
//! program expects. A pure, total lookup: every event maps to a fixed
//! sequence or to nothing, never to an error.

use bitflags::bitflags;

bitflags! {
    /// Modifier keys reported by the host.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

/// Encoder from host key events to PTY input bytes.
pub struct KeyEncoder;

impl KeyEncoder {
    /// Map a named key or single printable character to its byte sequence.
    ///
    /// Returns `None` for anything unrecognized (multi-character key names,
    /// Ctrl combinations outside the supported set); ignored keys are not
    /// errors.
    pub fn encode(key: &str, modifiers: Modifiers) -> Option<Vec<u8>> {
        if modifiers.contains(Modifiers::CTRL) {
            return Self::encode_ctrl(key);
        }

        let bytes = match key {
            "Enter" => vec![0x0D],
            "Backspace" => vec![0x7F],
            "Tab" => vec![0x09],
            "Escape" => vec![0x1B],
            "Arrow Up" => b"\x1b[A".to_vec(),
            "Arrow Down" => b"\x1b[B".to_vec(),
            "Arrow Right" => b"\x1b[C".to_vec(),
            "Arrow Left" => b"\x1b[D".to_vec(),
            "Home" => b"\x1b[H".to_vec(),
            "End" => b"\x1b[F".to_vec(),
            "Page Up" => b"\x1b[5~".to_vec(),
            "Page Down" => b"\x1b[6~".to_vec(),
            "Delete" => b"\x1b[3~".to_vec(),
            "Space" | " " => vec![b' '],
            _ => return Self::encode_char(key),
        };
        Some(bytes)
    }

    /// Control-modified letters map to their control codes; anything else
    /// produces no output.
    fn encode_ctrl(key: &str) -> Option<Vec<u8>> {
        match key {
            "C" | "c" => Some(vec![0x03]),
            "D" | "d" => Some(vec![0x04]),
            "Z" | "z" => Some(vec![0x1A]),
            "L" | "l" => Some(vec![0x0C]),
            _ => None,
        }
    }

    /// A single printable character passes through unchanged; the host has
    /// already applied shift case.
    fn encode_char(key: &str) -> Option<Vec<u8>> {
        let mut chars = key.chars();
        let ch = chars.next()?;
        if chars.next().is_some() || ch.is_control() {
            return None;
        }
        Some(key.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(key: &str) -> Option<Vec<u8>> {
        KeyEncoder::encode(key, Modifiers::empty())
    }

    #[test]
    fn named_keys_map_to_fixed_sequences() {
        let cases: &[(&str, &[u8])] = &[
            ("Enter", b"\r"),
            ("Backspace", b"\x7f"),
            ("Tab", b"\t"),
            ("Escape", b"\x1b"),
            ("Arrow Up", b"\x1b[A"),
            ("Arrow Down", b"\x1b[B"),
            ("Arrow Right", b"\x1b[C"),
            ("Arrow Left", b"\x1b[D"),
            ("Home", b"\x1b[H"),
            ("End", b"\x1b[F"),
            ("Page Up", b"\x1b[5~"),
            ("Page Down", b"\x1b[6~"),
            ("Delete", b"\x1b[3~"),
            ("Space", b" "),
            (" ", b" "),
        ];
        for (key, expected) in cases {
            assert_eq!(encode(key).as_deref(), Some(*expected), "key {key:?}");
        }
    }

    #[test]
    fn arrow_up_is_exactly_esc_bracket_a() {
        assert_eq!(encode("Arrow Up"), Some(vec![0x1B, 0x5B, 0x41]));
    }

    #[test]
    fn ctrl_letters_map_to_control_codes() {
        let cases: &[(&str, u8)] = &[("C", 0x03), ("D", 0x04), ("Z", 0x1A), ("L", 0x0C)];
        for (key, code) in cases {
            assert_eq!(
                KeyEncoder::encode(key, Modifiers::CTRL),
                Some(vec![*code]),
                "ctrl+{key}"
            );
        }
    }

    #[test]
    fn unrecognized_ctrl_combinations_are_silent() {
        assert_eq!(KeyEncoder::encode("P", Modifiers::CTRL), None);
        assert_eq!(KeyEncoder::encode("Arrow Up", Modifiers::CTRL), None);
    }

    #[test]
    fn printable_characters_pass_through() {
        assert_eq!(encode("a"), Some(b"a".to_vec()));
        assert_eq!(encode("A"), Some(b"A".to_vec()));
        assert_eq!(encode("%"), Some(b"%".to_vec()));
        assert_eq!(
            KeyEncoder::encode("A", Modifiers::SHIFT),
            Some(b"A".to_vec())
        );
    }

    #[test]
    fn unknown_key_names_are_ignored() {
        assert_eq!(encode("UnknownKey"), None);
        assert_eq!(encode("F1"), None);
        assert_eq!(encode(""), None);
    }
}
