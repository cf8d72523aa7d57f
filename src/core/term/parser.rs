//! VT sequence parser
//!
//! Decodes the ANSI/VT100 byte stream from the shell and applies it to a
//! [`ScreenBuffer`]. The parser is resumable: escape sequences and UTF-8
//! code points split across read chunks decode exactly as if the stream had
//! arrived in one piece.

use super::state::{Color, ScreenBuffer};

/// Parser state machine
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
enum ParserState {
    /// Bytes are printable characters written at the cursor.
    #[default]
    Normal,
    /// Saw ESC, awaiting `[` or another introducer.
    EscapeStart,
    /// Accumulating `;`-separated numeric parameters until a final letter.
    CsiParams,
}

/// Resumable escape-sequence decoder.
///
/// Holds the partially-received sequence state and the pending SGR
/// attributes applied to subsequently written cells.
pub struct Parser {
    state: ParserState,
    params: Vec<u16>,
    current_param: Option<u16>,
    /// Trailing bytes of an incomplete UTF-8 code point from the last chunk.
    pending_utf8: Vec<u8>,
    fg: Color,
    bold: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Normal,
            params: Vec::with_capacity(8),
            current_param: None,
            pending_utf8: Vec::new(),
            fg: Color::Default,
            bold: false,
        }
    }

    /// Current pending foreground color (applied to the next written cell).
    pub fn fg(&self) -> Color {
        self.fg
    }

    /// Current pending bold attribute.
    pub fn bold(&self) -> bool {
        self.bold
    }

    /// Feed one chunk of raw output. Chunk boundaries are arbitrary.
    pub fn feed(&mut self, bytes: &[u8], screen: &mut ScreenBuffer) {
        let mut input;
        let bytes = if self.pending_utf8.is_empty() {
            bytes
        } else {
            input = std::mem::take(&mut self.pending_utf8);
            input.extend_from_slice(bytes);
            &input
        };

        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];

            if self.state != ParserState::Normal || b < 0x80 {
                self.feed_byte(b, screen);
                i += 1;
                continue;
            }

            // UTF-8 lead byte in Normal state.
            let seq_len = match b {
                0xC0..=0xDF => 2,
                0xE0..=0xEF => 3,
                0xF0..=0xF7 => 4,
                _ => {
                    // Stray continuation or invalid lead; skip it.
                    i += 1;
                    continue;
                }
            };

            if i + seq_len > bytes.len() {
                // Code point split across chunks; keep the tail for the
                // next call.
                self.pending_utf8.extend_from_slice(&bytes[i..]);
                break;
            }

            match std::str::from_utf8(&bytes[i..i + seq_len]) {
                Ok(s) => {
                    for ch in s.chars() {
                        screen.put_char(ch, self.fg, self.bold);
                    }
                    i += seq_len;
                }
                Err(_) => {
                    i += 1;
                }
            }
        }
    }

    fn feed_byte(&mut self, byte: u8, screen: &mut ScreenBuffer) {
        // ESC restarts sequence recognition from any state.
        if byte == 0x1B {
            self.enter_escape();
            return;
        }

        match self.state {
            ParserState::Normal => self.normal(byte, screen),
            ParserState::EscapeStart => self.escape_start(byte),
            ParserState::CsiParams => self.csi_params(byte, screen),
        }
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::EscapeStart;
        self.params.clear();
        self.current_param = None;
    }

    fn normal(&mut self, byte: u8, screen: &mut ScreenBuffer) {
        match byte {
            0x07 => {} // BEL - ignore
            0x08 => screen.backspace(),
            0x09 => screen.horizontal_tab(),
            0x0A | 0x0B | 0x0C => screen.linefeed(),
            0x0D => screen.carriage_return(),
            0x20..=0x7E => screen.put_char(byte as char, self.fg, self.bold),
            _ => {} // other C0 controls and DEL - ignore
        }
    }

    fn escape_start(&mut self, byte: u8) {
        match byte {
            b'[' => self.state = ParserState::CsiParams,
            _ => {
                // Not a CSI sequence; malformed input must never wedge the
                // state machine.
                tracing::debug!("unsupported escape introducer: {:#04x}", byte);
                self.state = ParserState::Normal;
            }
        }
    }

    fn csi_params(&mut self, byte: u8, screen: &mut ScreenBuffer) {
        match byte {
            b'0'..=b'9' => {
                let digit = (byte - b'0') as u16;
                self.current_param = Some(
                    self.current_param
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
            }
            b';' => {
                self.params.push(self.current_param.take().unwrap_or(0));
            }
            0x40..=0x7E => {
                if let Some(p) = self.current_param.take() {
                    self.params.push(p);
                }
                self.dispatch_csi(byte, screen);
                self.state = ParserState::Normal;
            }
            _ => {
                // Unexpected byte aborts the sequence without error.
                self.state = ParserState::Normal;
            }
        }
    }

    fn dispatch_csi(&mut self, final_byte: u8, screen: &mut ScreenBuffer) {
        let params = &self.params;
        match final_byte {
            // Cursor movement
            b'A' => screen.cursor_up(params.first().copied().unwrap_or(1)),
            b'B' => screen.cursor_down(params.first().copied().unwrap_or(1)),
            b'C' => screen.cursor_forward(params.first().copied().unwrap_or(1)),
            b'D' => screen.cursor_backward(params.first().copied().unwrap_or(1)),
            b'H' | b'f' => {
                let row = params.first().copied().unwrap_or(1);
                let col = params.get(1).copied().unwrap_or(1);
                screen.cursor_position(row, col);
            }

            // Erase
            b'J' => screen.erase_in_display(params.first().copied().unwrap_or(0)),
            b'K' => screen.erase_in_line(params.first().copied().unwrap_or(0)),

            // SGR - Select Graphic Rendition
            b'm' => self.apply_sgr(),

            _ => {
                tracing::debug!(
                    "unknown CSI: params={:?}, final={:?}",
                    params,
                    final_byte as char
                );
            }
        }
    }

    fn apply_sgr(&mut self) {
        if self.params.is_empty() {
            self.fg = Color::Default;
            self.bold = false;
            return;
        }

        for &param in &self.params {
            match param {
                0 => {
                    self.fg = Color::Default;
                    self.bold = false;
                }
                1 => self.bold = true,
                22 => self.bold = false,
                30..=37 | 90..=97 => {
                    if let Some(color) = Color::from_sgr(param) {
                        self.fg = color;
                    }
                }
                39 => self.fg = Color::Default,
                _ => {} // unrecognized codes are ignored, never fatal
            }
        }
    }
}
