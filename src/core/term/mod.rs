//! Terminal emulation: screen state and the VT sequence parser.

pub mod parser;
pub mod state;

pub use parser::Parser;
pub use state::{Cell, Color, Cursor, Row, ScreenBuffer, DEFAULT_HISTORY_LIMIT};
