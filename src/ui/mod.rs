//! Host-facing surface: key encoding in, styled spans out.

pub mod keymapper;
pub mod renderer;

pub use keymapper::{KeyEncoder, Modifiers};
pub use renderer::{LineUpdate, Span, SpanRenderer};
