//! Core terminal engine: pty sessions, decoding, screen state.

pub mod pty;
pub mod session;
pub mod term;

pub use pty::{PtyError, SessionEvent, ShellSession};
pub use session::Session;
