//! shellpane
//!
//! An embeddable interactive terminal for GUI hosts. Spawns a shell on a
//! pty, decodes its VT100/ANSI output into a screen buffer with bounded
//! scrollback, and renders the result as styled text spans diffed against
//! the previous frame. Keyboard events go the other way, encoded to the
//! byte sequences shells expect.
//!
//! The pieces compose but stand alone: [`ShellSession`] is just the process
//! and its I/O threads, [`Parser`] and [`ScreenBuffer`] are a pure decoder
//! usable on any byte stream, and [`Session`] wires them together for the
//! common case.
//!
//! ```no_run
//! use shellpane::{Config, Modifiers, Session, SpanRenderer};
//!
//! let config = Config::default();
//! let mut session = Session::new(&config);
//! let mut renderer = SpanRenderer::from_config(&config);
//! session.start()?;
//!
//! session.send_key("l", Modifiers::empty());
//! session.send_key("s", Modifiers::empty());
//! session.send_key("Enter", Modifiers::empty());
//!
//! // From the host's refresh loop:
//! if session.pump() {
//!     for update in renderer.render(session.screen()) {
//!         // repaint update.line with update.spans
//!     }
//! }
//! # Ok::<(), shellpane::PtyError>(())
//! ```

pub mod config;
pub mod core;
pub mod ui;

pub use crate::config::{Config, ConfigError};
pub use crate::core::pty::{PtyError, SessionEvent, ShellSession};
pub use crate::core::session::Session;
pub use crate::core::term::{Cell, Color, Cursor, Parser, Row, ScreenBuffer};
pub use crate::ui::keymapper::{KeyEncoder, Modifiers};
pub use crate::ui::renderer::{LineUpdate, Span, SpanRenderer};
