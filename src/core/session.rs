//! Session management
//!
//! Glues a [`ShellSession`] to the parser and screen buffer. The reader
//! thread delivers raw chunks over a channel; the consumer calls
//! [`Session::pump`] from its own context, so decoding is single-writer and
//! chunks are processed in read order.

use std::sync::mpsc::{self, Receiver, TryRecvError};

use super::pty::{PtyError, SessionEvent, ShellSession};
use super::term::{Parser, ScreenBuffer};
use crate::config::Config;
use crate::ui::keymapper::{KeyEncoder, Modifiers};

/// An embedded terminal: one shell process, its decoded screen, and the
/// input path back to it.
pub struct Session {
    screen: ScreenBuffer,
    parser: Parser,
    shell: Option<ShellSession>,
    event_rx: Option<Receiver<SessionEvent>>,
    shell_command: Vec<String>,
}

impl Session {
    /// Create a session with the configured geometry. The shell is not
    /// spawned until [`Session::start`].
    pub fn new(config: &Config) -> Self {
        Self {
            screen: ScreenBuffer::with_history_limit(
                config.cols,
                config.rows,
                config.history_limit,
            ),
            parser: Parser::new(),
            shell: None,
            event_rx: None,
            shell_command: config.shell_command(),
        }
    }

    /// Spawn the shell. Fails with [`PtyError::Spawn`] if the process cannot
    /// be created; not retried.
    pub fn start(&mut self) -> Result<(), PtyError> {
        let (tx, rx) = mpsc::channel();
        let shell = ShellSession::spawn(
            &self.shell_command,
            self.screen.visible_rows(),
            self.screen.cols(),
            tx,
        )?;
        self.shell = Some(shell);
        self.event_rx = Some(rx);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shell.as_ref().is_some_and(|s| s.is_running())
    }

    pub fn screen(&self) -> &ScreenBuffer {
        &self.screen
    }

    /// Drain pending output from the reader thread and decode it, in order.
    /// Returns true if anything was processed.
    pub fn pump(&mut self) -> bool {
        let Some(rx) = &self.event_rx else {
            return false;
        };

        let mut chunks: Vec<Vec<u8>> = Vec::new();
        let mut disconnected = false;
        loop {
            match rx.try_recv() {
                Ok(SessionEvent::Output(data)) => chunks.push(data),
                Ok(SessionEvent::Exited) => {}
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if disconnected {
            self.event_rx = None;
        }

        let processed = !chunks.is_empty();
        for data in chunks {
            self.feed_bytes(&data);
        }
        processed
    }

    /// Feed raw output bytes through the decoder.
    pub fn feed_bytes(&mut self, bytes: &[u8]) {
        self.parser.feed(bytes, &mut self.screen);
    }

    /// Forward raw input bytes to the shell. A failed write (the shell has
    /// exited) is reported as a diagnostic line on the output path and
    /// closes the session rather than surfacing an error to the caller.
    pub fn write_input(&mut self, data: &[u8]) {
        let Some(shell) = &self.shell else {
            return;
        };
        if let Err(e) = shell.write(data) {
            let message = format!("\r\nerror writing to shell: {e}\r\n");
            self.feed_bytes(message.as_bytes());
            self.close();
        }
    }

    /// Encode a host key event and forward it. Unrecognized keys produce no
    /// input at all.
    pub fn send_key(&mut self, key: &str, modifiers: Modifiers) {
        if let Some(bytes) = KeyEncoder::encode(key, modifiers) {
            self.write_input(&bytes);
        }
    }

    /// Resize the pty and the screen buffer. The two resizes are not atomic;
    /// the decoder tolerates the transient mismatch.
    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<(), PtyError> {
        self.screen.resize(rows, cols);
        if let Some(shell) = &self.shell {
            shell.resize(rows, cols)?;
        }
        Ok(())
    }

    /// Close the shell session. Idempotent; safe to call without `start`.
    pub fn close(&mut self) {
        if let Some(shell) = self.shell.take() {
            shell.close();
        }
        self.event_rx = None;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::Color;

    fn session() -> Session {
        Session::new(&Config::default())
    }

    #[test]
    fn decodes_colored_output_into_the_screen() {
        let mut session = session();
        session.feed_bytes(b"\x1b[31mHello\x1b[0m World");

        let line = session.screen().visible_line(0).unwrap();
        assert_eq!(line.text().trim_end(), "Hello World");
        for cell in &line.cells[..5] {
            assert_eq!(cell.fg, Color::Red);
        }
        assert_eq!(line.cells[5].fg, Color::Default);
    }

    #[test]
    fn feed_is_resumable_across_chunks() {
        let mut split = session();
        split.feed_bytes(b"\x1b[3");
        split.feed_bytes(b"1mred");

        let mut whole = session();
        whole.feed_bytes(b"\x1b[31mred");

        assert_eq!(
            split.screen().visible_line(0).unwrap(),
            whole.screen().visible_line(0).unwrap()
        );
    }

    #[test]
    fn overflow_lines_land_in_history_in_order() {
        let config = Config {
            rows: 3,
            cols: 10,
            ..Config::default()
        };
        let mut session = Session::new(&config);
        session.feed_bytes(b"a\r\nb\r\nc\r\nd\r\ne");

        let screen = session.screen();
        assert_eq!(screen.history_len(), 2);
        assert_eq!(screen.line(0).unwrap().text().trim_end(), "a");
        assert_eq!(screen.line(1).unwrap().text().trim_end(), "b");
        assert_eq!(screen.visible_line(2).unwrap().text().trim_end(), "e");
    }

    #[test]
    #[cfg(unix)]
    fn end_to_end_echo_through_real_shell() {
        let config = Config {
            shell: Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "printf 'marker-42'".to_string(),
            ]),
            ..Config::default()
        };
        let mut session = Session::new(&config);
        session.start().unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        let mut seen = false;
        while std::time::Instant::now() < deadline {
            session.pump();
            let surface: String = (0..session.screen().total_lines())
                .filter_map(|i| session.screen().line(i).map(|r| r.text()))
                .collect();
            if surface.contains("marker-42") {
                seen = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        session.close();
        assert!(seen, "shell output never reached the screen");
    }

    #[test]
    #[cfg(unix)]
    fn write_after_shell_death_reports_a_diagnostic() {
        let config = Config {
            shell: Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "exit 0".to_string(),
            ]),
            ..Config::default()
        };
        let mut session = Session::new(&config);
        session.start().unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while session.is_running() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(!session.is_running(), "shell never exited");

        session.write_input(b"ls\r");

        let surface: String = (0..session.screen().total_lines())
            .filter_map(|i| session.screen().line(i).map(|r| r.text()))
            .collect();
        assert!(
            surface.contains("error writing to shell"),
            "diagnostic line missing from screen: {surface:?}"
        );
        assert!(!session.is_running());
    }

    #[test]
    fn write_without_start_is_a_no_op() {
        let mut session = session();
        session.write_input(b"ls\r");
        session.close();
        session.close();
    }
}
