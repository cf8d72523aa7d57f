//! Shell session over a pseudo-terminal
//!
//! Owns exactly one child shell process attached to a pty pair. The child
//! believes it is talking to a real terminal, so its line editing, job
//! control, and prompt behavior stay intact, and the parent sees one
//! interleaved byte stream carrying both stdout and stderr.
//!
//! Output is delivered over an explicit mpsc channel from a dedicated
//! reader thread; the consumer drains it from its own execution context.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Grace period for the child to exit after SIGTERM before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_millis(200);
/// Bounded wait for the reader thread to observe shutdown and exit.
const READER_JOIN_WAIT: Duration = Duration::from_millis(500);
/// Reader poll interval; shutdown is observed within one interval.
const POLL_INTERVAL_MS: u16 = 100;
/// Upper bound on a single read from the pty.
const READ_BUFFER_SIZE: usize = 4096;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("failed to spawn shell: {0}")]
    Spawn(#[source] anyhow::Error),

    #[error("failed to write to pty: {0}")]
    Write(#[source] io::Error),

    #[error("failed to resize pty: {0}")]
    Resize(#[source] anyhow::Error),

    #[error("session is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, PtyError>;

/// Events delivered from the reader thread to the consumer.
#[derive(Debug)]
pub enum SessionEvent {
    /// A chunk of raw shell output. Boundaries are arbitrary: a chunk may
    /// split a multi-byte character or a mid-sequence escape code.
    Output(Vec<u8>),
    /// The reader loop has stopped (shell exited or pty closed).
    Exited,
}

/// A child shell process behind a pty.
///
/// Terminal, non-reusable: once closed, a session cannot be restarted.
pub struct ShellSession {
    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    child: Mutex<Option<Box<dyn Child + Send + Sync>>>,
    running: Arc<AtomicBool>,
    reader_thread: Mutex<Option<JoinHandle<()>>>,
}

impl ShellSession {
    /// Allocate a pty pair, spawn the shell on its secondary side, and start
    /// the reader thread. Output chunks arrive on `event_tx` in read order.
    pub fn spawn(
        command: &[String],
        rows: u16,
        cols: u16,
        event_tx: Sender<SessionEvent>,
    ) -> Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(PtyError::Spawn)?;

        let (program, args) = command
            .split_first()
            .ok_or_else(|| PtyError::Spawn(anyhow::anyhow!("empty shell command")))?;
        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        cmd.env("TERM", "xterm");
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        info!("spawning shell: {:?}", command);
        let child = pair.slave.spawn_command(cmd).map_err(PtyError::Spawn)?;
        // The child owns the secondary side now; drop the parent's copy.
        drop(pair.slave);

        let writer = pair.master.take_writer().map_err(PtyError::Spawn)?;
        let reader = pair.master.try_clone_reader().map_err(PtyError::Spawn)?;
        #[cfg(unix)]
        let raw_fd = pair.master.as_raw_fd();

        let running = Arc::new(AtomicBool::new(true));
        let reader_thread = {
            let running = Arc::clone(&running);
            thread::spawn(move || {
                #[cfg(unix)]
                read_loop(reader, raw_fd, &running, &event_tx);
                #[cfg(not(unix))]
                read_loop(reader, &running, &event_tx);
                running.store(false, Ordering::SeqCst);
                let _ = event_tx.send(SessionEvent::Exited);
            })
        };

        Ok(Self {
            master: Mutex::new(Some(pair.master)),
            writer: Mutex::new(Some(writer)),
            child: Mutex::new(Some(child)),
            running,
            reader_thread: Mutex::new(Some(reader_thread)),
        })
    }

    /// Whether the reader loop is still delivering output.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Forward raw bytes to the primary descriptor. No buffering beyond the
    /// OS pipe.
    ///
    /// Errors with [`PtyError::Closed`] once the reader loop has stopped: a
    /// write to the primary can still succeed after the shell exits, with
    /// the bytes going nowhere, so the running flag is the liveness signal.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        if !self.is_running() {
            return Err(PtyError::Closed);
        }
        let mut guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let writer = guard.as_mut().ok_or(PtyError::Closed)?;
        writer.write_all(data).map_err(PtyError::Write)?;
        writer.flush().map_err(PtyError::Write)
    }

    /// Inform the OS pty of a new window size. Pairs with the caller
    /// resizing its screen buffer; the two are not atomic with each other.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        let guard = self.master.lock().unwrap_or_else(|e| e.into_inner());
        let master = guard.as_ref().ok_or(PtyError::Closed)?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(PtyError::Resize)
    }

    /// Terminate the session. Idempotent and safe to call from any thread:
    /// flips the running flag, gives the child a short grace period after
    /// SIGTERM, force-kills on timeout, joins the reader with a bounded
    /// wait, and closes the primary descriptor.
    pub fn close(&self) {
        self.running.store(false, Ordering::SeqCst);

        let child = self
            .child
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut child) = child {
            terminate_child(child.as_mut());
        }

        // Dropping the writer closes our write half.
        drop(
            self.writer
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take(),
        );

        let handle = self
            .reader_thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let deadline = Instant::now() + READER_JOIN_WAIT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                // Detach rather than hang; the loop exits within one poll
                // interval of the flag flip.
                warn!("reader thread did not stop within the join window");
            }
        }

        drop(
            self.master
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take(),
        );
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// SIGTERM first, then SIGKILL once the grace period elapses.
fn terminate_child(child: &mut dyn Child) {
    #[cfg(unix)]
    if let Some(pid) = child.process_id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }

    let deadline = Instant::now() + TERMINATE_GRACE;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("shell exited with {:?}", status);
                return;
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(_) => return,
        }
    }

    warn!("shell did not exit within the grace period, killing");
    let _ = child.kill();
    let _ = child.wait();
}

/// Reader loop: poll the primary descriptor with a short timeout so the
/// running flag is re-checked without spinning; read on data; stop on EOF or
/// I/O error (the usual sign the shell exited) without treating either as
/// fatal. This thread is the only reader of the primary descriptor.
#[cfg(unix)]
fn read_loop(
    mut reader: Box<dyn Read + Send>,
    raw_fd: Option<std::os::unix::io::RawFd>,
    running: &AtomicBool,
    event_tx: &Sender<SessionEvent>,
) {
    use nix::errno::Errno;
    use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
    use std::os::fd::BorrowedFd;

    let Some(fd) = raw_fd else {
        // No pollable descriptor; fall back to blocking reads. close()
        // unblocks them by reaping the child.
        blocking_read_loop(reader, running, event_tx);
        return;
    };

    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    while running.load(Ordering::SeqCst) {
        // The fd stays open for the thread's lifetime: close() joins us
        // before dropping the master.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(POLL_INTERVAL_MS)) {
            Ok(0) => continue,
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(e) => {
                debug!("pty poll failed: {e}");
                break;
            }
        }

        match reader.read(&mut buffer) {
            Ok(0) => {
                debug!("pty EOF");
                break;
            }
            Ok(n) => {
                if event_tx.send(SessionEvent::Output(buffer[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                // EIO when the secondary side closes; normal termination.
                debug!("pty read stopped: {e}");
                break;
            }
        }
    }
}

#[cfg(not(unix))]
fn read_loop(reader: Box<dyn Read + Send>, running: &AtomicBool, event_tx: &Sender<SessionEvent>) {
    blocking_read_loop(reader, running, event_tx);
}

fn blocking_read_loop(
    mut reader: Box<dyn Read + Send>,
    running: &AtomicBool,
    event_tx: &Sender<SessionEvent>,
) {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    while running.load(Ordering::SeqCst) {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                if event_tx.send(SessionEvent::Output(buffer[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn init_tracing() {
        static INIT: std::sync::Once = std::sync::Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init();
        });
    }

    fn shell_cmd(script: &str) -> Vec<String> {
        vec!["/bin/sh".into(), "-c".into(), script.into()]
    }

    fn collect_output(rx: &mpsc::Receiver<SessionEvent>, deadline: Duration) -> Vec<u8> {
        let mut out = Vec::new();
        let end = Instant::now() + deadline;
        while Instant::now() < end {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(SessionEvent::Output(chunk)) => out.extend(chunk),
                Ok(SessionEvent::Exited) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        out
    }

    #[test]
    #[cfg(unix)]
    fn spawn_captures_output_and_reports_exit() {
        init_tracing();
        let (tx, rx) = mpsc::channel();
        let session = ShellSession::spawn(&shell_cmd("echo hello"), 24, 80, tx).unwrap();

        let output = collect_output(&rx, Duration::from_secs(5));
        assert!(
            String::from_utf8_lossy(&output).contains("hello"),
            "missing echo output: {output:?}"
        );
        session.close();
        assert!(!session.is_running());
    }

    #[test]
    #[cfg(unix)]
    fn spawn_failure_is_reported() {
        init_tracing();
        let (tx, _rx) = mpsc::channel();
        let result = ShellSession::spawn(
            &vec!["/nonexistent/shell-binary".to_string()],
            24,
            80,
            tx,
        );
        assert!(result.is_err());
    }

    #[test]
    #[cfg(unix)]
    fn close_is_idempotent_and_stops_the_reader() {
        init_tracing();
        let (tx, rx) = mpsc::channel();
        let session = ShellSession::spawn(&shell_cmd("sleep 30"), 24, 80, tx).unwrap();

        session.close();
        session.close();
        assert!(!session.is_running());

        // Reader announced termination.
        let end = Instant::now() + Duration::from_secs(2);
        let mut exited = false;
        while Instant::now() < end {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(SessionEvent::Exited) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                    exited = true;
                    break;
                }
                _ => {}
            }
        }
        assert!(exited);

        // Write after close reports an error instead of blocking.
        assert!(matches!(session.write(b"x"), Err(PtyError::Closed)));
    }

    #[test]
    #[cfg(unix)]
    fn eof_stops_the_loop_and_write_fails() {
        init_tracing();
        let (tx, rx) = mpsc::channel();
        let session = ShellSession::spawn(&shell_cmd("exit 0"), 24, 80, tx).unwrap();

        let end = Instant::now() + Duration::from_secs(5);
        while session.is_running() && Instant::now() < end {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!session.is_running());
        drop(rx);

        // The descriptor may still accept bytes; the error must come from
        // the liveness check, before close() ever runs.
        assert!(matches!(session.write(b"x"), Err(PtyError::Closed)));
        session.close();
    }

    #[test]
    #[cfg(unix)]
    fn close_from_two_threads_is_safe() {
        init_tracing();
        let (tx, _rx) = mpsc::channel();
        let session = ShellSession::spawn(&shell_cmd("sleep 30"), 24, 80, tx).unwrap();

        thread::scope(|s| {
            s.spawn(|| session.close());
            session.close();
        });

        assert!(!session.is_running());
        assert!(matches!(session.write(b"x"), Err(PtyError::Closed)));
    }
}
