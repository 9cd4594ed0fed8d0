use std::collections::VecDeque;
use std::io::{self, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use crossterm::tty::IsTty;

/// Byte-level console access for the executor and trap routines.
///
/// This is the only seam through which the runtime performs I/O, so a run can
/// be driven against the real terminal ([`StdConsole`]) or against in-memory
/// queues ([`PipeConsole`]).
pub trait Console {
    /// Non-blocking check for pending input.
    fn poll_input(&mut self) -> io::Result<bool>;
    /// Read one byte, waiting for it if necessary.
    fn read_byte(&mut self) -> io::Result<u8>;
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Whether the terminal is currently in raw mode.
///
/// Must only be mutated by [`RawModeGuard::enable`] and [`restore`].
static RAW_MODE: AtomicBool = AtomicBool::new(false);

/// Scoped raw-mode handle for the controlling terminal.
///
/// Raw mode is entered only when stdin is a tty; piped input needs no terminal
/// reconfiguration. Restoration runs on drop, so it covers normal returns,
/// fatal errors, and panics alike.
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn enable() -> io::Result<RawModeGuard> {
        if io::stdin().is_tty() {
            terminal::enable_raw_mode()?;
            RAW_MODE.store(true, Ordering::SeqCst);
        }
        Ok(RawModeGuard(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        restore();
    }
}

/// Reapply the terminal attributes saved by [`RawModeGuard::enable`].
///
/// Idempotent, so the Ctrl+C path may call it directly and the guard's drop
/// cannot double-restore afterwards. A failing terminal syscall is reported
/// rather than allowed to mask whatever error caused the shutdown.
pub fn restore() {
    if RAW_MODE.swap(false, Ordering::SeqCst) {
        if let Err(err) = terminal::disable_raw_mode() {
            eprintln!("failed to restore terminal mode: {err}");
        }
    }
}

/// Console backed by the real standard streams.
///
/// With a tty on stdin, input is decoded from key events while the terminal is
/// in raw mode. With anything else on stdin, a reader thread pumps bytes
/// through a channel so redirected and piped programs work and polling stays
/// non-blocking either way.
pub struct StdConsole {
    input: Input,
}

enum Input {
    /// Key events decoded while the terminal is in raw mode.
    Terminal { pending: Option<u8> },
    /// Bytes pumped from a redirected stdin by a reader thread.
    Piped(ByteFeed),
}

impl StdConsole {
    pub fn new() -> StdConsole {
        let input = if io::stdin().is_tty() {
            Input::Terminal { pending: None }
        } else {
            Input::Piped(ByteFeed::spawn(io::stdin()))
        };
        StdConsole { input }
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for StdConsole {
    fn poll_input(&mut self) -> io::Result<bool> {
        match &mut self.input {
            Input::Terminal { pending } => {
                if pending.is_some() {
                    return Ok(true);
                }
                // Drain non-key events so a stray resize cannot read as a keystroke.
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        if let Some(byte) = key_to_byte(key) {
                            *pending = Some(byte);
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
            Input::Piped(feed) => Ok(feed.poll()),
        }
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        match &mut self.input {
            Input::Terminal { pending } => {
                if let Some(byte) = pending.take() {
                    return Ok(byte);
                }
                loop {
                    if let Event::Key(key) = event::read()? {
                        if let Some(byte) = key_to_byte(key) {
                            return Ok(byte);
                        }
                    }
                }
            }
            Input::Piped(feed) => feed.next_byte(),
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        io::stdout().lock().write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

/// Bytes pumped off a blocking reader by a background thread.
///
/// A pipe or file cannot be checked for readiness without waiting on it, so
/// the blocking read happens on the spawned thread and the VM-facing side only
/// ever looks at the channel. [`ByteFeed::poll`] therefore returns immediately
/// whether or not a byte has arrived yet.
struct ByteFeed {
    data: mpsc::Receiver<u8>,
    /// The thread reading the underlying stream. Exits at end of input.
    #[allow(unused)]
    handle: JoinHandle<()>,
    pending: Option<u8>,
}

impl ByteFeed {
    fn spawn(mut reader: impl io::Read + Send + 'static) -> ByteFeed {
        // Bounded so the thread stays at most a couple of bytes ahead of the
        // machine instead of slurping the whole stream.
        let (send, recv) = mpsc::sync_channel(1);
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 1];
            loop {
                match reader.read(&mut buf) {
                    // EOF or a dead stream closes the channel
                    Ok(0) | Err(_) => return,
                    Ok(_) => {
                        if send.send(buf[0]).is_err() {
                            return;
                        }
                    }
                }
            }
        });
        ByteFeed {
            data: recv,
            handle,
            pending: None,
        }
    }

    /// Non-blocking: true iff a byte has already arrived. End of input reads
    /// as no input.
    fn poll(&mut self) -> bool {
        if self.pending.is_some() {
            return true;
        }
        match self.data.try_recv() {
            Ok(byte) => {
                self.pending = Some(byte);
                true
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => false,
        }
    }

    /// Blocking: wait for the next byte.
    fn next_byte(&mut self) -> io::Result<u8> {
        if let Some(byte) = self.pending.take() {
            return Ok(byte);
        }
        self.data.recv().map_err(|_| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of input while the program was waiting for a character",
            )
        })
    }
}

/// Decode a key event into the byte the machine should see.
///
/// Key releases and keys with no byte representation are ignored. Ctrl+C is
/// the user break: restore the terminal and exit with the conventional
/// SIGINT-derived code.
fn key_to_byte(key: KeyEvent) -> Option<u8> {
    if matches!(key.kind, KeyEventKind::Release) {
        return None;
    }

    let byte = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            restore();
            println!();
            std::process::exit(130);
        }
        // Ctrl+D produces an end-of-transmission byte
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => 0x04,

        KeyCode::Enter => b'\n',
        KeyCode::Tab => b'\t',
        KeyCode::Backspace => 0x08,
        KeyCode::Esc => 0x1b,

        KeyCode::Char(ch)
            if ch.is_ascii() && !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            ch as u8
        }

        _ => return None,
    };

    Some(byte)
}

/// Console backed by in-memory queues, for driving a machine from tests.
///
/// Hold the console in an [`Arc`]: one handle goes to the machine, the other
/// stays with the test to feed input and collect output.
#[derive(Default)]
pub struct PipeConsole {
    input: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
}

impl PipeConsole {
    pub fn feed_input(&self, bytes: &[u8]) {
        self.input.lock().unwrap().extend(bytes);
    }

    pub fn remaining_input(&self) -> usize {
        self.input.lock().unwrap().len()
    }

    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.output.lock().unwrap())
    }
}

impl Console for Arc<PipeConsole> {
    fn poll_input(&mut self) -> io::Result<bool> {
        Ok(!self.input.lock().unwrap().is_empty())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.input.lock().unwrap().pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "scripted input exhausted")
        })
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
