//! Output capture for a single run
//!
//! A [`Console`] is the stdout of one logical run. It passes writes through to
//! the process stdout until something redirects it, in which case writes land
//! in an in-memory buffer. Redirection is scoped: the [`Redirect`] guard puts
//! the previous target back when it is finished or dropped, so a failing or
//! cancelled action cannot leave the console redirected.

use std::future::Future;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

/// Destination for a run's standard output
#[derive(Clone, Default)]
pub struct Console {
    inner: Arc<Mutex<ConsoleState>>,
}

#[derive(Default)]
struct ConsoleState {
    /// Active redirects, innermost last. Empty means process stdout.
    targets: Vec<Sink>,
    next_id: u64,
}

#[derive(Clone)]
struct Sink {
    id: u64,
    buffer: Arc<Mutex<Vec<u8>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Console {
    /// A console that writes to process stdout
    pub fn new() -> Self {
        Self::default()
    }

    /// Write raw bytes to the current target
    pub fn write(&self, bytes: &[u8]) {
        let state = lock(&self.inner);
        match state.targets.last() {
            Some(sink) => lock(&sink.buffer).extend_from_slice(bytes),
            None => {
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = stdout.write_all(bytes).and_then(|_| stdout.flush()) {
                    tracing::debug!(error = %e, "Failed to write to stdout");
                }
            }
        }
    }

    /// Write one line to the current target
    pub fn write_line(&self, line: &str) {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.write(&bytes);
    }

    /// Whether writes currently go to a buffer
    pub fn is_capturing(&self) -> bool {
        !lock(&self.inner).targets.is_empty()
    }

    /// Redirect this console into a fresh buffer until the guard is released
    pub fn redirect(&self) -> Redirect {
        let mut state = lock(&self.inner);
        let depth = state.targets.len();
        let sink = Sink {
            id: state.next_id,
            buffer: Arc::new(Mutex::new(Vec::new())),
        };
        state.next_id += 1;
        state.targets.push(sink.clone());

        Redirect {
            console: self.clone(),
            depth,
            sink,
            released: false,
        }
    }

    fn restore(&self, depth: usize) {
        lock(&self.inner).targets.truncate(depth);
    }
}

/// Scoped redirection of a [`Console`]
pub struct Redirect {
    console: Console,
    depth: usize,
    sink: Sink,
    released: bool,
}

impl Redirect {
    /// Restore the previous target and return the captured text
    ///
    /// Returns `None` if something else redirected the console in the
    /// meantime and never put it back; the console is restored regardless.
    pub fn finish(mut self) -> Option<String> {
        self.released = true;

        let still_active = lock(&self.console.inner)
            .targets
            .last()
            .is_some_and(|top| top.id == self.sink.id);
        self.console.restore(self.depth);

        if !still_active {
            return None;
        }

        let bytes = std::mem::take(&mut *lock(&self.sink.buffer));
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Drop for Redirect {
    fn drop(&mut self) {
        if !self.released {
            self.console.restore(self.depth);
        }
    }
}

/// Run `action` with `console` redirected to a buffer and return what it wrote
///
/// The console is restored on every exit path. If the action replaced the
/// redirect with one of its own, the captured text is empty and a warning is
/// logged.
pub async fn capture_output<F, Fut, T>(console: &Console, action: F) -> (T, String)
where
    F: FnOnce(Console) -> Fut,
    Fut: Future<Output = T>,
{
    tracing::debug!("Starting stdout capture");
    let redirect = console.redirect();

    let result = action(console.clone()).await;

    let captured = match redirect.finish() {
        Some(text) => text,
        None => {
            tracing::warn!("Output was redirected during capture; captured output discarded");
            String::new()
        }
    };
    tracing::debug!(bytes = captured.len(), "Ended stdout capture");

    (result, captured)
}
