// SPDX-License-Identifier: GPL-2.0 OR MIT

//! Captured log output for tests.

use std::io;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

/// Shared buffer that a test subscriber writes formatted events into.
#[derive(Clone, Default)]
pub(crate) struct LogBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    pub(crate) fn contents(&self) -> String {
        let bytes = self.bytes.lock().expect("log buffer lock poisoned");
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .expect("log buffer lock poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'writer> MakeWriter<'writer> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'writer self) -> Self::Writer {
        self.clone()
    }
}

/// Runs `f` with a plain text subscriber, and returns its result and logs.
pub(crate) fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(buffer.clone())
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);

    (result, buffer.contents())
}
