/*
 * Ring-Buffer Logger
 *
 * The scheduler logs from inside the dispatch lock with interrupts masked,
 * where it cannot wait on a serial port. Records are formatted into a fixed
 * in-memory ring instead and drained later by whoever owns the console.
 *
 * Design:
 * - Fixed-size circular buffer (8KB), no heap allocations
 * - Overwrite on overflow (loses the oldest bytes)
 * - One spinlock, taken with interrupts masked so an interrupt handler
 *   that logs cannot deadlock against the code it interrupted
 */

use core::fmt;

use log::{LevelFilter, Metadata, Record, SetLoggerError};
use spin::Mutex;

use crate::arch;

/// Size of the ring buffer
const BUFFER_SIZE: usize = 8 * 1024;

/// Circular byte buffer for log text
pub struct RingBuffer {
    buffer: [u8; BUFFER_SIZE],

    /// Write position
    head: usize,

    /// Bytes currently held
    len: usize,
}

impl RingBuffer {
    /// Create a new empty ring buffer
    pub const fn new() -> Self {
        Self {
            buffer: [0; BUFFER_SIZE],
            head: 0,
            len: 0,
        }
    }

    /// Append `data`, overwriting the oldest bytes if the buffer is full
    ///
    /// # Returns
    /// Number of bytes written
    pub fn write(&mut self, data: &str) -> usize {
        let bytes = data.as_bytes();
        // Only the tail of an oversized write can survive anyway
        let bytes = &bytes[bytes.len().saturating_sub(BUFFER_SIZE)..];

        for &byte in bytes {
            self.buffer[self.head] = byte;
            self.head = (self.head + 1) % BUFFER_SIZE;
        }
        self.len = (self.len + bytes.len()).min(BUFFER_SIZE);
        bytes.len()
    }

    /// Move the oldest bytes into `dest`
    ///
    /// # Returns
    /// Number of bytes read
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        let count = self.len.min(dest.len());
        let tail = (self.head + BUFFER_SIZE - self.len) % BUFFER_SIZE;

        for (i, slot) in dest[..count].iter_mut().enumerate() {
            *slot = self.buffer[(tail + i) % BUFFER_SIZE];
        }
        self.len -= count;
        count
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the number of bytes currently in the buffer
    pub fn len(&self) -> usize {
        self.len
    }

    pub const fn capacity(&self) -> usize {
        BUFFER_SIZE
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for RingBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s);
        Ok(())
    }
}

/// `log` backend that records into a RingBuffer
pub struct RingLogger {
    buffer: Mutex<RingBuffer>,
}

impl RingLogger {
    pub const fn new() -> Self {
        Self {
            buffer: Mutex::new(RingBuffer::new()),
        }
    }

    /// Copy out and discard buffered log text
    pub fn drain(&self, dest: &mut [u8]) -> usize {
        arch::without_interrupts(|| self.buffer.lock().read(dest))
    }

    pub fn pending(&self) -> usize {
        arch::without_interrupts(|| self.buffer.lock().len())
    }
}

impl Default for RingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            arch::without_interrupts(|| {
                let mut buffer = self.buffer.lock();
                // RingBuffer never fails a write
                let _ = fmt::Write::write_fmt(
                    &mut *buffer,
                    format_args!("[{}] {}\n", record.level(), record.args()),
                );
            });
        }
    }

    fn flush(&self) {}
}

/// The logger instance installed by `init`
pub static LOGGER: RingLogger = RingLogger::new();

/// Install the ring logger as the global `log` backend
///
/// Fails if another logger is already installed.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
