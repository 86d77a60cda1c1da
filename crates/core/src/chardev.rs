// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Host character backends for serial ports.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub trait CharBackend: fmt::Debug + Send {
    fn label(&self) -> &str;

    fn kind(&self) -> &'static str;

    fn write(&mut self, data: &[u8]) -> io::Result<usize>;
}

pub type CharBackendRef = Arc<Mutex<dyn CharBackend>>;

pub fn shared<B: CharBackend + 'static>(backend: B) -> CharBackendRef {
    Arc::new(Mutex::new(backend))
}

/// Swallows everything written to it.
#[derive(Debug)]
pub struct NullBackend {
    label: String,
}

impl NullBackend {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
        }
    }
}

impl CharBackend for NullBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> &'static str {
        "null"
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        Ok(data.len())
    }
}

/// Collects output in memory; the buffer can be shared with the host.
#[derive(Debug)]
pub struct BufferBackend {
    label: String,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl BufferBackend {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn buffer(&self) -> Arc<Mutex<Vec<u8>>> {
        self.buffer.clone()
    }
}

impl CharBackend for BufferBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> &'static str {
        "buffer"
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if let Ok(mut guard) = self.buffer.lock() {
            guard.extend_from_slice(data);
        }
        Ok(data.len())
    }
}

#[derive(Debug)]
pub struct StdoutBackend {
    label: String,
}

impl StdoutBackend {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
        }
    }
}

impl CharBackend for StdoutBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> &'static str {
        "stdout"
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut out = io::stdout().lock();
        out.write_all(data)?;
        out.flush()?;
        Ok(data.len())
    }
}

#[derive(Debug)]
pub struct FileBackend {
    label: String,
    file: File,
}

impl FileBackend {
    pub fn create<P: AsRef<Path>>(label: &str, path: P) -> io::Result<Self> {
        Ok(Self {
            label: label.to_string(),
            file: File::create(path)?,
        })
    }
}

impl CharBackend for FileBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> &'static str {
        "file"
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.file.write_all(data)?;
        Ok(data.len())
    }
}

/// The host side of serial port wiring.
pub trait SerialHost: fmt::Debug {
    /// Number of serial backends the host can hand out; indices at or above
    /// it cannot be wired.
    fn max_serial_ports(&self) -> usize;

    /// The backend configured for `index`, if any.
    fn serial_backend(&self, index: usize) -> Option<CharBackendRef>;

    fn new_null_backend(&self, label: &str) -> io::Result<CharBackendRef>;
}

pub const DEFAULT_MAX_SERIAL_PORTS: usize = 6;

#[derive(Debug)]
pub struct HostSerial {
    backends: Vec<Option<CharBackendRef>>,
}

impl Default for HostSerial {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SERIAL_PORTS)
    }
}

impl HostSerial {
    pub fn new(max_ports: usize) -> Self {
        Self {
            backends: vec![None; max_ports],
        }
    }

    /// Returns false when `index` is beyond what this host supports.
    pub fn set_backend(&mut self, index: usize, backend: CharBackendRef) -> bool {
        match self.backends.get_mut(index) {
            Some(slot) => {
                *slot = Some(backend);
                true
            }
            None => false,
        }
    }
}

impl SerialHost for HostSerial {
    fn max_serial_ports(&self) -> usize {
        self.backends.len()
    }

    fn serial_backend(&self, index: usize) -> Option<CharBackendRef> {
        self.backends.get(index).cloned().flatten()
    }

    fn new_null_backend(&self, label: &str) -> io::Result<CharBackendRef> {
        Ok(shared(NullBackend::new(label)))
    }
}
