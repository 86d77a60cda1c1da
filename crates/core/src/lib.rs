// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod capabilities;
pub mod chardev;
pub mod memory;
pub mod object;
pub mod peripherals;
pub mod ports;
pub mod snapshot;
pub mod system;

mod tests;

pub use capabilities::{Capabilities, Family, GpioPorts, SerialPorts};
pub use object::{Device, DeviceError, DeviceHandle, DeviceTree, PropertyValue};
pub use ports::{GpioPort, SerialPort};
pub use system::stm32::{McuBuilder, Stm32Mcu};

/// Errors raised by bus-style accesses to memory or device registers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Write to read-only memory at {0:#x}")]
    ReadOnlyViolation(u64),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Errors that abort the assembly of an MCU.
///
/// None of these are recoverable: they describe a configuration mistake made
/// before emulation starts, and callers are expected to stop there.
#[derive(Debug, thiserror::Error)]
pub enum McuError {
    #[error("MCU capabilities were not supplied")]
    MissingCapabilities,
    #[error("Cannot assign serial backend to {port}: {reason}")]
    SerialBackendUnavailable { port: SerialPort, reason: String },
    #[error("Firmware segment of {len} bytes at {addr:#x} does not fit in memory")]
    FirmwareOutOfRange { addr: u64, len: usize },
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Memory(#[from] memory::MemoryError),
}

pub type McuResult<T> = Result<T, McuError>;
