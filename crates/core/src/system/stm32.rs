// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! STM32 MCU assembly and reset.
//!
//! [`McuBuilder::build`] reads the part's [`Capabilities`] and instantiates
//! exactly the peripherals it lists, wiring each one to the clock controller,
//! the interrupt controller and host serial backends as needed. The
//! resulting [`Stm32Mcu`] keeps a handle to every device it created so that
//! a system reset can be propagated in a fixed order.

use super::alias::FlashAlias;
use super::cortex_m::CortexMCore;
use super::factory::{self, BuildContext};
use super::registry::ResourceRegistry;
use crate::capabilities::{Capabilities, Family};
use crate::chardev::{HostSerial, SerialHost};
use crate::memory::{bitband, AddressSpace, ProgramImage};
use crate::object::{Container, Device, DeviceHandle, DeviceTree};
use crate::peripherals::{DeviceFactory, Stm32Peripherals};
use crate::ports::{GpioPort, Port, PortTable, SerialPort, GPIO_PORT_COUNT, SERIAL_PORT_COUNT};
use crate::snapshot::McuSnapshot;
use crate::{McuError, McuResult};
use std::sync::Arc;
use tracing::{debug, info};

pub use super::alias::FLASH_ALIAS_BASE;

pub const PERIPH_BASE: u64 = 0x4000_0000;
pub const MCU_CONTAINER: &str = "/machine/mcu/stm32";

#[derive(Debug)]
pub struct McuBuilder {
    capabilities: Option<Arc<Capabilities>>,
    hse_freq_hz: u32,
    lse_freq_hz: u32,
    serial_host: Box<dyn SerialHost>,
    devices: Box<dyn DeviceFactory>,
}

impl Default for McuBuilder {
    fn default() -> Self {
        Self {
            capabilities: None,
            hse_freq_hz: 0,
            lse_freq_hz: 0,
            serial_host: Box::new(HostSerial::default()),
            devices: Box::new(Stm32Peripherals),
        }
    }
}

impl McuBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capabilities(mut self, caps: Arc<Capabilities>) -> Self {
        self.capabilities = Some(caps);
        self
    }

    /// External high-speed crystal; 0 means none fitted.
    pub fn hse_freq_hz(mut self, freq: u32) -> Self {
        self.hse_freq_hz = freq;
        self
    }

    pub fn lse_freq_hz(mut self, freq: u32) -> Self {
        self.lse_freq_hz = freq;
        self
    }

    pub fn serial_host<H: SerialHost + 'static>(mut self, host: H) -> Self {
        self.serial_host = Box::new(host);
        self
    }

    pub fn device_factory<F: DeviceFactory + 'static>(mut self, devices: F) -> Self {
        self.devices = Box::new(devices);
        self
    }

    /// Assemble the MCU, mapping its memory into `sysmem`.
    ///
    /// Any error leaves a partially populated `sysmem` behind; callers are
    /// expected to discard it.
    pub fn build(self, sysmem: &mut AddressSpace) -> McuResult<Stm32Mcu> {
        let caps = self.capabilities.ok_or(McuError::MissingCapabilities)?;
        info!("STM32 Family: {}", caps.family);

        let mut tree = DeviceTree::new();
        let core = CortexMCore::new(&mut tree, &caps, self.devices.as_ref())?;
        let container = tree.container(MCU_CONTAINER);
        let alias = FlashAlias {
            flash_size_kb: caps.flash_size_kb,
        };
        core.create_memory_regions(sysmem, Some(&alias))?;

        if caps.has_periph_bitband {
            bitband::install(sysmem, "periph-bitband", PERIPH_BASE)?;
        }

        let mut ctx = BuildContext {
            tree: &mut tree,
            container: &container,
            capabilities: &caps,
            registry: ResourceRegistry::new(core.nvic()),
            devices: self.devices.as_ref(),
            serial_host: self.serial_host.as_ref(),
        };
        let rcc = factory::build_rcc(&mut ctx, self.hse_freq_hz, self.lse_freq_hz)?;
        ctx.registry.register_clock(rcc);

        let flash = factory::build_flash(&mut ctx)?;
        let pwr = if caps.has_pwr {
            Some(factory::build_pwr(&mut ctx)?)
        } else {
            None
        };

        let mut gpio = PortTable::default();
        for &port in GpioPort::ALL {
            if caps.has_gpio(port) {
                gpio.insert(port, factory::build_gpio(&mut ctx, port)?);
            }
        }

        let mut serial = PortTable::default();
        for &port in SerialPort::ALL {
            if caps.has_serial(port) {
                serial.insert(port, factory::build_serial(&mut ctx, port)?);
            }
        }

        debug!(
            "Assembled {}: {} GPIO ports, {} serial ports",
            caps.name,
            gpio.populated(),
            serial.populated()
        );

        Ok(Stm32Mcu {
            tree,
            container,
            capabilities: caps,
            core,
            rcc,
            flash,
            pwr,
            gpio,
            serial,
            hse_freq_hz: self.hse_freq_hz,
            lse_freq_hz: self.lse_freq_hz,
        })
    }
}

/// A fully wired STM32 MCU.
#[derive(Debug)]
pub struct Stm32Mcu {
    tree: DeviceTree,
    container: Container,
    capabilities: Arc<Capabilities>,
    core: CortexMCore,
    rcc: DeviceHandle,
    flash: DeviceHandle,
    pwr: Option<DeviceHandle>,
    gpio: PortTable<GpioPort, GPIO_PORT_COUNT>,
    serial: PortTable<SerialPort, SERIAL_PORT_COUNT>,
    hse_freq_hz: u32,
    lse_freq_hz: u32,
}

impl Stm32Mcu {
    pub fn builder() -> McuBuilder {
        McuBuilder::new()
    }

    pub fn tree(&self) -> &DeviceTree {
        &self.tree
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn capabilities(&self) -> &Arc<Capabilities> {
        &self.capabilities
    }

    pub fn family(&self) -> Family {
        self.capabilities.family
    }

    pub fn core(&self) -> &CortexMCore {
        &self.core
    }

    pub fn nvic(&self) -> DeviceHandle {
        self.core.nvic()
    }

    pub fn rcc(&self) -> DeviceHandle {
        self.rcc
    }

    pub fn flash(&self) -> DeviceHandle {
        self.flash
    }

    pub fn pwr(&self) -> Option<DeviceHandle> {
        self.pwr
    }

    pub fn gpio(&self, port: GpioPort) -> Option<DeviceHandle> {
        self.gpio.get(port)
    }

    pub fn gpio_ports(&self) -> &PortTable<GpioPort, GPIO_PORT_COUNT> {
        &self.gpio
    }

    pub fn serial(&self, port: SerialPort) -> Option<DeviceHandle> {
        self.serial.get(port)
    }

    pub fn serial_ports(&self) -> &PortTable<SerialPort, SERIAL_PORT_COUNT> {
        &self.serial
    }

    pub fn hse_freq_hz(&self) -> u32 {
        self.hse_freq_hz
    }

    pub fn lse_freq_hz(&self) -> u32 {
        self.lse_freq_hz
    }

    pub fn device(&self, handle: DeviceHandle) -> &dyn Device {
        self.tree.device(handle)
    }

    pub fn device_mut(&mut self, handle: DeviceHandle) -> &mut dyn Device {
        self.tree.device_mut(handle)
    }

    pub fn downcast_ref<T: 'static>(&self, handle: DeviceHandle) -> Option<&T> {
        self.tree.downcast_ref(handle)
    }

    pub fn downcast_mut<T: 'static>(&mut self, handle: DeviceHandle) -> Option<&mut T> {
        self.tree.downcast_mut(handle)
    }

    /// Devices touched by [`Stm32Mcu::reset`], in the order it resets them.
    ///
    /// PWR is not included.
    pub fn reset_sequence(&self) -> Vec<DeviceHandle> {
        let mut seq = vec![self.core.nvic(), self.rcc, self.flash];
        seq.extend(self.gpio.handles());
        seq.extend(self.serial.handles());
        seq
    }

    /// System reset: core first, then clock, flash, GPIO A..G and serial
    /// ports 1..6.
    pub fn reset(&mut self) {
        debug!("Resetting {}", self.capabilities.name);
        self.core.reset(&mut self.tree);
        for handle in self.reset_sequence().into_iter().skip(1) {
            self.tree.reset(handle);
        }
    }

    /// Program `image` into memory the way a flash programmer would, then
    /// reset.
    pub fn load_firmware(
        &mut self,
        sysmem: &mut AddressSpace,
        image: &ProgramImage,
    ) -> McuResult<()> {
        for segment in &image.segments {
            if !sysmem.load_segment(segment) {
                return Err(McuError::FirmwareOutOfRange {
                    addr: segment.start_addr,
                    len: segment.data.len(),
                });
            }
            info!(
                "Loaded {} bytes at {:#010x}",
                segment.data.len(),
                segment.start_addr
            );
        }
        self.reset();
        Ok(())
    }

    pub fn snapshot(&self, sysmem: &AddressSpace) -> McuSnapshot {
        McuSnapshot {
            part: self.capabilities.name.clone(),
            family: self.capabilities.family,
            hse_freq_hz: self.hse_freq_hz,
            lse_freq_hz: self.lse_freq_hz,
            devices: self
                .tree
                .iter()
                .map(|(_, path, dev)| (path.to_string(), dev.snapshot()))
                .collect(),
            memory_map: sysmem.mappings(),
        }
    }
}
