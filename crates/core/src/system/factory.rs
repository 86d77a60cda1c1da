// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! One builder per peripheral category.
//!
//! Every builder creates its child under the MCU container, sets its
//! properties and realizes it before returning.

use super::registry::ResourceRegistry;
use crate::capabilities::Capabilities;
use crate::chardev::SerialHost;
use crate::object::{Container, DeviceError, DeviceHandle, DeviceTree, PropertyValue};
use crate::peripherals::{props, DeviceFactory, DeviceType};
use crate::ports::{GpioPort, Port, SerialPort};
use crate::{McuError, McuResult};
use std::sync::Arc;
use tracing::warn;

pub struct BuildContext<'a> {
    pub tree: &'a mut DeviceTree,
    pub container: &'a Container,
    pub capabilities: &'a Arc<Capabilities>,
    pub registry: ResourceRegistry,
    pub devices: &'a dyn DeviceFactory,
    pub serial_host: &'a dyn SerialHost,
}

impl BuildContext<'_> {
    fn create(&mut self, name: &str, ty: DeviceType) -> McuResult<DeviceHandle> {
        let dev = self.devices.create(ty);
        Ok(self.tree.create(self.container, name, dev)?)
    }

    fn set(&mut self, handle: DeviceHandle, name: &str, value: PropertyValue) -> McuResult<()> {
        Ok(self.tree.set_property(handle, name, value)?)
    }

    fn set_capabilities(&mut self, handle: DeviceHandle) -> McuResult<()> {
        let caps = PropertyValue::Capabilities(self.capabilities.clone());
        self.set(handle, props::CAPABILITIES, caps)
    }

    fn clock(&self) -> McuResult<DeviceHandle> {
        self.registry
            .clock()
            .ok_or(McuError::Device(DeviceError::MissingProperty(props::RCC)))
    }

    fn realize(&mut self, handle: DeviceHandle) -> McuResult<DeviceHandle> {
        self.tree.realize(handle)?;
        Ok(handle)
    }
}

/// Internal oscillators come from the part, external crystals from the board.
pub fn build_rcc(
    ctx: &mut BuildContext<'_>,
    hse_freq_hz: u32,
    lse_freq_hz: u32,
) -> McuResult<DeviceHandle> {
    let rcc = ctx.create("rcc", DeviceType::Rcc)?;
    ctx.set_capabilities(rcc)?;
    let hsi = ctx.capabilities.hsi_freq_hz;
    let lsi = ctx.capabilities.lsi_freq_hz;
    ctx.set(rcc, props::HSI_FREQ_HZ, PropertyValue::Int(hsi.into()))?;
    ctx.set(rcc, props::LSI_FREQ_HZ, PropertyValue::Int(lsi.into()))?;
    ctx.set(rcc, props::HSE_FREQ_HZ, PropertyValue::Int(hse_freq_hz.into()))?;
    ctx.set(rcc, props::LSE_FREQ_HZ, PropertyValue::Int(lse_freq_hz.into()))?;
    ctx.realize(rcc)
}

pub fn build_flash(ctx: &mut BuildContext<'_>) -> McuResult<DeviceHandle> {
    let flash = ctx.create("flash", DeviceType::Flash)?;
    ctx.set_capabilities(flash)?;
    ctx.realize(flash)
}

pub fn build_pwr(ctx: &mut BuildContext<'_>) -> McuResult<DeviceHandle> {
    let pwr = ctx.create("pwr", DeviceType::Pwr)?;
    ctx.set_capabilities(pwr)?;
    ctx.realize(pwr)
}

pub fn build_gpio(ctx: &mut BuildContext<'_>, port: GpioPort) -> McuResult<DeviceHandle> {
    let rcc = ctx.clock()?;
    let gpio = ctx.create(&port.child_name(), DeviceType::Gpio)?;
    ctx.set(gpio, props::PORT_INDEX, PropertyValue::Int(port.index() as u64))?;
    ctx.set_capabilities(gpio)?;
    ctx.set(gpio, props::RCC, PropertyValue::Link(rcc))?;
    ctx.realize(gpio)
}

/// Wires the port to the host backend for its index, or to a fresh null
/// backend when the host has none configured.
pub fn build_serial(ctx: &mut BuildContext<'_>, port: SerialPort) -> McuResult<DeviceHandle> {
    let index = port.index();
    let max = ctx.serial_host.max_serial_ports();
    if index >= max {
        return Err(McuError::SerialBackendUnavailable {
            port,
            reason: format!("host supports only {} serial ports", max),
        });
    }
    let chardev = match ctx.serial_host.serial_backend(index) {
        Some(backend) => backend,
        None => {
            let label = format!("serial{}", index);
            warn!("No backend configured for {}; using null backend '{}'", port, label);
            ctx.serial_host
                .new_null_backend(&label)
                .map_err(|e| McuError::SerialBackendUnavailable {
                    port,
                    reason: format!("cannot create null backend '{}': {}", label, e),
                })?
        }
    };

    let rcc = ctx.clock()?;
    let nvic = ctx.registry.interrupt_controller();
    let usart = ctx.create(&port.child_name(), DeviceType::Usart)?;
    ctx.set(usart, props::PORT_INDEX, PropertyValue::Int(index as u64))?;
    ctx.set_capabilities(usart)?;
    ctx.set(usart, props::RCC, PropertyValue::Link(rcc))?;
    ctx.set(usart, props::NVIC, PropertyValue::Link(nvic))?;
    ctx.set(usart, props::CHARDEV, PropertyValue::Chardev(chardev))?;
    ctx.realize(usart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chardev::{shared, BufferBackend, HostSerial};
    use crate::peripherals::usart::Usart;
    use crate::peripherals::Stm32Peripherals;
    use std::io;

    struct Fixture {
        tree: DeviceTree,
        container: Container,
        caps: Arc<Capabilities>,
        registry: ResourceRegistry,
    }

    impl Fixture {
        fn new(part: &str) -> Self {
            let mut tree = DeviceTree::new();
            let core = tree.container("/machine/mcu/cortexm");
            let nvic = tree
                .create(&core, "nvic", Stm32Peripherals.create(DeviceType::Nvic))
                .unwrap();
            let container = tree.container("/machine/mcu/stm32");
            Self {
                tree,
                container,
                caps: Arc::new(Capabilities::preset(part).unwrap()),
                registry: ResourceRegistry::new(nvic),
            }
        }

        fn ctx<'a>(&'a mut self, host: &'a dyn SerialHost) -> BuildContext<'a> {
            BuildContext {
                tree: &mut self.tree,
                container: &self.container,
                capabilities: &self.caps,
                registry: self.registry,
                devices: &Stm32Peripherals,
                serial_host: host,
            }
        }
    }

    #[test]
    fn test_gpio_needs_clock() {
        let host = HostSerial::default();
        let mut fx = Fixture::new("stm32f103rb");
        let err = build_gpio(&mut fx.ctx(&host), GpioPort::A).unwrap_err();
        assert!(matches!(err, McuError::Device(DeviceError::MissingProperty(_))));
        assert!(fx.tree.lookup("/machine/mcu/stm32/gpio[a]").is_none());
    }

    #[test]
    fn test_gpio_after_clock() {
        let host = HostSerial::default();
        let mut fx = Fixture::new("stm32f103rb");
        let rcc = build_rcc(&mut fx.ctx(&host), 8_000_000, 32_768).unwrap();
        fx.registry.register_clock(rcc);
        let gpio = build_gpio(&mut fx.ctx(&host), GpioPort::C).unwrap();

        assert_eq!(fx.tree.path(gpio), "/machine/mcu/stm32/gpio[c]");
        assert!(fx.tree.is_realized(gpio));
        assert!(matches!(
            fx.tree.property(gpio, props::RCC),
            Some(PropertyValue::Link(h)) if h == rcc
        ));
        assert!(matches!(
            fx.tree.property(rcc, props::HSE_FREQ_HZ),
            Some(PropertyValue::Int(8_000_000))
        ));
    }

    #[test]
    fn test_serial_uses_configured_backend() {
        let mut host = HostSerial::new(3);
        let backend = BufferBackend::new("console");
        let buffer = backend.buffer();
        host.set_backend(1, shared(backend));

        let mut fx = Fixture::new("stm32f103rb");
        let rcc = build_rcc(&mut fx.ctx(&host), 0, 0).unwrap();
        fx.registry.register_clock(rcc);
        let usart = build_serial(&mut fx.ctx(&host), SerialPort::Usart2).unwrap();

        fx.tree.device_mut(usart).write(0x04, b'!').unwrap();
        assert_eq!(buffer.lock().unwrap().as_slice(), b"!");
        assert_eq!(fx.tree.path(usart), "/machine/mcu/stm32/usart[2]");
    }

    #[test]
    fn test_serial_fabricates_null_backend() {
        let host = HostSerial::default();
        let mut fx = Fixture::new("stm32f103rb");
        let rcc = build_rcc(&mut fx.ctx(&host), 0, 0).unwrap();
        fx.registry.register_clock(rcc);
        let usart = build_serial(&mut fx.ctx(&host), SerialPort::Usart3).unwrap();

        let dev = fx.tree.downcast_ref::<Usart>(usart).unwrap();
        let backend = dev.chardev().unwrap().lock().unwrap();
        assert_eq!(backend.label(), "serial2");
        assert_eq!(backend.kind(), "null");
    }

    #[test]
    fn test_serial_index_beyond_host_maximum() {
        let host = HostSerial::new(2);
        let mut fx = Fixture::new("stm32f103rb");
        let rcc = build_rcc(&mut fx.ctx(&host), 0, 0).unwrap();
        fx.registry.register_clock(rcc);
        let before = fx.tree.len();

        let err = build_serial(&mut fx.ctx(&host), SerialPort::Usart3).unwrap_err();
        assert!(matches!(
            err,
            McuError::SerialBackendUnavailable {
                port: SerialPort::Usart3,
                ..
            }
        ));
        assert_eq!(fx.tree.len(), before);
    }

    #[derive(Debug)]
    struct BrokenHost;

    impl SerialHost for BrokenHost {
        fn max_serial_ports(&self) -> usize {
            4
        }

        fn serial_backend(&self, _index: usize) -> Option<crate::chardev::CharBackendRef> {
            None
        }

        fn new_null_backend(&self, _label: &str) -> io::Result<crate::chardev::CharBackendRef> {
            Err(io::Error::new(io::ErrorKind::Other, "no more descriptors"))
        }
    }

    #[test]
    fn test_serial_null_backend_failure() {
        let mut fx = Fixture::new("stm32f103rb");
        let rcc = build_rcc(&mut fx.ctx(&BrokenHost), 0, 0).unwrap();
        fx.registry.register_clock(rcc);
        let err = build_serial(&mut fx.ctx(&BrokenHost), SerialPort::Usart1).unwrap_err();
        assert!(err.to_string().contains("serial0"));
    }
}
