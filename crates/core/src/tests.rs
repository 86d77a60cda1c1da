// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#[cfg(test)]
mod integration_tests {
    use crate::capabilities::{Capabilities, Family, GpioPorts, SerialPorts, PRESET_NAMES};
    use crate::chardev::{shared, BufferBackend, HostSerial};
    use crate::memory::{AddressSpace, ProgramImage};
    use crate::object::{Device, DeviceError, PropertyValue};
    use crate::peripherals::gpio::GpioPort as GpioDevice;
    use crate::peripherals::{props, DeviceFactory, DeviceType};
    use crate::ports::{GpioPort, Port, SerialPort};
    use crate::system::stm32::{McuBuilder, Stm32Mcu, FLASH_ALIAS_BASE};
    use crate::{McuError, SimulationError};
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    fn build(part: &str) -> (Stm32Mcu, AddressSpace) {
        let caps = Arc::new(Capabilities::preset(part).unwrap());
        let mut sysmem = AddressSpace::new("system");
        let mcu = McuBuilder::new()
            .capabilities(caps)
            .build(&mut sysmem)
            .unwrap();
        (mcu, sysmem)
    }

    fn minimal_caps(flash_size_kb: u32) -> Capabilities {
        Capabilities {
            name: "test-part".to_string(),
            family: Family::F1,
            hsi_freq_hz: 8_000_000,
            lsi_freq_hz: 40_000,
            flash_size_kb,
            sram_size_kb: 4,
            has_periph_bitband: false,
            has_pwr: false,
            gpio: GpioPorts::A,
            serial: SerialPorts::empty(),
        }
    }

    #[test]
    fn test_every_preset_populates_exactly_its_ports() {
        for part in PRESET_NAMES {
            let (mcu, _) = build(part);
            let caps = mcu.capabilities().clone();
            for &port in GpioPort::ALL {
                assert_eq!(
                    mcu.gpio(port).is_some(),
                    caps.has_gpio(port),
                    "{}: {}",
                    part,
                    port
                );
            }
            for &port in SerialPort::ALL {
                assert_eq!(
                    mcu.serial(port).is_some(),
                    caps.has_serial(port),
                    "{}: {}",
                    part,
                    port
                );
            }
            assert_eq!(mcu.pwr().is_some(), caps.has_pwr);
        }
    }

    #[test]
    fn test_device_paths() {
        let (mcu, _) = build("stm32f407vg");
        let tree = mcu.tree();
        assert_eq!(tree.path(mcu.nvic()), "/machine/mcu/cortexm/nvic");
        assert_eq!(tree.path(mcu.rcc()), "/machine/mcu/stm32/rcc");
        assert_eq!(tree.path(mcu.flash()), "/machine/mcu/stm32/flash");
        assert_eq!(tree.path(mcu.pwr().unwrap()), "/machine/mcu/stm32/pwr");
        assert_eq!(
            tree.lookup("/machine/mcu/stm32/gpio[e]"),
            mcu.gpio(GpioPort::E)
        );
        assert_eq!(
            tree.lookup("/machine/mcu/stm32/usart[6]"),
            mcu.serial(SerialPort::Usart6)
        );
        assert!(tree.iter().all(|(h, _, _)| tree.is_realized(h)));
    }

    #[test]
    fn test_gpio_and_serial_link_to_shared_resources() {
        let (mcu, _) = build("stm32f103rb");
        let tree = mcu.tree();
        for handle in mcu.gpio_ports().handles() {
            assert!(matches!(
                tree.property(handle, props::RCC),
                Some(PropertyValue::Link(h)) if h == mcu.rcc()
            ));
        }
        for (port, handle) in mcu.serial_ports().iter() {
            assert!(matches!(
                tree.property(handle, props::NVIC),
                Some(PropertyValue::Link(h)) if h == mcu.nvic()
            ));
            assert!(matches!(
                tree.property(handle, props::PORT_INDEX),
                Some(PropertyValue::Int(i)) if i == port.index() as u64
            ));
        }
    }

    #[test]
    fn test_flash_alias_and_boot_window() {
        let (mcu, sysmem) = build("stm32f103rb");
        let alias = sysmem.mapping("mem-flash-alias").unwrap();
        assert_eq!(alias.base, FLASH_ALIAS_BASE);
        assert_eq!(alias.size, 128 * 1024);
        assert!(alias.readonly);
        assert!(sysmem
            .region("mem-flash-alias")
            .unwrap()
            .shares_backing_with(mcu.core().flash_mem()));
    }

    #[test]
    fn test_periph_bitband_follows_flag() {
        let (_, sysmem) = build("stm32f103rb");
        let bb = sysmem.mapping("periph-bitband").unwrap();
        assert_eq!(bb.base, 0x4200_0000);
        assert_eq!(bb.size, 0x0200_0000);

        let caps = Arc::new(minimal_caps(64));
        let mut sysmem = AddressSpace::new("system");
        McuBuilder::new()
            .capabilities(caps)
            .build(&mut sysmem)
            .unwrap();
        assert!(sysmem.mapping("periph-bitband").is_none());
    }

    #[test]
    fn test_missing_capabilities_has_no_side_effects() {
        let mut sysmem = AddressSpace::new("system");
        let err = McuBuilder::new().build(&mut sysmem).unwrap_err();
        assert!(matches!(err, McuError::MissingCapabilities));
        assert!(sysmem.mappings().is_empty());
    }

    #[test]
    fn test_serial_port_beyond_host_maximum() {
        let caps = Arc::new(Capabilities::preset("stm32f103rb").unwrap());
        let mut sysmem = AddressSpace::new("system");
        let err = McuBuilder::new()
            .capabilities(caps)
            .serial_host(HostSerial::new(2))
            .build(&mut sysmem)
            .unwrap_err();
        match err {
            McuError::SerialBackendUnavailable { port, .. } => {
                assert_eq!(port, SerialPort::Usart3)
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_configured_backend_receives_tx() {
        let backend = BufferBackend::new("console");
        let buffer = backend.buffer();
        let mut host = HostSerial::default();
        host.set_backend(0, shared(backend));

        let caps = Arc::new(Capabilities::preset("stm32f103rb").unwrap());
        let mut sysmem = AddressSpace::new("system");
        let mut mcu = McuBuilder::new()
            .capabilities(caps)
            .serial_host(host)
            .build(&mut sysmem)
            .unwrap();

        let usart1 = mcu.serial(SerialPort::Usart1).unwrap();
        for &b in b"hello" {
            mcu.device_mut(usart1).write(0x04, b).unwrap();
        }
        let usart2 = mcu.serial(SerialPort::Usart2).unwrap();
        mcu.device_mut(usart2).write(0x04, b'x').unwrap();

        assert_eq!(buffer.lock().unwrap().as_slice(), b"hello");
    }

    #[test]
    fn test_reset_restores_power_on_state() {
        let (fresh, fresh_mem) = build("stm32f407vg");
        let (mut mcu, sysmem) = build("stm32f407vg");

        let rcc = mcu.rcc();
        mcu.device_mut(rcc).write(0x44, 0xFF).unwrap();
        let flash = mcu.flash();
        mcu.device_mut(flash).write(0x13, 0x00).unwrap();
        let gpio_a = mcu.gpio(GpioPort::A).unwrap();
        mcu.device_mut(gpio_a).write(0x14, 0x55).unwrap();
        let usart6 = mcu.serial(SerialPort::Usart6).unwrap();
        mcu.device_mut(usart6).write(0x0C, 0x01).unwrap();
        let nvic = mcu.nvic();
        mcu.device_mut(nvic).write(0x00, 0xFF).unwrap();
        assert_ne!(
            mcu.snapshot(&sysmem).devices,
            fresh.snapshot(&fresh_mem).devices
        );

        mcu.reset();
        let once = mcu.snapshot(&sysmem).devices;
        mcu.reset();
        let twice = mcu.snapshot(&sysmem).devices;

        assert_eq!(once, twice);
        assert_eq!(once, fresh.snapshot(&fresh_mem).devices);
        assert_eq!(
            mcu.downcast_ref::<GpioDevice>(gpio_a).unwrap().odr(),
            0
        );
    }

    #[test]
    fn test_pwr_is_left_alone_by_reset() {
        let (mut mcu, _) = build("stm32f407vg");
        let pwr = mcu.pwr().unwrap();
        mcu.device_mut(pwr).write(0x01, 0x00).unwrap();
        mcu.reset();
        assert_eq!(mcu.device(pwr).read(0x01).unwrap(), 0x00);
        assert!(!mcu.reset_sequence().contains(&pwr));
    }

    #[derive(Debug)]
    struct Recorder {
        ty: DeviceType,
        port: Option<u64>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Device for Recorder {
        fn type_name(&self) -> &'static str {
            self.ty.name()
        }

        fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), DeviceError> {
            if name == props::PORT_INDEX {
                if let PropertyValue::Int(i) = value {
                    self.port = Some(i);
                }
            }
            Ok(())
        }

        fn reset(&mut self) {
            let entry = match self.port {
                Some(i) => format!("{}:{}", self.ty, i),
                None => self.ty.to_string(),
            };
            self.log.lock().unwrap().push(entry);
        }
    }

    #[derive(Debug, Default)]
    struct RecordingFactory {
        log: Arc<Mutex<Vec<String>>>,
        created: Arc<Mutex<Vec<DeviceType>>>,
    }

    impl DeviceFactory for RecordingFactory {
        fn create(&self, ty: DeviceType) -> Box<dyn Device> {
            self.created.lock().unwrap().push(ty);
            Box::new(Recorder {
                ty,
                port: None,
                log: self.log.clone(),
            })
        }
    }

    #[test]
    fn test_reset_order() {
        let factory = RecordingFactory::default();
        let log = factory.log.clone();
        let caps = Arc::new(Capabilities::preset("stm32f107vc").unwrap());
        let mut sysmem = AddressSpace::new("system");
        let mut mcu = McuBuilder::new()
            .capabilities(caps)
            .device_factory(factory)
            .build(&mut sysmem)
            .unwrap();
        assert!(log.lock().unwrap().is_empty());

        mcu.reset();
        let expected = vec![
            "cortexm-nvic",
            "stm32-rcc",
            "stm32-flash",
            "stm32-gpio:0",
            "stm32-gpio:1",
            "stm32-gpio:2",
            "stm32-gpio:3",
            "stm32-gpio:4",
            "stm32-usart:0",
            "stm32-usart:1",
            "stm32-usart:2",
            "stm32-usart:3",
            "stm32-usart:4",
        ];
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[test]
    fn test_reset_skips_pwr_built_between_flash_and_gpio() {
        let factory = RecordingFactory::default();
        let log = factory.log.clone();
        let created = factory.created.clone();
        let caps = Arc::new(Capabilities::preset("stm32f407vg").unwrap());
        let mut sysmem = AddressSpace::new("system");
        let mut mcu = McuBuilder::new()
            .capabilities(caps)
            .device_factory(factory)
            .build(&mut sysmem)
            .unwrap();

        let created = created.lock().unwrap().clone();
        assert_eq!(
            &created[..5],
            &[
                DeviceType::Nvic,
                DeviceType::Rcc,
                DeviceType::Flash,
                DeviceType::Pwr,
                DeviceType::Gpio
            ]
        );

        mcu.reset();
        mcu.reset();
        let log = log.lock().unwrap();
        assert!(log.iter().all(|entry| entry != "stm32-pwr"));
        // 14 devices per reset
        assert_eq!(log.len(), 2 * 14);
        assert_eq!(log[2], "stm32-flash");
        assert_eq!(log[3], "stm32-gpio:0");
        assert_eq!(log[..14], log[14..]);
    }

    #[test]
    fn test_firmware_visible_through_boot_window() {
        let (mut mcu, mut sysmem) = build("stm32f103rb");
        let image = ProgramImage::from_raw(
            FLASH_ALIAS_BASE,
            vec![0x00, 0x50, 0x00, 0x20, 0x09, 0x00, 0x00, 0x08],
        );
        mcu.load_firmware(&mut sysmem, &image).unwrap();

        assert_eq!(sysmem.read_u32(0x0000_0000), Ok(0x2000_5000));
        assert_eq!(sysmem.read_u32(0x0000_0004), Ok(0x0800_0009));
        assert_eq!(sysmem.read_u32(FLASH_ALIAS_BASE + 4), Ok(0x0800_0009));
        assert_eq!(
            sysmem.write_u8(FLASH_ALIAS_BASE, 0),
            Err(SimulationError::ReadOnlyViolation(FLASH_ALIAS_BASE))
        );
    }

    #[test]
    fn test_firmware_too_large_is_rejected() {
        let (mut mcu, mut sysmem) = build("stm32f103rb");
        let image = ProgramImage::from_raw(FLASH_ALIAS_BASE, vec![0xFF; 129 * 1024]);
        let err = mcu.load_firmware(&mut sysmem, &image).unwrap_err();
        assert!(matches!(err, McuError::FirmwareOutOfRange { .. }));
    }

    #[test]
    fn test_flash_larger_than_boot_window() {
        // 128 MiB + 1 KiB reaches past 0x0800_0000; 1 GiB also covers SRAM.
        for kb in [131_073, 1 << 20] {
            let mut sysmem = AddressSpace::new("system");
            let mut mcu = McuBuilder::new()
                .capabilities(Arc::new(minimal_caps(kb)))
                .build(&mut sysmem)
                .unwrap();

            let alias = sysmem.mapping("mem-flash-alias").unwrap();
            assert_eq!(alias.base, FLASH_ALIAS_BASE);
            assert_eq!(alias.size, u64::from(kb) * 1024);

            let image = ProgramImage::from_raw(FLASH_ALIAS_BASE, vec![0x78, 0x56, 0x34, 0x12]);
            mcu.load_firmware(&mut sysmem, &image).unwrap();
            assert_eq!(sysmem.read_u32(0), Ok(0x1234_5678));
            assert_eq!(sysmem.read_u32(FLASH_ALIAS_BASE), Ok(0x1234_5678));

            sysmem.write_u32(0x2000_0000, 0xDEAD_BEEF).unwrap();
            assert_eq!(sysmem.read_u32(0x2000_0000), Ok(0xDEAD_BEEF));
            assert_eq!(sysmem.region("mem-sram").unwrap().allocated_pages(), 1);
        }
    }

    #[test]
    fn test_snapshot_json() {
        let (mcu, sysmem) = build("stm32l152re");
        let snap = mcu.snapshot(&sysmem);
        assert_eq!(snap.family, Family::L1);
        assert!(snap.devices.contains_key("/machine/mcu/stm32/usart[5]"));
        assert!(!snap.devices.contains_key("/machine/mcu/stm32/usart[6]"));

        let json: serde_json::Value = serde_json::from_str(&snap.to_json().unwrap()).unwrap();
        assert_eq!(json["part"], "stm32l152re");
        assert_eq!(json["family"], "L1");
        let names: Vec<_> = json["memory_map"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["mem-flash", "mem-flash-alias", "mem-sram", "periph-bitband"]
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_alias_tracks_flash_size(kb in prop_oneof![1u32..=2048, 2049u32..=u32::MAX]) {
            let mut sysmem = AddressSpace::new("system");
            McuBuilder::new()
                .capabilities(Arc::new(minimal_caps(kb)))
                .build(&mut sysmem)
                .unwrap();
            let alias = sysmem.mapping("mem-flash-alias").unwrap();
            prop_assert_eq!(alias.base, FLASH_ALIAS_BASE);
            prop_assert_eq!(alias.size, u64::from(kb) * 1024);
            prop_assert!(alias.readonly);
        }

        #[test]
        fn prop_alias_differs_only_in_size(a in 1u32..=1024, b in 1u32..=1024) {
            let mut mem_a = AddressSpace::new("system");
            let mut mem_b = AddressSpace::new("system");
            McuBuilder::new()
                .capabilities(Arc::new(minimal_caps(a)))
                .build(&mut mem_a)
                .unwrap();
            McuBuilder::new()
                .capabilities(Arc::new(minimal_caps(b)))
                .build(&mut mem_b)
                .unwrap();
            let mut alias_a = mem_a.mapping("mem-flash-alias").unwrap();
            let alias_b = mem_b.mapping("mem-flash-alias").unwrap();
            prop_assert_eq!(alias_a.size == alias_b.size, a == b);
            alias_a.size = alias_b.size;
            prop_assert_eq!(alias_a, alias_b);
        }
    }
}
