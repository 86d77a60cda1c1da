// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Per-variant feature tables.
//!
//! A [`Capabilities`] value says which peripherals a part has and what its
//! fixed clock and memory parameters are. The assembler reads it once; it is
//! shared by `Arc` with every peripheral and never mutated.

use crate::ports::{GpioPort, SerialPort};
use anyhow::Context;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Family {
    F1,
    F2,
    F3,
    F4,
    L1,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::F1 => "F1",
            Family::F2 => "F2",
            Family::F3 => "F3",
            Family::F4 => "F4",
            Family::L1 => "L1",
        };
        f.write_str(name)
    }
}

impl From<stm32_mcu_config::Family> for Family {
    fn from(family: stm32_mcu_config::Family) -> Self {
        match family {
            stm32_mcu_config::Family::F1 => Family::F1,
            stm32_mcu_config::Family::F2 => Family::F2,
            stm32_mcu_config::Family::F3 => Family::F3,
            stm32_mcu_config::Family::F4 => Family::F4,
            stm32_mcu_config::Family::L1 => Family::L1,
        }
    }
}

bitflags::bitflags! {
    /// GPIO ports present on a part.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GpioPorts: u8 {
        const A = 1 << 0;
        const B = 1 << 1;
        const C = 1 << 2;
        const D = 1 << 3;
        const E = 1 << 4;
        const F = 1 << 5;
        const G = 1 << 6;
    }
}

bitflags::bitflags! {
    /// USART/UART ports present on a part.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SerialPorts: u8 {
        const USART1 = 1 << 0;
        const USART2 = 1 << 1;
        const USART3 = 1 << 2;
        const UART4 = 1 << 3;
        const UART5 = 1 << 4;
        const USART6 = 1 << 5;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub name: String,
    pub family: Family,
    pub hsi_freq_hz: u32,
    pub lsi_freq_hz: u32,
    pub flash_size_kb: u32,
    pub sram_size_kb: u32,
    pub has_periph_bitband: bool,
    pub has_pwr: bool,
    pub gpio: GpioPorts,
    pub serial: SerialPorts,
}

pub const PRESET_NAMES: &[&str] = &[
    "stm32f103rb",
    "stm32f107vc",
    "stm32f205rb",
    "stm32f303vc",
    "stm32f407vg",
    "stm32f429zi",
    "stm32l152re",
];

const HSI_8MHZ: u32 = 8_000_000;
const HSI_16MHZ: u32 = 16_000_000;

impl Capabilities {
    pub fn has_gpio(&self, port: GpioPort) -> bool {
        self.gpio.contains(port.flag())
    }

    pub fn has_serial(&self, port: SerialPort) -> bool {
        self.serial.contains(port.flag())
    }

    pub fn flash_size_bytes(&self) -> u64 {
        u64::from(self.flash_size_kb) * 1024
    }

    pub fn sram_size_bytes(&self) -> u64 {
        u64::from(self.sram_size_kb) * 1024
    }

    /// Feature table of a built-in part, looked up case-insensitively.
    pub fn preset(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let caps = match name.as_str() {
            "stm32f103rb" => Self {
                name: name.clone(),
                family: Family::F1,
                hsi_freq_hz: HSI_8MHZ,
                lsi_freq_hz: 40_000,
                flash_size_kb: 128,
                sram_size_kb: 20,
                has_periph_bitband: true,
                has_pwr: true,
                gpio: GpioPorts::A | GpioPorts::B | GpioPorts::C | GpioPorts::D | GpioPorts::E,
                serial: SerialPorts::USART1 | SerialPorts::USART2 | SerialPorts::USART3,
            },
            "stm32f107vc" => Self {
                name: name.clone(),
                family: Family::F1,
                hsi_freq_hz: HSI_8MHZ,
                lsi_freq_hz: 40_000,
                flash_size_kb: 256,
                sram_size_kb: 64,
                has_periph_bitband: true,
                has_pwr: true,
                gpio: GpioPorts::A | GpioPorts::B | GpioPorts::C | GpioPorts::D | GpioPorts::E,
                serial: SerialPorts::USART1
                    | SerialPorts::USART2
                    | SerialPorts::USART3
                    | SerialPorts::UART4
                    | SerialPorts::UART5,
            },
            "stm32f205rb" => Self {
                name: name.clone(),
                family: Family::F2,
                hsi_freq_hz: HSI_16MHZ,
                lsi_freq_hz: 32_000,
                flash_size_kb: 128,
                sram_size_kb: 64,
                has_periph_bitband: true,
                has_pwr: true,
                gpio: GpioPorts::A | GpioPorts::B | GpioPorts::C | GpioPorts::D,
                serial: SerialPorts::all(),
            },
            "stm32f303vc" => Self {
                name: name.clone(),
                family: Family::F3,
                hsi_freq_hz: HSI_8MHZ,
                lsi_freq_hz: 40_000,
                flash_size_kb: 256,
                sram_size_kb: 40,
                has_periph_bitband: true,
                has_pwr: true,
                gpio: GpioPorts::all().difference(GpioPorts::G),
                serial: SerialPorts::all().difference(SerialPorts::USART6),
            },
            "stm32f407vg" => Self {
                name: name.clone(),
                family: Family::F4,
                hsi_freq_hz: HSI_16MHZ,
                lsi_freq_hz: 32_000,
                flash_size_kb: 1024,
                sram_size_kb: 128,
                has_periph_bitband: true,
                has_pwr: true,
                gpio: GpioPorts::A | GpioPorts::B | GpioPorts::C | GpioPorts::D | GpioPorts::E,
                serial: SerialPorts::all(),
            },
            "stm32f429zi" => Self {
                name: name.clone(),
                family: Family::F4,
                hsi_freq_hz: HSI_16MHZ,
                lsi_freq_hz: 32_000,
                flash_size_kb: 2048,
                sram_size_kb: 192,
                has_periph_bitband: true,
                has_pwr: true,
                gpio: GpioPorts::all(),
                serial: SerialPorts::all(),
            },
            "stm32l152re" => Self {
                name: name.clone(),
                family: Family::L1,
                hsi_freq_hz: HSI_16MHZ,
                lsi_freq_hz: 37_000,
                flash_size_kb: 512,
                sram_size_kb: 80,
                has_periph_bitband: true,
                has_pwr: true,
                gpio: GpioPorts::A | GpioPorts::B | GpioPorts::C | GpioPorts::D,
                serial: SerialPorts::all().difference(SerialPorts::USART6),
            },
            _ => return None,
        };
        Some(caps)
    }

    pub fn from_descriptor(desc: &stm32_mcu_config::ChipDescriptor) -> anyhow::Result<Self> {
        let flash_size_kb = size_in_kb(desc.flash_size_bytes()?, "flash_size", &desc.name)?;
        if flash_size_kb == 0 {
            anyhow::bail!("Chip '{}': flash_size must be positive", desc.name);
        }
        let sram_size_kb = size_in_kb(desc.sram_size_bytes()?, "sram_size", &desc.name)?;

        let mut gpio = GpioPorts::empty();
        for name in &desc.gpio {
            let port = GpioPort::from_str(name)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Chip '{}': bad gpio entry", desc.name))?;
            gpio |= port.flag();
        }

        let mut serial = SerialPorts::empty();
        for name in &desc.serial {
            let port = SerialPort::from_str(name)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Chip '{}': bad serial entry", desc.name))?;
            serial |= port.flag();
        }

        Ok(Self {
            name: desc.name.clone(),
            family: desc.family.into(),
            hsi_freq_hz: desc.hsi_freq_hz,
            lsi_freq_hz: desc.lsi_freq_hz,
            flash_size_kb,
            sram_size_kb,
            has_periph_bitband: desc.has_periph_bitband,
            has_pwr: desc.has_pwr,
            gpio,
            serial,
        })
    }
}

fn size_in_kb(bytes: u64, field: &str, chip: &str) -> anyhow::Result<u32> {
    if bytes % 1024 != 0 {
        anyhow::bail!(
            "Chip '{}': {} of {} bytes is not a whole number of KiB",
            chip,
            field,
            bytes
        );
    }
    u32::try_from(bytes / 1024)
        .with_context(|| format!("Chip '{}': {} is too large", chip, field))
}
