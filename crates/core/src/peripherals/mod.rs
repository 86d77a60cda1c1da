// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod flash;
pub mod gpio;
pub mod nvic;
pub mod pwr;
pub mod rcc;
pub mod usart;

use crate::object::Device;
use std::fmt;

/// Property names shared between the builders and the device models.
pub mod props {
    pub const CAPABILITIES: &str = "capabilities";
    pub const PORT_INDEX: &str = "port-index";
    pub const RCC: &str = "rcc";
    pub const NVIC: &str = "nvic";
    pub const CHARDEV: &str = "chardev";
    pub const HSI_FREQ_HZ: &str = "hsi-freq-hz";
    pub const LSI_FREQ_HZ: &str = "lsi-freq-hz";
    pub const HSE_FREQ_HZ: &str = "hse-freq-hz";
    pub const LSE_FREQ_HZ: &str = "lse-freq-hz";
    pub const NUM_IRQ: &str = "num-irq";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Nvic,
    Rcc,
    Flash,
    Pwr,
    Gpio,
    Usart,
}

impl DeviceType {
    pub fn name(self) -> &'static str {
        match self {
            DeviceType::Nvic => "cortexm-nvic",
            DeviceType::Rcc => "stm32-rcc",
            DeviceType::Flash => "stm32-flash",
            DeviceType::Pwr => "stm32-pwr",
            DeviceType::Gpio => "stm32-gpio",
            DeviceType::Usart => "stm32-usart",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Instantiates unconfigured device models by type.
pub trait DeviceFactory: fmt::Debug {
    fn create(&self, ty: DeviceType) -> Box<dyn Device>;
}

/// The built-in STM32 peripheral models.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stm32Peripherals;

impl DeviceFactory for Stm32Peripherals {
    fn create(&self, ty: DeviceType) -> Box<dyn Device> {
        match ty {
            DeviceType::Nvic => Box::new(nvic::Nvic::new()),
            DeviceType::Rcc => Box::new(rcc::Rcc::new()),
            DeviceType::Flash => Box::new(flash::FlashInterface::new()),
            DeviceType::Pwr => Box::new(pwr::Pwr::new()),
            DeviceType::Gpio => Box::new(gpio::GpioPort::new()),
            DeviceType::Usart => Box::new(usart::Usart::new()),
        }
    }
}

/// Byte `offset % 4` of a 32-bit register.
pub(crate) fn reg_byte(reg: u32, offset: u64) -> u8 {
    let byte_offset = (offset % 4) as u32;
    ((reg >> (byte_offset * 8)) & 0xFF) as u8
}

/// `reg` with byte `offset % 4` replaced by `value`.
pub(crate) fn with_reg_byte(reg: u32, offset: u64, value: u8) -> u32 {
    let byte_offset = (offset % 4) as u32;
    let mask = 0xFF << (byte_offset * 8);
    (reg & !mask) | ((value as u32) << (byte_offset * 8))
}
