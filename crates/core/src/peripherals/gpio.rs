// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{props, reg_byte, with_reg_byte};
use crate::capabilities::{Capabilities, Family};
use crate::object::{Device, DeviceError, DeviceHandle, PropertyValue};
use crate::ports::{GpioPort as PortId, Port};
use crate::SimResult;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GpioRegisterLayout {
    /// CRL/CRH configuration registers.
    #[default]
    Stm32F1,
    /// MODER/OTYPER/OSPEEDR/PUPDR, as on F2, F3, F4 and L1.
    Stm32V2,
}

impl GpioRegisterLayout {
    pub fn for_family(family: Family) -> Self {
        match family {
            Family::F1 => Self::Stm32F1,
            Family::F2 | Family::F3 | Family::F4 | Family::L1 => Self::Stm32V2,
        }
    }
}

/// STM32 GPIO port.
#[derive(Debug, Default, serde::Serialize)]
pub struct GpioPort {
    #[serde(skip)]
    capabilities: Option<Arc<Capabilities>>,
    #[serde(skip)]
    rcc: Option<DeviceHandle>,
    port_index: Option<u32>,
    layout: GpioRegisterLayout,
    crl: u32,     // 0x00: configuration register low
    crh: u32,     // 0x04: configuration register high
    moder: u32,   // 0x00: mode register (STM32v2)
    otyper: u32,  // 0x04: output type register (STM32v2)
    ospeedr: u32, // 0x08: output speed register (STM32v2)
    pupdr: u32,   // 0x0C: pull-up/pull-down register (STM32v2)
    idr: u32,
    odr: u32,
    lckr: u32,
    afrl: u32, // 0x20: alternate function low register (STM32v2)
    afrh: u32, // 0x24: alternate function high register (STM32v2)
    bsrr_buf: u32,
    bsrr_mask: u8,
}

impl GpioPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(&self) -> GpioRegisterLayout {
        self.layout
    }

    /// The port this instance models, once `port-index` has been set.
    pub fn port(&self) -> Option<PortId> {
        self.port_index
            .and_then(|i| PortId::ALL.get(i as usize).copied())
    }

    pub fn odr(&self) -> u16 {
        self.odr as u16
    }

    pub fn idr(&self) -> u16 {
        self.idr as u16
    }

    /// Drive an input pin from outside the MCU.
    pub fn set_input(&mut self, pin: u8, high: bool) {
        if pin < 16 {
            if high {
                self.idr |= 1 << pin;
            } else {
                self.idr &= !(1 << pin);
            }
        }
    }

    fn bsrr_offset(&self) -> u64 {
        match self.layout {
            GpioRegisterLayout::Stm32F1 => 0x10,
            GpioRegisterLayout::Stm32V2 => 0x18,
        }
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match self.layout {
            GpioRegisterLayout::Stm32F1 => match offset {
                0x00 => self.crl,
                0x04 => self.crh,
                0x08 => self.idr,
                0x0C => self.odr,
                0x18 => self.lckr,
                _ => 0,
            },
            GpioRegisterLayout::Stm32V2 => match offset {
                0x00 => self.moder,
                0x04 => self.otyper,
                0x08 => self.ospeedr,
                0x0C => self.pupdr,
                0x10 => self.idr,
                0x14 => self.odr,
                0x1C => self.lckr,
                0x20 => self.afrl,
                0x24 => self.afrh,
                _ => 0,
            },
        }
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        match self.layout {
            GpioRegisterLayout::Stm32F1 => match offset {
                0x00 => self.crl = value,
                0x04 => self.crh = value,
                0x0C => self.odr = value & 0xFFFF,
                0x10 => self.apply_bsrr(value),
                0x14 => self.odr &= !(value & 0xFFFF),
                0x18 => self.lckr = value,
                _ => {}
            },
            GpioRegisterLayout::Stm32V2 => match offset {
                0x00 => self.moder = value,
                0x04 => self.otyper = value & 0xFFFF,
                0x08 => self.ospeedr = value,
                0x0C => self.pupdr = value,
                0x14 => self.odr = value & 0xFFFF,
                0x18 => self.apply_bsrr(value),
                0x1C => self.lckr = value,
                0x20 => self.afrl = value,
                0x24 => self.afrh = value,
                _ => {}
            },
        }
    }

    // Lower half sets, upper half resets.
    fn apply_bsrr(&mut self, value: u32) {
        let set = value & 0xFFFF;
        let reset = (value >> 16) & 0xFFFF;
        self.odr |= set;
        self.odr &= !reset;
    }

    /// BSRR is write-only; bytes are collected until a full half-word or
    /// word has been written.
    fn buffer_bsrr_byte(&mut self, byte_offset: u32, value: u8) {
        let shift = byte_offset * 8;
        self.bsrr_buf &= !(0xFF << shift);
        self.bsrr_buf |= (value as u32) << shift;
        self.bsrr_mask |= 1u8 << byte_offset;

        let val = match self.bsrr_mask {
            0x0F => self.bsrr_buf,
            0x03 => self.bsrr_buf & 0x0000_FFFF,
            0x0C => self.bsrr_buf & 0xFFFF_0000,
            _ => return,
        };
        self.bsrr_buf = 0;
        self.bsrr_mask = 0;
        self.apply_bsrr(val);
    }
}

impl Device for GpioPort {
    fn type_name(&self) -> &'static str {
        "stm32-gpio"
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), DeviceError> {
        match name {
            props::CAPABILITIES => self.capabilities = Some(value.into_capabilities(name)?),
            props::PORT_INDEX => {
                let index = value.as_u32(name)?;
                if index as usize >= PortId::ALL.len() {
                    return Err(DeviceError::InvalidValue {
                        name: name.to_string(),
                        reason: format!("port index {} is out of range", index),
                    });
                }
                self.port_index = Some(index);
            }
            props::RCC => self.rcc = Some(value.as_link(name)?),
            _ => return Err(DeviceError::UnknownProperty(name.to_string())),
        }
        Ok(())
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            props::CAPABILITIES => self.capabilities.clone().map(PropertyValue::Capabilities),
            props::PORT_INDEX => self.port_index.map(|i| PropertyValue::Int(i.into())),
            props::RCC => self.rcc.map(PropertyValue::Link),
            _ => None,
        }
    }

    fn realize(&mut self) -> Result<(), DeviceError> {
        let caps = self
            .capabilities
            .as_ref()
            .ok_or(DeviceError::MissingProperty(props::CAPABILITIES))?;
        let port = self
            .port()
            .ok_or(DeviceError::MissingProperty(props::PORT_INDEX))?;
        if self.rcc.is_none() {
            return Err(DeviceError::MissingProperty(props::RCC));
        }
        if !caps.has_gpio(port) {
            return Err(DeviceError::InvalidValue {
                name: props::PORT_INDEX.to_string(),
                reason: format!("{} does not have {}", caps.name, port),
            });
        }
        self.layout = GpioRegisterLayout::for_family(caps.family);
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        let port = self.port();
        self.crl = 0;
        self.crh = 0;
        self.moder = 0;
        self.otyper = 0;
        self.ospeedr = 0;
        self.pupdr = 0;
        match self.layout {
            GpioRegisterLayout::Stm32F1 => {
                // Floating input
                self.crl = 0x4444_4444;
                self.crh = 0x4444_4444;
            }
            // Debug pins come out of reset in alternate function mode.
            GpioRegisterLayout::Stm32V2 => match port {
                Some(PortId::A) => {
                    self.moder = 0xA800_0000;
                    self.pupdr = 0x6400_0000;
                }
                Some(PortId::B) => {
                    self.moder = 0x0000_0280;
                    self.ospeedr = 0x0000_00C0;
                    self.pupdr = 0x0000_0100;
                }
                _ => {}
            },
        }
        self.idr = 0;
        self.odr = 0;
        self.lckr = 0;
        self.afrl = 0;
        self.afrh = 0;
        self.bsrr_buf = 0;
        self.bsrr_mask = 0;
    }

    fn read(&self, offset: u64) -> SimResult<u8> {
        Ok(reg_byte(self.read_reg(offset & !3), offset))
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let reg_offset = offset & !3;
        if reg_offset == self.bsrr_offset() {
            self.buffer_bsrr_byte((offset % 4) as u32, value);
            return Ok(());
        }

        let reg_val = with_reg_byte(self.read_reg(reg_offset), offset, value);
        self.write_reg(reg_offset, reg_val);
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
