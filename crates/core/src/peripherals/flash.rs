// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{props, reg_byte, with_reg_byte};
use crate::capabilities::{Capabilities, Family};
use crate::object::{Device, DeviceError, PropertyValue};
use crate::SimResult;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashRegisterLayout {
    #[default]
    Stm32F1,
    Stm32F4,
    Stm32L1,
}

impl FlashRegisterLayout {
    pub fn for_family(family: Family) -> Self {
        match family {
            Family::F1 | Family::F3 => Self::Stm32F1,
            Family::F2 | Family::F4 => Self::Stm32F4,
            Family::L1 => Self::Stm32L1,
        }
    }

    fn acr_reset(self) -> u32 {
        match self {
            Self::Stm32F1 => 0x0000_0030,
            Self::Stm32F4 | Self::Stm32L1 => 0,
        }
    }

    /// Offset and reset value of the register holding the LOCK bit.
    fn control(self) -> (u64, u32) {
        match self {
            Self::Stm32F1 => (0x10, 0x0000_0080),
            Self::Stm32F4 => (0x10, 0x8000_0000),
            Self::Stm32L1 => (0x04, 0x0000_0007),
        }
    }

    fn lock_mask(self) -> u32 {
        match self {
            Self::Stm32F1 => 1 << 7,
            Self::Stm32F4 => 1 << 31,
            Self::Stm32L1 => 1,
        }
    }
}

/// Embedded flash memory interface registers.
#[derive(Debug, Default, serde::Serialize)]
pub struct FlashInterface {
    #[serde(skip)]
    capabilities: Option<Arc<Capabilities>>,
    layout: FlashRegisterLayout,
    acr: u32,
    control: u32,
}

impl FlashInterface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(&self) -> FlashRegisterLayout {
        self.layout
    }

    pub fn is_locked(&self) -> bool {
        self.control & self.layout.lock_mask() != 0
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match offset {
            0x00 => self.acr,
            o if o == self.layout.control().0 => self.control,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        match offset {
            0x00 => self.acr = value,
            o if o == self.layout.control().0 => self.control = value,
            _ => {}
        }
    }
}

impl Device for FlashInterface {
    fn type_name(&self) -> &'static str {
        "stm32-flash"
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), DeviceError> {
        match name {
            props::CAPABILITIES => self.capabilities = Some(value.into_capabilities(name)?),
            _ => return Err(DeviceError::UnknownProperty(name.to_string())),
        }
        Ok(())
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            props::CAPABILITIES => self.capabilities.clone().map(PropertyValue::Capabilities),
            _ => None,
        }
    }

    fn realize(&mut self) -> Result<(), DeviceError> {
        let caps = self
            .capabilities
            .as_ref()
            .ok_or(DeviceError::MissingProperty(props::CAPABILITIES))?;
        self.layout = FlashRegisterLayout::for_family(caps.family);
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.acr = self.layout.acr_reset();
        self.control = self.layout.control().1;
    }

    fn read(&self, offset: u64) -> SimResult<u8> {
        Ok(reg_byte(self.read_reg(offset & !3), offset))
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let reg_offset = offset & !3;
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
