// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{props, reg_byte};
use crate::object::{Device, DeviceError, PropertyValue};
use crate::SimResult;

/// Largest external interrupt count the register file can describe.
pub const MAX_IRQS: u32 = 240;
pub const DEFAULT_NUM_IRQ: u32 = 68;

/// Nested Vectored Interrupt Controller: enable and pending state only.
#[derive(Debug, serde::Serialize)]
pub struct Nvic {
    num_irq: u32,
    iser: [u32; 8],
    ispr: [u32; 8],
}

impl Default for Nvic {
    fn default() -> Self {
        Self {
            num_irq: DEFAULT_NUM_IRQ,
            iser: [0; 8],
            ispr: [0; 8],
        }
    }
}

impl Nvic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_irq(&self) -> u32 {
        self.num_irq
    }

    pub fn is_enabled(&self, irq: u32) -> bool {
        irq < self.num_irq && self.iser[(irq / 32) as usize] & (1 << (irq % 32)) != 0
    }

    pub fn is_pending(&self, irq: u32) -> bool {
        irq < self.num_irq && self.ispr[(irq / 32) as usize] & (1 << (irq % 32)) != 0
    }

    pub fn set_pending(&mut self, irq: u32) {
        if irq < self.num_irq {
            self.ispr[(irq / 32) as usize] |= 1 << (irq % 32);
        }
    }
}

impl Device for Nvic {
    fn type_name(&self) -> &'static str {
        "cortexm-nvic"
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), DeviceError> {
        match name {
            props::NUM_IRQ => {
                let n = value.as_u32(name)?;
                if n == 0 || n > MAX_IRQS {
                    return Err(DeviceError::InvalidValue {
                        name: name.to_string(),
                        reason: format!("{} is outside 1..={}", n, MAX_IRQS),
                    });
                }
                self.num_irq = n;
            }
            _ => return Err(DeviceError::UnknownProperty(name.to_string())),
        }
        Ok(())
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            props::NUM_IRQ => Some(PropertyValue::Int(self.num_irq.into())),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.iser = [0; 8];
        self.ispr = [0; 8];
    }

    fn read(&self, offset: u64) -> SimResult<u8> {
        let idx = ((offset % 0x80) / 4) as usize;
        let val = match offset {
            0x000..=0x01F | 0x080..=0x09F => self.iser[idx],
            0x100..=0x11F | 0x180..=0x19F => self.ispr[idx],
            _ => 0,
        };
        Ok(reg_byte(val, offset))
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let idx = ((offset % 0x80) / 4) as usize;
        let mask = (value as u32) << ((offset % 4) * 8);
        match offset {
            0x000..=0x01F => self.iser[idx] |= mask,
            0x080..=0x09F => self.iser[idx] &= !mask,
            0x100..=0x11F => self.ispr[idx] |= mask,
            0x180..=0x19F => self.ispr[idx] &= !mask,
            _ => {}
        }
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
