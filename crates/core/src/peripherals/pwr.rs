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

/// Power controller. Only CR and CSR are modelled.
#[derive(Debug, Default, serde::Serialize)]
pub struct Pwr {
    #[serde(skip)]
    capabilities: Option<Arc<Capabilities>>,
    cr_reset: u32,
    cr: u32,
    csr: u32,
}

impl Pwr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cr(&self) -> u32 {
        self.cr
    }
}

impl Device for Pwr {
    fn type_name(&self) -> &'static str {
        "stm32-pwr"
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), DeviceError> {
        match name {
            props::CAPABILITIES => self.capabilities = Some(value.into_capabilities(name)?),
            _ => return Err(DeviceError::UnknownProperty(name.to_string())),
        }
        Ok(())
    }

    fn realize(&mut self) -> Result<(), DeviceError> {
        let caps = self
            .capabilities
            .as_ref()
            .ok_or(DeviceError::MissingProperty(props::CAPABILITIES))?;
        // VOS field defaults differ per family.
        self.cr_reset = match caps.family {
            Family::F4 => 0x0000_4000,
            Family::L1 => 0x0000_1000,
            Family::F1 | Family::F2 | Family::F3 => 0,
        };
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.cr = self.cr_reset;
        self.csr = 0;
    }

    fn read(&self, offset: u64) -> SimResult<u8> {
        let val = match offset & !3 {
            0x00 => self.cr,
            0x04 => self.csr,
            _ => 0,
        };
        Ok(reg_byte(val, offset))
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        match offset & !3 {
            0x00 => self.cr = with_reg_byte(self.cr, offset, value),
            0x04 => self.csr = with_reg_byte(self.csr, offset, value),
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
