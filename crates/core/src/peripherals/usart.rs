// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{props, reg_byte, with_reg_byte};
use crate::capabilities::{Capabilities, Family};
use crate::chardev::CharBackendRef;
use crate::object::{Device, DeviceError, DeviceHandle, PropertyValue};
use crate::ports::{Port, SerialPort};
use crate::SimResult;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsartRegisterLayout {
    /// SR/DR at the start of the block.
    #[default]
    Stm32F1,
    /// ISR/RDR/TDR, as on F3.
    Stm32V2,
}

impl UsartRegisterLayout {
    pub fn for_family(family: Family) -> Self {
        match family {
            Family::F3 => Self::Stm32V2,
            Family::F1 | Family::F2 | Family::F4 | Family::L1 => Self::Stm32F1,
        }
    }

    fn status_offset(self) -> u64 {
        match self {
            Self::Stm32F1 => 0x00,
            Self::Stm32V2 => 0x1C, // ISR
        }
    }

    fn tx_offset(self) -> u64 {
        match self {
            Self::Stm32F1 => 0x04, // DR
            Self::Stm32V2 => 0x28, // TDR
        }
    }

    fn rx_offset(self) -> u64 {
        match self {
            Self::Stm32F1 => 0x04,
            Self::Stm32V2 => 0x24, // RDR
        }
    }

    /// Offsets of BRR, CR1, CR2 and CR3.
    fn control_offsets(self) -> [u64; 4] {
        match self {
            Self::Stm32F1 => [0x08, 0x0C, 0x10, 0x14],
            Self::Stm32V2 => [0x0C, 0x00, 0x04, 0x08],
        }
    }
}

/// TXE and TC.
const STATUS_READY: u32 = 0xC0;

/// USART/UART with its transmit side wired to a host character backend.
#[derive(Debug, Default, serde::Serialize)]
pub struct Usart {
    #[serde(skip)]
    capabilities: Option<Arc<Capabilities>>,
    #[serde(skip)]
    rcc: Option<DeviceHandle>,
    #[serde(skip)]
    nvic: Option<DeviceHandle>,
    #[serde(skip)]
    chardev: Option<CharBackendRef>,
    port_index: Option<u32>,
    layout: UsartRegisterLayout,
    status: u32,
    /// BRR, CR1, CR2, CR3
    control: [u32; 4],
    tx_count: u64,
}

impl Usart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(&self) -> UsartRegisterLayout {
        self.layout
    }

    pub fn port(&self) -> Option<SerialPort> {
        self.port_index
            .and_then(|i| SerialPort::ALL.get(i as usize).copied())
    }

    pub fn chardev(&self) -> Option<&CharBackendRef> {
        self.chardev.as_ref()
    }

    /// Bytes transmitted since the last reset.
    pub fn tx_count(&self) -> u64 {
        self.tx_count
    }

    fn push_tx(&mut self, value: u8) {
        self.tx_count += 1;
        let Some(chardev) = &self.chardev else {
            return;
        };
        match chardev.lock() {
            Ok(mut backend) => {
                if let Err(e) = backend.write(&[value]) {
                    warn!("Serial backend '{}' write failed: {}", backend.label(), e);
                }
            }
            Err(_) => warn!("Serial backend lock poisoned; dropping byte"),
        }
    }

    fn control_index(&self, offset: u64) -> Option<usize> {
        self.layout
            .control_offsets()
            .iter()
            .position(|&o| o == offset)
    }
}

impl Device for Usart {
    fn type_name(&self) -> &'static str {
        "stm32-usart"
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), DeviceError> {
        match name {
            props::CAPABILITIES => self.capabilities = Some(value.into_capabilities(name)?),
            props::PORT_INDEX => {
                let index = value.as_u32(name)?;
                if index as usize >= SerialPort::ALL.len() {
                    return Err(DeviceError::InvalidValue {
                        name: name.to_string(),
                        reason: format!("port index {} is out of range", index),
                    });
                }
                self.port_index = Some(index);
            }
            props::RCC => self.rcc = Some(value.as_link(name)?),
            props::NVIC => self.nvic = Some(value.as_link(name)?),
            props::CHARDEV => self.chardev = Some(value.into_chardev(name)?),
            _ => return Err(DeviceError::UnknownProperty(name.to_string())),
        }
        Ok(())
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            props::CAPABILITIES => self.capabilities.clone().map(PropertyValue::Capabilities),
            props::PORT_INDEX => self.port_index.map(|i| PropertyValue::Int(i.into())),
            props::RCC => self.rcc.map(PropertyValue::Link),
            props::NVIC => self.nvic.map(PropertyValue::Link),
            props::CHARDEV => self.chardev.clone().map(PropertyValue::Chardev),
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
        if self.nvic.is_none() {
            return Err(DeviceError::MissingProperty(props::NVIC));
        }
        if self.chardev.is_none() {
            return Err(DeviceError::MissingProperty(props::CHARDEV));
        }
        if !caps.has_serial(port) {
            return Err(DeviceError::InvalidValue {
                name: props::PORT_INDEX.to_string(),
                reason: format!("{} does not have {}", caps.name, port),
            });
        }
        self.layout = UsartRegisterLayout::for_family(caps.family);
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.status = STATUS_READY;
        self.control = [0; 4];
        self.tx_count = 0;
    }

    fn read(&self, offset: u64) -> SimResult<u8> {
        let reg_offset = offset & !3;
        let val = if reg_offset == self.layout.status_offset() {
            self.status
        } else if reg_offset == self.layout.rx_offset() {
            0
        } else if let Some(i) = self.control_index(reg_offset) {
            self.control[i]
        } else {
            0
        };
        Ok(reg_byte(val, offset))
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        if offset == self.layout.tx_offset() {
            self.push_tx(value);
            return Ok(());
        }
        let reg_offset = offset & !3;
        if let Some(i) = self.control_index(reg_offset) {
            self.control[i] = with_reg_byte(self.control[i], offset, value);
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
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let (Some(obj), Some(chardev)) = (value.as_object_mut(), &self.chardev) {
            if let Ok(backend) = chardev.lock() {
                obj.insert(
                    "chardev".to_string(),
                    serde_json::json!({ "label": backend.label(), "kind": backend.kind() }),
                );
            }
        }
        value
    }
}
