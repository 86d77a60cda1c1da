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
pub enum RccRegisterLayout {
    #[default]
    Stm32F1,
    Stm32F4,
    Stm32L1,
}

impl RccRegisterLayout {
    pub fn for_family(family: Family) -> Self {
        match family {
            Family::F1 | Family::F3 => Self::Stm32F1,
            Family::F2 | Family::F4 => Self::Stm32F4,
            Family::L1 => Self::Stm32L1,
        }
    }

    fn cfgr_offset(self) -> u64 {
        match self {
            Self::Stm32F1 => 0x04,
            Self::Stm32F4 | Self::Stm32L1 => 0x08,
        }
    }

    fn apb2enr_offset(self) -> u64 {
        match self {
            Self::Stm32F1 => 0x18,
            Self::Stm32F4 => 0x44,
            Self::Stm32L1 => 0x20,
        }
    }

    fn apb1enr_offset(self) -> u64 {
        match self {
            Self::Stm32F1 => 0x1C,
            Self::Stm32F4 => 0x40,
            Self::Stm32L1 => 0x24,
        }
    }

    /// CR after reset: HSI on and ready (MSI on L1) with the default trim.
    fn cr_reset(self) -> u32 {
        match self {
            Self::Stm32F1 | Self::Stm32F4 => 0x0000_0083,
            Self::Stm32L1 => 0x0000_0300,
        }
    }
}

/// Reset and clock control: oscillator frequencies plus the clock-enable registers.
#[derive(Debug, Default, serde::Serialize)]
pub struct Rcc {
    #[serde(skip)]
    capabilities: Option<Arc<Capabilities>>,
    layout: RccRegisterLayout,
    hsi_freq_hz: u32,
    lsi_freq_hz: u32,
    hse_freq_hz: u32,
    lse_freq_hz: u32,
    cr: u32,
    cfgr: u32,
    apb1enr: u32,
    apb2enr: u32,
}

impl Rcc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(&self) -> RccRegisterLayout {
        self.layout
    }

    pub fn hsi_freq_hz(&self) -> u32 {
        self.hsi_freq_hz
    }

    pub fn lsi_freq_hz(&self) -> u32 {
        self.lsi_freq_hz
    }

    pub fn hse_freq_hz(&self) -> u32 {
        self.hse_freq_hz
    }

    pub fn lse_freq_hz(&self) -> u32 {
        self.lse_freq_hz
    }

    fn read_reg(&self, offset: u64) -> u32 {
        match offset {
            0x00 => self.cr,
            o if o == self.layout.cfgr_offset() => self.cfgr,
            o if o == self.layout.apb2enr_offset() => self.apb2enr,
            o if o == self.layout.apb1enr_offset() => self.apb1enr,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        match offset {
            0x00 => self.cr = value,
            o if o == self.layout.cfgr_offset() => self.cfgr = value,
            o if o == self.layout.apb2enr_offset() => self.apb2enr = value,
            o if o == self.layout.apb1enr_offset() => self.apb1enr = value,
            _ => {}
        }
    }
}

impl Device for Rcc {
    fn type_name(&self) -> &'static str {
        "stm32-rcc"
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> Result<(), DeviceError> {
        match name {
            props::CAPABILITIES => self.capabilities = Some(value.into_capabilities(name)?),
            props::HSI_FREQ_HZ => self.hsi_freq_hz = value.as_u32(name)?,
            props::LSI_FREQ_HZ => self.lsi_freq_hz = value.as_u32(name)?,
            props::HSE_FREQ_HZ => self.hse_freq_hz = value.as_u32(name)?,
            props::LSE_FREQ_HZ => self.lse_freq_hz = value.as_u32(name)?,
            _ => return Err(DeviceError::UnknownProperty(name.to_string())),
        }
        Ok(())
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        let v = match name {
            props::CAPABILITIES => return self.capabilities.clone().map(PropertyValue::Capabilities),
            props::HSI_FREQ_HZ => self.hsi_freq_hz,
            props::LSI_FREQ_HZ => self.lsi_freq_hz,
            props::HSE_FREQ_HZ => self.hse_freq_hz,
            props::LSE_FREQ_HZ => self.lse_freq_hz,
            _ => return None,
        };
        Some(PropertyValue::Int(v.into()))
    }

    fn realize(&mut self) -> Result<(), DeviceError> {
        let caps = self
            .capabilities
            .as_ref()
            .ok_or(DeviceError::MissingProperty(props::CAPABILITIES))?;
        if self.hsi_freq_hz == 0 {
            return Err(DeviceError::MissingProperty(props::HSI_FREQ_HZ));
        }
        self.layout = RccRegisterLayout::for_family(caps.family);
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.cr = self.layout.cr_reset();
        self.cfgr = 0;
        self.apb1enr = 0;
        self.apb2enr = 0;
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

#[cfg(test)]
mod tests {
    use super::{Rcc, RccRegisterLayout};
    use crate::capabilities::Capabilities;
    use crate::object::{Device, DeviceError, PropertyValue};
    use crate::peripherals::props;
    use std::sync::Arc;

    fn realized(part: &str) -> Rcc {
        let caps = Arc::new(Capabilities::preset(part).unwrap());
        let mut rcc = Rcc::new();
        rcc.set_property(props::HSI_FREQ_HZ, PropertyValue::Int(caps.hsi_freq_hz.into()))
            .unwrap();
        rcc.set_property(props::CAPABILITIES, PropertyValue::Capabilities(caps))
            .unwrap();
        rcc.realize().unwrap();
        rcc
    }

    #[test]
    fn test_rcc_f1_offsets() {
        let mut rcc = realized("stm32f103rb");
        assert_eq!(rcc.layout(), RccRegisterLayout::Stm32F1);
        rcc.write(0x18, 0xAA).unwrap();
        rcc.write(0x1C, 0x55).unwrap();
        assert_eq!(rcc.read(0x18).unwrap(), 0xAA);
        assert_eq!(rcc.read(0x1C).unwrap(), 0x55);
        assert_eq!(rcc.read(0x00).unwrap(), 0x83);
    }

    #[test]
    fn test_rcc_f4_offsets() {
        let mut rcc = realized("stm32f407vg");
        assert_eq!(rcc.layout(), RccRegisterLayout::Stm32F4);
        rcc.write(0x44, 0xCC).unwrap();
        rcc.write(0x40, 0x33).unwrap();
        assert_eq!(rcc.read(0x44).unwrap(), 0xCC);
        assert_eq!(rcc.read(0x40).unwrap(), 0x33);
        assert_eq!(rcc.read(0x18).unwrap(), 0x00);
    }

    #[test]
    fn test_rcc_l1_starts_on_msi() {
        let rcc = realized("stm32l152re");
        assert_eq!(rcc.layout(), RccRegisterLayout::Stm32L1);
        assert_eq!(rcc.read(0x01).unwrap(), 0x03);
    }

    #[test]
    fn test_reset_clears_enables() {
        let mut rcc = realized("stm32f103rb");
        rcc.write(0x18, 0xFF).unwrap();
        rcc.reset();
        assert_eq!(rcc.read(0x18).unwrap(), 0);
        rcc.reset();
        assert_eq!(rcc.read(0x00).unwrap(), 0x83);
    }

    #[test]
    fn test_realize_requires_capabilities() {
        let mut rcc = Rcc::new();
        assert!(matches!(
            rcc.realize(),
            Err(DeviceError::MissingProperty(props::CAPABILITIES))
        ));
    }
}
