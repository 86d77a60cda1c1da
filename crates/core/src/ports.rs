// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::capabilities::{GpioPorts, SerialPorts};
use crate::object::DeviceHandle;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

pub const GPIO_PORT_COUNT: usize = 7;
pub const SERIAL_PORT_COUNT: usize = 6;

/// A port identifier that indexes a fixed-size device table.
pub trait Port: Copy + fmt::Debug + 'static {
    /// Every port, in ascending index order.
    const ALL: &'static [Self];

    fn index(self) -> usize;

    /// Name of the child device created for this port.
    fn child_name(self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GpioPort {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl GpioPort {
    pub fn letter(self) -> char {
        (b'a' + self as u8) as char
    }

    pub fn flag(self) -> GpioPorts {
        GpioPorts::from_bits_truncate(1 << self as u8)
    }
}

impl Port for GpioPort {
    const ALL: &'static [Self] = &[
        GpioPort::A,
        GpioPort::B,
        GpioPort::C,
        GpioPort::D,
        GpioPort::E,
        GpioPort::F,
        GpioPort::G,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn child_name(self) -> String {
        format!("gpio[{}]", self.letter())
    }
}

impl fmt::Display for GpioPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.letter().to_ascii_uppercase())
    }
}

impl FromStr for GpioPort {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let v = value.trim().to_ascii_lowercase();
        let letter = v.strip_prefix("gpio").unwrap_or(v.as_str());
        GpioPort::ALL
            .iter()
            .copied()
            .find(|p| letter.len() == 1 && letter.starts_with(p.letter()))
            .ok_or_else(|| format!("unknown GPIO port '{}'; expected a..g", value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SerialPort {
    Usart1,
    Usart2,
    Usart3,
    Uart4,
    Uart5,
    Usart6,
}

impl SerialPort {
    /// 1-based peripheral number as printed in reference manuals.
    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn flag(self) -> SerialPorts {
        SerialPorts::from_bits_truncate(1 << self as u8)
    }
}

impl Port for SerialPort {
    const ALL: &'static [Self] = &[
        SerialPort::Usart1,
        SerialPort::Usart2,
        SerialPort::Usart3,
        SerialPort::Uart4,
        SerialPort::Uart5,
        SerialPort::Usart6,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn child_name(self) -> String {
        format!("usart[{}]", self.number())
    }
}

impl fmt::Display for SerialPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerialPort::Uart4 | SerialPort::Uart5 => write!(f, "UART{}", self.number()),
            _ => write!(f, "USART{}", self.number()),
        }
    }
}

impl FromStr for SerialPort {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let v = value.trim().to_ascii_lowercase();
        let number = v
            .strip_prefix("usart")
            .or_else(|| v.strip_prefix("uart"))
            .and_then(|n| n.parse::<usize>().ok());
        number
            .and_then(|n| SerialPort::ALL.iter().copied().find(|p| p.number() == n))
            .ok_or_else(|| format!("unknown serial port '{}'; expected usart1..usart6", value))
    }
}

/// Fixed table of device handles, one slot per port.
///
/// A slot is either populated or empty; the assembler fills it exactly when
/// the matching capability flag is set and never touches it afterwards.
#[derive(Debug, Clone)]
pub struct PortTable<P: Port, const N: usize> {
    slots: [Option<DeviceHandle>; N],
    _port: PhantomData<P>,
}

impl<P: Port, const N: usize> Default for PortTable<P, N> {
    fn default() -> Self {
        Self {
            slots: [None; N],
            _port: PhantomData,
        }
    }
}

impl<P: Port, const N: usize> PortTable<P, N> {
    pub fn get(&self, port: P) -> Option<DeviceHandle> {
        self.slots.get(port.index()).copied().flatten()
    }

    pub(crate) fn insert(&mut self, port: P, handle: DeviceHandle) {
        if let Some(slot) = self.slots.get_mut(port.index()) {
            *slot = Some(handle);
        }
    }

    /// Populated slots in ascending port order.
    pub fn iter(&self) -> impl Iterator<Item = (P, DeviceHandle)> + '_ {
        P::ALL
            .iter()
            .filter_map(move |&port| self.get(port).map(|handle| (port, handle)))
    }

    pub fn handles(&self) -> impl Iterator<Item = DeviceHandle> + '_ {
        self.iter().map(|(_, handle)| handle)
    }

    pub fn populated(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.populated() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_names() {
        assert_eq!(GpioPort::A.child_name(), "gpio[a]");
        assert_eq!(GpioPort::G.child_name(), "gpio[g]");
        assert_eq!(SerialPort::Usart1.child_name(), "usart[1]");
        assert_eq!(SerialPort::Usart6.child_name(), "usart[6]");
    }

    #[test]
    fn test_port_parsing() {
        assert_eq!("b".parse::<GpioPort>().unwrap(), GpioPort::B);
        assert_eq!("GPIOF".parse::<GpioPort>().unwrap(), GpioPort::F);
        assert!("h".parse::<GpioPort>().is_err());
        assert!("ab".parse::<GpioPort>().is_err());

        assert_eq!("uart4".parse::<SerialPort>().unwrap(), SerialPort::Uart4);
        assert_eq!("USART6".parse::<SerialPort>().unwrap(), SerialPort::Usart6);
        assert_eq!("usart5".parse::<SerialPort>().unwrap(), SerialPort::Uart5);
        assert!("usart7".parse::<SerialPort>().is_err());
        assert!("spi1".parse::<SerialPort>().is_err());
    }

    #[test]
    fn test_flags_match_indices() {
        assert_eq!(GpioPort::C.flag(), GpioPorts::C);
        assert_eq!(SerialPort::Uart5.flag(), SerialPorts::UART5);
        assert_eq!(SerialPort::Uart4.to_string(), "UART4");
        assert_eq!(SerialPort::Usart2.to_string(), "USART2");
    }

    #[test]
    fn test_table_iterates_in_port_order() {
        let mut table: PortTable<GpioPort, GPIO_PORT_COUNT> = PortTable::default();
        assert!(table.is_empty());

        table.insert(GpioPort::D, DeviceHandle::from_index(4));
        table.insert(GpioPort::A, DeviceHandle::from_index(9));

        let ports: Vec<_> = table.iter().map(|(port, _)| port).collect();
        assert_eq!(ports, vec![GpioPort::A, GpioPort::D]);
        assert_eq!(table.populated(), 2);
        assert_eq!(table.get(GpioPort::B), None);
    }
}
