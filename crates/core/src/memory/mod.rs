// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bitband;

use crate::{SimResult, SimulationError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start_addr: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramImage {
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A raw binary image placed at `start_addr`.
    pub fn from_raw(start_addr: u64, data: Vec<u8>) -> Self {
        let mut image = Self::new();
        image.add_segment(start_addr, data);
        image
    }

    pub fn add_segment(&mut self, start_addr: u64, data: Vec<u8>) {
        self.segments.push(Segment { start_addr, data });
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("region '{name}' at {base:#x} overlaps '{existing}'")]
    Overlap {
        name: String,
        base: u64,
        existing: String,
    },
    #[error("alias '{name}' ({offset:#x}+{size:#x}) exceeds target '{target}' of {target_size:#x} bytes")]
    AliasOutOfRange {
        name: String,
        offset: u64,
        size: u64,
        target: String,
        target_size: u64,
    },
    #[error("region '{target}' has no backing storage to alias")]
    NotAliasable { target: String },
    #[error("region '{0}' is empty")]
    Empty(String),
}

const PAGE_SIZE: u64 = 4096;

/// Zero-filled bytes, allocated a page at a time on first write.
#[derive(Debug, Default)]
struct Storage {
    pages: HashMap<u64, Box<[u8]>>,
}

impl Storage {
    fn get(&self, offset: u64) -> u8 {
        self.pages
            .get(&(offset / PAGE_SIZE))
            .map_or(0, |page| page[(offset % PAGE_SIZE) as usize])
    }

    fn set(&mut self, offset: u64, value: u8) {
        let page = self
            .pages
            .entry(offset / PAGE_SIZE)
            .or_insert_with(|| vec![0; PAGE_SIZE as usize].into_boxed_slice());
        page[(offset % PAGE_SIZE) as usize] = value;
    }

    fn copy_from(&mut self, offset: u64, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.set(offset + i as u64, b);
        }
    }

    fn allocated_pages(&self) -> usize {
        self.pages.len()
    }
}

type Backing = Arc<RwLock<Storage>>;

#[derive(Debug, Clone)]
enum RegionKind {
    Ram { backing: Backing },
    Alias { backing: Backing, offset: u64 },
    Bitband { target_base: u64 },
}

/// A contiguous range of guest memory, not yet placed at an address.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    name: String,
    size: u64,
    readonly: bool,
    kind: RegionKind,
}

impl MemoryRegion {
    /// Zero-filled storage of `size` bytes. Pages are allocated on first
    /// write, so large regions cost nothing until touched.
    pub fn ram(name: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            size,
            readonly: false,
            kind: RegionKind::Ram {
                backing: Arc::new(RwLock::new(Storage::default())),
            },
        }
    }

    pub fn rom(name: &str, size: u64) -> Self {
        let mut region = Self::ram(name, size);
        region.readonly = true;
        region
    }

    /// A window of `size` bytes onto `target`, starting `offset` bytes in.
    ///
    /// The alias shares storage with the target; it inherits nothing else,
    /// so it starts writable.
    pub fn alias(
        name: &str,
        target: &MemoryRegion,
        offset: u64,
        size: u64,
    ) -> Result<Self, MemoryError> {
        let (backing, base_offset) = match &target.kind {
            RegionKind::Ram { backing } => (backing.clone(), 0),
            RegionKind::Alias { backing, offset } => (backing.clone(), *offset),
            RegionKind::Bitband { .. } => {
                return Err(MemoryError::NotAliasable {
                    target: target.name.clone(),
                })
            }
        };
        if size == 0 {
            return Err(MemoryError::Empty(name.to_string()));
        }
        if offset.checked_add(size).map_or(true, |end| end > target.size) {
            return Err(MemoryError::AliasOutOfRange {
                name: name.to_string(),
                offset,
                size,
                target: target.name.clone(),
                target_size: target.size,
            });
        }
        Ok(Self {
            name: name.to_string(),
            size,
            readonly: false,
            kind: RegionKind::Alias {
                backing,
                offset: base_offset + offset,
            },
        })
    }

    pub(crate) fn bitband(name: &str, target_base: u64, size: u64) -> Self {
        Self {
            name: name.to_string(),
            size,
            readonly: false,
            kind: RegionKind::Bitband { target_base },
        }
    }

    pub fn set_readonly(&mut self, readonly: bool) {
        self.readonly = readonly;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            RegionKind::Ram { .. } => "ram",
            RegionKind::Alias { .. } => "alias",
            RegionKind::Bitband { .. } => "bitband",
        }
    }

    /// True when both regions read and write the same bytes.
    pub fn shares_backing_with(&self, other: &MemoryRegion) -> bool {
        match (self.backing(), other.backing()) {
            (Some((a, _)), Some((b, _))) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn backing(&self) -> Option<(&Backing, u64)> {
        match &self.kind {
            RegionKind::Ram { backing } => Some((backing, 0)),
            RegionKind::Alias { backing, offset } => Some((backing, *offset)),
            RegionKind::Bitband { .. } => None,
        }
    }

    /// Storage pages written so far, across every region sharing the backing.
    pub fn allocated_pages(&self) -> usize {
        self.backing().map_or(0, |(backing, _)| {
            backing
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .allocated_pages()
        })
    }

    fn load_byte(&self, offset: u64) -> Option<u8> {
        if offset >= self.size {
            return None;
        }
        let (backing, base) = self.backing()?;
        let bytes = backing.read().unwrap_or_else(|e| e.into_inner());
        Some(bytes.get(base + offset))
    }

    fn store_byte(&self, offset: u64, value: u8) -> bool {
        if offset >= self.size {
            return false;
        }
        let Some((backing, base)) = self.backing() else {
            return false;
        };
        let mut bytes = backing.write().unwrap_or_else(|e| e.into_inner());
        bytes.set(base + offset, value);
        true
    }
}

/// Where a region ended up in an address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingInfo {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub kind: &'static str,
    pub readonly: bool,
}

#[derive(Debug)]
struct Mapping {
    base: u64,
    region: MemoryRegion,
    priority: i32,
    may_overlap: bool,
    seq: usize,
}

impl Mapping {
    fn end(&self) -> u64 {
        self.base.saturating_add(self.region.size)
    }

    fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }

    fn info(&self) -> MappingInfo {
        MappingInfo {
            name: self.region.name.clone(),
            base: self.base,
            size: self.region.size,
            kind: self.region.kind_name(),
            readonly: self.region.readonly,
        }
    }
}

/// A flat guest address space.
///
/// Regions added with [`AddressSpace::add_subregion`] must not overlap each
/// other. Regions added with [`AddressSpace::add_subregion_overlap`] may
/// overlap anything; an access goes to the highest-priority region covering
/// the address, and the most recently added one on a tie.
#[derive(Debug, Default)]
pub struct AddressSpace {
    name: String,
    mappings: Vec<Mapping>,
    next_seq: usize,
}

impl AddressSpace {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mappings: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Map `region` at `base` with priority 0. Fails if it overlaps another
    /// region that was not added as overlapping.
    pub fn add_subregion(&mut self, base: u64, region: MemoryRegion) -> Result<(), MemoryError> {
        if region.size == 0 {
            return Err(MemoryError::Empty(region.name));
        }
        let end = base.saturating_add(region.size);
        if let Some(existing) = self
            .mappings
            .iter()
            .find(|m| !m.may_overlap && base < m.end() && m.base < end)
        {
            return Err(MemoryError::Overlap {
                name: region.name,
                base,
                existing: existing.region.name.clone(),
            });
        }
        self.insert(base, region, 0, false);
        Ok(())
    }

    /// Map `region` at `base`, allowing it to overlap other regions.
    pub fn add_subregion_overlap(
        &mut self,
        base: u64,
        region: MemoryRegion,
        priority: i32,
    ) -> Result<(), MemoryError> {
        if region.size == 0 {
            return Err(MemoryError::Empty(region.name));
        }
        self.insert(base, region, priority, true);
        Ok(())
    }

    fn insert(&mut self, base: u64, region: MemoryRegion, priority: i32, may_overlap: bool) {
        debug!(
            "Mapping {} '{}' at {:#010x}..{:#010x} priority {}{}",
            region.kind_name(),
            region.name,
            base,
            base.saturating_add(region.size),
            priority,
            if region.readonly { " (ro)" } else { "" }
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        let pos = self.mappings.partition_point(|m| m.base <= base);
        self.mappings.insert(
            pos,
            Mapping {
                base,
                region,
                priority,
                may_overlap,
                seq,
            },
        );
    }

    pub fn mapping(&self, name: &str) -> Option<MappingInfo> {
        self.mappings
            .iter()
            .find(|m| m.region.name == name)
            .map(Mapping::info)
    }

    /// Regions in ascending address order.
    pub fn mappings(&self) -> Vec<MappingInfo> {
        self.mappings.iter().map(Mapping::info).collect()
    }

    pub fn region(&self, name: &str) -> Option<&MemoryRegion> {
        self.mappings
            .iter()
            .find(|m| m.region.name == name)
            .map(|m| &m.region)
    }

    fn resolve(&self, addr: u64) -> Option<(&Mapping, u64)> {
        self.mappings
            .iter()
            .filter(|m| m.contains(addr))
            .max_by_key(|m| (m.priority, m.seq))
            .map(|m| (m, addr - m.base))
    }

    pub fn read_u8(&self, addr: u64) -> SimResult<u8> {
        let (mapping, offset) = self
            .resolve(addr)
            .ok_or(SimulationError::MemoryViolation(addr))?;
        match mapping.region.kind {
            RegionKind::Bitband { target_base } => {
                let bit = bitband::BitAddress::decode(target_base, offset);
                if !bit.is_first_lane() {
                    return Ok(0);
                }
                let byte = self.read_u8(bit.byte_addr)?;
                Ok((byte >> bit.bit) & 1)
            }
            _ => mapping
                .region
                .load_byte(offset)
                .ok_or(SimulationError::MemoryViolation(addr)),
        }
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        let (mapping, offset) = self
            .resolve(addr)
            .ok_or(SimulationError::MemoryViolation(addr))?;
        if mapping.region.readonly {
            return Err(SimulationError::ReadOnlyViolation(addr));
        }
        let bitband_target = match mapping.region.kind {
            RegionKind::Bitband { target_base } => Some(target_base),
            _ => None,
        };
        let Some(target_base) = bitband_target else {
            return if mapping.region.store_byte(offset, value) {
                Ok(())
            } else {
                Err(SimulationError::MemoryViolation(addr))
            };
        };

        let bit = bitband::BitAddress::decode(target_base, offset);
        if !bit.is_first_lane() {
            return Ok(());
        }
        let byte = self.read_u8(bit.byte_addr)?;
        let updated = if value & 1 != 0 {
            byte | (1 << bit.bit)
        } else {
            byte & !(1 << bit.bit)
        };
        self.write_u8(bit.byte_addr, updated)
    }

    pub fn read_u16(&self, addr: u64) -> SimResult<u16> {
        let b0 = self.read_u8(addr)? as u16;
        let b1 = self.read_u8(lane(addr, 1)?)? as u16;
        Ok(b0 | (b1 << 8))
    }

    pub fn read_u32(&self, addr: u64) -> SimResult<u32> {
        let b0 = self.read_u8(addr)? as u32;
        let b1 = self.read_u8(lane(addr, 1)?)? as u32;
        let b2 = self.read_u8(lane(addr, 2)?)? as u32;
        let b3 = self.read_u8(lane(addr, 3)?)? as u32;
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    pub fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()> {
        lane(addr, 1)?;
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(lane(addr, 1)?, ((value >> 8) & 0xFF) as u8)?;
        Ok(())
    }

    pub fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        lane(addr, 3)?;
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(lane(addr, 1)?, ((value >> 8) & 0xFF) as u8)?;
        self.write_u8(lane(addr, 2)?, ((value >> 16) & 0xFF) as u8)?;
        self.write_u8(lane(addr, 3)?, ((value >> 24) & 0xFF) as u8)?;
        Ok(())
    }

    /// Program a segment into backed storage, ignoring read-only protection.
    ///
    /// Returns false, leaving memory untouched, unless the whole segment lands
    /// inside a single region with backing storage.
    pub fn load_segment(&mut self, segment: &Segment) -> bool {
        let len = segment.data.len() as u64;
        let Some((mapping, offset)) = self.resolve(segment.start_addr) else {
            return false;
        };
        if offset
            .checked_add(len)
            .map_or(true, |end| end > mapping.region.size)
        {
            return false;
        }
        let Some((backing, base)) = mapping.region.backing() else {
            return false;
        };
        let mut bytes = backing.write().unwrap_or_else(|e| e.into_inner());
        bytes.copy_from(base + offset, &segment.data);
        true
    }
}

/// Address of byte `n` of a multi-byte access starting at `addr`.
fn lane(addr: u64, n: u64) -> SimResult<u64> {
    addr.checked_add(n).ok_or(SimulationError::MemoryViolation(addr))
}
