//! L2/L3 cache and L2 TLB identifiers (extended leaf 0x8000_0006)
//!
//! Unlike the L1 leaf, every structure here is optional: a zero field
//! means the processor does not implement (or has disabled) the cache or
//! TLB it would describe. The decode therefore models each structure as
//! an `Option`.
//!
//! Associativities use the four-bit pattern encoding of
//! [`Associativity::from_amd_l2`], and TLB entry counts grow to twelve
//! bits.
//!
//! ## Register layout
//!
//! | Register | Bits  | Field                                      |
//! |----------|-------|--------------------------------------------|
//! | eax      | 15:0  | L2 I-TLB for 2M/4M pages (entries, assoc)  |
//! | eax      | 31:16 | L2 D-TLB for 2M/4M pages (entries, assoc)  |
//! | ebx      | 15:0  | L2 I-TLB for 4K pages (entries, assoc)     |
//! | ebx      | 31:16 | L2 D-TLB for 4K pages (entries, assoc)     |
//! | ecx      | 7:0   | L2 line bytes                              |
//! | ecx      | 11:8  | L2 lines per tag                           |
//! | ecx      | 15:12 | L2 associativity pattern                   |
//! | ecx      | 31:16 | L2 size in KiB                             |
//! | edx      | 7:0   | L3 line bytes                              |
//! | edx      | 11:8  | L3 lines per tag                           |
//! | edx      | 15:12 | L3 associativity pattern                   |
//! | edx      | 31:18 | L3 size in 512 KiB blocks                  |
//!
//! ## References
//!
//! - AMD CPUID Specification (publication #25481), function 8000_0006h

use crate::leaf::{Associativity, CpuidRegisters, LeafLayout};

/// One half-register of L2 TLB information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2TlbHalf {
    /// Entry count for 2 MiB pages (or 4 KiB on the ebx register);
    /// 4 MiB pages use two entries each
    pub entries: u16,
    pub assoc: Option<Associativity>,
}

impl L2TlbHalf {
    fn from_bits(bits: u16) -> Option<Self> {
        // An all-zero half means the TLB is absent.
        if bits == 0 {
            return None;
        }
        Some(Self {
            entries: bits & 0xFFF,
            assoc: Associativity::from_amd_l2((bits >> 12) as u8),
        })
    }
}

/// One register's worth of L2 TLB information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2TlbInfo {
    pub instruction: Option<L2TlbHalf>,
    pub data: Option<L2TlbHalf>,
}

impl L2TlbInfo {
    fn from_register(value: u32) -> Self {
        Self {
            instruction: L2TlbHalf::from_bits((value & 0xFFFF) as u16),
            data: L2TlbHalf::from_bits((value >> 16) as u16),
        }
    }
}

/// Geometry of the L2 cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2CacheInfo {
    pub line_bytes: u8,
    pub lines_per_tag: u8,
    pub assoc: Option<Associativity>,
    pub size_kib: u32,
}

impl L2CacheInfo {
    fn from_register(value: u32) -> Option<Self> {
        if value == 0 {
            return None;
        }
        Some(Self {
            line_bytes: (value & 0xFF) as u8,
            lines_per_tag: ((value >> 8) & 0xF) as u8,
            assoc: Associativity::from_amd_l2(((value >> 12) & 0xF) as u8),
            size_kib: value >> 16,
        })
    }
}

/// Geometry of the L3 cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L3CacheInfo {
    pub line_bytes: u8,
    pub lines_per_tag: u8,
    pub assoc: Option<Associativity>,
    /// Lower bound; the field counts 512 KiB blocks and some parts
    /// round their actual size down to it
    pub size_bytes: u64,
}

impl L3CacheInfo {
    fn from_register(value: u32) -> Option<Self> {
        if value == 0 {
            return None;
        }
        Some(Self {
            line_bytes: (value & 0xFF) as u8,
            lines_per_tag: ((value >> 8) & 0xF) as u8,
            assoc: Associativity::from_amd_l2(((value >> 12) & 0xF) as u8),
            size_bytes: u64::from(value >> 18) << 19,
        })
    }
}

/// Decoded extended leaf 0x8000_0006
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2L3Identifiers {
    /// L2 TLB for 2 MiB and 4 MiB pages
    pub large_page_tlb: L2TlbInfo,
    /// L2 TLB for 4 KiB pages
    pub base_page_tlb: L2TlbInfo,
    pub l2: Option<L2CacheInfo>,
    pub l3: Option<L3CacheInfo>,
}

impl LeafLayout for L2L3Identifiers {
    const LEAF: u32 = 0x8000_0006;

    fn from_registers(regs: CpuidRegisters) -> Self {
        Self {
            large_page_tlb: L2TlbInfo::from_register(regs.eax),
            base_page_tlb: L2TlbInfo::from_register(regs.ebx),
            l2: L2CacheInfo::from_register(regs.ecx),
            l3: L3CacheInfo::from_register(regs.edx),
        }
    }
}
