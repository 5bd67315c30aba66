//! L1 TLB and cache identifiers (extended leaf 0x8000_0005)
//!
//! Each register of this leaf is carved into four byte fields. The eax
//! and ebx TLB registers pack instruction values in the low half and data
//! values in the high half; the ecx and edx cache registers describe one
//! cache each.
//!
//! ## Register layout
//!
//! | Register | Byte 0        | Byte 1      | Byte 2        | Byte 3      |
//! |----------|---------------|-------------|---------------|-------------|
//! | eax      | I-TLB entries | I-TLB assoc | D-TLB entries | D-TLB assoc | (2M/4M pages)
//! | ebx      | I-TLB entries | I-TLB assoc | D-TLB entries | D-TLB assoc | (4K pages)
//! | ecx      | line bytes    | lines/tag   | assoc         | size KiB    | (L1 data)
//! | edx      | line bytes    | lines/tag   | assoc         | size KiB    | (L1 instruction)
//!
//! Entry counts on the eax register are for 2 MiB pages; a 4 MiB page
//! occupies two entries, halving the usable count.
//!
//! ## References
//!
//! - AMD CPUID Specification (publication #25481), function 8000_0005h

use crate::leaf::{Associativity, CpuidRegisters, LeafLayout};

/// One register's worth of L1 TLB information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L1TlbInfo {
    pub instruction_entries: u8,
    pub instruction_assoc: Option<Associativity>,
    pub data_entries: u8,
    pub data_assoc: Option<Associativity>,
}

impl L1TlbInfo {
    fn from_register(value: u32) -> Self {
        let bytes = value.to_le_bytes();
        Self {
            instruction_entries: bytes[0],
            instruction_assoc: Associativity::from_amd_l1(bytes[1]),
            data_entries: bytes[2],
            data_assoc: Associativity::from_amd_l1(bytes[3]),
        }
    }
}

/// Geometry of one L1 cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L1CacheInfo {
    pub line_bytes: u8,
    /// Lines per cache tag; greater than 1 on sectored designs
    pub lines_per_tag: u8,
    pub assoc: Option<Associativity>,
    pub size_kib: u8,
}

impl L1CacheInfo {
    fn from_register(value: u32) -> Self {
        let bytes = value.to_le_bytes();
        Self {
            line_bytes: bytes[0],
            lines_per_tag: bytes[1],
            assoc: Associativity::from_amd_l1(bytes[2]),
            size_kib: bytes[3],
        }
    }
}

/// Decoded extended leaf 0x8000_0005
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L1Identifiers {
    /// L1 TLB for 2 MiB and 4 MiB pages
    pub large_page_tlb: L1TlbInfo,
    /// L1 TLB for 4 KiB pages
    pub base_page_tlb: L1TlbInfo,
    pub data_cache: L1CacheInfo,
    pub instruction_cache: L1CacheInfo,
}

impl LeafLayout for L1Identifiers {
    const LEAF: u32 = 0x8000_0005;

    fn from_registers(regs: CpuidRegisters) -> Self {
        Self {
            large_page_tlb: L1TlbInfo::from_register(regs.eax),
            base_page_tlb: L1TlbInfo::from_register(regs.ebx),
            data_cache: L1CacheInfo::from_register(regs.ecx),
            instruction_cache: L1CacheInfo::from_register(regs.edx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Register values recorded from a Zen 1 part (Ryzen 7 1700).
    const ZEN: CpuidRegisters = CpuidRegisters {
        eax: 0xFF40_FF40,
        ebx: 0xFF40_FF40,
        ecx: 0x2008_0140,
        edx: 0x4004_0140,
    };

    #[test]
    fn test_tlbs() {
        let id = L1Identifiers::from_registers(ZEN);

        assert_eq!(id.large_page_tlb.instruction_entries, 64);
        assert_eq!(id.large_page_tlb.instruction_assoc, Some(Associativity::Full));
        assert_eq!(id.large_page_tlb.data_entries, 64);
        assert_eq!(id.large_page_tlb.data_assoc, Some(Associativity::Full));

        assert_eq!(id.base_page_tlb.instruction_entries, 64);
        assert_eq!(id.base_page_tlb.data_assoc, Some(Associativity::Full));
    }

    #[test]
    fn test_caches() {
        let id = L1Identifiers::from_registers(ZEN);

        assert_eq!(id.data_cache.size_kib, 32);
        assert_eq!(id.data_cache.assoc, Some(Associativity::Ways(8)));
        assert_eq!(id.data_cache.line_bytes, 64);
        assert_eq!(id.data_cache.lines_per_tag, 1);

        assert_eq!(id.instruction_cache.size_kib, 64);
        assert_eq!(id.instruction_cache.assoc, Some(Associativity::Ways(4)));
        assert_eq!(id.instruction_cache.line_bytes, 64);
    }

    #[test]
    fn test_zero_register() {
        let id = L1Identifiers::from_registers(CpuidRegisters::default());
        assert_eq!(id.data_cache.assoc, None);
        assert_eq!(id.data_cache.size_kib, 0);
        assert_eq!(id.large_page_tlb.instruction_assoc, None);
    }
}
