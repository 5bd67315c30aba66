//! Deterministic cache parameters (leaf 4)
//!
//! Leaf 4 enumerates caches one subleaf at a time. Each subleaf describes
//! one cache parametrically; a cache type of zero terminates the
//! enumeration. All count-like fields are stored minus one, so the decode
//! adds it back.
//!
//! ## Register layout
//!
//! | Register | Bits  | Field                                   |
//! |----------|-------|-----------------------------------------|
//! | eax      | 4:0   | Cache type (0 none, 1 data, 2 inst, 3 unified) |
//! | eax      | 7:5   | Cache level                             |
//! | eax      | 8     | Self-initializing                       |
//! | eax      | 9     | Fully associative                       |
//! | eax      | 25:14 | Max logical processors sharing, minus 1 |
//! | eax      | 31:26 | Max cores per package, minus 1          |
//! | ebx      | 11:0  | Line size in bytes, minus 1             |
//! | ebx      | 21:12 | Physical line partitions, minus 1       |
//! | ebx      | 31:22 | Ways of associativity, minus 1          |
//! | ecx      | 31:0  | Number of sets, minus 1                 |
//! | edx      | 0     | Write-back invalidate behavior          |
//! | edx      | 1     | Cache inclusiveness                     |
//! | edx      | 2     | Complex cache indexing                  |

use crate::leaf::{CacheKind, CpuidRegisters, LeafLayout};

/// Cache type field of one subleaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheType {
    /// No more caches; terminates the subleaf walk
    Null,
    Data,
    Instruction,
    Unified,
    /// Values 4 through 31 are reserved
    Reserved(u8),
}

impl CacheType {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => Self::Null,
            1 => Self::Data,
            2 => Self::Instruction,
            3 => Self::Unified,
            n => Self::Reserved(n as u8),
        }
    }

    /// Hierarchy cache kind, when the type names a real cache
    pub fn kind(&self) -> Option<CacheKind> {
        match self {
            Self::Data => Some(CacheKind::Data),
            Self::Instruction => Some(CacheKind::Instruction),
            Self::Unified => Some(CacheKind::Unified),
            Self::Null | Self::Reserved(_) => None,
        }
    }
}

/// One decoded leaf 4 subleaf
#[derive(Debug, Clone, Copy)]
pub struct CacheParameters {
    pub cache_type: CacheType,
    /// 1-based cache level
    pub level: u8,
    pub self_initializing: bool,
    pub fully_associative: bool,
    /// Maximum logical processors sharing this cache
    pub threads_sharing: u32,
    /// Maximum processor cores in the physical package
    pub cores_per_package: u32,
    /// Line size in bytes
    pub line_bytes: u32,
    /// Physical line partitions
    pub partitions: u32,
    /// Ways of associativity
    pub ways: u32,
    /// Number of sets
    pub sets: u64,
    /// WBINVD/INVD is not guaranteed to act on lower levels shared
    /// with other threads
    pub write_back_invalidate: bool,
    /// Cache is inclusive of lower cache levels
    pub inclusive: bool,
    /// Complex function used to index the cache
    pub complex_indexing: bool,
}

impl LeafLayout for CacheParameters {
    const LEAF: u32 = 0x4;

    fn from_registers(regs: CpuidRegisters) -> Self {
        let eax = regs.eax;
        let ebx = regs.ebx;
        Self {
            cache_type: CacheType::from_bits(eax & 0x1F),
            level: ((eax >> 5) & 0x7) as u8,
            self_initializing: (eax >> 8) & 0x1 != 0,
            fully_associative: (eax >> 9) & 0x1 != 0,
            threads_sharing: ((eax >> 14) & 0xFFF) + 1,
            cores_per_package: (eax >> 26) + 1,
            line_bytes: (ebx & 0xFFF) + 1,
            partitions: ((ebx >> 12) & 0x3FF) + 1,
            ways: (ebx >> 22) + 1,
            sets: u64::from(regs.ecx) + 1,
            write_back_invalidate: regs.edx & 0x1 != 0,
            inclusive: (regs.edx >> 1) & 0x1 != 0,
            complex_indexing: (regs.edx >> 2) & 0x1 != 0,
        }
    }
}

impl CacheParameters {
    /// Total size in bytes: ways times partitions times line size times sets
    pub fn size_bytes(&self) -> u64 {
        u64::from(self.ways) * u64::from(self.partitions) * u64::from(self.line_bytes) * self.sets
    }

    /// Total number of lines: ways times partitions times sets
    pub fn lines(&self) -> u64 {
        u64::from(self.ways) * u64::from(self.partitions) * self.sets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Register values recorded from a Skylake client part (i7-6700K).
    const L1D: CpuidRegisters = CpuidRegisters {
        eax: 0x1C00_4121,
        ebx: 0x01C0_003F,
        ecx: 0x0000_003F,
        edx: 0,
    };
    const L1I: CpuidRegisters = CpuidRegisters {
        eax: 0x1C00_4122,
        ebx: 0x01C0_003F,
        ecx: 0x0000_003F,
        edx: 0,
    };
    const L2: CpuidRegisters = CpuidRegisters {
        eax: 0x1C00_4143,
        ebx: 0x00C0_003F,
        ecx: 0x0000_03FF,
        edx: 0,
    };
    const L3: CpuidRegisters = CpuidRegisters {
        eax: 0x1C03_C163,
        ebx: 0x03C0_003F,
        ecx: 0x0000_1FFF,
        edx: 0x6,
    };

    #[test]
    fn test_l1_data() {
        let p = CacheParameters::from_registers(L1D);
        assert_eq!(p.cache_type, CacheType::Data);
        assert_eq!(p.cache_type.kind(), Some(CacheKind::Data));
        assert_eq!(p.level, 1);
        assert!(p.self_initializing);
        assert!(!p.fully_associative);
        assert_eq!(p.threads_sharing, 2);
        assert_eq!(p.cores_per_package, 8);
        assert_eq!(p.line_bytes, 64);
        assert_eq!(p.partitions, 1);
        assert_eq!(p.ways, 8);
        assert_eq!(p.sets, 64);
        assert_eq!(p.size_bytes(), 32 * 1024);
        assert_eq!(p.lines(), 512);
    }

    #[test]
    fn test_l1_instruction() {
        let p = CacheParameters::from_registers(L1I);
        assert_eq!(p.cache_type, CacheType::Instruction);
        assert_eq!(p.level, 1);
        assert_eq!(p.size_bytes(), 32 * 1024);
    }

    #[test]
    fn test_l2_unified() {
        let p = CacheParameters::from_registers(L2);
        assert_eq!(p.cache_type, CacheType::Unified);
        assert_eq!(p.level, 2);
        assert_eq!(p.ways, 4);
        assert_eq!(p.sets, 1024);
        assert_eq!(p.size_bytes(), 256 * 1024);
        assert!(!p.inclusive);
    }

    #[test]
    fn test_l3_flags() {
        let p = CacheParameters::from_registers(L3);
        assert_eq!(p.cache_type, CacheType::Unified);
        assert_eq!(p.level, 3);
        assert_eq!(p.ways, 16);
        assert_eq!(p.sets, 8192);
        assert_eq!(p.threads_sharing, 16);
        assert_eq!(p.size_bytes(), 8 * 1024 * 1024);
        assert!(p.inclusive);
        assert!(p.complex_indexing);
        assert!(!p.write_back_invalidate);
    }

    #[test]
    fn test_null_terminator() {
        let p = CacheParameters::from_registers(CpuidRegisters::default());
        assert_eq!(p.cache_type, CacheType::Null);
        assert_eq!(p.cache_type.kind(), None);
    }

    #[test]
    fn test_reserved_type() {
        let p = CacheParameters::from_registers(CpuidRegisters {
            eax: 0x1F,
            ..CpuidRegisters::default()
        });
        assert_eq!(p.cache_type, CacheType::Reserved(31));
        assert_eq!(p.cache_type.kind(), None);
    }
}
