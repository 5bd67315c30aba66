//! Intel leaf 2 cache and TLB descriptor table
//!
//! Leaf 2 returns up to fifteen one-byte descriptors packed into its four
//! output registers. Each byte names a fixed cache, TLB, trace cache or
//! prefetch configuration out of a table published by Intel. The table
//! below carries the decoded meaning of every descriptor that names a
//! concrete structure, plus the two control descriptors (0x40 and 0xFF)
//! that carry information without describing one.
//!
//! ## References
//!
//! - Intel SDM Volume 2A, Table 3-12 (leaf 2 descriptor encodings)
//! - Intel Application Note 485 (CPUID), descriptor tables

use crate::leaf::Associativity::{self, Full, Ways};
use crate::leaf::{CacheKind, TlbKind};

/// Decoded meaning of one descriptor byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorInfo {
    /// A cache at a fixed level
    Cache {
        level: u8,
        kind: CacheKind,
        size_kib: u32,
        assoc: Associativity,
        sectored: bool,
        line_bytes: u16,
    },
    /// A TLB; descriptors covering several page sizes describe one
    /// structure reachable at each of them
    Tlb {
        level: u8,
        kind: TlbKind,
        page_sizes_kib: &'static [u32],
        entries: u16,
        assoc: Associativity,
    },
    /// NetBurst trace cache, sized in thousands of micro-ops
    Trace { size_kuops: u32, assoc: Associativity },
    /// Hardware prefetcher stride
    Prefetch { stride_bytes: u16 },
    /// No second-level cache or, when one exists, no third-level cache
    NoL2OrL3,
    /// Cache information lives exclusively in leaf 4
    CacheInLeaf4,
}

/// One row of the descriptor table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub code: u8,
    pub info: DescriptorInfo,
}

const fn itlb(
    code: u8,
    pages_kib: &'static [u32],
    entries: u16,
    assoc: Associativity,
) -> Descriptor {
    Descriptor {
        code,
        info: DescriptorInfo::Tlb {
            level: 1,
            kind: TlbKind::Instruction,
            page_sizes_kib: pages_kib,
            entries,
            assoc,
        },
    }
}

const fn dtlb(
    code: u8,
    pages_kib: &'static [u32],
    entries: u16,
    assoc: Associativity,
) -> Descriptor {
    Descriptor {
        code,
        info: DescriptorInfo::Tlb {
            level: 1,
            kind: TlbKind::Data,
            page_sizes_kib: pages_kib,
            entries,
            assoc,
        },
    }
}

const fn utlb(
    code: u8,
    level: u8,
    pages_kib: &'static [u32],
    entries: u16,
    assoc: Associativity,
) -> Descriptor {
    Descriptor {
        code,
        info: DescriptorInfo::Tlb {
            level,
            kind: TlbKind::Unified,
            page_sizes_kib: pages_kib,
            entries,
            assoc,
        },
    }
}

const fn icache(code: u8, size_kib: u32, assoc: Associativity, line_bytes: u16) -> Descriptor {
    Descriptor {
        code,
        info: DescriptorInfo::Cache {
            level: 1,
            kind: CacheKind::Instruction,
            size_kib,
            assoc,
            sectored: false,
            line_bytes,
        },
    }
}

const fn dcache(
    code: u8,
    size_kib: u32,
    assoc: Associativity,
    sectored: bool,
    line_bytes: u16,
) -> Descriptor {
    Descriptor {
        code,
        info: DescriptorInfo::Cache {
            level: 1,
            kind: CacheKind::Data,
            size_kib,
            assoc,
            sectored,
            line_bytes,
        },
    }
}

const fn unified(
    code: u8,
    level: u8,
    size_kib: u32,
    assoc: Associativity,
    sectored: bool,
    line_bytes: u16,
) -> Descriptor {
    Descriptor {
        code,
        info: DescriptorInfo::Cache {
            level,
            kind: CacheKind::Unified,
            size_kib,
            assoc,
            sectored,
            line_bytes,
        },
    }
}

const fn trace(code: u8, size_kuops: u32, assoc: Associativity) -> Descriptor {
    Descriptor {
        code,
        info: DescriptorInfo::Trace { size_kuops, assoc },
    }
}

const fn prefetch(code: u8, stride_bytes: u16) -> Descriptor {
    Descriptor {
        code,
        info: DescriptorInfo::Prefetch { stride_bytes },
    }
}

/// Every known descriptor, sorted by code
///
/// Descriptor 0x49 names an L2 cache except on Xeon MP family 0xF model
/// 0x06, where the same byte means a 4 MiB L3; the walk handles that
/// override since it needs the processor signature. 0xB1 packs two page
/// sizes with different capacities (eight 2 MiB entries, four 4 MiB) and
/// is likewise adjusted at decode time.
pub const DESCRIPTORS: &[Descriptor] = &[
    itlb(0x01, &[4], 32, Ways(4)),
    itlb(0x02, &[4096], 2, Full),
    dtlb(0x03, &[4], 64, Ways(4)),
    dtlb(0x04, &[4096], 8, Ways(4)),
    dtlb(0x05, &[4096], 32, Ways(4)),
    icache(0x06, 8, Ways(4), 32),
    icache(0x08, 16, Ways(4), 32),
    icache(0x09, 32, Ways(4), 64),
    dcache(0x0A, 8, Ways(2), false, 32),
    itlb(0x0B, &[4096], 4, Ways(4)),
    dcache(0x0C, 16, Ways(4), false, 32),
    dcache(0x0D, 16, Ways(4), false, 64),
    dcache(0x0E, 24, Ways(6), false, 64),
    unified(0x21, 2, 256, Ways(8), false, 64),
    unified(0x22, 3, 512, Ways(4), true, 64),
    unified(0x23, 3, 1024, Ways(8), true, 64),
    unified(0x25, 3, 2048, Ways(8), true, 64),
    unified(0x29, 3, 4096, Ways(8), true, 64),
    dcache(0x2C, 32, Ways(8), false, 64),
    icache(0x30, 32, Ways(8), 64),
    unified(0x39, 2, 128, Ways(4), true, 64),
    unified(0x3A, 2, 192, Ways(6), true, 64),
    unified(0x3B, 2, 128, Ways(2), true, 64),
    unified(0x3C, 2, 256, Ways(4), true, 64),
    unified(0x3D, 2, 384, Ways(6), true, 64),
    unified(0x3E, 2, 512, Ways(4), true, 64),
    Descriptor { code: 0x40, info: DescriptorInfo::NoL2OrL3 },
    unified(0x41, 2, 128, Ways(4), false, 32),
    unified(0x42, 2, 256, Ways(4), false, 32),
    unified(0x43, 2, 512, Ways(4), false, 32),
    unified(0x44, 2, 1024, Ways(4), false, 32),
    unified(0x45, 2, 2048, Ways(4), false, 32),
    unified(0x46, 3, 4096, Ways(4), false, 64),
    unified(0x47, 3, 8192, Ways(8), false, 64),
    unified(0x48, 2, 3072, Ways(12), false, 64),
    unified(0x49, 2, 4096, Ways(16), false, 64),
    unified(0x4A, 3, 6144, Ways(12), false, 64),
    unified(0x4B, 3, 8192, Ways(16), false, 64),
    unified(0x4C, 3, 12288, Ways(12), false, 64),
    unified(0x4D, 3, 16384, Ways(16), false, 64),
    unified(0x4E, 2, 6144, Ways(24), false, 64),
    itlb(0x4F, &[4], 32, Full),
    itlb(0x50, &[4, 2048, 4096], 64, Full),
    itlb(0x51, &[4, 2048, 4096], 128, Full),
    itlb(0x52, &[4, 2048, 4096], 256, Full),
    itlb(0x55, &[2048, 4096], 7, Full),
    dtlb(0x56, &[4096], 16, Ways(4)),
    dtlb(0x57, &[4], 16, Ways(4)),
    dtlb(0x59, &[4], 16, Full),
    dtlb(0x5A, &[2048, 4096], 32, Ways(4)),
    dtlb(0x5B, &[4, 4096], 64, Full),
    dtlb(0x5C, &[4, 4096], 128, Full),
    dtlb(0x5D, &[4, 4096], 256, Full),
    dcache(0x60, 16, Ways(8), true, 64),
    dcache(0x66, 8, Ways(4), true, 64),
    dcache(0x67, 16, Ways(4), true, 64),
    dcache(0x68, 32, Ways(4), true, 64),
    trace(0x70, 12, Ways(8)),
    trace(0x71, 16, Ways(8)),
    trace(0x72, 32, Ways(8)),
    trace(0x73, 64, Ways(8)),
    unified(0x78, 2, 1024, Ways(4), false, 64),
    unified(0x79, 2, 128, Ways(8), true, 64),
    unified(0x7A, 2, 256, Ways(8), true, 64),
    unified(0x7B, 2, 512, Ways(8), true, 64),
    unified(0x7C, 2, 1024, Ways(8), true, 64),
    unified(0x7D, 2, 2048, Ways(8), false, 64),
    unified(0x7F, 2, 512, Ways(2), false, 64),
    unified(0x80, 2, 512, Ways(8), false, 64),
    unified(0x82, 2, 256, Ways(8), false, 32),
    unified(0x83, 2, 512, Ways(8), false, 32),
    unified(0x84, 2, 1024, Ways(8), false, 32),
    unified(0x85, 2, 2048, Ways(8), false, 32),
    unified(0x86, 2, 512, Ways(4), false, 64),
    unified(0x87, 2, 1024, Ways(8), false, 64),
    itlb(0xB0, &[4], 128, Ways(4)),
    itlb(0xB1, &[2048, 4096], 8, Ways(4)),
    itlb(0xB2, &[4], 64, Ways(4)),
    dtlb(0xB3, &[4], 128, Ways(4)),
    dtlb(0xB4, &[4], 256, Ways(4)),
    dtlb(0xBA, &[4], 64, Ways(4)),
    dtlb(0xC0, &[4, 4096], 8, Ways(4)),
    utlb(0xCA, 2, &[4], 512, Ways(4)),
    unified(0xD0, 3, 512, Ways(4), false, 64),
    unified(0xD1, 3, 1024, Ways(4), false, 64),
    unified(0xD2, 3, 2048, Ways(4), false, 64),
    unified(0xD6, 3, 1024, Ways(8), false, 64),
    unified(0xD7, 3, 2048, Ways(8), false, 64),
    unified(0xD8, 3, 4096, Ways(8), false, 64),
    unified(0xDC, 3, 1536, Ways(12), false, 64),
    unified(0xDD, 3, 3072, Ways(12), false, 64),
    unified(0xDE, 3, 6144, Ways(12), false, 64),
    unified(0xE2, 3, 2048, Ways(16), false, 64),
    unified(0xE3, 3, 4096, Ways(16), false, 64),
    unified(0xE4, 3, 8192, Ways(16), false, 64),
    unified(0xEA, 3, 12288, Ways(24), false, 64),
    unified(0xEB, 3, 18432, Ways(24), false, 64),
    unified(0xEC, 3, 24576, Ways(24), false, 64),
    prefetch(0xF0, 64),
    prefetch(0xF1, 128),
    Descriptor { code: 0xFF, info: DescriptorInfo::CacheInLeaf4 },
];

/// Look up a descriptor byte
///
/// Reserved bytes and bytes newer than the table return `None`. The null
/// descriptor 0x00 is not in the table; callers skip it before lookup.
pub fn lookup(code: u8) -> Option<&'static Descriptor> {
    DESCRIPTORS.iter().find(|d| d.code == code)
}
