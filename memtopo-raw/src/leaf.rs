//! Typed views over CPUID output registers
//!
//! Every leaf decode in this crate starts from a [`CpuidRegisters`] value
//! and implements [`LeafLayout`] to turn the packed bits into named fields.
//! Unlike an MSR-style register file there is no encode direction: CPUID
//! leaves are read-only, so the trait only decodes.

use std::fmt;

/// The four 32-bit output registers of one CPUID invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuidRegisters {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

impl CpuidRegisters {
    /// The sixteen output bytes in register order eax, ebx, ecx, edx,
    /// each register contributing its bytes little-endian
    ///
    /// Leaf 2 and the AMD extended leaves are specified byte-wise, so
    /// their decoders index this view instead of shifting.
    pub fn bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&self.eax.to_le_bytes());
        out[4..8].copy_from_slice(&self.ebx.to_le_bytes());
        out[8..12].copy_from_slice(&self.ecx.to_le_bytes());
        out[12..16].copy_from_slice(&self.edx.to_le_bytes());
        out
    }

    /// The registers in output order eax, ebx, ecx, edx
    pub fn as_array(&self) -> [u32; 4] {
        [self.eax, self.ebx, self.ecx, self.edx]
    }
}

/// A typed decode of one CPUID leaf
pub trait LeafLayout: Sized {
    /// Leaf this layout decodes
    const LEAF: u32;

    /// Decode the output registers into the typed layout
    ///
    /// Decoding is total: any register contents produce a value. Fields
    /// gated on nonzero bits come back as `None` when absent.
    fn from_registers(regs: CpuidRegisters) -> Self;
}

/// Cache classification shared by every decode path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Data,
    Instruction,
    Unified,
    /// NetBurst trace cache, sized in micro-ops rather than bytes
    Trace,
}

impl CacheKind {
    pub fn name(&self) -> &'static str {
        match self {
            CacheKind::Data => "data",
            CacheKind::Instruction => "instruction",
            CacheKind::Unified => "unified",
            CacheKind::Trace => "trace",
        }
    }
}

/// TLB classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlbKind {
    Instruction,
    Data,
    Unified,
}

impl TlbKind {
    pub fn name(&self) -> &'static str {
        match self {
            TlbKind::Instruction => "instruction",
            TlbKind::Data => "data",
            TlbKind::Unified => "unified",
        }
    }
}

/// Cache or TLB associativity
///
/// Fully associative structures are a variant of their own instead of a
/// sentinel way count, so arithmetic on `Ways` never has to special-case
/// the encodings the leaves use for "full" (0xFF on the AMD L1 leaf, a
/// dedicated flag bit on Intel leaf 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Associativity {
    /// Direct mapped
    Direct,
    /// n-way set associative
    Ways(u16),
    /// Fully associative
    Full,
}

impl Associativity {
    /// Decode an associativity byte from the AMD L1 leaf (0x8000_0005)
    ///
    /// 0x00 is reserved, 0x01 direct mapped, 0xFF fully associative,
    /// anything else is the literal way count.
    pub fn from_amd_l1(raw: u8) -> Option<Self> {
        match raw {
            0x00 => None,
            0x01 => Some(Self::Direct),
            0xFF => Some(Self::Full),
            n => Some(Self::Ways(u16::from(n))),
        }
    }

    /// Decode a four-bit associativity pattern from the AMD L2/L3 leaf
    /// (0x8000_0006)
    ///
    /// Pattern 0x0 means the structure is absent or disabled; 0x3, 0x5,
    /// 0x7 and 0x9 are reserved. Both decode to `None`.
    pub fn from_amd_l2(pattern: u8) -> Option<Self> {
        match pattern {
            0x1 => Some(Self::Direct),
            0x2 => Some(Self::Ways(2)),
            0x4 => Some(Self::Ways(4)),
            0x6 => Some(Self::Ways(8)),
            0x8 => Some(Self::Ways(16)),
            0xA => Some(Self::Ways(32)),
            0xB => Some(Self::Ways(48)),
            0xC => Some(Self::Ways(64)),
            0xD => Some(Self::Ways(96)),
            0xE => Some(Self::Ways(128)),
            0xF => Some(Self::Full),
            _ => None,
        }
    }

    /// Way count, when the structure is set associative
    pub fn ways(&self) -> Option<u16> {
        match self {
            Self::Direct => Some(1),
            Self::Ways(n) => Some(*n),
            Self::Full => None,
        }
    }
}

impl fmt::Display for Associativity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct mapped"),
            Self::Ways(n) => write!(f, "{n}-way"),
            Self::Full => write!(f, "fully associative"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_order() {
        let regs = CpuidRegisters {
            eax: 0x0403_0201,
            ebx: 0x0807_0605,
            ecx: 0x0C0B_0A09,
            edx: 0x100F_0E0D,
        };
        let bytes = regs.bytes();
        for (i, b) in bytes.iter().enumerate() {
            assert_eq!(usize::from(*b), i + 1);
        }
    }

    #[test]
    fn test_amd_l1_assoc() {
        assert_eq!(Associativity::from_amd_l1(0x00), None);
        assert_eq!(Associativity::from_amd_l1(0x01), Some(Associativity::Direct));
        assert_eq!(Associativity::from_amd_l1(0x04), Some(Associativity::Ways(4)));
        assert_eq!(Associativity::from_amd_l1(0xFF), Some(Associativity::Full));
    }

    #[test]
    fn test_amd_l2_assoc_patterns() {
        assert_eq!(Associativity::from_amd_l2(0x0), None);
        assert_eq!(Associativity::from_amd_l2(0x1), Some(Associativity::Direct));
        assert_eq!(Associativity::from_amd_l2(0x6), Some(Associativity::Ways(8)));
        assert_eq!(Associativity::from_amd_l2(0xA), Some(Associativity::Ways(32)));
        assert_eq!(Associativity::from_amd_l2(0xB), Some(Associativity::Ways(48)));
        assert_eq!(Associativity::from_amd_l2(0xE), Some(Associativity::Ways(128)));
        assert_eq!(Associativity::from_amd_l2(0xF), Some(Associativity::Full));
        // Reserved patterns decode to nothing.
        for pattern in [0x3, 0x5, 0x7, 0x9] {
            assert_eq!(Associativity::from_amd_l2(pattern), None);
        }
    }

    #[test]
    fn test_ways() {
        assert_eq!(Associativity::Direct.ways(), Some(1));
        assert_eq!(Associativity::Ways(8).ways(), Some(8));
        assert_eq!(Associativity::Full.ways(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Associativity::Direct.to_string(), "direct mapped");
        assert_eq!(Associativity::Ways(16).to_string(), "16-way");
        assert_eq!(Associativity::Full.to_string(), "fully associative");
    }
}
