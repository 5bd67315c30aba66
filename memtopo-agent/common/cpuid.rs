//! CPUID sources
//!
//! All detection code queries the instruction through the [`CpuidSource`]
//! trait so the decode paths can be exercised against recorded register
//! values instead of the machine the tests happen to run on.

#[cfg(test)]
use std::collections::HashMap;

use memtopo_raw::cpuid;
use memtopo_raw::CpuidRegisters;

use crate::error::Result;

/// Source of CPUID register values
pub trait CpuidSource {
    /// Query one leaf and subleaf
    fn query(&self, leaf: u32, subleaf: u32) -> Result<CpuidRegisters>;

    /// Maximum supported basic leaf (leaf 0, eax)
    fn max_basic_leaf(&self) -> Result<u32> {
        Ok(self.query(0, 0)?.eax)
    }

    /// Maximum supported extended leaf (leaf 0x8000_0000, eax)
    fn max_extended_leaf(&self) -> Result<u32> {
        Ok(self.query(cpuid::EXTENDED_LEAF_BASE, 0)?.eax)
    }

    /// Whether `leaf` falls inside the advertised basic or extended range
    fn has_leaf(&self, leaf: u32) -> Result<bool> {
        let max = if leaf >= cpuid::EXTENDED_LEAF_BASE {
            self.max_extended_leaf()?
        } else {
            self.max_basic_leaf()?
        };
        Ok(leaf <= max)
    }
}

/// CPUID source backed by the instruction itself
#[derive(Debug, Clone, Copy, Default)]
pub struct HardwareCpuid;

impl CpuidSource for HardwareCpuid {
    fn query(&self, leaf: u32, subleaf: u32) -> Result<CpuidRegisters> {
        let regs = cpuid::query(leaf, subleaf)?;
        tracing::debug!(
            "CPUID({:#010X}, {}): EAX={:08X} EBX={:08X} ECX={:08X} EDX={:08X}",
            leaf,
            subleaf,
            regs.eax,
            regs.ebx,
            regs.ecx,
            regs.edx
        );
        Ok(regs)
    }
}

/// Map-backed CPUID source for decode tests
///
/// Unset leaves answer with all-zero registers, matching how hardware
/// behaves for subleaves past the end of an enumeration.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct FakeCpuid {
    regs: HashMap<(u32, u32), CpuidRegisters>,
}

#[cfg(test)]
impl FakeCpuid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, leaf: u32, subleaf: u32, eax: u32, ebx: u32, ecx: u32, edx: u32) -> Self {
        self.regs
            .insert((leaf, subleaf), CpuidRegisters { eax, ebx, ecx, edx });
        self
    }

    /// Install leaf 0: a 12-byte vendor id plus the maximum basic leaf
    pub fn with_vendor(self, id: &str, max_basic: u32) -> Self {
        let b = id.as_bytes();
        assert_eq!(b.len(), 12, "vendor ids are exactly 12 bytes");
        let word = |s: &[u8]| u32::from_le_bytes([s[0], s[1], s[2], s[3]]);
        self.set(0, 0, max_basic, word(&b[0..4]), word(&b[8..12]), word(&b[4..8]))
    }
}

#[cfg(test)]
impl CpuidSource for FakeCpuid {
    fn query(&self, leaf: u32, subleaf: u32) -> Result<CpuidRegisters> {
        Ok(self.regs.get(&(leaf, subleaf)).copied().unwrap_or_default())
    }
}
