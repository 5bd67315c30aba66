//! CPUID instruction access
//!
//! A single entry point wrapping the `cpuid` instruction. The instruction
//! itself is unprivileged and cannot fault, so the only error case is
//! running on a target that does not have it.

use crate::leaf::CpuidRegisters;

pub type Result<T> = std::result::Result<T, CpuidError>;

/// Errors that can occur when issuing CPUID
#[derive(Debug, thiserror::Error)]
pub enum CpuidError {
    #[error("CPUID is not available on {arch}")]
    UnsupportedArchitecture { arch: &'static str },
}

/// First leaf of the extended function range
pub const EXTENDED_LEAF_BASE: u32 = 0x8000_0000;

/// First leaf of the hypervisor information range
pub const HYPERVISOR_LEAF_BASE: u32 = 0x4000_0000;

/// Execute CPUID with the given leaf and subleaf
///
/// Returns the four output registers. Leaves beyond the maximum the
/// processor advertises do not fail; they return whatever the hardware
/// puts there (typically the last valid leaf's output), so callers must
/// range-check against leaf 0 themselves.
#[cfg(target_arch = "x86_64")]
pub fn query(leaf: u32, subleaf: u32) -> Result<CpuidRegisters> {
    let mut eax = leaf;
    let mut ecx = subleaf;
    let ebx: u32;
    let edx: u32;

    // rbx is reserved by LLVM; hold its value in a scratch register
    // across the instruction.
    unsafe {
        std::arch::asm!(
            "mov {0:r}, rbx",
            "cpuid",
            "xchg {0:r}, rbx",
            out(reg) ebx,
            inout("eax") eax,
            inout("ecx") ecx,
            out("edx") edx,
            options(nostack, preserves_flags)
        );
    }

    Ok(CpuidRegisters { eax, ebx, ecx, edx })
}

#[cfg(not(target_arch = "x86_64"))]
pub fn query(_leaf: u32, _subleaf: u32) -> Result<CpuidRegisters> {
    Err(CpuidError::UnsupportedArchitecture {
        arch: std::env::consts::ARCH,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_arch = "x86_64")]
    fn test_query_leaf0() {
        let regs = query(0, 0).unwrap();
        // Leaf 0 eax is the maximum basic leaf; every x86_64 part
        // supports at least leaf 1.
        assert!(regs.eax >= 1);
        // The vendor string registers are never all zero.
        assert!(regs.ebx != 0 || regs.ecx != 0 || regs.edx != 0);
    }

    #[test]
    #[cfg(not(target_arch = "x86_64"))]
    fn test_query_unsupported() {
        assert!(query(0, 0).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = CpuidError::UnsupportedArchitecture { arch: "aarch64" };
        assert_eq!(err.to_string(), "CPUID is not available on aarch64");
    }
}
