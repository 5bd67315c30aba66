// Cache and TLB topology detection
// Dispatches to the vendor-specific CPUID decoder and assembles the result

pub mod amd;
pub mod check;
pub mod hierarchy;
pub mod intel;

pub use check::{check, CheckReport};
pub use hierarchy::{
    CacheSlot, HierarchyLevel, MemoryHierarchy, TlbSlot, MAX_HIERARCHY_LEVELS, SLOTS_PER_LEVEL,
};

use crate::common::ident::{self, ProcessorIdent, Vendor};
use crate::common::{AffinityGuard, CpuidSource, HardwareCpuid};
use crate::error::{MemtopoError, Result};

/// Detected topology of one logical CPU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuTopology {
    /// CPU the probe ran on, `None` when unpinned
    pub cpu: Option<i32>,
    pub processor: ProcessorIdent,
    pub hierarchy: MemoryHierarchy,
}

/// Detect the topology visible through `source`
pub fn detect_with<S: CpuidSource>(source: &S) -> Result<CpuTopology> {
    let processor = ident::identify(source)?;
    let mut hierarchy = MemoryHierarchy::new();

    match &processor.vendor {
        Vendor::Intel => intel::decode(source, processor.signature, &mut hierarchy)?,
        Vendor::Amd => amd::decode(source, &mut hierarchy)?,
        Vendor::Other(id) => return Err(MemtopoError::UnsupportedVendor(id.clone())),
    }

    tracing::info!(
        "Detected cache topology: L1 {} B, L2 {} B, L3 {} B",
        hierarchy.level_cache_bytes(1),
        hierarchy.level_cache_bytes(2),
        hierarchy.level_cache_bytes(3)
    );

    Ok(CpuTopology {
        cpu: None,
        processor,
        hierarchy,
    })
}

/// Detect the topology of whichever CPU the current thread runs on
pub fn detect() -> Result<CpuTopology> {
    detect_with(&HardwareCpuid)
}

/// Pin to `cpu`, detect its topology, then restore the previous affinity
pub fn detect_on_cpu(cpu: i32) -> Result<CpuTopology> {
    let _guard = AffinityGuard::new(cpu)?;
    let mut topology = detect_with(&HardwareCpuid)?;
    topology.cpu = Some(cpu);
    Ok(topology)
}
