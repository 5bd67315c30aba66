//! Structural validation of a detected topology
//!
//! Used by the `--check` flag as a smoke test: a machine whose decoded
//! topology violates these rules either has a CPUID implementation this
//! code mishandles or a hypervisor feeding it junk. Failures are
//! findings, not errors; the caller decides the exit code.

use memtopo_raw::Associativity;

use crate::topology::CpuTopology;

/// Outcome of validating one topology
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    failures: Vec<String>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    fn fail(&mut self, message: String) {
        self.failures.push(message);
    }
}

/// Validate structural expectations on a decoded topology
pub fn check(topology: &CpuTopology) -> CheckReport {
    let mut report = CheckReport::default();
    let hierarchy = &topology.hierarchy;

    if hierarchy.depth() == 0 {
        report.fail("no cache or TLB information detected".to_string());
    } else if hierarchy
        .level(1)
        .is_none_or(|l| l.caches().next().is_none())
    {
        report.fail("no level 1 cache detected".to_string());
    }

    for (level, entry) in hierarchy.levels() {
        for cache in entry.caches() {
            let name = format!("L{level} {} cache", cache.kind.name());

            if cache.size_bytes == 0 {
                report.fail(format!("{name} reports zero size"));
            }

            if cache.line_bytes > 0 {
                if !cache.line_bytes.is_power_of_two() {
                    report.fail(format!(
                        "{name} line size {} is not a power of two",
                        cache.line_bytes
                    ));
                }
                if u64::from(cache.line_bytes) > cache.size_bytes {
                    report.fail(format!(
                        "{name} line size {} exceeds cache size {}",
                        cache.line_bytes, cache.size_bytes
                    ));
                }
                if cache.lines > 0 && cache.lines * u64::from(cache.line_bytes) != cache.size_bytes
                {
                    report.fail(format!(
                        "{name} geometry inconsistent: {} lines of {} bytes against {} bytes total",
                        cache.lines, cache.line_bytes, cache.size_bytes
                    ));
                }
            }

            if let Some(Associativity::Ways(n)) = cache.assoc {
                if n == 0 || n > 1024 {
                    report.fail(format!("{name} reports implausible associativity {n}"));
                } else if cache.line_bytes > 0
                    && u64::from(n) * u64::from(cache.line_bytes) > cache.size_bytes
                {
                    report.fail(format!(
                        "{name} geometry inconsistent: {n} ways of {}-byte lines exceed {} bytes",
                        cache.line_bytes, cache.size_bytes
                    ));
                }
            }
        }

        for tlb in entry.tlbs() {
            let name = format!("L{level} {} TLB", tlb.kind.name());

            if tlb.entries == 0 {
                report.fail(format!("{name} reports zero entries"));
            }
            if tlb.page_bytes == 0 {
                report.fail(format!("{name} reports zero page size"));
            } else if !tlb.page_bytes.is_power_of_two() {
                report.fail(format!(
                    "{name} page size {} is not a power of two",
                    tlb.page_bytes
                ));
            }
            if let Some(Associativity::Ways(n)) = tlb.assoc {
                if n == 0 || n > 1024 {
                    report.fail(format!("{name} reports implausible associativity {n}"));
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ident::{ProcessorIdent, Vendor};
    use crate::topology::hierarchy::{CacheSlot, MemoryHierarchy, TlbSlot};
    use memtopo_raw::{CacheKind, TlbKind};

    fn topology(hierarchy: MemoryHierarchy) -> CpuTopology {
        CpuTopology {
            cpu: None,
            processor: ProcessorIdent {
                vendor: Vendor::Intel,
                signature: None,
                hypervisor: None,
            },
            hierarchy,
        }
    }

    fn good_cache(kind: CacheKind, size_bytes: u64, ways: u16) -> CacheSlot {
        CacheSlot {
            kind,
            size_bytes,
            line_bytes: 64,
            lines: size_bytes / 64,
            assoc: Some(Associativity::Ways(ways)),
            sectored: false,
            shared_by: None,
            inclusive: None,
        }
    }

    #[test]
    fn test_plausible_topology_passes() {
        let mut h = MemoryHierarchy::new();
        h.push_cache(1, good_cache(CacheKind::Data, 32 * 1024, 8));
        h.push_cache(1, good_cache(CacheKind::Instruction, 32 * 1024, 8));
        h.push_cache(2, good_cache(CacheKind::Unified, 256 * 1024, 4));
        h.push_tlb(
            1,
            TlbSlot {
                kind: TlbKind::Data,
                page_bytes: 4096,
                entries: 64,
                assoc: Some(Associativity::Full),
            },
        );

        let report = check(&topology(h));
        assert!(report.passed(), "{:?}", report.failures());
    }

    #[test]
    fn test_empty_topology_fails() {
        let report = check(&topology(MemoryHierarchy::new()));
        assert!(!report.passed());
        assert_eq!(report.failures().len(), 1);
    }

    #[test]
    fn test_missing_l1_cache_fails() {
        let mut h = MemoryHierarchy::new();
        h.push_tlb(
            1,
            TlbSlot {
                kind: TlbKind::Data,
                page_bytes: 4096,
                entries: 64,
                assoc: None,
            },
        );
        let report = check(&topology(h));
        assert!(!report.passed());
        assert!(report.failures()[0].contains("level 1 cache"));
    }

    #[test]
    fn test_zero_size_cache_fails() {
        let mut h = MemoryHierarchy::new();
        let mut slot = good_cache(CacheKind::Data, 32 * 1024, 8);
        slot.size_bytes = 0;
        slot.lines = 0;
        h.push_cache(1, slot);
        let report = check(&topology(h));
        assert!(!report.passed());
    }

    #[test]
    fn test_non_power_of_two_line_fails() {
        let mut h = MemoryHierarchy::new();
        let mut slot = good_cache(CacheKind::Data, 32 * 1024, 8);
        slot.line_bytes = 48;
        slot.lines = 0;
        h.push_cache(1, slot);
        let report = check(&topology(h));
        assert!(!report.passed());
    }

    #[test]
    fn test_inconsistent_line_count_fails() {
        let mut h = MemoryHierarchy::new();
        let mut slot = good_cache(CacheKind::Data, 32 * 1024, 8);
        slot.lines = 100;
        h.push_cache(1, slot);
        let report = check(&topology(h));
        assert!(!report.passed());
    }

    #[test]
    fn test_zero_tlb_entries_fail() {
        let mut h = MemoryHierarchy::new();
        h.push_cache(1, good_cache(CacheKind::Data, 32 * 1024, 8));
        h.push_tlb(
            1,
            TlbSlot {
                kind: TlbKind::Instruction,
                page_bytes: 4096,
                entries: 0,
                assoc: None,
            },
        );
        let report = check(&topology(h));
        assert!(!report.passed());
        assert!(report.failures()[0].contains("zero entries"));
    }

    #[test]
    fn test_trace_cache_without_line_size_passes() {
        let mut h = MemoryHierarchy::new();
        h.push_cache(
            1,
            CacheSlot {
                kind: CacheKind::Trace,
                size_bytes: 12 * 1024,
                line_bytes: 0,
                lines: 0,
                assoc: Some(Associativity::Ways(8)),
                sectored: false,
                shared_by: None,
                inclusive: None,
            },
        );
        let report = check(&topology(h));
        assert!(report.passed(), "{:?}", report.failures());
    }
}
