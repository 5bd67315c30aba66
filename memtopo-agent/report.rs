// Renderings of a detected topology: plain text for the terminal and a
// serializable form for --json output

use std::fmt;

use serde::Serialize;

use memtopo_raw::{Associativity, CacheKind};

use crate::topology::{CpuTopology, MemoryHierarchy};

/// One detected topology in serializable form
#[derive(Debug, Serialize)]
pub struct TopologyReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i32>,
    pub vendor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stepping: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypervisor: Option<String>,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefetch_stride_bytes: Option<u32>,
    pub levels: Vec<LevelReport>,
}

/// One populated hierarchy level
#[derive(Debug, Serialize)]
pub struct LevelReport {
    pub level: u8,
    pub total_cache_bytes: u64,
    pub caches: Vec<CacheReport>,
    pub tlbs: Vec<TlbReport>,
}

#[derive(Debug, Serialize)]
pub struct CacheReport {
    pub kind: &'static str,
    pub size_bytes: u64,
    pub line_bytes: u32,
    pub lines: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ways: Option<u16>,
    pub fully_associative: bool,
    pub sectored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_by: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusive: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct TlbReport {
    pub kind: &'static str,
    pub page_bytes: u64,
    pub entries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ways: Option<u16>,
    pub fully_associative: bool,
}

/// Split an associativity into the pair of report fields
fn assoc_fields(assoc: Option<Associativity>) -> (Option<u16>, bool) {
    match assoc {
        Some(Associativity::Full) => (None, true),
        other => (other.and_then(|a| a.ways()), false),
    }
}

impl From<&CpuTopology> for TopologyReport {
    fn from(topology: &CpuTopology) -> Self {
        let levels = topology
            .hierarchy
            .levels()
            .filter(|(_, entry)| !entry.is_empty())
            .map(|(level, entry)| LevelReport {
                level,
                total_cache_bytes: topology.hierarchy.level_cache_bytes(level),
                caches: entry
                    .caches()
                    .map(|c| {
                        let (ways, fully_associative) = assoc_fields(c.assoc);
                        CacheReport {
                            kind: c.kind.name(),
                            size_bytes: c.size_bytes,
                            line_bytes: c.line_bytes,
                            lines: c.lines,
                            ways,
                            fully_associative,
                            sectored: c.sectored,
                            shared_by: c.shared_by,
                            inclusive: c.inclusive,
                        }
                    })
                    .collect(),
                tlbs: entry
                    .tlbs()
                    .map(|t| {
                        let (ways, fully_associative) = assoc_fields(t.assoc);
                        TlbReport {
                            kind: t.kind.name(),
                            page_bytes: t.page_bytes,
                            entries: t.entries,
                            ways,
                            fully_associative,
                        }
                    })
                    .collect(),
            })
            .collect();

        TopologyReport {
            cpu: topology.cpu,
            vendor: topology.processor.vendor.name().to_string(),
            family: topology.processor.signature.map(|s| s.display_family()),
            model: topology.processor.signature.map(|s| s.display_model()),
            stepping: topology.processor.signature.map(|s| s.stepping),
            hypervisor: topology.processor.hypervisor.clone(),
            depth: topology.hierarchy.depth(),
            prefetch_stride_bytes: topology.hierarchy.prefetch_stride_bytes,
            levels,
        }
    }
}

/// Group topologies that decoded identically
///
/// On a homogeneous machine every CPU reports the same hierarchy, so the
/// text report collapses them into one entry. Unpinned probes carry no
/// CPU number and contribute nothing to the group's list.
pub fn group_identical(topologies: &[CpuTopology]) -> Vec<(Vec<i32>, &CpuTopology)> {
    let mut groups: Vec<(Vec<i32>, &CpuTopology)> = Vec::new();
    for topology in topologies {
        let existing = groups.iter_mut().find(|(_, t)| {
            t.processor == topology.processor && t.hierarchy == topology.hierarchy
        });
        match existing {
            Some((cpus, _)) => cpus.extend(topology.cpu),
            None => groups.push((topology.cpu.into_iter().collect(), topology)),
        }
    }
    groups
}

/// Render a sorted CPU list with consecutive runs compressed: `0-3,8`
pub fn format_cpu_list(cpus: &[i32]) -> String {
    let mut parts = Vec::new();
    let mut i = 0;
    while i < cpus.len() {
        let start = cpus[i];
        let mut end = start;
        while i + 1 < cpus.len() && cpus[i + 1] == end + 1 {
            i += 1;
            end = cpus[i];
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
        i += 1;
    }
    parts.join(",")
}

/// Render a byte count in the largest unit that divides it evenly
fn fmt_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MiB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{} KiB", bytes / KIB)
    } else {
        format!("{bytes} B")
    }
}

impl fmt::Display for CpuTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.processor.vendor.name())?;
        if let Some(sig) = self.processor.signature {
            write!(
                f,
                " family {:#x} model {:#x} stepping {:#x}",
                sig.display_family(),
                sig.display_model(),
                sig.stepping
            )?;
        }
        if let Some(hv) = &self.processor.hypervisor {
            write!(f, " (hypervisor: {hv})")?;
        }
        writeln!(f)?;
        write!(f, "{}", self.hierarchy)
    }
}

impl fmt::Display for MemoryHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (level, entry) in self.levels() {
            for cache in entry.caches() {
                write!(f, "  L{level} {} cache: ", cache.kind.name())?;
                if cache.kind == CacheKind::Trace {
                    write!(f, "{} K-uops", cache.size_bytes >> 10)?;
                } else {
                    write!(f, "{}", fmt_size(cache.size_bytes))?;
                }
                if let Some(assoc) = cache.assoc {
                    write!(f, ", {assoc}")?;
                }
                if cache.line_bytes > 0 {
                    write!(f, ", {} B line", cache.line_bytes)?;
                }
                if cache.sectored {
                    write!(f, ", sectored")?;
                }
                if let Some(n) = cache.shared_by {
                    write!(f, ", shared by {n} threads")?;
                }
                if cache.inclusive == Some(true) {
                    write!(f, ", inclusive")?;
                }
                writeln!(f)?;
            }
            for tlb in entry.tlbs() {
                write!(
                    f,
                    "  L{level} {} TLB: {} pages, {} entries",
                    tlb.kind.name(),
                    fmt_size(tlb.page_bytes),
                    tlb.entries
                )?;
                if let Some(assoc) = tlb.assoc {
                    write!(f, ", {assoc}")?;
                }
                writeln!(f)?;
            }
        }
        if let Some(stride) = self.prefetch_stride_bytes {
            writeln!(f, "  Hardware prefetch stride: {stride} B")?;
        }
        write!(
            f,
            "Cache totals: L1 {}, L2 {}, L3 {}",
            fmt_size(self.level_cache_bytes(1)),
            fmt_size(self.level_cache_bytes(2)),
            fmt_size(self.level_cache_bytes(3))
        )
    }
}
