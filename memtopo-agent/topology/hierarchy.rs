//! The detected memory hierarchy
//!
//! A fixed-size structure: up to four levels, each with a handful of
//! cache and TLB slots. Decoders push slots in the order the hardware
//! reports them; slot arrays never reorder, so the report output is
//! stable for a given machine.

use memtopo_raw::{Associativity, CacheKind, TlbKind};

/// Deepest level the hierarchy can describe
pub const MAX_HIERARCHY_LEVELS: usize = 4;

/// Cache slots (and separately TLB slots) per level
pub const SLOTS_PER_LEVEL: usize = 6;

/// One cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSlot {
    pub kind: CacheKind,
    /// Trace caches count micro-ops here instead of bytes
    pub size_bytes: u64,
    /// Zero when the leaf does not report a line size
    pub line_bytes: u32,
    /// Zero when no line size is known
    pub lines: u64,
    pub assoc: Option<Associativity>,
    pub sectored: bool,
    /// Logical processors sharing this cache; reported by leaf 4 only
    pub shared_by: Option<u32>,
    /// Inclusive of lower cache levels; reported by leaf 4 only
    pub inclusive: Option<bool>,
}

/// One TLB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbSlot {
    pub kind: TlbKind,
    pub page_bytes: u64,
    pub entries: u32,
    pub assoc: Option<Associativity>,
}

/// Caches and TLBs of one level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyLevel {
    caches: [Option<CacheSlot>; SLOTS_PER_LEVEL],
    tlbs: [Option<TlbSlot>; SLOTS_PER_LEVEL],
}

impl HierarchyLevel {
    /// Populated cache slots, in insertion order
    pub fn caches(&self) -> impl Iterator<Item = &CacheSlot> {
        self.caches.iter().flatten()
    }

    /// Populated TLB slots, in insertion order
    pub fn tlbs(&self) -> impl Iterator<Item = &TlbSlot> {
        self.tlbs.iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.iter().all(Option::is_none) && self.tlbs.iter().all(Option::is_none)
    }

    fn push_cache(&mut self, slot: CacheSlot) -> bool {
        for entry in &mut self.caches {
            if entry.is_none() {
                *entry = Some(slot);
                return true;
            }
        }
        false
    }

    fn push_tlb(&mut self, slot: TlbSlot) -> bool {
        for entry in &mut self.tlbs {
            if entry.is_none() {
                *entry = Some(slot);
                return true;
            }
        }
        false
    }
}

/// Everything detected about the cache and TLB hierarchy of one CPU
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryHierarchy {
    levels: [HierarchyLevel; MAX_HIERARCHY_LEVELS],
    /// Hardware prefetcher stride, when leaf 2 reports one
    pub prefetch_stride_bytes: Option<u32>,
}

impl MemoryHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache at a 1-based level
    ///
    /// Out-of-range levels and full levels drop the slot with a warning
    /// rather than clobbering what an earlier descriptor put there.
    pub fn push_cache(&mut self, level: u8, slot: CacheSlot) {
        match self.level_mut(level) {
            Some(entry) => {
                if !entry.push_cache(slot) {
                    tracing::warn!(
                        "Level {level} cache slots exhausted, dropping a {} cache",
                        slot.kind.name()
                    );
                }
            }
            None => tracing::warn!(
                "Cache level {level} out of range, dropping a {} cache",
                slot.kind.name()
            ),
        }
    }

    /// Record a TLB at a 1-based level
    pub fn push_tlb(&mut self, level: u8, slot: TlbSlot) {
        match self.level_mut(level) {
            Some(entry) => {
                if !entry.push_tlb(slot) {
                    tracing::warn!(
                        "Level {level} TLB slots exhausted, dropping a {} TLB",
                        slot.kind.name()
                    );
                }
            }
            None => tracing::warn!(
                "TLB level {level} out of range, dropping a {} TLB",
                slot.kind.name()
            ),
        }
    }

    fn level_mut(&mut self, level: u8) -> Option<&mut HierarchyLevel> {
        if level == 0 {
            return None;
        }
        self.levels.get_mut(usize::from(level) - 1)
    }

    /// One level, by its 1-based number
    pub fn level(&self, level: u8) -> Option<&HierarchyLevel> {
        if level == 0 {
            return None;
        }
        self.levels.get(usize::from(level) - 1)
    }

    /// All levels with their 1-based numbers
    pub fn levels(&self) -> impl Iterator<Item = (u8, &HierarchyLevel)> {
        self.levels.iter().enumerate().map(|(i, l)| (i as u8 + 1, l))
    }

    /// Deepest level with any populated slot
    pub fn depth(&self) -> usize {
        self.levels
            .iter()
            .rposition(|l| !l.is_empty())
            .map_or(0, |i| i + 1)
    }

    /// Total cache bytes at a 1-based level
    pub fn level_cache_bytes(&self, level: u8) -> u64 {
        self.level(level)
            .map(|l| l.caches().map(|c| c.size_bytes).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(HierarchyLevel::is_empty)
    }

    /// Whether any level holds a cache slot (TLBs do not count)
    pub fn has_caches(&self) -> bool {
        self.levels.iter().any(|l| l.caches().next().is_some())
    }
}
