//! AMD detection: extended leaves 0x8000_0005 and 0x8000_0006
//!
//! The L1 leaf is taken at face value; AMD has shipped it populated on
//! every part since the K5. The L2/L3 leaf's structures are pushed only
//! when their presence gates are set.
//!
//! Large-page TLB counts are reported for 2 MiB pages. A 4 MiB page
//! occupies two entries, so each large-page TLB yields two slots: the
//! full count at 2 MiB and half of it at 4 MiB.

use memtopo_raw::amd::{L1CacheInfo, L1Identifiers, L2L3Identifiers, L2TlbHalf};
use memtopo_raw::{Associativity, CacheKind, LeafLayout, TlbKind};

use crate::common::cpuid::CpuidSource;
use crate::error::Result;
use crate::topology::hierarchy::{CacheSlot, MemoryHierarchy, TlbSlot};

const KIB: u64 = 1 << 10;
const MIB: u64 = 1 << 20;

pub(crate) fn decode<S: CpuidSource>(source: &S, hierarchy: &mut MemoryHierarchy) -> Result<()> {
    let max_extended = source.max_extended_leaf()?;

    if max_extended < L1Identifiers::LEAF {
        tracing::warn!("Extended leaf {:#010X} not supported", L1Identifiers::LEAF);
        return Ok(());
    }
    let l1 = L1Identifiers::from_registers(source.query(L1Identifiers::LEAF, 0)?);
    decode_l1(&l1, hierarchy);

    if max_extended >= L2L3Identifiers::LEAF {
        let l2l3 = L2L3Identifiers::from_registers(source.query(L2L3Identifiers::LEAF, 0)?);
        decode_l2_l3(&l2l3, hierarchy);
    }

    Ok(())
}

fn decode_l1(l1: &L1Identifiers, hierarchy: &mut MemoryHierarchy) {
    let large = &l1.large_page_tlb;
    let (i_entries, d_entries) = (
        u32::from(large.instruction_entries),
        u32::from(large.data_entries),
    );
    push_l1_tlb(hierarchy, TlbKind::Instruction, 4 * MIB, i_entries / 2, large.instruction_assoc);
    push_l1_tlb(hierarchy, TlbKind::Data, 4 * MIB, d_entries / 2, large.data_assoc);
    push_l1_tlb(hierarchy, TlbKind::Instruction, 2 * MIB, i_entries, large.instruction_assoc);
    push_l1_tlb(hierarchy, TlbKind::Data, 2 * MIB, d_entries, large.data_assoc);

    let base = &l1.base_page_tlb;
    push_l1_tlb(
        hierarchy,
        TlbKind::Instruction,
        4 * KIB,
        u32::from(base.instruction_entries),
        base.instruction_assoc,
    );
    push_l1_tlb(
        hierarchy,
        TlbKind::Data,
        4 * KIB,
        u32::from(base.data_entries),
        base.data_assoc,
    );

    push_l1_cache(hierarchy, CacheKind::Data, &l1.data_cache);
    push_l1_cache(hierarchy, CacheKind::Instruction, &l1.instruction_cache);
}

fn push_l1_tlb(
    hierarchy: &mut MemoryHierarchy,
    kind: TlbKind,
    page_bytes: u64,
    entries: u32,
    assoc: Option<Associativity>,
) {
    hierarchy.push_tlb(
        1,
        TlbSlot {
            kind,
            page_bytes,
            entries,
            assoc,
        },
    );
}

fn push_l1_cache(hierarchy: &mut MemoryHierarchy, kind: CacheKind, cache: &L1CacheInfo) {
    let size_bytes = u64::from(cache.size_kib) * KIB;
    let line_bytes = u32::from(cache.line_bytes);
    hierarchy.push_cache(
        1,
        CacheSlot {
            kind,
            size_bytes,
            line_bytes,
            lines: if line_bytes > 0 { size_bytes / u64::from(line_bytes) } else { 0 },
            assoc: cache.assoc,
            sectored: false,
            shared_by: None,
            inclusive: None,
        },
    );
}

fn decode_l2_l3(id: &L2L3Identifiers, hierarchy: &mut MemoryHierarchy) {
    push_l2_large_tlb(hierarchy, TlbKind::Instruction, id.large_page_tlb.instruction);
    push_l2_large_tlb(hierarchy, TlbKind::Data, id.large_page_tlb.data);
    push_l2_base_tlb(hierarchy, TlbKind::Instruction, id.base_page_tlb.instruction);
    push_l2_base_tlb(hierarchy, TlbKind::Data, id.base_page_tlb.data);

    if let Some(l2) = &id.l2 {
        let size_bytes = u64::from(l2.size_kib) * KIB;
        let line_bytes = u32::from(l2.line_bytes);
        hierarchy.push_cache(
            2,
            CacheSlot {
                kind: CacheKind::Unified,
                size_bytes,
                line_bytes,
                lines: if line_bytes > 0 { size_bytes / u64::from(line_bytes) } else { 0 },
                assoc: l2.assoc,
                sectored: false,
                shared_by: None,
                inclusive: None,
            },
        );
    }

    if let Some(l3) = &id.l3 {
        let line_bytes = u32::from(l3.line_bytes);
        hierarchy.push_cache(
            3,
            CacheSlot {
                kind: CacheKind::Unified,
                size_bytes: l3.size_bytes,
                line_bytes,
                lines: if line_bytes > 0 { l3.size_bytes / u64::from(line_bytes) } else { 0 },
                assoc: l3.assoc,
                sectored: false,
                shared_by: None,
                inclusive: None,
            },
        );
    }
}

fn push_l2_large_tlb(hierarchy: &mut MemoryHierarchy, kind: TlbKind, half: Option<L2TlbHalf>) {
    let Some(half) = half else { return };
    hierarchy.push_tlb(
        2,
        TlbSlot {
            kind,
            page_bytes: 4 * MIB,
            entries: u32::from(half.entries) / 2,
            assoc: half.assoc,
        },
    );
    hierarchy.push_tlb(
        2,
        TlbSlot {
            kind,
            page_bytes: 2 * MIB,
            entries: u32::from(half.entries),
            assoc: half.assoc,
        },
    );
}

fn push_l2_base_tlb(hierarchy: &mut MemoryHierarchy, kind: TlbKind, half: Option<L2TlbHalf>) {
    let Some(half) = half else { return };
    hierarchy.push_tlb(
        2,
        TlbSlot {
            kind,
            page_bytes: 4 * KIB,
            entries: u32::from(half.entries),
            assoc: half.assoc,
        },
    );
}
