//! Intel detection: leaf 2 descriptors with a leaf 4 fallback
//!
//! Leaf 2 is tried first. Its descriptor walk covers TLBs, trace caches
//! and the prefetch stride on every generation; caches come from it on
//! older parts only. Leaf 4 fills in the caches when leaf 2 directs
//! software there (descriptor 0xFF) or reports none at all.

use memtopo_raw::intel::descriptors::{self, DescriptorInfo};
use memtopo_raw::intel::{CacheParameters, CacheType};
use memtopo_raw::{Associativity, CacheKind, LeafLayout};

use crate::common::cpuid::CpuidSource;
use crate::common::ident::CpuSignature;
use crate::error::Result;
use crate::topology::hierarchy::{
    CacheSlot, MemoryHierarchy, TlbSlot, MAX_HIERARCHY_LEVELS, SLOTS_PER_LEVEL,
};

pub(crate) fn decode<S: CpuidSource>(
    source: &S,
    signature: Option<CpuSignature>,
    hierarchy: &mut MemoryHierarchy,
) -> Result<()> {
    let max_basic = source.max_basic_leaf()?;

    let mut cache_info_in_leaf4 = false;
    if max_basic >= 2 {
        cache_info_in_leaf4 = decode_leaf2(source, signature, hierarchy)?;
    }

    // Nehalem and later put a lone 0xFF in leaf 2; Knights Corner
    // reports an empty leaf 2 without the 0xFF hint. Both get their
    // caches from leaf 4.
    if (cache_info_in_leaf4 || !hierarchy.has_caches()) && max_basic >= 4 {
        decode_leaf4(source, hierarchy)?;
    }

    Ok(())
}

/// Walk the leaf 2 descriptor bytes
///
/// Returns whether descriptor 0xFF was present, directing cache
/// detection at leaf 4. TLB descriptors are still decoded from leaf 2 in
/// that case; 0xFF only voids cache information.
fn decode_leaf2<S: CpuidSource>(
    source: &S,
    signature: Option<CpuSignature>,
    hierarchy: &mut MemoryHierarchy,
) -> Result<bool> {
    let regs = source.query(2, 0)?;
    let bytes = regs.bytes();

    // The low byte of eax is a repeat count for the query. No part has
    // shipped a count above 1; Knights Corner reports 0.
    let count = bytes[0];
    if count == 0 {
        tracing::debug!("Leaf 2 reports no descriptors");
        return Ok(false);
    }
    if count != 1 {
        tracing::warn!("Unhandled leaf 2 repeat count {count}, decoding a single query");
    }

    let mut cache_info_in_leaf4 = false;
    for (r, value) in regs.as_array().iter().enumerate() {
        // Bit 31 marks a register whose bytes carry no descriptors.
        if value & 0x8000_0000 != 0 {
            continue;
        }
        for b in (0..4).rev() {
            let i = r * 4 + b;
            // Byte 0 of eax is the repeat count, not a descriptor.
            if i == 0 {
                continue;
            }
            let code = bytes[i];
            // 0x00 is the null descriptor.
            if code == 0 {
                continue;
            }
            match descriptors::lookup(code) {
                Some(d) => match d.info {
                    DescriptorInfo::CacheInLeaf4 => {
                        tracing::debug!("Descriptor 0xFF: cache information lives in leaf 4");
                        cache_info_in_leaf4 = true;
                    }
                    DescriptorInfo::NoL2OrL3 => {
                        tracing::debug!("Descriptor 0x40: no cache beyond the reported levels");
                    }
                    _ => decode_descriptor(d, signature, hierarchy),
                },
                None => tracing::debug!("Unknown leaf 2 descriptor {code:#04X}"),
            }
        }
    }

    Ok(cache_info_in_leaf4)
}

fn decode_descriptor(
    d: &descriptors::Descriptor,
    signature: Option<CpuSignature>,
    hierarchy: &mut MemoryHierarchy,
) {
    match d.info {
        DescriptorInfo::Cache {
            level,
            kind,
            size_kib,
            assoc,
            sectored,
            line_bytes,
        } => {
            // 0x49 names a 4 MiB L3 on Xeon MP family 0xF model 0x06
            // and an L2 everywhere else.
            let level = if d.code == 0x49 && is_xeon_mp_family_f(signature) {
                3
            } else {
                level
            };
            let size_bytes = u64::from(size_kib) << 10;
            let line = u32::from(line_bytes);
            hierarchy.push_cache(
                level,
                CacheSlot {
                    kind,
                    size_bytes,
                    line_bytes: line,
                    lines: if line > 0 { size_bytes / u64::from(line) } else { 0 },
                    assoc: Some(assoc),
                    sectored,
                    shared_by: None,
                    inclusive: None,
                },
            );
        }
        DescriptorInfo::Tlb {
            level,
            kind,
            page_sizes_kib,
            entries,
            assoc,
        } => {
            // A multi-page-size descriptor is one structure reachable
            // at each size; it gets one slot per size.
            for &page_kib in page_sizes_kib {
                // 0xB1 holds eight 2 MiB entries but only four 4 MiB.
                let entries = if d.code == 0xB1 && page_kib == 4096 {
                    entries / 2
                } else {
                    entries
                };
                hierarchy.push_tlb(
                    level,
                    TlbSlot {
                        kind,
                        page_bytes: u64::from(page_kib) << 10,
                        entries: u32::from(entries),
                        assoc: Some(assoc),
                    },
                );
            }
        }
        DescriptorInfo::Trace { size_kuops, assoc } => {
            hierarchy.push_cache(
                1,
                CacheSlot {
                    kind: CacheKind::Trace,
                    size_bytes: u64::from(size_kuops) << 10,
                    line_bytes: 0,
                    lines: 0,
                    assoc: Some(assoc),
                    sectored: false,
                    shared_by: None,
                    inclusive: None,
                },
            );
        }
        DescriptorInfo::Prefetch { stride_bytes } => {
            hierarchy.prefetch_stride_bytes = Some(u32::from(stride_bytes));
        }
        // Handled by the walk before dispatching here.
        DescriptorInfo::NoL2OrL3 | DescriptorInfo::CacheInLeaf4 => {}
    }
}

fn is_xeon_mp_family_f(signature: Option<CpuSignature>) -> bool {
    signature.is_some_and(|s| s.display_family() == 0xF && s.display_model() == 0x6)
}

/// Walk the leaf 4 subleaves until the null cache type
fn decode_leaf4<S: CpuidSource>(source: &S, hierarchy: &mut MemoryHierarchy) -> Result<()> {
    // Some hypervisors never produce the null terminator; bound the
    // walk at the hierarchy's slot capacity.
    let max_subleaves = (MAX_HIERARCHY_LEVELS * SLOTS_PER_LEVEL) as u32;

    for subleaf in 0..max_subleaves {
        let params = CacheParameters::from_registers(source.query(CacheParameters::LEAF, subleaf)?);

        let Some(kind) = params.cache_type.kind() else {
            if params.cache_type == CacheType::Null {
                break;
            }
            tracing::debug!(
                "Skipping reserved cache type {:?} at subleaf {subleaf}",
                params.cache_type
            );
            continue;
        };

        tracing::debug!(
            "Leaf 4 subleaf {subleaf}: L{} {} cache, {} bytes",
            params.level,
            kind.name(),
            params.size_bytes()
        );

        hierarchy.push_cache(
            params.level,
            CacheSlot {
                kind,
                size_bytes: params.size_bytes(),
                line_bytes: params.line_bytes,
                lines: params.lines(),
                assoc: Some(if params.fully_associative {
                    Associativity::Full
                } else {
                    Associativity::Ways(params.ways as u16)
                }),
                sectored: false,
                shared_by: Some(params.threads_sharing),
                inclusive: Some(params.inclusive),
            },
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::cpuid::FakeCpuid;
    use memtopo_raw::TlbKind;

    const SKYLAKE_SIG: CpuSignature = CpuSignature {
        stepping: 0x3,
        model: 0xE,
        family: 0x6,
        extended_model: 0x5,
        extended_family: 0x0,
    };

    fn skylake_leaf4(fake: FakeCpuid) -> FakeCpuid {
        fake.set(4, 0, 0x1C00_4121, 0x01C0_003F, 0x0000_003F, 0)
            .set(4, 1, 0x1C00_4122, 0x01C0_003F, 0x0000_003F, 0)
            .set(4, 2, 0x1C00_4143, 0x00C0_003F, 0x0000_03FF, 0)
            .set(4, 3, 0x1C03_C163, 0x03C0_003F, 0x0000_1FFF, 0x6)
    }

    #[test]
    fn test_leaf2_descriptor_walk() {
        // eax bytes: count, 0x51 (ITLB), 0x5A (DTLB 2M/4M), 0x03 (DTLB 4K);
        // ebx bytes: 0x2C (L1D), 0x30 (L1I), 0x7D (L2), null;
        // edx has bit 31 set, so its descriptor byte must be ignored.
        let fake = FakeCpuid::new()
            .with_vendor("GenuineIntel", 0x16)
            .set(2, 0, 0x035A_5101, 0x007D_302C, 0, 0x8000_002C);

        let mut h = MemoryHierarchy::new();
        decode(&fake, Some(SKYLAKE_SIG), &mut h).unwrap();

        // Bytes walk high to low, so 0x30 (byte 5) lands before 0x2C.
        let l1_caches: Vec<_> = h.level(1).unwrap().caches().collect();
        assert_eq!(l1_caches.len(), 2);
        assert_eq!(l1_caches[0].kind, CacheKind::Instruction);
        assert_eq!(l1_caches[1].kind, CacheKind::Data);
        assert_eq!(l1_caches[1].size_bytes, 32 * 1024);
        assert_eq!(l1_caches[1].lines, 512);

        let l2_caches: Vec<_> = h.level(2).unwrap().caches().collect();
        assert_eq!(l2_caches.len(), 1);
        assert_eq!(l2_caches[0].size_bytes, 2 * 1024 * 1024);

        // 0x03 is one slot, 0x5A two (2 MiB and 4 MiB), 0x51 three.
        let l1_tlbs: Vec<_> = h.level(1).unwrap().tlbs().collect();
        assert_eq!(l1_tlbs.len(), 6);
        // Bytes walk high to low within each register.
        assert_eq!(l1_tlbs[0].kind, TlbKind::Data);
        assert_eq!(l1_tlbs[0].page_bytes, 4096);
        assert_eq!(l1_tlbs[0].entries, 64);
        assert_eq!(l1_tlbs[1].page_bytes, 2 * 1024 * 1024);
        assert_eq!(l1_tlbs[2].page_bytes, 4 * 1024 * 1024);
        assert_eq!(l1_tlbs[3].kind, TlbKind::Instruction);
        assert_eq!(l1_tlbs[3].entries, 128);

        assert_eq!(h.depth(), 2);
    }

    #[test]
    fn test_leaf2_0xff_defers_caches_to_leaf4() {
        // 0x03 (a DTLB) next to 0xFF: TLB information must survive the
        // deferral.
        let fake = skylake_leaf4(
            FakeCpuid::new()
                .with_vendor("GenuineIntel", 0x16)
                .set(2, 0, 0x00FF_0301, 0, 0, 0),
        );

        let mut h = MemoryHierarchy::new();
        decode(&fake, Some(SKYLAKE_SIG), &mut h).unwrap();

        assert_eq!(h.level(1).unwrap().tlbs().count(), 1);

        let l1_caches: Vec<_> = h.level(1).unwrap().caches().collect();
        assert_eq!(l1_caches.len(), 2);
        assert_eq!(l1_caches[0].shared_by, Some(2));
        assert_eq!(h.level(3).unwrap().caches().next().unwrap().size_bytes, 8 * 1024 * 1024);
        assert_eq!(h.level(3).unwrap().caches().next().unwrap().inclusive, Some(true));
        assert_eq!(h.depth(), 3);
    }

    #[test]
    fn test_leaf2_empty_falls_back_to_leaf4() {
        // Knights Corner style: leaf 2 exists but its count byte is 0.
        let fake = skylake_leaf4(
            FakeCpuid::new()
                .with_vendor("GenuineIntel", 0x16)
                .set(2, 0, 0, 0, 0, 0),
        );

        let mut h = MemoryHierarchy::new();
        decode(&fake, Some(SKYLAKE_SIG), &mut h).unwrap();

        assert_eq!(h.level(1).unwrap().caches().count(), 2);
        assert_eq!(h.level(2).unwrap().caches().count(), 1);
        assert_eq!(h.depth(), 3);
    }

    #[test]
    fn test_leaf2_caches_suppress_leaf4() {
        // A part whose caches are fully described by leaf 2 must not
        // have them duplicated from leaf 4.
        let fake = skylake_leaf4(
            FakeCpuid::new()
                .with_vendor("GenuineIntel", 0x16)
                .set(2, 0, 0x0000_2C01, 0, 0, 0),
        );

        let mut h = MemoryHierarchy::new();
        decode(&fake, Some(SKYLAKE_SIG), &mut h).unwrap();

        assert_eq!(h.level(1).unwrap().caches().count(), 1);
        assert_eq!(h.depth(), 1);
    }

    #[test]
    fn test_descriptor_0x49_level_override() {
        let leaf2 = |fake: FakeCpuid| fake.set(2, 0, 0x0000_4901, 0, 0, 0);

        // Xeon MP family 0xF model 0x06: 0x49 is a level 3 cache.
        let xeon_mp = CpuSignature::from_eax(0x0000_0F61);
        let mut h = MemoryHierarchy::new();
        decode(
            &leaf2(FakeCpuid::new().with_vendor("GenuineIntel", 0x5)),
            Some(xeon_mp),
            &mut h,
        )
        .unwrap();
        assert_eq!(h.level(2).unwrap().caches().count(), 0);
        let l3: Vec<_> = h.level(3).unwrap().caches().collect();
        assert_eq!(l3.len(), 1);
        assert_eq!(l3[0].size_bytes, 4 * 1024 * 1024);
        assert_eq!(l3[0].assoc, Some(Associativity::Ways(16)));

        // Anything else: 0x49 is a level 2 cache.
        let mut h = MemoryHierarchy::new();
        decode(
            &leaf2(FakeCpuid::new().with_vendor("GenuineIntel", 0x5)),
            Some(SKYLAKE_SIG),
            &mut h,
        )
        .unwrap();
        assert_eq!(h.level(2).unwrap().caches().count(), 1);
        assert_eq!(h.level(3).unwrap().caches().count(), 0);
    }

    #[test]
    fn test_descriptor_0xb1_page_size_capacities() {
        let fake = FakeCpuid::new()
            .with_vendor("GenuineIntel", 0x5)
            .set(2, 0, 0x0000_B101, 0, 0, 0);

        let mut h = MemoryHierarchy::new();
        decode(&fake, None, &mut h).unwrap();

        let tlbs: Vec<_> = h.level(1).unwrap().tlbs().collect();
        assert_eq!(tlbs.len(), 2);
        assert_eq!(tlbs[0].page_bytes, 2 * 1024 * 1024);
        assert_eq!(tlbs[0].entries, 8);
        assert_eq!(tlbs[1].page_bytes, 4 * 1024 * 1024);
        assert_eq!(tlbs[1].entries, 4);
    }

    #[test]
    fn test_trace_and_prefetch_descriptors() {
        // 0x70: 12 K-uop trace cache; 0xF0: 64-byte prefetch stride.
        let fake = FakeCpuid::new()
            .with_vendor("GenuineIntel", 0x5)
            .set(2, 0, 0x00F0_7001, 0, 0, 0);

        let mut h = MemoryHierarchy::new();
        decode(&fake, None, &mut h).unwrap();

        let l1: Vec<_> = h.level(1).unwrap().caches().collect();
        assert_eq!(l1.len(), 1);
        assert_eq!(l1[0].kind, CacheKind::Trace);
        assert_eq!(l1[0].size_bytes, 12 * 1024);
        assert_eq!(l1[0].line_bytes, 0);
        assert_eq!(h.prefetch_stride_bytes, Some(64));
    }

    #[test]
    fn test_unknown_descriptor_skipped() {
        // 0x69 is reserved; it must not disturb the rest of the walk.
        let fake = FakeCpuid::new()
            .with_vendor("GenuineIntel", 0x5)
            .set(2, 0, 0x002C_6901, 0, 0, 0);

        let mut h = MemoryHierarchy::new();
        decode(&fake, None, &mut h).unwrap();
        assert_eq!(h.level(1).unwrap().caches().count(), 1);
    }

    #[test]
    fn test_leaf4_terminates_without_null() {
        // Every subleaf claims to be a valid cache; the walk must stop
        // at the slot capacity bound.
        let mut fake = FakeCpuid::new()
            .with_vendor("GenuineIntel", 0x16)
            .set(2, 0, 0x00FF_0001, 0, 0, 0);
        for subleaf in 0..64 {
            fake = fake.set(4, subleaf, 0x1C00_4121, 0x01C0_003F, 0x3F, 0);
        }

        let mut h = MemoryHierarchy::new();
        decode(&fake, Some(SKYLAKE_SIG), &mut h).unwrap();
        assert_eq!(h.level(1).unwrap().caches().count(), SLOTS_PER_LEVEL);
    }
}
