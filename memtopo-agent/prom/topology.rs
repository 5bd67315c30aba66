use prometheus::{IntGauge, Opts, Registry};
use std::sync::Arc;

use memtopo_raw::Associativity;

use crate::error::Result;
use crate::metrics::topology::TopologyMetric;
use crate::topology::CpuTopology;

/// Prometheus view of the detected topologies
///
/// Topology cannot change within a boot, so every gauge is set once at
/// registration; scrapes read the registry without re-probing.
pub struct TopologyMetricExporter {
    registry: Arc<Registry>,
}

impl TopologyMetricExporter {
    pub fn new(topologies: &[CpuTopology]) -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let exporter = Self { registry };

        for topology in topologies {
            exporter.register_topology(topology)?;
        }

        #[cfg(target_os = "linux")]
        exporter.registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(exporter)
    }

    fn register_topology(&self, topology: &CpuTopology) -> Result<()> {
        let cpu = topology
            .cpu
            .map_or_else(|| "current".to_string(), |c| c.to_string());

        self.register_gauge(
            TopologyMetric::HierarchyLevels,
            &[("cpu", cpu.clone())],
            topology.hierarchy.depth() as i64,
        )?;

        for (level, entry) in topology.hierarchy.levels() {
            for (slot, cache) in entry.caches().enumerate() {
                let labels = [
                    ("cpu", cpu.clone()),
                    ("level", level.to_string()),
                    ("kind", cache.kind.name().to_string()),
                    ("slot", slot.to_string()),
                ];

                self.register_gauge(
                    TopologyMetric::CacheSizeBytes,
                    &labels,
                    cache.size_bytes as i64,
                )?;
                if cache.line_bytes > 0 {
                    self.register_gauge(
                        TopologyMetric::CacheLineBytes,
                        &labels,
                        i64::from(cache.line_bytes),
                    )?;
                }
                if let Some(ways) = cache.assoc.and_then(|a| a.ways()) {
                    self.register_gauge(TopologyMetric::CacheWays, &labels, i64::from(ways))?;
                }
                let full = matches!(cache.assoc, Some(Associativity::Full));
                self.register_gauge(
                    TopologyMetric::CacheFullyAssociative,
                    &labels,
                    i64::from(full),
                )?;
            }

            for (slot, tlb) in entry.tlbs().enumerate() {
                let labels = [
                    ("cpu", cpu.clone()),
                    ("level", level.to_string()),
                    ("kind", tlb.kind.name().to_string()),
                    ("slot", slot.to_string()),
                    ("page_bytes", tlb.page_bytes.to_string()),
                ];
                self.register_gauge(TopologyMetric::TlbEntries, &labels, i64::from(tlb.entries))?;
            }
        }

        Ok(())
    }

    fn register_gauge(
        &self,
        metric: TopologyMetric,
        labels: &[(&str, String)],
        value: i64,
    ) -> Result<()> {
        let mut opts = Opts::new(metric.name(), metric.help());
        for (key, val) in labels {
            opts = opts.const_label(*key, val.clone());
        }

        let gauge = IntGauge::with_opts(opts)?;
        gauge.set(value);
        self.registry.register(Box::new(gauge))?;

        Ok(())
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ident::{ProcessorIdent, Vendor};
    use crate::topology::hierarchy::{CacheSlot, MemoryHierarchy, TlbSlot};
    use memtopo_raw::{CacheKind, TlbKind};

    fn sample_topology(cpu: Option<i32>) -> CpuTopology {
        let mut h = MemoryHierarchy::new();
        h.push_cache(
            1,
            CacheSlot {
                kind: CacheKind::Data,
                size_bytes: 32 * 1024,
                line_bytes: 64,
                lines: 512,
                assoc: Some(Associativity::Ways(8)),
                sectored: false,
                shared_by: None,
                inclusive: None,
            },
        );
        h.push_tlb(
            1,
            TlbSlot {
                kind: TlbKind::Data,
                page_bytes: 4096,
                entries: 64,
                assoc: Some(Associativity::Full),
            },
        );
        h.push_cache(
            2,
            CacheSlot {
                kind: CacheKind::Unified,
                size_bytes: 256 * 1024,
                line_bytes: 64,
                lines: 4096,
                assoc: Some(Associativity::Ways(4)),
                sectored: false,
                shared_by: None,
                inclusive: None,
            },
        );

        CpuTopology {
            cpu,
            processor: ProcessorIdent {
                vendor: Vendor::Intel,
                signature: None,
                hypervisor: None,
            },
            hierarchy: h,
        }
    }

    fn label_value(metric: &prometheus::proto::Metric, name: &str) -> Option<String> {
        metric
            .get_label()
            .iter()
            .find(|l| l.get_name() == name)
            .map(|l| l.get_value().to_string())
    }

    #[test]
    fn test_gauges_carry_topology_values() {
        let exporter = TopologyMetricExporter::new(&[sample_topology(Some(3))]).unwrap();
        let families = exporter.registry().gather();

        let sizes = families
            .iter()
            .find(|f| f.get_name() == "memtopo_cache_size_bytes")
            .unwrap();
        assert_eq!(sizes.get_metric().len(), 2);
        let l1 = sizes
            .get_metric()
            .iter()
            .find(|m| label_value(m, "level").as_deref() == Some("1"))
            .unwrap();
        assert_eq!(l1.get_gauge().get_value() as u64, 32 * 1024);
        assert_eq!(label_value(l1, "cpu").as_deref(), Some("3"));
        assert_eq!(label_value(l1, "kind").as_deref(), Some("data"));

        let depth = families
            .iter()
            .find(|f| f.get_name() == "memtopo_hierarchy_levels")
            .unwrap();
        assert_eq!(depth.get_metric()[0].get_gauge().get_value() as u64, 2);

        let tlbs = families
            .iter()
            .find(|f| f.get_name() == "memtopo_tlb_entries")
            .unwrap();
        let dtlb = &tlbs.get_metric()[0];
        assert_eq!(dtlb.get_gauge().get_value() as u64, 64);
        assert_eq!(label_value(dtlb, "page_bytes").as_deref(), Some("4096"));
    }

    #[test]
    fn test_fully_associative_flag() {
        let exporter = TopologyMetricExporter::new(&[sample_topology(Some(0))]).unwrap();
        let families = exporter.registry().gather();

        // The sample caches are set-associative; ways gauges exist and
        // the fully-associative flag stays 0.
        let full = families
            .iter()
            .find(|f| f.get_name() == "memtopo_cache_fully_associative")
            .unwrap();
        assert!(full
            .get_metric()
            .iter()
            .all(|m| m.get_gauge().get_value() as u64 == 0));

        let ways = families
            .iter()
            .find(|f| f.get_name() == "memtopo_cache_ways")
            .unwrap();
        assert_eq!(ways.get_metric().len(), 2);
    }

    #[test]
    fn test_unpinned_topology_labeled_current() {
        let exporter = TopologyMetricExporter::new(&[sample_topology(None)]).unwrap();
        let families = exporter.registry().gather();

        let depth = families
            .iter()
            .find(|f| f.get_name() == "memtopo_hierarchy_levels")
            .unwrap();
        assert_eq!(
            label_value(&depth.get_metric()[0], "cpu").as_deref(),
            Some("current")
        );
    }

    #[test]
    fn test_two_cpus_registered_side_by_side() {
        let topologies = vec![sample_topology(Some(0)), sample_topology(Some(1))];
        let exporter = TopologyMetricExporter::new(&topologies).unwrap();
        let families = exporter.registry().gather();

        let depth = families
            .iter()
            .find(|f| f.get_name() == "memtopo_hierarchy_levels")
            .unwrap();
        assert_eq!(depth.get_metric().len(), 2);
    }
}
