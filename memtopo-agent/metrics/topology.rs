// Cache and TLB topology metrics exposed over Prometheus

use crate::metric_enum;

metric_enum! {
    pub enum TopologyMetric {
        CacheSizeBytes => "memtopo_cache_size_bytes",
        CacheLineBytes => "memtopo_cache_line_bytes",
        CacheWays => "memtopo_cache_ways",
        CacheFullyAssociative => "memtopo_cache_fully_associative",
        TlbEntries => "memtopo_tlb_entries",
        HierarchyLevels => "memtopo_hierarchy_levels",
    }
}

impl TopologyMetric {
    pub fn help(&self) -> &'static str {
        match self {
            TopologyMetric::CacheSizeBytes => "Cache size in bytes",
            TopologyMetric::CacheLineBytes => "Cache line size in bytes",
            TopologyMetric::CacheWays => "Cache associativity in ways",
            TopologyMetric::CacheFullyAssociative => "Whether the cache is fully associative",
            TopologyMetric::TlbEntries => "TLB entry count",
            TopologyMetric::HierarchyLevels => "Deepest detected cache or TLB level",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert_eq!(
            TopologyMetric::CacheSizeBytes.name(),
            "memtopo_cache_size_bytes"
        );
        assert_eq!(TopologyMetric::all().len(), 6);
        for metric in TopologyMetric::all() {
            assert!(metric.name().starts_with("memtopo_"));
            assert!(!metric.help().is_empty());
        }
    }
}
