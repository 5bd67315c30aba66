pub mod topology;

pub use topology::TopologyMetricExporter;
