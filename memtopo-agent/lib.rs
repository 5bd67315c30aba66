// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod common;
pub mod config;
pub mod error;
pub mod metrics;
pub mod prom;
pub mod report;
pub mod topology;

pub use config::ProbeConfig;
pub use error::{MemtopoError, Result};
pub use prom::TopologyMetricExporter;
pub use report::TopologyReport;
pub use topology::{detect, detect_on_cpu, detect_with, CpuTopology, MemoryHierarchy};
