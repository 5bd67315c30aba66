pub mod affinity;
pub mod cpuid;
pub mod ident;

pub use affinity::AffinityGuard;
pub use cpuid::{CpuidSource, HardwareCpuid};
pub use ident::{CpuSignature, ProcessorIdent, Vendor, LOCAL_PROCESSOR};
