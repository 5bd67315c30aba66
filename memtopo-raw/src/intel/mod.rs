//! Intel cache and TLB leaves
//!
//! Intel parts describe the memory hierarchy two ways. Leaf 2 packs
//! one-byte descriptors naming fixed configurations; leaf 4 enumerates
//! caches parametrically, one subleaf per cache. Modern processors report
//! descriptor 0xFF in leaf 2 to direct software at leaf 4.

pub mod descriptors;
pub mod leaf4;

pub use descriptors::{Descriptor, DescriptorInfo};
pub use leaf4::{CacheParameters, CacheType};
