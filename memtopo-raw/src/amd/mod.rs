//! AMD cache and TLB leaves
//!
//! AMD parts report the memory hierarchy through two extended leaves:
//! 0x8000_0005 for the L1 caches and TLBs, 0x8000_0006 for L2, L3 and the
//! L2 TLBs. The L1 leaf is unconditionally populated; the L2/L3 leaf
//! gates every structure on a nonzero field.

pub mod l1;
pub mod l2;

pub use l1::{L1CacheInfo, L1Identifiers, L1TlbInfo};
pub use l2::{L2CacheInfo, L2L3Identifiers, L2TlbHalf, L2TlbInfo, L3CacheInfo};
