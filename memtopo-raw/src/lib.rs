//! Raw CPUID definitions for x86 memory hierarchy detection
//!
//! This crate provides the low-level building blocks for decoding cache and
//! TLB topology out of the x86 `CPUID` instruction:
//!
//! - Safe access to the instruction itself ([`cpuid::query`])
//! - Typed layouts for the leaves that describe the memory hierarchy
//!   ([`intel::CacheParameters`], [`amd::L1Identifiers`],
//!   [`amd::L2L3Identifiers`])
//! - The Intel leaf 2 one-byte descriptor table ([`intel::descriptors`])
//!
//! It contains no detection policy. Walking leaves, picking between leaf 2
//! and leaf 4, and assembling a hierarchy out of the decoded values is the
//! consumer's job; this crate only knows what the bits mean.
//!
//! ## References
//!
//! - Intel SDM Volume 2A, `CPUID` instruction reference
//! - AMD CPUID Specification (publication #25481)

pub mod amd;
pub mod cpuid;
pub mod intel;
pub mod leaf;

pub use cpuid::{query, CpuidError};
pub use leaf::{Associativity, CacheKind, CpuidRegisters, LeafLayout, TlbKind};
