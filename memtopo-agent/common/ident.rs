//! Processor identification
//!
//! Vendor string, family/model/stepping signature, and hypervisor
//! detection. The vendor decides which decode path applies; the signature
//! feeds the handful of descriptor overrides that depend on specific
//! parts.

use once_cell::sync::Lazy;

use memtopo_raw::cpuid::HYPERVISOR_LEAF_BASE;

use crate::common::cpuid::{CpuidSource, HardwareCpuid};
use crate::error::Result;

/// CPU vendor, from the leaf 0 vendor string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vendor {
    Intel,
    Amd,
    Other(String),
}

impl Vendor {
    pub fn from_id(id: &str) -> Self {
        match id {
            "GenuineIntel" => Vendor::Intel,
            "AuthenticAMD" => Vendor::Amd,
            _ => Vendor::Other(id.to_string()),
        }
    }

    /// The vendor string as the processor reports it
    pub fn name(&self) -> &str {
        match self {
            Vendor::Intel => "GenuineIntel",
            Vendor::Amd => "AuthenticAMD",
            Vendor::Other(id) => id,
        }
    }
}

/// Family, model and stepping fields of leaf 1 eax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSignature {
    pub stepping: u8,
    pub model: u8,
    pub family: u8,
    pub extended_model: u8,
    pub extended_family: u8,
}

impl CpuSignature {
    pub fn from_eax(eax: u32) -> Self {
        Self {
            stepping: (eax & 0xF) as u8,
            model: ((eax >> 4) & 0xF) as u8,
            family: ((eax >> 8) & 0xF) as u8,
            extended_model: ((eax >> 16) & 0xF) as u8,
            extended_family: ((eax >> 20) & 0xFF) as u8,
        }
    }

    /// Display family: the extended field is added only when the base
    /// family is 0xF
    pub fn display_family(&self) -> u32 {
        if self.family == 0xF {
            u32::from(self.family) + u32::from(self.extended_family)
        } else {
            u32::from(self.family)
        }
    }

    /// Display model: the extended field extends families 0x6 and 0xF
    pub fn display_model(&self) -> u32 {
        if self.family == 0x6 || self.family == 0xF {
            (u32::from(self.extended_model) << 4) + u32::from(self.model)
        } else {
            u32::from(self.model)
        }
    }
}

/// Identity of one logical processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorIdent {
    pub vendor: Vendor,
    /// Absent on parts whose maximum basic leaf is 0
    pub signature: Option<CpuSignature>,
    /// Hypervisor vendor id, when leaf 1 advertises one
    pub hypervisor: Option<String>,
}

impl ProcessorIdent {
    fn unknown() -> Self {
        Self {
            vendor: Vendor::Other("unknown".to_string()),
            signature: None,
            hypervisor: None,
        }
    }
}

/// Identity of whichever CPU this process first ran identification on
pub static LOCAL_PROCESSOR: Lazy<ProcessorIdent> =
    Lazy::new(|| identify(&HardwareCpuid).unwrap_or_else(|_| ProcessorIdent::unknown()));

/// Read the 12-byte vendor string (leaf 0: ebx, edx, ecx in that order)
pub fn vendor_id<S: CpuidSource>(source: &S) -> Result<String> {
    let regs = source.query(0, 0)?;
    let mut bytes = Vec::with_capacity(12);
    bytes.extend_from_slice(&regs.ebx.to_le_bytes());
    bytes.extend_from_slice(&regs.edx.to_le_bytes());
    bytes.extend_from_slice(&regs.ecx.to_le_bytes());
    Ok(String::from_utf8_lossy(&bytes)
        .trim_end_matches('\0')
        .to_string())
}

/// Identify the processor visible through `source`
pub fn identify<S: CpuidSource>(source: &S) -> Result<ProcessorIdent> {
    let vendor = Vendor::from_id(&vendor_id(source)?);

    let signature = if source.has_leaf(1)? {
        Some(CpuSignature::from_eax(source.query(1, 0)?.eax))
    } else {
        None
    };

    let hypervisor = detect_hypervisor(source)?;

    Ok(ProcessorIdent {
        vendor,
        signature,
        hypervisor,
    })
}

/// Hypervisor vendor id, when running under one
///
/// Leaf 1 ecx bit 31 advertises a hypervisor; the id itself comes from
/// the hypervisor leaf range in register order ebx, ecx, edx. Note the
/// order differs from the leaf 0 vendor string.
pub fn detect_hypervisor<S: CpuidSource>(source: &S) -> Result<Option<String>> {
    if !source.has_leaf(1)? {
        return Ok(None);
    }
    if source.query(1, 0)?.ecx & 0x8000_0000 == 0 {
        return Ok(None);
    }

    let regs = source.query(HYPERVISOR_LEAF_BASE, 0)?;
    let mut bytes = Vec::with_capacity(12);
    bytes.extend_from_slice(&regs.ebx.to_le_bytes());
    bytes.extend_from_slice(&regs.ecx.to_le_bytes());
    bytes.extend_from_slice(&regs.edx.to_le_bytes());
    Ok(Some(
        String::from_utf8_lossy(&bytes)
            .trim_end_matches('\0')
            .to_string(),
    ))
}
