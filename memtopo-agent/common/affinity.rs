use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
use nix::unistd::Pid;

use crate::error::{MemtopoError, Result};

/// Pins the calling thread to one CPU for the guard's lifetime
///
/// CPUID reports the topology of whichever CPU executes it, so per-CPU
/// probing pins first and restores the previous affinity mask on drop.
pub struct AffinityGuard {
    old_affinity: CpuSet,
}

impl AffinityGuard {
    pub fn new(cpu: i32) -> Result<Self> {
        if cpu < 0 {
            return Err(MemtopoError::AffinityError(format!(
                "Invalid CPU ID: {cpu}"
            )));
        }

        let old_affinity = sched_getaffinity(Pid::from_raw(0))
            .map_err(|e| MemtopoError::AffinityError(format!("Failed to get affinity: {e}")))?;

        let mut new_affinity = CpuSet::new();
        new_affinity.set(cpu as usize).map_err(|e| {
            MemtopoError::AffinityError(format!("Failed to set CPU {cpu} in set: {e}"))
        })?;

        sched_setaffinity(Pid::from_raw(0), &new_affinity).map_err(|e| {
            MemtopoError::AffinityError(format!("Failed to set affinity to CPU {cpu}: {e}"))
        })?;

        tracing::debug!("Pinned to CPU {cpu}");
        Ok(Self { old_affinity })
    }
}

impl Drop for AffinityGuard {
    fn drop(&mut self) {
        let _ = sched_setaffinity(Pid::from_raw(0), &self.old_affinity);
    }
}
