use crate::error::{MemtopoError, Result};

/// Which CPUs to probe
#[derive(Debug, Clone, Default)]
pub struct ProbeConfig {
    /// CPUs to pin to and probe; empty probes the calling CPU wherever
    /// the scheduler placed it
    pub cpus: Vec<i32>,
}

impl ProbeConfig {
    /// Create a configuration for an explicit CPU list
    pub fn new(cpus: Vec<i32>) -> Self {
        Self { cpus }
    }

    /// Probe the calling CPU only, without pinning
    pub fn current() -> Self {
        Self::default()
    }

    /// Probe every online CPU
    pub fn all_online() -> Self {
        let cpus = Self::detect_online_cpus();
        tracing::info!("Auto-detected {} online CPUs", cpus.len());
        Self::new(cpus)
    }

    /// Detect online CPUs from /sys/devices/system/cpu/online
    pub fn detect_online_cpus() -> Vec<i32> {
        std::fs::read_to_string("/sys/devices/system/cpu/online")
            .ok()
            .and_then(|s| Self::parse_cpu_list(&s).ok())
            .unwrap_or_else(|| {
                tracing::warn!("Failed to detect online CPUs, using default: 0");
                vec![0]
            })
    }

    /// Parse a CPU list like "0-3,8-11" into a sorted, deduplicated Vec
    pub fn parse_cpu_list(s: &str) -> Result<Vec<i32>> {
        let mut cpus = Vec::new();
        for part in s.trim().split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some((start, end)) = part.split_once('-') {
                let start: i32 = start
                    .trim()
                    .parse()
                    .map_err(|_| MemtopoError::ConfigError(format!("Invalid CPU range: {part}")))?;
                let end: i32 = end
                    .trim()
                    .parse()
                    .map_err(|_| MemtopoError::ConfigError(format!("Invalid CPU range: {part}")))?;
                if start < 0 || start > end {
                    return Err(MemtopoError::ConfigError(format!(
                        "Invalid CPU range: {part}"
                    )));
                }
                cpus.extend(start..=end);
            } else {
                let cpu: i32 = part
                    .parse()
                    .map_err(|_| MemtopoError::ConfigError(format!("Invalid CPU: {part}")))?;
                if cpu < 0 {
                    return Err(MemtopoError::ConfigError(format!("Invalid CPU: {part}")));
                }
                cpus.push(cpu);
            }
        }
        if cpus.is_empty() {
            return Err(MemtopoError::ConfigError("Empty CPU list".to_string()));
        }
        cpus.sort_unstable();
        cpus.dedup();
        Ok(cpus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single() {
        assert_eq!(ProbeConfig::parse_cpu_list("0").unwrap(), vec![0]);
        assert_eq!(ProbeConfig::parse_cpu_list("3,1").unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_parse_ranges() {
        assert_eq!(ProbeConfig::parse_cpu_list("0-3").unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(
            ProbeConfig::parse_cpu_list("0-2,8-9").unwrap(),
            vec![0, 1, 2, 8, 9]
        );
    }

    #[test]
    fn test_parse_dedup() {
        assert_eq!(
            ProbeConfig::parse_cpu_list("0-2,1,2").unwrap(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_parse_whitespace() {
        // The sysfs online file carries a trailing newline.
        assert_eq!(ProbeConfig::parse_cpu_list("0-1\n").unwrap(), vec![0, 1]);
        assert_eq!(ProbeConfig::parse_cpu_list(" 2 , 4 ").unwrap(), vec![2, 4]);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ProbeConfig::parse_cpu_list("").is_err());
        assert!(ProbeConfig::parse_cpu_list("a").is_err());
        assert!(ProbeConfig::parse_cpu_list("3-1").is_err());
        assert!(ProbeConfig::parse_cpu_list("-1").is_err());
        assert!(ProbeConfig::parse_cpu_list("0,x").is_err());
    }

    #[test]
    fn test_current_is_empty() {
        assert!(ProbeConfig::current().cpus.is_empty());
    }
}
