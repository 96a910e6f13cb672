use netdiag_core::constants::*;
use netdiag_core::{parse_cidr, DataCidr, NetdiagError, Result, DATA_CIDR_ENV};
use std::time::Duration;

/// What to do when throughput output cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsePolicy {
    /// Record 0 MB/s for the pair and log a warning
    #[default]
    Lenient,
    /// Fail the scan with `NetdiagError::Parse`
    Strict,
}

/// Tunables for the probes run inside the pods
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub port: u16,
    pub iperf_duration_secs: u32,
    pub bind_addr_file: String,
    pub parse_policy: ParsePolicy,
    /// Pairs measured at once; 1 keeps the scan strictly sequential
    pub concurrency: usize,
    /// Data network the host-network probes are expected to bind in
    pub data_network: Option<DataCidr>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            port: PROBE_PORT,
            iperf_duration_secs: IPERF_DURATION_SECS,
            bind_addr_file: IPERF_BIND_ADDR_FILE.to_string(),
            parse_policy: ParsePolicy::default(),
            concurrency: 1,
            data_network: None,
        }
    }
}

/// Validated configuration for one diagnostic run
#[derive(Debug, Clone)]
pub struct DiagnosticConfig {
    pub namespace: String,
    pub image: String,
    /// Data network range as given by the user, already validated
    pub data_cidr: String,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub probe: ProbeSettings,
    /// Print a min/max/avg line after the bandwidth results
    pub summary: bool,
}

impl DiagnosticConfig {
    /// Build a configuration with defaults, rejecting a missing or malformed data CIDR
    pub fn new(data_cidr: Option<&str>) -> Result<Self> {
        let raw = data_cidr.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
            NetdiagError::configuration(
                format!("{} is not set", DATA_CIDR_ENV),
                format!("example: {}=192.168.1.0/24", DATA_CIDR_ENV),
            )
        })?;
        let data_network = parse_cidr(raw)?;

        Ok(Self {
            namespace: DEBUG_NAMESPACE.to_string(),
            image: DEBUG_TOOLS_IMAGE.to_string(),
            data_cidr: raw.to_string(),
            poll_interval: POLL_INTERVAL,
            poll_timeout: POLL_TIMEOUT,
            probe: ProbeSettings {
                data_network: Some(data_network),
                ..Default::default()
            },
            summary: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DiagnosticConfig::new(Some("192.168.1.0/24")).unwrap();
        assert_eq!(config.namespace, "netdiag");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.poll_timeout, Duration::from_secs(180));
        assert_eq!(config.probe.port, 5201);
        assert_eq!(config.probe.concurrency, 1);
        assert_eq!(config.probe.parse_policy, ParsePolicy::Lenient);
        assert_eq!(config.probe.data_network.unwrap().prefix_len(), 24);
    }

    #[test]
    fn test_missing_cidr() {
        for input in [None, Some(""), Some("   ")] {
            let err = DiagnosticConfig::new(input).unwrap_err();
            assert!(matches!(err, NetdiagError::Configuration { .. }));
        }
    }

    #[test]
    fn test_malformed_cidr() {
        let err = DiagnosticConfig::new(Some("not-a-cidr")).unwrap_err();
        assert!(err.to_string().contains("NETDIAG_DATA_CIDR"));
    }
}
