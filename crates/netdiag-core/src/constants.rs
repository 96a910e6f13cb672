use std::time::Duration;

/// Namespace holding every diagnostic resource
pub const DEBUG_NAMESPACE: &str = "netdiag";
/// Image shipping nc, iperf3 and host
pub const DEBUG_TOOLS_IMAGE: &str = "netdiag/debugtools:latest";

pub const BASIC_CHECKER_DS_NAME: &str = "basic-checker";
pub const HOST_NETWORK_CHECKER_DS_NAME: &str = "hostnetwork-checker";

pub const BASIC_CHECKER_LABEL: &str = "netdiag-basic";
pub const HOST_NETWORK_CHECKER_LABEL: &str = "netdiag-hostnetwork";

/// Label key used for group selectors
pub const APP_LABEL_KEY: &str = "app";
/// Label key carrying the run id on created resources
pub const RUN_ID_LABEL_KEY: &str = "netdiag.io/run-id";
/// Marks a namespace as created by netdiag; only these are ever deleted
pub const MANAGED_BY_LABEL_KEY: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "netdiag";

/// Env var injected into probe containers
pub const DATA_CIDR_CONTAINER_ENV: &str = "DATA_CIDR";

/// Port the probe image listens on (iperf3 server)
pub const PROBE_PORT: u16 = 5201;
/// File inside host-network pods holding the address iperf3 is bound to
pub const IPERF_BIND_ADDR_FILE: &str = "/opt/iperf_bind_addr";
/// Seconds each iperf3 measurement runs
pub const IPERF_DURATION_SECS: u32 = 5;

/// Service used by the DNS check
pub const DNS_PROBE_SERVICE_NAME: &str = "netdiag-probe";

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const POLL_TIMEOUT: Duration = Duration::from_secs(3 * 60);
