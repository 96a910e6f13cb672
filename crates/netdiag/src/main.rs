use clap::{Args, Parser, Subcommand};
use netdiag_core::constants::{
    DEBUG_NAMESPACE, DEBUG_TOOLS_IMAGE, DNS_PROBE_SERVICE_NAME, IPERF_DURATION_SECS, PROBE_PORT,
};
use netdiag_core::resources::probe_service;
use netdiag_core::{to_yaml, NetdiagError, ProbeGroup, DATA_CIDR_ENV};
use netdiag_runtime::{
    desired_workload, ApiClient, ClusterConfig, ConsoleStatus, DiagnosticConfig, DiagnosticRun,
    KubectlRunner, ParsePolicy, SilentStatus, StatusReporter, Suite,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "netdiag",
    about = "Check that a Kubernetes cluster's pod network, host network and DNS are healthy",
    long_about = "Deploys short-lived probe DaemonSets into a scratch namespace, checks \
                  pod-to-pod connectivity, measures host-network bandwidth between every \
                  pair of nodes and verifies in-cluster DNS. Runs network then infra when \
                  no subcommand is given."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    opts: GlobalOpts,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify CNI connectivity and measure host-network bandwidth
    Network,
    /// Verify cluster DNS resolves a probe Service
    Infra,
    /// Print the probe resources as YAML without touching the cluster
    Manifests,
}

#[derive(Args)]
struct GlobalOpts {
    /// Data network range the host-network probes bind to
    #[arg(long, global = true, env = DATA_CIDR_ENV)]
    data_cidr: Option<String>,

    /// Scratch namespace for probe resources; created by the run and deleted
    /// at the end. An existing namespace netdiag did not create is refused
    #[arg(long, global = true, default_value = DEBUG_NAMESPACE)]
    namespace: String,

    /// Image providing nc, iperf3 and host
    #[arg(long, global = true, default_value = DEBUG_TOOLS_IMAGE)]
    image: String,

    /// API server URL; defaults to in-cluster config, then kubectl proxy
    #[arg(long, global = true, env = "NETDIAG_API_SERVER")]
    api_server: Option<String>,

    /// Bearer token for the API server
    #[arg(long, global = true, env = "NETDIAG_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// kubectl binary used to exec into probe pods
    #[arg(long, global = true, default_value = "kubectl")]
    kubectl: String,

    /// kubeconfig context passed to kubectl exec
    #[arg(long, global = true)]
    context: Option<String>,

    /// Seconds between readiness checks
    #[arg(long, global = true, default_value_t = 2)]
    poll_interval_secs: u64,

    /// Seconds to wait for a probe DaemonSet to become ready
    #[arg(long, global = true, default_value_t = 180)]
    poll_timeout_secs: u64,

    /// Node pairs measured at once
    #[arg(long, global = true, default_value_t = 1)]
    concurrency: usize,

    /// Seconds each iperf3 measurement runs
    #[arg(long, global = true, default_value_t = IPERF_DURATION_SECS)]
    iperf_duration_secs: u32,

    /// Fail instead of recording 0 MB/s when iperf3 output cannot be parsed
    #[arg(long, global = true)]
    strict_parse: bool,

    /// Print min/max/avg bandwidth after the per-pair lines
    #[arg(long, global = true)]
    summary: bool,

    /// Do not print step progress
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

impl GlobalOpts {
    fn diagnostic_config(&self) -> netdiag_core::Result<DiagnosticConfig> {
        let mut config = DiagnosticConfig::new(self.data_cidr.as_deref())?;
        config.namespace = self.namespace.clone();
        config.image = self.image.clone();
        config.poll_interval = Duration::from_secs(self.poll_interval_secs.max(1));
        config.poll_timeout = Duration::from_secs(self.poll_timeout_secs);
        config.probe.port = PROBE_PORT;
        config.probe.iperf_duration_secs = self.iperf_duration_secs;
        config.probe.concurrency = self.concurrency.max(1);
        config.probe.parse_policy = if self.strict_parse {
            ParsePolicy::Strict
        } else {
            ParsePolicy::Lenient
        };
        config.summary = self.summary;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.opts.log_json);

    let suite = match cli.command {
        None => Suite::All,
        Some(Commands::Network) => Suite::Network,
        Some(Commands::Infra) => Suite::Infra,
        Some(Commands::Manifests) => {
            return match print_manifests(&cli.opts) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => fail(e),
            };
        }
    };

    run_diagnostic(&cli.opts, suite).await
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Errors go to stdout next to the report
fn fail(e: NetdiagError) -> ExitCode {
    println!("{:?}", miette::Report::new(e));
    ExitCode::FAILURE
}

async fn run_diagnostic(opts: &GlobalOpts, suite: Suite) -> ExitCode {
    // Configuration problems are reported before anything touches the cluster
    let config = match opts.diagnostic_config() {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let cluster = match ClusterConfig::resolve(opts.api_server.as_deref(), opts.token.clone())
        .and_then(ApiClient::new)
    {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    info!("Using API server {}", cluster.base_url());

    let runner = KubectlRunner::new(&opts.kubectl).with_context(opts.context.clone());
    let status: Arc<dyn StatusReporter> = if opts.quiet {
        Arc::new(SilentStatus)
    } else {
        Arc::new(ConsoleStatus::new())
    };

    let run = DiagnosticRun::new(Arc::new(cluster), Arc::new(runner), status, config);
    let mut stdout = std::io::stdout();
    let checks = run.execute(suite, &mut stdout).await;
    let cleanup = run.cleanup().await;
    info!("Run {} finished in {}s", run.run_id(), run.elapsed().num_seconds());

    let mut code = ExitCode::SUCCESS;
    if let Err(e) = checks {
        code = fail(e);
    }
    if let Err(e) = cleanup {
        warn!("Cleanup of namespace {} failed", run.config().namespace);
        code = fail(e);
    }
    code
}

fn print_manifests(opts: &GlobalOpts) -> netdiag_core::Result<()> {
    let config = opts.diagnostic_config()?;

    let mut documents = Vec::new();
    for group in ProbeGroup::all() {
        let ds = desired_workload(
            &config.namespace,
            &config.image,
            group,
            &config.data_cidr,
            None,
        )?;
        documents.push(to_yaml(&ds)?);
    }
    documents.push(to_yaml(&probe_service(&config.namespace, DNS_PROBE_SERVICE_NAME))?);

    print!("{}", documents.join("---\n"));
    Ok(())
}
