use crate::cleanup::teardown;
use crate::config::DiagnosticConfig;
use crate::deployer::WorkloadDeployer;
use crate::discovery::list_instances;
use crate::dns::DnsChecker;
use crate::orchestrator::{PairwiseOrchestrator, PairwiseScan};
use crate::poller::ReadinessPoller;
use crate::reporter::Reporter;
use crate::traits::{ClusterApi, RemoteRunner, StatusReporter, StepOutcome};
use chrono::{DateTime, Utc};
use netdiag_core::{ProbeGroup, Result};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub const STEP_PREPARE: &str = "Preparing debug environment";
pub const STEP_CNI: &str = "Checking CNI connectivity";
pub const STEP_BANDWIDTH: &str = "Measuring hostnetwork bandwidth";
pub const STEP_DNS: &str = "Checking DNS service";

/// Which checks a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suite {
    /// CNI connectivity then host-network bandwidth
    Network,
    /// DNS resolution of a probe Service
    Infra,
    /// Network, then infra
    All,
}

/// One diagnostic run against a cluster
///
/// Owns the collaborators for the run and the run id that labels every
/// probe pod it creates. Each step is bracketed by the status reporter.
pub struct DiagnosticRun {
    run_id: String,
    started_at: DateTime<Utc>,
    cluster: Arc<dyn ClusterApi>,
    runner: Arc<dyn RemoteRunner>,
    status: Arc<dyn StatusReporter>,
    config: DiagnosticConfig,
}

impl DiagnosticRun {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        runner: Arc<dyn RemoteRunner>,
        status: Arc<dyn StatusReporter>,
        config: DiagnosticConfig,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            cluster,
            runner,
            status,
            config,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &DiagnosticConfig {
        &self.config
    }

    /// Wall-clock time since the run was created
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }

    /// Prepare the environment and run `suite`, writing reports to `out`.
    ///
    /// Stops at the first failing step. Cleanup is left to the caller so it
    /// runs whatever the outcome.
    pub async fn execute<W: Write>(&self, suite: Suite, out: &mut W) -> Result<()> {
        info!(
            "Starting diagnostic run {} ({:?}) in namespace {}",
            self.run_id, suite, self.config.namespace
        );
        self.prepare().await?;

        if matches!(suite, Suite::Network | Suite::All) {
            self.network(out).await?;
        }
        if matches!(suite, Suite::Infra | Suite::All) {
            self.infra().await?;
        }
        Ok(())
    }

    /// Ensure the basic probe group is deployed and ready
    pub async fn prepare(&self) -> Result<()> {
        self.step(STEP_PREPARE, self.ensure_ready(ProbeGroup::Basic))
            .await
    }

    /// Pod-network connectivity, then host-network bandwidth.
    ///
    /// Bandwidth results measured before a failure are still written to `out`.
    pub async fn network<W: Write>(&self, out: &mut W) -> Result<()> {
        self.step(STEP_CNI, self.check_connectivity()).await?;

        self.status.start(STEP_BANDWIDTH);
        let scan = self
            .measure_bandwidth()
            .instrument(self.span(STEP_BANDWIDTH))
            .await;
        let outcome = match &scan {
            Ok(s) if s.is_complete() => StepOutcome::Success,
            _ => StepOutcome::Failure,
        };
        self.status.stop(STEP_BANDWIDTH, outcome);

        let scan = scan?;
        Reporter::new(&mut *out)
            .with_summary(self.config.summary)
            .report(&scan.results)?;

        match scan.failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// DNS resolution from a basic probe pod
    pub async fn infra(&self) -> Result<()> {
        let checker = DnsChecker::new(
            self.cluster.as_ref(),
            self.runner.as_ref(),
            &self.config.namespace,
        );
        self.step(STEP_DNS, checker.check()).await
    }

    /// Delete everything the run created
    pub async fn cleanup(&self) -> Result<()> {
        teardown(self.cluster.as_ref(), &self.config.namespace)
            .instrument(self.span("cleanup"))
            .await
    }

    fn span(&self, step: &str) -> tracing::Span {
        info_span!("diagnostic", run_id = %self.run_id, step = %step)
    }

    async fn step<T, F>(&self, name: &str, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.status.start(name);
        let result = work.instrument(self.span(name)).await;
        let outcome = if result.is_ok() {
            StepOutcome::Success
        } else {
            StepOutcome::Failure
        };
        self.status.stop(name, outcome);
        result
    }

    async fn ensure_ready(&self, group: ProbeGroup) -> Result<()> {
        let deployer = WorkloadDeployer::new(
            self.cluster.as_ref(),
            &self.config.namespace,
            &self.config.image,
        )
        .with_run_id(self.run_id.clone());
        let deployment = deployer.deploy(group, &self.config.data_cidr).await?;

        if deployment.outcome.needs_wait() {
            ReadinessPoller::new(
                self.cluster.as_ref(),
                self.config.poll_interval,
                self.config.poll_timeout,
            )
            .wait_ready(&self.config.namespace, group.workload_name())
            .await?;
        }
        Ok(())
    }

    fn orchestrator(&self) -> PairwiseOrchestrator {
        PairwiseOrchestrator::new(
            self.runner.clone(),
            &self.config.namespace,
            self.config.probe.clone(),
        )
    }

    async fn check_connectivity(&self) -> Result<()> {
        let instances =
            list_instances(self.cluster.as_ref(), &self.config.namespace, ProbeGroup::Basic)
                .await?;
        self.orchestrator().check_connectivity(&instances).await
    }

    async fn measure_bandwidth(&self) -> Result<PairwiseScan> {
        self.ensure_ready(ProbeGroup::HostNetwork).await?;
        let instances = list_instances(
            self.cluster.as_ref(),
            &self.config.namespace,
            ProbeGroup::HostNetwork,
        )
        .await?;
        self.orchestrator().measure_bandwidth(&instances).await
    }
}
