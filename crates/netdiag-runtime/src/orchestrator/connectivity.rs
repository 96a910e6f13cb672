use super::{require_pair, unreachable, PairwiseOrchestrator, CNI_HINT};
use netdiag_core::{NetdiagError, ProbeInstance, Result};
use tracing::{debug, info};

impl PairwiseOrchestrator {
    /// TCP reachability from the first instance to every instance, itself included.
    ///
    /// Stops at the first unreachable target.
    pub async fn check_connectivity(&self, instances: &[ProbeInstance]) -> Result<()> {
        require_pair(instances)?;

        let client = &instances[0];
        for target in instances {
            let ip = target.ip.ok_or_else(|| {
                NetdiagError::execution(&target.name, "pod has no IP address assigned")
                    .with_hint(CNI_HINT)
            })?;

            let command = format!("nc -zv {} {}", ip, self.settings.port);
            debug!("{} -> {} ({})", client.name, target.name, ip);
            self.runner
                .run_command(&client.name, &self.namespace, &command)
                .await
                .map_err(|e| unreachable(&client.name, &target.name, e, CNI_HINT))?;
        }

        info!(
            "Pod network connectivity verified from {} to {} instance(s)",
            client.name,
            instances.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeSettings;
    use crate::mock::MockRunner;
    use netdiag_core::ProbeGroup;
    use std::sync::Arc;

    fn basic(name: &str, ip: &str) -> ProbeInstance {
        ProbeInstance::new(name, format!("node-{}", name), ip.parse().unwrap(), ProbeGroup::Basic)
    }

    fn orchestrator(runner: Arc<MockRunner>) -> PairwiseOrchestrator {
        PairwiseOrchestrator::new(runner, "netdiag", ProbeSettings::default())
    }

    #[tokio::test]
    async fn test_probes_every_instance_from_first() {
        let runner = Arc::new(MockRunner::new());
        let instances = vec![
            basic("a", "10.244.0.10"),
            basic("b", "10.244.1.10"),
            basic("c", "10.244.2.10"),
        ];

        orchestrator(runner.clone())
            .check_connectivity(&instances)
            .await
            .unwrap();

        let calls = runner.calls().await;
        assert_eq!(
            calls,
            vec![
                ("a".to_string(), "nc -zv 10.244.0.10 5201".to_string()),
                ("a".to_string(), "nc -zv 10.244.1.10 5201".to_string()),
                ("a".to_string(), "nc -zv 10.244.2.10 5201".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_single_instance_is_topology_error_without_exec() {
        let runner = Arc::new(MockRunner::new());
        let err = orchestrator(runner.clone())
            .check_connectivity(&[basic("a", "10.244.0.10")])
            .await
            .unwrap_err();

        assert!(matches!(err, NetdiagError::Topology { found: 1, .. }));
        assert!(runner.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_first_failure_aborts() {
        let runner = Arc::new(MockRunner::new());
        runner
            .fail("a", "10.244.1.10", "connection timed out")
            .await;
        let instances = vec![
            basic("a", "10.244.0.10"),
            basic("b", "10.244.1.10"),
            basic("c", "10.244.2.10"),
        ];

        let err = orchestrator(runner.clone())
            .check_connectivity(&instances)
            .await
            .unwrap_err();

        match err {
            NetdiagError::Execution {
                instance,
                cause,
                hint,
            } => {
                assert_eq!(instance, "a");
                assert!(cause.contains("can't connect to pod b"));
                assert!(cause.contains("connection timed out"));
                assert_eq!(hint, CNI_HINT);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // c is never probed
        assert_eq!(runner.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_ip_fails() {
        let runner = Arc::new(MockRunner::new());
        let mut pending = basic("b", "10.244.1.10");
        pending.ip = None;

        let err = orchestrator(runner)
            .check_connectivity(&[basic("a", "10.244.0.10"), pending])
            .await
            .unwrap_err();
        assert!(matches!(err, NetdiagError::Execution { ref instance, .. } if instance == "b"));
    }
}
