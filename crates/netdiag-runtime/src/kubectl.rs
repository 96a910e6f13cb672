use crate::command::exec_unchecked;
use crate::traits::RemoteRunner;
use async_trait::async_trait;
use netdiag_core::{NetdiagError, Result};
use tracing::debug;

/// `RemoteRunner` backed by `kubectl exec`
#[derive(Debug, Clone)]
pub struct KubectlRunner {
    kubectl: String,
    context: Option<String>,
}

impl KubectlRunner {
    pub fn new(kubectl: impl Into<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
            context: None,
        }
    }

    /// Use a specific kubeconfig context instead of the current one
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    fn exec_args<'a>(&'a self, pod_name: &'a str, namespace: &'a str, command_line: &'a str) -> Vec<&'a str> {
        let mut args = Vec::with_capacity(10);
        if let Some(context) = &self.context {
            args.push("--context");
            args.push(context.as_str());
        }
        args.extend_from_slice(&[
            "exec",
            "-n",
            namespace,
            pod_name,
            "--",
            "bash",
            "-c",
            command_line,
        ]);
        args
    }
}

impl Default for KubectlRunner {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

#[async_trait]
impl RemoteRunner for KubectlRunner {
    async fn run_command(
        &self,
        pod_name: &str,
        namespace: &str,
        command_line: &str,
    ) -> Result<String> {
        debug!("Running in {}/{}: {}", namespace, pod_name, command_line);

        let args = self.exec_args(pod_name, namespace, command_line);
        let output = exec_unchecked(&self.kubectl, &args)
            .await
            .map_err(|e| NetdiagError::execution(pod_name, e.to_string()))?;

        if !output.success() {
            return Err(NetdiagError::execution(
                pod_name,
                format!(
                    "Run {} fail: exit code {}: {}",
                    command_line,
                    output.exit_code,
                    output.stderr.trim()
                ),
            ));
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_args() {
        let runner = KubectlRunner::default();
        let args = runner.exec_args("pod-a", "netdiag", "cat /opt/iperf_bind_addr");
        assert_eq!(
            args,
            vec![
                "exec",
                "-n",
                "netdiag",
                "pod-a",
                "--",
                "bash",
                "-c",
                "cat /opt/iperf_bind_addr"
            ]
        );
    }

    #[test]
    fn test_exec_args_with_context() {
        let runner = KubectlRunner::default().with_context(Some("staging".to_string()));
        let args = runner.exec_args("pod-a", "netdiag", "true");
        assert_eq!(&args[..3], &["--context", "staging", "exec"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_execution_error() {
        // `false` ignores its arguments and exits 1, standing in for kubectl
        let runner = KubectlRunner::new("false");
        let err = runner
            .run_command("pod-a", "netdiag", "nc -zv 10.0.0.1 5201")
            .await
            .unwrap_err();
        match err {
            NetdiagError::Execution { instance, .. } => assert_eq!(instance, "pod-a"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_execution_error() {
        let runner = KubectlRunner::new("/nonexistent/kubectl");
        let err = runner.run_command("pod-b", "netdiag", "true").await.unwrap_err();
        assert!(matches!(err, NetdiagError::Execution { ref instance, .. } if instance == "pod-b"));
    }
}
