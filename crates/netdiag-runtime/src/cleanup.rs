use crate::traits::ClusterApi;
use netdiag_core::resources::is_managed_namespace;
use netdiag_core::Result;
use tracing::{debug, info, warn};

/// Delete the diagnostic namespace and everything in it.
///
/// A namespace that is already gone counts as success. One without the
/// netdiag managed-by label is left alone.
pub async fn teardown(cluster: &dyn ClusterApi, namespace: &str) -> Result<()> {
    let existing = match cluster.get_namespace(namespace).await? {
        Some(ns) => ns,
        None => {
            debug!("Namespace {} not present, nothing to clean up", namespace);
            return Ok(());
        }
    };
    if !is_managed_namespace(&existing) {
        warn!("Namespace {} is not managed by netdiag, not deleting it", namespace);
        return Ok(());
    }

    cluster.delete_namespace(namespace).await?;
    info!("Deleted namespace {}", namespace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCluster;
    use netdiag_core::NetdiagError;

    #[tokio::test]
    async fn test_deletes_present_namespace() {
        let cluster = MockCluster::new();
        cluster.insert_namespace("netdiag").await;

        teardown(&cluster, "netdiag").await.unwrap();
        assert!(!cluster.has_namespace("netdiag").await);
        assert_eq!(cluster.mutations().await, vec!["delete_namespace netdiag"]);
    }

    #[tokio::test]
    async fn test_absent_namespace_is_success() {
        let cluster = MockCluster::new();
        teardown(&cluster, "netdiag").await.unwrap();
        assert!(cluster.mutations().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_failure_propagates() {
        let cluster = MockCluster::new();
        cluster.insert_namespace("netdiag").await;
        cluster.fail_namespace_delete().await;

        let err = teardown(&cluster, "netdiag").await.unwrap_err();
        assert!(matches!(err, NetdiagError::ClusterApi { .. }));
        assert!(cluster.has_namespace("netdiag").await);
    }

    #[tokio::test]
    async fn test_foreign_namespace_is_kept() {
        let cluster = MockCluster::new();
        cluster.insert_foreign_namespace("prod").await;

        teardown(&cluster, "prod").await.unwrap();
        assert!(cluster.has_namespace("prod").await);
        assert!(cluster.mutations().await.is_empty());
    }
}
