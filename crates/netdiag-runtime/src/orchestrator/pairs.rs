use netdiag_core::{NetdiagError, PairIndex, ProbeInstance, Result};

/// Every unordered pair `(i, j)` with `i < j < n`, in lexicographic order
pub fn unordered_pairs(n: usize) -> Vec<PairIndex> {
    let mut pairs = Vec::with_capacity(n.saturating_sub(1) * n / 2);
    for source in 0..n.saturating_sub(1) {
        for destination in source + 1..n {
            pairs.push(PairIndex {
                source,
                destination,
            });
        }
    }
    pairs
}

/// Fail with `TopologyError` unless there are at least two instances
pub fn require_pair(instances: &[ProbeInstance]) -> Result<()> {
    if instances.len() < 2 {
        let group = instances
            .first()
            .map(|i| i.group.to_string())
            .unwrap_or_else(|| "probe".to_string());
        return Err(NetdiagError::topology(group, instances.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netdiag_core::ProbeGroup;
    use std::collections::HashSet;

    #[test]
    fn test_pair_count_and_order() {
        for n in 2..=12 {
            let pairs = unordered_pairs(n);
            assert_eq!(pairs.len(), n * (n - 1) / 2, "n = {}", n);

            let unique: HashSet<_> = pairs.iter().collect();
            assert_eq!(unique.len(), pairs.len(), "duplicate pair for n = {}", n);

            assert!(pairs.iter().all(|p| p.source < p.destination && p.destination < n));
            assert!(pairs.windows(2).all(|w| w[0] < w[1]), "not sorted for n = {}", n);
        }
    }

    #[test]
    fn test_small_sizes() {
        assert!(unordered_pairs(0).is_empty());
        assert!(unordered_pairs(1).is_empty());
        assert_eq!(
            unordered_pairs(3),
            vec![
                PairIndex { source: 0, destination: 1 },
                PairIndex { source: 0, destination: 2 },
                PairIndex { source: 1, destination: 2 },
            ]
        );
    }

    #[test]
    fn test_require_pair() {
        assert!(matches!(
            require_pair(&[]),
            Err(NetdiagError::Topology { found: 0, .. })
        ));

        let one = vec![ProbeInstance::new(
            "pod-a",
            "node-a",
            "10.0.0.1".parse().unwrap(),
            ProbeGroup::HostNetwork,
        )];
        match require_pair(&one) {
            Err(NetdiagError::Topology { group, found }) => {
                assert_eq!(group, "hostnetwork");
                assert_eq!(found, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let mut two = one.clone();
        two.push(ProbeInstance::new(
            "pod-b",
            "node-b",
            "10.0.0.2".parse().unwrap(),
            ProbeGroup::HostNetwork,
        ));
        assert!(require_pair(&two).is_ok());
    }
}
