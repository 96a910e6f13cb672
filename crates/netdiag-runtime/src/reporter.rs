use netdiag_core::{CheckResult, NetdiagError, Result};
use std::io::Write;

/// Min, max and mean throughput over a set of results, in MB/s
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthSummary {
    pub pairs: usize,
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

impl BandwidthSummary {
    pub fn from_results(results: &[CheckResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut total = 0.0;
        for r in results {
            min = min.min(r.bandwidth_mb);
            max = max.max(r.bandwidth_mb);
            total += r.bandwidth_mb;
        }
        Some(Self {
            pairs: results.len(),
            min,
            max,
            average: total / results.len() as f64,
        })
    }
}

/// Writes bandwidth results one line per pair
pub struct Reporter<W: Write> {
    out: W,
    summary: bool,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            summary: false,
        }
    }

    /// Append a min/max/avg line after the per-pair lines
    pub fn with_summary(mut self, summary: bool) -> Self {
        self.summary = summary;
        self
    }

    /// Print `results` in the order given
    pub fn report(&mut self, results: &[CheckResult]) -> Result<()> {
        for result in results {
            writeln!(self.out, "{}", result).map_err(write_failed)?;
        }

        if self.summary {
            if let Some(s) = BandwidthSummary::from_results(results) {
                writeln!(
                    self.out,
                    "{} pair(s): min {:.2} MB/s, max {:.2} MB/s, avg {:.2} MB/s",
                    s.pairs, s.min, s.max, s.average
                )
                .map_err(write_failed)?;
            }
        }

        self.out.flush().map_err(write_failed)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn write_failed(e: std::io::Error) -> NetdiagError {
    NetdiagError::serialization(format!("Failed to write report: {}", e), Some(Box::new(e)))
}
