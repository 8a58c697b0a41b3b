//! Running statistics for a writer pool.

use std::path::Path;
use std::time::Instant;

/// Cap on retained validation issues; older runs showed unbounded lists
/// ballooning on pathological inputs, so only the first few are kept.
pub const MAX_RETAINED_ISSUES: usize = 10;

/// A permanently failed job retained for operator visibility.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Artifact file name the job was writing.
    pub file_name: String,
    /// Short list of what went wrong.
    pub issues: Vec<String>,
}

/// Aggregate statistics for one pool instance.
///
/// Derived metrics (compression ratio, throughput, validation rate) are
/// computed on demand and never stored redundantly.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub total_records: u64,
    pub total_original_bytes: u64,
    pub total_compressed_bytes: u64,
    pub started_at: Instant,
    /// Up to [`MAX_RETAINED_ISSUES`] permanently failed jobs.
    pub validation_issues: Vec<ValidationIssue>,
}

impl Default for PoolStats {
    fn default() -> Self {
        Self {
            total_jobs: 0,
            completed_jobs: 0,
            failed_jobs: 0,
            total_records: 0,
            total_original_bytes: 0,
            total_compressed_bytes: 0,
            started_at: Instant::now(),
            validation_issues: Vec::new(),
        }
    }
}

impl PoolStats {
    /// Merge a completed job's counts.
    pub fn merge_completed(&mut self, original_bytes: u64, compressed_bytes: u64, records: u64) {
        self.completed_jobs += 1;
        self.total_records += records;
        self.total_original_bytes += original_bytes;
        self.total_compressed_bytes += compressed_bytes;
    }

    /// Record a permanent failure, retaining at most [`MAX_RETAINED_ISSUES`].
    pub fn record_failure(&mut self, file_path: &Path, issues: Vec<String>) {
        self.failed_jobs += 1;
        if self.validation_issues.len() < MAX_RETAINED_ISSUES {
            let file_name = file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_path.display().to_string());
            self.validation_issues.push(ValidationIssue { file_name, issues });
        }
    }

    /// Compression ratio as a percentage: `compressed / original * 100`.
    ///
    /// Defined as 0 when no input bytes have been consumed.
    pub fn compression_ratio(&self) -> f64 {
        if self.total_original_bytes == 0 {
            return 0.0;
        }
        self.total_compressed_bytes as f64 / self.total_original_bytes as f64 * 100.0
    }

    /// Compressed bytes produced per elapsed second.
    pub fn throughput(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.total_compressed_bytes as f64 / elapsed
    }

    /// Share of validated jobs that did not fail, as a percentage.
    ///
    /// Defined as 100 when nothing has been validated yet.
    pub fn validation_rate(&self) -> f64 {
        let validated = self.completed_jobs + self.failed_jobs;
        if validated == 0 {
            return 100.0;
        }
        (validated - self.failed_jobs) as f64 / validated as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_compression_ratio_quarter() {
        let mut stats = PoolStats::default();
        stats.merge_completed(100 * 1024 * 1024, 25 * 1024 * 1024, 1_000);
        assert_eq!(stats.compression_ratio(), 25.0);
    }

    #[test]
    fn test_compression_ratio_zero_input() {
        let stats = PoolStats::default();
        assert_eq!(stats.compression_ratio(), 0.0);
    }

    #[test]
    fn test_validation_rate() {
        let mut stats = PoolStats::default();
        assert_eq!(stats.validation_rate(), 100.0);

        stats.merge_completed(10, 5, 1);
        stats.merge_completed(10, 5, 1);
        stats.merge_completed(10, 5, 1);
        stats.record_failure(&PathBuf::from("bad.bin"), vec!["oops".to_string()]);

        assert_eq!(stats.validation_rate(), 75.0);
    }

    #[test]
    fn test_issue_list_is_bounded() {
        let mut stats = PoolStats::default();
        for i in 0..25 {
            stats.record_failure(
                &PathBuf::from(format!("artifact-{i}.bin")),
                vec!["bad".to_string()],
            );
        }

        assert_eq!(stats.failed_jobs, 25);
        assert_eq!(stats.validation_issues.len(), MAX_RETAINED_ISSUES);
        // The earliest failures are the ones retained.
        assert_eq!(stats.validation_issues[0].file_name, "artifact-0.bin");
    }

    #[test]
    fn test_issue_keeps_file_name_only() {
        let mut stats = PoolStats::default();
        stats.record_failure(
            &PathBuf::from("/data/staging/artifact.bin"),
            vec!["enospc".to_string()],
        );
        assert_eq!(stats.validation_issues[0].file_name, "artifact.bin");
    }
}
