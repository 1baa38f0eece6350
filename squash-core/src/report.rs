//! Batch summary reporting.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::profile::Category;
use crate::scheduler::{JobResult, JobStatus};
use crate::utils::{calculate_size_reduction, format_bytes, format_duration};

/// Per-category outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Totals over the results of one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_jobs: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,

    /// Input bytes of completed jobs.
    pub total_input_size: u64,

    /// Output bytes of completed jobs.
    pub total_output_size: u64,

    /// Overall reduction percentage over completed jobs
    pub overall_reduction: f64,

    /// Longest job wall time, submission to finish
    pub longest_job: Duration,

    pub per_category: BTreeMap<Category, CategoryCounts>,
}

impl BatchSummary {
    pub fn from_results(results: &[JobResult]) -> Self {
        let mut summary = Self {
            total_jobs: results.len(),
            completed: 0,
            failed: 0,
            cancelled: 0,
            total_input_size: 0,
            total_output_size: 0,
            overall_reduction: 0.0,
            longest_job: Duration::ZERO,
            per_category: BTreeMap::new(),
        };

        for result in results {
            let counts = summary.per_category.entry(result.category).or_default();
            match result.status {
                JobStatus::Completed => {
                    counts.completed += 1;
                    summary.completed += 1;
                    summary.total_input_size += result.input_size;
                    summary.total_output_size += result.output_size;
                }
                JobStatus::Failed => {
                    counts.failed += 1;
                    summary.failed += 1;
                }
                JobStatus::Cancelled => {
                    counts.cancelled += 1;
                    summary.cancelled += 1;
                }
            }
            summary.longest_job = summary.longest_job.max(result.elapsed);
        }

        summary.overall_reduction =
            calculate_size_reduction(summary.total_input_size, summary.total_output_size);
        summary
    }

    pub fn all_succeeded(&self) -> bool {
        self.completed == self.total_jobs
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Jobs:              {}", self.total_jobs)?;
        writeln!(f, "Completed:         {}", self.completed)?;
        writeln!(f, "Failed:            {}", self.failed)?;
        writeln!(f, "Cancelled:         {}", self.cancelled)?;
        writeln!(f, "Total input:       {}", format_bytes(self.total_input_size))?;
        writeln!(f, "Total output:      {}", format_bytes(self.total_output_size))?;
        writeln!(f, "Overall reduction: {:.1}%", self.overall_reduction)?;
        write!(
            f,
            "Longest job:       {}",
            format_duration(self.longest_job.as_secs_f64())
        )?;

        for (category, counts) in &self.per_category {
            write!(
                f,
                "\n  {:<9} {} completed, {} failed, {} cancelled",
                category.as_str(),
                counts.completed,
                counts.failed,
                counts.cancelled
            )?;
        }
        Ok(())
    }
}
