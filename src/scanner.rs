// Repository scanning: file discovery plus worker pool orchestration
//
// Walks a local repository root honoring include/exclude globs, feeds the
// bounded worker pool and assembles the scored report. Repository
// acquisition (cloning, checkout) is the caller's concern; the scanner only
// ever sees a directory or a prepared list of (path, bytes) jobs.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::detection::DetectionPipeline;
use crate::error::ScanError;
use crate::file_processor::{FileJob, FileProcessor};
use crate::report::{EmissionAssembler, FileError, ScanReport};
use crate::risk_assessment::RiskScorer;
use crate::utils::normalize_rel_path;

pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Discover files under `root` and scan them.
    pub async fn scan_path(&self, root: &Path) -> Result<ScanReport> {
        let (jobs, oversized) = self.discover(root)?;
        info!(
            root = %root.display(),
            files = jobs.len(),
            skipped_oversized = oversized.len(),
            "discovery complete"
        );
        self.scan_files(jobs, oversized).await
    }

    /// Scan prepared (relative path, bytes) jobs. `pre_errors` carries
    /// discovery-time failures straight into the summary.
    pub async fn scan_files(
        &self,
        jobs: Vec<FileJob>,
        pre_errors: Vec<FileError>,
    ) -> Result<ScanReport> {
        let pipeline = DetectionPipeline::from_config(&self.config).map_err(|errors| {
            let ids: Vec<String> = errors
                .iter()
                .map(|e| match e {
                    ScanError::RuleCompile { rule_id, .. } => rule_id.clone(),
                    other => other.to_string(),
                })
                .collect();
            anyhow!("rule compilation failed: {}", ids.join(", "))
        })?;

        let (mut pool, mut results) = FileProcessor::spawn(Arc::new(pipeline), &self.config);
        let mut assembler = EmissionAssembler::new();
        for error in pre_errors {
            assembler.add_result(crate::file_processor::FileResult {
                path: error.file,
                findings: Vec::new(),
                stats: Default::default(),
                error: Some(error.error),
            });
        }

        for job in jobs {
            let mut pending = job;
            loop {
                match pool.try_submit(pending) {
                    Ok(()) => break,
                    Err((job, ScanError::QueueFull)) => {
                        // Queue is at capacity: drain one result, then retry
                        match results.recv().await {
                            Some(result) => assembler.add_result(result),
                            None => return Err(anyhow!("worker pool stopped unexpectedly")),
                        }
                        pending = job;
                    }
                    Err((_, other)) => return Err(anyhow!("submit failed: {other}")),
                }
            }
        }

        // Close the queue first so workers can drain into the result
        // channel while we read it, then join them.
        pool.close();
        while let Some(result) = results.recv().await {
            assembler.add_result(result);
        }
        pool.shutdown().await;

        RiskScorer::new(&self.config).score(assembler.findings_mut());
        Ok(assembler.finish())
    }

    /// Walk the tree, apply the glob filters and load file bytes. Oversized
    /// files surface as errors without being read.
    fn discover(&self, root: &Path) -> Result<(Vec<FileJob>, Vec<FileError>)> {
        let include = build_globset(&self.config.include_globs)?;
        let exclude = build_globset(&self.config.exclude_globs)?;

        let mut jobs = Vec::new();
        let mut errors = Vec::new();

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            let rel = normalize_rel_path(&rel);

            if let Some(include) = &include {
                if !include.is_match(&rel) {
                    continue;
                }
            }
            if let Some(exclude) = &exclude {
                if exclude.is_match(&rel) {
                    continue;
                }
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size > self.config.max_file_size_bytes as u64 {
                errors.push(FileError {
                    file: rel,
                    error: ScanError::FileTooLarge {
                        size,
                        limit: self.config.max_file_size_bytes as u64,
                    },
                });
                continue;
            }

            let bytes = std::fs::read(entry.path())
                .with_context(|| format!("reading {}", entry.path().display()))?;
            jobs.push(FileJob { path: rel, bytes });
        }

        Ok((jobs, errors))
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("bad glob {pattern:?}"))?);
    }
    Ok(Some(builder.build()?))
}
