//! Filesystem job loader.
//!
//! Scans a directory recursively for `*.yml` / `*.yaml` job definitions. A
//! bad file is reported in its [`LoadResult`] and never aborts the scan.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::definition::JobDocument;

/// Outcome of loading a single job file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

#[derive(Debug)]
pub enum LoadStatus {
    Loaded { job_id: String },
    /// Dotfile, non-YAML file, etc.
    Skipped { reason: String },
    Failed { error: String },
}

/// Documents that loaded plus a per-file account of the scan.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<JobDocument>,
    pub results: Vec<LoadResult>,
}

impl LoadReport {
    pub fn failures(&self) -> impl Iterator<Item = &LoadResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, LoadStatus::Failed { .. }))
    }
}

pub struct JobLoader {
    jobs_dir: PathBuf,
}

impl JobLoader {
    pub fn new(jobs_dir: impl Into<PathBuf>) -> Self {
        Self {
            jobs_dir: jobs_dir.into(),
        }
    }

    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    /// Load every job definition under the jobs directory.
    ///
    /// Files are visited in path order so duplicate-id resolution is
    /// deterministic: the first file wins, later ones are `Failed`.
    pub fn load_all(&self) -> LoadReport {
        let mut paths = Vec::new();
        let mut report = LoadReport::default();
        collect_paths(&self.jobs_dir, &mut paths, &mut report.results);
        paths.sort();

        let mut seen = HashSet::new();
        for path in paths {
            let status = match load_file(&path) {
                Ok(doc) if !seen.insert(doc.id.clone()) => LoadStatus::Failed {
                    error: format!("duplicate job id '{}'", doc.id),
                },
                Ok(doc) => {
                    info!(job_id = %doc.id, path = %path.display(), "loaded job definition");
                    let job_id = doc.id.clone();
                    report.documents.push(doc);
                    LoadStatus::Loaded { job_id }
                }
                Err(error) => LoadStatus::Failed { error },
            };
            if let LoadStatus::Failed { error } = &status {
                warn!(path = %path.display(), error = %error, "failed to load job definition");
            }
            report.results.push(LoadResult { path, status });
        }
        report
    }
}

fn load_file(path: &Path) -> Result<JobDocument, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    JobDocument::from_yaml(&content).map_err(|e| e.to_string())
}

fn collect_paths(dir: &Path, paths: &mut Vec<PathBuf>, results: &mut Vec<LoadResult>) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "failed to read jobs directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') {
                if path.is_file() {
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Skipped {
                            reason: "dotfile".to_string(),
                        },
                    });
                }
                continue;
            }
        }

        // Not followed through symlinks.
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Failed { error: e.to_string() },
                });
                continue;
            }
        };
        if file_type.is_dir() {
            collect_paths(&path, paths, results);
            continue;
        }
        if file_type.is_symlink() && path.is_dir() {
            results.push(LoadResult {
                path,
                status: LoadStatus::Skipped {
                    reason: "symlinked directory".to_string(),
                },
            });
            continue;
        }

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "yml" || e == "yaml")
            .unwrap_or(false);

        if is_yaml {
            paths.push(path);
        } else {
            results.push(LoadResult {
                path,
                status: LoadStatus::Skipped {
                    reason: "not a YAML file".to_string(),
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB: &str = "id: JOB_ID\nschedule:\n  interval: 1d\nrecipe:\n  source: {type: mysql}\n  sink: {type: console}\n";

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn loads_recursively_and_skips_others() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yml", &JOB.replace("JOB_ID", "job_a"));
        write(dir.path(), "nested/b.yaml", &JOB.replace("JOB_ID", "job_b"));
        write(dir.path(), ".hidden.yml", &JOB.replace("JOB_ID", "hidden"));
        write(dir.path(), "README.md", "# jobs");

        let report = JobLoader::new(dir.path()).load_all();
        let ids: Vec<&str> = report.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["job_a", "job_b"]);
        let skipped = report
            .results
            .iter()
            .filter(|r| matches!(r.status, LoadStatus::Skipped { .. }))
            .count();
        assert_eq!(skipped, 2);
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn bad_file_and_duplicate_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.yml", &JOB.replace("JOB_ID", "same"));
        write(dir.path(), "2.yml", &JOB.replace("JOB_ID", "same"));
        write(dir.path(), "3.yml", "id: [not, valid");

        let report = JobLoader::new(dir.path()).load_all();
        assert_eq!(report.documents.len(), 1);
        let errors: Vec<String> = report
            .failures()
            .map(|r| match &r.status {
                LoadStatus::Failed { error } => error.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("duplicate job id 'same'"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directory_is_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "nested/a.yml", &JOB.replace("JOB_ID", "job_a"));
        std::os::unix::fs::symlink(dir.path(), dir.path().join("nested/loop")).unwrap();

        let report = JobLoader::new(dir.path()).load_all();
        let ids: Vec<&str> = report.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["job_a"]);
        assert!(report.results.iter().any(|r| matches!(
            &r.status,
            LoadStatus::Skipped { reason } if reason == "symlinked directory"
        )));
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn missing_directory_yields_empty_report() {
        let report = JobLoader::new("/nonexistent/metaload/jobs").load_all();
        assert!(report.documents.is_empty());
        assert!(report.results.is_empty());
    }
}
