//! Job planner implementation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{RunConfig, TargetFormat};
use crate::metrics;

use super::types::{Job, JobId, JobStatus, Plan};

/// Planning problems. Each one is recorded on the affected jobs as a `Failed`
/// diagnostic; none of them stop the run.
#[derive(Debug, Error)]
pub enum PlanningError {
    /// The source is not below the input root.
    #[error("{source_path} is outside the input root {root}")]
    OutsideInputRoot { source_path: PathBuf, root: PathBuf },

    /// The destination would overwrite the source itself.
    #[error("destination {path} is the source file")]
    DestinationIsSource { path: PathBuf },

    /// Another source already maps to this destination.
    #[error("destination {destination} collides with {other}")]
    Collision {
        destination: PathBuf,
        other: PathBuf,
    },

    /// A destination directory could not be created.
    #[error("cannot create destination directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Characters that are not allowed in file names on Windows.
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Turns scanned source files into an ordered list of jobs.
#[derive(Debug, Clone)]
pub struct JobPlanner {
    input_root: PathBuf,
    output_root: PathBuf,
    target: TargetFormat,
    overwrite: bool,
    flatten: bool,
}

impl JobPlanner {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            input_root: config.input_root.clone(),
            output_root: config.output_root.clone(),
            target: config.target.clone(),
            overwrite: config.overwrite,
            flatten: config.flatten,
        }
    }

    /// Computes where the converted form of `source` goes.
    ///
    /// Mirrored mode keeps the relative directory structure; flatten mode puts
    /// everything in the output root and folds the parent folders into the name.
    pub fn destination_for(&self, source: &Path) -> Result<PathBuf, PlanningError> {
        let rel = source
            .strip_prefix(&self.input_root)
            .map_err(|_| PlanningError::OutsideInputRoot {
                source_path: source.to_path_buf(),
                root: self.input_root.clone(),
            })?;

        // Copy mode keeps the original extension, including its case
        let extension = match self.target.extension() {
            Some(ext) => ext.to_string(),
            None => source
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default(),
        };

        if !self.flatten {
            return Ok(self.output_root.join(rel).with_extension(extension));
        }

        let stem = rel
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut name = sanitize_component(&stem);

        let parents: Vec<String> = rel
            .parent()
            .map(|p| {
                p.components()
                    .map(|c| sanitize_component(&c.as_os_str().to_string_lossy()))
                    .collect()
            })
            .unwrap_or_default();
        if !parents.is_empty() {
            name = format!("{}__{}", name, parents.join("__"));
        }
        if !extension.is_empty() {
            name = format!("{}.{}", name, extension);
        }

        Ok(self.output_root.join(name))
    }

    /// Builds the plan: sorts candidates, derives destinations, marks skips and
    /// collisions, and creates every needed destination directory.
    pub fn plan<I>(&self, candidates: I) -> Plan
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut sources: Vec<PathBuf> = candidates.into_iter().collect();
        sources.sort();
        sources.dedup();

        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
        let mut jobs = Vec::with_capacity(sources.len());

        for (idx, source) in sources.into_iter().enumerate() {
            let id = JobId(idx);
            let destination = match self.destination_for(&source) {
                Ok(destination) => destination,
                Err(e) => {
                    let mut job = Job::pending(id, source.clone(), source);
                    job.fail(e.to_string());
                    jobs.push(job);
                    continue;
                }
            };

            let mut job = Job::pending(id, source, destination);

            if job.destination == job.source {
                job.fail(
                    PlanningError::DestinationIsSource {
                        path: job.destination.clone(),
                    }
                    .to_string(),
                );
            } else if let Some(other) = claimed.get(&job.destination) {
                job.fail(
                    PlanningError::Collision {
                        destination: job.destination.clone(),
                        other: other.clone(),
                    }
                    .to_string(),
                );
            } else {
                claimed.insert(job.destination.clone(), job.source.clone());
                if !self.overwrite && job.destination.exists() {
                    debug!("Destination exists, skipping: {:?}", job.destination);
                    job.skip();
                }
            }

            jobs.push(job);
        }

        self.create_directories(&mut jobs);

        let plan = Plan { jobs };
        for status in [JobStatus::Pending, JobStatus::Skipped, JobStatus::Failed] {
            metrics::JOBS_PLANNED
                .with_label_values(&[status.as_str()])
                .inc_by(plan.count(status) as u64);
        }

        info!(
            "Planned {} jobs: {} pending, {} skipped, {} failed",
            plan.total(),
            plan.count(JobStatus::Pending),
            plan.count(JobStatus::Skipped),
            plan.count(JobStatus::Failed)
        );

        plan
    }

    /// Creates destination directories for pending jobs ahead of dispatch.
    /// Jobs whose directory cannot be created are failed.
    fn create_directories(&self, jobs: &mut [Job]) {
        let mut dirs: BTreeSet<PathBuf> = BTreeSet::new();
        for job in jobs.iter().filter(|j| j.status == JobStatus::Pending) {
            if let Some(parent) = job.destination.parent() {
                dirs.insert(parent.to_path_buf());
            }
        }

        let mut failed: BTreeMap<PathBuf, String> = BTreeMap::new();
        for dir in dirs {
            if let Err(e) = std::fs::create_dir_all(&dir) {
                let error = PlanningError::CreateDirectory {
                    path: dir.clone(),
                    source: e,
                };
                warn!("{}", error);
                failed.insert(dir, error.to_string());
            }
        }

        if failed.is_empty() {
            return;
        }

        for job in jobs.iter_mut().filter(|j| j.status == JobStatus::Pending) {
            let diagnostic = job
                .destination
                .parent()
                .and_then(|parent| failed.get(parent))
                .cloned();
            if let Some(diagnostic) = diagnostic {
                job.fail(diagnostic);
            }
        }
    }
}

/// Makes a single path component safe to use as part of a file name.
fn sanitize_component(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| if INVALID_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn planner(input: &Path, output: &Path, target: TargetFormat) -> JobPlanner {
        JobPlanner::new(&RunConfig::new(input, output, target))
    }

    #[test]
    fn test_mirrored_destination() {
        let p = planner(Path::new("/root"), Path::new("/out"), TargetFormat::KindleApp);
        let dest = p.destination_for(Path::new("/root/a/b/x.pdf")).unwrap();
        assert_eq!(dest, PathBuf::from("/out/a/b/x.epub"));
    }

    #[test]
    fn test_only_final_extension_changes() {
        let p = planner(Path::new("/root"), Path::new("/out"), TargetFormat::KindleDevice);
        let dest = p.destination_for(Path::new("/root/v1.2.book.PDF")).unwrap();
        assert_eq!(dest, PathBuf::from("/out/v1.2.book.azw3"));
    }

    #[test]
    fn test_copy_keeps_extension() {
        let p = planner(Path::new("/root"), Path::new("/out"), TargetFormat::Copy);
        let dest = p.destination_for(Path::new("/root/a/Book.PDF")).unwrap();
        assert_eq!(dest, PathBuf::from("/out/a/Book.PDF"));
    }

    #[test]
    fn test_flatten_destination() {
        let config = RunConfig::new("/root", "/out", TargetFormat::KindleApp).with_flatten(true);
        let p = JobPlanner::new(&config);

        let nested = p.destination_for(Path::new("/root/Sci Fi/Dune?/x.pdf")).unwrap();
        assert_eq!(nested, PathBuf::from("/out/x__Sci Fi__Dune_.epub"));

        let top = p.destination_for(Path::new("/root/y.pdf")).unwrap();
        assert_eq!(top, PathBuf::from("/out/y.epub"));
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("a:b*c"), "a_b_c");
        assert_eq!(sanitize_component(" .hidden. "), "hidden");
        assert_eq!(sanitize_component("..."), "_");
    }

    #[test]
    fn test_outside_root_fails() {
        let p = planner(Path::new("/root"), Path::new("/out"), TargetFormat::KindleApp);
        assert!(matches!(
            p.destination_for(Path::new("/elsewhere/x.pdf")),
            Err(PlanningError::OutsideInputRoot { .. })
        ));
    }

    #[test]
    fn test_plan_sorts_and_creates_directories() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        let p = planner(&input, &output, TargetFormat::KindleApp);

        let plan = p.plan(vec![
            input.join("z/c.pdf"),
            input.join("a.pdf"),
            input.join("m/b.pdf"),
        ]);

        let sources: Vec<PathBuf> = plan.jobs.iter().map(|j| j.source.clone()).collect();
        assert_eq!(
            sources,
            vec![input.join("a.pdf"), input.join("m/b.pdf"), input.join("z/c.pdf")]
        );
        assert_eq!(plan.jobs[1].id, JobId(1));
        assert!(output.join("m").is_dir());
        assert!(output.join("z").is_dir());
        assert_eq!(plan.count(JobStatus::Pending), 3);
    }

    #[test]
    fn test_existing_destination_is_skipped() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("a.epub"), b"old").unwrap();

        let plan = planner(&input, &output, TargetFormat::KindleApp)
            .plan(vec![input.join("a.pdf"), input.join("b.pdf")]);

        assert_eq!(plan.jobs[0].status, JobStatus::Skipped);
        assert_eq!(plan.jobs[1].status, JobStatus::Pending);
    }

    #[test]
    fn test_overwrite_keeps_existing_destination_pending() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("a.epub"), b"old").unwrap();

        let config = RunConfig::new(&input, &output, TargetFormat::KindleApp).with_overwrite(true);
        let plan = JobPlanner::new(&config).plan(vec![input.join("a.pdf")]);

        assert_eq!(plan.jobs[0].status, JobStatus::Pending);
    }

    #[test]
    fn test_colliding_destinations() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");

        let plan = planner(&input, &output, TargetFormat::KindleApp)
            .plan(vec![input.join("book.pdf"), input.join("book.epub")]);

        // "book.epub" sorts first and claims out/book.epub
        assert_eq!(plan.jobs[0].source, input.join("book.epub"));
        assert_eq!(plan.jobs[0].status, JobStatus::Pending);
        assert_eq!(plan.jobs[1].status, JobStatus::Failed);
        assert!(plan.jobs[1].diagnostic.as_ref().unwrap().contains("collides"));
    }

    #[test]
    fn test_destination_equal_to_source_fails() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();

        let plan = planner(&root, &root, TargetFormat::Copy).plan(vec![root.join("a.pdf")]);

        assert_eq!(plan.jobs[0].status, JobStatus::Failed);
    }

    #[test]
    fn test_directory_creation_failure_fails_jobs_under_it() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(&output).unwrap();
        // A file where a directory is needed
        fs::write(output.join("blocked"), b"not a dir").unwrap();

        let plan = planner(&input, &output, TargetFormat::KindleApp).plan(vec![
            input.join("blocked/a.pdf"),
            input.join("blocked/b.pdf"),
            input.join("fine/c.pdf"),
        ]);

        assert_eq!(plan.jobs[0].status, JobStatus::Failed);
        assert_eq!(plan.jobs[1].status, JobStatus::Failed);
        assert!(plan.jobs[0]
            .diagnostic
            .as_ref()
            .unwrap()
            .contains("cannot create destination directory"));
        assert_eq!(plan.jobs[2].status, JobStatus::Pending);
    }
}
