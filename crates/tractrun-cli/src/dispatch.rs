//! Dispatch loop: single-specification and batch-file modes.
//!
//! One invocation either submits a single subject specification given as
//! process arguments, or walks a batch file submitting one job per line.
//! A bad line never aborts the batch; the summary carries the worst
//! per-line status so the process can exit non-zero at the end.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tractrun_core::{config, Config, Error, Result, SubjectSpec};

use crate::submit::{JobRequest, Scheduler};

/// What `submit_one` did with a specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Submitted,
    /// Comment or empty specification; nothing validated, nothing sent.
    Skipped,
}

/// Aggregate result of one dispatch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExitSummary {
    pub submitted: usize,
    pub failed: usize,
}

impl ExitSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Entry point: exactly one argument is a batch-file path, anything else
/// is a single subject specification.
pub fn dispatch(
    config: &Config,
    scheduler: &dyn Scheduler,
    args: &[String],
) -> Result<ExitSummary> {
    if let [path] = args {
        return dispatch_batch(config, scheduler, Path::new(path));
    }

    let mut summary = ExitSummary::default();
    let spec = SubjectSpec::from_tokens(args.to_vec());
    match submit_one(config, scheduler, &spec) {
        Ok(Outcome::Submitted) => summary.submitted += 1,
        Ok(Outcome::Skipped) => {}
        Err(err) => {
            eprintln!("tractrun: {err}");
            summary.failed += 1;
        }
    }
    Ok(summary)
}

/// Validate one specification and submit it.
///
/// Comments are a no-op. A missing or empty SUBJECT value is an error
/// before any side effect: no logs directory, no submission.
pub fn submit_one(
    config: &Config,
    scheduler: &dyn Scheduler,
    spec: &SubjectSpec,
) -> Result<Outcome> {
    if spec.is_empty() || spec.is_comment() {
        return Ok(Outcome::Skipped);
    }

    let subject = spec
        .subject_id()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::MissingSubject(spec.to_string()))?;

    let logs_dir = config.logs_dir();
    // Safe to repeat across concurrent dispatcher runs.
    std::fs::create_dir_all(&logs_dir)?;

    // Audit line: the exact token sequence handed to the scheduler.
    println!("{spec}");

    let job = JobRequest {
        stdout_path: logs_dir.join(format!("{subject}.%j.stdout")),
        stderr_path: logs_dir.join(format!("{subject}.%j.stderr")),
        script: config::runner_script()?,
        subject_id: subject,
        tokens: spec.tokens().to_vec(),
    };
    scheduler.submit(&job)?;
    Ok(Outcome::Submitted)
}

fn dispatch_batch(
    config: &Config,
    scheduler: &dyn Scheduler,
    path: &Path,
) -> Result<ExitSummary> {
    let file = File::open(path).map_err(|source| Error::BatchFile {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut summary = ExitSummary::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| Error::BatchFile {
            path: path.to_path_buf(),
            source,
        })?;
        let lineno = idx + 1;

        let spec = match SubjectSpec::from_line(&line) {
            Ok(Some(spec)) => spec,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("tractrun: {}:{lineno}: {err}", path.display());
                summary.failed += 1;
                continue;
            }
        };

        match submit_one(config, scheduler, &spec) {
            Ok(Outcome::Submitted) => summary.submitted += 1,
            Ok(Outcome::Skipped) => {}
            Err(err) => {
                eprintln!("tractrun: {}:{lineno}: {err}", path.display());
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    #[derive(Default)]
    struct RecordingScheduler {
        jobs: RefCell<Vec<JobRequest>>,
    }

    impl Scheduler for RecordingScheduler {
        fn submit(&self, job: &JobRequest) -> Result<()> {
            self.jobs.borrow_mut().push(job.clone());
            Ok(())
        }
    }

    struct FailingScheduler;

    impl Scheduler for FailingScheduler {
        fn submit(&self, _job: &JobRequest) -> Result<()> {
            Err(Error::Submission("sbatch exited with 1".into()))
        }
    }

    fn test_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.subjects_dir = dir.path().join("fs");
        (dir, config)
    }

    fn spec(tokens: &[&str]) -> SubjectSpec {
        SubjectSpec::from_tokens(tokens.iter().map(|t| (*t).to_string()).collect())
    }

    #[test]
    fn missing_subject_has_no_side_effects() {
        let (_dir, config) = test_config();
        let scheduler = RecordingScheduler::default();

        let err = submit_one(&config, &scheduler, &spec(&["AGE=5", "SEX=f"])).unwrap_err();
        assert!(matches!(err, Error::MissingSubject(_)));
        assert!(scheduler.jobs.borrow().is_empty());
        assert!(!config.logs_dir().exists());
    }

    #[test]
    fn empty_subject_value_is_missing() {
        let (_dir, config) = test_config();
        let scheduler = RecordingScheduler::default();

        let err = submit_one(&config, &scheduler, &spec(&["SUBJECT=", "AGE=5"])).unwrap_err();
        assert!(matches!(err, Error::MissingSubject(_)));
        assert!(scheduler.jobs.borrow().is_empty());
    }

    #[test]
    fn commented_out_specification_is_a_noop() {
        let (_dir, config) = test_config();
        let scheduler = RecordingScheduler::default();

        let outcome = submit_one(&config, &scheduler, &spec(&["#", "SUBJECT=foo"])).unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert!(scheduler.jobs.borrow().is_empty());
        assert!(!config.logs_dir().exists());
    }

    #[test]
    fn submission_creates_logs_dir_and_templates() {
        let (_dir, config) = test_config();
        let scheduler = RecordingScheduler::default();

        let outcome =
            submit_one(&config, &scheduler, &spec(&["SUBJECT=alice", "AGE=5"])).unwrap();
        assert_eq!(outcome, Outcome::Submitted);
        assert!(config.logs_dir().is_dir());

        let jobs = scheduler.jobs.borrow();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].subject_id, "alice");
        assert_eq!(
            jobs[0].stdout_path,
            config.logs_dir().join("alice.%j.stdout")
        );
        assert_eq!(
            jobs[0].stderr_path,
            config.logs_dir().join("alice.%j.stderr")
        );
        assert_eq!(jobs[0].tokens, ["SUBJECT=alice", "AGE=5"]);
    }

    #[test]
    fn repeated_submissions_tolerate_existing_logs_dir() {
        let (_dir, config) = test_config();
        let scheduler = RecordingScheduler::default();

        submit_one(&config, &scheduler, &spec(&["SUBJECT=alice"])).unwrap();
        submit_one(&config, &scheduler, &spec(&["SUBJECT=bob"])).unwrap();
        assert_eq!(scheduler.jobs.borrow().len(), 2);
    }

    #[test]
    fn scheduler_failure_is_surfaced() {
        let (_dir, config) = test_config();
        let err = submit_one(&config, &FailingScheduler, &spec(&["SUBJECT=alice"])).unwrap_err();
        assert!(matches!(err, Error::Submission(_)));
    }

    fn write_batch(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("subjects.txt");
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn batch_submits_one_job_per_line() {
        let (dir, config) = test_config();
        let scheduler = RecordingScheduler::default();
        let batch = write_batch(&dir, "SUBJECT=alice AGE=5\nSUBJECT=bob AGE=7\n");

        let summary = dispatch(
            &config,
            &scheduler,
            &[batch.display().to_string()],
        )
        .unwrap();
        assert_eq!(summary, ExitSummary { submitted: 2, failed: 0 });

        let jobs = scheduler.jobs.borrow();
        assert_eq!(jobs.len(), 2);
        assert!(jobs[0].stdout_path.to_string_lossy().contains("alice"));
        assert!(jobs[1].stdout_path.to_string_lossy().contains("bob"));
    }

    #[test]
    fn batch_skips_comments_and_blank_lines() {
        let (dir, config) = test_config();
        let scheduler = RecordingScheduler::default();
        let batch = write_batch(&dir, "# SUBJECT=foo\n\n  # indented\nSUBJECT=alice\n");

        let summary = dispatch(&config, &scheduler, &[batch.display().to_string()]).unwrap();
        assert_eq!(summary, ExitSummary { submitted: 1, failed: 0 });
    }

    #[test]
    fn batch_continues_past_a_bad_line() {
        let (dir, config) = test_config();
        let scheduler = RecordingScheduler::default();
        let batch = write_batch(&dir, "AGE=5\nSUBJECT=bob AGE=7\n");

        let summary = dispatch(&config, &scheduler, &[batch.display().to_string()]).unwrap();
        assert_eq!(summary, ExitSummary { submitted: 1, failed: 1 });
        assert!(!summary.is_success());
        assert_eq!(scheduler.jobs.borrow()[0].subject_id, "bob");
    }

    #[test]
    fn batch_counts_unclosed_quote_as_line_failure() {
        let (dir, config) = test_config();
        let scheduler = RecordingScheduler::default();
        let batch = write_batch(&dir, "SUBJECT=carl ROI=\"left hippocampus\nSUBJECT=dora\n");

        let summary = dispatch(&config, &scheduler, &[batch.display().to_string()]).unwrap();
        assert_eq!(summary, ExitSummary { submitted: 1, failed: 1 });
    }

    #[test]
    fn quoted_value_survives_batch_round_trip() {
        let (dir, config) = test_config();
        let scheduler = RecordingScheduler::default();
        let batch = write_batch(&dir, "SUBJECT=carl ROI=\"left hippocampus\"\n");

        dispatch(&config, &scheduler, &[batch.display().to_string()]).unwrap();
        let jobs = scheduler.jobs.borrow();
        assert_eq!(jobs[0].tokens, ["SUBJECT=carl", "ROI=left hippocampus"]);
    }

    #[test]
    fn unreadable_batch_file_is_fatal() {
        let (dir, config) = test_config();
        let scheduler = RecordingScheduler::default();
        let missing = dir.path().join("no-such-file.txt");

        let err = dispatch(&config, &scheduler, &[missing.display().to_string()]).unwrap_err();
        assert!(matches!(err, Error::BatchFile { .. }));
    }

    #[test]
    fn direct_arguments_form_one_specification() {
        let (_dir, config) = test_config();
        let scheduler = RecordingScheduler::default();

        let summary = dispatch(
            &config,
            &scheduler,
            &["SUBJECT=carl".to_string(), "ROI=left hippocampus".to_string()],
        )
        .unwrap();
        assert_eq!(summary, ExitSummary { submitted: 1, failed: 0 });
        assert_eq!(
            scheduler.jobs.borrow()[0].tokens,
            ["SUBJECT=carl", "ROI=left hippocampus"]
        );
    }

    #[test]
    fn direct_arguments_missing_subject_fail_the_run() {
        let (_dir, config) = test_config();
        let scheduler = RecordingScheduler::default();

        let summary = dispatch(
            &config,
            &scheduler,
            &["AGE=5".to_string(), "SEX=f".to_string()],
        )
        .unwrap();
        assert_eq!(summary, ExitSummary { submitted: 0, failed: 1 });
    }
}
