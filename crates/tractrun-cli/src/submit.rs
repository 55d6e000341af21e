//! Job submission backends.
//!
//! [`Scheduler`] is the seam between the dispatch loop and the external
//! batch system, so tests can record submissions without a cluster.

use std::path::PathBuf;
use std::process::Command;

use tractrun_core::{Error, Result, SlurmConfig};

/// One job to hand to the scheduler.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub subject_id: String,
    /// Output path template; `%j` is replaced by the scheduler with the
    /// job id at run time, not by us.
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    /// Per-subject runner script, resolved next to the dispatcher binary.
    pub script: PathBuf,
    /// The original token sequence, appended verbatim as trailing
    /// arguments of the runner script.
    pub tokens: Vec<String>,
}

pub trait Scheduler {
    /// Submit one job. Blocks until the submission command returns; the
    /// job itself runs asynchronously under the external scheduler.
    fn submit(&self, job: &JobRequest) -> Result<()>;
}

/// Submits via the `sbatch` command-line tool.
pub struct SbatchScheduler {
    slurm: SlurmConfig,
}

impl SbatchScheduler {
    pub fn new(slurm: SlurmConfig) -> Self {
        Self { slurm }
    }

    fn args(&self, job: &JobRequest) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.slurm.partition.clone(),
            "-N".to_string(),
            self.slurm.nodes.to_string(),
            "-n".to_string(),
            self.slurm.ntasks.to_string(),
            format!("--mem={}", self.slurm.mem),
        ];
        if self.slurm.exclusive {
            args.push("--exclusive".to_string());
        }
        if !self.slurm.exclude.is_empty() {
            args.push(format!("--exclude={}", self.slurm.exclude.join(",")));
        }
        args.push("-o".to_string());
        args.push(job.stdout_path.display().to_string());
        args.push("-e".to_string());
        args.push(job.stderr_path.display().to_string());
        args.push(job.script.display().to_string());
        args.extend(job.tokens.iter().cloned());
        args
    }
}

impl Scheduler for SbatchScheduler {
    fn submit(&self, job: &JobRequest) -> Result<()> {
        let args = self.args(job);
        tracing::debug!("exec: sbatch {}", args.join(" "));

        let output = Command::new("sbatch")
            .args(&args)
            .output()
            .map_err(|e| Error::Submission(format!("failed to execute sbatch: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Submission(format!(
                "sbatch exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        // sbatch prints "Submitted batch job <id>" on success.
        let stdout = String::from_utf8_lossy(&output.stdout);
        tracing::info!(subject = %job.subject_id, "{}", stdout.trim());
        Ok(())
    }
}

/// Prints the sbatch command line instead of running it.
pub struct DryRunScheduler {
    inner: SbatchScheduler,
}

impl DryRunScheduler {
    pub fn new(slurm: SlurmConfig) -> Self {
        Self {
            inner: SbatchScheduler::new(slurm),
        }
    }
}

impl Scheduler for DryRunScheduler {
    fn submit(&self, job: &JobRequest) -> Result<()> {
        println!("sbatch {}", self.inner.args(job).join(" "));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobRequest {
        JobRequest {
            subject_id: "alice".into(),
            stdout_path: PathBuf::from("/data/fs/_logs/alice.%j.stdout"),
            stderr_path: PathBuf::from("/data/fs/_logs/alice.%j.stderr"),
            script: PathBuf::from("/opt/tractrun/tractrun-subject.sh"),
            tokens: vec!["SUBJECT=alice".into(), "AGE=5".into()],
        }
    }

    #[test]
    fn args_carry_the_static_policy() {
        let scheduler = SbatchScheduler::new(SlurmConfig {
            partition: "defq".into(),
            nodes: 1,
            ntasks: 16,
            mem: "60G".into(),
            exclusive: true,
            exclude: vec!["node17".into(), "node18".into()],
        });
        let args = scheduler.args(&job());
        assert_eq!(
            args[..8],
            [
                "-p",
                "defq",
                "-N",
                "1",
                "-n",
                "16",
                "--mem=60G",
                "--exclusive"
            ]
        );
        assert!(args.contains(&"--exclude=node17,node18".to_string()));
    }

    #[test]
    fn exclusive_and_exclude_omitted_when_unset() {
        let scheduler = SbatchScheduler::new(SlurmConfig {
            exclusive: false,
            exclude: Vec::new(),
            ..SlurmConfig::default()
        });
        let args = scheduler.args(&job());
        assert!(!args.contains(&"--exclusive".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--exclude")));
    }

    #[test]
    fn tokens_are_appended_verbatim_after_the_script() {
        let scheduler = SbatchScheduler::new(SlurmConfig::default());
        let args = scheduler.args(&job());
        assert_eq!(
            args[args.len() - 3..],
            [
                "/opt/tractrun/tractrun-subject.sh",
                "SUBJECT=alice",
                "AGE=5"
            ]
        );
    }

    #[test]
    fn output_templates_follow_their_flags() {
        let scheduler = SbatchScheduler::new(SlurmConfig::default());
        let args = scheduler.args(&job());
        let o = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[o + 1], "/data/fs/_logs/alice.%j.stdout");
        let e = args.iter().position(|a| a == "-e").unwrap();
        assert_eq!(args[e + 1], "/data/fs/_logs/alice.%j.stderr");
    }
}
