// Compile-and-run trial executor
// Each trial is a compiler process followed by a run of the produced artifact

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use at_types::{Configuration, Cost, TargetProgram, TrialExecutor, TrialFailure};

use crate::config::ExecutorConfig;

/// Longest stderr excerpt kept in a failure diagnostic.
const STDERR_TAIL_CHARS: usize = 2000;

/// Compiles the target with the configuration's flags into a uniquely named
/// artifact, runs it, and reads the elapsed time it prints on stdout.
#[derive(Debug, Clone, Default)]
pub struct CompileRunExecutor {
    config: ExecutorConfig,
}

impl CompileRunExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    fn param_value<'a>(&'a self, config: &'a Configuration, name: &str) -> Option<&'a str> {
        config
            .get(name)
            .or_else(|| self.config.defaults.get(name).map(String::as_str))
    }

    /// Compiler flags for the compile-time parameters, e.g. `O2` -> `-O2`.
    pub fn compile_flags(&self, config: &Configuration) -> Vec<String> {
        self.config
            .compile_params
            .iter()
            .filter_map(|name| self.param_value(config, name))
            .map(|value| {
                if value.starts_with('-') {
                    value.to_string()
                } else {
                    format!("-{value}")
                }
            })
            .collect()
    }

    /// Positional arguments for the compiled program.
    pub fn runtime_args(&self, config: &Configuration) -> Vec<String> {
        self.config
            .runtime_params
            .iter()
            .filter_map(|name| self.param_value(config, name))
            .map(str::to_string)
            .collect()
    }

    /// `<artifact_dir>/<stem>_<random>`, unique per call.
    pub fn artifact_path(&self, target: &TargetProgram) -> PathBuf {
        let dir = if self.config.artifact_dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            self.config.artifact_dir.as_path()
        };
        let suffix = Uuid::new_v4().simple().to_string();
        dir.join(format!("{}_{}", target.stem(), &suffix[..12]))
    }

    pub fn compile_command(
        &self,
        target: &TargetProgram,
        config: &Configuration,
        artifact: &Path,
    ) -> Command {
        let mut cmd = Command::new(&self.config.compiler);
        cmd.args(&self.config.extra_compile_args)
            .args(self.compile_flags(config))
            .arg(target.path())
            .arg("-o")
            .arg(artifact)
            .kill_on_drop(true);
        cmd
    }

    fn run_command(&self, artifact: &Path, config: &Configuration) -> Command {
        let mut cmd = Command::new(artifact);
        cmd.args(self.runtime_args(config)).kill_on_drop(true);
        cmd
    }

    /// One trial with its failure cause preserved.
    pub async fn try_execute(
        &self,
        target: &TargetProgram,
        config: &Configuration,
    ) -> Result<Cost, TrialFailure> {
        let artifact = self.artifact_path(target);
        if let Some(dir) = artifact.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| TrialFailure::Launch {
                    stage: "artifact directory",
                    message: e.to_string(),
                })?;
        }
        let _guard = ArtifactGuard(artifact.clone());

        let compiled = self
            .compile_command(target, config, &artifact)
            .output()
            .await
            .map_err(|e| TrialFailure::Launch {
                stage: "compiler",
                message: e.to_string(),
            })?;
        if !compiled.status.success() {
            return Err(TrialFailure::Compile {
                status: compiled.status.to_string(),
                stderr: stderr_tail(&compiled),
            });
        }
        debug!(artifact = %artifact.display(), "compiled trial artifact");

        let mut program = self.run_command(&artifact, config);
        let run = program.output();
        let finished = match self.config.trial_timeout() {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| TrialFailure::Timeout {
                    seconds: limit.as_secs_f64(),
                })?,
            None => run.await,
        };
        let output = finished.map_err(|e| TrialFailure::Launch {
            stage: "program",
            message: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(TrialFailure::Runtime {
                status: output.status.to_string(),
                stderr: stderr_tail(&output),
            });
        }
        parse_elapsed(&output.stdout)
    }
}

#[async_trait]
impl TrialExecutor for CompileRunExecutor {
    async fn execute(&self, target: &TargetProgram, config: &Configuration) -> Cost {
        match self.try_execute(target, config).await {
            Ok(cost) => cost,
            Err(failure) => {
                warn!(kind = failure.kind(), config = %config, error = %failure, "trial failed");
                Cost::FAILED
            }
        }
    }
}

/// Removes the artifact when the trial ends, however it ends.
struct ArtifactGuard(PathBuf);

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!(artifact = %self.0.display(), error = %e, "could not remove artifact"),
        }
    }
}

fn parse_elapsed(stdout: &[u8]) -> Result<Cost, TrialFailure> {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(Cost::new(seconds)),
        _ => Err(TrialFailure::MalformedResult {
            output: trimmed.to_string(),
        }),
    }
}

fn stderr_tail(output: &Output) -> String {
    let text = String::from_utf8_lossy(&output.stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= STDERR_TAIL_CHARS {
        text.to_string()
    } else {
        text.chars().skip(count - STDERR_TAIL_CHARS).collect()
    }
}
