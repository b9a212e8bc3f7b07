//! The engine driver: the only place in the crate that shells out to the
//! container composition tool.
//!
//! Owns temp-file lifetime for rendered compose documents, argv assembly,
//! timeout normalization (synthetic exit code 124), and stream capture.
//! Everything above this module calls through [`EngineDriver`] rather than
//! spawning processes itself.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{ShepherdError, ShepherdResult};

/// Outcome of a single engine invocation. Mirrors `subprocess.CompletedProcess`
/// in spirit: a nonzero `returncode` is data, not necessarily an error.
#[derive(Debug, Clone)]
pub struct CompletedProcess {
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CompletedProcess {
    pub fn success(&self) -> bool {
        self.returncode == 0
    }

    pub fn timed_out(&self) -> bool {
        self.returncode == 124
    }
}

/// Thin wrapper around the composition engine binary (`docker`, `podman`, …).
#[derive(Debug, Clone)]
pub struct EngineDriver {
    engine_path: PathBuf,
}

impl EngineDriver {
    pub fn new(engine_path: impl Into<PathBuf>) -> Self {
        Self {
            engine_path: engine_path.into(),
        }
    }

    /// Discover the engine binary, defaulting to `docker`, honoring
    /// `SHPD_ENGINE` if set.
    pub fn discover() -> ShepherdResult<Self> {
        let candidate = std::env::var("SHPD_ENGINE").unwrap_or_else(|_| "docker".to_string());
        let resolved = which::which(&candidate)
            .map_err(|_| ShepherdError::EngineNotFound(candidate.clone()))?;
        Ok(Self::new(resolved))
    }

    pub fn engine_path(&self) -> &Path {
        &self.engine_path
    }

    /// Run `<engine> compose [-p project] (-f file)+ <args...>` against one
    /// or more YAML documents.
    ///
    /// `yamls` must be ordered base-first, overlays later: later `-f` flags
    /// extend/override earlier ones, matching compose's own merge order.
    /// Temp files are always cleaned up, even on error.
    pub async fn run_compose(
        &self,
        yamls: &[String],
        args: &[&str],
        capture: bool,
        project_name: Option<&str>,
        timeout_seconds: Option<u64>,
    ) -> ShepherdResult<CompletedProcess> {
        if yamls.is_empty() {
            return Err(ShepherdError::InvalidUsage(
                "run_compose: at least one YAML document must be provided".to_string(),
            ));
        }

        let mut tmp_files = Vec::with_capacity(yamls.len());
        for yml in yamls {
            let mut tmp = tempfile::Builder::new()
                .suffix(".yml")
                .tempfile()
                .map_err(|e| ShepherdError::io("create temp compose file", e))?;
            tmp.write_all(yml.as_bytes())
                .map_err(|e| ShepherdError::io("write temp compose file", e))?;
            tmp_files.push(tmp);
        }

        let result = self
            .run_compose_inner(&tmp_files, args, capture, project_name, timeout_seconds)
            .await;

        // Temp files unlink themselves on drop; explicit here only to make
        // the guaranteed-cleanup contract visible at the call site.
        drop(tmp_files);

        result
    }

    async fn run_compose_inner(
        &self,
        tmp_files: &[tempfile::NamedTempFile],
        args: &[&str],
        capture: bool,
        project_name: Option<&str>,
        timeout_seconds: Option<u64>,
    ) -> ShepherdResult<CompletedProcess> {
        let mut cmd = Command::new(&self.engine_path);
        cmd.arg("compose");
        if let Some(project) = project_name {
            cmd.arg("-p").arg(project);
        }
        for tmp in tmp_files {
            cmd.arg("-f").arg(tmp.path());
        }
        cmd.args(args);

        let cmd_str = format!(
            "{} compose {}",
            self.engine_path.display(),
            args.join(" ")
        );
        debug!("running: {}", cmd_str);

        if capture {
            cmd.stdout(std::process::Stdio::piped());
            cmd.stderr(std::process::Stdio::piped());
        } else {
            cmd.stdout(std::process::Stdio::null());
            cmd.stderr(std::process::Stdio::null());
        }

        let run = async {
            let output = cmd
                .output()
                .await
                .map_err(|e| ShepherdError::io(format!("spawn {}", cmd_str), e))?;
            Ok::<_, ShepherdError>(CompletedProcess {
                returncode: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        };

        let result = match timeout_seconds {
            Some(secs) => match timeout(Duration::from_secs(secs), run).await {
                Ok(inner) => inner?,
                Err(_) => {
                    warn!("command timed out after {}s: {}", secs, cmd_str);
                    return Ok(CompletedProcess {
                        returncode: 124,
                        stdout: String::new(),
                        stderr: String::new(),
                    });
                }
            },
            None => run.await?,
        };

        if result.returncode != 0 {
            warn!(
                "compose command failed with exit code {}: {}\nstdout:\n{}\nstderr:\n{}",
                result.returncode, cmd_str, result.stdout, result.stderr
            );
        }

        Ok(result)
    }

    /// `<engine> build -t <tag> -f <dockerfile> --progress=auto <context>`.
    /// Nonzero exit is fatal; stdout/stderr are inherited so build progress
    /// streams to the user's terminal.
    pub async fn build_image(
        &self,
        dockerfile: &Path,
        context: &Path,
        tag: &str,
    ) -> ShepherdResult<()> {
        if !dockerfile.exists() {
            return Err(ShepherdError::DockerfileNotFound(dockerfile.to_path_buf()));
        }
        if !context.is_dir() {
            return Err(ShepherdError::BuildContextNotFound(context.to_path_buf()));
        }

        info!("building image '{}'", tag);
        let mut cmd = Command::new(&self.engine_path);
        cmd.arg("build")
            .arg("-t")
            .arg(tag)
            .arg("-f")
            .arg(dockerfile)
            .arg("--progress=auto")
            .arg(context);

        let status = cmd
            .status()
            .await
            .map_err(|e| ShepherdError::io(format!("spawn build for '{}'", tag), e))?;

        if !status.success() {
            return Err(ShepherdError::command_failed(
                format!("{} build -t {}", self.engine_path.display(), tag),
                status.code().unwrap_or(-1),
                "",
                "",
            ));
        }

        info!("image '{}' built successfully", tag);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn completed_process_classifies_outcomes() {
        let ok = CompletedProcess {
            returncode: 0,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(ok.success());
        assert!(!ok.timed_out());

        let timed_out = CompletedProcess {
            returncode: 124,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(!timed_out.success());
        assert!(timed_out.timed_out());
    }

    #[tokio::test]
    #[serial]
    async fn discover_honors_shpd_engine_override() {
        // A nonexistent binary name should fail discovery rather than
        // silently falling back.
        std::env::set_var("SHPD_ENGINE", "shepherd-engine-does-not-exist");
        let result = EngineDriver::discover();
        std::env::remove_var("SHPD_ENGINE");
        assert!(result.is_err());
    }
}
