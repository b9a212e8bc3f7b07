//! The probe runtime: executes one-shot probe containers through the
//! composition engine, layered over the base ("ungated") document, and
//! collects structured outcomes.

use std::time::Instant;

use serde_yaml::{Mapping, Value};

use crate::config::model::*;
use crate::config::manager::ConfigManager;
use crate::config::resolver::{resolve, EvalContext};
use crate::engine::EngineDriver;
use crate::error::{ShepherdError, ShepherdResult};
use crate::render::UNGATED;

/// The outcome of running a single probe.
#[derive(Debug, Clone)]
pub struct ProbeRunResult {
    pub tag: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl ProbeRunResult {
    pub fn passed(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Render the probe overlay document: one compose service per selected
/// probe, with optional `command = probe.script` and `restart: "no"`.
pub fn render_probes_target(
    cfg: &GlobalConfig,
    env: &EnvironmentCfg,
    probe_tag: Option<&str>,
    resolved: bool,
    store: &crate::values::ValueMap,
) -> ShepherdResult<Option<String>> {
    let Some(probes) = &env.probes else {
        return Ok(None);
    };

    let selected: Vec<&ProbeCfg> = match probe_tag {
        Some(tag) => probes.iter().filter(|p| p.tag == tag).collect(),
        None => probes.iter().collect(),
    };
    if selected.is_empty() {
        return Ok(None);
    }

    let cfg_ctx = EvalContext::new().with_cfg(cfg);
    let env_ctx = cfg_ctx.with_env(env);

    let mut services = Mapping::new();
    for probe in &selected {
        let probe_ctx = env_ctx.with_probe(*probe);
        let cnt_ctx = probe_ctx.with_cnt(&probe.container);
        let mut svc = Mapping::new();

        let field = |name: &str, raw: &str| -> String {
            if resolved {
                resolve(raw, store, &cnt_ctx)
            } else {
                raw.to_string()
            }
        };

        if let Some(image) = &probe.container.image {
            svc.insert("image".into(), field("image", image).into());
        }
        if let Some(hostname) = &probe.container.hostname {
            svc.insert("hostname".into(), field("hostname", hostname).into());
        }
        if let Some(container_name) = &probe.container.container_name {
            svc.insert(
                "container_name".into(),
                field("container_name", container_name).into(),
            );
        }
        if let Some(workdir) = &probe.container.workdir {
            svc.insert("working_dir".into(), field("workdir", workdir).into());
        }
        if let Some(volumes) = &probe.container.volumes {
            if !volumes.is_empty() {
                svc.insert(
                    "volumes".into(),
                    Value::Sequence(
                        volumes.iter().map(|v| Value::String(field("volumes", v))).collect(),
                    ),
                );
            }
        }
        if let Some(environment) = &probe.container.environment {
            if !environment.is_empty() {
                svc.insert(
                    "environment".into(),
                    Value::Sequence(
                        environment
                            .iter()
                            .map(|v| Value::String(field("environment", v)))
                            .collect(),
                    ),
                );
            }
        }
        if let Some(script) = &probe.script {
            svc.insert("command".into(), field("script", script).into());
        }
        svc.insert("restart".into(), "no".into());

        services.insert(Value::String(probe.tag.clone()), Value::Mapping(svc));
    }

    if services.is_empty() {
        return Ok(None);
    }

    let mut root = Mapping::new();
    root.insert("name".into(), env.tag.clone().into());
    root.insert("services".into(), Value::Mapping(services));

    let yaml = serde_yaml::to_string(&Value::Mapping(root))
        .map_err(|e| ShepherdError::yaml("rendering probe overlay", e))?;
    Ok(Some(yaml))
}

/// `check_probes(probe_tag?, fail_fast, timeout_seconds?)`.
pub async fn check_probes(
    config: &ConfigManager,
    engine: &EngineDriver,
    env_tag: &str,
    probe_tag: Option<&str>,
    fail_fast: bool,
    timeout_seconds: Option<u64>,
) -> ShepherdResult<Vec<ProbeRunResult>> {
    let env = config
        .get_environment(env_tag)
        .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.to_string()))?;

    let base_yaml = env
        .status
        .rendered_config
        .as_ref()
        .and_then(|m| m.get(UNGATED))
        .ok_or_else(|| ShepherdError::EnvironmentNotRunning(env_tag.to_string()))?
        .clone();

    let available = config.get_probe_tags(env);
    let selected: Vec<&ProbeCfg> = match (probe_tag, &env.probes) {
        (Some(tag), Some(probes)) => {
            let found: Vec<&ProbeCfg> = probes.iter().filter(|p| p.tag == tag).collect();
            if found.is_empty() {
                return Err(ShepherdError::probe_not_found(tag, env_tag, &available));
            }
            found
        }
        (Some(tag), None) => return Err(ShepherdError::probe_not_found(tag, env_tag, &available)),
        (None, Some(probes)) => probes.iter().collect(),
        (None, None) => return Ok(Vec::new()),
    };

    let store = config.user_values();
    let Some(probes_yaml) = render_probes_target(config.config(), env, None, true, store)? else {
        return Ok(Vec::new());
    };

    let mut results = Vec::with_capacity(selected.len());
    for probe in selected {
        let started = Instant::now();
        let output = engine
            .run_compose(
                &[base_yaml.clone(), probes_yaml.clone()],
                &["run", "--rm", "--no-deps", &probe.tag],
                true,
                Some(env_tag),
                timeout_seconds,
            )
            .await?;
        let duration_ms = started.elapsed().as_millis() as u64;
        let timed_out = output.timed_out();

        let result = ProbeRunResult {
            tag: probe.tag.clone(),
            exit_code: output.returncode,
            stdout: output.stdout,
            stderr: output.stderr,
            duration_ms,
            timed_out,
        };
        let passed = result.passed();
        results.push(result);

        if fail_fast && !passed {
            break;
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passed_requires_zero_exit_and_no_timeout() {
        let ok = ProbeRunResult {
            tag: "p".into(),
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 10,
            timed_out: false,
        };
        assert!(ok.passed());

        let timed_out = ProbeRunResult {
            tag: "p".into(),
            exit_code: 124,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 5000,
            timed_out: true,
        };
        assert!(!timed_out.passed());
    }
}
