//! Service-level operations: rendering, build, and lifecycle gated on the
//! parent environment being started (having a `rendered_config`).

use crate::config::manager::ConfigManager;
use crate::config::model::*;
use crate::engine::EngineDriver;
use crate::error::{ShepherdError, ShepherdResult};
use crate::render::{self, Renderer, UNGATED};

pub fn clone_within(
    config: &mut ConfigManager,
    env_tag: &str,
    src_tag: &str,
    dst_tag: &str,
) -> ShepherdResult<()> {
    let mut env = config
        .get_environment(env_tag)
        .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.to_string()))?
        .clone();

    let src = env
        .find_service(src_tag)
        .ok_or_else(|| ShepherdError::ServiceNotFound(src_tag.to_string(), env_tag.to_string()))?
        .clone();

    if env.find_service(dst_tag).is_some() {
        return Err(ShepherdError::Generic(format!(
            "service '{dst_tag}' already defined in environment '{env_tag}'"
        )));
    }

    let cloned = config.svc_cfg_from_other(&src, dst_tag);
    env.services.push(cloned);
    config.add_or_set_environment(env_tag, env)
}

/// `render(resolved)`: the service's own config as YAML, for inspection.
pub fn render(
    config: &ConfigManager,
    env_tag: &str,
    svc_tag: &str,
    resolved: bool,
) -> ShepherdResult<String> {
    let _ = resolved; // placeholder substitution is only meaningful within render_target today
    let env = config
        .get_environment(env_tag)
        .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.to_string()))?;
    let svc = env
        .find_service(svc_tag)
        .ok_or_else(|| ShepherdError::ServiceNotFound(svc_tag.to_string(), env_tag.to_string()))?;

    serde_yaml::to_string(svc).map_err(|e| ShepherdError::yaml(format!("rendering service '{svc_tag}'"), e))
}

/// `render_target(resolved)`: the engine-ready compose fragment for this
/// service alone (one entry per container).
pub fn render_target(
    config: &ConfigManager,
    env_tag: &str,
    svc_tag: &str,
    resolved: bool,
) -> ShepherdResult<String> {
    let env = config
        .get_environment(env_tag)
        .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.to_string()))?;
    env.find_service(svc_tag)
        .ok_or_else(|| ShepherdError::ServiceNotFound(svc_tag.to_string(), env_tag.to_string()))?;

    let store = config.user_values().clone();
    let renderer = Renderer::new(&store);
    let mut filtered = env.clone();
    filtered.services.retain(|s| s.tag == svc_tag);
    let docs = renderer.render_gated(config.config(), &filtered, resolved)?;

    // A single service belongs to exactly one gate; surface whichever
    // non-ungated document it landed in, falling back to "ungated" itself.
    let non_ungated = docs.iter().find(|(key, _)| key.as_str() != UNGATED);
    match non_ungated {
        Some((_, doc)) => Ok(doc.clone()),
        None => docs
            .get(UNGATED)
            .cloned()
            .ok_or_else(|| ShepherdError::Generic(format!("nothing rendered for service '{svc_tag}'"))),
    }
}

/// `build()`: for each container with a `build` block, invoke the engine's
/// image-build. Missing fields or a missing Dockerfile is fatal.
pub async fn build(
    config: &ConfigManager,
    engine: &EngineDriver,
    env_tag: &str,
    svc_tag: &str,
) -> ShepherdResult<()> {
    let env = config
        .get_environment(env_tag)
        .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.to_string()))?;
    let svc = env
        .find_service(svc_tag)
        .ok_or_else(|| ShepherdError::ServiceNotFound(svc_tag.to_string(), env_tag.to_string()))?;

    for cnt in &svc.containers {
        let Some(build_cfg) = &cnt.build else {
            continue;
        };
        if build_cfg.dockerfile_path.is_empty() || build_cfg.context_path.is_empty() {
            return Err(ShepherdError::IncompleteBuildBlock(cnt.tag.clone()));
        }
        let tag = cnt.image.clone().unwrap_or_default();
        engine
            .build_image(
                std::path::Path::new(&build_cfg.dockerfile_path),
                std::path::Path::new(&build_cfg.context_path),
                &tag,
            )
            .await?;
    }
    Ok(())
}

fn require_running<'a>(env: &'a EnvironmentCfg) -> ShepherdResult<&'a str> {
    env.status
        .rendered_config
        .as_ref()
        .and_then(|m| m.get(UNGATED))
        .map(String::as_str)
        .ok_or_else(|| ShepherdError::EnvironmentNotRunning(env.tag.clone()))
}

pub async fn start(
    config: &ConfigManager,
    engine: &EngineDriver,
    env_tag: &str,
    svc_tag: &str,
) -> ShepherdResult<()> {
    dispatch(config, engine, env_tag, svc_tag, &["up", "-d"]).await
}

pub async fn stop(
    config: &ConfigManager,
    engine: &EngineDriver,
    env_tag: &str,
    svc_tag: &str,
) -> ShepherdResult<()> {
    dispatch(config, engine, env_tag, svc_tag, &["stop"]).await
}

pub async fn reload(
    config: &ConfigManager,
    engine: &EngineDriver,
    env_tag: &str,
    svc_tag: &str,
) -> ShepherdResult<()> {
    dispatch(config, engine, env_tag, svc_tag, &["restart"]).await
}

pub async fn get_stdout(
    config: &ConfigManager,
    engine: &EngineDriver,
    env_tag: &str,
    svc_tag: &str,
) -> ShepherdResult<String> {
    let env = config
        .get_environment(env_tag)
        .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.to_string()))?;
    env.find_service(svc_tag)
        .ok_or_else(|| ShepherdError::ServiceNotFound(svc_tag.to_string(), env_tag.to_string()))?;
    let ungated = require_running(env)?.to_string();
    let canonical = render::canonical_service_name(svc_tag, env_tag);

    let output = engine
        .run_compose(&[ungated], &["logs", &canonical], true, Some(env_tag), None)
        .await?;
    Ok(output.stdout)
}

pub async fn get_shell(
    config: &ConfigManager,
    engine: &EngineDriver,
    env_tag: &str,
    svc_tag: &str,
) -> ShepherdResult<()> {
    let env = config
        .get_environment(env_tag)
        .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.to_string()))?;
    env.find_service(svc_tag)
        .ok_or_else(|| ShepherdError::ServiceNotFound(svc_tag.to_string(), env_tag.to_string()))?;
    let ungated = require_running(env)?.to_string();
    let canonical = render::canonical_service_name(svc_tag, env_tag);

    engine
        .run_compose(&[ungated], &["exec", &canonical, "sh"], false, Some(env_tag), None)
        .await
        .map(|_| ())
}

async fn dispatch(
    config: &ConfigManager,
    engine: &EngineDriver,
    env_tag: &str,
    svc_tag: &str,
    args: &[&str],
) -> ShepherdResult<()> {
    let env = config
        .get_environment(env_tag)
        .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.to_string()))?;
    env.find_service(svc_tag)
        .ok_or_else(|| ShepherdError::ServiceNotFound(svc_tag.to_string(), env_tag.to_string()))?;
    let ungated = require_running(env)?.to_string();
    let canonical = render::canonical_service_name(svc_tag, env_tag);

    let mut full_args: Vec<&str> = args.to_vec();
    full_args.push(&canonical);

    engine
        .run_compose(&[ungated], &full_args, false, Some(env_tag), None)
        .await
        .map(|_| ())
}
