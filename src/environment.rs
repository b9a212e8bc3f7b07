//! Environment lifecycle: template instantiation, cloning, filesystem
//! realization, and start/halt/reload/status against the engine driver.
//!
//! Mirrors the source's `EnvironmentMng`, minus presentation: callers get
//! data back (tables, status rows) and decide how to print it.

use std::path::{Path, PathBuf};

use crate::config::manager::ConfigManager;
use crate::config::model::*;
use crate::engine::EngineDriver;
use crate::error::{ShepherdError, ShepherdResult};
use crate::render::{self, Renderer, UNGATED};
use crate::service;

/// One row of a `status` table: a declared service joined against the
/// engine's live `ps` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatusRow {
    pub tag: String,
    pub running: bool,
}

pub struct EnvironmentMng<'a> {
    pub config: &'a mut ConfigManager,
    pub engine: &'a EngineDriver,
}

impl<'a> EnvironmentMng<'a> {
    pub fn new(config: &'a mut ConfigManager, engine: &'a EngineDriver) -> Self {
        Self { config, engine }
    }

    pub fn env_path(&self, env_tag: &str) -> PathBuf {
        Path::new(&self.config.config().envs_path).join(env_tag)
    }

    /// `init <template> <tag>`. Fails if `tag` already exists or the
    /// template doesn't.
    pub fn init_env(&mut self, env_template: &str, env_tag: &str) -> ShepherdResult<()> {
        if self.config.exists_environment(env_tag) {
            return Err(ShepherdError::EnvironmentAlreadyExists(env_tag.to_string()));
        }
        let template = self
            .config
            .get_environment_template(env_template)
            .ok_or_else(|| ShepherdError::EnvironmentTemplateNotFound(env_template.to_string()))?
            .clone();

        let env_cfg = self.config.env_cfg_from_tag(&template, env_tag);
        self.realize(&env_cfg)?;
        self.config.add_environment(env_cfg)
    }

    /// `clone <src> <dst>`: deep-copy config, hard-link the directory tree.
    pub fn clone_env(&mut self, src_tag: &str, dst_tag: &str) -> ShepherdResult<()> {
        let src = self
            .config
            .get_environment(src_tag)
            .ok_or_else(|| ShepherdError::EnvironmentNotFound(src_tag.to_string()))?
            .clone();

        let cloned = self.config.env_cfg_from_other(&src, dst_tag);
        hard_link_tree(&self.env_path(src_tag), &self.env_path(dst_tag))?;
        self.config.add_environment(cloned)
    }

    /// `rename <src> <dst>`: directory rename first; config is untouched if
    /// that fails.
    pub fn rename_env(&mut self, src_tag: &str, dst_tag: &str) -> ShepherdResult<()> {
        let mut env = self
            .config
            .get_environment(src_tag)
            .ok_or_else(|| ShepherdError::EnvironmentNotFound(src_tag.to_string()))?
            .clone();

        std::fs::rename(self.env_path(src_tag), self.env_path(dst_tag))
            .map_err(|e| ShepherdError::io(format!("rename environment '{src_tag}'"), e))?;

        self.config.remove_environment(src_tag)?;
        env.tag = dst_tag.to_string();
        self.config.add_environment(env)
    }

    /// `checkout <tag>`: flips `active` on exactly this environment.
    pub fn checkout_env(&mut self, env_tag: &str) -> ShepherdResult<()> {
        if !self.config.exists_environment(env_tag) {
            return Err(ShepherdError::EnvironmentNotFound(env_tag.to_string()));
        }
        self.config.set_active_environment(env_tag)
    }

    /// `delete <tag>`: removes the directory and the config entry. Confirm
    /// gating is a CLI concern; callers decide whether to call this at all.
    pub fn delete_env(&mut self, env_tag: &str) -> ShepherdResult<()> {
        if !self.config.exists_environment(env_tag) {
            return Err(ShepherdError::EnvironmentNotFound(env_tag.to_string()));
        }
        let path = self.env_path(env_tag);
        if path.exists() {
            std::fs::remove_dir_all(&path)
                .map_err(|e| ShepherdError::io(format!("remove environment dir '{env_tag}'"), e))?;
        }
        self.config.remove_environment(env_tag)
    }

    pub fn list_envs(&self) -> Vec<(String, String)> {
        self.config
            .get_environments()
            .iter()
            .map(|e| (e.tag.clone(), e.template.clone()))
            .collect()
    }

    fn realize(&self, env: &EnvironmentCfg) -> ShepherdResult<()> {
        std::fs::create_dir_all(self.env_path(&env.tag))
            .map_err(|e| ShepherdError::io(format!("create environment dir '{}'", env.tag), e))
    }

    /// `start()`: render -> persist `rendered_config` -> invoke engine on
    /// `"ungated"` with `up -d`. Gated services stay declared but
    /// undeployed until their probes pass.
    pub async fn start_env(&mut self, env_tag: &str) -> ShepherdResult<()> {
        let env = self
            .config
            .get_environment(env_tag)
            .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.to_string()))?
            .clone();

        let store = self.config.user_values().clone();
        let renderer = Renderer::new(&store);
        renderer.ensure_volume_resources(self.config.config(), &env)?;
        let rendered = renderer.render_gated(self.config.config(), &env, true)?;

        let mut updated = env.clone();
        updated.status.rendered_config = Some(rendered.clone());
        self.config.add_or_set_environment(env_tag, updated)?;

        let ungated = rendered
            .get(UNGATED)
            .cloned()
            .unwrap_or_default();
        self.engine
            .run_compose(&[ungated], &["up", "-d"], false, Some(env_tag), None)
            .await?;

        Ok(())
    }

    /// `stop()`: engine `down` on `"ungated"` if present, then clear
    /// `rendered_config`. Idempotent: re-running on an already-halted
    /// environment is a no-op past the lookup.
    pub async fn halt_env(&mut self, env_tag: &str) -> ShepherdResult<()> {
        let env = self
            .config
            .get_environment(env_tag)
            .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.to_string()))?
            .clone();

        if let Some(rendered) = &env.status.rendered_config {
            if let Some(ungated) = rendered.get(UNGATED) {
                self.engine
                    .run_compose(&[ungated.clone()], &["down"], false, Some(env_tag), None)
                    .await?;
            }
        }

        let mut updated = env;
        updated.status.rendered_config = None;
        self.config.add_or_set_environment(env_tag, updated)
    }

    /// `reload()`: engine `restart` on `"ungated"`. Fails if not running.
    pub async fn reload_env(&mut self, env_tag: &str) -> ShepherdResult<()> {
        let env = self
            .config
            .get_environment(env_tag)
            .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.to_string()))?
            .clone();

        let rendered = env
            .status
            .rendered_config
            .as_ref()
            .ok_or_else(|| ShepherdError::EnvironmentNotRunning(env_tag.to_string()))?;
        let ungated = rendered.get(UNGATED).cloned().unwrap_or_default();

        self.engine
            .run_compose(&[ungated], &["restart"], false, Some(env_tag), None)
            .await
            .map(|_| ())
    }

    /// `status()`: `ps --format json`, parsed as newline-delimited JSON
    /// objects (malformed lines ignored), joined against declared services.
    pub async fn status_env(&self, env_tag: &str) -> ShepherdResult<Vec<ServiceStatusRow>> {
        let env = self
            .config
            .get_environment(env_tag)
            .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.to_string()))?;

        let rendered = env.status.rendered_config.as_ref();
        let ungated = rendered.and_then(|m| m.get(UNGATED)).cloned();

        let running_names: Vec<String> = match ungated {
            Some(doc) => {
                let output = self
                    .engine
                    .run_compose(&[doc], &["ps", "--format", "json"], true, Some(env_tag), None)
                    .await?;
                parse_ps_json(&output.stdout)
            }
            None => Vec::new(),
        };

        Ok(env
            .services
            .iter()
            .map(|svc| {
                let canonical = render::canonical_service_name(&svc.tag, env_tag);
                ServiceStatusRow {
                    tag: svc.tag.clone(),
                    running: running_names.iter().any(|n| n == &canonical),
                }
            })
            .collect())
    }

    /// `add svc <tag> [<template>] [<class>]`.
    pub fn add_service(
        &mut self,
        env_tag: &str,
        svc_tag: &str,
        svc_template: Option<&str>,
        svc_class: Option<String>,
    ) -> ShepherdResult<()> {
        let mut env = self
            .config
            .get_environment(env_tag)
            .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.to_string()))?
            .clone();

        if env.find_service(svc_tag).is_some() {
            return Err(ShepherdError::Generic(format!(
                "service '{svc_tag}' already defined in environment '{env_tag}'"
            )));
        }

        let template_tag = svc_template.unwrap_or("default");
        let template = self
            .config
            .get_service_template(template_tag)
            .ok_or_else(|| ShepherdError::ServiceTemplateNotFound(template_tag.to_string()))?
            .clone();

        let new_service = self
            .config
            .svc_cfg_from_service_template(&template, svc_tag, svc_class);
        env.services.push(new_service);
        self.config.add_or_set_environment(env_tag, env)
    }

    pub fn clone_service(
        &mut self,
        env_tag: &str,
        src_tag: &str,
        dst_tag: &str,
    ) -> ShepherdResult<()> {
        service::clone_within(self.config, env_tag, src_tag, dst_tag)
    }
}

fn parse_ps_json(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .filter_map(|v| v.get("Service").and_then(|s| s.as_str()).map(str::to_string))
        .collect()
}

/// Recursively hard-link a directory tree. Used by `clone`: cheap, and
/// content is never mutated through the link since compose renders to temp
/// files rather than writing back into environment directories.
fn hard_link_tree(src: &Path, dst: &Path) -> ShepherdResult<()> {
    std::fs::create_dir_all(dst)
        .map_err(|e| ShepherdError::io(format!("create dir {}", dst.display()), e))?;

    if !src.exists() {
        return Ok(());
    }

    for entry in std::fs::read_dir(src)
        .map_err(|e| ShepherdError::io(format!("read dir {}", src.display()), e))?
    {
        let entry = entry.map_err(|e| ShepherdError::io("read dir entry", e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| ShepherdError::io("read file type", e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            hard_link_tree(&src_path, &dst_path)?;
        } else {
            std::fs::hard_link(&src_path, &dst_path)
                .map_err(|e| ShepherdError::io(format!("hard-link {}", src_path.display()), e))?;
        }
    }

    Ok(())
}
