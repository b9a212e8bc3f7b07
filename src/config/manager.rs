//! The config manager: load/parse/validate/serialize the config document;
//! CRUD for environments and active-environment selection; factory helpers
//! for instantiating services/environments from templates or clones.
//!
//! All deep-copy discipline lives here: every factory helper below clones
//! its source's collection fields rather than moving or sharing them, so a
//! template is never aliased by the instances created from it.

use std::path::{Path, PathBuf};

use crate::error::{ShepherdError, ShepherdResult};
use crate::values::{self, ValueMap};

use super::model::*;

/// Owns the singleton config tree. Environments and services built on top
/// of it are views, not owners: they write back through
/// [`ConfigManager::add_or_set_environment`].
pub struct ConfigManager {
    config_path: PathBuf,
    user_values: ValueMap,
    config: GlobalConfig,
}

impl ConfigManager {
    /// Load the value file at `values_path` and the config document at
    /// `config_path`.
    pub fn load(values_path: &Path, config_path: &Path) -> ShepherdResult<Self> {
        let user_values = values::load(values_path)?;
        let config = Self::load_config(config_path)?;
        Ok(Self {
            config_path: config_path.to_path_buf(),
            user_values,
            config,
        })
    }

    fn load_config(config_path: &Path) -> ShepherdResult<GlobalConfig> {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| ShepherdError::io(format!("read config {}", config_path.display()), e))?;
        let config: GlobalConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ShepherdError::yaml(format!("config {}", config_path.display()), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the in-memory tree back to the on-disk document. Records
    /// only ever hold raw text (see [`super::resolver`]), so this is
    /// unconditionally a raw, round-trip-faithful write.
    pub fn store(&self) -> ShepherdResult<()> {
        let serialized = serde_yaml::to_string(&self.config)
            .map_err(|e| ShepherdError::yaml("serializing config", e))?;
        std::fs::write(&self.config_path, serialized).map_err(|e| {
            ShepherdError::io(format!("write config {}", self.config_path.display()), e)
        })
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut GlobalConfig {
        &mut self.config
    }

    pub fn user_values(&self) -> &ValueMap {
        &self.user_values
    }

    /// Create `envs_path`, `volumes_path`, `staging_area.volumes_path`, and
    /// `staging_area.images_path` if absent. An existing non-directory at
    /// any of those paths is fatal.
    pub fn ensure_dirs(&self) -> ShepherdResult<()> {
        let dirs = [
            &self.config.envs_path,
            &self.config.volumes_path,
            &self.config.staging_area.volumes_path,
            &self.config.staging_area.images_path,
        ];
        for dir in dirs {
            let path = Path::new(dir);
            if path.exists() && !path.is_dir() {
                return Err(ShepherdError::Generic(format!(
                    "'{}' exists and is not a directory",
                    dir
                )));
            }
            if !path.exists() {
                std::fs::create_dir_all(path)
                    .map_err(|e| ShepherdError::io(format!("create directory {}", dir), e))?;
            }
        }
        Ok(())
    }

    // -- lookups --------------------------------------------------------

    pub fn get_environment(&self, tag: &str) -> Option<&EnvironmentCfg> {
        self.config.find_environment(tag)
    }

    pub fn get_environments(&self) -> &[EnvironmentCfg] {
        &self.config.envs
    }

    pub fn get_environment_template(&self, tag: &str) -> Option<&EnvironmentTemplateCfg> {
        self.config.find_environment_template(tag)
    }

    pub fn get_environment_template_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .config
            .env_templates
            .iter()
            .flatten()
            .map(|t| t.tag.clone())
            .collect();
        tags.sort();
        tags
    }

    pub fn get_service_template(&self, tag: &str) -> Option<&ServiceTemplateCfg> {
        self.config.find_service_template(tag)
    }

    pub fn get_resource_templates(&self, resource_type: &str) -> Vec<String> {
        match resource_type {
            "svc" => {
                let mut tags: Vec<String> = self
                    .config
                    .service_templates
                    .iter()
                    .flatten()
                    .map(|t| t.tag.clone())
                    .collect();
                tags.sort();
                tags
            }
            _ => Vec::new(),
        }
    }

    // -- CRUD -------------------------------------------------------------

    pub fn add_environment(&mut self, env: EnvironmentCfg) -> ShepherdResult<()> {
        self.config.envs.push(env);
        self.store()
    }

    pub fn set_environment(&mut self, tag: &str, env: EnvironmentCfg) -> ShepherdResult<bool> {
        if let Some(slot) = self.config.envs.iter_mut().find(|e| e.tag == tag) {
            *slot = env;
            self.store()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn add_or_set_environment(&mut self, tag: &str, env: EnvironmentCfg) -> ShepherdResult<()> {
        if let Some(slot) = self.config.envs.iter_mut().find(|e| e.tag == tag) {
            *slot = env;
        } else {
            self.config.envs.push(env);
        }
        self.store()
    }

    pub fn remove_environment(&mut self, tag: &str) -> ShepherdResult<()> {
        self.config.envs.retain(|e| e.tag != tag);
        self.store()
    }

    pub fn exists_environment(&self, tag: &str) -> bool {
        self.config.envs.iter().any(|e| e.tag == tag)
    }

    pub fn get_active_environment(&self) -> Option<&EnvironmentCfg> {
        self.config.active_environment()
    }

    /// Flip the `active` bit: exactly the named environment ends up
    /// active, every other environment is cleared, in one pass.
    pub fn set_active_environment(&mut self, tag: &str) -> ShepherdResult<()> {
        for env in &mut self.config.envs {
            env.status.active = env.tag == tag;
        }
        self.store()
    }

    pub fn get_service_tags(&self, env: &EnvironmentCfg) -> Vec<String> {
        let mut tags: Vec<String> = env.services.iter().map(|s| s.tag.clone()).collect();
        tags.sort();
        tags.dedup();
        tags
    }

    pub fn get_resource_classes(&self, env: &EnvironmentCfg, resource_type: &str) -> Vec<String> {
        match resource_type {
            "svc" => {
                let mut classes: Vec<String> = env
                    .services
                    .iter()
                    .filter_map(|s| s.service_class.clone())
                    .collect();
                classes.sort();
                classes.dedup();
                classes
            }
            _ => Vec::new(),
        }
    }

    pub fn get_probe_tags(&self, env: &EnvironmentCfg) -> Vec<String> {
        let mut tags = env.probe_tags();
        tags.sort();
        tags
    }

    // -- factory helpers --------------------------------------------------

    /// Build a fresh environment from a template, eagerly instantiating
    /// every referenced service template as a service with default fields.
    /// Service templates that no longer exist are silently skipped, as in
    /// the source.
    pub fn env_cfg_from_tag(&self, env_tmpl: &EnvironmentTemplateCfg, env_tag: &str) -> EnvironmentCfg {
        let services = env_tmpl
            .service_templates
            .iter()
            .flatten()
            .filter_map(|svc_ref| {
                self.get_service_template(&svc_ref.template)
                    .map(|tmpl| self.svc_cfg_from_service_template(tmpl, &svc_ref.tag, None))
            })
            .collect();

        EnvironmentCfg {
            template: env_tmpl.tag.clone(),
            factory: env_tmpl.factory.clone(),
            tag: env_tag.to_string(),
            services,
            networks: env_tmpl.networks.clone(),
            volumes: env_tmpl.volumes.clone(),
            probes: None,
            status: EntityStatus::default(),
        }
    }

    /// Deep-clone an environment, resetting `status` and reassigning the
    /// tag.
    pub fn env_cfg_from_other(&self, other: &EnvironmentCfg, new_tag: &str) -> EnvironmentCfg {
        EnvironmentCfg {
            template: other.template.clone(),
            factory: other.factory.clone(),
            tag: new_tag.to_string(),
            services: other.services.clone(),
            networks: other.networks.clone(),
            volumes: other.volumes.clone(),
            probes: other.probes.clone(),
            status: EntityStatus::default(),
        }
    }

    /// Instantiate a service from a template, deep-copying every
    /// collection field so the template is never shared with the instance.
    pub fn svc_cfg_from_service_template(
        &self,
        template: &ServiceTemplateCfg,
        service_tag: &str,
        service_class: Option<String>,
    ) -> ServiceCfg {
        ServiceCfg {
            template: template.tag.clone(),
            factory: template.factory.clone(),
            tag: service_tag.to_string(),
            service_class,
            containers: template.containers.clone(),
            upstreams: None,
            labels: template.labels.clone(),
            ingress: template.ingress.clone(),
            empty_env: template.empty_env.clone(),
            properties: template.properties.clone(),
            start: None,
            status: EntityStatus::default(),
        }
    }

    /// Deep-clone a service, resetting `status` and reassigning the tag.
    pub fn svc_cfg_from_other(&self, other: &ServiceCfg, new_tag: &str) -> ServiceCfg {
        ServiceCfg {
            template: other.template.clone(),
            factory: other.factory.clone(),
            tag: new_tag.to_string(),
            service_class: other.service_class.clone(),
            containers: other.containers.clone(),
            upstreams: other.upstreams.clone(),
            labels: other.labels.clone(),
            ingress: other.ingress.clone(),
            empty_env: other.empty_env.clone(),
            properties: other.properties.clone(),
            start: other.start.clone(),
            status: EntityStatus::default(),
        }
    }
}
