//! The config tree: typed records for registry, CA/cert, staging area,
//! networks, volumes, service templates, environment templates, services,
//! environments, probes, and entity status.
//!
//! Records here always hold raw, unresolved text. Placeholder substitution
//! is a pure transform applied by [`crate::config::resolver`] on demand, not
//! a hidden per-instance toggle — see that module's doc comment for why.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use super::boolify::BoolifyStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingCfg {
    pub file: String,
    pub level: String,
    #[serde(default = "default_false")]
    pub stdout: BoolifyStr,
    #[serde(default)]
    pub format: String,
}

fn default_false() -> BoolifyStr {
    BoolifyStr::new("false")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShpdRegistryCfg {
    pub ftp_server: String,
    pub ftp_user: String,
    pub ftp_psw: String,
    pub ftp_shpd_path: String,
    pub ftp_env_imgs_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaCfg {
    pub country: String,
    pub state: String,
    pub locality: String,
    pub organization: String,
    pub organizational_unit: String,
    pub common_name: String,
    pub email: String,
    pub passphrase: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertCfg {
    pub country: String,
    pub state: String,
    pub locality: String,
    pub organization: String,
    pub organizational_unit: String,
    pub common_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_alternative_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingAreaCfg {
    pub volumes_path: String,
    pub images_path: String,
}

/// Two disjoint modes: *external* (`name` + `external: true`) and *managed*
/// (`driver` + options). Mixing is rejected at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkCfg {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_false")]
    pub external: BoolifyStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachable: Option<BoolifyStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_ipv6: Option<BoolifyStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_opts: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipam: Option<serde_yaml::Value>,
}

impl NetworkCfg {
    pub fn is_external(&self) -> bool {
        self.external.as_bool().unwrap_or(false)
    }

    /// Mixing `external: true` with a `driver` is a schema error.
    pub fn validate(&self) -> Result<(), crate::error::ShepherdError> {
        if self.is_external() && self.driver.is_some() {
            return Err(crate::error::ShepherdError::ConflictingNetworkMode(
                self.tag.clone(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeCfg {
    pub tag: String,
    #[serde(default = "default_false")]
    pub external: BoolifyStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_opts: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

impl VolumeCfg {
    pub fn is_external(&self) -> bool {
        self.external.as_bool().unwrap_or(false)
    }

    pub fn validate(&self) -> Result<(), crate::error::ShepherdError> {
        if self.is_external() && self.driver.is_some() {
            return Err(crate::error::ShepherdError::ConflictingVolumeMode(
                self.tag.clone(),
            ));
        }
        Ok(())
    }

    /// A local bind-mount whose host `device` directory must be pre-created.
    pub fn is_local_bind_mount(&self) -> bool {
        let Some(driver) = &self.driver else {
            return false;
        };
        if driver != "local" {
            return false;
        }
        let Some(opts) = &self.driver_opts else {
            return false;
        };
        opts.get("type").map(String::as_str) == Some("none")
            && opts.get("o").map(String::as_str) == Some("bind")
    }

    pub fn bind_device(&self) -> Option<&str> {
        self.driver_opts.as_ref()?.get("device").map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildCfg {
    pub dockerfile_path: String,
    pub context_path: String,
}

/// A single container within a service template or service. Fields absent
/// here render as omitted keys in the compose output, not empty ones.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContainerCfg {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_hosts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildCfg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_alternative_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTemplateRefCfg {
    pub template: String,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTemplateCfg {
    pub tag: String,
    pub factory: String,
    pub containers: Vec<ContainerCfg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<BoolifyStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamCfg {
    #[serde(rename = "type")]
    pub kind: String,
    pub tag: String,
    #[serde(default = "default_false")]
    pub enabled: BoolifyStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StartCfg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_probes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EntityStatus {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub archived: bool,
    /// Populated on `start` with one rendered compose document per probe
    /// gate (plus `"ungated"`); cleared on `halt`. Non-empty iff running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_config: Option<HashMap<String, String>>,
}

impl EntityStatus {
    pub fn is_running(&self) -> bool {
        self.rendered_config.as_ref().is_some_and(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCfg {
    pub template: String,
    pub factory: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_class: Option<String>,
    pub containers: Vec<ContainerCfg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstreams: Option<Vec<UpstreamCfg>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<BoolifyStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<StartCfg>,
    #[serde(default)]
    pub status: EntityStatus,
}

impl ServiceCfg {
    pub fn when_probes(&self) -> &[String] {
        self.start
            .as_ref()
            .and_then(|s| s.when_probes.as_deref())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentTemplateCfg {
    pub tag: String,
    pub factory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_templates: Option<Vec<ServiceTemplateRefCfg>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<Vec<NetworkCfg>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<VolumeCfg>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeCfg {
    pub tag: String,
    pub container: ContainerCfg,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentCfg {
    pub template: String,
    pub factory: String,
    pub tag: String,
    #[serde(default)]
    pub services: Vec<ServiceCfg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networks: Option<Vec<NetworkCfg>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<VolumeCfg>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probes: Option<Vec<ProbeCfg>>,
    #[serde(default)]
    pub status: EntityStatus,
}

impl EnvironmentCfg {
    pub fn find_service(&self, tag: &str) -> Option<&ServiceCfg> {
        self.services.iter().find(|s| s.tag == tag)
    }

    pub fn find_service_mut(&mut self, tag: &str) -> Option<&mut ServiceCfg> {
        self.services.iter_mut().find(|s| s.tag == tag)
    }

    pub fn find_probe(&self, tag: &str) -> Option<&ProbeCfg> {
        self.probes.as_ref()?.iter().find(|p| p.tag == tag)
    }

    pub fn probe_tags(&self) -> Vec<String> {
        self.probes
            .as_ref()
            .map(|ps| ps.iter().map(|p| p.tag.clone()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub logging: LoggingCfg,
    pub shpd_registry: ShpdRegistryCfg,
    pub envs_path: String,
    pub volumes_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates_path: Option<String>,
    pub host_inet_ip: String,
    pub domain: String,
    pub dns_type: String,
    pub ca: CaCfg,
    pub cert: CertCfg,
    pub staging_area: StagingAreaCfg,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_templates: Option<Vec<EnvironmentTemplateCfg>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_templates: Option<Vec<ServiceTemplateCfg>>,
    #[serde(default)]
    pub envs: Vec<EnvironmentCfg>,
}

impl GlobalConfig {
    pub fn find_environment(&self, tag: &str) -> Option<&EnvironmentCfg> {
        self.envs.iter().find(|e| e.tag == tag)
    }

    pub fn find_environment_mut(&mut self, tag: &str) -> Option<&mut EnvironmentCfg> {
        self.envs.iter_mut().find(|e| e.tag == tag)
    }

    pub fn find_environment_template(&self, tag: &str) -> Option<&EnvironmentTemplateCfg> {
        self.env_templates.as_ref()?.iter().find(|t| t.tag == tag)
    }

    pub fn find_service_template(&self, tag: &str) -> Option<&ServiceTemplateCfg> {
        self.service_templates.as_ref()?.iter().find(|t| t.tag == tag)
    }

    pub fn active_environment(&self) -> Option<&EnvironmentCfg> {
        self.envs.iter().find(|e| e.status.active)
    }

    /// Validate every declared network and volume, in environment templates
    /// and in environments alike. Called once at load time so a conflicting
    /// `external: true` + `driver: …` declaration is rejected up front
    /// rather than silently mis-rendered later.
    pub fn validate(&self) -> crate::error::ShepherdResult<()> {
        for tmpl in self.env_templates.iter().flatten() {
            for net in tmpl.networks.iter().flatten() {
                net.validate()?;
            }
            for vol in tmpl.volumes.iter().flatten() {
                vol.validate()?;
            }
        }
        for env in &self.envs {
            for net in env.networks.iter().flatten() {
                net.validate()?;
            }
            for vol in env.volumes.iter().flatten() {
                vol.validate()?;
            }
        }
        Ok(())
    }
}
