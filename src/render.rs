//! The compose renderer: turns a declarative environment into one or more
//! engine-ready compose documents, gated by probe dependencies.
//!
//! Produces a map `probe-key -> compose-yaml-string`. `"ungated"` always
//! exists and carries the environment's networks, volumes, and every
//! service with no `start.when_probes`. Every other key is the stable
//! sorted-join of a distinct non-empty probe gate and carries only the
//! services declaring that exact gate.

use std::collections::{BTreeMap, HashMap};

use serde_yaml::{Mapping, Value};

use crate::config::model::*;
use crate::config::resolver::{self, EvalContext};
use crate::error::ShepherdResult;
use crate::values::ValueMap;

pub const UNGATED: &str = "ungated";

pub struct Renderer<'a> {
    store: &'a ValueMap,
}

impl<'a> Renderer<'a> {
    pub fn new(store: &'a ValueMap) -> Self {
        Self { store }
    }

    /// Render every gated document for `env`. `resolved` controls whether
    /// placeholder substitution runs; it never mutates `cfg`/`env`.
    pub fn render_gated(
        &self,
        cfg: &GlobalConfig,
        env: &EnvironmentCfg,
        resolved: bool,
    ) -> ShepherdResult<HashMap<String, String>> {
        let cfg_ctx = EvalContext::new().with_cfg(cfg);
        let env_ctx = cfg_ctx.with_env(env);

        let mut gates: BTreeMap<String, Vec<&ServiceCfg>> = BTreeMap::new();
        for svc in &env.services {
            let key = gate_key(svc.when_probes());
            gates.entry(key).or_default().push(svc);
        }
        gates.entry(UNGATED.to_string()).or_default();

        let mut docs = HashMap::with_capacity(gates.len());
        for (key, services) in gates {
            let services_section =
                self.render_services(&env_ctx, env, &services, resolved)?;

            let mut root = Mapping::new();
            if key == UNGATED {
                if let Some(networks) = &env.networks {
                    if !networks.is_empty() {
                        root.insert(
                            Value::String("networks".into()),
                            self.render_networks(&env_ctx, networks, resolved),
                        );
                    }
                }
                if let Some(volumes) = &env.volumes {
                    if !volumes.is_empty() {
                        root.insert(
                            Value::String("volumes".into()),
                            self.render_volumes(&env_ctx, volumes, resolved),
                        );
                    }
                }
            }
            root.insert(Value::String("services".into()), services_section);

            let yaml = serde_yaml::to_string(&Value::Mapping(root))
                .map_err(|e| crate::error::ShepherdError::yaml("rendering compose document", e))?;
            docs.insert(key, yaml);
        }

        Ok(docs)
    }

    fn render_services(
        &self,
        env_ctx: &EvalContext,
        env: &EnvironmentCfg,
        services: &[&ServiceCfg],
        resolved: bool,
    ) -> ShepherdResult<Value> {
        let mut out = Mapping::new();
        for svc in services {
            let svc_ctx = env_ctx.with_svc(*svc);
            for cnt in &svc.containers {
                let name = canonical_container_name(&cnt.tag, &svc.tag, &env.tag);
                let def = self.render_container(&svc_ctx, svc, cnt, resolved);
                out.insert(Value::String(name), def);
            }
        }
        Ok(Value::Mapping(out))
    }

    fn render_container(
        &self,
        svc_ctx: &EvalContext,
        svc: &ServiceCfg,
        cnt: &ContainerCfg,
        resolved: bool,
    ) -> Value {
        let ctx = svc_ctx.with_cnt(cnt);
        let mut def = Mapping::new();

        let text = |field: &str, value: &str| -> String {
            if resolved {
                resolver::resolve_field(field, value, self.store, &ctx)
            } else {
                value.to_string()
            }
        };
        let list = |field: &str, values: &[String]| -> Vec<String> {
            values.iter().map(|v| text(field, v)).collect()
        };

        if let Some(image) = &cnt.image {
            def.insert("image".into(), text("image", image).into());
        }
        if let Some(hostname) = &cnt.hostname {
            def.insert("hostname".into(), text("hostname", hostname).into());
        }
        if let Some(container_name) = &cnt.container_name {
            def.insert(
                "container_name".into(),
                text("container_name", container_name).into(),
            );
        }
        if let Some(workdir) = &cnt.workdir {
            def.insert("working_dir".into(), text("workdir", workdir).into());
        }
        if let Some(labels) = &svc.labels {
            if !labels.is_empty() {
                def.insert("labels".into(), to_seq(list("labels", labels)));
            }
        }
        if let Some(environment) = &cnt.environment {
            if !environment.is_empty() {
                def.insert(
                    "environment".into(),
                    to_seq(list("environment", environment)),
                );
            }
        }
        if let Some(volumes) = &cnt.volumes {
            if !volumes.is_empty() {
                def.insert("volumes".into(), to_seq(list("volumes", volumes)));
            }
        }
        if let Some(ports) = &cnt.ports {
            if !ports.is_empty() {
                def.insert("ports".into(), to_seq(list("ports", ports)));
            }
        }
        if let Some(extra_hosts) = &cnt.extra_hosts {
            if !extra_hosts.is_empty() {
                def.insert(
                    "extra_hosts".into(),
                    to_seq(list("extra_hosts", extra_hosts)),
                );
            }
        }
        if let Some(networks) = &cnt.networks {
            if !networks.is_empty() {
                def.insert("networks".into(), to_seq(list("networks", networks)));
            }
        }

        Value::Mapping(def)
    }

    fn render_networks(&self, ctx: &EvalContext, networks: &[NetworkCfg], resolved: bool) -> Value {
        let mut out = Mapping::new();
        for net in networks {
            let net_ctx = ctx.with_net(net);
            let mut def = Mapping::new();
            if net.is_external() {
                if let Some(name) = &net.name {
                    def.insert(
                        "name".into(),
                        self.resolve_opt("name", name, resolved, &net_ctx).into(),
                    );
                }
                def.insert("external".into(), Value::Bool(true));
            } else {
                if let Some(driver) = &net.driver {
                    def.insert(
                        "driver".into(),
                        self.resolve_opt("driver", driver, resolved, &net_ctx).into(),
                    );
                }
                if let Some(attachable) = &net.attachable {
                    def.insert("attachable".into(), bool_value(attachable));
                }
                if let Some(enable_ipv6) = &net.enable_ipv6 {
                    def.insert("enable_ipv6".into(), bool_value(enable_ipv6));
                }
                if let Some(opts) = &net.driver_opts {
                    def.insert(
                        "driver_opts".into(),
                        self.render_str_map(&net_ctx, opts, resolved),
                    );
                }
                if let Some(ipam) = &net.ipam {
                    def.insert("ipam".into(), ipam.clone());
                }
            }
            out.insert(Value::String(net.tag.clone()), Value::Mapping(def));
        }
        Value::Mapping(out)
    }

    fn render_volumes(&self, ctx: &EvalContext, volumes: &[VolumeCfg], resolved: bool) -> Value {
        let mut out = Mapping::new();
        for vol in volumes {
            let vol_ctx = ctx.with_vol(vol);
            let mut def = Mapping::new();
            if vol.is_external() {
                if let Some(name) = &vol.name {
                    def.insert(
                        "name".into(),
                        self.resolve_opt("name", name, resolved, &vol_ctx).into(),
                    );
                }
                def.insert("external".into(), Value::Bool(true));
            } else {
                if let Some(driver) = &vol.driver {
                    def.insert(
                        "driver".into(),
                        self.resolve_opt("driver", driver, resolved, &vol_ctx).into(),
                    );
                }
                if let Some(opts) = &vol.driver_opts {
                    def.insert(
                        "driver_opts".into(),
                        self.render_str_map(&vol_ctx, opts, resolved),
                    );
                }
                if let Some(labels) = &vol.labels {
                    def.insert(
                        "labels".into(),
                        self.render_str_map(&vol_ctx, labels, resolved),
                    );
                }
            }
            out.insert(Value::String(vol.tag.clone()), Value::Mapping(def));
        }
        Value::Mapping(out)
    }

    fn render_str_map(
        &self,
        ctx: &EvalContext,
        map: &std::collections::HashMap<String, String>,
        resolved: bool,
    ) -> Value {
        let mut out = Mapping::new();
        for (k, v) in map {
            let value = self.resolve_opt(k, v, resolved, ctx);
            out.insert(Value::String(k.clone()), Value::String(value));
        }
        Value::Mapping(out)
    }

    fn resolve_opt(&self, field: &str, raw: &str, resolved: bool, ctx: &EvalContext) -> String {
        if resolved {
            resolver::resolve_field(field, raw, self.store, ctx)
        } else {
            raw.to_string()
        }
    }

    /// Pre-create host `device` directories for local bind-mount volumes.
    /// Idempotent: `create_dir_all` on an existing directory is a no-op.
    pub fn ensure_volume_resources(
        &self,
        cfg: &GlobalConfig,
        env: &EnvironmentCfg,
    ) -> ShepherdResult<()> {
        let cfg_ctx = EvalContext::new().with_cfg(cfg);
        let env_ctx = cfg_ctx.with_env(env);
        for vol in env.volumes.iter().flatten() {
            if !vol.is_local_bind_mount() {
                continue;
            }
            let vol_ctx = env_ctx.with_vol(vol);
            if let Some(device) = vol.bind_device() {
                let resolved = resolver::resolve_field("device", device, self.store, &vol_ctx);
                std::fs::create_dir_all(&resolved).map_err(|e| {
                    crate::error::ShepherdError::io(format!("create bind-mount dir {}", resolved), e)
                })?;
            }
        }
        Ok(())
    }
}

fn bool_value(b: &crate::config::boolify::BoolifyStr) -> Value {
    match b.as_bool() {
        Some(v) => Value::Bool(v),
        None => Value::String(b.as_str().to_string()),
    }
}

fn to_seq(items: Vec<String>) -> Value {
    Value::Sequence(items.into_iter().map(Value::String).collect())
}

/// Stable sorted-join key identifying a probe gate, e.g. `"p1|p2"`. An
/// ungated service maps to [`UNGATED`].
pub fn gate_key(when_probes: &[String]) -> String {
    if when_probes.is_empty() {
        return UNGATED.to_string();
    }
    let mut tags: Vec<&str> = when_probes.iter().map(String::as_str).collect();
    tags.sort();
    tags.join("|")
}

pub fn canonical_service_name(service_tag: &str, env_tag: &str) -> String {
    format!("{service_tag}-{env_tag}")
}

pub fn canonical_container_name(container_tag: &str, service_tag: &str, env_tag: &str) -> String {
    format!("{container_tag}-{service_tag}-{env_tag}")
}
