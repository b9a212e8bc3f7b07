//! Lazy placeholder/cross-reference resolution.
//!
//! The source routes every attribute read through an interceptor that
//! checks a per-instance `resolved` flag. That hides control flow behind
//! dynamic dispatch and makes the resolved/unresolved toggle a piece of
//! mutable state every record must carry. This module takes the neutral
//! alternative the design calls out explicitly: an *explicit view layer*.
//! Records in [`super::model`] always hold raw text; resolution is a pure
//! function of that text plus an [`EvalContext`] threaded through the call
//! stack by whoever needs a resolved view (the renderer, `get` commands).
//! Nothing is ever mutated in place, so serialization is unconditionally
//! raw — the round-trip invariant holds by construction rather than by a
//! save/restore dance around a toggle.
//!
//! Two placeholder forms:
//! - `${NAME}` — from the value store, then process environment, else
//!   literal.
//! - `#{root.path.to.field}` where `root` is one of `cfg, env, svc, vol,
//!   net, cnt, probe` — walked from the nearest bound ancestor of that
//!   kind via a dotted accessor.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::values::ValueMap;

fn ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#\{([^}]+)\}").unwrap())
}

fn var_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").unwrap())
}

/// Scoped bindings from a root symbol to the nearest ancestor record of
/// that kind, as `serde_yaml::Value` so dotted-path lookups are generic
/// over record type. Entering a record binds its symbol for the rest of
/// that subtree; siblings never see each other's bindings — achieved here
/// simply by building a new `EvalContext` per branch via the `with_*`
/// methods instead of mutating a shared one.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    cfg: Option<serde_yaml::Value>,
    env: Option<serde_yaml::Value>,
    svc: Option<serde_yaml::Value>,
    net: Option<serde_yaml::Value>,
    vol: Option<serde_yaml::Value>,
    cnt: Option<serde_yaml::Value>,
    probe: Option<serde_yaml::Value>,
}

macro_rules! with_root {
    ($method:ident, $field:ident) => {
        pub fn $method<T: Serialize>(&self, record: &T) -> Self {
            let mut ctx = self.clone();
            ctx.$field = serde_yaml::to_value(record).ok();
            ctx
        }
    };
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    with_root!(with_cfg, cfg);
    with_root!(with_env, env);
    with_root!(with_svc, svc);
    with_root!(with_net, net);
    with_root!(with_vol, vol);
    with_root!(with_cnt, cnt);
    with_root!(with_probe, probe);

    fn root(&self, name: &str) -> Option<&serde_yaml::Value> {
        match name {
            "cfg" => self.cfg.as_ref(),
            "env" => self.env.as_ref(),
            "svc" => self.svc.as_ref(),
            "net" => self.net.as_ref(),
            "vol" => self.vol.as_ref(),
            "cnt" => self.cnt.as_ref(),
            "probe" => self.probe.as_ref(),
            _ => None,
        }
    }
}

/// Walk a dotted path (`"volumes_path"`, `"volumes.0.tag"`) through a
/// `serde_yaml::Value`. Returns `None` on any missing key, out-of-range
/// index, or non-scalar terminal — all treated as lookup failure by the
/// caller, which falls back to a literal passthrough.
fn walk_path(value: &serde_yaml::Value, path: &str) -> Option<String> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            serde_yaml::Value::Mapping(map) => {
                map.get(serde_yaml::Value::String(segment.to_string()))?
            }
            serde_yaml::Value::Sequence(seq) => {
                let idx: usize = segment.parse().ok()?;
                seq.get(idx)?
            }
            _ => return None,
        };
    }
    scalar_to_string(current)
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Null => None,
        _ => None,
    }
}

/// Substitute `${VAR}` from `store` (falling back to process env), then
/// `#{root.path}` from `ctx`. Order matters: a `${...}` value could in
/// principle be used inside path segments, though in practice the two
/// forms don't nest in this schema.
pub fn resolve(text: &str, store: &ValueMap, ctx: &EvalContext) -> String {
    let with_vars = resolve_vars(text, store);
    resolve_refs(&with_vars, ctx)
}

fn resolve_vars(text: &str, store: &ValueMap) -> String {
    var_re()
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            if let Some(v) = store.get(name) {
                v.clone()
            } else if let Ok(v) = std::env::var(name) {
                v
            } else {
                format!("${{{name}}}")
            }
        })
        .into_owned()
}

fn resolve_refs(text: &str, ctx: &EvalContext) -> String {
    ref_re()
        .replace_all(text, |caps: &regex::Captures| {
            let full = &caps[1];
            let resolved = full.split_once('.').and_then(|(root, path)| {
                let value = ctx.root(root)?;
                walk_path(value, path)
            });
            resolved.unwrap_or_else(|| format!("#{{{full}}}"))
        })
        .into_owned()
}

/// Field names ending in `_path` receive `~` expansion after placeholder
/// substitution; no other field does.
pub fn resolve_field(name: &str, text: &str, store: &ValueMap, ctx: &EvalContext) -> String {
    let resolved = resolve(text, store, ctx);
    if name.ends_with("_path") {
        expand_tilde(&resolved)
    } else {
        resolved
    }
}

fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if rest.is_empty() || rest.starts_with('/') {
            if let Some(home) = dirs::home_dir() {
                return format!("{}{}", home.display(), rest);
            }
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{EnvironmentCfg, EntityStatus, VolumeCfg};
    use std::collections::HashMap;

    fn store() -> ValueMap {
        let mut m = HashMap::new();
        m.insert("VOLUMES_PATH".to_string(), "/tmp/v".to_string());
        m
    }

    #[test]
    fn unknown_var_passes_through_literally() {
        let ctx = EvalContext::new();
        assert_eq!(resolve("${UNKNOWN}", &store(), &ctx), "${UNKNOWN}");
    }

    #[test]
    fn unknown_ref_root_passes_through_literally() {
        let ctx = EvalContext::new();
        assert_eq!(resolve("#{nope.field}", &store(), &ctx), "#{nope.field}");
    }

    #[test]
    fn nested_reference_resolves_against_nearest_ancestor() {
        let env = EnvironmentCfg {
            template: "t".into(),
            factory: "f".into(),
            tag: "foo".into(),
            services: vec![],
            networks: None,
            volumes: None,
            probes: None,
            status: EntityStatus::default(),
        };
        let vol = VolumeCfg {
            tag: "data".into(),
            external: crate::config::boolify::BoolifyStr::new("false"),
            name: None,
            driver: Some("local".into()),
            driver_opts: None,
            labels: None,
        };
        let ctx = EvalContext::new().with_env(&env).with_vol(&vol);
        let text = "#{cfg.volumes_path}/#{env.tag}/#{vol.tag}";
        let mut values = store();
        values.insert("dummy".into(), "x".into());
        let mut cfg_ctx = ctx.clone();
        cfg_ctx.cfg = Some(serde_yaml::Mapping::from_iter([(
            serde_yaml::Value::String("volumes_path".into()),
            serde_yaml::Value::String("/tmp/v".into()),
        )])
        .into());
        assert_eq!(resolve(text, &values, &cfg_ctx), "/tmp/v/foo/data");
    }

    #[test]
    fn path_field_gets_tilde_expansion() {
        let ctx = EvalContext::new();
        let resolved = resolve_field("envs_path", "~/envs", &store(), &ctx);
        assert!(!resolved.starts_with('~'));
    }

    #[test]
    fn non_path_field_keeps_tilde_literal() {
        let ctx = EvalContext::new();
        let resolved = resolve_field("domain", "~not-a-path", &store(), &ctx);
        assert_eq!(resolved, "~not-a-path");
    }
}
