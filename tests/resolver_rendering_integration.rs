//! End-to-end coverage of nested-reference resolution and gated compose
//! rendering through the full config/render stack (not just the resolver's
//! own unit tests).

use std::collections::HashMap;

use shepherd::config::model::*;
use shepherd::render::{Renderer, UNGATED};

fn base_cfg(volumes_path: &str) -> GlobalConfig {
    GlobalConfig {
        logging: LoggingCfg {
            file: "/tmp/x.log".into(),
            level: "info".into(),
            stdout: BoolifyStr::new("false"),
            format: String::new(),
        },
        shpd_registry: ShpdRegistryCfg {
            ftp_server: "".into(),
            ftp_user: "".into(),
            ftp_psw: "".into(),
            ftp_shpd_path: "".into(),
            ftp_env_imgs_path: "".into(),
        },
        envs_path: "/tmp/envs".into(),
        volumes_path: volumes_path.to_string(),
        templates_path: None,
        host_inet_ip: "127.0.0.1".into(),
        domain: "test".into(),
        dns_type: "none".into(),
        ca: CaCfg {
            country: "".into(),
            state: "".into(),
            locality: "".into(),
            organization: "".into(),
            organizational_unit: "".into(),
            common_name: "".into(),
            email: "".into(),
            passphrase: "".into(),
        },
        cert: CertCfg {
            country: "".into(),
            state: "".into(),
            locality: "".into(),
            organization: "".into(),
            organizational_unit: "".into(),
            common_name: "".into(),
            email: "".into(),
            subject_alternative_names: None,
        },
        staging_area: StagingAreaCfg {
            volumes_path: "/tmp/sa/v".into(),
            images_path: "/tmp/sa/i".into(),
        },
        env_templates: None,
        service_templates: None,
        envs: vec![],
    }
}

fn container(tag: &str, image: &str) -> ContainerCfg {
    ContainerCfg {
        tag: tag.into(),
        image: Some(image.into()),
        ..Default::default()
    }
}

fn service(tag: &str, cnt: ContainerCfg, when_probes: Option<Vec<String>>) -> ServiceCfg {
    ServiceCfg {
        template: "t".into(),
        factory: "compose".into(),
        tag: tag.into(),
        service_class: None,
        containers: vec![cnt],
        upstreams: None,
        labels: None,
        ingress: None,
        empty_env: None,
        properties: None,
        start: when_probes.map(|p| StartCfg { when_probes: Some(p) }),
        status: EntityStatus::default(),
    }
}

/// Scenario 2: `#{cfg.volumes_path}/#{env.tag}/#{vol.tag}` resolves against
/// the config's own `volumes_path`, the enclosing environment's tag, and
/// the volume's own tag.
#[test]
fn nested_volume_reference_resolves_end_to_end() {
    let cfg = base_cfg("/tmp/v");
    let volume = VolumeCfg {
        tag: "data".into(),
        external: BoolifyStr::new("false"),
        name: None,
        driver: Some("local".into()),
        driver_opts: Some(HashMap::from([(
            "device".to_string(),
            "#{cfg.volumes_path}/#{env.tag}/#{vol.tag}".to_string(),
        )])),
        labels: None,
    };
    let env = EnvironmentCfg {
        template: "tmpl".into(),
        factory: "compose".into(),
        tag: "foo".into(),
        services: vec![],
        networks: None,
        volumes: Some(vec![volume]),
        probes: None,
        status: EntityStatus::default(),
    };

    let store = HashMap::new();
    let renderer = Renderer::new(&store);
    let docs = renderer.render_gated(&cfg, &env, true).unwrap();
    let ungated = &docs[UNGATED];

    assert!(
        ungated.contains("/tmp/v/foo/data"),
        "expected resolved device path in: {ungated}"
    );
}

/// Scenario 3: services A (ungated) and B (`start.when_probes: [p1]`)
/// render into exactly `{"ungated", "p1"}`, with A only in "ungated" and B
/// only in "p1".
#[test]
fn gated_render_target_splits_by_probe_key() {
    let cfg = base_cfg("/tmp/v");
    let env = EnvironmentCfg {
        template: "tmpl".into(),
        factory: "compose".into(),
        tag: "foo".into(),
        services: vec![
            service("a", container("a", "img-a"), None),
            service("b", container("b", "img-b"), Some(vec!["p1".to_string()])),
        ],
        networks: None,
        volumes: None,
        probes: None,
        status: EntityStatus::default(),
    };

    let store = HashMap::new();
    let renderer = Renderer::new(&store);
    let docs = renderer.render_gated(&cfg, &env, false).unwrap();

    let mut keys: Vec<&String> = docs.keys().collect();
    keys.sort();
    assert_eq!(keys, vec!["p1", UNGATED]);

    assert!(docs[UNGATED].contains("img-a"));
    assert!(!docs[UNGATED].contains("img-b"));
    assert!(docs["p1"].contains("img-b"));
    assert!(!docs["p1"].contains("img-a"));
}

/// A network declared both `external: true` and with a `driver` is a
/// schema error caught at validation, not silently rendered.
#[test]
fn conflicting_network_mode_is_rejected() {
    let net = NetworkCfg {
        tag: "bad".into(),
        name: Some("bad-net".into()),
        external: BoolifyStr::new("true"),
        driver: Some("bridge".into()),
        attachable: None,
        enable_ipv6: None,
        driver_opts: None,
        ipam: None,
    };
    let err = net.validate().unwrap_err();
    assert!(matches!(
        err,
        shepherd::error::ShepherdError::ConflictingNetworkMode(_)
    ));
}

/// An unresolved `${UNKNOWN}` placeholder passes through literally rather
/// than raising.
#[test]
fn unknown_placeholder_passes_through_in_rendered_output() {
    let cfg = base_cfg("/tmp/v");
    let env = EnvironmentCfg {
        template: "tmpl".into(),
        factory: "compose".into(),
        tag: "foo".into(),
        services: vec![service("a", container("a", "${UNKNOWN}"), None)],
        networks: None,
        volumes: None,
        probes: None,
        status: EntityStatus::default(),
    };
    let store = HashMap::new();
    let renderer = Renderer::new(&store);
    let docs = renderer.render_gated(&cfg, &env, true).unwrap();
    assert!(docs[UNGATED].contains("${UNKNOWN}"));
}
