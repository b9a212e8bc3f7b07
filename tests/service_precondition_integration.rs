//! A running environment's service-scoped operations must reject an
//! undeclared service tag with `ServiceNotFound` before ever shelling out
//! to the engine, per spec.md's "service not found in env" precondition.

use std::collections::HashMap;
use std::path::Path;

use shepherd::config::manager::ConfigManager;
use shepherd::config::model::*;
use shepherd::engine::EngineDriver;
use shepherd::error::ShepherdError;
use shepherd::render::UNGATED;
use shepherd::service;

fn running_env_config() -> (tempfile::TempDir, ConfigManager) {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = tmp.path().join(".shpd.yaml");
    let values_path = tmp.path().join(".shpd.conf");
    std::fs::write(&values_path, "").unwrap();
    std::fs::write(
        &config_path,
        format!(
            r#"
logging: {{file: /tmp/x.log, level: info, stdout: false, format: ""}}
shpd_registry: {{ftp_server: "", ftp_user: "", ftp_psw: "", ftp_shpd_path: "", ftp_env_imgs_path: ""}}
envs_path: {envs}
volumes_path: {vols}
host_inet_ip: 127.0.0.1
domain: test
dns_type: none
ca: {{country: "", state: "", locality: "", organization: "", organizational_unit: "", common_name: "", email: "", passphrase: ""}}
cert: {{country: "", state: "", locality: "", organization: "", organizational_unit: "", common_name: "", email: ""}}
staging_area: {{volumes_path: {sa_v}, images_path: {sa_i}}}
envs: []
"#,
            envs = tmp.path().join("envs").display(),
            vols = tmp.path().join("vols").display(),
            sa_v = tmp.path().join("sa-v").display(),
            sa_i = tmp.path().join("sa-i").display(),
        ),
    )
    .unwrap();

    let mut config = ConfigManager::load(&values_path, &config_path).unwrap();
    config.ensure_dirs().unwrap();

    let mut rendered = HashMap::new();
    rendered.insert(UNGATED.to_string(), "services: {}\n".to_string());
    let env = EnvironmentCfg {
        template: "tmpl".into(),
        factory: "compose".into(),
        tag: "foo".into(),
        services: vec![ServiceCfg {
            template: "t".into(),
            factory: "compose".into(),
            tag: "real".into(),
            service_class: None,
            containers: vec![],
            upstreams: None,
            labels: None,
            ingress: None,
            empty_env: None,
            properties: None,
            start: None,
            status: EntityStatus::default(),
        }],
        networks: None,
        volumes: None,
        probes: None,
        status: EntityStatus {
            active: false,
            archived: false,
            rendered_config: Some(rendered),
        },
    };
    config.add_environment(env).unwrap();
    (tmp, config)
}

/// An engine that would hard-fail if ever invoked, proving the precondition
/// check happens first.
fn poison_engine(dir: &Path) -> EngineDriver {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("poison-docker.sh");
    std::fs::write(&path, "#!/bin/sh\nexit 99\n").unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    EngineDriver::new(path)
}

#[tokio::test]
async fn start_rejects_unknown_service_before_touching_engine() {
    let (tmp, config) = running_env_config();
    let engine = poison_engine(tmp.path());
    let err = service::start(&config, &engine, "foo", "bogus").await.unwrap_err();
    assert!(matches!(err, ShepherdError::ServiceNotFound(svc, env) if svc == "bogus" && env == "foo"));
}

#[tokio::test]
async fn stop_rejects_unknown_service_before_touching_engine() {
    let (tmp, config) = running_env_config();
    let engine = poison_engine(tmp.path());
    let err = service::stop(&config, &engine, "foo", "bogus").await.unwrap_err();
    assert!(matches!(err, ShepherdError::ServiceNotFound(..)));
}

#[tokio::test]
async fn reload_rejects_unknown_service_before_touching_engine() {
    let (tmp, config) = running_env_config();
    let engine = poison_engine(tmp.path());
    let err = service::reload(&config, &engine, "foo", "bogus").await.unwrap_err();
    assert!(matches!(err, ShepherdError::ServiceNotFound(..)));
}

#[tokio::test]
async fn get_stdout_rejects_unknown_service_before_touching_engine() {
    let (tmp, config) = running_env_config();
    let engine = poison_engine(tmp.path());
    let err = service::get_stdout(&config, &engine, "foo", "bogus").await.unwrap_err();
    assert!(matches!(err, ShepherdError::ServiceNotFound(..)));
}

#[tokio::test]
async fn get_shell_rejects_unknown_service_before_touching_engine() {
    let (tmp, config) = running_env_config();
    let engine = poison_engine(tmp.path());
    let err = service::get_shell(&config, &engine, "foo", "bogus").await.unwrap_err();
    assert!(matches!(err, ShepherdError::ServiceNotFound(..)));
}

#[tokio::test]
async fn start_succeeds_for_a_declared_service() {
    let (tmp, config) = running_env_config();
    use std::os::unix::fs::PermissionsExt;
    let path = tmp.path().join("ok-docker.sh");
    std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    let engine = EngineDriver::new(path);

    service::start(&config, &engine, "foo", "real").await.unwrap();
}
