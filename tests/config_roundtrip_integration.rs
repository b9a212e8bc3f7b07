//! Scenario 5: boolean round-tripping through a real `ConfigManager::load`
//! / `store` cycle, and the storage-is-always-raw invariant from the
//! resolved/unresolved design (serializing doesn't depend on whether a
//! value was ever looked at through the resolver).

use std::path::Path;

use shepherd::config::ConfigManager;

fn config_yaml(envs: &Path, vols: &Path, sa_v: &Path, sa_i: &Path) -> String {
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
envs:
  - template: tmpl
    factory: compose
    tag: foo
    services:
      - template: t1
        factory: compose
        tag: a
        containers: []
        ingress: true
      - template: t1
        factory: compose
        tag: b
        containers: []
        ingress: "true"
      - template: t1
        factory: compose
        tag: c
        containers: []
        ingress: "maybe"
"#,
        envs = envs.display(),
        vols = vols.display(),
        sa_v = sa_v.display(),
        sa_i = sa_i.display(),
    )
}

#[test]
fn boolean_literal_and_quoted_true_converge_maybe_is_preserved() {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = tmp.path().join(".shpd.yaml");
    let values_path = tmp.path().join(".shpd.conf");
    std::fs::write(&values_path, "").unwrap();
    std::fs::write(
        &config_path,
        config_yaml(
            &tmp.path().join("envs"),
            &tmp.path().join("vols"),
            &tmp.path().join("sa-v"),
            &tmp.path().join("sa-i"),
        ),
    )
    .unwrap();

    let config = ConfigManager::load(&values_path, &config_path).unwrap();
    let env = config.get_environment("foo").unwrap();
    let a = env.find_service("a").unwrap();
    let b = env.find_service("b").unwrap();
    let c = env.find_service("c").unwrap();

    assert_eq!(a.ingress.as_ref().unwrap().as_bool(), Some(true));
    assert_eq!(b.ingress.as_ref().unwrap().as_bool(), Some(true));
    assert_eq!(c.ingress.as_ref().unwrap().as_str(), "maybe");

    config.store().unwrap();
    let reloaded = std::fs::read_to_string(&config_path).unwrap();
    assert_eq!(reloaded.matches("ingress: true").count(), 2);
    assert!(reloaded.contains("ingress: maybe"));
}

/// `rendered_config` is `None` until `start()`, and re-serializing a freshly
/// loaded config (with no resolver view ever taken) is a pure pass-through
/// of the raw document.
#[test]
fn store_after_load_with_no_mutation_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = tmp.path().join(".shpd.yaml");
    let values_path = tmp.path().join(".shpd.conf");
    std::fs::write(&values_path, "").unwrap();
    std::fs::write(
        &config_path,
        config_yaml(
            &tmp.path().join("envs"),
            &tmp.path().join("vols"),
            &tmp.path().join("sa-v"),
            &tmp.path().join("sa-i"),
        ),
    )
    .unwrap();

    let config = ConfigManager::load(&values_path, &config_path).unwrap();
    config.store().unwrap();
    let first_pass = std::fs::read_to_string(&config_path).unwrap();

    let reloaded = ConfigManager::load(&values_path, &config_path).unwrap();
    reloaded.store().unwrap();
    let second_pass = std::fs::read_to_string(&config_path).unwrap();

    assert_eq!(first_pass, second_pass);
    assert!(reloaded
        .get_environment("foo")
        .unwrap()
        .status
        .rendered_config
        .is_none());
}

/// A network declared both `external: true` and with a `driver` is rejected
/// at `ConfigManager::load` itself, not left to silently mis-render later.
#[test]
fn load_rejects_conflicting_network_mode() {
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
envs:
  - template: tmpl
    factory: compose
    tag: foo
    services: []
    networks:
      - tag: bad
        external: true
        driver: bridge
"#,
            envs = tmp.path().join("envs").display(),
            vols = tmp.path().join("vols").display(),
            sa_v = tmp.path().join("sa-v").display(),
            sa_i = tmp.path().join("sa-i").display(),
        ),
    )
    .unwrap();

    let err = ConfigManager::load(&values_path, &config_path).unwrap_err();
    assert!(matches!(
        err,
        shepherd::error::ShepherdError::ConflictingNetworkMode(tag) if tag == "bad"
    ));
}
