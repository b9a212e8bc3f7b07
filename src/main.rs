mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use shepherd::config::ConfigManager;
use shepherd::engine::EngineDriver;
use shepherd::error::{ShepherdError, ShepherdResult};
use shepherd::{environment, probe, service};

use cli::{AddResource, Cli, Command, GetResource};

fn value_file_path(override_path: &Option<String>) -> PathBuf {
    if let Some(p) = override_path {
        return PathBuf::from(p);
    }
    if let Ok(p) = std::env::var("SHPD_CONF") {
        return PathBuf::from(p);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shpd.conf")
}

fn config_doc_path(values: &shepherd::values::ValueMap) -> PathBuf {
    let root = std::env::var("SHPD_PATH")
        .ok()
        .or_else(|| values.get("shpd_path").cloned())
        .unwrap_or_else(|| ".".to_string());
    Path::new(&root).join(".shpd.yaml")
}

fn resolve_env_tag(config: &ConfigManager, requested: Option<&str>) -> ShepherdResult<String> {
    match requested {
        Some(tag) if !tag.trim().is_empty() => {
            if config.exists_environment(tag) {
                Ok(tag.to_string())
            } else {
                Err(ShepherdError::EnvironmentNotFound(tag.to_string()))
            }
        }
        _ => config
            .get_active_environment()
            .map(|e| e.tag.clone())
            .ok_or(ShepherdError::NoActiveEnvironment),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> ShepherdResult<()> {
    let values_path = value_file_path(&cli.conf);
    let user_values = shepherd::values::load(&values_path)?;
    let config_path = config_doc_path(&user_values);

    let mut config = ConfigManager::load(&values_path, &config_path)?;
    config.ensure_dirs()?;
    let engine = EngineDriver::discover()?;

    match cli.command {
        Command::Init { env_template, env_tag } => {
            environment::EnvironmentMng::new(&mut config, &engine).init_env(&env_template, &env_tag)?;
            println!("{env_tag}");
        }
        Command::Clone { src, dst } => {
            environment::EnvironmentMng::new(&mut config, &engine).clone_env(&src, &dst)?;
            println!("Cloned to: {dst}");
        }
        Command::Rename { src, dst } => {
            environment::EnvironmentMng::new(&mut config, &engine).rename_env(&src, &dst)?;
            println!("Renamed to: {dst}");
        }
        Command::Checkout { env_tag } => {
            environment::EnvironmentMng::new(&mut config, &engine).checkout_env(&env_tag)?;
            println!("Switched to: {env_tag}");
        }
        Command::Delete { env_tag } => {
            if !cli.yes && !confirm(&format!("Delete environment '{env_tag}'?")) {
                println!("Aborted.");
                return Ok(());
            }
            environment::EnvironmentMng::new(&mut config, &engine).delete_env(&env_tag)?;
            println!("Deleted: {env_tag}");
        }
        Command::List => {
            let rows = environment::EnvironmentMng::new(&mut config, &engine).list_envs();
            if rows.is_empty() {
                println!("No environments available.");
            } else {
                for (tag, template) in &rows {
                    println!("{tag}\t{template}");
                }
                println!("{} environment(s) found.", rows.len());
            }
        }
        Command::Add { resource } => match resource {
            AddResource::Svc { tag, template, class, env_tag } => {
                let env_tag = resolve_env_tag(&config, env_tag.as_deref())?;
                environment::EnvironmentMng::new(&mut config, &engine).add_service(
                    &env_tag,
                    &tag,
                    template.as_deref(),
                    class,
                )?;
                println!("Service '{tag}' added to environment '{env_tag}'.");
            }
        },
        Command::Up { env_tag, svc } => {
            let env_tag = resolve_env_tag(&config, env_tag.as_deref())?;
            match svc {
                Some(svc_tag) => service::start(&config, &engine, &env_tag, &svc_tag).await?,
                None => {
                    environment::EnvironmentMng::new(&mut config, &engine)
                        .start_env(&env_tag)
                        .await?
                }
            }
            println!("Started: {env_tag}");
        }
        Command::Halt { env_tag, svc } => {
            let env_tag = resolve_env_tag(&config, env_tag.as_deref())?;
            match svc {
                Some(svc_tag) => service::stop(&config, &engine, &env_tag, &svc_tag).await?,
                None => {
                    environment::EnvironmentMng::new(&mut config, &engine)
                        .halt_env(&env_tag)
                        .await?
                }
            }
            println!("Halted: {env_tag}");
        }
        Command::Reload { env_tag, svc } => {
            let env_tag = resolve_env_tag(&config, env_tag.as_deref())?;
            match svc {
                Some(svc_tag) => service::reload(&config, &engine, &env_tag, &svc_tag).await?,
                None => {
                    environment::EnvironmentMng::new(&mut config, &engine)
                        .reload_env(&env_tag)
                        .await?
                }
            }
            println!("Reloaded: {env_tag}");
        }
        Command::Status { env_tag } => {
            let env_tag = resolve_env_tag(&config, env_tag.as_deref())?;
            let rows = environment::EnvironmentMng::new(&mut config, &engine)
                .status_env(&env_tag)
                .await?;
            for row in rows {
                println!("{}\t{}", row.tag, if row.running { "running" } else { "stopped" });
            }
        }
        Command::Get { resource } => match resource {
            GetResource::Env { tag, target, resolved, .. } => {
                let env = config
                    .get_environment(&tag)
                    .ok_or_else(|| ShepherdError::EnvironmentNotFound(tag.clone()))?;
                let out = if target {
                    let store = config.user_values().clone();
                    let renderer = shepherd::render::Renderer::new(&store);
                    let docs = renderer.render_gated(config.config(), env, resolved)?;
                    docs.get(shepherd::render::UNGATED).cloned().unwrap_or_default()
                } else {
                    serde_yaml::to_string(env)
                        .map_err(|e| ShepherdError::yaml("rendering environment", e))?
                };
                println!("{out}");
            }
            GetResource::Svc { tag, env_tag, target, resolved, .. } => {
                let env_tag = resolve_env_tag(&config, env_tag.as_deref())?;
                let out = if target {
                    service::render_target(&config, &env_tag, &tag, resolved)?
                } else {
                    service::render(&config, &env_tag, &tag, resolved)?
                };
                println!("{out}");
            }
            GetResource::Probe { tag, env_tag } => {
                let env_tag = resolve_env_tag(&config, env_tag.as_deref())?;
                let env = config
                    .get_environment(&env_tag)
                    .ok_or_else(|| ShepherdError::EnvironmentNotFound(env_tag.clone()))?;
                let probe_cfg = env
                    .find_probe(&tag)
                    .ok_or_else(|| ShepherdError::probe_not_found(&tag, &env_tag, &env.probe_tags()))?;
                let out = serde_yaml::to_string(probe_cfg)
                    .map_err(|e| ShepherdError::yaml("rendering probe", e))?;
                println!("{out}");
            }
        },
        Command::Check { probe_tag, fail_fast, timeout, env_tag } => {
            let env_tag = resolve_env_tag(&config, env_tag.as_deref())?;
            let results = probe::check_probes(
                &config,
                &engine,
                &env_tag,
                probe_tag.as_deref(),
                fail_fast,
                timeout,
            )
            .await?;
            for r in &results {
                println!(
                    "{}\texit={}\ttimed_out={}\t{}ms",
                    r.tag, r.exit_code, r.timed_out, r.duration_ms
                );
            }
        }
        Command::Logs { svc, env_tag } => {
            let env_tag = resolve_env_tag(&config, env_tag.as_deref())?;
            let out = service::get_stdout(&config, &engine, &env_tag, &svc).await?;
            println!("{out}");
        }
        Command::Shell { svc, env_tag } => {
            let env_tag = resolve_env_tag(&config, env_tag.as_deref())?;
            service::get_shell(&config, &engine, &env_tag, &svc).await?;
        }
        Command::Build { svc, env_tag } => {
            let env_tag = resolve_env_tag(&config, env_tag.as_deref())?;
            service::build(&config, &engine, &env_tag, &svc).await?;
        }
        Command::Complete { args } => {
            let _ = args;
        }
    }

    Ok(())
}

fn confirm(prompt: &str) -> bool {
    use std::io::Write as _;
    print!("{prompt} [y/N] ");
    let _ = std::io::stdout().flush();
    let mut input = String::new();
    if std::io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
