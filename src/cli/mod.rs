//! CLI verb surface. Presentation only: argument parsing and dispatch into
//! the core modules. No lifecycle logic lives here.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "shepctl", version, about = "Multi-environment workload controller")]
pub struct Cli {
    /// Path to the key=value value file (overrides SHPD_CONF).
    #[arg(long, global = true)]
    pub conf: Option<String>,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Assume yes on confirmation prompts.
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new environment from a template.
    Init { env_template: String, env_tag: String },
    /// Clone an environment by hard-link.
    Clone { src: String, dst: String },
    /// Rename (move) an environment.
    Rename { src: String, dst: String },
    /// Set the active environment.
    Checkout { env_tag: String },
    /// Remove an environment.
    Delete { env_tag: String },
    /// List all environments.
    List,
    /// Add a resource to the active (or named) environment.
    Add {
        #[command(subcommand)]
        resource: AddResource,
    },
    /// Start an environment or service.
    Up {
        env_tag: Option<String>,
        #[arg(long)]
        svc: Option<String>,
    },
    /// Stop an environment or service.
    Halt {
        env_tag: Option<String>,
        #[arg(long)]
        svc: Option<String>,
    },
    /// Restart an environment or service.
    Reload {
        env_tag: Option<String>,
        #[arg(long)]
        svc: Option<String>,
    },
    /// Show runtime status.
    Status { env_tag: Option<String> },
    /// Render a resource's configuration.
    Get {
        #[command(subcommand)]
        resource: GetResource,
    },
    /// Run health probes.
    Check {
        probe_tag: Option<String>,
        #[arg(long)]
        fail_fast: bool,
        #[arg(long)]
        timeout: Option<u64>,
        env_tag: Option<String>,
    },
    /// Show a service's logs.
    Logs { svc: String, env_tag: Option<String> },
    /// Open a shell in a service's container.
    Shell { svc: String, env_tag: Option<String> },
    /// Build a service's images.
    Build { svc: String, env_tag: Option<String> },
    /// Shell completion helper.
    Complete { args: Vec<String> },
}

#[derive(Subcommand, Debug)]
pub enum AddResource {
    Svc {
        tag: String,
        template: Option<String>,
        class: Option<String>,
        env_tag: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum GetResource {
    Env {
        tag: String,
        #[arg(short = 'o', long)]
        output: Option<String>,
        #[arg(short = 't', long)]
        target: bool,
        #[arg(short = 'r', long)]
        resolved: bool,
    },
    Svc {
        tag: String,
        env_tag: Option<String>,
        #[arg(short = 'o', long)]
        output: Option<String>,
        #[arg(short = 't', long)]
        target: bool,
        #[arg(short = 'r', long)]
        resolved: bool,
    },
    Probe {
        tag: String,
        env_tag: Option<String>,
    },
}
