use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[command(flatten)]
    pub global_args: GlobalArgs,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// kubernetes namespace to work with
    #[arg(short = 'n', long, global = true, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,
    /// override default kubeconfig
    #[arg(long, global = true)]
    pub kube_config: Option<PathBuf>,
    /// override default kubeconfig context
    #[arg(long, global = true)]
    pub kube_context: Option<String>,
    /// override default gefyra config path (defaults to 'gefyra-config' next to the kubeconfig)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// enable verbose output
    #[arg(long = "verbose", global = true)]
    pub verbose_logging: bool,
    /// enable trace output (more detailed than verbose, overrides it if present)
    #[arg(long = "trace", global = true)]
    pub trace_logging: bool,
}

impl GlobalArgs {
    pub fn get_log_level(&self) -> LogLevel {
        if self.trace_logging {
            return LogLevel::Trace;
        }

        if self.verbose_logging {
            return LogLevel::Verbose;
        }

        LogLevel::Normal
    }
}

pub enum LogLevel {
    Normal,
    Verbose,
    Trace,
}

#[derive(Debug, Subcommand)]
#[command(arg_required_else_help = true)]
pub enum Commands {
    /// run a local container that behaves as if it was running in the cluster
    #[command(alias = "r")]
    Run(RunArgs),
    /// check whether docker and kubernetes are usable for gefyra
    #[command(alias = "c")]
    Check,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// image of the container
    #[arg(short = 'i', long)]
    pub image: String,
    /// name of the container (generated if unset)
    #[arg(short = 'N', long)]
    pub name: Option<String>,
    /// bind mount a volume ('<host path>:<container path>', relative host paths start at the working directory)
    #[arg(short = 'v', long = "volume")]
    pub volumes: Vec<String>,
    /// publish a container port ('[ip:]<host port>:<container port>')
    #[arg(short = 'p', long = "expose")]
    pub ports: Vec<String>,
    /// set an environment variable ('KEY=value'), wins over the copied environment
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,
    /// copy the environment of a workload ('<type>/<name>[/<container>]')
    #[arg(long)]
    pub env_from: Option<String>,
    /// return right after the container has started instead of following its logs
    #[arg(short = 'd', long)]
    pub detach: bool,
    /// keep the container after it stops
    #[arg(long)]
    pub no_rm: bool,
    /// command to run in the container
    #[arg(last = true)]
    pub command: Vec<String>,
}
