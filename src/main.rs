use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lightsail_cli::cli::commands::{self, Context};

#[derive(Parser)]
#[command(name = "lightsail-cli")]
#[command(about = "Provision, inspect and deploy to AWS Lightsail instances")]
#[command(version)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Path to the config file
    #[arg(long, global = true, env = "LIGHTSAIL_CLI_CONFIG")]
    config: Option<PathBuf>,

    /// AWS region (overrides config)
    #[arg(long, global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the instance if missing, wait for it and open firewall ports
    Provision {
        /// Instance name (default from config)
        name: Option<String>,
    },

    /// Show instance details
    Info {
        /// Instance name (default from config)
        name: Option<String>,
    },

    /// Run a command on the instance with ephemeral SSH credentials
    Exec {
        /// Instance name
        name: String,

        /// Command to execute
        #[arg(short = 'c', long)]
        command: String,

        /// Timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Copy files to/from the instance
    Copy {
        /// Instance name
        name: String,

        /// Source path (prefix with : for remote)
        src: String,

        /// Destination path (prefix with : for remote)
        dest: String,

        /// Copy directories recursively
        #[arg(short, long)]
        recursive: bool,
    },

    /// Check first-boot setup and the Node.js runtime on the instance
    Inspect {
        /// Instance name (default from config)
        name: Option<String>,
    },

    /// Upload an application archive and restart its service
    Deploy {
        /// Instance name
        name: String,

        /// Path to the .tar.gz application archive
        archive: PathBuf,

        /// Environment variables as a JSON object
        env_vars: Option<String>,
    },

    /// Package a site directory and generate a file-by-file deploy script
    Bundle {
        /// Directory to package
        #[arg(short, long, default_value = ".")]
        source: PathBuf,

        /// Output archive
        #[arg(short, long, default_value = "app-deployment.tar.gz")]
        output: PathBuf,

        /// Output deployment script
        #[arg(long, default_value = "deploy-script.sh")]
        script: PathBuf,
    },

    /// Configure CLI and check prerequisites
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Check prerequisites and set the default instance
    Init,

    /// Show current configuration
    Show,

    /// Manage tags applied to new instances
    Tags {
        #[command(subcommand)]
        command: TagCommands,
    },
}

#[derive(Subcommand)]
enum TagCommands {
    /// Set a tag
    Set { key: String, value: String },

    /// List tags
    List,

    /// Remove a tag
    Remove { key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage errors exit 1 like every other failure
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            e.print()?;
            std::process::exit(code);
        }
    };
    let ctx = Context::load(cli.config, cli.region)?;

    match cli.command {
        Commands::Provision { name } => commands::provision::execute(&ctx, name).await?,
        Commands::Info { name } => commands::info::execute(&ctx, name).await?,
        Commands::Exec {
            name,
            command,
            timeout,
        } => commands::exec::execute(&ctx, name, command, timeout).await?,
        Commands::Copy {
            name,
            src,
            dest,
            recursive,
        } => commands::copy::execute(&ctx, name, src, dest, recursive).await?,
        Commands::Inspect { name } => commands::inspect::execute(&ctx, name).await?,
        Commands::Deploy {
            name,
            archive,
            env_vars,
        } => commands::deploy::execute(&ctx, name, archive, env_vars).await?,
        Commands::Bundle {
            source,
            output,
            script,
        } => commands::bundle::execute(&ctx, &source, &output, &script)?,
        Commands::Config { command } => match command {
            ConfigCommands::Init => commands::config::init(&ctx).await?,
            ConfigCommands::Show => commands::config::show(&ctx)?,
            ConfigCommands::Tags { command } => match command {
                TagCommands::Set { key, value } => commands::config::tags_set(&ctx, &key, &value)?,
                TagCommands::List => commands::config::tags_list(&ctx)?,
                TagCommands::Remove { key } => commands::config::tags_remove(&ctx, &key)?,
            },
        },
    }

    Ok(())
}
