use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pepstore::agent::PepAgent;
use pepstore::cli::{self, Commands};

#[derive(Parser)]
#[command(name = "pepstore")]
#[command(about = "A metadata store for versioned sample projects", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides the configuration file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Act as the owner of this namespace
    #[arg(long = "as", global = true, value_name = "NAMESPACE")]
    owner: Option<String>,

    /// Act as an admin of this namespace (repeatable)
    #[arg(long = "admin", global = true, value_name = "NAMESPACE")]
    admin_of: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pepstore=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref(), cli.db)?;
    let caller = cli::caller(cli.owner, cli.admin_of);

    match cli.command {
        Commands::Init => {
            let db_path = config.db_path.clone();
            PepAgent::open(config)?;
            info!("Initialized database at {}", db_path.display());
            println!("Initialized {}", db_path.display());
        }
        Commands::Push {
            registry_path,
            file,
            description,
            private,
            schema,
            samples,
            overwrite,
        } => {
            let agent = cli::open_agent(config)?;
            cli::run_push(
                &agent,
                &caller,
                &registry_path,
                &file,
                description,
                private,
                schema,
                samples,
                overwrite,
            )?;
        }
        Commands::Pull {
            registry_path,
            annotation,
        } => {
            let agent = cli::open_agent(config)?;
            cli::run_pull(&agent, &caller, &registry_path, annotation)?;
        }
        Commands::Update {
            registry_path,
            tag,
            name,
            description,
            clear_description,
            private,
            public,
            schema,
            file,
        } => {
            let visibility = match (private, public) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let agent = cli::open_agent(config)?;
            cli::run_update(
                &agent,
                &caller,
                &registry_path,
                tag,
                name,
                description,
                clear_description,
                visibility,
                schema,
                file.as_deref(),
            )?;
        }
        Commands::Fork {
            source,
            target,
            description,
            private,
        } => {
            let agent = cli::open_agent(config)?;
            cli::run_fork(&agent, &caller, &source, &target, description, private)?;
        }
        Commands::Rm { registry_path } => {
            let agent = cli::open_agent(config)?;
            cli::run_delete(&agent, &caller, &registry_path)?;
        }
        Commands::Digest { file } => {
            cli::run_digest(&file)?;
        }
        Commands::Search {
            query,
            namespace,
            tag,
            digests,
            paths,
            sort,
            asc,
            limit,
            offset,
        } => {
            let agent = cli::open_agent(config)?;
            cli::run_search(
                &agent,
                &caller,
                query,
                namespace,
                tag,
                digests,
                paths,
                sort.into(),
                asc,
                limit,
                offset,
            )?;
        }
        Commands::Namespaces {
            query,
            order,
            limit,
            offset,
        } => {
            let agent = cli::open_agent(config)?;
            cli::run_namespaces(&agent, &caller, query, order.into(), limit, offset)?;
        }
        Commands::Stats { namespace, monthly } => {
            let agent = cli::open_agent(config)?;
            cli::run_stats(&agent, &caller, namespace, monthly)?;
        }
    }

    Ok(())
}
