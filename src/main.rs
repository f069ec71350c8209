use anyhow::Result;
use clap::Parser;
use gemenv::config::{CONFIG_ENV, Config};
use gemenv::runtime::RealRuntime;
use gemenv::{Environment, LogLoader, Requirement};
use std::path::PathBuf;

/// gemenv - inspect installed packages and their load paths
///
/// Roots are taken from PACKAGE_HOME and ADDITIONAL_PACKAGE_PATH unless
/// given on the command line.
///
/// Examples:
///   gemenv which rake rake.rb           # Where rake.rb of the newest rake lives
///   gemenv which -v '< 13' rake rake.rb # Same, for a version below 13
#[derive(Parser, Debug)]
#[command(author, version = env!("GEMENV_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Primary root (overrides PACKAGE_HOME)
    #[arg(long = "root", short = 'r', value_name = "PATH", global = true)]
    root: Option<PathBuf>,

    /// Additional root, searched before the primary one (repeatable)
    #[arg(long = "path", short = 'p', value_name = "PATH", global = true)]
    paths: Vec<PathBuf>,

    /// JSON configuration file
    #[arg(long = "config", env = CONFIG_ENV, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show the resolved roots and settings
    Env,

    /// List installed packages and their versions
    List,

    /// Print the location of a file inside a package
    Which(WhichArgs),

    /// Print library directories of installed packages
    LoadPaths(LoadPathsArgs),

    /// Print the data directory of a package
    Datadir(NameArgs),

    /// Activate a package and print the resulting load path
    Activate(ActivateArgs),
}

#[derive(clap::Args, Debug)]
struct WhichArgs {
    #[arg(value_name = "NAME")]
    name: String,

    /// File relative to the package's library directories
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Version requirement, e.g. ">= 1.0, < 2"
    #[arg(long = "version", short = 'v', default_value = "")]
    requirement: String,
}

#[derive(clap::Args, Debug)]
struct LoadPathsArgs {
    /// Only the newest version of each package
    #[arg(long)]
    latest: bool,
}

#[derive(clap::Args, Debug)]
struct NameArgs {
    #[arg(value_name = "NAME")]
    name: String,
}

#[derive(clap::Args, Debug)]
struct ActivateArgs {
    #[arg(value_name = "NAME")]
    name: String,

    /// Version requirement, e.g. "~> 1.2"
    #[arg(long = "version", short = 'v', default_value = "")]
    requirement: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(&RealRuntime, path)?,
        None => Config::default(),
    };
    let env = Environment::new(RealRuntime, LogLoader, config);

    if cli.root.is_some() || !cli.paths.is_empty() {
        let primary = match cli.root {
            Some(root) => root,
            None => env.dir()?,
        };
        env.use_paths(primary, cli.paths);
    }

    run(&env, cli.command)
}

fn run(env: &Environment<RealRuntime>, command: Commands) -> Result<()> {
    match command {
        Commands::Env => {
            println!("primary root: {}", env.dir()?.display());
            println!("roots:");
            for root in env.path()? {
                println!("  - {}", root.display());
            }
            println!("ssl available: {}", env.ssl_available());
            println!("sources:");
            for source in env.sources() {
                println!("  - {}", source);
            }
        }
        Commands::List => {
            let registry = env.registry()?;
            for name in registry.names() {
                let versions: Vec<String> = registry
                    .find(name)
                    .iter()
                    .rev()
                    .map(|spec| spec.version().to_string())
                    .collect();
                println!("{} ({})", name, versions.join(", "));
            }
        }
        Commands::Which(args) => {
            let requirement = Requirement::parse(&args.requirement)?;
            let location = env.required_location(&args.name, &args.file, &requirement)?;
            println!("{}", location.display());
        }
        Commands::LoadPaths(args) => {
            let mut paths = if args.latest {
                env.latest_load_paths()?
            } else {
                env.all_load_paths()?
            };
            paths.sort();
            for path in paths {
                println!("{}", path.display());
            }
        }
        Commands::Datadir(args) => match env.datadir(&args.name)? {
            Some(dir) => println!("{}", dir.display()),
            None => anyhow::bail!("No data directory for package '{}'", args.name),
        },
        Commands::Activate(args) => {
            let requirement = Requirement::parse(&args.requirement)?;
            let spec = env.activate(&args.name, &requirement)?;
            log::info!("Activated {}", spec.full_name());
            for path in env.load_path() {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}
