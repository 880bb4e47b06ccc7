use anyhow::Result;
use clap::Parser;
use kiln::application::DEFAULT_SYNC_JOBS;
use kiln::commands::{self, BuildOptions, config::Config};
use std::path::PathBuf;

/// kiln - source-based package manager
///
/// Builds packages from source in dependency order, installs them into a
/// destination tree and keeps track of why each one was installed.
///
/// Examples:
///   kiln install curl           # Build and install curl and its dependencies
///   kiln remove curl            # Remove curl and report orphaned dependencies
///   kiln upgrade all            # Rebuild every installed package
#[derive(Parser, Debug)]
#[command(author, version = env!("KILN_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// State root directory (overrides defaults; also via KILN_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "KILN_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub root: Option<PathBuf>,

    /// Package repository (defaults to <root>/repo)
    #[arg(long = "repo", env = "KILN_REPO", value_name = "PATH", global = true)]
    pub repo: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Build and install a package with its dependencies
    Install(InstallArgs),

    /// Remove an installed package
    Remove(RemoveArgs),

    /// Rebuild an installed package, or all of them
    Upgrade(UpgradeArgs),

    /// Fetch or update package sources
    Sync(SyncArgs),

    /// List installed packages
    List(ListArgs),

    /// List dependencies nothing requires any more
    Orphans,

    /// Show the build order of a package
    Deps(DepsArgs),
}

#[derive(clap::Args, Debug)]
pub struct BuildArgs {
    /// Resolve and print the build order without building
    #[arg(long)]
    pub dry_run: bool,

    /// Build but do not install or record the packages
    #[arg(long)]
    pub no_install: bool,

    /// Do not build recommended dependencies
    #[arg(long)]
    pub skip_recommended: bool,

    /// Compiler flags passed to build scripts
    #[arg(long, env = "CFLAGS", value_name = "FLAGS", allow_hyphen_values = true)]
    pub cflags: Option<String>,

    /// Linker flags passed to build scripts
    #[arg(long, env = "LDFLAGS", value_name = "FLAGS", allow_hyphen_values = true)]
    pub ldflags: Option<String>,

    /// Install destination (defaults to / for root, <root>/sysroot otherwise)
    #[arg(long = "destdir", env = "KILN_DESTDIR", value_name = "PATH")]
    pub dest_dir: Option<PathBuf>,
}

impl BuildArgs {
    fn options(&self) -> BuildOptions {
        BuildOptions {
            dry_run: self.dry_run,
            no_install: self.no_install,
            skip_recommended: self.skip_recommended,
            cflags: self.cflags.clone(),
            ldflags: self.ldflags.clone(),
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Package name
    #[arg(value_name = "PACKAGE")]
    pub package: String,

    #[command(flatten)]
    pub build: BuildArgs,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Package name
    #[arg(value_name = "PACKAGE")]
    pub package: String,

    /// Remove even if installed packages still require it
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Destination the package was installed to
    #[arg(long = "destdir", env = "KILN_DESTDIR", value_name = "PATH")]
    pub dest_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct UpgradeArgs {
    /// Package name, or "all"
    #[arg(value_name = "PACKAGE|all")]
    pub target: String,

    #[command(flatten)]
    pub build: BuildArgs,
}

#[derive(clap::Args, Debug)]
pub struct SyncArgs {
    /// Package name, or "all" for every installed package
    #[arg(value_name = "PACKAGE|all")]
    pub target: String,

    /// Number of sources fetched at once
    #[arg(long, short = 'j', default_value_t = DEFAULT_SYNC_JOBS)]
    pub jobs: usize,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct DepsArgs {
    /// Package name
    #[arg(value_name = "PACKAGE")]
    pub package: String,

    /// Do not resolve recommended dependencies
    #[arg(long)]
    pub skip_recommended: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = kiln::runtime::RealRuntime;

    let dest_dir = match &cli.command {
        Commands::Install(args) => args.build.dest_dir.clone(),
        Commands::Upgrade(args) => args.build.dest_dir.clone(),
        Commands::Remove(args) => args.dest_dir.clone(),
        _ => None,
    };
    let config = Config::load(&runtime, cli.root, cli.repo, dest_dir)?;

    match cli.command {
        Commands::Install(args) => {
            commands::install(runtime, config, &args.package, args.build.options()).await?
        }
        Commands::Remove(args) => commands::remove(runtime, config, &args.package, args.force)?,
        Commands::Upgrade(args) => {
            commands::upgrade(runtime, config, &args.target, args.build.options()).await?
        }
        Commands::Sync(args) => commands::sync(runtime, config, &args.target, args.jobs).await?,
        Commands::List(args) => commands::list(runtime, config, args.json)?,
        Commands::Orphans => commands::orphans(runtime, config)?,
        Commands::Deps(args) => {
            commands::deps(runtime, config, &args.package, args.skip_recommended)?
        }
    }
    Ok(())
}
