//! `repocache`: inspect cache partitions and translate repository paths.
//!
//! Build: `cargo build --bin repocache --features cli`

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;

use repocache::cache::{CacheKind, CacheScope};
use repocache::{CacheRegistry, CacheSettings, RepoPath, RepoPathResolver, RepositoriesDescriptor};

// ── CLI ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "repocache", version = repocache::PKG_VERSION)]
#[command(about = "inspect repository cache partitions and storage paths")]
struct Args {
    /// path to cache settings (TOML)
    #[arg(short, long, env = "REPOCACHE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// list cache kinds and their effective tunables
    Kinds,
    /// build the registry from a descriptor file and list its partitions
    Partitions {
        /// repositories descriptor (TOML, or JSON with a .json extension)
        descriptor: PathBuf,
    },
    /// translate a repository coordinate to a storage path
    ToStorage {
        /// repository key
        repo_key: String,
        /// path relative to the repository root
        #[arg(default_value = "")]
        path: String,
    },
    /// translate a storage path to a repository coordinate
    FromStorage {
        /// absolute storage path
        path: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(args: Args) -> repocache::Result<()> {
    let settings = CacheSettings::load(args.config.as_deref())?;
    debug!(overrides = settings.caches.len(), "loaded cache settings");

    match args.command {
        Command::Kinds => {
            for kind in CacheKind::ALL {
                let definition = settings.definition_for(kind);
                println!(
                    "{:<20} {:<13} idle={}s max={} policy={:?} ownership={:?}",
                    kind.name(),
                    scope_name(kind.scope()),
                    definition.idle_time.as_secs(),
                    definition.max_size,
                    definition.write_policy,
                    definition.ownership,
                );
            }
        }
        Command::Partitions { descriptor } => {
            let descriptor = RepositoriesDescriptor::load(&descriptor)?;
            let registry = CacheRegistry::with_settings(Arc::new(descriptor), settings);
            registry.init()?;
            for key in registry.repo_keys()? {
                let kinds = registry
                    .repository_kinds(&key)?
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("{key}: {kinds}");
            }
        }
        Command::ToStorage { repo_key, path } => {
            let resolver = RepoPathResolver::new();
            println!("{}", resolver.to_storage_path(&RepoPath::new(repo_key, &path)));
        }
        Command::FromStorage { path } => {
            let resolver = RepoPathResolver::new();
            match resolver.from_storage_path(&path) {
                Some(repo_path) => println!("{repo_path}"),
                None => {
                    eprintln!("{path} is not under the repositories root");
                    process::exit(2);
                }
            }
        }
    }
    Ok(())
}

fn scope_name(scope: CacheScope) -> &'static str {
    match scope {
        CacheScope::Global => "global",
        CacheScope::StoringRepo => "storing-repo",
        CacheScope::RemoteRepo => "remote-repo",
    }
}
