//! `rpmup`: a thin demonstration front-end over the upgrade engine library
//! crates. Mirrors `soar-cli`'s `main.rs` bootstrap (parse args, set up
//! logging, dispatch on the subcommand) but stays synchronous end to end,
//! matching this workspace's blocking concurrency model.

mod cli;
mod error;
mod local_store;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rpmup_catalog::ReleaseCatalog;
use rpmup_config::{Configuration, MapConfiguration};
use rpmup_download::HttpDownloader;
use rpmup_engine::{ProcessRunner, RealProcessRunner, UpgradeEngine};
use rpmup_progress::ProgressNode;
use rpmup_repomd::PrimaryStore;
use tracing::{error, info};

use cli::{Args, Commands};
use error::CliError;
use local_store::{LocalStore, StubLocalStore};

fn run(args: Args) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_deref());

    match args.command {
        Commands::ListInstalled => run_list_installed(),
        Commands::ListPackages => run_list_packages(&config)?,
        Commands::Search { query } => run_search(&config, &query)?,
        Commands::ListReleases => {
            let downloader = HttpDownloader::new();
            run_list_releases(&config, &downloader)?;
        }
        Commands::Upgrade { version, kind } => {
            let mut downloader = HttpDownloader::new();
            let process = RealProcessRunner;
            run_upgrade(&mut config, &mut downloader, &process, version, kind.into())?;
        }
    }
    Ok(())
}

fn default_config() -> MapConfiguration {
    let mut config = MapConfiguration::new();
    config.set_string("upgrade_cache_dir", "/var/cache/rpmup".into());
    config.set_string("upgrade_boot_dir", "/var/lib/rpmup/preupgrade".into());
    config.set_string("upgrade_repo_dir", "/var/cache/rpmup/repo".into());
    config.set_string(
        "upgrade_releases_uri",
        "https://example.com/releases.txt".into(),
    );
    config.set_uint("metadata_expire", 86_400);
    config.set_uint("releasever", 0);
    config.set_string("basearch", std::env::consts::ARCH.into());
    config.set_string(
        "repo_primary_db",
        "/var/cache/rpmup/repodata/primary.sqlite".into(),
    );
    config
}

fn load_config(path: Option<&str>) -> MapConfiguration {
    match path {
        Some(path) => match MapConfiguration::load_toml(&PathBuf::from(path)) {
            Ok(loaded) => loaded,
            Err(err) => {
                error!(%err, path, "failed to load config file, falling back to built-in defaults");
                default_config()
            }
        },
        None => default_config(),
    }
}

fn run_list_installed() {
    let store = StubLocalStore;
    for package in store.installed() {
        println!("{}-{}.{}", package.name, package.version, package.arch);
    }
}

fn open_primary_store(config: &dyn Configuration) -> Result<PrimaryStore, CliError> {
    let path = config
        .get_string("repo_primary_db")
        .ok_or(CliError::MissingPrimaryDb)?;
    Ok(PrimaryStore::new(path, "default"))
}

fn run_list_packages(config: &dyn Configuration) -> Result<(), CliError> {
    let store = open_primary_store(config)?;
    for row in store.all()? {
        println!("{}-{}-{}.{}", row.name, row.version, row.release, row.arch);
    }
    Ok(())
}

fn run_search(config: &dyn Configuration, query: &str) -> Result<(), CliError> {
    let store = open_primary_store(config)?;
    for row in store.search_details(query)? {
        println!("{}-{}-{}.{}: {}", row.name, row.version, row.release, row.arch, row.summary);
    }
    Ok(())
}

fn run_list_releases(config: &dyn Configuration, downloader: &HttpDownloader) -> Result<(), CliError> {
    let mut catalog = ReleaseCatalog::new();
    let mut progress = ProgressNode::root();
    catalog.ensure_loaded(config, downloader, &mut progress)?;

    let releasever = config.get_uint("releasever").ok().flatten().unwrap_or(0);
    for upgrade in catalog.newer_than_installed(releasever) {
        println!("{} (version {})", upgrade.id, upgrade.version());
    }
    Ok(())
}

fn run_upgrade(
    config: &mut dyn Configuration,
    downloader: &mut HttpDownloader,
    process: &dyn ProcessRunner,
    version: u64,
    kind: rpmup_engine::UpgradeKind,
) -> Result<(), CliError> {
    let mut catalog = ReleaseCatalog::new();
    let mut progress = ProgressNode::root();
    catalog.ensure_loaded(config, downloader, &mut progress)?;

    let mut engine = UpgradeEngine::new(config, &catalog, downloader, process, None);
    let mut progress = ProgressNode::root();
    engine.upgrade_to(version, kind, &mut progress)?;
    info!(version, "upgrade staged for next boot");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::setup_logging(&args);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "command failed");
            ExitCode::FAILURE
        }
    }
}
