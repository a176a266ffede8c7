use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Demonstration front-end for the RPM release upgrade engine",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all but error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file; falls back to built-in defaults
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List packages currently tracked by the local store
    ListInstalled,

    /// List every package known to the configured repository metadata
    ListPackages,

    /// Search repository metadata by name, summary and description
    Search {
        /// Substring to search for
        query: String,
    },

    /// List releases known to the release catalog, newer than the
    /// currently installed one first
    ListReleases,

    /// Stage an upgrade to the given release version for next boot
    Upgrade {
        /// Target release version, e.g. 15
        version: u64,

        /// Which set of images to stage
        #[arg(long, value_enum, default_value_t = UpgradeKindArg::Default)]
        kind: UpgradeKindArg,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum UpgradeKindArg {
    Minimal,
    Default,
    Complete,
}

impl From<UpgradeKindArg> for rpmup_engine::UpgradeKind {
    fn from(value: UpgradeKindArg) -> Self {
        match value {
            UpgradeKindArg::Minimal => rpmup_engine::UpgradeKind::Minimal,
            UpgradeKindArg::Default => rpmup_engine::UpgradeKind::Default,
            UpgradeKindArg::Complete => rpmup_engine::UpgradeKind::Complete,
        }
    }
}
