use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // Release builds are tagged; use the tag verbatim.
    if let Some(tag) = option_env!("PPT_GIT_TAG") {
        return tag;
    }

    let commit = option_env!("PPT_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("PPT_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once at startup.
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser)]
#[command(name = "ppt")]
#[command(about = "Install and update precompiled binaries from GitHub release archives")]
#[command(version = get_version(), propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a program from a release asset URL
    #[command(
        after_help = "Example:\n  ppt install https://github.com/BurntSushi/ripgrep/releases/download/14.1.0/ripgrep-14.1.0-x86_64-unknown-linux-musl.tar.gz"
    )]
    Install {
        /// Release asset URL (.../<owner>/<repo>/releases/download/<version>/<asset>.tar.gz)
        url: String,
        /// Directory to place the executable in (defaults to ~/.local/bin)
        #[arg(long, value_name = "PATH")]
        install_path: Option<PathBuf>,
        /// Reinstall and overwrite the manifest record if the program exists
        #[arg(short, long)]
        force: bool,
    },

    /// Delete an installed program
    Uninstall {
        /// Program name as shown by `ppt list`
        program: String,
    },

    /// Update a program to its latest release
    Update {
        /// Program name as shown by `ppt list`
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        program: Option<String>,
        /// Check every installed program
        #[arg(long)]
        all: bool,
    },

    /// List installed programs
    List {
        /// Output format
        #[arg(long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },

    /// Show the current version
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Table,
    Json,
    Yaml,
}
