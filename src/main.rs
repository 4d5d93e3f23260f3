mod archive;
mod cli;
mod config;
mod download;
mod error;
mod github;
mod install;
mod manifest;
mod release_url;
mod report;
mod types;
mod version;

use anyhow::{anyhow, Result};
use clap::Parser;
use cli::{Cli, Commands, ListFormat};
use config::Settings;
use console::style;
use download::GitHubSource;
use install::{Context, InstallOutcome, UpdateOutcome};
use manifest::ManifestStore;
use report::ConsoleReporter;
use types::ListedPackage;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(&cli);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Version = cli.command {
        println!("ppt v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = Settings::from_env()?;
    let store = ManifestStore::new(&settings.manifest_path);
    let reporter = ConsoleReporter::new(!cli.quiet);
    let source = GitHubSource::new(settings.http_timeout, settings.github_token.clone())?;
    let ctx = Context {
        source: &source,
        store: &store,
        reporter: &reporter,
        install_dir: &settings.install_dir,
    };

    match cli.command {
        Commands::Version => {}

        Commands::Install {
            url,
            install_path,
            force,
        } => match install::install(&ctx, &url, install_path.as_deref(), force).await? {
            InstallOutcome::Installed { record, path } => {
                println!("Installed {} {} to {}", record.name, record.version, path.display());
            }
            InstallOutcome::AlreadyInstalled { record } => {
                println!("{} {} is already installed.", record.name, record.version);
            }
        },

        Commands::Uninstall { program } => {
            let outcome = install::uninstall(&ctx, &program)?;
            if outcome.binary_removed {
                println!("Uninstalled {} ({} removed).", program, outcome.binary_path.display());
            } else {
                println!("Uninstalled {}.", outcome.record.name);
            }
        }

        Commands::Update { program, all } => {
            if all {
                let results = install::update_all(&ctx).await?;
                let failed = results.iter().filter(|(_, r)| r.is_err()).count();
                for (_, result) in &results {
                    if let Ok(outcome) = result {
                        print_update(outcome);
                    }
                }
                if failed > 0 {
                    return Err(anyhow!("{} of {} update(s) failed", failed, results.len()));
                }
            } else if let Some(program) = program {
                let outcome = install::update(&ctx, &program).await?;
                print_update(&outcome);
            }
        }

        Commands::List { format } => {
            let packages = install::list(&store)?;
            print_packages(&packages, format)?;
        }
    }

    Ok(())
}

fn setup_logging(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();
}

fn print_update(outcome: &UpdateOutcome) {
    match outcome {
        UpdateOutcome::Updated { name, from, to, path } => {
            println!("Updated {} from {} to {} ({})", name, from, to, path.display());
        }
        UpdateOutcome::UpToDate { name, current, latest } => {
            tracing::debug!("{} is at {}", name, current);
            println!("Latest version of {} is {}, nothing to update.", name, latest);
        }
    }
}

fn print_packages(packages: &[ListedPackage], format: ListFormat) -> Result<()> {
    match format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(packages)?),
        ListFormat::Yaml => print!("{}", serde_yaml::to_string(packages)?),
        ListFormat::Table => {
            if packages.is_empty() {
                println!("No programs installed.");
                return Ok(());
            }

            let width = packages
                .iter()
                .map(|p| p.name.len())
                .max()
                .unwrap_or(0)
                .max("Program".len());

            println!("{:<width$}  {}", style("Program").bold(), style("Version").bold(), width = width);
            for package in packages {
                println!(
                    "{:<width$}  {}",
                    style(&package.name).magenta(),
                    style(&package.version).green(),
                    width = width
                );
            }
        }
    }
    Ok(())
}
