use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use profilecopy::cli::{handle_backup_command, AppContext, BackupCommands};
use profilecopy::config::paths::current_user_name;
use profilecopy::config::{Settings, ToolPaths};
use profilecopy::display::{format_log_entries, format_scenario_details, format_scenario_list};
use profilecopy::error::ProfileError;
use profilecopy::journal::{FileLogger, Level};

#[derive(Parser)]
#[command(
    name = "profilecopy",
    author = "Kaylee Beyene",
    version,
    about = "Back up and restore QGIS profiles on a network share",
    long_about = "profilecopy packs the QGIS profile directory into a timestamped zip \
                  archive in your folder on a network share, and restores it from there. \
                  Running QGIS processes can be stopped first so no file is held open."
)]
struct Cli {
    /// Configuration file (overrides PROFILECOPY_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Scenario to use instead of ACTIVE_SCENARIO
    #[arg(long, global = true)]
    scenario: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Backup(BackupCommands),

    /// List configured scenarios
    Scenarios,

    /// Show current configuration and paths
    Config,

    /// Show recent log entries
    Log {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        tail: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config) = &cli.config {
        if !config.exists() {
            return Err(ProfileError::Config(format!(
                "Configuration file not found: {}",
                config.display()
            ))
            .into());
        }
    }

    // Initialize paths, settings and the log
    let paths = ToolPaths::new(cli.config.clone());
    paths.ensure_directories()?;
    let settings = Settings::load_or_default(paths.config_file())?;

    let level = if settings.debug_mode {
        Level::Debug
    } else {
        Level::from_setting(&settings.log_level)
    };
    let logger = Arc::new(FileLogger::new(paths.log_dir(), level));
    logger.cleanup_old_logs(settings.log_retention_days);

    let Some(command) = cli.command else {
        println!("profilecopy - QGIS profile backup and restore");
        println!();
        println!("Run 'profilecopy --help' for usage information.");
        println!("Run 'profilecopy list' to see your backups.");
        return Ok(());
    };

    match command {
        Commands::Backup(cmd) => {
            let scenario = match &cli.scenario {
                Some(name) => settings.scenario(name)?.clone(),
                None => settings.active()?.clone(),
            };
            let ctx = AppContext {
                paths,
                settings,
                scenario,
                user: current_user_name(),
                logger: Arc::clone(&logger),
            };

            logger.session("ProfileCopy", "started");
            let result = handle_backup_command(&ctx, cmd);
            logger.session("ProfileCopy", "finished");

            if let Err(e) = result {
                if e.is_cancelled() {
                    eprintln!("Operation cancelled.");
                    std::process::exit(130);
                }
                return Err(e.into());
            }
        }

        Commands::Scenarios => {
            let active = cli
                .scenario
                .clone()
                .unwrap_or_else(|| settings.active_scenario.clone());
            println!("Scenarios");
            println!("=========");
            print!("{}", format_scenario_list(&settings.scenarios, &active));
        }

        Commands::Config => {
            println!("profilecopy Configuration");
            println!("=========================");
            println!("Config file:   {}", paths.config_file().display());
            println!(
                "               ({})",
                if paths.config_file().exists() {
                    "loaded"
                } else {
                    "not found, using defaults"
                }
            );
            println!("Log file:      {}", logger.path().display());
            println!("User name:     {}", current_user_name());
            println!();
            println!("Settings:");
            println!("  Active scenario:  {}", settings.active_scenario);
            println!("  Kill delay:       {} ms", settings.process_kill_delay_ms);
            println!("  Kill warning:     {}", settings.show_kill_warning);
            println!("  Show all backups: {}", settings.show_all_backups);
            println!("  Debug mode:       {}", settings.debug_mode);
            println!("  Log level:        {}", level);
            println!("  Log retention:    {} days", settings.log_retention_days);
            println!();

            let selected = match &cli.scenario {
                Some(name) => settings.scenario(name),
                None => settings.active(),
            };
            match selected {
                Ok(scenario) => {
                    print!("{}", format_scenario_details(scenario));
                    println!(
                        "  User folder:    {}",
                        scenario.target_share.join(current_user_name()).display()
                    );
                }
                Err(e) => println!("  {}", e),
            }
        }

        Commands::Log { tail } => {
            let entries = logger.read_recent(tail)?;
            println!("{}", format_log_entries(&entries));
        }
    }

    Ok(())
}
