mod analysis;
mod commands;
mod config;
mod devices;
mod plot;
mod storage;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt;

use commands::CommandError;
use config::LoggerConfig;
use plot::Period;

/// Arduino temperature/humidity logger
#[derive(Parser, Debug)]
#[command(name = "climate-logger", version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the daily CSV files (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available serial ports
    Ports,
    /// Request readings from the board and append them to the daily files
    Fetch {
        /// Serial port, e.g. /dev/ttyACM0 or COM3
        port: String,
    },
    /// Show the dates that already have data
    Dates,
    /// Draw temperature and humidity for a period (Dzień, Tydzień, Miesiąc, Rok)
    Plot {
        period: Period,
        /// Chart file; .svg for vector output, PNG otherwise
        #[arg(short, long, default_value = "wykres.png")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match LoggerConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", CommandError::from(e).user_message());
            return ExitCode::FAILURE;
        }
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let _guard = match setup_logging(&config.log_dir()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Nie można utworzyć katalogu logów: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Starting application, data directory {}", config.data_dir.display());
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {}", path.display());
    }

    match run(&config, cli.command) {
        Ok(()) => {
            info!("Application shutting down");
            ExitCode::SUCCESS
        }
        Err(e) if e.is_no_data() => {
            info!("{}", e);
            println!("{}", e.user_message());
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

fn run(config: &LoggerConfig, command: Command) -> commands::Result<()> {
    match command {
        Command::Ports => {
            let ports = commands::ports()?;
            if ports.is_empty() {
                println!("Nie znaleziono portów szeregowych.");
            }
            for port in ports {
                println!("{}\t{}", port.name, port.description);
            }
        }
        Command::Fetch { port } => {
            let summary = commands::fetch(config, &port)?;
            if summary.files.is_empty() {
                println!("Nie odebrano żadnych danych.");
            } else {
                for file in &summary.files {
                    println!("{}: {} nowych wierszy ({})", file.date, file.rows, file.path.display());
                }
                println!("Dane zostały pobrane i zapisane.");
            }
        }
        Command::Dates => {
            let dates = commands::dates(config)?;
            if dates.is_empty() {
                println!("Brak zapisanych danych.");
            } else {
                println!("Dostępne dane dla dni:");
                for date in dates {
                    println!("  {}", date.format("%Y-%m-%d"));
                }
            }
        }
        Command::Plot { period, output } => {
            let now = chrono::Local::now().naive_local();
            let chart = commands::plot(config, period, &output, now)?;
            println!(
                "Wykres dla okresu {} zapisano w {} ({} punktów z {} plików).",
                period,
                chart.path.display(),
                chart.points,
                chart.files
            );
        }
    }
    Ok(())
}

fn setup_logging(log_dir: &Path) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    // Daily rotated file; the guard flushes it when main returns
    let file_appender = rolling::daily(log_dir, "app.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    fmt()
        .with_writer(non_blocking)
        .with_ansi(false) // Disable ANSI colors in log files
        .with_level(true)
        .init();

    Ok(guard)
}
