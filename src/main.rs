use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use f2b_control::app::App;
use f2b_control::config::{AppConfig, ConfigOverrides};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the fail2bancontrol API, e.g. http://127.0.0.1:9000/api
    #[arg(short, long)]
    api_url: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Skip the release check at start-up
    #[arg(long)]
    no_update_check: bool,
}

fn init_logging(debug: bool) {
    let log_level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // The TUI owns the terminal, so logs go to the first writable file.
    let log_paths = ["/tmp/f2b-control.log", "/var/log/f2b-control.log", "./f2b-control.log"];
    let log_file = log_paths
        .iter()
        .find_map(|path| std::fs::OpenOptions::new().create(true).append(true).open(path).ok());

    match log_file {
        Some(file) => {
            env_logger::Builder::from_default_env()
                .filter_level(log_level)
                .target(env_logger::Target::Pipe(Box::new(file)))
                .init();
        },
        None => {
            env_logger::Builder::from_default_env()
                .filter_level(log_level)
                .init();
        },
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let overrides = ConfigOverrides {
        api_url: cli.api_url,
        no_update_check: cli.no_update_check,
    };
    // Config errors are reported before the terminal is taken over.
    let config = match AppConfig::load(cli.config.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            eprintln!("✗ {}", e);
            std::process::exit(2);
        },
    };
    log::info!("Starting f2b-control v{} against {}", env!("CARGO_PKG_VERSION"), config.api_url);

    let app = App::new(&config)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        eprintln!("Application error: {}", err);
        std::process::exit(1);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, mut app: App) -> Result<()> {
    loop {
        terminal.draw(|f| app.render(f))?;

        if app.handle_events()? {
            break;
        }
    }

    log::info!("Shutting down");
    Ok(())
}
