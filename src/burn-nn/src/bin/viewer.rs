use clap::Parser;
use color_eyre::{Result, eyre::WrapErr};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use learning_curves::viewer::app::Viewer;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{fs::File, io, path::PathBuf};

const LOG_FILE: &str = "curve-viewer.log";

#[derive(Parser, Debug)]
#[command(about = "Plot learning curves from CSV training logs")]
struct Args {
    /// CSV logs to load at startup
    paths: Vec<PathBuf>,
}

fn init_logging() -> Result<()> {
    let file = File::create(LOG_FILE).wrap_err_with(|| format!("failed to create {LOG_FILE}"))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_logging()?;

    let mut viewer = Viewer::new();
    if !args.paths.is_empty() {
        viewer.load_logs(&args.paths);
    }

    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let result = viewer.run(&mut terminal);
    restore_terminal()?;
    terminal.show_cursor()?;
    result
}
