pub mod app;
pub mod config;
pub mod search;
pub mod ui;

#[cfg(test)]
mod test_support;

use crate::app::redis_client::{Connector, RedisConnector};
use crate::app::{perform, update, App, AppOptions, Command, Message};
use crate::config::{Config, ConnectionOverrides};
use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

type Tui = Terminal<CrosstermBackend<Stdout>>;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const TICK_RATE: Duration = Duration::from_secs(1);
const CLOCK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A terminal browser for Redis-compatible key-value stores
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Connection profile to use (defaults to the first one)
    #[arg(long, value_name = "PROFILE")]
    profile: Option<String>,

    /// Server address; repeat for sentinels or cluster seeds
    #[arg(long = "addr", value_name = "HOST:PORT")]
    addrs: Vec<String>,

    /// Database index
    #[arg(long)]
    db: Option<u32>,

    #[arg(long)]
    username: Option<String>,

    #[arg(long)]
    password: Option<String>,

    /// Sentinel master name; implies sentinel mode
    #[arg(long, value_name = "NAME")]
    master_name: Option<String>,

    /// Keys requested per SCAN page
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Stop counting keys after this many
    #[arg(long, value_name = "N")]
    count_cap: Option<usize>,

    /// Log file (defaults to the cache directory)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

impl CliArgs {
    fn overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            addrs: self.addrs.clone(),
            db: self.db,
            username: self.username.clone(),
            password: self.password.clone(),
            master_name: self.master_name.clone(),
        }
    }

    fn options(&self, config: &Config) -> AppOptions {
        AppOptions {
            scan_page_size: self
                .limit
                .filter(|n| *n > 0)
                .unwrap_or(config.scan_page_size),
            count_cap: self.count_cap.filter(|n| *n > 0).unwrap_or(config.count_cap),
            stats_sample_size: config.stats_sample_size,
            editor: config.editor.clone(),
        }
    }
}

fn default_log_path() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|base_dirs| base_dirs.cache_dir().join("keyglass").join("keyglass.log"))
}

fn init_logging(path: &Path, verbose: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    WriteLogger::init(level, log_config, file).context("installing logger")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    if let Some(log_path) = args.log_file.clone().or_else(default_log_path) {
        if let Err(e) = init_logging(&log_path, args.verbose) {
            eprintln!("Logging disabled: {:#}", e);
        }
    }

    let app_config = Config::load(args.config.as_deref());
    let profile = app_config.select_profile(args.profile.as_deref())?;
    let settings = profile.resolve(&args.overrides());
    let options = args.options(&app_config);
    log::info!(
        "Starting with profile '{}', page size {}, count cap {}",
        profile.name,
        options.scan_page_size,
        options.count_cap
    );

    let connector: Arc<dyn Connector> = Arc::new(RedisConnector);
    let store = connector
        .connect(&settings)
        .await
        .with_context(|| format!("could not connect to {}", settings.describe()))?;

    let app = App::new(store, settings, options);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app, connector).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        log::error!("Exited with error: {:#}", err);
    }
    res
}

/// Commands waiting to run. Display batches are held back to the next frame
/// so a long result reaches the screen in chunks and input is read between
/// them.
#[derive(Default)]
struct CommandQueue {
    ready: VecDeque<Command>,
    next_frame: VecDeque<Command>,
}

impl CommandQueue {
    fn push_all(&mut self, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::NextBatch => self.next_frame.push_back(command),
                other => self.ready.push_back(other),
            }
        }
    }

    fn pop_ready(&mut self) -> Option<Command> {
        self.ready.pop_front()
    }

    fn has_deferred(&self) -> bool {
        !self.next_frame.is_empty()
    }

    /// Called once per frame, after drawing and polling input.
    fn release_frame(&mut self) {
        self.ready.append(&mut self.next_frame);
    }
}

async fn run_app(terminal: &mut Tui, mut app: App, connector: Arc<dyn Connector>) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let mut queue = CommandQueue::default();
    queue.push_all(app.start());
    let mut last_tick: Option<Instant> = None;

    loop {
        while let Some(command) = queue.pop_ready() {
            match command {
                Command::NextBatch => queue.push_all(update(&mut app, Message::NextBatch)),
                Command::OpenEditor { path } => {
                    suspend_terminal(terminal)?;
                    let finished =
                        perform(Command::OpenEditor { path }, app.task_context(&connector)).await;
                    resume_terminal(terminal)?;
                    if let Some(message) = finished {
                        queue.push_all(update(&mut app, message));
                    }
                }
                command => {
                    let ctx = app.task_context(&connector);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Some(message) = perform(command, ctx).await {
                            // The receiver only goes away when the app is quitting.
                            let _ = tx.send(message);
                        }
                    });
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }

        if last_tick.map_or(true, |t| t.elapsed() >= TICK_RATE) {
            last_tick = Some(Instant::now());
            let now = chrono::Local::now().format(CLOCK_FORMAT).to_string();
            queue.push_all(update(&mut app, Message::Tick(now)));
        }

        terminal.draw(|f| ui::ui(f, &app))?;

        // Pending batches only wait for a frame, not for the poll interval.
        let timeout = if queue.has_deferred() {
            Duration::ZERO
        } else {
            POLL_INTERVAL
        };
        if event::poll(timeout)? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    queue.push_all(update(&mut app, Message::Key(key)));
                }
            }
        }

        while let Ok(message) = rx.try_recv() {
            queue.push_all(update(&mut app, message));
        }

        queue.release_frame();
    }
}

/// Hands the terminal to a child process.
fn suspend_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn resume_terminal(terminal: &mut Tui) -> Result<()> {
    enable_raw_mode()?;
    execute!(terminal.backend_mut(), EnterAlternateScreen, EnableMouseCapture)?;
    terminal.clear()?;
    Ok(())
}
