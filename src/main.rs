use anyhow::{anyhow, Context};
use auratrace::{
    app::App,
    app_dirs::AppDirs,
    clock::{Clock, SystemClock},
    config::{clamp_speed, Config, ConfigStore, FileConfigStore},
    random::ThreadRandom,
    runtime::{AuraEvent, CrosstermEventSource, FixedTicker, Runner, TICK_RATE_MS},
    sampler::Surface,
    store::{KeyValueStore, SessionStore, SessionSummary, SqliteKeyValueStore},
    studio::{download_file_name, Studio},
    trace::SessionId,
    ui,
};
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    fs,
    io::{self, stdin, Write},
    path::{Path, PathBuf},
};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_ENV: &str = "AURATRACE_LOG";

/// trace migraine auras with the mouse and replay them over time
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Trace the shape of a migraine aura in the terminal, keep every trace as a session, and replay sessions at any speed."
)]
pub struct Cli {
    /// initial playback speed (0.5 to 10)
    #[clap(long)]
    speed: Option<f64>,

    /// session database to use instead of the default state directory
    #[clap(long)]
    db: Option<PathBuf>,

    /// where exported sessions are written
    #[clap(long)]
    export_dir: Option<PathBuf>,

    /// load the most recent stored session at startup
    #[clap(long)]
    restore: bool,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// list stored sessions, most recent first
    List {
        /// write CSV instead of a table
        #[clap(long)]
        csv: bool,
    },
    /// write a stored session to a JSON file
    Export {
        /// session id, either `session_<millis>` or just the millis
        id: SessionId,
        /// output directory
        #[clap(long)]
        out: Option<PathBuf>,
    },
    /// store a session from a JSON file under a new id
    Import { file: PathBuf },
    /// remove a stored session
    Delete { id: SessionId },
}

fn init_tracing() -> Option<WorkerGuard> {
    let dir = AppDirs::log_dir()?;
    fs::create_dir_all(&dir).ok()?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        dir,
        "auratrace.log",
    ));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Some(guard)
}

fn resolve_config(cli: &Cli) -> Config {
    let mut config = FileConfigStore::new().load();
    if let Some(speed) = cli.speed {
        config.default_speed = clamp_speed(speed);
    }
    if cli.restore {
        config.restore_last_session = true;
    }
    config
}

fn open_store(cli: &Cli) -> anyhow::Result<SessionStore<SqliteKeyValueStore>> {
    let path = cli
        .db
        .clone()
        .or_else(AppDirs::db_path)
        .ok_or_else(|| anyhow!("could not determine where to keep the session database"))?;
    let kv = SqliteKeyValueStore::open(&path)
        .with_context(|| format!("opening session database {}", path.display()))?;
    Ok(SessionStore::new(kv))
}

fn write_sessions_table<W: Write>(out: &mut W, sessions: &[SessionSummary]) -> io::Result<()> {
    if sessions.is_empty() {
        return writeln!(out, "No saved sessions");
    }
    writeln!(
        out,
        "{:>3}  {:<20} {:<19} {:>8} {:>6}  {}",
        "#", "id", "started", "duration", "auras", "avg length"
    )?;
    for s in sessions {
        let started = s
            .started_at_local()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        writeln!(
            out,
            "{:>3}  {:<20} {:<19} {:>8} {:>6}  {:.2} points",
            s.rank,
            s.id,
            started,
            auratrace::util::format_duration(s.duration_ms),
            s.pattern_count,
            s.avg_pattern_len
        )?;
    }
    Ok(())
}

fn write_sessions_csv<W: Write>(out: W, sessions: &[SessionSummary]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for s in sessions {
        writer.serialize(s)?;
    }
    writer.flush()?;
    Ok(())
}

fn run_command<S: KeyValueStore>(
    command: Command,
    store: &mut SessionStore<S>,
    export_dir: &Path,
    now: i64,
) -> anyhow::Result<()> {
    match command {
        Command::List { csv } => {
            let sessions = store.list()?;
            if csv {
                write_sessions_csv(io::stdout().lock(), &sessions)?;
            } else {
                write_sessions_table(&mut io::stdout().lock(), &sessions)?;
            }
        }
        Command::Export { id, out } => {
            let bytes = store.raw_record(&id)?;
            let dir = out.unwrap_or_else(|| export_dir.to_path_buf());
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating export directory {}", dir.display()))?;
            let path = dir.join(download_file_name(&id));
            fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
            info!(id = %id, path = %path.display(), "session exported");
            println!("{}", path.display());
        }
        Command::Import { file } => {
            let bytes = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let session = store
                .import_from_bytes(&bytes, now)
                .with_context(|| format!("importing {}", file.display()))?;
            store.save(&session)?;
            info!(id = %session.id, "session imported");
            println!("{} ({} auras)", session.id, session.patterns.len());
        }
        Command::Delete { id } => {
            if !store.delete(&id)? {
                return Err(anyhow!("session {id} not found"));
            }
            info!(id = %id, "session deleted");
            println!("deleted {id}");
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing();

    let clock = SystemClock;
    let config = resolve_config(&cli);
    let mut store = open_store(&cli)?;
    let export_dir = cli.export_dir.clone().unwrap_or_else(AppDirs::export_dir);

    if let Some(command) = cli.command.clone() {
        return run_command(command, &mut store, &export_dir, clock.now_ms());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut studio = Studio::new(store, &config, Surface::default(), Box::new(ThreadRandom));
    if config.restore_last_session {
        studio.restore_last_session(clock.now_ms());
    }
    let mut app = App::new(studio, export_dir, clock.now_ms());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &clock);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, S: KeyValueStore, C: Clock>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
    clock: &C,
) -> anyhow::Result<()> {
    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());
    let mut last_tick = clock.now_ms();

    terminal.draw(|f| ui::draw(app, f))?;
    while !app.should_quit {
        let event = runner.step();
        let now = clock.now_ms();
        let is_tick = matches!(event, AuraEvent::Tick);

        let mut redraw = app.handle(event, now);
        // a steady stream of drag events must not starve playback
        if !is_tick && now - last_tick >= TICK_RATE_MS as i64 {
            redraw |= app.handle(AuraEvent::Tick, now);
        }
        if is_tick || now - last_tick >= TICK_RATE_MS as i64 {
            last_tick = now;
        }

        if redraw {
            terminal.draw(|f| ui::draw(app, f))?;
        }
    }
    Ok(())
}
