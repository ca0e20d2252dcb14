mod app;
mod cli;
mod config;
mod dispatch;
mod docker;
mod error;
mod input;
mod message;
mod model;
mod presentation;
mod ui;
mod viewport;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use cli::CliArgs;
use config::Settings;
use crossterm::event::{
    Event, EventStream, KeyEventKind, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    supports_keyboard_enhancement,
};
use dispatch::{Dispatcher, ResourceClient};
use docker::DockerGateway;
use error::ClientError;
use futures::StreamExt;
use message::{Command, Message};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;
const ANIMATION_INTERVAL: Duration = Duration::from_millis(120);

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter, args.log_file.as_deref())?;

    let settings = Settings::load(&args)?;
    info!(
        "starting wharf config={:?} refresh={:?}",
        settings.source, settings.refresh_interval
    );

    let gateway: Arc<dyn ResourceClient> = Arc::new(DockerGateway::new(
        settings.docker_bin.clone(),
        settings.docker_host.clone(),
    ));

    let mut app = App::new(settings.refresh_interval, settings.log_tail);
    match ping(gateway.as_ref(), settings.deadlines.short).await {
        Ok(version) => app.set_engine_version(version),
        Err(error) => {
            warn!("docker engine unreachable: {error}");
            app.set_fatal(error.to_string());
        }
    }

    run(&mut app, gateway, &settings).await?;

    if let Some(error) = app.fatal() {
        return Err(anyhow::anyhow!("docker engine unreachable: {error}"));
    }
    Ok(())
}

fn init_tracing(level_filter: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(io::sink).try_init();
        }
    }

    Ok(())
}

async fn ping(client: &dyn ResourceClient, limit: Duration) -> Result<String, ClientError> {
    match timeout(limit, client.ping()).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::TimedOut(limit)),
    }
}

async fn run(app: &mut App, client: Arc<dyn ResourceClient>, settings: &Settings) -> Result<()> {
    let (mut terminal, keyboard_enhanced) = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, client, settings).await;
    let restore_result = restore_terminal(&mut terminal, keyboard_enhanced);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{}\nterminal restore error: {}",
            compact_error(&run_error),
            compact_error(&restore_error)
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<(TuiTerminal, bool)> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    let keyboard_enhanced = matches!(supports_keyboard_enhancement(), Ok(true));
    if keyboard_enhanced {
        execute!(
            stdout,
            EnterAlternateScreen,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )
        .context("failed to enter alternate screen with keyboard enhancement")?;
    } else {
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok((terminal, keyboard_enhanced))
}

fn restore_terminal(terminal: &mut TuiTerminal, keyboard_enhanced: bool) -> Result<()> {
    if keyboard_enhanced {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)
            .context("failed to pop keyboard enhancement flags")?;
    }
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    client: Arc<dyn ResourceClient>,
    settings: &Settings,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let dispatcher = Dispatcher::new(client, settings.deadlines, tx);
    let mut reader = EventStream::new();
    let mut animation = interval(ANIMATION_INTERVAL);
    animation.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let (width, height) = crossterm::terminal::size().context("failed to read terminal size")?;
    app.update(Message::Resize { width, height });
    if app.fatal().is_none() {
        let commands = app.init();
        dispatch_all(terminal, app, &dispatcher, commands).await?;
    }

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        let message = tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => Message::Key(key),
                    Some(Ok(Event::Resize(width, height))) => Message::Resize { width, height },
                    Some(Ok(_)) => continue,
                    Some(Err(error)) => {
                        app.set_status(format!("Error: terminal event error: {error}"));
                        continue;
                    }
                    None => {
                        warn!("terminal event stream closed");
                        break;
                    }
                }
            }
            maybe_message = rx.recv() => {
                match maybe_message {
                    Some(message) => message,
                    None => break,
                }
            }
            _ = animation.tick() => Message::AnimationTick,
        };

        let commands = app.update(message);
        dispatch_all(terminal, app, &dispatcher, commands).await?;
    }

    Ok(())
}

/// Spawns background commands. Consoles take over the terminal, so they run
/// inline and their result is fed straight back into the update loop.
async fn dispatch_all(
    terminal: &mut TuiTerminal,
    app: &mut App,
    dispatcher: &Dispatcher,
    commands: Vec<Command>,
) -> Result<()> {
    let mut queue = commands;
    while !queue.is_empty() {
        let mut follow_up = Vec::new();
        for command in queue {
            if matches!(command, Command::Console { .. }) {
                terminal
                    .draw(|frame| ui::render(frame, app))
                    .context("failed to render terminal frame")?;
                suspend_terminal_for_subprocess(terminal)?;
                let message = dispatch::execute(
                    dispatcher.client().as_ref(),
                    dispatcher.deadlines(),
                    command,
                )
                .await;
                resume_terminal_after_subprocess(terminal)?;
                debug!("console session finished");
                follow_up.extend(app.update(message));
            } else {
                dispatcher.spawn(command);
            }
        }
        queue = follow_up;
    }
    Ok(())
}

fn suspend_terminal_for_subprocess(terminal: &mut TuiTerminal) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode for subprocess")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen for subprocess")?;
    terminal
        .show_cursor()
        .context("failed to show cursor for subprocess")?;
    Ok(())
}

fn resume_terminal_after_subprocess(terminal: &mut TuiTerminal) -> Result<()> {
    enable_raw_mode().context("failed to re-enable raw mode after subprocess")?;
    execute!(terminal.backend_mut(), EnterAlternateScreen)
        .context("failed to re-enter alternate screen after subprocess")?;
    terminal
        .clear()
        .context("failed to clear terminal after subprocess")?;
    Ok(())
}

fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(format!("caused by: {cause}"));
        } else {
            break;
        }
    }

    out.join("\n")
}
