//! af - autoflow CLI
//!
//! Record pointer and keyboard input, then replay it faster, slower or in a
//! loop. Real capture needs a build with `--features native`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use autoflow::core::{CaptureStream, InputInjector, InputSource, RawInput, Subscription};
use autoflow::platform;
use autoflow::prelude::*;
use autoflow::Error;

#[derive(Parser)]
#[command(name = "af")]
#[command(about = "autoflow - record and replay pointer and keyboard macros")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Print notifications and results as JSON lines
    #[arg(long, global = true)]
    json: bool,
    #[command(flatten)]
    playback: PlaybackArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PlaybackArgs {
    /// Playback speed, 0.5 to 2.0
    #[arg(short, long, global = true)]
    speed: Option<f64>,
    /// Repeat until stopped
    #[arg(long = "loop", global = true)]
    looping: bool,
    /// Repeat this many times (implies --loop, 0 = until stopped)
    #[arg(long, global = true)]
    loops: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive console; hotkeys work too when capture is available
    Run,
    /// Record for a while, then play it back (Ctrl+C stops either phase)
    Record {
        #[arg(long, default_value = "5")]
        seconds: f64,
        /// Countdown before playback starts
        #[arg(long, default_value = "2")]
        delay: f64,
    },
    /// Print the effective configuration
    Config,
    /// Show which input backend this build uses
    Backend,
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Error>,
}

impl<T: Serialize> Output<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
    fn err(e: Error) -> Output<()> {
        Output {
            success: false,
            data: None,
            error: Some(e),
        }
    }
}

fn print_json<T: Serialize>(output: &T) {
    match serde_json::to_string(output) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!(error = %e, "could not serialize output"),
    }
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json = cli.json;
    let result = load_config(&cli).and_then(|config| match cli.command {
        Commands::Run => run(config, json),
        Commands::Record { seconds, delay } => record(config, seconds, delay, json),
        Commands::Config => show_config(&config, json),
        Commands::Backend => backend(json),
    });

    if let Err(e) = result {
        report_error(&e, json);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn report_error(e: &anyhow::Error, json: bool) {
    match e.downcast_ref::<Error>() {
        Some(err) if json => print_json(&Output::<()>::err(err.clone())),
        Some(err) => {
            eprintln!("Error: {:#}", e);
            for s in &err.suggestions {
                eprintln!("  hint: {}", s);
            }
        }
        None => eprintln!("Error: {:#}", e),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    let args = &cli.playback;
    if let Some(speed) = args.speed {
        let clamped = autoflow::recorder::replay::clamp_speed(speed);
        if clamped != speed {
            warn!(requested = speed, used = clamped, "speed out of range, clamped");
        }
        config.playback.speed = clamped;
    }
    if args.looping {
        config.playback.loop_enabled = true;
        config.playback.loop_count = 0;
    }
    if let Some(n) = args.loops {
        config.playback.loop_enabled = true;
        config.playback.loop_count = n;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Session plus the thread printing its notifications
struct Console {
    session: Arc<Session>,
    source: Arc<dyn InputSource>,
    printer: thread::JoinHandle<()>,
    shutdown: Sender<()>,
}

impl Console {
    fn new(config: &Config, json: bool) -> Result<Self> {
        let (source, injector) = platform::default_backend();
        Self::with_backend(config, json, source, injector)
    }

    fn with_backend(
        config: &Config,
        json: bool,
        source: Arc<dyn InputSource>,
        injector: Arc<dyn InputInjector>,
    ) -> Result<Self> {
        let (tx, rx) = unbounded();
        let (shutdown, shutdown_rx) = bounded::<()>(1);
        let printer = thread::Builder::new()
            .name("af-notify".to_string())
            .spawn(move || print_notifications(rx, shutdown_rx, json))
            .context("starting notification printer")?;

        let session = Session::new(
            config,
            Arc::clone(&source),
            injector,
            Arc::new(ChannelObserver::new(tx)),
        );
        Ok(Self {
            session: Arc::new(session),
            source,
            printer,
            shutdown,
        })
    }

    /// Stop the session, flush pending notifications and end the printer.
    /// Does not depend on every session handle being gone.
    fn close(self) {
        self.session.stop_all();
        self.session.wait_idle(Duration::from_secs(2));
        drop(self.session);
        drop(self.shutdown);
        let _ = self.printer.join();
    }
}

fn print_notifications(rx: Receiver<Notification>, shutdown: Receiver<()>, json: bool) {
    loop {
        select! {
            recv(rx) -> n => match n {
                Ok(n) => print_notification(&n, json),
                Err(_) => return,
            },
            recv(shutdown) -> _ => {
                for n in rx.try_iter() {
                    print_notification(&n, json);
                }
                return;
            }
        }
    }
}

fn print_notification(n: &Notification, json: bool) {
    if json {
        print_json(n);
        return;
    }
    match n {
        Notification::PlaybackFinished { report } | Notification::PlaybackCancelled { report } => {
            println!(
                "{} ({} passes, {} clicks, {} keys, {} moves, {} scrolls, {} failed)",
                n.status(),
                report.repetitions,
                report.clicks,
                report.keys,
                report.moves,
                report.scrolls,
                report.failures
            );
        }
        _ => println!("{}", n.status()),
    }
}

// ── Interactive console ─────────────────────────────────────────────────────

const HELP: &str = "\
commands:
  record | r          start or stop recording
  play | p            play the last recording
  stop | s            stop recording and playback
  cancel              stop playback only
  + / -               speed up / down
  speed <x>           set speed (0.5 - 2.0)
  loop on|off|<n>     loop until stopped, play once, or n times
  status              show state and settings
  events              list the last recording
  help                this text
  quit | q            exit";

fn run(config: Config, json: bool) -> Result<()> {
    let console = Console::new(&config, json)?;
    let hotkeys = bind_hotkeys(&console, &config.hotkeys);

    if !json {
        match &hotkeys {
            Some(_) => println!(
                "Hotkeys: record {}, play {}, stop {}, faster {}, slower {}",
                config.hotkeys.record,
                config.hotkeys.play,
                config.hotkeys.stop,
                config.hotkeys.speed_up,
                config.hotkeys.speed_down
            ),
            None => println!("Hotkeys unavailable in this build; use the console."),
        }
        println!("{}", HELP);
    }

    let stdin = io::stdin();
    prompt(json)?;
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let word = line.trim();
        match word.to_lowercase().as_str() {
            "" => {}
            "q" | "quit" | "exit" => break,
            "help" | "?" => println!("{}", HELP),
            "status" => print_status(&console.session, json),
            "events" | "list" => print_events(&console.session.events(), json),
            _ => match word.parse::<Command>() {
                Ok(command) => {
                    if let Err(e) = console.session.apply(command) {
                        report_error(&e.into(), json);
                    }
                }
                Err(e) => report_error(&e.into(), json),
            },
        }
        prompt(json)?;
    }

    drop(hotkeys);
    console.close();
    Ok(())
}

fn prompt(json: bool) -> Result<()> {
    if !json {
        print!("> ");
        io::stdout().flush()?;
    }
    Ok(())
}

/// Route hotkey presses into the session. None when capture is unavailable.
fn bind_hotkeys(console: &Console, hotkeys: &HotkeyMap) -> Option<Subscription> {
    let session = Arc::clone(&console.session);
    let hotkeys = hotkeys.clone();
    let callback = Arc::new(move |input: RawInput| {
        if let RawInput::KeyPress(key) = input {
            if let Some(command) = hotkeys.resolve(&key) {
                debug!(%key, ?command, "hotkey");
                if let Err(e) = session.apply(command) {
                    warn!(error = %e, "hotkey command failed");
                }
            }
        }
    });

    match console.source.subscribe(CaptureStream::Keyboard, callback) {
        Ok(sub) => Some(sub),
        Err(e) => {
            info!(reason = %e, "hotkeys disabled");
            None
        }
    }
}

#[derive(Serialize)]
struct Status {
    state: SessionState,
    events: usize,
    speed: f64,
    loop_enabled: bool,
    loop_count: u32,
}

fn print_status(session: &Session, json: bool) {
    let p = session.parameters();
    let status = Status {
        state: session.state(),
        events: session.events().len(),
        speed: p.speed,
        loop_enabled: p.loop_enabled,
        loop_count: p.loop_count,
    };
    if json {
        print_json(&Output::ok(status));
        return;
    }
    let loops = match p.repetitions() {
        Some(1) => "once".to_string(),
        Some(n) => format!("{} times", n),
        None => "until stopped".to_string(),
    };
    println!(
        "State: {}, {} events, speed {:.1}x, {}",
        status.state, status.events, status.speed, loops
    );
}

fn print_events(store: &EventStore, json: bool) {
    if json {
        print_json(&Output::ok(store));
        return;
    }
    if store.is_empty() {
        println!("Nothing recorded.");
        return;
    }
    for (i, e) in store.iter().enumerate() {
        println!("{:>5}  {:>8.3}  {}", i, e.t, e.label());
    }
    println!(
        "Summary: {} clicks, {} moves, {} scrolls, {} keys over {:.2}s",
        store.count(EventKind::Click),
        store.count(EventKind::Move),
        store.count(EventKind::Scroll),
        store.count(EventKind::Key),
        store.duration()
    );
}

// ── One-shot record and replay ──────────────────────────────────────────────

fn record(config: Config, seconds: f64, delay: f64, json: bool) -> Result<()> {
    let seconds = Duration::try_from_secs_f64(seconds).context("--seconds must be a non-negative number")?;
    let delay = Duration::try_from_secs_f64(delay).context("--delay must be a non-negative number")?;

    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("installing Ctrl+C handler")?;

    let console = Console::new(&config, json)?;
    record_and_replay(console, &stop_rx, seconds, delay, json)
}

/// Record for `seconds`, then replay after `delay`. A message on `stop`
/// ends whichever phase is running.
fn record_and_replay(
    console: Console,
    stop: &Receiver<()>,
    seconds: Duration,
    delay: Duration,
    json: bool,
) -> Result<()> {
    if let Err(e) = console.session.start_recording() {
        console.close();
        return Err(e).context("could not start recording");
    }
    if !json {
        println!("Recording for {:.1}s (Ctrl+C to stop early)", seconds.as_secs_f64());
    }
    let interrupted = stop.recv_timeout(seconds).is_ok();
    let store = console.session.stop_recording().unwrap_or_default();

    if interrupted || store.is_empty() {
        if store.is_empty() && !json {
            println!("Nothing recorded.");
        }
        print_events(&store, json);
        console.close();
        return Ok(());
    }

    if !json {
        println!("Starting playback in {:.1}s...", delay.as_secs_f64());
    }
    if stop.recv_timeout(delay).is_ok() {
        console.close();
        return Ok(());
    }

    if console.session.play() {
        while !console.session.wait_idle(Duration::from_millis(100)) {
            if stop.try_recv().is_ok() {
                console.session.stop_playback();
            }
        }
    }
    console.close();
    Ok(())
}

// ── Info ────────────────────────────────────────────────────────────────────

fn show_config(config: &Config, json: bool) -> Result<()> {
    if json {
        print_json(&Output::ok(config));
    } else {
        print!("{}", config.to_toml()?);
    }
    Ok(())
}

fn backend(json: bool) -> Result<()> {
    let native = platform::has_native_input();
    if json {
        print_json(&Output::ok(serde_json::json!({ "native": native })));
        return Ok(());
    }
    if native {
        println!("Input: native (capture and injection through the OS)");
        println!("On macOS grant Accessibility and Input Monitoring to this terminal.");
    } else {
        println!("Input: unavailable (recording fails, playback is only logged)");
        println!("Rebuild with --features native for real capture.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoflow::platform::memory::{ManualSource, MemoryInjector};
    use autoflow::platform::null::{DryRunInjector, NullSource};
    use autoflow::Key;

    /// Run the record flow on its own thread and wait at most `bound` for it
    fn record_within(console: Console, seconds: Duration, bound: Duration) -> Option<bool> {
        let (done_tx, done_rx) = bounded(1);
        thread::spawn(move || {
            let (_stop_tx, stop_rx) = bounded::<()>(1);
            let result = record_and_replay(console, &stop_rx, seconds, Duration::ZERO, true);
            let _ = done_tx.send(result.is_ok());
        });
        done_rx.recv_timeout(bound).ok()
    }

    #[test]
    fn record_without_capture_fails_promptly() {
        let console = Console::with_backend(
            &Config::default(),
            true,
            Arc::new(NullSource),
            Arc::new(DryRunInjector),
        )
        .unwrap();
        let outcome = record_within(console, Duration::from_millis(50), Duration::from_secs(5));
        assert_eq!(outcome, Some(false));
    }

    #[test]
    fn record_then_replay_returns() {
        let source = ManualSource::new();
        let injector = Arc::new(MemoryInjector::new());
        let console = Console::with_backend(
            &Config::default(),
            true,
            Arc::new(source.clone()),
            Arc::clone(&injector) as Arc<dyn InputInjector>,
        )
        .unwrap();

        let typist = thread::spawn(move || {
            while source.subscriber_count() < 2 {
                thread::sleep(Duration::from_millis(1));
            }
            source.emit(RawInput::KeyPress(Key::named("KeyA")));
        });
        let outcome = record_within(console, Duration::from_millis(300), Duration::from_secs(5));
        typist.join().unwrap();

        assert_eq!(outcome, Some(true));
        assert_eq!(injector.len(), 1);
    }

    #[test]
    fn close_ends_the_printer_while_a_session_handle_is_alive() {
        let console = Console::with_backend(
            &Config::default(),
            true,
            Arc::new(ManualSource::new()),
            Arc::new(DryRunInjector),
        )
        .unwrap();
        let held = Arc::clone(&console.session);

        let (done_tx, done_rx) = bounded(1);
        thread::spawn(move || {
            console.close();
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(held.state(), SessionState::Idle);
    }
}
