//! Escape CLI
//!
//! Usage:
//!   escape                                  # Autopilot run with the default config
//!   escape --simulate --fps 30 --seed 7     # Autopilot run, fixed frame rate and seed
//!   escape --interactive                    # Drive a session by hand from stdin
//!   escape --serve                          # HTTP + WebSocket API server
//!   escape --simulate --json                # Events as JSON lines

use clap::Parser;
use colored::Colorize;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

use escape_core::core::{run_server, Autopilot, Session};
use escape_core::types::{GameConfig, GameEvent, Input, Key, Phase, Point, SessionSnapshot, TrackingSample};
use escape_core::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "escape",
    version = VERSION,
    about = "Escape the machine - webcam-driven phase run",
    long_about = "Runs the escape core without a browser.\n\n\
                  Modes:\n  \
                  --simulate     Autopilot plays a full run on a fake clock\n  \
                  --interactive  Type commands to feed gaze, hand and keys\n  \
                  --serve        HTTP API server mode\n\n\
                  Phases:\n  \
                  TRAPPED   - Hold your gaze until the signal locks\n  \
                  ANXIOUS   - Hit the lock zone three times\n  \
                  WORK      - Carry blocks past the firewall\n  \
                  BREAKING  - Mash Space to break through\n  \
                  AWAKENED  - Out\n  \
                  FAILED    - Presence lost; retry"
)]
struct Args {
    /// Autopilot run (default when no mode is given)
    #[arg(long)]
    simulate: bool,

    /// Interactive mode - read commands from stdin
    #[arg(short, long)]
    interactive: bool,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: 127.0.0.1:3000)
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// JSON config file
    #[arg(short, long)]
    config: Option<String>,

    /// Seed for zone placement
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated frame rate
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Longest simulated run (seconds)
    #[arg(long, default_value_t = 180.0)]
    max_secs: f64,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Debug logging and every event
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);
    if args.no_color {
        colored::control::set_override(false);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(2);
        }
    };

    if args.serve {
        run_serve(&args, config).await;
    } else if args.interactive {
        run_interactive(&args, config);
    } else {
        run_simulate(&args, config);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "escape_core=debug,escape=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_config(args: &Args) -> Result<GameConfig, escape_core::core::ConfigError> {
    let mut config = match &args.config {
        Some(path) => GameConfig::from_json_file(path)?,
        None => GameConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;
    Ok(config)
}

/// Autopilot plays a whole run on a fake clock
fn run_simulate(args: &Args, config: GameConfig) {
    let mut session = match Session::new(config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Session error: {}", e);
            std::process::exit(2);
        }
    };
    let fps = if args.fps.is_finite() && args.fps > 0.0 { args.fps } else { 60.0 };
    let dt_ms = 1000.0 / fps;
    let limit_ms = args.max_secs.max(0.0) * 1000.0;
    let mut pilot = Autopilot::new().with_final_message("I was here.");

    if !args.json {
        print_header("Simulation");
        print_snapshot(&session.snapshot());
    }

    while session.clock_ms() < limit_ms {
        pilot.step(&mut session, dt_ms);
        for event in session.drain_events() {
            report_event(&event, &session, args);
        }
        if session.snapshot().final_message.is_some() {
            break;
        }
    }

    let snapshot = session.snapshot();
    if args.json {
        match serde_json::to_string(&snapshot) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Snapshot error: {}", e),
        }
    } else {
        println!();
        print_snapshot(&snapshot);
        if snapshot.run_ended {
            println!("{}", "Run complete.".green().bold());
        } else {
            println!("{}", format!("Run did not finish within {:.0}s.", args.max_secs).yellow());
        }
    }
}

fn report_event(event: &GameEvent, session: &Session, args: &Args) {
    if args.json {
        match serde_json::to_string(event) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Event error: {}", e),
        }
        return;
    }
    match event {
        GameEvent::PhaseChanged { from, to, retry } => {
            let label = format!("{} {} -> {}", to.glyph(), from, to).color(to.color()).bold();
            let retry = if *retry { " (retry)" } else { "" };
            println!("{}{}", label, retry.dimmed());
            print_snapshot(&session.snapshot());
        }
        GameEvent::RunEnded | GameEvent::FinalMessage { .. } | GameEvent::LockCompleted
        | GameEvent::FirewallBreached | GameEvent::PresenceExpired => {
            println!("  {}", event.to_string().bold());
        }
        _ if args.verbose => println!("  {}", event.to_string().dimmed()),
        _ => {}
    }
}

/// Drive a session by hand, one command per line
fn run_interactive(args: &Args, config: GameConfig) {
    let mut session = match Session::new(config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Session error: {}", e);
            std::process::exit(2);
        }
    };
    let dt_ms = 1000.0 / if args.fps > 0.0 { args.fps } else { 60.0 };

    print_header("Interactive");
    println!("Commands:");
    println!("  center | off | lost        set the gaze sample");
    println!("  hand X Y | nohand          set the hand sample");
    println!("  tick [MS]                  advance (default one frame)");
    println!("  key K | click              press a key or the pointer");
    println!("  retry | restart | end      session controls");
    println!("  final TEXT                 submit the closing message");
    println!("  quit");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut gaze = TrackingSample::absent();
    let mut hand = TrackingSample::absent();

    loop {
        let phase = session.phase();
        print!("{} ", format!("[{}]", phase).color(phase.color()));
        if stdout.flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim();
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));

        match cmd {
            "" => continue,
            "quit" | "exit" => break,
            "center" => gaze = TrackingSample::face(Point::CENTER, true),
            "off" => gaze = TrackingSample::face(Point::new(0.9, 0.5), false),
            "lost" => gaze = TrackingSample::absent(),
            "hand" => {
                let coords: Vec<f64> = rest.split_whitespace().filter_map(|s| s.parse().ok()).collect();
                match coords.as_slice() {
                    [x, y] => hand = TrackingSample::hand(Point::new(*x, *y)),
                    _ => println!("usage: hand X Y"),
                }
            }
            "nohand" => hand = TrackingSample::absent(),
            "tick" => {
                let total: f64 = rest.trim().parse().unwrap_or(dt_ms);
                let mut left = total.max(0.0);
                while left > 0.0 {
                    let step = left.min(dt_ms);
                    session.push_gaze(gaze);
                    session.push_hand(hand);
                    session.advance(step);
                    left -= step;
                }
            }
            "key" => match rest.trim().parse::<Key>() {
                Ok(key) => session.input(Input::Key { key }),
                Err(e) => println!("{}", e),
            },
            "click" => session.input(Input::Pointer),
            "retry" => {
                if !session.retry() {
                    println!("retry is only possible after a failure");
                }
            }
            "restart" => {
                session.restart();
            }
            "end" => {
                if !session.cinematic_ended() {
                    println!("the run can only end once AWAKENED");
                }
            }
            "final" => {
                if let Err(e) = session.submit_final_message(rest) {
                    println!("{}", e.to_string().red());
                }
            }
            other => println!("unknown command: {}", other),
        }

        for event in session.drain_events() {
            report_event(&event, &session, args);
        }
        if !args.json {
            println!("{}", session.snapshot().to_parseable_string().dimmed());
        }
    }
}

fn print_header(mode: &str) {
    println!("{}", "========================================".bold());
    println!("{}", format!("  Escape v{} - {}", VERSION, mode).bold());
    println!("{}", "========================================".bold());
    println!();
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    let phase: Phase = snapshot.phase;
    println!("{}", snapshot.to_parseable_string().color(phase.color()));
}

/// Run HTTP API server
async fn run_serve(args: &Args, config: GameConfig) {
    print_header("API Server");
    if let Err(e) = run_server(&args.addr, config).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
