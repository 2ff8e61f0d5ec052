//! REPL – Read-Eval-Print Loop for the sensorlink shell.
//!
//! Supported slash-commands:
//!   /help                          – show this list
//!   /connect [host[:port]]         – open the emulator link
//!   /disconnect                    – close it
//!   /status                        – link state and active settings
//!   /compass <deg> [calibration]   – set the compass heading
//!   /accel <motion> | custom <file> – put the accelerometer in a motion
//!   /replay <file>                 – stream recorded m/s² samples
//!   /settings                      – edit `~/.sensorlink/config.toml`
//!   /quit | /exit                  – close the link and exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sensorlink_feed::{
    heading_from_reading, parse_accel_file, parse_replay_file, raw_frames, MotionPreset,
    OrientationReading, ScreenOrientation,
};
use sensorlink_transport::EmulatorAddr;
use sensorlink_types::{CalibrationState, ConnectionState, Heading, LinkError};
use sensorlink_wire::compass_frame;

use crate::config::{self, Config};
use crate::session::{self, Session};

// ─────────────────────────────────────────────────────────────────────────────
// Command parsing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum AccelSource {
    Preset(MotionPreset),
    Custom(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Connect(Option<EmulatorTarget>),
    Disconnect,
    Status,
    Compass {
        heading: f64,
        calibration: CalibrationState,
    },
    Accel(AccelSource),
    Replay(PathBuf),
    Settings,
    Quit,
}

/// `/connect` argument: a host with an optional port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorTarget {
    pub host: String,
    pub port: Option<u16>,
}

impl EmulatorTarget {
    fn resolve(&self, cfg: &Config) -> EmulatorAddr {
        EmulatorAddr::new(self.host.clone(), self.port.unwrap_or(cfg.emulator_port))
    }
}

/// `host`, `host:port`, `[v6]` or `[v6]:port`. IPv6 hosts must be bracketed
/// and keep their brackets so they drop straight into the URL.
fn parse_target(raw: &str) -> Result<EmulatorTarget, String> {
    let (host, port) = if let Some(rest) = raw.strip_prefix('[') {
        let Some((inner, after)) = rest.split_once(']') else {
            return Err(format!("'{raw}' is missing a closing ']'"));
        };
        if inner.is_empty() {
            return Err(format!("'{raw}' has no host"));
        }
        let port = match after {
            "" => None,
            _ => match after.strip_prefix(':') {
                Some(p) => Some(p),
                None => return Err(format!("unexpected '{after}' after '[{inner}]'")),
            },
        };
        (&raw[..inner.len() + 2], port)
    } else {
        match raw.split_once(':') {
            Some((_, rest)) if rest.contains(':') => {
                return Err(format!("IPv6 host '{raw}' must be written as [addr]:port"));
            }
            Some(("", _)) => return Err(format!("'{raw}' has no host")),
            Some((host, port)) => (host, Some(port)),
            None => (raw, None),
        }
    };
    let port = port
        .map(|p| {
            p.parse::<u16>()
                .map_err(|_| format!("'{p}' is not a valid port number"))
        })
        .transpose()?;
    Ok(EmulatorTarget {
        host: host.to_string(),
        port,
    })
}

/// Headings are whole-circle degrees, `0 <= deg < 360`.
fn parse_heading(raw: &str) -> Result<f64, String> {
    let deg: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if !(0.0..360.0).contains(&deg) {
        return Err(format!("heading {raw} is outside 0–359"));
    }
    Ok(deg)
}

/// Parse one input line. `Err` carries a message for the user.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".into());
    };
    let args: Vec<&str> = words.collect();
    let usage = |text: &str| Err(format!("usage: {text}"));

    match (head, args.as_slice()) {
        ("/help", []) => Ok(Command::Help),
        ("/connect", []) => Ok(Command::Connect(None)),
        ("/connect", [target]) => parse_target(target).map(|t| Command::Connect(Some(t))),
        ("/connect", _) => usage("/connect [host[:port]]"),
        ("/disconnect", []) => Ok(Command::Disconnect),
        ("/status", []) => Ok(Command::Status),
        ("/compass", [heading]) => Ok(Command::Compass {
            heading: parse_heading(heading)?,
            calibration: CalibrationState::Calibrated,
        }),
        ("/compass", [heading, calib]) => Ok(Command::Compass {
            heading: parse_heading(heading)?,
            calibration: calib.parse().map_err(|e: LinkError| e.to_string())?,
        }),
        ("/compass", _) => usage("/compass <0-359> [invalid|calibrating|calibrated]"),
        ("/accel", ["custom", file]) => Ok(Command::Accel(AccelSource::Custom(PathBuf::from(file)))),
        ("/accel", ["custom"]) => usage("/accel custom <file>"),
        ("/accel", [motion]) => motion
            .parse::<MotionPreset>()
            .map(|p| Command::Accel(AccelSource::Preset(p)))
            .map_err(|e| e.to_string()),
        ("/accel", _) => usage("/accel <motion> | /accel custom <file>"),
        ("/replay", [file]) => Ok(Command::Replay(PathBuf::from(file))),
        ("/replay", _) => usage("/replay <file>"),
        ("/settings", []) => Ok(Command::Settings),
        ("/quit" | "/exit", []) => Ok(Command::Quit),
        (other, _) => Err(format!("unknown command '{other}'")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(shutdown: Arc<AtomicBool>, session: Arc<Session>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "sensorlink>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let command = match parse_command(input) {
            Ok(c) => c,
            Err(msg) => {
                println!(
                    "{} {}. Type {} for available commands.",
                    "Error:".red(),
                    msg.yellow(),
                    "/help".bold()
                );
                continue;
            }
        };

        match command {
            Command::Help => cmd_help(),
            Command::Connect(target) => cmd_connect(&session, target),
            Command::Disconnect => cmd_disconnect(&session),
            Command::Status => cmd_status(&session),
            Command::Compass {
                heading,
                calibration,
            } => cmd_compass(&session, heading, calibration),
            Command::Accel(source) => cmd_accel(&session, source),
            Command::Replay(path) => cmd_replay(&session, &path),
            Command::Settings => cmd_settings(),
            Command::Quit => {
                session.shutdown();
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "sensorlink Commands".bold().underline());
    println!("  {}  – open the emulator link", "/connect [host[:port]]".bold().cyan());
    println!("  {}              – close the link", "/disconnect".bold().cyan());
    println!("  {}                  – link state and settings", "/status".bold().cyan());
    println!("  {} – set heading and calibration", "/compass <deg> [calib]".bold().cyan());
    println!("  {}         – send a motion preset", "/accel <motion>".bold().cyan());
    println!("  {}    – send samples from a file", "/accel custom <file>".bold().cyan());
    println!("  {}          – stream m/s² samples", "/replay <file>".bold().cyan());
    println!("  {}                – edit ~/.sensorlink/config.toml", "/settings".bold().cyan());
    println!("  {}            – close the link and exit", "/quit  /exit".bold().cyan());
    println!();
    let motions: Vec<&str> = MotionPreset::ALL.iter().map(|p| p.name()).collect();
    println!("  Motions: {}", motions.join(", ").dimmed());
    println!("  Calibration: {}", "invalid, calibrating, calibrated".dimmed());
    println!();
}

fn cmd_connect(session: &Session, target: Option<EmulatorTarget>) {
    let cfg = load_config_or_default();
    let addr = match target {
        Some(t) => t.resolve(&cfg),
        None => cfg.emulator_addr(),
    };

    print!("  Connecting to {} … ", addr.url().bold());
    io::stdout().flush().ok();
    match session.connect(&addr, cfg.page_origin.as_deref(), cfg.probe_interval()) {
        Ok(true) => {
            println!("{}", "open".green());
            if let Some(origin) = &cfg.page_origin {
                println!("  Liveness probe: HEAD {} every {} ms", origin.dimmed(), cfg.probe_interval_ms);
            }
        }
        Ok(false) => println!("{}", "failed".red()),
        Err(e) => println!("{}: {}", "FAILED".red(), e),
    }
}

fn cmd_disconnect(session: &Session) {
    if session.disconnect() {
        println!("{}", "✓ Link closed.".green());
    } else {
        println!("  {}", "Not connected.".dimmed());
    }
}

fn cmd_status(session: &Session) {
    let cfg = load_config_or_default();

    println!("{}", "Link Status".bold().underline());
    match session.status() {
        Some((url, state)) => {
            let state = match state {
                ConnectionState::Open => "open".green(),
                ConnectionState::Connecting => "connecting".yellow(),
                ConnectionState::Closed => "closed".red(),
            };
            println!("  Emulator      : {} ({})", url.bold(), state);
        }
        None => println!("  Emulator      : {}", "not connected".dimmed()),
    }
    println!(
        "  Page origin   : {}",
        cfg.page_origin.as_deref().unwrap_or("<probe disabled>").yellow()
    );
    println!("  Reversed axes : {}", cfg.reversed_axes.to_string().yellow());
    println!("  Landscape     : {}", cfg.landscape.to_string().yellow());
    println!(
        "  Cadence       : motion {} ms, flush {} ms, orientation {} ms",
        cfg.motion_throttle_ms, cfg.accel_flush_ms, cfg.orientation_throttle_ms
    );
}

/// The heading sent for a compass reading of `deg` on a device held in
/// `screen` orientation.
fn reported_heading(deg: f64, screen: ScreenOrientation) -> Heading {
    heading_from_reading(OrientationReading::from_compass(deg), screen).unwrap_or(Heading(deg))
}

fn cmd_compass(session: &Session, heading: f64, calibration: CalibrationState) {
    let cfg = load_config_or_default();
    let sent = reported_heading(heading, cfg.screen_orientation());
    let result = compass_frame(sent, calibration)
        .map_err(LinkError::from)
        .and_then(|frame| session.send_frames(&[frame]));
    match result {
        Ok(()) => println!(
            "{} heading {}° ({:?})",
            "✓ Compass set:".green(),
            sent.0.to_string().bold(),
            calibration
        ),
        Err(e) => println!("{}: {}", "Compass failed".red(), e),
    }
}

fn cmd_accel(session: &Session, source: AccelSource) {
    let samples = match &source {
        AccelSource::Preset(p) => Ok(vec![p.sample()]),
        AccelSource::Custom(path) => session::read_text(path).and_then(|t| parse_accel_file(&t)),
    };
    let result = samples.and_then(|samples| {
        if samples.is_empty() {
            return Err(LinkError::Parse("no samples to send".into()));
        }
        let frames = raw_frames(&samples)?;
        session.send_frames(&frames)?;
        Ok((samples.len(), frames.len()))
    });
    match result {
        Ok((samples, frames)) => {
            let label = match &source {
                AccelSource::Preset(p) => p.name().to_string(),
                AccelSource::Custom(path) => path.display().to_string(),
            };
            println!(
                "{} {} ({} sample(s) in {} frame(s))",
                "✓ Accel sent:".green(),
                label.bold(),
                samples,
                frames
            );
        }
        Err(e) => println!("{}: {}", "Accel failed".red(), e),
    }
}

fn cmd_replay(session: &Session, path: &std::path::Path) {
    let cfg = load_config_or_default();
    let samples = match session::read_text(path).and_then(|t| parse_replay_file(&t)) {
        Ok(s) if s.is_empty() => {
            println!("{}: no samples in {}", "Replay failed".red(), path.display());
            return;
        }
        Ok(s) => s,
        Err(e) => {
            println!("{}: {}", "Replay failed".red(), e);
            return;
        }
    };

    println!("  Replaying {} sample(s) from {} …", samples.len(), path.display().to_string().bold());
    match session.replay(&samples, cfg.feed_settings()) {
        Ok(frames) => println!("{} {} frame(s) sent", "✓ Replay done:".green(), frames),
        Err(e) => println!("{}: {}", "Replay failed".red(), e),
    }
}

fn cmd_settings() {
    let mut cfg = match config::load() {
        Ok(Some(c)) => c,
        Ok(None) => Config::default(),
        Err(e) => {
            println!("{}: {}", "Error loading config".red(), e);
            return;
        }
    };

    println!("{}", "Settings Editor".bold().underline());
    println!("  (press Enter to keep the current value)");

    cfg.emulator_host = prompt_str(
        &format!("  Emulator host   [{}]: ", cfg.emulator_host),
        &cfg.emulator_host,
    );
    cfg.emulator_port = prompt_u16(
        &format!("  Emulator port   [{}]: ", cfg.emulator_port),
        cfg.emulator_port,
    );

    let current_origin = cfg.page_origin.clone().unwrap_or_default();
    let origin = prompt_str(
        &format!(
            "  Page origin ('-' to disable) [{}]: ",
            if current_origin.is_empty() { "none" } else { current_origin.as_str() }
        ),
        &current_origin,
    );
    cfg.page_origin = match origin.as_str() {
        "" | "-" => None,
        other => Some(other.to_string()),
    };

    let reversed = prompt_str(
        &format!("  Reversed axes   [{}]: ", cfg.reversed_axes),
        &cfg.reversed_axes.to_string(),
    );
    match config::parse_flag(&reversed) {
        Some(flag) => cfg.reversed_axes = flag,
        None => println!(
            "  {} '{}' is not yes/no, keeping {}",
            "Warning:".yellow(),
            reversed,
            cfg.reversed_axes
        ),
    }

    let landscape = prompt_str(
        &format!("  Landscape       [{}]: ", cfg.landscape),
        &cfg.landscape.to_string(),
    );
    match config::parse_flag(&landscape) {
        Some(flag) => cfg.landscape = flag,
        None => println!(
            "  {} '{}' is not yes/no, keeping {}",
            "Warning:".yellow(),
            landscape,
            cfg.landscape
        ),
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "{} {}",
            "✓ Settings saved to".green(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn load_config_or_default() -> Config {
    match config::load() {
        Ok(Some(c)) => c,
        Ok(None) => Config::default(),
        Err(e) => {
            println!("{}: {} – using defaults", "Config error".red(), e);
            Config::default()
        }
    }
}

/// Prompt for a u16 value.  Returns `default` when the user presses Enter.
pub(crate) fn prompt_u16(msg: &str, default: u16) -> u16 {
    let raw = prompt_str(msg, &default.to_string());
    match raw.parse::<u16>() {
        Ok(v) => v,
        Err(_) => {
            println!(
                "  {} '{}' is not a valid port number, keeping {}",
                "Warning:".yellow(),
                raw,
                default
            );
            default
        }
    }
}

/// Prompt for a string value.  Returns `default` when the user presses Enter.
pub(crate) fn prompt_str(msg: &str, default: &str) -> String {
    print!("{}", msg);
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let trimmed = line.trim().to_string();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed
            }
        }
        Err(_) => default.to_string(),
    }
}
