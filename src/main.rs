//! tinyconsole - console diagnostics
//!
//! Exercises every console operation against the terminal it runs in:
//! cursor position queries, colors, cursor shapes, erase modes and
//! line-drawing characters.
//!
//! # Quick Start
//!
//! ```text
//! tinyconsole position          # Ask the terminal where the cursor is
//! tinyconsole colors            # 16x16 color grid
//! tinyconsole --term vt100 acs  # Line drawing as a vt100 would do it
//! ```

use std::env;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tinyconsole::core::token::render_tokens;
use tinyconsole::{
    AltChar, Capability, Config, Console, ConsoleColor, CursorVisibility, EraseMode,
};

/// Command line options
struct CliArgs {
    command: Command,
    /// Use escape codes even on a Windows console
    force_ansi: bool,
    /// Terminal type for capability lookup
    terminal: Option<String>,
}

enum Command {
    Position,
    Colors,
    Cursor,
    Erase(EraseMode),
    Acs,
    Caps,
    Progress,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("tinyconsole {}", VERSION);
}

fn print_help() {
    eprintln!("tinyconsole {} - console control diagnostics", VERSION);
    eprintln!();
    eprintln!("Usage: tinyconsole [OPTIONS] <COMMAND>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  position              Query and print the cursor position");
    eprintln!("  colors                Print every foreground/background pair");
    eprintln!("  cursor                Cycle cursor visibility and relative moves");
    eprintln!("  erase <MODE>          Erase part of the screen");
    eprintln!("  acs                   Draw a box with line-drawing characters");
    eprintln!("  caps                  List the terminal's capabilities");
    eprintln!("  progress              Redraw a progress bar in place");
    eprintln!();
    eprintln!("Erase modes:");
    let modes: Vec<&str> = EraseMode::ALL.iter().map(|m| m.name()).collect();
    eprintln!("  {}", modes.join(", "));
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -a, --ansi            Use escape codes even on a Windows console");
    eprintln!("  -t, --term <NAME>     Terminal type (default: $TERM)");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.tinyconsole/config.toml");
    eprintln!("Log file:      ~/.tinyconsole/tinyconsole.log");
}

fn parse_args() -> Result<CliArgs, String> {
    let args: Vec<String> = env::args().collect();
    let mut command = None;
    let mut force_ansi = false;
    let mut terminal = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-a" | "--ansi" => {
                force_ansi = true;
            }
            "-t" | "--term" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing terminal name".to_string());
                }
                terminal = Some(args[i].clone());
            }
            arg if command.is_some() => {
                return Err(format!("Unexpected argument: {}. Use -h for help.", arg));
            }
            "position" => command = Some(Command::Position),
            "colors" => command = Some(Command::Colors),
            "cursor" => command = Some(Command::Cursor),
            "acs" => command = Some(Command::Acs),
            "caps" => command = Some(Command::Caps),
            "progress" => command = Some(Command::Progress),
            "erase" => {
                i += 1;
                let name = args.get(i).ok_or("Missing erase mode")?;
                let mode = EraseMode::from_name(name)
                    .ok_or_else(|| format!("Unknown erase mode: {}", name))?;
                command = Some(Command::Erase(mode));
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    let command = command.ok_or("Missing command")?;
    Ok(CliArgs {
        command,
        force_ansi,
        terminal,
    })
}

/// Log to ~/.tinyconsole/tinyconsole.log; the terminal itself is never used.
fn init_logging(config: &Config) {
    let log_path = Config::config_dir()
        .map(|dir| dir.join("tinyconsole.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("tinyconsole.log"));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let mut config = Config::load();
    config.force_ansi |= args.force_ansi;
    if args.terminal.is_some() {
        config.terminal = args.terminal;
    }
    init_logging(&config);
    info!("tinyconsole {} starting", VERSION);

    let console = Console::open(&config).context("failed to open the console")?;
    info!(backend = console.backend_kind().name(), "console ready");

    match args.command {
        Command::Position => run_position(&console)?,
        Command::Colors => run_colors(&console)?,
        Command::Cursor => run_cursor(&console)?,
        Command::Erase(mode) => console.erase(mode)?,
        Command::Acs => run_acs(&console)?,
        Command::Caps => run_caps(&console)?,
        Command::Progress => run_progress(&console)?,
    }
    Ok(())
}

fn run_position(console: &Console) -> anyhow::Result<()> {
    let position = match console.cursor_position() {
        Ok(position) => position,
        Err(e) if e.is_timeout() => {
            warn!("terminal did not answer the cursor query");
            anyhow::bail!("the terminal did not report the cursor position");
        }
        Err(e) => return Err(e.into()),
    };
    console.write_line(&format!(
        "cursor at left={} top={} ({})",
        position.left,
        position.top,
        console.backend_kind().name()
    ))?;

    let typed = console.input().pushback().len();
    if typed > 0 {
        console.write_line(&format!("{} typed token(s) kept for input", typed))?;
    }
    Ok(())
}

fn run_colors(console: &Console) -> anyhow::Result<()> {
    for background in ConsoleColor::ALL {
        console.set_background(background)?;
        for foreground in ConsoleColor::ALL {
            console.set_foreground(foreground)?;
            console.write_str(&format!(" {:x} ", foreground as u8))?;
        }
        console.reset_color()?;
        console.write_line(&format!(" {}", background.name()))?;
    }
    Ok(())
}

fn run_cursor(console: &Console) -> anyhow::Result<()> {
    let pause = Duration::from_millis(700);
    for (label, visibility) in [
        ("invisible", CursorVisibility::Invisible),
        ("high visibility", CursorVisibility::HighVisibility),
        ("normal", CursorVisibility::Normal),
    ] {
        console.write_str(&format!("\rcursor: {:<16}", label))?;
        console.set_cursor_visibility(visibility)?;
        thread::sleep(pause);
    }
    console.write_line("")?;

    console.write_str("abcdef")?;
    console.cursor_back(4)?;
    console.write_str("X")?;
    console.cursor_forward(2)?;
    console.write_str("Y")?;
    console.write_line("")?;
    Ok(())
}

fn run_acs(console: &Console) -> anyhow::Result<()> {
    const WIDTH: usize = 12;
    let rule = |left: AltChar, right: AltChar| -> anyhow::Result<()> {
        console.write_alt_char(left)?;
        for _ in 0..WIDTH {
            console.write_alt_char(AltChar::HorizontalLine)?;
        }
        console.write_alt_char(right)?;
        console.write_line("")?;
        Ok(())
    };

    rule(AltChar::UpperLeftCorner, AltChar::UpperRightCorner)?;
    console.write_alt_char(AltChar::VerticalLine)?;
    console.write_str(&format!("{:^width$}", "tinyconsole", width = WIDTH))?;
    console.write_alt_char(AltChar::VerticalLine)?;
    console.write_line("")?;
    rule(AltChar::LeftTee, AltChar::RightTee)?;
    console.write_alt_char(AltChar::VerticalLine)?;
    for symbol in [
        AltChar::Diamond,
        AltChar::Checkerboard,
        AltChar::Degree,
        AltChar::PlusMinus,
        AltChar::Bullet,
        AltChar::Pi,
        AltChar::NotEqual,
        AltChar::Sterling,
        AltChar::LessEqual,
        AltChar::GreaterEqual,
        AltChar::Block,
        AltChar::Lantern,
    ] {
        console.write_alt_char(symbol)?;
    }
    console.write_alt_char(AltChar::VerticalLine)?;
    console.write_line("")?;
    rule(AltChar::LowerLeftCorner, AltChar::LowerRightCorner)?;
    Ok(())
}

fn run_caps(console: &Console) -> anyhow::Result<()> {
    let caps = console.capabilities();
    console.write_line(&format!(
        "terminal {} ({} backend)",
        caps.name(),
        console.backend_kind().name()
    ))?;
    for cap in Capability::ALL {
        let value = caps
            .lookup(cap)
            .map(|template| {
                let chars: Vec<char> = template.source().chars().collect();
                render_tokens(&chars)
            })
            .unwrap_or_else(|| "-".to_string());
        console.write_line(&format!("  {:<6} {}", cap.name(), value))?;
    }
    let number = |n: Option<u16>| n.map_or("-".to_string(), |n| n.to_string());
    console.write_line(&format!("  cols   {}", number(caps.cols())))?;
    console.write_line(&format!("  lines  {}", number(caps.lines())))?;
    console.write_line(&format!("  colors {}", number(caps.colors())))?;
    console.write_line(&format!("  acsc   {}", caps.acsc().unwrap_or("-")))?;
    Ok(())
}

fn run_progress(console: &Console) -> anyhow::Result<()> {
    const STEPS: u16 = 40;
    let top = console.cursor_top()?;
    console.set_cursor_visibility(CursorVisibility::Invisible)?;
    for step in 0..=STEPS {
        console.set_cursor_position(0, top)?;
        console.erase(EraseMode::EntireLine)?;
        console.set_foreground(ConsoleColor::Green)?;
        console.write_str(&"#".repeat(usize::from(step)))?;
        console.reset_color()?;
        console.write_str(&format!(
            "{} {:>3}%",
            ".".repeat(usize::from(STEPS - step)),
            step * 100 / STEPS
        ))?;
        thread::sleep(Duration::from_millis(50));
    }
    console.set_cursor_visibility(CursorVisibility::Normal)?;
    console.write_line("")?;
    Ok(())
}
