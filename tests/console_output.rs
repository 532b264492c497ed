//! Escape output of the ANSI backend for the built-in terminal types.

mod common;

use std::collections::BTreeMap;

use common::SimTerminal;
use tinyconsole::{
    AltChar, Console, ConsoleColor, CursorVisibility, EraseMode, ErrorKind, RedirectionState,
    TerminalCapabilities,
};

#[test]
fn test_erase_modes_on_xterm() {
    let term = SimTerminal::at(1, 1);
    let console = term.console("xterm");
    let expected = [
        (EraseMode::FromCursorToEndOfScreen, "\x1b[J"),
        (EraseMode::FromBeginningOfScreenToCursor, "\x1b[1J"),
        (EraseMode::EntireScreen, "\x1b[H\x1b[2J"),
        (EraseMode::EntireConsoleBuffer, "\x1b[H\x1b[2J\x1b[3J"),
        (EraseMode::FromCursorToEndOfLine, "\x1b[K"),
        (EraseMode::FromBeginningOfLineToCursor, "\x1b[1K"),
        (EraseMode::EntireLine, "\x1b[2K"),
    ];
    for (mode, escape) in expected {
        console.erase(mode).unwrap();
        assert_eq!(term.take_output(), escape, "{}", mode.name());
    }

    console.clear().unwrap();
    assert_eq!(term.take_output(), "\x1b[H\x1b[2J\x1b[3J");
}

#[test]
fn test_clear_on_linux_console() {
    let term = SimTerminal::at(1, 1);
    let console = term.console("linux");
    console.clear().unwrap();
    assert_eq!(term.take_output(), "\x1b[H\x1b[J\x1b[3J");
}

#[test]
fn test_eight_color_terminal() {
    let term = SimTerminal::at(1, 1);
    let console = term.console("linux");
    console.set_foreground(ConsoleColor::Red).unwrap();
    console.set_foreground(ConsoleColor::Yellow).unwrap();
    console.set_background(ConsoleColor::Cyan).unwrap();
    assert_eq!(term.take_output(), "\x1b[31m\x1b[33m\x1b[46m");
    assert_eq!(console.foreground().unwrap(), ConsoleColor::Yellow);
    assert_eq!(console.background().unwrap(), ConsoleColor::Cyan);
}

#[test]
fn test_sixteen_color_terminal() {
    let term = SimTerminal::at(1, 1);
    let console = term.console("xterm-256color");
    console.set_foreground(ConsoleColor::DarkGray).unwrap();
    console.set_background(ConsoleColor::White).unwrap();
    console.set_foreground(ConsoleColor::DarkGreen).unwrap();
    assert_eq!(term.take_output(), "\x1b[90m\x1b[107m\x1b[32m");
}

#[test]
fn test_legacy_color_capabilities() {
    let term = SimTerminal::at(1, 1);
    let mut overrides = BTreeMap::new();
    overrides.insert("setf".to_string(), "\x1b[3%p1%dm".to_string());
    overrides.insert("setb".to_string(), "\x1b[4%p1%dm".to_string());
    let caps = TerminalCapabilities::builtin("vt100").with_overrides(&overrides);
    let console = Console::<u8>::builder(caps)
        .writer(Box::new(term.clone()))
        .input(Box::new(term.clone()))
        .build();
    term.take_output();

    // setf/setb number the colors blue-green-red.
    console.set_foreground(ConsoleColor::Blue).unwrap();
    console.set_background(ConsoleColor::DarkRed).unwrap();
    assert_eq!(term.take_output(), "\x1b[31m\x1b[44m");

    // Without op the defaults are written back explicitly.
    console.reset_color().unwrap();
    assert_eq!(term.take_output(), "\x1b[37m\x1b[40m");
    assert_eq!(console.foreground().unwrap(), ConsoleColor::Gray);
}

#[test]
fn test_colorless_terminal() {
    let term = SimTerminal::at(1, 1);
    let console = term.console("vt100");
    let err = console.set_foreground(ConsoleColor::Red).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedCapability);
    assert_eq!(console.foreground().unwrap(), ConsoleColor::Gray);
    assert_eq!(term.take_output(), "");
}

#[test]
fn test_cursor_visibility() {
    let term = SimTerminal::at(1, 1);
    let console = term.console("xterm");
    console.set_cursor_visibility(CursorVisibility::Invisible).unwrap();
    console
        .set_cursor_visibility(CursorVisibility::HighVisibility)
        .unwrap();
    console.set_cursor_visibility(CursorVisibility::Normal).unwrap();
    assert_eq!(
        term.take_output(),
        "\x1b[?25l\x1b[?12;25h\x1b[?12l\x1b[?25h"
    );

    let console = term.console("vt100");
    let err = console
        .set_cursor_visibility(CursorVisibility::Invisible)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedCapability);
}

#[test]
fn test_relative_moves() {
    let term = SimTerminal::at(1, 1);
    let console = term.console("vt100");
    console.cursor_down(3).unwrap();
    console.cursor_up(0).unwrap();
    console.cursor_forward(12).unwrap();
    console.cursor_back(1).unwrap();
    console.cursor_up(2).unwrap();
    assert_eq!(term.take_output(), "\x1b[3B\x1b[12C\x1b[1D\x1b[2A");
}

#[test]
fn test_title_and_beep() {
    let term = SimTerminal::at(1, 1);
    let console = term.console("xterm");
    console.set_title("build: 3/7").unwrap();
    console.beep().unwrap();
    assert_eq!(term.take_output(), "\x1b]0;build: 3/7\x07\x07");

    let console = term.console("linux");
    let err = console.set_title("x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedCapability);
}

#[test]
fn test_line_drawing() {
    let term = SimTerminal::at(1, 1);
    let console = term.console("xterm");
    console.write_alt_char(AltChar::UpperLeftCorner).unwrap();
    console.write_alt_char(AltChar::HorizontalLine).unwrap();
    console.write_str("x").unwrap();
    console.write_alt_char(AltChar::LowerRightCorner).unwrap();
    console.write_line("").unwrap();
    assert_eq!(term.take_output(), "\x1b(0lq\x1b(Bx\x1b(0j\x1b(B\n");
}

#[test]
fn test_line_drawing_without_glyph() {
    let term = SimTerminal::at(1, 1);
    let console = term.console("vt100");
    console.write_alt_char(AltChar::VerticalLine).unwrap();
    console.write_alt_char(AltChar::Lantern).unwrap();
    console.write_alt_char(AltChar::VerticalLine).unwrap();
    assert_eq!(term.take_output(), "\x0ex\x0f?\x0ex");
}

#[test]
fn test_escape_passthrough() {
    let term = SimTerminal::at(1, 1);
    let console = term.console("xterm");
    console.output_escape_code("\x1b[?1049h").unwrap();
    assert_eq!(term.take_output(), "\x1b[?1049h");
}

#[test]
fn test_both_outputs_redirected() {
    let term = SimTerminal::at(1, 1);
    let console = term.console_with(
        "xterm",
        RedirectionState {
            input: false,
            output: true,
            error: true,
        },
    );
    for result in [
        console.set_foreground(ConsoleColor::Red),
        console.set_cursor_position(1, 1),
        console.erase(EraseMode::EntireLine),
        console.output_escape_code("\x1b[0m"),
        console.write_alt_char(AltChar::Plus),
    ] {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unavailable);
    }
    assert_eq!(
        console.foreground().unwrap_err().kind(),
        ErrorKind::Unavailable
    );

    // Plain text is still written.
    console.write_str("done").unwrap();
    assert_eq!(term.take_output(), "done");
}
