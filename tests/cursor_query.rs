//! Cursor position queries against a simulated terminal.

mod common;

use common::{drain_input, SimTerminal};
use proptest::prelude::*;
use tinyconsole::core::cpr::ReadTiming;
use tinyconsole::{CursorPosition, ErrorKind, ProtocolFault, RedirectionState};

#[test]
fn test_reports_row_12_column_1() {
    let term = SimTerminal::at(12, 1);
    let console = term.console("xterm");
    assert_eq!(
        console.cursor_position().unwrap(),
        CursorPosition::new(0, 11)
    );
    assert_eq!(term.take_output(), "\x1b[6n");
    assert!(!term.in_raw_mode());
}

#[test]
fn test_reply_5_10() {
    let term = SimTerminal::replying(b"\x1b[5;10R");
    let console = term.console("xterm");
    let position = console.cursor_position().unwrap();
    assert_eq!((position.left, position.top), (9, 4));
}

#[test]
fn test_omitted_fields() {
    let term = SimTerminal::replying(b"\x1b[R");
    let console = term.console("xterm");
    assert_eq!(console.cursor_position().unwrap(), CursorPosition::new(0, 0));

    let term = SimTerminal::replying(b"\x1b[5R");
    let console = term.console("xterm");
    assert_eq!(console.cursor_position().unwrap(), CursorPosition::new(0, 4));

    let term = SimTerminal::replying(b"\x1b[;7R");
    let console = term.console("xterm");
    assert_eq!(console.cursor_position().unwrap(), CursorPosition::new(6, 0));
}

#[test]
fn test_zero_field_is_protocol_error() {
    let term = SimTerminal::replying(b"\x1b[0;5R");
    let console = term.console("xterm");
    let err = console.cursor_position().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(err.protocol_fault(), Some(ProtocolFault::FieldOutOfRange));
    assert!(!err.is_timeout());
    assert!(err.to_string().contains("\\u001b[0;5R"));
    // The reply was the terminal's, not the user's.
    assert!(drain_input(&console).is_empty());
}

#[test]
fn test_typed_keys_survive_the_query() {
    let term = SimTerminal::at(3, 4);
    term.type_keys(b"ls -la\r");
    let console = term.console("xterm");
    assert_eq!(console.cursor_position().unwrap(), CursorPosition::new(3, 2));
    assert_eq!(drain_input(&console), b"ls -la\r");
}

#[test]
fn test_typed_escape_sequences_survive_the_query() {
    let term = SimTerminal::at(2, 2);
    // Up arrow, a lone ESC and an incomplete CSI before the reply.
    term.type_keys(b"\x1b[A\x1bx\x1b[2");
    let console = term.console("xterm");
    assert_eq!(console.cursor_position().unwrap(), CursorPosition::new(1, 1));
    assert_eq!(drain_input(&console), b"\x1b[A\x1bx\x1b[2");
}

#[test]
fn test_ordinary_reads_see_replayed_keys_first() {
    let term = SimTerminal::at(1, 1);
    term.type_keys(b"yes\n");
    let console = term.console("xterm");
    console.cursor_position().unwrap();
    term.type_keys(b"no\n");

    assert_eq!(console.input().peek().unwrap(), Some(b'y'));
    assert_eq!(console.input().read_line().unwrap().as_deref(), Some("yes"));
    assert_eq!(console.input().read_line().unwrap().as_deref(), Some("no"));
    assert_eq!(console.input().read_line().unwrap(), None);
}

#[test]
fn test_endless_reply_is_bounded() {
    let mut reply = b"\x1b[".to_vec();
    reply.extend(std::iter::repeat(b'1').take(1000));
    let term = SimTerminal::replying(&reply);
    let console = term.console("xterm");

    let err = console.cursor_position().unwrap_err();
    assert_eq!(err.protocol_fault(), Some(ProtocolFault::ReplyTooLong));
    assert_eq!(console.input().pushback().len(), 257);
    // Nothing read from the wire is lost.
    assert_eq!(drain_input(&console), reply);
}

#[test]
fn test_back_to_back_queries() {
    let term = SimTerminal::at(10, 20);
    let console = term.console("xterm");
    assert_eq!(console.cursor_position().unwrap(), CursorPosition::new(19, 9));

    console.set_cursor_position(4, 7).unwrap();
    assert_eq!(term.cursor(), (8, 5));
    assert_eq!(console.cursor_position().unwrap(), CursorPosition::new(4, 7));
    assert_eq!(console.cursor_left().unwrap(), 4);
    assert_eq!(console.cursor_top().unwrap(), 7);
    assert!(drain_input(&console).is_empty());
}

#[test]
fn test_cursor_left_and_top_setters() {
    let term = SimTerminal::at(6, 9);
    let console = term.console("xterm");
    console.set_cursor_left(0).unwrap();
    assert_eq!(term.cursor(), (6, 1));
    console.set_cursor_top(0).unwrap();
    assert_eq!(term.cursor(), (1, 1));
}

#[test]
fn test_query_timing_policy() {
    let term = SimTerminal::at(1, 1);
    let console = term.console("xterm");
    console.cursor_position().unwrap();
    console.cursor_position().unwrap();
    assert_eq!(
        term.query_timings(),
        vec![
            ReadTiming {
                min_chars: 0,
                timeout_ds: 100
            },
            ReadTiming {
                min_chars: 1,
                timeout_ds: 10
            },
        ]
    );
}

#[test]
fn test_silent_terminal_times_out() {
    let term = SimTerminal::silent();
    term.type_keys(b"q");
    let console = term.console("xterm");

    let err = console.cursor_position().unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(!term.in_raw_mode());
    assert_eq!(drain_input(&console), b"q");

    // A terminal that never answered keeps the lenient read policy.
    console.cursor_position().unwrap_err();
    assert_eq!(term.query_timings()[1].min_chars, 0);
}

#[test]
fn test_partial_reply_then_silence() {
    let term = SimTerminal::replying(b"\x1b[12;");
    term.type_keys(b"x");
    let console = term.console("xterm");
    assert!(console.cursor_position().unwrap_err().is_timeout());
    assert_eq!(drain_input(&console), b"x\x1b[12;");
}

#[test]
fn test_no_request_capability() {
    let term = SimTerminal::at(1, 1);
    let console = term.console("dumb");
    let err = console.cursor_position().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedCapability);
    assert_eq!(term.take_output(), "");
}

#[test]
fn test_redirected_streams() {
    let term = SimTerminal::at(1, 1);
    let console = term.console_with(
        "xterm",
        RedirectionState {
            input: false,
            output: true,
            error: true,
        },
    );
    let err = console.cursor_position().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(term.query_timings().is_empty());

    let console = term.console_with(
        "xterm",
        RedirectionState {
            input: true,
            ..Default::default()
        },
    );
    assert_eq!(
        console.cursor_position().unwrap_err().kind(),
        ErrorKind::Unavailable
    );
}

proptest! {
    #[test]
    fn prop_reply_maps_to_zero_based(row in 1u32..=2000, col in 1u32..=2000) {
        let term = SimTerminal::at(row, col);
        let console = term.console("xterm");
        let position = console.cursor_position().unwrap();
        prop_assert_eq!(u32::from(position.left), col - 1);
        prop_assert_eq!(u32::from(position.top), row - 1);
    }

    #[test]
    fn prop_typed_bytes_come_back_unchanged(
        typed in proptest::collection::vec(any::<u8>().prop_filter("no ESC", |b| *b != 0x1b), 0..200),
    ) {
        let term = SimTerminal::at(7, 3);
        term.type_keys(&typed);
        let console = term.console("xterm");
        prop_assert_eq!(console.cursor_position().unwrap(), CursorPosition::new(2, 6));
        prop_assert_eq!(drain_input(&console), typed);
    }
}
