//! Escape emitter
//!
//! Resolves capability templates, expands their parameters and writes the
//! result to the output stream. Also owns the text writer and the
//! normal/alternate character set state, which both backends share.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::RedirectionState;
use crate::core::error::{ConsoleError, Result};
use crate::term::acs::{AcsMap, AltChar, MISSING_GLYPH};
use crate::term::caps::{Capability, TerminalCapabilities};
use crate::term::tparm::{Template, Variables};

pub type SharedWriter = Box<dyn Write + Send>;

pub struct EscapeEmitter {
    caps: TerminalCapabilities,
    acs: AcsMap,
    writer: Mutex<SharedWriter>,
    statics: Mutex<Variables>,
    escapes: bool,
    alternate: AtomicBool,
}

impl EscapeEmitter {
    /// `escapes` is false when stdout and stderr are both redirected; every
    /// escape then fails with `OutputUnavailable` while text still goes to
    /// `writer`.
    pub fn new(caps: TerminalCapabilities, writer: SharedWriter, escapes: bool) -> Self {
        let acs = caps.acsc().map(AcsMap::parse).unwrap_or_default();
        Self {
            caps,
            acs,
            writer: Mutex::new(writer),
            statics: Mutex::new(Variables::default()),
            escapes,
            alternate: AtomicBool::new(false),
        }
    }

    /// Emitter on the process's own stdout or stderr.
    pub fn for_process(caps: TerminalCapabilities, redirection: &RedirectionState) -> Self {
        Self::new(
            caps,
            redirection.text_channel().writer(),
            redirection.escapes_available(),
        )
    }

    pub fn capabilities(&self) -> &TerminalCapabilities {
        &self.caps
    }

    pub fn escapes_available(&self) -> bool {
        self.escapes
    }

    fn lock(&self) -> MutexGuard<'_, SharedWriter> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The writer, for an operation that needs to send escape sequences.
    pub fn escape_writer(&self, operation: &'static str) -> Result<MutexGuard<'_, SharedWriter>> {
        if !self.escapes {
            return Err(ConsoleError::OutputUnavailable { operation });
        }
        Ok(self.lock())
    }

    pub fn unsupported(&self, capability: &'static str) -> ConsoleError {
        ConsoleError::UnsupportedCapability {
            terminal: self.caps.name().to_string(),
            capability,
        }
    }

    pub fn template(&self, cap: Capability) -> Result<Template<'_>> {
        self.caps
            .lookup(cap)
            .ok_or_else(|| self.unsupported(cap.name()))
    }

    /// Expand `cap` with `params` without writing it. Static variables carry
    /// over from earlier expansions.
    pub fn render(&self, cap: Capability, params: &[i32]) -> Result<String> {
        let template = self.template(cap)?;
        let mut statics = self.statics.lock().unwrap_or_else(PoisonError::into_inner);
        template
            .expand_with(params, &mut statics)
            .map_err(|source| ConsoleError::Template {
                capability: cap.name(),
                source,
            })
    }

    /// Expand `cap` with `params` and write it.
    pub fn emit(&self, cap: Capability, params: &[i32], operation: &'static str) -> Result<()> {
        let text = self.render(cap, params)?;
        trace!(capability = %cap, ?params, "emit");
        self.emit_raw(&text, operation)
    }

    /// Write an escape sequence verbatim.
    pub fn emit_raw(&self, text: &str, operation: &'static str) -> Result<()> {
        let mut writer = self.escape_writer(operation)?;
        writer
            .write_all(text.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(ConsoleError::io(operation))
    }

    /// Write ordinary text in the normal character set.
    pub fn write_text(&self, text: &str) -> Result<()> {
        self.select_charset(false)?;
        let mut writer = self.lock();
        writer
            .write_all(text.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(ConsoleError::io("write text"))
    }

    /// Write a line-drawing symbol, or `?` when the terminal has no glyph for it.
    pub fn write_alt_char(&self, symbol: AltChar) -> Result<()> {
        if !self.escapes {
            return Err(ConsoleError::OutputUnavailable {
                operation: "write an alternate character",
            });
        }
        let (glyph, alternate) = match self.acs.lookup(symbol) {
            Some(glyph) => (glyph, true),
            None => (MISSING_GLYPH, false),
        };
        self.select_charset(alternate)?;
        let mut buf = [0u8; 4];
        self.emit_raw(glyph.encode_utf8(&mut buf), "write an alternate character")
    }

    pub fn alternate_charset(&self) -> bool {
        self.alternate.load(Ordering::Acquire)
    }

    /// Switch character sets, writing `smacs`/`rmacs` only on a change.
    pub fn select_charset(&self, alternate: bool) -> Result<()> {
        if self.alternate.load(Ordering::Acquire) == alternate {
            return Ok(());
        }
        let cap = if alternate {
            Capability::EnterAltCharset
        } else {
            Capability::ExitAltCharset
        };
        self.emit(cap, &[], "switch the character set")?;
        self.alternate.store(alternate, Ordering::Release);
        Ok(())
    }

    /// Put the terminal in the normal character set regardless of the
    /// tracked state. Silently skipped when there is no way to do it.
    pub fn reset_charset(&self) -> Result<()> {
        if !self.escapes || !self.caps.has(Capability::ExitAltCharset) {
            return Ok(());
        }
        self.emit(Capability::ExitAltCharset, &[], "reset the character set")?;
        self.alternate.store(false, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use std::sync::Arc;

    /// Writer that keeps everything written to it.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn take(&self) -> String {
            String::from_utf8(std::mem::take(&mut *self.0.lock().unwrap())).unwrap()
        }
    }

    fn make(term: &str, escapes: bool) -> (EscapeEmitter, Capture) {
        let capture = Capture::default();
        let emitter = EscapeEmitter::new(
            TerminalCapabilities::builtin(term),
            Box::new(capture.clone()),
            escapes,
        );
        (emitter, capture)
    }

    #[test]
    fn test_emit_with_parameters() {
        let (emitter, out) = make("xterm", true);
        emitter
            .emit(Capability::CursorAddress, &[4, 9], "move the cursor")
            .unwrap();
        assert_eq!(out.take(), "\x1b[5;10H");
    }

    #[test]
    fn test_static_variables_span_emits() {
        let mut overrides = std::collections::BTreeMap::new();
        overrides.insert("cuu".to_string(), "%p1%PA".to_string());
        overrides.insert("cud".to_string(), "\x1b[%gA%dB".to_string());
        let capture = Capture::default();
        let emitter = EscapeEmitter::new(
            TerminalCapabilities::builtin("xterm").with_overrides(&overrides),
            Box::new(capture.clone()),
            true,
        );
        emitter.emit(Capability::CursorUp, &[4], "remember").unwrap();
        emitter.emit(Capability::CursorDown, &[0], "recall").unwrap();
        assert_eq!(capture.take(), "\x1b[4B");
    }

    #[test]
    fn test_oversized_field_is_a_template_error() {
        let mut overrides = std::collections::BTreeMap::new();
        overrides.insert(
            "cup".to_string(),
            "\x1b[%i%p1%99999999999999999999d;%p2%dH".to_string(),
        );
        let capture = Capture::default();
        let emitter = EscapeEmitter::new(
            TerminalCapabilities::builtin("xterm").with_overrides(&overrides),
            Box::new(capture.clone()),
            true,
        );
        let err = emitter
            .emit(Capability::CursorAddress, &[0, 0], "move the cursor")
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Template { capability: "cup", .. }));
        assert_eq!(capture.take(), "");
    }

    #[test]
    fn test_missing_capability() {
        let (emitter, out) = make("dumb", true);
        let err = emitter
            .emit(Capability::CursorAddress, &[0, 0], "move the cursor")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedCapability);
        assert!(err.to_string().contains("`cup`"));
        assert_eq!(out.take(), "");
    }

    #[test]
    fn test_redirected_output_fails_fast() {
        let (emitter, out) = make("xterm", false);
        let err = emitter.emit(Capability::Bell, &[], "beep").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        // Text still goes out.
        emitter.write_text("plain").unwrap();
        assert_eq!(out.take(), "plain");
    }

    #[test]
    fn test_charset_switches_only_on_change() {
        let (emitter, out) = make("xterm", true);
        emitter.write_alt_char(AltChar::UpperLeftCorner).unwrap();
        emitter.write_alt_char(AltChar::HorizontalLine).unwrap();
        emitter.write_alt_char(AltChar::UpperRightCorner).unwrap();
        emitter.write_text(" ok").unwrap();
        emitter.write_text("!").unwrap();
        assert_eq!(out.take(), "\x1b(0lqk\x1b(B ok!");
    }

    #[test]
    fn test_missing_glyph_is_question_mark() {
        let (emitter, out) = make("vt100", true);
        // vt100's acsc has no lantern.
        emitter.write_alt_char(AltChar::Lantern).unwrap();
        assert!(!emitter.alternate_charset());
        assert_eq!(out.take(), "?");

        let (emitter, _) = make("xterm", false);
        let err = emitter.write_alt_char(AltChar::Plus).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
