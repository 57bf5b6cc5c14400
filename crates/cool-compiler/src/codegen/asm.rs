//! Low-level assembly text writer.
//!
//! A thin buffer with helpers for the three shapes the image is made of:
//! labeled data words, instructions, and string data. The writer owns
//! formatting (one tab-indented instruction per line) so the emission code
//! in the pass reads as the instruction sequence it produces.

use std::fmt::Write;

/// Object header eyecatcher preceding every heap object in the image.
pub const EYECATCHER: i64 = -1;

/// Word size of the target, in bytes.
pub const WORD_SIZE: i32 = 4;

/// Object header: tag, size, dispatch-table pointer.
pub const HEADER_WORDS: i32 = 3;

#[derive(Debug, Default)]
pub struct Asm {
    buf: String,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    /// One instruction, tab-indented.
    pub fn ins(&mut self, text: impl AsRef<str>) {
        self.buf.push('\t');
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
    }

    pub fn insf(&mut self, args: std::fmt::Arguments<'_>) {
        self.buf.push('\t');
        let _ = self.buf.write_fmt(args);
        self.buf.push('\n');
    }

    pub fn label(&mut self, name: impl AsRef<str>) {
        self.buf.push_str(name.as_ref());
        self.buf.push_str(":\n");
    }

    pub fn word(&mut self, value: impl std::fmt::Display) {
        let _ = writeln!(self.buf, "\t.word\t{value}");
    }

    pub fn globl(&mut self, name: &str) {
        let _ = writeln!(self.buf, "\t.globl\t{name}");
    }

    pub fn append(&mut self, other: &Asm) {
        self.buf.push_str(&other.buf);
    }

    pub fn finish(self) -> String {
        self.buf
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// String data: `.ascii` bytes (skipped when empty), a NUL terminator,
    /// and word re-alignment.
    pub fn string_data(&mut self, value: &str) {
        if !value.is_empty() {
            let _ = writeln!(self.buf, "\t.ascii\t\"{}\"", escape(value));
        }
        self.ins(".byte\t0");
        self.ins(".align\t2");
    }
}

/// Escape a string for `.ascii` emission.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

/// `insf`-style formatting without the verbosity at call sites.
macro_rules! emit {
    ($asm:expr, $($arg:tt)*) => {
        $asm.insf(format_args!($($arg)*))
    };
}
pub(crate) use emit;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_are_tab_indented() {
        let mut asm = Asm::new();
        asm.label("Main_init");
        asm.ins("move\t$a0 $s0");
        asm.word(EYECATCHER);
        assert_eq!(asm.finish(), "Main_init:\n\tmove\t$a0 $s0\n\t.word\t-1\n");
    }

    #[test]
    fn string_data_escapes_and_terminates() {
        let mut asm = Asm::new();
        asm.string_data("a\"b\n");
        let text = asm.finish();
        assert!(text.contains(".ascii\t\"a\\\"b\\n\""));
        assert!(text.contains(".byte\t0"));
        assert!(text.contains(".align\t2"));
    }

    #[test]
    fn empty_string_has_no_ascii_directive() {
        let mut asm = Asm::new();
        asm.string_data("");
        assert!(!asm.as_str().contains(".ascii"));
        assert!(asm.as_str().contains(".byte\t0"));
    }
}
