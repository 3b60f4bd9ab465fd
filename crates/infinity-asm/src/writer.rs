// SPDX-License-Identifier: Apache-2.0 WITH LLVM-Exception

//! [`Writer`], the buffered assembly-text sink.

use std::fmt::Display;
use std::io::{self, Write};

use crate::label::Label;

/// Appends lines of assembly text to an externally-supplied sink.
///
/// Lines beginning with the assembler directive prefix (`.`) are indented
/// one tab. At most one label may be pending at a time: when a label is
/// attached via [`emit_label`](Writer::emit_label), it is rendered as a
/// prefix (`N:`) on the next line that isn't a `#define` preprocessor line —
/// C-preprocessor directives can't have an assembler label attached to them,
/// so those are left alone and the label stays pending for the line after.
/// Attaching a second label while one is already pending flushes the first
/// one on a line of its own first.
pub struct Writer<W> {
    sink: W,
    pending_label: Option<Label>,
}

impl<W: Write> Writer<W> {
    /// Wraps `sink` in a fresh writer with no pending label.
    pub fn new(sink: W) -> Self {
        Writer {
            sink,
            pending_label: None,
        }
    }

    /// Flushes any pending label as a bare line and returns the sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.flush_pending_label()?;
        Ok(self.sink)
    }

    fn flush_pending_label(&mut self) -> io::Result<()> {
        if let Some(label) = self.pending_label.take() {
            writeln!(self.sink, "{}:", label.id())?;
        }
        Ok(())
    }

    /// Emits one line of assembly text, with an optional trailing block
    /// comment. A newline is always appended.
    pub fn emit_line(&mut self, line: &str, comment: Option<&str>) -> io::Result<()> {
        let body = if line.starts_with('.') {
            format!("\t{line}")
        } else {
            line.to_string()
        };

        let mut out = String::new();
        if !body.starts_with('#') {
            if let Some(label) = self.pending_label.take() {
                out.push_str(&format!("{}:", label.id()));
            }
        }
        out.push_str(&body);
        if let Some(comment) = comment {
            out.push_str(&format!("\t/* {comment} */"));
        }
        writeln!(self.sink, "{out}")
    }

    /// Emits a blank line.
    pub fn emit_newline(&mut self) -> io::Result<()> {
        self.emit_line("", None)
    }

    /// Emits a line containing only a block comment.
    pub fn emit_comment(&mut self, comment: &str) -> io::Result<()> {
        self.emit_line("", Some(comment))
    }

    /// Attaches `label` to the next emitted line. If another label is
    /// already pending, it is flushed on its own line first.
    pub fn emit_label(&mut self, label: &Label) -> io::Result<()> {
        self.flush_pending_label()?;
        label.mark_emitted();
        self.pending_label = Some(label.clone());
        Ok(())
    }

    /// Emits a `.string "..."` directive. The text is embedded verbatim;
    /// escaping it is the responsibility of whoever produced the AST.
    pub fn emit_string(&mut self, text: &str) -> io::Result<()> {
        self.emit_line(&format!(".string \"{text}\""), None)
    }

    /// Emits a `.byte` directive.
    pub fn emit_byte(&mut self, value: impl Display, comment: Option<&str>) -> io::Result<()> {
        self.emit_line(&format!(".byte {value}"), comment)
    }

    /// Emits a `.2byte` directive.
    pub fn emit_2byte(&mut self, value: impl Display, comment: Option<&str>) -> io::Result<()> {
        self.emit_line(&format!(".2byte {value}"), comment)
    }

    /// Emits a `.4byte` directive.
    pub fn emit_4byte(&mut self, value: impl Display, comment: Option<&str>) -> io::Result<()> {
        self.emit_line(&format!(".4byte {value}"), comment)
    }

    /// Emits an `.8byte` directive.
    pub fn emit_8byte(&mut self, value: impl Display, comment: Option<&str>) -> io::Result<()> {
        self.emit_line(&format!(".8byte {value}"), comment)
    }

    /// Emits a `.uleb128` directive. No bit-level LEB128 encoding happens
    /// here: the decimal value is written verbatim and the assembler
    /// performs the variable-length encoding.
    pub fn emit_uleb128(&mut self, value: impl Display, comment: Option<&str>) -> io::Result<()> {
        self.emit_line(&format!(".uleb128 {value}"), comment)
    }

    /// Emits a `.sleb128` directive, on the same terms as
    /// [`emit_uleb128`](Writer::emit_uleb128).
    pub fn emit_sleb128(&mut self, value: impl Display, comment: Option<&str>) -> io::Result<()> {
        self.emit_line(&format!(".sleb128 {value}"), comment)
    }

    /// Emits a `.balign` directive.
    pub fn emit_balign(&mut self, align: u32) -> io::Result<()> {
        self.emit_line(&format!(".balign {align}"), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::LabelAllocator;

    fn rendered<F>(f: F) -> String
    where
        F: FnOnce(&mut Writer<Vec<u8>>) -> io::Result<()>,
    {
        let mut w = Writer::new(Vec::new());
        f(&mut w).unwrap();
        String::from_utf8(w.finish().unwrap()).unwrap()
    }

    #[test]
    fn directive_lines_are_indented() {
        let out = rendered(|w| w.emit_line(".balign 4", None));
        assert_eq!(out, "\t.balign 4\n");
    }

    #[test]
    fn preprocessor_lines_are_not_indented_and_never_get_a_label() {
        let mut alloc = LabelAllocator::new();
        let label = alloc.alloc();
        let out = rendered(|w| {
            w.emit_label(&label)?;
            w.emit_line("#define FOO 1", None)?;
            w.emit_line(".balign 4", None)
        });
        // The label skips over the #define line and attaches to the next
        // real line instead.
        assert_eq!(out, "#define FOO 1\n1:\t.balign 4\n");
    }

    #[test]
    fn blank_comment_only_lines_can_carry_a_pending_label() {
        let mut alloc = LabelAllocator::new();
        let label = alloc.alloc();
        let out = rendered(|w| {
            w.emit_label(&label)?;
            w.emit_comment("hello")
        });
        assert_eq!(out, "1:\t/* hello */\n");
    }

    #[test]
    fn a_second_pending_label_flushes_the_first_on_its_own_line() {
        let mut alloc = LabelAllocator::new();
        let a = alloc.alloc();
        let b = alloc.alloc();
        let out = rendered(|w| {
            w.emit_label(&a)?;
            w.emit_label(&b)?;
            w.emit_line(".balign 4", None)
        });
        assert_eq!(out, "1:\n2:\t.balign 4\n");
    }

    #[test]
    fn comment_is_appended_in_block_comment_syntax() {
        let out = rendered(|w| w.emit_4byte(5u32, Some("five")));
        assert_eq!(out, "\t.4byte 5\t/* five */\n");
    }
}
