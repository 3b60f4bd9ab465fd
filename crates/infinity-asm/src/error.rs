// SPDX-License-Identifier: Apache-2.0 WITH LLVM-Exception

//! [`EmitError`], the reason emission of a note can fail.

use std::fmt::Display;

/// Error indicating why emitting a function's note was unsuccessful.
#[derive(Debug)]
pub enum EmitError {
    /// A branch or goto targets an index outside its operation stream.
    DanglingJumpTarget {
        /// The function the jump occurs in.
        function: String,
        /// The out-of-range target index.
        target: usize,
    },
    /// A feature the AST can express but this emitter does not yet encode.
    NotImplemented(&'static str),
    /// An opcode mnemonic with no known `DW_OP_*` encoding.
    UnknownOpcode(String),
    /// There was an I/O error writing the output.
    Io(std::io::Error),
}

impl Display for EmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmitError::DanglingJumpTarget { function, target } => write!(
                f,
                "function `{function}` branches to operation index {target}, which does not exist"
            ),
            EmitError::NotImplemented(what) => write!(f, "not yet implemented: {what}"),
            EmitError::UnknownOpcode(name) => {
                write!(f, "opcode `{name}` has no known DW_OP_* encoding")
            }
            EmitError::Io(e) => write!(f, "while writing output: {e}"),
        }
    }
}

impl std::error::Error for EmitError {}

impl From<std::io::Error> for EmitError {
    fn from(e: std::io::Error) -> Self {
        EmitError::Io(e)
    }
}
