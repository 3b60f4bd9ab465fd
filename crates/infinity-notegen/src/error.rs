// SPDX-License-Identifier: Apache-2.0 WITH LLVM-Exception

//! [`NotegenError`], the reason a driver run was unsuccessful.

use std::fmt::Display;

use infinity_asm::EmitError;

/// Error indicating why translating one input to one output was
/// unsuccessful.
#[derive(Debug)]
pub enum NotegenError {
    /// The input couldn't be parsed as an Infinity note AST.
    Parse(serde_json::Error),
    /// Emitting assembly for a well-formed AST failed.
    Emit(EmitError),
    /// There was an I/O error reading the input.
    InputError(std::io::Error),
    /// There was an I/O error writing the output.
    OutputError(std::io::Error),
}

impl Display for NotegenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotegenError::Parse(e) => write!(f, "malformed input: {e}"),
            NotegenError::Emit(e) => write!(f, "{e}"),
            NotegenError::InputError(e) => write!(f, "while reading input: {e}"),
            NotegenError::OutputError(e) => write!(f, "while writing output: {e}"),
        }
    }
}

impl std::error::Error for NotegenError {}

impl From<EmitError> for NotegenError {
    fn from(e: EmitError) -> Self {
        NotegenError::Emit(e)
    }
}
