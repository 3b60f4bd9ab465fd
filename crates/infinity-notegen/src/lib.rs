//! Driver crate: reads an Infinity note AST as JSON and writes the
//! assembly text [`infinity_asm`] produces for it.

use std::io::{Read, Write};
use std::path::PathBuf;

use infinity_asm::{Emitter, TopLevel};

mod error;
pub use error::NotegenError;

/// Where to read the AST from and where to write the rendered assembly.
#[derive(Debug, Clone, Default)]
pub struct NotegenOptions {
    pub(crate) input: Option<PathBuf>,
    pub(crate) output: Option<PathBuf>,
}

impl NotegenOptions {
    /// Options with no input/output path set: read from stdin, write to
    /// stdout.
    pub fn new() -> Self {
        NotegenOptions::default()
    }

    /// Sets the input path. `None` means stdin.
    pub fn set_input(&mut self, input: Option<PathBuf>) {
        self.input = input;
    }

    /// Sets the output path. `None` means stdout.
    pub fn set_output(&mut self, output: Option<PathBuf>) {
        self.output = output;
    }
}

fn read_input(options: &NotegenOptions) -> Result<TopLevel, NotegenError> {
    let text = if let Some(path) = &options.input {
        std::fs::read_to_string(path).map_err(NotegenError::InputError)?
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(NotegenError::InputError)?;
        buf
    };
    serde_json::from_str(&text).map_err(NotegenError::Parse)
}

fn write_output(options: &NotegenOptions, text: &[u8]) -> Result<usize, NotegenError> {
    if let Some(path) = &options.output {
        let mut file = std::fs::File::create(path).map_err(NotegenError::OutputError)?;
        file.write_all(text).map_err(NotegenError::OutputError)?;
        file.flush().map_err(NotegenError::OutputError)?;
    } else {
        let mut stdout = std::io::stdout();
        stdout.write_all(text).map_err(NotegenError::OutputError)?;
        stdout.flush().map_err(NotegenError::OutputError)?;
    }
    Ok(text.len())
}

/// Reads the AST described by `options.input`, emits assembly text for it,
/// and writes it to `options.output`. Returns the number of bytes written.
pub fn translate(options: &NotegenOptions) -> Result<usize, NotegenError> {
    let toplevel = read_input(options)?;

    let mut emitter = Emitter::new(Vec::new());
    emitter.emit_toplevel(&toplevel)?;
    let bytes = emitter.finish().map_err(NotegenError::OutputError)?;

    write_output(options, &bytes)
}
