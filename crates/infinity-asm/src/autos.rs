// SPDX-License-Identifier: Apache-2.0 WITH LLVM-Exception

//! [`AutosTable`]: the per-function table of automatic parameter slots.

use std::io::{self, Write};

use crate::strings::StringHandle;
use crate::writer::Writer;

/// One automatic parameter slot: a function reference (with its own
/// parameter/return type signature) or a bare symbol reference (a global,
/// with no signature of its own).
pub struct AutosEntry {
    provider: StringHandle,
    name: StringHandle,
    signature: Option<(StringHandle, StringHandle)>,
}

/// The table of automatic parameters ("autos") a function's bytecode
/// resolves by name at load time: function references and symbol
/// references. Laid out as a flat array of fixed-width records, one per
/// `auto` directive encountered while walking the function's parameters.
#[derive(Default)]
pub struct AutosTable {
    entries: Vec<AutosEntry>,
}

impl AutosTable {
    /// Creates an empty autos table.
    pub fn new() -> Self {
        AutosTable {
            entries: Vec::new(),
        }
    }

    /// Records a reference to another function, identified by `provider`
    /// and `name`, along with its encoded parameter (`args`) and return
    /// (`rets`) type strings.
    pub fn add_funcref(
        &mut self,
        provider: StringHandle,
        name: StringHandle,
        args: StringHandle,
        rets: StringHandle,
    ) {
        self.entries.push(AutosEntry {
            provider,
            name,
            signature: Some((args, rets)),
        });
    }

    /// Records a reference to a bare symbol, identified by `provider` and
    /// `name`, with no signature of its own.
    pub fn add_symref(&mut self, provider: StringHandle, name: StringHandle) {
        self.entries.push(AutosEntry {
            provider,
            name,
            signature: None,
        });
    }

    /// How many entries the table holds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Emits one fixed-width record per entry: a symbol reference is a
    /// provider/name offset pair followed by four reserved zero bytes; a
    /// function reference is a provider/name offset pair followed by an
    /// args/rets type-string offset pair, the same total width.
    pub fn emit<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        for (index, entry) in self.entries.iter().enumerate() {
            let prefix = format!("auto {index} ");
            writer.emit_2byte(entry.provider.offset(), Some(&format!("{prefix}provider offset")))?;
            writer.emit_2byte(entry.name.offset(), Some(&format!("{prefix}name offset")))?;
            match &entry.signature {
                None => {
                    writer.emit_4byte(0u32, Some(&format!("{prefix}reserved bytes")))?;
                }
                Some((args, rets)) => {
                    writer.emit_2byte(args.offset(), Some(&format!("{prefix}ptypes offset")))?;
                    writer.emit_2byte(rets.offset(), Some(&format!("{prefix}rtypes offset")))?;
                }
            }
        }
        Ok(())
    }
}
