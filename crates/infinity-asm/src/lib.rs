// SPDX-License-Identifier: Apache-2.0 WITH LLVM-Exception

//! Assembler-text emitter for Infinity notes.
//!
//! Infinity is a stack-bytecode dialect embedded in DWARF expressions,
//! used to describe how to compute a value (an array length, say) that
//! isn't directly present in a program's debug information. An Infinity
//! note packages one such bytecode routine, plus its signature and the
//! symbols it needs resolved at load time, into an ELF note record in a
//! `.note.infinity` section.
//!
//! This crate does not assemble or link anything itself. Its output is
//! GNU-assembler-syntax text: `.byte`/`.2byte`/`.uleb128`-style
//! directives, GNU local labels (`1:`, `2f`, `3b`), and `#define`
//! preprocessor lines for the opcode values it uses. Running that text
//! through `as` and a linker is what actually produces an ELF note.
//!
//! The entry point is [`Emitter`]: construct one over any [`std::io::Write`]
//! sink, hand it a [`ast::TopLevel`], and call
//! [`emit_toplevel`](Emitter::emit_toplevel).

mod ast;
mod autos;
mod emitter;
mod error;
mod label;
mod opcodes;
mod strings;
mod writer;

pub use ast::{
    AutoRef, CompareKind, FileLine, Function, FullName, FuncRef, Op, OpKind, OperationStream,
    Parameter, SymbolRef, TopLevel,
};
pub use autos::AutosTable;
pub use emitter::Emitter;
pub use error::EmitError;
pub use label::{label_diff, Label, LabelAllocator};
pub use opcodes::{dwarf_opcode, DW_OP_LO_USER};
pub use strings::{StringHandle, StringTable};
pub use writer::Writer;
