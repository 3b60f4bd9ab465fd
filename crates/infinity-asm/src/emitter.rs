// SPDX-License-Identifier: Apache-2.0 WITH LLVM-Exception

//! [`Emitter`]: the top-level driver tying the writer, label allocator,
//! string table, autos table, and opcode table together.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Write;

use crate::ast::{AutoRef, Function, FullName, Op, OpKind, OperationStream, TopLevel};
use crate::autos::AutosTable;
use crate::error::EmitError;
use crate::label::{label_diff, Label, LabelAllocator};
use crate::opcodes::dwarf_opcode;
use crate::strings::StringTable;
use crate::writer::Writer;

/// Translates a [`TopLevel`] into the textual assembly for a
/// `.note.infinity` ELF note section.
pub struct Emitter<W> {
    writer: Writer<W>,
    alloc: LabelAllocator,
    defined_opcodes: HashSet<String>,
}

impl<W: Write> Emitter<W> {
    /// Wraps `sink` in a fresh emitter.
    pub fn new(sink: W) -> Self {
        Emitter {
            writer: Writer::new(sink),
            alloc: LabelAllocator::new(),
            defined_opcodes: HashSet::new(),
        }
    }

    /// Consumes the emitter, returning its sink.
    pub fn finish(self) -> std::io::Result<W> {
        self.writer.finish()
    }

    /// Emits the note preamble and every function in `toplevel`.
    pub fn emit_toplevel(&mut self, toplevel: &TopLevel) -> Result<(), EmitError> {
        self.writer
            .emit_line("#define NT_GNU_INFINITY 5", None)?;
        self.writer
            .emit_line("#define ELF_NOTE_I8_FUNCTION 1", None)?;
        self.writer.emit_newline()?;
        self.writer
            .emit_line(".section .note.infinity, \"\", \"note\"", None)?;
        self.writer.emit_balign(4)?;
        for function in &toplevel.functions {
            self.emit_function(function)?;
        }
        Ok(())
    }

    /// Emits one function as one complete ELF note: the name/desc/type
    /// header per the generic NetBSD-style ELF note layout, followed by
    /// the Infinity-specific function descriptor in the `desc` field.
    fn emit_function(&mut self, function: &Function) -> Result<(), EmitError> {
        let namestart = self.alloc.alloc();
        let namelimit = self.alloc.alloc();
        let descstart = self.alloc.alloc();
        let desclimit = self.alloc.alloc();

        self.writer.emit_newline()?;
        self.writer.emit_comment(&full_name(&function.name))?;
        self.writer
            .emit_4byte(label_diff(&namelimit, &namestart), Some("namesz"))?;
        self.writer
            .emit_4byte(label_diff(&desclimit, &descstart), Some("descsz"))?;
        self.writer.emit_4byte("NT_GNU_INFINITY", None)?;
        self.writer.emit_label(&namestart)?;
        self.writer.emit_string("GNU")?;
        self.writer.emit_label(&namelimit)?;
        self.writer.emit_balign(4)?;
        self.writer.emit_label(&descstart)?;
        self.emit_function_descriptor(function)?;
        self.writer.emit_label(&desclimit)?;
        self.writer.emit_balign(4)?;
        Ok(())
    }

    fn emit_function_descriptor(&mut self, function: &Function) -> Result<(), EmitError> {
        let headerstart = self.alloc.alloc();
        let codestart = self.alloc.alloc();
        let autosstart = self.alloc.alloc();

        let mut strings = StringTable::new();
        let mut autos = AutosTable::new();

        let provider = strings.new_string(function.name.provider.clone());
        let name = strings.new_string(function.name.name.clone());
        let userptypes = strings.new_string("");
        let autoptypes = strings.new_string("");
        let returntypes = strings.new_string("");

        for param in &function.user_params {
            userptypes.append(&param.encoding.to_string());
        }
        for auto in &function.autos {
            match auto {
                AutoRef::Func(funcref) => {
                    autoptypes.append("f");
                    let fprovider = strings.new_string(funcref.name.provider.clone());
                    let fname = strings.new_string(funcref.name.name.clone());
                    let args: String = funcref.param_types.iter().collect();
                    let rets: String = funcref.return_types.iter().collect();
                    let args = strings.new_string(args);
                    let rets = strings.new_string(rets);
                    autos.add_funcref(fprovider, fname, args, rets);
                }
                AutoRef::Symbol(symref) => {
                    autoptypes.append("s");
                    let sprovider = strings.new_string(symref.name.provider.clone());
                    let sname = strings.new_string(symref.name.name.clone());
                    autos.add_symref(sprovider, sname);
                }
            }
        }
        for ret in &function.return_types {
            returntypes.append(&ret.to_string());
        }

        strings.layout(&mut self.alloc);

        self.writer.emit_2byte("ELF_NOTE_I8_FUNCTION", None)?;
        self.writer.emit_2byte(1u32, Some("version"))?;

        self.writer.emit_label(&headerstart)?;
        self.writer.emit_2byte(
            label_diff(&codestart, &headerstart),
            Some("header size"),
        )?;
        self.writer
            .emit_2byte(label_diff(&autosstart, &codestart), Some("code size"))?;
        self.writer.emit_2byte(
            label_diff(strings.start_label(), &autosstart),
            Some("autos size"),
        )?;
        self.writer
            .emit_2byte(provider.offset(), Some("provider offset"))?;
        self.writer.emit_2byte(name.offset(), Some("name offset"))?;
        self.writer
            .emit_2byte(userptypes.offset(), Some("param types offset"))?;
        self.writer
            .emit_2byte(returntypes.offset(), Some("return types offset"))?;
        self.writer
            .emit_2byte(autoptypes.offset(), Some("autos types offset"))?;
        self.writer
            .emit_2byte(function.max_stack, Some("max stack"))?;

        self.writer.emit_label(&codestart)?;
        self.emit_ops(&function.name, &function.ops)?;

        self.writer.emit_label(&autosstart)?;
        autos.emit(&mut self.writer)?;

        strings.emit(&mut self.writer)?;

        Ok(())
    }

    fn emit_ops(&mut self, function_name: &FullName, stream: &OperationStream) -> Result<(), EmitError> {
        let mut targets = BTreeSet::new();
        for op in &stream.ops {
            match op.kind {
                OpKind::Branch(target) | OpKind::Goto(target) => {
                    targets.insert(target);
                }
                _ => {}
            }
        }
        for target in &targets {
            if *target >= stream.ops.len() {
                return Err(EmitError::DanglingJumpTarget {
                    function: full_name(function_name),
                    target: *target,
                });
            }
        }

        let mut labels: HashMap<usize, Label> = HashMap::new();
        for target in &targets {
            labels.insert(*target, self.alloc.alloc());
        }

        for (index, op) in stream.ops.iter().enumerate() {
            if let Some(label) = labels.get(&index) {
                self.writer.emit_label(label)?;
            }
            self.emit_op(op, &labels)?;
        }
        Ok(())
    }

    fn emit_op(&mut self, op: &Op, labels: &HashMap<usize, Label>) -> Result<(), EmitError> {
        let comment = op.fileline.as_ref().map(|fl| fl.to_string());
        let comment = comment.as_deref();
        match &op.kind {
            OpKind::Const(value) => self.emit_const(*value, comment)?,
            OpKind::Deref { size: None } => self.emit_simple("deref", comment)?,
            OpKind::Deref { size: Some(_) } => {
                return Err(EmitError::NotImplemented("sized dereference"))
            }
            OpKind::Drop => self.emit_simple("drop", comment)?,
            OpKind::Dup => self.emit_simple("dup", comment)?,
            OpKind::Over => self.emit_simple("over", comment)?,
            OpKind::Pick(0) => self.emit_simple("dup", comment)?,
            OpKind::Pick(1) => self.emit_simple("over", comment)?,
            OpKind::Pick(slot) => {
                self.emit_simple("pick", comment)?;
                self.writer.emit_byte(*slot, None)?;
            }
            OpKind::Rot => self.emit_simple("rot", comment)?,
            OpKind::Swap => self.emit_simple("swap", comment)?,
            OpKind::Call => self.emit_simple("call", comment)?,
            OpKind::Compare(kind) => self.emit_simple(kind.mnemonic(), comment)?,
            OpKind::Branch(target) => self.emit_branch("bra", *target, labels, comment)?,
            OpKind::Goto(target) => self.emit_branch("skip", *target, labels, comment)?,
            OpKind::Name | OpKind::Stop => {}
        }
        Ok(())
    }

    fn emit_branch(
        &mut self,
        mnemonic: &str,
        target: usize,
        labels: &HashMap<usize, Label>,
        comment: Option<&str>,
    ) -> Result<(), EmitError> {
        let target_label = labels
            .get(&target)
            .expect("every branch/goto target was pre-allocated a label in emit_ops");
        let source = self.alloc.alloc();
        self.emit_simple(mnemonic, comment)?;
        self.writer
            .emit_2byte(label_diff(target_label, &source), None)?;
        self.writer.emit_label(&source)?;
        Ok(())
    }

    fn emit_const(&mut self, value: i128, comment: Option<&str>) -> Result<(), EmitError> {
        if value >= 0 {
            if value < 0x20 {
                let mnemonic = format!("lit{value}");
                self.emit_simple(&mnemonic, comment)?;
            } else if value < (1 << 8) {
                self.emit_simple("const1u", comment)?;
                self.writer.emit_byte(value, None)?;
            } else if value < (1 << 16) {
                self.emit_simple("const2u", comment)?;
                self.writer.emit_2byte(value, None)?;
            } else if value < (1 << 21) {
                self.emit_simple("constu", comment)?;
                self.writer.emit_uleb128(value, None)?;
            } else if value < (1i128 << 32) {
                self.emit_simple("const4u", comment)?;
                self.writer.emit_4byte(value, None)?;
            } else if value < (1i128 << 49) {
                self.emit_simple("constu", comment)?;
                self.writer.emit_uleb128(value, None)?;
            } else if value < (1i128 << 64) {
                self.emit_simple("const8u", comment)?;
                self.writer.emit_8byte(value, None)?;
            } else {
                self.emit_simple("constu", comment)?;
                self.writer.emit_uleb128(value, None)?;
            }
        } else if value >= -(1 << 7) {
            self.emit_simple("const1s", comment)?;
            self.writer.emit_byte(value, None)?;
        } else if value >= -(1 << 15) {
            self.emit_simple("const2s", comment)?;
            self.writer.emit_2byte(value, None)?;
        } else if value >= -(1 << 20) {
            self.emit_simple("consts", comment)?;
            self.writer.emit_sleb128(value, None)?;
        } else if value >= -(1i128 << 31) {
            self.emit_simple("const4s", comment)?;
            self.writer.emit_4byte(value, None)?;
        } else if value >= -(1i128 << 48) {
            self.emit_simple("consts", comment)?;
            self.writer.emit_sleb128(value, None)?;
        } else if value >= -(1i128 << 63) {
            self.emit_simple("const8s", comment)?;
            self.writer.emit_8byte(value, None)?;
        } else {
            self.emit_simple("consts", comment)?;
            self.writer.emit_sleb128(value, None)?;
        }
        Ok(())
    }

    fn emit_simple(&mut self, mnemonic: &str, comment: Option<&str>) -> Result<(), EmitError> {
        self.define_opcode(mnemonic)?;
        self.writer
            .emit_byte(format!("DW_OP_{mnemonic}"), comment)?;
        Ok(())
    }

    fn define_opcode(&mut self, mnemonic: &str) -> Result<(), EmitError> {
        let macro_name = format!("DW_OP_{mnemonic}");
        if !self.defined_opcodes.contains(&macro_name) {
            let code = dwarf_opcode(mnemonic)
                .ok_or_else(|| EmitError::UnknownOpcode(mnemonic.to_string()))?;
            self.writer
                .emit_line(&format!("#define {macro_name} {code:#04x}"), None)?;
            self.defined_opcodes.insert(macro_name);
        }
        Ok(())
    }
}

fn full_name(name: &FullName) -> String {
    format!("{}::{}", name.provider, name.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompareKind, FileLine, FuncRef, Parameter, SymbolRef};

    fn rendered(toplevel: &TopLevel) -> String {
        let mut emitter = Emitter::new(Vec::new());
        emitter.emit_toplevel(toplevel).unwrap();
        String::from_utf8(emitter.finish().unwrap()).unwrap()
    }

    fn empty_function(name: &str) -> Function {
        Function {
            name: FullName {
                provider: "test".to_string(),
                name: name.to_string(),
            },
            user_params: vec![],
            autos: vec![],
            return_types: vec![],
            max_stack: 1,
            ops: OperationStream { ops: vec![] },
        }
    }

    #[test]
    fn empty_function_still_emits_a_complete_note() {
        let out = rendered(&TopLevel {
            functions: vec![empty_function("nop")],
        });
        assert!(out.contains("#define NT_GNU_INFINITY 5"));
        assert!(out.contains(".section .note.infinity"));
        assert!(out.contains("/* test::nop */"));
        assert!(out.contains("namesz"));
        assert!(out.contains("descsz"));
    }

    #[test]
    fn small_const_emits_a_lit_opcode() {
        let mut function = empty_function("five");
        function.ops.ops.push(Op {
            kind: OpKind::Const(5),
            fileline: None,
        });
        let out = rendered(&TopLevel {
            functions: vec![function],
        });
        assert!(out.contains("#define DW_OP_lit5 0x35"));
        assert!(out.contains(".byte DW_OP_lit5"));
        assert!(!out.contains("const1u"));
    }

    #[test]
    fn mid_range_const_uses_const2u() {
        let mut function = empty_function("bignum");
        function.ops.ops.push(Op {
            kind: OpKind::Const(256),
            fileline: None,
        });
        let out = rendered(&TopLevel {
            functions: vec![function],
        });
        assert!(out.contains("DW_OP_const2u"));
        assert!(out.contains(".2byte 256"));
    }

    #[test]
    fn negative_one_uses_const1s() {
        let mut function = empty_function("minus_one");
        function.ops.ops.push(Op {
            kind: OpKind::Const(-1),
            fileline: None,
        });
        let out = rendered(&TopLevel {
            functions: vec![function],
        });
        assert!(out.contains("DW_OP_const1s"));
        assert!(out.contains(".byte -1"));
    }

    #[test]
    fn pick_zero_and_one_fold_into_dup_and_over() {
        let mut function = empty_function("pick01");
        function.ops.ops.push(Op {
            kind: OpKind::Pick(0),
            fileline: None,
        });
        function.ops.ops.push(Op {
            kind: OpKind::Pick(1),
            fileline: None,
        });
        function.ops.ops.push(Op {
            kind: OpKind::Pick(3),
            fileline: None,
        });
        let out = rendered(&TopLevel {
            functions: vec![function],
        });
        assert!(out.contains("DW_OP_dup"));
        assert!(out.contains("DW_OP_over"));
        assert!(out.contains("DW_OP_pick"));
        assert!(out.contains(".byte 3"));
    }

    #[test]
    fn opcode_macro_is_defined_only_once() {
        let mut function = empty_function("twice");
        function.ops.ops.push(Op {
            kind: OpKind::Dup,
            fileline: None,
        });
        function.ops.ops.push(Op {
            kind: OpKind::Dup,
            fileline: None,
        });
        let out = rendered(&TopLevel {
            functions: vec![function],
        });
        assert_eq!(out.matches("#define DW_OP_dup").count(), 1);
        assert_eq!(out.matches(".byte DW_OP_dup").count(), 2);
    }

    #[test]
    fn forward_goto_renders_a_forward_label_reference() {
        // ops[0] = goto(1): the target (index 1) hasn't been emitted yet
        // when the branch offset is rendered, so it must read "<n>f", not
        // "<n>b".
        let mut function = empty_function("forward_jump");
        function.ops.ops.push(Op {
            kind: OpKind::Goto(1),
            fileline: None,
        });
        function.ops.ops.push(Op {
            kind: OpKind::Drop,
            fileline: None,
        });
        let out = rendered(&TopLevel {
            functions: vec![function],
        });
        let lines: Vec<&str> = out.lines().collect();
        let skip_index = lines
            .iter()
            .position(|l| l.contains(".byte DW_OP_skip"))
            .expect("goto should emit DW_OP_skip");
        let offset_line = lines[skip_index + 1];
        assert!(offset_line.trim_start().starts_with(".2byte"));
        assert!(offset_line.contains('f'));
    }

    #[test]
    fn dangling_jump_target_is_an_error() {
        let mut function = empty_function("broken");
        function.ops.ops.push(Op {
            kind: OpKind::Goto(5),
            fileline: None,
        });
        let toplevel = TopLevel {
            functions: vec![function],
        };
        let mut emitter = Emitter::new(Vec::new());
        let err = emitter.emit_toplevel(&toplevel).unwrap_err();
        assert!(matches!(err, EmitError::DanglingJumpTarget { .. }));
    }

    #[test]
    fn parameter_and_return_type_encodings_reach_the_string_table() {
        let mut function = empty_function("typed");
        function.user_params.push(Parameter { encoding: 'i' });
        function.user_params.push(Parameter { encoding: 'l' });
        function.return_types.push('i');
        let out = rendered(&TopLevel {
            functions: vec![function],
        });
        assert!(out.contains("\"il\""));
    }

    #[test]
    fn fileline_becomes_a_trailing_comment() {
        let mut function = empty_function("annotated");
        function.ops.ops.push(Op {
            kind: OpKind::Drop,
            fileline: Some(FileLine {
                file: "example.i8".to_string(),
                line: 12,
            }),
        });
        let out = rendered(&TopLevel {
            functions: vec![function],
        });
        assert!(out.contains("/* example.i8:12 */"));
    }

    #[test]
    fn funcref_and_symref_autos_populate_the_autos_table_and_autoptypes() {
        let mut function = empty_function("with_autos");
        function.autos.push(AutoRef::Func(FuncRef {
            name: FullName {
                provider: "example".to_string(),
                name: "helper".to_string(),
            },
            param_types: vec!['i', 'l'],
            return_types: vec!['i'],
        }));
        function.autos.push(AutoRef::Symbol(SymbolRef {
            name: FullName {
                provider: "example".to_string(),
                name: "counter".to_string(),
            },
        }));
        let out = rendered(&TopLevel {
            functions: vec![function],
        });

        // autoptypes: one funcref ('f') then one symref ('s').
        assert!(out.contains("\"fs\""));

        // autos block: exactly two records, the first with a ptypes/rtypes
        // pair, the second with reserved bytes instead.
        assert!(out.contains("auto 0 provider offset"));
        assert!(out.contains("auto 0 name offset"));
        assert!(out.contains("auto 0 ptypes offset"));
        assert!(out.contains("auto 0 rtypes offset"));
        assert!(out.contains("auto 1 provider offset"));
        assert!(out.contains("auto 1 name offset"));
        assert!(out.contains("auto 1 reserved bytes"));
        assert!(!out.contains("auto 1 ptypes offset"));

        // The funcref's signature strings reach the string pool.
        assert!(out.contains("\"il\""));
        assert!(out.contains("\"helper\""));
        assert!(out.contains("\"counter\""));
    }

    #[test]
    fn backward_goto_renders_a_backward_label_reference() {
        // ops[0] is the jump target; ops[1] is the goto itself, jumping
        // back to an index that has already been emitted by the time the
        // offset is rendered, so it must read "<n>b", not "<n>f".
        let mut function = empty_function("backward_jump");
        function.ops.ops.push(Op {
            kind: OpKind::Dup,
            fileline: None,
        });
        function.ops.ops.push(Op {
            kind: OpKind::Goto(0),
            fileline: None,
        });
        let out = rendered(&TopLevel {
            functions: vec![function],
        });
        let lines: Vec<&str> = out.lines().collect();
        let skip_index = lines
            .iter()
            .position(|l| l.contains(".byte DW_OP_skip"))
            .expect("goto should emit DW_OP_skip");
        let offset_line = lines[skip_index + 1];
        assert!(offset_line.trim_start().starts_with(".2byte"));
        assert!(offset_line.contains('b'));
        assert!(!offset_line.contains('f'));
    }

    #[test]
    fn conditional_branch_emits_bra_and_a_forward_reference() {
        let mut function = empty_function("conditional");
        function.ops.ops.push(Op {
            kind: OpKind::Branch(2),
            fileline: None,
        });
        function.ops.ops.push(Op {
            kind: OpKind::Drop,
            fileline: None,
        });
        function.ops.ops.push(Op {
            kind: OpKind::Dup,
            fileline: None,
        });
        let out = rendered(&TopLevel {
            functions: vec![function],
        });
        assert!(out.contains("#define DW_OP_bra"));
        assert!(out.contains(".byte DW_OP_bra"));
        let lines: Vec<&str> = out.lines().collect();
        let bra_index = lines
            .iter()
            .position(|l| l.contains(".byte DW_OP_bra"))
            .expect("branch should emit DW_OP_bra");
        let offset_line = lines[bra_index + 1];
        assert!(offset_line.trim_start().starts_with(".2byte"));
        assert!(offset_line.contains('f'));
    }

    #[test]
    fn compare_and_branch_express_conditional_control_flow() {
        // Construct the only way this bytecode expresses an `if`: a
        // Compare leaving a boolean on the stack, consumed by a Branch.
        let mut function = empty_function("if_else");
        function.ops.ops.push(Op {
            kind: OpKind::Compare(CompareKind::Lt),
            fileline: None,
        });
        function.ops.ops.push(Op {
            kind: OpKind::Branch(4),
            fileline: None,
        });
        function.ops.ops.push(Op {
            kind: OpKind::Call,
            fileline: None,
        });
        function.ops.ops.push(Op {
            kind: OpKind::Goto(5),
            fileline: None,
        });
        function.ops.ops.push(Op {
            kind: OpKind::Swap,
            fileline: None,
        });
        function.ops.ops.push(Op {
            kind: OpKind::Rot,
            fileline: None,
        });
        let out = rendered(&TopLevel {
            functions: vec![function],
        });
        assert!(out.contains(".byte DW_OP_lt"));
        assert!(out.contains(".byte DW_OP_bra"));
        assert!(out.contains(".byte DW_OP_call"));
        assert!(out.contains(".byte DW_OP_skip"));
        assert!(out.contains(".byte DW_OP_swap"));
        assert!(out.contains(".byte DW_OP_rot"));
    }
}
