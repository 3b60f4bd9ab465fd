// SPDX-License-Identifier: Apache-2.0 WITH LLVM-Exception

//! The table of `DW_OP_*` mnemonics this emitter knows how to encode.
//!
//! Standard DWARF-2 expression opcodes cover the stack-manipulation and
//! constant-loading operations; three vendor mnemonics in the
//! `DW_OP_lo_user` range (0xe0 and up) cover the call/branch primitives
//! Infinity notes add on top of a DWARF expression.

/// The first code point in DWARF's vendor-extension range.
pub const DW_OP_LO_USER: u8 = 0xe0;

/// Looks up the numeric encoding for a `DW_OP_*` mnemonic, without the
/// `DW_OP_` prefix (e.g. `"lit0"`, `"const1u"`, `"bra"`).
///
/// Returns `None` for a mnemonic this table doesn't recognize.
pub fn dwarf_opcode(mnemonic: &str) -> Option<u8> {
    if let Some(rest) = mnemonic.strip_prefix("lit") {
        let n: u8 = rest.parse().ok()?;
        return (n < 32).then(|| 0x30 + n);
    }
    let code = match mnemonic {
        "deref" => 0x06,
        "const1u" => 0x08,
        "const1s" => 0x09,
        "const2u" => 0x0a,
        "const2s" => 0x0b,
        "const4u" => 0x0c,
        "const4s" => 0x0d,
        "const8u" => 0x0e,
        "const8s" => 0x0f,
        "constu" => 0x10,
        "consts" => 0x11,
        "dup" => 0x12,
        "drop" => 0x13,
        "over" => 0x14,
        "pick" => 0x15,
        "swap" => 0x16,
        "rot" => 0x17,
        // Vendor extensions: call/branch primitives Infinity notes add on
        // top of a plain DWARF expression.
        "call" => DW_OP_LO_USER,
        "bra" => DW_OP_LO_USER + 1,
        "skip" => DW_OP_LO_USER + 2,
        "eq" => DW_OP_LO_USER + 3,
        "ne" => DW_OP_LO_USER + 4,
        "lt" => DW_OP_LO_USER + 5,
        "le" => DW_OP_LO_USER + 6,
        "gt" => DW_OP_LO_USER + 7,
        "ge" => DW_OP_LO_USER + 8,
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lit_opcodes_cover_the_full_range() {
        assert_eq!(dwarf_opcode("lit0"), Some(0x30));
        assert_eq!(dwarf_opcode("lit31"), Some(0x4f));
        assert_eq!(dwarf_opcode("lit32"), None);
    }

    #[test]
    fn standard_const_opcodes_are_stable() {
        assert_eq!(dwarf_opcode("const1u"), Some(0x08));
        assert_eq!(dwarf_opcode("const8s"), Some(0x0f));
    }

    #[test]
    fn vendor_opcodes_start_at_lo_user() {
        assert_eq!(dwarf_opcode("call"), Some(DW_OP_LO_USER));
        assert_eq!(dwarf_opcode("bra"), Some(DW_OP_LO_USER + 1));
    }

    #[test]
    fn unknown_mnemonic_is_none() {
        assert_eq!(dwarf_opcode("frobnicate"), None);
    }
}
