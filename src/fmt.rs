//! Renders machine words back into assembly text.

use thiserror::Error;

use crate::arch::{ArgKind, Op, Register, Value};
use crate::types::Word;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum FmtError {
    #[error("unknown opcode {0}")]
    UnknownOpcode(Value),
    #[error("register with code {0} doesn't exist")]
    UnknownRegister(Value),
    #[error("unexpected number of arguments for {op}: expected {expected}, got {got}")]
    ArgumentCount {
        op: Op,
        expected: usize,
        got: usize,
    },
}

/// # Errors
///
/// Will return `Err` if `code` names no register
pub fn fmt_register(code: Value) -> Result<String, FmtError> {
    Register::by_code(code)
        .map(|reg| reg.to_string())
        .ok_or(FmtError::UnknownRegister(code))
}

#[must_use]
pub fn fmt_immediate(value: Value) -> String {
    value.to_string()
}

/// Formats `opcode` and `args` as `MNEMONIC arg, arg, ...`.
///
/// # Errors
///
/// Will return `Err` if the opcode is unknown, the argument count does not
/// match the operation or a register argument has no matching register
pub fn fmt_instruction(opcode: Value, args: &[Value]) -> Result<String, FmtError> {
    let op = Op::by_code(opcode).ok_or(FmtError::UnknownOpcode(opcode))?;
    let kinds = op.shape().kinds();
    if kinds.len() != args.len() {
        return Err(FmtError::ArgumentCount {
            op,
            expected: kinds.len(),
            got: args.len(),
        });
    }

    let operands = kinds
        .iter()
        .zip(args)
        .map(|(kind, arg)| match kind {
            ArgKind::Register => fmt_register(*arg),
            ArgKind::Immediate => Ok(fmt_immediate(*arg)),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if operands.is_empty() {
        return Ok(op.name().to_string());
    }
    Ok(format!("{} {}", op.name(), operands.join(", ")))
}

/// # Errors
///
/// Will return `Err` if `word` is a command that cannot be formatted
pub fn fmt_word(word: &Word) -> Result<String, FmtError> {
    match word {
        Word::Data(v) => Ok(fmt_immediate(*v)),
        Word::Command(c) => fmt_instruction(c.opcode, &c.args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Command;

    #[test]
    fn formats_each_shape() {
        assert_eq!(fmt_instruction(22, &[]).unwrap(), "HLT");
        assert_eq!(fmt_instruction(1, &[0, 1, 2]).unwrap(), "ADD %R0, %R1, %R2");
        assert_eq!(fmt_instruction(2, &[3, 3, -1]).unwrap(), "ADDI %R3, %R3, -1");
        assert_eq!(fmt_instruction(9, &[4, 5]).unwrap(), "LD %R4, %R5");
        assert_eq!(fmt_instruction(11, &[7, 42]).unwrap(), "LDI %R7, 42");
        assert_eq!(fmt_instruction(15, &[6]).unwrap(), "OUT %R6");
    }

    #[test]
    fn rejects_malformed_commands() {
        assert_eq!(fmt_instruction(99, &[]), Err(FmtError::UnknownOpcode(99)));
        assert_eq!(fmt_instruction(15, &[8]), Err(FmtError::UnknownRegister(8)));
        assert_eq!(
            fmt_instruction(1, &[0, 1]),
            Err(FmtError::ArgumentCount {
                op: Op::Add,
                expected: 3,
                got: 2
            })
        );
    }

    #[test]
    fn data_words_render_as_numbers() {
        assert_eq!(fmt_word(&Word::Data(-12)).unwrap(), "-12");
        assert_eq!(
            fmt_word(&Word::Command(Command::new(Op::Beq, vec![0, 1, 7]))).unwrap(),
            "BEQ %R0, %R1, 7"
        );
    }
}
