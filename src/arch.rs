use std::fmt;

/// A machine integer. Registers and memory cells hold one of these.
pub type Value = i32;

/// Name of the label marking the entry point of every program.
pub const START_LABEL: &str = "_start";

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RegisterDef {
    pub name: &'static str,
    pub code: u8,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
}

const REGISTERS: [RegisterDef; 8] = [
    RegisterDef { name: "R0", code: 0 },
    RegisterDef { name: "R1", code: 1 },
    RegisterDef { name: "R2", code: 2 },
    RegisterDef { name: "R3", code: 3 },
    RegisterDef { name: "R4", code: 4 },
    RegisterDef { name: "R5", code: 5 },
    RegisterDef { name: "R6", code: 6 },
    RegisterDef { name: "R7", code: 7 },
];

impl Register {
    pub const ALL: [Self; 8] = [
        Self::R0,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
    ];

    #[must_use]
    pub const fn def(self) -> &'static RegisterDef {
        &REGISTERS[self as usize]
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        self.def().name
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self.def().code
    }

    /// Looks a register up by name, ignoring ASCII case.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|reg| reg.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn by_code(code: Value) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|reg| Value::from(reg.code()) == code)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "%{}", self.name())
    }
}

/// The kind of a single instruction argument.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ArgKind {
    Register,
    Immediate,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Register => "register",
            Self::Immediate => "immediate",
        })
    }
}

/// Operand-shape class: the fixed arity and argument kinds of an operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ArgsShape {
    None,
    Rrr,
    Rri,
    Rr,
    Ri,
    R,
}

impl ArgsShape {
    #[must_use]
    pub const fn kinds(self) -> &'static [ArgKind] {
        use ArgKind::{Immediate as I, Register as R};
        match self {
            Self::None => &[],
            Self::Rrr => &[R, R, R],
            Self::Rri => &[R, R, I],
            Self::Rr => &[R, R],
            Self::Ri => &[R, I],
            Self::R => &[R],
        }
    }

    #[must_use]
    pub const fn arity(self) -> usize {
        self.kinds().len()
    }
}

/// How the control unit sequences an operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OpClass {
    Nop,
    Arithmetic,
    Memory,
    Io,
    Branch,
    Halt,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OpDef {
    pub name: &'static str,
    pub shape: ArgsShape,
    pub class: OpClass,
    pub code: u8,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Op {
    Nop,
    Add,
    Addi,
    Sub,
    Subi,
    Shr,
    Shri,
    Xor,
    Xori,
    Ld,
    St,
    Ldi,
    Lda,
    Sta,
    In,
    Out,
    Beq,
    Bne,
    Blt,
    Ble,
    Bgt,
    Bge,
    Hlt,
}

macro_rules! op {
    ($name:literal, $shape:ident, $class:ident, $code:literal) => {
        OpDef {
            name: $name,
            shape: ArgsShape::$shape,
            class: OpClass::$class,
            code: $code,
        }
    };
}

// Order must match the declaration order of `Op`.
const OPS: [OpDef; 23] = [
    op!("NOP", None, Nop, 0),
    op!("ADD", Rrr, Arithmetic, 1),
    op!("ADDI", Rri, Arithmetic, 2),
    op!("SUB", Rrr, Arithmetic, 3),
    op!("SUBI", Rri, Arithmetic, 4),
    op!("SHR", Rrr, Arithmetic, 5),
    op!("SHRI", Rri, Arithmetic, 6),
    op!("XOR", Rrr, Arithmetic, 7),
    op!("XORI", Rri, Arithmetic, 8),
    op!("LD", Rr, Memory, 9),
    op!("ST", Rr, Memory, 10),
    op!("LDI", Ri, Memory, 11),
    op!("LDA", Ri, Memory, 12),
    op!("STA", Ri, Memory, 13),
    op!("IN", R, Io, 14),
    op!("OUT", R, Io, 15),
    op!("BEQ", Rri, Branch, 16),
    op!("BNE", Rri, Branch, 17),
    op!("BLT", Rri, Branch, 18),
    op!("BLE", Rri, Branch, 19),
    op!("BGT", Rri, Branch, 20),
    op!("BGE", Rri, Branch, 21),
    op!("HLT", None, Halt, 22),
];

impl Op {
    pub const ALL: [Self; 23] = [
        Self::Nop,
        Self::Add,
        Self::Addi,
        Self::Sub,
        Self::Subi,
        Self::Shr,
        Self::Shri,
        Self::Xor,
        Self::Xori,
        Self::Ld,
        Self::St,
        Self::Ldi,
        Self::Lda,
        Self::Sta,
        Self::In,
        Self::Out,
        Self::Beq,
        Self::Bne,
        Self::Blt,
        Self::Ble,
        Self::Bgt,
        Self::Bge,
        Self::Hlt,
    ];

    #[must_use]
    pub const fn def(self) -> &'static OpDef {
        &OPS[self as usize]
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        self.def().name
    }

    #[must_use]
    pub const fn shape(self) -> ArgsShape {
        self.def().shape
    }

    #[must_use]
    pub const fn class(self) -> OpClass {
        self.def().class
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self.def().code
    }

    /// Looks an operation up by mnemonic, ignoring ASCII case.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn by_code(code: Value) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| Value::from(op.code()) == code)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_matches_enum_order() {
        for (i, op) in Op::ALL.into_iter().enumerate() {
            assert_eq!(usize::from(op.code()), i);
            assert_eq!(Op::by_code(Value::from(op.code())), Some(op));
        }
        for (i, reg) in Register::ALL.into_iter().enumerate() {
            assert_eq!(usize::from(reg.code()), i);
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(Op::by_name("addi"), Some(Op::Addi));
        assert_eq!(Op::by_name("HlT"), Some(Op::Hlt));
        assert_eq!(Op::by_name("mul"), None);
        assert_eq!(Register::by_name("r7"), Some(Register::R7));
        assert_eq!(Register::by_name("R8"), None);
    }

    #[test]
    fn shapes_have_expected_arity() {
        assert_eq!(Op::Hlt.shape().arity(), 0);
        assert_eq!(Op::Add.shape().arity(), 3);
        assert_eq!(Op::Beq.shape().kinds(), &[ArgKind::Register, ArgKind::Register, ArgKind::Immediate]);
        assert_eq!(Op::Ldi.shape().kinds(), &[ArgKind::Register, ArgKind::Immediate]);
        assert_eq!(Op::Out.shape().arity(), 1);
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(Op::by_code(23), None);
        assert_eq!(Op::by_code(-1), None);
        assert_eq!(Register::by_code(8), None);
    }

    #[test]
    fn registers_display_with_prefix() {
        assert_eq!(Register::R3.to_string(), "%R3");
    }
}
