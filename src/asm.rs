use std::collections::{BTreeMap, HashMap};
use std::iter::Peekable;
use std::slice::Iter;
use thiserror::Error;

use crate::arch::{ArgKind, Op, Register, Value, START_LABEL};
use crate::lexer::{lex, LexError, Token, TokenKind};
use crate::types::{Command, Executable, Program, Word};

/// Pseudo-instruction that places literal data words into the program.
pub const DATA_DIRECTIVE: &str = "WORD";

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum AsmError {
    #[error("lexer error: {0}")]
    Lexer(#[from] LexError),
    #[error("unexpected token: {0}")]
    UnexpectedToken(Token),
    #[error("unknown instruction: {0}")]
    UnknownInstruction(String),
    #[error("invalid register: {0}")]
    InvalidRegister(String),
    #[error("{op} expects a {expected} argument, got {found}")]
    ArgumentKind {
        op: String,
        expected: String,
        found: Token,
    },
    #[error("unexpected end of program: {op} expects {expected} argument(s)")]
    MissingArgument { op: String, expected: usize },
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("label redefinition: {0}")]
    LabelRedefinition(String),
    #[error("undefined label: {0}")]
    UndefinedLabel(String),
    #[error("start label (_start) not found")]
    MissingStartLabel,
    #[error("program does not fit in the address space")]
    ProgramTooLarge,
}

#[derive(Debug, Clone)]
enum RawArgument {
    Value(Value),
    Label(String),
}

#[derive(Debug, Clone)]
enum RawWord {
    Data(RawArgument),
    Command { op: Op, args: Vec<RawArgument> },
}

/// Label name to program address, filled during the first pass.
#[derive(Debug, Default)]
pub struct LabelMap {
    inner: HashMap<String, usize>,
}

impl LabelMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Will return `Err` if `label` is not defined
    pub fn get(&self, label: &str) -> Result<usize, AsmError> {
        self.inner
            .get(label)
            .copied()
            .ok_or_else(|| AsmError::UndefinedLabel(label.to_string()))
    }

    /// # Errors
    ///
    /// Will return `Err` if `label` is already defined
    pub fn insert(&mut self, label: &str, address: usize) -> Result<(), AsmError> {
        if self.inner.contains_key(label) {
            return Err(AsmError::LabelRedefinition(label.to_string()));
        }
        crate::debug!("label {label} -> {address}");
        self.inner.insert(label.to_string(), address);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Address to label name, ordered by address. Useful for listings.
    #[must_use]
    pub fn symbol_table(&self) -> BTreeMap<usize, Vec<String>> {
        let mut table: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (name, address) in &self.inner {
            table.entry(*address).or_default().push(name.clone());
        }
        for names in table.values_mut() {
            names.sort();
        }
        table
    }
}

/// Assembles source text into a linked executable.
///
/// # Errors
///
/// Will return `Err` on the first lexical, translation or linking error
pub fn assemble(source: &str) -> Result<Executable, AsmError> {
    assemble_with_labels(source).map(|(exe, _)| exe)
}

/// Like [`assemble`], also handing back the label table.
///
/// # Errors
///
/// Will return `Err` on the first lexical, translation or linking error
pub fn assemble_with_labels(source: &str) -> Result<(Executable, LabelMap), AsmError> {
    let tokens = lex(source)?;
    let (raw, labels) = first_pass(&tokens)?;
    let start = labels.get(START_LABEL).map_err(|_| AsmError::MissingStartLabel)?;
    let program = resolve_labels(raw, &labels)?;
    crate::info!(
        "assembled {} words, {} labels, start at {start}",
        program.len(),
        labels.len()
    );
    Ok((Executable { start, program }, labels))
}

fn first_pass(tokens: &[Token]) -> Result<(Vec<RawWord>, LabelMap), AsmError> {
    let mut translator = Translator {
        tokens: tokens.iter().peekable(),
        program: vec![],
        labels: LabelMap::new(),
    };
    translator.translate()?;
    Ok((translator.program, translator.labels))
}

struct Translator<'t> {
    tokens: Peekable<Iter<'t, Token>>,
    program: Vec<RawWord>,
    labels: LabelMap,
}

impl Translator<'_> {
    fn translate(&mut self) -> Result<(), AsmError> {
        while let Some(token) = self.tokens.next() {
            match token.kind {
                TokenKind::Instruction => self.translate_instruction(token)?,
                TokenKind::Label => self.labels.insert(&token.value, self.program.len())?,
                _ => return Err(AsmError::UnexpectedToken(token.clone())),
            }
        }
        Ok(())
    }

    fn translate_instruction(&mut self, token: &Token) -> Result<(), AsmError> {
        if token.value.eq_ignore_ascii_case(DATA_DIRECTIVE) {
            return self.translate_data();
        }
        let op = Op::by_name(&token.value)
            .ok_or_else(|| AsmError::UnknownInstruction(token.value.clone()))?;
        let args = op
            .shape()
            .kinds()
            .iter()
            .map(|kind| self.translate_argument(op, *kind))
            .collect::<Result<Vec<_>, _>>()?;
        self.program.push(RawWord::Command { op, args });
        Ok(())
    }

    fn next_argument(&mut self, op: Op) -> Result<&Token, AsmError> {
        self.tokens.next().ok_or_else(|| AsmError::MissingArgument {
            op: op.name().to_string(),
            expected: op.shape().arity(),
        })
    }

    fn translate_argument(&mut self, op: Op, kind: ArgKind) -> Result<RawArgument, AsmError> {
        let token = self.next_argument(op)?;
        match (kind, token.kind) {
            (ArgKind::Register, TokenKind::ArgumentRegister) => {
                let reg = Register::by_name(&token.value)
                    .ok_or_else(|| AsmError::InvalidRegister(token.value.clone()))?;
                Ok(RawArgument::Value(Value::from(reg.code())))
            }
            (ArgKind::Immediate, TokenKind::ArgumentNumber) => {
                parse_number(&token.value).map(RawArgument::Value)
            }
            (ArgKind::Immediate, TokenKind::ArgumentLabel) => {
                Ok(RawArgument::Label(token.value.clone()))
            }
            _ => Err(AsmError::ArgumentKind {
                op: op.name().to_string(),
                expected: kind.to_string(),
                found: token.clone(),
            }),
        }
    }

    /// `WORD` takes one or more numbers, strings or label references. Strings
    /// expand to one word per character followed by a zero word.
    fn translate_data(&mut self) -> Result<(), AsmError> {
        let mut count = 0usize;
        while let Some(token) = self.tokens.next_if(|t| {
            matches!(
                t.kind,
                TokenKind::ArgumentNumber | TokenKind::ArgumentString | TokenKind::ArgumentLabel
            )
        }) {
            match token.kind {
                TokenKind::ArgumentNumber => {
                    let value = parse_number(&token.value)?;
                    self.program.push(RawWord::Data(RawArgument::Value(value)));
                }
                TokenKind::ArgumentString => {
                    for c in token.value.chars() {
                        let value = Value::try_from(u32::from(c))
                            .map_err(|_| AsmError::InvalidNumber(c.to_string()))?;
                        self.program.push(RawWord::Data(RawArgument::Value(value)));
                    }
                    self.program.push(RawWord::Data(RawArgument::Value(0)));
                }
                _ => self
                    .program
                    .push(RawWord::Data(RawArgument::Label(token.value.clone()))),
            }
            count = count.saturating_add(1);
        }

        if count > 0 {
            return Ok(());
        }
        match self.tokens.next() {
            Some(found) => Err(AsmError::ArgumentKind {
                op: DATA_DIRECTIVE.to_string(),
                expected: "number or string".to_string(),
                found: found.clone(),
            }),
            None => Err(AsmError::MissingArgument {
                op: DATA_DIRECTIVE.to_string(),
                expected: 1,
            }),
        }
    }
}

fn parse_number(text: &str) -> Result<Value, AsmError> {
    text.parse()
        .map_err(|_| AsmError::InvalidNumber(text.to_string()))
}

fn resolve_argument(arg: RawArgument, labels: &LabelMap) -> Result<Value, AsmError> {
    match arg {
        RawArgument::Value(v) => Ok(v),
        RawArgument::Label(name) => {
            let address = labels.get(&name)?;
            Value::try_from(address).map_err(|_| AsmError::ProgramTooLarge)
        }
    }
}

fn resolve_labels(raw: Vec<RawWord>, labels: &LabelMap) -> Result<Program, AsmError> {
    raw.into_iter()
        .map(|word| match word {
            RawWord::Data(arg) => resolve_argument(arg, labels).map(Word::Data),
            RawWord::Command { op, args } => {
                let args = args
                    .into_iter()
                    .map(|arg| resolve_argument(arg, labels))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Word::Command(Command::new(op, args)))
            }
        })
        .collect()
}
