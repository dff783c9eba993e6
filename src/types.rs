use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::arch::{Op, Value};
use crate::fmt::fmt_word;

/// An operation code followed by its already-resolved arguments.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Command {
    pub opcode: Value,
    pub args: Vec<Value>,
}

impl Command {
    #[must_use]
    pub fn new(op: Op, args: Vec<Value>) -> Self {
        Self {
            opcode: Value::from(op.code()),
            args,
        }
    }
}

/// A single memory slot: either plain data or an encoded command.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Word {
    Data(Value),
    Command(Command),
}

impl Word {
    /// Value seen by the datapath when the slot is read as data.
    #[must_use]
    pub const fn value(&self) -> Value {
        match self {
            Self::Data(v) => *v,
            Self::Command(c) => c.opcode,
        }
    }

    /// Splits the slot into opcode and arguments the way the control unit decodes it.
    #[must_use]
    pub fn decode(&self) -> (Value, &[Value]) {
        match self {
            Self::Data(v) => (*v, &[]),
            Self::Command(c) => (c.opcode, &c.args),
        }
    }

    /// The descriptor encoding: `[value]` for data, `[opcode, args...]` for commands.
    #[must_use]
    pub fn to_raw(&self) -> Vec<Value> {
        match self {
            Self::Data(v) => vec![*v],
            Self::Command(c) => {
                let mut raw = Vec::with_capacity(c.args.len().saturating_add(1));
                raw.push(c.opcode);
                raw.extend_from_slice(&c.args);
                raw
            }
        }
    }

    /// # Errors
    ///
    /// Will return `Err` if `raw` is empty
    pub fn from_raw(raw: &[Value]) -> Result<Self, DescriptorError> {
        match raw {
            [] => Err(DescriptorError::EmptyWord),
            [v] => Ok(Self::Data(*v)),
            [opcode, args @ ..] => Ok(Self::Command(Command {
                opcode: *opcode,
                args: args.to_vec(),
            })),
        }
    }
}

impl Default for Word {
    fn default() -> Self {
        Self::Data(0)
    }
}

impl Serialize for Word {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_raw().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Word {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<Value>::deserialize(deserializer)?;
        Self::from_raw(&raw).map_err(serde::de::Error::custom)
    }
}

pub type Program = Vec<Word>;

/// A linked program ready to be loaded into the CPU.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Executable {
    pub start: usize,
    pub program: Program,
}

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("program word must hold at least one integer")]
    EmptyWord,
    #[error("malformed compiled program: {0}")]
    Json(#[from] serde_json::Error),
}

/// One persisted word: the authoritative raw encoding plus a readable rendering.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DescriptorWord {
    Annotated {
        raw: Word,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        formatted: Option<String>,
    },
    Raw(Word),
}

#[derive(Serialize, Deserialize)]
struct Descriptor {
    start: usize,
    program: Vec<DescriptorWord>,
}

impl Executable {
    /// Serializes to the compiled JSON descriptor. Each word carries its formatted
    /// text when the formatter can render it.
    ///
    /// # Errors
    ///
    /// Will return `Err` if serialization fails
    pub fn to_json(&self) -> Result<String, DescriptorError> {
        let program = self
            .program
            .iter()
            .map(|word| DescriptorWord::Annotated {
                raw: word.clone(),
                formatted: fmt_word(word).ok(),
            })
            .collect();
        let descriptor = Descriptor {
            start: self.start,
            program,
        };
        Ok(serde_json::to_string_pretty(&descriptor)?)
    }

    /// # Errors
    ///
    /// Will return `Err` if `json` is not a valid compiled descriptor
    pub fn from_json(json: &str) -> Result<Self, DescriptorError> {
        let descriptor: Descriptor = serde_json::from_str(json)?;
        let program = descriptor
            .program
            .into_iter()
            .map(|word| match word {
                DescriptorWord::Annotated { raw, .. } | DescriptorWord::Raw(raw) => raw,
            })
            .collect();
        Ok(Self {
            start: descriptor.start,
            program,
        })
    }
}

impl fmt::Display for Executable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "start: {:0>3}", self.start)?;
        for (address, word) in self.program.iter().enumerate() {
            match fmt_word(word) {
                Ok(text) => writeln!(f, "{address:0>3} {text}")?,
                Err(_) => writeln!(f, "{address:0>3} {:?}", word.to_raw())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Executable {
        Executable {
            start: 1,
            program: vec![
                Word::Data(104),
                Word::Command(Command::new(Op::Ldi, vec![0, 5])),
                Word::Command(Command::new(Op::Out, vec![0])),
                Word::Command(Command::new(Op::Hlt, vec![])),
            ],
        }
    }

    #[test]
    fn raw_encoding_distinguishes_data_and_commands() {
        assert_eq!(Word::Data(7).to_raw(), vec![7]);
        assert_eq!(
            Word::Command(Command::new(Op::Addi, vec![1, 2, -3])).to_raw(),
            vec![2, 1, 2, -3]
        );
        assert!(matches!(Word::from_raw(&[]), Err(DescriptorError::EmptyWord)));
        assert_eq!(Word::from_raw(&[9]).unwrap(), Word::Data(9));
    }

    #[test]
    fn descriptor_carries_formatted_text() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["start"], 1);
        assert_eq!(value["program"][1]["raw"], serde_json::json!([11, 0, 5]));
        assert_eq!(value["program"][1]["formatted"], "LDI %R0, 5");
        assert_eq!(value["program"][0]["formatted"], "104");
    }

    #[test]
    fn listing_shows_addresses_and_instructions() {
        let listing = sample().to_string();
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines[0], "start: 001");
        assert_eq!(lines[1], "000 104");
        assert_eq!(lines[2], "001 LDI %R0, 5");
        assert_eq!(lines[4], "003 HLT");

        let broken = Executable {
            start: 0,
            program: vec![Word::Command(Command { opcode: 99, args: vec![1, 2] })],
        };
        assert_eq!(broken.to_string().lines().nth(1), Some("000 [99, 1, 2]"));
    }

    #[test]
    fn descriptor_reads_back() {
        let exe = sample();
        let back = Executable::from_json(&exe.to_json().unwrap()).unwrap();
        assert_eq!(back.start, 1);
        assert_eq!(back.program.len(), 4);
        assert_eq!(back.program[1], exe.program[1]);
        // A zero-argument command is indistinguishable from data once persisted.
        assert_eq!(back.program[3].decode(), (22, &[][..]));
    }

    #[test]
    fn descriptor_accepts_bare_lists() {
        let exe = Executable::from_json(r#"{"start": 0, "program": [[11, 0, 5], [15, 0], [22]]}"#).unwrap();
        assert_eq!(exe.program.len(), 3);
        assert_eq!(exe.program[0], Word::Command(Command::new(Op::Ldi, vec![0, 5])));
    }

    #[test]
    fn descriptor_rejects_garbage() {
        assert!(Executable::from_json("{\"start\": 0}").is_err());
        assert!(Executable::from_json(r#"{"start": 0, "program": [[]]}"#).is_err());
    }
}
