#![warn(
    clippy::cargo,
    clippy::complexity,
    clippy::correctness,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    clippy::pedantic,
    clippy::nursery,
    clippy::arithmetic_side_effects,
    clippy::format_push_string,
    clippy::if_then_some_else_none,
    clippy::missing_asserts_for_indexing,
    clippy::redundant_type_annotations,
    clippy::unwrap_in_result
)]
#![allow(clippy::module_name_repetitions)]
//! Assembler, formatter and cycle-accurate emulator for the drum toy ISA.

pub mod arch;
pub mod asm;
pub mod cpu;
pub mod fmt;
pub mod lexer;
pub mod log;
pub mod output;
pub mod types;

pub use asm::{assemble, AsmError};
pub use cpu::{Cpu, CpuConfig, ExecError, RunReport};
pub use output::OutputFormat;
pub use types::{Executable, Word};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Asm(#[from] AsmError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Turns the text of an input file into the byte stream a program reads:
/// the raw bytes followed by a terminating 0.
#[must_use]
pub fn input_from_text(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

/// Assembles `source` and runs it with the default configuration.
///
/// # Errors
///
/// Will return an `Err` if the assembly could not be assembled or the
/// program fails while running
pub fn run_assembly(source: &str, input: &[u8]) -> Result<RunReport, Error> {
    let exe = assemble(source)?;
    let mut cpu = Cpu::new(&exe, input);
    Ok(cpu.run()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_gets_terminator() {
        assert_eq!(input_from_text("hi"), vec![b'h', b'i', 0]);
        assert_eq!(input_from_text(""), vec![0]);
    }

    #[test]
    fn runs_source_end_to_end() {
        let report = run_assembly("_start: LDI %R0, 5\nOUT %R0\nHLT\n", &[]).unwrap();
        assert_eq!(report.output, vec![5]);
    }

    #[test]
    fn reports_stage_errors() {
        assert!(matches!(run_assembly("HLT", &[]), Err(Error::Asm(AsmError::MissingStartLabel))));
        assert_eq!(
            run_assembly("_start: IN %R0", &[]),
            Err(Error::Exec(ExecError::InputExhausted))
        );
    }
}
