use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::{read_to_string, write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use drum::asm::assemble_with_labels;
use drum::log::Level;
use drum::{input_from_text, Cpu, CpuConfig, Executable, OutputFormat};

/// Assembler and emulator for the drum CPU
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("VERGEN_BUILD_DATE"), ")")
)]
struct Args {
    /// Minimum level of messages written to stderr
    #[arg(long, global = true, default_value = "info")]
    log_level: Level,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate assembly source into a compiled program
    Assemble {
        /// Assembly source file
        input: PathBuf,
        /// Where to write the compiled program
        output: PathBuf,
    },
    /// Execute a compiled program
    Run {
        /// Compiled program produced by `assemble`
        compiled: PathBuf,
        /// Text file fed to the program's input
        input: PathBuf,
        /// How to print what the program wrote
        #[arg(short = 'O', long, value_enum, default_value_t)]
        output_format: OutputFormat,
        /// Give up after this many instructions
        #[arg(long)]
        step_limit: Option<u64>,
        /// Memory size as a multiple of the program length
        #[arg(long, default_value_t = CpuConfig::default().memory_scale)]
        memory_scale: usize,
    },
}

fn assemble_file(input: &Path, output: &Path) -> Result<()> {
    let source = read_to_string(input)
        .with_context(|| format!("could not read assembly file {}", input.display()))?;
    let (exe, labels) = assemble_with_labels(&source)?;
    let json = exe.to_json()?;
    write(output, json).with_context(|| format!("could not write {}", output.display()))?;
    drum::debug!("listing:\n{exe}");
    for (address, names) in labels.symbol_table() {
        drum::debug!("{address:0>3} {}", names.join(", "));
    }
    drum::info!(
        "source LoC: {} code words: {}",
        source.lines().count(),
        exe.program.len()
    );
    Ok(())
}

fn run_file(compiled: &Path, input: &Path, format: OutputFormat, config: CpuConfig) -> Result<()> {
    let json = read_to_string(compiled)
        .with_context(|| format!("could not read compiled program {}", compiled.display()))?;
    let exe = Executable::from_json(&json)
        .with_context(|| format!("malformed compiled program {}", compiled.display()))?;
    let text = read_to_string(input)
        .with_context(|| format!("could not read input file {}", input.display()))?;

    let mut cpu = Cpu::with_config(&exe, &input_from_text(&text), config);
    let report = cpu.run()?;
    if !report.halted {
        drum::warn!("program ended without HLT at address {}", cpu.instruction_pointer());
    }
    println!("{}", format.format(&report.output));
    drum::info!("ticks: {}", report.ticks);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    drum::log::set_level(args.log_level);

    let result = match &args.command {
        Command::Assemble { input, output } => assemble_file(input, output),
        Command::Run {
            compiled,
            input,
            output_format,
            step_limit,
            memory_scale,
        } => run_file(
            compiled,
            input,
            *output_format,
            CpuConfig {
                memory_scale: *memory_scale,
                step_limit: *step_limit,
            },
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            drum::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
