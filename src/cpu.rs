use std::collections::VecDeque;
use thiserror::Error;

use crate::arch::{ArgsShape, Op, OpClass, Register, Value};
use crate::fmt::fmt_word;
use crate::types::{Executable, Word};

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ExecError {
    #[error("unknown opcode {opcode} at address {address}")]
    UnknownOpcode { opcode: Value, address: usize },
    #[error("malformed {op} at address {address}: expected {expected} argument(s), got {got}")]
    ArgumentCount {
        op: Op,
        address: usize,
        expected: usize,
        got: usize,
    },
    #[error("register with code {0} doesn't exist")]
    InvalidRegister(Value),
    #[error("memory address {0} out of bounds")]
    MemoryOutOfBounds(Value),
    #[error("input exhausted")]
    InputExhausted,
    #[error("invalid branch target {0}")]
    InvalidBranchTarget(Value),
    #[error("step limit of {0} instructions exceeded")]
    StepLimitExceeded(u64),
}

/// Tunables for a single run.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CpuConfig {
    /// Memory capacity as a multiple of the program length. The space past the
    /// program is zeroed working storage.
    pub memory_scale: usize,
    /// Stop with [`ExecError::StepLimitExceeded`] after this many instructions.
    pub step_limit: Option<u64>,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            memory_scale: 5,
            step_limit: None,
        }
    }
}

/// Word-addressed memory holding both the program and its data.
#[derive(Debug, Clone, Default)]
pub struct Memory(Vec<Word>);

impl Memory {
    fn load(program: &[Word], capacity: usize) -> Self {
        let mut words = program.to_vec();
        words.resize(capacity.max(program.len()), Word::default());
        Self(words)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn word(&self, address: usize) -> Option<&Word> {
        self.0.get(address)
    }

    fn index(&self, address: Value) -> Result<usize, ExecError> {
        usize::try_from(address)
            .ok()
            .filter(|i| *i < self.0.len())
            .ok_or(ExecError::MemoryOutOfBounds(address))
    }

    /// # Errors
    ///
    /// Will return `Err` if `address` is outside memory
    pub fn get_contents(&self, address: Value) -> Result<Value, ExecError> {
        Ok(self.0[self.index(address)?].value())
    }

    /// # Errors
    ///
    /// Will return `Err` if `address` is outside memory
    pub fn set_contents(&mut self, address: Value, value: Value) -> Result<(), ExecError> {
        let i = self.index(address)?;
        self.0[i] = Word::Data(value);
        Ok(())
    }
}

/// Where a register latch takes its value from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegisterSource {
    Alu,
    Input,
    Memory,
    Immediate(Value),
}

/// Registers, memory, ALU and the I/O queues. Every method is one control signal.
#[derive(Debug, Clone, Default)]
pub struct DataPath {
    registers: [Value; 8],
    memory: Memory,
    data_address: Value,
    alu_result: Value,
    truth: bool,
    input: VecDeque<u8>,
    output: VecDeque<u8>,
}

impl DataPath {
    fn new(program: &[Word], capacity: usize, input: &[u8]) -> Self {
        Self {
            memory: Memory::load(program, capacity),
            input: input.iter().copied().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn register(&self, reg: Register) -> Value {
        self.registers[reg as usize]
    }

    fn set_register(&mut self, reg: Register, value: Value) {
        self.registers[reg as usize] = value;
    }

    #[must_use]
    pub const fn truth(&self) -> bool {
        self.truth
    }

    pub fn latch_data_address(&mut self, address: Value) {
        self.data_address = address;
    }

    /// Computes `left <op> right`. Comparison ops set the truth flag instead.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    pub fn latch_alu(&mut self, op: Op, left: Value, right: Value) {
        self.alu_result = match op {
            Op::Add | Op::Addi => left.wrapping_add(right),
            Op::Sub | Op::Subi => left.wrapping_sub(right),
            Op::Shr | Op::Shri => ((left as u32) >> (right & 31)) as Value,
            Op::Xor | Op::Xori => left ^ right,
            _ => {
                self.truth = match op {
                    Op::Beq => left == right,
                    Op::Bne => left != right,
                    Op::Blt => left < right,
                    Op::Ble => left <= right,
                    Op::Bgt => left > right,
                    Op::Bge => left >= right,
                    _ => false,
                };
                Value::from(self.truth)
            }
        };
    }

    /// # Errors
    ///
    /// Will return `Err` if the input queue is empty or memory is read out of bounds
    pub fn latch_register(&mut self, reg: Register, source: RegisterSource) -> Result<(), ExecError> {
        let value = match source {
            RegisterSource::Alu => self.alu_result,
            RegisterSource::Input => self
                .input
                .pop_front()
                .map(Value::from)
                .ok_or(ExecError::InputExhausted)?,
            RegisterSource::Memory => self.memory.get_contents(self.data_address)?,
            RegisterSource::Immediate(v) => v,
        };
        self.set_register(reg, value);
        Ok(())
    }

    /// # Errors
    ///
    /// Will return `Err` if the latched data address is out of bounds
    pub fn latch_memory_write(&mut self, reg: Register) -> Result<(), ExecError> {
        let value = self.register(reg);
        self.memory.set_contents(self.data_address, value)?;
        crate::debug!("[{}] = {value}", self.data_address);
        Ok(())
    }

    /// Sends the low byte of `reg` to the output queue.
    pub fn output(&mut self, reg: Register) {
        let [byte, ..] = self.register(reg).to_le_bytes();
        self.output.push_back(byte);
        crate::debug!("sent to output: {byte}");
    }
}

#[derive(Debug, Clone, Default)]
pub struct ControlUnit {
    ip: usize,
    tick: u64,
    counter: u64,
}

impl ControlUnit {
    fn tick(&mut self) {
        self.tick = self.tick.saturating_add(1);
    }

    fn advance(&mut self) {
        self.ip = self.ip.saturating_add(1);
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum State {
    Running,
    Halted,
    Ended,
}

/// What a finished run produced.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RunReport {
    pub output: Vec<u8>,
    pub ticks: u64,
    pub instructions: u64,
    /// `true` if the run stopped on `HLT`, `false` if it ran off the program.
    pub halted: bool,
}

#[derive(Debug, Clone)]
pub struct Cpu {
    cu: ControlUnit,
    dp: DataPath,
    program_len: usize,
    config: CpuConfig,
    state: State,
}

struct Decoded<'a> {
    op: Op,
    args: &'a [Value],
}

fn reg(code: Value) -> Result<Register, ExecError> {
    Register::by_code(code).ok_or(ExecError::InvalidRegister(code))
}

impl Cpu {
    #[must_use]
    pub fn new(exe: &Executable, input: &[u8]) -> Self {
        Self::with_config(exe, input, CpuConfig::default())
    }

    #[must_use]
    pub fn with_config(exe: &Executable, input: &[u8], config: CpuConfig) -> Self {
        let capacity = exe.program.len().saturating_mul(config.memory_scale);
        Self {
            cu: ControlUnit {
                ip: exe.start,
                ..ControlUnit::default()
            },
            dp: DataPath::new(&exe.program, capacity, input),
            program_len: exe.program.len(),
            config,
            state: State::Running,
        }
    }

    #[must_use]
    pub const fn instruction_pointer(&self) -> usize {
        self.cu.ip
    }

    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.cu.tick
    }

    #[must_use]
    pub const fn instructions(&self) -> u64 {
        self.cu.counter
    }

    #[must_use]
    pub const fn register(&self, reg: Register) -> Value {
        self.dp.register(reg)
    }

    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.dp.memory
    }

    /// Bytes queued for output so far.
    pub fn output(&self) -> impl Iterator<Item = u8> + '_ {
        self.dp.output.iter().copied()
    }

    /// Runs until `HLT`, until the instruction pointer leaves the program, or
    /// until an execution error.
    ///
    /// # Errors
    ///
    /// Will return `Err` on the first execution error. Output queued before
    /// the error stays available through [`Cpu::output`].
    pub fn run(&mut self) -> Result<RunReport, ExecError> {
        crate::debug!("{}", self.state_string());
        while self.step()? {
            crate::debug!("{}", self.state_string());
        }
        crate::info!(
            "{} instructions executed in {} ticks",
            self.cu.counter,
            self.cu.tick
        );
        Ok(RunReport {
            output: self.dp.output.drain(..).collect(),
            ticks: self.cu.tick,
            instructions: self.cu.counter,
            halted: self.state == State::Halted,
        })
    }

    /// Decodes and executes one instruction. Returns `false` once the machine
    /// has stopped.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the instruction cannot be decoded or executed
    pub fn step(&mut self) -> Result<bool, ExecError> {
        if self.state != State::Running {
            return Ok(false);
        }
        if self.cu.ip >= self.program_len {
            self.state = State::Ended;
            return Ok(false);
        }

        let Some(word) = self.dp.memory.word(self.cu.ip).cloned() else {
            self.state = State::Ended;
            return Ok(false);
        };
        let decoded = self.decode(&word)?;

        // HLT is not counted against the step limit
        if decoded.op.class() != OpClass::Halt {
            if let Some(limit) = self.config.step_limit {
                if self.cu.counter >= limit {
                    return Err(ExecError::StepLimitExceeded(limit));
                }
            }
        }

        match decoded.op.class() {
            OpClass::Nop => {
                self.cu.tick();
                self.cu.advance();
            }
            OpClass::Arithmetic => self.execute_arithmetic(&decoded)?,
            OpClass::Memory => self.execute_memory(&decoded)?,
            OpClass::Io => self.execute_io(&decoded)?,
            OpClass::Branch => self.execute_branch(&decoded)?,
            OpClass::Halt => {
                self.state = State::Halted;
                return Ok(false);
            }
        }

        self.cu.counter = self.cu.counter.saturating_add(1);
        Ok(true)
    }

    fn decode<'w>(&self, word: &'w Word) -> Result<Decoded<'w>, ExecError> {
        let (opcode, args) = word.decode();
        let op = Op::by_code(opcode).ok_or(ExecError::UnknownOpcode {
            opcode,
            address: self.cu.ip,
        })?;
        let expected = op.shape().arity();
        if args.len() != expected {
            return Err(ExecError::ArgumentCount {
                op,
                address: self.cu.ip,
                expected,
                got: args.len(),
            });
        }
        Ok(Decoded { op, args })
    }

    fn execute_arithmetic(&mut self, d: &Decoded) -> Result<(), ExecError> {
        let dst = reg(d.args[0])?;
        let left = self.dp.register(reg(d.args[1])?);
        let right = match d.op.shape() {
            ArgsShape::Rrr => self.dp.register(reg(d.args[2])?),
            _ => d.args[2],
        };

        self.dp.latch_alu(d.op, left, right);
        self.cu.tick();

        self.dp.latch_register(dst, RegisterSource::Alu)?;
        self.cu.tick();

        self.cu.advance();
        Ok(())
    }

    fn execute_memory(&mut self, d: &Decoded) -> Result<(), ExecError> {
        let target = reg(d.args[0])?;
        if d.op == Op::Ldi {
            self.dp.latch_register(target, RegisterSource::Immediate(d.args[1]))?;
            self.cu.tick();
            self.cu.advance();
            return Ok(());
        }

        // LD/ST address through a register, LDA/STA through an immediate
        let address = match d.op.shape() {
            ArgsShape::Rr => self.dp.register(reg(d.args[1])?),
            _ => d.args[1],
        };
        self.dp.latch_data_address(address);
        self.cu.tick();

        if matches!(d.op, Op::Ld | Op::Lda) {
            self.dp.latch_register(target, RegisterSource::Memory)?;
        } else {
            self.dp.latch_memory_write(target)?;
        }
        self.cu.tick();

        self.cu.advance();
        Ok(())
    }

    fn execute_io(&mut self, d: &Decoded) -> Result<(), ExecError> {
        let target = reg(d.args[0])?;
        if d.op == Op::In {
            self.dp.latch_register(target, RegisterSource::Input)?;
        } else {
            self.dp.output(target);
        }
        self.cu.tick();
        self.cu.advance();
        Ok(())
    }

    fn execute_branch(&mut self, d: &Decoded) -> Result<(), ExecError> {
        let left = self.dp.register(reg(d.args[0])?);
        let right = self.dp.register(reg(d.args[1])?);
        let target = d.args[2];

        self.dp.latch_alu(d.op, left, right);
        self.cu.tick();

        if self.dp.truth() {
            self.cu.ip =
                usize::try_from(target).map_err(|_| ExecError::InvalidBranchTarget(target))?;
        } else {
            self.cu.advance();
        }
        Ok(())
    }

    /// One-line snapshot of the machine for execution traces.
    #[must_use]
    pub fn state_string(&self) -> String {
        let mem = self
            .dp
            .memory
            .get_contents(self.dp.data_address)
            .map_or_else(|_| "-".to_string(), |v| v.to_string());
        let registers = Register::ALL
            .iter()
            .map(|reg| format!("{}={:4}", reg.name(), self.dp.register(*reg)))
            .collect::<Vec<_>>()
            .join(" ");
        let instruction = match self.dp.memory.word(self.cu.ip) {
            Some(word) if self.cu.ip < self.program_len => {
                fmt_word(word).unwrap_or_else(|e| format!("<{e}>"))
            }
            _ => "<end>".to_string(),
        };
        format!(
            "TICK={:4} IP={:3} ADDR={:3} MEM={mem:>6} {registers} {instruction}",
            self.cu.tick, self.cu.ip, self.dp.data_address
        )
    }
}
