use crate::bytecode::Instruction;
use crate::error::Error;
use serde::Serialize;
use std::collections::HashMap;

/// Observer for the execution loop. The plain evaluator runs with `()`,
/// which records nothing and never copies the stack.
pub trait StepHook {
    fn before(&mut self, _index: usize, _instruction: &Instruction, _stack: &[f64]) {}

    fn after(
        &mut self,
        _index: usize,
        _instruction: &Instruction,
        _stack: &[f64],
        _outcome: Result<(), &Error>,
    ) {
    }
}

impl StepHook for () {}

/// One executed (or attempted) instruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub instruction: Instruction,
    pub instruction_index: usize,
    pub stack_before: Vec<f64>,
    pub stack_after: Vec<f64>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    pub steps: Vec<ExecutionStep>,
    /// Always true once returned: no step will ever be appended.
    pub is_complete: bool,
    /// Execution stopped at a failing instruction; the last step is that failure.
    pub halted: bool,
    pub result: Option<f64>,
    #[serde(serialize_with = "crate::error::serialize_error")]
    pub error: Option<Error>,
}

impl ExecutionTrace {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn cursor(&self) -> TraceCursor<'_> {
        TraceCursor::new(self)
    }
}

/// Collects [`ExecutionStep`]s for [`VirtualMachine::evaluate_with_trace`].
#[derive(Default)]
struct TraceRecorder {
    steps: Vec<ExecutionStep>,
    pending: Vec<f64>,
}

impl StepHook for TraceRecorder {
    fn before(&mut self, _index: usize, _instruction: &Instruction, stack: &[f64]) {
        self.pending = stack.to_vec();
    }

    fn after(
        &mut self,
        index: usize,
        instruction: &Instruction,
        stack: &[f64],
        outcome: Result<(), &Error>,
    ) {
        let stack_before = std::mem::take(&mut self.pending);
        let stack_after = stack.to_vec();
        let description = match outcome {
            Ok(()) => describe(instruction, &stack_before, &stack_after),
            Err(error) => format!("Error: {}", error),
        };

        self.steps.push(ExecutionStep {
            instruction: instruction.clone(),
            instruction_index: index,
            stack_before,
            stack_after,
            description,
        });
    }
}

fn describe(instruction: &Instruction, before: &[f64], after: &[f64]) -> String {
    let top = after.last().copied().unwrap_or(f64::NAN);

    match instruction {
        Instruction::Push(value) => format!("Push value {} onto stack", value),
        Instruction::Load(name) => format!("Load variable {} value {}", name, top),
        Instruction::Add | Instruction::Sub | Instruction::Mul | Instruction::Div | Instruction::Pow => {
            let (a, b) = match before {
                [.., a, b] => (*a, *b),
                _ => (f64::NAN, f64::NAN),
            };
            format!("Calculate {} {} {} = {}", a, symbol(instruction), b, top)
        }
        Instruction::Neg => {
            let operand = before.last().copied().unwrap_or(f64::NAN);
            if operand.is_sign_negative() {
                format!("Calculate -({}) = {}", operand, top)
            } else {
                format!("Calculate -{} = {}", operand, top)
            }
        }
    }
}

fn symbol(instruction: &Instruction) -> &'static str {
    match instruction {
        Instruction::Add => "+",
        Instruction::Sub => "-",
        Instruction::Mul => "*",
        Instruction::Div => "/",
        Instruction::Pow => "^",
        _ => "",
    }
}

/// Operand stack plus variable table. Both evaluators share [`Self::execute`],
/// so their opcode semantics cannot drift apart.
#[derive(Debug, Default)]
pub struct VirtualMachine {
    stack: Vec<f64>,
    variables: HashMap<String, f64>,
}

impl VirtualMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables(variables: HashMap<String, f64>) -> Self {
        Self {
            stack: Vec::new(),
            variables,
        }
    }

    pub fn set_variable(&mut self, name: &str, value: f64) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn variables(&self) -> &HashMap<String, f64> {
        &self.variables
    }

    /// Stack left behind by the last run.
    pub fn stack(&self) -> &[f64] {
        &self.stack
    }

    /// Run `program` and return the single value left on the stack.
    pub fn evaluate(&mut self, program: &[Instruction]) -> Result<f64, Error> {
        self.run(program, &mut ())?;

        match self.stack.as_slice() {
            [value] => Ok(*value),
            stack => Err(Error::InvalidFinalState { depth: stack.len() }),
        }
    }

    /// Run `program` recording every step. Failures end the trace instead of
    /// being returned.
    pub fn evaluate_with_trace(&mut self, program: &[Instruction]) -> ExecutionTrace {
        let mut recorder = TraceRecorder::default();
        let outcome = self.run(program, &mut recorder);

        let (halted, error) = match outcome {
            Ok(()) => (false, None),
            Err(error) => (true, Some(error)),
        };
        let result = match (halted, self.stack.as_slice()) {
            (false, [value]) => Some(*value),
            _ => None,
        };

        ExecutionTrace {
            steps: recorder.steps,
            is_complete: true,
            halted,
            result,
            error,
        }
    }

    fn run<H: StepHook>(&mut self, program: &[Instruction], hook: &mut H) -> Result<(), Error> {
        self.stack.clear();

        for (index, instruction) in program.iter().enumerate() {
            hook.before(index, instruction, &self.stack);
            let outcome = self.execute(instruction);
            hook.after(index, instruction, &self.stack, outcome.as_ref().map(|_| ()));

            tracing::trace!(index, %instruction, stack = ?self.stack, "executed instruction");
            if let Err(error) = outcome {
                tracing::debug!(index, %error, "execution halted");
                return Err(error);
            }
        }

        Ok(())
    }

    /// Apply one instruction to the stack.
    fn execute(&mut self, instruction: &Instruction) -> Result<(), Error> {
        match instruction {
            Instruction::Push(value) => {
                self.stack.push(*value);
                Ok(())
            }
            Instruction::Load(name) => {
                let value = self
                    .variables
                    .get(name)
                    .copied()
                    .ok_or_else(|| Error::UndefinedVariable { name: name.clone() })?;
                self.stack.push(value);
                Ok(())
            }
            Instruction::Add => self.binary_operation("ADD", |a, b| Ok(a + b)),
            Instruction::Sub => self.binary_operation("SUB", |a, b| Ok(a - b)),
            Instruction::Mul => self.binary_operation("MUL", |a, b| Ok(a * b)),
            Instruction::Div => self.binary_operation("DIV", |a, b| {
                if b == 0.0 {
                    Err(Error::DivisionByZero)
                } else {
                    Ok(a / b)
                }
            }),
            Instruction::Pow => self.binary_operation("POW", |a, b| Ok(a.powf(b))),
            Instruction::Neg => {
                let operand = self.stack.pop().ok_or(Error::StackUnderflow {
                    opcode: "NEG",
                    needed: 1,
                    available: 0,
                })?;
                self.stack.push(-operand);
                Ok(())
            }
        }
    }

    /// Pops `b` (top) then `a`, pushes `op(a, b)`. The operands stay consumed
    /// when `op` fails.
    fn binary_operation<F>(&mut self, opcode: &'static str, op: F) -> Result<(), Error>
    where
        F: FnOnce(f64, f64) -> Result<f64, Error>,
    {
        if self.stack.len() < 2 {
            return Err(Error::StackUnderflow {
                opcode,
                needed: 2,
                available: self.stack.len(),
            });
        }

        let b = self.stack.pop().unwrap_or_default();
        let a = self.stack.pop().unwrap_or_default();
        let result = op(a, b)?;
        self.stack.push(result);
        Ok(())
    }
}

/// Evaluate with an empty variable table.
pub fn evaluate(program: &[Instruction]) -> Result<f64, Error> {
    VirtualMachine::new().evaluate(program)
}

/// Trace with an empty variable table. Never fails.
pub fn evaluate_with_trace(program: &[Instruction]) -> ExecutionTrace {
    VirtualMachine::new().evaluate_with_trace(program)
}

/// Read-only position over a finished trace. Moving the cursor never
/// re-executes anything; it is clamped to the first and last step.
#[derive(Debug, Clone, Copy)]
pub struct TraceCursor<'a> {
    trace: &'a ExecutionTrace,
    position: usize,
}

impl<'a> TraceCursor<'a> {
    pub fn new(trace: &'a ExecutionTrace) -> Self {
        Self { trace, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.trace.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trace.steps.is_empty()
    }

    pub fn current(&self) -> Option<&'a ExecutionStep> {
        self.trace.steps.get(self.position)
    }

    pub fn is_first(&self) -> bool {
        self.position == 0
    }

    pub fn is_last(&self) -> bool {
        self.position + 1 >= self.len()
    }

    pub fn step_forward(&mut self) -> Option<&'a ExecutionStep> {
        if !self.is_last() {
            self.position += 1;
        }
        self.current()
    }

    pub fn step_back(&mut self) -> Option<&'a ExecutionStep> {
        self.position = self.position.saturating_sub(1);
        self.current()
    }

    pub fn jump_to(&mut self, position: usize) -> Option<&'a ExecutionStep> {
        self.position = position.min(self.len().saturating_sub(1));
        self.current()
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }
}
