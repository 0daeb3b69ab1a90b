//! Runs programs directly on the reference-counted heap.
//!
//! Registers are released following the same [`FunctionPlan`] the C backend
//! uses, so leaks and double frees show up in the heap counters.

use std::rc::Rc;

use tracing::{debug, info, trace};

use crate::{
    check::check_program,
    ir::{
        FunctionId, Program, RegisterId,
        instruction::{Instruction, InstructionSequence, MatchCaseKind, MatchInstruction},
        standard_library::Intrinsic,
        value::Value,
    },
    ownership::{FunctionPlan, InstructionPlan, SequencePlan, Transfer},
    runtime::{Heap, HeapStats, InterfaceReference, Managed, Object, StringRef, VtableCache},
};

pub use errors::InterpretError;

pub mod errors;
mod intrinsics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// How deep calls may nest.
    pub max_recursion: usize,
    /// How many instructions may run in total.
    pub max_instructions: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_recursion: 200,
            max_instructions: 1_000_000,
        }
    }
}

/// What is left after running a program to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Everything the program printed.
    pub output: Vec<u8>,
    /// Heap counters after the result of the entry point was released.
    pub stats: HeapStats,
    /// How many vtables were built.
    pub vtables: usize,
}

/// Checks and runs the entry point, then releases its result.
pub fn run_program(
    program: &Program,
    config: InterpreterConfig,
) -> Result<Execution, InterpretError> {
    check_program(program)?;
    let mut interpreter = Interpreter::new(program, config);
    let result = interpreter.run()?;
    result.release(&mut interpreter.heap)?;

    let stats = interpreter.heap.stats();
    if stats.live() > 0 {
        tracing::warn!("{} heap blocks still alive after the program ended", stats.live());
    }
    Ok(Execution {
        output: interpreter.output,
        stats,
        vtables: interpreter.vtables.len(),
    })
}

#[derive(Debug)]
enum Flow {
    Continue,
    /// The value of a match case.
    Yield(Object),
    Break(Object),
    Return(Object),
}

struct Frame<'p> {
    plan: &'p FunctionPlan,
    registers: Vec<Option<Object>>,
    /// Borrowed from the closure being called.
    captures: Vec<Object>,
}

#[derive(Debug)]
pub struct Interpreter<'a> {
    program: &'a Program,
    plans: Rc<Vec<FunctionPlan>>,
    heap: Heap,
    vtables: VtableCache,
    config: InterpreterConfig,
    output: Vec<u8>,
    depth: usize,
    executed: u64,
}

impl<'a> Interpreter<'a> {
    /// The program has to be checked already.
    pub fn new(program: &'a Program, config: InterpreterConfig) -> Self {
        Self::with_heap(program, config, Heap::new())
    }

    pub fn with_heap(program: &'a Program, config: InterpreterConfig, heap: Heap) -> Self {
        let plans = program.functions.iter().map(FunctionPlan::new).collect();
        Self {
            program,
            plans: Rc::new(plans),
            heap,
            vtables: VtableCache::default(),
            config,
            output: Vec::new(),
            depth: 0,
            executed: 0,
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Runs the entry point. The caller owns the result.
    pub fn run(&mut self) -> Result<Object, InterpretError> {
        info!("interpreting program with {} functions", self.program.functions.len());
        self.call_function(0, None, Vec::new(), Vec::new())
    }

    /// Calls a function, giving it ownership of `arguments`.
    pub fn call_function(
        &mut self,
        id: FunctionId,
        self_: Option<Object>,
        captures: Vec<Object>,
        arguments: Vec<Object>,
    ) -> Result<Object, InterpretError> {
        let program = self.program;
        let function = program
            .functions
            .get(id)
            .ok_or_else(|| InterpretError::unreachable(format!("call of unknown function {id}")))?;
        if arguments.len() != function.signature.parameters.len() {
            return Err(InterpretError::unreachable(format!(
                "function {id} called with {} arguments",
                arguments.len()
            )));
        }
        if self.depth >= self.config.max_recursion {
            return Err(InterpretError::RecursionLimit {
                limit: self.config.max_recursion,
            });
        }

        let plans = self.plans.clone();
        let plan = plans
            .get(id)
            .ok_or_else(|| InterpretError::unreachable(format!("no plan for function {id}")))?;
        let mut frame = Frame {
            plan,
            registers: vec![None; function.number_of_registers()],
            captures,
        };

        let mut defined = Vec::new();
        if let (Some(register), Some(value)) = (function.self_register(), self_) {
            frame.registers[register] = Some(value);
            defined.push(register);
        }
        for (register, argument) in function.parameter_registers().zip(arguments) {
            frame.registers[register] = Some(argument);
            defined.push(register);
        }

        debug!("calling function {id}");
        self.depth += 1;
        let flow = self.run_sequence(&mut frame, &function.body, &plan.body, defined, None);
        self.depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            other => Err(InterpretError::unreachable(format!(
                "function {id} ended without returning: {other:?}"
            ))),
        }
    }

    fn run_sequence(
        &mut self,
        frame: &mut Frame,
        sequence: &InstructionSequence,
        plan: &SequencePlan,
        mut defined: Vec<RegisterId>,
        case_value: Option<RegisterId>,
    ) -> Result<Flow, InterpretError> {
        let flow = self.run_instructions(frame, sequence, plan, &mut defined, case_value)?;

        // Owned registers of this sequence die here, also when leaving early.
        for register in defined.into_iter().rev() {
            if let Some(value) = frame.registers.get_mut(register).and_then(Option::take) {
                if frame.plan.owns(register) {
                    trace!("releasing register {register}");
                    value.release(&mut self.heap)?;
                }
            }
        }
        Ok(flow)
    }

    fn run_instructions(
        &mut self,
        frame: &mut Frame,
        sequence: &InstructionSequence,
        plan: &SequencePlan,
        defined: &mut Vec<RegisterId>,
        case_value: Option<RegisterId>,
    ) -> Result<Flow, InterpretError> {
        for (instruction, instruction_plan) in sequence.instructions.iter().zip(&plan.instructions)
        {
            self.executed += 1;
            if self.executed > self.config.max_instructions {
                return Err(InterpretError::InstructionLimit {
                    limit: self.config.max_instructions,
                });
            }
            trace!("executing {}", instruction.name());

            match self.run_instruction(frame, instruction, instruction_plan)? {
                Flow::Continue => {}
                flow => return Ok(flow),
            }
            if let Some(register) = instruction.defined_register() {
                defined.push(register);
            }
        }

        match case_value {
            Some(register) => {
                let transfer = plan.case_value.unwrap_or(Transfer::Share);
                Ok(Flow::Yield(self.consume(frame, register, transfer)?))
            }
            None => Ok(Flow::Continue),
        }
    }

    fn read(&self, frame: &Frame, register: RegisterId) -> Result<Object, InterpretError> {
        frame
            .registers
            .get(register)
            .and_then(Option::as_ref)
            .cloned()
            .ok_or_else(|| InterpretError::unreachable(format!("register {register} is empty")))
    }

    fn consume(
        &mut self,
        frame: &mut Frame,
        register: RegisterId,
        transfer: Transfer,
    ) -> Result<Object, InterpretError> {
        match transfer {
            Transfer::Move => frame
                .registers
                .get_mut(register)
                .and_then(Option::take)
                .ok_or_else(|| {
                    InterpretError::unreachable(format!("register {register} moved twice"))
                }),
            Transfer::Share => {
                let value = self.read(frame, register)?;
                value.add_reference(&mut self.heap)?;
                Ok(value)
            }
        }
    }

    fn consume_all(
        &mut self,
        frame: &mut Frame,
        registers: &[RegisterId],
        plan: &InstructionPlan,
        first_operand: usize,
    ) -> Result<Vec<Object>, InterpretError> {
        registers
            .iter()
            .enumerate()
            .map(|(index, register)| {
                self.consume(frame, *register, plan.transfer(first_operand + index))
            })
            .collect()
    }

    fn define(
        &self,
        frame: &mut Frame,
        register: RegisterId,
        value: Object,
    ) -> Result<Flow, InterpretError> {
        let slot = frame.registers.get_mut(register).ok_or_else(|| {
            InterpretError::unreachable(format!("register {register} out of range"))
        })?;
        if slot.is_some() {
            return Err(InterpretError::unreachable(format!(
                "register {register} assigned twice"
            )));
        }
        *slot = Some(value);
        Ok(Flow::Continue)
    }

    fn run_instruction(
        &mut self,
        frame: &mut Frame,
        instruction: &Instruction,
        plan: &InstructionPlan,
    ) -> Result<Flow, InterpretError> {
        match instruction {
            Instruction::Call(x) => {
                let callee = self.read(frame, x.callee)?;
                let result = match callee {
                    Object::Intrinsic(intrinsic) => {
                        let arguments = x
                            .arguments
                            .iter()
                            .map(|register| self.read(frame, *register))
                            .collect::<Result<Vec<_>, _>>()?;
                        self.call_intrinsic(intrinsic, &arguments)?
                    }
                    Object::Function { code, captures } => {
                        let arguments = self.consume_all(frame, &x.arguments, plan, 1)?;
                        self.call_function(code, None, captures, arguments)?
                    }
                    Object::MethodPointer { reference, method } => {
                        let arguments = self.consume_all(frame, &x.arguments, plan, 1)?;
                        let code = reference.method(method).ok_or_else(|| {
                            InterpretError::unreachable(format!("vtable has no method {method}"))
                        })?;
                        let self_ = reference.payload(&self.heap)?.clone();
                        self.call_function(code, Some(self_), Vec::new(), arguments)?
                    }
                    Object::EnumConstructor(constructor) => {
                        let mut arguments = self.consume_all(frame, &x.arguments, plan, 1)?;
                        let state = arguments.pop().ok_or_else(|| {
                            InterpretError::unreachable("enum constructor called without a state")
                        })?;
                        Object::EnumElement {
                            which: constructor.which,
                            state: Some(Box::new(state)),
                        }
                    }
                    other => {
                        return Err(InterpretError::unreachable(format!(
                            "call of a {}",
                            other.kind()
                        )));
                    }
                };
                self.define(frame, x.result, result)
            }
            Instruction::Return(x) => {
                let value = self.consume(frame, x.returned_value, plan.transfer(0))?;
                Ok(Flow::Return(value))
            }
            Instruction::Loop(x) => {
                let body = plan.nested.first().ok_or_else(|| {
                    InterpretError::unreachable("loop without a planned body")
                })?;
                loop {
                    match self.run_sequence(frame, &x.body, body, Vec::new(), None)? {
                        Flow::Continue => {}
                        Flow::Break(value) => return self.define(frame, x.result, value),
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Yield(_) => {
                            return Err(InterpretError::unreachable("loop body yielded a value"));
                        }
                    }
                }
            }
            Instruction::Break(x) => {
                let value = self.consume(frame, x.value, plan.transfer(0))?;
                Ok(Flow::Break(value))
            }
            Instruction::Global(into) => self.define(frame, *into, Object::Globals),
            Instruction::Literal(x) => {
                let value = self.materialize(&x.value)?;
                self.define(frame, x.into, value)
            }
            Instruction::Tuple(x) => {
                let elements = self.consume_all(frame, &x.elements, plan, 0)?;
                self.define(frame, x.result, Object::Tuple(elements))
            }
            Instruction::ReadStruct(x) => {
                let value = match self.read(frame, x.from_object)? {
                    Object::Globals => Intrinsic::from_member(x.member)
                        .map(Object::Intrinsic)
                        .ok_or_else(|| {
                            InterpretError::unreachable(format!(
                                "no standard library member {}",
                                x.member
                            ))
                        })?,
                    object => object
                        .members()
                        .and_then(|members| members.get(x.member))
                        .cloned()
                        .ok_or_else(|| {
                            InterpretError::unreachable(format!(
                                "read of member {} from a {}",
                                x.member,
                                object.kind()
                            ))
                        })?,
                };
                self.define(frame, x.into, value)
            }
            Instruction::Match(x) => self.run_match(frame, x, plan),
            Instruction::InstantiateStruct(x) => {
                let members = self.consume_all(frame, &x.arguments, plan, 0)?;
                self.define(frame, x.into, Object::Structure(members))
            }
            Instruction::GetMethod(x) => match self.read(frame, x.from)? {
                Object::Interface(reference) => self.define(
                    frame,
                    x.into,
                    Object::MethodPointer {
                        reference,
                        method: x.method,
                    },
                ),
                other => Err(InterpretError::unreachable(format!(
                    "get_method on a {}",
                    other.kind()
                ))),
            },
            Instruction::EraseType(x) => {
                let value = self.consume(frame, x.self_, plan.transfer(0))?;
                let vtable = self
                    .vtables
                    .get_or_build(self.program, x.implementation)
                    .ok_or_else(|| InterpretError::unreachable("unknown implementation"))?;
                let reference = InterfaceReference::erase(&mut self.heap, vtable, value);
                self.define(frame, x.into, Object::Interface(reference))
            }
            Instruction::EnumConstruct(x) => {
                let state = self.consume(frame, x.state, plan.transfer(0))?;
                let element = Object::EnumElement {
                    which: x.which.which,
                    state: Some(Box::new(state)),
                };
                self.define(frame, x.into, element)
            }
            Instruction::GetCaptures(into) => {
                let captures = Object::Tuple(frame.captures.clone());
                self.define(frame, *into, captures)
            }
            Instruction::LambdaWithCaptures(x) => {
                let captures = self.consume_all(frame, &x.captures, plan, 0)?;
                let closure = Object::Function {
                    code: x.lambda,
                    captures,
                };
                self.define(frame, x.into, closure)
            }
        }
    }

    fn run_match(
        &mut self,
        frame: &mut Frame,
        instruction: &MatchInstruction,
        plan: &InstructionPlan,
    ) -> Result<Flow, InterpretError> {
        let key = self.read(frame, instruction.key)?;

        for (index, case) in instruction.cases.iter().enumerate() {
            let mut defined = Vec::new();
            match case.kind {
                MatchCaseKind::Value(register) => {
                    let candidate = self.read(frame, register)?;
                    if !self.objects_equal(&key, &candidate)? {
                        continue;
                    }
                }
                MatchCaseKind::StatefulEnum { element, where_ } => match &key {
                    Object::EnumElement { which, state } if *which == element => {
                        let state = state.as_deref().cloned().ok_or_else(|| {
                            InterpretError::unreachable("stateful case on a stateless element")
                        })?;
                        self.define(frame, where_, state)?;
                        defined.push(where_);
                    }
                    _ => continue,
                },
                MatchCaseKind::Default => {}
            }

            let case_plan = plan.nested.get(index).ok_or_else(|| {
                InterpretError::unreachable("match case without a plan")
            })?;
            return match self.run_sequence(frame, &case.action, case_plan, defined, case.value)? {
                Flow::Yield(value) => self.define(frame, instruction.result, value),
                Flow::Continue => Err(InterpretError::unreachable(
                    "match case without a value did not diverge",
                )),
                flow => Ok(flow),
            };
        }

        Err(InterpretError::unreachable(format!(
            "no case matched a {}",
            key.kind()
        )))
    }

    fn objects_equal(&self, left: &Object, right: &Object) -> Result<bool, InterpretError> {
        match (left, right) {
            (Object::Unit, Object::Unit) => Ok(true),
            (Object::Integer(left), Object::Integer(right)) => Ok(left == right),
            (Object::String(left), Object::String(right)) => {
                Ok(StringRef::equals(&self.heap, left, right)?)
            }
            (
                Object::EnumElement {
                    which: left,
                    state: left_state,
                },
                Object::EnumElement {
                    which: right,
                    state: right_state,
                },
            ) => match (left_state, right_state) {
                (Some(left_state), Some(right_state)) => {
                    Ok(left == right && self.objects_equal(left_state, right_state)?)
                }
                _ => Ok(left == right),
            },
            (left, right) => Err(InterpretError::not_yet_supported(format!(
                "matching a {} against a {}",
                left.kind(),
                right.kind()
            ))),
        }
    }

    /// Builds the runtime form of a constant. The result is owned.
    fn materialize(&mut self, value: &Value) -> Result<Object, InterpretError> {
        Ok(match value {
            Value::Unit => Object::Unit,
            Value::Integer(value) => Object::Integer(value.clone()),
            Value::String(value) => {
                Object::String(StringRef::from_bytes(&mut self.heap, value.as_bytes()))
            }
            Value::FunctionPointer(pointer) => Object::Function {
                code: pointer.code,
                captures: self.materialize_all(&pointer.captures)?,
            },
            Value::FlatObject(members) => Object::Structure(self.materialize_all(members)?),
            Value::Type(ty) => Object::Type(ty.clone()),
            Value::EnumElement(element) => Object::EnumElement {
                which: element.which,
                state: match &element.state {
                    Some(state) => Some(Box::new(self.materialize(state)?)),
                    None => None,
                },
            },
            Value::Tuple(elements) => Object::Tuple(self.materialize_all(elements)?),
            Value::EnumConstructor(constructor) => Object::EnumConstructor(constructor.clone()),
            Value::TypeErased(erased) => {
                let value = self.materialize(&erased.self_)?;
                let vtable = self
                    .vtables
                    .get_or_build(self.program, erased.implementation)
                    .ok_or_else(|| InterpretError::unreachable("unknown implementation"))?;
                Object::Interface(InterfaceReference::erase(&mut self.heap, vtable, value))
            }
            Value::Pattern => return Err(InterpretError::not_yet_supported("pattern literal")),
            Value::GenericEnum(_) => {
                return Err(InterpretError::not_yet_supported("generic enum literal"));
            }
        })
    }

    fn materialize_all(&mut self, values: &[Value]) -> Result<Vec<Object>, InterpretError> {
        values.iter().map(|x| self.materialize(x)).collect()
    }
}
