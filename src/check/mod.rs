//! Structural verification of programs before they are run or compiled.

use std::collections::{BTreeSet, HashMap};

use num_bigint::BigInt;
use tracing::debug;

use crate::ir::{
    Function, FunctionId, Program, RegisterId,
    instruction::{
        CallInstruction, Instruction, InstructionSequence, MatchCaseKind, MatchInstruction,
    },
    standard_library::globals_type,
    types::{MethodPointerType, Type},
    value::Value,
};

pub use errors::CheckError;

pub mod errors;

/// Checks every function and implementation of the program.
pub fn check_program(program: &Program) -> Result<(), CheckError> {
    let entry = program.entry_point().ok_or(CheckError::MissingEntryPoint)?;
    if !entry.signature.parameters.is_empty()
        || !entry.signature.captures.is_empty()
        || entry.signature.self_.is_some()
    {
        return Err(CheckError::EntryPointSignature);
    }

    for (interface_id, interface) in program.interfaces.iter().enumerate() {
        for (implementation_id, implementation) in interface.implementations.iter().enumerate() {
            let reference = crate::ir::ImplementationRef::new(interface_id, implementation_id);
            let mismatch = CheckError::ImplementationMismatch {
                implementation: reference,
            };
            if implementation.methods.len() != interface.methods.len() {
                return Err(mismatch);
            }
            for (method, function) in interface.methods.iter().zip(&implementation.methods) {
                let function = program.functions.get(*function).ok_or(mismatch.clone())?;
                let signature = &function.signature;
                if signature.self_.as_ref() != Some(&implementation.self_)
                    || signature.parameters != method.parameters
                    || signature.result != method.result
                    || !signature.captures.is_empty()
                {
                    return Err(mismatch);
                }
            }
        }
    }

    for (id, function) in program.functions.iter().enumerate() {
        debug!("checking function {id}");
        FunctionChecker::new(program, id, function).check()?;
    }
    Ok(())
}

/// Whether a value of type `from` can be stored where `to` is expected.
pub fn assignable(from: &Type, to: &Type) -> bool {
    match (from, to) {
        (Type::IntegerRange(from), Type::IntegerRange(to)) => to.contains(from),
        _ => from == to,
    }
}

/// Whether control can never fall off the end of the sequence.
pub fn diverges(sequence: &InstructionSequence) -> bool {
    sequence.instructions.iter().any(|instruction| match instruction {
        Instruction::Return(_) | Instruction::Break(_) => true,
        Instruction::Match(x) => {
            !x.cases.is_empty() && x.cases.iter().all(|case| diverges(&case.action))
        }
        // A loop nobody breaks out of can only be left by returning.
        Instruction::Loop(x) => !breaks_out(&x.body),
        _ => false,
    })
}

/// Whether a `break` in the sequence leaves the loop directly enclosing it.
fn breaks_out(sequence: &InstructionSequence) -> bool {
    sequence.instructions.iter().any(|instruction| match instruction {
        Instruction::Break(_) => true,
        Instruction::Match(x) => x.cases.iter().any(|case| breaks_out(&case.action)),
        _ => false,
    })
}

struct FunctionChecker<'a> {
    program: &'a Program,
    id: FunctionId,
    function: &'a Function,
    assigned: Vec<bool>,
    /// Registers written by literals, used for exhaustiveness.
    literals: HashMap<RegisterId, &'a Value>,
}

impl<'a> FunctionChecker<'a> {
    fn new(program: &'a Program, id: FunctionId, function: &'a Function) -> Self {
        Self {
            program,
            id,
            function,
            assigned: vec![false; function.number_of_registers()],
            literals: HashMap::new(),
        }
    }

    fn check(mut self) -> Result<(), CheckError> {
        let function = self.function;
        let mut defined = vec![false; function.number_of_registers()];

        if let (Some(register), Some(self_)) = (function.self_register(), &function.signature.self_)
        {
            self.assign(register, &mut defined)?;
            self.expect_type(register, self_)?;
        }
        for (register, parameter) in function
            .parameter_registers()
            .zip(&function.signature.parameters.elements)
        {
            self.assign(register, &mut defined)?;
            self.expect_type(register, parameter)?;
        }

        self.check_sequence(&function.body, &mut defined, &mut Vec::new())?;
        if !diverges(&function.body) {
            return Err(CheckError::MissingReturn { function: self.id });
        }
        Ok(())
    }

    fn ty(&self, register: RegisterId) -> Result<&'a Type, CheckError> {
        self.function
            .register_type(register)
            .ok_or(CheckError::RegisterOutOfRange {
                function: self.id,
                register,
            })
    }

    fn expect_type(&self, register: RegisterId, expected: &Type) -> Result<(), CheckError> {
        if self.ty(register)? == expected {
            Ok(())
        } else {
            Err(self.mismatch(register))
        }
    }

    /// Checks that a value in `register` may be stored where `expected` is needed.
    fn expect_assignable(&self, register: RegisterId, expected: &Type) -> Result<(), CheckError> {
        if assignable(self.ty(register)?, expected) {
            Ok(())
        } else {
            Err(self.mismatch(register))
        }
    }

    fn mismatch(&self, register: RegisterId) -> CheckError {
        CheckError::TypeMismatch {
            function: self.id,
            register,
        }
    }

    fn assign(&mut self, register: RegisterId, defined: &mut [bool]) -> Result<(), CheckError> {
        self.ty(register)?;
        if std::mem::replace(&mut self.assigned[register], true) {
            return Err(CheckError::AssignedTwice {
                function: self.id,
                register,
            });
        }
        defined[register] = true;
        Ok(())
    }

    fn require_defined(&self, register: RegisterId, defined: &[bool]) -> Result<(), CheckError> {
        self.ty(register)?;
        if defined[register] {
            Ok(())
        } else {
            Err(CheckError::UndefinedRegister {
                function: self.id,
                register,
            })
        }
    }

    fn check_sequence(
        &mut self,
        sequence: &'a InstructionSequence,
        defined: &mut Vec<bool>,
        loops: &mut Vec<RegisterId>,
    ) -> Result<(), CheckError> {
        for instruction in &sequence.instructions {
            for operand in instruction.operands() {
                self.require_defined(operand, defined)?;
            }
            self.check_instruction(instruction, defined, loops)?;
            if let Some(register) = instruction.defined_register() {
                self.assign(register, defined)?;
            }
        }
        Ok(())
    }

    fn check_instruction(
        &mut self,
        instruction: &'a Instruction,
        defined: &mut Vec<bool>,
        loops: &mut Vec<RegisterId>,
    ) -> Result<(), CheckError> {
        let id = self.id;
        match instruction {
            Instruction::Call(x) => self.check_call(x),
            Instruction::Return(x) => {
                self.expect_assignable(x.returned_value, &self.function.signature.result)?;
                self.expect_type(x.unit_goes_into, &Type::Unit)
            }
            Instruction::Loop(x) => {
                self.ty(x.result)?;
                loops.push(x.result);
                let mut inner = defined.clone();
                self.check_sequence(&x.body, &mut inner, loops)?;
                loops.pop();
                Ok(())
            }
            Instruction::Break(x) => {
                let result = *loops
                    .last()
                    .ok_or(CheckError::BreakOutsideLoop { function: id })?;
                self.expect_assignable(x.value, self.ty(result)?)
            }
            Instruction::Global(into) => self.expect_type(*into, &globals_type()),
            Instruction::GetCaptures(into) => self.expect_type(
                *into,
                &Type::Tuple(self.function.signature.captures.clone()),
            ),
            Instruction::Literal(x) => {
                if !x.value.conforms_to(self.ty(x.into)?, self.program) {
                    return Err(CheckError::LiteralTypeMismatch {
                        function: id,
                        register: x.into,
                    });
                }
                self.literals.insert(x.into, &x.value);
                Ok(())
            }
            Instruction::Tuple(x) => match self.ty(x.result)? {
                Type::Tuple(tuple) if tuple.len() == x.elements.len() => x
                    .elements
                    .iter()
                    .zip(&tuple.elements)
                    .try_for_each(|(register, ty)| self.expect_assignable(*register, ty)),
                _ => Err(self.mismatch(x.result)),
            },
            Instruction::ReadStruct(x) => {
                let member = match self.ty(x.from_object)? {
                    Type::Structure(structure) => {
                        structure.members.get(x.member).map(|member| &member.what)
                    }
                    Type::Tuple(tuple) => tuple.elements.get(x.member),
                    _ => None,
                };
                let member = member.ok_or(CheckError::MemberOutOfRange {
                    function: id,
                    register: x.from_object,
                    member: x.member,
                })?;
                self.expect_type(x.into, member)
            }
            Instruction::Match(x) => self.check_match(x, defined, loops),
            Instruction::InstantiateStruct(x) => match self.ty(x.into)? {
                Type::Structure(structure) if structure.members.len() == x.arguments.len() => x
                    .arguments
                    .iter()
                    .zip(&structure.members)
                    .try_for_each(|(register, member)| {
                        self.expect_assignable(*register, &member.what)
                    }),
                _ => Err(self.mismatch(x.into)),
            },
            Instruction::GetMethod(x) => {
                self.expect_type(x.from, &Type::Interface(x.interface))?;
                self.program
                    .method(x.interface, x.method)
                    .ok_or(CheckError::UnknownMethod {
                        interface: x.interface,
                        method: x.method,
                    })?;
                self.expect_type(
                    x.into,
                    &Type::MethodPointer(MethodPointerType {
                        interface: x.interface,
                        method: x.method,
                    }),
                )
            }
            Instruction::EraseType(x) => {
                let implementation = self.program.implementation(x.implementation).ok_or(
                    CheckError::UnknownImplementation {
                        function: id,
                        implementation: x.implementation,
                    },
                )?;
                self.expect_assignable(x.self_, &implementation.self_)?;
                self.expect_type(x.into, &Type::Interface(x.implementation.interface))
            }
            Instruction::EnumConstruct(x) => {
                self.expect_type(x.into, &Type::Enumeration(x.which.enumeration.clone()))?;
                let state = x
                    .which
                    .enumeration
                    .element(x.which.which)
                    .and_then(|element| element.state.as_ref())
                    .ok_or(CheckError::StatelessElement {
                        function: id,
                        element: x.which.which,
                    })?;
                self.expect_assignable(x.state, state)
            }
            Instruction::LambdaWithCaptures(x) => {
                let lambda = self.program.functions.get(x.lambda).ok_or(
                    CheckError::UnknownFunction {
                        function: id,
                        callee: x.lambda,
                    },
                )?;
                let captures = &lambda.signature.captures.elements;
                if captures.len() != x.captures.len() {
                    return Err(CheckError::ArgumentCountMismatch {
                        function: id,
                        expected: captures.len(),
                        found: x.captures.len(),
                    });
                }
                for (register, ty) in x.captures.iter().zip(captures) {
                    self.expect_type(*register, ty)?;
                }
                self.expect_type(
                    x.into,
                    &Type::Lambda(crate::ir::types::LambdaType { lambda: x.lambda }),
                )
            }
        }
    }

    fn check_call(&self, call: &CallInstruction) -> Result<(), CheckError> {
        let id = self.id;
        let (parameters, result) = match self.ty(call.callee)? {
            Type::FunctionPointer(pointer) => {
                (pointer.parameters.elements.clone(), pointer.result.clone())
            }
            Type::Lambda(lambda) => {
                let callee = self.program.functions.get(lambda.lambda).ok_or(
                    CheckError::UnknownFunction {
                        function: id,
                        callee: lambda.lambda,
                    },
                )?;
                (
                    callee.signature.parameters.elements.clone(),
                    callee.signature.result.clone(),
                )
            }
            Type::MethodPointer(method) => {
                let description = self.program.method(method.interface, method.method).ok_or(
                    CheckError::UnknownMethod {
                        interface: method.interface,
                        method: method.method,
                    },
                )?;
                (
                    description.parameters.elements.clone(),
                    description.result.clone(),
                )
            }
            Type::EnumConstructor(constructor) => {
                let state = constructor
                    .enumeration
                    .element(constructor.which)
                    .and_then(|element| element.state.clone())
                    .ok_or(CheckError::StatelessElement {
                        function: id,
                        element: constructor.which,
                    })?;
                (
                    vec![state],
                    Type::Enumeration(constructor.enumeration.clone()),
                )
            }
            _ => {
                return Err(CheckError::NotCallable {
                    function: id,
                    register: call.callee,
                });
            }
        };

        if parameters.len() != call.arguments.len() {
            return Err(CheckError::ArgumentCountMismatch {
                function: id,
                expected: parameters.len(),
                found: call.arguments.len(),
            });
        }
        for (argument, parameter) in call.arguments.iter().zip(&parameters) {
            self.expect_assignable(*argument, parameter)?;
        }
        if assignable(&result, self.ty(call.result)?) {
            Ok(())
        } else {
            Err(self.mismatch(call.result))
        }
    }

    fn check_match(
        &mut self,
        instruction: &'a MatchInstruction,
        defined: &mut Vec<bool>,
        loops: &mut Vec<RegisterId>,
    ) -> Result<(), CheckError> {
        let id = self.id;
        let key_type = self.ty(instruction.key)?;
        let result_type = self.ty(instruction.result)?;

        for case in &instruction.cases {
            let mut inner = defined.clone();
            if let MatchCaseKind::StatefulEnum { element, where_ } = case.kind {
                let Type::Enumeration(enumeration) = key_type else {
                    return Err(self.mismatch(instruction.key));
                };
                let state = enumeration
                    .element(element)
                    .and_then(|x| x.state.as_ref())
                    .ok_or(CheckError::StatelessElement {
                        function: id,
                        element,
                    })?;
                self.assign(where_, &mut inner)?;
                self.expect_type(where_, state)?;
            }

            self.check_sequence(&case.action, &mut inner, loops)?;

            match case.value {
                Some(value) => {
                    self.require_defined(value, &inner)?;
                    self.expect_assignable(value, result_type)?;
                }
                None if diverges(&case.action) => {}
                None => return Err(CheckError::CaseWithoutValue { function: id }),
            }
        }

        if self.is_exhaustive(instruction, key_type) {
            Ok(())
        } else {
            Err(CheckError::NonExhaustiveMatch {
                function: id,
                key: instruction.key,
            })
        }
    }

    fn is_exhaustive(&self, instruction: &MatchInstruction, key_type: &Type) -> bool {
        if instruction
            .cases
            .iter()
            .any(|case| case.kind == MatchCaseKind::Default)
        {
            return true;
        }

        let literal = |register: RegisterId| self.literals.get(&register).copied();
        match key_type {
            Type::Enumeration(enumeration) => {
                let covered: BTreeSet<usize> = instruction
                    .cases
                    .iter()
                    .filter_map(|case| match case.kind {
                        MatchCaseKind::StatefulEnum { element, .. } => Some(element),
                        MatchCaseKind::Value(register) => match literal(register) {
                            Some(Value::EnumElement(element)) if element.state.is_none() => {
                                Some(element.which)
                            }
                            _ => None,
                        },
                        MatchCaseKind::Default => None,
                    })
                    .collect();
                (0..enumeration.elements.len()).all(|x| covered.contains(&x))
            }
            Type::IntegerRange(range) => {
                let covered: BTreeSet<&BigInt> = instruction
                    .cases
                    .iter()
                    .filter_map(|case| match case.kind {
                        MatchCaseKind::Value(register) => match literal(register) {
                            Some(Value::Integer(value)) if range.contains_integer(value) => {
                                Some(value)
                            }
                            _ => None,
                        },
                        _ => None,
                    })
                    .collect();
                BigInt::from(covered.len()) == range.size()
            }
            Type::Unit => !instruction.cases.is_empty(),
            _ => false,
        }
    }
}
