//! Human readable rendering of the IR, one trace line per instruction.
//!
//! Rendering is read only and fails on cases it does not know how to print
//! instead of leaving them out.

use std::fmt::Write;

use itertools::Itertools;
use thiserror::Error;

use super::{
    Function, Program,
    instruction::{Instruction, InstructionSequence, MatchCaseKind},
    types::Type,
    value::Value,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("rendering not implemented for {what}")]
    NotImplemented { what: &'static str },
    #[error(transparent)]
    Format(#[from] std::fmt::Error),
}

impl Type {
    pub fn display(&self) -> Result<String, RenderError> {
        let mut f = String::new();
        match self {
            Type::Unit => write!(f, "()")?,
            Type::IntegerRange(range) => {
                write!(f, "int({}, {})", range.minimum(), range.maximum())?
            }
            Type::Enumeration(enumeration) => {
                let elements: Vec<String> = enumeration
                    .elements
                    .iter()
                    .map(|x| match &x.state {
                        Some(state) => Ok(format!("{}({})", x.name, state.display()?)),
                        None => Ok(x.name.clone()),
                    })
                    .collect::<Result<_, RenderError>>()?;
                write!(f, "enum {{{}}}", elements.join(", "))?
            }
            Type::Structure(structure) => {
                let members: Vec<String> = structure
                    .members
                    .iter()
                    .map(|x| Ok(format!("{}: {}", x.name, x.what.display()?)))
                    .collect::<Result<_, RenderError>>()?;
                write!(f, "struct {{{}}}", members.join(", "))?
            }
            Type::FunctionPointer(pointer) => {
                let parameters: Vec<String> = pointer
                    .parameters
                    .elements
                    .iter()
                    .map(Type::display)
                    .collect::<Result<_, _>>()?;
                write!(
                    f,
                    "fn({}) -> {}",
                    parameters.join(", "),
                    pointer.result.display()?
                )?
            }
            Type::StringRef => write!(f, "string-ref")?,
            Type::Tuple(tuple) => {
                let elements: Vec<String> =
                    tuple.elements.iter().map(Type::display).collect::<Result<_, _>>()?;
                write!(f, "({})", elements.join(", "))?
            }
            Type::Type => write!(f, "type")?,
            Type::EnumConstructor(constructor) => {
                write!(f, "enum-constructor #{}", constructor.which)?
            }
            Type::Lambda(lambda) => write!(f, "lambda #{}", lambda.lambda)?,
            Type::Interface(interface) => write!(f, "interface #{interface}")?,
            Type::MethodPointer(method) => {
                write!(f, "method #{} of interface #{}", method.method, method.interface)?
            }
            Type::GenericEnum(_) => return Err(RenderError::NotImplemented { what: "generic enum" }),
        }
        Ok(f)
    }
}

impl Value {
    pub fn display(&self) -> Result<String, RenderError> {
        let mut f = String::new();
        match self {
            Value::Unit => write!(f, "unit")?,
            Value::Integer(value) => write!(f, "integer {value}")?,
            Value::String(value) => write!(f, "string {value:?}")?,
            Value::FunctionPointer(pointer) => {
                write!(f, "function pointer #{}", pointer.code)?;
                if !pointer.captures.is_empty() {
                    let captures: Vec<String> =
                        pointer.captures.iter().map(Value::display).collect::<Result<_, _>>()?;
                    write!(f, " captures ({})", captures.join(", "))?;
                }
            }
            Value::FlatObject(members) => {
                let members: Vec<String> = members.iter().map(Value::display).collect::<Result<_, _>>()?;
                write!(f, "object {{{}}}", members.join(", "))?
            }
            Value::Type(ty) => write!(f, "type {}", ty.display()?)?,
            Value::EnumElement(element) => {
                let state = match &element.state {
                    Some(state) => state.display()?,
                    None => Value::unit().display()?,
                };
                write!(f, "enum element #{}, state = ({})", element.which, state)?
            }
            Value::Tuple(elements) => {
                let elements: Vec<String> = elements.iter().map(Value::display).collect::<Result<_, _>>()?;
                write!(f, "tuple ({})", elements.join(", "))?
            }
            Value::EnumConstructor(constructor) => {
                write!(f, "enum constructor #{}", constructor.which)?
            }
            Value::TypeErased(erased) => write!(
                f,
                "erased implementation #{} of interface #{} self {}",
                erased.implementation.implementation,
                erased.implementation.interface,
                erased.self_.display()?
            )?,
            Value::Pattern => return Err(RenderError::NotImplemented { what: "pattern" }),
            Value::GenericEnum(_) => {
                return Err(RenderError::NotImplemented { what: "generic enum" });
            }
        }
        Ok(f)
    }
}

fn registers(registers: &[usize]) -> String {
    registers.iter().join(" ")
}

impl Instruction {
    /// Renders the instruction into `f`, nested sequences indented below it.
    pub fn display(&self, f: &mut String, indentation: usize) -> Result<(), RenderError> {
        write!(f, "{}", "    ".repeat(indentation))?;
        match self {
            Instruction::Call(x) => writeln!(
                f,
                "call callee {} result {} arguments {}",
                x.callee,
                x.result,
                registers(&x.arguments)
            )?,
            Instruction::Return(x) => writeln!(
                f,
                "return {} unit goes into {}",
                x.returned_value, x.unit_goes_into
            )?,
            Instruction::Loop(x) => {
                writeln!(f, "loop result {}", x.result)?;
                x.body.display(f, indentation + 1)?;
            }
            Instruction::Break(x) => writeln!(f, "break {}", x.value)?,
            Instruction::Global(into) => writeln!(f, "global {into}")?,
            Instruction::Literal(x) => writeln!(f, "literal {} {}", x.into, x.value.display()?)?,
            Instruction::Tuple(x) => {
                writeln!(f, "tuple {} elements {}", x.result, registers(&x.elements))?
            }
            Instruction::ReadStruct(x) => writeln!(
                f,
                "read_struct {} member {} into {}",
                x.from_object, x.member, x.into
            )?,
            Instruction::Match(x) => {
                writeln!(f, "match key {} result {}", x.key, x.result)?;
                for case in &x.cases {
                    write!(f, "{}", "    ".repeat(indentation + 1))?;
                    match case.kind {
                        MatchCaseKind::Value(value) => write!(f, "case value {value}")?,
                        MatchCaseKind::StatefulEnum { element, where_ } => {
                            write!(f, "case element {element} where {where_}")?
                        }
                        MatchCaseKind::Default => write!(f, "case default")?,
                    }
                    match case.value {
                        Some(value) => writeln!(f, " value {value}")?,
                        None => writeln!(f)?,
                    }
                    case.action.display(f, indentation + 2)?;
                }
            }
            Instruction::InstantiateStruct(x) => writeln!(
                f,
                "instantiate_struct {} arguments {}",
                x.into,
                registers(&x.arguments)
            )?,
            Instruction::GetMethod(x) => writeln!(
                f,
                "get_method interface {} from {} method {} into {}",
                x.interface, x.from, x.method, x.into
            )?,
            Instruction::EraseType(x) => writeln!(
                f,
                "erase_type self {} into {} implementation {} of interface {}",
                x.self_, x.into, x.implementation.implementation, x.implementation.interface
            )?,
            Instruction::EnumConstruct(x) => writeln!(
                f,
                "enum_construct {} element {} state {}",
                x.into, x.which.which, x.state
            )?,
            Instruction::GetCaptures(into) => writeln!(f, "get_captures {into}")?,
            Instruction::LambdaWithCaptures(x) => writeln!(
                f,
                "lambda_with_captures {} function {} captures {}",
                x.into,
                x.lambda,
                registers(&x.captures)
            )?,
        }
        Ok(())
    }
}

impl InstructionSequence {
    pub fn display(&self, f: &mut String, indentation: usize) -> Result<(), RenderError> {
        for instruction in &self.instructions {
            instruction.display(f, indentation)?;
        }
        Ok(())
    }
}

impl Function {
    pub fn display(&self, f: &mut String) -> Result<(), RenderError> {
        for (register, ty) in self.register_types.iter().enumerate() {
            write!(f, "register {register}: {}", ty.display()?)?;
            match self.debug_name(register) {
                Some(name) => writeln!(f, " ({name})")?,
                None => writeln!(f)?,
            }
        }
        self.body.display(f, 1)
    }
}

impl Program {
    pub fn display(&self) -> Result<String, RenderError> {
        let mut f = String::new();
        for (id, function) in self.functions.iter().enumerate() {
            writeln!(f, "function {id} -> {}", function.signature.result.display()?)?;
            function.display(&mut f)?;
        }
        Ok(f)
    }
}
