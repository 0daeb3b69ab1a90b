use serde::{Deserialize, Serialize};

use super::{
    EnumElementId, FunctionId, ImplementationRef, InterfaceId, MethodId, RegisterId,
    StructMemberId, types::EnumConstructorType, value::Value,
};

/// An ordered list of instructions; one function body, loop body or match case.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstructionSequence {
    pub instructions: Vec<Instruction>,
}

impl InstructionSequence {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl From<Vec<Instruction>> for InstructionSequence {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::new(instructions)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    Call(CallInstruction),
    Return(ReturnInstruction),
    Loop(LoopInstruction),
    Break(BreakInstruction),
    /// Loads the standard library object.
    Global(RegisterId),
    Literal(LiteralInstruction),
    Tuple(TupleInstruction),
    ReadStruct(ReadStructInstruction),
    Match(MatchInstruction),
    InstantiateStruct(InstantiateStructInstruction),
    GetMethod(GetMethodInstruction),
    EraseType(EraseTypeInstruction),
    EnumConstruct(EnumConstructInstruction),
    /// Loads the captures of the running closure.
    GetCaptures(RegisterId),
    LambdaWithCaptures(LambdaWithCapturesInstruction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInstruction {
    pub callee: RegisterId,
    pub arguments: Vec<RegisterId>,
    pub result: RegisterId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnInstruction {
    pub returned_value: RegisterId,
    pub unit_goes_into: RegisterId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopInstruction {
    /// Receives the value carried by the `break` leaving the loop.
    pub result: RegisterId,
    pub body: InstructionSequence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakInstruction {
    pub value: RegisterId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralInstruction {
    pub into: RegisterId,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleInstruction {
    pub elements: Vec<RegisterId>,
    pub result: RegisterId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStructInstruction {
    pub from_object: RegisterId,
    pub member: StructMemberId,
    pub into: RegisterId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInstruction {
    pub key: RegisterId,
    pub cases: Vec<MatchCase>,
    pub result: RegisterId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCase {
    pub kind: MatchCaseKind,
    pub action: InstructionSequence,
    /// The value of the case, `None` if the action always diverges.
    pub value: Option<RegisterId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCaseKind {
    /// Compares the key with the value of a register.
    Value(RegisterId),
    /// Matches one element of a stateful enumeration and binds its state.
    StatefulEnum {
        element: EnumElementId,
        #[serde(rename = "where")]
        where_: RegisterId,
    },
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiateStructInstruction {
    pub into: RegisterId,
    pub arguments: Vec<RegisterId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMethodInstruction {
    pub interface: InterfaceId,
    pub from: RegisterId,
    pub method: MethodId,
    pub into: RegisterId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraseTypeInstruction {
    #[serde(rename = "self")]
    pub self_: RegisterId,
    pub into: RegisterId,
    pub implementation: ImplementationRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumConstructInstruction {
    pub into: RegisterId,
    pub which: EnumConstructorType,
    pub state: RegisterId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LambdaWithCapturesInstruction {
    pub into: RegisterId,
    pub lambda: FunctionId,
    pub captures: Vec<RegisterId>,
}

impl Instruction {
    /// The register this instruction defines in its own sequence.
    pub fn defined_register(&self) -> Option<RegisterId> {
        match self {
            Instruction::Call(x) => Some(x.result),
            Instruction::Return(x) => Some(x.unit_goes_into),
            Instruction::Loop(x) => Some(x.result),
            Instruction::Break(_) => None,
            Instruction::Global(into) | Instruction::GetCaptures(into) => Some(*into),
            Instruction::Literal(x) => Some(x.into),
            Instruction::Tuple(x) => Some(x.result),
            Instruction::ReadStruct(x) => Some(x.into),
            Instruction::Match(x) => Some(x.result),
            Instruction::InstantiateStruct(x) => Some(x.into),
            Instruction::GetMethod(x) => Some(x.into),
            Instruction::EraseType(x) => Some(x.into),
            Instruction::EnumConstruct(x) => Some(x.into),
            Instruction::LambdaWithCaptures(x) => Some(x.into),
        }
    }

    /// Registers read directly by this instruction, in evaluation order.
    ///
    /// Registers read inside nested sequences are not included, neither are
    /// the values of match cases which are read at the end of their action.
    pub fn operands(&self) -> Vec<RegisterId> {
        match self {
            Instruction::Call(x) => std::iter::once(x.callee)
                .chain(x.arguments.iter().copied())
                .collect(),
            Instruction::Return(x) => vec![x.returned_value],
            Instruction::Break(x) => vec![x.value],
            Instruction::Loop(_)
            | Instruction::Global(_)
            | Instruction::GetCaptures(_)
            | Instruction::Literal(_) => vec![],
            Instruction::Tuple(x) => x.elements.clone(),
            Instruction::ReadStruct(x) => vec![x.from_object],
            Instruction::Match(x) => std::iter::once(x.key)
                .chain(x.cases.iter().filter_map(|case| match case.kind {
                    MatchCaseKind::Value(value) => Some(value),
                    _ => None,
                }))
                .collect(),
            Instruction::InstantiateStruct(x) => x.arguments.clone(),
            Instruction::GetMethod(x) => vec![x.from],
            Instruction::EraseType(x) => vec![x.self_],
            Instruction::EnumConstruct(x) => vec![x.state],
            Instruction::LambdaWithCaptures(x) => x.captures.clone(),
        }
    }

    /// Whether control never continues to the next instruction.
    pub fn diverges(&self) -> bool {
        matches!(self, Instruction::Return(_) | Instruction::Break(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Call(_) => "call",
            Instruction::Return(_) => "return",
            Instruction::Loop(_) => "loop",
            Instruction::Break(_) => "break",
            Instruction::Global(_) => "global",
            Instruction::Literal(_) => "literal",
            Instruction::Tuple(_) => "tuple",
            Instruction::ReadStruct(_) => "read_struct",
            Instruction::Match(_) => "match",
            Instruction::InstantiateStruct(_) => "instantiate_struct",
            Instruction::GetMethod(_) => "get_method",
            Instruction::EraseType(_) => "erase_type",
            Instruction::EnumConstruct(_) => "enum_construct",
            Instruction::GetCaptures(_) => "get_captures",
            Instruction::LambdaWithCaptures(_) => "lambda_with_captures",
        }
    }
}
