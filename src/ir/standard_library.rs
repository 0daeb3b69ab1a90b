//! The object loaded by the `global` instruction.
//!
//! Its members are intrinsic functions implemented by the runtime. They
//! borrow their arguments; the caller owns their results.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    StructMemberId,
    integer_range::IntegerRange,
    types::{Enumeration, FunctionPointer, Structure, StructureMember, Type},
};

pub const FALSE: usize = 0;
pub const TRUE: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intrinsic {
    SideEffect,
    IntegerToString,
    Assert,
    IntegerLess,
    IntegerEquals,
    Not,
    Concat,
    StringEquals,
    Print,
}

impl Intrinsic {
    /// Every intrinsic in member order.
    pub const ALL: [Intrinsic; 9] = [
        Intrinsic::SideEffect,
        Intrinsic::IntegerToString,
        Intrinsic::Assert,
        Intrinsic::IntegerLess,
        Intrinsic::IntegerEquals,
        Intrinsic::Not,
        Intrinsic::Concat,
        Intrinsic::StringEquals,
        Intrinsic::Print,
    ];

    pub fn from_member(member: StructMemberId) -> Option<Self> {
        Self::ALL.get(member).copied()
    }

    pub fn member(self) -> StructMemberId {
        self as StructMemberId
    }

    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::SideEffect => "side_effect",
            Intrinsic::IntegerToString => "integer_to_string",
            Intrinsic::Assert => "assert",
            Intrinsic::IntegerLess => "integer_less",
            Intrinsic::IntegerEquals => "integer_equals",
            Intrinsic::Not => "not",
            Intrinsic::Concat => "concat",
            Intrinsic::StringEquals => "string_equals",
            Intrinsic::Print => "print",
        }
    }

    pub fn signature(self) -> FunctionPointer {
        let integer = Type::IntegerRange(IntegerRange::u64());
        match self {
            Intrinsic::SideEffect => FunctionPointer::new(Type::Unit, vec![]),
            Intrinsic::IntegerToString => FunctionPointer::new(Type::StringRef, vec![integer]),
            Intrinsic::Assert => FunctionPointer::new(Type::Unit, vec![boolean()]),
            Intrinsic::IntegerLess | Intrinsic::IntegerEquals => {
                FunctionPointer::new(boolean(), vec![integer.clone(), integer])
            }
            Intrinsic::Not => FunctionPointer::new(boolean(), vec![boolean()]),
            Intrinsic::Concat => {
                FunctionPointer::new(Type::StringRef, vec![Type::StringRef, Type::StringRef])
            }
            Intrinsic::StringEquals => {
                FunctionPointer::new(boolean(), vec![Type::StringRef, Type::StringRef])
            }
            Intrinsic::Print => FunctionPointer::new(Type::Unit, vec![Type::StringRef]),
        }
    }
}

/// The stateless enumeration `{false, true}`.
pub fn boolean() -> Type {
    Type::Enumeration(Arc::new(Enumeration::new([("false", None), ("true", None)])))
}

/// The type of the register written by `global`.
pub fn globals_type() -> Type {
    Type::Structure(Arc::new(Structure {
        members: Intrinsic::ALL
            .iter()
            .map(|x| StructureMember {
                name: x.name().to_string(),
                what: Type::FunctionPointer(Arc::new(x.signature())),
            })
            .collect(),
    }))
}
