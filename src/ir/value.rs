use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use super::{
    EnumElementId, FunctionId, GenericEnumId, ImplementationRef, Program,
    integer_range,
    types::{EnumConstructorType, Type},
};

/// A constant known at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Unit,
    Integer(#[serde(with = "integer_range::bigint")] BigInt),
    String(String),
    FunctionPointer(FunctionPointerValue),
    /// An instance of a structure, members in declaration order.
    FlatObject(Vec<Value>),
    Type(Type),
    EnumElement(EnumElementValue),
    Tuple(Vec<Value>),
    EnumConstructor(EnumConstructorType),
    TypeErased(TypeErasedValue),
    /// Only exists while destructuring.
    Pattern,
    GenericEnum(GenericEnumId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionPointerValue {
    pub code: FunctionId,
    #[serde(default)]
    pub captures: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumElementValue {
    pub which: EnumElementId,
    /// `None` for stateless elements. Never equal to a unit state.
    #[serde(default)]
    pub state: Option<Box<Value>>,
    pub state_type: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeErasedValue {
    pub implementation: ImplementationRef,
    #[serde(rename = "self")]
    pub self_: Box<Value>,
}

impl Value {
    /// The canonical unit value.
    pub const fn unit() -> Self {
        Value::Unit
    }

    pub fn integer(value: impl Into<BigInt>) -> Self {
        Value::Integer(value.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn stateless_element(which: EnumElementId) -> Self {
        Value::EnumElement(EnumElementValue {
            which,
            state: None,
            state_type: Type::Unit,
        })
    }

    /// Whether a register of type `ty` may hold this value.
    pub fn conforms_to(&self, ty: &Type, program: &Program) -> bool {
        match (self, ty) {
            (Value::Unit, Type::Unit) => true,
            (Value::Integer(value), Type::IntegerRange(range)) => range.contains_integer(value),
            (Value::String(_), Type::StringRef) => true,
            (Value::FunctionPointer(pointer), Type::FunctionPointer(expected)) => {
                pointer.captures.is_empty()
                    && program
                        .functions
                        .get(pointer.code)
                        .is_some_and(|x| x.signature == **expected)
            }
            (Value::FunctionPointer(pointer), Type::Lambda(lambda)) => {
                pointer.code == lambda.lambda
                    && program.functions.get(pointer.code).is_some_and(|x| {
                        x.signature.captures.len() == pointer.captures.len()
                            && pointer
                                .captures
                                .iter()
                                .zip(&x.signature.captures.elements)
                                .all(|(value, ty)| value.conforms_to(ty, program))
                    })
            }
            (Value::FlatObject(members), Type::Structure(structure)) => {
                members.len() == structure.members.len()
                    && members
                        .iter()
                        .zip(&structure.members)
                        .all(|(value, member)| value.conforms_to(&member.what, program))
            }
            (Value::Type(_), Type::Type) => true,
            (Value::EnumElement(element), Type::Enumeration(enumeration)) => {
                match (enumeration.element(element.which), &element.state) {
                    (Some(declared), None) => declared.state.is_none(),
                    (Some(declared), Some(state)) => declared.state.as_ref().is_some_and(|x| {
                        *x == element.state_type && state.conforms_to(x, program)
                    }),
                    (None, _) => false,
                }
            }
            (Value::Tuple(elements), Type::Tuple(tuple)) => {
                elements.len() == tuple.len()
                    && elements
                        .iter()
                        .zip(&tuple.elements)
                        .all(|(value, ty)| value.conforms_to(ty, program))
            }
            (Value::EnumConstructor(constructor), Type::EnumConstructor(expected)) => {
                constructor == expected
            }
            (Value::TypeErased(erased), Type::Interface(interface)) => {
                erased.implementation.interface == *interface
                    && program
                        .implementation(erased.implementation)
                        .is_some_and(|x| erased.self_.conforms_to(&x.self_, program))
            }
            (Value::GenericEnum(id), Type::GenericEnum(expected)) => id == expected,
            _ => false,
        }
    }
}
