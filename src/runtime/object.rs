use num_bigint::BigInt;

use crate::ir::{
    FunctionId, MethodId, standard_library::Intrinsic, types::EnumConstructorType, types::Type,
};

use super::{Heap, InterfaceReference, RuntimeError, StringRef};

/// Reference management shared by everything that can sit in a register.
pub trait Managed {
    /// Registers one more owner.
    fn add_reference(&self, heap: &mut Heap) -> Result<(), RuntimeError>;
    /// Gives up this owner's reference, destroying what is no longer owned.
    fn release(self, heap: &mut Heap) -> Result<(), RuntimeError>;
}

/// A runtime value.
///
/// `clone` copies handles without touching reference counts, which is what a
/// borrow needs. A second owner needs [`Managed::add_reference`].
#[derive(Debug, Clone)]
pub enum Object {
    Unit,
    Integer(BigInt),
    String(StringRef),
    Interface(InterfaceReference),
    Tuple(Vec<Object>),
    Structure(Vec<Object>),
    EnumElement {
        which: usize,
        state: Option<Box<Object>>,
    },
    /// A function, with the captures it closes over.
    Function {
        code: FunctionId,
        captures: Vec<Object>,
    },
    Intrinsic(Intrinsic),
    MethodPointer {
        reference: InterfaceReference,
        method: MethodId,
    },
    EnumConstructor(EnumConstructorType),
    Type(Type),
    /// The standard library object.
    Globals,
}

impl Object {
    pub fn boolean(value: bool) -> Self {
        Object::EnumElement {
            which: usize::from(value),
            state: None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Object::Unit => "unit",
            Object::Integer(_) => "integer",
            Object::String(_) => "string",
            Object::Interface(_) => "interface reference",
            Object::Tuple(_) => "tuple",
            Object::Structure(_) => "structure",
            Object::EnumElement { .. } => "enum element",
            Object::Function { .. } => "function",
            Object::Intrinsic(_) => "intrinsic",
            Object::MethodPointer { .. } => "method pointer",
            Object::EnumConstructor(_) => "enum constructor",
            Object::Type(_) => "type",
            Object::Globals => "globals",
        }
    }

    /// Members of tuples, structures and capture lists.
    pub fn members(&self) -> Option<&[Object]> {
        match self {
            Object::Tuple(members) | Object::Structure(members) => Some(members),
            _ => None,
        }
    }
}

impl Managed for Object {
    fn add_reference(&self, heap: &mut Heap) -> Result<(), RuntimeError> {
        match self {
            Object::String(string) => string.add_reference(heap),
            Object::Interface(reference) | Object::MethodPointer { reference, .. } => {
                reference.add_reference(heap)
            }
            Object::Tuple(members)
            | Object::Structure(members)
            | Object::Function {
                captures: members, ..
            } => members.iter().try_for_each(|x| x.add_reference(heap)),
            Object::EnumElement { state, .. } => match state {
                Some(state) => state.add_reference(heap),
                None => Ok(()),
            },
            Object::Unit
            | Object::Integer(_)
            | Object::Intrinsic(_)
            | Object::EnumConstructor(_)
            | Object::Type(_)
            | Object::Globals => Ok(()),
        }
    }

    fn release(self, heap: &mut Heap) -> Result<(), RuntimeError> {
        match self {
            Object::String(string) => string.release(heap),
            Object::Interface(reference) | Object::MethodPointer { reference, .. } => {
                reference.release(heap)
            }
            Object::Tuple(members)
            | Object::Structure(members)
            | Object::Function {
                captures: members, ..
            } => members.into_iter().try_for_each(|x| x.release(heap)),
            Object::EnumElement { state, .. } => match state {
                Some(state) => (*state).release(heap),
                None => Ok(()),
            },
            Object::Unit
            | Object::Integer(_)
            | Object::Intrinsic(_)
            | Object::EnumConstructor(_)
            | Object::Type(_)
            | Object::Globals => Ok(()),
        }
    }
}
