use serde::{Deserialize, Serialize};

use self::{
    instruction::InstructionSequence,
    types::{FunctionPointer, TupleType, Type},
};

pub mod builder;
pub mod display;
pub mod instruction;
pub mod integer_range;
pub mod standard_library;
pub mod types;
pub mod value;

pub type RegisterId = usize;
pub type FunctionId = usize;
pub type InterfaceId = usize;
pub type ImplementationId = usize;
pub type MethodId = usize;
pub type StructMemberId = usize;
pub type EnumElementId = usize;
pub type GenericEnumId = usize;

/// Holds a whole checked program.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Program {
    /// The functions of the program. The first one is the entry point.
    pub functions: Vec<Function>,
    /// The interfaces and their implementations.
    #[serde(default)]
    pub interfaces: Vec<Interface>,
}

impl Program {
    pub fn entry_point(&self) -> Option<&Function> {
        self.functions.first()
    }

    pub fn implementation(&self, implementation: ImplementationRef) -> Option<&Implementation> {
        self.interfaces
            .get(implementation.interface)?
            .implementations
            .get(implementation.implementation)
    }

    pub fn method(&self, interface: InterfaceId, method: MethodId) -> Option<&MethodDescription> {
        self.interfaces.get(interface)?.methods.get(method)
    }
}

/// A function or closure body after type checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub signature: FunctionPointer,
    pub body: InstructionSequence,
    /// The declared type of every register, indexed by register id.
    pub register_types: Vec<Type>,
    /// Names to use for registers in generated code, when known.
    #[serde(default)]
    pub register_debug_names: Vec<Option<String>>,
}

impl Function {
    pub fn number_of_registers(&self) -> usize {
        self.register_types.len()
    }

    pub fn register_type(&self, register: RegisterId) -> Option<&Type> {
        self.register_types.get(register)
    }

    pub fn debug_name(&self, register: RegisterId) -> Option<&str> {
        self.register_debug_names
            .get(register)
            .and_then(|x| x.as_deref())
    }

    /// The register holding `self` in method implementations.
    pub fn self_register(&self) -> Option<RegisterId> {
        self.signature.self_.as_ref().map(|_| 0)
    }

    /// Registers holding the parameters, in order. They come after `self`.
    pub fn parameter_registers(&self) -> std::ops::Range<RegisterId> {
        let first = usize::from(self.signature.self_.is_some());
        first..first + self.signature.parameters.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub methods: Vec<MethodDescription>,
    #[serde(default)]
    pub implementations: Vec<Implementation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescription {
    pub name: String,
    pub parameters: TupleType,
    pub result: Type,
}

/// Implementation of an interface for one concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    #[serde(rename = "self")]
    pub self_: Type,
    /// One function per method of the interface, in the same order.
    pub methods: Vec<FunctionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImplementationRef {
    pub interface: InterfaceId,
    pub implementation: ImplementationId,
}

impl ImplementationRef {
    pub fn new(interface: InterfaceId, implementation: ImplementationId) -> Self {
        Self {
            interface,
            implementation,
        }
    }
}
