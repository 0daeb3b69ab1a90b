use super::{
    Function, RegisterId,
    instruction::{Instruction, InstructionSequence},
    types::{FunctionPointer, Type},
};

/// Allocates registers while a function body is being put together.
#[derive(Debug, Clone)]
pub struct FunctionBuilder {
    pub signature: FunctionPointer,
    register_types: Vec<Type>,
    register_debug_names: Vec<Option<String>>,
}

impl FunctionBuilder {
    /// Creates a builder with the `self` and parameter registers already allocated.
    pub fn new(signature: FunctionPointer) -> Self {
        let mut builder = Self {
            signature: signature.clone(),
            register_types: Vec::new(),
            register_debug_names: Vec::new(),
        };
        if let Some(self_) = signature.self_ {
            builder.add_named_register(self_, "self");
        }
        for parameter in signature.parameters.elements {
            builder.add_register(parameter);
        }
        builder
    }

    pub fn add_register(&mut self, ty: Type) -> RegisterId {
        self.register_types.push(ty);
        self.register_debug_names.push(None);
        self.register_types.len() - 1
    }

    pub fn add_named_register(&mut self, ty: Type, name: &str) -> RegisterId {
        let register = self.add_register(ty);
        self.register_debug_names[register] = Some(name.to_string());
        register
    }

    /// The register holding the parameter at `index`.
    pub fn parameter(&self, index: usize) -> RegisterId {
        usize::from(self.signature.self_.is_some()) + index
    }

    pub fn finish(self, body: Vec<Instruction>) -> Function {
        Function {
            signature: self.signature,
            body: InstructionSequence::new(body),
            register_types: self.register_types,
            register_debug_names: self.register_debug_names,
        }
    }
}
