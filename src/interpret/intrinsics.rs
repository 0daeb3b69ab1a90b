use crate::{
    ir::standard_library::{Intrinsic, TRUE},
    runtime::{Object, StringRef},
};

use super::{InterpretError, Interpreter};

fn string(argument: Option<&Object>) -> Result<StringRef, InterpretError> {
    match argument {
        Some(Object::String(string)) => Ok(*string),
        other => Err(unexpected("string", other)),
    }
}

fn boolean(argument: Option<&Object>) -> Result<bool, InterpretError> {
    match argument {
        Some(Object::EnumElement { which, .. }) => Ok(*which == TRUE),
        other => Err(unexpected("boolean", other)),
    }
}

fn integer(argument: Option<&Object>) -> Result<&num_bigint::BigInt, InterpretError> {
    match argument {
        Some(Object::Integer(value)) => Ok(value),
        other => Err(unexpected("integer", other)),
    }
}

fn unexpected(expected: &str, found: Option<&Object>) -> InterpretError {
    InterpretError::unreachable(format!(
        "intrinsic expected {expected}, got {}",
        found.map_or("nothing", Object::kind)
    ))
}

impl Interpreter<'_> {
    /// Runs an intrinsic. Arguments are borrowed, the result is owned.
    pub(super) fn call_intrinsic(
        &mut self,
        intrinsic: Intrinsic,
        arguments: &[Object],
    ) -> Result<Object, InterpretError> {
        let first = arguments.first();
        let second = arguments.get(1);
        let result = match intrinsic {
            Intrinsic::SideEffect => Object::Unit,
            Intrinsic::IntegerToString => {
                let text = integer(first)?.to_string();
                Object::String(StringRef::from_bytes(&mut self.heap, text.as_bytes()))
            }
            Intrinsic::Assert => {
                if !boolean(first)? {
                    return Err(InterpretError::AssertionFailed);
                }
                Object::Unit
            }
            Intrinsic::IntegerLess => Object::boolean(integer(first)? < integer(second)?),
            Intrinsic::IntegerEquals => Object::boolean(integer(first)? == integer(second)?),
            Intrinsic::Not => Object::boolean(!boolean(first)?),
            Intrinsic::Concat => Object::String(StringRef::concat(
                &mut self.heap,
                &string(first)?,
                &string(second)?,
            )?),
            Intrinsic::StringEquals => {
                Object::boolean(StringRef::equals(&self.heap, &string(first)?, &string(second)?)?)
            }
            Intrinsic::Print => {
                let bytes = string(first)?.bytes(&self.heap)?;
                self.output.extend_from_slice(bytes);
                Object::Unit
            }
        };
        Ok(result)
    }
}
