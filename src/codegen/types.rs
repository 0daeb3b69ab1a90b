//! C representations of IR types and their reference-counting functions.

use std::{collections::HashMap, fmt::Write};

use itertools::Itertools;
use num_bigint::BigInt;

use crate::ir::{
    Program,
    integer_range::IntegerRange,
    types::{Enumeration, FunctionPointer, MethodPointerType, Type},
};

use super::errors::CodegenError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DefinitionKey {
    Type(Type),
    /// The heap block behind an interface reference to a value of this type.
    ErasedBlock(Type),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Release,
    AddReference,
}

impl Lifecycle {
    fn prefix(self) -> &'static str {
        match self {
            Lifecycle::Release => "release",
            Lifecycle::AddReference => "add_reference",
        }
    }

    fn string_function(self) -> &'static str {
        match self {
            Lifecycle::Release => "string_ref_free",
            Lifecycle::AddReference => "string_ref_add_reference",
        }
    }

    fn delta(self) -> i8 {
        match self {
            Lifecycle::Release => -1,
            Lifecycle::AddReference => 1,
        }
    }
}

/// Defines C types on demand, each after the types it depends on.
#[derive(Debug)]
pub(crate) struct TypeTable<'a> {
    program: &'a Program,
    names: HashMap<DefinitionKey, String>,
    next: usize,
    /// Struct and typedef definitions in dependency order.
    pub definitions: String,
    /// Prototypes of the reference-counting functions of composite types.
    pub prototypes: String,
    /// Bodies of the reference-counting functions.
    pub lifecycle: String,
}

impl<'a> TypeTable<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            names: HashMap::new(),
            next: 0,
            definitions: String::new(),
            prototypes: String::new(),
            lifecycle: String::new(),
        }
    }

    pub fn program(&self) -> &'a Program {
        self.program
    }

    /// The C type used for registers of type `ty`.
    pub fn compile_type(&mut self, ty: &Type) -> Result<String, CodegenError> {
        Ok(match ty {
            Type::Unit | Type::Type | Type::EnumConstructor(_) => "unit".to_string(),
            Type::IntegerRange(range) => integer_type(range)?.to_string(),
            Type::StringRef => "string_ref".to_string(),
            Type::Interface(interface)
            | Type::MethodPointer(MethodPointerType { interface, .. }) => {
                if *interface >= self.program.interfaces.len() {
                    return Err(CodegenError::unreachable(format!(
                        "unknown interface {interface}"
                    )));
                }
                format!("interface_reference_{interface}")
            }
            Type::Enumeration(enumeration) if !enumeration.is_stateful() => {
                "stateless_enum".to_string()
            }
            Type::Tuple(tuple) if tuple.is_empty() => "unit".to_string(),
            Type::Structure(structure) if structure.members.is_empty() => "unit".to_string(),
            Type::Lambda(lambda) => {
                let function = self.program.functions.get(lambda.lambda).ok_or_else(|| {
                    CodegenError::unreachable(format!("unknown lambda {}", lambda.lambda))
                })?;
                self.compile_type(&Type::Tuple(function.signature.captures.clone()))?
            }
            Type::GenericEnum(_) => {
                return Err(CodegenError::not_yet_supported("generic_enum type"));
            }
            Type::Enumeration(_)
            | Type::Tuple(_)
            | Type::Structure(_)
            | Type::FunctionPointer(_) => self.define(ty)?,
        })
    }

    /// The block holding a value of type `ty` behind an interface reference.
    pub fn erased_block(&mut self, ty: &Type) -> Result<String, CodegenError> {
        let key = DefinitionKey::ErasedBlock(ty.clone());
        if let Some(name) = self.names.get(&key) {
            return Ok(name.clone());
        }

        let value = self.compile_type(ty)?;
        let name = self.fresh_name("erased");
        writeln!(self.definitions, "typedef struct {name} {{")?;
        writeln!(self.definitions, "    size_t references;")?;
        writeln!(self.definitions, "    {value} value;")?;
        writeln!(self.definitions, "}} {name};\n")?;
        self.names.insert(key, name.clone());
        Ok(name)
    }

    /// A statement releasing the reference held by `value`, if its type has any.
    pub fn release(&mut self, ty: &Type, value: &str) -> Result<Option<String>, CodegenError> {
        self.lifecycle_call(Lifecycle::Release, ty, value)
    }

    /// A statement adding a reference for `value`, if its type has any.
    pub fn add_reference(
        &mut self,
        ty: &Type,
        value: &str,
    ) -> Result<Option<String>, CodegenError> {
        self.lifecycle_call(Lifecycle::AddReference, ty, value)
    }

    fn lifecycle_call(
        &mut self,
        operation: Lifecycle,
        ty: &Type,
        value: &str,
    ) -> Result<Option<String>, CodegenError> {
        if !ty.needs_reference_counting(self.program) {
            return Ok(None);
        }
        Ok(Some(match ty {
            Type::StringRef => format!("{}({value})", operation.string_function()),
            Type::Interface(_) | Type::MethodPointer(_) => format!(
                "{value}.vtable->add_reference({value}.self, {})",
                operation.delta()
            ),
            _ => format!("{}_{}({value})", operation.prefix(), self.compile_type(ty)?),
        }))
    }

    fn fresh_name(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}_{}", self.next);
        self.next += 1;
        name
    }

    fn define(&mut self, ty: &Type) -> Result<String, CodegenError> {
        let key = DefinitionKey::Type(ty.clone());
        if let Some(name) = self.names.get(&key) {
            return Ok(name.clone());
        }

        let name = match ty {
            Type::Tuple(tuple) => self.define_record("tuple", &tuple.elements)?,
            Type::Structure(structure) => {
                let members: Vec<Type> = structure.members.iter().map(|x| x.what.clone()).collect();
                self.define_record("structure", &members)?
            }
            Type::Enumeration(enumeration) => self.define_enumeration(enumeration)?,
            Type::FunctionPointer(pointer) => self.define_function_pointer(pointer)?,
            other => {
                return Err(CodegenError::unreachable(format!(
                    "{other:?} has no definition"
                )));
            }
        };
        tracing::debug!("defined C type {name}");
        self.names.insert(key, name.clone());
        Ok(name)
    }

    fn define_record(&mut self, prefix: &str, members: &[Type]) -> Result<String, CodegenError> {
        let member_types = members
            .iter()
            .map(|x| self.compile_type(x))
            .collect::<Result<Vec<_>, _>>()?;

        let name = self.fresh_name(prefix);
        writeln!(self.definitions, "typedef struct {name} {{")?;
        for (index, member) in member_types.iter().enumerate() {
            writeln!(self.definitions, "    {member} e_{index};")?;
        }
        writeln!(self.definitions, "}} {name};\n")?;

        if members
            .iter()
            .any(|x| x.needs_reference_counting(self.program))
        {
            for operation in [Lifecycle::Release, Lifecycle::AddReference] {
                self.open_lifecycle(operation, &name)?;
                for (index, member) in members.iter().enumerate() {
                    if let Some(statement) =
                        self.lifecycle_call(operation, member, &format!("value.e_{index}"))?
                    {
                        writeln!(self.lifecycle, "    {statement};")?;
                    }
                }
                writeln!(self.lifecycle, "}}\n")?;
            }
        }
        Ok(name)
    }

    fn define_enumeration(&mut self, enumeration: &Enumeration) -> Result<String, CodegenError> {
        let mut states = Vec::new();
        for (index, element) in enumeration.elements.iter().enumerate() {
            if let Some(state) = &element.state {
                states.push((index, state.clone(), self.compile_type(state)?));
            }
        }

        let name = self.fresh_name("enum");
        writeln!(self.definitions, "typedef struct {name} {{")?;
        writeln!(self.definitions, "    size_t which;")?;
        writeln!(self.definitions, "    union {{")?;
        for (index, _, state) in &states {
            writeln!(self.definitions, "        {state} e_{index};")?;
        }
        writeln!(self.definitions, "    }} state;")?;
        writeln!(self.definitions, "}} {name};\n")?;

        if states
            .iter()
            .any(|(_, state, _)| state.needs_reference_counting(self.program))
        {
            for operation in [Lifecycle::Release, Lifecycle::AddReference] {
                self.open_lifecycle(operation, &name)?;
                writeln!(self.lifecycle, "    switch (value.which) {{")?;
                for (index, state, _) in &states {
                    if let Some(statement) =
                        self.lifecycle_call(operation, state, &format!("value.state.e_{index}"))?
                    {
                        writeln!(self.lifecycle, "    case {index}:")?;
                        writeln!(self.lifecycle, "        {statement};")?;
                        writeln!(self.lifecycle, "        break;")?;
                    }
                }
                writeln!(self.lifecycle, "    }}")?;
                writeln!(self.lifecycle, "}}\n")?;
            }
        }
        Ok(name)
    }

    fn define_function_pointer(&mut self, pointer: &FunctionPointer) -> Result<String, CodegenError> {
        if !pointer.captures.is_empty() || pointer.self_.is_some() {
            return Err(CodegenError::not_yet_supported(
                "function pointer with captures or self",
            ));
        }
        let result = self.compile_type(&pointer.result)?;
        let parameters = pointer
            .parameters
            .elements
            .iter()
            .map(|x| self.compile_type(x))
            .collect::<Result<Vec<_>, _>>()?;

        let name = self.fresh_name("function_pointer");
        writeln!(
            self.definitions,
            "typedef {result} (*{name})({});\n",
            parameter_list(&parameters)
        )?;
        Ok(name)
    }

    /// Writes the prototype and the opening line of a reference-counting function.
    fn open_lifecycle(&mut self, operation: Lifecycle, name: &str) -> Result<(), CodegenError> {
        let function = format!("{}_{name}", operation.prefix());
        writeln!(
            self.prototypes,
            "static void {function}({name} const value);"
        )?;
        writeln!(self.lifecycle, "static void {function}({name} const value) {{")?;
        Ok(())
    }
}

/// A C parameter list, `void` when empty.
pub(crate) fn parameter_list(parameters: &[String]) -> String {
    if parameters.is_empty() {
        "void".to_string()
    } else {
        parameters.iter().join(", ")
    }
}

/// The C integer type able to hold every value of the range.
pub(crate) fn integer_type(range: &IntegerRange) -> Result<&'static str, CodegenError> {
    if IntegerRange::u64().contains(range) {
        Ok("uint64_t")
    } else if IntegerRange::from_bounds(i64::MIN, i64::MAX).contains(range) {
        Ok("int64_t")
    } else {
        Err(CodegenError::not_yet_supported(format!(
            "integer range {}..={} wider than 64 bits",
            range.minimum(),
            range.maximum()
        )))
    }
}

pub(crate) fn integer_literal(value: &BigInt, range: &IntegerRange) -> Result<String, CodegenError> {
    Ok(match integer_type(range)? {
        "uint64_t" => format!("UINT64_C({value})"),
        _ if *value == BigInt::from(i64::MIN) => "INT64_MIN".to_string(),
        _ => format!("INT64_C({value})"),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ir::types::Structure;

    #[test]
    fn integer_types_follow_the_range() {
        assert_eq!(integer_type(&IntegerRange::from_bounds(0, 10)).unwrap(), "uint64_t");
        assert_eq!(integer_type(&IntegerRange::from_bounds(-1, 10)).unwrap(), "int64_t");
        let wide = IntegerRange::new(BigInt::from(-1), BigInt::from(u64::MAX)).unwrap();
        assert!(matches!(
            integer_type(&wide),
            Err(CodegenError::NotYetSupported { .. })
        ));
    }

    #[test]
    fn types_are_defined_once_after_their_members() {
        let program = Program::default();
        let mut table = TypeTable::new(&program);
        let inner = Type::tuple(vec![Type::StringRef, Type::integer(0, 1)]);
        let outer = Type::Structure(Arc::new(Structure::new([("inner", inner.clone())])));

        let outer_name = table.compile_type(&outer).unwrap();
        let inner_name = table.compile_type(&inner).unwrap();
        assert_eq!(table.compile_type(&outer).unwrap(), outer_name);

        let inner_position = table.definitions.find(&format!("}} {inner_name};")).unwrap();
        let outer_position = table.definitions.find(&format!("}} {outer_name};")).unwrap();
        assert!(inner_position < outer_position);
        assert_eq!(table.definitions.matches("typedef struct").count(), 2);
        assert!(table.lifecycle.contains("string_ref_free(value.e_0);"));
        assert!(table.lifecycle.contains(&format!("release_{inner_name}(value.e_0);")));
    }

    #[test]
    fn empty_records_are_unit() {
        let program = Program::default();
        let mut table = TypeTable::new(&program);
        assert_eq!(table.compile_type(&Type::tuple(vec![])).unwrap(), "unit");
        assert!(table.definitions.is_empty());
        assert_eq!(table.release(&Type::Unit, "r_0").unwrap(), None);
    }

    #[test]
    fn generic_enum_is_not_supported() {
        let program = Program::default();
        let mut table = TypeTable::new(&program);
        let result = table.compile_type(&Type::GenericEnum(0));
        assert!(
            matches!(result, Err(CodegenError::NotYetSupported { .. })),
            "{:#?}",
            result
        );
    }
}
