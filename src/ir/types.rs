use std::sync::Arc;

use educe::Educe;
use serde::{Deserialize, Serialize};

use super::{
    EnumElementId, FunctionId, GenericEnumId, InterfaceId, MethodId, Program,
    integer_range::IntegerRange,
};

/// A IR type, cheaply clonable.
///
/// Equality is structural: two types are equal when they have the same tag and
/// pairwise equal payloads. Member and element names never take part in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Unit,
    IntegerRange(IntegerRange),
    Enumeration(Arc<Enumeration>),
    Structure(Arc<Structure>),
    FunctionPointer(Arc<FunctionPointer>),
    StringRef,
    Tuple(TupleType),
    /// A type used as a value.
    Type,
    EnumConstructor(EnumConstructorType),
    Lambda(LambdaType),
    Interface(InterfaceId),
    MethodPointer(MethodPointerType),
    /// A parametric enumeration that was never instantiated.
    GenericEnum(GenericEnumId),
}

impl Type {
    pub fn tuple(elements: Vec<Type>) -> Self {
        Self::Tuple(TupleType::new(elements))
    }

    pub fn integer(minimum: i64, maximum: i64) -> Self {
        Self::IntegerRange(IntegerRange::from_bounds(minimum, maximum))
    }

    /// Whether values of this type hold references to heap blocks that have
    /// to be released.
    pub fn needs_reference_counting(&self, program: &Program) -> bool {
        match self {
            Type::StringRef | Type::Interface(_) | Type::MethodPointer(_) => true,
            Type::Tuple(tuple) => tuple
                .elements
                .iter()
                .any(|x| x.needs_reference_counting(program)),
            Type::Structure(structure) => structure
                .members
                .iter()
                .any(|x| x.what.needs_reference_counting(program)),
            Type::Enumeration(enumeration) => enumeration
                .elements
                .iter()
                .filter_map(|x| x.state.as_ref())
                .any(|x| x.needs_reference_counting(program)),
            Type::Lambda(lambda) => program
                .functions
                .get(lambda.lambda)
                .is_some_and(|x| x.signature.captures.needs_reference_counting(program)),
            Type::Unit
            | Type::IntegerRange(_)
            | Type::FunctionPointer(_)
            | Type::Type
            | Type::EnumConstructor(_)
            | Type::GenericEnum(_) => false,
        }
    }
}

/// Structural type equality.
pub fn type_equals(left: &Type, right: &Type) -> bool {
    left == right
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct TupleType {
    pub elements: Vec<Type>,
}

impl TupleType {
    pub fn new(elements: Vec<Type>) -> Self {
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn needs_reference_counting(&self, program: &Program) -> bool {
        self.elements
            .iter()
            .any(|x| x.needs_reference_counting(program))
    }
}

#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(PartialEq, Eq, Hash)]
pub struct StructureMember {
    #[educe(PartialEq(ignore), Hash(ignore))]
    pub name: String,
    pub what: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Structure {
    pub members: Vec<StructureMember>,
}

impl Structure {
    pub fn new(members: impl IntoIterator<Item = (&'static str, Type)>) -> Self {
        Self {
            members: members
                .into_iter()
                .map(|(name, what)| StructureMember {
                    name: name.to_string(),
                    what,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(PartialEq, Eq, Hash)]
pub struct EnumerationElement {
    #[educe(PartialEq(ignore), Hash(ignore))]
    pub name: String,
    /// `None` for stateless elements.
    pub state: Option<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Enumeration {
    pub elements: Vec<EnumerationElement>,
}

impl Enumeration {
    pub fn new(elements: impl IntoIterator<Item = (&'static str, Option<Type>)>) -> Self {
        Self {
            elements: elements
                .into_iter()
                .map(|(name, state)| EnumerationElement {
                    name: name.to_string(),
                    state,
                })
                .collect(),
        }
    }

    /// True if at least one element carries a state.
    pub fn is_stateful(&self) -> bool {
        self.elements.iter().any(|x| x.state.is_some())
    }

    pub fn element(&self, which: EnumElementId) -> Option<&EnumerationElement> {
        self.elements.get(which)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionPointer {
    pub result: Type,
    pub parameters: TupleType,
    #[serde(default)]
    pub captures: TupleType,
    /// Present for interface method implementations.
    #[serde(default, rename = "self")]
    pub self_: Option<Type>,
}

impl FunctionPointer {
    pub fn new(result: Type, parameters: Vec<Type>) -> Self {
        Self {
            result,
            parameters: TupleType::new(parameters),
            captures: TupleType::default(),
            self_: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumConstructorType {
    pub enumeration: Arc<Enumeration>,
    pub which: EnumElementId,
}

/// The type of a closure, identified by the function implementing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LambdaType {
    pub lambda: FunctionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodPointerType {
    pub interface: InterfaceId,
    pub method: MethodId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_equality_is_arity_sensitive() {
        let elements = vec![Type::Unit, Type::StringRef, Type::integer(0, 10)];

        let two = Type::tuple(elements[..2].to_vec());
        let three = Type::tuple(elements[..3].to_vec());
        assert!(!type_equals(&two, &three));
        assert!(!type_equals(&three, &two));
        assert!(type_equals(&two, &Type::tuple(elements[..2].to_vec())));
        assert!(type_equals(&three, &three.clone()));
    }

    #[test]
    fn names_do_not_take_part_in_equality() {
        let a = Structure::new([("left", Type::Unit), ("right", Type::StringRef)]);
        let b = Structure::new([("x", Type::Unit), ("y", Type::StringRef)]);
        assert!(type_equals(
            &Type::Structure(Arc::new(a.clone())),
            &Type::Structure(Arc::new(b))
        ));

        let swapped = Structure::new([("left", Type::StringRef), ("right", Type::Unit)]);
        assert!(!type_equals(
            &Type::Structure(Arc::new(a)),
            &Type::Structure(Arc::new(swapped))
        ));
    }

    #[test]
    fn stateless_and_unit_state_differ() {
        let stateless = Enumeration::new([("a", None)]);
        let unit_state = Enumeration::new([("a", Some(Type::Unit))]);
        assert_ne!(stateless, unit_state);
        assert!(!stateless.is_stateful());
        assert!(unit_state.is_stateful());
    }

    #[test]
    fn method_pointers_keep_their_interface_alive() {
        let program = Program::default();
        let method = Type::MethodPointer(MethodPointerType {
            interface: 0,
            method: 0,
        });
        assert!(method.needs_reference_counting(&program));
        assert!(Type::tuple(vec![Type::Unit, method]).needs_reference_counting(&program));
        assert!(!Type::tuple(vec![Type::Unit]).needs_reference_counting(&program));
    }
}
