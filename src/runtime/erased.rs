use std::{collections::BTreeMap, rc::Rc};

use crate::ir::{FunctionId, ImplementationRef, MethodId, Program};

use super::{Handle, Heap, Managed, Object, Payload, RuntimeError};

/// Method table of one implementation of an interface.
#[derive(Debug, PartialEq, Eq)]
pub struct Vtable {
    pub implementation: ImplementationRef,
    /// One function per method of the interface.
    pub methods: Vec<FunctionId>,
}

/// Builds each table on first use, once per (interface, implementation).
#[derive(Debug, Default)]
pub struct VtableCache {
    tables: BTreeMap<ImplementationRef, Rc<Vtable>>,
}

impl VtableCache {
    pub fn get_or_build(
        &mut self,
        program: &Program,
        implementation: ImplementationRef,
    ) -> Option<Rc<Vtable>> {
        if let Some(table) = self.tables.get(&implementation) {
            return Some(table.clone());
        }

        let methods = program.implementation(implementation)?.methods.clone();
        let table = Rc::new(Vtable {
            implementation,
            methods,
        });
        tracing::debug!(
            "built vtable for implementation {} of interface {}",
            implementation.implementation,
            implementation.interface
        );
        self.tables.insert(implementation, table.clone());
        Some(table)
    }

    /// How many tables were built so far.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// A value of unknown concrete type behind an interface.
///
/// The table and the block always travel together.
#[derive(Debug, Clone)]
pub struct InterfaceReference {
    vtable: Rc<Vtable>,
    block: Handle,
}

impl InterfaceReference {
    /// Moves `value` into a new block with one reference.
    pub fn erase(heap: &mut Heap, vtable: Rc<Vtable>, value: Object) -> Self {
        let block = heap.allocate(Payload::Erased(value));
        Self { vtable, block }
    }

    pub fn vtable(&self) -> &Vtable {
        &self.vtable
    }

    pub fn block(&self) -> Handle {
        self.block
    }

    pub fn method(&self, method: MethodId) -> Option<FunctionId> {
        self.vtable.methods.get(method).copied()
    }

    /// The erased value, borrowed from the block.
    pub fn payload<'h>(&self, heap: &'h Heap) -> Result<&'h Object, RuntimeError> {
        heap.erased(self.block)
    }
}

impl Managed for InterfaceReference {
    fn add_reference(&self, heap: &mut Heap) -> Result<(), RuntimeError> {
        heap.add_reference(self.block)
    }

    fn release(self, heap: &mut Heap) -> Result<(), RuntimeError> {
        match heap.release(self.block)? {
            Some(Payload::Erased(value)) => value.release(heap),
            Some(other) => Err(RuntimeError::UnexpectedPayload {
                expected: "erased value",
                found: other.kind(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{Implementation, Interface, types::Type},
        runtime::StringRef,
    };

    fn program() -> Program {
        Program {
            functions: vec![],
            interfaces: vec![Interface {
                name: "printable".to_string(),
                methods: vec![],
                implementations: vec![
                    Implementation {
                        self_: Type::StringRef,
                        methods: vec![],
                    },
                    Implementation {
                        self_: Type::Unit,
                        methods: vec![],
                    },
                ],
            }],
        }
    }

    #[test]
    fn one_table_per_implementation() {
        let program = program();
        let mut cache = VtableCache::default();
        let first = cache.get_or_build(&program, ImplementationRef::new(0, 0)).unwrap();
        let again = cache.get_or_build(&program, ImplementationRef::new(0, 0)).unwrap();
        assert!(Rc::ptr_eq(&first, &again));
        assert_eq!(cache.len(), 1);
        assert!(cache.get_or_build(&program, ImplementationRef::new(0, 7)).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn releasing_the_last_reference_releases_the_value() {
        let program = program();
        let mut cache = VtableCache::default();
        let mut heap = Heap::with_event_log();

        let string = StringRef::from_bytes(&mut heap, b"payload");
        let vtable = cache.get_or_build(&program, ImplementationRef::new(0, 0)).unwrap();
        let reference = InterfaceReference::erase(&mut heap, vtable, Object::String(string));
        assert_eq!(heap.stats().live(), 2);

        reference.add_reference(&mut heap).unwrap();
        reference.clone().release(&mut heap).unwrap();
        assert_eq!(heap.free_count(string.handle()), 0);

        reference.release(&mut heap).unwrap();
        assert_eq!(heap.free_count(string.handle()), 1);
        assert_eq!(heap.stats().live(), 0);
    }
}
