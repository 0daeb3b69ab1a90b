use super::{Handle, Heap, Managed, Payload, RuntimeError};

/// An owning handle to an immutable byte string.
///
/// Copying the handle does not add a reference; whoever ends up with a
/// second owner has to call [`Managed::add_reference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringRef {
    handle: Handle,
}

impl StringRef {
    /// Copies `bytes` into a new block with one reference.
    pub fn from_bytes(heap: &mut Heap, bytes: &[u8]) -> Self {
        Self {
            handle: heap.allocate(Payload::Bytes(bytes.to_vec())),
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn bytes<'h>(&self, heap: &'h Heap) -> Result<&'h [u8], RuntimeError> {
        heap.bytes(self.handle)
    }

    pub fn len(&self, heap: &Heap) -> Result<usize, RuntimeError> {
        Ok(self.bytes(heap)?.len())
    }

    pub fn is_empty(&self, heap: &Heap) -> Result<bool, RuntimeError> {
        Ok(self.len(heap)? == 0)
    }

    /// A new string holding `left` followed by `right`. Both stay owned by the caller.
    pub fn concat(heap: &mut Heap, left: &StringRef, right: &StringRef) -> Result<Self, RuntimeError> {
        let mut bytes = left.bytes(heap)?.to_vec();
        bytes.extend_from_slice(right.bytes(heap)?);
        Ok(Self {
            handle: heap.allocate(Payload::Bytes(bytes)),
        })
    }

    pub fn equals(heap: &Heap, left: &StringRef, right: &StringRef) -> Result<bool, RuntimeError> {
        Ok(left.bytes(heap)? == right.bytes(heap)?)
    }
}

impl Managed for StringRef {
    fn add_reference(&self, heap: &mut Heap) -> Result<(), RuntimeError> {
        heap.add_reference(self.handle)
    }

    fn release(self, heap: &mut Heap) -> Result<(), RuntimeError> {
        heap.release(self.handle)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_keeps_inputs_alive() {
        let mut heap = Heap::new();
        let a = StringRef::from_bytes(&mut heap, b"ab");
        let b = StringRef::from_bytes(&mut heap, b"c");
        let c = StringRef::concat(&mut heap, &a, &b).unwrap();
        assert_eq!(c.bytes(&heap).unwrap(), b"abc");
        assert_eq!(a.bytes(&heap).unwrap(), b"ab");
        assert_eq!(heap.stats().live(), 3);

        for string in [a, b, c] {
            string.release(&mut heap).unwrap();
        }
        assert_eq!(heap.stats().live(), 0);
    }

    #[test]
    fn equality_compares_content() {
        let mut heap = Heap::new();
        let a = StringRef::from_bytes(&mut heap, b"same");
        let b = StringRef::from_bytes(&mut heap, b"same");
        let c = StringRef::from_bytes(&mut heap, b"other");
        assert!(StringRef::equals(&heap, &a, &b).unwrap());
        assert!(!StringRef::equals(&heap, &a, &c).unwrap());
    }
}
