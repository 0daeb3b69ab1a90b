//! Reference-counted heap used when running programs.
//!
//! Every heap block carries its reference count next to its payload. A block
//! is created with one reference, gains one for every additional owner and is
//! removed when the last owner releases it. Using a handle after its block
//! was removed is reported instead of silently reading another block.

use typed_generational_arena::{StandardArena, StandardIndex};

use thiserror::Error;

pub mod erased;
pub mod object;
pub mod string;

pub use erased::{InterfaceReference, Vtable, VtableCache};
pub use object::{Managed, Object};
pub use string::StringRef;

pub type Handle = StandardIndex<Block>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("use of a released heap block")]
    Dangling,
    #[error("reference count underflow")]
    Underflow,
    #[error("heap block holds {found}, expected {expected}")]
    UnexpectedPayload {
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug)]
pub struct Block {
    references: usize,
    payload: Payload,
}

#[derive(Debug)]
pub enum Payload {
    Bytes(Vec<u8>),
    /// The concrete value behind an interface reference.
    Erased(Object),
}

impl Payload {
    fn kind(&self) -> &'static str {
        match self {
            Payload::Bytes(_) => "bytes",
            Payload::Erased(_) => "erased value",
        }
    }
}

/// Allocation counters, compared by tests to detect leaks and double frees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    pub allocations: usize,
    pub frees: usize,
}

impl HeapStats {
    pub fn live(&self) -> usize {
        self.allocations - self.frees
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapEvent {
    Allocated(Handle),
    Freed(Handle),
}

#[derive(Debug)]
pub struct Heap {
    blocks: StandardArena<Block>,
    stats: HeapStats,
    events: Option<Vec<HeapEvent>>,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            blocks: StandardArena::new(),
            stats: HeapStats::default(),
            events: None,
        }
    }

    /// A heap recording every allocation and free.
    pub fn with_event_log() -> Self {
        Self {
            events: Some(Vec::new()),
            ..Self::new()
        }
    }

    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    pub fn events(&self) -> &[HeapEvent] {
        self.events.as_deref().unwrap_or_default()
    }

    /// How many times `handle` was freed according to the event log.
    pub fn free_count(&self, handle: Handle) -> usize {
        self.events()
            .iter()
            .filter(|x| **x == HeapEvent::Freed(handle))
            .count()
    }

    pub fn allocate(&mut self, payload: Payload) -> Handle {
        let handle = self.blocks.insert(Block {
            references: 1,
            payload,
        });
        self.stats.allocations += 1;
        if let Some(events) = &mut self.events {
            events.push(HeapEvent::Allocated(handle));
        }
        tracing::trace!("allocated block {}", handle.to_idx());
        handle
    }

    pub fn references(&self, handle: Handle) -> Result<usize, RuntimeError> {
        Ok(self.block(handle)?.references)
    }

    pub fn add_reference(&mut self, handle: Handle) -> Result<(), RuntimeError> {
        let block = self.blocks.get_mut(handle).ok_or(RuntimeError::Dangling)?;
        block.references += 1;
        Ok(())
    }

    /// Drops one reference. Once the last one is gone the block is removed
    /// and its payload handed back so the caller can release what it holds.
    pub fn release(&mut self, handle: Handle) -> Result<Option<Payload>, RuntimeError> {
        let block = self.blocks.get_mut(handle).ok_or(RuntimeError::Dangling)?;
        block.references = block
            .references
            .checked_sub(1)
            .ok_or(RuntimeError::Underflow)?;
        if block.references > 0 {
            return Ok(None);
        }

        let block = self.blocks.remove(handle).ok_or(RuntimeError::Dangling)?;
        self.stats.frees += 1;
        if let Some(events) = &mut self.events {
            events.push(HeapEvent::Freed(handle));
        }
        tracing::trace!("freed block {}", handle.to_idx());
        Ok(Some(block.payload))
    }

    pub fn payload(&self, handle: Handle) -> Result<&Payload, RuntimeError> {
        Ok(&self.block(handle)?.payload)
    }

    fn block(&self, handle: Handle) -> Result<&Block, RuntimeError> {
        self.blocks.get(handle).ok_or(RuntimeError::Dangling)
    }

    pub(crate) fn bytes(&self, handle: Handle) -> Result<&[u8], RuntimeError> {
        match self.payload(handle)? {
            Payload::Bytes(bytes) => Ok(bytes),
            other => Err(RuntimeError::UnexpectedPayload {
                expected: "bytes",
                found: other.kind(),
            }),
        }
    }

    pub(crate) fn erased(&self, handle: Handle) -> Result<&Object, RuntimeError> {
        match self.payload(handle)? {
            Payload::Erased(value) => Ok(value),
            other => Err(RuntimeError::UnexpectedPayload {
                expected: "erased value",
                found: other.kind(),
            }),
        }
    }
}
