use quill::runtime::{Heap, HeapEvent, Managed, Object, RuntimeError, StringRef};
use test_case::test_case;

#[test_case(b"" ; "empty")]
#[test_case(b"a" ; "one_byte")]
#[test_case(b"hello\0world" ; "embedded_nul")]
fn strings_keep_their_bytes(bytes: &[u8]) {
    let mut heap = Heap::new();
    let string = StringRef::from_bytes(&mut heap, bytes);
    assert_eq!(string.bytes(&heap).unwrap(), bytes);
    assert_eq!(string.len(&heap).unwrap(), bytes.len());
    string.release(&mut heap).unwrap();
    assert_eq!(heap.stats().live(), 0);
}

#[test]
fn shared_tuple_frees_members_once() {
    let mut heap = Heap::with_event_log();
    let left = StringRef::from_bytes(&mut heap, b"left");
    let right = StringRef::from_bytes(&mut heap, b"right");
    let tuple = Object::Tuple(vec![Object::String(left), Object::String(right)]);

    tuple.add_reference(&mut heap).unwrap();
    tuple.clone().release(&mut heap).unwrap();
    assert_eq!(heap.stats().live(), 2);
    tuple.release(&mut heap).unwrap();

    assert_eq!(heap.stats().live(), 0);
    for event in heap.events() {
        if let HeapEvent::Allocated(handle) = event {
            assert_eq!(heap.free_count(*handle), 1, "{:#?}", heap.events());
        }
    }
}

#[test]
fn use_after_free_is_reported() {
    let mut heap = Heap::new();
    let string = StringRef::from_bytes(&mut heap, b"gone");
    string.release(&mut heap).unwrap();
    assert_eq!(string.bytes(&heap).unwrap_err(), RuntimeError::Dangling);
    assert_eq!(string.release(&mut heap).unwrap_err(), RuntimeError::Dangling);
}
