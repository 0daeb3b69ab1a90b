use quill::{
    driver::{ProgramLoadError, load_program},
    ir::Program,
};
use test_case::test_case;

use crate::common::{early_return_program, interface_program, interpret, print_program};

mod common;

#[test_case(print_program(&["from disk"]) ; "print")]
#[test_case(interface_program("erased") ; "interface")]
#[test_case(early_return_program() ; "early_return")]
fn programs_load_from_json(program: Program) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.json");
    std::fs::write(&path, serde_json::to_string_pretty(&program).unwrap()).unwrap();

    let loaded = load_program(&path).unwrap();
    assert_eq!(loaded, program);
    assert_eq!(interpret(&loaded).output, interpret(&program).output);
}

#[test]
fn malformed_json_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{\"functions\": [").unwrap();
    let error = load_program(&path).expect_err("expected error");
    assert!(matches!(error, ProgramLoadError::Parse { .. }), "{:#?}", error);
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let error = load_program(&dir.path().join("nowhere.json")).expect_err("expected error");
    assert!(matches!(error, ProgramLoadError::Read { .. }), "{:#?}", error);
}
