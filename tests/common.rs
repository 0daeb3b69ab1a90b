#![allow(dead_code)]

use std::{
    path::PathBuf,
    process::{Output, Stdio},
    sync::Arc,
};

use quill::{
    codegen::generate_c,
    compile_unit_info::{CompileUnitInfo, OptLevel},
    driver::toolchain::compile_c,
    interpret::{Execution, InterpreterConfig, run_program},
    ir::{
        Function, FunctionId, Implementation, ImplementationRef, Interface, MethodDescription,
        Program, RegisterId,
        builder::FunctionBuilder,
        instruction::{
            BreakInstruction, CallInstruction, EnumConstructInstruction, EraseTypeInstruction,
            GetMethodInstruction, Instruction, LambdaWithCapturesInstruction, LiteralInstruction,
            LoopInstruction, MatchCase, MatchCaseKind, MatchInstruction, ReadStructInstruction,
            ReturnInstruction, TupleInstruction,
        },
        standard_library::{Intrinsic, boolean, globals_type},
        types::{
            EnumConstructorType, Enumeration, FunctionPointer, LambdaType, MethodPointerType,
            TupleType, Type,
        },
        value::{FunctionPointerValue, Value},
    },
};
use tempfile::TempDir;

pub fn literal(into: RegisterId, value: Value) -> Instruction {
    Instruction::Literal(LiteralInstruction { into, value })
}

pub fn string(into: RegisterId, text: &str) -> Instruction {
    literal(into, Value::string(text))
}

pub fn call(callee: RegisterId, arguments: Vec<RegisterId>, result: RegisterId) -> Instruction {
    Instruction::Call(CallInstruction {
        callee,
        arguments,
        result,
    })
}

pub fn read(from_object: RegisterId, member: usize, into: RegisterId) -> Instruction {
    Instruction::ReadStruct(ReadStructInstruction {
        from_object,
        member,
        into,
    })
}

pub fn entry() -> FunctionBuilder {
    FunctionBuilder::new(FunctionPointer::new(Type::Unit, vec![]))
}

/// Loads the standard library and reads one intrinsic from it.
pub fn load_intrinsic(
    builder: &mut FunctionBuilder,
    body: &mut Vec<Instruction>,
    intrinsic: Intrinsic,
) -> RegisterId {
    let globals = builder.add_named_register(globals_type(), "std");
    let callee = builder.add_named_register(
        Type::FunctionPointer(Arc::new(intrinsic.signature())),
        intrinsic.name(),
    );
    body.push(Instruction::Global(globals));
    body.push(read(globals, intrinsic.member(), callee));
    callee
}

/// Prints a string register.
pub fn print(builder: &mut FunctionBuilder, body: &mut Vec<Instruction>, value: RegisterId) {
    let print = load_intrinsic(builder, body, Intrinsic::Print);
    let printed = builder.add_register(Type::Unit);
    body.push(call(print, vec![value], printed));
}

/// Returns `value` and builds the function.
pub fn finish_returning(
    mut builder: FunctionBuilder,
    mut body: Vec<Instruction>,
    value: RegisterId,
) -> Function {
    let unit = builder.add_register(Type::Unit);
    body.push(Instruction::Return(ReturnInstruction {
        returned_value: value,
        unit_goes_into: unit,
    }));
    builder.finish(body)
}

/// Returns unit and builds the function.
pub fn finish_unit(mut builder: FunctionBuilder, mut body: Vec<Instruction>) -> Function {
    let unit = builder.add_register(Type::Unit);
    body.push(literal(unit, Value::unit()));
    finish_returning(builder, body, unit)
}

pub fn program(functions: Vec<Function>) -> Program {
    Program {
        functions,
        interfaces: vec![],
    }
}

/// Prints every text in order.
pub fn print_program(texts: &[&str]) -> Program {
    let mut builder = entry();
    let mut body = Vec::new();
    for text in texts {
        let value = builder.add_register(Type::StringRef);
        body.push(string(value, text));
        print(&mut builder, &mut body, value);
    }
    program(vec![finish_unit(builder, body)])
}

/// Prints the concatenation of two strings.
pub fn concat_program(left: &str, right: &str) -> Program {
    let mut builder = entry();
    let mut body = Vec::new();
    let a = builder.add_named_register(Type::StringRef, "left");
    let b = builder.add_named_register(Type::StringRef, "right");
    let c = builder.add_named_register(Type::StringRef, "both");
    body.push(string(a, left));
    body.push(string(b, right));
    let concat = load_intrinsic(&mut builder, &mut body, Intrinsic::Concat);
    body.push(call(concat, vec![a, b], c));
    print(&mut builder, &mut body, c);
    program(vec![finish_unit(builder, body)])
}

/// Prints the decimal form of `value`.
pub fn integer_to_string_program(value: u64) -> Program {
    let mut builder = entry();
    let mut body = Vec::new();
    let number = builder.add_register(Type::integer(0, 1 << 40));
    let text = builder.add_register(Type::StringRef);
    body.push(literal(number, Value::integer(value)));
    let convert = load_intrinsic(&mut builder, &mut body, Intrinsic::IntegerToString);
    body.push(call(convert, vec![number], text));
    print(&mut builder, &mut body, text);
    program(vec![finish_unit(builder, body)])
}

/// A loop that breaks out with one string while another one dies in its body.
pub fn break_program() -> Program {
    let mut builder = entry();
    let temporary = builder.add_named_register(Type::StringRef, "temporary");
    let kept = builder.add_named_register(Type::StringRef, "kept");
    let result = builder.add_named_register(Type::StringRef, "result");
    let mut body = vec![Instruction::Loop(LoopInstruction {
        result,
        body: vec![
            string(temporary, "temporary"),
            string(kept, "kept"),
            Instruction::Break(BreakInstruction { value: kept }),
        ]
        .into(),
    })];
    print(&mut builder, &mut body, result);
    program(vec![finish_unit(builder, body)])
}

/// Returns from a match nested in a loop while strings are alive in every
/// enclosing sequence.
pub fn early_return_program() -> Program {
    let mut builder = FunctionBuilder::new(FunctionPointer::new(Type::StringRef, vec![]));
    let outer = builder.add_named_register(Type::StringRef, "outer");
    let inner = builder.add_named_register(Type::StringRef, "inner");
    let key = builder.add_register(boolean());
    let yes = builder.add_register(boolean());
    let returned = builder.add_named_register(Type::StringRef, "returned");
    let unit = builder.add_register(Type::Unit);
    let matched = builder.add_register(Type::Unit);
    let result = builder.add_register(Type::StringRef);

    let body = vec![
        string(outer, "outer"),
        Instruction::Loop(LoopInstruction {
            result,
            body: vec![
                string(inner, "inner"),
                literal(key, Value::stateless_element(1)),
                literal(yes, Value::stateless_element(1)),
                Instruction::Match(MatchInstruction {
                    key,
                    cases: vec![
                        MatchCase {
                            kind: MatchCaseKind::Value(yes),
                            action: vec![
                                string(returned, "returned"),
                                Instruction::Return(ReturnInstruction {
                                    returned_value: returned,
                                    unit_goes_into: unit,
                                }),
                            ]
                            .into(),
                            value: None,
                        },
                        MatchCase {
                            kind: MatchCaseKind::Default,
                            action: vec![Instruction::Break(BreakInstruction { value: inner })]
                                .into(),
                            value: None,
                        },
                    ],
                    result: matched,
                }),
            ]
            .into(),
        }),
    ];
    program(vec![finish_returning(builder, body, result)])
}

/// A closure returning the string it captured.
pub fn closure_program() -> Program {
    let captures = TupleType::new(vec![Type::StringRef]);

    let mut lambda = FunctionBuilder::new(FunctionPointer {
        result: Type::StringRef,
        parameters: TupleType::default(),
        captures: captures.clone(),
        self_: None,
    });
    let all = lambda.add_register(Type::Tuple(captures));
    let captured = lambda.add_named_register(Type::StringRef, "captured");
    let lambda = finish_returning(
        lambda,
        vec![Instruction::GetCaptures(all), read(all, 0, captured)],
        captured,
    );

    let mut builder = entry();
    let text = builder.add_register(Type::StringRef);
    let closure = builder.add_named_register(Type::Lambda(LambdaType { lambda: 1 }), "closure");
    let result = builder.add_register(Type::StringRef);
    let mut body = vec![
        string(text, "captured"),
        Instruction::LambdaWithCaptures(LambdaWithCapturesInstruction {
            into: closure,
            lambda: 1,
            captures: vec![text],
        }),
        call(closure, vec![], result),
    ];
    print(&mut builder, &mut body, result);
    program(vec![finish_unit(builder, body), lambda])
}

/// Erases a string behind an interface whose only method hands `self` back.
pub fn interface_program(text: &str) -> Program {
    let mut builder = entry();
    let value = builder.add_register(Type::StringRef);
    let erased = builder.add_named_register(Type::Interface(0), "shown");
    let show = builder.add_register(Type::MethodPointer(MethodPointerType {
        interface: 0,
        method: 0,
    }));
    let result = builder.add_register(Type::StringRef);
    let mut body = vec![
        string(value, text),
        Instruction::EraseType(EraseTypeInstruction {
            self_: value,
            into: erased,
            implementation: ImplementationRef::new(0, 0),
        }),
        Instruction::GetMethod(GetMethodInstruction {
            interface: 0,
            from: erased,
            method: 0,
            into: show,
        }),
        call(show, vec![], result),
    ];
    print(&mut builder, &mut body, result);

    Program {
        functions: vec![finish_unit(builder, body), show_string()],
        interfaces: vec![show_interface(Type::StringRef, 1)],
    }
}

/// `Show` with one method `show() -> StringRef`, implemented once.
pub fn show_interface(self_: Type, method: FunctionId) -> Interface {
    Interface {
        name: "Show".to_string(),
        methods: vec![MethodDescription {
            name: "show".to_string(),
            parameters: TupleType::default(),
            result: Type::StringRef,
        }],
        implementations: vec![Implementation {
            self_,
            methods: vec![method],
        }],
    }
}

/// The `show` method of a string: hands `self` back.
fn show_string() -> Function {
    let method = FunctionBuilder::new(FunctionPointer {
        result: Type::StringRef,
        parameters: TupleType::default(),
        captures: TupleType::default(),
        self_: Some(Type::StringRef),
    });
    // `self` is always the first register.
    finish_returning(method, vec![], 0)
}

/// Erases `erased` and calls `show` on it, printing the result.
fn show_erased(builder: &mut FunctionBuilder, body: &mut Vec<Instruction>, erased: RegisterId) {
    let show = builder.add_register(Type::MethodPointer(MethodPointerType {
        interface: 0,
        method: 0,
    }));
    let shown = builder.add_register(Type::StringRef);
    body.push(Instruction::GetMethod(GetMethodInstruction {
        interface: 0,
        from: erased,
        method: 0,
        into: show,
    }));
    body.push(call(show, vec![], shown));
    print(builder, body, shown);
}

/// Concatenates two strings, then erases the left one behind `Show` and
/// prints both the erased string and the concatenation.
pub fn concat_then_erase_program(left: &str, right: &str) -> Program {
    let mut builder = entry();
    let mut body = Vec::new();
    let a = builder.add_named_register(Type::StringRef, "left");
    let b = builder.add_named_register(Type::StringRef, "right");
    let c = builder.add_named_register(Type::StringRef, "both");
    let erased = builder.add_named_register(Type::Interface(0), "erased");
    body.push(string(a, left));
    body.push(string(b, right));
    let concat = load_intrinsic(&mut builder, &mut body, Intrinsic::Concat);
    body.push(call(concat, vec![a, b], c));
    body.push(Instruction::EraseType(EraseTypeInstruction {
        self_: a,
        into: erased,
        implementation: ImplementationRef::new(0, 0),
    }));
    show_erased(&mut builder, &mut body, erased);
    print(&mut builder, &mut body, c);

    Program {
        functions: vec![finish_unit(builder, body), show_string()],
        interfaces: vec![show_interface(Type::StringRef, 1)],
    }
}

/// Erases a closure capturing `text` behind `Show`, whose method calls it.
pub fn erased_closure_program(text: &str) -> Program {
    let closure_type = Type::Lambda(LambdaType { lambda: 2 });

    let mut method = FunctionBuilder::new(FunctionPointer {
        result: Type::StringRef,
        parameters: TupleType::default(),
        captures: TupleType::default(),
        self_: Some(closure_type.clone()),
    });
    let called = method.add_register(Type::StringRef);
    let method = finish_returning(method, vec![call(0, vec![], called)], called);

    let captures = TupleType::new(vec![Type::StringRef]);
    let mut lambda = FunctionBuilder::new(FunctionPointer {
        result: Type::StringRef,
        parameters: TupleType::default(),
        captures: captures.clone(),
        self_: None,
    });
    let all = lambda.add_register(Type::Tuple(captures));
    let captured = lambda.add_register(Type::StringRef);
    let lambda = finish_returning(
        lambda,
        vec![Instruction::GetCaptures(all), read(all, 0, captured)],
        captured,
    );

    let mut builder = entry();
    let value = builder.add_register(Type::StringRef);
    let closure = builder.add_named_register(closure_type.clone(), "closure");
    let erased = builder.add_named_register(Type::Interface(0), "erased");
    let mut body = vec![
        string(value, text),
        Instruction::LambdaWithCaptures(LambdaWithCapturesInstruction {
            into: closure,
            lambda: 2,
            captures: vec![value],
        }),
        Instruction::EraseType(EraseTypeInstruction {
            self_: closure,
            into: erased,
            implementation: ImplementationRef::new(0, 0),
        }),
    ];
    show_erased(&mut builder, &mut body, erased);

    Program {
        functions: vec![finish_unit(builder, body), method, lambda],
        interfaces: vec![show_interface(closure_type, 1)],
    }
}

/// Function 2 erases `text` and returns the `show` method pointer inside a
/// tuple, outliving the interface register it was taken from. The entry
/// point calls it.
pub fn escaping_method_program(text: &str) -> Program {
    let method_type = Type::MethodPointer(MethodPointerType {
        interface: 0,
        method: 0,
    });
    let wrapped = Type::tuple(vec![method_type.clone()]);
    let maker_signature = FunctionPointer::new(wrapped.clone(), vec![]);

    let mut maker = FunctionBuilder::new(maker_signature.clone());
    let value = maker.add_register(Type::StringRef);
    let erased = maker.add_named_register(Type::Interface(0), "erased");
    let show = maker.add_register(method_type.clone());
    let tuple = maker.add_register(wrapped.clone());
    let maker_body = vec![
        string(value, text),
        Instruction::EraseType(EraseTypeInstruction {
            self_: value,
            into: erased,
            implementation: ImplementationRef::new(0, 0),
        }),
        Instruction::GetMethod(GetMethodInstruction {
            interface: 0,
            from: erased,
            method: 0,
            into: show,
        }),
        Instruction::Tuple(TupleInstruction {
            elements: vec![show],
            result: tuple,
        }),
    ];
    let maker = finish_returning(maker, maker_body, tuple);

    let mut builder = entry();
    let make = builder.add_register(Type::FunctionPointer(Arc::new(maker_signature)));
    let made = builder.add_named_register(wrapped, "made");
    let show = builder.add_register(method_type);
    let shown = builder.add_register(Type::StringRef);
    let mut body = vec![
        literal(
            make,
            Value::FunctionPointer(FunctionPointerValue {
                code: 2,
                captures: vec![],
            }),
        ),
        call(make, vec![], made),
        read(made, 0, show),
        call(show, vec![], shown),
    ];
    print(&mut builder, &mut body, shown);

    Program {
        functions: vec![finish_unit(builder, body), show_string(), maker],
        interfaces: vec![show_interface(Type::StringRef, 1)],
    }
}

/// Prints from inside a loop that is only left by returning.
pub fn return_from_loop_program(text: &str) -> Program {
    let mut builder = entry();
    let value = builder.add_register(Type::StringRef);
    let unit = builder.add_register(Type::Unit);
    let returned = builder.add_register(Type::Unit);
    let result = builder.add_register(Type::Unit);
    let mut inner = vec![string(value, text)];
    print(&mut builder, &mut inner, value);
    inner.push(literal(unit, Value::unit()));
    inner.push(Instruction::Return(ReturnInstruction {
        returned_value: unit,
        unit_goes_into: returned,
    }));
    let body = vec![Instruction::Loop(LoopInstruction {
        result,
        body: inner.into(),
    })];
    program(vec![builder.finish(body)])
}

pub fn maybe() -> Arc<Enumeration> {
    Arc::new(Enumeration::new([
        ("nothing", None),
        ("some", Some(Type::StringRef)),
    ]))
}

/// Builds `some(text)` and matches it against both elements.
pub fn stateful_enum_program(text: &str) -> Program {
    let maybe = maybe();
    let mut builder = entry();
    let value = builder.add_register(Type::StringRef);
    let some = builder.add_register(Type::Enumeration(maybe.clone()));
    let nothing = builder.add_register(Type::Enumeration(maybe.clone()));
    let state = builder.add_named_register(Type::StringRef, "state");
    let fallback = builder.add_register(Type::StringRef);
    let result = builder.add_register(Type::StringRef);
    let mut body = vec![
        string(value, text),
        Instruction::EnumConstruct(EnumConstructInstruction {
            into: some,
            which: EnumConstructorType {
                enumeration: maybe,
                which: 1,
            },
            state: value,
        }),
        literal(nothing, Value::stateless_element(0)),
        Instruction::Match(MatchInstruction {
            key: some,
            cases: vec![
                MatchCase {
                    kind: MatchCaseKind::Value(nothing),
                    action: vec![string(fallback, "nothing")].into(),
                    value: Some(fallback),
                },
                MatchCase {
                    kind: MatchCaseKind::StatefulEnum {
                        element: 1,
                        where_: state,
                    },
                    action: vec![].into(),
                    value: Some(state),
                },
            ],
            result,
        }),
    ];
    print(&mut builder, &mut body, result);
    program(vec![finish_unit(builder, body)])
}

/// Calls function 1 which calls itself forever.
pub fn endless_recursion_program() -> Program {
    let signature = FunctionPointer::new(Type::Unit, vec![]);
    let pointer = Type::FunctionPointer(Arc::new(signature.clone()));
    let calls_itself = || {
        let mut builder = FunctionBuilder::new(signature.clone());
        let callee = builder.add_register(pointer.clone());
        let result = builder.add_register(Type::Unit);
        let body = vec![
            literal(
                callee,
                Value::FunctionPointer(FunctionPointerValue {
                    code: 1,
                    captures: vec![],
                }),
            ),
            call(callee, vec![], result),
        ];
        finish_returning(builder, body, result)
    };
    program(vec![calls_itself(), calls_itself()])
}

/// A loop that never breaks.
pub fn endless_loop_program() -> Program {
    let mut builder = entry();
    let unit = builder.add_register(Type::Unit);
    let result = builder.add_register(Type::Unit);
    let body = vec![Instruction::Loop(LoopInstruction {
        result,
        body: vec![literal(unit, Value::unit())].into(),
    })];
    program(vec![finish_returning(builder, body, result)])
}

#[track_caller]
pub fn interpret(program: &Program) -> Execution {
    run_program(program, InterpreterConfig::default()).expect("failed to interpret")
}

#[derive(Debug)]
pub struct CompileResult {
    pub folder: TempDir,
    pub source_file: PathBuf,
    pub binary_file: PathBuf,
}

pub fn compile_program(
    program: &Program,
    name: &str,
    optlevel: OptLevel,
) -> Result<CompileResult, Box<dyn std::error::Error>> {
    let source = generate_c(program, true)?;

    let test_dir = tempfile::tempdir()?;
    let source_file = test_dir.path().join(name).with_extension("c");
    std::fs::write(&source_file, source)?;

    let mut session = CompileUnitInfo::new(
        test_dir.path().join(name).with_extension("json"),
        test_dir.path().join(name),
    );
    session.optlevel = optlevel;
    session.check_leaks = true;
    let binary_file = compile_c(&source_file, &session.output_file, &session, "cc")?;

    Ok(CompileResult {
        folder: test_dir,
        source_file,
        binary_file,
    })
}

pub fn run_binary(result: &CompileResult) -> Result<Output, std::io::Error> {
    std::process::Command::new(&result.binary_file)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?
        .wait_with_output()
}

/// Compiles through C, runs the executable and returns its status and output.
#[track_caller]
pub fn compile_and_run(program: &Program, name: &str, optlevel: OptLevel) -> (i32, String) {
    let result = compile_program(program, name, optlevel).expect("failed to compile");
    let output = run_binary(&result).expect("failed to run");
    (
        output.status.code().unwrap(),
        String::from_utf8_lossy(&output.stdout).to_string(),
    )
}
