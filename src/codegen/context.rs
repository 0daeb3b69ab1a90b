use std::fmt::Write;

use tracing::debug;

use crate::{check::check_program, ir::Program};

use super::{
    compiler::{
        CodegenCtx, compile_function, compile_implementations, compile_interface_references,
        compile_main, compile_signature, compile_vtable_layouts,
    },
    errors::CodegenError,
};

const RUNTIME: [(&str, &str); 3] = [
    ("core.h", include_str!("runtime/core.h")),
    ("string.h", include_str!("runtime/string.h")),
    ("intrinsics.h", include_str!("runtime/intrinsics.h")),
];

/// Lowers a whole program into one C translation unit.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    program: &'a Program,
    check_leaks: bool,
}

impl<'a> Context<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            check_leaks: false,
        }
    }

    /// Makes `main` exit with status 3 when allocations outlive the program.
    pub fn with_leak_check(mut self, check_leaks: bool) -> Self {
        self.check_leaks = check_leaks;
        self
    }

    pub fn compile(&self) -> Result<String, CodegenError> {
        check_program(self.program)?;

        let mut ctx = CodegenCtx::new(self.program);
        let references = compile_interface_references(&ctx)?;
        let vtables = compile_vtable_layouts(&mut ctx)?;

        let mut prototypes = String::new();
        let mut bodies = String::new();
        for id in 0..self.program.functions.len() {
            writeln!(prototypes, "{};", compile_signature(&mut ctx, id)?)?;
            bodies.push_str(&compile_function(&mut ctx, id)?);
        }

        // Runs last so every erased implementation is known.
        let (implementation_prototypes, implementations) = compile_implementations(&mut ctx)?;
        let main = compile_main(&mut ctx, self.check_leaks)?;
        debug!(
            "emitted {} functions and {} vtables",
            self.program.functions.len(),
            ctx.used_implementations.len()
        );

        let mut source = String::new();
        for (name, header) in RUNTIME {
            writeln!(source, "/* runtime: {name} */")?;
            source.push_str(header);
            source.push('\n');
        }
        for section in [
            references.as_str(),
            ctx.types.definitions.as_str(),
            vtables.as_str(),
            ctx.types.prototypes.as_str(),
            implementation_prototypes.as_str(),
            prototypes.as_str(),
            ctx.types.lifecycle.as_str(),
            implementations.as_str(),
            bodies.as_str(),
            main.as_str(),
        ] {
            if !section.is_empty() {
                source.push_str(section);
                source.push('\n');
            }
        }
        Ok(source)
    }
}
