use std::{path::PathBuf, time::Instant};

use crate::compile_unit_info::CompileUnitInfo;
use crate::driver::toolchain::create_output_directory;
use crate::ir::Program;
pub use context::Context;
use errors::CodegenError;

mod compiler;
mod context;
pub mod errors;
mod types;

/// Lowers the program to a single C translation unit.
///
/// The program is verified first; a program the verifier rejects is reported
/// as [`CodegenError::Invalid`].
pub fn generate_c(program: &Program, check_leaks: bool) -> Result<String, CodegenError> {
    Context::new(program).with_leak_check(check_leaks).compile()
}

/// Compiles the given program and returns the path of the C source file.
pub fn compile(session: &CompileUnitInfo, program: &Program) -> Result<PathBuf, CodegenError> {
    let compile_codegen_time = Instant::now();
    let source = generate_c(program, session.check_leaks)?;
    let compile_codegen_time = compile_codegen_time.elapsed();

    let target_file = session.output_file.with_extension("c");
    if let Some(parent) = target_file.parent() {
        create_output_directory(parent)?;
    }
    std::fs::write(&target_file, source)?;

    tracing::debug!("Codegen time {:?}", compile_codegen_time);
    tracing::debug!("Target file: {:?}", target_file);
    Ok(target_file)
}
