use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::instrument;

use crate::compile_unit_info::{CompileUnitInfo, DebugInfo};

/// Creates `path` and every missing parent, outermost first.
pub fn create_output_directory(path: &Path) -> io::Result<()> {
    if path.as_os_str().is_empty() || path.is_dir() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        create_output_directory(parent)?;
    }
    match std::fs::create_dir(path) {
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        result => result,
    }
}

/// The arguments passed to the C compiler.
pub fn compiler_arguments(source: &Path, output: &Path, session: &CompileUnitInfo) -> Vec<String> {
    let mut args = vec![
        "-std=c99".to_string(),
        session.optlevel.flag().to_string(),
    ];
    if session.debug_info == DebugInfo::Full {
        args.push("-g".to_string());
    }
    args.extend([
        source.display().to_string(),
        "-o".to_string(),
        output.display().to_string(),
    ]);
    args
}

/// Compiles a C source file into an executable.
#[instrument(level = "debug", skip(session))]
pub fn compile_c(
    source: &Path,
    output: &Path,
    session: &CompileUnitInfo,
    compiler: &str,
) -> io::Result<PathBuf> {
    let mut output_filename = output.to_path_buf();
    let extension = CompileUnitInfo::get_platform_executable_ext();
    if !extension.is_empty() && output_filename.extension().is_none() {
        output_filename = output_filename.with_extension(extension);
    }
    if let Some(parent) = output_filename.parent() {
        create_output_directory(parent)?;
    }

    let args = compiler_arguments(source, &output_filename, session);
    let output = std::process::Command::new(compiler).args(&args).output()?;
    tracing::debug!("C compiler result ok: {}", output.status.success());

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        tracing::error!("C compiler error:\n{}", stderr);
        return Err(io::Error::other(format!(
            "{compiler} exited with {}: {stderr}",
            output.status
        )));
    }
    Ok(output_filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_unit_info::OptLevel;

    #[test]
    fn creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("c");
        create_output_directory(&nested).unwrap();
        assert!(nested.is_dir());
        create_output_directory(&nested).unwrap();
    }

    #[test]
    fn stops_at_the_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, "").unwrap();
        assert!(create_output_directory(&file.join("below")).is_err());
        assert!(!file.join("below").exists());
    }

    #[test]
    fn arguments_follow_the_session() {
        let mut session = CompileUnitInfo::new("a.json".into(), "out/a".into());
        session.optlevel = OptLevel::Aggressive;
        session.debug_info = DebugInfo::None;
        let args = compiler_arguments(Path::new("a.c"), Path::new("a"), &session);
        assert_eq!(args, ["-std=c99", "-O3", "a.c", "-o", "a"]);

        session.debug_info = DebugInfo::Full;
        let args = compiler_arguments(Path::new("a.c"), Path::new("a"), &session);
        assert!(args.contains(&"-g".to_string()));
    }
}
