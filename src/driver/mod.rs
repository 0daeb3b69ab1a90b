use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use owo_colors::OwoColorize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::{
    check::check_program,
    codegen,
    compile_unit_info::{CompileUnitInfo, DebugInfo, OptLevel},
    interpret::run_program,
    ir::Program,
};

pub mod config;
pub mod toolchain;

#[derive(Parser, Debug)]
#[command(author, version, about = "Checks, runs and compiles quill IR programs", long_about = None, bin_name = "quill")]
pub struct CompilerArgs {
    #[command(subcommand)]
    command: Commands,

    /// Log what the compiler is doing.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// The config file, defaults to Quill.toml in the current directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify a program
    Check {
        /// The JSON program.
        input: PathBuf,
    },
    /// Print a program as text
    Print {
        /// The JSON program.
        input: PathBuf,
    },
    /// Interpret a program
    Run {
        /// The JSON program.
        input: PathBuf,
    },
    /// Compile a program to an executable through C
    Build {
        /// The JSON program.
        input: PathBuf,

        /// Build for release with all optimizations.
        #[arg(short, long, default_value_t = false)]
        release: bool,

        /// Stop after writing the C source.
        #[arg(long, default_value_t = false)]
        emit_c_only: bool,

        /// The executable to produce.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Error)]
pub enum ProgramLoadError {
    #[error("failed to read program {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid program {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Reads a program from its JSON form.
pub fn load_program(path: &Path) -> Result<Program, ProgramLoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| ProgramLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ProgramLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn main() -> Result<()> {
    let args = CompilerArgs::parse();

    let default_filter = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("Quill.toml"));
    let config = Config::load(&config_path)?;

    match args.command {
        Commands::Check { input } => {
            let program = load_program(&input)?;
            check_program(&program)
                .with_context(|| format!("{} is not a valid program", input.display()))?;
            println!("   {} {}", "Checked".green().bold(), input.display());
        }
        Commands::Print { input } => {
            let program = load_program(&input)?;
            print!("{}", program.display()?);
        }
        Commands::Run { input } => {
            let program = load_program(&input)?;
            let execution = run_program(&program, config.interpreter.into())?;
            std::io::stdout().write_all(&execution.output)?;
            if args.verbose {
                println!(
                    "   {} {} allocations, {} frees, {} vtables",
                    "Finished".green().bold(),
                    execution.stats.allocations,
                    execution.stats.frees,
                    execution.vtables
                );
            }
            if execution.stats.live() > 0 {
                anyhow::bail!("{} allocations still live", execution.stats.live());
            }
        }
        Commands::Build {
            input,
            release,
            emit_c_only,
            output,
        } => {
            build(&config, &input, release, emit_c_only, output)?;
        }
    }

    Ok(())
}

fn build(
    config: &Config,
    input: &Path,
    release: bool,
    emit_c_only: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let start_time = Instant::now();
    let profile = config.profile(if release { "release" } else { "dev" })?;

    let program = load_program(input)?;
    let output_file = match output {
        Some(output) => output,
        None => {
            let file_stem = input
                .file_stem()
                .with_context(|| format!("{} has no file name", input.display()))?;
            std::env::current_dir()?
                .join("build_artifacts")
                .join(file_stem)
        }
    };

    let mut session = CompileUnitInfo::new(input.to_path_buf(), output_file);
    session.optlevel = OptLevel::from_level(profile.opt_level);
    session.debug_info = if profile.debug_info {
        DebugInfo::Full
    } else {
        DebugInfo::None
    };
    session.check_leaks = config.backend.check_leaks;
    session.c_compiler = config.backend.c_compiler.clone();
    tracing::debug!("Compiling with session: {:#?}", session);

    println!(
        "   {} {} ({})",
        "Compiling".green().bold(),
        input.display(),
        if profile.release { "release" } else { "dev" }
    );

    let source_path = codegen::compile(&session, &program)?;
    if emit_c_only {
        println!(
            "   {} {}",
            "Emitted".green().bold(),
            source_path.display()
        );
        return Ok(());
    }

    let executable = toolchain::compile_c(
        &source_path,
        &session.output_file,
        &session,
        &session.c_compiler,
    )?;

    let elapsed = start_time.elapsed();
    tracing::debug!("Done in {:?}", elapsed);
    println!(
        "   {} {} in {elapsed:?}",
        "Finished".green().bold(),
        executable.display()
    );
    Ok(())
}
