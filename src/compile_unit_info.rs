use std::path::PathBuf;

/// This struct holds the information needed to compile this compilation unit,
/// like whether to generate debug info, optimization levels and the C compiler to use.
#[derive(Debug, Clone)]
pub struct CompileUnitInfo {
    /// The program file this unit was loaded from.
    pub file_path: PathBuf,
    /// Whether to output debug info.
    pub debug_info: DebugInfo,
    /// The optimization level to use with this compilation unit.
    pub optlevel: OptLevel,
    /// The file where to put the compilation result.
    /// The file name will be used for all the other outputs, the generated C
    /// source gets the `c` extension.
    pub output_file: PathBuf,
    /// Whether the produced executable fails when allocations outlive the program.
    pub check_leaks: bool,
    /// The C compiler executable.
    pub c_compiler: String,
}

impl CompileUnitInfo {
    pub fn new(file_path: PathBuf, output_file: PathBuf) -> Self {
        Self {
            file_path,
            debug_info: DebugInfo::Full,
            optlevel: OptLevel::None,
            output_file,
            check_leaks: false,
            c_compiler: "cc".to_string(),
        }
    }

    pub fn get_platform_executable_ext() -> &'static str {
        if cfg!(target_os = "windows") {
            "exe"
        } else {
            ""
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Hash)]
pub enum OptLevel {
    None,       // -O0
    Less,       // -O1
    Default,    // -O2
    Aggressive, // -O3
}

impl OptLevel {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => OptLevel::None,
            1 => OptLevel::Less,
            2 => OptLevel::Default,
            _ => OptLevel::Aggressive,
        }
    }

    /// The flag passed to the C compiler.
    pub fn flag(self) -> &'static str {
        match self {
            OptLevel::None => "-O0",
            OptLevel::Less => "-O1",
            OptLevel::Default => "-O2",
            OptLevel::Aggressive => "-O3",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Hash)]
pub enum DebugInfo {
    None,
    Full,
}
