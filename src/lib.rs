pub mod check;
pub mod codegen;
pub mod compile_unit_info;
pub mod driver;
pub mod interpret;
pub mod ir;
pub mod ownership;
pub mod runtime;
