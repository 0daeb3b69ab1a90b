use thiserror::Error;

use crate::ir::{
    EnumElementId, FunctionId, ImplementationRef, InterfaceId, MethodId, RegisterId,
    StructMemberId,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("program has no entry point")]
    MissingEntryPoint,
    #[error("entry point must not take parameters, captures or self")]
    EntryPointSignature,
    #[error("function {function} uses register {register} which it does not declare")]
    RegisterOutOfRange {
        function: FunctionId,
        register: RegisterId,
    },
    #[error("function {function} assigns register {register} twice")]
    AssignedTwice {
        function: FunctionId,
        register: RegisterId,
    },
    #[error("function {function} reads register {register} before it is defined")]
    UndefinedRegister {
        function: FunctionId,
        register: RegisterId,
    },
    #[error("function {function} has a break outside of any loop")]
    BreakOutsideLoop { function: FunctionId },
    #[error("function {function} can reach its end without returning")]
    MissingReturn { function: FunctionId },
    #[error("function {function} refers to unknown function {callee}")]
    UnknownFunction {
        function: FunctionId,
        callee: FunctionId,
    },
    #[error("function {function} refers to an unknown implementation {implementation:?}")]
    UnknownImplementation {
        function: FunctionId,
        implementation: ImplementationRef,
    },
    #[error("unknown method {method} of interface {interface}")]
    UnknownMethod {
        interface: InterfaceId,
        method: MethodId,
    },
    #[error("implementation {implementation:?} does not match its interface")]
    ImplementationMismatch { implementation: ImplementationRef },
    #[error("function {function} reads member {member} of register {register} which has no such member")]
    MemberOutOfRange {
        function: FunctionId,
        register: RegisterId,
        member: StructMemberId,
    },
    #[error("function {function} calls register {register} which is not callable")]
    NotCallable {
        function: FunctionId,
        register: RegisterId,
    },
    #[error("function {function} passes {found} values where {expected} are needed")]
    ArgumentCountMismatch {
        function: FunctionId,
        expected: usize,
        found: usize,
    },
    #[error("function {function} writes a value of the wrong type into register {register}")]
    TypeMismatch {
        function: FunctionId,
        register: RegisterId,
    },
    #[error("function {function} puts a literal into register {register} that does not fit its type")]
    LiteralTypeMismatch {
        function: FunctionId,
        register: RegisterId,
    },
    #[error("function {function} destructures stateless element {element}")]
    StatelessElement {
        function: FunctionId,
        element: EnumElementId,
    },
    #[error("function {function} has a match case without value that does not diverge")]
    CaseWithoutValue { function: FunctionId },
    #[error("match in function {function} does not cover every case of register {key}")]
    NonExhaustiveMatch {
        function: FunctionId,
        key: RegisterId,
    },
}
