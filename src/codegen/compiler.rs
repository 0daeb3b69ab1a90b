use std::{
    collections::{BTreeSet, HashMap},
    fmt::Write,
};

use itertools::Itertools;
use tracing::{debug, info};

use crate::{
    ir::{
        Function, FunctionId, ImplementationRef, Program, RegisterId,
        instruction::{
            CallInstruction, Instruction, InstructionSequence, MatchCaseKind, MatchInstruction,
        },
        standard_library::Intrinsic,
        types::{Enumeration, Type},
        value::Value,
    },
    ownership::{FunctionPlan, InstructionPlan, Origin, SequencePlan, Transfer},
};

use super::{
    errors::CodegenError,
    types::{TypeTable, integer_literal, integer_type, parameter_list},
};

/// Global codegen context.
#[derive(Debug)]
pub(crate) struct CodegenCtx<'a> {
    /// The checked program.
    pub program: &'a Program,
    pub types: TypeTable<'a>,
    /// Implementations erased somewhere in the program. Only these get a vtable.
    pub used_implementations: BTreeSet<ImplementationRef>,
}

impl<'a> CodegenCtx<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            types: TypeTable::new(program),
            used_implementations: BTreeSet::new(),
        }
    }

    fn function(&self, id: FunctionId) -> Result<&'a Function, CodegenError> {
        self.program
            .functions
            .get(id)
            .ok_or_else(|| CodegenError::unreachable(format!("unknown function {id}")))
    }

    /// The function wrapping a value behind an interface reference.
    fn erase_function(&mut self, implementation: ImplementationRef) -> Result<String, CodegenError> {
        if self.program.implementation(implementation).is_none() {
            return Err(CodegenError::unreachable(format!(
                "unknown implementation {implementation:?}"
            )));
        }
        self.used_implementations.insert(implementation);
        Ok(format!(
            "erase_{}_{}",
            implementation.interface, implementation.implementation
        ))
    }
}

pub(crate) fn function_name(id: FunctionId) -> String {
    if id == 0 {
        "quill_main".to_string()
    } else {
        format!("lambda_{id}")
    }
}

pub(crate) fn register_name(register: RegisterId) -> String {
    format!("r_{register}")
}

/// Forward declarations of the interface reference types.
pub(crate) fn compile_interface_references(ctx: &CodegenCtx) -> Result<String, CodegenError> {
    let mut output = String::new();
    for (id, interface) in ctx.program.interfaces.iter().enumerate() {
        writeln!(output, "/* interface {} */", interface.name.replace("*/", "* /"))?;
        writeln!(
            output,
            "typedef struct interface_vtable_{id} interface_vtable_{id};\n"
        )?;
        writeln!(output, "typedef struct interface_reference_{id} {{")?;
        writeln!(output, "    interface_vtable_{id} const *vtable;")?;
        writeln!(output, "    void *self;")?;
        writeln!(output, "}} interface_reference_{id};\n")?;
    }
    Ok(output)
}

/// One table layout per interface: the reference counting entry, then one
/// entry per method.
pub(crate) fn compile_vtable_layouts(ctx: &mut CodegenCtx) -> Result<String, CodegenError> {
    let mut output = String::new();
    for (id, interface) in ctx.program.interfaces.iter().enumerate() {
        writeln!(output, "struct interface_vtable_{id} {{")?;
        writeln!(output, "    void (*add_reference)(void *, ptrdiff_t);")?;
        for (index, method) in interface.methods.iter().enumerate() {
            let result = ctx.types.compile_type(&method.result)?;
            let mut parameters = vec!["void *".to_string()];
            for parameter in &method.parameters.elements {
                parameters.push(ctx.types.compile_type(parameter)?);
            }
            writeln!(
                output,
                "    {result} (*method_{index})({});",
                parameters.join(", ")
            )?;
        }
        writeln!(output, "}};\n")?;
    }
    Ok(output)
}

/// Reference counting function, vtable and erase function of every used
/// implementation. Returns the prototypes and the definitions.
pub(crate) fn compile_implementations(
    ctx: &mut CodegenCtx,
) -> Result<(String, String), CodegenError> {
    let mut prototypes = String::new();
    let mut definitions = String::new();

    for reference in ctx.used_implementations.clone() {
        let implementation = ctx.program.implementation(reference).ok_or_else(|| {
            CodegenError::unreachable(format!("unknown implementation {reference:?}"))
        })?;
        let (interface, index) = (reference.interface, reference.implementation);
        debug!("emitting vtable {index} of interface {interface}");

        let block = ctx.types.erased_block(&implementation.self_)?;
        let value = ctx.types.compile_type(&implementation.self_)?;
        let add_reference = format!("add_reference_{interface}_{index}");
        let erase = format!("erase_{interface}_{index}");

        writeln!(
            prototypes,
            "static void {add_reference}(void *const self, ptrdiff_t const delta);"
        )?;
        writeln!(
            prototypes,
            "static interface_reference_{interface} {erase}({value} const value);"
        )?;

        writeln!(
            definitions,
            "static void {add_reference}(void *const self, ptrdiff_t const delta) {{"
        )?;
        writeln!(definitions, "    {block} *const block = self;")?;
        writeln!(definitions, "    block->references += (size_t)delta;")?;
        writeln!(definitions, "    if (block->references == 0) {{")?;
        if let Some(release) = ctx.types.release(&implementation.self_, "block->value")? {
            writeln!(definitions, "        {release};")?;
        }
        writeln!(definitions, "        quill_deallocate(block);")?;
        writeln!(definitions, "    }}")?;
        writeln!(definitions, "}}\n")?;

        let entries = std::iter::once(add_reference.clone())
            .chain(implementation.methods.iter().map(|x| function_name(*x)))
            .map(|x| format!("    {x},"))
            .join("\n");
        writeln!(
            definitions,
            "static interface_vtable_{interface} const interface_impl_{interface}_{index} = {{\n{entries}\n}};\n"
        )?;

        writeln!(
            definitions,
            "static interface_reference_{interface} {erase}({value} const value) {{"
        )?;
        writeln!(
            definitions,
            "    {block} *const block = quill_allocate(sizeof({block}));"
        )?;
        writeln!(definitions, "    block->references = 1;")?;
        writeln!(definitions, "    block->value = value;")?;
        writeln!(
            definitions,
            "    interface_reference_{interface} const result = {{&interface_impl_{interface}_{index}, block}};"
        )?;
        writeln!(definitions, "    return result;")?;
        writeln!(definitions, "}}\n")?;
    }

    Ok((prototypes, definitions))
}

/// Calls the entry point and releases its result.
pub(crate) fn compile_main(ctx: &mut CodegenCtx, check_leaks: bool) -> Result<String, CodegenError> {
    let entry = ctx.function(0)?;
    let result = ctx.types.compile_type(&entry.signature.result)?;

    let mut output = String::new();
    writeln!(output, "int main(void) {{")?;
    writeln!(output, "    {result} const result = {}();", function_name(0))?;
    if let Some(release) = ctx.types.release(&entry.signature.result, "result")? {
        writeln!(output, "    {release};")?;
    }
    writeln!(output, "    (void)result;")?;
    if check_leaks {
        writeln!(output, "    if (quill_live_allocations != 0) {{")?;
        writeln!(
            output,
            "        fprintf(stderr, \"%zu allocations still live\\n\", quill_live_allocations);"
        )?;
        writeln!(output, "        return 3;")?;
        writeln!(output, "    }}")?;
    }
    writeln!(output, "    return 0;")?;
    writeln!(output, "}}")?;
    Ok(output)
}

/// The C prototype of a function, without the trailing semicolon.
pub(crate) fn compile_signature(ctx: &mut CodegenCtx, id: FunctionId) -> Result<String, CodegenError> {
    let function = ctx.function(id)?;
    let signature = &function.signature;
    let result = ctx.types.compile_type(&signature.result)?;

    let mut parameters = Vec::new();
    if !signature.captures.is_empty() {
        let captures = ctx
            .types
            .compile_type(&Type::Tuple(signature.captures.clone()))?;
        parameters.push(format!("{captures} const *const captures"));
    }
    if signature.self_.is_some() {
        parameters.push("void *const self".to_string());
    }
    for (register, ty) in function
        .parameter_registers()
        .zip(&signature.parameters.elements)
    {
        parameters.push(format!(
            "{} {}",
            ctx.types.compile_type(ty)?,
            register_name(register)
        ));
    }

    Ok(format!(
        "static {result} {}({})",
        function_name(id),
        parameter_list(&parameters)
    ))
}

/// Compiles the body of a function.
pub(crate) fn compile_function(ctx: &mut CodegenCtx, id: FunctionId) -> Result<String, CodegenError> {
    let function = ctx.function(id)?;
    info!("compiling function {}", function_name(id));

    let signature = compile_signature(ctx, id)?;
    let plan = FunctionPlan::new(function);
    let mut function_ctx = FunctionCodegenCtx {
        ctx,
        function,
        plan: &plan,
        output: String::new(),
        indentation: 1,
        frames: Vec::new(),
        loops: Vec::new(),
        literals: HashMap::new(),
    };

    writeln!(function_ctx.output, "{signature} {{")?;
    function_ctx.declare_registers()?;

    if let (Some(register), Some(self_)) = (function.self_register(), &function.signature.self_) {
        let block = function_ctx.ctx.types.erased_block(self_)?;
        function_ctx.assign(register, &format!("(({block} *)self)->value"))?;
    }

    let parameters = function
        .parameter_registers()
        .filter(|x| plan.owns(*x))
        .collect();
    function_ctx.compile_sequence(&function.body, &plan.body, false, parameters, None)?;

    if !matches!(function.body.instructions.last(), Some(Instruction::Return(_))) {
        function_ctx.line("quill_unreachable();")?;
    }
    writeln!(function_ctx.output, "}}\n")?;
    Ok(function_ctx.output)
}

/// Owned registers of one sequence that are still alive.
#[derive(Debug)]
struct Frame {
    live: Vec<RegisterId>,
    loop_body: bool,
}

/// Context used when compiling code within a function body.
struct FunctionCodegenCtx<'c, 'a, 'p> {
    ctx: &'c mut CodegenCtx<'a>,
    function: &'a Function,
    plan: &'p FunctionPlan,
    output: String,
    indentation: usize,
    /// Enclosing sequences, innermost last.
    frames: Vec<Frame>,
    /// Result registers of the enclosing loops, innermost last.
    loops: Vec<RegisterId>,
    /// Registers written by literals.
    literals: HashMap<RegisterId, &'a Value>,
}

impl<'a, 'p> FunctionCodegenCtx<'_, 'a, 'p> {
    fn line(&mut self, text: impl AsRef<str>) -> Result<(), CodegenError> {
        writeln!(
            self.output,
            "{:indent$}{}",
            "",
            text.as_ref(),
            indent = self.indentation * 4
        )?;
        Ok(())
    }

    fn assign(&mut self, register: RegisterId, value: &str) -> Result<(), CodegenError> {
        self.line(format!("{} = {value};", register_name(register)))
    }

    fn register_type(&self, register: RegisterId) -> Result<&'a Type, CodegenError> {
        self.function
            .register_type(register)
            .ok_or_else(|| CodegenError::unreachable(format!("unknown register {register}")))
    }

    fn declare_registers(&mut self) -> Result<(), CodegenError> {
        let parameters = self.function.parameter_registers();
        for register in 0..self.function.number_of_registers() {
            if parameters.contains(&register) || self.plan.origin(register) == Origin::Global {
                continue;
            }
            let ty = self.ctx.types.compile_type(self.register_type(register)?)?;
            match self.function.debug_name(register) {
                Some(name) => self.line(format!(
                    "{ty} {}; /* {} */",
                    register_name(register),
                    name.replace("*/", "* /")
                ))?,
                None => self.line(format!("{ty} {};", register_name(register)))?,
            }
        }
        Ok(())
    }

    /// Hands over the reference held by `register`, adding one first if the
    /// register keeps its own.
    fn consume(&mut self, register: RegisterId, transfer: Transfer) -> Result<String, CodegenError> {
        if self.plan.origin(register) == Origin::Global {
            return Err(CodegenError::not_yet_supported(
                "the standard library object as a value",
            ));
        }
        let name = register_name(register);
        match transfer {
            Transfer::Move => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.live.retain(|x| *x != register);
                }
            }
            Transfer::Share => {
                let ty = self.register_type(register)?;
                if let Some(statement) = self.ctx.types.add_reference(ty, &name)? {
                    self.line(format!("{statement};"))?;
                }
            }
        }
        Ok(name)
    }

    fn consume_all(
        &mut self,
        registers: &[RegisterId],
        plan: &InstructionPlan,
        first_operand: usize,
    ) -> Result<Vec<String>, CodegenError> {
        registers
            .iter()
            .enumerate()
            .map(|(index, register)| self.consume(*register, plan.transfer(first_operand + index)))
            .collect()
    }

    /// Releases the live registers of the innermost `count` sequences.
    fn release_frames(&mut self, count: usize) -> Result<(), CodegenError> {
        let start = self.frames.len().saturating_sub(count);
        let registers: Vec<RegisterId> = self.frames[start..]
            .iter()
            .rev()
            .flat_map(|frame| frame.live.iter().rev().copied())
            .collect();
        for register in registers {
            let ty = self.register_type(register)?;
            if let Some(statement) = self.ctx.types.release(ty, &register_name(register))? {
                self.line(format!("{statement};"))?;
            }
        }
        Ok(())
    }

    /// Compiles a sequence. `case` holds the value and result registers when
    /// the sequence is a match case.
    fn compile_sequence(
        &mut self,
        sequence: &'a InstructionSequence,
        plan: &'p SequencePlan,
        loop_body: bool,
        live: Vec<RegisterId>,
        case: Option<(RegisterId, RegisterId)>,
    ) -> Result<(), CodegenError> {
        self.frames.push(Frame { live, loop_body });

        let mut diverged = false;
        for (instruction, instruction_plan) in sequence.instructions.iter().zip(&plan.instructions)
        {
            self.compile_instruction(instruction, instruction_plan)?;
            if instruction.diverges() {
                diverged = true;
                break;
            }
            if let Some(register) = instruction.defined_register() {
                if self.plan.owns(register) {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.live.push(register);
                    }
                }
            }
        }

        if !diverged {
            if let Some((value, result)) = case {
                let value = self.consume(value, plan.case_value.unwrap_or(Transfer::Share))?;
                self.assign(result, &value)?;
            }
            self.release_frames(1)?;
        }
        self.frames.pop();
        Ok(())
    }

    fn compile_instruction(
        &mut self,
        instruction: &'a Instruction,
        plan: &'p InstructionPlan,
    ) -> Result<(), CodegenError> {
        debug!("lowering {}", instruction.name());
        match instruction {
            Instruction::Call(x) => self.compile_call(x, plan),
            Instruction::Return(x) => {
                let value = self.consume(x.returned_value, plan.transfer(0))?;
                self.release_frames(self.frames.len())?;
                self.line(format!("return {value};"))
            }
            Instruction::Loop(x) => {
                let body = plan
                    .nested
                    .first()
                    .ok_or_else(|| CodegenError::unreachable("loop without a planned body"))?;
                self.line("for (;;) {")?;
                self.indentation += 1;
                self.loops.push(x.result);
                self.compile_sequence(&x.body, body, true, Vec::new(), None)?;
                self.loops.pop();
                self.indentation -= 1;
                self.line("}")
            }
            Instruction::Break(x) => {
                let result = *self
                    .loops
                    .last()
                    .ok_or_else(|| CodegenError::unreachable("break outside of a loop"))?;
                let value = self.consume(x.value, plan.transfer(0))?;
                self.assign(result, &value)?;
                let depth = self
                    .frames
                    .iter()
                    .rev()
                    .position(|frame| frame.loop_body)
                    .map_or(self.frames.len(), |x| x + 1);
                self.release_frames(depth)?;
                self.line("break;")
            }
            Instruction::Global(_) => Ok(()),
            Instruction::Literal(x) => {
                let value = self.compile_value(&x.value, self.register_type(x.into)?)?;
                self.literals.insert(x.into, &x.value);
                self.assign(x.into, &value)
            }
            Instruction::Tuple(x) => {
                let elements = self.consume_all(&x.elements, plan, 0)?;
                let value = self.compound(x.result, &elements)?;
                self.assign(x.result, &value)
            }
            Instruction::ReadStruct(x) => match self.plan.origin(x.from_object) {
                Origin::Global => {
                    let intrinsic = Intrinsic::from_member(x.member).ok_or_else(|| {
                        CodegenError::unreachable(format!(
                            "no standard library member {}",
                            x.member
                        ))
                    })?;
                    self.assign(x.into, &format!("&{}_impl", intrinsic.name()))
                }
                _ => self.assign(
                    x.into,
                    &format!("{}.e_{}", register_name(x.from_object), x.member),
                ),
            },
            Instruction::Match(x) => self.compile_match(x, plan),
            Instruction::InstantiateStruct(x) => {
                let arguments = self.consume_all(&x.arguments, plan, 0)?;
                let value = self.compound(x.into, &arguments)?;
                self.assign(x.into, &value)
            }
            Instruction::GetMethod(x) => self.assign(x.into, &register_name(x.from)),
            Instruction::EraseType(x) => {
                let value = self.consume(x.self_, plan.transfer(0))?;
                let erase = self.ctx.erase_function(x.implementation)?;
                self.assign(x.into, &format!("{erase}({value})"))
            }
            Instruction::EnumConstruct(x) => {
                let state = self.consume(x.state, plan.transfer(0))?;
                let value = self.enum_element(&x.which.enumeration, x.which.which, Some(&state))?;
                self.assign(x.into, &value)
            }
            Instruction::GetCaptures(into) => {
                if self.function.signature.captures.is_empty() {
                    self.assign(*into, "unit_impl")
                } else {
                    self.assign(*into, "*captures")
                }
            }
            Instruction::LambdaWithCaptures(x) => {
                let captures = self.consume_all(&x.captures, plan, 0)?;
                let value = self.compound(x.into, &captures)?;
                self.assign(x.into, &value)
            }
        }
    }

    fn compile_call(
        &mut self,
        call: &'a CallInstruction,
        plan: &'p InstructionPlan,
    ) -> Result<(), CodegenError> {
        let callee = register_name(call.callee);
        let value = match self.plan.origin(call.callee) {
            Origin::Intrinsic(intrinsic) => {
                // Intrinsics borrow their arguments.
                let arguments = call.arguments.iter().map(|x| register_name(*x)).join(", ");
                format!("{}_impl({arguments})", intrinsic.name())
            }
            Origin::Global | Origin::Captures => {
                return Err(CodegenError::unreachable(format!(
                    "call of register {} which is not callable",
                    call.callee
                )));
            }
            Origin::Value => {
                let arguments = self.consume_all(&call.arguments, plan, 1)?;
                match self.register_type(call.callee)? {
                    Type::FunctionPointer(_) => format!("{callee}({})", arguments.join(", ")),
                    Type::Lambda(lambda) => {
                        let captured = !self
                            .ctx
                            .function(lambda.lambda)?
                            .signature
                            .captures
                            .is_empty();
                        let arguments = captured
                            .then(|| format!("&{callee}"))
                            .into_iter()
                            .chain(arguments)
                            .join(", ");
                        format!("{}({arguments})", function_name(lambda.lambda))
                    }
                    Type::MethodPointer(method) => {
                        let arguments = std::iter::once(format!("{callee}.self"))
                            .chain(arguments)
                            .join(", ");
                        format!("{callee}.vtable->method_{}({arguments})", method.method)
                    }
                    Type::EnumConstructor(constructor) => {
                        let state = arguments.first().ok_or_else(|| {
                            CodegenError::unreachable("enum constructor called without a state")
                        })?;
                        self.enum_element(&constructor.enumeration, constructor.which, Some(state))?
                    }
                    other => {
                        return Err(CodegenError::unreachable(format!(
                            "call of a register of type {other:?}"
                        )));
                    }
                }
            }
        };
        self.assign(call.result, &value)
    }

    fn compile_match(
        &mut self,
        instruction: &'a MatchInstruction,
        plan: &'p InstructionPlan,
    ) -> Result<(), CodegenError> {
        let key = register_name(instruction.key);
        let key_type = self.register_type(instruction.key)?;

        let mut opened = false;
        let mut exhaustive = false;
        for (index, case) in instruction.cases.iter().enumerate() {
            let condition = match case.kind {
                MatchCaseKind::Value(value) => Some(self.equality(key_type, &key, value)?),
                MatchCaseKind::StatefulEnum { element, .. } => {
                    Some(format!("{key}.which == {element}"))
                }
                MatchCaseKind::Default => None,
            };
            let opening = match (&condition, opened) {
                (Some(condition), false) => format!("if ({condition}) {{"),
                (Some(condition), true) => format!("}} else if ({condition}) {{"),
                (None, false) => "{".to_string(),
                (None, true) => "} else {".to_string(),
            };
            self.line(opening)?;
            opened = true;

            self.indentation += 1;
            if let MatchCaseKind::StatefulEnum { element, where_ } = case.kind {
                self.assign(where_, &format!("{key}.state.e_{element}"))?;
            }
            let case_plan = plan
                .nested
                .get(index)
                .ok_or_else(|| CodegenError::unreachable("match case without a plan"))?;
            self.compile_sequence(
                &case.action,
                case_plan,
                false,
                Vec::new(),
                case.value.map(|value| (value, instruction.result)),
            )?;
            self.indentation -= 1;

            if condition.is_none() {
                exhaustive = true;
                break;
            }
        }

        if !opened {
            return self.line("quill_unreachable();");
        }
        if !exhaustive {
            self.line("} else {")?;
            self.indentation += 1;
            self.line("quill_unreachable();")?;
            self.indentation -= 1;
        }
        self.line("}")
    }

    /// The C condition comparing the key of a match with a case value.
    fn equality(&mut self, key_type: &Type, key: &str, value: RegisterId) -> Result<String, CodegenError> {
        let name = register_name(value);
        Ok(match key_type {
            Type::IntegerRange(range) => format!("{key} == ({}){name}", integer_type(range)?),
            Type::Enumeration(enumeration) if !enumeration.is_stateful() => {
                format!("{key} == {name}")
            }
            Type::Enumeration(_) => match self.literals.get(&value) {
                Some(Value::EnumElement(element)) if element.state.is_none() => {
                    format!("{key}.which == {}", element.which)
                }
                _ => {
                    return Err(CodegenError::not_yet_supported(
                        "matching a stateful enumeration against a computed value",
                    ));
                }
            },
            Type::StringRef => format!("string_ref_equals({key}, {name})"),
            Type::Unit => "1".to_string(),
            other => {
                return Err(CodegenError::not_yet_supported(format!(
                    "matching on a value of type {other:?}"
                )));
            }
        })
    }

    /// A compound literal of the type of `register`, unit when empty.
    fn compound(&mut self, register: RegisterId, members: &[String]) -> Result<String, CodegenError> {
        if members.is_empty() {
            return Ok("unit_impl".to_string());
        }
        let name = self.ctx.types.compile_type(self.register_type(register)?)?;
        Ok(format!("({name}){{{}}}", members.join(", ")))
    }

    fn enum_element(
        &mut self,
        enumeration: &std::sync::Arc<Enumeration>,
        which: usize,
        state: Option<&str>,
    ) -> Result<String, CodegenError> {
        if !enumeration.is_stateful() {
            return Ok(which.to_string());
        }
        let name = self
            .ctx
            .types
            .compile_type(&Type::Enumeration(enumeration.clone()))?;
        Ok(match state {
            Some(state) => format!("({name}){{.which = {which}, .state.e_{which} = {state}}}"),
            None => format!("({name}){{.which = {which}}}"),
        })
    }

    /// The C expression building a constant. The result owns its references.
    fn compile_value(&mut self, value: &Value, ty: &Type) -> Result<String, CodegenError> {
        Ok(match (value, ty) {
            (Value::Unit, Type::Unit)
            | (Value::Type(_), Type::Type)
            | (Value::EnumConstructor(_), Type::EnumConstructor(_)) => "unit_impl".to_string(),
            (Value::Integer(value), Type::IntegerRange(range)) => integer_literal(value, range)?,
            (Value::String(text), Type::StringRef) => {
                format!("string_ref_create({}, {})", c_string_literal(text), text.len())
            }
            (Value::FunctionPointer(pointer), Type::FunctionPointer(_)) => {
                function_name(pointer.code)
            }
            (Value::FunctionPointer(pointer), Type::Lambda(lambda)) => {
                let captures = &self.ctx.function(lambda.lambda)?.signature.captures;
                self.compound_value(ty, &pointer.captures, &captures.elements)?
            }
            (Value::FlatObject(members), Type::Structure(structure)) => {
                let types: Vec<Type> = structure.members.iter().map(|x| x.what.clone()).collect();
                self.compound_value(ty, members, &types)?
            }
            (Value::Tuple(elements), Type::Tuple(tuple)) => {
                self.compound_value(ty, elements, &tuple.elements)?
            }
            (Value::EnumElement(element), Type::Enumeration(enumeration)) => {
                let state = match &element.state {
                    Some(state) => Some(self.compile_value(state, &element.state_type)?),
                    None => None,
                };
                self.enum_element(enumeration, element.which, state.as_deref())?
            }
            (Value::TypeErased(erased), Type::Interface(_)) => {
                let implementation = self
                    .ctx
                    .program
                    .implementation(erased.implementation)
                    .ok_or_else(|| CodegenError::unreachable("unknown implementation"))?;
                let inner = self.compile_value(&erased.self_, &implementation.self_)?;
                format!("{}({inner})", self.ctx.erase_function(erased.implementation)?)
            }
            (Value::Pattern, _) => return Err(CodegenError::not_yet_supported("pattern value")),
            (Value::GenericEnum(_), _) => {
                return Err(CodegenError::not_yet_supported("generic_enum value"));
            }
            (value, ty) => {
                return Err(CodegenError::unreachable(format!(
                    "literal {value:?} does not fit {ty:?}"
                )));
            }
        })
    }

    fn compound_value(
        &mut self,
        ty: &Type,
        values: &[Value],
        types: &[Type],
    ) -> Result<String, CodegenError> {
        if values.is_empty() {
            return Ok("unit_impl".to_string());
        }
        let name = self.ctx.types.compile_type(ty)?;
        let members = values
            .iter()
            .zip(types)
            .map(|(value, ty)| self.compile_value(value, ty))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("({name}){{{}}}", members.join(", ")))
    }
}

/// A C string literal with the same bytes as `text`.
pub(crate) fn c_string_literal(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('"');
    for byte in text.bytes() {
        match byte {
            b'"' | b'\\' | b'?' => {
                literal.push('\\');
                literal.push(char::from(byte));
            }
            0x20..=0x7e => literal.push(char::from(byte)),
            _ => literal.push_str(&format!("\\{byte:03o}")),
        }
    }
    literal.push('"');
    literal
}
