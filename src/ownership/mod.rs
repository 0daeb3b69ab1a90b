//! Static ownership plan of a function body.
//!
//! Every register holding a runtime value either owns a reference or borrows
//! one. Owned registers are released when their sequence is left, by falling
//! off its end or by an early `break` or `return`. Instructions that consume
//! a register either move the reference out of it, when that is the last use
//! of an owning register in the sequence defining it, or share it by adding a
//! reference first. The interpreter and the C backend both follow this plan,
//! so they release the same handles at the same points.

use crate::ir::{
    Function, RegisterId,
    instruction::{Instruction, InstructionSequence, MatchCaseKind},
    standard_library::Intrinsic,
};

/// Where the content of a register comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A runtime value.
    Value,
    /// The standard library object.
    Global,
    Intrinsic(Intrinsic),
    /// The captures of the running closure.
    Captures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owns,
    /// Valid as long as `root` is, or for the whole call if there is no root.
    Borrows { root: Option<RegisterId> },
}

/// How a consumed register hands over its reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// The register gives up its reference and is not released later.
    Move,
    /// A reference is added; the register keeps its own.
    Share,
}

#[derive(Debug, Clone, Default)]
pub struct SequencePlan {
    pub instructions: Vec<InstructionPlan>,
    /// Transfer of the value written to the match result at the end of a case.
    pub case_value: Option<Transfer>,
}

#[derive(Debug, Clone, Default)]
pub struct InstructionPlan {
    /// Aligned with [`Instruction::operands`], `None` for operands only read.
    pub transfers: Vec<Option<Transfer>>,
    /// The loop body, or one plan per match case.
    pub nested: Vec<SequencePlan>,
}

impl InstructionPlan {
    pub fn transfer(&self, operand: usize) -> Transfer {
        self.transfers
            .get(operand)
            .copied()
            .flatten()
            .unwrap_or(Transfer::Share)
    }
}

#[derive(Debug, Clone)]
pub struct FunctionPlan {
    origins: Vec<Origin>,
    ownership: Vec<Ownership>,
    pub body: SequencePlan,
}

impl FunctionPlan {
    pub fn new(function: &Function) -> Self {
        let registers = function.number_of_registers();
        let mut analysis = Analysis {
            origins: vec![Origin::Value; registers],
            ownership: vec![Ownership::Owns; registers],
            defined_in: vec![None; registers],
            last_use: vec![None; registers],
            next_event: 0,
            next_sequence: 0,
        };

        if let Some(self_register) = function.self_register() {
            analysis.define(self_register, 0, Ownership::Borrows { root: None });
        }
        for parameter in function.parameter_registers() {
            analysis.define(parameter, 0, Ownership::Owns);
        }
        analysis.scan_sequence(&function.body, None, None);

        analysis.next_event = 0;
        analysis.next_sequence = 0;
        let body = analysis.plan_sequence(&function.body, None);

        tracing::debug!("planned ownership of {} registers", registers);
        Self {
            origins: analysis.origins,
            ownership: analysis.ownership,
            body,
        }
    }

    pub fn origin(&self, register: RegisterId) -> Origin {
        self.origins.get(register).copied().unwrap_or(Origin::Value)
    }

    pub fn ownership(&self, register: RegisterId) -> Ownership {
        self.ownership
            .get(register)
            .copied()
            .unwrap_or(Ownership::Borrows { root: None })
    }

    /// Whether the register must be released when its sequence is left.
    pub fn owns(&self, register: RegisterId) -> bool {
        self.origin(register) == Origin::Value && self.ownership(register) == Ownership::Owns
    }
}

/// Whether the operand at `position` hands its reference to the instruction.
pub fn consumes(instruction: &Instruction, position: usize, callee: Origin) -> bool {
    match instruction {
        Instruction::Call(_) => position > 0 && !matches!(callee, Origin::Intrinsic(_)),
        Instruction::Return(_)
        | Instruction::Break(_)
        | Instruction::Tuple(_)
        | Instruction::InstantiateStruct(_)
        | Instruction::EnumConstruct(_)
        | Instruction::LambdaWithCaptures(_)
        | Instruction::EraseType(_) => true,
        Instruction::Loop(_)
        | Instruction::Global(_)
        | Instruction::Literal(_)
        | Instruction::ReadStruct(_)
        | Instruction::Match(_)
        | Instruction::GetMethod(_)
        | Instruction::GetCaptures(_) => false,
    }
}

struct Analysis {
    origins: Vec<Origin>,
    ownership: Vec<Ownership>,
    defined_in: Vec<Option<usize>>,
    /// Last use of every register, counting uses of the registers borrowing from it.
    last_use: Vec<Option<usize>>,
    next_event: usize,
    next_sequence: usize,
}

impl Analysis {
    fn origin(&self, register: RegisterId) -> Origin {
        self.origins.get(register).copied().unwrap_or(Origin::Value)
    }

    fn root(&self, register: RegisterId) -> Option<RegisterId> {
        match self.ownership.get(register) {
            Some(Ownership::Owns) => Some(register),
            Some(Ownership::Borrows { root }) => *root,
            None => None,
        }
    }

    fn define(&mut self, register: RegisterId, sequence: usize, ownership: Ownership) {
        if let Some(slot) = self.ownership.get_mut(register) {
            *slot = ownership;
        }
        if let Some(slot) = self.defined_in.get_mut(register) {
            *slot = Some(sequence);
        }
    }

    fn define_with_origin(&mut self, register: RegisterId, sequence: usize, origin: Origin) {
        if let Some(slot) = self.origins.get_mut(register) {
            *slot = origin;
        }
        self.define(register, sequence, Ownership::Borrows { root: None });
    }

    fn use_register(&mut self, register: RegisterId) -> usize {
        let event = self.next_event;
        self.next_event += 1;
        for target in [Some(register), self.root(register)].into_iter().flatten() {
            if let Some(slot) = self.last_use.get_mut(target) {
                *slot = Some(event);
            }
        }
        event
    }

    fn scan_sequence(
        &mut self,
        sequence: &InstructionSequence,
        binder: Option<(RegisterId, RegisterId)>,
        case_value: Option<RegisterId>,
    ) {
        let id = self.next_sequence;
        self.next_sequence += 1;

        if let Some((where_, key)) = binder {
            let root = self.root(key);
            self.define(where_, id, Ownership::Borrows { root });
        }

        for instruction in &sequence.instructions {
            for operand in instruction.operands() {
                self.use_register(operand);
            }

            match instruction {
                Instruction::Loop(x) => self.scan_sequence(&x.body, None, None),
                Instruction::Match(x) => {
                    for case in &x.cases {
                        let binder = match case.kind {
                            MatchCaseKind::StatefulEnum { where_, .. } => Some((where_, x.key)),
                            _ => None,
                        };
                        self.scan_sequence(&case.action, binder, case.value);
                    }
                }
                _ => {}
            }

            self.classify(instruction, id);
        }

        if let Some(value) = case_value {
            self.use_register(value);
        }
    }

    fn classify(&mut self, instruction: &Instruction, sequence: usize) {
        match instruction {
            Instruction::Global(into) => self.define_with_origin(*into, sequence, Origin::Global),
            Instruction::GetCaptures(into) => {
                self.define_with_origin(*into, sequence, Origin::Captures)
            }
            Instruction::ReadStruct(x) => match self.origin(x.from_object) {
                Origin::Global => match Intrinsic::from_member(x.member) {
                    Some(intrinsic) => {
                        self.define_with_origin(x.into, sequence, Origin::Intrinsic(intrinsic))
                    }
                    None => self.define(x.into, sequence, Ownership::Borrows { root: None }),
                },
                Origin::Value => {
                    let root = self.root(x.from_object);
                    self.define(x.into, sequence, Ownership::Borrows { root });
                }
                Origin::Captures | Origin::Intrinsic(_) => {
                    self.define(x.into, sequence, Ownership::Borrows { root: None })
                }
            },
            Instruction::GetMethod(x) => {
                let root = self.root(x.from);
                self.define(x.into, sequence, Ownership::Borrows { root });
            }
            Instruction::Break(_) => {}
            other => {
                if let Some(register) = other.defined_register() {
                    self.define(register, sequence, Ownership::Owns);
                }
            }
        }
    }

    fn decide(&self, register: RegisterId, event: usize, sequence: usize) -> Transfer {
        let owner = self.origin(register) == Origin::Value
            && self.ownership.get(register) == Some(&Ownership::Owns);
        let local = self.defined_in.get(register).copied().flatten() == Some(sequence);
        let last = self.last_use.get(register).copied().flatten() == Some(event);
        if owner && local && last {
            Transfer::Move
        } else {
            Transfer::Share
        }
    }

    fn plan_sequence(
        &mut self,
        sequence: &InstructionSequence,
        case_value: Option<RegisterId>,
    ) -> SequencePlan {
        let id = self.next_sequence;
        self.next_sequence += 1;

        let mut plan = SequencePlan::default();
        for instruction in &sequence.instructions {
            let callee = match instruction {
                Instruction::Call(x) => self.origin(x.callee),
                _ => Origin::Value,
            };
            let mut transfers = Vec::new();
            for (position, operand) in instruction.operands().into_iter().enumerate() {
                let event = self.next_event;
                self.next_event += 1;
                transfers.push(
                    consumes(instruction, position, callee)
                        .then(|| self.decide(operand, event, id)),
                );
            }

            let nested = match instruction {
                Instruction::Loop(x) => vec![self.plan_sequence(&x.body, None)],
                Instruction::Match(x) => x
                    .cases
                    .iter()
                    .map(|case| self.plan_sequence(&case.action, case.value))
                    .collect(),
                _ => Vec::new(),
            };

            plan.instructions.push(InstructionPlan { transfers, nested });
        }

        if let Some(value) = case_value {
            let event = self.next_event;
            self.next_event += 1;
            plan.case_value = Some(self.decide(value, event, id));
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        builder::FunctionBuilder,
        instruction::{
            BreakInstruction, CallInstruction, LiteralInstruction, LoopInstruction,
            ReadStructInstruction, ReturnInstruction, TupleInstruction,
        },
        types::{FunctionPointer, Type},
        value::Value,
    };

    fn literal(into: RegisterId, value: &str) -> Instruction {
        Instruction::Literal(LiteralInstruction {
            into,
            value: Value::string(value),
        })
    }

    #[test]
    fn last_use_in_defining_sequence_moves() {
        let mut builder = FunctionBuilder::new(FunctionPointer::new(Type::StringRef, vec![]));
        let a = builder.add_register(Type::StringRef);
        let unit = builder.add_register(Type::Unit);
        let function = builder.finish(vec![
            literal(a, "a"),
            Instruction::Return(ReturnInstruction {
                returned_value: a,
                unit_goes_into: unit,
            }),
        ]);

        let plan = FunctionPlan::new(&function);
        assert_eq!(plan.body.instructions[1].transfer(0), Transfer::Move);
        assert!(plan.owns(a));
    }

    #[test]
    fn borrowed_field_keeps_root_alive() {
        let pair = Type::tuple(vec![Type::StringRef, Type::StringRef]);
        let mut builder = FunctionBuilder::new(FunctionPointer::new(pair.clone(), vec![]));
        let a = builder.add_register(Type::StringRef);
        let b = builder.add_register(Type::StringRef);
        let tuple = builder.add_register(pair.clone());
        let field = builder.add_register(Type::StringRef);
        let again = builder.add_register(pair);
        let unit = builder.add_register(Type::Unit);
        let function = builder.finish(vec![
            literal(a, "a"),
            literal(b, "b"),
            Instruction::Tuple(TupleInstruction {
                elements: vec![a, b],
                result: tuple,
            }),
            Instruction::ReadStruct(ReadStructInstruction {
                from_object: tuple,
                member: 0,
                into: field,
            }),
            Instruction::Tuple(TupleInstruction {
                elements: vec![field, field],
                result: again,
            }),
            Instruction::Return(ReturnInstruction {
                returned_value: again,
                unit_goes_into: unit,
            }),
        ]);

        let plan = FunctionPlan::new(&function);
        assert_eq!(
            plan.body.instructions[2].transfers,
            vec![Some(Transfer::Move), Some(Transfer::Move)]
        );
        assert_eq!(
            plan.body.instructions[4].transfers,
            vec![Some(Transfer::Share), Some(Transfer::Share)]
        );
        assert_eq!(
            plan.ownership(field),
            Ownership::Borrows { root: Some(tuple) }
        );
        assert!(!plan.owns(field));
    }

    #[test]
    fn outer_register_is_shared_inside_loop() {
        let mut builder = FunctionBuilder::new(FunctionPointer::new(Type::StringRef, vec![]));
        let a = builder.add_register(Type::StringRef);
        let result = builder.add_register(Type::StringRef);
        let unit = builder.add_register(Type::Unit);
        let function = builder.finish(vec![
            literal(a, "a"),
            Instruction::Loop(LoopInstruction {
                result,
                body: vec![Instruction::Break(BreakInstruction { value: a })].into(),
            }),
            Instruction::Return(ReturnInstruction {
                returned_value: result,
                unit_goes_into: unit,
            }),
        ]);

        let plan = FunctionPlan::new(&function);
        let body = &plan.body.instructions[1].nested[0];
        assert_eq!(body.instructions[0].transfer(0), Transfer::Share);
        assert_eq!(plan.body.instructions[2].transfer(0), Transfer::Move);
    }

    #[test]
    fn intrinsic_calls_borrow_arguments() {
        let mut builder = FunctionBuilder::new(FunctionPointer::new(Type::Unit, vec![]));
        let globals = builder.add_register(crate::ir::standard_library::globals_type());
        let print = builder.add_register(Type::Unit);
        let a = builder.add_register(Type::StringRef);
        let printed = builder.add_register(Type::Unit);
        let unit = builder.add_register(Type::Unit);
        let function = builder.finish(vec![
            Instruction::Global(globals),
            Instruction::ReadStruct(ReadStructInstruction {
                from_object: globals,
                member: Intrinsic::Print.member(),
                into: print,
            }),
            literal(a, "a"),
            Instruction::Call(CallInstruction {
                callee: print,
                arguments: vec![a],
                result: printed,
            }),
            Instruction::Return(ReturnInstruction {
                returned_value: printed,
                unit_goes_into: unit,
            }),
        ]);

        let plan = FunctionPlan::new(&function);
        assert_eq!(plan.origin(print), Origin::Intrinsic(Intrinsic::Print));
        assert_eq!(plan.body.instructions[3].transfers, vec![None, None]);
        assert!(plan.owns(a));
    }
}
