//! The linear program representation: instructions, constant pool, and the
//! used-subgraph analysis that backs both the formatter and the evaluator's
//! dead-instruction filter.

use crate::config::CodeSettings;
use crate::instructions::InstructionId;

/// Either element type a [`Code`] can be evaluated over.
pub trait Scalar: Copy + Send + Sync + PartialOrd + 'static {
    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
}

impl Scalar for f32 {
    #[inline(always)]
    fn to_f64(self) -> f64 {
        self as f64
    }
    #[inline(always)]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl Scalar for f64 {
    #[inline(always)]
    fn to_f64(self) -> f64 {
        self
    }
    #[inline(always)]
    fn from_f64(v: f64) -> Self {
        v
    }
}

/// One operand of an instruction: either a constant-pool slot or a source
/// index, which is a raw input column when `< input_size` and an earlier
/// instruction's output otherwise (biased by `input_size`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Operand {
    pub index: u32,
    pub is_constant: bool,
}

impl Operand {
    pub fn constant(index: u32) -> Self {
        Operand {
            index,
            is_constant: true,
        }
    }

    pub fn source(index: u32) -> Self {
        Operand {
            index,
            is_constant: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Instruction {
    pub opcode: InstructionId,
    pub operands: [Operand; 2],
    pub used: bool,
}

impl Default for InstructionId {
    fn default() -> Self {
        InstructionId::Nop
    }
}

impl Instruction {
    pub fn arity(&self) -> u32 {
        self.opcode.arity()
    }
}

/// A straight-line program of up to `max_code_size` instructions over
/// element type `T`. Only the first `code_size` entries of `instructions`
/// are live; the last live instruction is the program's output.
#[derive(Debug, Clone)]
pub struct Code<T: Scalar> {
    pub input_size: u32,
    pub code_size: u32,
    pub constants: Vec<T>,
    pub instructions: Vec<Instruction>,

    pub used_instructions: Vec<u32>,
    pub used_const: Vec<u32>,
    pub tree_complexity: usize,
}

impl<T: Scalar> Code<T> {
    pub fn new(cs: &CodeSettings) -> Self {
        Code {
            input_size: cs.input_size,
            code_size: 0,
            constants: vec![T::from_f64(0.0); cs.const_size as usize],
            instructions: vec![Instruction::default(); cs.max_code_size as usize],
            used_instructions: Vec::with_capacity(cs.max_code_size as usize),
            used_const: Vec::with_capacity(cs.const_size as usize),
            tree_complexity: 0,
        }
    }

    pub fn max_size(&self) -> u32 {
        self.instructions.len() as u32
    }

    pub fn size(&self) -> u32 {
        self.code_size
    }

    pub fn set_size(&mut self, size: u32) {
        debug_assert!(size <= self.max_size());
        self.code_size = size;
    }

    pub fn code_start(&self) -> u32 {
        self.input_size
    }

    #[inline]
    pub fn instr(&self, idx: usize) -> &Instruction {
        &self.instructions[idx]
    }

    #[inline]
    pub fn instr_mut(&mut self, idx: usize) -> &mut Instruction {
        &mut self.instructions[idx]
    }

    /// Walk the used-subgraph from the output instruction, marking every
    /// reachable live instruction, collecting referenced constant-pool
    /// indices, and recomputing `tree_complexity`. Returns `true` iff the
    /// program is a constant expression (no raw input column is reachable).
    ///
    /// `tree_complexity` counts one per traversal *step*, so a node shared
    /// by two parents along the DAG counts twice — this matches the
    /// reference engine's definition exactly (duplicate-counting is
    /// intentional, not an oversight).
    pub fn recompute_used(&mut self) -> bool {
        for instr in self.instructions.iter_mut() {
            instr.used = false;
        }
        self.used_instructions.clear();
        self.used_const.clear();
        self.tree_complexity = 0;

        let code_start = self.code_start();
        let mut is_const_expr = true;
        let mut worklist: Vec<u32> = Vec::with_capacity(self.code_size as usize * 2);

        let out_idx = self.code_size - 1;
        self.instructions[out_idx as usize].used = true;
        self.used_instructions.push(out_idx);
        self.tree_complexity += 1;

        let mut visit_operands = |instr_idx: u32,
                                   instructions: &mut [Instruction],
                                   used_const: &mut Vec<u32>,
                                   worklist: &mut Vec<u32>,
                                   is_const_expr: &mut bool| {
            let instr = instructions[instr_idx as usize];
            let arity = instr.arity();
            for (i, operand) in instr.operands.iter().enumerate() {
                if i as u32 >= arity {
                    break;
                }
                if operand.is_constant {
                    if !used_const.contains(&operand.index) {
                        used_const.push(operand.index);
                    }
                } else if operand.index >= code_start {
                    worklist.push(operand.index);
                } else {
                    // A raw input column, not another instruction's output:
                    // the expression is no longer constant-only.
                    *is_const_expr = false;
                }
            }
        };

        visit_operands(
            out_idx,
            &mut self.instructions,
            &mut self.used_const,
            &mut worklist,
            &mut is_const_expr,
        );

        while let Some(src) = worklist.pop() {
            let local = src - code_start;
            self.tree_complexity += 1;
            if !self.instructions[local as usize].used {
                self.instructions[local as usize].used = true;
                self.used_instructions.push(local);
            }
            visit_operands(
                local,
                &mut self.instructions,
                &mut self.used_const,
                &mut worklist,
                &mut is_const_expr,
            );
        }

        is_const_expr
    }

    /// Convenience wrapper: recompute the used-mask and report whether the
    /// program reduces to a constant expression, without needing the caller
    /// to separately track the used-mask outputs.
    pub fn is_const_expression(&mut self) -> bool {
        self.recompute_used()
    }
}
