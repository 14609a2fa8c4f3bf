//! Neighbour-generating mutation operators: structural code mutation and
//! constant-only mutation, both acting in place on a single [`Code`].

use crate::code::{Code, Operand, Scalar};
use crate::config::ConstSettings;
use crate::instructions::InstructionId;
use crate::rand::{AliasTable, RandomEngine};

/// Quartic-distributed multiplicative perturbation: `delta` is drawn
/// uniformly in `[0, 1)` then raised to the fourth power, so small
/// perturbations are far more likely than large ones, then the constant is
/// scaled by `1 +- delta` and clamped back into `[clip_min, clip_max]`.
pub fn mutate_const_4(rng: &mut RandomEngine, val: f64, clip_min: f64, clip_max: f64, factor: f64) -> f64 {
    const EPSILON: f64 = 0.000001;
    let d = rng.uniform(1.0 - EPSILON);
    let delta = d * d * d * d * factor + EPSILON;
    let mut out = if rng.next_bool() {
        val * (1.0 + delta)
    } else {
        val / (1.0 + delta)
    };
    if out > clip_max {
        out = clip_max;
    } else if out < clip_min {
        out = clip_min;
    }
    out
}

/// Structural mutation: picks one used instruction at random, mutates it,
/// and with probability `512/1024` recurses into either of its non-constant
/// operands (matching the reference engine's `CodeMutation`).
pub struct CodeMutation<'a> {
    pub const_settings: &'a ConstSettings,
    pub instr_probs: &'a AliasTable<InstructionId>,
    pub feat_probs: &'a AliasTable<u32>,
}

impl<'a> CodeMutation<'a> {
    pub fn apply<T: Scalar>(&self, rng: &mut RandomEngine, code: &mut Code<T>) {
        debug_assert!(!code.used_instructions.is_empty());
        let instr_pos = *rng.random_element(&code.used_instructions);

        self.mute_at_pos(rng, code, instr_pos);

        let instr = *code.instr(instr_pos as usize);
        let code_start = code.code_start();
        if !instr.operands[0].is_constant && instr.operands[0].index >= code_start && rng.test_prob(512) {
            self.mute_at_pos(rng, code, instr.operands[0].index - code_start);
        }
        if !instr.operands[1].is_constant && instr.operands[1].index >= code_start && rng.test_prob(512) {
            self.mute_at_pos(rng, code, instr.operands[1].index - code_start);
        }

        code.recompute_used();
    }

    fn new_src<T: Scalar>(&self, rng: &mut RandomEngine, code: &mut Code<T>, instr_pos: u32, operand_slot: usize) {
        let const_count = code.constants.len() as u32;
        let code_start = code.code_start();

        if instr_pos == 0 || rng.test_prob(512) {
            if const_count == 0 || rng.test_prob(768) {
                let draw = self.feat_probs.sample(rng);
                code.instr_mut(instr_pos as usize).operands[operand_slot] = Operand::source(draw);
            } else {
                let ncp = rng.bounded_u32(const_count);
                let old = code.instr(instr_pos as usize).operands[operand_slot];
                if old.is_constant && rng.test_prob(512) {
                    let v = code.constants[old.index as usize];
                    code.constants[ncp as usize] = v;
                }
                let mutated = mutate_const_4(
                    rng,
                    code.constants[ncp as usize].to_f64(),
                    self.const_settings.min,
                    self.const_settings.max,
                    0.1,
                );
                code.constants[ncp as usize] = T::from_f64(mutated);
                code.instr_mut(instr_pos as usize).operands[operand_slot] = Operand::constant(ncp);
            }
        } else {
            let src = rng.bounded_u32(instr_pos) + code_start;
            code.instr_mut(instr_pos as usize).operands[operand_slot] = Operand::source(src);
        }
    }

    fn mute_at_pos<T: Scalar>(&self, rng: &mut RandomEngine, code: &mut Code<T>, instr_pos: u32) {
        if rng.test_prob(128) {
            let instr = code.instr_mut(instr_pos as usize);
            instr.operands.swap(0, 1);
        }

        if rng.test_prob(256) {
            self.new_src(rng, code, instr_pos, 1);
        }

        if rng.test_prob(256) {
            self.new_src(rng, code, instr_pos, 0);
        } else {
            let opcode = self.instr_probs.sample(rng);
            code.instr_mut(instr_pos as usize).opcode = opcode;
        }
    }
}

/// Constant-only mutation: picks one used constant at random and either
/// redraws it from the predefined set or perturbs it with [`mutate_const_4`].
pub struct ConstMutation<'a> {
    pub const_settings: &'a ConstSettings,
}

impl<'a> ConstMutation<'a> {
    pub fn apply<T: Scalar>(&self, rng: &mut RandomEngine, code: &mut Code<T>) {
        if code.used_const.is_empty() {
            return;
        }
        let pos = *rng.random_element(&code.used_const);
        let use_predef = self.const_settings.uses_predefined();

        let value = if use_predef
            && (self.const_settings.predefined_prob >= 1.0
                || rng.uniform(1.0) < self.const_settings.predefined_prob)
        {
            *rng.random_element(&self.const_settings.predefined_set)
        } else {
            mutate_const_4(
                rng,
                code.constants[pos as usize].to_f64(),
                self.const_settings.min,
                self.const_settings.max,
                1.0,
            )
        };
        code.constants[pos as usize] = T::from_f64(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Operand as Op;
    use crate::config::CodeSettings;

    fn base_code() -> Code<f64> {
        let cs = CodeSettings {
            input_size: 2,
            const_size: 2,
            min_code_size: 1,
            max_code_size: 3,
        };
        let mut code: Code<f64> = Code::new(&cs);
        code.set_size(2);
        code.instr_mut(0).opcode = InstructionId::Add;
        code.instr_mut(0).operands[0] = Op::source(0);
        code.instr_mut(0).operands[1] = Op::source(1);
        code.instr_mut(1).opcode = InstructionId::Mul;
        code.instr_mut(1).operands[0] = Op::source(cs.code_start());
        code.instr_mut(1).operands[1] = Op::constant(0);
        code.constants[0] = 2.0;
        code.constants[1] = 3.0;
        code.is_const_expression();
        code
    }

    #[test]
    fn mutate_const_4_stays_within_clip_bounds() {
        let mut rng = RandomEngine::new();
        rng.seed(11);
        for _ in 0..1000 {
            let v = mutate_const_4(&mut rng, 5.0, -1.0, 1.0, 1.0);
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn code_mutation_keeps_used_mask_consistent() {
        let consts = ConstSettings {
            min: -5.0,
            max: 5.0,
            predefined_prob: 0.0,
            predefined_set: vec![],
        };
        let instr_probs = AliasTable::new(vec![(InstructionId::Add, 1.0), (InstructionId::Sub, 1.0)]);
        let feat_probs = AliasTable::new(vec![(0u32, 1.0), (1, 1.0)]);
        let mutation = CodeMutation {
            const_settings: &consts,
            instr_probs: &instr_probs,
            feat_probs: &feat_probs,
        };
        let mut code = base_code();
        let mut rng = RandomEngine::new();
        rng.seed(5);
        for _ in 0..50 {
            mutation.apply(&mut rng, &mut code);
            assert!(!code.used_instructions.is_empty());
        }
    }

    #[test]
    fn const_mutation_is_noop_when_no_constants_used() {
        let cs = CodeSettings {
            input_size: 1,
            const_size: 1,
            min_code_size: 1,
            max_code_size: 1,
        };
        let mut code: Code<f64> = Code::new(&cs);
        code.set_size(1);
        code.instr_mut(0).opcode = InstructionId::Nop;
        code.instr_mut(0).operands[0] = Op::source(0);
        code.is_const_expression();
        let consts = ConstSettings {
            min: -1.0,
            max: 1.0,
            predefined_prob: 0.0,
            predefined_set: vec![],
        };
        let mutation = ConstMutation {
            const_settings: &consts,
        };
        let mut rng = RandomEngine::new();
        rng.seed(1);
        let before = code.constants.clone();
        mutation.apply(&mut rng, &mut code);
        assert_eq!(before, code.constants);
    }
}
