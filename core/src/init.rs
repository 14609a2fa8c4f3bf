//! Random code construction: draws a fresh program of random size, random
//! operands, and a freshly sampled constant pool.

use crate::code::{Code, Operand, Scalar};
use crate::config::{CodeSettings, ConstSettings};
use crate::instructions::InstructionId;
use crate::rand::{AliasTable, RandomEngine};

/// Builds a brand-new random [`Code`] from the instruction and feature
/// weight tables, following exactly the same leaf/internal and
/// feature-vs-constant fractions as mutation's `NewSrc` (512/1024 for
/// "draw fresh" vs "reference an earlier instruction", 768/1024 for
/// "feature" vs "constant" within a fresh leaf).
pub struct CodeInitializer<'a> {
    pub code_settings: &'a CodeSettings,
    pub const_settings: &'a ConstSettings,
    pub instr_probs: &'a AliasTable<InstructionId>,
    pub feat_probs: &'a AliasTable<u32>,
}

impl<'a> CodeInitializer<'a> {
    fn new_src(&self, rng: &mut RandomEngine, instr_idx: u32, const_count: u32, code_start: u32) -> Operand {
        if instr_idx == 0 || rng.test_prob(512) {
            if const_count == 0 || rng.test_prob(768) {
                Operand::source(self.feat_probs.sample(rng))
            } else {
                Operand::constant(rng.bounded_u32(const_count))
            }
        } else {
            Operand::source(rng.bounded_u32(instr_idx) + code_start)
        }
    }

    pub fn init<T: Scalar>(&self, rng: &mut RandomEngine, code: &mut Code<T>) {
        let size = if self.code_settings.min_code_size < self.code_settings.max_code_size {
            rng.uniform_range_u32(
                self.code_settings.min_code_size,
                self.code_settings.max_code_size + 1,
            )
        } else {
            self.code_settings.max_code_size
        };
        code.set_size(size);

        let const_count = code.constants.len() as u32;
        let code_start = code.code_start();
        for i in 0..code.size() {
            let op0 = self.new_src(rng, i, const_count, code_start);
            let op1 = self.new_src(rng, i, const_count, code_start);
            let opcode = self.instr_probs.sample(rng);
            let instr = code.instr_mut(i as usize);
            instr.operands[0] = op0;
            instr.operands[1] = op1;
            instr.opcode = opcode;
        }

        let predef = self.const_settings.uses_predefined();
        for i in 0..code.constants.len() {
            let value = if predef
                && (self.const_settings.predefined_prob >= 1.0
                    || rng.uniform(1.0) < self.const_settings.predefined_prob)
            {
                *rng.random_element(&self.const_settings.predefined_set)
            } else {
                rng.uniform_range(self.const_settings.min, self.const_settings.max)
            };
            code.constants[i] = T::from_f64(value);
        }

        code.recompute_used();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> (CodeSettings, ConstSettings) {
        (
            CodeSettings {
                input_size: 3,
                const_size: 4,
                min_code_size: 2,
                max_code_size: 8,
            },
            ConstSettings {
                min: -1.0,
                max: 1.0,
                predefined_prob: 0.0,
                predefined_set: vec![],
            },
        )
    }

    #[test]
    fn initialized_code_size_within_bounds() {
        let (cs, consts) = settings();
        let instr_probs = AliasTable::new(vec![(InstructionId::Add, 1.0), (InstructionId::Mul, 1.0)]);
        let feat_probs = AliasTable::new(vec![(0u32, 1.0), (1, 1.0), (2, 1.0)]);
        let init = CodeInitializer {
            code_settings: &cs,
            const_settings: &consts,
            instr_probs: &instr_probs,
            feat_probs: &feat_probs,
        };
        let mut rng = RandomEngine::new();
        rng.seed(99);
        let mut code: Code<f64> = Code::new(&cs);
        init.init(&mut rng, &mut code);
        assert!(code.size() >= cs.min_code_size && code.size() <= cs.max_code_size);
    }

    #[test]
    fn constants_stay_within_declared_range() {
        let (cs, consts) = settings();
        let instr_probs = AliasTable::new(vec![(InstructionId::Add, 1.0)]);
        let feat_probs = AliasTable::new(vec![(0u32, 1.0)]);
        let init = CodeInitializer {
            code_settings: &cs,
            const_settings: &consts,
            instr_probs: &instr_probs,
            feat_probs: &feat_probs,
        };
        let mut rng = RandomEngine::new();
        rng.seed(3);
        let mut code: Code<f64> = Code::new(&cs);
        init.init(&mut rng, &mut code);
        for &c in &code.constants {
            assert!(c >= consts.min && c <= consts.max);
        }
    }
}
