//! The instruction set: a closed enumeration of primitive arity-1/2 ops and
//! their scalar semantics, plus the named default probability bundles used
//! by the initializer and mutation operators.

use serde::{Deserialize, Serialize};

/// One primitive opcode. Values are dense and start at 0 so they can index
/// directly into [`INSTRUCTION_TABLE`] and the processor's dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum InstructionId {
    Nop = 0,
    Add,
    Sub,
    Mul,
    Div,
    Inv,
    Minv,
    Sq2,
    Pdiv,

    Max,
    Min,
    Abs,
    Floor,
    Ceil,
    Lt,
    Gt,
    Lte,
    Gte,

    Pow,
    Exp,
    Log,
    Sqrt,
    Cbrt,
    Aq,

    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,

    FAnd,
    FOr,
    FXor,
    FImpl,
    FNot,
    FNand,
    FNor,
    FNxor,
    FNimpl,
}

/// Static facts about one opcode: its arity, printable name, and scalar
/// kernel. Kept as a single table rather than a trait-object `Vec` so the
/// processor's hot loop never indirects through a vtable.
pub struct InstructionInfo {
    pub id: InstructionId,
    pub arity: u32,
    pub name: &'static str,
}

macro_rules! instr_table {
    ($(($variant:ident, $arity:expr, $name:expr)),+ $(,)?) => {
        pub const INSTRUCTION_TABLE: &[InstructionInfo] = &[
            $(InstructionInfo { id: InstructionId::$variant, arity: $arity, name: $name }),+
        ];
    };
}

instr_table![
    (Nop, 1, "nop"),
    (Add, 2, "add"),
    (Sub, 2, "sub"),
    (Mul, 2, "mul"),
    (Div, 2, "div"),
    (Inv, 1, "inv"),
    (Minv, 1, "minv"),
    (Sq2, 1, "sq2"),
    (Pdiv, 2, "pdiv"),
    (Max, 2, "max"),
    (Min, 2, "min"),
    (Abs, 1, "abs"),
    (Floor, 1, "floor"),
    (Ceil, 1, "ceil"),
    (Lt, 2, "lt"),
    (Gt, 2, "gt"),
    (Lte, 2, "lte"),
    (Gte, 2, "gte"),
    (Pow, 2, "pow"),
    (Exp, 1, "exp"),
    (Log, 1, "log"),
    (Sqrt, 1, "sqrt"),
    (Cbrt, 1, "cbrt"),
    (Aq, 2, "aq"),
    (Sin, 1, "sin"),
    (Cos, 1, "cos"),
    (Tan, 1, "tan"),
    (Asin, 1, "asin"),
    (Acos, 1, "acos"),
    (Atan, 1, "atan"),
    (Sinh, 1, "sinh"),
    (Cosh, 1, "cosh"),
    (Tanh, 1, "tanh"),
    (FAnd, 2, "f_and"),
    (FOr, 2, "f_or"),
    (FXor, 2, "f_xor"),
    (FImpl, 2, "f_impl"),
    (FNot, 1, "f_not"),
    (FNand, 2, "f_nand"),
    (FNor, 2, "f_nor"),
    (FNxor, 2, "f_nxor"),
    (FNimpl, 2, "f_nimpl"),
];

impl InstructionId {
    pub fn info(self) -> &'static InstructionInfo {
        &INSTRUCTION_TABLE[self as usize]
    }

    pub fn arity(self) -> u32 {
        self.info().arity
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }
}

/// Scalar evaluation of one opcode over one lane. The processor specialises
/// over (vec,vec)/(vec,scalar)/(scalar,vec)/(scalar,scalar) operand shapes
/// but always bottoms out in this single definition of semantics, so there
/// is exactly one place the numerics of an opcode can be wrong.
#[inline(always)]
pub fn eval_scalar(op: InstructionId, a: f64, b: f64) -> f64 {
    use InstructionId::*;
    match op {
        Nop => a,
        Add => a + b,
        Sub => a - b,
        Mul => a * b,
        Div => a / b,
        Inv => -a,
        Minv => 1.0 / a,
        Sq2 => a * a,
        Pdiv => a / (1.0e-8 + b * b).sqrt(),
        Max => {
            if a > b {
                a
            } else {
                b
            }
        }
        Min => {
            if a < b {
                a
            } else {
                b
            }
        }
        Abs => a.abs(),
        Floor => a.floor(),
        Ceil => a.ceil(),
        Lt => (a < b) as u32 as f64,
        Gt => (a > b) as u32 as f64,
        Lte => (a <= b) as u32 as f64,
        Gte => (a >= b) as u32 as f64,
        Pow => a.powf(b),
        Exp => a.exp(),
        Log => a.ln(),
        Sqrt => a.sqrt(),
        Cbrt => a.cbrt(),
        Aq => a / (1.0 + b * b).sqrt(),
        Sin => a.sin(),
        Cos => a.cos(),
        Tan => a.tan(),
        Asin => a.asin(),
        Acos => a.acos(),
        Atan => a.atan(),
        Sinh => a.sinh(),
        Cosh => a.cosh(),
        Tanh => a.tanh(),
        FAnd => a * b,
        FOr => a + b - a * b,
        FXor => a + b - 2.0 * a * b,
        FImpl => 1.0 - a + a * b,
        FNot => 1.0 - a,
        FNand => 1.0 - a * b,
        FNor => 1.0 - a - b + a * b,
        FNxor => 1.0 - a - b + 2.0 * a * b,
        FNimpl => a * (1.0 - b),
    }
}

pub const BASIC_MATH: &[(InstructionId, f64)] = &[
    (InstructionId::Nop, 0.01),
    (InstructionId::Add, 1.0),
    (InstructionId::Sub, 1.0),
    (InstructionId::Mul, 1.0),
    (InstructionId::Div, 0.1),
    (InstructionId::Sq2, 0.05),
];

pub const ADVANCED_MATH: &[(InstructionId, f64)] = &[
    (InstructionId::Nop, 0.01),
    (InstructionId::Add, 1.0),
    (InstructionId::Sub, 1.0),
    (InstructionId::Mul, 1.0),
    (InstructionId::Div, 0.1),
    (InstructionId::Sq2, 0.05),
    (InstructionId::Pow, 0.001),
    (InstructionId::Exp, 0.001),
    (InstructionId::Log, 0.001),
    (InstructionId::Sqrt, 0.1),
    (InstructionId::Sin, 0.005),
    (InstructionId::Cos, 0.005),
    (InstructionId::Tan, 0.001),
    (InstructionId::Asin, 0.001),
    (InstructionId::Acos, 0.001),
    (InstructionId::Atan, 0.001),
    (InstructionId::Sinh, 0.001),
    (InstructionId::Cosh, 0.001),
    (InstructionId::Tanh, 0.001),
];

pub const FUZZY_MATH: &[(InstructionId, f64)] = &[
    (InstructionId::Nop, 0.01),
    (InstructionId::FAnd, 1.0),
    (InstructionId::FOr, 1.0),
    (InstructionId::FXor, 1.0),
    (InstructionId::FNot, 1.0),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_dense_and_indexable() {
        for (i, info) in INSTRUCTION_TABLE.iter().enumerate() {
            assert_eq!(info.id as usize, i);
        }
    }

    #[test]
    fn pdiv_and_aq_avoid_division_by_zero() {
        assert!(eval_scalar(InstructionId::Pdiv, 1.0, 0.0).is_finite());
        assert!(eval_scalar(InstructionId::Aq, 1.0, 0.0).is_finite());
    }

    #[test]
    fn comparisons_return_zero_or_one() {
        assert_eq!(eval_scalar(InstructionId::Lt, 1.0, 2.0), 1.0);
        assert_eq!(eval_scalar(InstructionId::Lt, 2.0, 1.0), 0.0);
    }

    #[test]
    fn fuzzy_or_matches_probabilistic_identity() {
        let a = 0.3;
        let b = 0.6;
        assert!((eval_scalar(InstructionId::FOr, a, b) - (a + b - a * b)).abs() < 1e-12);
    }
}
