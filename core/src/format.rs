//! Renders a [`Code`] as human-readable infix and as an element-wise numpy
//! expression, both driven off the used-instruction mask so dead code never
//! appears in the output.

use crate::code::Code;
use crate::code::Scalar;
use crate::instructions::InstructionId;

/// Maps a raw constant-pool index to its dense position within
/// `code.used_const` (traversal order), so formatters can render `c<k>`
/// symbols that line up 1:1 with `MathModel::used_constants`.
fn dense_const_index<T: Scalar>(code: &Code<T>, raw_index: u32) -> usize {
    code.used_const
        .iter()
        .position(|&c| c == raw_index)
        .expect("formatter only visits operands already recorded in used_const")
}

/// Infix punctuation for binary operators; unary prefix punctuation for
/// unary operators. Anything not listed here falls back to `name(args)`.
fn infix_punct(id: InstructionId) -> Option<&'static str> {
    use InstructionId::*;
    match id {
        Add => Some("+"),
        Sub => Some("-"),
        Mul => Some("*"),
        Div => Some("/"),
        Lt => Some("<"),
        Gt => Some(">"),
        Lte => Some("<="),
        Gte => Some(">="),
        FAnd => Some("&"),
        FOr => Some("|"),
        FXor => Some("^"),
        _ => None,
    }
}

fn unary_prefix(id: InstructionId) -> Option<&'static str> {
    use InstructionId::*;
    match id {
        Inv => Some("-"),
        Minv => Some("1.0/"),
        FNot => Some("~"),
        _ => None,
    }
}

/// Renders `code`'s output instruction as an infix mathematical expression,
/// e.g. `((x1+x2)*(3.5))`.
pub fn format_infix<T: Scalar>(code: &Code<T>) -> String {
    let code_start = code.code_start() as usize;
    let mut rendered: Vec<String> = vec![String::new(); code.size() as usize];

    let parse = |idx: u32, is_const: bool, rendered: &[String], code: &Code<T>| -> String {
        if is_const {
            format!("c{}", dense_const_index(code, idx))
        } else if (idx as usize) < code_start {
            format!("x{idx}")
        } else {
            rendered[idx as usize - code_start].clone()
        }
    };

    for i in 0..code.size() as usize {
        let instr = *code.instr(i);
        if !instr.used {
            continue;
        }
        let arity = instr.arity();
        let name = instr.opcode.name();

        if let Some(op) = infix_punct(instr.opcode) {
            let a = parse(instr.operands[0].index, instr.operands[0].is_constant, &rendered, code);
            let b = parse(instr.operands[1].index, instr.operands[1].is_constant, &rendered, code);
            rendered[i] = format!("({a}{op}{b})");
        } else if let Some(prefix) = unary_prefix(instr.opcode) {
            let a = parse(instr.operands[0].index, instr.operands[0].is_constant, &rendered, code);
            rendered[i] = format!("({prefix}{a})");
        } else if instr.opcode == InstructionId::Sq2 {
            let a = parse(instr.operands[0].index, instr.operands[0].is_constant, &rendered, code);
            rendered[i] = format!("({a}**2)");
        } else if instr.opcode == InstructionId::Nop {
            rendered[i] = parse(instr.operands[0].index, instr.operands[0].is_constant, &rendered, code);
        } else if arity == 1 {
            let a = parse(instr.operands[0].index, instr.operands[0].is_constant, &rendered, code);
            rendered[i] = format!("{name}({a})");
        } else {
            let a = parse(instr.operands[0].index, instr.operands[0].is_constant, &rendered, code);
            let b = parse(instr.operands[1].index, instr.operands[1].is_constant, &rendered, code);
            rendered[i] = format!("{name}({a},{b})");
        }
    }

    rendered[code.size() as usize - 1].clone()
}

/// Lowers `code` into an element-wise numpy expression (e.g. the division
/// ops become explicit `np.sqrt`-guarded forms, comparisons become boolean
/// casts), so a Python caller can `eval` the generated function body without
/// any dependency on this crate.
pub fn format_numpy<T: Scalar>(code: &Code<T>) -> String {
    let code_start = code.code_start() as usize;
    let mut rendered: Vec<String> = vec![String::new(); code.size() as usize];

    let parse = |idx: u32, is_const: bool, rendered: &[String], code: &Code<T>| -> String {
        if is_const {
            format!("c[{}]", dense_const_index(code, idx))
        } else if (idx as usize) < code_start {
            format!("x[:, {idx}]")
        } else {
            rendered[idx as usize - code_start].clone()
        }
    };

    for i in 0..code.size() as usize {
        let instr = *code.instr(i);
        if !instr.used {
            continue;
        }
        let a = parse(instr.operands[0].index, instr.operands[0].is_constant, &rendered, code);
        // Operand 1 is only meaningful for arity-2 instructions: the used-mask
        // walk never visits it for a unary instruction, so a stray constant
        // operand there is not guaranteed to be in `used_const` and must not
        // be parsed (dense_const_index would panic on an unrecorded index).
        let b = if instr.arity() > 1 {
            parse(instr.operands[1].index, instr.operands[1].is_constant, &rendered, code)
        } else {
            String::new()
        };

        use InstructionId::*;
        rendered[i] = match instr.opcode {
            Nop => a,
            Add => format!("({a}+{b})"),
            Sub => format!("({a}-{b})"),
            Mul => format!("({a}*{b})"),
            Div => format!("({a}/{b})"),
            Inv => format!("(-{a})"),
            Minv => format!("(1.0/{a})"),
            Sq2 => format!("({a}**2)"),
            Pdiv => format!("({a}/np.sqrt(1e-8+{b}**2))"),
            Max => format!("np.maximum({a},{b})"),
            Min => format!("np.minimum({a},{b})"),
            Abs => format!("np.abs({a})"),
            Floor => format!("np.floor({a})"),
            Ceil => format!("np.ceil({a})"),
            Lt => format!("({a}<{b}).astype(float)"),
            Gt => format!("({a}>{b}).astype(float)"),
            Lte => format!("({a}<={b}).astype(float)"),
            Gte => format!("({a}>={b}).astype(float)"),
            Pow => format!("np.power({a},{b})"),
            Exp => format!("np.exp({a})"),
            Log => format!("np.log({a})"),
            Sqrt => format!("np.sqrt({a})"),
            Cbrt => format!("np.cbrt({a})"),
            Aq => format!("({a}/np.sqrt(1+{b}**2))"),
            Sin => format!("np.sin({a})"),
            Cos => format!("np.cos({a})"),
            Tan => format!("np.tan({a})"),
            Asin => format!("np.arcsin({a})"),
            Acos => format!("np.arccos({a})"),
            Atan => format!("np.arctan({a})"),
            Sinh => format!("np.sinh({a})"),
            Cosh => format!("np.cosh({a})"),
            Tanh => format!("np.tanh({a})"),
            FAnd => format!("({a}*{b})"),
            FOr => format!("({a}+{b}-{a}*{b})"),
            FXor => format!("({a}+{b}-2*{a}*{b})"),
            FImpl => format!("(1-{a}+{a}*{b})"),
            FNot => format!("(1-{a})"),
            FNand => format!("(1-{a}*{b})"),
            FNor => format!("(1-{a}-{b}+{a}*{b})"),
            FNxor => format!("(1-{a}-{b}+2*{a}*{b})"),
            FNimpl => format!("({a}*(1-{b}))"),
        };
    }

    format!(
        "def predict(x, c):\n    return {}\n",
        rendered[code.size() as usize - 1]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Operand;
    use crate::config::CodeSettings;

    fn settings() -> CodeSettings {
        CodeSettings {
            input_size: 2,
            const_size: 1,
            min_code_size: 1,
            max_code_size: 2,
        }
    }

    #[test]
    fn add_renders_as_infix_sum() {
        let cs = settings();
        let mut code: Code<f64> = Code::new(&cs);
        code.set_size(1);
        code.instr_mut(0).opcode = InstructionId::Add;
        code.instr_mut(0).operands[0] = Operand::source(0);
        code.instr_mut(0).operands[1] = Operand::source(1);
        code.is_const_expression();
        assert_eq!(format_infix(&code), "(x0+x1)");
    }

    #[test]
    fn sq2_renders_as_power_suffix() {
        let cs = settings();
        let mut code: Code<f64> = Code::new(&cs);
        code.set_size(1);
        code.instr_mut(0).opcode = InstructionId::Sq2;
        code.instr_mut(0).operands[0] = Operand::source(0);
        code.is_const_expression();
        assert_eq!(format_infix(&code), "(x0**2)");
    }

    #[test]
    fn pow_falls_back_to_function_call() {
        let cs = settings();
        let mut code: Code<f64> = Code::new(&cs);
        code.set_size(1);
        code.instr_mut(0).opcode = InstructionId::Pow;
        code.instr_mut(0).operands[0] = Operand::source(0);
        code.instr_mut(0).operands[1] = Operand::source(1);
        code.is_const_expression();
        assert_eq!(format_infix(&code), "pow(x0,x1)");
    }

    #[test]
    fn numpy_form_guards_pdiv_denominator() {
        let cs = settings();
        let mut code: Code<f64> = Code::new(&cs);
        code.set_size(1);
        code.instr_mut(0).opcode = InstructionId::Pdiv;
        code.instr_mut(0).operands[0] = Operand::source(0);
        code.instr_mut(0).operands[1] = Operand::source(1);
        code.is_const_expression();
        let src = format_numpy(&code);
        assert!(src.contains("np.sqrt(1e-8"));
    }

    #[test]
    fn infix_references_constants_by_dense_used_index() {
        let cs = CodeSettings {
            input_size: 1,
            const_size: 3,
            min_code_size: 1,
            max_code_size: 2,
        };
        let mut code: Code<f64> = Code::new(&cs);
        code.set_size(2);
        // instr0 = x0 + c2 (c2 is the first constant referenced in traversal order)
        code.instr_mut(0).opcode = InstructionId::Add;
        code.instr_mut(0).operands[0] = Operand::source(0);
        code.instr_mut(0).operands[1] = Operand::constant(2);
        // instr1 (output) = instr0 * c0
        code.instr_mut(1).opcode = InstructionId::Mul;
        code.instr_mut(1).operands[0] = Operand::source(cs.code_start());
        code.instr_mut(1).operands[1] = Operand::constant(0);
        code.is_const_expression();

        assert_eq!(code.used_const, vec![0, 2]);
        assert_eq!(format_infix(&code), "((x0+c1)*c0)");
    }

    #[test]
    fn numpy_form_indexes_constants_array() {
        let cs = CodeSettings {
            input_size: 1,
            const_size: 1,
            min_code_size: 1,
            max_code_size: 1,
        };
        let mut code: Code<f64> = Code::new(&cs);
        code.set_size(1);
        code.instr_mut(0).opcode = InstructionId::Add;
        code.instr_mut(0).operands[0] = Operand::source(0);
        code.instr_mut(0).operands[1] = Operand::constant(0);
        code.is_const_expression();
        let src = format_numpy(&code);
        assert!(src.contains("c[0]"));
        assert!(src.contains("def predict(x, c):"));
    }

    /// A unary instruction's unused `operands[1]` slot can legitimately hold
    /// a stray constant reference that the used-mask walk never visits
    /// (the initializer fills both slots regardless of arity). Neither
    /// formatter may touch that slot, or they'd panic looking it up in
    /// `used_const`.
    #[test]
    fn unary_instruction_ignores_unused_second_operand_even_when_constant() {
        let cs = CodeSettings {
            input_size: 1,
            const_size: 1,
            min_code_size: 1,
            max_code_size: 1,
        };
        let mut code: Code<f64> = Code::new(&cs);
        code.set_size(1);
        code.instr_mut(0).opcode = InstructionId::Sqrt;
        code.instr_mut(0).operands[0] = Operand::source(0);
        code.instr_mut(0).operands[1] = Operand::constant(0);
        code.is_const_expression();
        assert_eq!(code.used_const, Vec::<u32>::new());
        assert_eq!(format_infix(&code), "sqrt(x0)");
        assert!(format_numpy(&code).contains("np.sqrt(x[:, 0])"));
    }
}
