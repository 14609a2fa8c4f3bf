//! Benchmarks for the processor's hot loop: executing a Code over a batch
//! and scoring it against a loss metric.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use symreg_core::code::{Code, Operand};
use symreg_core::config::{CodeSettings, Metric};
use symreg_core::dataset::Dataset;
use symreg_core::instructions::InstructionId;
use symreg_core::processor::{Processor, Transform};

fn polynomial_code(cs: &CodeSettings) -> Code<f64> {
    // (x0 * x0) + (x1 * c0)
    let mut code: Code<f64> = Code::new(cs);
    code.set_size(3);
    code.instr_mut(0).opcode = InstructionId::Mul;
    code.instr_mut(0).operands[0] = Operand::source(0);
    code.instr_mut(0).operands[1] = Operand::source(0);
    code.instr_mut(1).opcode = InstructionId::Mul;
    code.instr_mut(1).operands[0] = Operand::source(1);
    code.instr_mut(1).operands[1] = Operand::constant(0);
    code.instr_mut(2).opcode = InstructionId::Add;
    code.instr_mut(2).operands[0] = Operand::source(cs.code_start());
    code.instr_mut(2).operands[1] = Operand::source(cs.code_start() + 1);
    code.constants[0] = 2.5;
    code.is_const_expression();
    code
}

fn dataset(rows: usize) -> Dataset<f64> {
    let mut x = Vec::with_capacity(rows * 2);
    let mut y = Vec::with_capacity(rows);
    for i in 0..rows {
        let a = i as f64 * 0.01;
        let b = (i as f64 * 0.03).sin();
        x.push(a);
        x.push(b);
        y.push(a * a + 2.5 * b);
    }
    Dataset::from_rows(&x, &y, rows, 2, None, 1)
}

fn bench_execute_and_score(c: &mut Criterion) {
    let cs = CodeSettings {
        input_size: 2,
        const_size: 1,
        min_code_size: 1,
        max_code_size: 4,
    };
    let code = polynomial_code(&cs);
    let data = dataset(4096);
    let mut proc = Processor::new(cs.max_code_size as usize);

    let mut group = c.benchmark_group("processor");
    group.bench_function("score_batch_mse", |b| {
        b.iter(|| {
            black_box(proc.score_batch(
                black_box(&code),
                black_box(&data),
                0,
                Transform::None,
                0.0,
                0.0,
                Metric::Mse,
                (1.0, 1.0),
            ))
        })
    });

    group.bench_function("evaluate_full_set", |b| {
        b.iter(|| {
            black_box(proc.evaluate(
                black_box(&code),
                black_box(&data),
                0..data.batch_count(),
                Transform::None,
                0.0,
                0.0,
                Metric::Mse,
                (1.0, 1.0),
            ))
        })
    });
    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let cs = CodeSettings {
        input_size: 2,
        const_size: 1,
        min_code_size: 1,
        max_code_size: 4,
    };
    let code = polynomial_code(&cs);
    let data = dataset(4096);
    let mut proc = Processor::new(cs.max_code_size as usize);

    c.bench_function("predict_batch_sigmoid", |b| {
        b.iter(|| black_box(proc.predict_batch(black_box(&code), black_box(&data), 0, Transform::Sigmoid, 0.0, 1.0)))
    });
}

criterion_group!(benches, bench_execute_and_score, bench_predict);
criterion_main!(benches);
