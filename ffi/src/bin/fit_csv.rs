//! Test-harness binary: fit a symbolic regression model against a CSV file
//! straight from the command line, without going through the C-ABI.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;

use symreg::csv::read_table;
use symreg_core::config::{CodeSettings, Config, ConstSettings, FitParams, Metric};
use symreg_core::engine::Engine;

/// Fit a symbolic regression model to a CSV table (features..., target).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the input CSV file (last column is the regression target).
    input: PathBuf,

    /// Number of solvers to run concurrently.
    #[arg(long, default_value_t = 4)]
    threads: u32,

    /// Population size per solver.
    #[arg(long, default_value_t = 16)]
    population: u32,

    /// Minimum generated program length.
    #[arg(long, default_value_t = 2)]
    min_code_size: u32,

    /// Maximum generated program length.
    #[arg(long, default_value_t = 24)]
    max_code_size: u32,

    /// Number of constant slots per program.
    #[arg(long, default_value_t = 8)]
    const_size: u32,

    /// Iterations per solver.
    #[arg(long, default_value_t = 200_000)]
    iter_limit: u64,

    /// Wall-clock budget per solver in milliseconds (0 = unbounded).
    #[arg(long, default_value_t = 0)]
    time_limit_ms: u32,

    /// Loss metric: mse, mae, msle, kendall, logloss, logit.
    #[arg(long, default_value = "mse")]
    metric: String,

    /// Deterministic seed for the engine's solvers.
    #[arg(long, default_value_t = 0xC0FF_EE12_3456_789A)]
    seed: u64,

    /// Hill-climb acceptance slack.
    #[arg(long, default_value_t = 0.05)]
    alpha: f64,

    /// Instruction bundle: simple, math, fuzzy, or a "name prob; ..." list.
    #[arg(long, default_value = "math")]
    instructions: String,
}

fn parse_metric(name: &str) -> Option<Metric> {
    match name {
        "mse" => Some(Metric::Mse),
        "mae" => Some(Metric::Mae),
        "msle" => Some(Metric::Msle),
        "kendall" => Some(Metric::PseudoKendall),
        "logloss" => Some(Metric::LogLoss),
        "logit" => Some(Metric::LogitApprox),
        _ => None,
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let metric = match parse_metric(&cli.metric) {
        Some(m) => m,
        None => {
            log::error!("unknown metric {:?}, expected one of mse/mae/msle/kendall/logloss/logit", cli.metric);
            std::process::exit(1);
        }
    };

    let file = match File::open(&cli.input) {
        Ok(f) => f,
        Err(e) => {
            log::error!("failed to open {}: {e}", cli.input.display());
            std::process::exit(1);
        }
    };
    let table = match read_table(BufReader::new(file)) {
        Ok(t) => t,
        Err(e) => {
            log::error!("failed to parse {}: {e}", cli.input.display());
            std::process::exit(1);
        }
    };
    log::info!("loaded {} rows, {} feature columns from {}", table.rows, table.cols, cli.input.display());

    let config = Config {
        random_seed: cli.seed,
        num_threads: cli.threads,
        population_size: cli.population,
        transformation: 0,
        clip_min: 0.0,
        clip_max: 0.0,
        init_const_settings: ConstSettings {
            min: -4.0,
            max: 4.0,
            predefined_prob: 0.0,
            predefined_set: vec![],
        },
        code_settings: CodeSettings {
            input_size: table.cols as u32,
            const_size: cli.const_size,
            min_code_size: cli.min_code_size,
            max_code_size: cli.max_code_size,
        },
    };

    let fit_params = FitParams {
        time_limit_ms: cli.time_limit_ms,
        verbose: 0,
        tournament: 4,
        metric,
        pretest_size: 16,
        sample_size: 64,
        neighbours_count: 16,
        alpha: cli.alpha,
        beta: 0.0,
        iter_limit: cli.iter_limit,
        const_settings: ConstSettings {
            min: -4.0,
            max: 4.0,
            predefined_prob: 0.0,
            predefined_set: vec![],
        },
        instruction_probs: FitParams::parse_instruction_set(&cli.instructions),
        feature_probs: None,
        cw0: 1.0,
        cw1: 1.0,
    };

    let mut engine: Engine<f64> = Engine::new(config);
    match engine.fit(&table.x, &table.y, table.rows, table.cols, fit_params, None) {
        Ok(score) => log::info!("fit complete, best solver score {score}"),
        Err(e) => {
            log::error!("fit failed: {e}");
            std::process::exit(1);
        }
    }

    match engine.get_best_model() {
        Ok(model) => {
            println!("score:       {}", model.score);
            println!("expression:  {}", model.expression);
            println!("used consts: {:?}", model.used_constants);
            println!("--- generated numpy code ---");
            println!("{}", model.generated_code);
        }
        Err(e) => {
            log::error!("could not retrieve best model: {e}");
            std::process::exit(1);
        }
    }
}
