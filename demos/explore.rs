//! Toy path exploration over a two-byte input.
//!
//! Forks on a chain of random branch conditions, keeping only feasible paths,
//! and prints one concrete input per path. Feasibility checks go through the
//! counterexample cache, so most of them never reach the solver.
//!
//! Run with: `cargo run --example explore`
//! With options: `cargo run --example explore -- --branches 6 --seed 3 --debug`

use std::time::Instant;

use clap::Parser;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use symcore::array::Array;
use symcore::assignment::Assignment;
use symcore::builder::ExprBuilder;
use symcore::cex_cache::CexCachingSolver;
use symcore::config::CacheConfig;
use symcore::constraints::ConstraintSet;
use symcore::error::SolverError;
use symcore::query::Query;
use symcore::reference::{ArrayRef, ExprRef};
use symcore::solver::Solver;
use symcore::updates::UpdateLog;

#[derive(Parser, Debug)]
#[command(name = "explore")]
#[command(about = "Explore the paths of a random branching program")]
struct Args {
    /// Number of branches on the path
    #[arg(short, long, default_value_t = 5)]
    branches: usize,

    /// Seed of the branch generator
    #[arg(short, long, default_value_t = 1)]
    seed: u64,

    /// Log every rewrite and cache decision
    #[arg(short, long)]
    debug: bool,
}

/// Enumerates all values of the input, in order.
struct Enumerate {
    calls: usize,
}

impl Solver for Enumerate {
    fn compute_sat(&mut self, b: &ExprBuilder, q: Query<'_>) -> Result<bool, SolverError> {
        let mut exprs = q.constraints.to_vec();
        exprs.push(q.expr);
        let arrays = b.find_symbolic_arrays(&exprs);
        Ok(self.compute_initial_values(b, q.negate_expr(b), &arrays)?.is_some())
    }

    fn compute_initial_values(
        &mut self,
        b: &ExprBuilder,
        q: Query<'_>,
        arrays: &[ArrayRef],
    ) -> Result<Option<Assignment>, SolverError> {
        self.calls += 1;
        let mut exprs = q.constraints.to_vec();
        exprs.push(b.mk_is_zero(q.expr));
        let total: usize = arrays.iter().map(|&a| b.array(a).size() as usize).sum();
        if total > 2 {
            return Err(SolverError::Crash(format!("{} input bytes is too many", total)));
        }
        for n in 0..(1u32 << (8 * total)) {
            let mut bytes = n.to_le_bytes().into_iter();
            let mut a = Assignment::new(false);
            for &arr in arrays {
                let size = b.array(arr).size() as usize;
                a.bind(b, arr, bytes.by_ref().take(size).collect());
            }
            if a.satisfies(b, &exprs) {
                return Ok(Some(a));
            }
        }
        Ok(None)
    }

    fn failed(&self) -> bool {
        false
    }
}

fn random_condition(b: &ExprBuilder, input: &[ExprRef; 2], rng: &mut impl Rng) -> ExprRef {
    let x = input[rng.random_range(0..2)];
    let c = b.mk_const(rng.random_range(0..256), 8);
    match rng.random_range(0..4) {
        0 => b.mk_ult(x, c),
        1 => b.mk_eq(c, x),
        2 => b.mk_ule(b.mk_add(input[0], input[1]), c),
        _ => b.mk_eq(b.mk_and(x, b.mk_const(1, 8)), b.mk_const(0, 8)),
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let level = if args.debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = Instant::now();

    let b = ExprBuilder::default();
    let arr = b.mk_array(Array::symbolic("input", 2));
    let log = UpdateLog::new(arr);
    let input = [b.mk_read(log, b.mk_const(0, 32)), b.mk_read(log, b.mk_const(1, 32))];

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let conditions: Vec<ExprRef> = (0..args.branches)
        .map(|_| random_condition(&b, &input, &mut rng))
        .collect();

    let mut solver = CexCachingSolver::new(Enumerate { calls: 0 }, CacheConfig::default());
    let mut paths = vec![ConstraintSet::default()];
    for &cond in &conditions {
        println!("branch on {}", b.display(cond));
        let mut next = Vec::new();
        for path in paths {
            for side in [cond, b.mk_not(cond)] {
                let q = Query::new(path.as_slice(), side);
                if !solver.may_be_true(&b, q)? {
                    continue;
                }
                let mut forked = path.clone();
                if forked.add_constraint(&b, side) {
                    next.push(forked);
                }
            }
        }
        paths = next;
    }

    println!("\n{} feasible paths", paths.len());
    for path in &paths {
        let q = Query::new(path.as_slice(), b.mk_false());
        if let Some(model) = solver.compute_initial_values(&b, q, &[arr])? {
            print!("{}", model.display(&b));
        }
    }

    let stats = solver.stats();
    println!(
        "\nqueries = {}, hits = {}, solver calls = {}, nodes = {}",
        stats.queries,
        stats.hits(),
        solver.solver().calls,
        b.num_exprs()
    );

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
