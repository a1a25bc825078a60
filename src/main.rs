//! `reach`/`concur19`: the two CLI entry points spec §6 sketches for the
//! covering-reachability and local-time exploration engines.
//!
//! Exit codes (spec §6): `0` result computed and labels reachable, `1`
//! result computed and labels not reachable, `2` misuse (bad arguments or a
//! model that fails validation), `3` internal overflow/abort.

use std::collections::HashSet;
use std::fs;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use tchecker_rs::clocks::{BoundsMap, ClockBoundsCache, LocalBounds, LuBounds};
use tchecker_rs::covreach::{self, CoverMode as Cover, Search as CovSearch};
use tchecker_rs::error::{CoreError, ModelError};
use tchecker_rs::extrapolation::{Extrapolation, Global, Kind, Local, NoExtrapolation};
use tchecker_rs::model::{ClockGuard, Process, System};
use tchecker_rs::output;
use tchecker_rs::path;
use tchecker_rs::refzg::{RefLayout, RefZg};
use tchecker_rs::ta::Ta;
use tchecker_rs::textmodel;
use tchecker_rs::zg::{Elapse, Zg};

#[derive(Parser)]
#[command(name = "reach")]
#[command(about = "A symbolic model checker for networks of timed automata")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, ValueEnum)]
enum SearchArg {
    Bfs,
    Dfs,
}

#[derive(Copy, Clone, ValueEnum)]
enum CoverArg {
    Full,
    Leaf,
}

#[derive(Copy, Clone, ValueEnum)]
enum SemanticsArg {
    Standard,
    Elapsed,
}

#[derive(Copy, Clone, ValueEnum)]
enum ExtrapolationArg {
    None,
    ExtraLu,
    #[value(name = "extra-lu+")]
    ExtraLuPlus,
    #[value(name = "extra-m")]
    ExtraM,
    #[value(name = "extra-m+")]
    ExtraMPlus,
    Global,
    Local,
}

#[derive(Subcommand)]
enum Commands {
    /// Covering-reachability search over the standard zone graph.
    Reach {
        #[arg(long, value_enum, default_value = "bfs")]
        search: SearchArg,

        #[arg(long, value_enum, default_value = "full")]
        cover: CoverArg,

        #[arg(long, value_enum, default_value = "elapsed")]
        semantics: SemanticsArg,

        #[arg(long, value_enum, default_value = "extra-lu")]
        extrapolation: ExtrapolationArg,

        /// Comma-separated target labels; a run with none never reports reached.
        #[arg(long, default_value = "")]
        labels: String,

        /// Dump the fully explored subsumption graph as DOT to this path.
        #[arg(long)]
        dot: Option<String>,

        /// Path to a model in the crate's internal text format.
        model: String,
    },

    /// Full exploration of the local-time (reference-clock) zone graph;
    /// reports coverage statistics only, no reachability target.
    Concur19 {
        #[arg(long, value_enum, default_value = "bfs")]
        search: SearchArg,

        #[arg(long, value_enum, default_value = "full")]
        cover: CoverArg,

        /// Upper bound on the spread between reference clocks; omit for unbounded.
        #[arg(long)]
        spread: Option<i32>,

        model: String,
    },
}

fn main() -> ExitCode {
    simple_logger::SimpleLogger::new().env().init().ok();
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => code,
        Err(CoreError::Model(_)) => ExitCode::from(2),
        Err(CoreError::Cancelled) => ExitCode::from(3),
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(3)
        }
    }
}

fn run(command: Commands) -> Result<ExitCode, CoreError> {
    match command {
        Commands::Reach { search, cover, semantics, extrapolation, labels, dot, model } => {
            run_reach(search, cover, semantics, extrapolation, &labels, dot.as_deref(), &model)
        }
        Commands::Concur19 { search, cover, spread, model } => run_concur19(search, cover, spread, &model),
    }
}

fn load_system(path: &str) -> Result<System, CoreError> {
    let text = fs::read_to_string(path)?;
    let system = textmodel::parse(&text).map_err(|e| ModelError::Parse(e.0))?;
    system.validate()?;
    Ok(system)
}

/// A static clock-bounds analysis proper is out of scope (spec §1); this
/// scans every guard and invariant in the system for the largest constant
/// each clock is ever compared against and uses it as both the `L` and `U`
/// bound for that clock — a coarse but sound over-approximation (extra_lu
/// only ever needs to widen, never tighten).
fn derive_bounds(system: &System) -> LuBounds {
    let mut map = BoundsMap::new(system.n_clocks);
    for p in &system.processes {
        for loc in &p.locations {
            collect_clock_bounds(&loc.clocks_invariant(), &mut map);
        }
        for e in &p.edges {
            collect_clock_bounds(&e.guard_clocks, &mut map);
        }
    }
    LuBounds { l: map.clone(), u: map }
}

fn collect_clock_bounds(guard: &ClockGuard, map: &mut BoundsMap) {
    match guard {
        ClockGuard::True => {}
        ClockGuard::Cmp { clock, bound, .. } => {
            if *clock != 0 {
                map.set(*clock, bound.abs());
            }
        }
        ClockGuard::Diff { i, j, bound, .. } => {
            if *i != 0 {
                map.set(*i, bound.abs());
            }
            if *j != 0 {
                map.set(*j, bound.abs());
            }
        }
        ClockGuard::And(cs) => {
            for c in cs {
                collect_clock_bounds(c, map);
            }
        }
    }
}

fn per_location_bounds(system: &System, p: &Process) -> Vec<LuBounds> {
    p.locations
        .iter()
        .map(|loc| {
            let mut map = BoundsMap::new(system.n_clocks);
            collect_clock_bounds(&loc.clocks_invariant(), &mut map);
            LuBounds { l: map.clone(), u: map }
        })
        .collect()
}

fn build_extrapolation(kind: ExtrapolationArg, system: &System) -> Box<dyn Extrapolation> {
    let bounds = derive_bounds(system);
    match kind {
        ExtrapolationArg::None => Box::new(NoExtrapolation),
        ExtrapolationArg::ExtraLu => Box::new(Global { kind: Kind::ExtraLu, bounds }),
        ExtrapolationArg::ExtraLuPlus => Box::new(Global { kind: Kind::ExtraLuPlus, bounds }),
        ExtrapolationArg::ExtraM => Box::new(Global { kind: Kind::ExtraM, bounds }),
        ExtrapolationArg::ExtraMPlus => Box::new(Global { kind: Kind::ExtraMPlus, bounds }),
        ExtrapolationArg::Global => Box::new(Global { kind: Kind::ExtraLu, bounds }),
        ExtrapolationArg::Local => {
            let per_location = system.processes.iter().map(|p| per_location_bounds(system, p)).collect();
            let source = LocalBounds::new(system.n_clocks, per_location);
            Box::new(Local { kind: Kind::ExtraLu, cache: ClockBoundsCache::new(Box::new(source)) })
        }
    }
}

fn parse_labels(labels: &str) -> HashSet<String> {
    labels.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn run_reach(
    search: SearchArg,
    cover: CoverArg,
    semantics: SemanticsArg,
    extrapolation: ExtrapolationArg,
    labels: &str,
    dot: Option<&str>,
    model_path: &str,
) -> Result<ExitCode, CoreError> {
    let system = load_system(model_path)?;
    let extrap: std::sync::Arc<dyn Extrapolation> = build_extrapolation(extrapolation, &system).into();
    let ta = Ta::new(std::sync::Arc::new(system));
    let system_arc = ta.system_arc();
    let elapse = match semantics {
        SemanticsArg::Standard => Elapse::No,
        SemanticsArg::Elapsed => Elapse::Yes,
    };
    let zg = Zg::new(ta, extrap, elapse);
    let target_labels = parse_labels(labels);

    let search = match search {
        SearchArg::Bfs => CovSearch::Bfs,
        SearchArg::Dfs => CovSearch::Dfs,
    };
    let cover = match cover {
        CoverArg::Full => Cover::Full,
        CoverArg::Leaf => Cover::Leaf,
    };
    let cancellation = tchecker_rs::error::Cancellation::new();
    let result = covreach::run(&zg, &target_labels, search, cover, &cancellation);

    let stdout = std::io::stdout();
    let mut w = stdout.lock();
    output::write_stats(&mut w, &result.stats)?;

    if let Some(target) = result.reached_node {
        if let Some(witness) = path::extract_path(&result, target) {
            if let Some(trace) = path::concrete_trace(system_arc, elapse, &result, &witness) {
                output::write_trace(&mut w, &result, &trace)?;
            }
        }
    }

    if let Some(dot_path) = dot {
        let mut file = fs::File::create(dot_path)?;
        output::write_dot(&mut file, &result)?;
    }

    Ok(ExitCode::from(if result.stats.reached { 0 } else { 1 }))
}

fn run_concur19(search: SearchArg, cover: CoverArg, spread: Option<i32>, model_path: &str) -> Result<ExitCode, CoreError> {
    let system = load_system(model_path)?;
    let n_processes = system.processes.len();
    let n_clocks = system.n_clocks;
    let ta = Ta::new(std::sync::Arc::new(system));
    let layout = RefLayout::per_process(n_processes.max(1), (0..n_clocks).map(|c| c % n_processes.max(1)).collect());
    let refzg = RefZg::new(ta, layout, spread);

    let search = match search {
        SearchArg::Bfs => CovSearch::Bfs,
        SearchArg::Dfs => CovSearch::Dfs,
    };
    let cover = match cover {
        CoverArg::Full => Cover::Full,
        CoverArg::Leaf => Cover::Leaf,
    };
    let cancellation = tchecker_rs::error::Cancellation::new();
    let result = covreach::run_refzg(&refzg, search, cover, &cancellation);

    let stdout = std::io::stdout();
    let mut w = stdout.lock();
    output::write_stats(&mut w, &result.stats)?;
    Ok(ExitCode::from(0))
}
