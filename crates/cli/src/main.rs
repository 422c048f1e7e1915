mod cli;
mod config;
mod demo;
mod report;
mod store;

use anyhow::{bail, Context, Result};
use clap::Parser;

use flowline_core::{LifecycleState, TaskId, TaskSpec};
use flowline_engine::{Engine, ProgressOutcome, TransitionOutcome};

use crate::cli::{CliArgs, Command, DisciplineArg, KindArg};
use crate::store::ProjectStore;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    // Load config
    let config = config::load(args.config.as_deref()).context("failed to load configuration")?;
    let store = ProjectStore::new(&args.project);

    match args.command {
        Command::Init { demo, force } => {
            if store.exists() && !force {
                bail!(
                    "project file {} already exists (use --force to overwrite)",
                    store.path().display()
                );
            }
            let engine = Engine::new(config)?;
            if demo {
                demo::seed(&engine)?;
            }
            store.save(&engine)?;
            println!(
                "created {} ({} tasks)",
                store.path().display(),
                engine.tasks().len()
            );
        }
        Command::Add {
            name,
            discipline,
            volatility,
            milestones,
        } => {
            let engine = store.load(config)?;
            let mut spec = match discipline {
                DisciplineArg::Forward => TaskSpec::forward(&name, volatility),
                DisciplineArg::Backward => {
                    if volatility != 0.0 {
                        bail!("validation tasks carry no volatility estimate");
                    }
                    TaskSpec::backward(&name)
                }
            };
            for raw in &milestones {
                let (threshold, label) = cli::parse_milestone(raw)?;
                spec = spec.with_milestone(threshold, label);
            }
            let id = engine.create_task(spec)?;
            store.save(&engine)?;
            println!("added {} '{}'", id, name);
        }
        Command::Link {
            from,
            to,
            kind,
            weight,
            at,
        } => {
            let engine = store.load(config)?;
            let from = TaskId::new(from);
            let to = TaskId::new(to);
            match at {
                Some(label) => {
                    if kind != KindArg::Requires {
                        bail!("--at applies to requires links only");
                    }
                    engine.link_at_milestone(from, to, weight, label)?;
                }
                None => engine.link(from, to, weight, kind.into())?,
            }
            store.save(&engine)?;
            println!("linked {} -> {}", from, to);
        }
        Command::Start { id } => {
            let engine = store.load(config)?;
            let outcome = engine.transition(TaskId::new(id), LifecycleState::InProgress)?;
            store.save(&engine)?;
            print_transition(TaskId::new(id), &outcome);
        }
        Command::Progress { id, value } => {
            let engine = store.load(config)?;
            let outcome = engine.update_progress(TaskId::new(id), value)?;
            store.save(&engine)?;
            print_progress(TaskId::new(id), &outcome);
        }
        Command::Done { id } => {
            let engine = store.load(config)?;
            let outcome = engine.update_progress(TaskId::new(id), 1.0)?;
            store.save(&engine)?;
            print_progress(TaskId::new(id), &outcome);
        }
        Command::Volatility { id, value } => {
            let engine = store.load(config)?;
            let task = TaskId::new(id);
            let shift = engine.update_volatility(task, value)?;
            store.save(&engine)?;
            println!(
                "{} volatility {:.2} -> {:.2}",
                task, shift.previous, shift.volatility
            );
            if let Some(candidates) = shift.scrap_candidates {
                if candidates.is_empty() {
                    println!("scrap advisory: no in-progress downstream work to reset");
                } else {
                    println!(
                        "scrap advisory: would reset {} (run `flowline scrap {}`)",
                        join_ids(&candidates),
                        id
                    );
                }
            }
        }
        Command::Scrap { id } => {
            let engine = store.load(config)?;
            let task = TaskId::new(id);
            let reset = engine.scrap_downstream(task)?;
            store.save(&engine)?;
            if reset.is_empty() {
                println!("nothing to reset downstream of {}", task);
            } else {
                println!("reset {}", join_ids(&reset));
            }
        }
        Command::Plan => {
            let engine = store.load(config)?;
            let outcome = engine.tick();
            store.save(&engine)?;
            print!("{}", report::render_tick(&outcome));
        }
        Command::Status => {
            let engine = store.load(config)?;
            print!("{}", report::render_board(&engine));
        }
        Command::Inventory => {
            let engine = store.load(config)?;
            println!("inventory {}", engine.inventory_status());
        }
    }

    Ok(())
}

fn print_progress(id: TaskId, outcome: &ProgressOutcome) {
    println!(
        "{} progress {:.0}% -> {:.0}%",
        id,
        outcome.previous * 100.0,
        outcome.progress * 100.0
    );
    for label in &outcome.crossed {
        println!("  latched '{}'", label);
    }
    if let Some(state) = outcome.transitioned {
        println!("  now {}", state);
    }
    for released in &outcome.released {
        println!("  released {}", released);
    }
}

fn print_transition(id: TaskId, outcome: &TransitionOutcome) {
    match outcome {
        TransitionOutcome::Applied { from, to, released } => {
            println!("{} {} -> {}", id, from, to);
            for r in released {
                println!("  released {}", r);
            }
        }
        TransitionOutcome::NoOp => println!("{} unchanged", id),
    }
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
