//! Plain-text rendering for the terminal.

use std::fmt::Write as _;

use flowline_engine::{Engine, TickOutcome, TierAction};

/// Render one scheduling decision as a short multi-line block.
pub fn render_tick(outcome: &TickOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "tick {}: {} (inventory {})",
        outcome.seq,
        outcome.action.label(),
        outcome.inventory
    );
    match &outcome.action {
        TierAction::StopTheLine(stop) => {
            let _ = writeln!(
                out,
                "  finish {} '{}' before starting anything new (unblocks {})",
                stop.task, stop.name, stop.unblocks
            );
        }
        TierAction::ForwardQueue { queue, held } => {
            for (i, c) in queue.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {}. [{}] {} '{}' (risk {:.2}, unblocks {})",
                    i + 1,
                    c.gate,
                    c.task,
                    c.name,
                    c.risk,
                    c.unblocks
                );
            }
            for c in held {
                let _ = writeln!(out, "  held: {} '{}' (risk {:.2})", c.task, c.name, c.risk);
            }
        }
        TierAction::Swarm(rec) => {
            let _ = writeln!(out, "  {}", rec.note);
            let _ = writeln!(
                out,
                "  held risk {:.2}, unblocks {}",
                rec.held_risk, rec.unblocks
            );
        }
        TierAction::Infrastructure(item) => {
            let _ = writeln!(out, "  backlog: {}", item.label);
        }
        TierAction::NoActionAvailable => {
            let _ = writeln!(out, "  nothing to schedule");
        }
    }
    out
}

/// Render the full project board: completion, inventory, every task, every
/// link.
pub fn render_board(engine: &Engine) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "project {}: {}, inventory {}",
        engine.project(),
        engine.completion(),
        engine.inventory_status()
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<9} {:<28} {:<9} {:<23} {:>5} {:>5}",
        "ID", "NAME", "DISC", "STATE", "PROG", "VOL"
    );
    let _ = writeln!(out, "{}", "-".repeat(84));

    for task in engine.tasks() {
        let name = if task.name.len() > 26 {
            format!("{}...", &task.name[..23])
        } else {
            task.name.clone()
        };
        let _ = writeln!(
            out,
            "{:<9} {:<28} {:<9} {:<23} {:>4.0}% {:>5.2}",
            task.id.to_string(),
            name,
            task.discipline.to_string(),
            task.state.to_string(),
            task.progress * 100.0,
            task.volatility,
        );
        for m in &task.milestones {
            let _ = writeln!(
                out,
                "{:>9} milestone '{}' @{:.2}{}",
                "",
                m.label,
                m.threshold,
                if m.reached { " [latched]" } else { "" }
            );
        }
    }

    let edges = engine.edges();
    if !edges.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "links:");
        for edge in edges {
            let gate = edge
                .gate
                .as_deref()
                .map(|g| format!(" at '{}'", g))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  {} -[{}]-> {} (weight {:.2}{})",
                edge.upstream, edge.kind, edge.downstream, edge.weight, gate
            );
        }
    }
    out
}
