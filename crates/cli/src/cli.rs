use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use flowline_engine::EdgeKind;

/// Risk-governed scheduling for two-discipline pipelines.
///
/// Tracks creation and validation tasks, propagates volatility through the
/// dependency graph, and answers "what should happen right now".
#[derive(Parser, Debug)]
#[command(name = "flowline", about = "Risk-governed pipeline scheduler")]
pub struct CliArgs {
    /// Path to the project file
    #[arg(long, global = true, default_value = "flowline.json")]
    pub project: PathBuf,

    /// Path to config file (default: ~/.config/flowline/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new project file
    Init {
        /// Seed the walking-robot demo project
        #[arg(long)]
        demo: bool,
        /// Overwrite an existing project file
        #[arg(long)]
        force: bool,
    },
    /// Add a task
    Add {
        /// Task name
        name: String,
        /// Task discipline
        #[arg(long, value_enum, default_value_t = DisciplineArg::Forward)]
        discipline: DisciplineArg,
        /// Volatility estimate in [0, 1] (creation tasks only)
        #[arg(long, default_value_t = 0.0)]
        volatility: f64,
        /// Milestone declaration as THRESHOLD:LABEL, repeatable
        #[arg(long = "milestone", value_name = "THRESHOLD:LABEL")]
        milestones: Vec<String>,
    },
    /// Link two tasks with a dependency edge
    Link {
        /// Upstream task id
        from: u64,
        /// Downstream task id
        to: u64,
        /// Edge kind
        #[arg(long, value_enum, default_value_t = KindArg::Requires)]
        kind: KindArg,
        /// Edge weight
        #[arg(long, default_value_t = 1.0)]
        weight: f64,
        /// Open the edge at this upstream milestone instead of completion
        #[arg(long, value_name = "LABEL")]
        at: Option<String>,
    },
    /// Mark a task started
    Start {
        /// Task id
        id: u64,
    },
    /// Record fractional progress on a task
    Progress {
        /// Task id
        id: u64,
        /// Progress in [0, 1]
        value: f64,
    },
    /// Record a task's work as complete
    Done {
        /// Task id
        id: u64,
    },
    /// Re-estimate a creation task's volatility
    Volatility {
        /// Task id
        id: u64,
        /// Volatility in [0, 1]
        value: f64,
    },
    /// Reset in-progress work downstream of a churned output
    Scrap {
        /// Task id of the churned upstream output
        id: u64,
    },
    /// Ask the scheduler what to do next
    Plan,
    /// Show the project board
    Status,
    /// Show the risk inventory
    Inventory,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum DisciplineArg {
    /// Creation work that produces an output
    Forward,
    /// Validation work that signs an output off
    Backward,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum KindArg {
    Requires,
    Validates,
    Supports,
}

impl From<KindArg> for EdgeKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Requires => EdgeKind::Requires,
            KindArg::Validates => EdgeKind::Validates,
            KindArg::Supports => EdgeKind::Supports,
        }
    }
}

/// Parses a milestone declaration of the form `0.4:frame`.
pub fn parse_milestone(raw: &str) -> Result<(f64, String)> {
    let (threshold, label) = raw
        .split_once(':')
        .with_context(|| format!("expected THRESHOLD:LABEL, got '{raw}'"))?;
    let threshold: f64 = threshold
        .trim()
        .parse()
        .with_context(|| format!("bad milestone threshold in '{raw}'"))?;
    let label = label.trim();
    if label.is_empty() {
        bail!("empty milestone label in '{raw}'");
    }
    Ok((threshold, label.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_milestone() {
        assert_eq!(
            parse_milestone("0.4:frame").unwrap(),
            (0.4, "frame".to_string())
        );
        assert_eq!(
            parse_milestone("0.75: drive train ").unwrap(),
            (0.75, "drive train".to_string())
        );
    }

    #[test]
    fn test_parse_milestone_rejects_malformed_input() {
        assert!(parse_milestone("frame").is_err());
        assert!(parse_milestone("x:frame").is_err());
        assert!(parse_milestone("0.4:").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let args = CliArgs::try_parse_from([
            "flowline", "add", "leg cad", "--volatility", "0.6", "--milestone", "0.4:frame",
        ])
        .unwrap();
        match args.command {
            Command::Add {
                name,
                volatility,
                milestones,
                discipline,
            } => {
                assert_eq!(name, "leg cad");
                assert_eq!(volatility, 0.6);
                assert_eq!(milestones, vec!["0.4:frame"]);
                assert_eq!(discipline, DisciplineArg::Forward);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_link_kinds() {
        let args =
            CliArgs::try_parse_from(["flowline", "link", "3", "1", "--kind", "validates"])
                .unwrap();
        match args.command {
            Command::Link { from, to, kind, weight, at } => {
                assert_eq!((from, to), (3, 1));
                assert_eq!(kind, KindArg::Validates);
                assert_eq!(weight, 1.0);
                assert_eq!(at, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
