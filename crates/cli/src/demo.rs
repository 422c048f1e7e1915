use anyhow::Result;

use flowline_core::TaskSpec;
use flowline_engine::{EdgeKind, Engine};

/// Seed a small walking-robot project: two design tracks feeding a
/// fabrication chain, with validation checks on the risky joints.
pub fn seed(engine: &Engine) -> Result<()> {
    let chassis_cad = engine.create_task(
        TaskSpec::forward("chassis cad", 0.7).with_milestone(0.5, "frame locked"),
    )?;
    let leg_cad = engine.create_task(TaskSpec::forward("leg cad", 0.6))?;
    let leg_fab = engine.create_task(TaskSpec::forward("leg fabrication", 0.5))?;
    let firmware = engine.create_task(TaskSpec::forward("drive firmware", 0.4))?;
    let gait = engine.create_task(TaskSpec::forward("gait tuning", 0.6))?;
    let fit_check = engine.create_task(TaskSpec::backward("leg fit check"))?;
    let field_trial = engine.create_task(TaskSpec::backward("field trial"))?;

    engine.link(leg_cad, leg_fab, 0.9, EdgeKind::Requires)?;
    engine.link_at_milestone(chassis_cad, leg_fab, 0.6, "frame locked")?;
    engine.link(chassis_cad, firmware, 0.5, EdgeKind::Requires)?;
    engine.link(leg_fab, gait, 0.8, EdgeKind::Requires)?;
    engine.link(firmware, gait, 0.7, EdgeKind::Requires)?;

    engine.link(fit_check, leg_fab, 1.0, EdgeKind::Validates)?;
    engine.link(leg_fab, fit_check, 0.5, EdgeKind::Requires)?;
    engine.link(field_trial, gait, 1.0, EdgeKind::Validates)?;
    engine.link(gait, field_trial, 0.5, EdgeKind::Requires)?;

    Ok(())
}
