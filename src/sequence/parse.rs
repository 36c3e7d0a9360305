//! Action-list construction from a flat token sequence.
//!
//! Grammar: the token `manual` yields a manual pause; any other token starts
//! a group of four — `(name, batch_size, batch_num, pause)` — yielding one
//! workload launch resolved against the registry. The trailing pause field
//! is reserved and currently not interpreted.

use crate::error::DriverError;
use crate::sequence::action::Action;
use crate::workload::WorkloadRegistry;

/// Sentinel token selecting a manual pause.
const MANUAL_TOKEN: &str = "manual";

/// Parse actions from a command-line token sequence, e.g.
/// `manual convnet 75 128 5 manual`.
pub fn parse_actions(
    registry: &WorkloadRegistry,
    tokens: &[String],
) -> Result<Vec<Action>, DriverError> {
    let mut actions = Vec::new();
    let mut rest = tokens;

    while let Some(head) = rest.first() {
        if head == MANUAL_TOKEN {
            actions.push(Action::ManualPause);
            rest = &rest[1..];
            continue;
        }
        if rest.len() < 4 {
            return Err(DriverError::Usage(format!(
                "unexpected sequence of arguments: {:?}",
                rest
            )));
        }

        let name = &rest[0];
        let batch_size = parse_field(&rest[1], "batch size")?;
        let batch_num = parse_field(&rest[2], "batch count")?;
        // rest[3] is the reserved pause field.
        let workload = registry.create(name, batch_size, batch_num)?;
        actions.push(Action::LaunchWorkload(workload));
        rest = &rest[4..];
    }

    Ok(actions)
}

fn parse_field(token: &str, what: &str) -> Result<u32, DriverError> {
    token
        .parse()
        .map_err(|_| DriverError::Usage(format!("invalid {} `{}`", what, token)))
}
