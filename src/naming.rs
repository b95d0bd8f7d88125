//! Stack name expansion and prefix-based stack selection.

use crate::env::Environment;
use crate::stack::StackSummary;

/// Expands `$NAME` and `${NAME}` references in a stack name template.
///
/// Unresolved references are left verbatim.
#[must_use]
pub fn expand(template: &str, env: &Environment) -> String {
    env.expand(template)
}

/// Picks the oldest running stack whose name starts with `prefix`.
///
/// Only stacks in a running status (`UPDATE_COMPLETE`, `CREATE_COMPLETE`,
/// `ROLLBACK_COMPLETE`) are considered. With zero or one match the prefix is
/// returned unchanged. Among several matches the earliest creation time wins
/// and equal timestamps resolve to the first stack in `running` order.
#[must_use]
pub fn resolve_oldest_with_prefix(prefix: &str, running: &[StackSummary]) -> String {
    let matches: Vec<&StackSummary> = running
        .iter()
        .filter(|summary| summary.status.is_running() && summary.name.starts_with(prefix))
        .collect();

    if matches.len() < 2 {
        return prefix.to_owned();
    }

    matches
        .into_iter()
        .min_by_key(|summary| summary.creation_time)
        .map_or_else(|| prefix.to_owned(), |oldest| oldest.name.clone())
}
