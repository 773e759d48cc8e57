//! Static test-count prediction
//!
//! Computes the expected number of TestResults a run will produce without
//! executing any request or script, using the same traversal as the runner
//! and a static scan of each script in the effective post chain.

use std::collections::HashMap;

use crate::model::Collection;
use crate::plugin::PluginRegistry;
use crate::script::scan;

use super::walk;

/// Sentinel meaning "cannot be statically predicted", distinct from zero
pub const INDETERMINATE: i64 = -1;

/// Predict the total number of TestResults for a run of `collection`
///
/// Returns [`INDETERMINATE`] when any plugin-event multiplier cannot be
/// statically determined anywhere in the tree. Callers must treat that as
/// "unknown", never as "zero".
pub fn count_tests(collection: &Collection, registry: &PluginRegistry) -> i64 {
    let event_meta: Option<HashMap<String, bool>> = registry
        .protocol_events(&collection.protocol)
        .map(|events| {
            events
                .into_iter()
                .map(|e| (e.name, e.can_have_tests))
                .collect()
        });

    let mut total: i64 = 0;
    let mut indeterminate = false;

    walk::walk(collection, &mut |plan| {
        if indeterminate {
            return;
        }

        let mut per_request: i64 = plan
            .post_chain
            .iter()
            .map(|(_, s)| scan::count_test_calls(&s.source) as i64)
            .sum();

        for event_script in &plan.request.event_scripts {
            // Without the protocol plugin's event metadata we cannot tell
            // which event scripts carry assertions.
            let Some(meta) = &event_meta else {
                indeterminate = true;
                return;
            };
            if !meta.get(&event_script.event).copied().unwrap_or(false) {
                continue;
            }
            let expected = plan
                .request
                .pre_script
                .as_ref()
                .and_then(|s| scan::expected_event_count(&s.source));
            let Some(expected) = expected else {
                indeterminate = true;
                return;
            };
            per_request +=
                expected as i64 * scan::count_test_calls(&event_script.script.source) as i64;
        }

        total += per_request;
    });

    if indeterminate {
        return INDETERMINATE;
    }

    total * collection.test_data.len().max(1) as i64
}
