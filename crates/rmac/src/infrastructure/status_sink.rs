//! Default status sink: snapshots as JSON in the debug log.

use rmac_core::{StatusSink, StatusSnapshot};
use tracing::{debug, warn};

/// Logs every [`StatusSnapshot`] as a JSON object at `debug` level under
/// the `rmac::status` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn publish(&self, snapshot: &StatusSnapshot) {
        match encode(snapshot) {
            Ok(json) => debug!(target: "rmac::status", status = %json, "status"),
            Err(e) => warn!(error = %e, "could not encode status snapshot"),
        }
    }
}

fn encode(snapshot: &StatusSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string(snapshot)
}
