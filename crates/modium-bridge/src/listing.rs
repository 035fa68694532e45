//! Installed-mod listing: direct call fast path, then the reassembly side
//! channel, then the alternate endpoint.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use modium_core::protocol;

use crate::bootstrap;
use crate::client::BridgeClient;
use crate::reassembly::{first_non_empty_list, Reassembler, DIRECT_LIST_PATHS};

/// Upper bound on the direct callback attempt before deferring to the stream.
const DIRECT_CALL_TIMEOUT: Duration = Duration::from_secs(3);

/// How long to watch the reassembler for new data after firing a call.
const STREAM_POLL_DEADLINE: Duration = Duration::from_secs(7);

/// Sleep between reassembler polls.
const STREAM_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// List installed records for a collection. Exhausting every path yields an
/// empty vec — absence of mods and a transient failure are indistinguishable
/// here and both are the caller's to interpret, never an error.
pub async fn list_installed(
    client: &BridgeClient,
    reassembler: &Reassembler,
    game_id: u64,
    page_size: u64,
) -> Vec<Value> {
    let primary_body = json!({
        "gameId": game_id,
        "current": 1,
        "size": page_size,
        "sort": protocol::LISTING_SORT,
    });
    let fallback_body = json!({"gameId": game_id});

    let attempts = [
        (protocol::EP_INSTALLED_MODS, primary_body),
        (protocol::EP_INSTALLED_MODS_FOR_PRIORITY, fallback_body),
    ];

    for (endpoint, body) in attempts {
        // Fast path: the callback sometimes carries the list directly.
        if let Some(reply) = client
            .call_raced(endpoint, body.clone(), DIRECT_CALL_TIMEOUT)
            .await
        {
            if let Some(list) = first_non_empty_list(&reply, DIRECT_LIST_PATHS) {
                info!("{endpoint} answered directly with {} records", list.len());
                return list.clone();
            }
        }

        // The real answer streams out-of-band: fire the same call without
        // awaiting its callback and watch the reassembler instead.
        let before = reassembler.hits();
        client.fire(endpoint, body).await;

        let deadline = Instant::now() + STREAM_POLL_DEADLINE;
        loop {
            for chunk in bootstrap::drain_chunks(client.session()).await {
                reassembler.ingest(&chunk);
            }
            if reassembler.hits() != before || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(STREAM_POLL_INTERVAL).await;
        }

        let records = reassembler.records();
        if !records.is_empty() {
            info!("{endpoint} streamed {} records", records.len());
            return records;
        }
        debug!("{endpoint} yielded nothing, falling through");
    }

    reassembler.records()
}
