//! Bounded walk of a repository's file tree to sample its size in lines.
//!
//! The walk keeps an explicit worklist of directory entries and at most `concurrency`
//! requests in flight. Once the running total reaches the cap no new requests are issued;
//! requests already in flight still finish and are counted, so the total may overshoot.

use super::LOG_TARGET;
use super::client::{Client, ContentEntry};
use crate::Result;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use std::collections::VecDeque;

enum Visit {
    Lines(u64),
    Entries(Vec<ContentEntry>),
    Skipped,
}

/// Count lines across the files reachable from the directory listing at `root_url`.
///
/// Fails only when the root listing itself cannot be fetched. Files and subdirectories that
/// cannot be fetched are skipped.
pub async fn count_lines(client: &Client, root_url: &str, cap: u64, concurrency: usize) -> Result<u64> {
    let root: Vec<ContentEntry> = client.get_json(root_url).await?;

    let mut worklist: VecDeque<ContentEntry> = root.into();
    let mut in_flight = FuturesUnordered::new();
    let mut total = 0_u64;

    loop {
        while total < cap && in_flight.len() < concurrency.max(1) {
            let Some(entry) = worklist.pop_front() else {
                break;
            };
            in_flight.push(visit(client, entry));
        }

        let Some(outcome) = in_flight.next().await else {
            break;
        };

        match outcome {
            Visit::Lines(lines) => total += lines,
            Visit::Entries(entries) => worklist.extend(entries),
            Visit::Skipped => {}
        }
    }

    log::debug!(target: LOG_TARGET, "Sampled {total} lines from '{root_url}' ({} entries left unvisited)", worklist.len());
    Ok(total)
}

async fn visit(client: &Client, entry: ContentEntry) -> Visit {
    match entry.kind.as_str() {
        "file" => {
            let Some(download_url) = entry.download_url else {
                return Visit::Skipped;
            };

            match client.get_raw(&download_url).await {
                Ok(text) => Visit::Lines(count_text_lines(&text)),
                Err(e) => {
                    log::debug!(target: LOG_TARGET, "Skipping file '{download_url}': {e:#}");
                    Visit::Skipped
                }
            }
        }

        "dir" => match client.get_json(&entry.url).await {
            Ok(entries) => Visit::Entries(entries),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Skipping directory '{}': {e:#}", entry.url);
                Visit::Skipped
            }
        },

        _ => Visit::Skipped,
    }
}

/// Number of `\n` characters in `text`.
///
/// Text after the last newline is not counted, so `"a\nb"` is one line and `"a\nb\n"` is two.
/// A `\r\n` ending counts once.
#[must_use]
pub fn count_text_lines(text: &str) -> u64 {
    text.bytes().filter(|&b| b == b'\n').count() as u64
}
