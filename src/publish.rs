//! Change detection and publication to the shared status store.
//!
//! The downstream phone app polls a GitHub Gist; this side PATCHes a new
//! `order_status.json` whenever the observed count changes. Delivery is
//! at-most-once per distinct value: a failed push is logged and not
//! retried until the count changes again.

use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use std::time::Duration;

use crate::log;

/// Sentinel meaning "nothing published since process start". Resetting to
/// this on restart guarantees the first observation always publishes.
pub const SENTINEL: i64 = -1;

/// The document pushed to the sink. The sink keeps only the latest value.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedState {
    pub count: i64,
    pub time: String,
    pub source: &'static str,
}

impl PublishedState {
    pub fn now(count: i64) -> Self {
        Self {
            count,
            time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            source: "pc",
        }
    }
}

/// Destination for published states. A trait seam so the change detector
/// is testable without the network.
pub trait StatusSink {
    /// Sends the state. Any failure is reported as `false`, never raised.
    fn push(&self, state: &PublishedState) -> bool;
}

/// Outcome of feeding one observation to the change detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Count equals the last published value; no network call was made.
    Unchanged,
    /// Count changed and the push succeeded.
    Published,
    /// Count changed but the push failed. The value is still recorded as
    /// published, so an identical next observation will not retry.
    PublishFailed,
}

/// Compares each observation against the last published value and pushes
/// only on change.
pub struct ChangeDetector {
    last_published: i64,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self {
            last_published: SENTINEL,
        }
    }

    pub fn last_published(&self) -> i64 {
        self.last_published
    }

    /// Feeds one observed count. On change, `last_published` is updated
    /// before the push is attempted and is not rolled back on failure.
    pub fn on_observation(&mut self, count: u32, sink: &impl StatusSink) -> PublishOutcome {
        let count = count as i64;
        if count == self.last_published {
            return PublishOutcome::Unchanged;
        }

        let previous = self.last_published;
        self.last_published = count;

        let state = PublishedState::now(count);
        if sink.push(&state) {
            log(&format!("Published order count: {} → {}", previous, count));
            PublishOutcome::Published
        } else {
            log(&format!(
                "Publish failed for count {} (was {}); will not retry until the count changes",
                count, previous
            ));
            PublishOutcome::PublishFailed
        }
    }
}

/// Publishes by PATCHing a fixed GitHub Gist document.
pub struct GistSink {
    client: reqwest::blocking::Client,
    url: String,
    token: String,
}

impl GistSink {
    pub fn new(gist_id: &str, token: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("pos-order-monitor")
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: format!("https://api.github.com/gists/{}", gist_id),
            token: token.to_string(),
        })
    }
}

impl StatusSink for GistSink {
    fn push(&self, state: &PublishedState) -> bool {
        let content = match serde_json::to_string(state) {
            Ok(c) => c,
            Err(e) => {
                log(&format!("Failed to serialize published state: {}", e));
                return false;
            }
        };
        let body = serde_json::json!({
            "files": {
                "order_status.json": { "content": content }
            }
        });

        let response = self
            .client
            .patch(&self.url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .json(&body)
            .send();

        match response {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => true,
            Ok(resp) => {
                log(&format!("Gist update rejected: HTTP {}", resp.status()));
                false
            }
            Err(e) => {
                log(&format!("Gist update network error: {}", e));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records every pushed count; optionally fails every push.
    struct RecordingSink {
        pushed: RefCell<Vec<i64>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Self {
            Self {
                pushed: RefCell::new(Vec::new()),
                fail,
            }
        }
    }

    impl StatusSink for RecordingSink {
        fn push(&self, state: &PublishedState) -> bool {
            self.pushed.borrow_mut().push(state.count);
            !self.fail
        }
    }

    #[test]
    fn test_first_observation_always_publishes() {
        // The sentinel resets on process restart, so the first observation
        // publishes even if the sink already holds the same count.
        let mut detector = ChangeDetector::new();
        let sink = RecordingSink::new(false);
        assert_eq!(detector.on_observation(0, &sink), PublishOutcome::Published);
        assert_eq!(*sink.pushed.borrow(), vec![0]);
    }

    #[test]
    fn test_same_count_twice_makes_one_network_call() {
        let mut detector = ChangeDetector::new();
        let sink = RecordingSink::new(false);
        detector.on_observation(3, &sink);
        assert_eq!(detector.on_observation(3, &sink), PublishOutcome::Unchanged);
        assert_eq!(sink.pushed.borrow().len(), 1);
    }

    #[test]
    fn test_changed_count_publishes_again() {
        let mut detector = ChangeDetector::new();
        let sink = RecordingSink::new(false);
        detector.on_observation(3, &sink);
        detector.on_observation(5, &sink);
        assert_eq!(*sink.pushed.borrow(), vec![3, 5]);
    }

    #[test]
    fn test_publish_failure_does_not_roll_back() {
        let mut detector = ChangeDetector::new();
        let sink = RecordingSink::new(true);
        assert_eq!(
            detector.on_observation(4, &sink),
            PublishOutcome::PublishFailed
        );
        assert_eq!(detector.last_published(), 4);

        // The identical next observation must not retry the failed push.
        assert_eq!(detector.on_observation(4, &sink), PublishOutcome::Unchanged);
        assert_eq!(sink.pushed.borrow().len(), 1);
    }

    #[test]
    fn test_published_state_shape() {
        let state = PublishedState::now(7);
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();
        assert_eq!(json["count"], 7);
        assert_eq!(json["source"], "pc");
        // "YYYY-MM-DD HH:MM:SS"
        assert_eq!(json["time"].as_str().unwrap().len(), 19);
    }
}
