#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use dataflow_verify::logs::{LogFetcher, LogTarget};
use dataflow_verify::types::BoxFuture;

/// `LogFetcher` serving scripted log text per source id.
///
/// Like a platform, every fetch returns the whole log. Each fetch moves to
/// the next scripted text; the last one sticks. A source with nothing
/// scripted fails to fetch.
#[derive(Clone, Default)]
pub struct FakeLogFetcher {
    logs: Arc<Mutex<HashMap<String, VecDeque<Result<String, String>>>>>,
    fetched: Arc<Mutex<Vec<LogTarget>>>,
}

impl FakeLogFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next full log of `source_id` (`"app"` or `"app/instance"`).
    pub fn push(&self, source_id: &str, text: &str) {
        self.logs
            .lock()
            .unwrap()
            .entry(source_id.to_string())
            .or_default()
            .push_back(Ok(text.to_string()));
    }

    pub fn push_error(&self, source_id: &str, message: &str) {
        self.logs
            .lock()
            .unwrap()
            .entry(source_id.to_string())
            .or_default()
            .push_back(Err(message.to_string()));
    }

    /// Every target fetched so far, in order.
    pub fn fetched(&self) -> Vec<LogTarget> {
        self.fetched.lock().unwrap().clone()
    }
}

impl LogFetcher for FakeLogFetcher {
    fn fetch<'a>(&'a self, target: &'a LogTarget) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(async move {
            self.fetched.lock().unwrap().push(target.clone());
            let source_id = target.source_id();
            let mut logs = self.logs.lock().unwrap();
            let queue = logs
                .get_mut(&source_id)
                .ok_or_else(|| anyhow!("no log scripted for '{source_id}'"))?;
            let next = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            match next {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(anyhow!(message)),
                None => Err(anyhow!("no log scripted for '{source_id}'")),
            }
        })
    }
}
