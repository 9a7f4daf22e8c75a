//! Recurring autopost tasks.
//!
//! Tasks live only in this process. Each one owns a cancel channel and is
//! stopped at its next suspension point.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use warden_common::constants::{MAX_AUTOPOST_INTERVAL_MINUTES, MIN_AUTOPOST_INTERVAL_MINUTES};
use warden_common::{ChatFeature, WardenError};

use super::Broadcaster;
use crate::transport::{ChatTarget, Payload};

const INTERVAL_HINT: &str = "Interval must be <n>m, <n>h or <n> (hours), from 1 minute to 1 year. \
Example: /autoposting 2h t.me/chat1, @chat2";

/// Time between autopost cycles, in whole minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AutopostInterval {
    minutes: u64,
}

impl AutopostInterval {
    pub fn from_minutes(minutes: u64) -> Result<Self, WardenError> {
        if !(MIN_AUTOPOST_INTERVAL_MINUTES..=MAX_AUTOPOST_INTERVAL_MINUTES).contains(&minutes) {
            return Err(WardenError::InvalidInput(INTERVAL_HINT.to_string()));
        }
        Ok(Self { minutes })
    }

    pub fn minutes(&self) -> u64 {
        self.minutes
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.minutes.saturating_mul(60))
    }
}

impl FromStr for AutopostInterval {
    type Err = WardenError;

    /// `<n>m`, `<n>h`, or bare `<n>` meaning hours
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let invalid = || WardenError::InvalidInput(INTERVAL_HINT.to_string());

        let (digits, per_unit) = if let Some(n) = s.strip_suffix('m') {
            (n, 1)
        } else if let Some(n) = s.strip_suffix('h') {
            (n, 60)
        } else {
            (s.as_str(), 60)
        };

        let n: u64 = digits.trim().parse().map_err(|_| invalid())?;
        let minutes = n.checked_mul(per_unit).ok_or_else(invalid)?;
        Self::from_minutes(minutes)
    }
}

impl std::fmt::Display for AutopostInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.minutes % 60 == 0 {
            write!(f, "{} h", self.minutes / 60)
        } else {
            write!(f, "{} min", self.minutes)
        }
    }
}

/// Normalize a chat reference: `https://t.me/name`, `t.me/name`, `@name`, or a numeric id
pub fn normalize_target(raw: &str) -> Option<ChatTarget> {
    let mut name = raw.trim();
    for prefix in ["https://t.me/", "http://t.me/", "t.me/"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest;
        }
    }
    let name = name.trim_start_matches('@').trim();

    if name.is_empty() {
        return None;
    }
    match name.parse::<i64>() {
        Ok(id) => Some(ChatTarget::Id(id)),
        Err(_) => Some(ChatTarget::Username(name.to_string())),
    }
}

/// Comma-separated chat list; blank entries are dropped
pub fn parse_targets(list: &str) -> Vec<ChatTarget> {
    list.split(',').filter_map(normalize_target).collect()
}

/// Where a task posts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    Explicit(Vec<ChatTarget>),
    /// Every registered chat with autoposting on, re-read each cycle
    AllEnabled,
}

impl std::fmt::Display for Targets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllEnabled => write!(f, "all chats"),
            Self::Explicit(list) => {
                let names: Vec<String> = list.iter().map(ToString::to_string).collect();
                write!(f, "{}", names.join(", "))
            }
        }
    }
}

/// What to post, where, and how often
#[derive(Debug, Clone)]
pub struct AutopostSpec {
    pub payload: Payload,
    pub interval: AutopostInterval,
    pub targets: Targets,
}

/// Listing entry for a running task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutopostInfo {
    pub id: String,
    pub name: String,
    pub interval_minutes: u64,
    pub targets: String,
    pub started_at: DateTime<Utc>,
}

struct AutopostTask {
    info: AutopostInfo,
    cancel: oneshot::Sender<()>,
}

/// Running autopost tasks, oldest first
pub struct AutopostRegistry {
    broadcaster: Arc<Broadcaster>,
    tasks: Mutex<Vec<AutopostTask>>,
}

impl AutopostRegistry {
    pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            broadcaster,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn a task; the first cycle runs immediately
    pub fn start(&self, spec: AutopostSpec) -> AutopostInfo {
        let info = AutopostInfo {
            id: generate_task_id(),
            name: spec.payload.label(),
            interval_minutes: spec.interval.minutes(),
            targets: spec.targets.to_string(),
            started_at: Utc::now(),
        };

        let (cancel_tx, cancel_rx) = oneshot::channel();
        tokio::spawn(run_task(
            self.broadcaster.clone(),
            spec,
            info.id.clone(),
            cancel_rx,
        ));

        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(AutopostTask {
                info: info.clone(),
                cancel: cancel_tx,
            });
        }

        tracing::info!(
            task_id = %info.id,
            name = %info.name,
            interval_minutes = info.interval_minutes,
            targets = %info.targets,
            "📣 Autopost started"
        );
        info
    }

    pub fn list(&self) -> Vec<AutopostInfo> {
        self.tasks
            .lock()
            .map(|tasks| tasks.iter().map(|t| t.info.clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cancel(&self, id: &str) -> Option<AutopostInfo> {
        self.remove_where(|tasks| tasks.iter().position(|t| t.info.id == id))
    }

    /// Cancel by 1-based position in the listing
    pub fn cancel_at(&self, position: usize) -> Option<AutopostInfo> {
        self.remove_where(|tasks| {
            (1..=tasks.len()).contains(&position).then(|| position - 1)
        })
    }

    /// Cancel the newest task
    pub fn cancel_last(&self) -> Option<AutopostInfo> {
        self.remove_where(|tasks| tasks.len().checked_sub(1))
    }

    /// Returns how many tasks were stopped
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<AutopostTask> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(_) => return 0,
        };
        let count = drained.len();
        for task in drained {
            stop(task);
        }
        count
    }

    fn remove_where<F>(&self, find: F) -> Option<AutopostInfo>
    where
        F: FnOnce(&[AutopostTask]) -> Option<usize>,
    {
        let task = {
            let mut tasks = self.tasks.lock().ok()?;
            let index = find(&tasks)?;
            tasks.remove(index)
        };
        let info = task.info.clone();
        stop(task);
        Some(info)
    }
}

fn stop(task: AutopostTask) {
    // The receiver is gone if the task already ended
    let _ = task.cancel.send(());
    tracing::info!(task_id = %task.info.id, name = %task.info.name, "Autopost cancelled");
}

/// Generate a random task id
fn generate_task_id() -> String {
    let mut bytes = [0u8; 8];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

async fn run_task(
    broadcaster: Arc<Broadcaster>,
    spec: AutopostSpec,
    task_id: String,
    mut cancel: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut cancel => break,
            sent = run_cycle(&broadcaster, &spec) => {
                tracing::debug!(task_id = %task_id, sent, "Autopost cycle done");
            }
        }

        tokio::select! {
            _ = &mut cancel => break,
            _ = tokio::time::sleep(spec.interval.as_duration()) => {}
        }
    }

    tracing::debug!(task_id = %task_id, "Autopost task stopped");
}

async fn run_cycle(broadcaster: &Broadcaster, spec: &AutopostSpec) -> usize {
    let targets = match &spec.targets {
        Targets::Explicit(list) => list.clone(),
        Targets::AllEnabled => match broadcaster
            .registry()
            .with_feature(ChatFeature::Autoposting)
            .await
        {
            Ok(chats) => chats.into_iter().map(|c| ChatTarget::Id(c.chat_id)).collect(),
            Err(e) => {
                tracing::error!(error = %e, "Autopost could not list chats");
                return 0;
            }
        },
    };

    let mut sent = 0;
    for target in &targets {
        if broadcaster.deliver(target, &spec.payload).await {
            sent += 1;
        }
    }
    sent
}

/// Cancel every task once shutdown is signalled
pub async fn autopost_worker(
    registry: Arc<AutopostRegistry>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let _ = shutdown.recv().await;
    let stopped = registry.cancel_all();
    tracing::info!(stopped, "🛑 Autopost tasks stopped");
}
