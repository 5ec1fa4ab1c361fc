use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::FormatOperation;

pub type TabId = String;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("RateLimited: {0}")]
    RateLimited(String),
    #[error("NotFound: {0}")]
    NotFound(String),
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl SinkError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SinkError::RateLimited(_))
    }
}

/// A remote document made of tabs that accepts text inserts and range styling.
/// Offsets are character positions; a fresh tab's content starts at offset 1.
pub trait DocumentSink {
    fn create_document(&mut self, title: &str) -> Result<String, SinkError>;
    fn list_tabs(&self) -> Result<Vec<TabId>, SinkError>;
    fn add_tab(&mut self, title: &str) -> Result<TabId, SinkError>;
    fn delete_tab(&mut self, tab: &TabId) -> Result<(), SinkError>;
    /// Insert `text` at `offset`; returns the tab's new end-of-content offset.
    fn insert_text(&mut self, tab: &TabId, offset: usize, text: &str) -> Result<usize, SinkError>;
    fn apply(&mut self, tab: &TabId, op: &FormatOperation) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { max_attempts: 5, base_delay_ms: 2000, max_delay_ms: 60_000 }
    }
}

impl RetryPolicy {
    /// Wait before retrying after the 0-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

/// Run `op`, retrying rate-limit failures with capped exponential backoff.
/// Any other failure, or the last rate-limit failure, is returned as is.
pub fn execute_with_retry<T, F>(policy: &RetryPolicy, mut op: F) -> Result<T, SinkError>
where
    F: FnMut() -> Result<T, SinkError>,
{
    let mut attempt = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                let wait = policy.delay_for(attempt);
                log::warn!("rate limited ({}); waiting {}s", e, wait.as_secs_f64());
                std::thread::sleep(wait);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTab {
    pub id: TabId,
    pub title: String,
    /// Tab content without the implicit trailing newline.
    pub text: String,
    pub operations: Vec<FormatOperation>,
}

impl PlanTab {
    /// Offset just past the implicit trailing newline.
    pub fn end_offset(&self) -> usize {
        self.text.chars().count() + 2
    }
}

/// In-memory document sink. Records every mutation so the result can be
/// inspected or written out as a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSink {
    pub document_id: Option<String>,
    pub title: String,
    pub tabs: Vec<PlanTab>,
    #[serde(skip)]
    next_tab: u32,
}

impl PlanSink {
    pub fn new() -> Self {
        PlanSink::default()
    }

    pub fn tab(&self, id: &str) -> Option<&PlanTab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    fn tab_mut(&mut self, id: &str) -> Result<&mut PlanTab, SinkError> {
        self.tabs
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| SinkError::NotFound(format!("tab {}", id)))
    }

    fn push_tab(&mut self, title: &str) -> TabId {
        self.next_tab += 1;
        let id = format!("t.{}", self.next_tab);
        self.tabs.push(PlanTab { id: id.clone(), title: title.to_string(), text: String::new(), operations: Vec::new() });
        id
    }

    fn require_document(&self) -> Result<(), SinkError> {
        match self.document_id {
            Some(_) => Ok(()),
            None => Err(SinkError::NotFound("no document created".into())),
        }
    }
}

impl DocumentSink for PlanSink {
    fn create_document(&mut self, title: &str) -> Result<String, SinkError> {
        let id = format!("plan-{}", crate::sha256_hex(title.as_bytes()).get(..12).unwrap_or_default());
        self.document_id = Some(id.clone());
        self.title = title.to_string();
        self.tabs.clear();
        self.push_tab("Tab 1");
        Ok(id)
    }

    fn list_tabs(&self) -> Result<Vec<TabId>, SinkError> {
        self.require_document()?;
        Ok(self.tabs.iter().map(|t| t.id.clone()).collect())
    }

    fn add_tab(&mut self, title: &str) -> Result<TabId, SinkError> {
        self.require_document()?;
        Ok(self.push_tab(title))
    }

    fn delete_tab(&mut self, tab: &TabId) -> Result<(), SinkError> {
        self.require_document()?;
        if self.tabs.len() <= 1 {
            return Err(SinkError::Rejected("cannot delete the last tab".into()));
        }
        let idx = self
            .tabs
            .iter()
            .position(|t| &t.id == tab)
            .ok_or_else(|| SinkError::NotFound(format!("tab {}", tab)))?;
        self.tabs.remove(idx);
        Ok(())
    }

    fn insert_text(&mut self, tab: &TabId, offset: usize, text: &str) -> Result<usize, SinkError> {
        let t = self.tab_mut(tab)?;
        let len = t.text.chars().count();
        if offset < 1 || offset > len + 1 {
            return Err(SinkError::Rejected(format!("insert offset {} outside 1..={}", offset, len + 1)));
        }
        let byte_idx = t.text.char_indices().nth(offset - 1).map(|(i, _)| i).unwrap_or(t.text.len());
        t.text.insert_str(byte_idx, text);
        Ok(t.end_offset())
    }

    fn apply(&mut self, tab: &TabId, op: &FormatOperation) -> Result<(), SinkError> {
        let t = self.tab_mut(tab)?;
        let end = t.end_offset();
        if op.start < 1 || op.start >= op.end || op.end > end {
            return Err(SinkError::Rejected(format!(
                "{:?} range [{}, {}) outside content [1, {})",
                op.kind, op.start, op.end, end
            )));
        }
        t.operations.push(op.clone());
        Ok(())
    }
}
