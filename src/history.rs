use crate::gateway::AnalysisSummary;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Where a verification result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistorySource {
    /// Triggered by the live capture loop
    Live,
    /// Delivered by a queue flush
    Offline,
}

/// One verification outcome as shown in a host's scan history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub match_score: f32,
    pub tamper_risk: f32,
    pub confidence: String,
    pub source: HistorySource,
}

/// Bounded in-memory log of verification outcomes, newest first.
#[derive(Debug)]
pub struct ScanHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl ScanHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a verification result; the oldest entry gives way once full.
    pub fn record(&mut self, summary: &AnalysisSummary, source: HistorySource) -> &HistoryEntry {
        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            match_score: summary.match_score,
            tamper_risk: summary.tamper_risk_score,
            confidence: summary.confidence_band.clone(),
            source,
        };

        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
        &self.entries[0]
    }

    /// Entries newest first.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
