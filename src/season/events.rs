use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::ledger::{LeaderChange, SeasonSummary};
use crate::bridge::{ApprovalReceipt, PendingProposal};
use crate::domain::{PoolId, TickResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

/// Transient, user-facing message (toast)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

/// Everything the season runtime pushes to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum SeasonEvent {
    #[serde(rename = "started")]
    Started { epoch: u64 },
    #[serde(rename = "tick")]
    Tick {
        tick: u64,
        market: BTreeMap<PoolId, f64>,
    },
    #[serde(rename = "rebalance")]
    Rebalance(TickResult),
    #[serde(rename = "leader")]
    NewLeader {
        #[serde(flatten)]
        change: LeaderChange,
        message: String,
    },
    #[serde(rename = "notice")]
    Notice(Notice),
    #[serde(rename = "stopped")]
    Stopped {
        ticks: u64,
        summary: Option<SeasonSummary>,
    },
    #[serde(rename = "reset")]
    Reset,
    #[serde(rename = "proposal")]
    ProposalQueued(PendingProposal),
    #[serde(rename = "proposal_confirmed")]
    ProposalConfirmed(ApprovalReceipt),
    #[serde(rename = "proposal_failed", rename_all = "camelCase")]
    ProposalFailed { agent_id: String, reason: String },
    #[serde(rename = "proposal_dismissed", rename_all = "camelCase")]
    ProposalDismissed { agent_id: String },
}

impl SeasonEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SeasonEvent::Started { .. } => "started",
            SeasonEvent::Tick { .. } => "tick",
            SeasonEvent::Rebalance(_) => "rebalance",
            SeasonEvent::NewLeader { .. } => "leader",
            SeasonEvent::Notice(_) => "notice",
            SeasonEvent::Stopped { .. } => "stopped",
            SeasonEvent::Reset => "reset",
            SeasonEvent::ProposalQueued(_) => "proposal",
            SeasonEvent::ProposalConfirmed(_) => "proposal_confirmed",
            SeasonEvent::ProposalFailed { .. } => "proposal_failed",
            SeasonEvent::ProposalDismissed { .. } => "proposal_dismissed",
        }
    }
}
