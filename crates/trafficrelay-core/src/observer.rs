//! Slice state machine and the observer that receives slice outcomes.

use crate::error::TransportError;
use crate::instance::DeliveryStatus;
use crate::message::Message;
use crate::normalize::NormalizeIssue;

/// Lifecycle of one slice.
///
/// ```text
/// Pending → DeliveredOk   → Acked
/// Pending → DeliveredFail → Requeued
/// Pending → DeliveryError → Requeued
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceState {
    Pending,
    DeliveredOk { status: DeliveryStatus },
    DeliveredFail { status: DeliveryStatus },
    DeliveryError { error: String },
    Acked,
    Requeued,
}

impl SliceState {
    /// State reached once the delivery call returns.
    pub fn delivered(result: &Result<DeliveryStatus, TransportError>) -> Self {
        match result {
            Ok(status) if status.is_ok() => Self::DeliveredOk { status: *status },
            Ok(status) => Self::DeliveredFail { status: *status },
            Err(e) => Self::DeliveryError { error: e.to_string() },
        }
    }

    /// Terminal state that follows a delivery state, if any.
    pub fn resolution(&self) -> Option<Self> {
        match self {
            Self::DeliveredOk { .. } => Some(Self::Acked),
            Self::DeliveredFail { .. } | Self::DeliveryError { .. } => Some(Self::Requeued),
            Self::Pending | Self::Acked | Self::Requeued => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Acked | Self::Requeued)
    }
}

impl std::fmt::Display for SliceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::DeliveredOk { status } => write!(f, "delivered ({status})"),
            Self::DeliveredFail { status } => write!(f, "rejected ({status})"),
            Self::DeliveryError { error } => write!(f, "delivery error: {error}"),
            Self::Acked => write!(f, "acked"),
            Self::Requeued => write!(f, "requeued"),
        }
    }
}

/// What happened to one slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceReport {
    /// Zero-based slice position within the batch.
    pub index: usize,
    pub message_ids: Vec<String>,
    /// Name of the instance the slice was sent to.
    pub instance: String,
    /// `DeliveredOk`, `DeliveredFail` or `DeliveryError`.
    pub delivery: SliceState,
    /// `Acked` or `Requeued`.
    pub outcome: SliceState,
}

/// Receives everything the pipeline recovers from instead of failing.
///
/// All methods default to no-ops.
pub trait DispatchObserver: Send + Sync {
    fn normalize_issue(&self, _slice: usize, _issue: &NormalizeIssue) {}

    fn slice_resolved(&self, _report: &SliceReport) {}

    fn diagnostic_message(&self, _queue: &str, _message: &Message) {}
}

/// Default observer: emits every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DispatchObserver for TracingObserver {
    fn normalize_issue(&self, slice: usize, issue: &NormalizeIssue) {
        tracing::warn!(slice, %issue, "normalization issue");
    }

    fn slice_resolved(&self, report: &SliceReport) {
        let count = report.message_ids.len();
        match &report.delivery {
            SliceState::DeliveredOk { .. } => {
                tracing::info!(
                    slice = report.index,
                    instance = %report.instance,
                    "processed {count} messages successfully"
                );
            }
            SliceState::DeliveredFail { status } => {
                tracing::error!(
                    slice = report.index,
                    instance = %report.instance,
                    status = status.0,
                    "failed to process {count} messages, requeued"
                );
            }
            SliceState::DeliveryError { error } => {
                tracing::error!(
                    slice = report.index,
                    instance = %report.instance,
                    %error,
                    "error sending {count} messages to instance, requeued"
                );
            }
            other => {
                tracing::debug!(slice = report.index, state = %other, "slice resolved");
            }
        }
    }

    fn diagnostic_message(&self, queue: &str, message: &Message) {
        tracing::info!(queue, id = %message.id, body = %message.body, "diagnostic message");
    }
}
