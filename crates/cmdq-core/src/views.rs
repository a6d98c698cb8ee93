//! Derived read views over the cached command list
//!
//! Each view is a filter followed by a newest-first sort on `created_at`,
//! capped to the most recent `limit` matches. Records reach this layer only
//! after the store's fallible parse, so views never fail.

use crate::model::{CommandRecord, CommandStatus};

pub const DEFAULT_VIEW_LIMIT: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueView {
    /// In the pipeline and healthy
    Processing,
    Completed,
    /// Failed, flagged, or awaiting confirmation
    Review,
    All,
}

impl QueueView {
    pub fn matches(&self, record: &CommandRecord) -> bool {
        match self {
            QueueView::Processing => {
                !record.failed
                    && !record.action_needed
                    && !matches!(
                        record.status,
                        CommandStatus::Completed | CommandStatus::ManualReview
                    )
            }
            QueueView::Completed => record.status == CommandStatus::Completed,
            QueueView::Review => record.needs_attention(),
            QueueView::All => true,
        }
    }

    /// Project `records` through this view
    pub fn project(&self, records: &[CommandRecord], limit: usize) -> Vec<CommandRecord> {
        let mut matching: Vec<&CommandRecord> =
            records.iter().filter(|r| self.matches(r)).collect();
        // Ties broken by id so the order is deterministic
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        matching.into_iter().take(limit).cloned().collect()
    }
}
