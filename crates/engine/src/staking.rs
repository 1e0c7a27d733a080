//! Views over the staking reserve's unstaking queue.

use alloy::primitives::U256;
use serde::Serialize;

use lens_common::fixed::{Fix, Rounding};

use crate::collaborators::DraftQueue;

/// A withdrawal a staker is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingUnstaking {
    pub index: u64,
    pub available_at: u64,
    /// Stake tokens, 18 decimals.
    pub amount: U256,
}

/// Stake tokens per draft entry from the first one not yet withdrawn.
///
/// Entries store cumulative drafts, so each amount is the difference to the
/// previous entry divided by the draft rate.
pub fn pending_unstakings(queue: &DraftQueue) -> Vec<PendingUnstaking> {
    let start = usize::try_from(queue.first_remaining).unwrap_or(usize::MAX);

    queue
        .entries
        .iter()
        .enumerate()
        .skip(start)
        .map(|(index, entry)| {
            let previous = match index {
                0 => Fix::ZERO,
                _ => queue.entries[index - 1].cumulative_drafts,
            };
            let drafts = entry.cumulative_drafts.saturating_sub(previous);
            let amount = drafts
                .div(queue.draft_rate, Rounding::Ceil)
                .unwrap_or(Fix::ZERO);
            PendingUnstaking {
                index: index as u64,
                available_at: entry.available_at,
                amount: amount.raw(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::DraftEntry;

    fn queue(first_remaining: u64, draft_rate: Fix) -> DraftQueue {
        DraftQueue {
            first_remaining,
            entries: vec![
                DraftEntry { cumulative_drafts: Fix::from_int(10), available_at: 100 },
                DraftEntry { cumulative_drafts: Fix::from_int(25), available_at: 200 },
                DraftEntry { cumulative_drafts: Fix::from_int(30), available_at: 300 },
            ],
            draft_rate,
        }
    }

    #[test]
    fn test_amounts_are_differences_of_cumulative_drafts() {
        let pending = pending_unstakings(&queue(0, Fix::ONE));
        let amounts: Vec<_> = pending.iter().map(|p| Fix::from_raw(p.amount)).collect();
        assert_eq!(amounts, vec![Fix::from_int(10), Fix::from_int(15), Fix::from_int(5)]);
        assert_eq!(pending[2].available_at, 300);
    }

    #[test]
    fn test_withdrawn_entries_are_skipped() {
        let pending = pending_unstakings(&queue(2, Fix::ONE));
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].index, 2);
        assert_eq!(Fix::from_raw(pending[0].amount), Fix::from_int(5));
    }

    #[test]
    fn test_draft_rate_scales_amounts() {
        let pending = pending_unstakings(&queue(0, Fix::from_int(2)));
        assert_eq!(Fix::from_raw(pending[0].amount), Fix::from_int(5));
    }

    #[test]
    fn test_zero_draft_rate_yields_zero() {
        let pending = pending_unstakings(&queue(0, Fix::ZERO));
        assert!(pending.iter().all(|p| p.amount.is_zero()));
    }
}
