//! Applies a shift update and, when a counter-offer exists, the owner swap
use super::error::TradeError;
use super::matcher::Matcher;
use super::shift::{EmployeeId, Shift, ValidatedUpdate};
use super::store::{ShiftWrite, TxResult};
use sled::transaction::ConflictableTransactionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeOutcome {
    /// The update was stored, no counter-offer was taken.
    Updated(Shift),
    /// The update matched `counter`, both shifts changed owner.
    Swapped { shift: Shift, counter: Shift },
}

impl TradeOutcome {
    /// Final state of the requesting shift.
    pub fn shift(&self) -> &Shift {
        match self {
            TradeOutcome::Updated(shift) => shift,
            TradeOutcome::Swapped { shift, .. } => shift,
        }
    }

    pub fn into_shift(self) -> Shift {
        match self {
            TradeOutcome::Updated(shift) => shift,
            TradeOutcome::Swapped { shift, .. } => shift,
        }
    }

    pub fn is_swap(&self) -> bool {
        matches!(self, TradeOutcome::Swapped { .. })
    }
}

fn abort<T>(err: TradeError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SwapExecutor {
    matcher: Matcher,
}

impl SwapExecutor {
    pub fn new(matcher: Matcher) -> Self {
        Self { matcher }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Runs the update inside an already open transaction.
    ///
    /// Every write goes through `tx`; the caller commits or discards them as a
    /// whole, so an error returned from any step leaves the table untouched.
    pub fn apply<S>(
        &self,
        tx: &S,
        update: &ValidatedUpdate,
        caller: &EmployeeId,
    ) -> TxResult<TradeOutcome>
    where
        S: ShiftWrite + ?Sized,
    {
        let Some(current) = tx.get_by_id(&update.id)? else {
            return abort(TradeError::NotFound(update.id.clone()));
        };
        if current.owner != *caller {
            return abort(TradeError::NotOwner {
                shift: current.id,
                caller: caller.clone(),
            });
        }
        if let Some(expected) = &update.expected_revision {
            let revision = current.revision().map_err(TradeError::Internal);
            match revision {
                Ok(revision) if revision == *expected => {}
                Ok(_) => {
                    return abort(TradeError::Conflict(format!(
                        "shift {} changed since it was read",
                        current.id
                    )));
                }
                Err(err) => return abort(err),
            }
        }

        let updated = current.with_update(update);
        tx.upsert(&updated)?;

        let Some(counter_id) = self.matcher.find_counter_offer(tx, &updated)? else {
            return Ok(TradeOutcome::Updated(updated));
        };

        // re-read the partner row before claiming it
        let Some(counter) = tx.get_by_id(&counter_id)? else {
            return abort(TradeError::NotFound(counter_id));
        };
        if !self.matcher.is_counter_offer(&updated, &counter) {
            return abort(TradeError::Conflict(format!(
                "counter-offer {counter_id} was withdrawn"
            )));
        }

        let original_owner = current.owner;

        let mut shift = updated;
        shift.owner = counter.owner.clone();
        shift.clear_trade();
        tx.upsert(&shift)?;

        let mut counter = counter;
        counter.owner = original_owner;
        counter.clear_trade();
        tx.upsert(&counter)?;

        Ok(TradeOutcome::Swapped { shift, counter })
    }
}
