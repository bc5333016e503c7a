//! Service layer API for shift registration and trading
use super::config::ServiceConfig;
use super::error::{StoreError, TradeError};
use super::executor::{SwapExecutor, TradeOutcome};
use super::matcher::Matcher;
use super::session::SessionGate;
use super::shift::{
    EmployeeId, NewShift, Shift, ShiftDate, ShiftId, ShiftUpdate, TimeSlot, WantedSlots,
};
use super::store::{ShiftRead, ShiftStore, ShiftWrite};
use sled::transaction::ConflictableTransactionError;
use std::collections::HashMap;
use std::sync::Arc;

/// Number of advertised shifts per slot on one date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfferCounts {
    pub early: usize,
    pub late: usize,
    pub night: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftOverview {
    pub shift: Shift,
    pub offers: OfferCounts,
}

impl OfferCounts {
    pub fn for_slot(&self, slot: TimeSlot) -> usize {
        match slot {
            TimeSlot::Early => self.early,
            TimeSlot::Late => self.late,
            TimeSlot::Night => self.night,
        }
    }
    fn bump(&mut self, slot: TimeSlot) {
        match slot {
            TimeSlot::Early => self.early += 1,
            TimeSlot::Late => self.late += 1,
            TimeSlot::Night => self.night += 1,
        }
    }
}

pub struct ShiftService {
    instance: Arc<sled::Db>,
    store: ShiftStore,
    executor: SwapExecutor,
}

impl ShiftService {
    pub fn new(instance: Arc<sled::Db>, config: &ServiceConfig) -> Result<Self, TradeError> {
        let store = ShiftStore::open(
            &instance,
            &config.storage.tree,
            config.storage.flush_on_commit,
        )?;
        let executor = SwapExecutor::new(Matcher::new(config.matching.policy));

        tracing::info!(
            tree = %config.storage.tree,
            policy = ?config.matching.policy,
            "shift service ready"
        );
        Ok(Self {
            instance,
            store,
            executor,
        })
    }

    /// Opens the database described by `config` and builds the service on it.
    pub fn open(config: &ServiceConfig) -> Result<Self, TradeError> {
        let db = config.open_db().map_err(StoreError::from)?;
        Self::new(Arc::new(db), config)
    }

    pub fn store(&self) -> &ShiftStore {
        &self.store
    }

    pub fn executor(&self) -> &SwapExecutor {
        &self.executor
    }

    /// Flushes pending writes of the whole database.
    pub fn flush(&self) -> Result<(), TradeError> {
        self.instance.flush().map_err(StoreError::from)?;
        Ok(())
    }

    /// Maps a session token to the caller's identity.
    pub fn authenticate<G>(&self, gate: &G, token: &str) -> Result<EmployeeId, TradeError>
    where
        G: SessionGate + ?Sized,
    {
        gate.resolve(token).ok_or(TradeError::Unauthenticated)
    }

    /// Registers a new shift for `owner`, not offered for trade.
    pub fn create_shift(&self, owner: &EmployeeId, draft: &NewShift) -> Result<Shift, TradeError> {
        let attributes = draft.validate_and_finalise()?;

        let shift = Shift {
            id: ShiftId::generate()?,
            owner: owner.clone(),
            date: attributes.date,
            slot: attributes.slot,
            weekday: attributes.weekday,
            trade: false,
            wanted: WantedSlots::empty(),
        };
        self.store.transaction(|tx| Ok(tx.upsert(&shift)?))?;

        tracing::info!(
            shift_id = %shift.id,
            owner = %shift.owner,
            date = %shift.date,
            "shift created"
        );
        Ok(shift)
    }

    pub fn get_shift(&self, id: &ShiftId) -> Result<Shift, TradeError> {
        self.store
            .get_by_id(id)?
            .ok_or_else(|| TradeError::NotFound(id.clone()))
    }

    /// Removes a shift owned by `caller`, advertised or not.
    pub fn delete_shift(&self, caller: &EmployeeId, id: &ShiftId) -> Result<(), TradeError> {
        self.store.transaction(|tx| {
            let Some(shift) = tx.get_by_id(id)? else {
                return Err(ConflictableTransactionError::Abort(TradeError::NotFound(
                    id.clone(),
                )));
            };
            if shift.owner != *caller {
                return Err(ConflictableTransactionError::Abort(TradeError::NotOwner {
                    shift: id.clone(),
                    caller: caller.clone(),
                }));
            }
            tx.delete(id)?;
            Ok(())
        })?;

        tracing::info!(shift_id = %id, owner = %caller, "shift deleted");
        Ok(())
    }

    /// Shifts of `owner` with the number of open offers per slot on each date.
    pub fn list_for_owner(&self, owner: &EmployeeId) -> Result<Vec<ShiftOverview>, TradeError> {
        let shifts = self.store.list_all()?;

        let mut offers: HashMap<ShiftDate, OfferCounts> = HashMap::new();
        for shift in shifts.iter().filter(|s| s.trade) {
            offers.entry(shift.date).or_default().bump(shift.slot);
        }

        Ok(shifts
            .into_iter()
            .filter(|s| s.owner == *owner)
            .map(|shift| ShiftOverview {
                offers: offers.get(&shift.date).copied().unwrap_or_default(),
                shift,
            })
            .collect())
    }

    /// Updates a shift and trades it away when a counter-offer exists.
    ///
    /// Returns the requesting shift as stored after the operation.
    pub fn update_shift(
        &self,
        caller: &EmployeeId,
        update: &ShiftUpdate,
    ) -> Result<Shift, TradeError> {
        Ok(self.submit_update(caller, update)?.into_shift())
    }

    /// Like [`ShiftService::update_shift`] but reports the counter-shift of a swap too.
    pub fn submit_update(
        &self,
        caller: &EmployeeId,
        update: &ShiftUpdate,
    ) -> Result<TradeOutcome, TradeError> {
        let update = update.validate_and_finalise()?;

        let outcome = self
            .store
            .transaction(|tx| self.executor.apply(tx, &update, caller))
            .inspect_err(|err| {
                tracing::warn!(
                    shift_id = %update.id,
                    caller = %caller,
                    error = %err,
                    "shift update rolled back"
                );
            })?;

        match &outcome {
            TradeOutcome::Swapped { shift, counter } => tracing::info!(
                shift_id = %shift.id,
                counter_id = %counter.id,
                new_owner = %shift.owner,
                counter_owner = %counter.owner,
                date = %shift.date,
                "shift swapped"
            ),
            TradeOutcome::Updated(shift) => tracing::debug!(
                shift_id = %shift.id,
                trade = shift.trade,
                "shift updated without match"
            ),
        }
        Ok(outcome)
    }
}
