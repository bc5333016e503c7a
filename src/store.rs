//! Sled backed shift table and the transactional view used by the swap executor
use super::error::{StoreError, TradeError};
use super::shift::{Shift, ShiftId};
use sled::IVec;
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree, UnabortableTransactionError,
};

/// Result type of the closure run by [`ShiftStore::transaction`].
pub type TxResult<T> = Result<T, ConflictableTransactionError<TradeError>>;

/// Read access to shift rows.
pub trait ShiftRead {
    fn get_by_id(&self, id: &ShiftId) -> Result<Option<Shift>, StoreError>;
    /// Every stored shift, ascending by id.
    fn list_all(&self) -> Result<Vec<Shift>, StoreError>;
}

pub trait ShiftWrite: ShiftRead {
    fn upsert(&self, shift: &Shift) -> Result<(), StoreError>;
    /// Returns whether a row was removed.
    fn delete(&self, id: &ShiftId) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct ShiftStore {
    tree: sled::Tree,
    flush_on_commit: bool,
}

/// The shift table as seen from inside an open transaction.
pub struct ShiftTx<'a> {
    tx: &'a TransactionalTree,
    keys: &'a [IVec],
}

fn encode(shift: &Shift) -> Result<Vec<u8>, StoreError> {
    minicbor::to_vec(shift).map_err(|e| StoreError::Encode(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Shift, StoreError> {
    Ok(minicbor::decode(bytes)?)
}

impl ShiftStore {
    pub fn open(db: &sled::Db, tree_name: &str, flush_on_commit: bool) -> Result<Self, StoreError> {
        let tree = db.open_tree(tree_name)?;
        Ok(Self {
            tree,
            flush_on_commit,
        })
    }

    /// Runs `f` as one serializable transaction over the shift table.
    ///
    /// Nothing `f` writes is visible outside until it returns `Ok`. An abort,
    /// a storage error or a panic inside `f` discards every staged write. Sled
    /// may run `f` more than once when it detects a conflicting transaction, so
    /// `f` must not have side effects outside the view it is given.
    ///
    /// [`ShiftRead::list_all`] on the view covers the rows that existed when the
    /// transaction started. With `flush_on_commit` the flush is part of the
    /// commit, so an `Ok` result means the writes are durable.
    pub fn transaction<F, T>(&self, f: F) -> Result<T, TradeError>
    where
        F: Fn(&ShiftTx<'_>) -> TxResult<T>,
    {
        // sled holds its commit lock while `f` runs, iterating the plain tree
        // in there would wait on that lock forever
        let keys = self
            .tree
            .iter()
            .keys()
            .collect::<Result<Vec<IVec>, _>>()
            .map_err(StoreError::from)?;

        let result = self.tree.transaction(|tx| {
            let view = ShiftTx { tx, keys: &keys };
            let value = f(&view)?;
            if self.flush_on_commit {
                tx.flush();
            }
            Ok(value)
        });

        result.map_err(|err| match err {
            TransactionError::Abort(err) => {
                tracing::debug!(error = %err, "shift transaction aborted");
                err
            }
            TransactionError::Storage(err) => {
                tracing::warn!(error = %err, "shift transaction failed in storage");
                TradeError::StorageUnavailable(err.to_string())
            }
        })
    }

    /// Stores `shift` exactly as given, without running the matcher.
    ///
    /// For loading fixtures or migrated rows. Offers made through this call are
    /// not matched until their next update, live changes go through
    /// [`ShiftService`](crate::ShiftService).
    pub fn import(&self, shift: &Shift) -> Result<(), StoreError> {
        self.tree.insert(shift.id.as_bytes(), encode(shift)?)?;
        Ok(())
    }
}

impl ShiftRead for ShiftStore {
    fn get_by_id(&self, id: &ShiftId) -> Result<Option<Shift>, StoreError> {
        match self.tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list_all(&self) -> Result<Vec<Shift>, StoreError> {
        self.tree
            .iter()
            .values()
            .map(|value| decode(&value?))
            .collect()
    }
}

impl ShiftRead for ShiftTx<'_> {
    fn get_by_id(&self, id: &ShiftId) -> Result<Option<Shift>, StoreError> {
        match self.tx.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // every row is read through the transaction so it joins the read set and
    // reflects this transaction's own writes
    fn list_all(&self) -> Result<Vec<Shift>, StoreError> {
        let mut shifts = Vec::new();
        for key in self.keys {
            if let Some(bytes) = self.tx.get(key)? {
                shifts.push(decode(&bytes)?);
            }
        }
        Ok(shifts)
    }
}

impl ShiftWrite for ShiftTx<'_> {
    fn upsert(&self, shift: &Shift) -> Result<(), StoreError> {
        self.tx.insert(shift.id.as_bytes(), encode(shift)?)?;
        Ok(())
    }

    fn delete(&self, id: &ShiftId) -> Result<bool, StoreError> {
        Ok(self.tx.remove(id.as_bytes())?.is_some())
    }
}

impl From<UnabortableTransactionError> for StoreError {
    fn from(value: UnabortableTransactionError) -> Self {
        match value {
            UnabortableTransactionError::Conflict => StoreError::Conflict,
            UnabortableTransactionError::Storage(err) => StoreError::Storage(err),
        }
    }
}

// sled retries conflicts itself, so they are handed back instead of aborting
impl From<StoreError> for ConflictableTransactionError<TradeError> {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict => ConflictableTransactionError::Conflict,
            StoreError::Storage(err) => ConflictableTransactionError::Storage(err),
            other => ConflictableTransactionError::Abort(other.into()),
        }
    }
}
