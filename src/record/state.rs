//! Storage state of a record instance

use crate::error::{Error, Result};
use std::ops::Deref;

/// Where a record instance stands relative to its persisted copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageState {
    /// New instance, never written
    Created,
    /// Identical to the stored copy
    FromStorage,
    /// Read from storage and changed since
    Modified,
    /// Pending deletion from storage
    Deleted,
}

/// A record paired with its storage state
///
/// Read access goes through `Deref`; mutation goes through [`Stored::modify`]
/// so the state cannot be bypassed.
#[derive(Debug, Clone)]
pub struct Stored<R> {
    record: R,
    state: StorageState,
}

impl<R> Stored<R> {
    pub fn new(record: R) -> Self {
        Self {
            record,
            state: StorageState::Created,
        }
    }

    pub fn from_storage(record: R) -> Self {
        Self {
            record,
            state: StorageState::FromStorage,
        }
    }

    pub fn state(&self) -> StorageState {
        self.state
    }

    /// True when the in-memory copy differs from storage
    pub fn is_dirty(&self) -> bool {
        matches!(self.state, StorageState::Created | StorageState::Modified)
    }

    pub fn is_stored(&self) -> bool {
        matches!(self.state, StorageState::FromStorage | StorageState::Modified)
    }

    /// Mutable access; a stored record becomes modified
    pub fn modify(&mut self) -> Result<&mut R> {
        match self.state {
            StorageState::Deleted => Err(Error::logic("cannot modify a record pending deletion")),
            StorageState::FromStorage => {
                self.state = StorageState::Modified;
                Ok(&mut self.record)
            }
            StorageState::Created | StorageState::Modified => Ok(&mut self.record),
        }
    }

    /// Fails unless the record may be written
    pub fn check_storable(&self) -> Result<()> {
        if self.state == StorageState::Deleted {
            return Err(Error::logic("cannot store a record pending deletion"));
        }
        Ok(())
    }

    /// Fails unless the record exists in storage
    pub fn check_deletable(&self) -> Result<()> {
        match self.state {
            StorageState::FromStorage | StorageState::Modified => Ok(()),
            StorageState::Created => Err(Error::logic("cannot delete a record that was never stored")),
            StorageState::Deleted => Err(Error::logic("record is already pending deletion")),
        }
    }

    /// Record a successful write
    pub fn mark_stored(&mut self) -> Result<()> {
        self.check_storable()?;
        self.state = StorageState::FromStorage;
        Ok(())
    }

    /// Only records that exist in storage can be deleted from it
    pub fn mark_deleted(&mut self) -> Result<()> {
        self.check_deletable()?;
        self.state = StorageState::Deleted;
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.record
    }
}

impl<R> Deref for Stored<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.record
    }
}
