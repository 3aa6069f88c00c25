use thiserror::Error;


/// The arena has no room left for an allocation of the requested size.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("arena is full")]
pub struct ArenaFull;

/// An error returned by [`Skiplist::add`](crate::Skiplist::add).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AddError {
    /// An entry with the given key is already present in the skiplist.
    #[error("an entry with this key already exists")]
    RecordExists,
    /// The backing arena has no room left for the new entry.
    #[error(transparent)]
    ArenaFull(#[from] ArenaFull),
}
