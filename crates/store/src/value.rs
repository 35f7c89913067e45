//! Dynamically typed values and type-directed copy.

use serde::{Serialize, de::DeserializeOwned};
use statekeep_persist::{PersistError, codec};
use std::any::{Any, type_name};

use crate::StateError;

/// Anything the store can hold: cloneable into receivers and encodable for
/// persistence.
pub trait StateValue: Any + Clone + Serialize + DeserializeOwned {}

impl<T> StateValue for T where T: Any + Clone + Serialize + DeserializeOwned {}

/// Object-safe view of a [`StateValue`].
pub trait StoredValue: Any {
    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str;

    fn encode(&self) -> Result<Vec<u8>, PersistError>;
}

impl<T: StateValue> StoredValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn encode(&self) -> Result<Vec<u8>, PersistError> {
        codec::encode(self)
    }
}

/// The value held by an entry.
#[derive(Default)]
pub enum Slot {
    /// Nothing stored yet; the entry exists only for its observers.
    #[default]
    Unset,
    /// An explicitly empty value. Receivers are reset to their default.
    Empty,
    Value(Box<dyn StoredValue>),
}

impl Slot {
    pub fn new<T: StateValue>(value: T) -> Self {
        Self::Value(Box::new(value))
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Empty => "empty",
            Self::Value(v) => v.type_name(),
        }
    }

    /// Codec form for persistence. `None` stands for the empty value.
    pub fn encode(&self) -> Result<Option<Vec<u8>>, PersistError> {
        match self {
            Self::Unset | Self::Empty => Ok(None),
            Self::Value(v) => v.encode().map(Some),
        }
    }

    /// Rebuild a slot from a persisted payload, typed by the reader.
    pub fn decode<T: StateValue>(payload: Option<&[u8]>) -> Result<Self, PersistError> {
        match payload {
            None => Ok(Self::Empty),
            Some(bytes) => Ok(Self::new(codec::decode::<T>(bytes)?)),
        }
    }

    /// Copy into `dest` when the stored type is exactly `T`.
    ///
    /// An empty slot writes `T::default()` (so `Option<_>` receivers become
    /// `None`). A mismatch or an unset slot leaves `dest` untouched. There is
    /// no unwrapping across indirection: a stored `Box<T>` or `Option<T>` does
    /// not fill a `T` receiver.
    pub fn copy_into<T: StateValue + Default>(&self, dest: &mut T) -> Result<(), StateError> {
        match self {
            Self::Unset => Err(StateError::NotFound),
            Self::Empty => {
                *dest = T::default();
                Ok(())
            }
            Self::Value(v) => match v.as_any().downcast_ref::<T>() {
                Some(value) => {
                    dest.clone_from(value);
                    Ok(())
                }
                None => Err(StateError::TypeMismatch {
                    expected: type_name::<T>(),
                    found: v.type_name(),
                }),
            },
        }
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unset => f.write_str("Unset"),
            Self::Empty => f.write_str("Empty"),
            Self::Value(v) => write!(f, "Value({})", v.type_name()),
        }
    }
}
