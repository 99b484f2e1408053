//! Ownership hook that makes a type visible to the census

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use super::{registry, ObjectId, TypeKey};

/// Registration token embedded in a tracked type
///
/// Creating a `Tracked<T>` records one live object of type `T` with the
/// thread's registry; dropping it releases the record. The reported size
/// is the shallow size of `T`.
///
/// The handle is `!Send`: an object must die on the thread that counted it.
pub struct Tracked<T: 'static> {
    id: ObjectId,
    _owner: PhantomData<fn() -> T>,
    _local: PhantomData<Rc<()>>,
}

impl<T: 'static> Tracked<T> {
    /// Register a new instance of `T`
    pub fn new() -> Self {
        Self::with_size(std::mem::size_of::<T>())
    }

    /// Register a new instance of `T` reporting an explicit byte size
    pub fn with_size(size: usize) -> Self {
        Self {
            id: registry::register(TypeKey::of::<T>(), size),
            _owner: PhantomData,
            _local: PhantomData,
        }
    }

    /// Identity of the tracked object
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl<T: 'static> Default for Tracked<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Drop for Tracked<T> {
    fn drop(&mut self) {
        registry::release(self.id);
    }
}

impl<T: 'static> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: 'static> Eq for Tracked<T> {}

impl<T: 'static> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("type", &std::any::type_name::<T>())
            .field("id", &self.id)
            .finish()
    }
}
