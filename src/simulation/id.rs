use std::any::TypeId;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::rc::Rc;

use ahash::{AHashMap, RandomState};

/// A reference counted pointer to an interned identifier. It can be used in hash maps/sets
/// in combination with NoHashHasher, to achieve fast look ups with no randomness involved.
///
/// As this type wraps Rc<UntypedId>, using clone produces a new Rc pointer to the actual id and is
/// the intended way of passing around ids.
///
/// This type uses the newtype pattern to hide the internal representation and to enable
/// implementing IsEnabled for the nohash_hasher crate. Ids of all types live in one
/// thread local store, keyed by the TypeId of their marker type.
pub struct Id<T> {
    _type_marker: PhantomData<T>,
    id: Rc<UntypedId>,
}

impl<T: 'static> Id<T> {
    fn new(untyped_id: Rc<UntypedId>) -> Self {
        Self {
            _type_marker: PhantomData,
            id: untyped_id,
        }
    }

    pub fn internal(&self) -> u64 {
        self.id.internal
    }

    pub fn external(&self) -> &str {
        &self.id.external
    }

    pub fn create(id: &str) -> Self {
        ID_STORE.with(|store| store.borrow_mut().create_id(id))
    }

    pub fn get(internal: u64) -> Self {
        ID_STORE.with(|store| store.borrow().get(internal))
    }

    pub fn get_from_ext(external: &str) -> Self {
        ID_STORE.with(|store| store.borrow().get_from_ext(external))
    }

    /// Looks up an id without creating it. Loaders use this to reject references
    /// to entities which were never defined.
    pub fn try_get_from_ext(external: &str) -> Option<Self> {
        ID_STORE.with(|store| store.borrow().try_get_from_ext(external))
    }
}

/// Mark Id as enabled for the nohash_hasher::NoHashHasher trait
impl<T> nohash_hasher::IsEnabled for Id<T> {}

impl<T> nohash_hasher::IsEnabled for &Id<T> {}

/// PartialEq, Eq, PartialOrd, Ord, and Hash all rely on the internal id alone.
impl<T: 'static> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.internal().eq(&other.internal())
    }
}

impl<T: 'static> Eq for Id<T> {}

impl<T: 'static> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // write u64 directly, so that NoHashHasher works with ids
        state.write_u64(self.internal());
    }
}

impl<T: 'static> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.internal().cmp(&other.internal())
    }
}

impl<T: 'static> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// This creates a new struct with a cloned Rc pointer
impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self {
            _type_marker: PhantomData,
            id: self.id.clone(),
        }
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id {{ internal: {}, external: {} }}", self.id.internal, self.id.external)
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id.external)
    }
}

thread_local! {static ID_STORE: RefCell<IdStore> = RefCell::new(IdStore::new())}

/// Clears the thread local id store. Tests which rely on internal ids starting at
/// zero call this before building their scenario.
#[cfg(any(test, feature = "test_util"))]
pub fn reset_id_store() {
    ID_STORE.with(|store| *store.borrow_mut() = IdStore::new());
}

#[derive(Debug)]
struct UntypedId {
    internal: u64,
    external: String,
}

impl UntypedId {
    fn new(internal: u64, external: String) -> Self {
        Self { internal, external }
    }
}

/// The store keys its reverse mapping with owned Strings. This costs one allocation
/// per distinct external id, which only happens on first creation.
#[derive(Debug)]
struct IdStore {
    ids: AHashMap<TypeId, Vec<Rc<UntypedId>>>,
    // ahash with a fixed seed, to keep iteration predictable across runs
    mapping: AHashMap<TypeId, AHashMap<String, u64>>,
}

impl IdStore {
    fn new() -> Self {
        Self {
            ids: AHashMap::with_hasher(RandomState::with_seed(42)),
            mapping: AHashMap::with_hasher(RandomState::with_seed(42)),
        }
    }

    fn create_id<T: 'static>(&mut self, id: &str) -> Id<T> {
        let type_id = TypeId::of::<T>();

        let type_mapping = self
            .mapping
            .entry(type_id)
            .or_insert_with(|| AHashMap::with_hasher(RandomState::with_seed(42)));

        if type_mapping.contains_key(id) {
            return self.get_from_ext::<T>(id);
        }

        let type_ids = self.ids.entry(type_id).or_insert_with(Vec::default);
        let next_internal = type_ids.len() as u64;
        let next_id = Rc::new(UntypedId::new(next_internal, String::from(id)));
        type_ids.push(next_id.clone());
        type_mapping.insert(String::from(id), next_id.internal);

        Id::new(next_id)
    }

    fn get<T: 'static>(&self, internal: u64) -> Id<T> {
        let type_id = TypeId::of::<T>();
        let type_ids = self.ids.get(&type_id).unwrap_or_else(|| {
            panic!("No ids for type {type_id:?}. Use Id::create::<T>(...) to create ids")
        });

        let untyped_id = type_ids
            .get(internal as usize)
            .unwrap_or_else(|| panic!("No id found for internal {internal}"))
            .clone();
        Id::new(untyped_id)
    }

    fn get_from_ext<T: 'static>(&self, external: &str) -> Id<T> {
        self.try_get_from_ext(external).unwrap_or_else(|| {
            panic!("Could not find id for external id: {external}");
        })
    }

    fn try_get_from_ext<T: 'static>(&self, external: &str) -> Option<Id<T>> {
        let type_id = TypeId::of::<T>();
        let type_mapping = self.mapping.get(&type_id)?;
        let index = type_mapping.get(external)?;
        Some(self.get(*index))
    }
}
