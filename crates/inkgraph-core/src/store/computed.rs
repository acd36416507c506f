//! Memoized values derived from store contents.

use super::view::RecordView;
use super::RecordStore;
use crate::records::{RecordId, TypeName};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Something a computed value reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// Every record of a kind.
    Kind(TypeName),
    /// One record.
    Record(RecordId),
}

/// Commit counters, bumped for every kind and record a commit touches.
#[derive(Debug, Default)]
pub(crate) struct Epochs {
    clock: u64,
    by_kind: HashMap<TypeName, u64>,
    by_record: HashMap<RecordId, u64>,
}

impl Epochs {
    pub(crate) fn bump<'a>(&mut self, ids: impl IntoIterator<Item = &'a RecordId>) {
        self.clock += 1;
        for id in ids {
            self.by_kind.insert(id.type_name(), self.clock);
            self.by_record.insert(id.clone(), self.clock);
        }
    }

    pub(crate) fn of(&self, dependency: &Dependency) -> u64 {
        match dependency {
            Dependency::Kind(kind) => self.by_kind.get(kind).copied().unwrap_or(0),
            Dependency::Record(id) => self.by_record.get(id).copied().unwrap_or(0),
        }
    }
}

type Derive<T> = Box<dyn Fn(RecordView<'_>) -> T + Send + Sync>;

/// A value computed from the store and cached until a commit touches one of
/// its declared dependencies.
///
/// The derive function must only read what the dependencies cover, or the
/// cached value goes stale.
pub struct Computed<T> {
    name: &'static str,
    dependencies: Vec<Dependency>,
    derive: Derive<T>,
    cache: Mutex<Option<(Vec<u64>, Arc<T>)>>,
}

impl<T> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl<T: Send + Sync> Computed<T> {
    pub fn new<F>(name: &'static str, dependencies: Vec<Dependency>, derive: F) -> Self
    where
        F: Fn(RecordView<'_>) -> T + Send + Sync + 'static,
    {
        Self {
            name,
            dependencies,
            derive: Box::new(derive),
            cache: Mutex::new(None),
        }
    }

    /// The current value, recomputed only if a dependency changed since the
    /// last call.
    pub fn get(&self, store: &RecordStore) -> Arc<T> {
        store.read_with_epochs(|view, epochs| {
            let stamp: Vec<u64> = self.dependencies.iter().map(|d| epochs.of(d)).collect();
            let mut cache = self.cache.lock();
            if let Some((cached, value)) = cache.as_ref() {
                if *cached == stamp {
                    return Arc::clone(value);
                }
            }
            log::trace!("recomputing {}", self.name);
            let value = Arc::new((self.derive)(view));
            *cache = Some((stamp, Arc::clone(&value)));
            value
        })
    }

    /// Drop the cached value.
    pub fn invalidate(&self) {
        *self.cache.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{PageRecord, ShapeRecord};
    use crate::schema::Schema;
    use crate::store::TransactionConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_recomputes_only_when_dependency_moves() {
        let store = RecordStore::new(Schema::default());
        let page = PageRecord::new("Page 1");
        let page_id = page.id.clone();
        store
            .run(TransactionConfig::default(), |tx| {
                tx.create(page)?;
                Ok(())
            })
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let count = Computed::new("shape count", vec![Dependency::Kind(TypeName::Shape)], move |view| {
            counter.fetch_add(1, Ordering::SeqCst);
            view.shapes().count()
        });

        assert_eq!(*count.get(&store), 0);
        assert_eq!(*count.get(&store), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Unrelated kind: cached.
        store
            .run(TransactionConfig::default(), |tx| {
                tx.create(PageRecord::new("Page 2"))?;
                Ok(())
            })
            .unwrap();
        assert_eq!(*count.get(&store), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store
            .run(TransactionConfig::default(), |tx| {
                tx.create(ShapeRecord::new("geo", page_id.clone()))?;
                Ok(())
            })
            .unwrap();
        assert_eq!(*count.get(&store), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        count.invalidate();
        assert_eq!(*count.get(&store), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_record_dependency() {
        let mut epochs = Epochs::default();
        let a: RecordId = crate::records::ShapeId::from_key("a").into();
        let b: RecordId = crate::records::ShapeId::from_key("b").into();
        epochs.bump([&a]);
        assert_eq!(epochs.of(&Dependency::Record(a.clone())), 1);
        assert_eq!(epochs.of(&Dependency::Record(b.clone())), 0);
        assert_eq!(epochs.of(&Dependency::Kind(TypeName::Shape)), 1);
        epochs.bump([&b]);
        assert_eq!(epochs.of(&Dependency::Record(a)), 1);
        assert_eq!(epochs.of(&Dependency::Kind(TypeName::Shape)), 2);
    }
}
