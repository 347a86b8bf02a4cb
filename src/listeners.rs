use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// Handle returned by `Listeners::add`, used to remove the callback later
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerHandle(u64);

type Callback<T> = Rc<dyn Fn(&T)>;

/// Observer registry: handle -> callback.
///
/// Dispatch works on a snapshot of the callbacks, so a callback may add or
/// remove listeners (itself included) while being invoked.
pub struct Listeners<T> {
    next: u64,
    entries: BTreeMap<ListenerHandle, Callback<T>>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            next: 0,
            entries: BTreeMap::new(),
        }
    }
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, callback: impl Fn(&T) + 'static) -> ListenerHandle {
        let handle = ListenerHandle(self.next);
        self.next += 1;
        self.entries.insert(handle, Rc::new(callback));
        handle
    }

    /// Returns false if the handle was not registered
    pub fn remove(&mut self, handle: ListenerHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the current callbacks, in registration order
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot(self.entries.values().cloned().collect())
    }

    pub fn get(&self, handle: ListenerHandle) -> Option<Snapshot<T>> {
        self.entries
            .get(&handle)
            .map(|cb| Snapshot(vec![cb.clone()]))
    }

    /// Snapshot, then invoke every callback with `value`
    pub fn notify(&self, value: &T) {
        self.snapshot().dispatch(value);
    }
}

/// Callbacks detached from their registry, ready to be invoked
pub struct Snapshot<T>(Vec<Callback<T>>);

impl<T> Snapshot<T> {
    /// Invoke each callback. A panicking callback is logged and skipped;
    /// the remaining callbacks still run.
    pub fn dispatch(&self, value: &T) {
        for callback in &self.0 {
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(value)));
            if result.is_err() {
                tracing::error!("listener callback panicked; continuing dispatch");
            }
        }
    }
}
