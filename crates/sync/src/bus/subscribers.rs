use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

type Callback<A> = Rc<RefCell<dyn FnMut(&A)>>;

struct Entry<A: ?Sized> {
    id: u64,
    active: Rc<Cell<bool>>,
    callback: Callback<A>,
}

struct Inner<A: ?Sized> {
    next_id: u64,
    entries: Vec<Entry<A>>,
}

/// Callbacks run in registration order. One removed mid-dispatch is skipped
/// for the rest of that dispatch.
pub struct Subscribers<A: ?Sized + 'static> {
    inner: Rc<RefCell<Inner<A>>>,
}

impl<A: ?Sized + 'static> Subscribers<A> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, callback: impl FnMut(&A) + 'static) -> Subscription {
        let active = Rc::new(Cell::new(true));
        let callback: Callback<A> = Rc::new(RefCell::new(callback));

        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.push(Entry {
                id,
                active: Rc::clone(&active),
                callback,
            });
            id
        };

        let list = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            active.set(false);
            if let Some(inner) = list.upgrade() {
                inner.borrow_mut().entries.retain(|entry| entry.id != id);
            }
        })
    }

    pub fn dispatch(&self, arg: &A) -> usize {
        let snapshot: Vec<(Rc<Cell<bool>>, Callback<A>)> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|entry| (Rc::clone(&entry.active), Rc::clone(&entry.callback)))
            .collect();

        let mut delivered = 0;
        for (active, callback) in snapshot {
            if !active.get() {
                continue;
            }
            match callback.try_borrow_mut() {
                Ok(mut callback) => {
                    (&mut *callback)(arg);
                    delivered += 1;
                }
                Err(_) => log::warn!("skipping re-entrant subscriber"),
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A: ?Sized + 'static> Default for Subscribers<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ?Sized + 'static> Clone for Subscribers<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: ?Sized + 'static> fmt::Debug for Subscribers<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.len())
            .finish()
    }
}

/// Dropping the handle unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }

    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.unsubscribe.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_in_registration_order() {
        let list = Subscribers::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let mut subs = Vec::new();
        for tag in ["a", "b", "c"] {
            let seen = Rc::clone(&seen);
            subs.push(list.subscribe(move |value| seen.borrow_mut().push((tag, *value))));
        }

        assert_eq!(list.dispatch(&7), 3);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7), ("c", 7)]);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_callback() {
        let list = Subscribers::<()>::new();
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));

        let first_sub = {
            let first = Rc::clone(&first);
            list.subscribe(move |_| first.set(first.get() + 1))
        };
        let _second_sub = {
            let second = Rc::clone(&second);
            list.subscribe(move |_| second.set(second.get() + 1))
        };

        list.dispatch(&());
        first_sub.unsubscribe();
        list.dispatch(&());

        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 2);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_drop_unsubscribes_and_detach_keeps() {
        let list = Subscribers::<()>::new();
        let hits = Rc::new(Cell::new(0));

        {
            let hits = Rc::clone(&hits);
            let _dropped = list.subscribe(move |_| hits.set(hits.get() + 1));
        }
        {
            let hits = Rc::clone(&hits);
            list.subscribe(move |_| hits.set(hits.get() + 10)).detach();
        }

        list.dispatch(&());
        assert_eq!(hits.get(), 10);
    }

    #[test]
    fn test_unsubscribe_during_dispatch() {
        let list = Subscribers::<()>::new();
        let later_hits = Rc::new(Cell::new(0));
        let later: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let _first = {
            let later = Rc::clone(&later);
            list.subscribe(move |_| {
                if let Some(sub) = later.borrow_mut().take() {
                    sub.unsubscribe();
                }
            })
        };
        let sub = {
            let later_hits = Rc::clone(&later_hits);
            list.subscribe(move |_| later_hits.set(later_hits.get() + 1))
        };
        *later.borrow_mut() = Some(sub);

        assert_eq!(list.dispatch(&()), 1);
        assert_eq!(later_hits.get(), 0);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_subscription_outlives_list() {
        let list = Subscribers::<()>::new();
        let sub = list.subscribe(|_| {});
        drop(list);
        sub.unsubscribe();
    }
}
