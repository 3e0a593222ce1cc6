// Copyright 2026 refcache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{fmt::Debug, sync::Arc};

use refcache_common::error::Error as ReferenceError;

use super::{shared::SharedReference, Releaser};
use crate::error::{Error, Result};

/// A closeable handle to a value shared through a [`SharedReference`].
///
/// Every valid handle accounts for exactly one count of the underlying reference. [`CloseableReference::close`] gives
/// the count back and is idempotent. The value is released when the last handle is closed.
///
/// Dropping a valid handle closes it. Closing explicitly is still preferred, since [`Drop`] can only log a release
/// failure.
pub struct CloseableReference<T> {
    shared: Arc<SharedReference<T>>,
    /// `None` once the handle is closed.
    value: Option<Arc<T>>,
}

impl<T> Debug for CloseableReference<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseableReference")
            .field("valid", &self.value.is_some())
            .field("shared", &self.shared)
            .finish()
    }
}

impl<T> CloseableReference<T>
where
    T: Send + Sync + 'static,
{
    /// Wrap a new value. `releaser` is called with the value after the last handle is closed.
    pub fn of(value: T, releaser: impl Releaser<T>) -> Self {
        Self::from_shared(Arc::new(SharedReference::new(value, releaser)))
    }

    /// Wrap a new value that is released by dropping it.
    pub fn of_drop(value: T) -> Self {
        Self::of(value, |value| {
            drop(value);
            Ok(())
        })
    }

    /// Create a handle that shares a value owned elsewhere.
    ///
    /// The value is never released through this handle or its clones. `hook` runs once after all of them are closed.
    pub(crate) fn with_hook(value: Arc<T>, hook: impl FnOnce() + Send + 'static) -> Self {
        Self::from_shared(Arc::new(SharedReference::with_hook(value, Box::new(hook))))
    }

    /// Take the initial count of a fresh reference.
    fn from_shared(shared: Arc<SharedReference<T>>) -> Self {
        let value = shared.share();
        Self { shared, value }
    }
}

impl<T> CloseableReference<T> {

    /// Get the value, or `None` if the handle is closed.
    pub fn get(&self) -> Option<&T> {
        self.value.as_deref()
    }

    /// Returns `true` until the handle is closed.
    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }

    /// Get the address of the value, which identifies the value across handles.
    pub fn value_ptr(&self) -> Option<*const T> {
        self.value.as_ref().map(Arc::as_ptr)
    }

    /// Returns `true` if both handles are valid and share the same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.value, &other.value) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Get the count of the underlying reference.
    pub fn refs(&self) -> usize {
        self.shared.refs()
    }

    /// Get another handle to the same value. Fails if this handle is closed.
    pub fn try_clone(&self) -> Result<Self> {
        if self.value.is_none() {
            return Err(ReferenceError::closed().into());
        }
        let value = self.shared.acquire()?;
        Ok(Self {
            shared: self.shared.clone(),
            value: Some(value),
        })
    }

    /// Get another handle to the same value, or `None` if this handle is closed.
    pub fn clone_or_none(&self) -> Option<Self> {
        self.try_clone().ok()
    }

    /// Clone every valid handle, skipping the closed ones.
    pub fn clone_all_or_none<'a>(handles: impl IntoIterator<Item = &'a Self>) -> Vec<Self>
    where
        T: 'a,
    {
        handles.into_iter().filter_map(Self::clone_or_none).collect()
    }

    /// Close the handle.
    ///
    /// Closing a closed handle is a no-op. If this was the last handle, the value is released and a releaser failure
    /// is returned. The handle is closed either way.
    pub fn close(&mut self) -> Result<()> {
        match self.value.take() {
            None => Ok(()),
            Some(value) => {
                // Give up the value share first, so the releaser gets the sole ownership.
                drop(value);
                self.shared.delete_reference()
            }
        }
    }

    /// Close every handle, tolerating the absent ones.
    ///
    /// All handles are closed even if some of them fail.
    pub fn close_all(handles: impl IntoIterator<Item = Option<Self>>) -> Result<()> {
        let errs: Vec<Error> = handles
            .into_iter()
            .flatten()
            .filter_map(|mut handle| handle.close().err())
            .collect();
        match errs.is_empty() {
            true => Ok(()),
            false => Err(Error::multiple(errs)),
        }
    }

    /// Get the value share, for handles that borrow the value of this one.
    pub(crate) fn share(&self) -> Option<Arc<T>> {
        self.value.clone()
    }
}

impl<T> Drop for CloseableReference<T> {
    fn drop(&mut self) {
        let Some(value) = self.value.take() else {
            return;
        };
        #[cfg(feature = "live_tracking")]
        tracing::warn!(
            "[closeable reference]: handle of {:?} is dropped without close",
            Arc::as_ptr(&value)
        );
        drop(value);
        if let Err(e) = self.shared.delete_reference() {
            tracing::error!("[closeable reference]: release on drop error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use itertools::Itertools;
    use parking_lot::Mutex;
    use refcache_common::error::ErrorKind;

    use super::*;

    fn counted(value: u64) -> (CloseableReference<u64>, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let r = released.clone();
        let handle = CloseableReference::of(value, move |_| {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (handle, released)
    }

    #[test_log::test]
    fn test_fresh_handle() {
        let (handle, released) = counted(1);
        assert!(handle.is_valid());
        assert_eq!(handle.get(), Some(&1));
        assert_eq!(handle.refs(), 1);
        drop(handle);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn test_close_idempotent() {
        let (mut handle, released) = counted(1);
        handle.close().unwrap();
        handle.close().unwrap();
        handle.close().unwrap();
        assert!(!handle.is_valid());
        assert_eq!(handle.get(), None);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        drop(handle);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn test_clone_shares_value() {
        let (mut a, released) = counted(42);
        let mut b = a.try_clone().unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.refs(), 2);

        a.close().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert_eq!(b.get(), Some(&42));

        assert_eq!(a.try_clone().unwrap_err().kind(), Some(ErrorKind::Closed));
        assert!(a.clone_or_none().is_none());

        b.close().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn test_release_failure_on_last_close() {
        let mut a = CloseableReference::of(1u64, |_| Err(anyhow::anyhow!("device lost")));
        let mut b = a.try_clone().unwrap();
        a.close().unwrap();
        let err = b.close().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ReleaseFailed));
        assert!(!b.is_valid());
        b.close().unwrap();
    }

    #[test_log::test]
    fn test_clone_all_or_none() {
        let (a, released) = counted(1);
        let mut closed = a.try_clone().unwrap();
        closed.close().unwrap();

        let handles = [a, closed];
        let clones = CloseableReference::clone_all_or_none(&handles);
        assert_eq!(clones.len(), 1);
        assert!(clones[0].ptr_eq(&handles[0]));

        drop(handles);
        assert_eq!(released.load(Ordering::SeqCst), 0);
        drop(clones);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn test_close_all_tolerates_absent() {
        let (a, ra) = counted(1);
        let (b, rb) = counted(2);
        CloseableReference::close_all([Some(a), None, Some(b), None]).unwrap();
        assert_eq!(ra.load(Ordering::SeqCst), 1);
        assert_eq!(rb.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn test_close_all_collects_failures() {
        let fail = || CloseableReference::of(0u64, |_| Err(anyhow::anyhow!("boom")));
        let (ok, released) = counted(1);
        let err = CloseableReference::close_all([Some(fail()), Some(ok), Some(fail())]).unwrap_err();
        match err {
            Error::Multiple(errs) => assert_eq!(errs.errors().len(), 2),
            e => panic!("unexpected error: {e}"),
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn test_hook_handle() {
        let value = Arc::new(String::from("borrowed"));
        let hooked = Arc::new(AtomicUsize::new(0));
        let h = hooked.clone();
        let mut a = CloseableReference::with_hook(value.clone(), move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let mut b = a.try_clone().unwrap();
        assert_eq!(b.get().map(String::as_str), Some("borrowed"));

        a.close().unwrap();
        assert_eq!(hooked.load(Ordering::SeqCst), 0);
        b.close().unwrap();
        assert_eq!(hooked.load(Ordering::SeqCst), 1);
        assert_eq!(Arc::strong_count(&value), 1);
    }

    #[test_log::test]
    fn test_concurrent_close() {
        const THREADS: usize = 8;

        let (handle, released) = counted(1);
        let handle = Arc::new(Mutex::new(handle));

        let handles = (0..THREADS)
            .map(|_| {
                let handle = handle.clone();
                std::thread::spawn(move || handle.lock().close().unwrap())
            })
            .collect_vec();
        handles.into_iter().for_each(|h| h.join().unwrap());

        assert!(!handle.lock().is_valid());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn test_concurrent_clones() {
        let (root, released) = counted(7);
        let root = Arc::new(Mutex::new(Some(root)));

        let handles = (0..8)
            .map(|_| {
                let root = root.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let clone = root.lock().as_ref().and_then(CloseableReference::clone_or_none);
                        if let Some(mut clone) = clone {
                            assert_eq!(clone.get(), Some(&7));
                            clone.close().unwrap();
                        }
                    }
                })
            })
            .collect_vec();
        handles.into_iter().for_each(|h| h.join().unwrap());

        assert_eq!(released.load(Ordering::SeqCst), 0);
        root.lock().take();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
