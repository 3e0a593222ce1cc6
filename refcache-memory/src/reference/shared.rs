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

use parking_lot::Mutex;
use refcache_common::error::Error;

use super::{live, Releaser};
use crate::error::Result;

/// The hook of a reference that shares a value owned by another reference.
pub(crate) type ReleaseHook = Box<dyn FnOnce() + Send + 'static>;

enum Disposal<T> {
    /// The reference owns the value and hands it to the releaser.
    Release(Arc<dyn Releaser<T>>),
    /// The value is owned elsewhere. Only the hook runs.
    Hook(ReleaseHook),
}

struct State<T> {
    refs: usize,
    value: Option<Arc<T>>,
    disposal: Option<Disposal<T>>,
}

/// [`SharedReference`] counts the owners of a single resource and releases it when the count drops to zero.
///
/// The count starts at `1`. [`SharedReference::add_reference`] and [`SharedReference::delete_reference`] fail with
/// [`refcache_common::error::ErrorKind::InvalidReference`] once the count has dropped to zero.
///
/// The count is guarded by a per-reference lock that is held only for the counter update. The releaser runs after
/// the lock is released.
///
/// Most users never touch a [`SharedReference`] directly and go through [`super::CloseableReference`].
pub struct SharedReference<T> {
    state: Mutex<State<T>>,
}

impl<T> Debug for SharedReference<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SharedReference")
            .field("refs", &state.refs)
            .field("released", &state.value.is_none())
            .finish()
    }
}

impl<T> SharedReference<T> {
    /// Wrap the value with the reference count `1`.
    pub fn new(value: T, releaser: impl Releaser<T>) -> Self {
        let value = Arc::new(value);
        live::register(Arc::as_ptr(&value) as *const ());
        Self {
            state: Mutex::new(State {
                refs: 1,
                value: Some(value),
                disposal: Some(Disposal::Release(Arc::new(releaser))),
            }),
        }
    }

    /// Share a value owned by another reference. Only `hook` runs when the count drops to zero.
    pub(crate) fn with_hook(value: Arc<T>, hook: ReleaseHook) -> Self {
        Self {
            state: Mutex::new(State {
                refs: 1,
                value: Some(value),
                disposal: Some(Disposal::Hook(hook)),
            }),
        }
    }

    /// Get the value share without touching the count.
    pub(crate) fn share(&self) -> Option<Arc<T>> {
        self.state.lock().value.clone()
    }

    /// Increase the reference count.
    pub fn add_reference(&self) -> Result<()> {
        self.acquire().map(|_| ())
    }

    /// Increase the reference count and return the shared value.
    pub(crate) fn acquire(&self) -> Result<Arc<T>> {
        let mut state = self.state.lock();
        let value = match state.value.as_ref() {
            Some(value) if state.refs > 0 => value.clone(),
            _ => return Err(Error::invalid_reference(state.refs).into()),
        };
        state.refs += 1;
        tracing::trace!("[shared reference]: inc refs: {} => {}", state.refs - 1, state.refs);
        Ok(value)
    }

    /// Decrease the reference count.
    ///
    /// The value is released when the count drops to zero. A releaser failure is returned as
    /// [`refcache_common::error::ErrorKind::ReleaseFailed`], the reference is invalid afterwards anyway.
    pub fn delete_reference(&self) -> Result<()> {
        let (value, disposal) = {
            let mut state = self.state.lock();
            if state.refs == 0 {
                return Err(Error::invalid_reference(0).into());
            }
            state.refs -= 1;
            tracing::trace!("[shared reference]: dec refs: {} => {}", state.refs + 1, state.refs);
            if state.refs > 0 {
                return Ok(());
            }
            (state.value.take(), state.disposal.take())
        };

        // Release out of the lock critical section.
        match (value, disposal) {
            (Some(value), Some(Disposal::Release(releaser))) => Self::release(value, releaser),
            (value, Some(Disposal::Hook(hook))) => {
                drop(value);
                hook();
                Ok(())
            }
            _ => unreachable!("a live reference always holds its value and disposal"),
        }
    }

    fn release(value: Arc<T>, releaser: Arc<dyn Releaser<T>>) -> Result<()> {
        live::unregister(Arc::as_ptr(&value) as *const ());
        match Arc::try_unwrap(value) {
            Ok(value) => releaser(value).map_err(|e| Error::release_failed(e).into()),
            Err(value) => {
                // Every handle gives up its share before deleting its reference, so this is a bug.
                tracing::error!(
                    "[shared reference]: value is still shared by {} owners at release, drop it without releaser",
                    Arc::strong_count(&value) - 1
                );
                Ok(())
            }
        }
    }

    /// Run `f` with the value, or return `None` if the value has been released.
    ///
    /// The reference lock is held while `f` runs.
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.state.lock().value.as_deref().map(f)
    }

    /// Get the reference count.
    pub fn refs(&self) -> usize {
        self.state.lock().refs
    }

    /// Returns `true` until the reference count has dropped to zero.
    pub fn is_valid(&self) -> bool {
        self.refs() > 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use itertools::Itertools;
    use refcache_common::error::ErrorKind;

    use super::*;

    fn counted(value: u64) -> (SharedReference<u64>, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let r = released.clone();
        let shared = SharedReference::new(value, move |_| {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (shared, released)
    }

    #[test_log::test]
    fn test_release_exactly_at_zero() {
        let (shared, released) = counted(42);
        assert_eq!(shared.refs(), 1);

        shared.add_reference().unwrap();
        shared.add_reference().unwrap();
        assert_eq!(shared.refs(), 3);

        shared.delete_reference().unwrap();
        shared.delete_reference().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert_eq!(shared.with_value(|v| *v), Some(42));

        shared.delete_reference().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!shared.is_valid());
        assert_eq!(shared.with_value(|v| *v), None);
    }

    #[test_log::test]
    fn test_use_after_release() {
        let (shared, released) = counted(7);
        shared.delete_reference().unwrap();

        let err = shared.add_reference().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidReference));
        let err = shared.delete_reference().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidReference));

        assert_eq!(shared.refs(), 0);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn test_releaser_failure() {
        let shared = SharedReference::new(vec![0u8; 16], |_| Err(anyhow::anyhow!("device lost")));
        let err = shared.delete_reference().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ReleaseFailed));
        assert!(!shared.is_valid());
    }

    #[test_log::test]
    fn test_hook_runs_once_without_releasing_value() {
        let value = Arc::new(String::from("shared"));
        let hooked = Arc::new(AtomicUsize::new(0));
        let h = hooked.clone();
        let shared = SharedReference::with_hook(
            value.clone(),
            Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );
        shared.add_reference().unwrap();
        shared.delete_reference().unwrap();
        shared.delete_reference().unwrap();
        assert!(shared.delete_reference().is_err());

        assert_eq!(hooked.load(Ordering::SeqCst), 1);
        assert_eq!(Arc::strong_count(&value), 1);
    }

    #[test_log::test]
    fn test_concurrent_references() {
        let (shared, released) = counted(1);
        let shared = Arc::new(shared);

        let handles = (0..8)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        shared.add_reference().unwrap();
                        shared.delete_reference().unwrap();
                    }
                })
            })
            .collect_vec();
        handles.into_iter().for_each(|handle| handle.join().unwrap());

        assert_eq!(shared.refs(), 1);
        assert_eq!(released.load(Ordering::SeqCst), 0);
        shared.delete_reference().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
