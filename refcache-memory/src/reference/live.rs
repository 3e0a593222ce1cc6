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

//! Registry of the values that are still owned by a live reference.
//!
//! The registry is only maintained with the `live_tracking` feature. Without it every function is a no-op and the
//! registry always looks empty.

#[cfg(feature = "live_tracking")]
mod imp {
    use std::sync::LazyLock;

    use hashbrown::HashMap;
    use parking_lot::Mutex;

    /// Value address to the count of owner references wrapping it.
    static LIVE: LazyLock<Mutex<HashMap<usize, usize>>> = LazyLock::new(|| Mutex::new(HashMap::new()));

    pub fn register(ptr: *const ()) {
        *LIVE.lock().entry(ptr as usize).or_default() += 1;
    }

    pub fn unregister(ptr: *const ()) {
        let mut live = LIVE.lock();
        match live.get_mut(&(ptr as usize)) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                live.remove(&(ptr as usize));
            }
            None => tracing::warn!("[live tracking]: unregister unknown value {ptr:?}"),
        }
    }

    pub fn live_references() -> usize {
        LIVE.lock().values().sum()
    }

    pub fn is_live(ptr: *const ()) -> bool {
        LIVE.lock().contains_key(&(ptr as usize))
    }
}

#[cfg(not(feature = "live_tracking"))]
mod imp {
    #[inline(always)]
    pub fn register(_: *const ()) {}

    #[inline(always)]
    pub fn unregister(_: *const ()) {}

    pub fn live_references() -> usize {
        0
    }

    pub fn is_live(_: *const ()) -> bool {
        false
    }
}

pub(crate) use imp::{register, unregister};

/// Count the owner references whose value has not been released yet, process-wide.
pub fn live_references() -> usize {
    imp::live_references()
}

/// Returns `true` if the value at `ptr` is still owned by a live reference.
///
/// See [`super::CloseableReference::value_ptr`].
pub fn is_live<T>(ptr: *const T) -> bool {
    imp::is_live(ptr as *const ())
}

#[cfg(all(test, feature = "live_tracking"))]
mod tests {
    use super::*;
    use crate::reference::CloseableReference;

    #[test_log::test]
    fn test_live_until_released() {
        let mut a = CloseableReference::of_drop(String::from("a"));
        let ptr = a.value_ptr().unwrap();
        assert!(is_live(ptr));
        assert!(live_references() >= 1);

        let mut b = a.try_clone().unwrap();
        a.close().unwrap();
        assert!(is_live(ptr));

        b.close().unwrap();
        assert!(!is_live(ptr));
    }
}
