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

//! Shared-ownership references with an explicit, exactly-once release.

mod closeable;
pub mod live;
mod shared;

pub use closeable::CloseableReference;
pub use shared::SharedReference;

/// The releaser of a referenced resource.
///
/// The releaser is called exactly once, with the ownership of the value, when the last reference is deleted.
/// A failure is reported back to whoever deleted the last reference; the reference itself is gone either way.
pub trait Releaser<T>: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static {}
impl<T, F> Releaser<T> for F where F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static {}
