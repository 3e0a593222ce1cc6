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

use serde::{Deserialize, Serialize};

/// Memory pressure events that a cache can react to by trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryTrimType {
    /// The process is close to its heap limit.
    OnCloseToHeapLimit,
    /// The system is low on memory while the app is in the foreground.
    OnSystemLowMemoryWhileAppInForeground,
    /// The system is low on memory while the app is in the background.
    OnSystemLowMemoryWhileAppInBackground,
    /// The app has moved to the background.
    OnAppBackgrounded,
}

impl MemoryTrimType {
    /// Every trim type.
    pub const ALL: [MemoryTrimType; 4] = [
        Self::OnCloseToHeapLimit,
        Self::OnSystemLowMemoryWhileAppInForeground,
        Self::OnSystemLowMemoryWhileAppInBackground,
        Self::OnAppBackgrounded,
    ];

    /// The suggested fraction of the cache size to free for the event.
    pub fn suggested_trim_ratio(&self) -> f64 {
        match self {
            Self::OnCloseToHeapLimit => 0.5,
            Self::OnSystemLowMemoryWhileAppInForeground => 0.5,
            Self::OnSystemLowMemoryWhileAppInBackground => 1.0,
            Self::OnAppBackgrounded => 1.0,
        }
    }
}

/// Maps a trim event to the fraction of the cache size to free, in `[0, 1]`.
pub trait TrimStrategy: Send + Sync + 'static {
    /// Get the trim ratio for the event.
    fn trim_ratio(&self, trim_type: MemoryTrimType) -> f64;
}

impl<F> TrimStrategy for F
where
    F: Fn(MemoryTrimType) -> f64 + Send + Sync + 'static,
{
    fn trim_ratio(&self, trim_type: MemoryTrimType) -> f64 {
        self(trim_type)
    }
}

/// Trim strategy that follows [`MemoryTrimType::suggested_trim_ratio`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTrimStrategy;

impl TrimStrategy for DefaultTrimStrategy {
    fn trim_ratio(&self, trim_type: MemoryTrimType) -> f64 {
        trim_type.suggested_trim_ratio()
    }
}

/// Anything that can release memory on a trim event.
pub trait MemoryTrimmable {
    /// Release memory for the event.
    fn trim(&self, trim_type: MemoryTrimType);
}
