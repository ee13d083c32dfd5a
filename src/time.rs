// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Types for dealing with time and timers.

use core::fmt::Debug;
use core::time::Duration;

/// A type representing an instant in time.
///
/// `Instant` can be implemented by any type which represents an instant in
/// time. This can include any sort of real-world clock time (e.g.,
/// [`std::time::Instant`]) or fake time such as in testing.
pub trait Instant: Sized + Ord + Copy + Clone + Debug + Send + Sync {
    /// Returns the amount of time elapsed from another instant to this one.
    ///
    /// # Panics
    ///
    /// This function will panic if `earlier` is later than `self`.
    fn duration_since(&self, earlier: Self) -> Duration;

    /// Returns the amount of time elapsed from another instant to this one,
    /// saturating at zero.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;

    /// Returns `Some(t)` where `t` is the time `self + duration` if `t` can be
    /// represented as `Instant` (which means it's inside the bounds of the
    /// underlying data structure), `None` otherwise.
    fn checked_add(&self, duration: Duration) -> Option<Self>;

    /// Unwraps the result from `checked_add`.
    ///
    /// # Panics
    ///
    /// This function will panic if the addition makes the clock wrap around.
    fn add(&self, duration: Duration) -> Self {
        self.checked_add(duration).unwrap_or_else(|| {
            panic!("clock wraps around when adding {:?} to {:?}", duration, *self);
        })
    }
}

/// The identifier for any timer event owned by the routing manager.
///
/// All timers are single-shot with millisecond resolution; rescheduling an
/// armed timer overwrites its deadline and cancellation is idempotent (see
/// [`TimerContext`]).
///
/// [`TimerContext`]: crate::context::TimerContext
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum TimerId {
    /// Drives the router solicitation sequence: the jittered first
    /// transmission, the fixed inter-solicitation interval, retries after
    /// failed transmissions, and the round-completion step.
    RouterSolicit,
    /// The debounced routing policy evaluation, which doubles as the
    /// periodic Router Advertisement schedule.
    RoutingPolicy,
    /// Fires when a previously advertised local on-link prefix finishes
    /// deprecating and must no longer be advertised.
    OnLinkPrefixDeprecate,
    /// Fires at the earliest expire time of any discovered prefix entry.
    DiscoveredPrefixExpiry,
    /// Fires when a discovered prefix or the learned Router Advertisement
    /// header goes stale and a fresh solicitation round is warranted.
    DiscoveredPrefixStale,
    /// Zero-delay deferred delivery of the discovered prefix table's
    /// coalesced change signal.
    DiscoveredPrefixTableChanged,
}
