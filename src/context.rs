// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Execution contexts.
//!
//! The routing manager core performs no I/O, reads no clock and owns no
//! randomness of its own. Everything that touches the outside world is
//! abstracted behind the traits in this module (and the platform adapter
//! traits in [`infra_if`], [`net_data`] and [`settings`]), implemented by
//! the embedder's bindings object. This keeps the core deterministic: tests
//! drive it with a fake clock, a fake timer queue and a seeded RNG.
//!
//! [`infra_if`]: crate::infra_if
//! [`net_data`]: crate::net_data
//! [`settings`]: crate::settings

use core::time::Duration;

use rand::{CryptoRng, RngCore};

use crate::time::Instant;

/// Trait defining the `Instant` type provided by a bindings'
/// [`InstantContext`] implementation.
///
/// It is a separate trait from `InstantContext` so the type stands by itself
/// to be stored at rest in core structures.
pub trait InstantBindingsTypes {
    /// The type of an instant in time.
    ///
    /// All time is measured using `Instant`s, including scheduling timers
    /// through [`TimerContext`]. This type may represent some sort of
    /// real-world time (e.g., [`std::time::Instant`]), or may be faked in
    /// testing using a fake clock.
    type Instant: Instant + 'static;
}

/// A context that provides access to a monotonic clock.
pub trait InstantContext: InstantBindingsTypes {
    /// Returns the current instant.
    ///
    /// `now` guarantees that two subsequent calls to `now` will return
    /// monotonically non-decreasing values.
    fn now(&self) -> Self::Instant;
}

/// A context that supports scheduling timers.
///
/// Timers are single-shot: once fired they must be explicitly rescheduled.
/// Handlers for fired timers run serialized with every other entry point of
/// the core, so no timer can observe a partially-updated state.
pub trait TimerContext<Id>: InstantContext {
    /// Schedules a timer to fire after some duration.
    ///
    /// `schedule_timer` schedules the given timer to be fired after `duration`
    /// has elapsed, overwriting any previous timer with the same ID.
    ///
    /// If there was previously a timer with that ID, returns the time at
    /// which it was scheduled to fire.
    ///
    /// # Panics
    ///
    /// `schedule_timer` may panic if `duration` is large enough that
    /// `self.now() + duration` overflows.
    fn schedule_timer(&mut self, duration: Duration, id: Id) -> Option<Self::Instant> {
        let deadline = self.now().checked_add(duration).unwrap();
        self.schedule_timer_instant(deadline, id)
    }

    /// Schedules a timer to fire at some point in the future.
    ///
    /// `schedule_timer_instant` schedules the given timer to be fired at
    /// `time`, overwriting any previous timer with the same ID.
    ///
    /// If there was previously a timer with that ID, returns the time at
    /// which it was scheduled to fire.
    fn schedule_timer_instant(&mut self, time: Self::Instant, id: Id) -> Option<Self::Instant>;

    /// Cancels a timer.
    ///
    /// If a timer with the given ID exists, it is canceled and the instant at
    /// which it was scheduled to fire is returned. Cancelling a timer that is
    /// not armed is a no-op.
    fn cancel_timer(&mut self, id: Id) -> Option<Self::Instant>;

    /// Gets the instant a timer will fire, if one is scheduled.
    fn scheduled_instant(&self, id: Id) -> Option<Self::Instant>;
}

// NOTE:
// - Code in this crate is required to only obtain random values through an
//   `RngContext`. This allows a deterministic RNG to be provided when useful
//   (for example, in tests).
// - The CSPRNG requirement exists so that the generated ULA prefixes and the
//   transmission jitter are not predictable by outside observers.

/// A context that provides a random number generator (RNG).
pub trait RngContext {
    /// The random number generator (RNG) provided by this `RngContext`.
    ///
    /// The provided RNG must be cryptographically secure, and users may rely
    /// on that property for their correctness and security.
    type Rng<'a>: RngCore + CryptoRng
    where
        Self: 'a;

    /// Gets the random number generator (RNG).
    fn rng(&mut self) -> Self::Rng<'_>;
}
