// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Error types exposed on the public surface of the crate.

/// Errors returned by the fallible [`RoutingManager`] operations.
///
/// Parsing failures, resource exhaustion and transmission failures are
/// deliberately not represented here; those are handled internally (dropped
/// and counted, or retried) and never surface to the caller.
///
/// [`RoutingManager`]: crate::RoutingManager
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// An argument was invalid, e.g. an infrastructure interface index of 0.
    #[error("invalid arguments")]
    InvalidArgs,
    /// The operation is not valid in the current state, e.g. the manager was
    /// not initialized, or was initialized twice.
    #[error("invalid state")]
    InvalidState,
}
