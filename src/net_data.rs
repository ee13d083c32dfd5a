// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The Thread Network Data adapter.
//!
//! The routing manager publishes prefixes into the Thread Network Data and
//! reads the merged view back; the wire encoding, leader communication and
//! propagation mechanics all live behind [`NetworkDataContext`].

use crate::ndp::RoutePreference;
use crate::prefix::Prefix;

/// An on-mesh prefix entry in the Thread Network Data.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OnMeshPrefixConfig {
    /// The on-mesh prefix.
    pub prefix: Prefix,
    /// The route preference advertised with the prefix.
    pub preference: RoutePreference,
    /// Whether the prefix is on the Thread mesh.
    pub on_mesh: bool,
    /// Whether Thread devices may SLAAC-configure addresses from the prefix.
    pub slaac: bool,
    /// Whether addresses from the prefix are preferred.
    pub preferred: bool,
    /// Whether the entry is stable (stored in the stable Network Data).
    pub stable: bool,
    /// Whether the publisher can supply a default route for the prefix.
    pub default_route: bool,
}

/// An external route entry in the Thread Network Data.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ExternalRouteConfig {
    /// The route prefix.
    pub prefix: Prefix,
    /// The route preference.
    pub preference: RoutePreference,
    /// Whether the route is a NAT64 prefix.
    pub nat64: bool,
}

/// An error publishing into the Thread Network Data, e.g. because the leader
/// is unreachable. The caller logs, counts and retries on a later
/// evaluation; publication failures are never fatal.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("failed to publish to Thread Network Data")]
pub struct PublishError;

/// A context providing access to the Thread Network Data.
///
/// Publishing the same prefix again replaces the previous entry;
/// unpublishing a prefix that is not published is a no-op. The iteration
/// methods return the device's current view of the merged (leader) Network
/// Data, which includes prefixes published by other Border Routers.
pub trait NetworkDataContext {
    /// Publishes an on-mesh prefix.
    fn publish_on_mesh_prefix(&mut self, config: OnMeshPrefixConfig) -> Result<(), PublishError>;

    /// Unpublishes a previously published on-mesh prefix.
    fn unpublish_on_mesh_prefix(&mut self, prefix: &Prefix);

    /// Publishes an external route.
    fn publish_external_route(&mut self, config: ExternalRouteConfig) -> Result<(), PublishError>;

    /// Unpublishes a previously published external route.
    fn unpublish_external_route(&mut self, prefix: &Prefix);

    /// The on-mesh prefixes in the current Network Data.
    fn on_mesh_prefixes(&self) -> Vec<OnMeshPrefixConfig>;

    /// The external routes in the current Network Data.
    fn external_routes(&self) -> Vec<ExternalRouteConfig>;
}
