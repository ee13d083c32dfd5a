// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The persistent settings adapter.

use crate::prefix::Prefix;

/// A context providing persistent storage for the locally generated
/// prefixes, so a Border Router keeps its identity across reboots.
///
/// Loaded values are validated by the caller; an invalid or absent value is
/// replaced by a freshly generated prefix which is saved back.
pub trait SettingsContext {
    /// Loads the BR ULA /48 prefix, if one was saved.
    fn load_br_ula_prefix(&self) -> Option<Prefix>;

    /// Saves the BR ULA /48 prefix.
    fn save_br_ula_prefix(&mut self, prefix: &Prefix);

    /// Loads the on-link /64 prefix, if one was saved.
    fn load_on_link_prefix(&self) -> Option<Prefix>;

    /// Saves the on-link /64 prefix.
    fn save_on_link_prefix(&mut self, prefix: &Prefix);
}
