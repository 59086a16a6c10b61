// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hub configuration.

use serde::{Deserialize, Serialize};

/// Hub tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Capacity of the queue from read tasks to the hub. When full, read
    /// tasks wait, which throttles every connection uniformly.
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,

    /// Per-connection outbound queue capacity, for transports that write
    /// through a [`ChannelSink`](crate::ChannelSink).
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,

    /// Answer undecodable messages with an Error envelope instead of only
    /// logging them.
    #[serde(default)]
    pub bounce_malformed: bool,
}

fn default_inbound_capacity() -> usize {
    1024
}

fn default_outbound_capacity() -> usize {
    256
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: default_inbound_capacity(),
            outbound_capacity: default_outbound_capacity(),
            bounce_malformed: false,
        }
    }
}

impl HubConfig {
    /// Check the configuration for unusable values.
    pub fn validate(&self) -> Result<(), String> {
        if self.inbound_capacity == 0 {
            return Err("inbound_capacity must be greater than 0".into());
        }
        if self.outbound_capacity == 0 {
            return Err("outbound_capacity must be greater than 0".into());
        }
        Ok(())
    }
}
