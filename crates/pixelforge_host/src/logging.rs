// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tracing subscriber setup.

use crate::HostError;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &[&str] = &["pixelforge_graph=debug", "pixelforge_host=debug"];

/// Build the filter: `RUST_LOG` plus the crate defaults
pub fn env_filter() -> Result<EnvFilter, HostError> {
    let mut filter = EnvFilter::from_default_env();
    for directive in DEFAULT_DIRECTIVES {
        let directive: Directive = directive
            .parse()
            .map_err(|e| HostError::Logging(format!("bad directive {directive:?}: {e}")))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init() -> Result<(), HostError> {
    tracing_subscriber::registry()
        .with(env_filter()?)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| HostError::Logging(e.to_string()))
}
