//! Conformance-mode fallback heuristics
//!
//! **PLACEMENT-ALTERING.** Everything in this module exists to get a request
//! through despite real-world provider limits, and can silently change the
//! region or SKU a resource lands on. The provider only consults these when
//! `HetznerConfig::conformance_mode` is on; production deployments that need
//! exact placement should leave it off.

use secagw_cloud::{Architecture, CloudError, Image, Sku};
use std::cmp::Ordering;

/// Vendor codes meaning "cannot place this here right now"
const PLACEMENT_CODES: &[&str] = &[
    "resource_unavailable",
    "placement_error",
    "no_space_left_in_location",
    "unsupported_error",
];

/// Cheapest SKU of `architecture` available in a region
///
/// Ordered by core count, then memory, then name. Deprecated SKUs are
/// never picked.
pub fn cheapest_available_sku<'a>(
    skus: &'a [Sku],
    available: &[String],
    architecture: Architecture,
) -> Option<&'a Sku> {
    skus.iter()
        .filter(|s| s.architecture == architecture && !s.deprecated)
        .filter(|s| available.iter().any(|a| a == &s.name))
        .min_by(|a, b| {
            a.cores
                .cmp(&b.cores)
                .then_with(|| {
                    a.memory_gb
                        .partial_cmp(&b.memory_gb)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.name.cmp(&b.name))
        })
}

/// Exact name + architecture match, else any image of that architecture
pub fn select_image<'a>(
    images: &'a [Image],
    name: &str,
    architecture: Architecture,
) -> Option<&'a Image> {
    images
        .iter()
        .find(|i| i.name == name && i.architecture == architecture)
        .or_else(|| images.iter().find(|i| i.architecture == architecture))
}

pub fn is_placement_error(err: &CloudError) -> bool {
    err.code().is_some_and(|c| PLACEMENT_CODES.contains(&c))
}

pub fn is_locked(err: &CloudError) -> bool {
    err.code() == Some("locked")
}

/// The provider refuses to power on an instance without any network
pub fn is_missing_network(err: &CloudError) -> bool {
    match err {
        CloudError::Provider { code, message, .. } => {
            let message = message.to_ascii_lowercase();
            code == "server_has_no_network"
                || message.contains("no network interface")
                || message.contains("no network interfaces")
        }
        _ => false,
    }
}
