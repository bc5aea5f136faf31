//! Endpoint Health Filtering
//!
//! Drops lagging tablets from a freshly fetched endpoint set, unless that
//! would leave nothing to serve from.

use crate::domain::EndPoints;

/// Remove unhealthy servers from the list, unless all servers are
/// unhealthy, in which case keep them all.
///
/// An endpoint is unhealthy iff it reports high replication lag. Order of
/// the remaining endpoints is preserved.
pub fn filter_unhealthy_servers(end_points: EndPoints) -> EndPoints {
    if end_points.is_empty() {
        return end_points;
    }

    let healthy: Vec<_> = end_points
        .entries
        .iter()
        .filter(|ep| !ep.is_lagging())
        .cloned()
        .collect();

    if healthy.is_empty() {
        // Serving degraded tablets beats serving none
        return end_points;
    }

    EndPoints::new(healthy)
}

/// [`filter_unhealthy_servers`] for a possibly absent set; `None` stays `None`.
pub fn filter_optional(end_points: Option<EndPoints>) -> Option<EndPoints> {
    end_points.map(filter_unhealthy_servers)
}
