//! Symbolic path resolution.
//!
//! Given a current place and a desired destination -- both symbolic names
//! (canonical locations or portals) -- work out the next place to stand.
//! The client owns sub-building pathfinding; this resolver only decides
//! which side of which portal the agent should be on.

use crate::portal::PortalGraph;

/// Outdoor keywords beyond the `_室外` portal suffix.
const OUTDOOR_KEYWORDS: [&str; 6] = ["Exterior", "Park", "公園", "街道", "戶外", "室外"];

/// True when a symbolic place name is outdoors.
pub fn is_outdoors(name: &str) -> bool {
    OUTDOOR_KEYWORDS
        .iter()
        .any(|keyword| name.contains(keyword))
}

/// Resolve the next step from `current` toward `destination`.
///
/// Rules, in order:
/// - empty or same destination: stay;
/// - a Subway alias: `Subway` when already inside, else the exterior
///   subway entrance;
/// - same indoor/outdoor side: go directly;
/// - outdoors heading indoors: the destination's entry portal;
/// - indoors heading outdoors: the current portal if standing on one,
///   else the building's main exit.
pub fn resolve_path(graph: PortalGraph, current: &str, destination: &str) -> String {
    if destination.is_empty() || destination == current {
        return current.to_owned();
    }

    if graph.is_subway_alias(destination) {
        let inside_subway =
            current == "Subway" || graph.canonical_for_portal(current) == Some("Subway");
        if inside_subway {
            return "Subway".to_owned();
        }
        return graph
            .entry_portal("Subway")
            .unwrap_or("Subway")
            .to_owned();
    }

    let current_outdoors = is_outdoors(current);
    let destination_outdoors = is_outdoors(destination);

    if current_outdoors == destination_outdoors {
        return destination.to_owned();
    }

    if current_outdoors {
        // Heading inside: walk to the destination's entry portal.
        if let Some(entry) = graph.entry_portal(destination) {
            return entry.to_owned();
        }
        // Composite names fall back to a synthesized gate portal.
        if let Some(base) = destination.split('_').next().filter(|b| !b.is_empty()) {
            return format!("{base}_門口_室外");
        }
        return destination.to_owned();
    }

    // Heading outside: a portal is already a doorway.
    if graph.is_portal(current) {
        return current.to_owned();
    }
    if let Some(exit) = graph.main_exit(current) {
        return exit.to_owned();
    }
    current.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> PortalGraph {
        PortalGraph::new()
    }

    #[test]
    fn empty_or_same_destination_stays_put() {
        assert_eq!(resolve_path(graph(), "School", ""), "School");
        assert_eq!(resolve_path(graph(), "School", "School"), "School");
    }

    #[test]
    fn subway_alias_from_outside_goes_to_entrance() {
        assert_eq!(resolve_path(graph(), "Exterior", "地鐵"), "地鐵左入口_室外");
        assert_eq!(resolve_path(graph(), "Exterior", "Metro"), "地鐵左入口_室外");
    }

    #[test]
    fn subway_alias_from_inside_resolves_to_subway() {
        assert_eq!(resolve_path(graph(), "Subway", "地鐵"), "Subway");
        assert_eq!(resolve_path(graph(), "地鐵左樓梯_室內", "地鐵"), "Subway");
    }

    #[test]
    fn same_side_goes_directly() {
        // Indoor to indoor.
        assert_eq!(resolve_path(graph(), "Apartment_F1", "School"), "School");
        // Outdoor to outdoor.
        assert_eq!(resolve_path(graph(), "Exterior", "公園"), "公園");
    }

    #[test]
    fn outdoor_to_indoor_goes_via_entry_portal() {
        assert_eq!(resolve_path(graph(), "Exterior", "School"), "學校門口_室外");
        assert_eq!(resolve_path(graph(), "Exterior", "Gym"), "健身房_室外");
    }

    #[test]
    fn unknown_composite_destination_synthesizes_gate() {
        assert_eq!(
            resolve_path(graph(), "Exterior", "圖書館_一樓"),
            "圖書館_門口_室外"
        );
    }

    #[test]
    fn indoor_to_outdoor_uses_current_portal_or_main_exit() {
        assert_eq!(
            resolve_path(graph(), "公寓大門_室內", "Exterior"),
            "公寓大門_室內"
        );
        assert_eq!(
            resolve_path(graph(), "Apartment_F1", "Exterior"),
            "公寓大門_室內"
        );
        assert_eq!(resolve_path(graph(), "School", "Exterior"), "學校門口_室內");
    }

    #[test]
    fn resolution_is_idempotent_on_fixed_points() {
        // resolve(P, D) == D implies resolving again yields D.
        let cases = [("Apartment_F1", "School"), ("Exterior", "公園")];
        for (current, destination) in cases {
            let first = resolve_path(graph(), current, destination);
            assert_eq!(first, destination);
            let second = resolve_path(graph(), current, &first);
            assert_eq!(second, destination);
        }
    }
}
