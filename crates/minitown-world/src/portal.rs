//! The immutable portal graph and canonical-location aliases.
//!
//! Portals are named transition points mirroring the 3D scene: each maps
//! to one destination portal or to a list of destinations (a one-to-many
//! exit, chosen uniformly at random on traversal). A fixed alias table
//! maps portals back to the canonical location labels the client
//! understands. The graph is identical across runs.

use rand::Rng;

/// The canonical locations the front end can render.
pub const CANONICAL_LOCATIONS: [&str; 8] = [
    "Apartment_F1",
    "Apartment_F2",
    "School",
    "Rest",
    "Gym",
    "Super",
    "Subway",
    "Exterior",
];

/// Portal name -> destination portals.
const PORTAL_TARGETS: [(&str, &[&str]); 26] = [
    ("健身房_室內", &["健身房_室外"]),
    ("健身房_室外", &["健身房_室內"]),
    ("公寓一樓_室內", &["公寓二樓_室內"]),
    ("公寓二樓_室內", &["公寓頂樓_室內", "公寓一樓_室內"]),
    ("公寓側門_室內", &["公寓側門_室外"]),
    ("公寓側門_室外", &["公寓側門_室內"]),
    ("公寓大門_室內", &["公寓大門_室外"]),
    ("公寓大門_室外", &["公寓大門_室內"]),
    ("公寓頂樓_室內", &["公寓頂樓_室外", "公寓二樓_室內"]),
    ("公寓頂樓_室外", &["公寓頂樓_室內"]),
    ("地鐵上入口_室外", &["地鐵左樓梯_室內"]),
    ("地鐵下入口_室外", &["地鐵右樓梯_室內"]),
    ("地鐵右入口_室外", &["地鐵右樓梯_室內"]),
    ("地鐵右樓梯_室內", &["地鐵右入口_室外", "地鐵下入口_室外"]),
    ("地鐵左入口_室外", &["地鐵左樓梯_室內"]),
    ("地鐵左樓梯_室內", &["地鐵左入口_室外", "地鐵上入口_室外"]),
    ("學校門口_室內", &["學校門口_室外"]),
    ("學校門口_室外", &["學校門口_室內"]),
    ("超市側門_室內", &["超市側門_室外"]),
    ("超市側門_室外", &["超市側門_室內"]),
    ("超市右門_室內", &["超市右門_室外"]),
    ("超市右門_室外", &["超市右門_室內"]),
    ("超市左門_室內", &["超市左門_室外"]),
    ("超市左門_室外", &["超市左門_室內"]),
    ("餐廳_室內", &["餐廳_室外"]),
    ("餐廳_室外", &["餐廳_室內"]),
];

/// Entry portal used when approaching a building from outdoors.
const ENTRY_PORTALS: [(&str, &str); 7] = [
    ("Apartment_F1", "公寓大門_室外"),
    ("Apartment_F2", "公寓大門_室外"),
    ("School", "學校門口_室外"),
    ("Rest", "餐廳_室外"),
    ("Gym", "健身房_室外"),
    ("Super", "超市左門_室外"),
    ("Subway", "地鐵左入口_室外"),
];

/// Chinese building prefix used by portal names for each canonical
/// location.
const BUILDING_PREFIXES: [(&str, &str); 7] = [
    ("Apartment_F1", "公寓"),
    ("Apartment_F2", "公寓"),
    ("School", "學校"),
    ("Rest", "餐廳"),
    ("Gym", "健身房"),
    ("Super", "超市"),
    ("Subway", "地鐵"),
];

/// Free-text aliases for the Subway (the map-wide shelter destination).
const SUBWAY_ALIASES: [&str; 4] = ["Subway", "地鐵", "地铁", "Metro"];

/// The town's portal graph. Stateless; all data is compile-time constant.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortalGraph;

impl PortalGraph {
    /// Create the (constant) graph.
    pub const fn new() -> Self {
        Self
    }

    /// True when the name is a portal in the graph. The 餐廳_室外 exit
    /// appears only as a target, so targets count too.
    pub fn is_portal(self, name: &str) -> bool {
        PORTAL_TARGETS
            .iter()
            .any(|(portal, targets)| *portal == name || targets.contains(&name))
    }

    /// Destination portals for a portal, if known.
    pub fn targets(self, portal: &str) -> Option<&'static [&'static str]> {
        PORTAL_TARGETS
            .iter()
            .find(|(name, _)| *name == portal)
            .map(|(_, targets)| *targets)
    }

    /// Pick the exit for a traversal: the single target, or a uniformly
    /// random member of a one-to-many target list.
    pub fn choose_exit<R: Rng>(self, portal: &str, rng: &mut R) -> Option<&'static str> {
        let targets = self.targets(portal)?;
        match targets.len() {
            0 => None,
            1 => Some(targets[0]),
            n => Some(targets[rng.gen_range(0..n)]),
        }
    }

    /// Map a portal name to the canonical location label it sits in.
    pub fn canonical_for_portal(self, portal: &str) -> Option<&'static str> {
        if portal.ends_with("室外") {
            return Some("Exterior");
        }
        if !portal.ends_with("室內") {
            return None;
        }
        if portal.starts_with("地鐵") {
            return Some("Subway");
        }
        if portal.starts_with("公寓二樓") || portal.starts_with("公寓頂樓") {
            return Some("Apartment_F2");
        }
        if portal.starts_with("公寓") {
            return Some("Apartment_F1");
        }
        if portal.starts_with("學校") {
            return Some("School");
        }
        if portal.starts_with("超市") {
            return Some("Super");
        }
        if portal.starts_with("餐廳") {
            return Some("Rest");
        }
        if portal.starts_with("健身房") {
            return Some("Gym");
        }
        None
    }

    /// The exterior portal to walk to when entering a building from
    /// outdoors.
    pub fn entry_portal(self, destination: &str) -> Option<&'static str> {
        ENTRY_PORTALS
            .iter()
            .find(|(canonical, _)| *canonical == destination)
            .map(|(_, portal)| *portal)
    }

    /// The Chinese portal-name prefix for a canonical location.
    pub fn building_prefix(self, canonical: &str) -> Option<&'static str> {
        BUILDING_PREFIXES
            .iter()
            .find(|(name, _)| *name == canonical)
            .map(|(_, prefix)| *prefix)
    }

    /// The main indoor exit of a building, for walking outdoors.
    ///
    /// Prefers `<prefix>大門_室內`; falls back to the first interior
    /// portal sharing the building prefix.
    pub fn main_exit(self, canonical: &str) -> Option<&'static str> {
        let prefix = self.building_prefix(canonical)?;
        let preferred = PORTAL_TARGETS.iter().find_map(|(name, _)| {
            (name.starts_with(prefix) && name.contains("大門") && name.ends_with("室內"))
                .then_some(*name)
        });
        preferred.or_else(|| {
            PORTAL_TARGETS.iter().find_map(|(name, _)| {
                (name.starts_with(prefix) && name.ends_with("室內")).then_some(*name)
            })
        })
    }

    /// True when the text names the Subway (any alias).
    pub fn is_subway_alias(self, name: &str) -> bool {
        SUBWAY_ALIASES.contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn apartment_front_door_leads_outside() {
        let graph = PortalGraph::new();
        assert_eq!(graph.targets("公寓大門_室內"), Some(&["公寓大門_室外"][..]));
        assert_eq!(graph.canonical_for_portal("公寓大門_室外"), Some("Exterior"));
    }

    #[test]
    fn subway_stair_has_two_exits_chosen_roughly_evenly() {
        let graph = PortalGraph::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mut left = 0u32;
        let mut up = 0u32;
        for _ in 0..1000 {
            match graph.choose_exit("地鐵左樓梯_室內", &mut rng) {
                Some("地鐵左入口_室外") => left += 1,
                Some("地鐵上入口_室外") => up += 1,
                other => panic!("unexpected exit: {other:?}"),
            }
        }
        // Each exit should land in [40%, 60%] of traversals.
        assert!((400..=600).contains(&left), "left={left}");
        assert!((400..=600).contains(&up), "up={up}");
    }

    #[test]
    fn canonical_mapping_covers_interiors() {
        let graph = PortalGraph::new();
        assert_eq!(graph.canonical_for_portal("地鐵左樓梯_室內"), Some("Subway"));
        assert_eq!(graph.canonical_for_portal("公寓二樓_室內"), Some("Apartment_F2"));
        assert_eq!(graph.canonical_for_portal("公寓一樓_室內"), Some("Apartment_F1"));
        assert_eq!(graph.canonical_for_portal("學校門口_室內"), Some("School"));
        assert_eq!(graph.canonical_for_portal("餐廳_室內"), Some("Rest"));
        assert_eq!(graph.canonical_for_portal("School"), None);
    }

    #[test]
    fn entry_portals_exist_for_every_building() {
        let graph = PortalGraph::new();
        for canonical in CANONICAL_LOCATIONS {
            if canonical == "Exterior" {
                continue;
            }
            let entry = graph.entry_portal(canonical);
            assert!(entry.is_some(), "no entry portal for {canonical}");
        }
    }

    #[test]
    fn main_exit_prefers_front_doors() {
        let graph = PortalGraph::new();
        assert_eq!(graph.main_exit("Apartment_F1"), Some("公寓大門_室內"));
        // The school has no 大門; fall back to its interior gate portal.
        assert_eq!(graph.main_exit("School"), Some("學校門口_室內"));
    }

    #[test]
    fn every_portal_target_is_a_known_portal() {
        let graph = PortalGraph::new();
        for (portal, targets) in PORTAL_TARGETS {
            for target in targets {
                assert!(
                    graph.is_portal(target),
                    "{portal} points at unknown portal {target}"
                );
            }
        }
    }
}
