//! Spatial memory: the tree of places a persona knows about.
//!
//! world → sector → arena → objects. Levels are created lazily as tiles are
//! perceived and are never removed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

type Arenas = BTreeMap<String, BTreeSet<String>>;
type Sectors = BTreeMap<String, Arenas>;

/// Hierarchical location knowledge of one persona.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialMemory {
    tree: BTreeMap<String, Sectors>,
}

impl SpatialMemory {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one tile's labels into the tree.
    ///
    /// Every present label level is inserted if absent; a missing level stops
    /// the descent (a tile with a sector but no arena only adds the sector).
    pub fn learn(
        &mut self,
        world: &str,
        sector: Option<&str>,
        arena: Option<&str>,
        object: Option<&str>,
    ) {
        let sectors = self.tree.entry(world.to_string()).or_default();
        let Some(sector) = sector else { return };
        let arenas = sectors.entry(sector.to_string()).or_default();
        let Some(arena) = arena else { return };
        let objects = arenas.entry(arena.to_string()).or_default();
        if let Some(object) = object {
            objects.insert(object.to_string());
        }
    }

    /// Whether the world is known.
    #[must_use]
    pub fn knows_world(&self, world: &str) -> bool {
        self.tree.contains_key(world)
    }

    /// Known sectors of a world.
    #[must_use]
    pub fn sectors(&self, world: &str) -> Vec<&str> {
        self.tree
            .get(world)
            .map(|s| s.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Known arenas of a sector.
    #[must_use]
    pub fn arenas(&self, world: &str, sector: &str) -> Vec<&str> {
        self.tree
            .get(world)
            .and_then(|s| s.get(sector))
            .map(|a| a.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Known objects of an arena.
    #[must_use]
    pub fn objects(&self, world: &str, sector: &str, arena: &str) -> Vec<&str> {
        self.tree
            .get(world)
            .and_then(|s| s.get(sector))
            .and_then(|a| a.get(arena))
            .map(|o| o.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Comma-separated sectors for prompts.
    #[must_use]
    pub fn accessible_sectors(&self, world: &str) -> String {
        self.sectors(world).join(", ")
    }

    /// Comma-separated arenas of a `world:sector` address.
    #[must_use]
    pub fn accessible_arenas(&self, sector_address: &str) -> String {
        let mut parts = sector_address.split(':');
        match (parts.next(), parts.next()) {
            (Some(world), Some(sector)) => self.arenas(world, sector).join(", "),
            _ => String::new(),
        }
    }

    /// Comma-separated objects of a `world:sector:arena` address.
    ///
    /// Arena names are matched case-insensitively as a fallback, since the
    /// Oracle does not always preserve capitalization.
    #[must_use]
    pub fn accessible_objects(&self, arena_address: &str) -> String {
        let parts: Vec<&str> = arena_address.split(':').collect();
        let [world, sector, arena] = parts.as_slice() else {
            return String::new();
        };
        let exact = self.objects(world, sector, arena);
        if !exact.is_empty() {
            return exact.join(", ");
        }
        let lowered = arena.to_lowercase();
        self.tree
            .get(*world)
            .and_then(|s| s.get(*sector))
            .and_then(|a| a.iter().find(|(name, _)| name.to_lowercase() == lowered))
            .map(|(_, objs)| objs.iter().map(String::as_str).collect::<Vec<_>>().join(", "))
            .unwrap_or_default()
    }

    /// Number of known objects across the whole tree.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.tree
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(BTreeMap::values)
            .map(BTreeSet::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn town() -> SpatialMemory {
        let mut s = SpatialMemory::new();
        s.learn("the Ville", Some("Hobbs Cafe"), Some("cafe"), Some("counter"));
        s.learn("the Ville", Some("Hobbs Cafe"), Some("cafe"), Some("table"));
        s.learn("the Ville", Some("Hobbs Cafe"), Some("kitchen"), None);
        s.learn("the Ville", Some("park"), None, None);
        s
    }

    #[test]
    fn learn_builds_levels_lazily() {
        let s = town();
        assert_eq!(s.sectors("the Ville"), vec!["Hobbs Cafe", "park"]);
        assert_eq!(s.arenas("the Ville", "Hobbs Cafe"), vec!["cafe", "kitchen"]);
        assert!(s.arenas("the Ville", "park").is_empty());
        assert_eq!(s.object_count(), 2);
    }

    #[test]
    fn learning_again_never_removes() {
        let mut s = town();
        s.learn("the Ville", Some("Hobbs Cafe"), None, None);
        assert_eq!(s.objects("the Ville", "Hobbs Cafe", "cafe"), vec!["counter", "table"]);
    }

    #[test]
    fn accessible_strings_join_with_commas() {
        let s = town();
        assert_eq!(s.accessible_sectors("the Ville"), "Hobbs Cafe, park");
        assert_eq!(s.accessible_arenas("the Ville:Hobbs Cafe"), "cafe, kitchen");
        assert_eq!(s.accessible_objects("the Ville:Hobbs Cafe:cafe"), "counter, table");
        assert_eq!(s.accessible_objects("the Ville:Hobbs Cafe:Cafe"), "counter, table");
        assert_eq!(s.accessible_objects("the Ville:Hobbs Cafe:kitchen"), "");
        assert_eq!(s.accessible_arenas("nowhere"), "");
    }
}
