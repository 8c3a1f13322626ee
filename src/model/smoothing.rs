//! Named smoothing groups partitioning the polygons of a model

use super::PolygonId;
use std::collections::{BTreeMap, BTreeSet};

/// Named, disjoint groups of polygons whose vertex normals are averaged
/// when the render mesh is compiled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmoothingGroups {
    groups: BTreeMap<String, BTreeSet<PolygonId>>,
}

impl SmoothingGroups {
    /// Put `ids` into group `name`, taking them out of any other group so
    /// each polygon stays in at most one.
    pub fn add_polygons(&mut self, name: &str, ids: impl IntoIterator<Item = PolygonId>) {
        let ids: BTreeSet<PolygonId> = ids.into_iter().collect();
        for (group, members) in self.groups.iter_mut() {
            if group != name {
                members.retain(|id| !ids.contains(id));
            }
        }
        self.groups.retain(|group, members| group == name || !members.is_empty());
        self.groups.entry(name.to_string()).or_default().extend(ids);
    }

    pub fn remove_polygon(&mut self, id: PolygonId) {
        for members in self.groups.values_mut() {
            members.remove(&id);
        }
        self.groups.retain(|_, members| !members.is_empty());
    }

    pub fn remove_group(&mut self, name: &str) -> Option<BTreeSet<PolygonId>> {
        self.groups.remove(name)
    }

    pub fn group_of(&self, id: PolygonId) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, members)| members.contains(&id))
            .map(|(name, _)| name.as_str())
    }

    pub fn group(&self, name: &str) -> Option<&BTreeSet<PolygonId>> {
        self.groups.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<PolygonId>)> {
        self.groups.iter().map(|(name, members)| (name.as_str(), members))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    /// Drop ids for which `exists` is false, and any group left empty.
    pub fn retain_existing(&mut self, exists: impl Fn(PolygonId) -> bool) {
        for members in self.groups.values_mut() {
            members.retain(|id| exists(*id));
        }
        self.groups.retain(|_, members| !members.is_empty());
    }

    /// First `{prefix}{n}` (n counting from 0) not already taken.
    pub fn next_free_name(&self, prefix: &str) -> String {
        (0..)
            .map(|n| format!("{prefix}{n}"))
            .find(|name| !self.groups.contains_key(name))
            .unwrap_or_else(|| prefix.to_string())
    }
}
