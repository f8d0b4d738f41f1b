//! Spatial index of reported player positions.
//!
//! Uses an R-tree to find candidate players near a point, then filters by
//! great-circle distance.

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::geo_utils::{haversine_distance, radius_bounds};
use crate::{Coordinate, PlayerId, PlayerLocationRecord};

/// A player's position wrapped for R-tree indexing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceEntry {
    pub player_id: PlayerId,
    pub coordinate: Coordinate,
}

impl RTreeObject for PresenceEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.coordinate.longitude, self.coordinate.latitude])
    }
}

impl PointDistance for PresenceEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.coordinate.longitude - point[0];
        let dy = self.coordinate.latitude - point[1];
        dx * dx + dy * dy
    }
}

/// Spatial index for nearby-player queries.
///
/// Maintains an R-tree of positions with dirty tracking; callers rebuild
/// lazily with [`ensure_built`](Self::ensure_built) before querying.
#[derive(Debug)]
pub struct PresenceIndex {
    tree: RTree<PresenceEntry>,
    dirty: bool,
}

impl Default for PresenceIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceIndex {
    /// Create a new empty presence index.
    pub fn new() -> Self {
        Self {
            tree: RTree::new(),
            dirty: false,
        }
    }

    /// Mark the index as needing rebuild.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Check if the index needs rebuild.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuild the index from the records that should be searchable.
    pub fn rebuild<'a>(&mut self, records: impl IntoIterator<Item = &'a PlayerLocationRecord>) {
        let entries: Vec<PresenceEntry> = records
            .into_iter()
            .map(|r| PresenceEntry {
                player_id: r.player_id,
                coordinate: r.coordinate,
            })
            .collect();

        self.tree = RTree::bulk_load(entries);
        self.dirty = false;
    }

    /// Ensure the index is up to date.
    pub fn ensure_built<'a>(&mut self, records: impl IntoIterator<Item = &'a PlayerLocationRecord>) {
        if self.dirty {
            self.rebuild(records);
        }
    }

    /// Clear the index.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
        self.dirty = false;
    }

    /// Players within `radius_meters` (great-circle) of `center`.
    ///
    /// A search box crossing the antimeridian is split in two, so players on
    /// either side of ±180° longitude are found.
    pub fn within_radius(&self, center: &Coordinate, radius_meters: f64) -> Vec<PresenceEntry> {
        let b = radius_bounds(center, radius_meters);

        let mut spans = Vec::with_capacity(2);
        if b.max_lng - b.min_lng >= 360.0 {
            spans.push((-180.0, 180.0));
        } else {
            spans.push((b.min_lng.max(-180.0), b.max_lng.min(180.0)));
            if b.min_lng < -180.0 {
                spans.push((b.min_lng + 360.0, 180.0));
            }
            if b.max_lng > 180.0 {
                spans.push((-180.0, b.max_lng - 360.0));
            }
        }

        let mut found = Vec::new();
        for (min_lng, max_lng) in spans {
            let search = AABB::from_corners([min_lng, b.min_lat], [max_lng, b.max_lat]);
            found.extend(
                self.tree
                    .locate_in_envelope(&search)
                    .filter(|e| haversine_distance(center, &e.coordinate) <= radius_meters)
                    .copied(),
            );
        }
        found
    }

    /// The indexed player closest to `center` (planar degrees, for display).
    pub fn nearest(&self, center: &Coordinate) -> Option<PresenceEntry> {
        self.tree
            .nearest_neighbor(&[center.longitude, center.latitude])
            .copied()
    }

    /// Get the number of indexed players.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
