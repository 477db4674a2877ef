//! Clique candidate search over one search level's mesh.
//!
//! Only bidirectional links count: a neighbour qualifies when the mesh holds
//! the edge in both directions. The "clique" found here is a greedy triangle
//! heuristic (neighbours of the seed that are also neighbours of another
//! neighbour), not an exact maximal clique.

use smallvec::SmallVec;

use crate::ai::nav_mesh::NavMesh;
use crate::ai::waypoint::WaypointId;

pub(crate) type Candidates = SmallVec<[WaypointId; 8]>;

/// Direct bidirectional neighbours of `waypoint`, in edge order.
pub(crate) fn find_candidates(waypoint: WaypointId, nav_mesh: &NavMesh) -> Candidates {
    nav_mesh
        .edges_from(waypoint)
        .iter()
        .filter(|pair| !nav_mesh.is_one_way(pair))
        .map(|pair| pair.waypoint_to())
        .collect()
}

/// Neighbours of `seed` that close a triangle with another neighbour of
/// `seed`, in first-found order, minus anything `is_assigned` rejects.
pub(crate) fn find_cliques(
    seed: WaypointId,
    nav_mesh: &NavMesh,
    is_assigned: impl Fn(WaypointId) -> bool,
) -> Candidates {
    let candidates = find_candidates(seed, nav_mesh);
    let mut clique = Candidates::new();

    for &candidate in &candidates {
        if candidate == seed {
            continue;
        }
        for next in find_candidates(candidate, nav_mesh) {
            if next != seed && candidates.contains(&next) && !clique.contains(&next) {
                clique.push(next);
            }
        }
    }

    clique.retain(|wp| !is_assigned(*wp));
    clique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(mesh: &mut NavMesh, a: u32, b: u32) {
        mesh.add_edge(WaypointId(a), WaypointId(b), 1.0);
        mesh.add_edge(WaypointId(b), WaypointId(a), 1.0);
    }

    #[test]
    fn test_candidates_skip_one_way_edges() {
        let mut mesh = NavMesh::new();
        link(&mut mesh, 1, 2);
        mesh.add_edge(WaypointId(1), WaypointId(3), 1.0);

        let candidates = find_candidates(WaypointId(1), &mesh);
        assert_eq!(candidates.as_slice(), &[WaypointId(2)]);
        assert!(find_candidates(WaypointId(3), &mesh).is_empty());
    }

    #[test]
    fn test_triangle_is_found_from_any_corner() {
        let mut mesh = NavMesh::new();
        link(&mut mesh, 1, 2);
        link(&mut mesh, 2, 3);
        link(&mut mesh, 3, 1);

        let clique = find_cliques(WaypointId(1), &mesh, |_| false);
        assert_eq!(clique.as_slice(), &[WaypointId(3), WaypointId(2)]);
    }

    #[test]
    fn test_star_has_no_triangles() {
        let mut mesh = NavMesh::new();
        for leaf in 2..=6 {
            link(&mut mesh, 1, leaf);
        }

        assert_eq!(find_candidates(WaypointId(1), &mesh).len(), 5);
        assert!(find_cliques(WaypointId(1), &mesh, |_| false).is_empty());
        assert!(find_cliques(WaypointId(4), &mesh, |_| false).is_empty());
    }

    #[test]
    fn test_assigned_members_are_filtered() {
        let mut mesh = NavMesh::new();
        for a in 1..=4 {
            for b in (a + 1)..=4 {
                link(&mut mesh, a, b);
            }
        }

        let clique = find_cliques(WaypointId(4), &mesh, |wp| wp == WaypointId(2));
        assert_eq!(clique.as_slice(), &[WaypointId(3), WaypointId(1)]);
    }

    #[test]
    fn test_one_way_triangle_side_breaks_clique() {
        let mut mesh = NavMesh::new();
        link(&mut mesh, 1, 2);
        link(&mut mesh, 1, 3);
        mesh.add_edge(WaypointId(2), WaypointId(3), 1.0);

        assert!(find_cliques(WaypointId(1), &mesh, |_| false).is_empty());
    }
}
