//! Normal consistency and winding order correction.

use std::collections::VecDeque;
use tracing::{debug, info};

use crate::Mesh;
use crate::adjacency::{MeshAdjacency, face_edges};
use crate::components::compute_components;

/// Outcome of [`orient_faces`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct OrientReport {
    /// Faces whose winding was reversed.
    pub flipped: usize,
    /// Connected components visited.
    pub components: usize,
    /// Closed components turned inside out to face outward.
    pub inverted_components: usize,
}

/// Make face winding consistent within every component.
///
/// Each component is flood-filled from its lowest face slot; a neighbour
/// traversing a shared edge in the same direction as the current face gets
/// flipped. Closed components with negative signed volume are then inverted
/// as a whole so their normals point outward.
pub fn orient_faces(mesh: &mut Mesh) -> OrientReport {
    let mut report = OrientReport::default();
    if mesh.face_count() == 0 {
        return report;
    }

    let adjacency = MeshAdjacency::build(mesh);
    let mut visited = vec![false; mesh.face_slots()];
    let mut flip = vec![false; mesh.face_slots()];
    let starts: Vec<u32> = mesh.live_faces().map(|(f, _)| f).collect();

    for start_face in starts {
        if visited[start_face as usize] {
            continue;
        }
        report.components += 1;

        let mut queue: VecDeque<u32> = VecDeque::new();
        queue.push_back(start_face);
        visited[start_face as usize] = true;

        while let Some(face_idx) = queue.pop_front() {
            let Some(face) = mesh.face(face_idx) else {
                continue;
            };
            for (v0, v1) in face_edges(face) {
                for &neighbor_idx in adjacency.faces_for_edge(v0, v1) {
                    if neighbor_idx == face_idx || visited[neighbor_idx as usize] {
                        continue;
                    }
                    visited[neighbor_idx as usize] = true;

                    let Some(neighbor_face) = mesh.face(neighbor_idx) else {
                        continue;
                    };
                    // Current face runs v0 -> v1 as stored; a consistent
                    // neighbour runs v1 -> v0.
                    let same_direction =
                        edge_direction_in_face(&neighbor_face, v0, v1).unwrap_or_default();
                    flip[neighbor_idx as usize] = same_direction != flip[face_idx as usize];
                    queue.push_back(neighbor_idx);
                }
            }
        }
    }

    for (f, &should_flip) in flip.iter().enumerate() {
        if should_flip && let Some([a, b, c]) = mesh.face(f as u32) {
            mesh.replace_face(f as u32, [a, c, b]);
            report.flipped += 1;
        }
    }

    report.inverted_components = orient_closed_outward(mesh, &adjacency);

    if report.flipped > 0 || report.inverted_components > 0 {
        info!(
            "Fixed winding order: flipped {} faces, inverted {} component(s) of {}",
            report.flipped, report.inverted_components, report.components
        );
    } else {
        debug!(
            "Winding order already consistent across {} component(s)",
            report.components
        );
    }
    report
}

/// Invert closed components whose signed volume is negative.
fn orient_closed_outward(mesh: &mut Mesh, adjacency: &MeshAdjacency) -> usize {
    let labels = compute_components(mesh);
    let count = labels.component_count();
    let mut closed = vec![true; count];
    let mut volume = vec![0.0; count];

    for (f, face) in mesh.live_faces() {
        let Some(label) = labels.label(f) else {
            continue;
        };
        let c = label as usize;
        if face_edges(face)
            .iter()
            .any(|&(a, b)| adjacency.faces_for_edge(a, b).len() != 2)
        {
            closed[c] = false;
        }
        let [p0, p1, p2] = face.map(|v| mesh.position(v).coords);
        volume[c] += p0.dot(&p1.cross(&p2)) / 6.0;
    }

    let mut inverted = 0;
    for c in 0..count {
        if !closed[c] || volume[c] >= 0.0 {
            continue;
        }
        for f in labels.faces_of(c as u32) {
            if let Some([a, b, d]) = mesh.face(f) {
                mesh.replace_face(f, [a, d, b]);
            }
        }
        inverted += 1;
    }
    inverted
}

/// Check if edge (a, b) appears in face in the same direction (a -> b).
/// Returns Some(true) if same direction, Some(false) if opposite, None if edge not found.
fn edge_direction_in_face(face: &[u32; 3], a: u32, b: u32) -> Option<bool> {
    for i in 0..3 {
        let v0 = face[i];
        let v1 = face[(i + 1) % 3];

        if v0 == a && v1 == b {
            return Some(true);
        }
        if v0 == b && v1 == a {
            return Some(false);
        }
    }
    None
}
