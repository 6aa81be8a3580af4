//! Connected component analysis for meshes.
//!
//! A connected component is a maximal set of faces reachable from one another
//! through shared edges. Components are labelled by flood fill in ascending
//! face order, so labels are deterministic for a fixed mesh state but not
//! stable across mutation.

use std::cmp::Reverse;

use hashbrown::HashMap;
use tracing::{debug, info};

use crate::Mesh;
use crate::adjacency::MeshAdjacency;
use crate::boundary::{BoundaryLoop, scan_boundaries};
use crate::error::{MeshError, MeshResult};
use crate::types::Vertex;

/// Component label of every face slot.
#[derive(Debug, Clone, Default)]
pub struct ComponentLabels {
    labels: Vec<Option<u32>>,
    sizes: Vec<usize>,
}

impl ComponentLabels {
    /// Label of face slot `f`, `None` for removed slots.
    pub fn label(&self, f: u32) -> Option<u32> {
        self.labels.get(f as usize).copied().flatten()
    }

    /// Number of components.
    pub fn component_count(&self) -> usize {
        self.sizes.len()
    }

    /// Face count of each component, indexed by label (discovery order).
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Face slots of component `label`, ascending.
    pub fn faces_of(&self, label: u32) -> Vec<u32> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == Some(label))
            .map(|(f, _)| f as u32)
            .collect()
    }
}

/// Label every live face with its component id.
///
/// Labels are assigned in discovery order: component 0 contains the lowest
/// live face slot, component 1 the lowest slot not in component 0, and so on.
pub fn compute_components(mesh: &Mesh) -> ComponentLabels {
    let adjacency = MeshAdjacency::build(mesh);
    compute_components_with(mesh, &adjacency)
}

pub(crate) fn compute_components_with(mesh: &Mesh, adjacency: &MeshAdjacency) -> ComponentLabels {
    let mut labels: Vec<Option<u32>> = vec![None; mesh.face_slots()];
    let mut sizes = Vec::new();
    let mut stack = Vec::new();

    for (start, _) in mesh.live_faces() {
        if labels[start as usize].is_some() {
            continue;
        }

        let label = sizes.len() as u32;
        let mut size = 0;
        labels[start as usize] = Some(label);
        stack.push(start);

        while let Some(f) = stack.pop() {
            size += 1;
            let Some(face) = mesh.face(f) else {
                continue;
            };
            for neighbor in adjacency.edge_neighbors(f, face) {
                if labels[neighbor as usize].is_none() {
                    labels[neighbor as usize] = Some(label);
                    stack.push(neighbor);
                }
            }
        }

        sizes.push(size);
    }

    ComponentLabels { labels, sizes }
}

/// Result of connected component analysis.
#[derive(Debug, Clone)]
pub struct ComponentAnalysis {
    /// Number of connected components found.
    pub component_count: usize,
    /// Face slots of each component, largest first; ties keep discovery order.
    pub components: Vec<Vec<u32>>,
    /// Size of the largest component (number of faces).
    pub largest_component_size: usize,
    /// Size of the smallest component (number of faces).
    pub smallest_component_size: usize,
}

impl ComponentAnalysis {
    /// Check if the mesh is fully connected (single component).
    pub fn is_connected(&self) -> bool {
        self.component_count == 1
    }

    /// Get the face slots of the largest component.
    pub fn largest_component(&self) -> &[u32] {
        self.components.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Face count of every component, largest first.
    pub fn sizes(&self) -> Vec<usize> {
        self.components.iter().map(Vec::len).collect()
    }
}

impl std::fmt::Display for ComponentAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Component Analysis:")?;
        writeln!(f, "  Connected components: {}", self.component_count)?;
        if self.component_count > 0 {
            writeln!(
                f,
                "  Largest component: {} faces",
                self.largest_component_size
            )?;
            writeln!(
                f,
                "  Smallest component: {} faces",
                self.smallest_component_size
            )?;
            if self.component_count > 1 {
                writeln!(f, "  Component sizes:")?;
                for (i, comp) in self.components.iter().enumerate() {
                    writeln!(f, "    Component {}: {} faces", i + 1, comp.len())?;
                }
            }
        }
        Ok(())
    }
}

/// Find all connected components in a mesh.
///
/// Two faces are connected if they share an edge.
///
/// # Example
/// ```
/// use mesh_fix::{Mesh, find_connected_components};
///
/// // Two disconnected triangles.
/// let mesh = Mesh::from_arrays(
///     &[
///         [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0],
///         [10.0, 0.0, 0.0], [11.0, 0.0, 0.0], [10.0, 1.0, 0.0],
///     ],
///     &[[0, 1, 2], [3, 4, 5]],
/// )
/// .unwrap();
///
/// let analysis = find_connected_components(&mesh);
/// assert_eq!(analysis.component_count, 2);
/// ```
pub fn find_connected_components(mesh: &Mesh) -> ComponentAnalysis {
    let labels = compute_components(mesh);

    let mut components: Vec<Vec<u32>> = vec![Vec::new(); labels.component_count()];
    for (f, label) in labels.labels.iter().enumerate() {
        if let Some(label) = label {
            components[*label as usize].push(f as u32);
        }
    }

    // Stable sort keeps discovery order among equal sizes.
    components.sort_by_key(|c| Reverse(c.len()));

    let component_count = components.len();
    let largest_component_size = components.first().map_or(0, Vec::len);
    let smallest_component_size = components.last().map_or(0, Vec::len);

    debug!(
        "Found {} connected component(s) in mesh with {} faces",
        component_count,
        mesh.face_count()
    );

    ComponentAnalysis {
        component_count,
        components,
        largest_component_size,
        smallest_component_size,
    }
}

/// Split a mesh into separate meshes, one per connected component.
///
/// Components come out largest first. Each mesh keeps only the vertices its
/// faces reference, in ascending order of their original slots.
pub fn split_into_components(mesh: &Mesh) -> Vec<Mesh> {
    let analysis = find_connected_components(mesh);
    let mut result = Vec::with_capacity(analysis.component_count);

    for (comp_idx, face_slots) in analysis.components.iter().enumerate() {
        let mut used: Vec<u32> = face_slots
            .iter()
            .filter_map(|&f| mesh.face(f))
            .flatten()
            .collect();
        used.sort_unstable();
        used.dedup();

        let old_to_new: HashMap<u32, u32> = used
            .iter()
            .enumerate()
            .map(|(new, &old)| (old, new as u32))
            .collect();
        let vertices: Vec<Vertex> = used
            .iter()
            .map(|&v| Vertex::new(mesh.position(v)))
            .collect();
        let faces: Vec<[u32; 3]> = face_slots
            .iter()
            .filter_map(|&f| mesh.face(f))
            .filter_map(|face| {
                Some([
                    *old_to_new.get(&face[0])?,
                    *old_to_new.get(&face[1])?,
                    *old_to_new.get(&face[2])?,
                ])
            })
            .collect();

        debug!(
            "Component {}: {} vertices, {} faces",
            comp_idx + 1,
            vertices.len(),
            faces.len()
        );
        result.push(Mesh::from_parts(vertices, faces));
    }

    result
}

/// Keep the `keep` largest components by face count and delete the rest.
///
/// Ties are broken in favour of the component discovered first. Vertices
/// orphaned by the deletion are removed too. Returns the number of
/// components removed.
///
/// # Errors
///
/// [`MeshError::InvalidParameter`] when `keep` is zero.
pub fn remove_smallest_components(mesh: &mut Mesh, keep: usize) -> MeshResult<usize> {
    if keep == 0 {
        return Err(MeshError::invalid_parameter(
            "keep",
            "at least one component must be kept",
        ));
    }

    let labels = compute_components(mesh);
    let count = labels.component_count();
    if count <= keep {
        return Ok(0);
    }

    let mut order: Vec<usize> = (0..count).collect();
    order.sort_by_key(|&c| Reverse(labels.sizes[c]));
    let mut kept = vec![false; count];
    for &c in &order[..keep] {
        kept[c] = true;
    }

    let doomed: Vec<u32> = labels
        .labels
        .iter()
        .enumerate()
        .filter_map(|(f, label)| match label {
            Some(l) if !kept[*l as usize] => Some(f as u32),
            _ => None,
        })
        .collect();
    for &f in &doomed {
        mesh.remove_face(f);
    }
    let orphans = mesh.remove_unreferenced_vertices();

    let removed = count - keep;
    info!(
        "Removed {} small component(s): {} faces, {} vertices",
        removed,
        doomed.len(),
        orphans
    );
    Ok(removed)
}

/// Outcome of [`join_closest_components`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub struct JoinReport {
    /// Bridges built.
    pub joins: usize,
    /// Faces added by all bridges.
    pub triangles_added: usize,
    /// Components before joining.
    pub components_before: usize,
    /// Components after joining.
    pub components_after: usize,
}

/// Closest vertex pair between boundary loops of two components.
struct Candidate {
    first: usize,
    first_at: usize,
    second: usize,
    second_at: usize,
    distance: f64,
}

/// Bridge nearby components until one remains.
///
/// Each step finds the closest pair of boundary vertices lying on loops of
/// different components and stitches the two loops together with a strip of
/// triangles. Joining stops when a single component remains, when no two
/// components both have open boundaries, or when the closest pair is farther
/// apart than `max_distance`.
pub fn join_closest_components(mesh: &mut Mesh, max_distance: Option<f64>) -> JoinReport {
    let mut report = JoinReport::default();

    loop {
        let adjacency = MeshAdjacency::build(mesh);
        let labels = compute_components_with(mesh, &adjacency);
        if report.joins == 0 {
            report.components_before = labels.component_count();
        }
        report.components_after = labels.component_count();
        if labels.component_count() <= 1 {
            break;
        }

        let mut loops: Vec<(u32, BoundaryLoop)> = scan_boundaries(mesh)
            .loops
            .into_iter()
            .filter_map(|boundary| {
                let (a, b) = boundary.edges().next()?;
                let face = *adjacency.faces_for_edge(a, b).first()?;
                Some((labels.label(face)?, boundary))
            })
            .collect();
        loops.sort_by_key(|(component, _)| *component);

        let Some(best) = closest_pair(mesh, &loops) else {
            debug!("No boundary loops left in distinct components");
            break;
        };
        if max_distance.is_some_and(|limit| best.distance > limit) {
            debug!(
                "Closest components are {:.6} apart, beyond the join limit",
                best.distance
            );
            break;
        }

        let added = bridge_loops(
            mesh,
            &loops[best.first].1,
            best.first_at,
            &loops[best.second].1,
            best.second_at,
        );
        debug!(
            "Joined components {} and {} ({:.6} apart) with {} triangles",
            loops[best.first].0, loops[best.second].0, best.distance, added
        );
        report.joins += 1;
        report.triangles_added += added;
    }

    if report.joins > 0 {
        info!(
            "Joined {} component pair(s): {} -> {} components",
            report.joins, report.components_before, report.components_after
        );
    }
    report
}

fn closest_pair(mesh: &Mesh, loops: &[(u32, BoundaryLoop)]) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;

    for (i, (ci, li)) in loops.iter().enumerate() {
        for (j, (cj, lj)) in loops.iter().enumerate().skip(i + 1) {
            if ci == cj {
                continue;
            }
            for (ia, &a) in li.vertices.iter().enumerate() {
                let pa = mesh.position(a);
                for (ib, &b) in lj.vertices.iter().enumerate() {
                    let distance = (mesh.position(b) - pa).norm();
                    if best.as_ref().is_none_or(|c| distance < c.distance) {
                        best = Some(Candidate {
                            first: i,
                            first_at: ia,
                            second: j,
                            second_at: ib,
                            distance,
                        });
                    }
                }
            }
        }
    }
    best
}

/// Stitch two loops with a strip of `n + m` triangles.
///
/// The strip walks `first` forward from `first_at` and `second` backward
/// from `second_at`, advancing on whichever side gives the shorter diagonal.
fn bridge_loops(
    mesh: &mut Mesh,
    first: &BoundaryLoop,
    first_at: usize,
    second: &BoundaryLoop,
    second_at: usize,
) -> usize {
    let (n, m) = (first.vertices.len(), second.vertices.len());
    let a = |i: usize| first.vertices[(first_at + i) % n];
    let b = |j: usize| second.vertices[(second_at + m - j % m) % m];

    let (mut i, mut j) = (0, 0);
    let mut added = 0;
    while i < n || j < m {
        let advance_first = if i == n {
            false
        } else if j == m {
            true
        } else {
            let via_first = (mesh.position(a(i + 1)) - mesh.position(b(j))).norm();
            let via_second = (mesh.position(a(i)) - mesh.position(b(j + 1))).norm();
            via_first <= via_second
        };

        if advance_first {
            mesh.add_face([a(i), a(i + 1), b(j)]);
            i += 1;
        } else {
            mesh.add_face([a(i), b(j + 1), b(j)]);
            j += 1;
        }
        added += 1;
    }
    added
}
