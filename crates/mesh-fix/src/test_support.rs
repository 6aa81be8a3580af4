//! Shared mesh fixtures for unit tests.

use crate::Mesh;

pub(crate) const CUBE_VERTICES: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0],
];

/// Outward-wound unit cube faces; 2 and 3 are the top (z = 1).
pub(crate) const CUBE_FACES: [[i64; 3]; 12] = [
    [0, 2, 1],
    [0, 3, 2],
    [4, 5, 6],
    [4, 6, 7],
    [0, 1, 5],
    [0, 5, 4],
    [3, 7, 6],
    [3, 6, 2],
    [0, 4, 7],
    [0, 7, 3],
    [1, 2, 6],
    [1, 6, 5],
];

pub(crate) fn unit_cube() -> Mesh {
    Mesh::from_arrays(&CUBE_VERTICES, &CUBE_FACES).unwrap()
}

/// Unit cube scaled and shifted, for multi-component fixtures.
pub(crate) fn cube_at(offset: [f64; 3], size: f64) -> (Vec<[f64; 3]>, Vec<[i64; 3]>) {
    let vertices = CUBE_VERTICES
        .iter()
        .map(|v| {
            [
                v[0] * size + offset[0],
                v[1] * size + offset[1],
                v[2] * size + offset[2],
            ]
        })
        .collect();
    (vertices, CUBE_FACES.to_vec())
}

/// Unit cube with the top face (two triangles) missing.
pub(crate) fn open_cube() -> Mesh {
    let faces: Vec<[i64; 3]> = CUBE_FACES
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 2 && *i != 3)
        .map(|(_, f)| *f)
        .collect();
    Mesh::from_arrays(&CUBE_VERTICES, &faces).unwrap()
}

/// Lower cube open at the top, upper cube open at the bottom, one unit apart.
pub(crate) fn facing_open_cubes() -> Mesh {
    let open = |(vertices, faces): (Vec<[f64; 3]>, Vec<[i64; 3]>), skip: [usize; 2]| {
        let faces = faces
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !skip.contains(i))
            .map(|(_, f)| f)
            .collect();
        (vertices, faces)
    };
    merge_parts(&[
        open(cube_at([0.0; 3], 1.0), [2, 3]),
        open(cube_at([0.0, 0.0, 2.0], 1.0), [0, 1]),
    ])
}

/// Concatenate several `(vertices, faces)` parts into one mesh.
pub(crate) fn merge_parts(parts: &[(Vec<[f64; 3]>, Vec<[i64; 3]>)]) -> Mesh {
    let mut vertices = Vec::new();
    let mut faces = Vec::new();
    for (v, f) in parts {
        let base = vertices.len() as i64;
        vertices.extend_from_slice(v);
        faces.extend(f.iter().map(|t| [t[0] + base, t[1] + base, t[2] + base]));
    }
    Mesh::from_arrays(&vertices, &faces).unwrap()
}

/// Octahedron-subdivided sphere, closed and outward wound.
pub(crate) fn sphere(subdivisions: usize) -> Mesh {
    let (vertices, faces) = sphere_arrays(subdivisions, 1.0, [0.0; 3]);
    Mesh::from_arrays(&vertices, &faces).unwrap()
}

pub(crate) fn sphere_arrays(
    subdivisions: usize,
    radius: f64,
    center: [f64; 3],
) -> (Vec<[f64; 3]>, Vec<[i64; 3]>) {
    use hashbrown::HashMap;

    let mut vertices: Vec<[f64; 3]> = vec![
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
    ];
    let mut faces: Vec<[i64; 3]> = vec![
        [0, 2, 4],
        [2, 1, 4],
        [1, 3, 4],
        [3, 0, 4],
        [2, 0, 5],
        [1, 2, 5],
        [3, 1, 5],
        [0, 3, 5],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(i64, i64), i64> = HashMap::new();
        let mut next = Vec::with_capacity(faces.len() * 4);
        for [a, b, c] in faces {
            let mut mid = |i: i64, j: i64| -> i64 {
                let key = if i < j { (i, j) } else { (j, i) };
                *midpoints.entry(key).or_insert_with(|| {
                    let (p, q) = (vertices[i as usize], vertices[j as usize]);
                    let m = [(p[0] + q[0]) / 2.0, (p[1] + q[1]) / 2.0, (p[2] + q[2]) / 2.0];
                    let len = (m[0] * m[0] + m[1] * m[1] + m[2] * m[2]).sqrt();
                    vertices.push([m[0] / len, m[1] / len, m[2] / len]);
                    vertices.len() as i64 - 1
                })
            };
            let ab = mid(a, b);
            let bc = mid(b, c);
            let ca = mid(c, a);
            next.extend([[a, ab, ca], [ab, b, bc], [ca, bc, c], [ab, bc, ca]]);
        }
        faces = next;
    }

    let vertices = vertices
        .into_iter()
        .map(|v| {
            [
                v[0] * radius + center[0],
                v[1] * radius + center[1],
                v[2] * radius + center[2],
            ]
        })
        .collect();
    (vertices, faces)
}
