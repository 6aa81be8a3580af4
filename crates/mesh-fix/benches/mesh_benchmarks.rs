//! Benchmarks for mesh-fix operations.
//!
//! Run with: cargo bench -p mesh-fix
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-fix -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-fix -- --baseline main

use std::hint::black_box;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use mesh_fix::{
    DiagnosticsOptions, Mesh, RepairParams, clean, diagnose, fill_boundaries_under,
    find_intersecting_triangles, repair,
};

// =============================================================================
// Test Mesh Generation
// =============================================================================

type Parts = (Vec<[f64; 3]>, Vec<[i64; 3]>);

/// Octahedron subdivided `level` times; 8 * 4^level triangles.
fn sphere_parts(level: usize, center: [f64; 3]) -> Parts {
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

    for _ in 0..level {
        let mut midpoints = std::collections::HashMap::new();
        let mut next = Vec::with_capacity(faces.len() * 4);
        for [a, b, c] in faces {
            let mut mid = |i: i64, j: i64| -> i64 {
                *midpoints.entry((i.min(j), i.max(j))).or_insert_with(|| {
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

    for v in &mut vertices {
        for (c, offset) in v.iter_mut().zip(center) {
            *c += offset;
        }
    }
    (vertices, faces)
}

fn create_sphere(level: usize) -> Mesh {
    let (vertices, faces) = sphere_parts(level, [0.0; 3]);
    Mesh::from_arrays(&vertices, &faces).unwrap()
}

/// Two overlapping spheres, so every intersection stage has work to do.
fn create_overlapping_spheres(level: usize) -> Mesh {
    let (mut vertices, mut faces) = sphere_parts(level, [0.0; 3]);
    let (v2, f2) = sphere_parts(level, [0.9, 0.1, 0.05]);
    let base = vertices.len() as i64;
    vertices.extend(v2);
    faces.extend(f2.into_iter().map(|f| f.map(|i| i + base)));
    Mesh::from_arrays(&vertices, &faces).unwrap()
}

/// Sphere with every face inside a polar cap removed, leaving one large hole.
fn create_capped_sphere(level: usize) -> Mesh {
    let (vertices, faces) = sphere_parts(level, [0.0; 3]);
    let faces: Vec<[i64; 3]> = faces
        .into_iter()
        .filter(|f| !f.iter().all(|&i| vertices[i as usize][2] > 0.7))
        .collect();
    Mesh::from_arrays(&vertices, &faces).unwrap()
}

// =============================================================================
// Diagnostics Benchmarks
// =============================================================================

fn bench_diagnose(c: &mut Criterion) {
    let mut group = c.benchmark_group("Diagnose");

    for level in [2, 3, 4, 5] {
        let mesh = create_sphere(level);
        group.throughput(Throughput::Elements(mesh.face_count() as u64));
        group.bench_with_input(
            BenchmarkId::new("sphere", mesh.face_count()),
            &mesh,
            |b, mesh| b.iter(|| diagnose(black_box(mesh), &DiagnosticsOptions::default())),
        );
    }

    group.finish();
}

// =============================================================================
// Intersection Benchmarks
// =============================================================================

fn bench_intersection(c: &mut Criterion) {
    let mut group = c.benchmark_group("Intersection");

    for level in [2, 3, 4] {
        let mesh = create_overlapping_spheres(level);
        group.throughput(Throughput::Elements(mesh.face_count() as u64));

        for capacity in [10, 50, 200] {
            group.bench_with_input(
                BenchmarkId::new(format!("capacity_{capacity}"), mesh.face_count()),
                &mesh,
                |b, mesh| b.iter(|| find_intersecting_triangles(black_box(mesh), capacity)),
            );
        }
    }

    group.finish();
}

// =============================================================================
// Hole Filling Benchmarks
// =============================================================================

fn bench_hole_filling(c: &mut Criterion) {
    let mut group = c.benchmark_group("HoleFilling");

    for level in [3, 4, 5] {
        let mesh = create_capped_sphere(level);
        for refine in [false, true] {
            let name = if refine { "refined" } else { "coarse" };
            group.bench_with_input(
                BenchmarkId::new(name, mesh.face_count()),
                &mesh,
                |b, mesh| {
                    b.iter_batched(
                        || mesh.clone(),
                        |mut m| fill_boundaries_under(&mut m, 0, refine),
                        BatchSize::SmallInput,
                    )
                },
            );
        }
    }

    group.finish();
}

// =============================================================================
// Clean Loop and Full Pipeline Benchmarks
// =============================================================================

fn bench_clean(c: &mut Criterion) {
    let mut group = c.benchmark_group("Clean");
    group.sample_size(20);

    for level in [2, 3] {
        let mesh = create_overlapping_spheres(level);
        group.bench_with_input(
            BenchmarkId::new("overlapping_spheres", mesh.face_count()),
            &mesh,
            |b, mesh| {
                b.iter_batched(
                    || mesh.clone(),
                    |mut m| clean(&mut m, 10, 3),
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_repair(c: &mut Criterion) {
    let mut group = c.benchmark_group("Repair");
    group.sample_size(20);

    let cases = [
        ("capped_sphere", create_capped_sphere(4)),
        ("clean_sphere", create_sphere(4)),
    ];
    for (name, mesh) in &cases {
        group.bench_with_input(BenchmarkId::new("default", name), mesh, |b, mesh| {
            b.iter_batched(
                || mesh.clone(),
                |mut m| repair(&mut m, &RepairParams::default()),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(
    benches,
    bench_diagnose,
    bench_intersection,
    bench_hole_filling,
    bench_clean,
    bench_repair,
);

criterion_main!(benches);
