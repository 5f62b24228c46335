//! End-to-end modeling scenarios driven through the kernel facade.

use std::collections::BTreeMap;

use arbor_kernel::{
    ExtrudeFeature, FeatureOp, FeatureResult, MergeScope, ModelKernel, SketchId,
};
use arbor_kernel_constraints::SolveStatus;
use arbor_kernel_math::{Point3, Vec3};
use arbor_kernel_sketch::{Constraint, HvTarget, SketchPlane};

fn extrude_rect(
    kernel: &mut ModelKernel,
    plane: SketchPlane,
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    distance: f64,
) -> FeatureResult {
    let sketch = kernel.create_sketch(plane);
    kernel
        .sketch_mut(sketch)
        .unwrap()
        .add_rectangle(x0, y0, x1, y1);
    kernel
        .extrude_feature(&ExtrudeFeature {
            sketch,
            distance,
            direction: None,
            symmetric: false,
            op: FeatureOp::Add,
            merge: MergeScope::New,
            target: None,
        })
        .unwrap()
}

fn cut_rect(
    kernel: &mut ModelKernel,
    plane: SketchPlane,
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    distance: f64,
    target: arbor_kernel_topo::BodyId,
) -> FeatureResult {
    let sketch = kernel.create_sketch(plane);
    kernel
        .sketch_mut(sketch)
        .unwrap()
        .add_rectangle(x0, y0, x1, y1);
    kernel
        .extrude_feature(&ExtrudeFeature {
            sketch,
            distance,
            direction: None,
            symmetric: false,
            op: FeatureOp::Cut,
            merge: MergeScope::New,
            target: Some(target),
        })
        .unwrap()
}

#[test]
fn scenario_box() {
    let mut kernel = ModelKernel::new();
    let result = extrude_rect(&mut kernel, SketchPlane::xy(), 0.0, 0.0, 10.0, 10.0, 10.0);

    let (v, e, _, _, f, _, _) = kernel.model.live_counts();
    assert_eq!(f, 6);
    assert_eq!(e, 12);
    assert_eq!(v, 8);

    let mesh = kernel.tessellate(result.body).unwrap();
    let (min, max) = mesh.bounding_box().unwrap();
    assert!((min - Point3::new(0.0, 0.0, 0.0)).norm() < 1e-5);
    assert!((max - Point3::new(10.0, 10.0, 10.0)).norm() < 1e-5);
}

#[test]
fn scenario_l_notch() {
    let mut kernel = ModelKernel::new();
    // Base 4×4×4 centered in xy, z ∈ [0, 4]
    let base_plane = SketchPlane::xy();
    let base = extrude_rect(&mut kernel, base_plane, -2.0, -2.0, 2.0, 2.0, 4.0);
    // Tool 3×3×6 centered at (1.5, 1.5, 2)
    let tool_plane = SketchPlane::new(Point3::new(0.0, 0.0, -1.0), Vec3::x(), Vec3::y());
    let cut = cut_rect(&mut kernel, tool_plane, 0.0, 0.0, 3.0, 3.0, 6.0, base.body);

    // Every result vertex inside the base bounds
    for face in kernel.model.body_faces(cut.body).collect::<Vec<_>>() {
        for &loop_id in kernel.model.face_loops(face) {
            let pts = kernel.model.loop_positions(loop_id);
            // No triangular faces in a rectilinear notch
            assert!(
                pts.len() >= 4,
                "expected quads or larger, found {}-gon",
                pts.len()
            );
            for p in pts {
                assert!(p.x >= -2.0 - 1e-6 && p.x <= 2.0 + 1e-6, "x = {}", p.x);
                assert!(p.y >= -2.0 - 1e-6 && p.y <= 2.0 + 1e-6, "y = {}", p.y);
                assert!(p.z >= -1e-6 && p.z <= 4.0 + 1e-6, "z = {}", p.z);
            }
        }
    }

    let mesh = kernel.tessellate(cut.body).unwrap();
    let volume = mesh.signed_volume();
    // 64 − 2×2×4 corner notch
    assert!((volume - 48.0).abs() < 1.0, "volume {volume}, expected ≈ 48");
}

#[test]
fn scenario_through_hole() {
    let mut kernel = ModelKernel::new();
    // Base 4×4×2 at z ∈ [0, 2]
    let base = extrude_rect(&mut kernel, SketchPlane::xy(), 0.0, 0.0, 4.0, 4.0, 2.0);
    // Tool 2×2×6 at z ∈ [−2, 4] centered in xy
    let tool_plane = SketchPlane::new(Point3::new(0.0, 0.0, -2.0), Vec3::x(), Vec3::y());
    let cut = cut_rect(&mut kernel, tool_plane, 1.0, 1.0, 3.0, 3.0, 6.0, base.body);

    let faces = kernel.model.body_faces(cut.body).count();
    assert!(
        (8..=14).contains(&faces),
        "through-hole face count {faces} outside 8..=14"
    );
    for face in kernel.model.body_faces(cut.body).collect::<Vec<_>>() {
        for &loop_id in kernel.model.face_loops(face) {
            for p in kernel.model.loop_positions(loop_id) {
                assert!(p.x >= -1e-6 && p.x <= 4.0 + 1e-6);
                assert!(p.y >= -1e-6 && p.y <= 4.0 + 1e-6);
                assert!(p.z >= -1e-6 && p.z <= 2.0 + 1e-6);
            }
        }
    }
}

#[test]
fn scenario_angled_cut() {
    let mut kernel = ModelKernel::new();
    // Base rect on the YZ plane extruded +X by 10: y ∈ [−5,13], z ∈ [−12,12]
    let base = extrude_rect(
        &mut kernel,
        SketchPlane::yz(),
        -5.0,
        -12.0,
        13.0,
        12.0,
        10.0,
    );

    // Tool on XY with an oblique edge (−5,2) → (15,9), extruded +Z by 10
    let sketch = kernel.create_sketch(SketchPlane::xy());
    {
        let s = kernel.sketch_mut(sketch).unwrap();
        let a = s.add_point(-5.0, 2.0);
        let b = s.add_point(15.0, 9.0);
        let c = s.add_point(15.0, 25.0);
        let d = s.add_point(-5.0, 25.0);
        s.add_line(a, b).unwrap();
        s.add_line(b, c).unwrap();
        s.add_line(c, d).unwrap();
        s.add_line(d, a).unwrap();
    }
    let cut = kernel
        .extrude_feature(&ExtrudeFeature {
            sketch,
            distance: 10.0,
            direction: None,
            symmetric: false,
            op: FeatureOp::Cut,
            merge: MergeScope::New,
            target: Some(base.body),
        })
        .unwrap();

    let mesh = kernel.tessellate(cut.body).unwrap();
    for n in mesh.normals.chunks(3) {
        assert!(
            n.iter().all(|v| v.is_finite()),
            "NaN normal in angled-cut mesh"
        );
    }
    let (min, max) = mesh.bounding_box().unwrap();
    assert!((min - Point3::new(0.0, -5.0, -12.0)).norm() < 1e-4, "min {min:?}");
    assert!((max - Point3::new(10.0, 13.0, 12.0)).norm() < 1e-4, "max {max:?}");
}

#[test]
fn scenario_coincident_union() {
    let mut kernel = ModelKernel::new();
    let a = extrude_rect(&mut kernel, SketchPlane::xy(), 0.0, 0.0, 2.0, 2.0, 2.0);
    let b = extrude_rect(&mut kernel, SketchPlane::xy(), 2.0, 0.0, 4.0, 2.0, 2.0);

    let out = kernel
        .boolean(a.body, b.body, arbor_kernel_booleans::BooleanOp::Union)
        .unwrap();
    let faces = kernel.model.body_faces(out.body).count();
    assert!((6..=12).contains(&faces), "face count {faces}");
    for face in kernel.model.body_faces(out.body).collect::<Vec<_>>() {
        assert!(!kernel.model.face_loops(face).is_empty());
    }
}

#[test]
fn scenario_constrained_rectangle_solve() {
    let mut kernel = ModelKernel::new();
    let id: SketchId = kernel.create_sketch(SketchPlane::xy());
    let (p0, p1, p2, p3);
    {
        let sketch = kernel.sketch_mut(id).unwrap();
        p0 = sketch.add_point(0.2, -0.1);
        p1 = sketch.add_point(9.0, 0.4);
        p2 = sketch.add_point(9.5, 4.6);
        p3 = sketch.add_point(-0.4, 5.2);
        sketch.add_constraint(Constraint::Horizontal(HvTarget::Points(p0, p1)));
        sketch.add_constraint(Constraint::Vertical(HvTarget::Points(p1, p2)));
        sketch.add_constraint(Constraint::Horizontal(HvTarget::Points(p2, p3)));
        sketch.add_constraint(Constraint::Vertical(HvTarget::Points(p3, p0)));
        sketch.add_constraint(Constraint::Distance {
            a: p0,
            b: p1,
            value: 10.0,
        });
        sketch.add_constraint(Constraint::Distance {
            a: p1,
            b: p2,
            value: 5.0,
        });
        sketch.add_constraint(Constraint::Fixed { point: p0 });
    }

    let report = kernel.solve_sketch(id).unwrap();
    assert_eq!(report.outcome.status, SolveStatus::Solved);
    assert_eq!(report.outcome.dof, 1, "one remaining freedom expected");
    assert!(
        report.outcome.max_residual < 1e-8,
        "max residual {}",
        report.outcome.max_residual
    );

    let sketch = kernel.sketch(id).unwrap();
    let a = sketch.point_position(p0).unwrap();
    let b = sketch.point_position(p1).unwrap();
    let c = sketch.point_position(p2).unwrap();
    assert!(((b - a).norm() - 10.0).abs() < 1e-8);
    assert!(((c - b).norm() - 5.0).abs() < 1e-8);
}

#[test]
fn scenario_drag_solved_rectangle() {
    let mut kernel = ModelKernel::new();
    let id = kernel.create_sketch(SketchPlane::xy());
    let (a, b);
    {
        let sketch = kernel.sketch_mut(id).unwrap();
        a = sketch.add_fixed_point(0.0, 0.0);
        b = sketch.add_point(10.0, 0.0);
        sketch.add_constraint(Constraint::Distance { a, b, value: 10.0 });
    }
    let mut driven = BTreeMap::new();
    driven.insert(b, arbor_kernel_math::Point2::new(0.0, 15.0));
    let report = kernel.solve_sketch_driven(id, &driven).unwrap();
    assert_eq!(report.outcome.status, SolveStatus::Solved);
    let pos = kernel.sketch(id).unwrap().point_position(b).unwrap();
    assert!((pos.coords.norm() - 10.0).abs() < 1e-6);
    assert!(pos.y > 9.0, "dragged point should rotate upward, got {pos:?}");
}

#[test]
fn scenario_profile_to_mesh_roundtrip_with_hole() {
    let mut kernel = ModelKernel::new();
    let id = kernel.create_sketch(SketchPlane::xy());
    {
        let sketch = kernel.sketch_mut(id).unwrap();
        sketch.add_rectangle(0.0, 0.0, 10.0, 10.0);
        let c = sketch.add_point(5.0, 5.0);
        sketch.add_circle(c, 2.0).unwrap();
    }
    let result = kernel
        .extrude_feature(&ExtrudeFeature {
            sketch: id,
            distance: 5.0,
            direction: None,
            symmetric: false,
            op: FeatureOp::Add,
            merge: MergeScope::New,
            target: None,
        })
        .unwrap();

    let mesh = kernel.tessellate(result.body).unwrap();
    let volume = mesh.signed_volume();
    let expected = 500.0 - std::f64::consts::PI * 4.0 * 5.0;
    assert!(
        (volume - expected).abs() < expected * 0.02,
        "volume {volume}, expected ≈ {expected}"
    );
}
