//! Property tests over random shapes and grids.

use std::fs;

use basicshapes::*;
use proptest::prelude::*;

fn arb_kind() -> impl Strategy<Value = ShapeKind> {
    let len = 0.5f64..5.0;
    prop_oneof![
        len.clone().prop_map(|radius| ShapeKind::Sphere { radius }),
        [len.clone(), len.clone(), len.clone()].prop_map(|radii| ShapeKind::Ellipsoid { radii }),
        (len.clone(), len.clone()).prop_map(|(radius, half_length)| ShapeKind::Cylinder {
            radius,
            half_length
        }),
        [len.clone(), len.clone(), len.clone()]
            .prop_map(|half_extents| ShapeKind::Cuboid { half_extents }),
        (1.0f64..5.0, 0.2f64..1.0).prop_map(|(major_radius, minor_radius)| ShapeKind::Torus {
            major_radius,
            minor_radius
        }),
        (len.clone(), len).prop_map(|(radius, half_length)| ShapeKind::Capsule {
            radius,
            half_length
        }),
    ]
}

fn arb_shape() -> impl Strategy<Value = ShapeDescriptor> {
    (
        arb_kind(),
        [-2.0f64..14.0, -2.0f64..14.0, -2.0f64..14.0],
        prop::option::of([-180.0f64..180.0, -180.0f64..180.0, -180.0f64..180.0]),
        1u8..20,
    )
        .prop_map(|(kind, center, euler, label)| {
            let shape = ShapeDescriptor::new(kind, DVec3::from_array(center), f64::from(label));
            match euler {
                Some(degrees) => shape.with_rotation(
                    Rotation::EulerDegrees(degrees)
                        .to_quat()
                        .expect("finite angles"),
                ),
                None => shape,
            }
        })
}

fn arb_grid() -> impl Strategy<Value = GridSpec> {
    (
        [4u32..14, 4u32..14, 4u32..14],
        [0.5f64..1.5, 0.5f64..1.5, 0.5f64..1.5],
    )
        .prop_map(|(dims, spacing)| {
            GridSpec::new(UVec3::from_array(dims), DVec3::from_array(spacing))
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn rasterize_matches_predicate(shape in arb_shape(), grid in arb_grid()) {
        let volume: VolumeGrid<u8> =
            rasterize(&shape, &grid, &RasterOptions::default()).unwrap();
        prop_assert_eq!(volume.data().len(), grid.num_voxels());
        let label = shape.label as u8;
        for (idx, value) in volume.data().iter().enumerate() {
            let ijk = grid.unflatten_index(idx);
            let inside = shape.contains_world(grid.voxel_center(ijk.x, ijk.y, ijk.z));
            prop_assert_eq!(*value, if inside { label } else { 0 });
        }
    }

    #[test]
    fn max_and_add_are_commutative(
        a in arb_shape(),
        b in arb_shape(),
        grid in arb_grid(),
    ) {
        let options = RasterOptions::default();
        for policy in [CompositePolicy::Max, CompositePolicy::Add] {
            let ab: CompositeVolume<u16> = assemble(vec![a, b], &grid, policy, &options).unwrap();
            let ba: CompositeVolume<u16> = assemble(vec![b, a], &grid, policy, &options).unwrap();
            prop_assert_eq!(ab.data(), ba.data());
        }
    }

    #[test]
    fn overwrite_keeps_last_label(
        a in arb_shape(),
        b in arb_shape(),
        grid in arb_grid(),
    ) {
        let volume: CompositeVolume<u8> =
            assemble(vec![a, b], &grid, CompositePolicy::Overwrite, &RasterOptions::default())
                .unwrap();
        for idx in footprint(&b, &grid).unwrap().indices() {
            prop_assert_eq!(volume.data()[idx], b.label as u8);
        }
    }

    #[test]
    fn write_then_read_is_identical(
        shapes in prop::collection::vec(arb_shape(), 1..4),
        grid in arb_grid(),
    ) {
        let volume: CompositeVolume<f32> =
            assemble(shapes, &grid, CompositePolicy::Add, &RasterOptions::default()).unwrap();
        let dir = std::env::temp_dir().join(format!("basicshapes-prop-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("roundtrip.bsv");
        write(&volume, &path).unwrap();
        let back: CompositeVolume<f32> = read(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let bits = |v: &CompositeVolume<f32>| v.data().iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        prop_assert_eq!(bits(&back), bits(&volume));
        prop_assert_eq!(back.shapes(), volume.shapes());
        prop_assert_eq!(back.spec(), volume.spec());
    }
}
