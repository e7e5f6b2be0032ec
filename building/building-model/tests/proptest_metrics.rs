//! Property tests for building metrics.

#![allow(clippy::unwrap_used)]

use building_model::{
    compute_metrics, AlignmentResult, AssemblyParams, GlobalCoordinateSystem, IcpState,
    RigidTransform,
};
use building_types::{Point3, Room, RoomBoundary, Vector3};
use nalgebra::UnitQuaternion;
use proptest::prelude::*;

fn room_strategy() -> impl Strategy<Value = Room> {
    (0.5..10.0_f64, 0.5..10.0_f64, prop::option::of(2.0..4.0_f64), any::<bool>()).prop_map(
        |(width, depth, height, has_boundary)| {
            let mut room = Room::new("room");
            if has_boundary {
                let boundary = RoomBoundary::rectangle(Point3::origin(), width, depth).unwrap();
                room = room.with_boundary(boundary);
            }
            if let Some(h) = height {
                room = room.with_ceiling_height(h);
            }
            room
        },
    )
}

fn chain_strategy(rooms: usize) -> impl Strategy<Value = Vec<AlignmentResult>> {
    prop::collection::vec((-5.0..5.0_f64, -5.0..5.0_f64, -1.0..1.0_f64), rooms.saturating_sub(1))
        .prop_map(|steps| {
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (x, y, yaw))| AlignmentResult {
                    source_room: i + 1,
                    target_room: i,
                    transform: RigidTransform::new(
                        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
                        Vector3::new(x, y, 0.0),
                    ),
                    rms_error: 0.01,
                    confidence: 0.99,
                    iterations: 4,
                    state: IcpState::Converged,
                    correspondence_count: 100,
                    overlap_ratio: 0.8,
                })
                .collect()
        })
}

fn building_strategy() -> impl Strategy<Value = (Vec<Room>, Vec<AlignmentResult>)> {
    prop::collection::vec(room_strategy(), 0..6)
        .prop_flat_map(|rooms| {
            let n = rooms.len();
            (Just(rooms), chain_strategy(n))
        })
}

proptest! {
    #[test]
    fn metrics_are_bit_identical_on_rerun((rooms, chain) in building_strategy()) {
        let frame = GlobalCoordinateSystem::from_chain(&chain, rooms.len());
        let params = AssemblyParams::default();

        let first = compute_metrics(&rooms, &frame, &params);
        let second = compute_metrics(&rooms, &frame, &params);

        prop_assert_eq!(first.total_floor_area.to_bits(), second.total_floor_area.to_bits());
        prop_assert_eq!(first.total_volume.to_bits(), second.total_volume.to_bits());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn area_and_volume_do_not_depend_on_placement((rooms, chain) in building_strategy()) {
        let params = AssemblyParams::default();
        let placed_frame = GlobalCoordinateSystem::from_chain(&chain, rooms.len());
        let stacked_frame = GlobalCoordinateSystem::from_chain(&[], rooms.len());
        let placed = compute_metrics(&rooms, &placed_frame, &params);
        let stacked = compute_metrics(&rooms, &stacked_frame, &params);

        prop_assert_eq!(placed.total_floor_area.to_bits(), stacked.total_floor_area.to_bits());
        prop_assert_eq!(placed.total_volume.to_bits(), stacked.total_volume.to_bits());
        prop_assert_eq!(placed.room_count, rooms.len());
    }

    #[test]
    fn volume_is_bounded_by_heights((rooms, chain) in building_strategy()) {
        let frame = GlobalCoordinateSystem::from_chain(&chain, rooms.len());
        let metrics = compute_metrics(&rooms, &frame, &AssemblyParams::default());

        // Measured heights are in [2, 4] and the fallback is 2.5
        prop_assert!(metrics.total_volume >= 2.0 * metrics.total_floor_area - 1e-9);
        prop_assert!(metrics.total_volume <= 4.0 * metrics.total_floor_area + 1e-9);
    }

    #[test]
    fn bounding_box_contains_every_vertex((rooms, chain) in building_strategy()) {
        let frame = GlobalCoordinateSystem::from_chain(&chain, rooms.len());
        let metrics = compute_metrics(&rooms, &frame, &AssemblyParams::default());

        let mut any_boundary = false;
        for (i, room) in rooms.iter().enumerate() {
            if let Some(boundary) = &room.boundary {
                any_boundary = true;
                for v in boundary.vertices() {
                    prop_assert!(metrics.bounding_box.contains(&frame.to_global(i, v)));
                }
            }
        }
        prop_assert_eq!(metrics.bounding_box.is_empty(), !any_boundary);
    }
}
