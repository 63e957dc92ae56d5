//! Board graph invariants under mixed edit sequences.

use rstest::rstest;

use breadboard_core::board::{BoardState, GridPosition, InstanceId, PinDefinition, Rotation};
use breadboard_core::CircuitError;

fn two_pin() -> Vec<PinDefinition> {
    vec![
        PinDefinition::new(0, "A", GridPosition::new(0, 0)),
        PinDefinition::new(1, "B", GridPosition::new(2, 1)),
    ]
}

fn place(board: &mut BoardState, x: i32, y: i32, rotation: Rotation) -> InstanceId {
    board
        .place_component("part", GridPosition::new(x, y), rotation, &two_pin(), None)
        .unwrap()
        .id
}

/// Every connected pin agrees with its net, in both directions.
fn assert_pin_net_agreement(board: &BoardState) {
    board.check_consistency().unwrap();
    for component in board.components() {
        for pin in &component.pins {
            if let Some(net_id) = pin.connected_net {
                let net = board.net(net_id).unwrap();
                assert_eq!(
                    net.pins.iter().filter(|p| p.same_pin(component.id, pin.index)).count(),
                    1
                );
            }
        }
    }
    for net in board.nets() {
        for pin_ref in &net.pins {
            let pin = board.component(pin_ref.component).unwrap().pin(pin_ref.pin_index).unwrap();
            assert_eq!(pin.connected_net, Some(net.id));
        }
    }
}

#[rstest]
#[case(Rotation::Deg0, GridPosition::new(12, 11))]
#[case(Rotation::Deg90, GridPosition::new(11, 8))]
#[case(Rotation::Deg180, GridPosition::new(8, 9))]
#[case(Rotation::Deg270, GridPosition::new(9, 12))]
fn pin_world_position_follows_rotation(#[case] rotation: Rotation, #[case] expected: GridPosition) {
    let mut board = BoardState::default();
    let id = place(&mut board, 10, 10, rotation);
    let component = board.component(id).unwrap();
    assert_eq!(component.pin_world_position(0), Some(GridPosition::new(10, 10)));
    assert_eq!(component.pin_world_position(1), Some(expected));
}

#[test]
fn mixed_edits_keep_pins_and_nets_in_agreement() {
    let mut board = BoardState::default();
    let a = place(&mut board, 0, 0, Rotation::Deg0);
    let b = place(&mut board, 5, 0, Rotation::Deg90);
    let c = place(&mut board, 10, 0, Rotation::Deg180);

    let n1 = board.create_net("N1").unwrap().id;
    let n2 = board.create_net("N2").unwrap().id;
    board.connect_pin_to_net(n1, a, 1).unwrap();
    board.connect_pin_to_net(n1, b, 0).unwrap();
    board.connect_pin_to_net(n2, b, 1).unwrap();
    board.connect_pin_to_net(n2, c, 0).unwrap();
    let t1 = board.add_trace(n1, GridPosition::new(2, 1), GridPosition::new(5, 1)).unwrap().id;
    board.add_trace(n2, GridPosition::new(6, -2), GridPosition::new(10, -2)).unwrap();
    assert_pin_net_agreement(&board);

    // Re-adding is a no-op, moving a pin detaches it from its old net.
    board.connect_pin_to_net(n1, a, 1).unwrap();
    board.connect_pin_to_net(n2, a, 1).unwrap();
    assert_pin_net_agreement(&board);
    assert_eq!(board.net(n2).unwrap().pins.len(), 3);

    assert!(board.remove_trace(t1));
    assert!(board.net(n1).is_none());
    assert_pin_net_agreement(&board);

    assert!(board.remove_component(b));
    assert_eq!(board.net(n2).unwrap().pins.len(), 2);
    assert_pin_net_agreement(&board);

    board.disconnect_pin(c, 0).unwrap();
    assert_pin_net_agreement(&board);
}

#[test]
fn removing_last_trace_dissolves_the_net() {
    let mut board = BoardState::default();
    let a = place(&mut board, 0, 0, Rotation::Deg0);
    let b = place(&mut board, 4, 0, Rotation::Deg0);
    let net = board.create_net("SIG").unwrap().id;
    board.connect_pin_to_net(net, a, 1).unwrap();
    board.connect_pin_to_net(net, b, 0).unwrap();
    let trace = board.add_trace(net, GridPosition::new(2, 1), GridPosition::new(4, 0)).unwrap().id;

    assert!(board.remove_trace(trace));
    assert!(board.net(net).is_none());
    assert!(board.net_by_name("SIG").is_none());
    for id in [a, b] {
        assert!(board.component(id).unwrap().pins.iter().all(|p| p.connected_net.is_none()));
    }
    assert_pin_net_agreement(&board);
}

#[test]
fn occupancy_is_released_by_removal() {
    let mut board = BoardState::default();
    let id = place(&mut board, 3, 3, Rotation::Deg0);
    let again = board.place_component("part", GridPosition::new(3, 3), Rotation::Deg0, &two_pin(), None);
    assert!(matches!(again, Err(CircuitError::PositionOccupied { x: 3, y: 3 })));

    assert!(board.remove_component(id));
    assert!(!board.is_position_occupied(GridPosition::new(3, 3)));
    let replacement = place(&mut board, 3, 3, Rotation::Deg0);
    assert!(replacement.0 > id.0);
}
