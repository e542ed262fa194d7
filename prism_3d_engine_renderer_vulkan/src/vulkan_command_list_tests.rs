//! Unit tests for vulkan_command_list.rs (no GPU required)

use super::*;

#[test]
fn test_viewport_is_flipped_onto_the_same_rows() {
    let viewport = Viewport { x: 10.0, y: 20.0, width: 640.0, height: 480.0, min_depth: 0.0, max_depth: 1.0 };
    let flipped = flipped_viewport(&viewport);

    assert_eq!(flipped.x, 10.0);
    assert_eq!(flipped.width, 640.0);
    // Origin moves to the bottom edge and the height goes negative
    assert_eq!(flipped.y, 500.0);
    assert_eq!(flipped.height, -480.0);
    assert_eq!(flipped.y + flipped.height, viewport.y);
    assert_eq!((flipped.min_depth, flipped.max_depth), (0.0, 1.0));
}

#[test]
fn test_full_target_viewport() {
    let flipped = flipped_viewport(&Viewport::from_size(1280, 720));
    assert_eq!(flipped.y, 720.0);
    assert_eq!(flipped.height, -720.0);
}

#[test]
fn test_slots_past_the_last_binding_are_rejected() {
    assert_eq!(check_slot(0, "Texture").unwrap(), 0);
    assert_eq!(check_slot(SLOTS_PER_KIND - 1, "Texture").unwrap(), (SLOTS_PER_KIND - 1) as usize);
    assert!(check_slot(SLOTS_PER_KIND, "Sampler").is_err());
}

#[test]
fn test_unbound_stage_has_no_resources() {
    let stage = StageResources::default();
    assert!(stage.constants.iter().all(Option::is_none));
    assert!(stage.textures.iter().all(Option::is_none));
    assert!(stage.samplers.iter().all(Option::is_none));
}
