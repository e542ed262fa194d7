use super::*;

#[test]
fn test_invalid_sentinel() {
    assert_eq!(TextureId::INVALID.raw(), -1);
    assert!(!TextureId::INVALID.is_valid());
    assert_eq!(TextureId::INVALID.slot(), None);
    assert_eq!(ShaderId::default(), ShaderId::INVALID);
}

#[test]
fn test_slot_round_trip() {
    let id = SamplerId::from_slot(7);
    assert!(id.is_valid());
    assert_eq!(id.slot(), Some(7));
    assert_eq!(id.raw(), 7);
}

#[test]
fn test_display_names_the_table() {
    assert_eq!(format!("{}", BufferId::from_slot(3)), "buffer#3");
    assert_eq!(format!("{}", DepthTargetId::INVALID), "depth_target#-1");
    assert_eq!(RasterizerStateId::KIND, "rasterizer_state");
}
