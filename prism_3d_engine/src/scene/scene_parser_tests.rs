/// Unit tests for scene_parser.rs

use super::*;
use crate::material::{MaterialKind, ShadingModel};
use crate::scene::light::LightKind;
use crate::test_support::scratch_dir;

const ROOM: &str = "\
// a small room
# with two lights
camera 0.1 1500 60  0 20 -80  10 5

light p orange true 300 50  -8 10 0
light s white false 800 35  0 40 0  90 0 0

object begin
    mesh grid
    transform 0 0 0  0 0 0  20
object end

object begin
    mesh cube
    transform 0 5 0  0 45 0  2 3 4
    brdf 0.8 0.1 0.1  0.3 0.9
object end

object begin
    mesh sphere
    transform 10 5 0  0 0 0  3
    blinnphong gold
object end
";

#[test]
fn test_parse_room() {
    let scene = parse_scene(ROOM);
    assert!(scene.problems.is_empty(), "{:?}", scene.problems);

    assert_eq!(scene.cameras.len(), 1);
    let camera = scene.cameras[0];
    assert_eq!(camera.near, 0.1);
    assert_eq!(camera.far, 1500.0);
    assert_eq!(camera.fov_deg, 60.0);
    assert_eq!(camera.position, Vec3::new(0.0, 20.0, -80.0));
    assert_eq!((camera.yaw_deg, camera.pitch_deg), (10.0, 5.0));

    assert_eq!(scene.lights.len(), 2);
    let point = &scene.lights[0];
    assert_eq!(point.light_type(), LightType::Point);
    assert_eq!(point.transform.position, Vec3::new(-8.0, 10.0, 0.0));
    assert_eq!(point.color, LinearColor::ORANGE);
    assert!(point.cast_shadow);
    assert_eq!(point.brightness, 300.0);
    assert!(matches!(point.kind, LightKind::Point { range, .. } if range == 50.0));

    let spot = &scene.lights[1];
    assert_eq!(spot.kind, LightKind::Spot { angle_deg: 35.0 });
    assert!((spot.direction() - Vec3::NEG_Y).length() < 1e-5);

    assert_eq!(scene.objects.len(), 3);
    assert_eq!(scene.objects[0].mesh, BuiltinMesh::Grid);
    assert_eq!(scene.objects[0].transform.scale, Vec3::splat(20.0));
    assert!(scene.objects[0].material.is_none());

    let cube = &scene.objects[1];
    assert_eq!(cube.transform.scale, Vec3::new(2.0, 3.0, 4.0));
    let material = cube.material.as_ref().unwrap();
    assert_eq!(material.kind(), MaterialKind::Brdf);
    assert_eq!(material.model, ShadingModel::Brdf { roughness: 0.3, metalness: 0.9 });

    let sphere = &scene.objects[2];
    assert_eq!(sphere.material, Some(Material::from_preset(BlinnPhongPreset::Gold)));
}

#[test]
fn test_custom_blinn_phong() {
    let scene = parse_scene("object begin\nmesh cube\nblinnphong 0.2 0.4 0.6 32\nobject end\n");
    let material = scene.objects[0].material.as_ref().unwrap();
    assert_eq!(material.diffuse, Vec3::new(0.2, 0.4, 0.6));
    assert_eq!(material.model, ShadingModel::BlinnPhong { shininess: 32.0 });
}

#[test]
fn test_malformed_lines_are_skipped() {
    let text = "\
camera 0.1 1500 60
light p chartreuse true 300 50 0 0 0
light x white true 300 50 0 0 0
light p white maybe 300 50 0 0 0
teleport 1 2 3
light d white true 2 0  0 0 0  45 0 0
";
    let scene = parse_scene(text);
    assert_eq!(scene.problems.len(), 5);
    assert!(scene.cameras.is_empty());
    assert_eq!(scene.lights.len(), 1);
    assert_eq!(scene.lights[0].light_type(), LightType::Directional);
}

#[test]
fn test_object_block_errors() {
    let text = "\
mesh cube
object end
object begin
object begin
mesh cube
object end
object begin
transform 1 2 3 0 0 0 1
object end
object begin
mesh teapot
mesh sphere
";
    let scene = parse_scene(text);
    // mesh outside, unmatched end, nested begin, meshless object, unknown mesh, unterminated object
    assert_eq!(scene.problems.len(), 6, "{:?}", scene.problems);
    assert_eq!(scene.objects.len(), 1);
    assert_eq!(scene.objects[0].mesh, BuiltinMesh::Cube);
}

#[test]
fn test_transform_arity() {
    let scene = parse_scene("object begin\nmesh quad\ntransform 1 2 3 0 0 0\nobject end\n");
    assert_eq!(scene.problems.len(), 1);
    assert_eq!(scene.objects[0].transform, Transform::IDENTITY);
}

#[test]
fn test_load_scene_file() {
    let dir = scratch_dir("scene_load");
    let path = dir.join("room.scn");
    std::fs::write(&path, ROOM).unwrap();
    let scene = load_scene(&path).unwrap();
    assert_eq!(scene.objects.len(), 3);
    assert!(load_scene(dir.join("missing.scn")).is_err());
}

#[test]
fn test_skybox_line() {
    let scene = parse_scene("skybox sky/noon.png\nskybox sky/dusk.png\n");
    assert!(scene.problems.is_empty());
    assert_eq!(scene.skybox, Some(PathBuf::from("sky/dusk.png")));

    let scene = parse_scene("skybox\nskybox a.png b.png\nobject begin\nskybox c.png\nmesh cube\nobject end\n");
    assert_eq!(scene.problems.len(), 3, "{:?}", scene.problems);
    assert_eq!(scene.skybox, None);
    assert_eq!(scene.objects.len(), 1);
}

#[test]
fn test_load_scene_resolves_skybox_next_to_the_file() {
    let dir = scratch_dir("scene_skybox");
    let path = dir.join("sky.scn");
    std::fs::write(&path, "skybox env/day.png\n").unwrap();
    let scene = load_scene(&path).unwrap();
    assert_eq!(scene.skybox, Some(dir.join("env/day.png")));
}
