//! Scene module
//!
//! Game objects in a generation-checked arena, lights, the free-fly camera,
//! the per-frame view snapshot and the scene description file format.

mod transform;
mod camera;
mod light;
mod game_object;
mod scene;
mod scene_view;
mod scene_parser;

pub use transform::Transform;
pub use camera::{Camera, CameraSettings};
pub use light::{
    attenuation_for_range, Light, LightKind, LightType, SceneLightingData, ShadowCaster,
    PointLightGpu, SpotLightGpu, DirectionalLightGpu, LightCountsGpu,
    MAX_POINT_LIGHTS, MAX_SPOT_LIGHTS,
};
pub use game_object::{GameObject, GameObjectKey, MeshRef, Model, RenderSettings};
pub use scene::{DrawRequest, Scene, DEFAULT_MATERIAL_CAPACITY};
pub use scene_view::SceneView;
pub use scene_parser::{load_scene, parse_scene, ObjectDescription, SceneDescription};
