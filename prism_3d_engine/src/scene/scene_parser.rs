/// Scene description files
///
/// ```text
/// camera 0.1 1500 75   0 50 -100   0 15        # near far fovV  x y z  yaw pitch
/// light p orange true 300 50  -8 10 0          # type color shadow brightness range x y z
/// light s white false 800 35  0 40 0  90 0 0   # ... angle x y z  rotX rotY rotZ
/// object begin
///     mesh cube
///     transform 0 5 0  0 45 0  5               # x y z  rotX rotY rotZ  scale | sx sy sz
///     brdf 0.8 0.1 0.1  0.3 0.9                # r g b roughness metalness
///     blinnphong gold                          # preset | r g b shininess
/// object end
/// skybox sky/sunset.png                        # equirectangular image
/// ```
///
/// Lines starting with `#` or `/` are comments. Rotations are applied
/// around the global X, then Y, then Z axis. A malformed line is logged and
/// skipped; an object whose definition cannot be completed is dropped.
/// A relative skybox path is resolved against the scene file's directory
/// by `load_scene`.

use std::fs;
use std::path::{Path, PathBuf};
use glam::Vec3;
use crate::error::Result;
use crate::{engine_err, engine_info, engine_warn};
use crate::material::{BlinnPhongPreset, Material};
use crate::resource::BuiltinMesh;
use crate::settings::{parse_args, parse_bool};
use crate::utils::LinearColor;
use super::camera::CameraSettings;
use super::game_object::RenderSettings;
use super::light::{Light, LightType};
use super::transform::Transform;

const SOURCE: &str = "prism3d::SceneParser";

/// An object as written in the file; materials are created on load
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDescription {
    pub transform: Transform,
    pub mesh: BuiltinMesh,
    /// `None` uses the default material of the scene
    pub material: Option<Material>,
    pub render_settings: RenderSettings,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDescription {
    pub cameras: Vec<CameraSettings>,
    pub lights: Vec<Light>,
    pub objects: Vec<ObjectDescription>,
    /// Equirectangular environment image; the last `skybox` line wins
    pub skybox: Option<PathBuf>,
    /// One message per skipped line or dropped object
    pub problems: Vec<String>,
}

#[derive(Default)]
struct PendingObject {
    transform: Transform,
    mesh: Option<BuiltinMesh>,
    material: Option<Material>,
}

type LineResult = std::result::Result<(), String>;

#[derive(Default)]
struct Parser {
    scene: SceneDescription,
    object: Option<PendingObject>,
}

fn parse_color(token: &str) -> std::result::Result<Vec3, String> {
    LinearColor::by_name(token).ok_or_else(|| format!("unknown color '{}'", token))
}

fn parse_floats(tokens: &[&str]) -> std::result::Result<Vec<f32>, String> {
    tokens
        .iter()
        .map(|token| token.parse::<f32>().map_err(|_| format!("'{}' is not a number", token)))
        .collect()
}

impl Parser {
    fn line(&mut self, tokens: &[&str]) -> LineResult {
        match tokens[0].to_ascii_lowercase().as_str() {
            "camera" => self.camera(tokens),
            "light" => self.light(tokens),
            "object" => self.object(tokens),
            "mesh" => self.mesh(tokens),
            "transform" => self.transform(tokens),
            "brdf" => self.brdf(tokens),
            "blinnphong" => self.blinn_phong(tokens),
            "skybox" => self.skybox(tokens),
            _ => Err(format!("unknown command '{}'", tokens[0])),
        }
    }

    fn pending(&mut self, command: &str) -> std::result::Result<&mut PendingObject, String> {
        self.object
            .as_mut()
            .ok_or_else(|| format!("'{}' outside of an 'object begin' / 'object end' block", command))
    }

    fn skybox(&mut self, tokens: &[&str]) -> LineResult {
        if self.object.is_some() {
            return Err("'skybox' inside an object definition".to_string());
        }
        match tokens {
            [_, file] => {
                self.scene.skybox = Some(PathBuf::from(file));
                Ok(())
            }
            _ => Err(format!("'skybox' expects 1 value, got {}", tokens.len() - 1)),
        }
    }

    fn camera(&mut self, tokens: &[&str]) -> LineResult {
        let v: Vec<f32> = parse_args(tokens, 8)?;
        self.scene.cameras.push(CameraSettings {
            near: v[0],
            far: v[1],
            fov_deg: v[2],
            position: Vec3::new(v[3], v[4], v[5]),
            yaw_deg: v[6],
            pitch_deg: v[7],
        });
        Ok(())
    }

    fn light(&mut self, tokens: &[&str]) -> LineResult {
        if tokens.len() != 9 && tokens.len() != 12 {
            return Err(format!("'light' expects 8 or 11 values, got {}", tokens.len() - 1));
        }
        let light_type = LightType::from_token(tokens[1])
            .ok_or_else(|| format!("unknown light type '{}'", tokens[1]))?;
        let color = parse_color(tokens[2])?;
        let cast_shadow = parse_bool(tokens[3]).ok_or_else(|| format!("'{}' is not a boolean", tokens[3]))?;
        let numbers = parse_floats(&tokens[4..])?;
        let (brightness, range_or_angle) = (numbers[0], numbers[1]);
        let position = Vec3::new(numbers[2], numbers[3], numbers[4]);

        let mut light = match light_type {
            LightType::Point => Light::point(position, range_or_angle),
            LightType::Spot => Light::spot(position, range_or_angle),
            LightType::Directional => {
                let mut light = Light::directional();
                light.transform.position = position;
                light
            }
        }
        .with_color(color)
        .with_brightness(brightness)
        .with_shadow(cast_shadow);

        if let &[rx, ry, rz] = &numbers[5..] {
            light.transform.rotate_around_global_x_degrees(rx);
            light.transform.rotate_around_global_y_degrees(ry);
            light.transform.rotate_around_global_z_degrees(rz);
        }
        self.scene.lights.push(light);
        Ok(())
    }

    fn object(&mut self, tokens: &[&str]) -> LineResult {
        if tokens.len() != 2 {
            return Err("'object' expects begin or end".to_string());
        }
        match tokens[1].to_ascii_lowercase().as_str() {
            "begin" => {
                if self.object.is_some() {
                    return Err("'object begin' inside an object definition, expected 'object end'".to_string());
                }
                self.object = Some(PendingObject::default());
                Ok(())
            }
            "end" => {
                let object = self
                    .object
                    .take()
                    .ok_or_else(|| "'object end' without 'object begin'".to_string())?;
                let mesh = object.mesh.ok_or_else(|| "object without a mesh dropped".to_string())?;
                self.scene.objects.push(ObjectDescription {
                    transform: object.transform,
                    mesh,
                    material: object.material,
                    render_settings: RenderSettings::default(),
                });
                Ok(())
            }
            other => Err(format!("'object {}': expected begin or end", other)),
        }
    }

    fn mesh(&mut self, tokens: &[&str]) -> LineResult {
        if tokens.len() != 2 {
            return Err("'mesh' expects one mesh name".to_string());
        }
        let mesh = BuiltinMesh::from_name(tokens[1])
            .filter(|mesh| *mesh != BuiltinMesh::FullscreenQuad)
            .ok_or_else(|| format!("unknown mesh '{}'", tokens[1]))?;
        self.pending("mesh")?.mesh = Some(mesh);
        Ok(())
    }

    fn transform(&mut self, tokens: &[&str]) -> LineResult {
        if !matches!(tokens.len(), 8 | 10) {
            return Err(format!("'transform' expects 7 or 9 values, got {}", tokens.len() - 1));
        }
        let v = parse_floats(&tokens[1..])?;
        let mut transform = Transform::from_position(Vec3::new(v[0], v[1], v[2]));
        transform.rotate_around_global_x_degrees(v[3]);
        transform.rotate_around_global_y_degrees(v[4]);
        transform.rotate_around_global_z_degrees(v[5]);
        transform.scale = match &v[6..] {
            &[s] => Vec3::splat(s),
            &[x, y, z] => Vec3::new(x, y, z),
            _ => Vec3::ONE,
        };
        self.pending("transform")?.transform = transform;
        Ok(())
    }

    fn brdf(&mut self, tokens: &[&str]) -> LineResult {
        let v: Vec<f32> = parse_args(tokens, 5)?;
        let material = Material::brdf(Vec3::new(v[0], v[1], v[2]), v[3], v[4]);
        self.pending("brdf")?.material = Some(material);
        Ok(())
    }

    fn blinn_phong(&mut self, tokens: &[&str]) -> LineResult {
        let material = match tokens.len() {
            2 => BlinnPhongPreset::from_name(tokens[1])
                .map(Material::from_preset)
                .ok_or_else(|| format!("unknown Blinn-Phong preset '{}'", tokens[1]))?,
            5 => {
                let v = parse_floats(&tokens[1..])?;
                Material::blinn_phong(Vec3::new(v[0], v[1], v[2]), LinearColor::WHITE, v[3])
            }
            n => return Err(format!("'blinnphong' expects a preset or 4 values, got {}", n - 1)),
        };
        self.pending("blinnphong")?.material = Some(material);
        Ok(())
    }
}

/// Scene description from file text
pub fn parse_scene(text: &str) -> SceneDescription {
    let mut parser = Parser::default();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('/') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if let Err(problem) = parser.line(&tokens) {
            engine_warn!(SOURCE, "line {}: {}", number + 1, problem);
            parser.scene.problems.push(format!("line {}: {}", number + 1, problem));
        }
    }
    if parser.object.is_some() {
        engine_warn!(SOURCE, "end of file inside an object definition, object dropped");
        parser.scene.problems.push("unterminated object dropped".to_string());
    }
    parser.scene
}

pub fn load_scene(path: impl AsRef<Path>) -> Result<SceneDescription> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| engine_err!(SOURCE, "Cannot open scene file {}: {}", path.display(), e))?;
    let mut scene = parse_scene(&text);
    if let (Some(skybox), Some(dir)) = (scene.skybox.as_mut(), path.parent()) {
        if skybox.is_relative() {
            *skybox = dir.join(&*skybox);
        }
    }
    engine_info!(SOURCE, "Loaded {}: {} objects, {} lights, {} problems",
        path.display(), scene.objects.len(), scene.lights.len(), scene.problems.len());
    Ok(scene)
}

#[cfg(test)]
#[path = "scene_parser_tests.rs"]
mod tests;
