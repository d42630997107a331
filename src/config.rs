//! Runtime configuration, read from a JSON file. Every key is optional; the
//! defaults reproduce the stock demo setup.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use thiserror::Error;
use tinyjson::JsonValue;

use crate::capture::SourceConfig;
use crate::math::{extrinsic_from_rows, CameraIntrinsics};

/// Environment variable pointing at the configuration file.
pub const CONFIG_ENV: &str = "MESH_OVERLAY_CONFIG";
/// Configuration file looked up in the working directory otherwise.
pub const DEFAULT_CONFIG_FILE: &str = "overlay.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config is not valid JSON: {0}")]
    Parse(String),
    #[error("config key \"{key}\" should be {expected}")]
    Invalid { key: String, expected: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub window: WindowConfig,
    pub source: SourceConfig,
    pub mesh: PathBuf,
    /// Shader pair base paths, see [`crate::renderer::ShaderProgram::from_pair`].
    pub mesh_shader: PathBuf,
    pub composite_shader: PathBuf,
    pub intrinsics: CameraIntrinsics,
    /// World-to-camera transform in the calibrated-camera convention.
    pub pose: Mat4,
    pub model: ModelConfig,
    pub composite: CompositeConfig,
    pub debug: DebugConfig,
    /// `env_logger` filter, used when `RUST_LOG` isn't set.
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    pub title: String,
    /// Also the resolution of the offscreen targets.
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    pub translation: Vec3,
    pub scale: f32,
    /// Rotation speed around the model's y axis.
    pub spin_degrees_per_second: f32,
}

impl ModelConfig {
    pub fn transform_at(&self, seconds: f32) -> Mat4 {
        let angle = (self.spin_degrees_per_second * seconds).to_radians();
        Mat4::from_translation(self.translation)
            * Mat4::from_rotation_y(angle)
            * Mat4::from_scale(Vec3::splat(self.scale))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeConfig {
    /// Flip the camera image upside down when sampling it (image rows are
    /// stored top-first, GL textures bottom-first).
    pub flip_vertical: bool,
    /// Swap the camera image's red and blue channels, on top of the swap BGR
    /// frames get anyway.
    pub swap_red_blue: bool,
    pub mesh_color: Vec3,
    /// When false, only the camera image is shown.
    pub draw_mesh: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugConfig {
    /// Saves the first composited frame as a PNG here.
    pub dump_composite: Option<PathBuf>,
    pub log_frame_times: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            window: WindowConfig {
                title: env!("CARGO_PKG_NAME").to_string(),
                width: 640,
                height: 480,
            },
            source: SourceConfig::default(),
            mesh: PathBuf::from("assets/cube.obj"),
            mesh_shader: PathBuf::from("assets/shaders/mesh"),
            composite_shader: PathBuf::from("assets/shaders/composite"),
            intrinsics: CameraIntrinsics {
                fx: 480.0,
                fy: 480.0,
                cx: 320.0,
                cy: 240.0,
            },
            pose: Mat4::IDENTITY,
            model: ModelConfig {
                translation: Vec3::new(0.0, 0.0, 3.0),
                scale: 1.0,
                spin_degrees_per_second: 30.0,
            },
            composite: CompositeConfig {
                flip_vertical: true,
                swap_red_blue: false,
                mesh_color: Vec3::new(1.0, 0.55, 0.2),
                draw_mesh: true,
            },
            debug: DebugConfig::default(),
            log_filter: None,
        }
    }
}

impl Config {
    /// Loads the file named by `MESH_OVERLAY_CONFIG`, or `overlay.json` if it
    /// exists, or falls back to the defaults.
    pub fn locate() -> Result<(Config, Option<PathBuf>), ConfigError> {
        let path = match env::var_os(CONFIG_ENV) {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                path.exists().then_some(path)
            }
        };
        match path {
            Some(path) => Ok((Config::load(&path)?, Some(path))),
            None => Ok((Config::default(), None)),
        }
    }

    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Config::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Config, ConfigError> {
        let root = json
            .parse::<JsonValue>()
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        let root = Section::root(&root)?;
        let mut config = Config::default();

        if let Some(window) = root.section("window")? {
            if let Some(title) = window.string("title")? {
                config.window.title = title.to_string();
            }
            config.window.width = window.dimension("width")?.unwrap_or(config.window.width);
            config.window.height = window.dimension("height")?.unwrap_or(config.window.height);
        }

        if let Some(source) = root.section("source")? {
            config.source = parse_source(&source)?;
        }

        if let Some(mesh) = root.string("mesh")? {
            config.mesh = PathBuf::from(mesh);
        }
        if let Some(shaders) = root.section("shaders")? {
            if let Some(mesh) = shaders.string("mesh")? {
                config.mesh_shader = PathBuf::from(mesh);
            }
            if let Some(composite) = shaders.string("composite")? {
                config.composite_shader = PathBuf::from(composite);
            }
        }

        if let Some(camera) = root.section("camera")? {
            let intrinsics = &mut config.intrinsics;
            intrinsics.fx = camera.number("fx")?.unwrap_or(intrinsics.fx);
            intrinsics.fy = camera.number("fy")?.unwrap_or(intrinsics.fy);
            intrinsics.cx = camera.number("cx")?.unwrap_or(intrinsics.cx);
            intrinsics.cy = camera.number("cy")?.unwrap_or(intrinsics.cy);
            if let Some(pose) = camera.numbers::<16>("pose")? {
                let mut rows = [[0.0; 4]; 4];
                for (i, value) in pose.into_iter().enumerate() {
                    rows[i / 4][i % 4] = value;
                }
                config.pose = extrinsic_from_rows(rows);
            }
        }

        if let Some(model) = root.section("model")? {
            if let Some([x, y, z]) = model.numbers::<3>("translation")? {
                config.model.translation = Vec3::new(x, y, z);
            }
            config.model.scale = model.number("scale")?.unwrap_or(config.model.scale);
            config.model.spin_degrees_per_second = model
                .number("spin_degrees_per_second")?
                .unwrap_or(config.model.spin_degrees_per_second);
        }

        if let Some(composite) = root.section("composite")? {
            let defaults = config.composite;
            config.composite = CompositeConfig {
                flip_vertical: composite
                    .boolean("flip_vertical")?
                    .unwrap_or(defaults.flip_vertical),
                swap_red_blue: composite
                    .boolean("swap_red_blue")?
                    .unwrap_or(defaults.swap_red_blue),
                mesh_color: composite
                    .numbers::<3>("mesh_color")?
                    .map(Vec3::from_array)
                    .unwrap_or(defaults.mesh_color),
                draw_mesh: composite.boolean("draw_mesh")?.unwrap_or(defaults.draw_mesh),
            };
        }

        if let Some(debug) = root.section("debug")? {
            config.debug.dump_composite = debug.string("dump_composite")?.map(PathBuf::from);
            config.debug.log_frame_times = debug.boolean("log_frame_times")?.unwrap_or(false);
        }

        config.log_filter = root.string("log_filter")?.map(str::to_string);
        Ok(config)
    }
}

fn parse_source(source: &Section) -> Result<SourceConfig, ConfigError> {
    let kind = source.string("kind")?.ok_or_else(|| source.invalid("kind", "a string"))?;
    let width = source.dimension("width")?.unwrap_or(640);
    let height = source.dimension("height")?.unwrap_or(480);
    match kind {
        "device" => Ok(SourceConfig::Device {
            index: source.number("index")?.map(|i| i as usize).unwrap_or(0),
            width,
            height,
        }),
        "image" => {
            let path = source
                .string("path")?
                .ok_or_else(|| source.invalid("path", "a string"))?;
            Ok(SourceConfig::Image {
                path: PathBuf::from(path),
            })
        }
        "solid" => {
            let color = source.numbers::<3>("color")?.unwrap_or([255.0; 3]);
            Ok(SourceConfig::Solid {
                width,
                height,
                color: color.map(|c| c.clamp(0.0, 255.0) as u8),
            })
        }
        _ => Err(source.invalid("kind", "one of \"device\", \"image\" or \"solid\"")),
    }
}

/// A JSON object along with its dotted key path, for error messages.
struct Section<'a> {
    path: String,
    object: &'a HashMap<String, JsonValue>,
}

impl<'a> Section<'a> {
    fn root(value: &'a JsonValue) -> Result<Section<'a>, ConfigError> {
        let object = value.get::<HashMap<_, _>>().ok_or(ConfigError::Invalid {
            key: "<root>".to_string(),
            expected: "an object",
        })?;
        Ok(Section {
            path: String::new(),
            object,
        })
    }

    fn key_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        }
    }

    fn invalid(&self, key: &str, expected: &'static str) -> ConfigError {
        ConfigError::Invalid {
            key: self.key_path(key),
            expected,
        }
    }

    fn typed<T: tinyjson::InnerAsRef>(
        &self,
        key: &str,
        expected: &'static str,
    ) -> Result<Option<&'a T>, ConfigError> {
        match self.object.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(value) => value.get::<T>().map(Some).ok_or_else(|| self.invalid(key, expected)),
        }
    }

    fn section(&self, key: &str) -> Result<Option<Section<'a>>, ConfigError> {
        Ok(self
            .typed::<HashMap<_, _>>(key, "an object")?
            .map(|object| Section {
                path: self.key_path(key),
                object,
            }))
    }

    fn string(&self, key: &str) -> Result<Option<&'a str>, ConfigError> {
        Ok(self.typed::<String>(key, "a string")?.map(String::as_str))
    }

    fn boolean(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        Ok(self.typed::<bool>(key, "true or false")?.copied())
    }

    fn number(&self, key: &str) -> Result<Option<f32>, ConfigError> {
        Ok(self.typed::<f64>(key, "a number")?.map(|&n| n as f32))
    }

    /// A positive whole number, for sizes in pixels.
    fn dimension(&self, key: &str) -> Result<Option<u32>, ConfigError> {
        match self.typed::<f64>(key, "a positive integer")? {
            Some(&n) if n >= 1.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => Ok(Some(n as u32)),
            Some(_) => Err(self.invalid(key, "a positive integer")),
            None => Ok(None),
        }
    }

    fn numbers<const N: usize>(&self, key: &str) -> Result<Option<[f32; N]>, ConfigError> {
        let expected = match N {
            3 => "an array of 3 numbers",
            16 => "an array of 16 numbers",
            _ => "an array of numbers",
        };
        let Some(values) = self.typed::<Vec<JsonValue>>(key, expected)? else {
            return Ok(None);
        };
        if values.len() != N {
            return Err(self.invalid(key, expected));
        }
        let mut numbers = [0.0; N];
        for (number, value) in numbers.iter_mut().zip(values) {
            *number = *value.get::<f64>().ok_or_else(|| self.invalid(key, expected))? as f32;
        }
        Ok(Some(numbers))
    }
}
