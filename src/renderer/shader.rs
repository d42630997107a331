use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::renderer::{gl, GlContext};

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("could not read shader source {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("compiling {stage} shader {name} failed: {log}")]
    Compile {
        stage: &'static str,
        name: String,
        log: String,
    },
    #[error("linking shader program {name} failed: {log}")]
    Link { name: String, log: String },
}

/// A linked vertex + fragment shader program.
pub struct ShaderProgram {
    id: gl::types::GLuint,
}

impl ShaderProgram {
    /// Loads `<base>.vs.glsl` and `<base>.fs.glsl`.
    pub fn from_pair(ctx: &mut GlContext, base: &Path) -> Result<ShaderProgram, ShaderError> {
        let vertex_path = with_suffix(base, ".vs.glsl");
        let fragment_path = with_suffix(base, ".fs.glsl");
        ShaderProgram::from_files(ctx, &vertex_path, &fragment_path)
    }

    pub fn from_files(
        ctx: &mut GlContext,
        vertex_path: &Path,
        fragment_path: &Path,
    ) -> Result<ShaderProgram, ShaderError> {
        let read = |path: &Path| {
            log::info!("compiling shader {}", path.display());
            fs::read_to_string(path).map_err(|source| ShaderError::Read {
                path: path.to_path_buf(),
                source,
            })
        };
        let vertex_source = read(vertex_path)?;
        let fragment_source = read(fragment_path)?;
        let name = vertex_path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(".vs.glsl"))
            .unwrap_or("<unnamed>");
        ShaderProgram::from_sources(ctx, name, &vertex_source, &fragment_source)
    }

    pub fn from_sources(
        _ctx: &mut GlContext,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ShaderProgram, ShaderError> {
        let vertex_shader =
            gl::create_shader(gl::VERTEX_SHADER, vertex_source).map_err(|log| {
                ShaderError::Compile {
                    stage: "vertex",
                    name: name.to_string(),
                    log,
                }
            })?;
        let fragment_shader = match gl::create_shader(gl::FRAGMENT_SHADER, fragment_source) {
            Ok(shader) => shader,
            Err(log) => {
                gl::call!(gl::DeleteShader(vertex_shader));
                return Err(ShaderError::Compile {
                    stage: "fragment",
                    name: name.to_string(),
                    log,
                });
            }
        };
        let program = gl::create_program(&[vertex_shader, fragment_shader]);
        gl::call!(gl::DeleteShader(vertex_shader));
        gl::call!(gl::DeleteShader(fragment_shader));
        let id = program.map_err(|log| ShaderError::Link {
            name: name.to_string(),
            log,
        })?;
        Ok(ShaderProgram { id })
    }

    pub fn id(&self) -> gl::types::GLuint {
        self.id
    }

    pub fn uniform_location(&self, name: &str) -> Option<gl::types::GLint> {
        gl::get_uniform_location(self.id, name)
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        gl::call!(gl::DeleteProgram(self.id));
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_pair_naming() {
        let base = Path::new("assets/shaders/mesh");
        assert_eq!(
            with_suffix(base, ".vs.glsl"),
            PathBuf::from("assets/shaders/mesh.vs.glsl")
        );
        assert_eq!(
            with_suffix(base, ".fs.glsl"),
            PathBuf::from("assets/shaders/mesh.fs.glsl")
        );
    }

    #[test]
    fn pair_sources_exist_on_disk() {
        let shaders = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/shaders");
        for base in ["mesh", "composite"] {
            for suffix in [".vs.glsl", ".fs.glsl"] {
                let path = with_suffix(&shaders.join(base), suffix);
                let source = fs::read_to_string(&path).unwrap();
                assert!(source.starts_with("#version 300 es"), "{path:?}");
            }
        }
    }
}
