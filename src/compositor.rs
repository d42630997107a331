//! The per-frame pipeline: camera frame upload, mesh pass, composite pass and
//! display.

use glam::{Mat4, Vec3};
use image::RgbaImage;

use crate::capture::Frame;
use crate::config::Config;
use crate::mesh::MeshData;
use crate::renderer::{
    FullscreenQuad, GlContext, Mesh, OffscreenTarget, RenderError, ShaderError, ShaderProgram,
    Texture2D, TextureFormat,
};

const TRANSPARENT: [f32; 4] = [0.0, 0.0, 0.0, 0.0];
const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

const BACKGROUND_UNIT: u32 = 0;
const FOREGROUND_UNIT: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// The transforms of one mesh pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrices {
    pub projection: Mat4,
    pub view: Mat4,
    pub model: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeOptions {
    pub flip_vertical: bool,
    pub swap_red_blue: bool,
    pub mesh_color: Vec3,
    pub draw_mesh: bool,
}

impl From<&Config> for CompositeOptions {
    fn from(config: &Config) -> Self {
        CompositeOptions {
            flip_vertical: config.composite.flip_vertical,
            swap_red_blue: config.composite.swap_red_blue,
            mesh_color: config.composite.mesh_color,
            draw_mesh: config.composite.draw_mesh,
        }
    }
}

/// Owns every GPU resource of the pipeline.
pub struct Compositor {
    options: CompositeOptions,
    mesh: Mesh,
    mesh_program: ShaderProgram,
    composite_program: ShaderProgram,
    mesh_target: OffscreenTarget,
    composite_target: OffscreenTarget,
    quad: FullscreenQuad,
    camera_texture: Texture2D,
    camera_is_bgr: bool,
}

impl Compositor {
    /// Creates the targets at `size` and uploads the mesh. The shader
    /// programs are passed in so that callers can load them from wherever.
    pub fn new(
        ctx: &mut GlContext,
        size: (u32, u32),
        mesh: &MeshData,
        mesh_program: ShaderProgram,
        composite_program: ShaderProgram,
        options: CompositeOptions,
    ) -> Result<Compositor, CompositorError> {
        let (width, height) = size;
        let mesh_target = OffscreenTarget::new(ctx, width, height, TextureFormat::Rgba8, true)?;
        let composite_target =
            OffscreenTarget::new(ctx, width, height, TextureFormat::Rgba8, false)?;
        let mut camera_texture = Texture2D::new(ctx, 1, 1, TextureFormat::Rgb8);
        camera_texture.upload_frame(ctx, &Frame::solid(1, 1, [0, 0, 0]))?;
        Ok(Compositor {
            options,
            mesh: Mesh::upload(ctx, mesh),
            mesh_program,
            composite_program,
            mesh_target,
            composite_target,
            quad: FullscreenQuad::new(ctx),
            camera_texture,
            camera_is_bgr: false,
        })
    }

    /// Loads the shader pairs named by the configuration, and sizes the
    /// targets to the window.
    pub fn from_config(
        ctx: &mut GlContext,
        config: &Config,
        mesh: &MeshData,
    ) -> Result<Compositor, CompositorError> {
        let mesh_program = ShaderProgram::from_pair(ctx, &config.mesh_shader)?;
        let composite_program = ShaderProgram::from_pair(ctx, &config.composite_shader)?;
        Compositor::new(
            ctx,
            (config.window.width, config.window.height),
            mesh,
            mesh_program,
            composite_program,
            CompositeOptions::from(config),
        )
    }

    /// Replaces the camera texture's contents with `frame`.
    pub fn upload_frame(&mut self, ctx: &mut GlContext, frame: &Frame) -> Result<(), RenderError> {
        self.camera_texture.upload_frame(ctx, frame)?;
        self.camera_is_bgr = frame.format.is_bgr();
        Ok(())
    }

    /// Renders the mesh into the mesh target. With `draw_mesh` off, the target
    /// is only cleared, so the composite shows just the camera.
    pub fn render_mesh(&mut self, ctx: &mut GlContext, matrices: &Matrices) {
        let mut pass = ctx.bind_target(&self.mesh_target);
        pass.clear(TRANSPARENT, true);
        if !self.options.draw_mesh {
            return;
        }
        pass.set_depth_test(true);
        let mut program = pass.use_program(&self.mesh_program);
        program.set_mat4("projection", &matrices.projection);
        program.set_mat4("view", &matrices.view);
        program.set_mat4("model", &matrices.model);
        program.set_vec3("base_color", self.options.mesh_color);
        program.draw_mesh(&self.mesh);
    }

    /// Blends the mesh render over the camera image into the composite
    /// target.
    pub fn render_composite(&mut self, ctx: &mut GlContext) {
        let mut pass = ctx.bind_target(&self.composite_target);
        pass.clear(BLACK, false);
        let mut program = pass.use_program(&self.composite_program);
        program.bind_texture("background", BACKGROUND_UNIT, &self.camera_texture);
        program.bind_texture(
            "foreground",
            FOREGROUND_UNIT,
            self.mesh_target.color_texture(),
        );
        program.set_bool("flip_vertical", self.options.flip_vertical);
        program.set_bool(
            "swap_red_blue",
            self.options.swap_red_blue != self.camera_is_bgr,
        );
        program.draw_quad(&self.quad);
    }

    /// Runs the upload, mesh and composite stages for one frame. A frame that
    /// can't be uploaded is skipped, and the previous one stays.
    pub fn render_frame(&mut self, ctx: &mut GlContext, frame: Option<&Frame>, matrices: &Matrices) {
        if let Some(frame) = frame {
            if let Err(err) = self.upload_frame(ctx, frame) {
                log::warn!("keeping the previous camera frame: {err}");
            }
        }
        self.render_mesh(ctx, matrices);
        self.render_composite(ctx);
    }

    /// Shows the composite on the window's default framebuffer.
    pub fn present(&self, ctx: &mut GlContext, drawable_size: (u32, u32)) {
        ctx.present(&self.composite_target, drawable_size);
    }

    pub fn read_back(&self, ctx: &mut GlContext) -> Result<RgbaImage, RenderError> {
        self.composite_target.read_back(ctx)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use glam::{Vec2, Vec3};

    use super::*;
    use crate::math::{extrinsic_to_view, intrinsic_to_projection};
    use crate::renderer::test_support::with_hidden_context;

    fn load_program(ctx: &mut GlContext, name: &str) -> ShaderProgram {
        let base = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("assets/shaders")
            .join(name);
        ShaderProgram::from_pair(ctx, &base).unwrap()
    }

    fn triangle() -> MeshData {
        MeshData {
            positions: vec![
                Vec3::new(-0.5, -0.5, 2.0),
                Vec3::new(0.5, -0.5, 2.0),
                Vec3::new(0.0, 0.5, 2.0),
            ],
            normals: Vec::new(),
            texcoords: Vec::new(),
        }
    }

    #[test]
    fn options_follow_config() {
        let mut config = Config::default();
        config.composite.draw_mesh = false;
        config.composite.swap_red_blue = true;
        let options = CompositeOptions::from(&config);
        assert!(!options.draw_mesh);
        assert!(options.swap_red_blue);
        assert!(options.flip_vertical);
    }

    #[test]
    #[ignore = "needs a display and an OpenGL ES 3.0 driver"]
    fn gl_pipeline() {
        with_hidden_context(|ctx| {
            // A target without depth reads back at its own size.
            let target = OffscreenTarget::new(ctx, 640, 480, TextureFormat::Rgb8, false).unwrap();
            assert!(target.depth_texture().is_none());
            assert_eq!(target.color_texture().size(), (640, 480));
            let pixels = target.read_back(ctx).unwrap();
            assert_eq!(pixels.dimensions(), (640, 480));
            drop(target);

            // Uploaded meshes keep their attribute layout.
            let mut with_normals = triangle();
            with_normals.normals = vec![Vec3::Z; 3];
            with_normals.texcoords = vec![Vec2::ZERO; 3];
            let mesh = Mesh::upload(ctx, &with_normals);
            assert_eq!(mesh.vertex_count(), 3);
            assert!(mesh.has_normals() && mesh.has_texcoords());
            drop(mesh);

            // White camera frame with a triangle straight ahead.
            let size = 64;
            let mesh_program = load_program(ctx, "mesh");
            let composite_program = load_program(ctx, "composite");
            let options = CompositeOptions {
                flip_vertical: true,
                swap_red_blue: false,
                mesh_color: Vec3::new(1.0, 0.5, 0.2),
                draw_mesh: true,
            };
            let mut compositor = Compositor::new(
                ctx,
                (size, size),
                &triangle(),
                mesh_program,
                composite_program,
                options,
            )
            .unwrap();
            assert!(compositor.mesh_target.depth_texture().is_some());
            let matrices = Matrices {
                projection: intrinsic_to_projection(64.0, 64.0, 32.0, 32.0, 64.0, 64.0),
                view: extrinsic_to_view(Mat4::IDENTITY),
                model: Mat4::IDENTITY,
            };
            let frame = Frame::solid(1, 1, [255, 255, 255]);
            compositor.render_frame(ctx, Some(&frame), &matrices);
            let composite = compositor.read_back(ctx).unwrap();
            assert_eq!(composite.dimensions(), (size, size));

            let white = image::Rgba([255, 255, 255, 255]);
            assert_eq!(*composite.get_pixel(0, 0), white);
            assert_eq!(*composite.get_pixel(size - 1, size - 1), white);
            let center = composite.get_pixel(size / 2, size / 2);
            assert_ne!(*center, white);
            assert!(center[0] > 200 && center[2] < 100, "{center:?}");

            if let Ok(dir) = std::env::var("MESH_OVERLAY_TEST_OUTPUT") {
                fs::create_dir_all(&dir).unwrap();
                composite.save(Path::new(&dir).join("composite.png")).unwrap();
            }

            // A short frame is refused and the white one stays.
            let short = Frame {
                width: 2,
                height: 2,
                format: crate::capture::PixelFormat::Rgb8,
                data: vec![0; 3],
            };
            assert!(matches!(
                compositor.upload_frame(ctx, &short),
                Err(RenderError::FrameSize { .. })
            ));

            // Without the mesh pass, only the camera remains.
            compositor.options.draw_mesh = false;
            compositor.render_frame(ctx, None, &matrices);
            let composite = compositor.read_back(ctx).unwrap();
            assert!(composite.pixels().all(|pixel| *pixel == white));
        });
    }
}
