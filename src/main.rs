use std::error::Error;
use std::fmt::Display;
use std::time::{Duration, Instant};

use anyhow::Context;
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::video::{GLContext, GLProfile, Window};
use sdl2::EventPump;

mod capture;
mod compositor;
mod config;
mod logging;
mod math;
mod mesh;
mod renderer;
mod timer;

use capture::FrameSource;
use compositor::{Compositor, Matrices};
use config::Config;
use mesh::MeshData;
use renderer::GlContext;
use timer::FrameStats;

fn main() -> anyhow::Result<()> {
    let (config, config_path) = Config::locate()?;
    logging::init(config.log_filter.as_deref());
    match &config_path {
        Some(path) => log::info!("using config {}", path.display()),
        None => log::info!("no config file found, using defaults"),
    }

    let mut state = State::new(config).map_err(|err| {
        log::error!("initialization failed: {err:#}");
        err
    })?;
    while state.run_frame() {}
    log::info!("shutting down");
    Ok(())
}

// Fields drop in declaration order: the GL resources of the compositor go
// while the context and its window are still alive.
struct State {
    compositor: Compositor,
    _gl_context: GLContext,
    window: Window,
    event_pump: EventPump,
    ctx: GlContext,
    source: Box<dyn FrameSource>,
    config: Config,
    started: Instant,
    stats: FrameStats,
    frames_rendered: u64,
}

impl State {
    fn new(config: Config) -> anyhow::Result<State> {
        let sdl_context = sdl2::init().map_err(SdlErr)?;
        let video_subsystem = sdl_context.video().map_err(SdlErr)?;
        let gl_attr = video_subsystem.gl_attr();
        gl_attr.set_context_profile(GLProfile::GLES);
        gl_attr.set_context_version(3, 0);
        gl_attr.set_framebuffer_srgb_compatible(false);
        let window = video_subsystem
            .window(&config.window.title, config.window.width, config.window.height)
            .opengl()
            .build()?;
        let gl_context = window.gl_create_context().map_err(SdlErr)?;
        video_subsystem.gl_set_swap_interval(1).map_err(SdlErr)?;
        let event_pump = sdl_context.event_pump().map_err(SdlErr)?;
        let mut ctx = GlContext::load(&video_subsystem);

        let source = capture::open(&config.source).context("opening frame source")?;
        let mesh = MeshData::load(&config.mesh)
            .with_context(|| format!("loading mesh {}", config.mesh.display()))?;
        let compositor =
            Compositor::from_config(&mut ctx, &config, &mesh).context("creating compositor")?;

        let now = Instant::now();
        Ok(State {
            compositor,
            _gl_context: gl_context,
            window,
            event_pump,
            ctx,
            source,
            config,
            started: now,
            stats: FrameStats::new(now, Duration::from_secs(1)),
            frames_rendered: 0,
        })
    }

    /// Runs one iteration of the capture, render, composite and display loop.
    /// Returns false when the user asked to quit.
    fn run_frame(&mut self) -> bool {
        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => return false,
                _ => {}
            }
        }

        // A failed capture keeps the previous frame's texture on screen.
        let frame = match self.source.next_frame() {
            Ok(frame) => Some(frame),
            Err(err) => {
                log::warn!("capturing frame failed: {err}");
                None
            }
        };

        let (width, height) = (self.config.window.width, self.config.window.height);
        let seconds = self.started.elapsed().as_secs_f32();
        let matrices = Matrices {
            projection: self.config.intrinsics.projection(width as f32, height as f32),
            view: math::extrinsic_to_view(self.config.pose),
            model: self.config.model.transform_at(seconds),
        };
        self.compositor.render_frame(&mut self.ctx, frame, &matrices);
        self.compositor
            .present(&mut self.ctx, self.window.drawable_size());
        self.window.gl_swap_window();

        if self.frames_rendered == 0 {
            if let Some(path) = &self.config.debug.dump_composite {
                match self.compositor.read_back(&mut self.ctx) {
                    Ok(image) => match image.save(path) {
                        Ok(()) => log::info!("saved composite to {}", path.display()),
                        Err(err) => log::error!("saving {} failed: {err}", path.display()),
                    },
                    Err(err) => log::error!("reading back composite failed: {err}"),
                }
            }
        }
        self.frames_rendered += 1;

        if let Some(report) = self.stats.frame_finished(Instant::now()) {
            if self.config.debug.log_frame_times {
                log::log!(timer::REPORT_LEVEL, "{report}");
            }
        }
        true
    }
}

#[derive(Debug)]
pub struct SdlErr(String);
impl Display for SdlErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sdl error: {}", self.0)
    }
}
impl Error for SdlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
