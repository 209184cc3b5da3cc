use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use glsprite::coords::{TileIndex, Vec2};
use glsprite::core::{App, AppControl, FrameCtx, StartCtx};
use glsprite::device::GpuInit;
use glsprite::logging::{init_logging, LoggingConfig};
use glsprite::render::{DrawBuffer, Renderer, ShaderProgram, SpriteGrid, SpriteSheet};
use glsprite::time::FrameTime;
use glsprite::window::{Runtime, RuntimeConfig};

const SCREEN_WIDTH: u32 = 640;
const SCREEN_HEIGHT: u32 = 480;

const CLEAR: wgpu::Color = wgpu::Color { r: 0.2, g: 0.2, b: 0.2, a: 1.0 };

const TILE: u32 = 21;
const MARGIN: u32 = 2;
const ORIGIN: Vec2 = Vec2::new(10.0, 10.0);

/// Generated sheet layout when no PNG is given.
const GEN_COLS: u32 = 4;
const GEN_ROWS: u32 = 4;

struct Placement {
    tile: TileIndex,
    position: Vec2,
    rotation: f32,
}

const SPRITES: [Placement; 4] = [
    Placement { tile: TileIndex::new(0, 0), position: Vec2::new(100.0, 100.0), rotation: 0.1 },
    Placement { tile: TileIndex::new(1, 2), position: Vec2::new(500.0, 300.0), rotation: 0.0 },
    Placement {
        tile: TileIndex::new(0, 0),
        position: Vec2::new(300.0, 400.0),
        rotation: std::f32::consts::PI / 12.0,
    },
    Placement {
        tile: TileIndex::new(0, 0),
        position: Vec2::new(200.0, 200.0),
        rotation: std::f32::consts::FRAC_PI_4,
    },
];

struct Scene {
    renderer: Renderer,
    sprites: DrawBuffer,
}

struct SpriteDemo {
    sheet_path: Option<PathBuf>,
    shader_path: Option<PathBuf>,
    grid: SpriteGrid,
    scene: Option<Scene>,
    fps_window: f32,
    fps_frames: u32,
}

impl SpriteDemo {
    fn new(sheet_path: Option<PathBuf>, shader_path: Option<PathBuf>) -> Self {
        Self {
            sheet_path,
            shader_path,
            grid: SpriteGrid::new(TILE, TILE, MARGIN),
            scene: None,
            fps_window: 0.0,
            fps_frames: 0,
        }
    }

    fn report_fps(&mut self, time: FrameTime) {
        self.fps_frames += 1;
        self.fps_window += time.dt;
        if self.fps_window >= 1.0 {
            log::debug!(
                "{:.1} fps (frame {}, {:.0}s)",
                self.fps_frames as f32 / self.fps_window,
                time.frame_index,
                time.elapsed
            );
            self.fps_window = 0.0;
            self.fps_frames = 0;
        }
    }
}

impl App for SpriteDemo {
    fn on_start(&mut self, ctx: &mut StartCtx<'_, '_>) -> Result<()> {
        let (width, height, pixels) = match &self.sheet_path {
            Some(path) => load_png(path)?,
            None => {
                log::info!("no sprite sheet given; using a generated {GEN_COLS}x{GEN_ROWS} sheet");
                generate_sheet(&self.grid, GEN_COLS, GEN_ROWS)
            }
        };
        let sheet = SpriteSheet::from_rgba8(
            ctx.gpu.device(),
            ctx.gpu.queue(),
            "glsprite demo sheet",
            width,
            height,
            &pixels,
        )?;

        let program = match &self.shader_path {
            Some(path) => ShaderProgram::from_file(path),
            None => ShaderProgram::builtin(),
        }
        .context("failed to load sprite shader")?;

        let renderer = Renderer::new(&ctx.render_ctx(), &program, SCREEN_WIDTH, SCREEN_HEIGHT)
            .context("failed to initialize sprite renderer")?;

        self.scene = Some(Scene {
            renderer,
            sprites: DrawBuffer::new(Arc::new(sheet)),
        });
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let Some(scene) = self.scene.as_mut() else {
            return AppControl::Exit;
        };

        for s in &SPRITES {
            scene.sprites.push_from_grid(&self.grid, s.tile, s.position, ORIGIN, s.rotation);
        }

        let control = ctx.render(CLEAR, |rctx, target| {
            scene.renderer.render(rctx, target, &scene.sprites);
        });
        scene.sprites.clear();

        self.report_fps(ctx.time);
        control
    }
}

fn load_png(path: &Path) -> Result<(u32, u32, Vec<u8>)> {
    let img = image::open(path)
        .with_context(|| format!("failed to load sprite sheet {}", path.display()))?
        .to_rgba8();
    let (w, h) = img.dimensions();
    log::info!("loaded sprite sheet {} ({w}x{h})", path.display());
    Ok((w, h, img.into_raw()))
}

/// RGBA8 sheet of `cols` x `rows` tiles laid out on `grid`.
///
/// Each tile gets its own colour, a dark border and a light top-left corner so
/// rotation is visible. Margins stay transparent.
fn generate_sheet(grid: &SpriteGrid, cols: u32, rows: u32) -> (u32, u32, Vec<u8>) {
    let tile = grid.tile_size();
    let (tw, th) = (tile.x as u32, tile.y as u32);
    let stride = grid.cell_stride();
    let margin = grid.margin() as u32;
    let width = margin + cols * stride.x as u32;
    let height = margin + rows * stride.y as u32;

    let mut pixels = vec![0u8; (width * height * 4) as usize];
    for row in 0..rows {
        for col in 0..cols {
            let base = tile_color(col + row * cols);
            let at = grid.offset((col as i32, row as i32));
            let (x0, y0) = (at.x as u32, at.y as u32);

            for y in 0..th {
                for x in 0..tw {
                    let border = x == 0 || y == 0 || x == tw - 1 || y == th - 1;
                    let corner = x < tw / 3 && y < th / 3;
                    let rgb = if border {
                        base.map(|c| c / 3)
                    } else if corner {
                        [255, 255, 255]
                    } else {
                        base
                    };
                    let i = (((y0 + y) * width + x0 + x) * 4) as usize;
                    pixels[i..i + 4].copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
                }
            }
        }
    }
    (width, height, pixels)
}

fn tile_color(n: u32) -> [u8; 3] {
    const PALETTE: [[u8; 3]; 6] = [
        [220, 70, 60],
        [80, 180, 90],
        [70, 110, 220],
        [230, 200, 60],
        [170, 80, 200],
        [60, 190, 200],
    ];
    PALETTE[n as usize % PALETTE.len()]
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let sheet_path = args.next();
    let shader_path = args.next();

    Runtime::run(
        RuntimeConfig {
            title: "glsprite".to_string(),
            initial_size: winit::dpi::LogicalSize::new(SCREEN_WIDTH as f64, SCREEN_HEIGHT as f64),
            ..Default::default()
        },
        GpuInit::default(),
        SpriteDemo::new(sheet_path, shader_path),
    )
}
