//! lithochrome CLI
//!
//! Turns an image and a filament project into previews and printable STL
//! files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use image::RgbaImage;
use lithochrome::blend::{simulate_print, SequenceCache};
use lithochrome::contour::worker_pool;
use lithochrome::mesh::{FilamentMesh, Granularity};
use lithochrome::render::pick_material;
use lithochrome::{ams, AmsProject, Pipeline, Project};

mod stl;

#[derive(Parser)]
#[command(name = "lithochrome")]
#[command(about = "Stacked translucent filament prints from images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every shade the project's filament stack can reach
    Shades {
        /// Project TOML file
        #[arg(short, long)]
        project: PathBuf,
    },
    /// Render a preview of the printed result
    Preview {
        /// Project TOML file
        #[arg(short, long)]
        project: PathBuf,
        /// Source image
        #[arg(short, long)]
        image: PathBuf,
        /// Output PNG
        #[arg(short, long)]
        output: PathBuf,
        /// Also write the outlines as SVG
        #[arg(long)]
        svg: Option<PathBuf>,
    },
    /// Write one STL per filament
    Export {
        /// Project TOML file
        #[arg(short, long)]
        project: PathBuf,
        /// Source image
        #[arg(short, long)]
        image: PathBuf,
        /// Directory for the STL files
        #[arg(long)]
        out_dir: PathBuf,
        /// One STL per filament layer instead of per filament
        #[arg(long)]
        per_layer: bool,
    },
    /// Show which shade a pixel of the image maps to
    Pick {
        /// Project TOML file
        #[arg(short, long)]
        project: PathBuf,
        /// Source image
        #[arg(short, long)]
        image: PathBuf,
        /// Pixel column
        #[arg(short, long)]
        x: i64,
        /// Pixel row
        #[arg(short, long)]
        y: i64,
    },
    /// Per-pixel palette search for filament-switching printers
    Ams {
        /// Palette project TOML file
        #[arg(short, long)]
        project: PathBuf,
        /// Source image
        #[arg(short, long)]
        image: PathBuf,
        /// Directory for the STL files
        #[arg(short, long)]
        output: PathBuf,
        /// Also write the predicted print appearance as PNG
        #[arg(long)]
        simulate: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Shades { project } => show_shades(&project)?,
        Commands::Preview {
            project,
            image,
            output,
            svg,
        } => preview(&project, &image, &output, svg.as_deref())?,
        Commands::Export {
            project,
            image,
            out_dir,
            per_layer,
        } => {
            let granularity = if per_layer {
                Granularity::PerLayer
            } else {
                Granularity::PerFilament
            };
            export(&project, &image, &out_dir, granularity)?;
        }
        Commands::Pick {
            project,
            image,
            x,
            y,
        } => pick(&project, &image, x, y)?,
        Commands::Ams {
            project,
            image,
            output,
            simulate,
        } => run_ams(&project, &image, &output, simulate.as_deref())?,
    }

    Ok(())
}

fn load_image(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path)
        .with_context(|| format!("reading {}", path.display()))?
        .to_rgba8();
    if image.width() == 0 || image.height() == 0 {
        bail!("{} has no pixels", path.display());
    }
    Ok(image)
}

fn load_pipeline(path: &Path) -> Result<Pipeline> {
    let project = Project::load(path).with_context(|| format!("loading {}", path.display()))?;
    Ok(Pipeline::new(project)?)
}

/// Progress callback that logs every tenth.
fn progress_logger() -> impl Fn(f64) + Send + Sync {
    let last = AtomicU32::new(0);
    move |p: f64| {
        let step = (p.clamp(0.0, 1.0) * 10.0).floor() as u32;
        if step > last.fetch_max(step, Ordering::Relaxed) {
            log::info!("{}%", step * 10);
        }
    }
}

fn file_stem(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn write_meshes(out_dir: &Path, meshes: &[FilamentMesh], label: impl Fn(usize) -> String) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    for m in meshes {
        let name = match m.layers {
            Some(layers) => format!("{:02}_{}_x{layers}.stl", m.filament, file_stem(&label(m.filament))),
            None => format!("{:02}_{}.stl", m.filament, file_stem(&label(m.filament))),
        };
        let path = out_dir.join(name);
        fs::write(&path, stl::stl_bytes(&m.mesh)).with_context(|| format!("writing {}", path.display()))?;
        println!(
            "Exported {} ({} triangles)",
            path.display(),
            m.mesh.num_triangles()
        );
    }
    Ok(())
}

fn show_shades(project: &Path) -> Result<()> {
    let pipeline = load_pipeline(project)?;
    let filaments = &pipeline.project().filaments;
    for (key, color) in pipeline.palette().iter() {
        let label = filaments
            .get(key.filament)
            .map(|f| f.label())
            .unwrap_or_default();
        println!("{:>3} {:<16} x{:<2} {}", key.filament, label, key.layers, color);
    }
    Ok(())
}

fn preview(project: &Path, image: &Path, output: &Path, svg: Option<&Path>) -> Result<()> {
    let pipeline = load_pipeline(project)?;
    let source = load_image(image)?;
    let preview = pipeline.preview(&source, &progress_logger());
    preview
        .image
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote preview to {}", output.display());

    for (key, count) in preview.classified.histogram() {
        log::info!("filament {} x{}: {} px", key.filament, key.layers, count);
    }

    if let Some(path) = svg {
        fs::write(path, pipeline.svg(&preview)).with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote SVG to {}", path.display());
    }
    Ok(())
}

fn export(project: &Path, image: &Path, out_dir: &Path, granularity: Granularity) -> Result<()> {
    let pipeline = load_pipeline(project)?;
    let source = load_image(image)?;
    let meshes = pipeline.meshes(&source, granularity, &progress_logger())?;
    if meshes.is_empty() {
        bail!("nothing to print: the image is fully transparent");
    }
    let filaments = &pipeline.project().filaments;
    write_meshes(out_dir, &meshes, |i| {
        filaments.get(i).map(|f| f.label()).unwrap_or_default()
    })
}

fn pick(project: &Path, image: &Path, x: i64, y: i64) -> Result<()> {
    let pipeline = load_pipeline(project)?;
    let source = load_image(image)?;
    let classified = pipeline.classify(&source);
    match pick_material(classified.image(), x, y, pipeline.palette()) {
        Some(key) => {
            let label = pipeline
                .project()
                .filaments
                .get(key.filament)
                .map(|f| f.label())
                .unwrap_or_default();
            let color = pipeline
                .palette()
                .shade(key)
                .map(|c| c.to_hex())
                .unwrap_or_default();
            println!("{label} x{} {color}", key.layers);
        }
        None => println!("no material at ({x}, {y})"),
    }
    Ok(())
}

fn run_ams(project: &Path, image: &Path, output: &Path, simulate: Option<&Path>) -> Result<()> {
    let project = AmsProject::load(project).with_context(|| format!("loading {}", project.display()))?;
    let source = load_image(image)?;
    let pool = worker_pool(project.threads)?;

    let mut cache = SequenceCache::new();
    let plan = pool.install(|| ams::plan(&project, &source, &mut cache))?;
    println!(
        "Planned {} layers, {} dithered pixels, {} cached colours",
        plan.layer_count(),
        plan.dithered.len(),
        cache.len()
    );

    if let Some(path) = simulate {
        simulate_print(&plan, &project.filaments, &project.search)
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote simulation to {}", path.display());
    }

    let contour = project.contour_settings(plan.width, plan.height);
    let meshes = ams::meshes(&plan, &project.filaments, &project.search, &contour, &pool, &progress_logger())?;
    write_meshes(output, &meshes, |i| {
        project
            .filaments
            .get(i)
            .map(|f| f.name.clone())
            .unwrap_or_default()
    })
}
