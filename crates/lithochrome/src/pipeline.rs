//! Shade-ladder pipeline: classify, trace, merge, then render or stack.

use std::time::Instant;

use image::RgbaImage;
use lithochrome_blend::{build_shades, classify, ClassifiedImage, ShadePalette};
use lithochrome_contour::{extract_layers, merge_downward, worker_pool, LayerStack, ProgressFn};
use lithochrome_mesh::{stack_meshes, FilamentMesh, Granularity};
use lithochrome_render::{render_preview, render_svg, RenderSettings};
use rayon::ThreadPool;

use crate::config::Project;
use crate::error::Result;

/// Everything a preview produces.
#[derive(Debug, Clone)]
pub struct Preview {
    /// Source pixels snapped to shades.
    pub classified: ClassifiedImage,
    /// Merged outlines in pixel units.
    pub stack: LayerStack,
    /// Rendered preview.
    pub image: RgbaImage,
}

/// A validated project with its shade palette and worker pool.
pub struct Pipeline {
    project: Project,
    palette: ShadePalette,
    render: RenderSettings,
    pool: ThreadPool,
}

impl Pipeline {
    /// Validate `project` and build its palette.
    pub fn new(project: Project) -> Result<Self> {
        project.validate()?;
        let palette = build_shades(&project.filaments, project.settings.layer_height)?;
        let pool = worker_pool(project.settings.threads)?;
        log::info!(
            "{} filaments, {} shades, {} workers",
            project.filaments.len(),
            palette.len(),
            pool.current_num_threads()
        );
        Ok(Self {
            project,
            palette,
            render: RenderSettings::default(),
            pool,
        })
    }

    /// Use a different preview size.
    pub fn with_render_settings(mut self, render: RenderSettings) -> Self {
        self.render = render;
        self
    }

    /// The project this pipeline was built from.
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// All achievable shades.
    pub fn palette(&self) -> &ShadePalette {
        &self.palette
    }

    /// Snap every pixel of `image` to its nearest shade.
    pub fn classify(&self, image: &RgbaImage) -> ClassifiedImage {
        let start = Instant::now();
        let classified = self.pool.install(|| classify(image, &self.palette));
        log::info!(
            "classified {}x{} pixels in {:.2?}",
            image.width(),
            image.height(),
            start.elapsed()
        );
        classified
    }

    /// Traced and merged outlines. Progress covers `[0, 0.5]`.
    pub fn layer_stack(&self, classified: &ClassifiedImage, progress: &ProgressFn<'_>) -> LayerStack {
        let settings = self
            .project
            .settings
            .contour_settings(classified.width(), classified.height());
        let traced = extract_layers(classified, &self.palette, &settings, &self.pool, progress);
        merge_downward(&traced)
    }

    /// Classify, trace and render `image`. Progress covers `[0, 1]`.
    pub fn preview(&self, image: &RgbaImage, progress: &ProgressFn<'_>) -> Preview {
        let classified = self.classify(image);
        let stack = self.layer_stack(&classified, progress);
        let rendered = self.pool.install(|| {
            render_preview(
                &stack,
                &self.palette,
                classified.width(),
                classified.height(),
                &self.render,
                progress,
            )
        });
        Preview {
            classified,
            stack,
            image: rendered,
        }
    }

    /// SVG of a preview's outlines at print size.
    pub fn svg(&self, preview: &Preview) -> String {
        let (w, h) = (preview.classified.width(), preview.classified.height());
        let mm_per_px = 1.0 / self.project.settings.px_per_mm(w, h);
        render_svg(&preview.stack, &self.palette, w, h, mm_per_px)
    }

    /// Printable meshes for `image`.
    ///
    /// Tracing reports progress in `[0, 0.5]` and stacking in `[0.5, 1]`.
    pub fn meshes(
        &self,
        image: &RgbaImage,
        granularity: Granularity,
        progress: &ProgressFn<'_>,
    ) -> Result<Vec<FilamentMesh>> {
        let classified = self.classify(image);
        let stack = self.layer_stack(&classified, progress);
        let settings = self.project.settings.stack_settings(granularity);
        let second_half = |p: f64| progress(0.5 + 0.5 * p);
        let meshes = stack_meshes(
            &stack,
            classified.width(),
            classified.height(),
            &settings,
            &self.pool,
            &second_half,
        )?;
        Ok(meshes)
    }
}
