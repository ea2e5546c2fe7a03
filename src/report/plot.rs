//! PNG figures drawn with `plotters` on an in-memory RGB buffer and encoded
//! with `image`.
//!
//! Sample colours follow the condition (royal blue for Healthy, maroon for
//! LatentTB). Biplot arrows show top-gene loadings on PC1/PC2 scaled into
//! the score range, black for PC1 genes and purple for PC2 genes.

use std::error::Error;
use std::ops::Range;
use std::path::Path;

use image::{ImageFormat, RgbImage};
use ndarray::Array2;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::full_palette::{GREY_400, ORANGE, PURPLE};
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::classify::surface::DecisionSurface;
use crate::model::Condition;
use crate::report::ReportError;
use crate::stats::cluster::ClusterTree;

pub const WIDTH: u32 = 900;
pub const HEIGHT: u32 = 750;
const CLUSTERMAP_SIZE: (u32, u32) = (1100, 1000);
const FONT: &str = "sans-serif";
const MAX_GENE_LABELS: usize = 60;

const HEALTHY: RGBColor = RGBColor(65, 105, 225);
const LATENT_TB: RGBColor = RGBColor(128, 0, 0);
const TRAIN: RGBColor = RGBColor(31, 119, 180);
const TEST: RGBColor = RGBColor(255, 127, 14);

type DrawResult = Result<(), Box<dyn Error + Send + Sync>>;
type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

pub fn point_colour(condition: Condition) -> RGBColor {
    match condition {
        Condition::Healthy => HEALTHY,
        Condition::LatentTb => LATENT_TB,
    }
}

pub fn region_colour(class: u8) -> RGBColor {
    match Condition::from_class_index(class as usize) {
        Condition::Healthy => RGBColor(196, 208, 244),
        Condition::LatentTb => RGBColor(232, 188, 188),
    }
}

/// A labelled loading arrow from the origin.
#[derive(Debug, Clone)]
pub struct Arrow {
    pub label: String,
    pub tip: [f64; 2],
    /// Component whose top genes this arrow belongs to.
    pub component: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ScatterSpec<'a> {
    pub title: &'a str,
    pub x_label: &'a str,
    pub y_label: &'a str,
    /// Samples x 2 coordinates.
    pub points: &'a Array2<f64>,
    pub conditions: &'a [Condition],
    pub arrows: &'a [Arrow],
}

fn render<F>(size: (u32, u32), draw: F) -> Result<RgbImage, ReportError>
where
    F: FnOnce(&Area<'_>) -> DrawResult,
{
    let (w, h) = size;
    let mut buf = vec![0u8; w as usize * h as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buf, size).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;
        draw(&root).map_err(plot_error)?;
        root.present().map_err(plot_error)?;
    }
    RgbImage::from_raw(w, h, buf)
        .ok_or_else(|| ReportError::Plot("pixel buffer does not match the canvas".to_string()))
}

fn plot_error<E: std::fmt::Display>(err: E) -> ReportError {
    ReportError::Plot(err.to_string())
}

pub fn save_png(img: &RgbImage, path: &Path) -> Result<(), ReportError> {
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Range covering `values` with `pad` of the span added on both sides.
fn padded(values: impl Iterator<Item = f64>, pad: f64) -> Range<f64> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return -1.0..1.0;
    }
    let span = if hi > lo { hi - lo } else { 1.0 };
    (lo - pad * span)..(hi + pad * span)
}

/// Arrow tips rescaled so the longest reaches 80% of the farthest point.
fn scaled_arrows(points: &Array2<f64>, arrows: &[Arrow]) -> Vec<(f64, f64)> {
    let longest = arrows
        .iter()
        .map(|a| a.tip[0].hypot(a.tip[1]))
        .fold(0.0f64, f64::max);
    let reach = points
        .outer_iter()
        .map(|r| r[0].hypot(r[1]))
        .fold(0.0f64, f64::max);
    let scale = if longest > 0.0 && reach > 0.0 {
        0.8 * reach / longest
    } else {
        0.0
    };
    arrows
        .iter()
        .map(|a| (a.tip[0] * scale, a.tip[1] * scale))
        .collect()
}

pub fn render_scatter(spec: &ScatterSpec<'_>) -> Result<RgbImage, ReportError> {
    render((WIDTH, HEIGHT), |root| draw_scatter(root, spec, None))
}

pub fn render_surface(
    surface: &DecisionSurface,
    spec: &ScatterSpec<'_>,
) -> Result<RgbImage, ReportError> {
    render((WIDTH, HEIGHT), |root| draw_scatter(root, spec, Some(surface)))
}

fn draw_scatter(
    root: &Area<'_>,
    spec: &ScatterSpec<'_>,
    surface: Option<&DecisionSurface>,
) -> DrawResult {
    let tips = scaled_arrows(spec.points, spec.arrows);
    let (x_range, y_range) = match surface {
        Some(s) => {
            let g = &s.grid;
            let half = g.step / 2.0;
            (
                g.x_min - half..g.x_max() + half,
                g.y_min - half..g.y_max() + half,
            )
        }
        None => {
            let col0 = spec.points.column(0);
            let col1 = spec.points.column(1);
            let xs = col0.iter().copied();
            let ys = col1.iter().copied();
            (
                padded(xs.chain(tips.iter().map(|t| t.0)), 0.08),
                padded(ys.chain(tips.iter().map(|t| t.1)), 0.08),
            )
        }
    };

    let mut chart = ChartBuilder::on(root)
        .caption(spec.title, (FONT, 24))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;

    if let Some(surface) = surface {
        chart.draw_series(surface_cells(surface))?;
    }
    chart
        .configure_mesh()
        .x_desc(spec.x_label)
        .y_desc(spec.y_label)
        .light_line_style(WHITE.mix(0.0))
        .draw()?;

    for (arrow, &(x, y)) in spec.arrows.iter().zip(&tips) {
        let colour = if arrow.component == 0 { BLACK } else { PURPLE };
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(0.0, 0.0), (x, y)],
            colour.stroke_width(2),
        )))?;
        chart.draw_series(std::iter::once(Circle::new((x, y), 3, colour.filled())))?;
        chart.draw_series(std::iter::once(Text::new(
            arrow.label.clone(),
            (x, y),
            (FONT, 14).into_font().color(&colour),
        )))?;
    }

    for condition in Condition::ALL {
        let colour = point_colour(condition);
        chart
            .draw_series(
                spec.points
                    .outer_iter()
                    .zip(spec.conditions)
                    .filter(|(_, c)| **c == condition)
                    .map(|(row, _)| Circle::new((row[0], row[1]), 5, colour.filled())),
            )?
            .label(condition.label())
            .legend(move |(x, y)| Circle::new((x, y), 5, colour.filled()));
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.85))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

/// One rectangle per run of equal predictions along each grid row.
fn surface_cells(surface: &DecisionSurface) -> Vec<Rectangle<(f64, f64)>> {
    let g = &surface.grid;
    let half = g.step / 2.0;
    let mut cells = Vec::new();
    for iy in 0..g.ny {
        let row = &surface.classes[iy * g.nx..(iy + 1) * g.nx];
        let mut start = 0usize;
        for ix in 1..=g.nx {
            if ix == g.nx || row[ix] != row[start] {
                cells.push(Rectangle::new(
                    [
                        (g.x_at(start) - half, g.y_at(iy) - half),
                        (g.x_at(ix - 1) + half, g.y_at(iy) + half),
                    ],
                    region_colour(row[start]).filled(),
                ));
                start = ix;
            }
        }
    }
    cells
}

/// Cumulative percent of variance over the first components, starting at 0.
pub fn render_cumulative_variance(cumulative_ratio: &[f64]) -> Result<RgbImage, ReportError> {
    let values: Vec<(f64, f64)> = std::iter::once((0.0, 0.0))
        .chain(
            cumulative_ratio
                .iter()
                .enumerate()
                .map(|(c, r)| ((c + 1) as f64, r * 100.0)),
        )
        .collect();
    let last = values.len().saturating_sub(1).max(1) as f64;

    render((WIDTH, HEIGHT), |root| {
        let mut chart = ChartBuilder::on(root)
            .caption("Cumulative Variance Explained by Each PC", (FONT, 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..last, 0.0..105.0)?;
        chart
            .configure_mesh()
            .x_desc("Principal Component")
            .y_desc("Percent of Total Variance")
            .x_label_formatter(&|v| whole_number(*v))
            .draw()?;
        chart.draw_series(LineSeries::new(values.iter().copied(), TRAIN.stroke_width(2)))?;
        chart.draw_series(values.iter().map(|&p| Circle::new(p, 4, TRAIN.filled())))?;
        Ok(())
    })
}

fn whole_number(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        String::new()
    }
}

/// Train and test accuracy per fold, overlaid, with the mean test accuracy.
pub fn render_cv_bars(model: &str, train: &[f64], test: &[f64]) -> Result<RgbImage, ReportError> {
    let n = train.len().max(test.len()).max(1);
    let mean_test = if test.is_empty() {
        0.0
    } else {
        test.iter().sum::<f64>() / test.len() as f64
    };
    let title = format!("{model} Performance (Cross-Validation)");

    render((WIDTH, HEIGHT), |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(&title, (FONT, 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(0.5..n as f64 + 0.5, 0.0..1.05)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n)
            .x_desc("CV Iteration")
            .y_desc("Accuracy")
            .x_label_formatter(&|v| whole_number(*v))
            .draw()?;

        let bar = |fold: usize, v: f64, colour: RGBAColor| {
            let x = (fold + 1) as f64;
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, v)], colour.filled())
        };
        chart
            .draw_series(train.iter().enumerate().map(|(f, &v)| bar(f, v, TRAIN.mix(0.4))))?
            .label("Train Scores")
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], TRAIN.mix(0.4).filled()));
        chart
            .draw_series(test.iter().enumerate().map(|(f, &v)| bar(f, v, TEST.mix(0.7))))?
            .label("Test Scores")
            .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], TEST.mix(0.7).filled()));
        chart
            .draw_series(DashedLineSeries::new(
                vec![(0.5, mean_test), (n as f64 + 0.5, mean_test)],
                10,
                6,
                BLACK.stroke_width(2),
            ))?
            .label("Average Test Accuracy")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 12, y)], BLACK.stroke_width(2)));
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .background_style(&WHITE.mix(0.85))
            .border_style(&BLACK)
            .draw()?;
        Ok(())
    })
}

/// Boxplot of fold test accuracies per model, with the folds overlaid.
pub fn render_model_boxplot(models: &[(&str, Vec<f64>)]) -> Result<RgbImage, ReportError> {
    let names: Vec<&str> = models.iter().map(|(name, _)| *name).collect();
    render((WIDTH, HEIGHT), |root| {
        let mut chart = ChartBuilder::on(root)
            .caption("Comparing ML Models to Predict Latent TB", (FONT, 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d((0..names.len()).into_segmented(), 0f32..1.05f32)?;
        let label = |v: &SegmentValue<usize>| match v {
            SegmentValue::CenterOf(i) => names.get(*i).map(|s| s.to_string()).unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .y_desc("Test Accuracies")
            .x_label_formatter(&label)
            .draw()?;

        for (i, (_, scores)) in models.iter().enumerate() {
            let finite: Vec<f64> = scores.iter().copied().filter(|v| v.is_finite()).collect();
            if finite.is_empty() {
                continue;
            }
            let quartiles = Quartiles::new(&finite);
            chart.draw_series(std::iter::once(
                Boxplot::new_vertical(SegmentValue::CenterOf(i), &quartiles)
                    .width(60)
                    .whisker_width(0.5)
                    .style(TRAIN.stroke_width(2)),
            ))?;
            chart.draw_series(finite.iter().map(|&v| {
                Circle::new((SegmentValue::CenterOf(i), v as f32), 4, BLACK.mix(0.6).filled())
            }))?;
        }
        Ok(())
    })
}

/// Per-gene mean log2 expression against its standard deviation, with the
/// mean cut-off drawn as a dashed vertical line.
pub fn render_mean_variance(
    mean_log2: &[f64],
    sd_log2: &[f64],
    cutoff: f64,
) -> Result<RgbImage, ReportError> {
    let points: Vec<(f64, f64)> = mean_log2
        .iter()
        .zip(sd_log2)
        .filter(|(m, s)| m.is_finite() && s.is_finite())
        .map(|(&m, &s)| (m, s))
        .collect();
    let x_range = padded(points.iter().map(|p| p.0).chain(std::iter::once(cutoff)), 0.04);
    let y_range = padded(points.iter().map(|p| p.1).chain(std::iter::once(0.0)), 0.04);
    let (y_lo, y_hi) = (y_range.start, y_range.end);

    render((WIDTH, HEIGHT), |root| {
        let mut chart = ChartBuilder::on(root)
            .caption("Mean-Variance Plot", (FONT, 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)?;
        chart
            .configure_mesh()
            .x_desc("Mean Log2(counts)")
            .y_desc("Variance (Std. Dev.)")
            .draw()?;
        chart.draw_series(
            points
                .iter()
                .map(|&p| Circle::new(p, 2, TRAIN.mix(0.5).filled())),
        )?;
        chart
            .draw_series(DashedLineSeries::new(
                vec![(cutoff, y_lo), (cutoff, y_hi)],
                10,
                6,
                ORANGE.stroke_width(2),
            ))?
            .label("Cut-Off")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 12, y)], ORANGE.stroke_width(2)));
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.85))
            .border_style(&BLACK)
            .draw()?;
        Ok(())
    })
}

/// Inputs of the DEG clustermap.
#[derive(Debug, Clone, Copy)]
pub struct ClustermapSpec<'a> {
    /// Samples x genes log2 values.
    pub values: &'a Array2<f64>,
    pub genes: &'a [String],
    pub conditions: &'a [Condition],
    pub gene_tree: &'a ClusterTree,
    pub sample_tree: &'a ClusterTree,
}

/// Blue-white-red ramp for `t` in [0, 1].
pub fn coolwarm(t: f64) -> RGBColor {
    let cold = (59.0, 76.0, 192.0);
    let mid = (221.0, 221.0, 221.0);
    let warm = (180.0, 4.0, 38.0);
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 };
    let (a, b, f) = if t < 0.5 {
        (cold, mid, t * 2.0)
    } else {
        (mid, warm, (t - 0.5) * 2.0)
    };
    let lerp = |x: f64, y: f64| (x + (y - x) * f).round() as u8;
    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

/// Leaf positions and merge heights of every node, for drawing a tree.
fn node_layout(tree: &ClusterTree) -> Vec<(f64, f64)> {
    let n = tree.n_leaves();
    let mut nodes = vec![(0.0, 0.0); n + tree.merges.len()];
    for (pos, &leaf) in tree.leaf_order.iter().enumerate() {
        nodes[leaf] = (pos as f64 + 0.5, 0.0);
    }
    for (i, m) in tree.merges.iter().enumerate() {
        let centre = (nodes[m.left].0 + nodes[m.right].0) / 2.0;
        nodes[n + i] = (centre, m.height);
    }
    nodes
}

/// Elbow paths as (leaf position, height) pairs.
fn dendrogram_paths(tree: &ClusterTree) -> Vec<Vec<(f64, f64)>> {
    let nodes = node_layout(tree);
    tree.merges
        .iter()
        .map(|m| {
            let (pl, hl) = nodes[m.left];
            let (pr, hr) = nodes[m.right];
            vec![(pl, hl), (pl, m.height), (pr, m.height), (pr, hr)]
        })
        .collect()
}

fn tree_height(tree: &ClusterTree) -> f64 {
    let h = tree.merges.iter().map(|m| m.height).fold(0.0f64, f64::max);
    if h > 0.0 { h * 1.05 } else { 1.0 }
}

pub fn render_clustermap(spec: &ClustermapSpec<'_>) -> Result<RgbImage, ReportError> {
    render(CLUSTERMAP_SIZE, |root| draw_clustermap(root, spec))
}

fn draw_clustermap(root: &Area<'_>, spec: &ClustermapSpec<'_>) -> DrawResult {
    let n_samples = spec.sample_tree.n_leaves();
    let n_genes = spec.gene_tree.n_leaves();
    let (ns, ng) = (n_samples.max(1) as f64, n_genes.max(1) as f64);
    let (lo, hi) = spec
        .values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = if hi > lo { hi - lo } else { 1.0 };

    let area = root.titled(
        "Clustermap of Differentially Expressed Genes Log2 Counts",
        (FONT, 22),
    )?;
    let (w, h) = area.dim_in_pixel();
    let (left, right, top, bottom) = (170i32, 130i32, 150i32, 70i32);
    let panels = area.split_by_breakpoints(
        [left, w as i32 - right],
        [top, h as i32 - bottom],
    );

    // colour bar in the top-left corner
    let mut bar = ChartBuilder::on(&panels[0])
        .margin(20)
        .y_label_area_size(50)
        .build_cartesian_2d(0.0..1.0, lo..lo + span)?;
    bar.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_labels(4)
        .y_desc("log2")
        .draw()?;
    bar.draw_series((0..50).map(|k| {
        let a = lo + span * k as f64 / 50.0;
        let b = lo + span * (k + 1) as f64 / 50.0;
        Rectangle::new([(0.0, a), (1.0, b)], coolwarm((k as f64 + 0.5) / 50.0).filled())
    }))?;

    // sample dendrogram above the heatmap
    let mut top_tree = ChartBuilder::on(&panels[1])
        .margin_top(10)
        .build_cartesian_2d(0.0..ns, 0.0..tree_height(spec.sample_tree))?;
    for path in dendrogram_paths(spec.sample_tree) {
        top_tree.draw_series(std::iter::once(PathElement::new(path, BLACK)))?;
    }

    // gene dendrogram left of the heatmap, root on the left
    let mut left_tree = ChartBuilder::on(&panels[3])
        .margin_left(10)
        .build_cartesian_2d(tree_height(spec.gene_tree)..0.0, ng..0.0)?;
    for path in dendrogram_paths(spec.gene_tree) {
        let swapped: Vec<(f64, f64)> = path.into_iter().map(|(p, h)| (h, p)).collect();
        left_tree.draw_series(std::iter::once(PathElement::new(swapped, BLACK)))?;
    }

    let mut heat = ChartBuilder::on(&panels[4]).build_cartesian_2d(0.0..ns, ng..0.0)?;
    let mut cells = Vec::with_capacity(n_samples * n_genes);
    for (col, &sample) in spec.sample_tree.leaf_order.iter().enumerate() {
        for (row, &gene) in spec.gene_tree.leaf_order.iter().enumerate() {
            let t = (spec.values[[sample, gene]] - lo) / span;
            let (x, y) = (col as f64, row as f64);
            cells.push(Rectangle::new([(x, y), (x + 1.0, y + 1.0)], coolwarm(t).filled()));
        }
    }
    heat.draw_series(cells)?;

    if n_genes <= MAX_GENE_LABELS {
        let mut names = ChartBuilder::on(&panels[5])
            .margin_left(6)
            .build_cartesian_2d(0.0..1.0, ng..0.0)?;
        let style = TextStyle::from((FONT, 12).into_font())
            .pos(Pos::new(HPos::Left, VPos::Center));
        names.draw_series(spec.gene_tree.leaf_order.iter().enumerate().map(|(row, &gene)| {
            Text::new(spec.genes[gene].clone(), (0.0, row as f64 + 0.5), style.clone())
        }))?;
    }

    // condition strip under the heatmap, legend beside it
    let mut strip = ChartBuilder::on(&panels[7])
        .margin_top(6)
        .build_cartesian_2d(0.0..ns, 0.0..1.0)?;
    strip.draw_series(spec.sample_tree.leaf_order.iter().enumerate().map(|(col, &sample)| {
        let x = col as f64;
        Rectangle::new(
            [(x, 0.6), (x + 1.0, 1.0)],
            point_colour(spec.conditions[sample]).filled(),
        )
    }))?;
    strip.draw_series(std::iter::once(Rectangle::new(
        [(0.0, 0.6), (ns, 1.0)],
        GREY_400.stroke_width(1),
    )))?;
    for (k, condition) in Condition::ALL.into_iter().enumerate() {
        let y = 12 + 24 * k as i32;
        panels[6].draw(&Rectangle::new(
            [(20, y), (34, y + 14)],
            point_colour(condition).filled(),
        ))?;
        panels[6].draw(&Text::new(condition.label(), (42, y), (FONT, 14)))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/plot.rs"]
mod tests;
