//! Visualization utilities for multi-salesman solutions.
//!
//! Generates SVG drawings of the tours (one colour per salesman) and exports
//! plain-text data for external plotting.

use crate::instance::Instance;
use crate::solution::Solution;
use std::fs::File;
use std::io::Write;
use std::path::Path;
#[cfg(not(feature = "resvg"))]
use std::process::Command;
#[cfg(feature = "resvg")]
use resvg::tiny_skia::{Pixmap, Transform};
#[cfg(feature = "resvg")]
use resvg::usvg::{self, TreeParsing};
#[cfg(feature = "resvg")]
use resvg::{render, FitTo};

/// Tour colours, cycled when there are more salesmen than entries.
const PALETTE: [&str; 10] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4",
    "#42d4f4", "#f032e6", "#9a6324", "#469990", "#808000",
];

pub fn tour_color(salesman: usize) -> &'static str {
    PALETTE[salesman % PALETTE.len()]
}

/// SVG visualization generator
pub struct Visualizer {
    /// Canvas width
    pub width: f64,
    /// Canvas height
    pub height: f64,
    /// Margin
    pub margin: f64,
    /// Node radius
    pub node_radius: f64,
    /// Print node ids next to the nodes
    pub show_labels: bool,
}

impl Default for Visualizer {
    fn default() -> Self {
        Visualizer {
            width: 800.0,
            height: 800.0,
            margin: 50.0,
            node_radius: 6.0,
            show_labels: true,
        }
    }
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plot coordinates; geographic instances are drawn longitude-across.
    fn plot_coords(instance: &Instance, x: f64, y: f64) -> (f64, f64) {
        if instance.metric == "haversine" {
            (y, x)
        } else {
            (x, y)
        }
    }

    /// Get coordinate bounds
    fn get_bounds(&self, instance: &Instance) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for node in &instance.nodes {
            let (x, y) = Self::plot_coords(instance, node.x, node.y);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        (min_x, max_x, min_y, max_y)
    }

    /// Generate SVG visualization of a solution
    pub fn generate_svg(&self, instance: &Instance, solution: &Solution) -> String {
        let mut svg = String::new();

        let (min_x, max_x, min_y, max_y) = self.get_bounds(instance);
        let span = |lo: f64, hi: f64| if hi > lo { hi - lo } else { 1.0 };
        let scale_x = (self.width - 2.0 * self.margin) / span(min_x, max_x);
        let scale_y = (self.height - 2.0 * self.margin) / span(min_y, max_y);
        let scale = scale_x.min(scale_y);

        let transform = |x: f64, y: f64| -> (f64, f64) {
            let (x, y) = Self::plot_coords(instance, x, y);
            let tx = self.margin + (x - min_x) * scale;
            let ty = self.height - self.margin - (y - min_y) * scale;
            (tx, ty)
        };

        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .node {{ fill: #bdc3c7; stroke: #2c3e50; stroke-width: 1; }}
    .depot {{ fill: #2c3e50; stroke: #000000; stroke-width: 2; }}
    .edge {{ stroke-width: 2; fill: none; }}
    .label {{ font-family: Arial; font-size: 10px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            self.width, self.height, self.width, self.height
        ));

        svg.push_str(&format!(
            r##"<text x="{}" y="25" class="title">Instance: {} | Sum: {:.2} | Max: {:.2} | {}</text>
"##,
            self.margin, instance.name, solution.total_cost, solution.max_cost, solution.status
        ));

        for (k, tour) in solution.tours.iter().enumerate() {
            let color = tour_color(k);
            let points: Vec<String> = tour
                .nodes
                .iter()
                .filter_map(|&id| instance.node(id))
                .map(|n| {
                    let (x, y) = transform(n.x, n.y);
                    format!("{:.2},{:.2}", x, y)
                })
                .collect();
            svg.push_str(&format!(
                r##"<polyline points="{}" class="edge" stroke="{}"/>
"##,
                points.join(" "),
                color
            ));
        }

        for node in &instance.nodes {
            let (x, y) = transform(node.x, node.y);
            if node.id == instance.depot {
                let r = self.node_radius * 1.5;
                svg.push_str(&format!(
                    r##"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" class="depot"/>
"##,
                    x - r, y - r, 2.0 * r, 2.0 * r
                ));
            } else {
                // Exclusive nodes are filled with their owner's colour.
                let fill = instance
                    .exclusive_owner(node.id)
                    .map(|k| format!(r#" style="fill: {}""#, tour_color(k - 1)))
                    .unwrap_or_default();
                svg.push_str(&format!(
                    r##"<circle cx="{:.2}" cy="{:.2}" r="{}" class="node"{}/>
"##,
                    x, y, self.node_radius, fill
                ));
            }

            if self.show_labels {
                svg.push_str(&format!(
                    r##"<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"##,
                    x, y - self.node_radius - 3.0, node.id
                ));
            }
        }

        let legend_y = self.height - 30.0;
        for (k, tour) in solution.tours.iter().enumerate() {
            let x = self.margin + 120.0 * k as f64;
            svg.push_str(&format!(
                r##"<rect x="{:.2}" y="{:.2}" width="15" height="15" fill="{}"/>
<text x="{:.2}" y="{:.2}" class="label">S{} ({:.1})</text>
"##,
                x, legend_y, tour_color(k),
                x + 20.0, legend_y + 12.0, k + 1, tour.cost
            ));
        }

        svg.push_str("</svg>");

        svg
    }

    /// Save SVG to file
    pub fn save_svg<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(svg.as_bytes())?;
        Ok(())
    }

    /// Save SVG as PNG. Uses resvg when the `resvg` feature is on, otherwise
    /// tries `rsvg-convert`, then `magick convert`, then `inkscape`.
    pub fn save_png<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        let path = path.as_ref();
        #[cfg(feature = "resvg")]
        {
            let to_io = |msg: String| std::io::Error::new(std::io::ErrorKind::Other, msg);
            let tree = usvg::Tree::from_str(svg, &usvg::Options::default())
                .map_err(|e| to_io(format!("usvg parse error: {}", e)))?;
            let size = tree.size.to_screen_size();
            let mut pixmap = Pixmap::new(size.width().max(1), size.height().max(1))
                .ok_or_else(|| to_io("Failed to create pixmap".to_string()))?;
            render(&tree, FitTo::Original, Transform::default(), pixmap.as_mut())
                .ok_or_else(|| to_io("resvg render failed".to_string()))?;
            pixmap
                .save_png(path)
                .map_err(|e| to_io(format!("save_png failed: {}", e)))?;
            return Ok(());
        }

        #[cfg(not(feature = "resvg"))]
        {
            let tmp_svg = path.with_extension("svg.tmp");
            self.save_svg(svg, &tmp_svg)?;

            let out = path.to_string_lossy().to_string();
            let tmp = tmp_svg.to_string_lossy().to_string();
            let attempts: [(&str, Vec<&str>); 3] = [
                ("rsvg-convert", vec!["-o", &out, &tmp]),
                ("magick", vec!["convert", &tmp, &out]),
                ("inkscape", vec![&tmp, "--export-type=png", "--export-filename", &out]),
            ];
            for (program, args) in attempts.iter() {
                if let Ok(status) = Command::new(program).args(args).status() {
                    if status.success() {
                        let _ = std::fs::remove_file(&tmp_svg);
                        return Ok(());
                    }
                }
            }

            let _ = std::fs::remove_file(&tmp_svg);
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "No SVG->PNG converter succeeded (tried rsvg-convert, magick, inkscape)",
            ))
        }
    }

    /// Write PNG if possible, otherwise fall back to SVG next to it.
    /// Returns the path actually written.
    pub fn save_image(&self, svg: &str, png_path: &Path) -> std::io::Result<std::path::PathBuf> {
        match self.save_png(svg, png_path) {
            Ok(()) => Ok(png_path.to_path_buf()),
            Err(e) => {
                log::warn!("PNG conversion failed ({}); writing SVG instead", e);
                let svg_path = png_path.with_extension("svg");
                self.save_svg(svg, &svg_path)?;
                Ok(svg_path)
            }
        }
    }

    /// Export data for external plotting (e.g., matplotlib)
    pub fn export_plot_data(&self, instance: &Instance, solution: &Solution) -> String {
        let mut data = String::new();

        data.push_str("# CBTSP Solution Data\n");
        data.push_str(&format!("# Instance: {}\n", instance.name));
        data.push_str(&format!("# Sum: {:.2}\n", solution.total_cost));
        data.push_str(&format!("# Max: {:.2}\n", solution.max_cost));
        data.push_str(&format!("# Status: {}\n\n", solution.status));

        data.push_str("# Nodes: id, x, y, owner (0 = shared)\n");
        for node in &instance.nodes {
            let owner = instance.exclusive_owner(node.id).unwrap_or(0);
            data.push_str(&format!("{},{},{},{}\n", node.id, node.x, node.y, owner));
        }

        data.push_str("\n# Tours: salesman, cost, sequence of node ids\n");
        for (k, tour) in solution.tours.iter().enumerate() {
            let seq: Vec<String> = tour.nodes.iter().map(|n| n.to_string()).collect();
            data.push_str(&format!("{},{:.2},{}\n", k + 1, tour.cost, seq.join(" ")));
        }

        data
    }
}
