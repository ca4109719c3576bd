//! Criterion estimates of the tessellation benches, and the log-log charts drawn from them.

use plotters::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Deserialize)]
struct Estimates {
    mean: Stats,
}

#[derive(Deserialize)]
struct Stats {
    point_estimate: f64,
    confidence_interval: ConfidenceInterval,
}

#[derive(Deserialize)]
struct ConfidenceInterval {
    lower_bound: f64,
    upper_bound: f64,
}

/// Mean and confidence interval of one benchmark input.
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    pub input: usize,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Timings per method, sorted by input.
pub type Series = BTreeMap<String, Vec<Timing>>;

/// Loads the mean times in milliseconds stored by criterion under `target/criterion/<group>`.
pub fn load(group: &str, methods: &[&str], inputs: &[usize]) -> Result<Series, Box<dyn Error>> {
    let root = Path::new("target/criterion").join(group);
    let mut data = Series::new();
    if !root.exists() {
        return Ok(data);
    }
    let ms = |ns: f64| ns / 1_000_000.0;
    for &method in methods {
        let mut timings = Vec::new();
        for &input in inputs {
            let path = root.join(method).join(input.to_string()).join("base/estimates.json");
            if !path.exists() {
                continue;
            }
            let estimates: Estimates = serde_json::from_reader(BufReader::new(File::open(&path)?))?;
            let mean = estimates.mean;
            timings.push(Timing {
                input,
                mean: ms(mean.point_estimate),
                lower: ms(mean.confidence_interval.lower_bound),
                upper: ms(mean.confidence_interval.upper_bound),
            });
        }
        if !timings.is_empty() {
            timings.sort_by_key(|t| t.input);
            data.insert(method.to_string(), timings);
        }
    }
    Ok(data)
}

/// `benches/results/<stem>_<short commit>.png`, creating the directory.
fn output_file(stem: &str) -> Result<PathBuf, Box<dyn Error>> {
    let out_dir = Path::new("benches/results");
    std::fs::create_dir_all(out_dir)?;
    let commit = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    Ok(out_dir.join(format!("{}_{}.png", stem, commit)))
}

fn range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

pub struct Figure<'a> {
    pub stem: String,
    pub caption: String,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
    /// Labelled curve drawn in black under the measurements.
    pub reference: Option<(&'a str, Vec<(f64, f64)>)>,
}

/// Draws every series with its confidence band on log-log axes.
pub fn plot(figure: &Figure<'_>, data: &Series) -> Result<(), Box<dyn Error>> {
    if data.is_empty() {
        return Ok(());
    }
    let reference = figure.reference.as_ref().map(|(_, r)| r.as_slice()).unwrap_or(&[]);
    let (min_x, max_x) = range(data.values().flatten().map(|t| t.input as f64));
    let (min_y, max_y) = range(
        data.values()
            .flatten()
            .flat_map(|t| [t.lower, t.upper])
            .chain(reference.iter().map(|p| p.1))
            .filter(|&y| y > 0.0),
    );

    let out_file = output_file(&figure.stem)?;
    let root = BitMapBackend::new(&out_file, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&figure.caption, ("sans-serif", 40).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(
            (min_x..max_x.max(2.0 * min_x)).log_scale(),
            (min_y * 0.8..max_y * 1.25).log_scale(),
        )?;
    chart.configure_mesh().x_desc(figure.x_desc).y_desc(figure.y_desc).draw()?;

    if let Some((label, points)) = &figure.reference {
        chart
            .draw_series(LineSeries::new(points.iter().copied(), BLACK.stroke_width(1)))?
            .label(label.to_string())
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLACK));
    }

    let colors = [RED, BLUE, GREEN, MAGENTA, CYAN];
    for (i, (method, timings)) in data.iter().enumerate() {
        let color = colors[i % colors.len()];
        let band = timings
            .iter()
            .map(|t| (t.input as f64, t.upper))
            .chain(timings.iter().rev().map(|t| (t.input as f64, t.lower)));
        chart.draw_series(std::iter::once(Polygon::new(band.collect::<Vec<_>>(), color.mix(0.2).filled())))?;
        let line = timings.iter().map(|t| (t.input as f64, t.mean));
        chart
            .draw_series(LineSeries::new(line.clone(), &color))?
            .label(method.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        chart.draw_series(line.map(|p| Circle::new(p, 5, color.filled())))?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    println!("Plot saved to {:?}", out_file);
    Ok(())
}
