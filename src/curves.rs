//! Static rendering of the training curves: accuracy and loss side by side.

use std::{path::Path, sync::Once};

use image::RgbImage;
use plotters::{
    coord::Shift,
    prelude::*,
    style::{register_font, FontStyle},
};

use crate::{
    error::ArtifactError,
    history::{MetricCurve, TrainingHistory},
};

pub const WIDTH: u32 = 1200;
pub const HEIGHT: u32 = 400;

/// Training series color.
pub const TRAIN: RGBColor = RGBColor(31, 119, 180);
/// Validation series color.
pub const VALID: RGBColor = RGBColor(255, 127, 14);

const FONT: &str = "sans-serif";
static FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
static REGISTER_FONT: Once = Once::new();

fn plot_error(err: impl std::fmt::Display) -> ArtifactError {
    ArtifactError::Plot(err.to_string())
}

/// Writes the two-panel curve image to `path`.
pub fn save_training_curves(
    history: &TrainingHistory,
    path: impl AsRef<Path>,
) -> Result<(), ArtifactError> {
    let path = path.as_ref();

    // Ensure the output directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    render_training_curves(history)?.save(path)?;
    Ok(())
}

/// Accuracy on the left half, loss on the right half, each with a title,
/// axis descriptions and a train/validation legend.
pub fn render_training_curves(history: &TrainingHistory) -> Result<RgbImage, ArtifactError> {
    REGISTER_FONT.call_once(|| {
        if register_font(FONT, FontStyle::Normal, FONT_BYTES).is_err() {
            log::warn!("Bundled font could not be loaded, curve labels will be missing");
        }
    });

    let mut buffer = vec![0u8; WIDTH as usize * HEIGHT as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;

        let (left, right) = root.split_horizontally(WIDTH / 2);
        draw_panel(&left, "Model accuracy", "Accuracy", &history.accuracy)?;
        draw_panel(&right, "Model loss", "Loss", &history.loss)?;

        root.present().map_err(plot_error)?;
    }

    RgbImage::from_raw(WIDTH, HEIGHT, buffer)
        .ok_or_else(|| ArtifactError::Plot("bitmap buffer has the wrong size".to_string()))
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    metric: &str,
    curve: &MetricCurve,
) -> Result<(), ArtifactError> {
    let epochs = curve.epochs().max(2);
    let (min, max) = curve.range().unwrap_or((0.0, 1.0));
    // Leave some headroom so the series never sits on the frame.
    let pad = ((max - min) * 0.05).max(1e-3);

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, 22))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(1..epochs, (min - pad)..(max + pad))
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("Epoch")
        .y_desc(metric)
        .label_style((FONT, 14))
        .draw()
        .map_err(plot_error)?;

    if curve.range().is_none() {
        return Ok(());
    }

    for (values, color, name) in [
        (&curve.train, TRAIN, "Train"),
        (&curve.valid, VALID, "Validation"),
    ] {
        let points: Vec<(usize, f64)> = values
            .iter()
            .enumerate()
            .filter(|(_, value)| value.is_finite())
            .map(|(epoch, value)| (epoch + 1, *value))
            .collect();

        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))
            .map_err(plot_error)?
            .label(name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));

        chart
            .draw_series(points.into_iter().map(|point| Circle::new(point, 3, color.filled())))
            .map_err(plot_error)?;
    }

    chart
        .configure_series_labels()
        .label_font((FONT, 14))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> TrainingHistory {
        TrainingHistory {
            accuracy: MetricCurve {
                train: vec![0.91, 0.96, 0.98],
                valid: vec![0.95, 0.97, 0.985],
            },
            loss: MetricCurve {
                train: vec![0.28, 0.12, 0.08],
                valid: vec![0.15, 0.09, 0.06],
            },
        }
    }

    fn count(image: &RgbImage, range: std::ops::Range<u32>, color: RGBColor) -> usize {
        let RGBColor(r, g, b) = color;
        image
            .enumerate_pixels()
            .filter(|(x, _, pixel)| range.contains(x) && pixel.0 == [r, g, b])
            .count()
    }

    fn dark(image: &RgbImage, range: std::ops::Range<u32>) -> usize {
        image
            .enumerate_pixels()
            .filter(|(x, _, pixel)| range.contains(x) && pixel.0.iter().all(|c| *c < 100))
            .count()
    }

    #[test]
    fn both_panels_carry_both_series() {
        let image = render_training_curves(&history()).unwrap();
        let half = WIDTH / 2;

        assert_eq!(image.dimensions(), (WIDTH, HEIGHT));
        for panel in [0..half, half..WIDTH] {
            assert!(count(&image, panel.clone(), TRAIN) > 0);
            assert!(count(&image, panel, VALID) > 0);
        }
    }

    #[test]
    fn panels_are_titled_and_labelled() {
        let with_text = render_training_curves(&history()).unwrap();

        // Titles, tick labels, axis descriptions and legend text are all
        // drawn dark; the frame alone accounts for far fewer pixels.
        let half = WIDTH / 2;
        assert!(dark(&with_text, 0..half) > 2_000);
        assert!(dark(&with_text, half..WIDTH) > 2_000);
    }

    #[test]
    fn empty_history_still_renders() {
        let image = render_training_curves(&TrainingHistory::default()).unwrap();

        assert_eq!(count(&image, 0..WIDTH, TRAIN), 0);
        assert!(dark(&image, 0..WIDTH) > 0);
    }

    #[test]
    fn single_epoch_is_plotted() {
        let history = TrainingHistory {
            accuracy: MetricCurve {
                train: vec![0.9],
                valid: vec![0.92],
            },
            loss: MetricCurve::default(),
        };

        let image = render_training_curves(&history).unwrap();

        assert!(count(&image, 0..WIDTH / 2, TRAIN) > 0);
    }

    #[test]
    fn saves_png() {
        let path = std::env::temp_dir()
            .join("digit-sketch-curves")
            .join("training_curves.png");

        save_training_curves(&history(), &path).unwrap();
        let loaded = image::open(&path).unwrap();

        assert_eq!((loaded.width(), loaded.height()), (WIDTH, HEIGHT));
        std::fs::remove_file(path).ok();
    }
}
