use crate::common_io::read_delim_table;
use crate::Mat;

use candle_vae::candle_core::{Device, Tensor};
use candle_vae::candle_vae_config::ImageShape;
use candle_vae::error::VaeError;
use log::info;

/// Label given to rows of files without a label column
pub const UNLABELED: i64 = 11;

pub const MAX_INTENSITY: f32 = 255.;

/// Handwritten digits, one image per row
pub struct DigitTable {
    /// `n x (h*w*c)` raw intensities, 0 to 255
    pub pixels: Mat,
    /// one label per row; `UNLABELED` where there was none
    pub labels: Vec<i64>,
}

impl DigitTable {
    pub fn nrows(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn is_labeled(&self, row: usize) -> bool {
        self.labels[row] != UNLABELED
    }

    /// Rows with a real label
    pub fn labeled_rows(&self) -> Vec<usize> {
        (0..self.nrows()).filter(|&i| self.is_labeled(i)).collect()
    }

    ///
    /// Read a comma-separated digit file (optionally gzipped). The
    /// first line is a header; if its first field is `label`, the first
    /// column holds labels and is stripped from the pixels.
    ///
    /// * `csv_file` - file name
    /// * `image_shape` - expected image shape; each row must carry
    ///   exactly `h*w*c` pixels
    ///
    pub fn read_csv(csv_file: &str, image_shape: &ImageShape) -> anyhow::Result<Self> {
        let parse_fn = |x: &str| -> anyhow::Result<f32> {
            x.parse::<f32>()
                .map_err(|_| anyhow::anyhow!("not a number: {:?}", x))
        };

        let table = read_delim_table(csv_file, ',', parse_fn)?;

        let has_label = table
            .header
            .first()
            .map(|x| x.eq_ignore_ascii_case("label"))
            .unwrap_or(false);

        let offset = if has_label { 1 } else { 0 };
        let n_pixels = image_shape.numel();
        let nrows = table.lines.len();

        let mut pixels = Vec::with_capacity(nrows * n_pixels);
        let mut labels = Vec::with_capacity(nrows);

        for (i, row) in table.lines.iter().enumerate() {
            if row.len() != n_pixels + offset {
                return Err(VaeError::shape_mismatch(n_pixels + offset, row.len()).into());
            }

            let label = if has_label {
                let x = row[0];
                if x.fract() != 0. || x < 0. {
                    return Err(VaeError::data(format!("row {}: bad label {}", i, x)).into());
                }
                x as i64
            } else {
                UNLABELED
            };

            let values = &row[offset..];
            if let Some(x) = values.iter().find(|x| !(0. ..=MAX_INTENSITY).contains(*x)) {
                return Err(
                    VaeError::data(format!("row {}: intensity {} outside [0, 255]", i, x)).into(),
                );
            }

            labels.push(label);
            pixels.extend_from_slice(values);
        }

        info!(
            "read {} images of {} from {} ({})",
            nrows,
            image_shape,
            csv_file,
            if has_label { "labeled" } else { "unlabeled" }
        );

        Ok(Self {
            pixels: Mat::from_row_slice(nrows, n_pixels, &pixels),
            labels,
        })
    }

    /// Stack tables with the same number of pixels
    pub fn concat(tables: Vec<DigitTable>) -> anyhow::Result<Self> {
        let ncols = tables
            .first()
            .map(|t| t.ncols())
            .ok_or(anyhow::anyhow!("nothing to combine"))?;

        if let Some(t) = tables.iter().find(|t| t.ncols() != ncols) {
            return Err(VaeError::shape_mismatch(ncols, t.ncols()).into());
        }

        let nrows = tables.iter().map(|t| t.nrows()).sum();
        let mut pixels = Mat::zeros(nrows, ncols);
        let mut labels = Vec::with_capacity(nrows);
        let mut lb = 0;
        for t in tables {
            pixels.rows_mut(lb, t.nrows()).copy_from(&t.pixels);
            lb += t.nrows();
            labels.extend(t.labels);
        }

        Ok(Self { pixels, labels })
    }

    /// Subset of rows in the given order
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            pixels: self.pixels.select_rows(rows),
            labels: rows.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    ///
    /// Normalize intensities to [0, 1] and lay the rows out as an image
    /// batch `[n, c, h, w]`. Rows store pixels in `h, w, c` order.
    ///
    pub fn to_image_tensor(&self, image_shape: &ImageShape, dev: &Device) -> anyhow::Result<Tensor> {
        if self.ncols() != image_shape.numel() {
            return Err(VaeError::shape_mismatch(image_shape.numel(), self.ncols()).into());
        }

        let n = self.nrows();
        // column-major storage of the transpose = row-major rows
        let row_major = self.pixels.transpose();
        let x = Tensor::from_slice(
            row_major.as_slice(),
            (n, image_shape.height, image_shape.width, image_shape.channels),
            dev,
        )?;

        Ok((x.permute((0, 3, 1, 2))?.contiguous()? / MAX_INTENSITY as f64)?)
    }
}
