use crate::candle_model_traits::{DecoderModuleT, EncoderModuleT};
use crate::candle_vae_model::VaeModel;
use crate::error::{VaeError, VaeResult};

use candle_core::{Device, Tensor};
use statrs::distribution::{ContinuousCDF, Normal};

/// Standard normal quantiles at `n` evenly spaced probabilities in
/// `[p_lo, p_hi]`
pub fn normal_quantile_grid(n: usize, p_lo: f64, p_hi: f64) -> VaeResult<Vec<f32>> {
    if !(0. < p_lo && p_lo <= p_hi && p_hi < 1.) {
        return Err(VaeError::invalid_config(format!(
            "quantile range must be inside (0, 1): [{}, {}]",
            p_lo, p_hi
        )));
    }
    let normal = Normal::new(0., 1.).map_err(|e| VaeError::invalid_config(e.to_string()))?;
    let step = if n > 1 {
        (p_hi - p_lo) / (n - 1) as f64
    } else {
        0.
    };
    Ok((0..n)
        .map(|i| normal.inverse_cdf(p_lo + step * i as f64) as f32)
        .collect())
}

/// Latent points of an `n x n` grid, row-major: row `i` takes
/// `grid[i]` on the second latent axis and column `j` takes `grid[j]`
/// on the first one.
///
/// # Returns `z` (n*n x 2)
pub fn latent_grid_points(grid: &[f32], device: &Device) -> VaeResult<Tensor> {
    let n = grid.len();
    let mut points = Vec::with_capacity(n * n * 2);
    for &yi in grid {
        for &xj in grid {
            points.push(xj);
            points.push(yi);
        }
    }
    Ok(Tensor::from_vec(points, (n * n, 2), device)?)
}

/// Decode a 2D latent grid into one big `(n * H) x (n * W)` picture
/// of the first image channel, tile `(i, j)` from grid point
/// `(grid[j], grid[i])`
///
/// * `model` - a VAE with a 2-dimensional latent space
/// * `n` - tiles per side
/// * `device` - where to run the decoder
pub fn decode_manifold<Enc, Dec>(
    model: &VaeModel<Enc, Dec>,
    n: usize,
    device: &Device,
) -> VaeResult<Tensor>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    if model.dim_latent() != 2 {
        return Err(VaeError::DimensionMismatch {
            expected: 2,
            got: model.dim_latent(),
        });
    }
    if n == 0 {
        return Err(VaeError::invalid_config("manifold needs at least one tile"));
    }

    let grid = normal_quantile_grid(n, 0.05, 0.95)?;
    let z = latent_grid_points(&grid, device)?;

    let shape = model.image_shape();
    let (h, w) = (shape.height, shape.width);

    // (n*n) x C x H x W -> n x n x H x W -> n x H x n x W
    let tiles = model
        .decode(&z)?
        .narrow(1, 0, 1)?
        .reshape((n, n, h, w))?
        .permute((0, 2, 1, 3))?
        .contiguous()?;

    Ok(tiles.reshape((n * h, n * w))?.to_device(&Device::Cpu)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn grid_is_symmetric() -> VaeResult<()> {
        let grid = normal_quantile_grid(20, 0.05, 0.95)?;
        assert_eq!(grid.len(), 20);
        assert_abs_diff_eq!(grid[0], -1.644_853_6, epsilon = 1e-4);
        for i in 0..20 {
            assert_abs_diff_eq!(grid[i], -grid[19 - i], epsilon = 1e-4);
        }
        assert!(grid.windows(2).all(|w| w[0] < w[1]));
        Ok(())
    }

    #[test]
    fn rejects_open_range() {
        assert!(normal_quantile_grid(5, 0., 0.95).is_err());
        assert!(normal_quantile_grid(5, 0.5, 1.).is_err());
    }

    #[test]
    fn grid_points_layout() -> VaeResult<()> {
        let z = latent_grid_points(&[-1., 1.], &Device::Cpu)?;
        assert_eq!(
            z.to_vec2::<f32>()?,
            vec![vec![-1., -1.], vec![1., -1.], vec![-1., 1.], vec![1., 1.]]
        );
        Ok(())
    }
}
