use crate::error::{VaeError, VaeResult};
use candle_core::Tensor;

fn check_latent_params(z_mean: &Tensor, z_lnvar: &Tensor) -> VaeResult<()> {
    let (n_mean, k_mean) = z_mean.dims2()?;
    let (n_lnvar, k_lnvar) = z_lnvar.dims2()?;
    if k_mean != k_lnvar {
        return Err(VaeError::DimensionMismatch {
            expected: k_mean,
            got: k_lnvar,
        });
    }
    if n_mean != n_lnvar {
        return Err(VaeError::shape_mismatch(z_mean.dims(), z_lnvar.dims()));
    }
    Ok(())
}

///
/// z = mu + exp(lnvar) * eps
/// where eps ~ N(0, 1)
///
/// A new `eps` is drawn on every call. Gradients flow through `mu`
/// and `lnvar`; the noise carries no trainable dependency.
///
/// # Arguments
/// * `z_mean` - mean of Gaussian distribution (n x k)
/// * `z_lnvar` - log variance of Gaussian distribution (n x k)
pub fn reparameterize(z_mean: &Tensor, z_lnvar: &Tensor) -> VaeResult<Tensor> {
    check_latent_params(z_mean, z_lnvar)?;
    let eps = Tensor::randn_like(z_mean, 0., 1.)?;
    Ok((z_mean + z_lnvar.exp()?.mul(&eps)?)?)
}

/// Draw `n_draws` independent samples for every row
///
/// # Returns `z_snk` (n_draws x n x k)
pub fn sample_many(z_mean: &Tensor, z_lnvar: &Tensor, n_draws: usize) -> VaeResult<Tensor> {
    check_latent_params(z_mean, z_lnvar)?;
    let (n, k) = z_mean.dims2()?;
    let mean_snk = z_mean.unsqueeze(0)?.broadcast_as((n_draws, n, k))?;
    let lnvar_snk = z_lnvar.unsqueeze(0)?.broadcast_as((n_draws, n, k))?;
    let eps = Tensor::randn_like(&mean_snk.contiguous()?, 0., 1.)?;
    Ok((mean_snk.contiguous()? + lnvar_snk.exp()?.mul(&eps)?)?)
}
