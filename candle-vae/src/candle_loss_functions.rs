use candle_core::{Result, Tensor};

/// Probabilities are clamped into `[eps, 1 - eps]` before taking logs
pub const BCE_EPSILON: f64 = 1e-7;

/// KL divergence of a diagonal Gaussian from the standard normal,
/// averaged over latent dimensions
///
/// -0.5 * mean_k (1 + log(sigma^2) - mu^2 - sigma^2)
///
/// Non-negative, and zero only at `mu = 0, log(sigma^2) = 0`.
///
/// * `z_mean` - mean of Gaussian distribution (n x k)
/// * `z_lnvar` - log variance of Gaussian distribution (n x k)
///
/// # Returns `kl_n` (n)
pub fn gaussian_kl_loss(z_mean: &Tensor, z_lnvar: &Tensor) -> Result<Tensor> {
    let z_var = z_lnvar.exp()?;
    (z_var - 1. + z_mean.sqr()? - z_lnvar)?.mean(z_mean.rank() - 1)? * 0.5
}

/// Binary cross-entropy of pixel intensities treated as independent
/// Bernoulli probabilities, averaged over all pixels of each image
///
/// bce(i) = - mean_j [ x(i,j) log xhat(i,j) + (1 - x(i,j)) log(1 - xhat(i,j)) ]
///
/// * `x` - observed images (n x ...), values in [0, 1]
/// * `x_hat` - reconstruction (n x ...), probabilities
///
/// # Returns `bce_n` (n)
pub fn binary_cross_entropy(x: &Tensor, x_hat: &Tensor) -> Result<Tensor> {
    let x_nd = x.flatten_from(1)?;
    let p_nd = x_hat
        .flatten_from(1)?
        .clamp(BCE_EPSILON, 1. - BCE_EPSILON)?;

    let log_p = p_nd.log()?;
    let log_1mp = p_nd.affine(-1., 1.)?.log()?;
    let x_1m = x_nd.affine(-1., 1.)?;

    let llik_nd = (x_nd.mul(&log_p)? + x_1m.mul(&log_1mp)?)?;
    llik_nd.mean(1)?.neg()
}

/// Training objective and its unweighted components
pub struct VaeLoss {
    /// scalar: mean over the batch of `reconstruction + kl_weight * kl`
    pub total: Tensor,
    /// per-image binary cross-entropy (n)
    pub reconstruction: Tensor,
    /// per-image KL divergence before weighting (n)
    pub kl: Tensor,
}

impl VaeLoss {
    pub fn total_value(&self) -> Result<f32> {
        self.total.to_scalar::<f32>()
    }

    pub fn reconstruction_sum(&self) -> Result<f32> {
        self.reconstruction.sum_all()?.to_scalar::<f32>()
    }

    pub fn kl_sum(&self) -> Result<f32> {
        self.kl.sum_all()?.to_scalar::<f32>()
    }
}

/// Composite VAE objective
///
/// loss = mean_n [ bce(x, xhat) + kl_weight * KL(N(mu, exp(lnvar)) || N(0, I)) ]
///
/// * `x` - observed images
/// * `x_hat` - reconstruction of the same images
/// * `z_mean` - encoder mean for the same images (n x k)
/// * `z_lnvar` - encoder log-variance for the same images (n x k)
/// * `kl_weight` - scale of the regularizer
pub fn compute_loss(
    x: &Tensor,
    x_hat: &Tensor,
    z_mean: &Tensor,
    z_lnvar: &Tensor,
    kl_weight: f64,
) -> Result<VaeLoss> {
    let reconstruction = binary_cross_entropy(x, x_hat)?;
    let kl = gaussian_kl_loss(z_mean, z_lnvar)?;
    let total = (&reconstruction + (&kl * kl_weight)?)?.mean_all()?;
    Ok(VaeLoss {
        total,
        reconstruction,
        kl,
    })
}
