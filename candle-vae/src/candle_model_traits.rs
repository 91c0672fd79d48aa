use crate::candle_vae_config::ImageShape;
use candle_core::{Result, Tensor};

pub trait EncoderModuleT {
    /// An encoder that spits out the parameters of a diagonal
    /// Gaussian posterior, deterministically
    ///
    /// # Arguments
    /// * `x_nchw` - input images (n x c x h x w)
    ///
    /// # Returns `(z_mean_nk, z_lnvar_nk)`
    /// * `z_mean_nk` - latent mean (n x k)
    /// * `z_lnvar_nk` - latent log-variance (n x k)
    fn latent_gaussian_params(&self, x_nchw: &Tensor) -> Result<(Tensor, Tensor)>;

    fn image_shape(&self) -> ImageShape;

    fn dim_latent(&self) -> usize;
}

pub trait DecoderModuleT {
    /// A decoder that spits out reconstruction (n x c x h x w) from
    /// latent states (n x k)
    fn forward(&self, z_nk: &Tensor) -> Result<Tensor>;

    fn image_shape(&self) -> ImageShape;

    fn dim_latent(&self) -> usize;
}
