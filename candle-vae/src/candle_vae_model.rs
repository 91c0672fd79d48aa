use crate::candle_context::ExecutionContext;
use crate::candle_conv_decoder::ConvDecoder;
use crate::candle_conv_encoder::ConvEncoder;
use crate::candle_loss_functions::{compute_loss, VaeLoss};
use crate::candle_model_traits::{DecoderModuleT, EncoderModuleT};
use crate::candle_sampler::reparameterize;
use crate::candle_vae_config::{ImageShape, VaeConfig};
use crate::error::{VaeError, VaeResult};

use candle_core::Tensor;

/// Everything one forward pass produced
pub struct VaeForward {
    pub z_mean: Tensor,
    pub z_lnvar: Tensor,
    pub z: Tensor,
    pub recon: Tensor,
}

/// Encoder and decoder sharing a latent space
pub struct VaeModel<Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    encoder: Enc,
    decoder: Dec,
    kl_weight: f64,
}

pub type ConvVae = VaeModel<ConvEncoder, ConvDecoder>;

impl ConvVae {
    /// Register a convolutional encoder and decoder in `context`
    pub fn new(config: &VaeConfig, context: &ExecutionContext) -> VaeResult<Self> {
        config.validate()?;
        let vs = context.var_builder();
        let encoder = ConvEncoder::new(config, vs.clone())?;
        let decoder = ConvDecoder::new(config, vs)?;
        Self::build(encoder, decoder, config.kl_weight)
    }
}

impl<Enc, Dec> VaeModel<Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    /// Build a VAE model
    /// * `encoder` - encoder module
    /// * `decoder` - decoder module
    /// * `kl_weight` - scale of the KL regularizer
    pub fn build(encoder: Enc, decoder: Dec, kl_weight: f64) -> VaeResult<Self> {
        if encoder.dim_latent() != decoder.dim_latent() {
            return Err(VaeError::DimensionMismatch {
                expected: encoder.dim_latent(),
                got: decoder.dim_latent(),
            });
        }
        if encoder.image_shape() != decoder.image_shape() {
            return Err(VaeError::shape_mismatch(
                encoder.image_shape(),
                decoder.image_shape(),
            ));
        }
        Ok(Self {
            encoder,
            decoder,
            kl_weight,
        })
    }

    pub fn encoder(&self) -> &Enc {
        &self.encoder
    }

    pub fn decoder(&self) -> &Dec {
        &self.decoder
    }

    pub fn image_shape(&self) -> ImageShape {
        self.encoder.image_shape()
    }

    pub fn dim_latent(&self) -> usize {
        self.encoder.dim_latent()
    }

    pub fn kl_weight(&self) -> f64 {
        self.kl_weight
    }

    /// Check `x` is `[n, C, H, W]` for the configured image shape
    ///
    /// # Returns the batch size `n`
    pub fn check_images(&self, x: &Tensor) -> VaeResult<usize> {
        let shape = self.image_shape();
        match x.dims() {
            &[n, c, h, w] if (c, h, w) == (shape.channels, shape.height, shape.width) => Ok(n),
            dims => Err(VaeError::shape_mismatch(
                ("n", shape.channels, shape.height, shape.width),
                dims,
            )),
        }
    }

    /// Check `z` is `[n, K]` for the latent dimension K
    ///
    /// # Returns the batch size `n`
    pub fn check_latent(&self, z: &Tensor) -> VaeResult<usize> {
        let k = self.dim_latent();
        match z.dims() {
            &[n, kk] if kk == k => Ok(n),
            &[_, kk] => Err(VaeError::DimensionMismatch {
                expected: k,
                got: kk,
            }),
            dims => Err(VaeError::shape_mismatch(("n", k), dims)),
        }
    }

    /// Deterministic posterior parameters `(mean, lnvar)`
    pub fn encode(&self, x: &Tensor) -> VaeResult<(Tensor, Tensor)> {
        self.check_images(x)?;
        let (z_mean, z_lnvar) = self.encoder.latent_gaussian_params(x)?;
        self.check_latent(&z_mean)?;
        self.check_latent(&z_lnvar)?;
        Ok((z_mean, z_lnvar))
    }

    /// Reparameterized draw with fresh noise
    pub fn sample(&self, z_mean: &Tensor, z_lnvar: &Tensor) -> VaeResult<Tensor> {
        self.check_latent(z_mean)?;
        self.check_latent(z_lnvar)?;
        reparameterize(z_mean, z_lnvar)
    }

    /// Images for arbitrary latent points
    pub fn decode(&self, z: &Tensor) -> VaeResult<Tensor> {
        let n = self.check_latent(z)?;
        let recon = self.decoder.forward(z)?;
        let recon_n = self.check_images(&recon)?;
        debug_assert_eq!(n, recon_n);
        Ok(recon)
    }

    /// image -> (mean, lnvar) -> z -> reconstruction
    pub fn forward(&self, x: &Tensor) -> VaeResult<VaeForward> {
        let (z_mean, z_lnvar) = self.encode(x)?;
        let z = self.sample(&z_mean, &z_lnvar)?;
        let recon = self.decode(&z)?;
        Ok(VaeForward {
            z_mean,
            z_lnvar,
            z,
            recon,
        })
    }

    /// Score a forward pass of the same images `x`
    pub fn loss(&self, x: &Tensor, forward: &VaeForward) -> VaeResult<VaeLoss> {
        Ok(compute_loss(
            x,
            &forward.recon,
            &forward.z_mean,
            &forward.z_lnvar,
            self.kl_weight,
        )?)
    }
}
