use crate::candle_aux_layers::*;
use crate::candle_model_traits::*;
use crate::candle_vae_config::{ImageShape, VaeConfig};
use candle_core::{Result, Tensor};
use candle_nn::{Activation, Conv2d, Linear, Module};

/// Channel depth after the convolution stack
pub const ENCODER_OUT_CHANNELS: usize = 64;

const KERNEL_SIZE: usize = 3;

/// Convolution stages: 32 channels, then 64 with stride 2, then two
/// more 64-channel stages at the reduced resolution.
pub fn encoder_stages() -> Vec<ConvStage> {
    vec![
        ConvStage {
            out_channels: 32,
            stride: 1,
        },
        ConvStage {
            out_channels: ENCODER_OUT_CHANNELS,
            stride: 2,
        },
        ConvStage {
            out_channels: ENCODER_OUT_CHANNELS,
            stride: 1,
        },
        ConvStage {
            out_channels: ENCODER_OUT_CHANNELS,
            stride: 1,
        },
    ]
}

/// Feature volume `(channels, height, width)` right before flattening
pub fn pre_flatten_volume(image_shape: &ImageShape) -> (usize, usize, usize) {
    let divisor = encoder_stages().iter().map(|s| s.stride).product::<usize>();
    (
        ENCODER_OUT_CHANNELS,
        image_shape.height.div_ceil(divisor),
        image_shape.width.div_ceil(divisor),
    )
}

pub struct ConvEncoder {
    image_shape: ImageShape,
    n_latent: usize,
    conv: StackLayers<Conv2d>,
    fc: Linear,
    z_mean: Linear,
    z_lnvar: Linear,
}

impl EncoderModuleT for ConvEncoder {
    fn latent_gaussian_params(&self, x_nchw: &Tensor) -> Result<(Tensor, Tensor)> {
        let h_nchw = self.conv.forward(x_nchw)?;
        let h_nd = h_nchw.flatten_from(1)?;
        let h_nl = Activation::Relu.forward(&self.fc.forward(&h_nd)?)?;
        let z_mean_nk = self.z_mean.forward(&h_nl)?;
        let z_lnvar_nk = self.z_lnvar.forward(&h_nl)?;
        Ok((z_mean_nk, z_lnvar_nk))
    }

    fn image_shape(&self) -> ImageShape {
        self.image_shape
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}

impl ConvEncoder {
    /// Will create a new convolutional encoder module
    /// with these variables:
    ///
    /// * `enc.conv.{}.weight` where {} is the stage index
    /// * `enc.fc.weight`
    /// * `enc.z.mean.weight`
    /// * `enc.z.lnvar.weight`
    ///
    /// # Arguments
    /// * `config` - image shape, latent and hidden dimensions
    /// * `vs` - variable builder
    pub fn new(config: &VaeConfig, vs: candle_nn::VarBuilder) -> Result<Self> {
        let image_shape = config.image_shape;

        // (1) image -> feature volume
        let (conv, _, _) = relu_conv_stack(
            image_shape.channels,
            &encoder_stages(),
            KERNEL_SIZE,
            vs.pp("enc.conv"),
        )?;

        // (2) flattened volume -> hidden
        let (c, h, w) = pre_flatten_volume(&image_shape);
        let fc = candle_nn::linear(c * h * w, config.hidden_dim, vs.pp("enc.fc"))?;

        // (3) hidden -> K
        let z_mean = candle_nn::linear(config.hidden_dim, config.latent_dim, vs.pp("enc.z.mean"))?;
        let z_lnvar =
            candle_nn::linear(config.hidden_dim, config.latent_dim, vs.pp("enc.z.lnvar"))?;

        Ok(Self {
            image_shape,
            n_latent: config.latent_dim,
            conv,
            fc,
            z_mean,
            z_lnvar,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn digit_volume() {
        assert_eq!(pre_flatten_volume(&ImageShape::digits()), (64, 14, 14));
    }

    #[test]
    fn latent_params_shape() -> Result<()> {
        let dev = Device::Cpu;
        let varmap = candle_nn::VarMap::new();
        let vs = candle_nn::VarBuilder::from_varmap(&varmap, DType::F32, &dev);
        let config = VaeConfig {
            latent_dim: 3,
            ..Default::default()
        };
        let enc = ConvEncoder::new(&config, vs)?;

        let x = Tensor::rand(0f32, 1., (5, 1, 28, 28), &dev)?;
        let (mu, lv) = enc.latent_gaussian_params(&x)?;
        assert_eq!(mu.dims(), &[5, 3]);
        assert_eq!(lv.dims(), &[5, 3]);

        // deterministic given weights and input
        let (mu2, _) = enc.latent_gaussian_params(&x)?;
        assert_eq!(mu.to_vec2::<f32>()?, mu2.to_vec2::<f32>()?);
        Ok(())
    }
}
