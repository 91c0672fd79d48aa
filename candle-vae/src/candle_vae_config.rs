use crate::error::{VaeError, VaeResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LATENT_DIM: usize = 2;
pub const DEFAULT_HIDDEN_DIM: usize = 32;

/// The reconstruction term is a per-pixel mean while the KL term is
/// a per-dimension mean, so the regularizer is heavily down-weighted:
/// `kl_weight * (-0.5) * mean(1 + lnvar - mean^2 - exp(lnvar))`
/// gives the `-5e-4` factor for the default.
pub const DEFAULT_KL_WEIGHT: f64 = 1e-3;

/// Image grid `height x width x channels`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageShape {
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// 28 x 28 x 1 handwritten digits
    pub fn digits() -> Self {
        Self::new(28, 28, 1)
    }

    pub fn numel(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// `[n, C, H, W]` as laid out in candle convolutions
    pub fn batch_dims(&self, n: usize) -> (usize, usize, usize, usize) {
        (n, self.channels, self.height, self.width)
    }
}

impl Default for ImageShape {
    fn default() -> Self {
        Self::digits()
    }
}

impl std::fmt::Display for ImageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// Architecture and objective of the convolutional VAE
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaeConfig {
    pub image_shape: ImageShape,
    pub latent_dim: usize,
    pub hidden_dim: usize,
    pub kl_weight: f64,
}

impl Default for VaeConfig {
    fn default() -> Self {
        Self {
            image_shape: ImageShape::digits(),
            latent_dim: DEFAULT_LATENT_DIM,
            hidden_dim: DEFAULT_HIDDEN_DIM,
            kl_weight: DEFAULT_KL_WEIGHT,
        }
    }
}

impl VaeConfig {
    pub fn validate(&self) -> VaeResult<()> {
        let shape = &self.image_shape;
        if shape.numel() == 0 {
            return Err(VaeError::invalid_config(format!(
                "empty image shape {}",
                shape
            )));
        }
        // one stride-2 stage down and one back up
        if shape.height % 2 != 0 || shape.width % 2 != 0 {
            return Err(VaeError::invalid_config(format!(
                "image height and width must be even: {}",
                shape
            )));
        }
        if self.latent_dim < 1 {
            return Err(VaeError::invalid_config("latent dimension must be >= 1"));
        }
        if self.hidden_dim < 1 {
            return Err(VaeError::invalid_config("hidden dimension must be >= 1"));
        }
        if !self.kl_weight.is_finite() || self.kl_weight < 0. {
            return Err(VaeError::invalid_config(format!(
                "KL weight must be finite and non-negative: {}",
                self.kl_weight
            )));
        }
        Ok(())
    }

    pub fn to_json(&self, file_path: &str) -> VaeResult<()> {
        let file = std::fs::File::create(file_path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn from_json(file_path: &str) -> VaeResult<Self> {
        let file = std::fs::File::open(file_path)?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }
}
