use crate::error::{VaeError, VaeResult};

/// Gradient-based optimizer driving the training loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimizerKind {
    AdamW,
    RmsProp,
}

pub struct TrainConfig {
    pub learning_rate: f32,
    pub batch_size: usize,
    pub num_epochs: usize,
    pub optimizer: OptimizerKind,
    pub verbose: bool,
    pub show_progress: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            batch_size: 16,
            num_epochs: 50,
            optimizer: OptimizerKind::RmsProp,
            verbose: false,
            show_progress: true,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> VaeResult<()> {
        if self.batch_size < 1 {
            return Err(VaeError::invalid_config("batch size must be >= 1"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0. {
            return Err(VaeError::invalid_config(format!(
                "learning rate must be positive: {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}
