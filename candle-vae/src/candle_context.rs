use crate::error::VaeResult;

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use log::{debug, info};

/// Where tensors live and who owns the trainable parameters.
///
/// Created explicitly by the caller, handed to the model builders and
/// the training loop, and released with [`ExecutionContext::finish`].
/// Nothing here is process-global.
pub struct ExecutionContext {
    device: Device,
    parameters: VarMap,
    seed: Option<u64>,
}

impl ExecutionContext {
    /// * `device` - candle device (cpu, cuda, metal)
    /// * `seed` - seed for the device random generator, if it has one
    pub fn new(device: Device, seed: Option<u64>) -> VaeResult<Self> {
        if let Some(seed) = seed {
            if device.is_cpu() {
                // candle's cpu backend draws from the thread rng
                debug!("cpu device: random seed {} only affects data shuffling", seed);
            } else {
                device.set_seed(seed)?;
            }
        }

        info!("execution context on {:?}", device);

        Ok(Self {
            device,
            parameters: VarMap::new(),
            seed,
        })
    }

    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
            parameters: VarMap::new(),
            seed: None,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn parameters(&self) -> &VarMap {
        &self.parameters
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// A variable builder registering new parameters in this context
    pub fn var_builder(&self) -> VarBuilder<'static> {
        VarBuilder::from_varmap(&self.parameters, DType::F32, &self.device)
    }

    pub fn num_parameters(&self) -> usize {
        self.parameters
            .all_vars()
            .iter()
            .map(|v| v.elem_count())
            .sum()
    }

    /// Write all registered parameters to a safetensors file
    pub fn save(&self, file_path: &str) -> VaeResult<()> {
        self.parameters.save(file_path)?;
        info!("saved {} parameters to {}", self.num_parameters(), file_path);
        Ok(())
    }

    /// Overwrite the already registered parameters from a safetensors
    /// file; build the model first so that the names exist.
    pub fn load(&mut self, file_path: &str) -> VaeResult<()> {
        self.parameters.load(file_path)?;
        info!("loaded {} parameters from {}", self.num_parameters(), file_path);
        Ok(())
    }

    /// Release the parameters and wait for pending device work
    pub fn finish(self) -> VaeResult<()> {
        self.device.synchronize()?;
        debug!("released {} parameters", self.num_parameters());
        Ok(())
    }
}
