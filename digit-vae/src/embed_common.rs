pub use clap::{Args, Parser, Subcommand, ValueEnum};
pub use log::info;

pub use candle_vae::candle_context::ExecutionContext;
pub use candle_vae::candle_vae_config::{ImageShape, VaeConfig};
pub use candle_vae::candle_vae_model::ConvVae;
pub use candle_vae::candle_core;

pub use digit_data::digit_csv::DigitTable;
pub use digit_data::tensor_io::write_tensor_tsv;

#[derive(ValueEnum, Clone, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cpu,
    Cuda,
    Metal,
}

/// Options shared by every command that runs the model
#[derive(Args, Debug)]
pub struct DeviceArgs {
    #[arg(
        long,
        value_enum,
        default_value = "cpu",
        help = "Candle device",
        long_help = "Candle device to use for computation.\n\
		     Options: cpu, cuda, metal.\n\
		     cuda and metal need the matching cargo feature."
    )]
    pub device: ComputeDevice,

    #[arg(
        long,
        default_value_t = 0,
        help = "A device for cuda",
        long_help = "For cuda or metal, we may want to choose a different device."
    )]
    pub device_no: usize,

    #[arg(
        long,
        help = "Random seed",
        long_help = "Random seed for minibatch shuffling and, on gpu devices,\n\
		     for the sampler noise."
    )]
    pub seed: Option<u64>,

    #[arg(
        long,
        default_value_t = 16,
        help = "Minibatch size",
        long_help = "Minibatch size for training and prediction.\n\
		     Controls the number of images per batch."
    )]
    pub minibatch_size: usize,
}

impl DeviceArgs {
    pub fn device(&self) -> anyhow::Result<candle_core::Device> {
        Ok(match self.device {
            ComputeDevice::Metal => candle_core::Device::new_metal(self.device_no)?,
            ComputeDevice::Cuda => candle_core::Device::new_cuda(self.device_no)?,
            ComputeDevice::Cpu => candle_core::Device::Cpu,
        })
    }

    pub fn context(&self) -> anyhow::Result<ExecutionContext> {
        Ok(ExecutionContext::new(self.device()?, self.seed)?)
    }
}

pub fn init_logger(verbose: bool) {
    if verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();
}

/// `{out}.safetensors` and `{out}.model.json`
pub struct ModelFiles {
    pub weights: Box<str>,
    pub config: Box<str>,
}

impl ModelFiles {
    pub fn new(header: &str) -> Self {
        Self {
            weights: format!("{}.safetensors", header).into_boxed_str(),
            config: format!("{}.model.json", header).into_boxed_str(),
        }
    }
}

/// Build the model from `{model}.model.json` inside `context`, then
/// overwrite its parameters from `{model}.safetensors`
pub fn load_model(model_header: &str, context: &mut ExecutionContext) -> anyhow::Result<ConvVae> {
    let files = ModelFiles::new(model_header);
    let config = VaeConfig::from_json(&files.config)?;
    info!(
        "model: {} images, {} latent dimensions",
        config.image_shape, config.latent_dim
    );
    let model = ConvVae::new(&config, context)?;
    context.load(&files.weights)?;
    Ok(model)
}

pub fn to_names<T: std::fmt::Display>(items: &[T]) -> Vec<Box<str>> {
    items
        .iter()
        .map(|x| x.to_string().into_boxed_str())
        .collect()
}

/// Latent coordinates with index and label columns
///
/// * `z` - latent means or log-variances (n x k)
/// * `rows` - row index of each image in its table
/// * `labels` - one label per row
/// * `file` - output file
pub fn write_latent(
    z: &candle_core::Tensor,
    rows: &[usize],
    labels: &[i64],
    file: &str,
) -> anyhow::Result<()> {
    let (n, k) = z.dims2()?;
    if rows.len() != n || labels.len() != n {
        return Err(anyhow::anyhow!(
            "{} rows and {} labels for {} latent vectors",
            rows.len(),
            labels.len(),
            n
        ));
    }

    let mut header: Vec<Box<str>> = vec!["index".into(), "label".into()];
    header.extend((1..=k).map(|j| format!("z{}", j).into_boxed_str()));

    let row_names: Vec<Box<str>> = rows
        .iter()
        .zip(labels)
        .map(|(i, l)| format!("{}\t{}", i, l).into_boxed_str())
        .collect();

    write_tensor_tsv(z, file, Some(&header), Some(&row_names))?;
    info!("wrote {} latent vectors to {}", n, file);
    Ok(())
}

#[cfg(test)]
pub mod test_util {
    use super::*;
    use std::io::BufRead;

    pub fn cpu_args() -> DeviceArgs {
        DeviceArgs {
            device: ComputeDevice::Cpu,
            device_no: 0,
            seed: Some(0),
            minibatch_size: 2,
        }
    }

    pub fn temp_file(dir: &tempfile::TempDir, name: &str) -> anyhow::Result<String> {
        let path = dir.path().join(name);
        Ok(path.to_str().ok_or(anyhow::anyhow!("path"))?.to_string())
    }

    /// Save an untrained 4x4 model; returns its header
    pub fn save_tiny_model(dir: &tempfile::TempDir, latent_dim: usize) -> anyhow::Result<String> {
        let header = temp_file(dir, &format!("tiny_k{}", latent_dim))?;
        let config = VaeConfig {
            image_shape: ImageShape::new(4, 4, 1),
            latent_dim,
            hidden_dim: 8,
            ..Default::default()
        };
        let context = ExecutionContext::cpu();
        let _model = ConvVae::new(&config, &context)?;
        let files = ModelFiles::new(&header);
        context.save(&files.weights)?;
        config.to_json(&files.config)?;
        Ok(header)
    }

    /// Lines of a (gzipped) text file, split on tabs
    pub fn read_fields(file: &str) -> anyhow::Result<Vec<Vec<String>>> {
        let mut ret = vec![];
        for line in digit_data::common_io::open_buf_reader(file)?.lines() {
            ret.push(line?.split('\t').map(|x| x.to_string()).collect());
        }
        Ok(ret)
    }
}
