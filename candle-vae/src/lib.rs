pub mod candle_aux_layers;
pub mod candle_context;
pub mod candle_conv_decoder;
pub mod candle_conv_encoder;
pub mod candle_data_loader;
pub mod candle_data_loader_util;
pub mod candle_inference;
pub mod candle_latent_manifold;
pub mod candle_loss_functions;
pub mod candle_model_traits;
pub mod candle_optimizers;
pub mod candle_sampler;
pub mod candle_vae_config;
pub mod candle_vae_inference;
pub mod candle_vae_model;
pub mod error;

pub use candle_core;
pub use candle_nn;
