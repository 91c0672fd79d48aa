use crate::candle_inference::OptimizerKind;

use candle_core::backprop::GradStore;
use candle_core::{Result, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};

#[derive(Clone, Debug)]
pub struct ParamsRmsProp {
    pub lr: f64,
    /// decay of the running mean of squared gradients
    pub rho: f64,
    pub eps: f64,
}

impl Default for ParamsRmsProp {
    fn default() -> Self {
        Self {
            lr: 1e-3,
            rho: 0.9,
            eps: 1e-7,
        }
    }
}

struct VarRmsProp {
    var: Var,
    mean_square: Var,
}

///
/// RMSprop
///
/// v = rho * v + (1 - rho) * g^2
/// theta = theta - lr * g / (sqrt(v) + eps)
///
pub struct RmsProp {
    vars: Vec<VarRmsProp>,
    params: ParamsRmsProp,
}

impl Optimizer for RmsProp {
    type Config = ParamsRmsProp;

    fn new(vars: Vec<Var>, params: ParamsRmsProp) -> Result<Self> {
        let vars = vars
            .into_iter()
            .filter(|var| var.dtype().is_float())
            .map(|var| {
                let mean_square = Var::zeros(var.dims(), var.dtype(), var.device())?;
                Ok(VarRmsProp { var, mean_square })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { vars, params })
    }

    fn learning_rate(&self) -> f64 {
        self.params.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.params.lr = lr;
    }

    fn step(&mut self, grads: &GradStore) -> Result<()> {
        let rho = self.params.rho;
        let lr = self.params.lr;
        let eps = self.params.eps;

        for v in self.vars.iter() {
            let theta = &v.var;
            if let Some(g) = grads.get(theta.as_tensor()) {
                let next_v = ((v.mean_square.as_tensor() * rho)? + (g.sqr()? * (1. - rho))?)?;
                let delta = g.div(&(next_v.sqrt()? + eps)?)?;
                let next_theta = theta.as_tensor().sub(&(delta * lr)?)?;
                v.mean_square.set(&next_v)?;
                theta.set(&next_theta)?;
            }
        }
        Ok(())
    }
}

/// Either of the optimizers a training run can pick
pub enum VaeOptimizer {
    AdamW(AdamW),
    RmsProp(RmsProp),
}

impl VaeOptimizer {
    pub fn new(kind: OptimizerKind, vars: Vec<Var>, learning_rate: f64) -> Result<Self> {
        match kind {
            OptimizerKind::AdamW => Ok(Self::AdamW(AdamW::new(
                vars,
                ParamsAdamW {
                    lr: learning_rate,
                    ..Default::default()
                },
            )?)),
            OptimizerKind::RmsProp => Ok(Self::RmsProp(RmsProp::new(
                vars,
                ParamsRmsProp {
                    lr: learning_rate,
                    ..Default::default()
                },
            )?)),
        }
    }

    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::AdamW(opt) => opt.backward_step(loss),
            Self::RmsProp(opt) => opt.backward_step(loss),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            Self::AdamW(opt) => opt.learning_rate(),
            Self::RmsProp(opt) => opt.learning_rate(),
        }
    }
}
