//! Optimizer wrapper selecting SGD or Adam from config.

use candle_core::{backprop::GradStore, Result, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap, SGD};

use akshar_core::OptimizerConfig;

/// Batch-norm running statistics live in the VarMap but are not trained.
const BUFFER_SUFFIXES: [&str; 2] = ["running_mean", "running_var"];

/// Variables of `varmap` that receive gradient updates, sorted by name.
pub fn trainable_vars(varmap: &VarMap) -> Vec<Var> {
    let data = varmap.data().lock().unwrap_or_else(|e| e.into_inner());
    let mut named: Vec<(&String, &Var)> = data
        .iter()
        .filter(|(name, _)| !BUFFER_SUFFIXES.iter().any(|s| name.ends_with(s)))
        .collect();
    named.sort_by(|a, b| a.0.cmp(b.0));
    named.into_iter().map(|(_, var)| var.clone()).collect()
}

/// Wrapper enum over the optimizers a network can be configured with.
pub enum NetOptimizer {
    Sgd(SGD),
    Adam(AdamW),
}

impl NetOptimizer {
    pub fn from_config(vars: Vec<Var>, config: &OptimizerConfig) -> Result<Self> {
        match *config {
            OptimizerConfig::Sgd { lr } => Ok(NetOptimizer::Sgd(SGD::new(vars, lr)?)),
            OptimizerConfig::Adam {
                lr,
                betas,
                eps,
                weight_decay,
            } => {
                let params = ParamsAdamW {
                    lr,
                    beta1: betas.0,
                    beta2: betas.1,
                    eps,
                    weight_decay,
                };
                Ok(NetOptimizer::Adam(AdamW::new(vars, params)?))
            }
        }
    }

    /// Apply one update from already computed gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            NetOptimizer::Sgd(o) => o.step(grads),
            NetOptimizer::Adam(o) => o.step(grads),
        }
    }

    /// Backpropagate `loss` and apply one update.
    ///
    /// Gradients are recomputed from scratch on every call, so nothing
    /// accumulates between steps.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        let grads = loss.backward()?;
        self.step(&grads)
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            NetOptimizer::Sgd(o) => o.learning_rate(),
            NetOptimizer::Adam(o) => o.learning_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarBuilder;

    fn quadratic_loss(var: &Var) -> Result<Tensor> {
        var.as_tensor().sqr()?.sum_all()
    }

    #[test]
    fn test_sgd_step_moves_against_gradient() -> Result<()> {
        let var = Var::new(&[1.0f32, -2.0], &Device::Cpu)?;
        let mut opt = NetOptimizer::from_config(vec![var.clone()], &OptimizerConfig::sgd(0.1))?;
        opt.backward_step(&quadratic_loss(&var)?)?;

        // grad = 2x, so x <- x - 0.1 * 2x = 0.8x
        let vals = var.as_tensor().to_vec1::<f32>()?;
        assert!((vals[0] - 0.8).abs() < 1e-6);
        assert!((vals[1] + 1.6).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_adam_first_step_is_lr_sized() -> Result<()> {
        let var = Var::new(&[3.0f32], &Device::Cpu)?;
        let mut opt = NetOptimizer::from_config(vec![var.clone()], &OptimizerConfig::adam(0.01))?;
        opt.backward_step(&quadratic_loss(&var)?)?;

        let v = var.as_tensor().to_vec1::<f32>()?[0];
        assert!((v - 2.99).abs() < 1e-4, "first Adam step should move by ~lr: {}", v);
        Ok(())
    }

    #[test]
    fn test_learning_rate_from_config() -> Result<()> {
        let var = Var::new(&[1.0f32], &Device::Cpu)?;
        let sgd = NetOptimizer::from_config(vec![var.clone()], &OptimizerConfig::sgd(0.01))?;
        let adam = NetOptimizer::from_config(vec![var], &OptimizerConfig::adam(0.5))?;
        assert_eq!(sgd.learning_rate(), 0.01);
        assert_eq!(adam.learning_rate(), 0.5);
        Ok(())
    }

    #[test]
    fn test_trainable_vars_skip_running_stats() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let _bn = candle_nn::batch_norm(4, candle_nn::BatchNormConfig::default(), vb.pp("bn"))?;

        let all = varmap.all_vars().len();
        let trainable = trainable_vars(&varmap);
        assert_eq!(all, 4);
        assert_eq!(trainable.len(), 2); // weight + bias
        Ok(())
    }
}
