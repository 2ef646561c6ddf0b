//! LSTM gate fusion
//!
//! Computes one timestep's gates from precomputed `X*W^T` and `H*R^T`
//! products, fused with bias, optional peephole terms, optional
//! pre-activation clip, and the cell/hidden state update. Gate order in the
//! precomputed products is `i, o, f, c` (input, output, forget, candidate),
//! four blocks of `hidden` per row.
//!
//! Rows whose sequence position has run past their valid length (ragged
//! batch padding) are zero-filled and skipped.

/// Activation applied to a gate pre-activation
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GateActivation {
    /// `1 / (1 + exp(-x))`
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
    /// `max(x, 0)`
    Relu,
    /// `alpha * x + beta`
    Affine {
        /// Slope
        alpha: f32,
        /// Offset
        beta: f32,
    },
    /// `x >= 0 ? x : alpha * x`
    LeakyRelu {
        /// Negative-side slope
        alpha: f32,
    },
    /// `x > alpha ? x : 0`
    ThresholdedRelu {
        /// Threshold
        alpha: f32,
    },
    /// `alpha * tanh(beta * x)`
    ScaledTanh {
        /// Output scale
        alpha: f32,
        /// Input scale
        beta: f32,
    },
    /// `clamp(alpha * x + beta, 0, 1)`
    HardSigmoid {
        /// Slope
        alpha: f32,
        /// Offset
        beta: f32,
    },
    /// `x >= 0 ? x : alpha * (exp(x) - 1)`
    Elu {
        /// Negative-side scale
        alpha: f32,
    },
    /// `x / (1 + |x|)`
    Softsign,
    /// `log(1 + exp(x))`
    Softplus,
}

impl GateActivation {
    /// Apply the activation to one pre-activation value
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            GateActivation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            GateActivation::Tanh => x.tanh(),
            GateActivation::Relu => x.max(0.0),
            GateActivation::Affine { alpha, beta } => alpha * x + beta,
            GateActivation::LeakyRelu { alpha } => {
                if x >= 0.0 {
                    x
                } else {
                    alpha * x
                }
            }
            GateActivation::ThresholdedRelu { alpha } => {
                if x > alpha {
                    x
                } else {
                    0.0
                }
            }
            GateActivation::ScaledTanh { alpha, beta } => alpha * (beta * x).tanh(),
            GateActivation::HardSigmoid { alpha, beta } => (alpha * x + beta).clamp(0.0, 1.0),
            GateActivation::Elu { alpha } => {
                if x >= 0.0 {
                    x
                } else {
                    alpha * (x.exp() - 1.0)
                }
            }
            GateActivation::Softsign => x / (1.0 + x.abs()),
            GateActivation::Softplus => x.exp().ln_1p(),
        }
    }
}

/// Per-cell LSTM configuration
#[derive(Copy, Clone, Debug)]
pub struct LstmConfig {
    /// Hidden state width
    pub hidden: usize,
    /// Symmetric clip applied to pre-activations before the activation;
    /// `None` disables clipping
    pub clip: Option<f32>,
    /// Derive the forget gate as `1 - input` instead of computing it
    pub input_forget: bool,
    /// Activation of the i/o/f gates
    pub gate_act: GateActivation,
    /// Activation of the cell candidate
    pub cand_act: GateActivation,
    /// Activation of the cell state feeding the hidden output
    pub out_act: GateActivation,
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            hidden: 0,
            clip: None,
            input_forget: false,
            gate_act: GateActivation::Sigmoid,
            cand_act: GateActivation::Tanh,
            out_act: GateActivation::Tanh,
        }
    }
}

#[inline]
fn clip_val(x: f32, clip: Option<f32>) -> f32 {
    match clip {
        Some(c) => x.clamp(-c, c),
        None => x,
    }
}

/// One timestep for one batch row
///
/// - `gx`, `gh`: this row's `[4 * hidden]` slices of `X*W^T` and `H*R^T`
/// - `bias`: `[8 * hidden]` (input-weight then recurrence-weight bias), optional
/// - `peephole`: `[3 * hidden]` in `i, o, f` order, optional
/// - `c`, `h`: this row's cell and hidden state, updated in place
///
/// # Safety
/// All pointers must be valid for the extents above; `c`/`h` must not alias
/// the gate products.
#[allow(clippy::too_many_arguments)]
pub unsafe fn lstm_row(
    cfg: &LstmConfig,
    gx: *const f32,
    gh: *const f32,
    bias: Option<*const f32>,
    peephole: Option<*const f32>,
    c: *mut f32,
    h: *mut f32,
) {
    let hid = cfg.hidden;
    for j in 0..hid {
        let pre = |gate: usize| -> f32 {
            let idx = gate * hid + j;
            let mut v = *gx.add(idx) + *gh.add(idx);
            if let Some(b) = bias {
                v += *b.add(idx) + *b.add(4 * hid + idx);
            }
            v
        };

        let c_prev = *c.add(j);

        // Gate order in the products: i, o, f, c
        let mut i_pre = pre(0);
        if let Some(p) = peephole {
            i_pre += *p.add(j) * c_prev;
        }
        let i_gate = cfg.gate_act.apply(clip_val(i_pre, cfg.clip));

        let f_gate = if cfg.input_forget {
            1.0 - i_gate
        } else {
            let mut f_pre = pre(2);
            if let Some(p) = peephole {
                f_pre += *p.add(2 * hid + j) * c_prev;
            }
            cfg.gate_act.apply(clip_val(f_pre, cfg.clip))
        };

        let g = cfg.cand_act.apply(clip_val(pre(3), cfg.clip));

        let c_new = f_gate * c_prev + i_gate * g;

        let mut o_pre = pre(1);
        if let Some(p) = peephole {
            // Output peephole sees the freshly updated cell state
            o_pre += *p.add(hid + j) * c_new;
        }
        let o_gate = cfg.gate_act.apply(clip_val(o_pre, cfg.clip));

        *c.add(j) = c_new;
        *h.add(j) = o_gate * cfg.out_act.apply(c_new);
    }
}

/// Zero-fill one hidden row (expired ragged-batch padding)
///
/// # Safety
/// `h` must be valid for `hidden` writes.
pub unsafe fn lstm_zero_row(hidden: usize, h: *mut f32) {
    std::slice::from_raw_parts_mut(h, hidden).fill(0.0);
}
