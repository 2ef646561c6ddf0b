//! LSTM timestep dispatch
//!
//! One call fuses the gate math for a whole batch at one sequence position.
//! The caller runs the two GEMMs (`X*W^T` and `H*R^T`) through
//! [`Engine::matmul`] and hands the products here; this keeps the recurrence
//! loop outside the engine while the per-element gate work stays fused.

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::kernels::lstm::{self, LstmConfig};
use crate::tensor::{TensorView, TensorViewMut};

impl Engine {
    /// One LSTM timestep over a batch, updating `c` and `h` in place
    ///
    /// - `gates_x`, `gates_h`: `[batch, 4 * hidden]` precomputed products
    /// - `bias`: `[8 * hidden]` (input-weight then recurrence-weight), optional
    /// - `peephole`: `[3 * hidden]` in i, o, f order, optional
    /// - `seq_lens`: per-row valid lengths; rows whose length is at or below
    ///   `seq_idx` get a zeroed hidden state and keep their cell state
    /// - `c`, `h`: `[batch, hidden]` states
    #[allow(clippy::too_many_arguments)]
    pub fn lstm_step(
        &self,
        cfg: &LstmConfig,
        gates_x: TensorView<'_, f32>,
        gates_h: TensorView<'_, f32>,
        bias: Option<TensorView<'_, f32>>,
        peephole: Option<TensorView<'_, f32>>,
        seq_lens: Option<&[i32]>,
        seq_idx: usize,
        c: &mut TensorViewMut<'_, f32>,
        h: &mut TensorViewMut<'_, f32>,
    ) -> Result<()> {
        let hid = cfg.hidden;
        if hid == 0 {
            return Err(Error::invalid_argument("hidden", "must be nonzero"));
        }
        if gates_x.rank() != 2 || gates_x.shape()[1] != 4 * hid {
            return Err(Error::shape_mismatch(
                &[gates_x.shape().first().copied().unwrap_or(0), 4 * hid],
                gates_x.shape(),
            ));
        }
        let batch = gates_x.shape()[0];
        if gates_h.shape() != gates_x.shape() {
            return Err(Error::shape_mismatch(gates_x.shape(), gates_h.shape()));
        }
        if c.shape() != [batch, hid] {
            return Err(Error::shape_mismatch(&[batch, hid], c.shape()));
        }
        if h.shape() != [batch, hid] {
            return Err(Error::shape_mismatch(&[batch, hid], h.shape()));
        }
        if let Some(bv) = &bias {
            if bv.shape() != [8 * hid] {
                return Err(Error::shape_mismatch(&[8 * hid], bv.shape()));
            }
        }
        if let Some(pv) = &peephole {
            if pv.shape() != [3 * hid] {
                return Err(Error::shape_mismatch(&[3 * hid], pv.shape()));
            }
        }
        if let Some(lens) = seq_lens {
            if lens.len() != batch {
                return Err(Error::invalid_argument(
                    "seq_lens",
                    format!("expected {batch} entries, got {}", lens.len()),
                ));
            }
        }

        let gx_addr = gates_x.ptr() as usize;
        let gh_addr = gates_h.ptr() as usize;
        let b_addr = bias.as_ref().map(|b| b.ptr() as usize);
        let p_addr = peephole.as_ref().map(|p| p.ptr() as usize);
        let c_addr = c.ptr_mut() as usize;
        let h_addr = h.ptr_mut() as usize;

        self.for_each_task(batch, 4 * hid, |row| unsafe {
            let h_row = (h_addr as *mut f32).add(row * hid);
            if let Some(lens) = seq_lens {
                if (seq_idx as i64) >= lens[row] as i64 {
                    lstm::lstm_zero_row(hid, h_row);
                    return;
                }
            }
            lstm::lstm_row(
                cfg,
                (gx_addr as *const f32).add(row * 4 * hid),
                (gh_addr as *const f32).add(row * 4 * hid),
                b_addr.map(|a| a as *const f32),
                p_addr.map(|a| a as *const f32),
                (c_addr as *mut f32).add(row * hid),
                h_row,
            );
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::lstm::GateActivation;

    fn sigmoid(x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }

    #[test]
    fn test_batch_matches_row_reference() {
        let engine = Engine::default();
        let hid = 3;
        let batch = 4;
        let cfg = LstmConfig {
            hidden: hid,
            ..Default::default()
        };
        let gx: Vec<f32> = (0..batch * 4 * hid).map(|i| (i % 9) as f32 * 0.1 - 0.4).collect();
        let gh: Vec<f32> = (0..batch * 4 * hid).map(|i| (i % 5) as f32 * 0.05).collect();
        let mut c: Vec<f32> = (0..batch * hid).map(|i| i as f32 * 0.1 - 0.5).collect();
        let mut h = vec![0.0f32; batch * hid];
        let c0 = c.clone();

        let shape_l127 = [batch, 4 * hid];
        let gxv = TensorView::new(&gx, &shape_l127).unwrap();
        let shape_l128 = [batch, 4 * hid];
        let ghv = TensorView::new(&gh, &shape_l128).unwrap();
        let shape_l129 = [batch, hid];
        let mut cv = TensorViewMut::new(&mut c, &shape_l129).unwrap();
        let shape_l130 = [batch, hid];
        let mut hv = TensorViewMut::new(&mut h, &shape_l130).unwrap();
        engine
            .lstm_step(&cfg, gxv, ghv, None, None, None, 0, &mut cv, &mut hv)
            .unwrap();

        for row in 0..batch {
            for j in 0..hid {
                let pre = |gate: usize| gx[row * 4 * hid + gate * hid + j]
                    + gh[row * 4 * hid + gate * hid + j];
                let i = sigmoid(pre(0));
                let o = sigmoid(pre(1));
                let f = sigmoid(pre(2));
                let g = pre(3).tanh();
                let c_new = f * c0[row * hid + j] + i * g;
                assert!((c[row * hid + j] - c_new).abs() < 1e-6);
                assert!((h[row * hid + j] - o * c_new.tanh()).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_expired_rows_zero_hidden_keep_cell() {
        let engine = Engine::default();
        let hid = 2;
        let cfg = LstmConfig {
            hidden: hid,
            ..Default::default()
        };
        let gx = vec![1.0f32; 2 * 4 * hid];
        let gh = vec![0.5f32; 2 * 4 * hid];
        let mut c = vec![0.7f32; 2 * hid];
        let mut h = vec![0.3f32; 2 * hid];
        let lens = [5i32, 2];

        let shape_l164 = [2, 4 * hid];
        let gxv = TensorView::new(&gx, &shape_l164).unwrap();
        let shape_l165 = [2, 4 * hid];
        let ghv = TensorView::new(&gh, &shape_l165).unwrap();
        let shape_l166 = [2, hid];
        let mut cv = TensorViewMut::new(&mut c, &shape_l166).unwrap();
        let shape_l167 = [2, hid];
        let mut hv = TensorViewMut::new(&mut h, &shape_l167).unwrap();
        engine
            .lstm_step(&cfg, gxv, ghv, None, None, Some(&lens), 3, &mut cv, &mut hv)
            .unwrap();

        // Row 0 is live (3 < 5); row 1 expired (3 >= 2)
        assert!(h[..hid].iter().all(|&v| v != 0.3));
        assert!(h[hid..].iter().all(|&v| v == 0.0));
        assert!(c[hid..].iter().all(|&v| v == 0.7));
    }

    #[test]
    fn test_bias_folds_both_halves() {
        let engine = Engine::default();
        let hid = 1;
        let cfg = LstmConfig {
            hidden: hid,
            gate_act: GateActivation::Relu,
            cand_act: GateActivation::Relu,
            out_act: GateActivation::Relu,
            ..Default::default()
        };
        let gx = [0.0f32; 4];
        let gh = [0.0f32; 4];
        // Wb and Rb halves both contribute to each gate pre-activation
        let bias = [1.0f32, 2.0, 3.0, 4.0, 0.5, 0.5, 0.5, 0.5];
        let mut c = [0.0f32];
        let mut h = [0.0f32];

        let shape_l196 = [1, 4];
        let gxv = TensorView::new(&gx, &shape_l196).unwrap();
        let shape_l197 = [1, 4];
        let ghv = TensorView::new(&gh, &shape_l197).unwrap();
        let shape_l198 = [8];
        let bv = TensorView::new(&bias, &shape_l198).unwrap();
        let shape_l199 = [1, 1];
        let mut cv = TensorViewMut::new(&mut c, &shape_l199).unwrap();
        let shape_l200 = [1, 1];
        let mut hv = TensorViewMut::new(&mut h, &shape_l200).unwrap();
        engine
            .lstm_step(&cfg, gxv, ghv, Some(bv), None, None, 0, &mut cv, &mut hv)
            .unwrap();

        // i=1.5, o=2.5, f=3.5, g=4.5 after relu; c = 0*3.5 + 1.5*4.5
        assert!((c[0] - 6.75).abs() < 1e-6);
        assert!((h[0] - 2.5 * 6.75).abs() < 1e-5);
    }

    #[test]
    fn test_bad_seq_lens_rejected() {
        let engine = Engine::default();
        let cfg = LstmConfig {
            hidden: 1,
            ..Default::default()
        };
        let gx = [0.0f32; 4];
        let gh = [0.0f32; 4];
        let lens = [1i32, 1];
        let shape_l220 = [1, 4];
        let gxv = TensorView::new(&gx, &shape_l220).unwrap();
        let shape_l221 = [1, 4];
        let ghv = TensorView::new(&gh, &shape_l221).unwrap();
        let mut c = [0.0f32];
        let mut h = [0.0f32];
        let shape_l224 = [1, 1];
        let mut cv = TensorViewMut::new(&mut c, &shape_l224).unwrap();
        let shape_l225 = [1, 1];
        let mut hv = TensorViewMut::new(&mut h, &shape_l225).unwrap();
        assert!(engine
            .lstm_step(&cfg, gxv, ghv, None, None, Some(&lens), 0, &mut cv, &mut hv)
            .is_err());
    }
}
