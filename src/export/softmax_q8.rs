/// Reference softmax for the accelerator's Q8 class scores.
///
/// Each raw score is read as `raw / 256`, the softmax is taken in `f32`, and
/// each probability is returned scaled by 256 and truncated.
pub fn softmax_q8<const N: usize>(raw: &[i32; N]) -> [i32; N] {
    let mut exps = [0f32; N];
    let mut exp_sum = 0f32;
    for (e, &r) in exps.iter_mut().zip(raw.iter()) {
        *e = (r as f32 / 256.0).exp();
        exp_sum += *e;
    }

    let mut out = [0i32; N];
    for (o, e) in out.iter_mut().zip(exps.iter()) {
        *o = (e / exp_sum * 256.0) as i32;
    }
    out
}
