/// Digamma ψ(x) for x > 0: recurrence up to x >= 12, then the asymptotic
/// series. Neighbour counts are positive integers, so no reflection is
/// needed here.
pub fn digamma(mut x: f64) -> f64 {
    let mut shift = 0.0;
    while x < 12.0 {
        shift -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    shift + x.ln() - 0.5 * inv
        - inv2 * (1.0 / 12.0 - inv2 * (1.0 / 120.0 - inv2 * (1.0 / 252.0 - inv2 / 240.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

    #[test]
    fn test_digamma_integers() {
        assert!((digamma(1.0) + EULER_GAMMA).abs() < 1e-10);
        // ψ(n + 1) = ψ(n) + 1/n
        for n in 1..40 {
            let n = n as f64;
            assert!((digamma(n + 1.0) - digamma(n) - 1.0 / n).abs() < 1e-10);
        }
        assert!((digamma(0.5) - (-EULER_GAMMA - 2.0 * 2.0_f64.ln())).abs() < 1e-10);
    }
}
