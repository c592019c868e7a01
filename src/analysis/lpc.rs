// LPC module - linear prediction, cepstral recursion and root solving
//
// Predictor convention: x[n] ≈ Σ_{k=1..p} a_k · x[n-k], so the all-pole model
// is H(z) = G / (1 - Σ a_k z^-k) with G² = final prediction error.
//
// Used by the LPCC family (cepstral recursion) and by the prosodic family
// (formant frequencies from the roots of the prediction polynomial).

use rustfft::num_complex::Complex;

/// Linear prediction result for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Lpc {
    /// a_1..a_p
    pub coeffs: Vec<f64>,
    /// Final prediction error power (G²)
    pub error: f64,
}

/// Biased autocorrelation r[0..=max_lag]
pub fn autocorrelation(frame: &[f64], max_lag: usize) -> Vec<f64> {
    (0..=max_lag)
        .map(|lag| {
            if lag >= frame.len() {
                0.0
            } else {
                frame[lag..]
                    .iter()
                    .zip(frame)
                    .map(|(a, b)| a * b)
                    .sum()
            }
        })
        .collect()
}

/// Levinson–Durbin recursion
///
/// Returns `None` for a silent frame (r[0] ≈ 0) or when the recursion
/// becomes unstable (non-positive prediction error).
pub fn levinson_durbin(r: &[f64], order: usize) -> Option<Lpc> {
    if r.len() <= order || r[0] <= 1e-12 {
        return None;
    }

    let mut a = vec![0.0f64; order + 1];
    let mut error = r[0];

    for i in 1..=order {
        let acc = r[i] - (1..i).map(|j| a[j] * r[i - j]).sum::<f64>();
        let k = acc / error;
        let previous = a.clone();
        a[i] = k;
        for j in 1..i {
            a[j] = previous[j] - k * previous[i - j];
        }
        error *= 1.0 - k * k;
        if error <= 0.0 || !error.is_finite() {
            return None;
        }
    }

    Some(Lpc {
        coeffs: a[1..].to_vec(),
        error,
    })
}

/// Convenience: LPC of a (already windowed) frame
pub fn lpc(frame: &[f64], order: usize) -> Option<Lpc> {
    levinson_durbin(&autocorrelation(frame, order), order)
}

/// LPC -> cepstrum recursion
///
/// c_n = a_n + Σ_{k=1}^{n-1} (k/n) c_k a_{n-k}, with a_n = 0 for n > p.
/// Returns c_1..c_{num_cepstra}.
pub fn lpc_to_cepstrum(coeffs: &[f64], num_cepstra: usize) -> Vec<f64> {
    let p = coeffs.len();
    let a = |n: usize| if n >= 1 && n <= p { coeffs[n - 1] } else { 0.0 };
    let mut c = vec![0.0f64; num_cepstra + 1];
    for n in 1..=num_cepstra {
        let mut value = a(n);
        for k in 1..n {
            value += (k as f64 / n as f64) * c[k] * a(n - k);
        }
        c[n] = value;
    }
    c[1..].to_vec()
}

/// Roots of the monic polynomial z^p + b_1 z^{p-1} + ... + b_p (Durand–Kerner)
///
/// `tail` holds b_1..b_p.
pub fn polynomial_roots(tail: &[f64]) -> Vec<Complex<f64>> {
    let degree = tail.len();
    if degree == 0 {
        return Vec::new();
    }

    let eval = |z: Complex<f64>| {
        tail.iter()
            .fold(Complex::new(1.0, 0.0), |acc, &b| acc * z + b)
    };

    let seed = Complex::new(0.4, 0.9);
    let mut roots: Vec<Complex<f64>> = (0..degree).map(|i| seed.powu(i as u32)).collect();

    for _ in 0..500 {
        let mut max_step = 0.0f64;
        for i in 0..degree {
            let zi = roots[i];
            let denom = roots
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .fold(Complex::new(1.0, 0.0), |acc, (_, zj)| acc * (zi - zj));
            if denom.norm() < 1e-300 {
                continue;
            }
            let step = eval(zi) / denom;
            roots[i] = zi - step;
            max_step = max_step.max(step.norm());
        }
        if max_step < 1e-12 {
            break;
        }
    }
    roots
}

/// Candidate resonance extracted from an LPC root
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resonance {
    pub frequency_hz: f64,
    pub bandwidth_hz: f64,
}

/// Resonances of an LPC model, sorted by frequency
///
/// Only roots in the upper half plane are considered; each yields
/// frequency = arg(z)·fs/2π and bandwidth = -ln|z|·fs/π.
pub fn resonances(lpc: &Lpc, sample_rate: u32) -> Vec<Resonance> {
    let tail: Vec<f64> = lpc.coeffs.iter().map(|a| -a).collect();
    let fs = sample_rate as f64;
    let mut out: Vec<Resonance> = polynomial_roots(&tail)
        .into_iter()
        .filter(|z| z.im > 0.0 && z.norm() > 0.0)
        .map(|z| Resonance {
            frequency_hz: z.arg() * fs / (2.0 * std::f64::consts::PI),
            bandwidth_hz: -z.norm().ln() * fs / std::f64::consts::PI,
        })
        .collect();
    out.sort_by(|a, b| a.frequency_hz.total_cmp(&b.frequency_hz));
    out
}
