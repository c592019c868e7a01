// Prosody module - pitch, formants, voice quality and energy
//
// Pitch is tracked on frames spanning three periods of the pitch floor.
// The autocorrelation method follows Boersma (1993): the Hann-windowed,
// mean-removed frame autocorrelation is divided by the window's own
// autocorrelation, peaks are refined parabolically and an octave cost
// favours shorter lags. The cepstral method takes the real-cepstrum peak
// in the same lag range. Unvoiced frames never enter the statistics.
//
// Formants come from the roots of per-frame LPC polynomials; jitter and
// shimmer from pulses picked cycle by cycle inside voiced runs.
//
// References:
// - Boersma, P. (1993). Accurate short-term analysis of the fundamental
//   frequency and the harmonics-to-noise ratio of a sampled sound
// - Markel, J. & Gray, A. (1976). Linear Prediction of Speech

use serde::{Deserialize, Serialize};

use super::fft::FftProcessor;
use super::frames::{hamming, hann, ms_to_samples, Framing};
use super::lpc::{autocorrelation, lpc, resonances};
use super::stats::{finite_mean, stat_columns, summarise, Statistic};
use super::temporal::TemporalFeatures;
use super::{check_statistics, FeatureExtractor, FeatureFamily, FeatureVector};
use crate::error::FeatureError;

const NUM_FORMANTS: usize = 4;
const MIN_FORMANT_HZ: f64 = 50.0;
const MAX_FORMANT_BANDWIDTH_HZ: f64 = 700.0;
const OCTAVE_COST: f64 = 0.01;

/// Pitch detection algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchMethod {
    #[default]
    Autocorrelation,
    Cepstral,
}

/// Parameters of the prosodic family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProsodyParams {
    pub pitch_method: PitchMethod,
    pub pitch_floor_hz: f32,
    pub pitch_ceiling_hz: f32,
    pub time_step_ms: f32,
    /// Frames whose peak is below this fraction of the global peak are silent
    pub silence_threshold: f32,
    /// Minimum normalised autocorrelation for a voiced frame
    pub voicing_threshold: f32,
    pub pitch_statistics: Vec<Statistic>,
    pub max_formant_hz: f32,
    pub formant_window_ms: f32,
    pub pre_emphasis_from_hz: f32,
    /// Defaults to 2 + sample_rate / 1000, clamped to [8, 40]
    pub lpc_order: Option<usize>,
    pub speed_of_sound_cm_s: f32,
    pub min_voiced_cycles: usize,
    /// Largest ratio between consecutive periods still used for jitter
    pub max_period_factor: f32,
    /// Statistics for formants, HNR and RMS
    pub statistics: Vec<Statistic>,
}

impl Default for ProsodyParams {
    fn default() -> Self {
        Self {
            pitch_method: PitchMethod::Autocorrelation,
            pitch_floor_hz: 75.0,
            pitch_ceiling_hz: 600.0,
            time_step_ms: 10.0,
            silence_threshold: 0.03,
            voicing_threshold: 0.45,
            pitch_statistics: vec![
                Statistic::Mean,
                Statistic::Median,
                Statistic::Min,
                Statistic::Max,
                Statistic::Std,
            ],
            max_formant_hz: 5500.0,
            formant_window_ms: 25.0,
            pre_emphasis_from_hz: 50.0,
            lpc_order: None,
            speed_of_sound_cm_s: 35000.0,
            min_voiced_cycles: 5,
            max_period_factor: 1.3,
            statistics: vec![Statistic::Mean],
        }
    }
}

impl ProsodyParams {
    pub fn validate(&self, sample_rate: u32) -> Result<(), String> {
        let nyquist = sample_rate as f32 / 2.0;
        if !(self.pitch_floor_hz > 0.0 && self.pitch_floor_hz < self.pitch_ceiling_hz) {
            return Err(format!(
                "need 0 < pitch_floor_hz < pitch_ceiling_hz (got {} / {})",
                self.pitch_floor_hz, self.pitch_ceiling_hz
            ));
        }
        if self.pitch_ceiling_hz >= nyquist {
            return Err(format!(
                "pitch_ceiling_hz must be below Nyquist ({nyquist} Hz)"
            ));
        }
        if self.time_step_ms <= 0.0 || self.formant_window_ms <= 0.0 {
            return Err("time_step_ms and formant_window_ms must be > 0".to_string());
        }
        for (name, value) in [
            ("silence_threshold", self.silence_threshold),
            ("voicing_threshold", self.voicing_threshold),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(format!("{name} must be in [0, 1) (got {value})"));
            }
        }
        if !(self.max_formant_hz > MIN_FORMANT_HZ as f32 && self.max_formant_hz <= nyquist) {
            return Err(format!(
                "max_formant_hz must be in ({MIN_FORMANT_HZ}, {nyquist}] (got {})",
                self.max_formant_hz
            ));
        }
        if self.pre_emphasis_from_hz < 0.0 {
            return Err("pre_emphasis_from_hz must be >= 0".to_string());
        }
        if let Some(order) = self.lpc_order {
            if !(2 * NUM_FORMANTS..=64).contains(&order) {
                return Err(format!("lpc_order must be in 8..=64 (got {order})"));
            }
        }
        if self.speed_of_sound_cm_s <= 0.0 {
            return Err("speed_of_sound_cm_s must be > 0".to_string());
        }
        if self.min_voiced_cycles < 2 {
            return Err("min_voiced_cycles must be >= 2".to_string());
        }
        if self.max_period_factor <= 1.0 {
            return Err("max_period_factor must be > 1".to_string());
        }
        check_statistics(&self.pitch_statistics)?;
        check_statistics(&self.statistics)
    }

    fn resolved_lpc_order(&self, sample_rate: u32) -> usize {
        self.lpc_order
            .unwrap_or_else(|| (2 + sample_rate as usize / 1000).clamp(8, 40))
    }
}

/// One analysed pitch frame
#[derive(Debug, Clone, Copy)]
struct PitchFrame {
    start: usize,
    f0: Option<f64>,
    /// Normalised autocorrelation at the chosen period
    strength: f64,
}

/// Prosodic extractor bound to one parameter set
pub struct ProsodyExtractor {
    params: ProsodyParams,
}

impl ProsodyExtractor {
    pub fn new(params: ProsodyParams) -> Self {
        Self { params }
    }

    fn pitch_framing(&self, sample_rate: u32) -> Framing {
        let window = ((3.0 / self.params.pitch_floor_hz) * sample_rate as f32).round() as usize;
        Framing::new(window, ms_to_samples(self.params.time_step_ms, sample_rate))
    }

    fn formant_framing(&self, sample_rate: u32) -> Framing {
        Framing::from_ms(self.params.formant_window_ms, self.params.time_step_ms, sample_rate)
    }

    fn lag_range(&self, sample_rate: u32) -> (usize, usize) {
        let sr = sample_rate as f64;
        let min_lag = ((sr / self.params.pitch_ceiling_hz as f64).floor() as usize).max(2);
        let max_lag = (sr / self.params.pitch_floor_hz as f64).ceil() as usize;
        (min_lag, max_lag)
    }

    fn track_pitch(&self, signal: &[f64], sample_rate: u32) -> (Framing, Vec<PitchFrame>) {
        let p = &self.params;
        let framing = self.pitch_framing(sample_rate);
        let n = framing.window;
        let (min_lag, max_lag) = self.lag_range(sample_rate);
        let max_lag = max_lag.min(n / 2);

        let window: Vec<f64> = hann(n).into_iter().map(f64::from).collect();
        let window_ac = autocorrelation(&window, max_lag + 1);
        let cepstrum = (p.pitch_method == PitchMethod::Cepstral).then(|| {
            let size = n.next_power_of_two();
            FftProcessor::new(size, hamming(n))
        });

        let global_peak = signal.iter().fold(0.0f64, |m, s| m.max(s.abs()));
        let silence_level = global_peak * p.silence_threshold as f64;
        let sr = sample_rate as f64;

        let mut frames = Vec::with_capacity(framing.frame_count(signal.len()));
        for index in 0..framing.frame_count(signal.len()) {
            let start = index * framing.hop;
            let raw = &signal[start..start + n];
            let unvoiced = PitchFrame {
                start,
                f0: None,
                strength: 0.0,
            };

            let frame_peak = raw.iter().fold(0.0f64, |m, s| m.max(s.abs()));
            if global_peak <= 0.0 || frame_peak < silence_level {
                frames.push(unvoiced);
                continue;
            }

            let mean = raw.iter().sum::<f64>() / n as f64;
            let centred: Vec<f64> = raw.iter().map(|s| s - mean).collect();
            let windowed: Vec<f64> = centred.iter().zip(&window).map(|(s, w)| s * w).collect();
            let ac = autocorrelation(&windowed, max_lag + 1);
            if ac[0] <= 1e-12 {
                frames.push(unvoiced);
                continue;
            }
            let r: Vec<f64> = ac
                .iter()
                .zip(&window_ac)
                .map(|(a, w)| if *w > 0.0 { (a / ac[0]) / (w / window_ac[0]) } else { 0.0 })
                .collect();

            let candidate = match &cepstrum {
                None => best_autocorrelation_lag(&r, min_lag, max_lag, p.pitch_floor_hz as f64, sr),
                Some(fft) => {
                    let frame32: Vec<f32> = centred.iter().map(|s| *s as f32).collect();
                    let cep = fft.real_cepstrum(&frame32);
                    best_cepstral_lag(&cep, min_lag, max_lag.min(fft.fft_size() / 2 - 1)).map(|lag| {
                        let nearest = (lag.round() as usize).clamp(min_lag, max_lag);
                        (lag, r[nearest])
                    })
                }
            };

            frames.push(match candidate {
                Some((lag, strength)) if strength >= p.voicing_threshold as f64 => PitchFrame {
                    start,
                    f0: Some(sr / lag),
                    strength: strength.min(1.0),
                },
                _ => unvoiced,
            });
        }
        (framing, frames)
    }

    fn formant_tracks(&self, signal: &[f64], sample_rate: u32) -> Vec<Vec<f64>> {
        let p = &self.params;
        let framing = self.formant_framing(sample_rate);
        let order = p.resolved_lpc_order(sample_rate);
        let coef = (-2.0 * std::f64::consts::PI * p.pre_emphasis_from_hz as f64 / sample_rate as f64).exp();
        let window: Vec<f64> = hamming(framing.window).into_iter().map(f64::from).collect();
        let global_peak = signal.iter().fold(0.0f64, |m, s| m.max(s.abs()));
        let silence_level = global_peak * p.silence_threshold as f64;

        let mut tracks = vec![Vec::new(); NUM_FORMANTS];
        for index in 0..framing.frame_count(signal.len()) {
            let start = index * framing.hop;
            let raw = &signal[start..start + framing.window];
            let frame_peak = raw.iter().fold(0.0f64, |m, s| m.max(s.abs()));
            if global_peak <= 0.0 || frame_peak < silence_level {
                continue;
            }

            let windowed: Vec<f64> = raw
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let prev = if i == 0 {
                        if start > 0 { signal[start - 1] } else { 0.0 }
                    } else {
                        raw[i - 1]
                    };
                    (s - coef * prev) * window[i]
                })
                .collect();
            let Some(model) = lpc(&windowed, order) else {
                continue;
            };

            let found: Vec<f64> = resonances(&model, sample_rate)
                .into_iter()
                .filter(|r| {
                    r.frequency_hz > MIN_FORMANT_HZ
                        && r.frequency_hz < p.max_formant_hz as f64
                        && r.bandwidth_hz < MAX_FORMANT_BANDWIDTH_HZ
                })
                .map(|r| r.frequency_hz)
                .collect();
            for (slot, track) in tracks.iter_mut().enumerate() {
                track.push(found.get(slot).copied().unwrap_or(f64::NAN));
            }
        }
        tracks
    }

    /// Local jitter and shimmer over pulses in voiced runs
    fn perturbation(
        &self,
        signal: &[f64],
        sample_rate: u32,
        framing: &Framing,
        frames: &[PitchFrame],
    ) -> (Option<f64>, Option<f64>) {
        let p = &self.params;
        let sr = sample_rate as f64;
        let min_period = 1.0 / p.pitch_ceiling_hz as f64;
        let max_period = 1.0 / p.pitch_floor_hz as f64;
        let factor = p.max_period_factor as f64;

        let mut periods_total = 0usize;
        let mut period_sum = 0.0;
        let mut jitter_sum = 0.0;
        let mut jitter_pairs = 0usize;
        let mut amp_sum = 0.0;
        let mut amp_count = 0usize;
        let mut shimmer_sum = 0.0;
        let mut shimmer_pairs = 0usize;

        for run in voiced_runs(frames) {
            let first = &frames[run.0];
            let last = &frames[run.1];
            let seg_start = first.start;
            let seg_end = (last.start + framing.window).min(signal.len());
            let period_at = |pos: usize| -> f64 {
                let centre = pos.saturating_sub(framing.window / 2) / framing.hop;
                let index = centre.clamp(run.0, run.1);
                frames[index].f0.map(|f| sr / f).unwrap_or(sr * max_period)
            };

            let pulses = pick_pulses(signal, seg_start, seg_end, period_at);
            let mut previous_period: Option<f64> = None;
            for pair in pulses.windows(2) {
                let period = (pair[1] - pair[0]) as f64 / sr;
                if period < min_period || period > max_period {
                    previous_period = None;
                    continue;
                }
                periods_total += 1;
                period_sum += period;

                let (a0, a1) = (signal[pair[0]].abs(), signal[pair[1]].abs());
                shimmer_sum += (a0 - a1).abs();
                shimmer_pairs += 1;
                amp_sum += a0 + a1;
                amp_count += 2;

                if let Some(prev) = previous_period {
                    if prev.max(period) / prev.min(period) <= factor {
                        jitter_sum += (prev - period).abs();
                        jitter_pairs += 1;
                    }
                }
                previous_period = Some(period);
            }
        }

        if periods_total < p.min_voiced_cycles {
            return (None, None);
        }
        let mean_period = period_sum / periods_total as f64;
        let jitter = (jitter_pairs > 0 && mean_period > 0.0)
            .then(|| (jitter_sum / jitter_pairs as f64) / mean_period);
        let mean_amp = amp_sum / amp_count.max(1) as f64;
        let shimmer = (shimmer_pairs > 0 && mean_amp > 0.0)
            .then(|| (shimmer_sum / shimmer_pairs as f64) / mean_amp);
        (jitter, shimmer)
    }
}

/// Best autocorrelation peak as (refined lag, strength)
fn best_autocorrelation_lag(
    r: &[f64],
    min_lag: usize,
    max_lag: usize,
    floor_hz: f64,
    sample_rate: f64,
) -> Option<(f64, f64)> {
    let mut best: Option<(f64, f64, f64)> = None;
    for lag in min_lag.max(1)..=max_lag {
        if lag + 1 >= r.len() || r[lag] < r[lag - 1] || r[lag] < r[lag + 1] || r[lag] <= 0.0 {
            continue;
        }
        let (refined, peak) = parabolic(r[lag - 1], r[lag], r[lag + 1], lag as f64);
        let score = peak - OCTAVE_COST * (floor_hz * refined / sample_rate).log2();
        if best.map_or(true, |(_, _, s)| score > s) {
            best = Some((refined, peak, score));
        }
    }
    best.map(|(lag, peak, _)| (lag, peak))
}

/// Quefrency (in samples) of the largest cepstral peak
fn best_cepstral_lag(cepstrum: &[f32], min_lag: usize, max_lag: usize) -> Option<f64> {
    if min_lag < 1 || max_lag + 1 >= cepstrum.len() || min_lag > max_lag {
        return None;
    }
    let lag = (min_lag..=max_lag).max_by(|a, b| cepstrum[*a].total_cmp(&cepstrum[*b]))?;
    let (refined, _) = parabolic(
        cepstrum[lag - 1] as f64,
        cepstrum[lag] as f64,
        cepstrum[lag + 1] as f64,
        lag as f64,
    );
    Some(refined)
}

/// Parabolic interpolation around a discrete peak -> (position, value)
fn parabolic(left: f64, centre: f64, right: f64, position: f64) -> (f64, f64) {
    let denom = left - 2.0 * centre + right;
    if denom.abs() < 1e-12 {
        return (position, centre);
    }
    let delta = (0.5 * (left - right) / denom).clamp(-0.5, 0.5);
    (position + delta, centre - 0.25 * (left - right) * delta)
}

/// Inclusive index ranges of consecutive voiced frames
fn voiced_runs(frames: &[PitchFrame]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut current: Option<usize> = None;
    for (i, frame) in frames.iter().enumerate() {
        match (frame.f0.is_some(), current) {
            (true, None) => current = Some(i),
            (false, Some(start)) => {
                runs.push((start, i - 1));
                current = None;
            }
            _ => {}
        }
    }
    if let Some(start) = current {
        runs.push((start, frames.len() - 1));
    }
    runs
}

/// Positive waveform peaks one local period apart
fn pick_pulses(
    signal: &[f64],
    seg_start: usize,
    seg_end: usize,
    period_at: impl Fn(usize) -> f64,
) -> Vec<usize> {
    let argmax = |lo: usize, hi: usize| -> Option<usize> {
        (lo..hi.min(seg_end)).max_by(|a, b| signal[*a].total_cmp(&signal[*b]))
    };

    let first_period = period_at(seg_start).ceil() as usize;
    let Some(mut pos) = argmax(seg_start, seg_start + first_period.max(1)) else {
        return Vec::new();
    };
    let mut pulses = vec![pos];
    loop {
        let period = period_at(pos);
        let lo = pos + (0.8 * period).round() as usize;
        let hi = pos + (1.2 * period).round() as usize + 1;
        if hi > seg_end || lo <= pos {
            break;
        }
        match argmax(lo, hi) {
            Some(next) => {
                pulses.push(next);
                pos = next;
            }
            None => break,
        }
    }
    pulses
}

impl FeatureExtractor for ProsodyExtractor {
    fn family(&self) -> FeatureFamily {
        FeatureFamily::Prosody
    }

    fn columns(&self) -> Vec<String> {
        let p = &self.params;
        let mut columns = stat_columns("pitch", &p.pitch_statistics);
        for k in 1..=NUM_FORMANTS {
            columns.extend(stat_columns(&format!("f{k}"), &p.statistics));
        }
        columns.push("formant_dispersion".to_string());
        columns.push("vtl_cm".to_string());
        columns.extend(stat_columns("hnr", &p.statistics));
        columns.push("jitter_local".to_string());
        columns.push("shimmer_local".to_string());
        columns.extend(stat_columns("rms", &p.statistics));
        columns
    }

    fn extract(&self, waveform: &[f32], sample_rate: u32) -> Result<FeatureVector, FeatureError> {
        let p = &self.params;
        let pitch_framing = self.pitch_framing(sample_rate);
        let formant_framing = self.formant_framing(sample_rate);
        if pitch_framing.window >= formant_framing.window {
            pitch_framing.require(waveform)?;
        } else {
            formant_framing.require(waveform)?;
        }

        let signal: Vec<f64> = waveform.iter().map(|s| *s as f64).collect();
        let mut vector = FeatureVector::with_capacity(self.columns().len());

        let (framing, frames) = self.track_pitch(&signal, sample_rate);
        let pitch: Vec<f64> = frames.iter().filter_map(|f| f.f0).collect();
        vector.push_stats("pitch", &p.pitch_statistics, summarise(&pitch, &p.pitch_statistics));

        let tracks = self.formant_tracks(&signal, sample_rate);
        for (k, track) in tracks.iter().enumerate() {
            vector.push_stats(
                &format!("f{}", k + 1),
                &p.statistics,
                summarise(track, &p.statistics),
            );
        }
        let means: Option<Vec<f64>> = tracks.iter().map(|t| finite_mean(t)).collect();
        let dispersion = means
            .as_ref()
            .map(|m| m.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / (NUM_FORMANTS - 1) as f64);
        let vtl = means.as_ref().map(|m| {
            let c = p.speed_of_sound_cm_s as f64;
            m.iter()
                .enumerate()
                .map(|(i, f)| (2.0 * (i + 1) as f64 - 1.0) * c / (4.0 * f))
                .sum::<f64>()
                / NUM_FORMANTS as f64
        });
        vector.push("formant_dispersion", dispersion);
        vector.push("vtl_cm", vtl);

        let hnr: Vec<f64> = frames
            .iter()
            .filter(|f| f.f0.is_some())
            .map(|f| {
                let r = f.strength.clamp(1e-6, 1.0 - 1e-6);
                10.0 * (r / (1.0 - r)).log10()
            })
            .collect();
        vector.push_stats("hnr", &p.statistics, summarise(&hnr, &p.statistics));

        let (jitter, shimmer) = self.perturbation(&signal, sample_rate, &framing, &frames);
        vector.push("jitter_local", jitter);
        vector.push("shimmer_local", shimmer);

        let temporal = TemporalFeatures;
        let rms: Vec<f64> = formant_framing
            .frames(waveform)
            .map(|frame| temporal.compute_rms(frame) as f64)
            .collect();
        vector.push_stats("rms", &p.statistics, summarise(&rms, &p.statistics));

        Ok(vector)
    }
}
