use crate::model::ModelError;
use crate::FiberCategory;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeMap;

/// One degradation draw per fiber category, uniform within its bounds.
pub fn sample_degradation<R: Rng + ?Sized>(rng: &mut R) -> BTreeMap<FiberCategory, f64> {
    FiberCategory::all()
        .into_iter()
        .map(|c| {
            let (lo, hi) = c.degradation_bounds();
            (c, rng.gen_range(lo..hi))
        })
        .collect()
}

/// Contamination rate drawn from a normal fitted to `rates` (population
/// standard deviation), clamped to `[0, 1]`.
pub fn sample_contamination<R: Rng + ?Sized>(rates: &[f64], rng: &mut R) -> Result<f64, ModelError> {
    if rates.is_empty() {
        return Err(ModelError::InvalidScenario(
            "no literature contamination rates to sample from".into(),
        ));
    }
    let n = rates.len() as f64;
    let mean = rates.iter().sum::<f64>() / n;
    let std = (rates.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    let normal = Normal::new(mean, std)
        .map_err(|e| ModelError::InvalidScenario(format!("contamination distribution: {e}")))?;
    Ok(normal.sample(rng).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_degradation_within_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let d = sample_degradation(&mut rng);
            assert_eq!(d.len(), 5);
            for (c, v) in d {
                let (lo, hi) = c.degradation_bounds();
                assert!(v >= lo && v < hi, "{c:?} {v}");
            }
        }
    }

    #[test]
    fn test_contamination_is_seeded() {
        let rates = [0.272, 0.17, 0.19, 0.24];
        let a = sample_contamination(&rates, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        let b = sample_contamination(&rates, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
        assert!((0.0..=1.0).contains(&a));
    }

    #[test]
    fn test_single_rate_is_degenerate() {
        let v = sample_contamination(&[0.2], &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        assert!((v - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_empty_rates_rejected() {
        assert!(sample_contamination(&[], &mut ChaCha8Rng::seed_from_u64(1)).is_err());
    }
}
