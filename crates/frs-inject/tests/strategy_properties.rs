#![forbid(unsafe_code)]

use frs_inject::{CorruptionStrategy, GaussianBitflip, Scratch, UniformBitflip};
use proptest::prelude::*;

fn any_strategy() -> impl Strategy<Value = CorruptionStrategy> {
    prop_oneof![
        (0_usize..256, any::<u64>()).prop_map(|(num_flips, seed)| {
            CorruptionStrategy::Uniform(UniformBitflip { num_flips, seed })
        }),
        (0_usize..256, 0.0_f64..=1.0, 0.0_f64..2.0, any::<u64>()).prop_map(
            |(num_flips, mean_ratio, stddev_ratio, seed)| {
                CorruptionStrategy::Gaussian(GaussianBitflip {
                    num_flips,
                    mean_ratio,
                    stddev_ratio,
                    seed,
                })
            }
        ),
        (0_usize..64, 1_usize..8, 0.0_f64..=1.0, any::<u64>()).prop_map(
            |(scratch_length, width, intensity, seed)| {
                CorruptionStrategy::Scratch(Scratch {
                    scratch_length,
                    width,
                    intensity,
                    seed,
                })
            }
        ),
    ]
}

/// Strategies whose scratch fits the buffer, paired with that buffer.
fn valid_case() -> impl Strategy<Value = (CorruptionStrategy, Vec<u8>)> {
    (any_strategy(), proptest::collection::vec(any::<u8>(), 0..512))
        .prop_filter("scratch must fit the image", |(strategy, buf)| match strategy {
            CorruptionStrategy::Scratch(p) => buf.is_empty() || p.scratch_length <= buf.len(),
            _ => true,
        })
}

proptest! {
    #[test]
    fn application_is_deterministic((strategy, buf) in valid_case()) {
        let mut a = buf.clone();
        let mut b = buf.clone();
        let first = strategy.corruptor().apply(&mut a).unwrap();
        let second = strategy.corruptor().apply(&mut b).unwrap();
        prop_assert_eq!(a, b);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn length_never_changes((strategy, buf) in valid_case()) {
        let mut out = buf.clone();
        strategy.corruptor().apply(&mut out).unwrap();
        prop_assert_eq!(out.len(), buf.len());
    }

    #[test]
    fn mutations_stay_in_bounds((strategy, buf) in valid_case()) {
        let mut out = buf.clone();
        let outcome = strategy.corruptor().apply(&mut out).unwrap();
        if let Some((lo, hi)) = outcome.span {
            prop_assert!(lo <= hi);
            prop_assert!(hi < buf.len());
        }
        // Any changed byte lies inside the reported span.
        for (idx, (before, after)) in buf.iter().zip(&out).enumerate() {
            if before != after {
                let (lo, hi) = outcome.span.unwrap();
                prop_assert!((lo..=hi).contains(&idx));
            }
        }
    }

    #[test]
    fn oversized_scratch_is_always_rejected(
        len in 1_usize..256,
        extra in 1_usize..64,
        width in 1_usize..4,
    ) {
        let strategy = CorruptionStrategy::Scratch(Scratch {
            scratch_length: len + extra,
            width,
            intensity: 1.0,
            seed: 0,
        });
        let mut buf = vec![0_u8; len];
        prop_assert!(strategy.corruptor().apply(&mut buf).is_err());
        prop_assert!(buf.iter().all(|b| *b == 0));
    }
}

#[test]
fn strategy_serializes_with_kind_tag() {
    let strategy = CorruptionStrategy::Scratch(Scratch::default());
    let json = serde_json::to_value(strategy).unwrap();
    assert_eq!(json["kind"], "scratch");
    assert_eq!(json["scratch_length"], 1024);
    let back: CorruptionStrategy = serde_json::from_value(json).unwrap();
    assert_eq!(back, strategy);
}
