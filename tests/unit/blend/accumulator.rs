use super::*;
use proptest::prelude::*;

#[test]
fn weighted_absolutes_plus_additive() {
    let mut acc = ChannelAccumulator::default();
    acc.accumulate(BlendKind::Absolute, 10.0, 0.3);
    acc.accumulate(BlendKind::Absolute, 20.0, 0.7);
    assert!((acc.combine(0.0) - 17.0).abs() < 1e-9);
    acc.accumulate(BlendKind::Additive, 5.0, 1.0);
    assert!((acc.combine(0.0) - 22.0).abs() < 1e-9);
}

#[test]
fn additive_only_sits_on_the_initial_value() {
    let mut acc = ChannelAccumulator::default();
    acc.accumulate(BlendKind::Additive, 2.0, 0.5);
    acc.accumulate(BlendKind::AdditiveFromBase, 3.0, 1.0);
    assert_eq!(acc.combine(10.0), 14.0);
}

#[test]
fn relative_contributors_offset_the_initial_value() {
    let mut acc = ChannelAccumulator::default();
    acc.accumulate(BlendKind::Relative, 2.0, 1.0);
    assert_eq!(acc.combine(5.0), 7.0);
    acc.accumulate(BlendKind::Absolute, 1.0, 1.0);
    // (5 + 2) and 1 averaged.
    assert_eq!(acc.combine(5.0), 4.0);
}

#[test]
fn blender_zeroes_between_evaluations_and_resizes_on_layout_change() {
    let mut b = PiecewiseBlender::default();
    b.reset(2, 1, 1);
    b.accumulate(BlendChannel(1), BlendKind::Absolute, 3.0, 1.0);
    b.accumulate(BlendChannel(9), BlendKind::Absolute, 3.0, 1.0);
    assert_eq!(b.combine(BlendChannel(1), 0.0), 3.0);
    b.reset(2, 1, 1);
    assert_eq!(b.combine(BlendChannel(1), 0.5), 0.5);
    b.reset(3, 2, 1);
    assert_eq!(b.len(), 3);
    assert!(b.channel(BlendChannel(2)).unwrap().is_empty());
}

proptest! {
    #[test]
    fn no_contributors_is_identity(initial in -1e6f64..1e6) {
        prop_assert_eq!(ChannelAccumulator::default().combine(initial), initial);
    }

    #[test]
    fn single_absolute_weight_is_continuous(
        initial in -1e3f64..1e3,
        value in -1e3f64..1e3,
        w in 0.0f64..=1.0,
    ) {
        let mut acc = ChannelAccumulator::default();
        acc.accumulate(BlendKind::Absolute, value, w);
        let got = acc.combine(initial);
        let expected = initial + (value - initial) * w;
        prop_assert!((got - expected).abs() < 1e-6, "got {got}, expected {expected}");
    }

    #[test]
    fn near_zero_and_near_one_weights_approach_the_limits(
        initial in -1e3f64..1e3,
        value in -1e3f64..1e3,
    ) {
        let mut low = ChannelAccumulator::default();
        low.accumulate(BlendKind::Absolute, value, 1e-9);
        prop_assert!((low.combine(initial) - initial).abs() < 1e-4);
        let mut high = ChannelAccumulator::default();
        high.accumulate(BlendKind::Absolute, value, 1.0 - 1e-9);
        prop_assert!((high.combine(initial) - value).abs() < 1e-4);
    }
}
