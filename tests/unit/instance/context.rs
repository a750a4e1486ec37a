use super::*;
use crate::foundation::transform::{LinearTransform, TimeWarp};

#[test]
fn swept_frames_exclude_the_start_when_playing() {
    let ctx = EvaluationContext::play(FrameTime(10.0), FrameTime(14.0));
    assert_eq!(ctx.swept(), TimeRange::new(11, 15));
    let back = EvaluationContext::play(FrameTime(14.0), FrameTime(10.0));
    assert_eq!(back.direction, PlayDirection::Backwards);
    assert_eq!(back.swept(), TimeRange::new(10, 14));
    assert_eq!(EvaluationContext::at(FrameTime(3.5)).swept(), TimeRange::frame(FrameNumber(3)));
}

#[test]
fn dissection_splits_in_time_order() {
    let ctx = EvaluationContext::play(FrameTime(0.0), FrameTime(10.0));
    let parts = ctx.dissect(&[FrameNumber(0), FrameNumber(3), FrameNumber(7), FrameNumber(12)]);
    let spans: Vec<(f64, f64)> = parts.iter().map(|c| (c.from.0, c.to.0)).collect();
    assert_eq!(spans, vec![(0.0, 3.0), (3.0, 7.0), (7.0, 10.0)]);

    let back = EvaluationContext::play(FrameTime(10.0), FrameTime(0.0));
    let spans: Vec<(f64, f64)> = back
        .dissect(&[FrameNumber(3), FrameNumber(7)])
        .iter()
        .map(|c| (c.from.0, c.to.0))
        .collect();
    assert_eq!(spans, vec![(10.0, 7.0), (7.0, 3.0), (3.0, 0.0)]);
}

#[test]
fn transform_restarts_sweeps_that_cross_a_loop() {
    let t = TimeTransform::looping(
        LinearTransform::IDENTITY,
        TimeWarp {
            origin: 0.0,
            period: 10.0,
        },
    );
    let inside = EvaluationContext::play(FrameTime(2.0), FrameTime(5.0)).transform(&t);
    assert_eq!((inside.from, inside.to), (FrameTime(2.0), FrameTime(5.0)));
    let across = EvaluationContext::play(FrameTime(8.0), FrameTime(12.0)).transform(&t);
    assert_eq!((across.from, across.to), (FrameTime(2.0), FrameTime(2.0)));
}
