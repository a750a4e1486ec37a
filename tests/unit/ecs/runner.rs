use super::*;
use crate::compile::compiler::CompilerOpts;
use crate::foundation::ids::{ObjectKey, SectionId, SequenceId, TrackId};
use crate::foundation::time::{FrameNumber, FrameTime, TimeRange};
use crate::model::library::SequenceLibrary;
use crate::model::sequence::{
    BindingId, Curve, EventKey, EventSection, PropertySection, Section, SectionPayload, Sequence,
    Track,
};
use crate::player::EventRecord;
use smallvec::{SmallVec, smallvec};

fn event_track(frame: i64, name: &str) -> Track {
    Track::new(TrackId(1), None).with_section(Section::new(
        SectionId(1),
        TimeRange::new(0, 100),
        SectionPayload::Event(EventSection {
            keys: vec![EventKey {
                frame: FrameNumber(frame),
                name: name.into(),
            }],
        }),
    ))
}

fn property_track() -> Track {
    Track::new(TrackId(2), Some(BindingId(1))).with_section(Section::new(
        SectionId(1),
        TimeRange::new(0, 100),
        SectionPayload::Property(PropertySection {
            property: "x".into(),
            curve: Curve::constant(2.0),
            base_time: None,
        }),
    ))
}

fn linker() -> Linker {
    let lib = SequenceLibrary::new();
    lib.insert(
        SequenceKey::new("events"),
        Sequence::new("events", TimeRange::new(0, 100)).with_track(event_track(10, "hit")),
    )
    .unwrap();
    lib.insert(
        SequenceKey::new("values"),
        Sequence::new("values", TimeRange::new(0, 100)).with_track(property_track()),
    )
    .unwrap();
    crate::Runtime::init()
        .unwrap()
        .create_linker(Arc::new(lib), CompilerOpts::default())
        .unwrap()
}

#[derive(Default)]
struct Recorder {
    events: Vec<EventRecord>,
    depths: Vec<u32>,
    requeue: Option<(InstanceHandle, EvaluationContext)>,
    recurse: bool,
    play_on_event: Option<SequenceKey>,
}

impl PlaybackContext for Recorder {
    fn resolve_bound_objects(&mut self, _binding: BindingId, _sequence: SequenceId) -> SmallVec<[ObjectKey; 2]> {
        smallvec![ObjectKey(1)]
    }

    fn handle_events(&mut self, events: &[EventRecord], scope: &mut EventScope<'_>) -> TemporaResult<()> {
        self.events.extend_from_slice(events);
        self.depths.push(scope.depth());
        if let Some((h, ctx)) = self.requeue {
            scope.queue_update(h, ctx);
            if self.recurse {
                scope.flush(self)?;
            }
        }
        if let Some(key) = self.play_on_event.take() {
            let h = scope.play(&key)?;
            scope.queue_update(h, EvaluationContext::at(FrameTime(5.0)));
            scope.flush(self)?;
        }
        Ok(())
    }
}

#[test]
fn flush_is_rejected_while_evaluating_without_a_window() {
    let mut l = linker();
    let mut runner = Runner::new(RunnerOpts::default()).unwrap();
    l.evaluating = true;
    assert!(matches!(
        runner.flush(&mut l, &mut Recorder::default()),
        Err(TemporaError::Reentrancy(_))
    ));
    l.open_windows = 1;
    assert!(runner.flush(&mut l, &mut Recorder::default()).is_ok());
}

#[test]
fn playing_ranges_are_dissected_at_fences() {
    let mut l = linker();
    let root = l.play(&SequenceKey::new("events")).unwrap();
    let mut runner = Runner::new(RunnerOpts::default()).unwrap();
    let mut player = Recorder::default();
    runner.queue_update(root, EvaluationContext::play(FrameTime(0.0), FrameTime(20.0)));
    let report = runner.flush(&mut l, &mut player).unwrap();
    assert_eq!(report.dissections, 1);
    assert_eq!(report.cycles, 2);
    assert_eq!(report.events, 1);
    assert_eq!(player.events[0].frame, FrameNumber(10));
    assert_eq!(&*player.events[0].name, "hit");
    assert_eq!(runner.state(), RunnerState::None);
    assert!(!l.is_evaluating());

    // Jumps are never dissected.
    runner.queue_update(root, EvaluationContext::at(FrameTime(50.0)));
    let report = runner.flush(&mut l, &mut player).unwrap();
    assert_eq!(report.dissections, 0);
    assert_eq!(report.events, 0);
}

#[test]
fn dissection_guard_bounds_fence_splitting() {
    let mut l = linker();
    let root = l.play(&SequenceKey::new("events")).unwrap();
    let mut runner = Runner::new(RunnerOpts {
        max_dissections: 1,
        ..RunnerOpts::default()
    })
    .unwrap();
    runner.queue_update(root, EvaluationContext::play(FrameTime(0.0), FrameTime(20.0)));
    assert!(matches!(
        runner.flush(&mut l, &mut Recorder::default()),
        Err(TemporaError::RunawayLoop(_))
    ));
}

#[test]
fn endless_requeueing_hits_the_iteration_guard() {
    let mut l = linker();
    let root = l.play(&SequenceKey::new("events")).unwrap();
    let mut runner = Runner::new(RunnerOpts {
        max_flush_iterations: 8,
        ..RunnerOpts::default()
    })
    .unwrap();
    let ctx = EvaluationContext::at(FrameTime(10.0));
    let mut player = Recorder {
        requeue: Some((root, ctx)),
        ..Recorder::default()
    };
    runner.queue_update(root, ctx);
    assert!(matches!(
        runner.flush(&mut l, &mut player),
        Err(TemporaError::RunawayLoop(_))
    ));
    assert_eq!(player.events.len(), 8);
}

#[test]
fn nested_flushes_stop_at_the_depth_limit() {
    let mut l = linker();
    let root = l.play(&SequenceKey::new("events")).unwrap();
    let mut runner = Runner::new(RunnerOpts::default()).unwrap();
    let ctx = EvaluationContext::at(FrameTime(10.0));
    let mut player = Recorder {
        requeue: Some((root, ctx)),
        recurse: true,
        ..Recorder::default()
    };
    runner.queue_update(root, ctx);
    assert!(matches!(
        runner.flush(&mut l, &mut player),
        Err(TemporaError::Reentrancy(_))
    ));
    assert_eq!(player.depths, vec![1, 2, 3, 4, 5]);
    assert_eq!(l.open_windows, 0);
    assert!(!l.is_evaluating());
}

#[test]
fn handlers_can_start_and_flush_other_sequences() {
    let mut l = linker();
    let root = l.play(&SequenceKey::new("events")).unwrap();
    let mut runner = Runner::new(RunnerOpts::default()).unwrap();
    let mut player = Recorder {
        play_on_event: Some(SequenceKey::new("values")),
        ..Recorder::default()
    };
    runner.queue_update(root, EvaluationContext::at(FrameTime(10.0)));
    let report = runner.flush(&mut l, &mut player).unwrap();
    assert_eq!(report.nested_flushes, 1);
    assert_eq!(l.instances().roots().len(), 2);
    let target = crate::blend::channel::BlendTarget {
        object: ObjectKey(1),
        property: Arc::from("x"),
    };
    assert_eq!(l.blend().value_of(&target), Some(2.0));
}

#[test]
fn finishing_flushes_queued_work_first() {
    let mut l = linker();
    let root = l.play(&SequenceKey::new("values")).unwrap();
    let mut runner = Runner::new(RunnerOpts::default()).unwrap();
    let mut player = Recorder::default();
    runner.queue_update(root, EvaluationContext::at(FrameTime(10.0)));
    runner.finish_instance(&mut l, &mut player, root).unwrap();
    assert_eq!(runner.queued(), 0);
    assert!(l.instances().get(root).unwrap().is_finished());
    assert!(!l.store().is_empty());

    let report = runner.flush(&mut l, &mut player).unwrap();
    assert_eq!(report.cycles, 1);
    assert!(l.store().is_empty());
}

#[test]
fn zero_guards_are_invalid() {
    assert!(
        Runner::new(RunnerOpts {
            max_flush_iterations: 0,
            ..RunnerOpts::default()
        })
        .is_err()
    );
    let opts: RunnerOpts = serde_json::from_str(r#"{"max_reentrancy_depth": 2}"#).unwrap();
    assert_eq!(opts.max_reentrancy_depth, 2);
    assert_eq!(opts.max_flush_iterations, 64);
}
