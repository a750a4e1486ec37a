use smallvec::{SmallVec, smallvec};
use std::sync::Arc;
use tempora::{
    BindingId, BlendTarget, CompilerOpts, Curve, EvaluationContext, FrameTime, ObjectKey, PlaybackContext,
    PropertySection, Runner, RunnerOpts, Runtime, Section, SectionId, SectionPayload, Sequence, SequenceId,
    SequenceKey, SequenceLibrary, SubSection, SubSectionId, TimeRange, Track, TrackId,
};

struct Printer;

impl PlaybackContext for Printer {
    fn resolve_bound_objects(&mut self, _binding: BindingId, _sequence: SequenceId) -> SmallVec<[ObjectKey; 2]> {
        smallvec![ObjectKey(1)]
    }

    fn apply_property(&mut self, target: &BlendTarget, value: f64) {
        println!("  object {} .{} = {value:.3}", target.object.0, target.property);
    }
}

fn ramp(track: u32, range: TimeRange, keys: &[(i64, f64)]) -> Track {
    Track::new(TrackId(track), Some(BindingId(1))).with_section(Section::new(
        SectionId(1),
        range,
        SectionPayload::Property(PropertySection {
            property: "x".into(),
            curve: Curve::from_keys(keys),
            base_time: None,
        }),
    ))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let lib = SequenceLibrary::new();
    let shot = Sequence::new("shot", TimeRange::new(0, 40)).with_track(ramp(1, TimeRange::new(0, 40), &[(0, 0.0), (40, 10.0)]));
    // Round-trip through JSON the way authored assets arrive.
    lib.insert_json(SequenceKey::new("shot"), &shot.to_json()?)?;
    lib.insert(
        SequenceKey::new("main"),
        Sequence::new("main", TimeRange::new(0, 120))
            .with_track(ramp(2, TimeRange::new(0, 120), &[(0, 0.0), (120, 1.0)]))
            .with_sub_section(SubSection::new(SubSectionId(1), SequenceKey::new("shot"), TimeRange::new(20, 100)).looping(0)),
    )?;

    let runtime = Runtime::init()?;
    let mut linker = runtime.create_linker(Arc::new(lib), CompilerOpts::default())?;
    let root = linker.play(&SequenceKey::new("main"))?;
    let mut runner = Runner::new(RunnerOpts::default())?;

    let mut from = FrameTime(0.0);
    for f in [10.0, 30.0, 50.0, 70.0, 110.0] {
        let to = FrameTime(f);
        runner.queue_update(root, EvaluationContext::play(from, to));
        let report = runner.flush(&mut linker, &mut Printer)?;
        println!("frame {f}: {} cycles, {} entities", report.cycles, linker.view().entity_count());
        from = to;
    }

    runner.finish_instance(&mut linker, &mut Printer, root)?;
    linker.destroy(root)?;
    runner.flush(&mut linker, &mut Printer)?;
    println!("after destroy: {} entities", linker.view().entity_count());
    runtime.shutdown();
    Ok(())
}
