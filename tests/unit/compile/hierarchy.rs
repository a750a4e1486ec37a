use super::*;
use smallvec::smallvec;

fn node(parent: SequenceId) -> SequenceHierarchyNode {
    SequenceHierarchyNode {
        parent,
        sequence: SequenceKey::new("child"),
        sub_section: SubSectionId(1),
        root_to_sequence: TimeTransform::identity(),
        hierarchical_bias: 0,
        play_range: TimeRange::new(0, 10),
        root_range: TimeRange::new(0, 10),
        pre_roll_ranges: SmallVec::new(),
        post_roll_ranges: smallvec![TimeRange::new(10, 12)],
        is_looping: false,
        missing: false,
    }
}

#[test]
fn dangling_parent_is_a_compile_error() {
    let mut h = SequenceHierarchy::default();
    h.add(SequenceId(5), node(SequenceId(99))).unwrap();
    assert!(matches!(h.validate(), Err(TemporaError::Compile(_))));
    assert!(h.require(SequenceId(7)).is_err());
}

#[test]
fn nested_chain_validates_and_reports_depth() {
    let mut h = SequenceHierarchy::default();
    let a = SequenceId::ROOT.accumulate(SubSectionId(1));
    let b = a.accumulate(SubSectionId(1));
    h.add(a, node(SequenceId::ROOT)).unwrap();
    h.add(b, node(a)).unwrap();
    h.validate().unwrap();
    assert_eq!(h.depth(b), 2);
    assert_eq!(h.children(SequenceId::ROOT).collect::<Vec<_>>(), vec![a]);
    assert!(h.node(b).unwrap().is_post_roll(FrameTime(11.0)));
}

#[test]
fn re_adding_an_identical_node_is_a_no_op_but_conflicts_fail() {
    let mut h = SequenceHierarchy::default();
    h.add(SequenceId(3), node(SequenceId::ROOT)).unwrap();
    h.add(SequenceId(3), node(SequenceId::ROOT)).unwrap();
    let mut other = node(SequenceId::ROOT);
    other.sequence = SequenceKey::new("other");
    assert!(h.add(SequenceId(3), other).is_err());
    assert!(h.add(SequenceId::ROOT, node(SequenceId::ROOT)).is_err());
}

#[test]
fn revisits_of_the_same_instance_merge_their_root_spans() {
    let mut h = SequenceHierarchy::default();
    let id = SequenceId(4);
    h.add(id, node(SequenceId::ROOT)).unwrap();
    let mut later = node(SequenceId::ROOT);
    later.root_range = TimeRange::new(50, 60);
    later.post_roll_ranges = smallvec![TimeRange::new(60, 62)];
    h.add(id, later).unwrap();

    let n = h.node(id).unwrap();
    assert_eq!(n.root_range, TimeRange::new(0, 60));
    assert_eq!(
        n.post_roll_ranges.as_slice(),
        &[TimeRange::new(10, 12), TimeRange::new(60, 62)]
    );
    assert!(n.is_post_roll(FrameTime(61.0)));
    assert!(!n.is_post_roll(FrameTime(30.0)));
}
