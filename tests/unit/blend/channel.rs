use super::*;

fn target(o: u64, p: &str) -> BlendTarget {
    BlendTarget {
        object: ObjectKey(o),
        property: Arc::from(p),
    }
}

#[test]
fn contributors_to_one_target_share_a_channel() {
    let mut a = BlendChannelAllocator::default();
    let c0 = a.acquire(target(1, "x"), || 4.0);
    let c1 = a.acquire(target(1, "x"), || panic!("initial captured twice"));
    assert_eq!(c0, c1);
    assert_eq!(a.initial(c0), Some(4.0));
    assert_ne!(a.acquire(target(1, "y"), || 0.0), c0);
    assert!(!a.release(c0));
    assert!(a.release(c0));
    assert_eq!(a.channel_of(&target(1, "x")), None);
}

#[test]
fn compaction_renumbers_densely() {
    let mut a = BlendChannelAllocator::default();
    let x = a.acquire(target(1, "x"), || 1.0);
    let y = a.acquire(target(2, "y"), || 2.0);
    let z = a.acquire(target(3, "z"), || 3.0);
    a.release(y);
    assert!(a.needs_compaction());
    let v = a.version();
    let remap = a.compact();
    assert!(a.version() > v);
    assert_eq!(remap, vec![Some(BlendChannel(0)), None, Some(BlendChannel(1))]);
    assert_eq!(a.len(), 2);
    let z_new = remap[z.index()].unwrap();
    assert_eq!(a.initial(z_new), Some(3.0));
    assert_eq!(a.channel_of(&target(3, "z")), Some(z_new));
    assert_eq!(a.channel_of(&target(1, "x")), remap[x.index()]);
}
