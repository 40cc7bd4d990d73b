use std::sync::Arc;
use std::thread;

use lipread_camera::{FrameBuffer, FrameSource, SyntheticSource};

#[test]
fn synthetic_source_fills_buffer() {
    let mut src = SyntheticSource::open(8, 6).unwrap();
    let buf = FrameBuffer::new(4);
    for _ in 0..6 {
        buf.capture(src.read_frame().unwrap());
    }
    let snap = buf.history_snapshot();
    let idx: Vec<u64> = snap.iter().map(|f| f.index()).collect();
    assert_eq!(idx, vec![2, 3, 4, 5]);
    assert_eq!(buf.latest().unwrap().index(), 5);
}

#[test]
fn readers_never_see_torn_history() {
    let buf = Arc::new(FrameBuffer::new(16));
    let writer = {
        let buf = Arc::clone(&buf);
        thread::spawn(move || {
            let mut src = SyntheticSource::open(2, 2).unwrap();
            for _ in 0..2_000 {
                buf.capture(src.read_frame().unwrap());
            }
        })
    };

    for _ in 0..500 {
        let snap = buf.history_snapshot();
        assert!(snap.len() <= 16);
        // contiguous and ordered
        for pair in snap.windows(2) {
            assert_eq!(pair[1].index(), pair[0].index() + 1);
        }
        if let (Some(latest), Some(last)) = (buf.latest(), snap.last()) {
            assert!(latest.index() >= last.index());
        }
    }
    writer.join().unwrap();
    assert_eq!(buf.latest().unwrap().index(), 1_999);
}
