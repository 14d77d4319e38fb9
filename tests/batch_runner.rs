use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use artframe::{
    ArtworkItem, BatchOpts, BatchRunner, FrameError, FrameResult, FsLedgerStore, FsOutputStore,
    InMemoryLedgerStore, InMemoryOutputStore, ItemOutcome, ItemRecord, LedgerStore, OutputRef,
    OutputStore, PixelPoint, Quad, SessionId, SessionLedger,
};
use image::{Rgb, RgbImage};

fn temp_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "artframe_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn png_bytes(img: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn background() -> RgbImage {
    RgbImage::from_fn(160, 120, |x, y| Rgb([x as u8, y as u8, 77]))
}

fn quad() -> Quad {
    Quad::new(
        PixelPoint::new(20, 15),
        PixelPoint::new(140, 20),
        PixelPoint::new(135, 100),
        PixelPoint::new(25, 105),
    )
}

fn artwork(name: &str, shade: u8) -> ArtworkItem {
    ArtworkItem::new(
        name,
        png_bytes(&RgbImage::from_pixel(30, 20, Rgb([shade, 0, 255 - shade]))),
    )
}

fn five_items_with_bad_third() -> Vec<ArtworkItem> {
    vec![
        artwork("one.png", 10),
        artwork("two.png", 60),
        ArtworkItem::new("three.png", b"not an image at all".to_vec()),
        artwork("four.png", 160),
        artwork("five.png", 220),
    ]
}

fn names(ledger: &SessionLedger) -> Vec<&str> {
    ledger
        .results()
        .iter()
        .map(|r| r.original_filename.as_str())
        .collect()
}

#[test]
fn partial_failure_is_isolated() {
    let outputs = InMemoryOutputStore::new();
    let ledgers = InMemoryLedgerStore::new();
    let runner = BatchRunner::new(&outputs, &ledgers);

    let ledger = runner
        .run_batch("frame-1", Some(&quad()), &background(), &five_items_with_bad_third())
        .unwrap();

    assert_eq!(ledger.processed_count(), 4);
    assert_eq!(ledger.failed_count(), 1);
    assert_eq!(
        names(&ledger),
        ["one.png", "two.png", "three.png", "four.png", "five.png"]
    );
    for (i, r) in ledger.results().iter().enumerate() {
        assert_eq!(r.is_success(), i != 2, "item {i}");
    }
    let ItemOutcome::Failure { reason } = &ledger.results()[2].outcome else {
        panic!("item 3 should have failed");
    };
    assert!(reason.contains("decode error"), "{reason}");
    assert_eq!(outputs.len(), 4);
}

#[test]
fn outputs_are_keyed_by_session_and_prefixed() {
    let outputs = InMemoryOutputStore::new();
    let ledgers = InMemoryLedgerStore::new();
    let runner = BatchRunner::new(&outputs, &ledgers);

    let ledger = runner
        .run_batch(
            "frame-1",
            Some(&quad()),
            &background(),
            &[artwork("uploads/a.png", 100)],
        )
        .unwrap();

    let out = ledger.results()[0].output().unwrap();
    assert_eq!(out.session_id, ledger.session_id());
    assert_eq!(out.filename, "framed_a.png");
    assert_eq!(
        ledger.download_paths(),
        vec![format!("{}/framed_a.png", ledger.session_id())]
    );
    let img = outputs.get(out).unwrap();
    assert_eq!(img.dimensions(), (160, 120));
    assert_eq!(img.get_pixel(80, 60).0, [100, 0, 155]);
    assert_eq!(img.get_pixel(2, 2).0, [2, 2, 77]);
}

#[test]
fn ledger_order_matches_input_order() {
    let outputs = InMemoryOutputStore::new();
    let ledgers = InMemoryLedgerStore::new();
    let runner = BatchRunner::new(&outputs, &ledgers);
    let items: Vec<ArtworkItem> = (0..12)
        .map(|i| artwork(&format!("art_{i:02}.png"), (i * 20) as u8))
        .collect();

    let ledger = runner
        .run_batch("frame-1", Some(&quad()), &background(), &items)
        .unwrap();

    let expected: Vec<String> = items.iter().map(|i| i.filename.clone()).collect();
    assert_eq!(names(&ledger), expected);
}

#[test]
fn parallel_mode_matches_sequential() {
    let items = five_items_with_bad_third();
    let bg = background();

    let seq_out = InMemoryOutputStore::new();
    let seq_ledgers = InMemoryLedgerStore::new();
    let seq = BatchRunner::new(&seq_out, &seq_ledgers)
        .run_batch("frame-1", Some(&quad()), &bg, &items)
        .unwrap();

    let par_out = InMemoryOutputStore::new();
    let par_ledgers = InMemoryLedgerStore::new();
    let par = BatchRunner::new(&par_out, &par_ledgers)
        .with_opts(BatchOpts {
            parallel: true,
            threads: Some(3),
        })
        .run_batch("frame-1", Some(&quad()), &bg, &items)
        .unwrap();

    assert_eq!(names(&seq), names(&par));
    assert_eq!(seq.processed_count(), par.processed_count());
    for (a, b) in seq.results().iter().zip(par.results()) {
        assert_eq!(a.is_success(), b.is_success());
        if let (Some(oa), Some(ob)) = (a.output(), b.output()) {
            assert_eq!(oa.filename, ob.filename);
            assert_eq!(seq_out.get(oa).unwrap(), par_out.get(ob).unwrap());
        }
    }
}

#[test]
fn invalid_thread_count_is_rejected_before_work() {
    let outputs = InMemoryOutputStore::new();
    let ledgers = InMemoryLedgerStore::new();
    let err = BatchRunner::new(&outputs, &ledgers)
        .with_opts(BatchOpts {
            parallel: true,
            threads: Some(0),
        })
        .run_batch("frame-1", Some(&quad()), &background(), &[artwork("a.png", 1)])
        .unwrap_err();
    assert!(matches!(err, FrameError::Validation(_)));
    assert!(outputs.is_empty());
}

#[test]
fn degenerate_quad_fails_every_item() {
    let outputs = InMemoryOutputStore::new();
    let ledgers = InMemoryLedgerStore::new();
    let collinear = Quad::new(
        PixelPoint::new(10, 10),
        PixelPoint::new(60, 10),
        PixelPoint::new(110, 10),
        PixelPoint::new(10, 90),
    );
    let items = vec![artwork("a.png", 1), artwork("b.png", 2), artwork("c.png", 3)];

    let ledger = BatchRunner::new(&outputs, &ledgers)
        .run_batch("frame-1", Some(&collinear), &background(), &items)
        .unwrap();

    assert_eq!(ledger.processed_count(), 0);
    assert_eq!(ledger.failed_count(), 3);
    for r in ledger.results() {
        let ItemOutcome::Failure { reason } = &r.outcome else {
            panic!("{} should fail", r.original_filename);
        };
        assert!(reason.contains("degenerate geometry"), "{reason}");
    }
    assert!(outputs.is_empty());
}

#[test]
fn missing_corners_abort_before_any_item() {
    let outputs = InMemoryOutputStore::new();
    let ledgers = InMemoryLedgerStore::new();
    let err = BatchRunner::new(&outputs, &ledgers)
        .run_batch("frame-1", None, &background(), &five_items_with_bad_third())
        .unwrap_err();

    assert!(matches!(err, FrameError::Precondition(ref m) if m.contains("coordinates not set")));
    assert!(outputs.is_empty());
}

#[test]
fn background_survives_a_batch_unchanged() {
    let outputs = InMemoryOutputStore::new();
    let ledgers = InMemoryLedgerStore::new();
    let bg = background();
    let before = bg.clone();
    let items: Vec<ArtworkItem> = (0..5).map(|i| artwork(&format!("{i}.png"), i * 40)).collect();

    BatchRunner::new(&outputs, &ledgers)
        .run_batch("frame-1", Some(&quad()), &bg, &items)
        .unwrap();

    assert_eq!(bg, before);
}

#[test]
fn empty_batch_finalizes_empty_ledger() {
    let outputs = InMemoryOutputStore::new();
    let ledgers = InMemoryLedgerStore::new();
    let ledger = BatchRunner::new(&outputs, &ledgers)
        .run_batch("frame-1", Some(&quad()), &background(), &[])
        .unwrap();
    assert!(ledger.results().is_empty());
    assert_eq!(ledgers.get(ledger.session_id()).unwrap().unwrap(), ledger);
}

#[test]
fn concurrent_batches_get_distinct_sessions() {
    let outputs = InMemoryOutputStore::new();
    let ledgers = InMemoryLedgerStore::new();
    let a = BatchRunner::new(&outputs, &ledgers)
        .run_batch("frame-1", Some(&quad()), &background(), &[artwork("x.png", 1)])
        .unwrap();
    let b = BatchRunner::new(&outputs, &ledgers)
        .run_batch("frame-1", Some(&quad()), &background(), &[artwork("x.png", 2)])
        .unwrap();
    assert_ne!(a.session_id(), b.session_id());
    assert_eq!(outputs.len(), 2);
}

/// Output store that refuses one filename.
struct FlakyOutputs {
    refuse: &'static str,
    written: Mutex<Vec<String>>,
}

impl OutputStore for FlakyOutputs {
    fn write(&self, out: &OutputRef, _image: &RgbImage) -> FrameResult<()> {
        if out.filename == self.refuse {
            return Err(FrameError::io("disk full"));
        }
        self.written.lock().unwrap().push(out.filename.clone());
        Ok(())
    }
}

#[test]
fn output_write_failure_is_per_item() {
    let outputs = FlakyOutputs {
        refuse: "framed_b.png",
        written: Mutex::new(Vec::new()),
    };
    let ledgers = InMemoryLedgerStore::new();
    let items = vec![artwork("a.png", 1), artwork("b.png", 2), artwork("c.png", 3)];

    let ledger = BatchRunner::new(&outputs, &ledgers)
        .run_batch("frame-1", Some(&quad()), &background(), &items)
        .unwrap();

    assert_eq!(ledger.processed_count(), 2);
    assert_eq!(ledger.failed_count(), 1);
    let ItemOutcome::Failure { reason } = &ledger.results()[1].outcome else {
        panic!("b.png should fail");
    };
    assert!(reason.contains("io failure: disk full"), "{reason}");
    assert_eq!(
        *outputs.written.lock().unwrap(),
        vec!["framed_a.png".to_string(), "framed_c.png".to_string()]
    );
}

/// Ledger store whose appends start failing after `accept` records.
struct BrokenAppends {
    inner: InMemoryLedgerStore,
    accept: usize,
    appended: AtomicUsize,
}

impl LedgerStore for BrokenAppends {
    fn open(&self, ledger: SessionLedger) -> FrameResult<()> {
        self.inner.open(ledger)
    }

    fn append(&self, id: SessionId, record: ItemRecord) -> FrameResult<()> {
        if self.appended.fetch_add(1, Ordering::SeqCst) >= self.accept {
            return Err(FrameError::io("ledger volume gone"));
        }
        self.inner.append(id, record)
    }

    fn finalize(&self, id: SessionId) -> FrameResult<SessionLedger> {
        self.inner.finalize(id)
    }

    fn get(&self, id: SessionId) -> FrameResult<Option<SessionLedger>> {
        self.inner.get(id)
    }

    fn abort(&self, id: SessionId) {
        self.inner.abort(id)
    }
}

#[test]
fn ledger_failure_drops_the_pending_session() {
    let outputs = InMemoryOutputStore::new();
    let ledgers = BrokenAppends {
        inner: InMemoryLedgerStore::new(),
        accept: 2,
        appended: AtomicUsize::new(0),
    };
    let items: Vec<ArtworkItem> = (0..4).map(|i| artwork(&format!("{i}.png"), i * 50)).collect();

    let err = BatchRunner::new(&outputs, &ledgers)
        .run_batch("frame-1", Some(&quad()), &background(), &items)
        .unwrap_err();

    assert!(matches!(err, FrameError::Io(_)), "{err}");
    assert_eq!(ledgers.inner.in_flight(), 0);
}

#[test]
fn filesystem_ledger_failure_leaves_nothing_pending() {
    let tmp = temp_dir("batch_fs_blocked");
    std::fs::create_dir_all(&tmp).unwrap();
    // A plain file where the results directory should be: finalize cannot create it.
    let blocked = tmp.join("results");
    std::fs::write(&blocked, b"not a directory").unwrap();
    let outputs = InMemoryOutputStore::new();
    let ledgers = FsLedgerStore::new(&blocked);

    let err = BatchRunner::new(&outputs, &ledgers)
        .run_batch("frame-1", Some(&quad()), &background(), &[artwork("a.png", 9)])
        .unwrap_err();

    assert!(!err.to_string().is_empty());
    assert_eq!(ledgers.in_flight(), 0);
    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn filesystem_stores_write_images_and_metadata() {
    let tmp = temp_dir("batch_fs");
    let outputs = FsOutputStore::new(&tmp);
    let ledgers = FsLedgerStore::new(&tmp);

    let ledger = BatchRunner::new(&outputs, &ledgers)
        .run_batch("frame-9", Some(&quad()), &background(), &five_items_with_bad_third())
        .unwrap();

    let session_dir = tmp.join(ledger.session_id().to_string());
    assert!(session_dir.join("framed_one.png").exists());
    assert!(!session_dir.join("framed_three.png").exists());

    let raw = std::fs::read_to_string(session_dir.join("metadata.json")).unwrap();
    let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(v["session_id"], ledger.session_id().to_string());
    assert_eq!(v["frame_id"], "frame-9");
    assert_eq!(v["processed_count"], 4);
    assert_eq!(v["failed_count"], 1);
    assert_eq!(v["results"][0]["status"], "success");
    assert_eq!(v["results"][0]["output_filename"], "framed_one.png");
    assert_eq!(v["results"][2]["status"], "failed");
    assert!(v["results"][2]["error"].as_str().unwrap().contains("decode"));
    assert!(v["results"][2].get("output_filename").is_none());

    let reread = FsLedgerStore::new(&tmp)
        .get(ledger.session_id())
        .unwrap()
        .unwrap();
    assert_eq!(reread, ledger);

    std::fs::remove_dir_all(&tmp).ok();
}
