//! Integration tests for the full run: real image files, scripted recognition.
//!
//! Every test builds a temporary directory of PNGs and drives an
//! [`Orchestrator`] against a [`FakeTransport`] that answers from a script,
//! so no network access or API key is needed.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use edgequake_img2txt::{
    Completion, ImageDirectory, ImageError, ImageStore, OcrError, Orchestrator, PerImageResult, PhraseRefusalDetector,
    Pricing, RecognitionClient, RecognitionError, RecognitionTransport, RunConfig,
    RunProgressCallback, RunSummary, Usage,
};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ── Fake transport ───────────────────────────────────────────────────────────

/// How the fake answers one image, attempt by attempt. The last entry
/// repeats once the script runs out.
#[derive(Debug, Clone)]
struct Reply {
    script: Vec<Result<Completion, RecognitionError>>,
    delay: Duration,
}

impl Reply {
    fn text(text: &str, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            script: vec![ok(text, input_tokens, output_tokens)],
            delay: Duration::ZERO,
        }
    }

    fn failing(err: RecognitionError) -> Self {
        Self {
            script: vec![Err(err)],
            delay: Duration::ZERO,
        }
    }

    fn then(mut self, next: Result<Completion, RecognitionError>) -> Self {
        self.script.push(next);
        self
    }

    fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

fn ok(text: &str, input_tokens: u64, output_tokens: u64) -> Result<Completion, RecognitionError> {
    Ok(Completion {
        text: text.to_string(),
        usage: Some(Usage {
            input_tokens,
            output_tokens,
        }),
    })
}

#[derive(Debug)]
struct FakeTransport {
    /// Replies keyed by the exact bytes uploaded.
    replies: HashMap<Vec<u8>, Reply>,
    fallback: Reply,
    credential: Result<(), RecognitionError>,
    attempts: Mutex<HashMap<Vec<u8>, usize>>,
    received: Mutex<Vec<Vec<u8>>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Per-image span gauge, released when recognition ends.
    span: Option<Arc<Gauge>>,
}

impl FakeTransport {
    fn new(fallback: Reply) -> Self {
        Self {
            replies: HashMap::new(),
            fallback,
            credential: Ok(()),
            attempts: Mutex::new(HashMap::new()),
            received: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            span: None,
        }
    }

    fn closing_span(mut self, gauge: &Arc<Gauge>) -> Self {
        self.span = Some(gauge.clone());
        self
    }

    fn with(mut self, image: &[u8], reply: Reply) -> Self {
        self.replies.insert(image.to_vec(), reply);
        self
    }

    fn rejecting_credential(mut self) -> Self {
        self.credential = Err(RecognitionError::InvalidCredential);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight gauge even when the call is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecognitionTransport for FakeTransport {
    async fn complete(&self, image: &[u8]) -> Result<Completion, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);
        let _span = self.span.as_deref().map(|g| InFlight(&g.current));

        self.received.lock().unwrap().push(image.to_vec());
        let reply = self.replies.get(image).unwrap_or(&self.fallback).clone();
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(image.to_vec()).or_insert(0);
            *n += 1;
            *n - 1
        };

        tokio::time::sleep(reply.delay).await;
        reply
            .script
            .get(attempt)
            .or_else(|| reply.script.last())
            .cloned()
            .unwrap_or_else(|| ok("", 0, 0))
    }

    async fn validate_credential(&self) -> Result<(), RecognitionError> {
        self.credential.clone()
    }
}

// ── Instrumented store ───────────────────────────────────────────────────────

/// Counts images between the start of their load and the end of recognition.
#[derive(Debug, Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

/// Directory store that opens the in-flight span when an image starts loading.
struct GaugedStore {
    inner: ImageDirectory,
    gauge: Arc<Gauge>,
}

#[async_trait]
impl ImageStore for GaugedStore {
    async fn list_images(&self) -> Result<Vec<String>, OcrError> {
        self.inner.list_images().await
    }

    async fn load_image(&self, name: &str) -> Result<Vec<u8>, ImageError> {
        let now = self.gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(now, Ordering::SeqCst);
        // Widen the load window so an unthrottled loader would overlap.
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.inner.load_image(name).await
    }

    async fn save_transcript(&self, text: &str) -> Result<(), OcrError> {
        self.inner.save_transcript(text).await
    }

    fn location(&self) -> std::path::PathBuf {
        self.inner.location()
    }
}

// ── Progress recorder ────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    started: Mutex<Option<usize>>,
    events: Mutex<Vec<(usize, usize, String)>>,
    finished: AtomicUsize,
}

impl RunProgressCallback for Recorder {
    fn on_run_start(&self, total: usize) {
        *self.started.lock().unwrap() = Some(total);
    }

    fn on_image_complete(&self, completed: usize, total: usize, result: &PerImageResult) {
        self.events
            .lock()
            .unwrap()
            .push((completed, total, result.name.clone()));
    }

    fn on_run_complete(&self, _summary: &RunSummary) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Write a PNG of the given size and return its bytes.
fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 251) as u8, (y % 241) as u8, 90])
    }));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    std::fs::write(dir.join(name), &bytes).expect("write png");
    bytes
}

fn config_for(dir: &Path, concurrency: usize) -> RunConfig {
    RunConfig::builder()
        .input_dir(dir)
        .concurrency(concurrency)
        .build()
        .expect("valid config")
}

/// Route library logs to the test harness; `RUST_LOG=debug` shows retries.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn orchestrator(transport: &Arc<FakeTransport>, config: RunConfig) -> Orchestrator {
    init_tracing();
    let client = RecognitionClient::new(
        transport.clone(),
        Arc::new(PhraseRefusalDetector),
        config.retry,
        config.pricing,
    );
    let store = ImageDirectory::new(&config.input_dir, config.resolved_output_path());
    Orchestrator::new(client, Arc::new(store), config)
}

// ── Summary and cost ─────────────────────────────────────────────────────────

#[tokio::test]
async fn summary_matches_per_image_results() {
    let tmp = TempDir::new().unwrap();
    let mut transport = FakeTransport::new(Reply::text("unused", 0, 0));
    for i in 0..5u64 {
        let bytes = write_png(tmp.path(), &format!("page-{i}.png"), 20 + i as u32, 10);
        transport = transport.with(&bytes, Reply::text("words", 1000 * (i + 1), 100 + i));
    }
    let transport = Arc::new(transport);

    let report = orchestrator(&transport, config_for(tmp.path(), 3))
        .run(&CancellationToken::new())
        .await
        .expect("run succeeds");

    let s = &report.summary;
    assert_eq!(s.processed_count, 5);
    assert_eq!(s.failed_count, 0);
    assert_eq!(report.results.len(), 5);

    let summed: f64 = report.results.iter().map(|r| r.cost).sum();
    assert_eq!(s.total_cost, summed);
    assert_eq!(s.cost_per_image, s.total_cost / 5.0);
    assert!(s.total_cost > 0.0);

    assert_eq!(s.total_attempts, 5);
    assert_eq!(s.attempts_per_image, 1.0);
    assert_eq!(transport.calls(), 5);
}

#[tokio::test]
async fn retried_images_are_billed_for_every_attempt() {
    let tmp = TempDir::new().unwrap();
    let flaky = write_png(tmp.path(), "a.png", 30, 30);
    let transport = Arc::new(
        FakeTransport::new(Reply::text("unused", 0, 0)).with(
            &flaky,
            Reply::failing(RecognitionError::Transport("reset".into()))
                .then(ok("I'm sorry, I can't transcribe this image.", 500, 10))
                .then(ok("Dear diary", 1000, 50)),
        ),
    );

    let report = orchestrator(&transport, config_for(tmp.path(), 1))
        .run(&CancellationToken::new())
        .await
        .unwrap();

    let r = &report.results[0];
    assert!(r.is_success(), "got: {:?}", r.error);
    assert_eq!(r.text, "Dear diary");
    assert_eq!(r.attempts, 3);
    let pricing = Pricing::default();
    let expected = pricing.cost(500, 10) + pricing.cost(1000, 50);
    assert!((r.cost - expected).abs() < 1e-12);
}

// ── Ordering ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transcript_follows_listing_order_not_completion_order() {
    let tmp = TempDir::new().unwrap();
    let mut transport = FakeTransport::new(Reply::text("unused", 0, 0));
    for i in 0..6u32 {
        let name = format!("page-{i:02}.png");
        let bytes = write_png(tmp.path(), &name, 20 + i, 12);
        // Later pages answer first.
        let delay = Duration::from_millis(40 * u64::from(6 - i));
        transport = transport.with(&bytes, Reply::text(&format!("text of {name}"), 10, 10).after(delay));
    }
    let transport = Arc::new(transport);
    let recorder = Arc::new(Recorder::default());

    let config = RunConfig::builder()
        .input_dir(tmp.path())
        .concurrency(10)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let report = orchestrator(&transport, config)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        ["page-00.png", "page-01.png", "page-02.png", "page-03.png", "page-04.png", "page-05.png"]
    );
    for (i, r) in report.results.iter().enumerate() {
        assert_eq!(r.ordinal, i);
    }

    let positions: Vec<usize> = (0..6)
        .map(|i| {
            report
                .transcript
                .find(&format!("text of page-{i:02}.png"))
                .expect("page in transcript")
        })
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    let events = recorder.events.lock().unwrap();
    assert_eq!(events.first().map(|e| e.2.as_str()), Some("page-05.png"));

    let on_disk = std::fs::read_to_string(tmp.path().join("output.txt")).unwrap();
    assert_eq!(on_disk, report.transcript);
}

#[tokio::test]
async fn dates_are_extracted_and_carried_forward() {
    let tmp = TempDir::new().unwrap();
    let a = write_png(tmp.path(), "IMG_0001.png", 20, 20);
    let b = write_png(tmp.path(), "IMG_0002.png", 21, 20);
    let c = write_png(tmp.path(), "IMG_0003.png", 22, 20);
    let d = write_png(tmp.path(), "IMG_0004.png", 23, 20);
    let transport = Arc::new(
        FakeTransport::new(Reply::text("unused", 0, 0))
            .with(&a, Reply::text("no date on this one", 1, 1))
            .with(&b, Reply::text("```\nMonday, January 1, 2024\nNew year.\n```", 1, 1))
            .with(&c, Reply::text("Still the same day.", 1, 1))
            .with(&d, Reply::text("1/2/2024\nNext morning.", 1, 1)),
    );

    let config = RunConfig::builder()
        .input_dir(tmp.path())
        .start_date("Sunday, December 31, 2023")
        .build()
        .unwrap();
    let report = orchestrator(&transport, config)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    let expected = "---\nIMG_0001.png\nSunday, December 31, 2023\nno date on this one\n\
---\nIMG_0002.png\nMonday, January 1, 2024\nMonday, January 1, 2024\nNew year.\n\
---\nIMG_0003.png\nMonday, January 1, 2024\nStill the same day.\n\
---\nIMG_0004.png\n1/2/2024\n1/2/2024\nNext morning.\n";
    assert_eq!(report.transcript, expected);
    assert_eq!(report.results[0].date, None);
    assert_eq!(report.results[1].date.as_deref(), Some("Monday, January 1, 2024"));
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn in_flight_images_never_exceed_the_limit() {
    for limit in [1usize, 3, 10] {
        let tmp = TempDir::new().unwrap();
        for i in 0..12u32 {
            write_png(tmp.path(), &format!("p{i:02}.png"), 16 + i, 16);
        }
        let transport = Arc::new(FakeTransport::new(
            Reply::text("ok", 1, 1).after(Duration::from_millis(15)),
        ));

        let report = orchestrator(&transport, config_for(tmp.path(), limit))
            .run(&CancellationToken::new())
            .await
            .unwrap();

        let peak = transport.max_in_flight.load(Ordering::SeqCst);
        assert!(peak <= limit, "limit {limit}: peak {peak}");
        assert!(peak >= 1);
        assert_eq!(report.summary.processed_count, 12);
    }
}

#[tokio::test]
async fn load_resize_and_recognition_share_the_limit() {
    for limit in [1usize, 3, 10] {
        let tmp = TempDir::new().unwrap();
        for i in 0..16u32 {
            write_png(tmp.path(), &format!("p{i:02}.png"), 16 + i, 16);
        }
        let gauge = Arc::new(Gauge::default());
        let transport = Arc::new(
            FakeTransport::new(Reply::text("ok", 1, 1).after(Duration::from_millis(10)))
                .closing_span(&gauge),
        );
        let config = config_for(tmp.path(), limit);
        let client = RecognitionClient::new(
            transport.clone(),
            Arc::new(PhraseRefusalDetector),
            config.retry,
            config.pricing,
        );
        let store = GaugedStore {
            inner: ImageDirectory::new(&config.input_dir, config.resolved_output_path()),
            gauge: gauge.clone(),
        };

        let report = Orchestrator::new(client, Arc::new(store), config)
            .run(&CancellationToken::new())
            .await
            .unwrap();

        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= limit, "limit {limit}: peak {peak}");
        assert!(peak >= 1);
        assert_eq!(gauge.current.load(Ordering::SeqCst), 0);
        assert_eq!(report.summary.processed_count, 16);
    }
}

#[tokio::test]
async fn zero_limit_in_struct_literal_is_rejected() {
    let tmp = TempDir::new().unwrap();
    for i in 0..12u32 {
        write_png(tmp.path(), &format!("p{i:02}.png"), 16 + i, 16);
    }
    let transport = Arc::new(FakeTransport::new(Reply::text("ok", 1, 1)));
    let config = RunConfig {
        input_dir: tmp.path().to_path_buf(),
        concurrency: 0,
        ..RunConfig::default()
    };

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        orchestrator(&transport, config).run(&CancellationToken::new()),
    )
    .await
    .expect("run returns instead of hanging");
    let err = outcome.unwrap_err();
    assert!(matches!(err, OcrError::InvalidConfig(_)), "got: {err}");
    assert_eq!(transport.calls(), 0);
}

// ── Partial failure ──────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_image_is_reported_inline_and_siblings_succeed() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "a.png", 20, 20);
    let bad = write_png(tmp.path(), "b.png", 21, 20);
    write_png(tmp.path(), "c.png", 22, 20);
    let transport = Arc::new(
        FakeTransport::new(Reply::text("fine", 10, 10)).with(
            &bad,
            Reply::failing(RecognitionError::RemoteApi {
                status: 503,
                message: "overloaded".into(),
            }),
        ),
    );

    let report = orchestrator(&transport, config_for(tmp.path(), 2))
        .run(&CancellationToken::new())
        .await
        .expect("a single failure does not abort the run");

    assert_eq!(report.summary.processed_count, 3);
    assert_eq!(report.summary.failed_count, 1);
    let failed = &report.results[1];
    assert_eq!(failed.name, "b.png");
    assert_eq!(failed.attempts, 5);
    assert!(failed.text.is_empty());
    assert!(matches!(
        failed.error,
        Some(ImageError::Recognition(
            RecognitionError::MaxAttemptsExceeded { attempts: 5, .. }
        ))
    ));
    assert!(report
        .transcript
        .contains("---\nb.png\nError processing image: Max attempts exceeded (5)"));
    assert!(report.transcript.contains("---\na.png\nfine\n"));
    assert!(report.transcript.contains("---\nc.png\nfine\n"));
}

#[tokio::test]
async fn undecodable_image_fails_without_recognition() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "a.png", 20, 20);
    std::fs::write(tmp.path().join("broken.jpg"), b"not really a jpeg").unwrap();
    let transport = Arc::new(FakeTransport::new(Reply::text("fine", 1, 1)));

    let report = orchestrator(&transport, config_for(tmp.path(), 2))
        .run(&CancellationToken::new())
        .await
        .unwrap();

    let broken = &report.results[1];
    assert_eq!(broken.name, "broken.jpg");
    assert_eq!(broken.attempts, 0);
    assert_eq!(broken.cost, 0.0);
    assert!(matches!(
        broken.error,
        Some(ImageError::DecodeFailure { .. })
    ));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn oversized_images_are_downscaled_before_upload() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "wide.png", 3000, 1000);
    let transport = Arc::new(FakeTransport::new(Reply::text("fine", 1, 1)));

    orchestrator(&transport, config_for(tmp.path(), 1))
        .run(&CancellationToken::new())
        .await
        .unwrap();

    let received = transport.received.lock().unwrap();
    let uploaded = image::load_from_memory(&received[0]).unwrap();
    assert_eq!(uploaded.dimensions(), (1500, 500));
}

// ── Run-level failures ───────────────────────────────────────────────────────

#[tokio::test]
async fn empty_directory_is_no_images_found() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("notes.txt"), "not an image").unwrap();
    let transport = Arc::new(FakeTransport::new(Reply::text("x", 1, 1)));

    let err = orchestrator(&transport, config_for(tmp.path(), 2))
        .run(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::NoImagesFound { .. }), "got: {err}");
    assert!(!tmp.path().join("output.txt").exists());
}

#[tokio::test]
async fn missing_directory_is_directory_not_found() {
    let tmp = TempDir::new().unwrap();
    let transport = Arc::new(FakeTransport::new(Reply::text("x", 1, 1)));

    let err = orchestrator(&transport, config_for(&tmp.path().join("nope"), 2))
        .run(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::DirectoryNotFound { .. }), "got: {err}");
}

#[tokio::test]
async fn rejected_credential_stops_before_any_recognition() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "a.png", 20, 20);
    let transport = Arc::new(FakeTransport::new(Reply::text("x", 1, 1)).rejecting_credential());

    let err = orchestrator(&transport, config_for(tmp.path(), 2))
        .run(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::InvalidCredential), "got: {err}");
    assert_eq!(transport.calls(), 0);
    assert!(!tmp.path().join("output.txt").exists());
}

#[tokio::test]
async fn unauthorized_during_recognition_is_a_single_attempt() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "a.png", 20, 20);
    let transport = Arc::new(FakeTransport::new(Reply::failing(
        RecognitionError::RemoteApi {
            status: 401,
            message: "key revoked".into(),
        },
    )));

    let report = orchestrator(&transport, config_for(tmp.path(), 1))
        .run(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.results[0].attempts, 1);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn save_failure_is_processing_failed() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "a.png", 20, 20);
    std::fs::write(tmp.path().join("blocker"), "a file, not a directory").unwrap();
    let transport = Arc::new(FakeTransport::new(Reply::text("fine", 1, 1)));

    let config = RunConfig::builder()
        .input_dir(tmp.path())
        .output_path("blocker/output.txt")
        .build()
        .unwrap();
    let err = orchestrator(&transport, config)
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        OcrError::ProcessingFailed(inner) => {
            assert!(matches!(*inner, OcrError::SaveFailed { .. }), "got: {inner}");
        }
        other => panic!("expected ProcessingFailed, got {other}"),
    }
    assert_eq!(transport.calls(), 1);
}

// ── Cancellation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancellation_stops_the_run_without_deadlock() {
    let tmp = TempDir::new().unwrap();
    for i in 0..20u32 {
        write_png(tmp.path(), &format!("p{i:02}.png"), 16 + i, 16);
    }
    let transport = Arc::new(FakeTransport::new(
        Reply::text("slow", 1, 1).after(Duration::from_secs(30)),
    ));
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let orchestrator = orchestrator(&transport, config_for(tmp.path(), 2));
    let outcome = tokio::time::timeout(Duration::from_secs(10), orchestrator.run(&token))
        .await
        .expect("run returns promptly after cancellation");

    match outcome {
        Err(OcrError::Cancelled { completed, total }) => {
            assert_eq!(completed, 0);
            assert_eq!(total, 20);
        }
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert_eq!(transport.calls(), 2);
    assert_eq!(transport.in_flight.load(Ordering::SeqCst), 0);
    assert!(!tmp.path().join("output.txt").exists());
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn progress_is_monotonic_and_complete() {
    let tmp = TempDir::new().unwrap();
    for i in 0..8u32 {
        write_png(tmp.path(), &format!("p{i}.png"), 16 + i, 16);
    }
    let transport = Arc::new(FakeTransport::new(
        Reply::text("ok", 1, 1).after(Duration::from_millis(5)),
    ));
    let recorder = Arc::new(Recorder::default());
    let config = RunConfig::builder()
        .input_dir(tmp.path())
        .concurrency(4)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    orchestrator(&transport, config)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*recorder.started.lock().unwrap(), Some(8));
    let events = recorder.events.lock().unwrap();
    let counts: Vec<usize> = events.iter().map(|e| e.0).collect();
    assert_eq!(counts, (1..=8).collect::<Vec<_>>());
    assert!(events.iter().all(|e| e.1 == 8));
    assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
}

// ── Misc ─────────────────────────────────────────────────────────────────────

#[test]
fn runs_on_a_blocking_caller() {
    let tmp = TempDir::new().unwrap();
    write_png(tmp.path(), "only.png", 20, 20);
    let transport = Arc::new(FakeTransport::new(Reply::text("Hello", 100, 10)));
    let orchestrator = orchestrator(&transport, config_for(tmp.path(), 1));

    let report = tokio_test::block_on(orchestrator.run(&CancellationToken::new())).unwrap();
    assert_eq!(report.transcript, "---\nonly.png\nHello\n");

    let json = serde_json::to_string(&report).expect("report serialises");
    assert!(json.contains("\"processed_count\":1"));
}

#[test]
fn noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<edgequake_img2txt::NoopProgressCallback>();
    assert_send_sync::<Orchestrator>();
}
