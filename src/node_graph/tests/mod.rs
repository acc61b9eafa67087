// Engine-level tests driving chain and sequence runs against a scripted
// in-memory service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::abort::AbortHandle;
use crate::download::DownloadSink;
use crate::error::EngineError;
use crate::images;
use crate::models::payloads::{
    parse_payload, serialize_payload, FrameStatus, ImageInputPayload, ScriptPayload,
    SequencePayload, TextPayload, VideoOutputPayload,
};
use crate::models::schema::{
    Connection, DownloadData, DownloadKind, Graph, ImageRef, Node, NodeKind,
};
use crate::node_graph::executor::{build_backward_queue, build_forward_queue};
use crate::node_graph::{
    resolve_upstream, ChainDirection, Engine, UpstreamSources, UpstreamValue, WorkingSet,
};
use crate::services::{GenerationService, TextOp};
use crate::storage::TabStore;

const TAB: &str = "tab-1";

struct MockService {
    calls: Mutex<Vec<String>>,
    /// Data URL returned from image generation; must decode as a real image
    /// because the engine thumbnails every result.
    image_url: String,
    /// Image-call index at which the service parks until `gate` fires.
    gate_at: Option<usize>,
    started: Notify,
    gate: Notify,
    /// When set, every image call fails with this HTTP status.
    fail_images: AtomicBool,
}

impl MockService {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            image_url: images::tests::tiny_png_data_url(8, 8),
            gate_at: None,
            started: Notify::new(),
            gate: Notify::new(),
            fail_images: AtomicBool::new(false),
        }
    }

    fn gated_at(index: usize) -> Self {
        Self {
            gate_at: Some(index),
            ..Self::new()
        }
    }

    fn failing_images() -> Self {
        let service = Self::new();
        service.fail_images.store(true, Ordering::SeqCst);
        service
    }

    fn record(&self, label: String) -> usize {
        let mut calls = self.calls.lock().unwrap();
        let image_index = calls.iter().filter(|c| c.starts_with("image:")).count();
        calls.push(label);
        image_index
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn image_prompts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("image:").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl GenerationService for MockService {
    async fn generate_image(
        &self,
        prompt: &str,
        _aspect_ratio: &str,
        _reference_images: &[ImageRef],
        _model: &str,
        _resolution: Option<&str>,
    ) -> Result<String, EngineError> {
        let index = self.record(format!("image:{}", prompt));
        if self.fail_images.load(Ordering::SeqCst) {
            return Err(EngineError::Remote {
                status: Some(500),
                message: "internal error".into(),
            });
        }
        if self.gate_at == Some(index) {
            self.started.notify_one();
            self.gate.notified().await;
        }
        Ok(self.image_url.clone())
    }

    async fn generate_video(
        &self,
        prompt: &str,
        _aspect_ratio: &str,
        _resolution: &str,
    ) -> Result<String, EngineError> {
        self.record(format!("video:{}", prompt));
        Ok("https://assets.example/clip.mp4".into())
    }

    async fn transform_text(&self, op: TextOp, input: &str) -> Result<String, EngineError> {
        self.record(format!("text:{}:{}", op.as_str(), input));
        Ok(format!("{}({})", op.as_str(), input))
    }

    async fn describe_image(&self, _image: &ImageRef) -> Result<String, EngineError> {
        self.record("describe".into());
        Ok("a small test card".into())
    }

    async fn analyze_prompt(&self, prompt: &str) -> Result<Value, EngineError> {
        self.record(format!("analyze:{}", prompt));
        Ok(json!({ "frames": [{ "frameNumber": 1, "prompt": prompt }] }))
    }

    async fn analyze_character(
        &self,
        description: &str,
        _images: &[ImageRef],
    ) -> Result<Value, EngineError> {
        self.record(format!("character:{}", description));
        Ok(json!({ "name": "hero" }))
    }

    async fn generate_script(&self, premise: &str, scene_count: u32) -> Result<Value, EngineError> {
        self.record(format!("script:{}:{}", premise, scene_count));
        Ok(json!({ "scenes": [{ "frameNumber": 1, "prompt": "opening shot" }] }))
    }

    async fn generate_characters(&self, brief: &str) -> Result<Value, EngineError> {
        self.record(format!("characters:{}", brief));
        Ok(json!({ "characters": [{ "name": "sidekick" }] }))
    }
}

#[derive(Default)]
struct RecordingDownloads {
    files: Mutex<Vec<(String, DownloadKind)>>,
}

impl DownloadSink for RecordingDownloads {
    fn download(&self, data: &DownloadData, filename: &str) {
        self.files
            .lock()
            .unwrap()
            .push((filename.to_string(), data.kind));
    }
}

fn text_value(text: &str) -> String {
    serialize_payload(&TextPayload {
        text: text.into(),
        ..TextPayload::default()
    })
    .unwrap()
}

fn image_input_value() -> String {
    let url = images::tests::tiny_png_data_url(4, 4);
    serialize_payload(&ImageInputPayload {
        image: Some(images::image_ref_from_data_url(&url).unwrap()),
        ..ImageInputPayload::default()
    })
    .unwrap()
}

fn sequence_value(payload: &SequencePayload) -> String {
    serialize_payload(payload).unwrap()
}

struct Harness {
    engine: Arc<Engine>,
    service: Arc<MockService>,
    downloads: Arc<RecordingDownloads>,
}

impl Harness {
    fn new(graph: Graph, service: MockService) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let service = Arc::new(service);
        let downloads = Arc::new(RecordingDownloads::default());
        let store = Arc::new(TabStore::new(TAB, "Scene 1", graph));
        let engine = Arc::new(Engine::new(
            service.clone(),
            store,
            downloads.clone(),
        ));
        Self {
            engine,
            service,
            downloads,
        }
    }

    fn node_value(&self, node_id: &str) -> String {
        self.engine.store().node_value(TAB, node_id).unwrap()
    }

    fn frame_statuses(&self, node_id: &str) -> Vec<FrameStatus> {
        let payload: SequencePayload = parse_payload(&self.node_value(node_id)).unwrap();
        payload
            .sequence_outputs
            .iter()
            .map(|slot| slot.status)
            .collect()
    }
}

// --- chain execution ---

#[tokio::test]
async fn backward_chain_runs_dependencies_before_the_target() {
    let graph = Graph {
        nodes: vec![
            Node::new("prompt", NodeKind::Prompt, text_value("a misty valley")),
            Node::new("enhance", NodeKind::EnhancePrompt, "{}"),
            Node::new("sanitize", NodeKind::SanitizePrompt, "{}"),
        ],
        connections: vec![
            Connection::new("prompt", "enhance"),
            Connection::new("enhance", "sanitize"),
        ],
    };
    let h = Harness::new(graph, MockService::new());

    h.engine
        .execute_chain(TAB, "sanitize", ChainDirection::Backward, &AbortHandle::new())
        .await
        .unwrap();

    // The enhance result, produced earlier in the same run, feeds sanitize.
    assert_eq!(
        h.service.calls(),
        vec![
            "text:enhance:a misty valley".to_string(),
            "text:sanitize:enhance(a misty valley)".to_string(),
        ]
    );
    let stored: TextPayload = parse_payload(&h.node_value("sanitize")).unwrap();
    assert_eq!(stored.text, "sanitize(enhance(a misty valley))");
}

#[test]
fn backward_queue_is_post_order_and_cycle_safe() {
    let graph = Graph {
        nodes: ["a", "b", "c", "d"]
            .iter()
            .map(|id| Node::new(*id, NodeKind::Prompt, "{}"))
            .collect(),
        connections: vec![
            Connection::new("a", "b"),
            Connection::new("a", "c"),
            Connection::new("b", "d"),
            Connection::new("c", "d"),
        ],
    };
    let working = WorkingSet::from_graph(graph);
    assert_eq!(build_backward_queue(&working, "d"), ["a", "b", "c", "d"]);

    let cyclic = Graph {
        nodes: vec![
            Node::new("a", NodeKind::Prompt, "{}"),
            Node::new("b", NodeKind::Prompt, "{}"),
        ],
        connections: vec![Connection::new("a", "b"), Connection::new("b", "a")],
    };
    let working = WorkingSet::from_graph(cyclic);
    // Revisits are treated as already satisfied rather than erroring.
    assert_eq!(build_backward_queue(&working, "b"), ["a", "b"]);
}

#[test]
fn forward_queue_follows_only_the_first_outbound_edge() {
    let graph = Graph {
        nodes: ["a", "b", "c"]
            .iter()
            .map(|id| Node::new(*id, NodeKind::Prompt, "{}"))
            .collect(),
        connections: vec![Connection::new("a", "b"), Connection::new("a", "c")],
    };
    let working = WorkingSet::from_graph(graph);
    assert_eq!(build_forward_queue(&working, "a"), ["a", "b"]);
}

#[test]
fn every_inbound_connection_contributes_an_upstream_value() {
    let graph = Graph {
        nodes: vec![
            Node::new("prompt", NodeKind::Prompt, text_value("dunes")),
            Node::new("img", NodeKind::ImageOutput, "{}"),
        ],
        connections: vec![
            Connection::new("prompt", "img"),
            Connection::new("prompt", "img"),
        ],
    };
    let h = Harness::new(graph, MockService::new());
    let working = WorkingSet::from_graph(h.engine.store().graph_snapshot(TAB).unwrap());
    let sources = UpstreamSources {
        store: h.engine.store(),
        tab_id: TAB,
    };

    // Two edges from the same source resolve as two list entries.
    let values = resolve_upstream("img", &working, &sources).unwrap();
    assert_eq!(
        values,
        vec![
            UpstreamValue::Text("dunes".into()),
            UpstreamValue::Text("dunes".into()),
        ]
    );
}

#[test]
fn reroute_branches_each_contribute_their_value() {
    // origin fans out through two reroutes that both land on target.
    let graph = Graph {
        nodes: vec![
            Node::new("origin", NodeKind::Prompt, text_value("origin")),
            Node::new("r1", NodeKind::Reroute, "{}"),
            Node::new("r2", NodeKind::Reroute, "{}"),
            Node::new("target", NodeKind::ImageOutput, "{}"),
        ],
        connections: vec![
            Connection::new("origin", "r1"),
            Connection::new("origin", "r2"),
            Connection::new("r1", "target"),
            Connection::new("r2", "target"),
        ],
    };
    let h = Harness::new(graph, MockService::new());
    let working = WorkingSet::from_graph(h.engine.store().graph_snapshot(TAB).unwrap());
    let sources = UpstreamSources {
        store: h.engine.store(),
        tab_id: TAB,
    };

    let values = resolve_upstream("target", &working, &sources).unwrap();
    assert_eq!(
        values,
        vec![
            UpstreamValue::Text("origin".into()),
            UpstreamValue::Text("origin".into()),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_chain_run_is_refused_while_one_is_active() {
    let graph = Graph {
        nodes: vec![
            Node::new("prompt", NodeKind::Prompt, text_value("a lighthouse")),
            Node::new("img", NodeKind::ImageOutput, "{}"),
        ],
        connections: vec![Connection::new("prompt", "img")],
    };
    let h = Harness::new(graph, MockService::gated_at(0));

    let engine = h.engine.clone();
    let first = tokio::spawn(async move {
        engine
            .execute_chain(TAB, "img", ChainDirection::Backward, &AbortHandle::new())
            .await
    });

    h.service.started.notified().await;
    assert!(h.engine.is_chain_running());
    assert!(h.engine.ops().contains("img"));

    // The overlapping request is a quiet no-op.
    h.engine
        .execute_chain(TAB, "img", ChainDirection::Backward, &AbortHandle::new())
        .await
        .unwrap();
    assert_eq!(h.service.calls().len(), 1);

    h.service.gate.notify_one();
    first.await.unwrap().unwrap();

    assert!(!h.engine.is_chain_running());
    assert!(h.engine.ops().snapshot().is_empty());
    assert!(h
        .engine
        .store()
        .full_size_image(TAB, "img", 0)
        .is_some());
}

#[tokio::test]
async fn chain_aborted_before_start_runs_nothing() {
    let graph = Graph {
        nodes: vec![Node::new("img", NodeKind::ImageOutput, "{}")],
        connections: vec![],
    };
    let h = Harness::new(graph, MockService::new());
    let abort = AbortHandle::new();
    abort.abort();

    h.engine
        .execute_chain(TAB, "img", ChainDirection::Backward, &abort)
        .await
        .unwrap();
    assert!(h.service.calls().is_empty());
    assert!(!h.engine.is_chain_running());
}

#[tokio::test]
async fn validation_failure_clears_the_operation_marker() {
    // An enhance node with no upstream and no manual input.
    let graph = Graph {
        nodes: vec![Node::new("enhance", NodeKind::EnhancePrompt, "{}")],
        connections: vec![],
    };
    let h = Harness::new(graph, MockService::new());

    let err = h
        .engine
        .execute_chain(TAB, "enhance", ChainDirection::Backward, &AbortHandle::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(h.engine.ops().snapshot().is_empty());
    assert!(!h.engine.is_chain_running());
}

#[tokio::test]
async fn remote_failure_clears_the_operation_marker() {
    let graph = Graph {
        nodes: vec![
            Node::new("prompt", NodeKind::Prompt, text_value("x")),
            Node::new("img", NodeKind::ImageOutput, "{}"),
        ],
        connections: vec![Connection::new("prompt", "img")],
    };
    let h = Harness::new(graph, MockService::failing_images());

    let err = h
        .engine
        .execute_chain(TAB, "img", ChainDirection::Backward, &AbortHandle::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Remote { .. }));
    assert!(h.engine.ops().snapshot().is_empty());
    assert!(!h.engine.is_chain_running());
}

#[tokio::test]
async fn unrelated_payload_fields_survive_a_chain_run() {
    let graph = Graph {
        nodes: vec![Node::new(
            "img",
            NodeKind::ImageOutput,
            r#"{"prompt":"a harbor","customSetting":42}"#,
        )],
        connections: vec![],
    };
    let h = Harness::new(graph, MockService::new());

    h.engine
        .execute_chain(TAB, "img", ChainDirection::Backward, &AbortHandle::new())
        .await
        .unwrap();

    let stored: Value = serde_json::from_str(&h.node_value("img")).unwrap();
    assert_eq!(stored["customSetting"], json!(42));
    assert!(stored["thumbnail"].as_str().is_some());
}

#[tokio::test]
async fn video_output_downloads_with_the_video_filename() {
    let graph = Graph {
        nodes: vec![
            Node::new("prompt", NodeKind::Prompt, text_value("waves at dusk")),
            Node::new(
                "vid",
                NodeKind::VideoOutput,
                r#"{"prompt":"","autoDownload":true}"#,
            ),
        ],
        connections: vec![Connection::new("prompt", "vid")],
    };
    let h = Harness::new(graph, MockService::new());

    h.engine
        .execute_chain(TAB, "vid", ChainDirection::Backward, &AbortHandle::new())
        .await
        .unwrap();

    let stored: VideoOutputPayload = parse_payload(&h.node_value("vid")).unwrap();
    assert_eq!(stored.video_url.as_deref(), Some("https://assets.example/clip.mp4"));

    let files = h.downloads.files.lock().unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].0.starts_with("Video_"));
    assert_eq!(files[0].1, DownloadKind::Video);
}

#[tokio::test]
async fn script_generator_appends_to_existing_scenes() {
    let graph = Graph {
        nodes: vec![Node::new(
            "script",
            NodeKind::ScriptGenerator,
            r#"{"premise":"a heist","sceneCount":3,"scenes":[{"frameNumber":9}]}"#,
        )],
        connections: vec![],
    };
    let h = Harness::new(graph, MockService::new());

    h.engine
        .execute_chain(TAB, "script", ChainDirection::Backward, &AbortHandle::new())
        .await
        .unwrap();

    assert_eq!(h.service.calls(), vec!["script:a heist:3".to_string()]);
    let stored: ScriptPayload = parse_payload(&h.node_value("script")).unwrap();
    assert_eq!(stored.scenes.len(), 2);
    assert_eq!(stored.scenes[0]["frameNumber"], json!(9));
}

// --- sequence engine ---

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_sequence_run_leaves_no_in_flight_slots() {
    let payload = SequencePayload {
        prompt: "beach".into(),
        frame_prompts: vec!["f1".into(), "f2".into(), "f3".into(), "f4".into(), "f5".into()],
        ..SequencePayload::default()
    };
    let graph = Graph {
        nodes: vec![Node::new(
            "seq",
            NodeKind::SequenceGenerator,
            sequence_value(&payload),
        )],
        connections: vec![],
    };
    // Frames 0 and 1 complete; the call for frame 2 parks until aborted.
    let h = Harness::new(graph, MockService::gated_at(2));

    let abort = AbortHandle::new();
    let engine = h.engine.clone();
    let runner = abort.clone();
    let run = tokio::spawn(async move { engine.run_all_frames(TAB, "seq", &runner).await });

    h.service.started.notified().await;
    abort.abort();
    // Abort is a quiet reversion, not an error.
    run.await.unwrap().unwrap();

    assert_eq!(
        h.frame_statuses("seq"),
        vec![
            FrameStatus::Done,
            FrameStatus::Done,
            FrameStatus::Idle,
            FrameStatus::Idle,
            FrameStatus::Idle,
        ]
    );
    let store = h.engine.store();
    assert!(store.full_size_image(TAB, "seq", 1000).is_some());
    assert!(store.full_size_image(TAB, "seq", 1001).is_some());
    assert!(store.full_size_image(TAB, "seq", 1002).is_none());
    assert!(h.engine.ops().snapshot().is_empty());
}

#[tokio::test]
async fn frame_prompts_resolve_with_documented_precedence() {
    let payload = SequencePayload {
        prompt: "global".into(),
        frame_prompts: vec!["local one".into(), "local two".into()],
        ..SequencePayload::default()
    };
    let graph = Graph {
        nodes: vec![
            Node::new(
                "prompt",
                NodeKind::Prompt,
                text_value(r#"[{"frameNumber":1,"prompt":"upstream one"}]"#),
            ),
            Node::new("seq", NodeKind::SequenceGenerator, sequence_value(&payload)),
        ],
        connections: vec![Connection::new("prompt", "seq")],
    };
    let h = Harness::new(graph, MockService::new());

    h.engine
        .run_all_frames(TAB, "seq", &AbortHandle::new())
        .await
        .unwrap();

    assert_eq!(h.service.image_prompts(), vec!["upstream one", "local two"]);
    assert_eq!(
        h.frame_statuses("seq"),
        vec![FrameStatus::Done, FrameStatus::Done]
    );
}

#[tokio::test]
async fn editor_input_images_are_cached_at_input_offsets() {
    let payload = SequencePayload {
        frame_prompts: vec!["repaint the sky".into()],
        ..SequencePayload::default()
    };
    let graph = Graph {
        nodes: vec![
            Node::new("input", NodeKind::ImageInput, image_input_value()),
            Node::new("editor", NodeKind::ImageEditor, sequence_value(&payload)),
        ],
        connections: vec![Connection::new("input", "editor")],
    };
    let h = Harness::new(graph, MockService::new());

    h.engine
        .run_all_frames(TAB, "editor", &AbortHandle::new())
        .await
        .unwrap();

    // Input-A slots are 1-based; offset 0 stays reserved for the primary
    // output.
    let store = h.engine.store();
    assert!(store.full_size_image(TAB, "editor", 1).is_some());
    assert!(store.full_size_image(TAB, "editor", 1000).is_some());
    assert_eq!(h.frame_statuses("editor"), vec![FrameStatus::Done]);
}

#[tokio::test]
async fn editor_without_an_input_image_fails_validation() {
    let payload = SequencePayload {
        frame_prompts: vec!["repaint".into()],
        ..SequencePayload::default()
    };
    let graph = Graph {
        nodes: vec![Node::new(
            "editor",
            NodeKind::ImageEditor,
            sequence_value(&payload),
        )],
        connections: vec![],
    };
    let h = Harness::new(graph, MockService::new());

    let err = h
        .engine
        .run_all_frames(TAB, "editor", &AbortHandle::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(h.frame_statuses("editor"), vec![FrameStatus::Error]);
    assert!(h.engine.ops().snapshot().is_empty());
}

#[tokio::test]
async fn failing_frame_stops_the_run_and_resets_queued_slots() {
    let payload = SequencePayload {
        prompt: "storm".into(),
        frame_prompts: vec!["a".into(), "b".into(), "c".into()],
        ..SequencePayload::default()
    };
    let graph = Graph {
        nodes: vec![Node::new(
            "seq",
            NodeKind::SequenceGenerator,
            sequence_value(&payload),
        )],
        connections: vec![],
    };
    let h = Harness::new(graph, MockService::failing_images());

    let err = h
        .engine
        .run_all_frames(TAB, "seq", &AbortHandle::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Remote { .. }));
    assert_eq!(
        h.frame_statuses("seq"),
        vec![FrameStatus::Error, FrameStatus::Idle, FrameStatus::Idle]
    );
    assert!(h.engine.ops().snapshot().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_edit_mid_run_still_clears_the_operation_marker() {
    let payload = SequencePayload {
        frame_prompts: vec!["a".into(), "b".into()],
        ..SequencePayload::default()
    };
    let graph = Graph {
        nodes: vec![Node::new(
            "seq",
            NodeKind::SequenceGenerator,
            sequence_value(&payload),
        )],
        connections: vec![],
    };
    let h = Harness::new(graph, MockService::gated_at(0));

    let engine = h.engine.clone();
    let run =
        tokio::spawn(async move { engine.run_all_frames(TAB, "seq", &AbortHandle::new()).await });

    h.service.started.notified().await;
    assert!(h.engine.ops().contains("seq"));

    // A UI edit replaces the stored value with something unparseable while
    // the first frame is still in flight.
    h.engine
        .store()
        .update_node(TAB, "seq", |_| Ok("not json".into()), None)
        .unwrap();
    h.service.gate.notify_one();

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
    assert!(h.engine.ops().snapshot().is_empty());
}

#[tokio::test]
async fn selected_frames_run_in_ascending_order() {
    let payload = SequencePayload {
        frame_prompts: vec!["f1".into(), "f2".into(), "f3".into(), "f4".into()],
        ..SequencePayload::default()
    };
    let graph = Graph {
        nodes: vec![Node::new(
            "seq",
            NodeKind::SequenceGenerator,
            sequence_value(&payload),
        )],
        connections: vec![],
    };
    let h = Harness::new(graph, MockService::new());

    h.engine
        .run_selected_frames(TAB, "seq", vec![3, 1, 3], &AbortHandle::new())
        .await
        .unwrap();

    assert_eq!(h.service.image_prompts(), vec!["f2", "f4"]);
    assert_eq!(
        h.frame_statuses("seq"),
        vec![
            FrameStatus::Idle,
            FrameStatus::Done,
            FrameStatus::Idle,
            FrameStatus::Done,
        ]
    );
}

#[tokio::test]
async fn sequence_auto_download_uses_the_frame_filename() {
    let payload = SequencePayload {
        frame_prompts: vec!["first".into()],
        auto_download: true,
        ..SequencePayload::default()
    };
    let graph = Graph {
        nodes: vec![Node::new(
            "seq",
            NodeKind::SequenceGenerator,
            sequence_value(&payload),
        )],
        connections: vec![],
    };
    let h = Harness::new(graph, MockService::new());

    h.engine
        .run_all_frames(TAB, "seq", &AbortHandle::new())
        .await
        .unwrap();

    let files = h.downloads.files.lock().unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].0.starts_with("Frame_001_seq_gen_"));
    assert_eq!(files[0].1, DownloadKind::Image);
}

#[tokio::test]
async fn sequence_run_with_no_frames_is_a_validation_error() {
    let graph = Graph {
        nodes: vec![Node::new("seq", NodeKind::SequenceGenerator, "{}")],
        connections: vec![],
    };
    let h = Harness::new(graph, MockService::new());

    let err = h
        .engine
        .run_all_frames(TAB, "seq", &AbortHandle::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(h.service.calls().is_empty());
}
