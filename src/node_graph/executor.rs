// Chain execution: run a connected subgraph of nodes in dependency order.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Local;

use crate::abort::AbortHandle;
use crate::download::{output_filename, DownloadSink};
use crate::error::EngineError;
use crate::models::schema::{ActiveOperation, NodeKind};
use crate::node_graph::processors::{get_processor, ProcessorContext};
use crate::node_graph::state::WorkingSet;
use crate::node_graph::upstream::{resolve_upstream, UpstreamSources};
use crate::ops::ActiveOperations;
use crate::services::GenerationService;
use crate::storage::{CacheSink, TabStore};

static RUN_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainDirection {
    /// Visit all upstream dependencies first, ending at the start node.
    Backward,
    /// Follow the outbound connection chain from the start node.
    Forward,
}

/// The generation engine: chain execution here, sequence runs in
/// `sequence.rs`. One engine instance is shared by every tab.
pub struct Engine {
    pub(crate) service: Arc<dyn GenerationService>,
    pub(crate) store: Arc<TabStore>,
    pub(crate) downloads: Arc<dyn DownloadSink>,
    pub(crate) ops: ActiveOperations,
    /// One chain run at a time, process-wide. Set at run start, cleared in
    /// every exit path.
    chain_busy: AtomicBool,
}

impl Engine {
    pub fn new(
        service: Arc<dyn GenerationService>,
        store: Arc<TabStore>,
        downloads: Arc<dyn DownloadSink>,
    ) -> Self {
        Self {
            service,
            store,
            downloads,
            ops: ActiveOperations::new(),
            chain_busy: AtomicBool::new(false),
        }
    }

    pub fn ops(&self) -> &ActiveOperations {
        &self.ops
    }

    pub fn store(&self) -> &TabStore {
        &self.store
    }

    pub fn is_chain_running(&self) -> bool {
        self.chain_busy.load(Ordering::SeqCst)
    }

    /// Execute a chain starting at `start_node_id`. A request arriving while
    /// another chain is running is a no-op.
    pub async fn execute_chain(
        &self,
        tab_id: &str,
        start_node_id: &str,
        direction: ChainDirection,
        abort: &AbortHandle,
    ) -> Result<(), EngineError> {
        if self.chain_busy.swap(true, Ordering::SeqCst) {
            log::warn!(
                "chain execution already in progress; request for '{}' ignored",
                start_node_id
            );
            return Ok(());
        }
        let result = self
            .execute_chain_inner(tab_id, start_node_id, direction, abort)
            .await;
        self.chain_busy.store(false, Ordering::SeqCst);
        result
    }

    async fn execute_chain_inner(
        &self,
        tab_id: &str,
        start_node_id: &str,
        direction: ChainDirection,
        abort: &AbortHandle,
    ) -> Result<(), EngineError> {
        let run_id = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
        let graph = self
            .store
            .graph_snapshot(tab_id)
            .ok_or_else(|| EngineError::Validation(format!("Unknown tab '{}'", tab_id)))?;
        let tab_name = self.store.tab_name(tab_id).unwrap_or_default();
        let mut working = WorkingSet::from_graph(graph);

        let queue = match direction {
            ChainDirection::Backward => build_backward_queue(&working, start_node_id),
            ChainDirection::Forward => build_forward_queue(&working, start_node_id),
        };
        log::info!(
            "[chain #{run_id}] start node='{}' direction={:?} queue={}",
            start_node_id,
            direction,
            queue.len()
        );

        for node_id in queue {
            // Cancellation is coarse-grained: checked at node boundaries,
            // not mid-processor.
            if abort.is_aborted() {
                log::info!("[chain #{run_id}] aborted before '{}'", node_id);
                break;
            }

            let Some(node) = working.node(&node_id).cloned() else {
                continue;
            };
            if node.kind.is_pass_through() {
                continue;
            }
            let Some(processor) = get_processor(node.kind) else {
                continue;
            };

            let sources = UpstreamSources {
                store: &self.store,
                tab_id,
            };
            let upstream = resolve_upstream(&node_id, &working, &sources)?;

            self.ops.register(ActiveOperation {
                id: node_id.clone(),
                kind: node.kind,
                description: operation_description(node.kind).to_string(),
                tab_id: tab_id.to_string(),
                tab_name: tab_name.clone(),
            });

            let sink = CacheSink::new(&self.store, tab_id, &node_id);
            let ctx = ProcessorContext {
                node: &node,
                upstream: &upstream,
                cache: &sink,
                service: self.service.as_ref(),
            };
            let result = processor.process(&ctx).await;
            // The marker is cleared however the processor settles.
            self.ops.unregister(&node_id);

            match result {
                Ok(output) => {
                    if let Some(value) = output.value {
                        working.update_value(&node_id, value.clone());
                        self.store
                            .update_node(tab_id, &node_id, move |_| Ok(value), None)?;
                    }
                    if let Some(download) = output.download {
                        let filename = output_filename(download.kind, Local::now());
                        self.downloads.download(&download, &filename);
                    }
                }
                Err(err) if err.is_abort() => {
                    log::info!("[chain #{run_id}] aborted at '{}'", node_id);
                    break;
                }
                Err(err) => {
                    log::warn!("[chain #{run_id}] '{}' failed: {}", node_id, err);
                    return Err(err);
                }
            }
        }

        log::info!("[chain #{run_id}] done");
        Ok(())
    }
}

pub(crate) fn operation_description(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::EnhancePrompt => "Enhancing prompt",
        NodeKind::SanitizePrompt => "Sanitizing prompt",
        NodeKind::TranslatePrompt => "Translating prompt",
        NodeKind::DescribeImage => "Describing image",
        NodeKind::AnalyzePrompt => "Analyzing prompt",
        NodeKind::CharacterAnalyzer => "Analyzing character",
        NodeKind::ScriptGenerator => "Generating script",
        NodeKind::CharacterGenerator => "Generating characters",
        NodeKind::ImageOutput => "Generating image",
        NodeKind::ImageEditor => "Editing image",
        NodeKind::SequenceGenerator => "Generating sequence",
        NodeKind::VideoOutput => "Generating video",
        _ => "Processing",
    }
}

/// Depth-first post-order over inbound connections: every dependency is
/// enqueued before its dependents, ending at the start node. A revisit
/// (shared dependency or cycle) is silently treated as already satisfied.
pub fn build_backward_queue(working: &WorkingSet, start: &str) -> Vec<String> {
    let mut queue = Vec::new();
    let mut visited = HashSet::new();
    visit_upstream(working, start, &mut visited, &mut queue);
    queue
}

fn visit_upstream(
    working: &WorkingSet,
    id: &str,
    visited: &mut HashSet<String>,
    queue: &mut Vec<String>,
) {
    if !visited.insert(id.to_string()) {
        return;
    }
    if working.node(id).is_none() {
        return;
    }
    let dependencies: Vec<String> = working
        .inbound(id)
        .map(|c| c.from_node_id.clone())
        .collect();
    for from in dependencies {
        visit_upstream(working, &from, visited, queue);
    }
    queue.push(id.to_string());
}

/// Follow the outbound chain node by node until a node has no outbound
/// connection. Only the first outbound edge per node is followed.
pub fn build_forward_queue(working: &WorkingSet, start: &str) -> Vec<String> {
    let mut queue = Vec::new();
    let mut visited = HashSet::new();
    let mut current = Some(start.to_string());
    while let Some(id) = current {
        if !visited.insert(id.clone()) {
            break;
        }
        if working.node(&id).is_none() {
            break;
        }
        queue.push(id.clone());
        current = working.first_outbound(&id).map(|c| c.to_node_id.clone());
    }
    queue
}
