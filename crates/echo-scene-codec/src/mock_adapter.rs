// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Mock adapter for headless testing of ScenePort implementations.
//!
//! MockAdapter tracks scene state in HashMaps without any GPU rendering.
//! Use it to verify delta application logic and epoch semantics.

use std::collections::HashMap;

use echo_scene_port::{
    ApplyError, CameraState, EdgeDef, EdgeKey, HighlightState, LabelAnchor, LabelDef, LabelKey,
    NodeDef, NodeKey, SceneDelta, SceneOp, ScenePort,
};

/// Mock scene adapter for testing.
///
/// Implements `ScenePort` by tracking state in HashMaps.
/// Useful for verifying delta sequences without GPU rendering.
#[derive(Debug, Default)]
pub struct MockAdapter {
    /// Current nodes in the scene.
    pub nodes: HashMap<[u8; 32], NodeDef>,
    /// Current edges in the scene.
    pub edges: HashMap<[u8; 32], EdgeDef>,
    /// Current labels in the scene.
    pub labels: HashMap<[u8; 32], LabelDef>,
    /// Current camera state.
    pub camera: CameraState,
    /// Current highlight state.
    pub highlight: HighlightState,
    /// Last epoch processed per cursor.
    last_epoch_by_cursor: HashMap<[u8; 32], u64>,
    /// Number of render calls.
    pub render_count: u32,
    /// Current viewport dimensions.
    pub viewport: (u32, u32, f32),
    /// Whether dispose has been called.
    pub disposed: bool,
}

impl MockAdapter {
    /// Create a new mock adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of nodes in the scene.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the number of edges in the scene.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get the number of labels in the scene.
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Check if an edge is valid (both endpoints exist).
    pub fn is_edge_valid(&self, edge_key: EdgeKey) -> bool {
        if let Some(edge) = self.edges.get(&edge_key.0) {
            self.nodes.contains_key(&edge.a.0) && self.nodes.contains_key(&edge.b.0)
        } else {
            false
        }
    }

    /// Get node by key.
    pub fn get_node(&self, key: NodeKey) -> Option<&NodeDef> {
        self.nodes.get(&key.0)
    }

    /// Get edge by key.
    pub fn get_edge(&self, key: EdgeKey) -> Option<&EdgeDef> {
        self.edges.get(&key.0)
    }

    /// Get label by key.
    pub fn get_label(&self, key: LabelKey) -> Option<&LabelDef> {
        self.labels.get(&key.0)
    }

    /// Get the last epoch for a cursor.
    pub fn last_epoch(&self, cursor_id: &[u8; 32]) -> Option<u64> {
        self.last_epoch_by_cursor.get(cursor_id).copied()
    }
}

impl ScenePort for MockAdapter {
    fn apply_scene_delta(&mut self, delta: &SceneDelta) -> Result<(), ApplyError> {
        let cursor_id = delta.cursor_id;
        let last_epoch = self.last_epoch_by_cursor.get(&cursor_id).copied();

        // Idempotency check: skip if epoch already processed
        if let Some(last) = last_epoch {
            if delta.epoch <= last {
                return Ok(());
            }
        }

        // Apply operations in order
        for op in &delta.ops {
            match op {
                SceneOp::UpsertNode(node) => {
                    self.nodes.insert(node.key.0, *node);
                }
                SceneOp::RemoveNode { key } => {
                    self.nodes.remove(&key.0);
                    // Remove labels anchored to this node
                    self.labels.retain(|_, label| {
                        if let LabelAnchor::Node { key: anchor_key } = &label.anchor {
                            anchor_key != key
                        } else {
                            true
                        }
                    });
                }
                SceneOp::UpsertEdge(edge) => {
                    self.edges.insert(edge.key.0, *edge);
                }
                SceneOp::RemoveEdge { key } => {
                    self.edges.remove(&key.0);
                }
                SceneOp::UpsertLabel(label) => {
                    self.labels.insert(label.key.0, label.clone());
                }
                SceneOp::RemoveLabel { key } => {
                    self.labels.remove(&key.0);
                }
                SceneOp::Clear => {
                    self.nodes.clear();
                    self.edges.clear();
                    self.labels.clear();
                }
            }
        }

        // Update epoch tracking
        self.last_epoch_by_cursor.insert(cursor_id, delta.epoch);
        Ok(())
    }

    fn set_camera(&mut self, camera: &CameraState) {
        self.camera = *camera;
    }

    fn set_highlight(&mut self, highlight: &HighlightState) {
        self.highlight = highlight.clone();
    }

    fn render(&mut self) {
        self.render_count += 1;
    }

    fn resize(&mut self, width: u32, height: u32, dpr: f32) {
        self.viewport = (width, height, dpr);
    }

    fn reset_cursor(&mut self, cursor_id: &[u8; 32]) {
        self.last_epoch_by_cursor.remove(cursor_id);
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.nodes.clear();
        self.edges.clear();
        self.labels.clear();
        self.last_epoch_by_cursor.clear();
    }
}
