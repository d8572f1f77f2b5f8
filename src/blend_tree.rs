//! 混合树权重计算
//!
//! Blend tree weight computation.
//!
//! 权重每次更新都会重新计算，节点的 `weight` 不跨帧保留。
//!
//! Weights are derived values, recomputed on every update from the live blend
//! parameter. Both algorithms finish with [`normalize_weights`].

use bevy::math::Vec2;

/// Weight sums at or below this fall back to a uniform distribution.
pub const WEIGHT_EPSILON: f32 = 1e-4;

/// Influence radius used by 2D nodes that do not set one.
pub const DEFAULT_INFLUENCE_RADIUS: f32 = 0.5;

/// 混合树节点
///
/// One clip entry of a blend tree
#[derive(Debug, Clone, PartialEq)]
pub struct BlendNode {
    pub name: String,
    pub clip_name: String,
    /// Position in the normalized `[0, 1]` parameter space of a 1D tree.
    pub position_1d: Option<f32>,
    /// Position in the parameter space of a 2D tree, in the tree's units.
    pub position_2d: Option<Vec2>,
    pub influence_radius: Option<f32>,
    pub weight: f32,
}

impl BlendNode {
    pub fn new(name: impl Into<String>, clip_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clip_name: clip_name.into(),
            position_1d: None,
            position_2d: None,
            influence_radius: None,
            weight: 0.0,
        }
    }

    pub fn at(name: impl Into<String>, clip_name: impl Into<String>, position: f32) -> Self {
        Self {
            position_1d: Some(position),
            ..Self::new(name, clip_name)
        }
    }

    pub fn at_2d(name: impl Into<String>, clip_name: impl Into<String>, position: Vec2) -> Self {
        Self {
            position_2d: Some(position),
            ..Self::new(name, clip_name)
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.influence_radius = Some(radius);
        self
    }
}

/// 将权重归一化，总和为零时均分
///
/// Scales weights so they sum to 1. A sum at or below [`WEIGHT_EPSILON`]
/// gives every node `1 / len` instead, so the pose never freezes at zero.
pub fn normalize_weights(nodes: &mut [BlendNode]) {
    if nodes.is_empty() {
        return;
    }
    let sum: f32 = nodes.iter().map(|n| n.weight).sum();
    if sum.is_nan() || sum <= WEIGHT_EPSILON {
        let uniform = 1.0 / nodes.len() as f32;
        nodes.iter_mut().for_each(|n| n.weight = uniform);
        return;
    }
    nodes.iter_mut().for_each(|n| n.weight /= sum);
}

/// Maps `value` from `[min, max]` onto `[0, 1]` without clamping. A
/// degenerate range maps everything to 0, NaN is read as `min`.
fn normalize_axis(value: f32, min: f32, max: f32) -> f32 {
    let range = max - min;
    if range.is_nan() || range <= f32::EPSILON || value.is_nan() {
        return 0.0;
    }
    (value - min) / range
}

/// `max(0, 1 - distance / radius)`. A non-positive radius only covers the
/// node's own position.
pub fn influence(distance: f32, radius: f32) -> f32 {
    if radius.is_nan() || radius <= 0.0 {
        return if distance <= f32::EPSILON { 1.0 } else { 0.0 };
    }
    (1.0 - distance / radius).max(0.0)
}

/// 一维混合树
///
/// 1D blend tree over `[min_value, max_value]`
#[derive(Debug, Clone, PartialEq)]
pub struct BlendTree1D {
    pub nodes: Vec<BlendNode>,
    pub min_value: f32,
    pub max_value: f32,
}

impl BlendTree1D {
    pub fn new(min_value: f32, max_value: f32) -> Self {
        Self {
            nodes: Vec::new(),
            min_value,
            max_value,
        }
    }

    pub fn with_node(mut self, node: BlendNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Clamps `parameter` into the tree's range and maps it onto `[0, 1]`.
    pub fn normalized(&self, parameter: f32) -> f32 {
        let (min, max) = (self.min_value, self.max_value);
        let clamped = if parameter.is_nan() || parameter < min {
            min
        } else if parameter > max {
            max
        } else {
            parameter
        };
        normalize_axis(clamped, min, max)
    }

    /// 计算节点权重
    ///
    /// Linear blend between the two nodes bracketing the normalized parameter,
    /// clamped to the outermost nodes.
    ///
    /// Nodes are left sorted by position afterwards.
    pub fn compute_weights(&mut self, parameter: f32) {
        let value = self.normalized(parameter);
        self.nodes.iter_mut().for_each(|n| n.weight = 0.0);

        match self.nodes.len() {
            0 => return,
            1 => {
                self.nodes[0].weight = 1.0;
                return;
            }
            _ => {}
        }

        let position = |node: &BlendNode| node.position_1d.unwrap_or(0.0);
        self.nodes
            .sort_by(|a, b| position(a).total_cmp(&position(b)));

        let last = self.nodes.len() - 1;
        if value <= position(&self.nodes[0]) {
            self.nodes[0].weight = 1.0;
        } else if value >= position(&self.nodes[last]) {
            self.nodes[last].weight = 1.0;
        } else if let Some(i) = self
            .nodes
            .windows(2)
            .position(|pair| value >= position(&pair[0]) && value <= position(&pair[1]))
        {
            let lower = position(&self.nodes[i]);
            let span = position(&self.nodes[i + 1]) - lower;
            let progress = if span > f32::EPSILON {
                (value - lower) / span
            } else {
                0.0
            };
            self.nodes[i].weight = 1.0 - progress;
            self.nodes[i + 1].weight = progress;
        }

        normalize_weights(&mut self.nodes);
    }
}

/// 二维混合树
///
/// 2D blend tree with independent axis ranges
#[derive(Debug, Clone, PartialEq)]
pub struct BlendTree2D {
    pub nodes: Vec<BlendNode>,
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

impl BlendTree2D {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            nodes: Vec::new(),
            x_min: min.x,
            x_max: max.x,
            y_min: min.y,
            y_max: max.y,
        }
    }

    pub fn with_node(mut self, node: BlendNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn normalized(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            normalize_axis(point.x, self.x_min, self.x_max),
            normalize_axis(point.y, self.y_min, self.y_max),
        )
    }

    /// Distance-based weights before normalization. Nodes without a 2D
    /// position get 0.
    pub fn assign_raw_weights(&mut self, parameter: Vec2) {
        let point = self.normalized(parameter);
        let ranges = (self.x_min, self.x_max, self.y_min, self.y_max);
        for node in &mut self.nodes {
            node.weight = match node.position_2d {
                Some(position) => {
                    let (x_min, x_max, y_min, y_max) = ranges;
                    let position = Vec2::new(
                        normalize_axis(position.x, x_min, x_max),
                        normalize_axis(position.y, y_min, y_max),
                    );
                    let radius = node.influence_radius.unwrap_or(DEFAULT_INFLUENCE_RADIUS);
                    influence(point.distance(position), radius)
                }
                None => 0.0,
            };
        }
    }

    pub fn compute_weights(&mut self, parameter: Vec2) {
        self.assign_raw_weights(parameter);
        normalize_weights(&mut self.nodes);
    }
}

/// 混合树，一维或二维
///
/// A 1D or 2D blend tree
#[derive(Debug, Clone, PartialEq)]
pub enum BlendTree {
    OneD(BlendTree1D),
    TwoD(BlendTree2D),
}

impl BlendTree {
    pub fn is_1d(&self) -> bool {
        matches!(self, Self::OneD(_))
    }

    pub fn nodes(&self) -> &[BlendNode] {
        match self {
            Self::OneD(tree) => &tree.nodes,
            Self::TwoD(tree) => &tree.nodes,
        }
    }

    pub fn node(&self, name: &str) -> Option<&BlendNode> {
        self.nodes().iter().find(|n| n.name == name)
    }

    /// Weight of the first node called `name`, 0 if there is none.
    pub fn weight(&self, name: &str) -> f32 {
        self.node(name).map(|n| n.weight).unwrap_or(0.0)
    }
}

impl From<BlendTree1D> for BlendTree {
    fn from(tree: BlendTree1D) -> Self {
        Self::OneD(tree)
    }
}

impl From<BlendTree2D> for BlendTree {
    fn from(tree: BlendTree2D) -> Self {
        Self::TwoD(tree)
    }
}
