use std::{fmt::Debug, sync::Arc};

use bevy::platform::collections::HashMap;
use smallvec::SmallVec;

use crate::parameters::Parameters;

/// 过渡条件谓词
///
/// Transition predicate. Shared through an [`Arc`] so that it can be removed
/// again by identity.
pub type Predicate = Arc<dyn Fn(&TransitionContext) -> bool + Send + Sync>;

/// Shares a closure as a [`Predicate`], keep the returned handle to remove it later.
pub fn predicate(f: impl Fn(&TransitionContext) -> bool + Send + Sync + 'static) -> Predicate {
    Arc::new(f)
}

/// 条件求值时可读取的上下文
///
/// Read-only view handed to every predicate
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    /// 当前状态名称
    ///
    /// Name of the current state
    pub state: &'a str,
    /// 当前状态的退出时间计时（秒）
    ///
    /// Exit-time seconds accumulated by the current state
    pub elapsed: f32,
    pub parameters: &'a Parameters,
}

impl TransitionContext<'_> {
    pub fn parameter(&self, name: &str) -> f32 {
        self.parameters.get(name)
    }
}

/// 过渡条件
///
/// A predicate and its priority. Within one edge, conditions are evaluated in
/// descending priority and all of them must hold.
#[derive(Clone)]
pub struct TransitionCondition {
    predicate: Predicate,
    pub priority: i32,
}

impl TransitionCondition {
    pub fn new(
        predicate: impl Fn(&TransitionContext) -> bool + Send + Sync + 'static,
        priority: i32,
    ) -> Self {
        Self {
            predicate: Arc::new(predicate),
            priority,
        }
    }

    /// Wraps an already shared predicate, keeping its identity.
    pub fn from_predicate(predicate: Predicate, priority: i32) -> Self {
        Self {
            predicate,
            priority,
        }
    }

    /// 当前状态运行至少 `seconds` 秒后成立（需要开启退出时间）
    ///
    /// Holds once the current state has run for `seconds`. Needs the state to
    /// track exit time.
    pub fn exit_time(seconds: f32, priority: i32) -> Self {
        Self::new(move |ctx| ctx.elapsed >= seconds, priority)
    }

    pub fn parameter_above(name: impl Into<String>, threshold: f32, priority: i32) -> Self {
        let name = name.into();
        Self::new(move |ctx| ctx.parameter(&name) > threshold, priority)
    }

    pub fn parameter_below(name: impl Into<String>, threshold: f32, priority: i32) -> Self {
        let name = name.into();
        Self::new(move |ctx| ctx.parameter(&name) < threshold, priority)
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Identity comparison, two equivalent closures are still different predicates.
    pub fn is(&self, predicate: &Predicate) -> bool {
        Arc::ptr_eq(&self.predicate, predicate)
    }

    pub fn evaluate(&self, ctx: &TransitionContext) -> bool {
        (self.predicate)(ctx)
    }
}

impl Debug for TransitionCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionCondition")
            .field("predicate", &Arc::as_ptr(&self.predicate).cast::<()>())
            .field("priority", &self.priority)
            .finish()
    }
}

/// 过渡边 from -> to
///
/// A directed edge towards `to`, guarded by its conditions
#[derive(Debug, Clone)]
pub struct TransitionEdge {
    pub to: String,
    pub conditions: SmallVec<[TransitionCondition; 2]>,
}

impl TransitionEdge {
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            conditions: SmallVec::new(),
        }
    }

    /// 所有条件都成立时返回 true，按顺序短路求值
    ///
    /// True when every condition holds, short-circuiting in list order
    pub fn is_satisfied(&self, ctx: &TransitionContext) -> bool {
        self.conditions.iter().all(|c| c.evaluate(ctx))
    }

    fn sorted(&self) -> Self {
        let mut edge = self.clone();
        edge.conditions.sort_by(|a, b| b.priority.cmp(&a.priority));
        edge
    }
}

/// 过渡表 from -> [edge]
///
/// Transition table. Edges leaving one state keep their insertion order;
/// states referenced here do not have to be registered yet.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable(HashMap<String, Vec<TransitionEdge>>);

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn edge_mut(&mut self, from: &str, to: &str) -> &mut TransitionEdge {
        let edges = self.0.entry(from.to_string()).or_default();
        let index = match edges.iter().position(|e| e.to == to) {
            Some(index) => index,
            None => {
                edges.push(TransitionEdge::new(to));
                edges.len() - 1
            }
        };
        &mut edges[index]
    }

    /// Declares the edge without any condition. Such an edge allows forced
    /// `transition_to` but never fires on its own.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edge_mut(from, to);
    }

    pub fn add_condition(&mut self, from: &str, to: &str, condition: TransitionCondition) {
        self.edge_mut(from, to).conditions.push(condition);
    }

    /// 按谓词身份移除条件
    ///
    /// Removes every condition on the edge whose predicate is `predicate`
    /// (pointer identity). Returns whether anything was removed.
    pub fn remove_condition(&mut self, from: &str, to: &str, predicate: &Predicate) -> bool {
        let Some(edge) = self
            .0
            .get_mut(from)
            .and_then(|edges| edges.iter_mut().find(|e| e.to == to))
        else {
            return false;
        };
        let before = edge.conditions.len();
        edge.conditions.retain(|c| !c.is(predicate));
        before != edge.conditions.len()
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.0
            .get(from)
            .is_some_and(|edges| edges.iter().any(|e| e.to == to))
    }

    pub fn edges_from(&self, from: &str) -> &[TransitionEdge] {
        self.0.get(from).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 计算候选过渡列表
    ///
    /// Candidate edges leaving `from`: insertion order across edges, conditions
    /// sorted by descending priority inside each edge, empty edges dropped.
    pub fn candidates(&self, from: &str) -> Vec<TransitionEdge> {
        self.edges_from(from)
            .iter()
            .filter(|e| !e.conditions.is_empty())
            .map(TransitionEdge::sorted)
            .collect()
    }

    /// Every `(from, to)` pair in the table.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().flat_map(|(from, edges)| {
            edges.iter().map(move |e| (from.as_str(), e.to.as_str()))
        })
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}
