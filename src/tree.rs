//! Per-method routing tries.
//!
//! One [`Tree`] exists per registered HTTP method. Registration walks the
//! trie segment by segment, rejecting any ambiguity outright as a
//! [`RouteConflict`]; lookup resolves a request path to the registered
//! chain plus its extracted parameters. Trees are built before serving
//! starts and are read-only afterwards, so the lookup path takes no
//! locks and nodes carry no per-request state.

use std::sync::Arc;

use ahash::{HashMap, HashMapExt as _};

use crate::error::RouteConflict;
use crate::handler::HandlerChain;
use crate::path::{Param, Params, Segment, parse_pattern, split};

/// One trie level for one pattern segment.
///
/// Literal children are keyed by exact segment text; at most one wild
/// child (parameter or catch-all) exists per node. A node may be a pure
/// structural waypoint: present in the trie without being a registered
/// route itself.
#[derive(Debug)]
struct Node {
    segment: Segment,
    /// Canonical path of this node from the root, for diagnostics.
    path: String,
    /// Registered full pattern, if this node is itself a route.
    pattern: Option<Arc<str>>,
    chain: Option<HandlerChain>,
    children: HashMap<String, Node>,
    wild: Option<Box<Node>>,
}

impl Node {
    fn root() -> Self {
        Self::new(Segment::Literal(String::new()), "/".to_owned())
    }

    fn new(segment: Segment, path: String) -> Self {
        Self {
            segment,
            path,
            pattern: None,
            chain: None,
            children: HashMap::new(),
            wild: None,
        }
    }

    fn insert(
        &mut self,
        segments: &[Segment],
        position: usize,
        pattern: &Arc<str>,
        chain: &HandlerChain,
    ) -> Result<(), RouteConflict> {
        let Some(segment) = segments.get(position) else {
            // Terminal position: claim the node, or reject the duplicate.
            if let Some(existing) = &self.pattern {
                return Err(RouteConflict::Duplicate {
                    pattern: pattern.to_string(),
                    existing: existing.to_string(),
                });
            }
            self.pattern = Some(pattern.clone());
            self.chain = Some(chain.clone());
            return Ok(());
        };

        if segment.is_catch_all() && !self.children.is_empty() {
            return Err(RouteConflict::CatchAllSiblings {
                pattern: pattern.to_string(),
                prefix: self.path.clone(),
            });
        }

        if let Some(wild) = &self.wild {
            if wild.segment.is_catch_all() && !segment.is_wild() {
                return Err(RouteConflict::CatchAllSiblings {
                    pattern: pattern.to_string(),
                    prefix: wild.path.clone(),
                });
            }
            if segment.is_wild() && wild.segment != *segment {
                return Err(RouteConflict::WildcardMismatch {
                    pattern: pattern.to_string(),
                    segment: segment.token(),
                    existing_segment: wild.segment.token(),
                    prefix: wild.path.clone(),
                });
            }
        }

        if segment.is_catch_all() && position + 1 != segments.len() {
            return Err(RouteConflict::CatchAllNotLast {
                pattern: pattern.to_string(),
            });
        }

        let child_path = self.child_path(segment);
        let child = match segment {
            Segment::Literal(text) => self
                .children
                .entry(text.clone())
                .or_insert_with(|| Self::new(segment.clone(), child_path)),
            Segment::Param(_) | Segment::CatchAll(_) => {
                &mut **self
                    .wild
                    .get_or_insert_with(|| Box::new(Self::new(segment.clone(), child_path)))
            }
        };
        child.insert(segments, position + 1, pattern, chain)
    }

    /// Resolve request segments to a matching node.
    ///
    /// A node is a match candidate once all segments are consumed, or as
    /// soon as its own segment is a catch-all (which consumes the rest
    /// implicitly). A candidate that is a pure waypoint yields no match;
    /// there is no backtracking. An exact literal child always takes
    /// precedence over the wild child at the same position.
    fn lookup(&self, segments: &[&str], position: usize) -> Option<&Self> {
        if position == segments.len() || self.segment.is_catch_all() {
            return self.chain.is_some().then_some(self);
        }
        let segment = *segments.get(position)?;
        let child = self.children.get(segment).or(self.wild.as_deref())?;
        child.lookup(segments, position + 1)
    }

    fn child_path(&self, segment: &Segment) -> String {
        let token = segment.token();
        if self.path == "/" {
            format!("/{token}")
        } else {
            format!("{}/{token}", self.path)
        }
    }
}

/// The resolution of a request path against a [`Tree`].
#[derive(Debug)]
pub(crate) struct RouteMatch {
    pub(crate) chain: HandlerChain,
    pub(crate) params: Params,
    /// The registered pattern that matched.
    pub(crate) pattern: Arc<str>,
}

/// The routing trie of a single HTTP method.
#[derive(Debug)]
pub(crate) struct Tree {
    root: Node,
}

impl Tree {
    pub(crate) fn new() -> Self {
        Self { root: Node::root() }
    }

    pub(crate) fn add_route(
        &mut self,
        pattern: &str,
        chain: HandlerChain,
    ) -> Result<(), RouteConflict> {
        let segments = parse_pattern(pattern);
        let pattern: Arc<str> = Arc::from(pattern);
        self.root.insert(&segments, 0, &pattern, &chain)
    }

    pub(crate) fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let segments = split(path);
        let node = self.root.lookup(&segments, 0)?;
        let (chain, pattern) = match (&node.chain, &node.pattern) {
            (Some(chain), Some(pattern)) => (chain.clone(), pattern.clone()),
            _ => return None,
        };
        let params = bind_params(&pattern, &segments);
        Some(RouteMatch {
            chain,
            params,
            pattern,
        })
    }
}

/// Bind parameters by walking the *registered pattern* in lockstep with
/// the request segments: a parameter token binds the request segment at
/// its position, a named catch-all binds the remaining request segments
/// re-joined with `/`. Deriving bindings from the pattern after the fact
/// keeps the trie nodes free of per-request state.
fn bind_params(pattern: &str, request: &[&str]) -> Params {
    let mut params = Params::default();
    for (index, segment) in parse_pattern(pattern).into_iter().enumerate() {
        match segment {
            Segment::Param(name) => {
                if let Some(value) = request.get(index) {
                    params.push(Param::new(name, *value));
                }
            }
            Segment::CatchAll(name) => {
                if !name.is_empty() && index <= request.len() {
                    params.push(Param::new(name, request[index..].join("/")));
                }
            }
            Segment::Literal(_) => {}
        }
    }
    params
}
