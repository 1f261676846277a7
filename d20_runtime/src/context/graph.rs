//! Debug view of the context tree and everything hanging off it.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write;

use super::{Context, ContextKey, ContextKind};
use crate::entity::Entity;
use crate::event::EventRegistry;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Context,
    Entity,
    Component,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EdgeKind {
    /// Parent context to child context.
    Child,
    /// Entity context to the entity it dispatches against.
    Binds,
    /// Entity to component.
    Owns,
    /// Registry owner to event; labelled with the handler count.
    Handles,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub label: Option<String>,
}

/// Dependency graph of a context subtree. Has no effect on dispatch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl ContextGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.edges.iter().filter(move |e| e.from == id)
    }

    /// Render as Graphviz DOT.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph context {\n");

        for node in &self.nodes {
            let shape = match node.kind {
                NodeKind::Context => "box",
                NodeKind::Entity => "ellipse",
                NodeKind::Component => "component",
                NodeKind::Event => "note",
            };
            let _ = writeln!(
                out,
                "  \"{}\" [label=\"{}\", shape={}];",
                escape(&node.id),
                escape(&node.label),
                shape
            );
        }

        for edge in &self.edges {
            match &edge.label {
                Some(label) => {
                    let _ = writeln!(
                        out,
                        "  \"{}\" -> \"{}\" [label=\"{}\"];",
                        escape(&edge.from),
                        escape(&edge.to),
                        escape(label)
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "  \"{}\" -> \"{}\";",
                        escape(&edge.from),
                        escape(&edge.to)
                    );
                }
            }
        }

        out.push_str("}\n");
        out
    }

    fn add_node(&mut self, id: String, kind: NodeKind, label: String) -> bool {
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.nodes.push(GraphNode { id, kind, label });
        true
    }

    fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind, label: Option<String>) {
        self.edges.push(GraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            kind,
            label,
        });
    }

    fn add_registry(&mut self, owner: &str, registry: &EventRegistry) {
        for (event, count) in registry.summary() {
            let id = format!("event:{event}");
            self.add_node(id.clone(), NodeKind::Event, event.to_string());
            self.add_edge(owner, &id, EdgeKind::Handles, Some(count.to_string()));
        }
    }

    fn add_entity(&mut self, entity: &Entity) -> String {
        let id = format!("entity:{}", entity.id());
        if !self.add_node(id.clone(), NodeKind::Entity, entity.id().to_string()) {
            return id;
        }

        self.add_registry(&id, entity.events());

        for (index, component) in entity.components().iter().enumerate() {
            let component_id = format!("component:{}:{index}", entity.id());
            self.add_node(
                component_id.clone(),
                NodeKind::Component,
                component.name().to_string(),
            );
            self.add_edge(&id, &component_id, EdgeKind::Owns, None);
            self.add_registry(&component_id, component.events());
        }

        id
    }
}

/// Escape a DOT quoted string.
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn context_id(key: ContextKey) -> String {
    format!("context:{key}")
}

impl Context {
    /// Walk this context's subtree and collect contexts, bound entities,
    /// components and the events each of them handles.
    pub fn generate_graph(&self) -> Result<ContextGraph> {
        let mut graph = ContextGraph::default();
        let mut pending = vec![self.key()];

        while let Some(key) = pending.pop() {
            let (kind, children, patches) = {
                let tree = self.game().contexts().borrow();
                let node = tree.get(key)?;
                (node.kind.clone(), node.children.clone(), node.patches.clone())
            };

            let id = context_id(key);
            graph.add_node(id.clone(), NodeKind::Context, kind.label());
            graph.add_registry(&id, &patches);

            if let ContextKind::Entity(entity) = &kind {
                let entity_id = graph.add_entity(entity);
                graph.add_edge(&id, &entity_id, EdgeKind::Binds, None);
            }

            for child in &children {
                graph.add_edge(&id, &context_id(*child), EdgeKind::Child, None);
            }

            // Reverse so children are visited in creation order.
            pending.extend(children.into_iter().rev());
        }

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventToken, HandlerReturn};
    use crate::Game;

    const LOOK: EventToken<(), ()> = EventToken::new("test.look");

    #[test]
    fn test_graph_of_module_tree() {
        let config = d20_state::RuntimeConfig {
            retain_dispatch_contexts: true,
            ..Default::default()
        };
        let game = Game::with_config(config);
        let root = game.root_context();
        let entity = root.create_entity();

        entity
            .register_handler(LOOK, |_, _| Ok(HandlerReturn::Empty))
            .unwrap();
        root.add_patch(LOOK, |_, _| Ok(HandlerReturn::Empty)).unwrap();
        root.call_event(&entity, LOOK, ()).unwrap().invoke().unwrap();

        let graph = root.generate_graph().unwrap();
        let root_id = context_id(root.key());
        let entity_id = format!("entity:{}", entity.id());

        assert_eq!(graph.node(&root_id).unwrap().label, "root");
        assert!(graph.node(&entity_id).is_some());
        assert!(graph.node("event:test.look").is_some());

        let children: Vec<_> = graph
            .edges_from(&root_id)
            .filter(|e| e.kind == EdgeKind::Child)
            .collect();
        assert_eq!(children.len(), 1);

        let binds = graph
            .edges_from(&children[0].to)
            .find(|e| e.kind == EdgeKind::Binds)
            .unwrap();
        assert_eq!(binds.to, entity_id);

        let handles = graph
            .edges_from(&entity_id)
            .find(|e| e.kind == EdgeKind::Handles)
            .unwrap();
        assert_eq!(handles.label.as_deref(), Some("1"));

        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph context {"));
        assert!(dot.contains("test.look"));
    }

    #[test]
    fn test_dot_escapes_quotes() {
        const QUOTED: EventToken<(), ()> = EventToken::new("say \"hi\" \\ bye");

        let game = Game::new();
        let root = game.root_context();
        root.add_patch(QUOTED, |_, _| Ok(HandlerReturn::Empty)).unwrap();

        let dot = root.generate_graph().unwrap().to_dot();
        assert!(dot.contains("[label=\"say \\\"hi\\\" \\\\ bye\", shape=note]"));
        assert!(!dot.contains("\"say \"hi"));
    }

    #[test]
    fn test_graph_of_stale_context_fails() {
        let game = Game::new();
        let scope = game.root_context().create_child_context().unwrap();
        let handle = scope.context().clone();
        drop(scope);

        assert!(handle.generate_graph().is_err());
    }
}
