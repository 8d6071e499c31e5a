//! Maintains the map `(application, discardable?) -> graph-URI`, minting
//! provenance graphs and their metadata-graphs on first use, de-duplicating
//! agent resources, and implementing the graph-splitting mechanism that
//! keeps `nao:maintainedBy` exact per invariant 5.

use std::collections::{HashMap, HashSet};

use log::debug;
use oxigraph::model::{GraphName, NamedNode, Quad};
use oxigraph::store::Store;
use parking_lot::Mutex;

use crate::consts::{
    NAO_AGENT, NAO_CREATED, NAO_DISCARDABLE_INSTANCE_BASE, NAO_IDENTIFIER, NAO_INSTANCE_BASE,
    NAO_MAINTAINED_BY, RDF_TYPE,
};
use crate::errors::Result;
use crate::uri;

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct RegistryKey {
    app: String,
    discardable: bool,
}

struct Entry {
    graph: NamedNode,
    metadata_graph: NamedNode,
    maintainers: HashSet<String>,
}

pub struct GraphRegistry {
    state: Mutex<Inner>,
}

struct Inner {
    by_key: HashMap<RegistryKey, NamedNode>,
    by_graph: HashMap<NamedNode, Entry>,
    agents: HashMap<String, NamedNode>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        GraphRegistry {
            state: Mutex::new(Inner {
                by_key: HashMap::new(),
                by_graph: HashMap::new(),
                agents: HashMap::new(),
            }),
        }
    }

    /// Loads existing graphs and their `nao:maintainedBy` links from `store`,
    /// and merges any duplicate agent resources sharing a `nao:identifier`.
    pub fn rebuild(&self, store: &Store) -> Result<()> {
        let mut inner = self.state.lock();
        inner.by_key.clear();
        inner.by_graph.clear();
        inner.agents.clear();

        let mut agents_by_identifier: HashMap<String, Vec<NamedNode>> = HashMap::new();
        for quad in store
            .quads_for_pattern(None, Some(RDF_TYPE), Some(NAO_AGENT.into()), None)
            .filter_map(std::result::Result::ok)
        {
            if let oxigraph::model::NamedOrBlankNode::NamedNode(agent) = quad.subject {
                if let Some(identifier) = store
                    .quads_for_pattern(Some(agent.as_ref().into()), Some(NAO_IDENTIFIER), None, None)
                    .filter_map(std::result::Result::ok)
                    .find_map(|q| match q.object {
                        oxigraph::model::Term::Literal(l) => Some(l.value().to_string()),
                        _ => None,
                    })
                {
                    agents_by_identifier.entry(identifier).or_default().push(agent);
                }
            }
        }
        for (identifier, mut agents) in agents_by_identifier {
            agents.sort();
            inner.agents.insert(identifier, agents[0].clone());
        }

        for (marker, discardable) in [
            (NAO_INSTANCE_BASE, false),
            (NAO_DISCARDABLE_INSTANCE_BASE, true),
        ] {
            for quad in store
                .quads_for_pattern(None, Some(RDF_TYPE), Some(marker.into()), None)
                .filter_map(std::result::Result::ok)
            {
                let oxigraph::model::NamedOrBlankNode::NamedNode(graph) = quad.subject else {
                    continue;
                };
                // the marker quad itself lives in the metadata-graph, so its
                // own graph_name recovers the metadata-graph URI.
                let GraphName::NamedNode(metadata_graph) = quad.graph_name else {
                    continue;
                };
                let maintainers: HashSet<String> = store
                    .quads_for_pattern(
                        Some(graph.as_ref().into()),
                        Some(NAO_MAINTAINED_BY),
                        None,
                        Some(GraphName::NamedNode(metadata_graph.clone()).as_ref()),
                    )
                    .filter_map(std::result::Result::ok)
                    .filter_map(|q| match q.object {
                        oxigraph::model::Term::NamedNode(n) => Some(n.as_str().to_string()),
                        _ => None,
                    })
                    .collect();
                for app in &maintainers {
                    inner.by_key.insert(
                        RegistryKey {
                            app: app.clone(),
                            discardable,
                        },
                        graph.clone(),
                    );
                }
                inner.by_graph.insert(
                    graph.clone(),
                    Entry {
                        graph: graph.clone(),
                        metadata_graph,
                        maintainers,
                    },
                );
            }
        }
        Ok(())
    }

    /// Returns the metadata-graph backing `graph`, if `graph` is known.
    pub fn metadata_graph_of(&self, graph: &NamedNode) -> Option<NamedNode> {
        self.state.lock().by_graph.get(graph).map(|e| e.metadata_graph.clone())
    }

    /// Returns the maintainer set of `graph`, or an empty set if unknown.
    pub fn maintainers(&self, graph: &NamedNode) -> HashSet<String> {
        self.state
            .lock()
            .by_graph
            .get(graph)
            .map(|e| e.maintainers.clone())
            .unwrap_or_default()
    }

    /// Returns every graph `app` maintains, discardable or not. Used by
    /// `removeAllDataByApplication`, which has no caller-supplied resource set.
    pub fn graphs_for_maintainer(&self, app: &str) -> Vec<NamedNode> {
        self.state
            .lock()
            .by_graph
            .values()
            .filter(|e| e.maintainers.contains(app))
            .map(|e| e.graph.clone())
            .collect()
    }

    /// Picks (or mints) the graph used when `app` alone contributes a new
    /// statement with the given discardability. Does not consider splitting;
    /// callers that need to preserve an existing disjoint maintainer set use
    /// [`GraphRegistry::graph_for_agents`] instead.
    pub fn graph_for(&self, store: &Store, app: &str, discardable: bool, now: chrono::DateTime<chrono::Utc>) -> Result<NamedNode> {
        self.graph_for_agents(store, &[app.to_string()], discardable, now)
    }

    /// Returns the graph whose maintainer set is exactly `agents`, minting a
    /// new graph (and its metadata-graph, type and provenance quads) in a
    /// single transaction if none exists yet.
    pub fn graph_for_agents(
        &self,
        store: &Store,
        agents: &[String],
        discardable: bool,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<NamedNode> {
        let wanted: HashSet<String> = agents.iter().cloned().collect();
        {
            let inner = self.state.lock();
            if let Some((_, entry)) = inner
                .by_graph
                .iter()
                .find(|(_, e)| e.maintainers == wanted)
            {
                return Ok(entry.graph.clone());
            }
        }

        let graph = uri::new_graph_uri();
        let metadata_graph = uri::new_graph_uri();
        let marker = if discardable {
            NAO_DISCARDABLE_INSTANCE_BASE
        } else {
            NAO_INSTANCE_BASE
        };
        let mut quads = vec![Quad::new(
            graph.clone(),
            RDF_TYPE,
            marker,
            GraphName::NamedNode(metadata_graph.clone()),
        )];
        quads.push(Quad::new(
            graph.clone(),
            NAO_CREATED,
            oxigraph::model::Literal::new_typed_literal(
                now.to_rfc3339(),
                oxigraph::model::vocab::xsd::DATE_TIME,
            ),
            GraphName::NamedNode(metadata_graph.clone()),
        ));
        for agent in &wanted {
            let agent_node = self.agent_node(store, agent)?;
            quads.push(Quad::new(
                graph.clone(),
                NAO_MAINTAINED_BY,
                agent_node,
                GraphName::NamedNode(metadata_graph.clone()),
            ));
        }
        for quad in &quads {
            store.insert(quad)?;
        }
        debug!("minted graph {graph} for agents {wanted:?} discardable={discardable}");

        let mut inner = self.state.lock();
        for agent in &wanted {
            inner.by_key.insert(
                RegistryKey {
                    app: agent.clone(),
                    discardable,
                },
                graph.clone(),
            );
        }
        inner.by_graph.insert(
            graph.clone(),
            Entry {
                graph: graph.clone(),
                metadata_graph,
                maintainers: wanted,
            },
        );
        Ok(graph)
    }

    /// Resolves (minting on first use and de-duplicating on identifier) the
    /// `nao:Agent` resource for `identifier`.
    fn agent_node(&self, store: &Store, identifier: &str) -> Result<NamedNode> {
        {
            let inner = self.state.lock();
            if let Some(node) = inner.agents.get(identifier) {
                return Ok(node.clone());
            }
        }
        let node = uri::new_resource_uri();
        store.insert(&Quad::new(
            node.clone(),
            RDF_TYPE,
            NAO_AGENT,
            GraphName::DefaultGraph,
        ))?;
        store.insert(&Quad::new(
            node.clone(),
            NAO_IDENTIFIER,
            oxigraph::model::Literal::new_simple_literal(identifier),
            GraphName::DefaultGraph,
        ))?;
        self.state
            .lock()
            .agents
            .insert(identifier.to_string(), node.clone());
        Ok(node)
    }
}

impl Default for GraphRegistry {
    fn default() -> Self {
        Self::new()
    }
}
