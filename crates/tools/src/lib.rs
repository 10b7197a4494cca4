//! Built-in tool implementations for Delve.
//!
//! The set of tools is closed: [`ToolKind`] names every tool the research
//! agent can call. The registry is assembled once from a [`ToolContext`]
//! holding the shared collaborators (HTTP client, research store).

pub mod final_result;
pub mod wikipedia_search;

use delve_core::research::ResearchStore;
use delve_core::tool::{Tool, ToolRegistry};
use std::sync::Arc;

pub use final_result::FinalResultTool;
pub use wikipedia_search::WikipediaSearchTool;

/// Every built-in tool, with its stable wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    WikipediaSearch,
    FinalResult,
}

impl ToolKind {
    /// Registration order.
    pub const ALL: [ToolKind; 2] = [ToolKind::WikipediaSearch, ToolKind::FinalResult];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::WikipediaSearch => "wikipedia_search",
            ToolKind::FinalResult => "final_result_tool",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Construct the tool for this kind.
    pub fn build(self, ctx: &ToolContext) -> Box<dyn Tool> {
        match self {
            ToolKind::WikipediaSearch => Box::new(WikipediaSearchTool::new(ctx.http.clone())),
            ToolKind::FinalResult => Box::new(FinalResultTool::new(ctx.store.clone())),
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared collaborators the built-in tools need.
#[derive(Clone)]
pub struct ToolContext {
    pub http: reqwest::Client,
    pub store: Arc<dyn ResearchStore>,
}

impl ToolContext {
    pub fn new(store: Arc<dyn ResearchStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            store,
        }
    }
}

/// Create the default tool registry with all built-in tools, in
/// [`ToolKind::ALL`] order.
pub fn default_registry(ctx: &ToolContext) -> ToolRegistry {
    ToolKind::ALL
        .into_iter()
        .fold(ToolRegistry::builder(), |builder, kind| {
            builder.register(kind.build(ctx))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::tool::Lookup;
    use delve_store::InMemoryStore;

    fn ctx() -> ToolContext {
        ToolContext::new(Arc::new(InMemoryStore::new()))
    }

    #[test]
    fn names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("shell"), None);
    }

    #[test]
    fn default_registry_order_and_names() {
        let registry = default_registry(&ctx());
        assert_eq!(registry.names(), vec!["wikipedia_search", "final_result_tool"]);
        assert!(matches!(registry.resolve("final_result_tool"), Lookup::Found(_)));
    }

    #[test]
    fn built_tools_report_their_kind_name() {
        let ctx = ctx();
        for kind in ToolKind::ALL {
            assert_eq!(kind.build(&ctx).name(), kind.name());
        }
    }

    #[test]
    fn definitions_carry_schemas() {
        let defs = default_registry(&ctx()).definitions();
        assert_eq!(defs[0].parameters["required"][0], "query");
        assert!(defs[1].parameters["required"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r == "references"));
    }
}
