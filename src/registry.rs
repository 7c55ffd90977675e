//! Agent registry: name → definition, resolved at routing time.
//!
//! Forward targets are stored as names rather than object references, so
//! cyclic pipelines (A → B → A, or A → A) work regardless of registration
//! order. Lookups are lock-free via DashMap.

use std::sync::Arc;

use dashmap::DashMap;

use crate::agent::AgentDefinition;
use crate::error::RegistryError;

/// Thread-safe store of agent definitions
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: Arc<DashMap<String, Arc<AgentDefinition>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under its own name
    ///
    /// Definitions are static: re-registering a name is rejected rather than
    /// silently replacing a definition another pipeline may be executing.
    pub fn register(&self, agent: AgentDefinition) -> Result<(), RegistryError> {
        use dashmap::mapref::entry::Entry;

        match self.agents.entry(agent.name().to_string()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateAgent {
                name: agent.name().to_string(),
            }),
            Entry::Vacant(e) => {
                e.insert(Arc::new(agent));
                Ok(())
            }
        }
    }

    /// Resolve an agent by name
    pub fn get(&self, name: &str) -> Option<Arc<AgentDefinition>> {
        self.agents.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Names of all registered agents (unordered)
    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::RoutingRule;

    fn make_agent(name: &str) -> AgentDefinition {
        AgentDefinition::builder(name)
            .outcome("done", RoutingRule::Terminal)
            .handler(|input| Ok(("done".to_string(), input)))
            .build()
            .unwrap()
    }

    #[test]
    fn register_and_get() {
        let registry = AgentRegistry::new();
        registry.register(make_agent("greeter")).unwrap();

        assert!(registry.contains("greeter"));
        assert_eq!(registry.get("greeter").unwrap().name(), "greeter");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn register_rejects_duplicates() {
        let registry = AgentRegistry::new();
        registry.register(make_agent("greeter")).unwrap();

        let result = registry.register(make_agent("greeter"));
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateAgent { name }) if name == "greeter"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn clones_share_the_same_store() {
        let registry = AgentRegistry::new();
        let clone = registry.clone();

        registry.register(make_agent("greeter")).unwrap();
        assert!(clone.contains("greeter"));
    }

    #[test]
    fn names_lists_registered_agents() {
        let registry = AgentRegistry::new();
        registry.register(make_agent("a")).unwrap();
        registry.register(make_agent("b")).unwrap();

        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }
}
