//! Per-upstream-client session state for the HTTP proxy transport.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use super::{PromptRoute, ResourceRoute, ToolRoute};

/// The four route maps rebuilt after each successful listing.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    pub tools: HashMap<String, ToolRoute>,
    pub prompts: HashMap<String, PromptRoute>,
    pub resources: HashMap<String, ResourceRoute>,
    pub resource_templates: HashMap<String, ResourceRoute>,
}

/// Sessions keyed by the opaque id handed out on `initialize`.
///
/// Ids are 128 bits rendered as 32 lowercase hex characters. Sessions are
/// never expired; the upstream discards them with an HTTP DELETE.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, RouteTable>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session and return its id.
    pub fn create(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        self.sessions
            .write()
            .expect("session lock poisoned")
            .insert(id.clone(), RouteTable::default());
        id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions
            .read()
            .expect("session lock poisoned")
            .contains_key(id)
    }

    pub fn remove(&self, id: &str) {
        self.sessions
            .write()
            .expect("session lock poisoned")
            .remove(id);
    }

    pub fn set_tool_routes(&self, id: &str, routes: HashMap<String, ToolRoute>) {
        if let Some(session) = self
            .sessions
            .write()
            .expect("session lock poisoned")
            .get_mut(id)
        {
            session.tools = routes;
        }
    }

    pub fn set_prompt_routes(&self, id: &str, routes: HashMap<String, PromptRoute>) {
        if let Some(session) = self
            .sessions
            .write()
            .expect("session lock poisoned")
            .get_mut(id)
        {
            session.prompts = routes;
        }
    }

    pub fn set_resource_routes(&self, id: &str, routes: HashMap<String, ResourceRoute>) {
        if let Some(session) = self
            .sessions
            .write()
            .expect("session lock poisoned")
            .get_mut(id)
        {
            session.resources = routes;
        }
    }

    pub fn set_resource_template_routes(&self, id: &str, routes: HashMap<String, ResourceRoute>) {
        if let Some(session) = self
            .sessions
            .write()
            .expect("session lock poisoned")
            .get_mut(id)
        {
            session.resource_templates = routes;
        }
    }

    pub fn tool_route(&self, id: &str, name: &str) -> Option<ToolRoute> {
        self.sessions
            .read()
            .expect("session lock poisoned")
            .get(id)
            .and_then(|session| session.tools.get(name).cloned())
    }

    pub fn prompt_route(&self, id: &str, name: &str) -> Option<PromptRoute> {
        self.sessions
            .read()
            .expect("session lock poisoned")
            .get(id)
            .and_then(|session| session.prompts.get(name).cloned())
    }

    /// Look up a resource route, consulting the resource map first and the
    /// template map second.
    pub fn resource_route(&self, id: &str, uri: &str) -> Option<ResourceRoute> {
        let sessions = self.sessions.read().expect("session lock poisoned");
        let session = sessions.get(id)?;
        session
            .resources
            .get(uri)
            .or_else(|| session.resource_templates.get(uri))
            .cloned()
    }
}
