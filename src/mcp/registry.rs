use std::{collections::HashMap, future::Future, pin::Pin};

use rmcp::ErrorData as McpError;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ReadResourceRequestParam, ReadResourceResult, Resource,
    Tool,
};

use super::server::ReltioMcpServer;

pub type ResourceFuture =
    Pin<Box<dyn Future<Output = Result<ReadResourceResult, McpError>> + Send>>;
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<CallToolResult, McpError>> + Send>>;

pub type ResourceHandler = fn(&ReltioMcpServer, ReadResourceRequestParam) -> ResourceFuture;
pub type ToolHandler = fn(&ReltioMcpServer, CallToolRequestParam) -> ToolFuture;

/// Registry mapping resource URIs and tool names to handler functions.
///
/// Descriptions are kept in registration order so listings are stable.
pub struct Registry {
    resources: HashMap<&'static str, ResourceHandler>,
    tools: HashMap<&'static str, ToolHandler>,
    resource_list: Vec<Resource>,
    tool_list: Vec<Tool>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            resources: HashMap::new(),
            tools: HashMap::new(),
            resource_list: Vec::new(),
            tool_list: Vec::new(),
        }
    }

    pub fn register_resource(
        &mut self,
        uri: &'static str,
        resource: Resource,
        handler: ResourceHandler,
    ) {
        self.resources.insert(uri, handler);
        self.resource_list.push(resource);
    }

    pub fn register_tool(&mut self, name: &'static str, tool: Tool, handler: ToolHandler) {
        if self.tools.insert(name, handler).is_some() {
            tracing::warn!(tool = name, "Tool registered twice; keeping the last handler");
            self.tool_list.retain(|existing| existing.name != name);
        }
        self.tool_list.push(tool);
    }

    pub fn resource(&self, uri: &str) -> Option<ResourceHandler> {
        self.resources.get(uri).copied()
    }

    pub fn tool(&self, name: &str) -> Option<ToolHandler> {
        self.tools.get(name).copied()
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resource_list
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tool_list
    }
}
