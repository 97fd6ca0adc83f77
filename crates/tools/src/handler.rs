//! Tool handlers and the factories that instantiate them on activation.

use std::sync::Arc;

use async_trait::async_trait;
use eb_bridge::{BridgeError, CallOptions, HostCaller, HostResponse};
use serde_json::{Map, Value};

use crate::descriptor::ToolDescriptor;

/// An instantiated, callable tool.  Receives parameters already
/// normalized against the tool's schema.
#[async_trait]
pub trait ToolHandler: Send + Sync + 'static {
    async fn invoke(&self, params: Map<String, Value>) -> Result<HostResponse, BridgeError>;
}

/// Builds a handler for a descriptor when its category is activated.
pub trait HandlerFactory: Send + Sync + 'static {
    fn create(&self, descriptor: &ToolDescriptor, host: Arc<dyn HostCaller>) -> Arc<dyn ToolHandler>;
}

/// Forwards the call to the host method named by the descriptor.
pub struct ForwardingHandler {
    method: String,
    opts: CallOptions,
    host: Arc<dyn HostCaller>,
}

impl ForwardingHandler {
    pub fn new(method: impl Into<String>, opts: CallOptions, host: Arc<dyn HostCaller>) -> Self {
        Self {
            method: method.into(),
            opts,
            host,
        }
    }
}

#[async_trait]
impl ToolHandler for ForwardingHandler {
    async fn invoke(&self, params: Map<String, Value>) -> Result<HostResponse, BridgeError> {
        self.host.call_host(&self.method, params, self.opts).await
    }
}

/// Default factory: every tool is a thin forwarder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardingFactory;

impl HandlerFactory for ForwardingFactory {
    fn create(&self, descriptor: &ToolDescriptor, host: Arc<dyn HostCaller>) -> Arc<dyn ToolHandler> {
        Arc::new(ForwardingHandler::new(
            descriptor.method.clone(),
            descriptor.call_options(),
            host,
        ))
    }
}
