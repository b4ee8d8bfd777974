// Notification dispatch.
//
// - model.rs: delivery modes, requests, outcomes, message formatting
// - client.rs: MessageTransport seam and the dispatch decision per mode
// - mcp.rs: tool-call transport over a tool server's stdio

pub mod client;
pub mod mcp;
pub mod model;
