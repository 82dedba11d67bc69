//! Cross-module scenarios.

mod service_flow;
mod support;
