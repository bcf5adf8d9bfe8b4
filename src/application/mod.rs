//! Application layer: the services the binary and host applications call.
//!
//! `GatewayClient` talks to the gateway on the way out, `CallbackReconciler`
//! handles what it sends back. Both depend only on the domain ports.

pub mod gateway;
pub mod reconciler;
pub mod signer;
