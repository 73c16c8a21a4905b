//! APNs gateway and feedback endpoints

use std::fmt;

/// Apple server population a certificate is allowed to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerPopulation {
    Sandbox,
    Production,
}

impl ServerPopulation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerPopulation::Sandbox => "sandbox",
            ServerPopulation::Production => "production",
        }
    }
}

impl fmt::Display for ServerPopulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two legacy services a connection is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// Notification gateway (write-only)
    Push,
    /// Feedback service (read-only)
    Feedback,
}

/// Resolved host and port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub host: &'static str,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

pub const PUSH_PORT: u16 = 2195;
pub const FEEDBACK_PORT: u16 = 2196;

/// Map a server population and service kind to the fixed Apple endpoint.
pub fn resolve_endpoint(population: ServerPopulation, kind: ServiceKind) -> Endpoint {
    match (population, kind) {
        (ServerPopulation::Sandbox, ServiceKind::Push) => Endpoint {
            host: "gateway.sandbox.push.apple.com",
            port: PUSH_PORT,
        },
        (ServerPopulation::Production, ServiceKind::Push) => Endpoint {
            host: "gateway.push.apple.com",
            port: PUSH_PORT,
        },
        (ServerPopulation::Sandbox, ServiceKind::Feedback) => Endpoint {
            host: "feedback.sandbox.push.apple.com",
            port: FEEDBACK_PORT,
        },
        (ServerPopulation::Production, ServiceKind::Feedback) => Endpoint {
            host: "feedback.push.apple.com",
            port: FEEDBACK_PORT,
        },
    }
}
