#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Shared test helpers used across the engine's integration suites: a
//! disposable Postgres bootstrap and a Docker-availability probe.

pub mod postgres;

pub use postgres::{start_postgres, TestDatabase};

/// Returns `true` if a Docker daemon is reachable for integration tests that
/// would rather run against a container than spawn a local Postgres process.
#[must_use]
pub fn docker_available() -> bool {
    docker_available_with_host(std::env::var("DOCKER_HOST").ok())
}

fn docker_available_with_host(host: Option<String>) -> bool {
    if let Some(host) = host {
        if let Some(path) = host.strip_prefix("unix://") {
            return std::path::Path::new(path).exists();
        }
        return true;
    }

    std::path::Path::new("/var/run/docker.sock").exists()
        || std::process::Command::new("docker")
            .args(["info"])
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docker_available_respects_unix_socket_env() {
        assert!(!docker_available_with_host(Some(
            "unix:///definitely/missing.sock".into()
        )));
    }

    #[test]
    fn docker_available_accepts_tcp_env() {
        assert!(docker_available_with_host(Some(
            "tcp://127.0.0.1:2375".into()
        )));
    }

    #[test]
    fn docker_available_obeys_env_value() {
        let env_value = std::env::var("DOCKER_HOST").ok();
        let expected = docker_available_with_host(env_value);
        assert_eq!(docker_available(), expected);
    }
}
