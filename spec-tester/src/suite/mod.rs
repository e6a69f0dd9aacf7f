//! The built-in scenario catalog.
//!
//! Each scenario is a plain function returning a boxed future, so the trees
//! can hold them as `fn` pointers. Group and case order here is the order
//! in which cases are numbered and run.

pub mod client;
pub mod http2;

use crate::runner::ServerSpec;
use crate::server::ClientSpec;

/// Everything h2probe can check on a server.
pub fn server_spec() -> ServerSpec {
    http2::spec()
}

/// Everything h2probed can check on a client.
pub fn client_spec() -> ClientSpec {
    client::spec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_catalog_layout() {
        let spec = server_spec();
        assert_eq!(spec.root().path(), "http2");
        let paths: Vec<_> = spec.groups().map(|g| g.path().to_string()).collect();
        for expected in [
            "http2/3.5",
            "http2/4.2",
            "http2/5.1",
            "http2/6.5",
            "http2/6.7",
            "http2/6.8",
            "http2/6.9.1",
        ] {
            assert!(paths.iter().any(|p| p == expected), "missing {expected}");
        }

        let goaway = spec.groups().find(|g| g.path() == "http2/6.8").unwrap();
        assert_eq!(goaway.strict_tests().len(), 1);
        assert_eq!(goaway.strict_tests()[0].path(), "http2/6.8/2");
    }

    #[test]
    fn client_catalog_layout() {
        let spec = client_spec();
        let leaves: Vec<_> = spec
            .groups()
            .filter(|g| !g.cases().is_empty())
            .map(|g| (g.path().to_string(), g.cases().len()))
            .collect();
        assert_eq!(
            leaves,
            [("client/6.5".to_string(), 3), ("client/6.7".to_string(), 4)]
        );
    }
}
