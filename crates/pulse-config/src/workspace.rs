//! Telemetry endpoint resolution.
//!
//! Priority: explicit value > environment override > the first server `url`
//! declared in the editor workspace file `.vscode/mcp.json`.

use std::path::Path;
use tracing::debug;

/// Relative location of the editor's MCP server list inside a workspace.
pub const MCP_WORKSPACE_FILE: &str = ".vscode/mcp.json";

/// Resolve the telemetry endpoint from its three sources.
///
/// Empty strings count as unset at every level.
pub fn resolve_telemetry_endpoint(
    explicit: Option<&str>,
    env_override: Option<&str>,
    workspace_dir: &Path,
) -> Option<String> {
    let non_empty = |v: Option<&str>| v.filter(|s| !s.trim().is_empty()).map(str::to_string);

    non_empty(explicit)
        .or_else(|| non_empty(env_override))
        .or_else(|| discover_mcp_server_url(workspace_dir))
}

/// Read `<workspace_dir>/.vscode/mcp.json` and return the first non-empty
/// `url` among its `servers` entries, in file order.
///
/// A missing or unreadable file yields `None`.
pub fn discover_mcp_server_url(workspace_dir: &Path) -> Option<String> {
    let path = workspace_dir.join(MCP_WORKSPACE_FILE);
    if !path.exists() {
        return None;
    }

    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(?path, error = %e, "cannot read workspace mcp file");
            return None;
        }
    };
    let data: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            debug!(?path, error = %e, "workspace mcp file is not valid JSON");
            return None;
        }
    };

    let url = data
        .get("servers")
        .and_then(|s| s.as_object())?
        .values()
        .filter_map(|server| server.get("url").and_then(|u| u.as_str()))
        .find(|u| !u.is_empty())
        .map(str::to_string);

    if let Some(ref u) = url {
        debug!(?path, url = %u, "telemetry endpoint discovered from workspace");
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_mcp(dir: &Path, body: &str) {
        std::fs::create_dir_all(dir.join(".vscode")).unwrap();
        std::fs::write(dir.join(MCP_WORKSPACE_FILE), body).unwrap();
    }

    #[test]
    fn test_explicit_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_mcp(dir.path(), r#"{"servers":{"a":{"url":"http://file"}}}"#);
        let url = resolve_telemetry_endpoint(Some("http://explicit"), Some("http://env"), dir.path());
        assert_eq!(url.as_deref(), Some("http://explicit"));
    }

    #[test]
    fn test_env_beats_workspace() {
        let dir = tempfile::tempdir().unwrap();
        write_mcp(dir.path(), r#"{"servers":{"a":{"url":"http://file"}}}"#);
        let url = resolve_telemetry_endpoint(None, Some("http://env"), dir.path());
        assert_eq!(url.as_deref(), Some("http://env"));
    }

    #[test]
    fn test_empty_values_fall_through() {
        let dir = tempfile::tempdir().unwrap();
        write_mcp(dir.path(), r#"{"servers":{"a":{"url":"http://file"}}}"#);
        let url = resolve_telemetry_endpoint(Some(""), Some("  "), dir.path());
        assert_eq!(url.as_deref(), Some("http://file"));
    }

    #[test]
    fn test_first_url_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        write_mcp(
            dir.path(),
            r#"{"servers":{
                "zeta":{"command":"run"},
                "beta":{"url":""},
                "alpha":{"url":"http://second"},
                "aardvark":{"url":"http://third"}
            }}"#,
        );
        assert_eq!(
            discover_mcp_server_url(dir.path()).as_deref(),
            Some("http://second")
        );
    }

    #[test]
    fn test_nothing_resolves() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_telemetry_endpoint(None, None, dir.path()).is_none());
    }

    #[test]
    fn test_malformed_workspace_file() {
        let dir = tempfile::tempdir().unwrap();
        write_mcp(dir.path(), "{ not json");
        assert!(discover_mcp_server_url(dir.path()).is_none());

        write_mcp(dir.path(), r#"{"servers": []}"#);
        assert!(discover_mcp_server_url(dir.path()).is_none());
    }
}
