//! CSV deployment configuration.
//!
//! One row per validator: `id,port,model,timeout_secs,faulty`, with a header
//! line. Every validator reads the same file; its peers are all other rows,
//! addressed on localhost.

use anyhow::{bail, Context, Result};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

/// Settings for one validator process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub id: String,
    pub port: u16,
    pub model: String,
    pub timeout_secs: u64,
    pub faulty: u32,
}

/// Load every validator row from a CSV file.
pub fn load(path: &Path) -> Result<Vec<NodeConfig>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read node config {path:?}"))?;

    let mut configs = Vec::new();
    // First line is the header
    for (line_no, line) in text.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() != 5 {
            bail!("line {}: expected 5 columns, got {}", line_no + 1, parts.len());
        }
        configs.push(NodeConfig {
            id: parts[0].to_string(),
            port: parts[1]
                .parse()
                .with_context(|| format!("line {}: bad port {:?}", line_no + 1, parts[1]))?,
            model: parts[2].to_string(),
            timeout_secs: parts[3]
                .parse()
                .with_context(|| format!("line {}: bad timeout {:?}", line_no + 1, parts[3]))?,
            faulty: parts[4]
                .parse()
                .with_context(|| format!("line {}: bad fault count {:?}", line_no + 1, parts[4]))?,
        });
    }
    Ok(configs)
}

/// The row for one validator id.
pub fn find<'a>(configs: &'a [NodeConfig], id: &str) -> Result<&'a NodeConfig> {
    configs
        .iter()
        .find(|c| c.id == id)
        .with_context(|| format!("validator {id:?} not present in node config"))
}

/// Peer addresses for one validator: every other row's port on localhost.
pub fn peers_for(configs: &[NodeConfig], id: &str) -> Vec<SocketAddr> {
    configs
        .iter()
        .filter(|c| c.id != id)
        .map(|c| SocketAddr::from(([127, 0, 0, 1], c.port)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
id,port,model,timeout_secs,faulty
A,9001,model-v1,10,1
B,9002,model-v1,10,1
C,9003,model-v1,10,1
D,9004,model-v1,10,1
";

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_all_rows() {
        let file = config_file(SAMPLE);
        let configs = load(file.path()).unwrap();

        assert_eq!(configs.len(), 4);
        assert_eq!(configs[0].id, "A");
        assert_eq!(configs[0].port, 9001);
        assert_eq!(configs[0].model, "model-v1");
        assert_eq!(configs[0].timeout_secs, 10);
        assert_eq!(configs[0].faulty, 1);
    }

    #[test]
    fn test_peers_exclude_self() {
        let file = config_file(SAMPLE);
        let configs = load(file.path()).unwrap();

        let peers = peers_for(&configs, "B");
        assert_eq!(peers.len(), 3);
        assert!(!peers.iter().any(|p| p.port() == 9002));
    }

    #[test]
    fn test_find_unknown_id() {
        let file = config_file(SAMPLE);
        let configs = load(file.path()).unwrap();
        assert!(find(&configs, "Z").is_err());
    }

    #[test]
    fn test_malformed_row_rejected() {
        let file = config_file("id,port,model,timeout_secs,faulty\nA,not-a-port,m,10,1\n");
        assert!(load(file.path()).is_err());
    }

    #[test]
    fn test_wrong_column_count_rejected() {
        let file = config_file("id,port,model,timeout_secs,faulty\nA,9001,m\n");
        assert!(load(file.path()).is_err());
    }
}
