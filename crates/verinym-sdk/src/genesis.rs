//! Genesis transactions: one JSON NYM record per line.

use serde::{Deserialize, Serialize};
use std::path::Path;

use verinym_core::{Did, Role, Verkey};

use crate::error::{SdkError, SdkResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisTxn {
    pub dest: Did,
    pub verkey: Verkey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

pub fn parse_genesis(contents: &str) -> SdkResult<Vec<GenesisTxn>> {
    let mut txns = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let txn: GenesisTxn = serde_json::from_str(line).map_err(|e| {
            SdkError::invalid_structure(format!("genesis line {}: {}", line_no + 1, e))
        })?;
        txns.push(txn);
    }
    if txns.is_empty() {
        return Err(SdkError::invalid_structure("genesis file has no transactions"));
    }
    Ok(txns)
}

pub fn render_genesis(txns: &[GenesisTxn]) -> SdkResult<String> {
    let mut out = String::new();
    for txn in txns {
        out.push_str(&serde_json::to_string(txn)?);
        out.push('\n');
    }
    Ok(out)
}

pub async fn read_genesis(path: &Path) -> SdkResult<Vec<GenesisTxn>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SdkError::io(format!("{}: {}", path.display(), e)))?;
    parse_genesis(&contents)
}

pub async fn write_genesis(path: &Path, txns: &[GenesisTxn]) -> SdkResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, render_genesis(txns)?).await?;
    Ok(())
}
