use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use wdk_bridge::IpcConfig;

use crate::cli::CommonArgs;

/// TOML config file structure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Worker socket used by `serve` and `call`
    pub socket: Option<PathBuf>,

    /// Transport settings
    pub ipc: IpcSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IpcSection {
    pub max_frame_len: Option<usize>,
    pub read_chunk_size: Option<usize>,
    pub max_pending_calls: Option<usize>,
    /// Seconds; applies to `call`
    pub call_timeout: Option<f64>,
}

/// Merged configuration from file + CLI
pub struct MergedConfig {
    pub socket: Option<PathBuf>,
    pub ipc: IpcConfig,
}

/// Load config from file
pub fn load_config(path: Option<&Path>) -> Result<FileConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            let config: FileConfig = toml::from_str(&content)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?;
            Ok(config)
        }
        None => Ok(FileConfig::default()),
    }
}

/// Merge file config with CLI args (CLI takes precedence)
pub fn merge_config(
    file: FileConfig,
    socket: Option<&Path>,
    timeout: Option<f64>,
    cli: &CommonArgs,
) -> Result<MergedConfig> {
    let socket = socket.map(Path::to_path_buf).or(file.socket);

    let mut builder = IpcConfig::builder();
    if let Some(v) = cli.max_frame_len.or(file.ipc.max_frame_len) {
        builder = builder.max_frame_len(v);
    }
    if let Some(v) = cli.read_chunk_size.or(file.ipc.read_chunk_size) {
        builder = builder.read_chunk_size(v);
    }
    if let Some(v) = cli.max_pending_calls.or(file.ipc.max_pending_calls) {
        builder = builder.max_pending_calls(v);
    }
    if let Some(secs) = timeout.or(file.ipc.call_timeout) {
        builder = builder.call_timeout(parse_timeout(secs)?);
    }

    Ok(MergedConfig {
        socket,
        ipc: builder.build(),
    })
}

fn parse_timeout(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
        .with_context(|| format!("invalid timeout: {secs} (expected a positive number of seconds)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_args() -> CommonArgs {
        CommonArgs {
            max_frame_len: None,
            read_chunk_size: None,
            max_pending_calls: None,
        }
    }

    #[test]
    fn test_file_values_apply() {
        let file: FileConfig = toml::from_str(
            r#"
            socket = "/run/wdk/worker.sock"

            [ipc]
            max_frame_len = 4096
            call_timeout = 2.5
            "#,
        )
        .unwrap();
        let merged = merge_config(file, None, None, &no_args()).unwrap();
        assert_eq!(merged.socket, Some(PathBuf::from("/run/wdk/worker.sock")));
        assert_eq!(merged.ipc.max_frame_len(), 4096);
        assert_eq!(merged.ipc.call_timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_cli_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            socket = "/from/file.sock"

            [ipc]
            max_pending_calls = 8
            call_timeout = 30
            "#,
        )
        .unwrap();
        let args = CommonArgs {
            max_pending_calls: Some(2),
            ..no_args()
        };
        let merged = merge_config(file, Some(Path::new("/from/cli.sock")), Some(1.0), &args).unwrap();
        assert_eq!(merged.socket, Some(PathBuf::from("/from/cli.sock")));
        assert_eq!(merged.ipc.max_pending_calls(), 2);
        assert_eq!(merged.ipc.call_timeout(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_defaults_without_file() {
        let merged = merge_config(FileConfig::default(), None, None, &no_args()).unwrap();
        assert!(merged.socket.is_none());
        assert_eq!(merged.ipc.max_frame_len(), 10_000_000);
        assert_eq!(merged.ipc.call_timeout(), None);
    }

    #[test]
    fn test_invalid_timeout() {
        for secs in [0.0, -1.0, f64::NAN] {
            assert!(merge_config(FileConfig::default(), None, Some(secs), &no_args()).is_err());
        }
    }
}
