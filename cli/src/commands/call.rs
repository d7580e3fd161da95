use anyhow::Context;
use executor_core::smol::SmolGlobal;
use serde_json::Value;

use wdk_bridge::IpcClient;

use crate::cli::CallArgs;
use crate::config::MergedConfig;
use crate::error::CliResult;

pub async fn execute(args: CallArgs, config: MergedConfig) -> CliResult<()> {
    let params = parse_params(args.params.as_deref())?;
    let socket = config
        .socket
        .context("--socket is required (or set `socket` in the config file)")?;

    let client = IpcClient::connect(&socket, config.ipc, &SmolGlobal)
        .await
        .with_context(|| format!("failed to connect to {}", socket.display()))?;
    let result = client
        .call(&args.method, params)
        .await
        .with_context(|| format!("{} failed", args.method))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn parse_params(raw: Option<&str>) -> CliResult<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Object(Default::default()));
    };
    let params: Value = serde_json::from_str(raw).context("--params is not valid JSON")?;
    anyhow::ensure!(params.is_object(), "--params must be a JSON object");
    Ok(params)
}
