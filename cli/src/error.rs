use std::process::ExitCode;

use wdk_bridge::IpcError;

pub type CliResult<T> = anyhow::Result<T>;

/// Convert a CliResult to an ExitCode, printing errors to stderr
///
/// A structured error from the worker also gets its `data` printed, since
/// that is where the failing network, account or field is named.
pub fn to_exit_code(result: CliResult<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            for cause in e.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
            let remote_data = e.chain().find_map(|cause| match cause.downcast_ref::<IpcError>() {
                Some(IpcError::Remote(rpc)) => rpc.data.as_ref(),
                _ => None,
            });
            if let Some(data) = remote_data {
                eprintln!("  data: {data}");
            }
            ExitCode::FAILURE
        }
    }
}
