use crate::cmd::ProbeArgs;
use crate::exit::{device_error, CliResult, SUCCESS};
use crate::output::{print_serial, OutputFormat};

pub async fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let device = args.connect.connect()?;
    let result = device.query_serial().await;
    device.close().await;

    let info = result.map_err(|err| device_error("serial query failed", err))?;
    print_serial(&info, format);
    Ok(SUCCESS)
}
