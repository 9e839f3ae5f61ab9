use std::sync::Arc;

use stationlink_device::{Routed, Update};
use stationlink_protocol::parse::ChannelKind;
use stationlink_protocol::Snapshot;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::cmd::MonitorArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_disconnect, print_extra_battery, print_snapshot, OutputFormat};

pub async fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let filter = resolve_channels(args.channels.as_deref())?;
    let device = args.connect.connect()?;

    let mut updates = device.subscribe_updates();
    let mut disconnects = device.subscribe_disconnect();
    let mut added = device.subscribe_added();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut printed = 0usize;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            update = updates.recv() => match update {
                Ok(Update { frame, routed }) => {
                    let Some((kind, pack, snapshot)) = decoded(&routed) else {
                        continue;
                    };
                    if !filter.as_ref().is_none_or(|kinds| kinds.contains(&kind)) {
                        continue;
                    }
                    print_snapshot(kind.name(), pack, &frame, &snapshot, format);
                    printed = printed.saturating_add(1);
                    if args.count.is_some_and(|count| printed >= count) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "output fell behind telemetry");
                }
                Err(RecvError::Closed) => break,
            },
            Ok(event) = disconnects.recv() => print_disconnect(event, format),
            Ok(extra) = added.recv() => {
                let pack = device
                    .secondaries()
                    .into_iter()
                    .find(|(_, device)| Arc::ptr_eq(device, &extra))
                    .map_or(1, |(pack, _)| pack);
                print_extra_battery(extra.name(), extra.serial(), pack, format);
            }
        }
    }

    device.close().await;
    Ok(SUCCESS)
}

fn resolve_channels(names: Option<&[String]>) -> CliResult<Option<Vec<ChannelKind>>> {
    let Some(names) = names else {
        return Ok(None);
    };
    names
        .iter()
        .map(|name| {
            ChannelKind::from_name(name.trim())
                .ok_or_else(|| CliError::new(USAGE, format!("unknown channel: {name}")))
        })
        .collect::<CliResult<Vec<_>>>()
        .map(Some)
}

/// Channel, pack and snapshot decoded from the frame behind `routed`.
fn decoded(routed: &Routed) -> Option<(ChannelKind, Option<u8>, Snapshot)> {
    let decoded = match routed {
        Routed::Pd(snapshot) => (ChannelKind::Pd, None, (**snapshot).clone()),
        Routed::Ems(snapshot) => (ChannelKind::Ems, None, (**snapshot).clone()),
        Routed::Inverter(snapshot) => (ChannelKind::Inverter, None, (**snapshot).clone()),
        Routed::Mppt(snapshot) => (ChannelKind::Mppt, None, (**snapshot).clone()),
        Routed::Bms { pack, snapshot } => (ChannelKind::Bms, Some(*pack), (**snapshot).clone()),
        Routed::Setting { kind, value } => {
            let snapshot = [(kind.name(), value.clone())].into_iter().collect();
            (*kind, None, snapshot)
        }
        Routed::Ignored => return None,
    };
    Some(decoded)
}
