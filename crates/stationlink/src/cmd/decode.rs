use std::fs;

use stationlink_frame::{Frame, FrameAssembler};
use stationlink_protocol::parse::{self, ChannelKind};
use stationlink_protocol::{FieldValue, Product, Snapshot};
use tracing::info;

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, protocol_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let capture = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;

    let mut assembler = FrameAssembler::new(args.header.into());
    let frames = assembler.feed(&capture);
    let stats = assembler.stats();
    info!(
        frames = stats.frames,
        dropped_bytes = stats.dropped_bytes,
        trailing = assembler.buffered(),
        "capture decoded"
    );

    if frames.is_empty() {
        return Err(CliError::new(
            DATA_INVALID,
            format!("no frames found in {}", args.file.display()),
        ));
    }

    for frame in &frames {
        let kind = ChannelKind::classify(frame.key);
        let fields = match kind {
            Some(kind) if !args.raw => decode_fields(kind, frame, args.product)?,
            _ => None,
        };
        print_frame(frame, kind.map(ChannelKind::name), fields.as_ref(), format);
    }

    Ok(SUCCESS)
}

/// Payload of `frame` as named fields. `None` for malformed single-field
/// settings, which the device runtime drops too.
fn decode_fields(
    kind: ChannelKind,
    frame: &Frame,
    product: Product,
) -> CliResult<Option<Snapshot>> {
    let payload = &frame.payload[..];
    let snapshot = match kind {
        ChannelKind::Pd => parse::parse_pd(payload, product),
        ChannelKind::Ems => parse::parse_ems(payload, product),
        ChannelKind::Inverter => parse::parse_inverter(payload, product),
        ChannelKind::Mppt => parse::parse_mppt(payload, product),
        ChannelKind::Bms => {
            let (pack, mut snapshot) = parse::parse_bms(payload, product);
            snapshot.insert("pack", FieldValue::Int(pack.into()));
            snapshot
        }
        ChannelKind::DcInCurrent => match parse::parse_dc_in_current(payload) {
            Ok(value) => single(kind, FieldValue::Int(value.into())),
            Err(_) => return Ok(None),
        },
        ChannelKind::DcInType => match parse::parse_dc_in_type(payload) {
            Ok(value) => single(kind, FieldValue::Int(value.into())),
            Err(_) => return Ok(None),
        },
        ChannelKind::FanAuto => match parse::parse_fan_auto(payload) {
            Ok(value) => single(kind, FieldValue::Int(value.into())),
            Err(_) => return Ok(None),
        },
        ChannelKind::LcdTimeout => match parse::parse_lcd_timeout(payload) {
            Ok(value) => single(kind, FieldValue::Int(value.into())),
            Err(_) => return Ok(None),
        },
        ChannelKind::SerialMain | ChannelKind::SerialExtra => {
            let info = parse::parse_serial(payload)
                .map_err(|err| protocol_error(&format!("frame {}", frame.key), err))?;
            [
                ("serial", FieldValue::Text(info.serial)),
                ("product", FieldValue::Int(info.product.code().into())),
                ("model", FieldValue::Int(info.model.into())),
                ("cpu_id", FieldValue::Text(info.cpu_id)),
            ]
            .into_iter()
            .collect()
        }
    };
    Ok(Some(snapshot))
}

fn single(kind: ChannelKind, value: FieldValue) -> Snapshot {
    [(kind.name(), value)].into_iter().collect()
}
