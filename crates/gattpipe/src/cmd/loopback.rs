use std::sync::Arc;

use gattpipe_pipe::{open_with_config, EchoResponder, PipeConfig};
use gattpipe_transport::{MemoryChannel, NotifyChannel};

use crate::cmd::{parse_duration, resolve_payload, LoopbackArgs, ReplyMode};
use crate::exit::{pipe_error, transport_error, CliResult, SUCCESS};
use crate::output::{payload_preview, print_loopback, Exchange, LoopbackReport, OutputFormat};

pub fn run(args: LoopbackArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(&args.payload)?;
    let config = PipeConfig {
        write_overhead: args.link.overhead,
        response_timeout: Some(timeout),
        ..PipeConfig::default()
    };

    let (central, peripheral) = MemoryChannel::pair(args.link.mtu);
    let peripheral: Arc<dyn NotifyChannel> = peripheral;
    let responder = EchoResponder::attach_with(&peripheral, config.clone(), reply_fn(args.reply))
        .map_err(|err| transport_error("peer setup failed", err))?;

    let pipe = open_with_config(central.clone(), config)
        .map_err(|err| pipe_error("open failed", err))?;
    tracing::info!(
        mtu = args.link.mtu,
        count = args.count,
        payload_size = payload.len(),
        "loopback pipe open"
    );

    let mut exchanges = Vec::with_capacity(args.count);
    let mut responses = Vec::with_capacity(args.count);
    for index in 0..args.count {
        let frame = pipe
            .request(&payload)
            .map_err(|err| pipe_error("exchange failed", err))?;
        exchanges.push(Exchange {
            index,
            request_size: payload.len(),
            response_size: frame.len(),
            response: payload_preview(&frame.payload),
        });
        responses.push(frame.payload.to_vec());
    }

    let report = LoopbackReport {
        reported_mtu: args.link.mtu,
        fragment_size: pipe.config().fragment_budget(args.link.mtu).get(),
        fragments_written: central.written_fragments().len(),
        frames_answered: responder.frames_answered(),
        exchanges,
    };
    pipe.close();

    print_loopback(&report, &responses, format);
    Ok(SUCCESS)
}

fn reply_fn(mode: ReplyMode) -> fn(&[u8]) -> Vec<u8> {
    match mode {
        ReplyMode::Echo => |payload| payload.to_vec(),
        ReplyMode::Upper => |payload| payload.to_ascii_uppercase(),
        ReplyMode::Reverse => |payload| payload.iter().rev().copied().collect(),
    }
}
