use gattpipe_frame::{chunk, encode, fragment_budget, DEFAULT_FRAGMENT_SIZE};

use crate::cmd::{resolve_payload, ChunkArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_plan, FragmentPlan, FragmentRow, OutputFormat};

pub fn run(args: ChunkArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args.payload)?;
    let wire = encode(&payload).map_err(|err| frame_error("encode failed", err))?;
    let plan = plan(payload.len(), &wire, args.link.mtu, args.link.overhead);

    tracing::debug!(
        fragments = plan.fragments.len(),
        fragment_size = plan.fragment_size,
        "fragment plan computed"
    );
    print_plan(&plan, &wire, format);
    Ok(SUCCESS)
}

fn plan(payload_size: usize, wire: &[u8], mtu: usize, overhead: usize) -> FragmentPlan {
    let budget = fragment_budget(mtu, overhead, DEFAULT_FRAGMENT_SIZE);
    let mut offset = 0;
    let fragments = chunk(wire, budget)
        .enumerate()
        .map(|(index, fragment)| {
            let row = FragmentRow {
                index,
                offset,
                len: fragment.len(),
            };
            offset += fragment.len();
            row
        })
        .collect();

    FragmentPlan {
        payload_size,
        frame_size: wire.len(),
        reported_mtu: mtu,
        write_overhead: overhead,
        fragment_size: budget.get(),
        fragments,
    }
}
