use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize, Debug)]
pub struct FragmentRow {
    pub index: usize,
    pub offset: usize,
    pub len: usize,
}

#[derive(Serialize, Debug)]
pub struct FragmentPlan {
    pub payload_size: usize,
    pub frame_size: usize,
    pub reported_mtu: usize,
    pub write_overhead: usize,
    pub fragment_size: usize,
    pub fragments: Vec<FragmentRow>,
}

#[derive(Serialize, Debug)]
pub struct Exchange {
    pub index: usize,
    pub request_size: usize,
    pub response_size: usize,
    pub response: String,
}

#[derive(Serialize, Debug)]
pub struct LoopbackReport {
    pub reported_mtu: usize,
    pub fragment_size: usize,
    pub fragments_written: usize,
    pub frames_answered: usize,
    pub exchanges: Vec<Exchange>,
}

pub fn print_plan(plan: &FragmentPlan, wire: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(plan),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAGMENT", "OFFSET", "SIZE"]);
            for row in &plan.fragments {
                table.add_row(vec![
                    row.index.to_string(),
                    row.offset.to_string(),
                    row.len.to_string(),
                ]);
            }
            println!(
                "payload={} frame={} fragment_size={} (mtu {} - overhead {})",
                plan.payload_size,
                plan.frame_size,
                plan.fragment_size,
                plan.reported_mtu,
                plan.write_overhead
            );
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "payload={} frame={} fragment_size={} fragments={}",
                plan.payload_size,
                plan.frame_size,
                plan.fragment_size,
                plan.fragments.len()
            );
            for row in &plan.fragments {
                println!("  #{} offset={} size={}", row.index, row.offset, row.len);
            }
        }
        OutputFormat::Raw => print_raw(wire),
    }
}

pub fn print_loopback(report: &LoopbackReport, responses: &[Vec<u8>], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EXCHANGE", "SENT", "RECEIVED", "RESPONSE"]);
            for exchange in &report.exchanges {
                table.add_row(vec![
                    exchange.index.to_string(),
                    exchange.request_size.to_string(),
                    exchange.response_size.to_string(),
                    exchange.response.clone(),
                ]);
            }
            println!("{table}");
            println!(
                "fragments_written={} fragment_size={}",
                report.fragments_written, report.fragment_size
            );
        }
        OutputFormat::Pretty => {
            for exchange in &report.exchanges {
                println!(
                    "exchange={} sent={} received={} response={}",
                    exchange.index,
                    exchange.request_size,
                    exchange.response_size,
                    exchange.response
                );
            }
            println!(
                "fragments_written={} fragment_size={} answered={}",
                report.fragments_written, report.fragment_size, report.frames_answered
            );
        }
        OutputFormat::Raw => {
            for response in responses {
                print_raw(response);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
