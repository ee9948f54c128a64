use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use oscwire_codec::{Argument, Message};
use oscwire_session::BoardInfo;
use serde::Serialize;
use serde_json::{json, Value};

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
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// What kind of message is being printed.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Reply,
    Error,
    Received,
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: MessageKind,
    address: &'a str,
    type_tags: String,
    args: Vec<Value>,
    source: &'a str,
    timestamp: String,
}

fn arg_json(arg: &Argument) -> Value {
    match arg {
        Argument::Int(v) => json!(v),
        Argument::Float(v) => json!(v),
        Argument::String(s) => json!(s),
        Argument::Blob(b) => json!({ "blob": hex(b) }),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn print_message(msg: &Message, kind: MessageKind, source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind,
                address: &msg.address,
                type_tags: msg.type_tags(),
                args: msg.args.iter().map(arg_json).collect(),
                source,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "TAGS", "ARGS", "SOURCE"])
                .add_row(vec![
                    msg.address.clone(),
                    msg.type_tags(),
                    args_text(msg),
                    source.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match kind {
            MessageKind::Error => println!("{source} !! {msg}"),
            _ => println!("{source} <- {msg}"),
        },
        OutputFormat::Raw => print_raw(format!("{msg}\n").as_bytes()),
    }
}

fn args_text(msg: &Message) -> String {
    msg.args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Serialize)]
struct InfoOutput<'a> {
    location: &'a str,
    #[serde(flatten)]
    info: &'a BoardInfo,
}

pub fn print_info(info: &BoardInfo, location: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = InfoOutput { location, info };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            let opt = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
            let flag = |v: Option<bool>| opt(v.map(|b| if b { "on" } else { "off" }.to_string()));
            let rows = [
                ("Location", location.to_string()),
                ("Name", opt(info.name.clone())),
                ("Serial", opt(info.serial_number.map(|v| v.to_string()))),
                ("Firmware", opt(info.firmware_version.clone())),
                ("Free memory", opt(info.free_memory.map(|v| v.to_string()))),
                ("IP", opt(info.ip.clone())),
                ("Gateway", opt(info.gateway.clone())),
                ("Netmask", opt(info.netmask.clone())),
                ("DHCP", flag(info.dhcp)),
                ("Webserver", flag(info.webserver)),
                ("UDP listen", opt(info.udp_listen_port.map(|v| v.to_string()))),
                ("UDP send", opt(info.udp_send_port.map(|v| v.to_string()))),
            ];
            if matches!(format, OutputFormat::Table) {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec!["FIELD", "VALUE"]);
                for (field, value) in rows {
                    table.add_row(vec![field.to_string(), value]);
                }
                println!("{table}");
            } else {
                println!("Board Info:");
                for (field, value) in rows {
                    println!("  {:<13} {value}", format!("{field}:"));
                }
            }
        }
        OutputFormat::Raw => {
            println!("{}", info.name.as_deref().unwrap_or(location));
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_render_as_json_values() {
        assert_eq!(arg_json(&Argument::Int(512)), json!(512));
        assert_eq!(arg_json(&Argument::String("on".into())), json!("on"));
        assert_eq!(
            arg_json(&Argument::Blob(vec![0x0a, 0xff].into())),
            json!({ "blob": "0aff" })
        );
    }

    #[test]
    fn info_output_flattens_fields() {
        let info = BoardInfo {
            name: Some("bench".into()),
            ..BoardInfo::default()
        };
        let value = serde_json::to_value(InfoOutput {
            location: "udp:10.0.0.2:10000",
            info: &info,
        })
        .unwrap();
        assert_eq!(value["location"], "udp:10.0.0.2:10000");
        assert_eq!(value["name"], "bench");
    }
}
