use std::collections::BTreeMap;
use std::fs;

use bytes::BytesMut;
use comrpc_core::ANY_VERSION;
use comrpc_frame::label::is_known;
use comrpc_frame::{decode_envelope, Envelope, Message, Tag, BLOCK_SIZE};
use comrpc_message::{Init, Input, Output, Setup, UNSET_EXCHANGE_ID};
use serde_json::Value;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_records, MessageRecord, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let data = fs::read(&args.file)
        .map_err(|err| io_error(&format!("failed reading {}", args.file.display()), err))?;
    let records = decode_all(&data, args.max_message_size)?;
    tracing::debug!(file = %args.file.display(), messages = records.len(), "decoded file");
    print_records(&records, format);
    Ok(SUCCESS)
}

/// Decode every envelope in `data`. Trailing bytes that do not form a whole
/// envelope are an error.
pub fn decode_all(data: &[u8], max_message_size: usize) -> CliResult<Vec<MessageRecord>> {
    let mut buf = BytesMut::from(data);
    let mut records = Vec::new();
    while !buf.is_empty() {
        let index = records.len();
        let envelope = decode_envelope(&mut buf, max_message_size)
            .map_err(|err| frame_error(&format!("envelope {index} is malformed"), err))?
            .ok_or_else(|| {
                CliError::new(
                    DATA_INVALID,
                    format!("envelope {index} is truncated ({} bytes left)", buf.len()),
                )
            })?;
        records.push(describe(index, envelope)?);
    }
    Ok(records)
}

/// Load an envelope into its message type and list the fields.
pub fn describe(index: usize, envelope: Envelope) -> CliResult<MessageRecord> {
    let (message, fields) = match envelope.tag {
        Tag::ANNOUNCE_REQUEST => ("Init", init_fields(&load::<Init>(&envelope)?)),
        Tag::ANNOUNCE_RESPONSE => ("Setup", setup_fields(&load::<Setup>(&envelope)?)),
        Tag::INVOKE_REQUEST => ("Input", input_fields(&load::<Input>(&envelope)?)),
        Tag::INVOKE_RESPONSE => ("Output", output_fields(&load::<Output>(&envelope)?)),
        tag => {
            if !is_known(tag.label) {
                tracing::warn!(label = tag.label, "envelope with unknown label");
            }
            let mut fields = BTreeMap::new();
            fields.insert("label", Value::from(tag.label));
            ("unknown", fields)
        }
    };

    Ok(MessageRecord {
        index,
        tag: envelope.tag.to_string(),
        message,
        size: envelope.payload.len(),
        fields,
        payload: envelope.payload,
    })
}

fn load<M: Message + Default>(envelope: &Envelope) -> CliResult<M> {
    let mut message = M::default();
    envelope
        .load_into(&mut message, BLOCK_SIZE)
        .map_err(|err| frame_error("load failed", err))?;
    Ok(message)
}

fn init_fields(init: &Init) -> BTreeMap<&'static str, Value> {
    let kind = if init.is_instantiate() {
        "instantiate".to_string()
    } else {
        match init.kind() {
            Some(kind) => format!("{kind:?}").to_lowercase(),
            None => match init.raw_kind() {
                Some(raw) => format!("unknown({raw})"),
                None => "truncated".to_string(),
            },
        }
    };

    let mut fields = BTreeMap::new();
    fields.insert("kind", Value::from(kind));
    fields.insert("id", Value::from(init.id()));
    fields.insert("implementation", Value::from(init.implementation().to_string()));
    fields.insert("interface_id", hex(init.interface_id()));
    fields.insert("exchange_id", exchange_id(init.exchange_id()));
    fields.insert("version", version_text(init.version_id()));
    if init.is_instantiate() {
        fields.insert("class_name", Value::from(init.class_name()));
    }
    fields
}

fn setup_fields(setup: &Setup) -> BTreeMap<&'static str, Value> {
    let mut fields = BTreeMap::new();
    if !setup.is_set() {
        fields.insert("ack", Value::from(true));
        return fields;
    }
    fields.insert("implementation", Value::from(setup.implementation().to_string()));
    fields.insert("sequence_number", Value::from(setup.sequence_number()));
    fields.insert("proxy_stub_path", Value::from(setup.proxy_stub_path()));
    fields.insert("trace_categories", Value::from(setup.trace_categories()));
    fields
}

fn input_fields(input: &Input) -> BTreeMap<&'static str, Value> {
    let mut fields = BTreeMap::new();
    fields.insert("implementation", Value::from(input.implementation().to_string()));
    fields.insert("interface_id", hex(input.interface_id()));
    fields.insert("method_id", Value::from(input.method_id()));
    fields.insert(
        "argument_bytes",
        Value::from(input.length().saturating_sub(comrpc_message::input::HEADER_SIZE)),
    );
    fields
}

fn output_fields(output: &Output) -> BTreeMap<&'static str, Value> {
    let mut fields = BTreeMap::new();
    fields.insert("result_bytes", Value::from(output.length()));
    fields
}

fn hex(value: u32) -> Value {
    Value::from(format!("{value:#x}"))
}

fn exchange_id(value: u32) -> Value {
    if value == UNSET_EXCHANGE_ID {
        Value::from("unset")
    } else {
        Value::from(value)
    }
}

fn version_text(value: u32) -> Value {
    if value == ANY_VERSION {
        return Value::from("any");
    }
    Value::from(format!("{}.{}", value >> 16, value & 0xffff))
}
