use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use comrpc_core::{InterfaceId, ReleaseStatus, UNKNOWN_ID};
use comrpc_frame::{Envelope, FrameError, Message, MessageReader, MessageWriter, Tag};
use comrpc_message::{Handle, Init, Input, MethodId, Output, Setup};

use crate::error::{ExchangeError, Result};
use crate::exchange::{
    AnnounceOutcome, Exchange, METHOD_ADD_REF, METHOD_QUERY_INTERFACE, METHOD_RELEASE,
};

/// What [`serve_next`] did with one request.
#[derive(Debug)]
pub enum Served {
    Announced(AnnounceOutcome),
    Invoked {
        implementation: Handle,
        interface_id: InterfaceId,
        method_id: MethodId,
    },
    /// The invocation failed; the peer got an empty response.
    Rejected(ExchangeError),
}

/// Send an announcement and wait for the reply.
///
/// Offers and revokes are answered with an empty [`Setup`].
pub fn announce<R: Read, W: Write>(
    reader: &mut MessageReader<R>,
    writer: &mut MessageWriter<W>,
    init: &Init,
    setup: &mut Setup,
    timeout: Duration,
) -> Result<()> {
    writer.send(init)?;
    receive_within(reader, setup, Instant::now() + timeout, timeout)
}

/// Send an invocation and wait for its results.
pub fn invoke<R: Read, W: Write>(
    reader: &mut MessageReader<R>,
    writer: &mut MessageWriter<W>,
    input: &Input,
    output: &mut Output,
    timeout: Duration,
) -> Result<()> {
    writer.send(input)?;
    receive_within(reader, output, Instant::now() + timeout, timeout)
}

/// Take one more reference on a peer's object. Returns the peer-side count.
pub fn remote_add_ref<R: Read, W: Write>(
    reader: &mut MessageReader<R>,
    writer: &mut MessageWriter<W>,
    implementation: Handle,
    timeout: Duration,
) -> Result<u32> {
    let output = invoke_unknown(reader, writer, implementation, METHOD_ADD_REF, None, timeout)?;
    if output.is_empty() {
        return Err(ExchangeError::InvalidHandle(implementation));
    }
    Ok(output.reader().read_u32())
}

/// Give back a reference on a peer's object.
pub fn remote_release<R: Read, W: Write>(
    reader: &mut MessageReader<R>,
    writer: &mut MessageWriter<W>,
    implementation: Handle,
    timeout: Duration,
) -> Result<ReleaseStatus> {
    let output = invoke_unknown(reader, writer, implementation, METHOD_RELEASE, None, timeout)?;
    if output.is_empty() {
        return Err(ExchangeError::InvalidHandle(implementation));
    }
    let code = output.reader().read_u32();
    ReleaseStatus::from_code(code)
        .ok_or_else(|| ExchangeError::UnexpectedMessage(format!("release status {code}")))
}

/// Ask a peer's object for another interface. Returns `NULL` if the object
/// does not support it.
pub fn remote_query_interface<R: Read, W: Write>(
    reader: &mut MessageReader<R>,
    writer: &mut MessageWriter<W>,
    implementation: Handle,
    interface_id: InterfaceId,
    timeout: Duration,
) -> Result<Handle> {
    let output = invoke_unknown(
        reader,
        writer,
        implementation,
        METHOD_QUERY_INTERFACE,
        Some(interface_id),
        timeout,
    )?;
    Ok(output.reader().read_number::<Handle>())
}

/// Answer the next request from the peer.
///
/// Waits at most the exchange's configured timeout. A failed invocation is
/// answered with an empty [`Output`] and reported as [`Served::Rejected`];
/// the connection stays usable. After a remote release the administrator's
/// parked libraries are flushed.
pub fn serve_next<R: Read, W: Write>(
    reader: &mut MessageReader<R>,
    writer: &mut MessageWriter<W>,
    exchange: &Exchange,
) -> Result<Served> {
    let timeout = exchange.config().timeout();
    let envelope = read_within(reader, Instant::now() + timeout, timeout)?;
    let chunk_size = reader.config().chunk_size;

    match envelope.tag {
        Tag::ANNOUNCE_REQUEST => {
            let mut init = Init::new();
            envelope.load_into(&mut init, chunk_size)?;
            let mut setup = Setup::new();
            let outcome = exchange.announce(&init, &mut setup);
            writer.send(&setup)?;
            Ok(Served::Announced(outcome))
        }
        Tag::INVOKE_REQUEST => {
            let mut input = Input::new();
            envelope.load_into(&mut input, chunk_size)?;
            let mut output = Output::new();
            let served = match exchange.invoke(&input, &mut output) {
                Ok(()) => {
                    if input.interface_id() == UNKNOWN_ID && input.method_id() == METHOD_RELEASE {
                        let unloaded = exchange.administrator().flush_libraries();
                        if unloaded > 0 {
                            tracing::debug!(exchange = exchange.id(), unloaded, "flushed libraries");
                        }
                    }
                    Served::Invoked {
                        implementation: input.implementation(),
                        interface_id: input.interface_id(),
                        method_id: input.method_id(),
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        implementation = %input.implementation(),
                        interface_id = format_args!("{:#x}", input.interface_id()),
                        method_id = input.method_id(),
                        error = %err,
                        "invocation rejected"
                    );
                    Served::Rejected(err)
                }
            };
            writer.send(&output)?;
            Ok(served)
        }
        tag => Err(ExchangeError::UnexpectedMessage(format!(
            "expected a request, got {tag}"
        ))),
    }
}

/// Answer requests until the peer disconnects.
///
/// Idle periods longer than the configured timeout are not an error.
pub fn serve<R: Read, W: Write>(
    reader: &mut MessageReader<R>,
    writer: &mut MessageWriter<W>,
    exchange: &Exchange,
) -> Result<()> {
    loop {
        match serve_next(reader, writer, exchange) {
            Ok(served) => tracing::trace!(?served, "served request"),
            Err(ExchangeError::Timeout(_)) => continue,
            Err(ExchangeError::Disconnected(reason)) => {
                tracing::debug!(exchange = exchange.id(), %reason, "peer disconnected");
                return Ok(());
            }
            Err(err) => return Err(err),
        }
    }
}

fn invoke_unknown<R: Read, W: Write>(
    reader: &mut MessageReader<R>,
    writer: &mut MessageWriter<W>,
    implementation: Handle,
    method_id: MethodId,
    argument: Option<InterfaceId>,
    timeout: Duration,
) -> Result<Output> {
    let mut input = Input::new();
    input.set(implementation, UNKNOWN_ID, method_id);
    if let Some(interface_id) = argument {
        input.writer().write_u32(interface_id);
    }
    let mut output = Output::new();
    invoke(reader, writer, &input, &mut output, timeout)?;
    Ok(output)
}

fn receive_within<R: Read, M: Message>(
    reader: &mut MessageReader<R>,
    message: &mut M,
    deadline: Instant,
    timeout: Duration,
) -> Result<()> {
    let envelope = read_within(reader, deadline, timeout)?;
    envelope.load_into(message, reader.config().chunk_size)?;
    Ok(())
}

fn read_within<R: Read>(
    reader: &mut MessageReader<R>,
    deadline: Instant,
    timeout: Duration,
) -> Result<Envelope> {
    loop {
        if Instant::now() >= deadline {
            return Err(ExchangeError::Timeout(timeout));
        }

        match reader.read_envelope() {
            Ok(envelope) => return Ok(envelope),
            Err(FrameError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(FrameError::ConnectionClosed) => {
                return Err(ExchangeError::Disconnected(
                    "connection closed while awaiting a message".to_string(),
                ));
            }
            Err(err) => return Err(ExchangeError::Frame(err)),
        }
    }
}
