//! Per-client read loop.
//!
//! Each admitted client gets one reader task. It accumulates bytes into
//! messages, translates every `Msg` into a [`Command`] and hands the encoded
//! record to the serial link. Messages are newline-delimited, but framing
//! follows JSON values: objects sent back to back, with or without a
//! trailing newline, are taken one by one once complete.

use chrono::Utc;
use serde::de::IgnoredAny;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::messages::ClientEnvelope;
use crate::app_state::AppState;
use crate::domain::{ClientId, Command, CommandRecord, Slot, StatusEvent};

/// Longest unterminated message kept while waiting for more bytes.
pub const MAX_PENDING: usize = 4096;

/// Serves one client until it disconnects or a read fails, then releases
/// its slot exactly once.
pub async fn run_client<R, W>(mut stream: R, slot: Slot, state: AppState<W>, buffer_size: usize)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let client_id = slot.client_id;
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!(%client_id, "connection closed by peer");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(%client_id, error = %e, "client read failed");
                break;
            }
        };
        pending.extend_from_slice(buf.get(..n).unwrap_or_default());

        for message in split_messages(&mut pending, MAX_PENDING) {
            let _ = handle_message(&message, client_id, &state);
        }
    }

    release(slot, &state).await;
}

/// Removes complete messages from the front of `pending`.
///
/// Every newline-terminated line is cut into the JSON values it holds, so
/// `{..}{..}` yields two messages; bytes that do not form a value are
/// returned as one message so they get reported. An unterminated remainder
/// is handled the same way, except that an unfinished value shorter than
/// `limit` stays in `pending` to wait for more bytes.
fn split_messages(pending: &mut Vec<u8>, limit: usize) -> Vec<Vec<u8>> {
    let mut out = Vec::new();

    while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = pending.drain(..=pos).collect();
        let (values, rest, _) = json_values(&line);
        out.extend(values.into_iter().map(<[u8]>::to_vec));
        if !rest.is_empty() {
            out.push(rest.to_vec());
        }
    }

    let (values, rest, unfinished) = json_values(pending.as_slice());
    out.extend(values.into_iter().map(<[u8]>::to_vec));
    let keep = if unfinished && rest.len() < limit {
        rest.to_vec()
    } else {
        if !rest.is_empty() {
            out.push(rest.to_vec());
        }
        Vec::new()
    };
    *pending = keep;
    out
}

/// Splits `bytes` into consecutive JSON values.
///
/// Returns the trimmed values, the trimmed bytes after the last one, and
/// whether those bytes are the start of a value cut short by end of input.
fn json_values(bytes: &[u8]) -> (Vec<&[u8]>, &[u8], bool) {
    let mut values = Vec::new();
    let mut stream = serde_json::Deserializer::from_slice(bytes).into_iter::<IgnoredAny>();
    let mut start = 0;
    loop {
        match stream.next() {
            None => return (values, b"".as_slice(), false),
            Some(Ok(_)) => {
                let end = stream.byte_offset();
                values.push(bytes.get(start..end).unwrap_or_default().trim_ascii());
                start = end;
            }
            Some(Err(e)) => {
                let rest = bytes.get(start..).unwrap_or_default().trim_ascii();
                return (values, rest, e.is_eof());
            }
        }
    }
}

/// Translates one raw message and forwards it to the serial link.
///
/// Returns the forwarded command, or `None` if the message was discarded
/// (invalid JSON, no `Msg`, or an unrecognized verb).
pub fn handle_message<W>(raw: &[u8], client_id: ClientId, state: &AppState<W>) -> Option<Command> {
    let envelope = match ClientEnvelope::from_slice(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(
                %client_id,
                code = e.error_code(),
                class = ?e.class(),
                error = %e,
                "discarding client message"
            );
            return None;
        }
    };

    let command = Command::parse(&envelope.msg);
    if !command.is_forwardable() {
        tracing::debug!(%client_id, msg = %envelope.msg, "unknown command, not forwarded");
        return None;
    }

    state.serial.send(CommandRecord::encode(&command));
    tracing::debug!(%client_id, verb = command.verb(), "command forwarded");
    let _ = state.status.publish(StatusEvent::CommandReceived {
        client_id,
        verb: command.verb(),
        timestamp: Utc::now(),
    });
    Some(command)
}

async fn release<W>(slot: Slot, state: &AppState<W>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let Some(writer) = state.registry.remove(slot) else {
        return;
    };
    let _ = writer.lock().await.shutdown().await;
    tracing::info!(client_id = %slot.client_id, slot = slot.index, "client disconnected");
    let _ = state.status.publish(StatusEvent::ClientDisconnected {
        client_id: slot.client_id,
        slot: slot.index,
        timestamp: Utc::now(),
    });
}
