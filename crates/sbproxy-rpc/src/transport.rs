//! Length-prefixed call framing.
//!
//! Request: `i32 LE` method length, method name, `i32 LE` payload
//! length, payload. Response: `i32 LE` status code, `i32 LE` length,
//! then the payload (status OK) or a UTF-8 status message.
use std::io::{self, Read, Write};

use crate::error::{RpcError, StatusCode};

/// Message used when a channel hits end of stream mid-call.
pub const CONNECTION_LOST: &str = "Connection to server lost. Did it shut down?";

/// Frames larger than this are rejected as corrupt.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Write one request frame and flush.
pub fn write_request<W: Write>(writer: &mut W, method: &str, payload: &[u8]) -> io::Result<()> {
    write_chunk(writer, method.as_bytes())?;
    write_chunk(writer, payload)?;
    writer.flush()
}

/// Read one request frame. Returns `None` on a clean end of stream.
pub fn read_request<R: Read>(reader: &mut R) -> Result<Option<(String, Vec<u8>)>, RpcError> {
    let Some(method_len) = read_len_or_eof(reader)? else {
        return Ok(None);
    };
    let method = read_exact_vec(reader, method_len)?;
    let method = String::from_utf8(method)
        .map_err(|e| RpcError::Codec(format!("method name is not UTF-8: {e}")))?;
    let payload_len = read_len(reader)?;
    let payload = read_exact_vec(reader, payload_len)?;
    Ok(Some((method, payload)))
}

/// Write one response frame. `Err` carries a failure status and message.
pub fn write_response<W: Write>(
    writer: &mut W,
    response: Result<&[u8], (StatusCode, &str)>,
) -> io::Result<()> {
    match response {
        Ok(payload) => {
            writer.write_all(&StatusCode::Ok.as_i32().to_le_bytes())?;
            write_chunk(writer, payload)?;
        }
        Err((code, message)) => {
            writer.write_all(&code.as_i32().to_le_bytes())?;
            write_chunk(writer, message.as_bytes())?;
        }
    }
    writer.flush()
}

/// Read one complete response frame as `(status, body)`.
///
/// Any error means the stream is no longer positioned on a frame
/// boundary and the channel must not be reused.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<(StatusCode, Vec<u8>), RpcError> {
    let status = read_i32(reader)?;
    let len = read_len(reader)?;
    let body = read_exact_vec(reader, len)?;
    Ok((StatusCode::from_i32(status), body))
}

/// Turn a decoded frame into the call result.
pub fn frame_into_result((code, body): (StatusCode, Vec<u8>)) -> Result<Vec<u8>, RpcError> {
    match code {
        StatusCode::Ok => Ok(body),
        code => Err(RpcError::status(
            code,
            String::from_utf8_lossy(&body).into_owned(),
        )),
    }
}

/// Read one response frame, turning a non-OK status into an error.
pub fn read_response<R: Read>(reader: &mut R) -> Result<Vec<u8>, RpcError> {
    frame_into_result(read_frame(reader)?)
}

fn write_chunk<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    let len = i32::try_from(bytes.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(bytes)
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32, RpcError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(map_read_error)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_len<R: Read>(reader: &mut R) -> Result<usize, RpcError> {
    check_len(read_i32(reader)?)
}

/// Like [`read_len`], but a stream that ends before the first byte is
/// a clean close rather than a lost connection.
fn read_len_or_eof<R: Read>(reader: &mut R) -> Result<Option<usize>, RpcError> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(RpcError::status(StatusCode::Unavailable, CONNECTION_LOST)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(RpcError::Transport(e)),
        }
    }
    check_len(i32::from_le_bytes(buf)).map(Some)
}

fn check_len(len: i32) -> Result<usize, RpcError> {
    let len = usize::try_from(len)
        .map_err(|_| RpcError::Codec(format!("negative frame length {len}")))?;
    if len > MAX_FRAME_LEN {
        return Err(RpcError::Codec(format!(
            "frame length {len} exceeds {MAX_FRAME_LEN}"
        )));
    }
    Ok(len)
}

fn read_exact_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, RpcError> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(map_read_error)?;
    Ok(buf)
}

fn map_read_error(err: io::Error) -> RpcError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        RpcError::status(StatusCode::Unavailable, CONNECTION_LOST)
    } else {
        RpcError::Transport(err)
    }
}
