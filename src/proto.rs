//! Line-oriented server protocol over standard streams.
//!
//! A request is two lines: the entry specifier, then props JSON. A
//! response is `Status:`/`Length:` header lines, a blank line, then
//! exactly `Length` bytes of body. EOF before a new request is a clean
//! shutdown.

use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    fn label(&self) -> &'static str {
        match self {
            Status::Ok => "Ok",
            Status::Error => "Error",
        }
    }
}

/// One framed request, both fields trimmed of the line terminator.
#[derive(Debug, PartialEq, Eq)]
pub struct WireRequest {
    pub entry: String,
    pub props_json: String,
}

/// Read the next request, or `None` on end of input. A truncated trailing
/// request (EOF between the two lines) is also treated as end of input.
pub fn read_request(input: &mut impl BufRead) -> io::Result<Option<WireRequest>> {
    let mut entry = String::new();
    if input.read_line(&mut entry)? == 0 {
        return Ok(None);
    }
    let mut props_json = String::new();
    if input.read_line(&mut props_json)? == 0 {
        log::warn!("input closed mid-request; discarding partial request");
        return Ok(None);
    }
    Ok(Some(WireRequest {
        entry: entry.trim().to_string(),
        props_json: props_json.trim().to_string(),
    }))
}

/// Write one framed response. `Length` is the byte count of the body.
pub fn write_response(output: &mut impl Write, status: Status, body: &str) -> io::Result<()> {
    write!(
        output,
        "Status:{}\nLength:{}\n\n{}",
        status.label(),
        body.len(),
        body
    )?;
    output.flush()
}
