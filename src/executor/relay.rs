//! Line relay from a script's output pipes to the UI channel
//!
//! stdout is relayed on the worker thread itself; stderr gets its own reader
//! thread. Both forward into the same channel, so the console sees the two
//! streams merged line by line in arrival order.
//!
//! Lines are split on `\n`, a trailing `\r` is dropped, and invalid UTF-8 is
//! replaced rather than ending the relay. Reading continues after the UI side
//! hangs up so the child never blocks on a full pipe.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use async_channel::Sender;
use tracing::{debug, warn};

use super::runner::WorkerEvent;

/// Forward every line of `reader` as `WorkerEvent::Output` until EOF
///
/// Returns the number of lines read.
pub fn relay_lines<R, E>(reader: R, script: &Path, tx: &Sender<E>) -> usize
where
    R: Read,
    E: From<WorkerEvent>,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    let mut count = 0;
    let mut receiver_gone = false;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                count += 1;
                if receiver_gone {
                    continue;
                }
                let line = decode_line(&buf);
                let event = WorkerEvent::Output {
                    script: script.to_path_buf(),
                    line,
                };
                if tx.send_blocking(event.into()).is_err() {
                    debug!(target: "SCRIPT", "Output receiver closed, draining");
                    receiver_gone = true;
                }
            }
            Err(e) => {
                warn!(target: "SCRIPT", error = %e, "Output read error");
                break;
            }
        }
    }
    count
}

/// Start a thread relaying `reader` (the child's stderr)
pub fn spawn_output_reader<R, E>(
    reader: R,
    script: PathBuf,
    tx: Sender<E>,
) -> std::io::Result<JoinHandle<usize>>
where
    R: Read + Send + 'static,
    E: From<WorkerEvent> + Send + 'static,
{
    let name = format!(
        "stderr:{}",
        script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    thread::Builder::new().name(name).spawn(move || {
        let lines = relay_lines(reader, &script, &tx);
        debug!(target: "SCRIPT", lines, "stderr reader exiting");
        lines
    })
}

fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    if end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && raw[end - 1] == b'\r' {
        end -= 1;
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
