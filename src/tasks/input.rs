use std::io::{self, BufRead};

use tokio::sync::mpsc::Sender;
use tracing::warn;

use crate::events::{Command, ControlEvent};

/// Read one command word per line and forward it until EOF or until the
/// controller hangs up. Returns how many commands were forwarded.
///
/// Blocks; call from a plain thread or `spawn_blocking`.
pub fn forward_commands<R: BufRead>(reader: R, tx: &Sender<ControlEvent>) -> io::Result<usize> {
    let mut sent = 0;
    for line in reader.lines() {
        let line = line?;
        match line.parse::<Command>() {
            Ok(cmd) => {
                if tx.blocking_send(ControlEvent::Command(cmd)).is_err() {
                    break;
                }
                sent += 1;
            }
            Err(err) => warn!("{err}"),
        }
    }
    Ok(sent)
}
