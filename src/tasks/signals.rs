//! Unix signals as control events: SIGUSR1 advances, SIGUSR2 goes back,
//! SIGTERM, SIGINT and SIGQUIT shut the slideshow down.

use anyhow::Result;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::ControlEvent;

#[cfg(unix)]
pub async fn run(tx: Sender<ControlEvent>, cancel: CancellationToken) -> Result<()> {
    use anyhow::Context;
    use tokio::signal::unix::{SignalKind, signal};

    use crate::events::Command;
    use crate::navigation::Directive;

    let mut usr1 = signal(SignalKind::user_defined1()).context("failed to register SIGUSR1")?;
    let mut usr2 = signal(SignalKind::user_defined2()).context("failed to register SIGUSR2")?;
    let mut term = signal(SignalKind::terminate()).context("failed to register SIGTERM")?;
    let mut int = signal(SignalKind::interrupt()).context("failed to register SIGINT")?;
    let mut quit = signal(SignalKind::quit()).context("failed to register SIGQUIT")?;

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            Some(()) = usr1.recv() => {
                info!("SIGUSR1 received; next slide");
                ControlEvent::Command(Command::Change(Directive::Next))
            }
            Some(()) = usr2.recv() => {
                info!("SIGUSR2 received; previous slide");
                ControlEvent::Command(Command::Change(Directive::Prev))
            }
            Some(()) = term.recv() => ControlEvent::Shutdown,
            Some(()) = int.recv() => ControlEvent::Shutdown,
            Some(()) = quit.recv() => ControlEvent::Shutdown,
        };
        if tx.send(event).await.is_err() {
            debug!("controller gone; signal forwarder exiting");
            break;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn run(tx: Sender<ControlEvent>, cancel: CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("ctrl-c received; initiating shutdown");
            if tx.send(ControlEvent::Shutdown).await.is_err() {
                debug!("controller gone");
            }
        }
    }
    Ok(())
}
