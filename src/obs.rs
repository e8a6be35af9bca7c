//! OBS Studio, via obs-websocket
//!
//! Events arrive on the listener task.  Anything that affects the recording session is handed to
//! the session task through its [`SessionHandle`] rather than applied here.

use crate::{
    config::Config, log_error, log_obs, log_warn, replay::ReplayEvent, session::SessionHandle,
};
use anyhow::{anyhow, Result};
use futures::StreamExt;
use obws::events::Event;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{Notify, RwLock};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Lets commands stop the listener and check whether it is still up.
#[derive(Clone)]
pub struct ObsHandle {
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl ObsHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns false if the listener had already stopped.
    pub fn disconnect(&self) -> bool {
        let was_running = self.is_running();
        // Stores a permit should the listener not be waiting right now
        self.shutdown.notify_one();
        was_running
    }
}

pub struct Observer {
    client: obws::Client,
    session: SessionHandle,
    cfg: Arc<RwLock<Config>>,
    handle: ObsHandle,
}

/// Check something is listening before handing over to the websocket client, whose failure for
/// a closed port is less helpful.
async fn probe(host: &str, port: u16) -> Result<()> {
    match tokio::time::timeout(PROBE_TIMEOUT, tokio::net::TcpStream::connect((host, port))).await
    {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(anyhow!(
            "OBS is not running on {}:{} (Is the host and port correct?): {}",
            host,
            port,
            e
        )),
        Err(_) => Err(anyhow!(
            "OBS did not answer on {}:{} within {}s",
            host,
            port,
            PROBE_TIMEOUT.as_secs()
        )),
    }
}

impl Observer {
    /// Connect to OBS.  Failing here is fatal; without OBS there is nothing to announce.
    pub async fn connect(cfg: Arc<RwLock<Config>>, session: SessionHandle) -> Result<Self> {
        let client = {
            let cfg = cfg.read().await;
            let (host, port) = (cfg.obs.host.as_str(), cfg.obs.port);

            log_obs!("Connecting to OBS on {}:{}...", host, port);
            probe(host, port).await?;

            obws::Client::connect(host, port, cfg.obs_password())
                .await
                .map_err(|e| {
                    anyhow!(
                        "Could not connect to OBS on {}:{} (Is the password correct?): {}",
                        host,
                        port,
                        e
                    )
                })?
        };
        log_obs!("Connected to OBS");

        Ok(Self {
            client,
            session,
            cfg,
            handle: ObsHandle {
                shutdown: Arc::new(Notify::new()),
                running: Arc::new(AtomicBool::new(true)),
            },
        })
    }

    pub fn handle(&self) -> ObsHandle {
        self.handle.clone()
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let running = self.handle.running.clone();
            if let Err(e) = self.run().await {
                log_error!("OBS listener failed: {}", e);
            }
            running.store(false, Ordering::SeqCst);
        })
    }

    async fn run(self) -> Result<()> {
        let events = self.client.events()?;
        let mut events = std::pin::pin!(events);
        log_obs!("Listening for replay buffer saves");

        loop {
            tokio::select! {
                _ = self.handle.shutdown.notified() => {
                    log_obs!("Disconnecting from OBS");
                    break;
                }
                event = events.next() => match event {
                    Some(Event::ReplayBufferSaved { path }) => self.replay_saved(path).await,
                    Some(Event::ExitStarted) => {
                        log_warn!("OBS closing, disconnecting...");
                        break;
                    }
                    Some(_) => {}
                    None => {
                        log_warn!("OBS event stream ended");
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    async fn replay_saved(&self, path: PathBuf) {
        let clips = self.cfg.read().await.clips.clone();

        let event = match ReplayEvent::capture(path, &clips).await {
            Ok(event) => event,
            Err(e) => {
                log_warn!("Dropping replay: {}", e);
                return;
            }
        };

        log_obs!(
            "Replay Buffer Saved: `{}` (file size: {} MB); Active Window: {}",
            event.path.to_string_lossy(),
            event.size_mb,
            event.active_window,
        );

        if let Err(e) = self.session.replay_saved(event).await {
            log_error!("Could not hand replay to session: {}", e);
        }
    }
}
