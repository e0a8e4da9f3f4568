use super::channel::{BroadcastChannel, BroadcastSubscription, LocalBroadcastHub};
use crate::error::CoordinatorError;
use model::broadcast::BroadcastEnvelope;
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{net::UnixDatagram, task::JoinHandle};
use tracing::{debug, warn};
use uuid::Uuid;

const SOCKET_EXTENSION: &str = "sock";
const MAX_FRAME: usize = 1024;

/// Channel between processes of one user on one host.
///
/// Every context binds its own datagram socket in a shared directory. A post
/// is sent to every other socket found there and to the local subscribers;
/// received frames are fanned out in-process, so subscribers see the same
/// stream a [`LocalBroadcastHub`] would give them. Sockets left behind by
/// contexts that exited without cleanup are removed on the first refused send.
pub struct SocketBroadcastChannel {
    dir: PathBuf,
    path: PathBuf,
    socket: Arc<UnixDatagram>,
    local: LocalBroadcastHub,
    reader: JoinHandle<()>,
}

impl SocketBroadcastChannel {
    /// Binds a fresh socket in `dir`, creating the directory when needed.
    /// Must be called from within a Tokio runtime.
    pub fn bind(dir: &Path) -> Result<Self, CoordinatorError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.{SOCKET_EXTENSION}", Uuid::new_v4().simple()));
        let socket = Arc::new(UnixDatagram::bind(&path)?);
        let local = LocalBroadcastHub::default();
        let reader = tokio::spawn(read_frames(socket.clone(), local.clone()));

        debug!(path = %path.display(), "Bound coordination socket");
        Ok(Self {
            dir: dir.to_path_buf(),
            path,
            socket,
            local,
            reader,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn peers(&self) -> io::Result<Vec<PathBuf>> {
        let mut peers = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path != self.path && path.extension().is_some_and(|ext| ext == SOCKET_EXTENSION) {
                peers.push(path);
            }
        }
        Ok(peers)
    }
}

impl BroadcastChannel for SocketBroadcastChannel {
    fn post(&self, envelope: BroadcastEnvelope) -> Result<(), CoordinatorError> {
        let frame = serde_json::to_vec(&envelope)?;

        for peer in self.peers()? {
            match self.socket.try_send_to(&frame, &peer) {
                Ok(_) => {}
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                    ) =>
                {
                    debug!(peer = %peer.display(), "Removing stale coordination socket");
                    if let Err(err) = fs::remove_file(&peer) {
                        debug!(peer = %peer.display(), error = %err, "Stale socket already gone");
                    }
                }
                Err(err) => {
                    warn!(peer = %peer.display(), error = %err, "Failed to reach peer context")
                }
            }
        }

        match self.local.post(envelope) {
            Ok(()) | Err(CoordinatorError::NoListeners) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn subscribe(&self) -> Box<dyn BroadcastSubscription> {
        self.local.subscribe()
    }
}

impl Drop for SocketBroadcastChannel {
    fn drop(&mut self) {
        self.reader.abort();
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "Failed to remove coordination socket");
        }
    }
}

async fn read_frames(socket: Arc<UnixDatagram>, local: LocalBroadcastHub) {
    let mut buf = vec![0u8; MAX_FRAME];
    loop {
        let len = match socket.recv(&mut buf).await {
            Ok(len) => len,
            Err(err) => {
                warn!(error = %err, "Coordination socket failed, reader stopped");
                return;
            }
        };

        match serde_json::from_slice::<BroadcastEnvelope>(&buf[..len]) {
            Ok(envelope) => {
                if local.post(envelope).is_err() {
                    debug!(origin = %envelope.origin, "No local subscriber for peer frame");
                }
            }
            Err(err) => warn!(error = %err, "Ignoring malformed coordination frame"),
        }
    }
}
