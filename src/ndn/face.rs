//! The request/response primitive every role talks through.
//!
//! [`DummyNetwork`] is an in-memory forwarder: faces register name prefixes
//! and receive the matching interests on a channel, and an interest is
//! delivered to the longest registered prefix of its name.
use std::{future::Future, sync::Arc, time::Duration};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};
use crate::config::NacAbeConfig;
use crate::error::{ErrorKind, NacAbeError};
use crate::ndn::{Data, Interest, Name};

/// An interest waiting for its answer. Dropping it without replying leaves
/// the requester to time out.
#[derive(Debug)]
pub struct PendingInterest {
    pub interest: Interest,
    responder: oneshot::Sender<Data>,
}

impl PendingInterest {
    pub fn name(&self) -> &Name {
        &self.interest.name
    }

    /// Returns false if the requester stopped waiting.
    pub fn reply(self, data: Data) -> bool {
        self.responder.send(data).is_ok()
    }
}

#[async_trait]
pub trait Face: Send + Sync {
    fn config(&self) -> &NacAbeConfig;

    /// Sends `interest` and waits for its Data, retrying timeouts as
    /// configured.
    async fn express_interest(&self, interest: Interest) -> Result<Data, NacAbeError>;

    /// Starts receiving the interests below `prefix`.
    fn register_prefix(&self, prefix: &Name) -> Result<mpsc::Receiver<PendingInterest>, NacAbeError>;

    fn unregister_prefix(&self, prefix: &Name);
}

/// Shared routing table of every [`DummyFace`] created from it.
#[derive(Clone, Debug, Default)]
pub struct DummyNetwork {
    routes: Arc<DashMap<Name, mpsc::Sender<PendingInterest>>>,
    config: NacAbeConfig,
}

impl DummyNetwork {
    pub fn new(config: NacAbeConfig) -> DummyNetwork {
        DummyNetwork { routes: Arc::new(DashMap::new()), config }
    }

    /// A face attached to this network using the network's configuration.
    pub fn face(&self) -> DummyFace {
        DummyFace { network: self.clone(), config: self.config.clone() }
    }

    pub fn face_with_config(&self, config: NacAbeConfig) -> DummyFace {
        DummyFace { network: self.clone(), config }
    }

    fn route(&self, name: &Name) -> Option<mpsc::Sender<PendingInterest>> {
        self.routes
            .iter()
            .filter(|entry| entry.key().is_prefix_of(name))
            .max_by_key(|entry| entry.key().len())
            .map(|entry| entry.value().clone())
    }
}

pub struct DummyFace {
    network: DummyNetwork,
    config: NacAbeConfig,
}

impl DummyFace {
    async fn attempt(&self, interest: &Interest, lifetime: Duration) -> Result<Data, NacAbeError> {
        let route = self
            .network
            .route(&interest.name)
            .ok_or_else(|| NacAbeError::timeout(&format!("no route for {}", interest.name)))?;
        let (responder, answer) = oneshot::channel();
        let pending = PendingInterest { interest: interest.clone(), responder };
        let exchange = async move {
            if route.send(pending).await.is_err() {
                return Err(NacAbeError::timeout(&format!("handler for {} is gone", interest.name)));
            }
            answer
                .await
                .map_err(|_| NacAbeError::timeout(&format!("{} was not answered", interest.name)))
        };
        let data = tokio::time::timeout(lifetime, exchange)
            .await
            .map_err(|_| NacAbeError::timeout(&format!("{} timed out after {:?}", interest.name, lifetime)))??;
        if !interest.name.is_prefix_of(&data.name) {
            return Err(NacAbeError::timeout(&format!("{} answered with {}", interest.name, data.name)));
        }
        Ok(data)
    }
}

#[async_trait]
impl Face for DummyFace {
    fn config(&self) -> &NacAbeConfig {
        &self.config
    }

    async fn express_interest(&self, interest: Interest) -> Result<Data, NacAbeError> {
        let lifetime = interest.lifetime.unwrap_or_else(|| self.config.interest_lifetime());
        let attempts = self.config.interest_retries + 1;
        let mut attempt = 1;
        loop {
            match self.attempt(&interest, lifetime).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    debug!(name = %interest.name, attempt, "retrying interest: {}", e.details());
                    attempt += 1;
                }
                Err(e) => {
                    warn!(name = %interest.name, attempts = attempt, "interest failed: {}", e.details());
                    return Err(e);
                }
            }
        }
    }

    fn register_prefix(&self, prefix: &Name) -> Result<mpsc::Receiver<PendingInterest>, NacAbeError> {
        if self.network.routes.contains_key(prefix) {
            return Err(NacAbeError::encoding(&format!("prefix {} is already registered", prefix)));
        }
        let (sender, receiver) = mpsc::channel(self.config.channel_capacity);
        self.network.routes.insert(prefix.clone(), sender);
        debug!(%prefix, "registered prefix");
        Ok(receiver)
    }

    fn unregister_prefix(&self, prefix: &Name) {
        self.network.routes.remove(prefix);
    }
}

/// Cooperative cancellation shared between a caller and the work it started.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        CancellationToken { state: Arc::new(state) }
    }

    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) was called.
    pub async fn cancelled(&self) {
        let mut receiver = self.state.subscribe();
        // the sender lives in `self`, so this only returns once cancelled
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

/// Runs `operation` unless `token` fires first.
pub async fn cancellable<T, F>(token: &CancellationToken, operation: F) -> Result<T, NacAbeError>
where
    F: Future<Output = Result<T, NacAbeError>>,
{
    tokio::select! {
        _ = token.cancelled() => Err(NacAbeError::new(ErrorKind::Cancelled, "operation cancelled")),
        result = operation => result,
    }
}

/// Answers the interests arriving on `receiver` until `shutdown` fires.
/// A handler returning `None` leaves the interest unanswered.
pub fn serve<H>(
    mut receiver: mpsc::Receiver<PendingInterest>,
    shutdown: CancellationToken,
    handler: H,
) -> tokio::task::JoinHandle<()>
where
    H: Fn(&Interest) -> Option<Data> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let pending = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = receiver.recv() => match next {
                    Some(pending) => pending,
                    None => break,
                },
            };
            match handler(&pending.interest) {
                Some(data) => {
                    if !pending.reply(data) {
                        debug!("requester stopped waiting");
                    }
                }
                None => debug!(name = %pending.name(), "ignoring interest"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> NacAbeConfig {
        NacAbeConfig { interest_lifetime_ms: 50, interest_retries: 1, ..NacAbeConfig::default() }
    }

    #[tokio::test]
    async fn longest_prefix_wins() {
        let network = DummyNetwork::new(quick());
        let face = network.face();
        let mut short = face.register_prefix(&"/a".parse().unwrap()).unwrap();
        let mut long = face.register_prefix(&"/a/b".parse().unwrap()).unwrap();
        tokio::spawn(async move {
            while let Some(pending) = long.recv().await {
                let name = pending.name().clone();
                pending.reply(Data::new(name, b"long".to_vec()));
            }
        });
        tokio::spawn(async move {
            while let Some(pending) = short.recv().await {
                let name = pending.name().clone();
                pending.reply(Data::new(name, b"short".to_vec()));
            }
        });
        let data = face.express_interest(Interest::new("/a/b/c".parse().unwrap())).await.unwrap();
        assert_eq!(data.content, b"long");
        let data = face.express_interest(Interest::new("/a/x".parse().unwrap())).await.unwrap();
        assert_eq!(data.content, b"short");
    }

    #[tokio::test]
    async fn unanswered_interest_times_out() {
        let network = DummyNetwork::new(quick());
        let face = network.face();
        let err = face.express_interest(Interest::new("/nobody".parse().unwrap())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let mut ignored = face.register_prefix(&"/silent".parse().unwrap()).unwrap();
        tokio::spawn(async move { while let Some(_pending) = ignored.recv().await {} });
        let err = face.express_interest(Interest::new("/silent/x".parse().unwrap())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn retries_after_timeout() {
        let network = DummyNetwork::new(quick());
        let face = network.face();
        let mut receiver = face.register_prefix(&"/flaky".parse().unwrap()).unwrap();
        tokio::spawn(async move {
            let mut seen = 0;
            while let Some(pending) = receiver.recv().await {
                seen += 1;
                if seen > 1 {
                    let name = pending.name().clone();
                    pending.reply(Data::new(name, vec![seen]));
                }
            }
        });
        let data = face.express_interest(Interest::new("/flaky".parse().unwrap())).await.unwrap();
        assert_eq!(data.content, vec![2]);
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let face = DummyNetwork::default().face();
        let prefix: Name = "/p".parse().unwrap();
        let _receiver = face.register_prefix(&prefix).unwrap();
        assert!(face.register_prefix(&prefix).is_err());
        face.unregister_prefix(&prefix);
        assert!(face.register_prefix(&prefix).is_ok());
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown() {
        let network = DummyNetwork::new(quick());
        let face = network.face();
        let shutdown = CancellationToken::new();
        let receiver = face.register_prefix(&"/echo".parse().unwrap()).unwrap();
        let task = serve(receiver, shutdown.clone(), |interest| {
            Some(Data::new(interest.name.clone(), b"pong".to_vec()))
        });
        let data = face.express_interest(Interest::new("/echo/ping".parse().unwrap())).await.unwrap();
        assert_eq!(data.content, b"pong");
        shutdown.cancel();
        task.await.unwrap();
        let err = face.express_interest(Interest::new("/echo/ping".parse().unwrap())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn cancellation_wins_over_pending_work() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        let result: Result<(), NacAbeError> = cancellable(&token, std::future::pending()).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
        let fresh = CancellationToken::new();
        assert_eq!(cancellable(&fresh, async { Ok(7) }).await.unwrap(), 7);
    }
}
