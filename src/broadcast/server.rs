use crate::broadcast::types::{MarketEvent, PositionEvent, WSEvent};
use crate::config::broadcast::WebsocketConfig;
use crate::engine::traits::PersistenceSink;
use crate::model::AuditEvent;
use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const POSITION_HISTORY: usize = 50;

/// State replayed to every new connection.
#[derive(Default)]
struct Cache {
    config: Option<WSEvent>,
    summary: Option<WSEvent>,
    market_update: Option<WSEvent>,
    position_history: VecDeque<WSEvent>,
}

impl Cache {
    fn remember(&mut self, event: &WSEvent) {
        match event {
            WSEvent::Config(_) => self.config = Some(event.clone()),
            WSEvent::Summary(_) => self.summary = Some(event.clone()),
            // So UI has price immediately
            WSEvent::MarketUpdate(_) => self.market_update = Some(event.clone()),
            WSEvent::PositionUpdate(_) => {
                if self.position_history.len() >= POSITION_HISTORY {
                    self.position_history.pop_front();
                }
                self.position_history.push_back(event.clone());
            }
            WSEvent::Error(_) => {}
        }
    }

    fn replay(&self) -> Vec<WSEvent> {
        self.config
            .iter()
            .chain(self.summary.iter())
            .chain(self.market_update.iter())
            .chain(self.position_history.iter())
            .cloned()
            .collect()
    }
}

#[derive(Clone)]
pub struct StatusBroadcaster {
    sender: broadcast::Sender<WSEvent>,
    cache: Arc<Mutex<Cache>>,
}

impl StatusBroadcaster {
    pub fn new(config: Option<WebsocketConfig>) -> Self {
        let (sender, _) = broadcast::channel(100);
        let cache = Arc::new(Mutex::new(Cache::default()));

        if let Some(conf) = config {
            let sender_clone = sender.clone();
            let cache_clone = cache.clone();
            tokio::spawn(async move {
                if let Err(e) = run_server(conf.host, conf.port, sender_clone, cache_clone).await {
                    error!("WebSocket Server failed: {}", e);
                }
            });
        }

        Self { sender, cache }
    }

    pub fn send(&self, event: WSEvent) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remember(&event);
        }
        // We ignore "channel closed" errors as we might not have any subscribers
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WSEvent> {
        self.sender.subscribe()
    }
}

impl PersistenceSink for StatusBroadcaster {
    fn record(&self, event: &AuditEvent) {
        let ws_event = match event {
            AuditEvent::PriceSample(sample) => WSEvent::MarketUpdate(MarketEvent {
                price: sample.price,
                tick: sample.tick,
            }),
            AuditEvent::PositionOpened { slot, position } => {
                WSEvent::PositionUpdate(PositionEvent {
                    slot: slot.to_string(),
                    action: "OPENED".to_string(),
                    token_id: Some(position.token_id.to_string()),
                    amount0: position.principal_amount0.to_string(),
                    amount1: position.principal_amount1.to_string(),
                })
            }
            AuditEvent::PositionClosed {
                slot,
                token_id,
                amount0,
                amount1,
            } => WSEvent::PositionUpdate(PositionEvent {
                slot: slot.to_string(),
                action: "CLOSED".to_string(),
                token_id: Some(token_id.to_string()),
                amount0: amount0.to_string(),
                amount1: amount1.to_string(),
            }),
            AuditEvent::FeesCollected {
                slot,
                token_id,
                fees0,
                fees1,
            } => WSEvent::PositionUpdate(PositionEvent {
                slot: slot.to_string(),
                action: "FEES".to_string(),
                token_id: Some(token_id.to_string()),
                amount0: fees0.to_string(),
                amount1: fees1.to_string(),
            }),
            AuditEvent::Swap {
                amount_in,
                amount_out,
                ..
            } => WSEvent::PositionUpdate(PositionEvent {
                slot: "wallet".to_string(),
                action: "SWAP".to_string(),
                token_id: None,
                amount0: amount_in.to_string(),
                amount1: amount_out.to_string(),
            }),
            AuditEvent::CycleFailed { reason, .. } => WSEvent::Error(reason.clone()),
        };
        self.send(ws_event);
    }
}

async fn run_server(
    host: String,
    port: u16,
    sender: broadcast::Sender<WSEvent>,
    cache: Arc<Mutex<Cache>>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket Status Server listening on: ws://{}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let rx = sender.subscribe();
        let initial = cache.lock().map(|c| c.replay()).unwrap_or_default();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, rx, initial).await {
                warn!("Error handling connection from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    mut rx: broadcast::Receiver<WSEvent>,
    initial: Vec<WSEvent>,
) -> anyhow::Result<()> {
    info!("New WebSocket connection: {}", peer_addr);

    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Config, summary, last price, then recent position history
    for event in initial {
        let json_str = serde_json::to_string(&event)?;
        ws_sender.send(Message::Text(json_str)).await?;
    }

    loop {
        tokio::select! {
            msg_res = rx.recv() => {
                match msg_res {
                    Ok(event) => {
                         let json_str = serde_json::to_string(&event)?;
                         ws_sender.send(Message::Text(json_str)).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        warn!("Client {} lagged by {} messages", peer_addr, count);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            client_msg = ws_receiver.next() => {
                match client_msg {
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PriceSample, Slot};
    use ethers::types::U256;

    #[tokio::test]
    async fn test_sink_events_reach_subscribers_and_cache() {
        let broadcaster = StatusBroadcaster::new(None);
        let mut rx = broadcaster.subscribe();

        broadcaster.record(&AuditEvent::PriceSample(PriceSample {
            price: 2500.0,
            tick: -198_080,
            sqrt_price_x96: U256::zero(),
            timestamp: 0,
        }));
        broadcaster.record(&AuditEvent::PositionClosed {
            slot: Slot::Lower,
            token_id: U256::from(5u64),
            amount0: 0,
            amount1: 42,
        });

        match rx.recv().await.unwrap() {
            WSEvent::MarketUpdate(m) => assert_eq!(m.tick, -198_080),
            other => panic!("unexpected {:?}", other),
        }
        match rx.recv().await.unwrap() {
            WSEvent::PositionUpdate(p) => {
                assert_eq!(p.slot, "lower");
                assert_eq!(p.action, "CLOSED");
                assert_eq!(p.amount1, "42");
            }
            other => panic!("unexpected {:?}", other),
        }

        let replay = broadcaster.cache.lock().unwrap().replay();
        assert_eq!(replay.len(), 2);
        assert!(matches!(replay[0], WSEvent::MarketUpdate(_)));
    }

    #[test]
    fn test_position_history_is_bounded() {
        let mut cache = Cache::default();
        for i in 0..(POSITION_HISTORY + 10) {
            cache.remember(&WSEvent::PositionUpdate(PositionEvent {
                slot: "upper".to_string(),
                action: "OPENED".to_string(),
                token_id: Some(i.to_string()),
                amount0: "0".to_string(),
                amount1: "0".to_string(),
            }));
        }
        assert_eq!(cache.position_history.len(), POSITION_HISTORY);
        assert_eq!(cache.replay().len(), POSITION_HISTORY);
    }
}
