//! Redis Streams broker
//!
//! Messages live in a stream read through a consumer group. Settling a delivery
//! removes it from the pending list and from the stream in one atomic pipeline; a
//! requeue appends a fresh copy at the tail.

use super::broker::QueueBroker;
use super::types::{BrokerDelivery, QueuedMessage};
use crate::config::models::queue::QueueConfig;
use crate::utils::error::{RelayError, Result};
use crate::utils::sanitize_url;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use redis::streams::{
    StreamClaimReply, StreamId, StreamMaxlen, StreamPendingCountReply, StreamReadOptions,
    StreamReadReply,
};
use redis::{AsyncCommands, Client};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const DATA_FIELD: &str = "data";

#[derive(Clone)]
struct Connections {
    /// Short commands
    commands: MultiplexedConnection,
    /// Blocking XREADGROUP calls
    consumer: MultiplexedConnection,
}

/// Broker backed by a Redis stream and consumer group
pub struct RedisStreamBroker {
    config: QueueConfig,
    connections: RwLock<Option<Connections>>,
    connected: AtomicBool,
    last_claim: Mutex<Option<Instant>>,
}

impl RedisStreamBroker {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            connections: RwLock::new(None),
            connected: AtomicBool::new(false),
            last_claim: Mutex::new(None),
        }
    }

    async fn connections(&self) -> Result<Connections> {
        self.connections
            .read()
            .await
            .clone()
            .ok_or_else(|| RelayError::broker("redis broker is not connected"))
    }

    async fn bounded<T, F>(&self, what: &str, future: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.config.operation_timeout(), future).await {
            Ok(result) => result.map_err(RelayError::Redis),
            Err(_) => Err(RelayError::timeout(format!(
                "redis {} exceeded {}ms",
                what, self.config.operation_timeout_ms
            ))),
        }
    }

    fn encode(message: &QueuedMessage) -> Result<String> {
        Ok(serde_json::to_string(message)?)
    }

    fn maxlen(&self) -> StreamMaxlen {
        StreamMaxlen::Approx(self.config.max_length)
    }

    /// Take over entries another consumer left pending for too long
    async fn reclaim_stale(&self, conn: &mut MultiplexedConnection, max: usize) -> Result<Vec<StreamId>> {
        let idle = Duration::from_millis(self.config.claim_idle_ms);
        {
            let mut last = self.last_claim.lock();
            if last.is_some_and(|at| at.elapsed() < idle / 2) {
                return Ok(Vec::new());
            }
            *last = Some(Instant::now());
        }

        let pending: StreamPendingCountReply = self
            .bounded(
                "XPENDING",
                conn.xpending_count(&self.config.stream, &self.config.consumer_group, "-", "+", max),
            )
            .await?;

        let stale: Vec<String> = pending
            .ids
            .into_iter()
            .filter(|entry| entry.last_delivered_ms as u64 >= self.config.claim_idle_ms)
            .map(|entry| entry.id)
            .collect();
        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let claimed: StreamClaimReply = self
            .bounded(
                "XCLAIM",
                conn.xclaim(
                    &self.config.stream,
                    &self.config.consumer_group,
                    &self.config.consumer_name,
                    self.config.claim_idle_ms,
                    stale.as_slice(),
                ),
            )
            .await?;

        if !claimed.ids.is_empty() {
            info!(count = claimed.ids.len(), "Reclaimed stale pending messages");
        }
        Ok(claimed.ids)
    }

    /// Decode stream entries; undecodable ones are dead-lettered on the spot
    async fn decode_entries(
        &self,
        conn: &mut MultiplexedConnection,
        entries: Vec<StreamId>,
    ) -> Result<Vec<BrokerDelivery>> {
        let mut deliveries = Vec::with_capacity(entries.len());
        for entry in entries {
            let raw: Option<String> = entry.get(DATA_FIELD);
            let decoded = raw
                .as_deref()
                .map(serde_json::from_str::<QueuedMessage>)
                .transpose();

            match decoded {
                Ok(Some(message)) => deliveries.push(BrokerDelivery {
                    tag: entry.id,
                    message,
                }),
                Ok(None) | Err(_) => {
                    warn!(entry_id = %entry.id, "Undecodable stream entry, moving to dead-letter stream");
                    let mut pipe = redis::pipe();
                    pipe.atomic()
                        .xadd(
                            &self.config.dead_letter_stream,
                            "*",
                            &[
                                (DATA_FIELD, raw.unwrap_or_default()),
                                ("reason", "undecodable message".to_string()),
                                ("failed_at", Utc::now().to_rfc3339()),
                            ],
                        )
                        .ignore()
                        .xack(&self.config.stream, &self.config.consumer_group, &[&entry.id])
                        .ignore()
                        .xdel(&self.config.stream, &[&entry.id])
                        .ignore();
                    let _: () = self.bounded("dead-letter", pipe.query_async(conn)).await?;
                }
            }
        }
        Ok(deliveries)
    }

    async fn settle_with(
        &self,
        delivery: &BrokerDelivery,
        target_stream: &str,
        fields: &[(&str, String)],
        maxlen: Option<StreamMaxlen>,
    ) -> Result<()> {
        let mut conn = self.connections().await?.commands;
        let mut pipe = redis::pipe();
        pipe.atomic();
        match maxlen {
            Some(maxlen) => pipe.xadd_maxlen(target_stream, maxlen, "*", fields).ignore(),
            None => pipe.xadd(target_stream, "*", fields).ignore(),
        };
        pipe.xack(&self.config.stream, &self.config.consumer_group, &[&delivery.tag])
            .ignore()
            .xdel(&self.config.stream, &[&delivery.tag])
            .ignore();

        self.bounded("settle", pipe.query_async(&mut conn)).await
    }
}

#[async_trait]
impl QueueBroker for RedisStreamBroker {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn connect(&self) -> Result<()> {
        info!("Connecting to Redis stream broker");
        debug!("Redis URL: {}", sanitize_url(&self.config.redis_url));

        let client = Client::open(self.config.redis_url.as_str()).map_err(RelayError::Redis)?;

        let establish = async {
            let commands = client.get_multiplexed_async_connection().await?;
            let consumer = client.get_multiplexed_async_connection().await?;
            Ok::<_, redis::RedisError>(Connections { commands, consumer })
        };
        let mut connections = match tokio::time::timeout(self.config.connect_timeout(), establish).await {
            Ok(result) => result.map_err(RelayError::Redis)?,
            Err(_) => {
                return Err(RelayError::timeout(format!(
                    "redis connect exceeded {}ms",
                    self.config.connect_timeout_ms
                )));
            }
        };

        let create = connections.commands.xgroup_create_mkstream::<_, _, _, ()>(
            &self.config.stream,
            &self.config.consumer_group,
            "0",
        );
        match tokio::time::timeout(self.config.operation_timeout(), create).await {
            Ok(Ok(())) => info!(group = %self.config.consumer_group, "Consumer group created"),
            Ok(Err(e)) if e.code() == Some("BUSYGROUP") => {
                debug!(group = %self.config.consumer_group, "Consumer group already exists")
            }
            Ok(Err(e)) => return Err(RelayError::Redis(e)),
            Err(_) => return Err(RelayError::timeout("redis XGROUP CREATE timed out")),
        }

        *self.connections.write().await = Some(connections);
        self.connected.store(true, Ordering::Release);
        info!(stream = %self.config.stream, "Redis stream broker connected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn publish(&self, message: &QueuedMessage) -> Result<()> {
        let mut conn = self.connections().await?.commands;
        let payload = Self::encode(message)?;
        let entry_id: String = self
            .bounded(
                "XADD",
                conn.xadd_maxlen(&self.config.stream, self.maxlen(), "*", &[(DATA_FIELD, payload)]),
            )
            .await?;
        debug!(message_id = %message.id, entry_id = %entry_id, "Message published to stream");
        Ok(())
    }

    async fn fetch(&self, max: usize, block: Duration) -> Result<Vec<BrokerDelivery>> {
        let Connections {
            mut commands,
            mut consumer,
        } = self.connections().await?;

        let reclaimed = self.reclaim_stale(&mut commands, max).await?;
        if !reclaimed.is_empty() {
            return self.decode_entries(&mut commands, reclaimed).await;
        }

        let mut options = StreamReadOptions::default()
            .group(&self.config.consumer_group, &self.config.consumer_name)
            .count(max);
        // BLOCK 0 would wait forever
        if !block.is_zero() {
            options = options.block(block.as_millis() as usize);
        }

        let streams = [self.config.stream.as_str()];
        let ids = [">"];
        let read = consumer.xread_options(&streams, &ids, &options);
        let reply: Option<StreamReadReply> =
            match tokio::time::timeout(block + self.config.operation_timeout(), read).await {
                Ok(result) => result.map_err(RelayError::Redis)?,
                Err(_) => return Err(RelayError::timeout("redis XREADGROUP timed out")),
            };

        let entries: Vec<StreamId> = reply
            .map(|reply| reply.keys.into_iter().flat_map(|key| key.ids).collect())
            .unwrap_or_default();
        self.decode_entries(&mut commands, entries).await
    }

    async fn ack(&self, delivery: &BrokerDelivery) -> Result<()> {
        let mut conn = self.connections().await?.commands;
        let mut pipe = redis::pipe();
        pipe.atomic()
            .xack(&self.config.stream, &self.config.consumer_group, &[&delivery.tag])
            .ignore()
            .xdel(&self.config.stream, &[&delivery.tag])
            .ignore();
        self.bounded("ack", pipe.query_async(&mut conn)).await
    }

    async fn requeue(&self, delivery: &BrokerDelivery, count_attempt: bool) -> Result<()> {
        let mut message = delivery.message.clone();
        if count_attempt {
            message.retry_count += 1;
        }
        let payload = Self::encode(&message)?;
        self.settle_with(
            delivery,
            &self.config.stream,
            &[(DATA_FIELD, payload)],
            Some(self.maxlen()),
        )
        .await
    }

    async fn dead_letter(&self, delivery: &BrokerDelivery, reason: &str) -> Result<()> {
        let payload = Self::encode(&delivery.message)?;
        let result = self
            .settle_with(
                delivery,
                &self.config.dead_letter_stream,
                &[
                    (DATA_FIELD, payload),
                    ("reason", reason.to_string()),
                    ("failed_at", Utc::now().to_rfc3339()),
                ],
                None,
            )
            .await;
        if let Err(e) = &result {
            error!(message_id = %delivery.message.id, error = %e, "Failed to dead-letter message");
        }
        result
    }

    async fn depth(&self) -> Result<usize> {
        let mut conn = self.connections().await?.commands;
        self.bounded("XLEN", conn.xlen(&self.config.stream)).await
    }

    async fn dead_letter_depth(&self) -> Result<usize> {
        let mut conn = self.connections().await?.commands;
        self.bounded("XLEN", conn.xlen(&self.config.dead_letter_stream))
            .await
    }

    async fn purge(&self) -> Result<usize> {
        let mut conn = self.connections().await?.commands;
        let removed: usize = self
            .bounded("XTRIM", conn.xtrim(&self.config.stream, StreamMaxlen::Equals(0)))
            .await?;
        info!(removed, stream = %self.config.stream, "Stream purged");
        Ok(removed)
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        self.connections.write().await.take();
        info!("Redis stream broker closed");
        Ok(())
    }
}
