//! A bounded producer/consumer rate limiter: each registered downstream
//! gets a demand counter that a replenishment timer tops up by a fixed
//! amount on a fixed interval. Callers that try to acquire demand while the
//! counter is at zero wait until the next replenishment.
//!
//! Wiring this in front of an RPC client is optional — a client may instead
//! call its transport directly with no limiter in the path.

use {
    std::{collections::HashMap, collections::VecDeque, time::Duration},
    tokio::sync::{mpsc, oneshot},
};

pub type SubscriberId = u64;

enum Command {
    Register {
        reply: oneshot::Sender<SubscriberId>,
    },
    Acquire {
        id: SubscriberId,
        reply: oneshot::Sender<()>,
    },
}

#[derive(Clone)]
pub struct RateLimiterHandle {
    command_tx: mpsc::UnboundedSender<Command>,
}

impl RateLimiterHandle {
    /// Registers a new downstream, starting with zero demand.
    pub async fn register(&self) -> SubscriberId {
        let (reply, rx) = oneshot::channel();
        let _ = self.command_tx.send(Command::Register { reply });
        rx.await.expect("rate limiter task is alive")
    }

    /// Waits until `id` has at least one unit of demand, then consumes it.
    pub async fn acquire(&self, id: SubscriberId) {
        let (reply, rx) = oneshot::channel();
        let _ = self.command_tx.send(Command::Acquire { id, reply });
        rx.await.expect("rate limiter task is alive")
    }
}

struct Subscriber {
    demand: u32,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Spawns the limiter task. `replenish_amount` units of demand are added to
/// every registered subscriber every `replenish_interval`, capped at
/// `max_demand` so idle subscribers don't accumulate unbounded credit.
pub fn spawn(replenish_amount: u32, replenish_interval: Duration, max_demand: u32) -> RateLimiterHandle {
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<Command>();

    tokio::spawn(async move {
        let mut subscribers: HashMap<SubscriberId, Subscriber> = HashMap::new();
        let mut next_id: SubscriberId = 0;
        let mut interval = tokio::time::interval(replenish_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(Command::Register { reply }) => {
                            let id = next_id;
                            next_id += 1;
                            subscribers.insert(
                                id,
                                Subscriber { demand: 0, waiters: VecDeque::new() },
                            );
                            let _ = reply.send(id);
                        }
                        Some(Command::Acquire { id, reply }) => {
                            if let Some(subscriber) = subscribers.get_mut(&id) {
                                if subscriber.demand > 0 {
                                    subscriber.demand -= 1;
                                    let _ = reply.send(());
                                } else {
                                    subscriber.waiters.push_back(reply);
                                }
                            }
                        }
                        None => break,
                    }
                }
                _ = interval.tick() => {
                    for subscriber in subscribers.values_mut() {
                        let mut credit = replenish_amount;
                        while credit > 0 {
                            match subscriber.waiters.pop_front() {
                                Some(waiter) => {
                                    let _ = waiter.send(());
                                    credit -= 1;
                                }
                                None => {
                                    subscriber.demand = (subscriber.demand + credit).min(max_demand);
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        }
    });

    RateLimiterHandle { command_tx }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn acquire_blocks_until_replenishment() {
        let limiter = spawn(1, Duration::from_millis(10), 5);
        let id = limiter.register().await;

        let limiter2 = limiter.clone();
        let acquired = tokio::spawn(async move {
            limiter2.acquire(id).await;
        });

        tokio::time::advance(Duration::from_millis(10)).await;
        tokio::time::timeout(Duration::from_millis(50), acquired)
            .await
            .expect("acquire should resolve after replenishment")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn demand_is_capped_at_max() {
        let limiter = spawn(10, Duration::from_millis(10), 3);
        let id = limiter.register().await;

        for _ in 0..5 {
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        // Draining at most `max_demand` acquisitions should succeed immediately.
        for _ in 0..3 {
            tokio::time::timeout(Duration::from_millis(1), limiter.acquire(id))
                .await
                .expect("should have banked demand");
        }
    }
}
