//! Polls `getSignatureStatuses` on a timer until every signature in a
//! subscription either confirms to the requested commitment or fails,
//! running as its own task with its own mailbox and owned subscription map.

use {
    keel_signature::Signature,
    std::{collections::HashMap, future::Future, pin::Pin, sync::Arc, time::Duration},
    tokio::sync::mpsc,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    fn level(self) -> u8 {
        match self {
            Commitment::Processed => 0,
            Commitment::Confirmed => 1,
            Commitment::Finalized => 2,
        }
    }

    /// Does a status actually observed at `self` satisfy a caller who
    /// requested `requested`? Per the commitment matrix, higher observed
    /// levels satisfy lower requests.
    pub fn meets(self, requested: Commitment) -> bool {
        self.level() >= requested.level()
    }
}

#[derive(Debug, Clone)]
pub struct SignatureStatus {
    pub err: Option<String>,
    pub confirmation_status: Option<Commitment>,
}

type StatusFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<Option<SignatureStatus>>, String>> + Send + 'a>>;

/// Anything that can answer `getSignatureStatuses` for a batch of
/// signatures. Implemented by the RPC client so this crate stays
/// independent of any particular transport.
pub trait StatusSource: Send + Sync {
    fn get_signature_statuses<'a>(&'a self, signatures: &'a [Signature]) -> StatusFuture<'a>;
}

enum Outcome {
    Failed,
    Done(Commitment),
    Retry,
}

fn classify(requested: Commitment, status: Option<SignatureStatus>) -> Outcome {
    match status {
        Some(SignatureStatus { err: Some(_), .. }) => Outcome::Failed,
        Some(SignatureStatus {
            err: None,
            confirmation_status: Some(actual),
        }) if actual.meets(requested) => Outcome::Done(actual),
        _ => Outcome::Retry,
    }
}

struct Subscription {
    remaining: Vec<Signature>,
    commitment: Commitment,
    notify: mpsc::UnboundedSender<Vec<Signature>>,
}

enum Command {
    Subscribe(Subscription),
}

pub struct TrackerHandle {
    command_tx: mpsc::UnboundedSender<Command>,
}

impl TrackerHandle {
    /// Subscribes `signatures` at `commitment`; the returned receiver
    /// yields one batch per tick that newly reached the requested
    /// commitment (order preserved from the poll response), and closes once
    /// every signature has either confirmed or failed.
    pub fn subscribe(
        &self,
        signatures: Vec<Signature>,
        commitment: Commitment,
    ) -> mpsc::UnboundedReceiver<Vec<Signature>> {
        let (notify, receiver) = mpsc::unbounded_channel();
        let _ = self.command_tx.send(Command::Subscribe(Subscription {
            remaining: signatures,
            commitment,
            notify,
        }));
        receiver
    }
}

/// Spawns the tracker task. The task owns its subscription map exclusively;
/// all interaction happens through the returned handle's mailbox.
pub fn spawn<S: StatusSource + 'static>(
    status_source: Arc<S>,
    poll_interval: Duration,
) -> TrackerHandle {
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<Command>();

    tokio::spawn(async move {
        let mut subscriptions: HashMap<u64, Subscription> = HashMap::new();
        let mut next_id: u64 = 0;
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(Command::Subscribe(subscription)) => {
                            subscriptions.insert(next_id, subscription);
                            next_id += 1;
                        }
                        None => break,
                    }
                }
                _ = interval.tick() => {
                    let mut finished = Vec::new();
                    for (id, subscription) in subscriptions.iter_mut() {
                        let statuses = match status_source
                            .get_signature_statuses(&subscription.remaining)
                            .await
                        {
                            Ok(statuses) => statuses,
                            Err(err) => {
                                log::warn!("getSignatureStatuses failed: {err}");
                                continue;
                            }
                        };

                        let mut done = Vec::new();
                        let mut retry = Vec::new();
                        for (signature, status) in
                            subscription.remaining.drain(..).zip(statuses).collect::<Vec<_>>()
                        {
                            match classify(subscription.commitment, status) {
                                Outcome::Failed => {}
                                Outcome::Done(_) => done.push(signature),
                                Outcome::Retry => retry.push(signature),
                            }
                        }
                        subscription.remaining = retry;

                        if !done.is_empty() {
                            let _ = subscription.notify.send(done);
                        }
                        if subscription.remaining.is_empty() {
                            finished.push(*id);
                        }
                    }
                    for id in finished {
                        subscriptions.remove(&id);
                    }
                }
            }
        }
    });

    TrackerHandle { command_tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedSource {
        responses: Mutex<Vec<Vec<Option<SignatureStatus>>>>,
    }

    impl StatusSource for ScriptedSource {
        fn get_signature_statuses<'a>(&'a self, _signatures: &'a [Signature]) -> StatusFuture<'a> {
            Box::pin(async move {
                let mut responses = self.responses.lock().unwrap();
                if responses.is_empty() {
                    Ok(vec![])
                } else {
                    Ok(responses.remove(0))
                }
            })
        }
    }

    #[test]
    fn commitment_matrix_matches_spec() {
        assert!(Commitment::Processed.meets(Commitment::Processed));
        assert!(!Commitment::Processed.meets(Commitment::Confirmed));
        assert!(Commitment::Confirmed.meets(Commitment::Processed));
        assert!(Commitment::Confirmed.meets(Commitment::Confirmed));
        assert!(!Commitment::Confirmed.meets(Commitment::Finalized));
        assert!(Commitment::Finalized.meets(Commitment::Finalized));
    }

    #[tokio::test(start_paused = true)]
    async fn subscription_notifies_once_confirmed_then_closes() {
        let sig = Signature::from_bytes([9u8; 64]);
        let source = Arc::new(ScriptedSource {
            responses: Mutex::new(vec![
                vec![None],
                vec![Some(SignatureStatus {
                    err: None,
                    confirmation_status: Some(Commitment::Finalized),
                })],
            ]),
        });
        let handle = spawn(source, Duration::from_millis(10));
        let mut receiver = handle.subscribe(vec![sig], Commitment::Confirmed);

        tokio::time::advance(Duration::from_millis(10)).await;
        tokio::time::advance(Duration::from_millis(10)).await;

        let batch = receiver.recv().await.unwrap();
        assert_eq!(batch, vec![sig]);
    }
}
