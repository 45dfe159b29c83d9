//! Processed-signature registry
//!
//! Process-wide, append-only set of signatures already accepted for
//! confirmation. Admission is a single atomic insert-if-absent on the
//! dashmap entry, so two callers racing on the same signature can never
//! both win: exactly one gets a [`CompletionSlot`], every other caller gets
//! a [`TerminalWatch`] that resolves to the one terminal status.
//!
//! The registry is an injected dependency rather than ambient module state
//! so tests can assert on it directly and a durable-storage-backed
//! implementation can be substituted without touching the orchestrator.

use crate::types::TransactionStatus;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::watch;

type TerminalSender = Arc<watch::Sender<Option<TransactionStatus>>>;

/// Outcome of attempting to admit a signature for confirmation
pub enum Admission {
    /// First caller for this signature; owns the obligation to complete it
    Admitted(CompletionSlot),
    /// Signature already admitted; observe the terminal state only
    Duplicate(TerminalWatch),
}

/// In-memory processed-signature registry
///
/// Entries are never removed for the lifetime of the process.
#[derive(Debug, Default)]
pub struct SignatureRegistry {
    slots: DashMap<String, TerminalSender>,
}

impl SignatureRegistry {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Atomically admit a signature, or hand back a watch on the existing
    /// flow. This is the idempotency guarantee: at most one caller per
    /// signature ever proceeds into the side-effecting pipeline.
    pub fn admit(&self, signature: &str) -> Admission {
        match self.slots.entry(signature.to_string()) {
            Entry::Occupied(entry) => Admission::Duplicate(TerminalWatch {
                rx: entry.get().subscribe(),
            }),
            Entry::Vacant(entry) => {
                let (tx, _rx) = watch::channel(None);
                let tx = Arc::new(tx);
                entry.insert(tx.clone());
                Admission::Admitted(CompletionSlot {
                    tx,
                    signature: signature.to_string(),
                    completed: false,
                })
            }
        }
    }

    /// Whether the signature has ever been admitted
    pub fn contains(&self, signature: &str) -> bool {
        self.slots.contains_key(signature)
    }

    /// Terminal status for a signature, if its flow already completed
    pub fn terminal_status(&self, signature: &str) -> Option<TransactionStatus> {
        self.slots
            .get(signature)
            .and_then(|tx| tx.borrow().clone())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Obligation held by the admitted caller to publish exactly one terminal
/// status. Dropping the slot without completing publishes a failure so
/// duplicate watchers are never left waiting forever.
pub struct CompletionSlot {
    tx: TerminalSender,
    signature: String,
    completed: bool,
}

impl CompletionSlot {
    /// Watch handle usable before the slot is consumed
    pub fn watch(&self) -> TerminalWatch {
        TerminalWatch {
            rx: self.tx.subscribe(),
        }
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Publish the terminal status. The watch value transitions from `None`
    /// to `Some` exactly once; a second write is structurally impossible
    /// since `complete` consumes the slot.
    pub fn complete(mut self, status: TransactionStatus) {
        self.completed = true;
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(status);
                true
            } else {
                false
            }
        });
    }
}

impl Drop for CompletionSlot {
    fn drop(&mut self) {
        if !self.completed {
            let fallback = TransactionStatus::failed(
                &self.signature,
                "confirmation task dropped before completion",
            );
            self.tx.send_if_modified(|current| {
                if current.is_none() {
                    *current = Some(fallback);
                    true
                } else {
                    false
                }
            });
        }
    }
}

/// Read side of a registry slot
#[derive(Debug, Clone)]
pub struct TerminalWatch {
    rx: watch::Receiver<Option<TransactionStatus>>,
}

impl TerminalWatch {
    /// Terminal status if already published
    pub fn current(&self) -> Option<TransactionStatus> {
        self.rx.borrow().clone()
    }

    /// Wait until the flow publishes its terminal status
    pub async fn wait(mut self) -> TransactionStatus {
        match self.rx.wait_for(|status| status.is_some()).await {
            Ok(value) => value.clone().unwrap_or_else(|| {
                TransactionStatus::failed("", "registry watch resolved empty")
            }),
            // The sender lives in the registry map for the process lifetime,
            // so this only fires if the registry itself was dropped.
            Err(_) => TransactionStatus::failed("", "signature registry dropped"),
        }
    }

    /// Pre-resolved watch, used for non-chain references that terminate
    /// without entering the registry.
    pub fn resolved(status: TransactionStatus) -> Self {
        let (tx, rx) = watch::channel(Some(status));
        // Receiver keeps the channel alive; sender can go.
        drop(tx);
        Self { rx }
    }
}
