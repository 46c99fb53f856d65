//! Pool of outstanding execution-continuation tokens
//!
//! The first token granted after a full drain becomes the *master* and is
//! only given back by [`ExecutionBudgetPool::release_all`]. Every later grant
//! is *nested* and queued in acquisition order, so releases always hand back
//! the oldest grant first and the master last.
//!
//! The host may expire a token on its own. That only marks the token in the
//! ledger; the entry stays where it is until the next explicit release, which
//! drops it without calling the host again.
//!
//! Grants are serialized, so ledger order is host grant order: the master is
//! always the earliest token granted since the last full drain.

use crate::host::{BudgetToken, ExecutionBudgetHost, ExpirationHandler, HostError};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct TokenLedger {
    /// First grant since the last full drain
    master: Option<BudgetToken>,
    /// Later grants, oldest first
    nested: VecDeque<BudgetToken>,
    /// Tokens the host reported as expired
    expired: HashSet<BudgetToken>,
}

impl TokenLedger {
    fn holds(&self, token: BudgetToken) -> bool {
        self.master == Some(token) || self.nested.contains(&token)
    }

    /// Forget expiry marks for tokens no longer held, e.g. an expiry that
    /// arrived after a failed release
    fn prune_expired(&mut self) {
        let Self { master, nested, expired } = self;
        expired.retain(|token| *master == Some(*token) || nested.contains(token));
    }
}

/// Point-in-time view of the pool
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BudgetSnapshot {
    pub master: Option<BudgetToken>,
    /// Oldest first
    pub nested: Vec<BudgetToken>,
    /// Held tokens the host has already expired
    pub expired: Vec<BudgetToken>,
}

impl BudgetSnapshot {
    pub fn held(&self) -> usize {
        self.nested.len() + usize::from(self.master.is_some())
    }
}

/// Tracks every continuation token the process currently holds.
///
/// Construct one per process at startup and share it as
/// `Arc<ExecutionBudgetPool>`. All ledger mutations happen under one lock;
/// host calls are made outside it.
pub struct ExecutionBudgetPool {
    /// `None` when the host has no background execution API
    host: Option<Arc<dyn ExecutionBudgetHost>>,
    /// Shared weakly with expiration handlers
    ledger: Arc<Mutex<TokenLedger>>,
    /// Held across a host grant and its ledger insertion
    grants: Mutex<()>,
}

impl ExecutionBudgetPool {
    pub fn new(host: Arc<dyn ExecutionBudgetHost>) -> Self {
        Self {
            host: Some(host),
            ledger: Arc::new(Mutex::new(TokenLedger::default())),
            grants: Mutex::new(()),
        }
    }

    /// Pool for a host without a background execution API; every
    /// acquisition yields [`BudgetToken::INVALID`]
    pub fn unsupported() -> Self {
        Self {
            host: None,
            ledger: Arc::new(Mutex::new(TokenLedger::default())),
            grants: Mutex::new(()),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.host.is_some()
    }

    fn ledger(&self) -> MutexGuard<'_, TokenLedger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ask the host for more time, recording the grant.
    pub fn request(&self) -> Result<BudgetToken, HostError> {
        let host = self.host.as_ref().ok_or_else(|| HostError::Unsupported {
            operation: "request_continuation".to_string(),
        })?;

        let _grant = self.grants.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let token = host.request_continuation(expiration_handler(Arc::downgrade(&self.ledger)))?;
        if !token.is_valid() {
            return Err(HostError::Refused {
                reason: "host returned the invalid token".to_string(),
            });
        }

        let mut ledger = self.ledger();
        if ledger.master.is_none() {
            ledger.master = Some(token);
            info!(token = %token, "started master budget token");
        } else {
            ledger.nested.push_back(token);
            debug!(token = %token, nested = ledger.nested.len(), "started nested budget token");
        }
        ledger.prune_expired();
        Ok(token)
    }

    /// Best-effort [`request`](Self::request): a refusal is logged and
    /// reported as [`BudgetToken::INVALID`], and the caller carries on
    /// without the extra time.
    pub fn acquire(&self) -> BudgetToken {
        match self.request() {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "continuation not granted, continuing without extra budget");
                BudgetToken::INVALID
            }
        }
    }

    /// Give back the oldest nested token, if any. The master is untouched.
    pub fn release_one(&self) {
        let released = {
            let mut ledger = self.ledger();
            let released = ledger.nested.pop_front().map(|token| {
                let expired = ledger.expired.remove(&token);
                (token, expired)
            });
            ledger.prune_expired();
            released
        };

        if let Some((token, expired)) = released {
            self.release_to_host(token, expired);
        }
    }

    /// Give back every nested token oldest first, then the master.
    pub fn release_all(&self) {
        self.drain(true);
    }

    /// Give back every nested token oldest first; the master too when
    /// `include_master` is set. Calling with nothing held is a no-op.
    pub fn drain(&self, include_master: bool) {
        let to_release: Vec<(BudgetToken, bool)> = {
            let mut ledger = self.ledger();
            let mut tokens: Vec<BudgetToken> = ledger.nested.drain(..).collect();
            if include_master {
                tokens.extend(ledger.master.take());
            }
            let released = tokens
                .into_iter()
                .map(|token| (token, ledger.expired.remove(&token)))
                .collect();
            if include_master {
                ledger.expired.clear();
            } else {
                ledger.prune_expired();
            }
            released
        };

        for (token, expired) in to_release {
            self.release_to_host(token, expired);
        }

        if include_master {
            debug!("no more budget tokens held");
        } else if let Some(master) = self.master() {
            debug!(token = %master, "kept master budget token");
        }
    }

    fn release_to_host(&self, token: BudgetToken, expired: bool) {
        if expired {
            debug!(token = %token, "dropping expired budget token without release");
            return;
        }
        let Some(host) = self.host.as_ref() else {
            return;
        };
        match host.release_continuation(token) {
            Ok(()) => debug!(token = %token, "ended budget token"),
            Err(err) => warn!(token = %token, error = %err, "failed to release budget token"),
        }
    }

    pub fn master(&self) -> Option<BudgetToken> {
        self.ledger().master
    }

    pub fn nested(&self) -> Vec<BudgetToken> {
        self.ledger().nested.iter().copied().collect()
    }

    pub fn is_expired(&self, token: BudgetToken) -> bool {
        self.ledger().expired.contains(&token)
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        let ledger = self.ledger();
        let mut expired: Vec<BudgetToken> = ledger
            .expired
            .iter()
            .copied()
            .filter(|token| ledger.holds(*token))
            .collect();
        expired.sort_by_key(|token| token.id());
        BudgetSnapshot {
            master: ledger.master,
            nested: ledger.nested.iter().copied().collect(),
            expired,
        }
    }
}

fn expiration_handler(ledger: Weak<Mutex<TokenLedger>>) -> ExpirationHandler {
    Arc::new(move |token: BudgetToken| {
        warn!(token = %token, "budget token expired before release");
        if let Some(ledger) = ledger.upgrade() {
            let mut ledger = ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            ledger.expired.insert(token);
        }
    })
}
