use std::collections::{BTreeSet, HashSet};

use chain_cspr::{motes_to_cspr, U512};
use serde::Serialize;

use crate::error::CoreError;
use crate::transaction::{PendingTransaction, TxKind};

/// Session-local record of processed actions.
///
/// Effects are committed as soon as the wallet reports `processed`; there is
/// no finality check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionLedger {
    #[serde(serialize_with = "serialize_motes")]
    balance_motes: U512,
    subscribed_plans: BTreeSet<u64>,
    created_plans: Vec<String>,
    #[serde(skip)]
    applied: HashSet<u64>,
}

impl SessionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the effect of a processed transaction. A transaction id is
    /// applied at most once; returns false for repeats.
    ///
    /// A deposit that cannot be added to the balance is an error and leaves
    /// the transaction unrecorded.
    pub fn apply(&mut self, tx: &PendingTransaction) -> Result<bool, CoreError> {
        if self.applied.contains(&tx.id()) {
            return Ok(false);
        }
        match tx.kind() {
            TxKind::Deposit => {
                let motes: U512 = tx
                    .attached_value_motes()
                    .parse()
                    .map_err(|_| CoreError::InvalidAmountFormat(tx.attached_value_motes().to_string()))?;
                self.balance_motes = self.balance_motes.checked_add(&motes).ok_or_else(|| {
                    CoreError::InvalidAmountFormat("deposited balance exceeds 512 bits".into())
                })?;
            }
            TxKind::Subscribe => {
                if let Some(plan_id) = tx.plan_id() {
                    self.subscribed_plans.insert(plan_id);
                }
            }
            TxKind::CreatePlan => {
                if let Some(name) = tx.plan_name() {
                    self.created_plans.push(name.to_string());
                }
            }
        }
        self.applied.insert(tx.id());
        Ok(true)
    }

    pub fn balance_motes(&self) -> &U512 {
        &self.balance_motes
    }

    /// Deposited balance in CSPR.
    pub fn balance_cspr(&self) -> Result<String, CoreError> {
        Ok(motes_to_cspr(&self.balance_motes.to_string())?)
    }

    pub fn subscribed_plans(&self) -> &BTreeSet<u64> {
        &self.subscribed_plans
    }

    pub fn is_subscribed(&self, plan_id: u64) -> bool {
        self.subscribed_plans.contains(&plan_id)
    }

    pub fn created_plans(&self) -> &[String] {
        &self.created_plans
    }
}

fn serialize_motes<S: serde::Serializer>(motes: &U512, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(motes)
}
