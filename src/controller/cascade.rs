//! # Cascade Decisions
//!
//! Decides what to do with an already materialized Secret once its data has
//! been resolved again.
//!
//! Every key of the previous data is either *confirmed* (still present in the
//! newly resolved data, same or different value) or *lost* (absent). Lost keys
//! are handled per cascade mode:
//!
//! | Mode             | Lost key                          |
//! |------------------|-----------------------------------|
//! | `KeepLostSync`   | previous value is kept            |
//! | `RemoveLostSync` | key is dropped                    |
//! | `CascadeDelete`  | whole Secret is deleted           |
//!
//! Keeping a value the Secret already holds needs no write, so a lost key alone
//! is `NoAction` under `KeepLostSync`. An empty result always deletes the
//! Secret. `KeepNoAction` never syncs.
//!
//! [`decide`] is pure: it takes two snapshots and returns the action together
//! with the data to write.

use crate::controller::store::SecretData;
use crate::crd::CascadeMode;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeAction {
    NoAction,
    Update,
    Delete,
}

impl CascadeAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CascadeAction::NoAction => "NoAction",
            CascadeAction::Update => "Update",
            CascadeAction::Delete => "Delete",
        }
    }
}

/// Label reported in `status.lastAction`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastAction {
    Create,
    KeepNoAction,
    KeepLostSync,
    RemoveLostSync,
    CascadeDelete,
    /// Deleted because nothing resolved, not because of the cascade mode
    NoData,
}

impl LastAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LastAction::Create => "Create",
            LastAction::KeepNoAction => "KeepNoAction",
            LastAction::KeepLostSync => "KeepLostSync",
            LastAction::RemoveLostSync => "RemoveLostSync",
            LastAction::CascadeDelete => "CascadeDelete",
            LastAction::NoData => "NoData",
        }
    }
}

impl From<CascadeMode> for LastAction {
    fn from(mode: CascadeMode) -> Self {
        match mode {
            CascadeMode::KeepNoAction => LastAction::KeepNoAction,
            CascadeMode::KeepLostSync => LastAction::KeepLostSync,
            CascadeMode::RemoveLostSync => LastAction::RemoveLostSync,
            CascadeMode::CascadeDelete => LastAction::CascadeDelete,
        }
    }
}

impl fmt::Display for LastAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeDecision {
    pub action: CascadeAction,
    pub last_action: LastAction,
    /// Data to materialize on `Update`; includes re-inserted values for `KeepLostSync`
    pub data: SecretData,
    /// Keys of the previous data that did not resolve again
    pub lost_keys: Vec<String>,
}

/// Compare the previous data of a materialized Secret with newly resolved data
#[must_use]
pub fn decide(previous: &SecretData, resolved: SecretData, mode: CascadeMode) -> CascadeDecision {
    if mode == CascadeMode::KeepNoAction {
        return CascadeDecision {
            action: CascadeAction::NoAction,
            last_action: LastAction::KeepNoAction,
            data: previous.clone(),
            lost_keys: Vec::new(),
        };
    }

    let mut data = resolved;
    let mut lost_keys = Vec::new();
    let mut needs_update = false;

    for (key, previous_value) in previous {
        if let Some(value) = data.get(key) {
            if value != previous_value {
                needs_update = true;
            }
            continue;
        }

        lost_keys.push(key.clone());
        match mode {
            // The frozen value is already in the Secret, nothing to write for it
            CascadeMode::KeepLostSync => {
                data.insert(key.clone(), previous_value.clone());
            }
            CascadeMode::RemoveLostSync => {
                needs_update = true;
            }
            CascadeMode::CascadeDelete => {
                return CascadeDecision {
                    action: CascadeAction::Delete,
                    last_action: LastAction::CascadeDelete,
                    data,
                    lost_keys,
                };
            }
            CascadeMode::KeepNoAction => {}
        }
    }

    if data.is_empty() {
        let last_action = if lost_keys.is_empty() {
            LastAction::NoData
        } else {
            LastAction::from(mode)
        };
        return CascadeDecision {
            action: CascadeAction::Delete,
            last_action,
            data,
            lost_keys,
        };
    }

    // New mappings that could not be satisfied before
    if data.len() > previous.len() {
        needs_update = true;
    }

    CascadeDecision {
        action: if needs_update {
            CascadeAction::Update
        } else {
            CascadeAction::NoAction
        },
        last_action: LastAction::from(mode),
        data,
        lost_keys,
    }
}
