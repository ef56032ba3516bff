//! # Key-Value Backend Port
//!
//! The storage capability the order store is built on: string-keyed blobs
//! with conditional writes, a set type with cursor scanning, and atomic
//! guarded batches.
//!
//! # Guarded Batches
//!
//! An [`AtomicBatch`] is one guard [`Command`] followed by dependent
//! commands. The backend runs the guard, and only if it *applied* runs the
//! dependents, all as one indivisible unit. This is how "insert if absent,
//! then index" and "delete if present, then unindex" stay consistent: the
//! conditional outcome gates the second write inside the backend instead of
//! being checked after the fact.
//!
//! # Examples
//!
//! ```
//! use order_store::infrastructure::kv::{AtomicBatch, Command, SetCondition};
//!
//! let batch = AtomicBatch::guarded(Command::set("order:1", b"{}".to_vec(), SetCondition::IfAbsent))?
//!     .then(Command::sadd("orders", "order:1"))?;
//! assert_eq!(batch.len(), 2);
//! # Ok::<(), order_store::infrastructure::kv::BackendError>(())
//! ```

use crate::infrastructure::kv::error::{BackendError, BackendResult};
use async_trait::async_trait;
use std::fmt;

/// Precondition attached to a `SET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SetCondition {
    /// Write unconditionally.
    #[default]
    Always,
    /// Write only if the key does not exist (`NX`).
    IfAbsent,
    /// Write only if the key already exists (`XX`).
    IfPresent,
}

impl SetCondition {
    /// Returns the Redis flag for this condition, if any.
    #[must_use]
    pub fn as_flag(&self) -> Option<&'static str> {
        match self {
            Self::Always => None,
            Self::IfAbsent => Some("NX"),
            Self::IfPresent => Some("XX"),
        }
    }
}

/// Whether a conditional write took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct WriteOutcome {
    /// True if the write (or the batch guard) applied.
    pub applied: bool,
}

impl WriteOutcome {
    /// The write applied.
    pub const APPLIED: Self = Self { applied: true };
    /// The precondition did not hold; nothing was written.
    pub const SKIPPED: Self = Self { applied: false };

    /// Creates an outcome from a flag.
    pub fn from_applied(applied: bool) -> Self {
        Self { applied }
    }
}

/// One step of an incremental set scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanPage {
    /// Cursor to resume from; `0` means the scan is complete.
    pub cursor: u64,
    /// Members returned by this step.
    pub members: Vec<String>,
}

impl ScanPage {
    /// Returns true if this is the last step of the scan.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.cursor == 0
    }
}

/// A write command that can be queued in an [`AtomicBatch`].
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// `SET key value [NX|XX]`.
    Set {
        /// Target key.
        key: String,
        /// Payload.
        value: Vec<u8>,
        /// Write precondition.
        condition: SetCondition,
    },
    /// `DEL key`.
    Del {
        /// Target key.
        key: String,
    },
    /// `SADD set member`.
    SAdd {
        /// Set key.
        set: String,
        /// Member to add.
        member: String,
    },
    /// `SREM set member`.
    SRem {
        /// Set key.
        set: String,
        /// Member to remove.
        member: String,
    },
}

impl Command {
    /// Builds a `SET`.
    #[must_use]
    pub fn set(key: impl Into<String>, value: Vec<u8>, condition: SetCondition) -> Self {
        Self::Set {
            key: key.into(),
            value,
            condition,
        }
    }

    /// Builds a `DEL`.
    #[must_use]
    pub fn del(key: impl Into<String>) -> Self {
        Self::Del { key: key.into() }
    }

    /// Builds an `SADD`.
    #[must_use]
    pub fn sadd(set: impl Into<String>, member: impl Into<String>) -> Self {
        Self::SAdd {
            set: set.into(),
            member: member.into(),
        }
    }

    /// Builds an `SREM`.
    #[must_use]
    pub fn srem(set: impl Into<String>, member: impl Into<String>) -> Self {
        Self::SRem {
            set: set.into(),
            member: member.into(),
        }
    }

    /// Command name as sent to the backend.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Set { .. } => "SET",
            Self::Del { .. } => "DEL",
            Self::SAdd { .. } => "SADD",
            Self::SRem { .. } => "SREM",
        }
    }

    /// The key this command writes to.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Del { key } => key,
            Self::SAdd { set, .. } | Self::SRem { set, .. } => set,
        }
    }

    /// Checks that the command can be sent.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::InvalidCommand` for empty keys or members.
    pub fn validate(&self) -> BackendResult<()> {
        if self.key().is_empty() {
            return Err(BackendError::invalid_command(format!(
                "{} with empty key",
                self.name()
            )));
        }
        match self {
            Self::SAdd { member, .. } | Self::SRem { member, .. } if member.is_empty() => Err(
                BackendError::invalid_command(format!("{} with empty member", self.name())),
            ),
            _ => Ok(()),
        }
    }

    /// Encodes the command as its argument vector, name first.
    #[must_use]
    pub fn to_args(&self) -> Vec<Vec<u8>> {
        let mut args = vec![self.name().as_bytes().to_vec()];
        match self {
            Self::Set {
                key,
                value,
                condition,
            } => {
                args.push(key.as_bytes().to_vec());
                args.push(value.clone());
                if let Some(flag) = condition.as_flag() {
                    args.push(flag.as_bytes().to_vec());
                }
            }
            Self::Del { key } => args.push(key.as_bytes().to_vec()),
            Self::SAdd { set, member } | Self::SRem { set, member } => {
                args.push(set.as_bytes().to_vec());
                args.push(member.as_bytes().to_vec());
            }
        }
        args
    }
}

// Payloads are elided so debug output never dumps record bodies.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set {
                key,
                value,
                condition,
            } => f
                .debug_struct("Set")
                .field("key", key)
                .field("value_len", &value.len())
                .field("condition", condition)
                .finish(),
            Self::Del { key } => f.debug_struct("Del").field("key", key).finish(),
            Self::SAdd { set, member } => f
                .debug_struct("SAdd")
                .field("set", set)
                .field("member", member)
                .finish(),
            Self::SRem { set, member } => f
                .debug_struct("SRem")
                .field("set", set)
                .field("member", member)
                .finish(),
        }
    }
}

/// A guard command plus the commands that run only if the guard applied.
///
/// Every command is validated as it is queued; a failed enqueue consumes
/// and discards the whole batch, so nothing partial can be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicBatch {
    guard: Command,
    dependents: Vec<Command>,
}

impl AtomicBatch {
    /// Starts a batch with its guard command.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::InvalidCommand` if the guard is malformed.
    pub fn guarded(guard: Command) -> BackendResult<Self> {
        guard.validate()?;
        Ok(Self {
            guard,
            dependents: Vec::new(),
        })
    }

    /// Queues a dependent command.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::InvalidCommand` if the command is malformed;
    /// the batch is dropped.
    pub fn then(mut self, command: Command) -> BackendResult<Self> {
        command.validate()?;
        self.dependents.push(command);
        Ok(self)
    }

    /// The guard command.
    #[must_use]
    pub fn guard(&self) -> &Command {
        &self.guard
    }

    /// Commands that run after an applied guard.
    #[must_use]
    pub fn dependents(&self) -> &[Command] {
        &self.dependents
    }

    /// Total number of queued commands, guard included.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.dependents.len()
    }

    /// Always false; a batch has at least its guard.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Key-value storage used by the order store.
///
/// Implementations must be safe to share across tasks. Every method is a
/// single round trip; [`execute`](Self::execute) must apply the batch as
/// one indivisible unit relative to other batches.
#[async_trait]
pub trait KeyValueBackend: Send + Sync + fmt::Debug {
    /// `GET key`. Returns `None` if the key does not exist.
    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>>;

    /// `SET key value [NX|XX]`.
    ///
    /// Returns whether the write applied under `condition`.
    async fn set(
        &self,
        key: &str,
        value: &[u8],
        condition: SetCondition,
    ) -> BackendResult<WriteOutcome>;

    /// `MGET key...`. One entry per requested key, in order; `None` for
    /// keys that do not exist.
    async fn mget(&self, keys: &[String]) -> BackendResult<Vec<Option<Vec<u8>>>>;

    /// `SSCAN set cursor MATCH pattern COUNT count`.
    ///
    /// `count` is advisory: a step may return more or fewer members,
    /// including none with a nonzero cursor.
    async fn sscan(
        &self,
        set: &str,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> BackendResult<ScanPage>;

    /// Runs a guarded batch atomically.
    ///
    /// Returns whether the guard applied; dependents ran iff it did.
    async fn execute(&self, batch: AtomicBatch) -> BackendResult<WriteOutcome>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_args_include_condition_flag() {
        let cmd = Command::set("k", b"v".to_vec(), SetCondition::IfAbsent);
        let args = cmd.to_args();
        assert_eq!(
            args,
            vec![b"SET".to_vec(), b"k".to_vec(), b"v".to_vec(), b"NX".to_vec()]
        );

        let cmd = Command::set("k", b"v".to_vec(), SetCondition::Always);
        assert_eq!(cmd.to_args().len(), 3);
    }

    #[test]
    fn set_key_args() {
        let args = Command::srem("orders", "order:1").to_args();
        assert_eq!(
            args,
            vec![b"SREM".to_vec(), b"orders".to_vec(), b"order:1".to_vec()]
        );
    }

    #[test]
    fn empty_key_rejected_at_enqueue() {
        let err = AtomicBatch::guarded(Command::del("")).unwrap_err();
        assert!(matches!(err, BackendError::InvalidCommand { .. }));
    }

    #[test]
    fn empty_member_discards_batch() {
        let batch = AtomicBatch::guarded(Command::del("order:1")).unwrap();
        let err = batch.then(Command::srem("orders", "")).unwrap_err();
        assert!(matches!(err, BackendError::InvalidCommand { .. }));
    }

    #[test]
    fn batch_keeps_order() {
        let batch = AtomicBatch::guarded(Command::del("a"))
            .unwrap()
            .then(Command::srem("s", "a"))
            .unwrap()
            .then(Command::sadd("t", "a"))
            .unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.guard().name(), "DEL");
        let names: Vec<_> = batch.dependents().iter().map(Command::name).collect();
        assert_eq!(names, vec!["SREM", "SADD"]);
    }

    #[test]
    fn debug_hides_payload() {
        let cmd = Command::set("k", b"secret".to_vec(), SetCondition::Always);
        let out = format!("{cmd:?}");
        assert!(!out.contains("secret"));
        assert!(out.contains("value_len"));
    }

    #[test]
    fn scan_page_completion() {
        assert!(ScanPage::default().is_complete());
        let page = ScanPage {
            cursor: 3,
            members: vec![],
        };
        assert!(!page.is_complete());
    }
}
