//! Human checkpoints: the two points where the manager may pause a run to ask
//! the user a question.

use crate::types::CollaborationChoice;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use swarm_core::CollaborationMode;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Logged when a checkpoint question goes unanswered.
pub const NO_ANSWER_TEXT: &str = "User did not respond in time. Proceeding autonomously.";

/// Which of the two decision points a checkpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// After the first individual round.
    First,
    /// After the refined individual round.
    Second,
}

impl Checkpoint {
    /// Mode forced when the manager asks the user a second time in a row.
    pub fn fallback_mode(&self) -> CollaborationMode {
        match self {
            Checkpoint::First => CollaborationMode::Meeting,
            Checkpoint::Second => CollaborationMode::Debate,
        }
    }

    fn fallback_reasoning(&self) -> &'static str {
        match self {
            Checkpoint::First => {
                "Defaulted to a meeting after user interaction to synthesize new input."
            }
            Checkpoint::Second => {
                "Defaulted to a debate after user interaction to challenge all perspectives."
            }
        }
    }

    /// The forced choice after a repeated question.
    pub fn fallback(&self) -> CollaborationChoice {
        CollaborationChoice {
            mode: self.fallback_mode(),
            reasoning: self.fallback_reasoning().to_string(),
        }
    }

    /// The choice used when questions are disabled but the manager asked one.
    pub fn questions_disabled(&self) -> CollaborationChoice {
        let mode = self.fallback_mode();
        warn!(checkpoint = ?self, mode = %mode, "User questions disabled, substituting fallback");
        CollaborationChoice {
            mode,
            reasoning: format!(
                "User questions are disabled. Defaulted to a {}.",
                mode.as_str().to_lowercase()
            ),
        }
    }

    /// Phase text announcing a question for the user.
    pub fn question_phase(&self, manager_role: &str, reasoning: &str) -> String {
        let subject = match self {
            Checkpoint::First => "A question",
            Checkpoint::Second => "A final question",
        };
        format!("{manager_role}'s Decision: {subject} for the user is required.\nReasoning: {reasoning}")
    }

    /// Phase text announcing the collaboration the run will hold.
    pub fn decision_phase(&self, manager_role: &str, choice: &CollaborationChoice) -> String {
        let mode = choice.mode.as_str().to_uppercase();
        let verdict = match self {
            Checkpoint::First => format!("A {mode} is required."),
            Checkpoint::Second => format!("A final {mode} will consolidate perspectives."),
        };
        format!(
            "{manager_role}'s Decision: {verdict}\nReasoning: {}",
            choice.reasoning
        )
    }
}

/// Single-use rendezvous between a waiting checkpoint and whoever answers it.
#[derive(Default)]
pub struct AnswerSlot {
    pending: Mutex<Option<oneshot::Sender<Option<String>>>>,
}

impl AnswerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits up to `timeout` for an answer. Blank answers, timeouts and a set
    /// `cancelled` flag all resolve to `None`.
    pub async fn ask(&self, timeout: Duration, cancelled: &AtomicBool) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock() = Some(tx);

        // A stop that landed before the sender was registered found nothing
        // to resolve.
        if cancelled.load(Ordering::SeqCst) {
            self.clear();
            return None;
        }

        let answer = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(_)) => None,
            Err(_) => {
                info!(timeout_secs = timeout.as_secs(), "Checkpoint question timed out");
                None
            }
        };
        self.clear();
        answer.filter(|a| !a.trim().is_empty())
    }

    /// Resolves the pending question. Returns false when nothing is waiting.
    pub fn answer(&self, answer: Option<String>) -> bool {
        match self.pending.lock().take() {
            Some(tx) => tx.send(answer).is_ok(),
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    pub fn clear(&self) {
        self.pending.lock().take();
    }
}
