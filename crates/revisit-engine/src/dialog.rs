//! Pure state machine for one engagement dialog
//!
//! `OpenTarget -> Like -> [comment steps] -> Close -> Done`. The executor
//! performs the I/O for each state and feeds the result back as an event.
//! Every path runs through `Close`, so a secondary context is always
//! released. Unexpected events close the dialog as a failure, never panic.

use revisit_core::{Decision, ExecutionOutcome};

/// Dialog state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogState {
    /// Open the post in a secondary context
    OpenTarget,
    /// Toggle the like control
    Like,
    /// Find (or open) the comment input, checking for an earlier comment
    FindCommentBox,
    /// Produce the comment text
    ComposeText,
    /// Type the text into the input
    TypeText { text: String },
    /// Submit and wait for the input to clear
    Submit,
    /// Release the secondary context
    Close { outcome: ExecutionOutcome },
    /// Finished
    Done { outcome: ExecutionOutcome },
}

/// Result of performing the current state's step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogEvent {
    Opened,
    OpenFailed,
    Liked,
    AlreadyLiked,
    LikeFailed,
    CommentBoxReady,
    CommentBoxMissing,
    AlreadyCommented,
    TextReady { text: String },
    NoText,
    Typed,
    TypeFailed,
    Submitted,
    SubmitUnconfirmed,
    LimitDetected,
    StopRequested,
    Closed,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogAction {
    /// Write the engagement to the visit ledger
    RecordEngagement,
    LogStep { message: String },
}

/// Initial state for `decision`; `Skip` has nothing to do
pub fn start(decision: Decision) -> DialogState {
    match decision {
        Decision::Skip => DialogState::Done {
            outcome: ExecutionOutcome::AlreadyDone,
        },
        _ => DialogState::OpenTarget,
    }
}

fn close(outcome: ExecutionOutcome, message: impl Into<String>) -> (DialogState, Vec<DialogAction>) {
    (
        DialogState::Close { outcome },
        vec![DialogAction::LogStep {
            message: message.into(),
        }],
    )
}

/// Pure transition function
pub fn transition(
    state: DialogState,
    event: DialogEvent,
    decision: Decision,
) -> (DialogState, Vec<DialogAction>) {
    let commenting = decision.is_comment();

    match (state, event) {
        (DialogState::Close { outcome }, DialogEvent::Closed) => {
            (DialogState::Done { outcome }, vec![])
        }
        (DialogState::Close { .. }, DialogEvent::LimitDetected) => close(
            ExecutionOutcome::LimitReached,
            "Limit detected while closing",
        ),
        (DialogState::Close { outcome }, _) => (DialogState::Close { outcome }, vec![]),
        (DialogState::Done { outcome }, _) => (DialogState::Done { outcome }, vec![]),
        // Limits and stop requests end the item from any open state
        (_, DialogEvent::LimitDetected) => {
            close(ExecutionOutcome::LimitReached, "Platform limit reached")
        }
        (_, DialogEvent::StopRequested) => close(ExecutionOutcome::Fail, "Stop requested"),

        (DialogState::OpenTarget, DialogEvent::Opened) => (DialogState::Like, vec![]),
        (DialogState::OpenTarget, DialogEvent::OpenFailed) => {
            close(ExecutionOutcome::Fail, "Could not open post")
        }

        // Liking is best effort when a comment follows
        (DialogState::Like, DialogEvent::Liked) if commenting => {
            (DialogState::FindCommentBox, vec![])
        }
        (DialogState::Like, DialogEvent::AlreadyLiked) if commenting => {
            (DialogState::FindCommentBox, vec![])
        }
        (DialogState::Like, DialogEvent::LikeFailed) if commenting => (
            DialogState::FindCommentBox,
            vec![DialogAction::LogStep {
                message: "Like failed, continuing with comment".to_string(),
            }],
        ),
        (DialogState::Like, DialogEvent::Liked) => close(ExecutionOutcome::Success, "Liked"),
        (DialogState::Like, DialogEvent::AlreadyLiked) => {
            close(ExecutionOutcome::AlreadyDone, "Already liked")
        }
        (DialogState::Like, DialogEvent::LikeFailed) => {
            close(ExecutionOutcome::Fail, "Like not confirmed")
        }

        (DialogState::FindCommentBox, DialogEvent::CommentBoxReady) => {
            (DialogState::ComposeText, vec![])
        }
        (DialogState::FindCommentBox, DialogEvent::AlreadyCommented) => {
            close(ExecutionOutcome::AlreadyDone, "Already commented")
        }
        (DialogState::FindCommentBox, DialogEvent::CommentBoxMissing) => {
            close(ExecutionOutcome::Fail, "Comment input not found")
        }

        (DialogState::ComposeText, DialogEvent::TextReady { text }) => {
            (DialogState::TypeText { text }, vec![])
        }
        (DialogState::ComposeText, DialogEvent::NoText) => {
            close(ExecutionOutcome::Fail, "No usable comment text")
        }

        (DialogState::TypeText { .. }, DialogEvent::Typed) => (DialogState::Submit, vec![]),
        (DialogState::TypeText { .. }, DialogEvent::TypeFailed) => {
            close(ExecutionOutcome::Fail, "Typing failed")
        }

        (DialogState::Submit, DialogEvent::Submitted) => (
            DialogState::Close {
                outcome: ExecutionOutcome::Success,
            },
            vec![
                DialogAction::RecordEngagement,
                DialogAction::LogStep {
                    message: "Comment posted".to_string(),
                },
            ],
        ),
        (DialogState::Submit, DialogEvent::SubmitUnconfirmed) => {
            close(ExecutionOutcome::Fail, "Submission not confirmed")
        }

        (state, event) => close(
            ExecutionOutcome::Fail,
            format!("Invalid dialog transition: {:?} cannot handle {:?}", state, event),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(decision: Decision, events: Vec<DialogEvent>) -> (DialogState, Vec<DialogAction>) {
        let mut state = start(decision);
        let mut actions = Vec::new();
        for event in events {
            let (next, mut acts) = transition(state, event, decision);
            state = next;
            actions.append(&mut acts);
        }
        (state, actions)
    }

    #[test]
    fn test_comment_happy_path() {
        let (state, actions) = run(
            Decision::TemplateComment,
            vec![
                DialogEvent::Opened,
                DialogEvent::Liked,
                DialogEvent::CommentBoxReady,
                DialogEvent::TextReady {
                    text: "hello".into(),
                },
                DialogEvent::Typed,
                DialogEvent::Submitted,
                DialogEvent::Closed,
            ],
        );
        assert_eq!(
            state,
            DialogState::Done {
                outcome: ExecutionOutcome::Success
            }
        );
        assert!(actions.contains(&DialogAction::RecordEngagement));
    }

    #[test]
    fn test_like_failure_does_not_fail_comment() {
        let (state, _) = run(
            Decision::AiComment,
            vec![DialogEvent::Opened, DialogEvent::LikeFailed],
        );
        assert_eq!(state, DialogState::FindCommentBox);
    }

    #[test]
    fn test_like_only_outcomes() {
        let (state, actions) = run(
            Decision::LikeOnly,
            vec![DialogEvent::Opened, DialogEvent::Liked, DialogEvent::Closed],
        );
        assert_eq!(
            state,
            DialogState::Done {
                outcome: ExecutionOutcome::Success
            }
        );
        assert!(!actions.contains(&DialogAction::RecordEngagement));

        let (state, _) = run(
            Decision::LikeOnly,
            vec![DialogEvent::Opened, DialogEvent::AlreadyLiked],
        );
        assert_eq!(
            state,
            DialogState::Close {
                outcome: ExecutionOutcome::AlreadyDone
            }
        );

        let (state, _) = run(
            Decision::LikeOnly,
            vec![DialogEvent::Opened, DialogEvent::LikeFailed],
        );
        assert_eq!(
            state,
            DialogState::Close {
                outcome: ExecutionOutcome::Fail
            }
        );
    }

    #[test]
    fn test_open_failure_still_closes() {
        let (state, _) = run(Decision::LikeOnly, vec![DialogEvent::OpenFailed]);
        assert_eq!(
            state,
            DialogState::Close {
                outcome: ExecutionOutcome::Fail
            }
        );
    }

    #[test]
    fn test_limit_from_any_state() {
        let (state, actions) = run(
            Decision::TemplateComment,
            vec![
                DialogEvent::Opened,
                DialogEvent::Liked,
                DialogEvent::CommentBoxReady,
                DialogEvent::TextReady { text: "x".into() },
                DialogEvent::Typed,
                DialogEvent::LimitDetected,
                DialogEvent::Closed,
            ],
        );
        assert_eq!(
            state,
            DialogState::Done {
                outcome: ExecutionOutcome::LimitReached
            }
        );
        assert!(!actions.contains(&DialogAction::RecordEngagement));
    }

    #[test]
    fn test_already_commented() {
        let (state, _) = run(
            Decision::AiComment,
            vec![
                DialogEvent::Opened,
                DialogEvent::AlreadyLiked,
                DialogEvent::AlreadyCommented,
                DialogEvent::Closed,
            ],
        );
        assert_eq!(
            state,
            DialogState::Done {
                outcome: ExecutionOutcome::AlreadyDone
            }
        );
    }

    #[test]
    fn test_invalid_transition_fails_closed() {
        let (state, _) = run(Decision::LikeOnly, vec![DialogEvent::Submitted]);
        assert_eq!(
            state,
            DialogState::Close {
                outcome: ExecutionOutcome::Fail
            }
        );
    }

    #[test]
    fn test_close_keeps_outcome() {
        let (state, _) = run(
            Decision::LikeOnly,
            vec![
                DialogEvent::Opened,
                DialogEvent::Liked,
                DialogEvent::StopRequested,
            ],
        );
        assert_eq!(
            state,
            DialogState::Close {
                outcome: ExecutionOutcome::Success
            }
        );
    }

    #[test]
    fn test_skip_is_done() {
        assert_eq!(
            start(Decision::Skip),
            DialogState::Done {
                outcome: ExecutionOutcome::AlreadyDone
            }
        );
    }
}
