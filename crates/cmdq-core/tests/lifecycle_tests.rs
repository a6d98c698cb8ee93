// Pure lifecycle walk: state machine + retry policy applied to a record
// without any persistence.

use cmdq_core::{
    after_transcription, can_retry, retry_policy, CommandPatch, CommandRecord, CommandStatus,
    QueueView, DEFAULT_VIEW_LIMIT,
};

fn step(record: &mut CommandRecord, next: CommandStatus) {
    assert!(
        record.status.can_transition_to(next),
        "{} -> {} should be legal",
        record.status,
        next
    );
    record.apply(&CommandPatch::status(next));
}

#[test]
fn test_voice_command_happy_path() {
    let mut cmd = CommandRecord::recorded("a.m4a");

    step(&mut cmd, CommandStatus::Transcribing);
    cmd.transcription = Some("call mom".to_string());
    let next = after_transcription(cmd.status);
    step(&mut cmd, next);
    assert_eq!(cmd.status, CommandStatus::ManualReview);

    cmd.text = "call mom at six".to_string();
    step(&mut cmd, CommandStatus::Queued);
    step(&mut cmd, CommandStatus::Processing);
    step(&mut cmd, CommandStatus::Completed);

    assert!(!cmd.status.can_transition_to(CommandStatus::Queued));
    assert!(!can_retry(cmd.status, cmd.failed));
}

#[test]
fn test_failed_transcription_retry_then_success() {
    let mut cmd = CommandRecord::recorded("a.m4a");
    step(&mut cmd, CommandStatus::Transcribing);
    cmd.apply(&CommandPatch::failure("API timeout"));
    assert!(cmd.validate().is_ok());

    assert!(can_retry(cmd.status, cmd.failed));
    let decision = retry_policy(cmd.status, cmd.failed);
    cmd.apply(&decision.to_patch());

    assert_eq!(cmd.status, CommandStatus::Transcribing);
    assert!(!cmd.failed);
    assert_eq!(cmd.error_message, None);

    let next = after_transcription(cmd.status);
    step(&mut cmd, next);
    assert_eq!(cmd.status, CommandStatus::ManualReview);
}

#[test]
fn test_failed_execution_goes_back_to_queue() {
    let mut cmd = CommandRecord::text("send report");
    step(&mut cmd, CommandStatus::Processing);
    cmd.apply(&CommandPatch::failure("executor unavailable"));

    let review = QueueView::Review.project(std::slice::from_ref(&cmd), DEFAULT_VIEW_LIMIT);
    assert_eq!(review.len(), 1);

    let decision = retry_policy(cmd.status, cmd.failed);
    let next = decision.next_status.unwrap_or(cmd.status);
    step(&mut cmd, next);
    cmd.apply(&decision.to_patch());

    assert_eq!(cmd.status, CommandStatus::Queued);
    assert!(!cmd.failed);
    let processing =
        QueueView::Processing.project(std::slice::from_ref(&cmd), DEFAULT_VIEW_LIMIT);
    assert_eq!(processing.len(), 1);
}

#[test]
fn test_failed_flag_on_queued_is_terminal_for_retry() {
    let mut cmd = CommandRecord::text("odd state");
    cmd.apply(&CommandPatch::failure("left over"));
    assert_eq!(cmd.status, CommandStatus::Queued);
    assert!(!can_retry(cmd.status, cmd.failed));
    assert!(retry_policy(cmd.status, cmd.failed).is_noop());
}
