//! End-to-end walks through the regeneration workflow.

mod common;

use assert_matches::assert_matches;
use common::*;
use filmgen_core::error::CoreError;
use filmgen_core::regeneration::{LogKind, RequestStatus, TargetType};
use filmgen_events::event_types::{
    REGENERATION_APPROVED, REGENERATION_COMPLETED, REGENERATION_FINAL_REJECTED,
    REGENERATION_READY_FOR_SELECTION, REGENERATION_REJECTED, REGENERATION_REQUESTED,
    REGENERATION_SELECTED,
};
use filmgen_gateway::{JobStatus, VideoSubmission};
use filmgen_regeneration::ApproveInput;

// ---------------------------------------------------------------------------
// Image: request, approve, three attempts, select, sign off
// ---------------------------------------------------------------------------

#[tokio::test]
async fn image_regeneration_runs_to_completion() {
    let h = harness();

    let req = h.create(TargetType::Image).await;
    assert_eq!(req.status, RequestStatus::Pending);
    assert_eq!(req.credits_paid, 0);

    let req = h
        .engine
        .approve(
            PROJECT,
            req.id,
            OWNER,
            ApproveInput {
                note: Some("Go ahead".into()),
                max_attempts: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(req.status, RequestStatus::Approved);
    assert_eq!(req.max_attempts, 3);
    // 2k images cost 2 credits per attempt.
    assert_eq!(req.credits_paid, 6);
    assert_eq!(req.reviewed_by, Some(OWNER));
    assert_eq!(req.review_note.as_deref(), Some("Go ahead"));
    assert_eq!(h.ledger.balance_of(OWNER), STARTING_BALANCE - 6);

    let first = h.attempt(req.id).await.unwrap();
    assert_eq!(first.attempts_used, 1);
    assert_eq!(first.attempts_remaining, 2);
    assert_eq!(first.status, RequestStatus::Approved);

    let second = h.attempt(req.id).await.unwrap();
    assert_eq!(second.status, RequestStatus::Approved);

    let third = h.attempt(req.id).await.unwrap();
    assert_eq!(third.attempts_used, 3);
    assert_eq!(third.attempts_remaining, 0);
    assert_eq!(third.status, RequestStatus::Selecting);
    assert_eq!(third.generated_urls.len(), 3);

    let chosen = third.generated_urls[1].clone();
    let req = h
        .engine
        .select(PROJECT, req.id, COLLABORATOR, &chosen)
        .await
        .unwrap();
    assert_eq!(req.status, RequestStatus::AwaitingFinal);
    assert_eq!(req.selected_url.as_deref(), Some(chosen.as_str()));

    let done = h
        .engine
        .final_approve(PROJECT, req.id, OWNER, None)
        .await
        .unwrap();
    assert_eq!(done.status, RequestStatus::Completed);
    assert_eq!(done.final_review_by, Some(OWNER));

    let scene = h.store.scene_snapshot(SCENE).unwrap();
    assert_eq!(scene.image_url.as_deref(), Some(chosen.as_str()));
    assert_eq!(scene.video_url.as_deref(), Some(ORIGINAL_VIDEO));

    let mut deleted = h.storage.deleted();
    deleted.sort();
    let mut expected: Vec<String> = third
        .generated_urls
        .iter()
        .filter(|u| **u != chosen)
        .cloned()
        .collect();
    expected.sort();
    assert_eq!(deleted, expected);

    // Only the approval moved credits.
    assert_eq!(h.ledger.journal().len(), 1);

    assert_eq!(
        h.sink.event_types(),
        vec![
            REGENERATION_REQUESTED,
            REGENERATION_APPROVED,
            REGENERATION_READY_FOR_SELECTION,
            REGENERATION_SELECTED,
            REGENERATION_COMPLETED,
        ]
    );
}

#[tokio::test]
async fn early_selection_skips_remaining_attempts() {
    let h = harness();
    let req = h.approved(TargetType::Image).await;

    let outcome = h.attempt(req.id).await.unwrap();
    let req = h
        .engine
        .select(PROJECT, req.id, COLLABORATOR, &outcome.url)
        .await
        .unwrap();
    assert_eq!(req.status, RequestStatus::AwaitingFinal);
    assert_eq!(req.attempts_used, 1);

    let done = h
        .engine
        .final_approve(PROJECT, req.id, ADMIN, Some("Looks right".into()))
        .await
        .unwrap();
    assert_eq!(done.final_review_note.as_deref(), Some("Looks right"));
    assert!(h.storage.deleted().is_empty());
    // Prepaid budget for unused attempts is not refunded.
    assert_eq!(h.ledger.balance_of(OWNER), STARTING_BALANCE - 6);
}

// ---------------------------------------------------------------------------
// Video: asynchronous job polled to completion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn video_attempt_polls_job_until_complete() {
    let h = harness();
    let req = h.approved(TargetType::Video).await;
    // hd video is 5 credits per attempt.
    assert_eq!(req.credits_paid, 15);

    h.gateway
        .push_submission(Ok(VideoSubmission::Pending("job-7".into())));
    h.gateway.push_poll(Ok(JobStatus::Processing));
    h.gateway.push_poll(Ok(JobStatus::Processing));
    h.gateway.push_poll(Ok(JobStatus::Complete(
        "https://cdn.example.com/gen/job-7.mp4".into(),
    )));

    let outcome = h.attempt(req.id).await.unwrap();
    assert_eq!(outcome.url, "https://cdn.example.com/gen/job-7.mp4");
    assert_eq!(h.gateway.poll_calls(), 3);

    let req = h
        .engine
        .select(PROJECT, req.id, COLLABORATOR, &outcome.url)
        .await
        .unwrap();
    h.engine
        .final_approve(PROJECT, req.id, OWNER, None)
        .await
        .unwrap();

    let scene = h.store.scene_snapshot(SCENE).unwrap();
    assert_eq!(
        scene.video_url.as_deref(),
        Some("https://cdn.example.com/gen/job-7.mp4")
    );
    assert_eq!(scene.image_url.as_deref(), Some(ORIGINAL_IMAGE));
}

#[tokio::test]
async fn video_job_that_never_finishes_fails_the_attempt_only() {
    let h = harness();
    let req = h.approved(TargetType::Video).await;
    h.gateway
        .push_submission(Ok(VideoSubmission::Pending("job-slow".into())));

    let err = h.attempt(req.id).await.unwrap_err();
    assert_matches!(err, CoreError::GenerationFailed(_));
    // The test policy caps polling at five.
    assert_eq!(h.gateway.poll_calls(), 5);

    let req = h.store.request(req.id).unwrap();
    assert_eq!(req.status, RequestStatus::Approved);
    assert_eq!(req.attempts_used, 0);
    assert!(req.error_message.is_some());
    assert_eq!(req.logs.last().unwrap().kind, LogKind::Error);
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejection_tells_requester_why() {
    let h = harness();
    let req = h.create(TargetType::Image).await;

    let req = h
        .engine
        .reject(PROJECT, req.id, ADMIN, Some("Scene is locked".into()))
        .await
        .unwrap();
    assert_eq!(req.status, RequestStatus::Rejected);
    assert_eq!(req.reviewed_by, Some(ADMIN));
    assert!(h.ledger.journal().is_empty());

    let last = h.sink.delivered().pop().unwrap();
    assert_eq!(last.event_type, REGENERATION_REJECTED);
    assert_eq!(last.recipient_ids, vec![COLLABORATOR]);
    assert!(last.message.contains("Scene is locked"));
}

#[tokio::test]
async fn final_rejection_keeps_scene_and_deletes_every_candidate() {
    let h = harness();
    let req = h.approved(TargetType::Image).await;
    let a = h.attempt(req.id).await.unwrap();
    let b = h.attempt(req.id).await.unwrap();
    h.engine
        .select(PROJECT, req.id, COLLABORATOR, &a.url)
        .await
        .unwrap();

    let req = h
        .engine
        .final_reject(PROJECT, req.id, OWNER, Some("Too dark".into()))
        .await
        .unwrap();
    assert_eq!(req.status, RequestStatus::Rejected);
    assert_eq!(req.final_review_note.as_deref(), Some("Too dark"));

    let scene = h.store.scene_snapshot(SCENE).unwrap();
    assert_eq!(scene.image_url.as_deref(), Some(ORIGINAL_IMAGE));

    let mut deleted = h.storage.deleted();
    deleted.sort();
    let mut expected = vec![a.url, b.url];
    expected.sort();
    assert_eq!(deleted, expected);
    assert_eq!(
        h.sink.event_types().last().copied(),
        Some(REGENERATION_FINAL_REJECTED)
    );
}

#[tokio::test]
async fn a_finished_request_frees_the_target() {
    let h = harness();
    let req = h.create(TargetType::Image).await;
    h.engine.reject(PROJECT, req.id, OWNER, None).await.unwrap();

    let again = h.create(TargetType::Image).await;
    assert_ne!(again.id, req.id);
    assert_eq!(again.status, RequestStatus::Pending);
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn detail_includes_people_and_scene() {
    let h = harness();
    let req = h.approved(TargetType::Image).await;

    let detail = h.engine.get(PROJECT, req.id, READER).await.unwrap();
    assert_eq!(detail.attempts_remaining, 3);
    assert_eq!(
        detail.requester.as_ref().map(|u| u.display_name.as_str()),
        Some("Casey Collaborator")
    );
    assert_eq!(
        detail.reviewer.as_ref().map(|u| u.display_name.as_str()),
        Some("Olivia Owner")
    );
    assert!(detail.final_reviewer.is_none());
    assert_eq!(detail.scene.map(|s| s.id), Some(SCENE));
}

#[tokio::test]
async fn list_filters_by_status() {
    let h = harness();
    let image = h.approved(TargetType::Image).await;
    let video = h.create(TargetType::Video).await;

    let all = h.engine.list(PROJECT, READER, None).await.unwrap();
    assert_eq!(all.len(), 2);

    let pending = h
        .engine
        .list(PROJECT, READER, Some(RequestStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![video.id]);

    let approved = h
        .engine
        .list(PROJECT, OWNER, Some(RequestStatus::Approved))
        .await
        .unwrap();
    assert_eq!(approved.iter().map(|r| r.id).collect::<Vec<_>>(), vec![image.id]);
}

#[tokio::test]
async fn approval_quote_prices_without_charging() {
    let h = harness();
    let req = h.create(TargetType::Video).await;

    let quote = h
        .engine
        .approval_quote(PROJECT, req.id, OWNER, Some(4))
        .await
        .unwrap();
    assert_eq!(quote.max_attempts, 4);
    assert_eq!(quote.resolution, "hd");
    assert_eq!(quote.credits_per_attempt, 5);
    assert_eq!(quote.total_cost, 20);
    assert_eq!(quote.balance, STARTING_BALANCE);
    assert!(quote.sufficient);
    assert!(h.ledger.journal().is_empty());
}
