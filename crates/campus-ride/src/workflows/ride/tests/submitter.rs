use super::common::*;
use crate::workflows::ride::domain::{
    DraftIssue, RideId, RideOutcome, RideRequestDraft, DEFAULT_REJECTION_REASON,
};
use crate::workflows::ride::ports::{GatewayError, RideDecision};
use crate::workflows::ride::submitter::{classify, RideRequestSubmitter, SubmissionError};
use std::sync::Arc;
use std::time::Duration;

fn submitter(rides: &Arc<FakeRideService>) -> RideRequestSubmitter<FakeRideService> {
    RideRequestSubmitter::new(Arc::clone(rides), &config())
}

#[tokio::test]
async fn identical_locations_fail_without_a_network_call() {
    let rides = Arc::new(FakeRideService::default());
    let draft = RideRequestDraft {
        dropoff: "LIBRARY ".to_string(),
        ..draft()
    };

    match submitter(&rides).submit(&draft, &session()).await {
        Err(SubmissionError::Validation(err)) => {
            assert!(err.contains(&DraftIssue::SameLocations));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(rides.requests().is_empty());
}

#[tokio::test]
async fn missing_requested_time_is_named() {
    let rides = Arc::new(FakeRideService::default());
    let draft = RideRequestDraft {
        requested_time: None,
        ..draft()
    };

    let err = submitter(&rides)
        .submit(&draft, &session())
        .await
        .expect_err("time is required");
    assert_eq!(
        err,
        SubmissionError::Validation(DraftIssue::MissingRequestedTime.into())
    );
    assert!(rides.requests().is_empty());
}

#[tokio::test]
async fn created_decisions_carry_the_ride_and_driver() {
    let rides = Arc::new(FakeRideService::default());
    rides.respond(Ok(created("R9", Some("Dana"))));

    let outcome = submitter(&rides)
        .submit(&draft(), &session())
        .await
        .expect("classified");

    assert_eq!(
        outcome,
        RideOutcome::Created {
            ride_id: RideId("R9".to_string()),
            driver_name: Some("Dana".to_string()),
            ride_code: None,
        }
    );
}

#[tokio::test]
async fn request_payload_reflects_the_draft_and_session() {
    let rides = Arc::new(FakeRideService::default());
    rides.respond(Ok(queued("R1", 3)));
    let draft = RideRequestDraft {
        accessibility_required: true,
        ..draft()
    };

    submitter(&rides)
        .submit(&draft, &session())
        .await
        .expect("classified");

    let requests = rides.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.username, "jdoe");
    assert_eq!(request.rider_id, "rider-42");
    assert_eq!(request.num_passengers, 2);
    assert_eq!(request.pickup_time, pickup_time());

    let body = serde_json::to_value(request).expect("serializes");
    assert_eq!(body["ADA_required"], serde_json::Value::Bool(true));
    assert_eq!(body["pickup_location"], "Library");
}

#[tokio::test]
async fn network_failures_are_not_retried() {
    let rides = Arc::new(FakeRideService::default());
    rides.respond(Err(GatewayError::Transport("connection reset".to_string())));
    rides.respond(Ok(created("R2", None)));

    let err = submitter(&rides)
        .submit(&draft(), &session())
        .await
        .expect_err("network failure surfaces");

    assert!(matches!(err, SubmissionError::Network(GatewayError::Transport(_))));
    assert_eq!(rides.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unanswered_submissions_time_out() {
    let rides = Arc::new(FakeRideService::default());
    rides.respond(Ok(created("R3", None)));
    rides.respond_after(Duration::from_secs(60));

    let err = submitter(&rides)
        .submit(&draft(), &session())
        .await
        .expect_err("timeout");
    assert_eq!(err, SubmissionError::Network(GatewayError::Timeout));
}

#[test]
fn queued_decisions_keep_their_position() {
    assert_eq!(
        classify(queued("R1", 3)),
        RideOutcome::Queued {
            ride_id: RideId("R1".to_string()),
            queue_position: 3,
            driver_name: None,
            ride_code: None,
        }
    );
}

#[test]
fn rejections_use_the_server_reason_or_a_default() {
    assert_eq!(
        classify(rejected(Some("No drivers on shift"))),
        RideOutcome::Rejected {
            reason: "No drivers on shift".to_string()
        }
    );
    assert_eq!(
        classify(rejected(Some("   "))),
        RideOutcome::Rejected {
            reason: DEFAULT_REJECTION_REASON.to_string()
        }
    );
    assert_eq!(
        classify(RideDecision::default()),
        RideOutcome::Rejected {
            reason: DEFAULT_REJECTION_REASON.to_string()
        }
    );
}

#[test]
fn discriminator_decides_not_payload_shape() {
    let looks_created = RideDecision {
        outcome: Some("declined".to_string()),
        ride_id: Some("R5".to_string()),
        driver_name: Some("Dana".to_string()),
        ..RideDecision::default()
    };
    assert!(matches!(classify(looks_created), RideOutcome::Rejected { .. }));

    let shouted = RideDecision {
        outcome: Some(" CREATED ".to_string()),
        ..created("R6", None)
    };
    assert_eq!(
        classify(shouted).ride_id(),
        Some(&RideId("R6".to_string()))
    );
}

#[test]
fn accepted_decisions_without_tracking_details_are_rejected() {
    let no_id = RideDecision {
        ride_id: None,
        ..created("ignored", None)
    };
    assert!(matches!(classify(no_id), RideOutcome::Rejected { .. }));

    let no_position = RideDecision {
        queue_position: None,
        ..queued("R7", 1)
    };
    assert!(matches!(classify(no_position), RideOutcome::Rejected { .. }));
}

#[test]
fn wire_aliases_decode_into_decisions() {
    let decision: RideDecision = serde_json::from_str(
        r#"{"outcome":"created","ride_id":"R8","driver":"Sam","ride_code":"4821"}"#,
    )
    .expect("decodes");
    assert_eq!(
        classify(decision),
        RideOutcome::Created {
            ride_id: RideId("R8".to_string()),
            driver_name: Some("Sam".to_string()),
            ride_code: Some("4821".to_string()),
        }
    );

    let decision: RideDecision =
        serde_json::from_str(r#"{"outcome":"rejected","message":"Outside service hours"}"#)
            .expect("decodes");
    assert_eq!(decision.reason.as_deref(), Some("Outside service hours"));
}
