// Copyright 2026 Journeytrace (https://github.com/journeytrace)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! End-to-end pipeline tests: raw records through grouping and
//! interpretation to trees, steps and claims.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use journeytrace_core::record::{
    parse_records, Clip, HandlerResultContent, LogRecord, RecorderEntry, RecorderRecord,
    StatebagEntry,
};
use journeytrace_core::step::StepResult;
use journeytrace_core::ReplayConfig;
use journeytrace_replay::{group_flows, interpret_flow, FlowTrace};

const MANAGER: &str = "Web.TPEngine.StateMachineHandlers.OrchestrationManager";
const ENQUEUE: &str = "Web.TPEngine.StateMachineHandlers.EnqueueNewJourneyHandler";
const SEND_CLAIMS: &str = "Web.TPEngine.StateMachineHandlers.SendClaimsHandler";
const SELF_ASSERTED: &str = "Web.TPEngine.StateMachineHandlers.SelfAssertedMessageValidationHandler";

fn ts(secs: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 14, 0, secs).unwrap()
}

fn record(id: &str, secs: u32, clips: Vec<Clip>) -> LogRecord {
    LogRecord {
        id: id.to_string(),
        timestamp: ts(secs),
        correlation_id: "corr-1".to_string(),
        policy_id: Some("B2C_1A_SignUpOrSignIn".to_string()),
        clips,
    }
}

fn result(statebag: &[(&str, Value)], recorder: &[(&str, Value)]) -> HandlerResultContent {
    HandlerResultContent {
        result: Some(true),
        statebag: (!statebag.is_empty()).then(|| {
            statebag
                .iter()
                .map(|(k, v)| (k.to_string(), StatebagEntry::of(v.clone())))
                .collect()
        }),
        recorder_record: (!recorder.is_empty()).then(|| RecorderRecord {
            values: recorder
                .iter()
                .map(|(k, v)| RecorderEntry::new(*k, v.clone()))
                .collect(),
        }),
        exception: None,
    }
}

fn handled(handler: &str, content: HandlerResultContent) -> Vec<Clip> {
    vec![Clip::Action(handler.to_string()), Clip::HandlerResult(content)]
}

fn manager_step(step: u32, extra_statebag: &[(&str, Value)], recorder: &[(&str, Value)]) -> Vec<Clip> {
    let mut statebag: Vec<(&str, Value)> = vec![("ORCH_CS", json!(step.to_string()))];
    statebag.extend(extra_statebag.iter().cloned());
    handled(MANAGER, result(&statebag, recorder))
}

fn replay_single(records: &[LogRecord]) -> FlowTrace {
    let flows = group_flows(records);
    assert_eq!(flows.len(), 1, "fixture should group into a single flow");
    interpret_flow(&flows[0], records, &ReplayConfig::default())
}

#[test]
fn test_contiguous_records_form_one_ordered_flow() {
    // An unrecognized clip kind rides along without affecting anything.
    let mut second = manager_step(2, &[], &[]);
    second.insert(0, Clip::Unknown);

    let records = vec![
        record("log-1", 0, manager_step(1, &[], &[])),
        record("log-2", 1, second),
        record("log-3", 2, manager_step(3, &[], &[])),
    ];

    let flows = group_flows(&records);
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].log_ids, vec!["log-1", "log-2", "log-3"]);
    assert_eq!(flows[0].step_count, 3);

    let trace = interpret_flow(&flows[0], &records, &ReplayConfig::default());
    let orders: Vec<u32> = trace.steps.iter().map(|s| s.order).collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert!(trace.errors.is_empty());
}

#[test]
fn test_repeated_step_zero_splits_into_two_flows() {
    let records = vec![
        record("log-1", 0, manager_step(0, &[], &[])),
        record("log-2", 1, manager_step(1, &[], &[])),
        record("log-3", 2, manager_step(2, &[], &[])),
        record("log-4", 3, manager_step(0, &[], &[])),
        record("log-5", 4, manager_step(1, &[], &[])),
    ];

    let flows = group_flows(&records);
    assert_eq!(flows.len(), 2);
    assert_eq!(flows[0].log_ids, vec!["log-1", "log-2", "log-3"]);
    assert_eq!(flows[1].log_ids, vec!["log-4", "log-5"]);
    // Step 0 is the engine's initial state; only nonzero steps count.
    assert_eq!(flows[0].step_count, 2);
    assert_eq!(flows[1].step_count, 1);

    let config = ReplayConfig::default();
    let first = interpret_flow(&flows[0], &records, &config);
    let second = interpret_flow(&flows[1], &records, &config);
    assert_eq!(first.steps.iter().map(|s| s.order).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(second.steps.iter().map(|s| s.order).collect::<Vec<_>>(), vec![0, 1]);
    // Each flow replays against its own records only.
    assert_eq!(second.steps[0].log_id, "log-4");
}

#[test]
fn test_backward_step_without_enqueue_splits_flows() {
    let records = vec![
        record("log-1", 0, manager_step(1, &[], &[])),
        record("log-2", 1, manager_step(2, &[], &[])),
        record("log-3", 2, manager_step(3, &[], &[])),
        record("log-4", 3, manager_step(1, &[], &[])),
        record("log-5", 4, manager_step(2, &[], &[])),
    ];

    let flows = group_flows(&records);
    assert_eq!(flows.len(), 2);
    assert_eq!(flows[0].id, "corr-1-0");
    assert_eq!(flows[1].id, "corr-1-1");
    assert_eq!(flows[1].log_ids, vec!["log-4", "log-5"]);

    let trace = interpret_flow(&flows[1], &records, &ReplayConfig::default());
    assert_eq!(trace.flow_id, "corr-1-1");
    assert_eq!(trace.steps.iter().map(|s| s.order).collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn test_identity_resolves_from_parsed_complex_claims() {
    // The claims container arrives as a plain object, without the
    // bookkeeping entry wrapper.
    let source = json!([{
        "id": "log-1",
        "timestamp": "2026-03-14T14:00:00Z",
        "correlationId": "corr-1",
        "policyId": "B2C_1A_SignUpOrSignIn",
        "clips": [
            {"Kind": "Action", "Content": MANAGER},
            {"Kind": "HandlerResult", "Content": {
                "Result": true,
                "Statebag": {
                    "ORCH_CS": {"c": "2026-03-14T14:00:00Z", "k": "ORCH_CS", "v": "1", "p": true},
                    "Complex-CLMS": {"signInName": "ada@contoso.example", "objectId": "9f8e"}
                }
            }}
        ]
    }])
    .to_string();

    let records = parse_records(&source).unwrap();
    let flows = group_flows(&records);
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].user_email.as_deref(), Some("ada@contoso.example"));
    assert_eq!(flows[0].user_object_id.as_deref(), Some("9f8e"));
}

#[test]
fn test_hrd_candidate_count_drives_interactivity() {
    let multi = replay_single(&[record(
        "log-1",
        0,
        manager_step(
            1,
            &[],
            &[("EnabledForUserJourneysTrue", json!(["LocalAccountSignIn", "Google-OAUTH"]))],
        ),
    )]);
    assert_eq!(multi.steps.len(), 1);
    assert!(multi.steps[0].interactive);
    assert_eq!(multi.steps[0].selectable_options, vec!["LocalAccountSignIn", "Google-OAUTH"]);

    let single = replay_single(&[record(
        "log-1",
        0,
        manager_step(1, &[], &[("EnabledForUserJourneysTrue", json!(["LocalAccountSignIn"]))]),
    )]);
    assert!(!single.steps[0].interactive);
    assert_eq!(single.steps[0].selectable_options, vec!["LocalAccountSignIn"]);
}

#[test]
fn test_hrd_offer_and_invocation_stay_in_their_steps() {
    let records = vec![
        record("log-1", 0, manager_step(1, &[], &[])),
        record("log-2", 1, manager_step(2, &[], &[])),
        record("log-3", 2, manager_step(3, &[], &[])),
        record(
            "log-4",
            3,
            manager_step(
                4,
                &[],
                &[("HomeRealmDiscovery", json!(["LocalAccountSignIn", "Google-OAUTH"]))],
            ),
        ),
        record(
            "log-5",
            4,
            manager_step(
                5,
                &[("TAGE", json!("Google-OAUTH"))],
                &[(
                    "InitiatingClaimsExchange",
                    json!({
                        "TechnicalProfileId": "Google-OAUTH",
                        "ProtocolProviderType": "OAuth2ProtocolProvider"
                    }),
                )],
            ),
        ),
    ];

    let trace = replay_single(&records);
    assert_eq!(trace.steps.len(), 5);
    assert!(trace.errors.is_empty());

    let offer = &trace.steps[3];
    assert_eq!(offer.order, 4);
    assert_eq!(offer.selectable_options, vec!["LocalAccountSignIn", "Google-OAUTH"]);
    assert!(offer.technical_profile_names.is_empty());
    // The selection arrived one step later and was written back to the
    // offering step.
    assert_eq!(offer.selected_option.as_deref(), Some("Google-OAUTH"));

    let invocation = &trace.steps[4];
    assert_eq!(invocation.order, 5);
    assert!(invocation.selectable_options.is_empty());
    assert_eq!(invocation.technical_profile_names, vec!["Google-OAUTH"]);
    assert!(invocation.selected_option.is_none());
    // Neither did the candidates leak into any earlier step.
    assert!(trace.steps[..3].iter().all(|s| s.selectable_options.is_empty()));

    // The tree mirrors the backfill on the HRD child of the offering step.
    let offer_node = trace
        .tree
        .children
        .iter()
        .find(|node| node.step().is_some_and(|s| s.order == 4))
        .expect("offering step node");
    let hrd_child = offer_node
        .children
        .iter()
        .find(|child| child.kind.tag() == "homeRealmDiscovery")
        .expect("HRD child node");
    match &hrd_child.kind {
        journeytrace_core::FlowNodeKind::HomeRealmDiscovery { selected, options } => {
            assert_eq!(selected.as_deref(), Some("Google-OAUTH"));
            assert_eq!(options.len(), 2);
        }
        other => panic!("unexpected kind: {}", other.tag()),
    }
}

#[test]
fn test_failed_validation_surfaces_as_error_step() {
    let records = vec![
        record("log-1", 0, manager_step(1, &[], &[])),
        record(
            "log-2",
            1,
            vec![
                Clip::Predicate(SELF_ASSERTED.to_string()),
                Clip::HandlerResult(HandlerResultContent {
                    result: Some(false),
                    statebag: None,
                    recorder_record: Some(RecorderRecord {
                        values: vec![
                            RecorderEntry::new(
                                "ValidationTechnicalProfile",
                                json!("AAD-UserReadUsingSignInName"),
                            ),
                            RecorderEntry::new(
                                "Exception",
                                json!({"Message": "User does not exist.", "HResult": "0x80131500"}),
                            ),
                        ],
                    }),
                    exception: None,
                }),
            ],
        ),
    ];

    let trace = replay_single(&records);
    assert_eq!(trace.steps.len(), 1);
    let step = &trace.steps[0];
    assert_eq!(step.result, StepResult::Error);
    assert_eq!(step.error_message.as_deref(), Some("User does not exist."));
    assert_eq!(step.error_hresult.as_deref(), Some("0x80131500"));
    assert!(step
        .technical_profile_names
        .iter()
        .any(|name| name == "AAD-UserReadUsingSignInName"));
    assert_eq!(step.validation_profiles, vec!["AAD-UserReadUsingSignInName"]);
}

#[test]
fn test_successful_validation_does_not_mark_error() {
    let trace = replay_single(&[
        record("log-1", 0, manager_step(1, &[], &[])),
        record(
            "log-2",
            1,
            vec![
                Clip::Predicate(SELF_ASSERTED.to_string()),
                Clip::HandlerResult(result(
                    &[],
                    &[("ValidationTechnicalProfile", json!("AAD-UserReadUsingSignInName"))],
                )),
            ],
        ),
    ]);

    let step = &trace.steps[0];
    assert_eq!(step.result, StepResult::Success);
    assert!(step.error_message.is_none());
    assert_eq!(step.validation_profiles, vec!["AAD-UserReadUsingSignInName"]);
}

#[test]
fn test_sub_journey_wraps_only_its_own_steps() {
    let records = vec![
        record("log-1", 0, manager_step(1, &[], &[])),
        record("log-2", 1, manager_step(2, &[], &[])),
        record("log-3", 2, manager_step(3, &[], &[])),
        record(
            "log-4",
            3,
            handled(ENQUEUE, result(&[], &[("SubJourneyInvoked", json!("MfaCheck"))])),
        ),
        record("log-5", 4, manager_step(1, &[], &[])),
        record("log-6", 5, manager_step(2, &[], &[])),
        record("log-7", 6, manager_step(4, &[], &[])),
    ];

    let flows = group_flows(&records);
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].sub_journeys, vec!["MfaCheck"]);

    let trace = interpret_flow(&flows[0], &records, &ReplayConfig::default());
    // Main steps 1..3; sub-journey steps 1,2; the jump to 4 is out of the
    // sub-journey's reach, so the gap rule closes it and the step lands
    // back in the main journey.
    let journeys: Vec<&str> = trace.steps.iter().map(|s| s.journey_name.as_str()).collect();
    assert_eq!(
        journeys,
        vec![
            "B2C_1A_SignUpOrSignIn",
            "B2C_1A_SignUpOrSignIn",
            "B2C_1A_SignUpOrSignIn",
            "MfaCheck",
            "MfaCheck",
            "B2C_1A_SignUpOrSignIn"
        ]
    );

    // Tree shape: main-journey steps are direct root children, the
    // sub-journey's steps sit under exactly one wrapper.
    let tags: Vec<&str> = trace.tree.children.iter().map(|n| n.kind.tag()).collect();
    assert_eq!(tags, vec!["step", "step", "step", "subJourney", "step"]);
    let wrapper = &trace.tree.children[3];
    assert_eq!(wrapper.children.len(), 2);
    assert!(wrapper.children.iter().all(|n| n.kind.tag() == "step"));
    assert!(trace.errors.is_empty());
}

#[test]
fn test_display_control_scopes_nested_entities() {
    let records = vec![
        record("log-1", 0, manager_step(1, &[], &[])),
        record(
            "log-2",
            1,
            vec![
                Clip::Action("Web.TPEngine.StateMachineHandlers.DisplayControlActionHandler".to_string()),
                Clip::HandlerResult(result(
                    &[],
                    &[(
                        "DisplayControlAction",
                        json!({"DisplayControlId": "emailVerificationControl", "Action": "SendCode"}),
                    )],
                )),
                Clip::Action("Web.TPEngine.StateMachineHandlers.ClaimsExchangeHandler".to_string()),
                Clip::HandlerResult(result(
                    &[],
                    &[
                        (
                            "InitiatingBackendClaimsExchange",
                            json!({
                                "TechnicalProfileId": "GenerateOtp",
                                "ProtocolProviderType": "RestfulProvider"
                            }),
                        ),
                        (
                            "ClaimsTransformation",
                            json!({
                                "Id": "CreateOtpPayload",
                                "InputClaims": {"email": "ada@contoso.example"},
                                "OutputClaims": {"otpPayload": "email:ada@contoso.example"}
                            }),
                        ),
                    ],
                )),
            ],
        ),
    ];

    let trace = replay_single(&records);
    let step = &trace.steps[0];

    assert_eq!(step.display_controls.len(), 1);
    let control = &step.display_controls[0];
    assert_eq!(control.id, "emailVerificationControl");
    assert_eq!(control.action.as_deref(), Some("SendCode"));
    assert_eq!(control.technical_profiles.len(), 1);
    assert_eq!(control.technical_profiles[0].id, "GenerateOtp");
    assert!(control.technical_profiles[0].backend);
    assert_eq!(control.claims_transformations.len(), 1);
    assert_eq!(control.claims_transformations[0].id, "CreateOtpPayload");
    assert_eq!(
        control.technical_profiles[0].display_control.as_deref(),
        Some("emailVerificationControl")
    );

    // Scoped entities belong to the action, not the step's own lists.
    assert!(step.technical_profile_names.is_empty());
    assert!(step.claims_transformation_ids.is_empty());

    // In the tree the control node owns the nested entity nodes.
    let step_node = &trace.tree.children[0];
    let control_node = step_node
        .children
        .iter()
        .find(|n| n.kind.tag() == "displayControl")
        .expect("display control node");
    let nested: Vec<&str> = control_node.children.iter().map(|n| n.kind.tag()).collect();
    assert_eq!(nested, vec!["technicalProfile", "claimsTransformation"]);
}

#[test]
fn test_send_claims_completes_the_flow() {
    let records = vec![
        record("log-1", 0, manager_step(1, &[("email", json!("ada@contoso.example"))], &[])),
        record(
            "log-2",
            1,
            vec![
                Clip::Action(SEND_CLAIMS.to_string()),
                Clip::HandlerResult(result(
                    &[],
                    &[
                        ("SendClaims", json!({"TechnicalProfileId": "JwtIssuer"})),
                        ("JourneyCompleted", json!(true)),
                    ],
                )),
            ],
        ),
    ];

    let flows = group_flows(&records);
    assert!(flows[0].completed);

    let trace = interpret_flow(&flows[0], &records, &ReplayConfig::default());
    let last = trace.steps.last().expect("at least one step");
    assert!(last.final_step);
    assert!(last.technical_profile_names.iter().any(|n| n == "JwtIssuer"));

    let step_node = &trace.tree.children[0];
    let send_node = step_node
        .children
        .iter()
        .find(|n| n.kind.tag() == "sendClaims")
        .expect("send claims node");
    match &send_node.kind {
        journeytrace_core::FlowNodeKind::SendClaims { technical_profile_id } => {
            assert_eq!(technical_profile_id.as_deref(), Some("JwtIssuer"));
        }
        other => panic!("unexpected kind: {}", other.tag()),
    }
}

#[test]
fn test_finalized_snapshots_never_change() {
    let records = vec![
        record("log-1", 0, manager_step(1, &[("email", json!("ada@contoso.example"))], &[])),
        record("log-2", 1, manager_step(2, &[("email", json!("changed@contoso.example"))], &[])),
        record("log-3", 2, manager_step(3, &[("city", json!("Turin"))], &[])),
    ];

    let trace = replay_single(&records);
    assert_eq!(
        trace.steps[0].claims.get("email").map(String::as_str),
        Some("ada@contoso.example")
    );
    assert!(!trace.steps[0].claims.contains_key("city"));
    assert_eq!(
        trace.steps[1].claims.get("email").map(String::as_str),
        Some("changed@contoso.example")
    );
    assert_eq!(
        trace.final_claims.get("email").map(String::as_str),
        Some("changed@contoso.example")
    );
    assert_eq!(trace.final_claims.get("city").map(String::as_str), Some("Turin"));

    // Node contexts are frozen copies too.
    assert_eq!(
        trace.tree.children[0].context.claims.get("email").map(String::as_str),
        Some("ada@contoso.example")
    );
}

#[test]
fn test_malformed_entries_are_recovered_locally() {
    let records = vec![record(
        "log-1",
        0,
        manager_step(
            1,
            &[],
            &[
                // Candidate list in a shape the extractor does not know.
                ("EnabledForUserJourneysTrue", json!("LocalAccountSignIn")),
                // A well-formed entry after the malformed one still lands.
                ("HomeRealmDiscovery", json!(["LocalAccountSignIn", "Google-OAUTH"])),
            ],
        ),
    )];

    let trace = replay_single(&records);
    assert_eq!(trace.steps.len(), 1);
    assert_eq!(
        trace.steps[0].selectable_options,
        vec!["LocalAccountSignIn", "Google-OAUTH"]
    );
    assert_eq!(trace.errors.len(), 1);
    assert!(trace.errors[0].contains("log-1"));
}

#[test]
fn test_trace_round_trips_through_serde() {
    let records = vec![
        record(
            "log-1",
            0,
            manager_step(
                1,
                &[("Complex-CLMS", json!({"signInName": "ada@contoso.example"}))],
                &[("EnabledForUserJourneysTrue", json!(["LocalAccountSignIn", "Google-OAUTH"]))],
            ),
        ),
        record("log-2", 1, manager_step(2, &[("TAGE", json!("Google-OAUTH"))], &[])),
    ];

    let trace = replay_single(&records);
    let json = serde_json::to_string(&trace).expect("serialize trace");
    let back: FlowTrace = serde_json::from_str(&json).expect("deserialize trace");
    assert_eq!(back, trace);
}
