#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use argus_core::event_bus::{EventBus, EventCategory};
    use argus_core::store::DocumentStore;
    use argus_core::stride::{ClassifierConfig, StrideCategory};
    use argus_core::ArgusError;

    use crate::adapter::*;
    use crate::aggregator::ScanOutcome;
    use crate::classifier::classify;
    use crate::cycle_engine::{StepOutcome, WorkflowEngine};
    use crate::platform::AssessmentPlatform;
    use crate::threats::{Threat, ThreatScore, ThreatStatus};
    use crate::tickets::{TicketCollaborator, TicketManager, TicketStatus};
    use crate::types::*;

    fn vuln(cve: &str, description: &str, severity: Severity, score: f64) -> Vulnerability {
        Vulnerability::new(cve, description, severity).with_score(score)
    }

    fn assert_cycle_invariants(a: &Artifact) {
        if let Some(cur) = &a.current_cycle {
            assert_eq!(a.cycles_count, cur.cycle_number, "cycles_count must track the live cycle");
            let mirrors: Vec<&WorkflowCycle> =
                a.cycles.iter().filter(|c| c.cycle_number == cur.cycle_number).collect();
            assert_eq!(mirrors.len(), 1, "live cycle must appear exactly once in the log");
            assert_eq!(*mirrors[0], *cur, "cycle log mirror must match the live cycle");
        }
        assert!(a.scanners_completed <= a.total_scanners);
    }

    fn registered_platform(artifact_id: &str, project: &str) -> AssessmentPlatform {
        let platform = AssessmentPlatform::new();
        platform.register_artifact(Artifact::new(artifact_id, project, "billing-svc", ArtifactKind::SourceCode));
        platform
    }

    // ── Scenario 1: two scanners, overlapping findings ───────────────────

    #[test]
    fn test_two_scanners_dedup_and_autoadvance() {
        let platform = registered_platform("art-1", "proj-1");
        platform.begin_scan("art-1", 2).unwrap();

        let rce = vuln(
            "CVE-2024-0001",
            "Remote code execution via deserialization of untrusted data",
            Severity::Critical,
            9.8,
        )
        .with_cwes(&["CWE-502"]);
        let leak = vuln(
            "CVE-2024-0002",
            "Information exposure through log files",
            Severity::Low,
            2.0,
        )
        .with_cwes(&["CWE-532"]);

        let first = platform.submit_scanner_result("art-1", vec![rce.clone()]).unwrap();
        assert!(matches!(first, ScanOutcome::Accumulated { scanners_completed: 1, total_scanners: 2 }));

        // Second scanner re-reports CVE-2024-0001 with a different score;
        // first-seen wins.
        let re_reported = vuln("CVE-2024-0001", "dup", Severity::Medium, 5.0);
        let second = platform.submit_scanner_result("art-1", vec![re_reported, leak]).unwrap();
        let summary = match second {
            ScanOutcome::Finalized { summary } => summary,
            other => panic!("expected finalize, got {:?}", other),
        };
        assert_eq!(summary.vulnerabilities, 2);
        assert_eq!(summary.new_threats, 2);
        assert_eq!(summary.tickets_opened, 2);

        let a = platform.artifact("art-1").unwrap();
        assert!(!a.is_scanning);
        assert_eq!(a.vulnerability_list.len(), 2);
        assert!(a.temp_vuls.is_empty());
        let kept = a.vulnerability_list.iter().find(|v| v.cve_id == "CVE-2024-0001").unwrap();
        assert_eq!(kept.score, Some(9.8), "first-seen record must win the merge");

        assert_eq!(a.threat_list.len(), 2);
        assert_eq!(platform.tickets_for_artifact("art-1").len(), 2);

        // Detection and classification auto-advanced; assignment waits on
        // ticket acceptance.
        assert_eq!(a.current_step, WorkflowStep::Assignment);
        assert!(a.current_cycle.as_ref().unwrap().detection.completed_at.is_some());
        assert!(a.current_cycle.as_ref().unwrap().classification.completed_at.is_some());
        assert_eq!(a.current_cycle.as_ref().unwrap().detection.number_vuls, 2);
        assert_cycle_invariants(&a);

        // Classifier picked deterministic categories.
        let rce_threat = platform.threats().get("CVE-2024-0001").unwrap();
        assert_eq!(rce_threat.category, StrideCategory::Tampering);
        let leak_threat = platform.threats().get("CVE-2024-0002").unwrap();
        assert_eq!(leak_threat.category, StrideCategory::InformationDisclosure);
    }

    // ── Scenario 2: rescan resolves a vanished finding ───────────────────

    #[test]
    fn test_rescan_resolves_stale_threat() {
        let platform = registered_platform("art-2", "proj-1");
        platform.begin_scan("art-2", 1).unwrap();
        platform
            .submit_scanner_result(
                "art-2",
                vec![
                    vuln("CVE-1", "injection", Severity::High, 8.0),
                    vuln("CVE-2", "leak", Severity::Low, 2.0),
                ],
            )
            .unwrap();
        assert_eq!(platform.artifact("art-2").unwrap().threat_list.len(), 2);

        // CVE-2 no longer appears on rescan.
        platform.begin_scan("art-2", 1).unwrap();
        platform
            .submit_scanner_result("art-2", vec![vuln("CVE-1", "injection", Severity::High, 8.0)])
            .unwrap();

        let a = platform.artifact("art-2").unwrap();
        assert_eq!(a.threat_list, vec!["CVE-1".to_string()]);
        assert_eq!(a.vulnerability_list.len(), 1);
        assert_eq!(a.scan_history.len(), 2);

        let tickets = platform.tickets_for_artifact("art-2");
        let t1 = tickets.iter().find(|t| t.threat_name == "CVE-1").unwrap();
        let t2 = tickets.iter().find(|t| t.threat_name == "CVE-2").unwrap();
        assert_eq!(t1.status, TicketStatus::Processing);
        assert_eq!(t2.status, TicketStatus::Resolved);
        assert!(t2.resolved_at.is_some());

        // Threat rows survive; only the link is dropped.
        assert!(platform.threats().get("CVE-2").is_some());
        assert_eq!(platform.threats().get("CVE-2").unwrap().status, ThreatStatus::FullyMitigated);
        assert_cycle_invariants(&a);
    }

    // ── Scenario 3: clean artifact terminates at classification ──────────

    #[test]
    fn test_clean_artifact_completes_without_step_three() {
        let platform = registered_platform("art-3", "proj-1");
        platform.begin_scan("art-3", 1).unwrap();
        platform.submit_scanner_result("art-3", Vec::new()).unwrap();

        let a = platform.artifact("art-3").unwrap();
        assert!(a.workflow_completed);
        assert_eq!(a.current_step, WorkflowStep::Classification, "must not reach assignment");
        assert_eq!(a.cycles.len(), 1);
        assert!(a.cycles[0].completed_at.is_some());
        assert_eq!(a.state, SecurityState::S3);
        assert_cycle_invariants(&a);

        // Further triggers are no-ops on a completed workflow.
        let outcome = platform.update_workflow_status("art-3", WorkflowStep::Assignment).unwrap();
        assert_eq!(outcome, StepOutcome::NoOp);
    }

    // ── Scenario 4: ticket acceptance advances assignment ────────────────

    #[test]
    fn test_ticket_acceptance_advances_assignment() {
        let platform = registered_platform("art-4", "proj-1");
        platform.begin_scan("art-4", 1).unwrap();
        platform
            .submit_scanner_result("art-4", vec![vuln("CVE-9", "injection flaw", Severity::High, 7.5)])
            .unwrap();

        let a = platform.artifact("art-4").unwrap();
        assert_eq!(a.current_step, WorkflowStep::Assignment);
        let snapshot = a.current_cycle.as_ref().unwrap();
        assert_eq!(snapshot.assignment.number_tickets_not_assigned, 1);

        let ticket = platform.tickets_for_artifact("art-4")[0].clone();
        assert_eq!(ticket.status, TicketStatus::NotAccepted);

        let outcome = platform.ticket_status_changed(ticket.ticket_id, TicketStatus::Processing).unwrap();
        assert_eq!(outcome, StepOutcome::Advanced(WorkflowStep::Remediation));

        let a = platform.artifact("art-4").unwrap();
        assert_eq!(a.current_step, WorkflowStep::Remediation);
        let cycle = a.current_cycle.as_ref().unwrap();
        assert_eq!(cycle.assignment.number_tickets_assigned, 1);
        assert_eq!(cycle.assignment.number_tickets_not_assigned, 0);
        assert_cycle_invariants(&a);
    }

    // ── Scenario 5/6 fixtures: verification decision ─────────────────────

    fn verification_fixture(ticket_final: TicketStatus) -> (Arc<DocumentStore<Artifact>>, Arc<TicketManager>, WorkflowEngine) {
        let artifacts: Arc<DocumentStore<Artifact>> = Arc::new(DocumentStore::new("artifact"));
        let tickets = Arc::new(TicketManager::new());
        let bus = Arc::new(EventBus::new());
        let engine = WorkflowEngine::new(artifacts.clone(), tickets.clone(), bus);

        let mut a = Artifact::new("art-v", "proj-v", "edge-proxy", ArtifactKind::Image);
        a.threat_list = vec!["CVE-77".to_string()];

        let threat = Threat {
            name: "CVE-77".into(),
            description: "request smuggling".into(),
            category: StrideCategory::Tampering,
            confidence: 0.6,
            mitigation: Vec::new(),
            mitigations: Vec::new(),
            status: ThreatStatus::NonMitigated,
            score: ThreatScore::uniform(7.0),
            created_at: 100,
        };
        let t = tickets.create_for_threat(&threat, &a);
        tickets.update_status(t.ticket_id, TicketStatus::Processing).unwrap();
        tickets.update_status(t.ticket_id, TicketStatus::Submitted).unwrap();
        tickets.update_status(t.ticket_id, ticket_final).unwrap();

        let mut cycle = WorkflowCycle::start(1, 100, &a.vulnerability_list, &a.threat_list);
        cycle.current_step = WorkflowStep::Verification;
        a.current_step = WorkflowStep::Verification;
        a.cycles = vec![cycle.clone()];
        a.cycles_count = 1;
        a.current_cycle = Some(cycle);
        artifacts.insert("art-v", a);

        (artifacts, tickets, engine)
    }

    #[test]
    fn test_verification_returned_ticket_restarts_cycle() {
        // Submitted → Processing is the "returned" transition.
        let (artifacts, _tickets, engine) = verification_fixture(TicketStatus::Processing);

        let outcome = engine.update_status("art-v", WorkflowStep::Verification).unwrap();
        assert_eq!(outcome, StepOutcome::CycleRestarted(2));

        let a = artifacts.get("art-v").unwrap();
        assert!(!a.workflow_completed);
        assert_eq!(a.current_step, WorkflowStep::Detection);
        assert_eq!(a.cycles_count, 2);
        assert_eq!(a.cycles.len(), 2);

        let first = a.cycles.iter().find(|c| c.cycle_number == 1).unwrap();
        assert!(first.completed_at.is_some());
        assert_eq!(first.verification.number_tickets_returned, 1);
        assert_cycle_invariants(&a);
    }

    #[test]
    fn test_verification_all_clear_terminates() {
        let (artifacts, _tickets, engine) = verification_fixture(TicketStatus::Resolved);

        let outcome = engine.update_status("art-v", WorkflowStep::Verification).unwrap();
        assert_eq!(outcome, StepOutcome::WorkflowCompleted);

        let a = artifacts.get("art-v").unwrap();
        assert!(a.workflow_completed);
        assert_eq!(a.current_step, WorkflowStep::Verification, "step pointer parks on verification");
        assert_eq!(a.cycles.len(), 1);
        assert_eq!(a.cycles[0].verification.number_tickets_resolved, 1);
        assert_eq!(a.cycles[0].verification.number_tickets_returned, 0);
        assert_cycle_invariants(&a);

        assert_eq!(engine.update_status("art-v", WorkflowStep::Verification).unwrap(), StepOutcome::NoOp);
    }

    // ── Aggregator invariants ────────────────────────────────────────────

    #[test]
    fn test_submit_without_scan_rejected() {
        let platform = registered_platform("art-5", "proj-1");
        let err = platform
            .submit_scanner_result("art-5", vec![vuln("CVE-1", "x", Severity::Low, 1.0)])
            .unwrap_err();
        assert!(matches!(err, ArgusError::Validation(_)));
    }

    #[test]
    fn test_extra_submission_after_gate_rejected() {
        let platform = registered_platform("art-6", "proj-1");
        platform.begin_scan("art-6", 1).unwrap();
        platform.submit_scanner_result("art-6", Vec::new()).unwrap();
        // Scan window closed by the gate; a straggler is a validation error.
        let err = platform.submit_scanner_result("art-6", Vec::new()).unwrap_err();
        assert!(matches!(err, ArgusError::Validation(_)));
    }

    #[test]
    fn test_begin_scan_zero_scanners_rejected() {
        let platform = registered_platform("art-7", "proj-1");
        assert!(matches!(
            platform.begin_scan("art-7", 0).unwrap_err(),
            ArgusError::Validation(_)
        ));
    }

    #[test]
    fn test_concurrent_scanner_submissions() {
        let platform = Arc::new(registered_platform("art-8", "proj-1"));
        platform.begin_scan("art-8", 8).unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let platform = platform.clone();
            handles.push(std::thread::spawn(move || {
                let cve = format!("CVE-2024-1{:03}", i);
                platform
                    .submit_scanner_result("art-8", vec![vuln(&cve, "finding", Severity::Medium, 5.0)])
                    .unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let a = platform.artifact("art-8").unwrap();
        assert!(!a.is_scanning);
        assert_eq!(a.vulnerability_list.len(), 8, "no submission may be lost to a race");
        assert_eq!(platform.aggregator().total_finalized(), 1);
        assert_eq!(a.threat_list.len(), 8);
        assert_cycle_invariants(&a);
    }

    // ── Consistency self-healing ─────────────────────────────────────────

    #[test]
    fn test_cycle_mirror_divergence_is_healed() {
        let artifacts: Arc<DocumentStore<Artifact>> = Arc::new(DocumentStore::new("artifact"));
        let tickets = Arc::new(TicketManager::new());
        let bus = Arc::new(EventBus::new());
        let engine = WorkflowEngine::new(artifacts.clone(), tickets, bus);

        let mut a = Artifact::new("art-h", "proj-1", "svc", ArtifactKind::SourceCode);
        a.vulnerability_list = vec![vuln("CVE-1", "x", Severity::High, 7.0)];
        a.threat_list = vec!["CVE-1".to_string()];
        let cycle = WorkflowCycle::start(3, 100, &a.vulnerability_list, &a.threat_list);
        a.current_step = WorkflowStep::Detection;
        a.current_cycle = Some(cycle.clone());
        // Diverged mirror: stale step data, wrong counter.
        let mut stale = cycle;
        stale.current_step = WorkflowStep::Verification;
        stale.detection.number_vuls = 999;
        a.cycles = vec![stale];
        a.cycles_count = 99;
        artifacts.insert("art-h", a);

        // Healing runs before any step logic, then detection completes.
        let outcome = engine.update_status("art-h", WorkflowStep::Detection).unwrap();
        assert_eq!(outcome, StepOutcome::Advanced(WorkflowStep::Classification));
        assert!(engine.consistency_heals() >= 1);

        let a = artifacts.get("art-h").unwrap();
        assert_eq!(a.cycles_count, 3);
        assert_eq!(a.cycles.len(), 1);
        assert_cycle_invariants(&a);
    }

    // ── Threat score invariant ───────────────────────────────────────────

    #[test]
    fn test_threat_score_total_is_mean_of_subscores() {
        let platform = AssessmentPlatform::new();
        let mut threat = Threat {
            name: "CVE-42".into(),
            description: "overflow".into(),
            category: StrideCategory::DenialOfService,
            confidence: 0.6,
            mitigation: Vec::new(),
            mitigations: Vec::new(),
            status: ThreatStatus::NonMitigated,
            score: ThreatScore::uniform(5.0),
            created_at: 100,
        };
        threat.score.damage = 9.0;
        threat.score.reproducibility = 7.0;
        threat.score.exploitability = 5.0;
        threat.score.affected_users = 3.0;
        threat.score.discoverability = 1.0;
        threat.score.total = 999.0; // must be ignored and re-derived

        platform.threats().save(threat);
        let saved = platform.threats().get("CVE-42").unwrap();
        assert!((saved.score.total - 5.0).abs() < 1e-9);

        platform.threats().update("CVE-42", |t| t.score.damage = 10.0).unwrap();
        let saved = platform.threats().get("CVE-42").unwrap();
        assert!((saved.score.total - 5.2).abs() < 1e-9);
    }

    // ── Classifier ───────────────────────────────────────────────────────

    #[test]
    fn test_classifier_cwe_votes_outweigh_keywords() {
        let cfg = ClassifierConfig::builtin();
        let v = vuln("CVE-1", "a crash was observed", Severity::High, 7.0).with_cwes(&["CWE-89"]);
        // CWE-89 → Tampering (3) vs "crash" keyword → DoS (2)
        let c = classify(&v, &cfg);
        assert_eq!(c.category, StrideCategory::Tampering);
        assert_eq!(c.top_score, 3);
        assert!((c.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_classifier_tie_breaks_by_registration_order() {
        let cfg = ClassifierConfig::builtin();
        // CWE-798 maps to Spoofing and ElevationOfPrivilege, 3 votes each;
        // Spoofing registers first.
        let v = vuln("CVE-1", "none", Severity::High, 7.0).with_cwes(&["CWE-798"]);
        let c = classify(&v, &cfg);
        assert_eq!(c.category, StrideCategory::Spoofing);
    }

    #[test]
    fn test_classifier_defaults_to_information_disclosure() {
        let cfg = ClassifierConfig::builtin();
        let v = vuln("CVE-1", "something odd happened", Severity::Unknown, 0.0);
        let c = classify(&v, &cfg);
        assert_eq!(c.category, StrideCategory::InformationDisclosure);
        assert_eq!(c.top_score, 0);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_classifier_keyword_accumulation_caps_confidence() {
        let cfg = ClassifierConfig::builtin();
        let v = vuln(
            "CVE-1",
            "privilege escalation allows arbitrary code and root access",
            Severity::Critical,
            9.0,
        );
        let c = classify(&v, &cfg);
        assert_eq!(c.category, StrideCategory::ElevationOfPrivilege);
        assert!(c.top_score >= 6);
        assert_eq!(c.confidence, 1.0);
    }

    // ── Adapters and enrichment ──────────────────────────────────────────

    #[test]
    fn test_json_adapter_normalizes() {
        let adapter = JsonReportAdapter::new("sca-json");
        let raw = r#"[
            {"cveId": "CVE-2023-1111", "description": "dep vuln", "severity": "HIGH", "cvss": 12.5, "cweIds": ["CWE-79"]},
            {"id": "CVE-2023-2222", "score": 3.1}
        ]"#;
        let vulns = adapter.adapt(raw).unwrap();
        assert_eq!(vulns.len(), 2);
        assert_eq!(vulns[0].severity, Severity::High);
        assert_eq!(vulns[0].score, Some(10.0), "scores clamp into 0-10");
        assert_eq!(vulns[0].cwes, vec!["CWE-79".to_string()]);
        // No severity string: derived from the score band.
        assert_eq!(vulns[1].severity, Severity::Low);
    }

    #[test]
    fn test_json_adapter_rejects_missing_id() {
        let adapter = JsonReportAdapter::new("sca-json");
        let err = adapter.adapt(r#"[{"cveId": "  "}]"#).unwrap_err();
        assert!(matches!(err, ArgusError::Validation(_)));
    }

    #[test]
    fn test_enrichment_fills_only_gaps() {
        let service = StaticEnrichment::new().with_entry(
            "CVE-10",
            CveDetails {
                score: Some(7.5),
                cvss_vector: Some("AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:N/A:N".into()),
                cwes: vec!["CWE-200".into()],
            },
        );
        let mut vulns = vec![
            Vulnerability::new("CVE-10", "gap", Severity::Unknown),
            vuln("CVE-11", "complete", Severity::Low, 2.0).with_cwes(&["CWE-79"]),
        ];
        vulns[1].cvss_vector = Some("existing".into());
        enrich(&mut vulns, &service);

        assert_eq!(vulns[0].score, Some(7.5));
        assert_eq!(vulns[0].severity, Severity::High);
        assert_eq!(vulns[0].cwes, vec!["CWE-200".to_string()]);
        // Untouched: already complete, and no table entry anyway.
        assert_eq!(vulns[1].score, Some(2.0));
        assert_eq!(vulns[1].cvss_vector.as_deref(), Some("existing"));
    }

    // ── Tickets ──────────────────────────────────────────────────────────

    #[test]
    fn test_ticket_previous_status_tracks_returns() {
        let manager = TicketManager::new();
        let artifact = Artifact::new("a", "p", "svc", ArtifactKind::SourceCode);
        let threat = Threat {
            name: "CVE-1".into(),
            description: "x".into(),
            category: StrideCategory::Tampering,
            confidence: 1.0,
            mitigation: Vec::new(),
            mitigations: Vec::new(),
            status: ThreatStatus::NonMitigated,
            score: ThreatScore::uniform(9.5),
            created_at: 100,
        };
        let t = manager.create_for_threat(&threat, &artifact);
        assert_eq!(t.status, TicketStatus::NotAccepted);
        assert_eq!(t.priority, crate::tickets::TicketPriority::Critical);

        manager.update_status(t.ticket_id, TicketStatus::Processing).unwrap();
        manager.update_status(t.ticket_id, TicketStatus::Submitted).unwrap();
        let returned = manager.update_status(t.ticket_id, TicketStatus::Processing).unwrap();
        assert_eq!(returned.previous_status, Some(TicketStatus::Submitted));
        assert!(returned.is_returned());

        let resolved = manager.update_status(t.ticket_id, TicketStatus::Resolved).unwrap();
        assert!(!resolved.is_returned());
        assert!(resolved.resolved_at.is_some());
    }

    #[test]
    fn test_artifact_removal_cascades_ticket_resolution() {
        let platform = registered_platform("art-10", "proj-2");
        platform.begin_scan("art-10", 1).unwrap();
        platform
            .submit_scanner_result(
                "art-10",
                vec![
                    vuln("CVE-1", "x", Severity::High, 7.0),
                    vuln("CVE-2", "y", Severity::Low, 2.0),
                ],
            )
            .unwrap();

        platform.remove_artifact("art-10").unwrap();
        assert!(platform.artifact("art-10").is_err());
        for t in platform.tickets_for_artifact("art-10") {
            assert_eq!(t.status, TicketStatus::Resolved);
        }
    }

    // ── Full loop: remediation cycle restart via the platform ────────────

    #[test]
    fn test_full_cycle_with_restart_and_termination() {
        let platform = registered_platform("art-11", "proj-3");

        // Cycle 1: one finding, ticket accepted, submitted, then returned.
        platform.begin_scan("art-11", 1).unwrap();
        platform
            .submit_scanner_result("art-11", vec![vuln("CVE-8", "ssrf", Severity::High, 8.1)])
            .unwrap();
        let ticket = platform.tickets_for_artifact("art-11")[0].clone();

        platform.ticket_status_changed(ticket.ticket_id, TicketStatus::Processing).unwrap();
        let out = platform.ticket_status_changed(ticket.ticket_id, TicketStatus::Submitted).unwrap();
        assert_eq!(out, StepOutcome::Advanced(WorkflowStep::Verification));

        // Returned to processing: verification loops into cycle 2.
        let out = platform.ticket_status_changed(ticket.ticket_id, TicketStatus::Processing).unwrap();
        assert_eq!(out, StepOutcome::CycleRestarted(2));
        let a = platform.artifact("art-11").unwrap();
        assert_eq!(a.cycles_count, 2);
        assert_eq!(a.current_step, WorkflowStep::Detection);
        assert_cycle_invariants(&a);

        // Cycle 2: fix lands, rescan comes back clean, ticket resolves.
        platform.begin_scan("art-11", 1).unwrap();
        platform.submit_scanner_result("art-11", Vec::new()).unwrap();
        let a = platform.artifact("art-11").unwrap();
        // The rescan resolved the only threat, so classification terminates
        // the workflow inside cycle 2.
        assert!(a.workflow_completed);
        assert_eq!(a.cycles_count, 2);
        let tickets = platform.tickets_for_artifact("art-11");
        assert_eq!(tickets[0].status, TicketStatus::Resolved);
        assert_cycle_invariants(&a);
    }

    // ── Idempotence of step checks ───────────────────────────────────────

    #[test]
    fn test_step_checks_are_idempotent() {
        let platform = registered_platform("art-12", "proj-4");
        platform.begin_scan("art-12", 1).unwrap();
        platform
            .submit_scanner_result("art-12", vec![vuln("CVE-3", "x", Severity::Medium, 5.0)])
            .unwrap();

        let before = platform.artifact("art-12").unwrap();
        assert_eq!(before.current_step, WorkflowStep::Assignment);

        // Re-running earlier checks, or the live one without its condition,
        // changes nothing structural.
        for _ in 0..3 {
            assert_eq!(
                platform.update_workflow_status("art-12", WorkflowStep::Detection).unwrap(),
                StepOutcome::NoOp
            );
            assert_eq!(
                platform.update_workflow_status("art-12", WorkflowStep::Classification).unwrap(),
                StepOutcome::NoOp
            );
            assert_eq!(
                platform.update_workflow_status("art-12", WorkflowStep::Assignment).unwrap(),
                StepOutcome::Waiting
            );
        }
        let after = platform.artifact("art-12").unwrap();
        assert_eq!(before.cycles_count, after.cycles_count);
        assert_eq!(before.current_step, after.current_step);
        assert_eq!(before.cycles.len(), after.cycles.len());
        assert_cycle_invariants(&after);
    }

    // ── Stats and events ─────────────────────────────────────────────────

    #[test]
    fn test_project_stats() {
        let platform = AssessmentPlatform::new();
        platform.register_artifact(Artifact::new("s-1", "proj-s", "a", ArtifactKind::SourceCode));
        platform.register_artifact(Artifact::new("s-2", "proj-s", "b", ArtifactKind::Image));
        platform.register_artifact(Artifact::new("other", "proj-x", "c", ArtifactKind::Docs));

        // s-1 ends up waiting on assignment, s-2 completes clean.
        platform.begin_scan("s-1", 1).unwrap();
        platform
            .submit_scanner_result("s-1", vec![vuln("CVE-1", "x", Severity::High, 7.0)])
            .unwrap();
        platform.begin_scan("s-2", 1).unwrap();
        platform.submit_scanner_result("s-2", Vec::new()).unwrap();

        let stats = platform.project_stats("proj-s");
        assert_eq!(stats.artifact_count, 2);
        assert_eq!(stats.completed_count, 1);
        assert_eq!(stats.per_step_counts[2], 1, "one artifact on assignment");
        assert_eq!(stats.total_cycles, 2);
        assert!((stats.average_cycles - 1.0).abs() < 1e-9);

        let on_assignment = platform.artifacts_by_step("proj-s", Some(WorkflowStep::Assignment));
        assert_eq!(on_assignment.len(), 1);
        assert_eq!(on_assignment[0].artifact_id, "s-1");
        assert!(platform.artifacts_by_step("proj-x", Some(WorkflowStep::Assignment)).is_empty());
    }

    #[test]
    fn test_events_and_audit_trail() {
        let platform = registered_platform("art-13", "proj-5");
        platform.begin_scan("art-13", 1).unwrap();
        platform
            .submit_scanner_result("art-13", vec![vuln("CVE-1", "x", Severity::High, 7.0)])
            .unwrap();

        assert!(!platform.bus().recent_events(10, Some(EventCategory::Scan)).is_empty());
        assert!(!platform.bus().recent_events(10, Some(EventCategory::Workflow)).is_empty());

        let audit = platform.engine().recent_audit(10);
        assert!(audit.iter().any(|e| e.contains("detection")));
        assert!(audit.iter().any(|e| e.contains("classification")));
    }
}
