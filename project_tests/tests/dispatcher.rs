use std::sync::Arc;

use lib_shodan::models::{FacetReport, HostReport};
use lib_shodan::{Dispatcher, Operation, Record, RecordKind, ShodanError};
use project_tests::ScriptedTransport;

fn dispatcher(transport: &Arc<ScriptedTransport>) -> Dispatcher {
    Dispatcher::new("k3y", transport.clone()).unwrap()
}

fn query_names(transport: &ScriptedTransport) -> Vec<String> {
    transport.requests()[0]
        .query()
        .iter()
        .map(|(name, _)| name.clone())
        .collect()
}

#[tokio::test]
async fn test_host_search_sends_ordered_parameters_and_decodes_report() {
    let body = r#"{
        "total": 2,
        "matches": [
            {"ip_str": "10.0.0.1", "port": 80, "timestamp": "2021-01-01T00:00:00.000000"},
            {"ip_str": "10.0.0.2", "port": "443", "timestamp": "2021-01-01T00:00:01.000000", "hostnames": null}
        ],
        "facets": {"port": [{"value": 80, "count": 10}, {"value": "443", "count": 4}]}
    }"#;
    let transport = Arc::new(ScriptedTransport::new().respond("shodan/host/search", body));

    let report: HostReport = dispatcher(&transport)
        .host_search("apache country:DE", Some("port:5"), Some(2))
        .await
        .unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.matches.len(), 2);
    assert_eq!(report.matches[1].port, 443);
    assert!(report.matches[1].hostnames.is_empty());
    assert_eq!(report.facets[0].name, "port");
    assert_eq!(report.facets[0].values[0].value, "80");

    let spec = &transport.requests()[0];
    assert_eq!(spec.path(), "shodan/host/search");
    assert_eq!(query_names(&transport), ["query", "facets", "page", "key"]);
    assert_eq!(spec.query_value("query"), Some("apache country:DE"));
    assert_eq!(spec.query_value("page"), Some("2"));
    assert!(!spec.to_string().contains("k3y"));
}

#[tokio::test]
async fn test_host_lookup_decodes_banners_and_ports() {
    let body = r#"{
        "ip_str": "8.8.8.8",
        "ip": 134744072,
        "ports": [53, 443],
        "org": "Google LLC",
        "data": [
            {"ip_str": "8.8.8.8", "port": 53, "timestamp": "2021-01-01T00:00:00.000000", "transport": "udp"},
            {"ip_str": "8.8.8.8", "port": 443, "timestamp": "2021-01-01T00:00:00.000000"}
        ]
    }"#;
    let transport = Arc::new(ScriptedTransport::new().respond("shodan/host/8.8.8.8", body));

    let host = dispatcher(&transport).host("8.8.8.8", true, false).await.unwrap();
    assert_eq!(host.ip.to_string(), "8.8.8.8");
    assert_eq!(host.organization, "Google LLC");
    assert_eq!(host.banners.len(), 2);
    assert_eq!(host.ports().into_iter().collect::<Vec<_>>(), vec![53, 443]);

    assert_eq!(query_names(&transport), ["history", "key"]);
}

#[tokio::test]
async fn test_call_returns_the_record_kind_of_the_operation() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .respond("shodan/host/count", r#"{"total": 42, "facets": {}}"#)
            .respond("tools/myip", r#""203.0.113.7""#)
            .respond("shodan/ports", "[22, 80, 443]"),
    );
    let dispatcher = dispatcher(&transport);

    let operations = [
        (
            Operation::HostCount {
                query: "nginx".into(),
                facets: None,
            },
            RecordKind::FacetReport,
        ),
        (Operation::MyIp, RecordKind::ExternalIp),
        (Operation::CrawledPorts, RecordKind::Ports),
    ];
    for (operation, kind) in operations {
        let record = dispatcher.call(&operation).await.unwrap();
        assert_eq!(record.kind(), kind);
    }

    match dispatcher.call(&Operation::CrawledPorts).await.unwrap() {
        Record::Ports(ports) => assert_eq!(ports, vec![22, 80, 443]),
        other => panic!("unexpected record {other:?}"),
    }
    let count: FacetReport = dispatcher.host_count("nginx", None).await.unwrap();
    assert_eq!(count.total, 42);
}

#[tokio::test]
async fn test_dns_lookups_keep_service_order() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .respond("dns/resolve", r#"{"google.com": "142.250.74.46", "nope.invalid": null}"#)
            .respond("dns/reverse", r#"{"8.8.8.8": ["dns.google"]}"#),
    );
    let dispatcher = dispatcher(&transport);

    let resolved = dispatcher.resolve_dns(["google.com", "nope.invalid"]).await.unwrap();
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].hostname, "google.com");
    assert_eq!(resolved[0].ips, vec!["142.250.74.46".to_string()]);
    assert!(resolved[1].ips.is_empty());

    let reverse = dispatcher.reverse_dns(["8.8.8.8"]).await.unwrap();
    assert_eq!(reverse[0].hostnames, vec!["dns.google".to_string()]);

    let resolve_spec = &transport.requests()[0];
    assert_eq!(resolve_spec.query_value("hostnames"), Some("google.com,nope.invalid"));
}

#[tokio::test]
async fn test_invalid_parameters_never_reach_the_transport() {
    let transport = Arc::new(ScriptedTransport::new());
    let dispatcher = dispatcher(&transport);

    assert!(matches!(
        dispatcher.host_search("   ", None, None).await,
        Err(ShodanError::InvalidParameter { .. })
    ));
    assert!(matches!(
        dispatcher.host_search("apache", None, Some(0)).await,
        Err(ShodanError::InvalidParameter { .. })
    ));
    assert!(matches!(
        dispatcher.honeyscore("not-an-ip").await,
        Err(ShodanError::InvalidParameter { .. })
    ));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_service_errors_are_surfaced_unchanged() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .fail(
                "account/profile",
                ShodanError::AuthenticationFailed("Invalid API key".into()),
            )
            .fail(
                "shodan/host/search",
                ShodanError::InsufficientCredits("Insufficient query credits".into()),
            ),
    );
    let dispatcher = dispatcher(&transport);

    assert_eq!(
        dispatcher.account_profile().await.unwrap_err(),
        ShodanError::AuthenticationFailed("Invalid API key".into())
    );
    assert!(matches!(
        dispatcher.host_search("apache", None, None).await,
        Err(ShodanError::InsufficientCredits(_))
    ));
    // One-shot calls are never retried
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_undecodable_bodies_are_malformed_records() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .respond("api-info", "<html>bad gateway</html>")
            .respond("labs/honeyscore/10.0.0.1", "1.5"),
    );
    let dispatcher = dispatcher(&transport);

    assert!(matches!(
        dispatcher.api_info().await,
        Err(ShodanError::MalformedRecord { .. })
    ));
    assert!(matches!(
        dispatcher.honeyscore("10.0.0.1").await,
        Err(ShodanError::MalformedRecord { .. })
    ));
}

#[test]
fn test_blank_api_key_is_rejected() {
    let transport = Arc::new(ScriptedTransport::new());
    assert!(matches!(
        Dispatcher::new("  ", transport),
        Err(ShodanError::InvalidParameter { .. })
    ));
}
